use serde::{Deserialize, Serialize};

/// One side of a correspondence: tile-local and mosaic (world) coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchPoint {
    pub l: [f64; 2],
    pub w: [f64; 2],
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointMatch {
    pub p1: MatchPoint,
    pub p2: MatchPoint,
}

/// Directed correspondence record between two tile images.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrespondencePair {
    pub mipmap_level: u32,
    pub url1: String,
    pub url2: String,
    #[serde(default)]
    pub correspondence_point_pairs: Vec<PointMatch>,
}

impl CorrespondencePair {
    pub fn new(
        mipmap_level: u32,
        url1: impl Into<String>,
        url2: impl Into<String>,
        correspondence_point_pairs: Vec<PointMatch>,
    ) -> Self {
        Self {
            mipmap_level,
            url1: url1.into(),
            url2: url2.into(),
            correspondence_point_pairs,
        }
    }

    pub fn len(&self) -> usize {
        self.correspondence_point_pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.correspondence_point_pairs.is_empty()
    }
}
