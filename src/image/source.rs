//! Resolving tile image locators into decoded buffers.
use super::io::{load_grayscale_image, GrayImageU8, ImageError};
use std::path::PathBuf;

/// Supplies decoded tile images for a locator (URL or local path).
pub trait ImageSource: Sync {
    fn load(&self, locator: &str) -> Result<GrayImageU8, ImageError>;
}

/// Local filesystem source decoding with the `image` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct FileImageSource;

impl ImageSource for FileImageSource {
    fn load(&self, locator: &str) -> Result<GrayImageU8, ImageError> {
        load_grayscale_image(&local_path(locator)).map_err(|err| ImageError {
            locator: locator.to_string(),
            reason: err.reason,
        })
    }
}

/// Strip a `file://` or `file:` prefix from a locator.
pub fn local_path(locator: &str) -> PathBuf {
    let stripped = locator
        .strip_prefix("file://")
        .or_else(|| locator.strip_prefix("file:"))
        .unwrap_or(locator);
    PathBuf::from(stripped)
}
