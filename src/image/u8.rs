/// Borrowed 8-bit grayscale view handed to the correlation engine.
#[derive(Clone, Copy, Debug)]
pub struct ImageU8<'a> {
    pub w: usize,
    pub h: usize,
    pub stride: usize, // bytes between rows
    pub data: &'a [u8],
}

impl<'a> ImageU8<'a> {
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.stride + x]
    }

    #[inline]
    pub fn row(&self, y: usize) -> &'a [u8] {
        let start = y * self.stride;
        &self.data[start..start + self.w]
    }

    /// Pixel at a tile-local coordinate, `None` outside the image.
    pub fn sample(&self, p: [f64; 2]) -> Option<u8> {
        if !(p[0].is_finite() && p[1].is_finite()) || p[0] < 0.0 || p[1] < 0.0 {
            return None;
        }
        let (x, y) = (p[0] as usize, p[1] as usize);
        (x < self.w && y < self.h).then(|| self.get(x, y))
    }
}
