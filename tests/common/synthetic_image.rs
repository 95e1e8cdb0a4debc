use mosaic_align::image::GrayImageU8;

/// High-contrast checkerboard standing in for a tile image.
pub fn checkerboard(width: usize, height: usize, cell: usize) -> GrayImageU8 {
    assert!(width > 0 && height > 0, "image dimensions must be positive");
    assert!(cell > 0, "cell size must be positive");

    let mut data = vec![0u8; width * height];
    for y in 0..height {
        for x in 0..width {
            let val = if (x / cell + y / cell) & 1 == 0 { 32u8 } else { 220u8 };
            data[y * width + x] = val;
        }
    }
    GrayImageU8::new(width, height, data)
}
