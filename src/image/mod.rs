//! Grayscale tile images: borrowed views, decoding and locator handling.
pub mod io;
pub mod source;
pub mod u8;

pub use self::io::{GrayImageU8, ImageError};
pub use self::source::{local_path, FileImageSource, ImageSource};
pub use self::u8::ImageU8;
