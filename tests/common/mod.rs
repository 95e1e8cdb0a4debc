#![allow(dead_code)]

pub mod fixtures;
pub mod synthetic_image;

use std::path::PathBuf;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Fresh per-test directory under the system temp dir.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mosaic-align-{}-{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("create scratch dir");
    dir
}
