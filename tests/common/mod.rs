use std::fs;
use std::path::Path;

#[allow(dead_code)]
pub fn cleanup<P: AsRef<Path>>(dir: P) {
    let dir = dir.as_ref();
    if dir.exists() {
        fs::remove_dir_all(dir).unwrap();
    }
}
