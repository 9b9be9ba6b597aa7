//! Write rule output to a file.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Write `content` to `path`, creating parent directories as needed.
/// `append` adds to the end instead of replacing the file. Failures are
/// logged, never raised.
pub fn write_file(path: impl AsRef<Path>, content: &str, append: bool) {
    let path = path.as_ref();

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && let Err(e) = fs::create_dir_all(parent)
    {
        eprintln!(
            "[HS-ACTION] could not create directory {}: {e}",
            parent.display()
        );
        return;
    }

    let result = OpenOptions::new()
        .create(true)
        .append(append)
        .write(true)
        .truncate(!append)
        .open(path)
        .and_then(|mut file| file.write_all(content.as_bytes()));

    match result {
        Ok(()) => eprintln!("[HS-ACTION] wrote to file: {}", path.display()),
        Err(e) => eprintln!("[HS-ACTION] failed to write {}: {e}", path.display()),
    }
}
