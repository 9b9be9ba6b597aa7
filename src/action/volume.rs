//! Lock an encrypted volume by drive letter.

use std::process::Command;

/// Lock a BitLocker-protected volume. Windows-only; elsewhere the request is
/// logged and dropped. Requires administrator privileges on the host.
pub fn lock_volume(drive_letter: &str) {
    if !valid_drive_letter(drive_letter) {
        eprintln!(
            "[HS-ACTION] invalid drive letter '{drive_letter}': must be a single letter (e.g. 'D')"
        );
        return;
    }
    let drive = format!("{}:", drive_letter.to_ascii_uppercase());

    if !cfg!(target_os = "windows") {
        eprintln!("[HS-ACTION] lock_volume({drive}) is only supported on Windows");
        return;
    }

    match Command::new("manage-bde").args(["-lock", &drive]).output() {
        Ok(output) if output.status.success() => {
            eprintln!("[HS-ACTION] successfully sent lock command to volume '{drive}'");
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            eprintln!(
                "[HS-ACTION] failed to lock volume '{drive}' (status {}): {}",
                output.status,
                stderr.trim()
            );
        }
        Err(e) => {
            eprintln!("[HS-ACTION] could not invoke manage-bde for '{drive}': {e}");
        }
    }
}

fn valid_drive_letter(value: &str) -> bool {
    let mut chars = value.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_alphabetic())
}
