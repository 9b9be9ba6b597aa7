//! Stop an OS service by name through the platform's service manager CLI.

use std::process::Command;

/// Stop a service. Uses `systemctl` on Linux, `launchctl` on macOS and `sc`
/// on Windows. Failures are logged, never raised.
pub fn stop_service(service_name: &str) {
    eprintln!("[HS-ACTION] stopping service '{service_name}'");

    let mut command = if cfg!(target_os = "windows") {
        let mut c = Command::new("sc");
        c.args(["stop", service_name]);
        c
    } else if cfg!(target_os = "macos") {
        let mut c = Command::new("launchctl");
        c.args(["stop", service_name]);
        c
    } else {
        let mut c = Command::new("systemctl");
        c.args(["stop", service_name]);
        c
    };

    match command.output() {
        Ok(output) if output.status.success() => {
            eprintln!("[HS-ACTION] successfully sent stop command to service '{service_name}'");
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            eprintln!(
                "[HS-ACTION] failed to stop service '{service_name}' (status {}): {}",
                output.status,
                stderr.trim()
            );
        }
        Err(e) => {
            eprintln!("[HS-ACTION] could not invoke the service manager for '{service_name}': {e}");
        }
    }
}
