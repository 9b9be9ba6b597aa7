//! Pop a desktop alert without blocking the calling watchdog.

use std::process::Command;

/// Show a notification/message box with the given text.
///
/// The platform notifier is spawned detached so a dialog nobody dismisses
/// cannot block the loop that fired it.
pub fn show_alert(text: &str) {
    eprintln!("[HS-ACTION] alert: {text}");

    let mut command = if cfg!(target_os = "windows") {
        let mut c = Command::new("msg");
        c.args(["*", text]);
        c
    } else if cfg!(target_os = "macos") {
        let script = format!(
            "display notification \"{}\" with title \"Host Sentry\"",
            text.replace('"', "'")
        );
        let mut c = Command::new("osascript");
        c.args(["-e", &script]);
        c
    } else {
        let mut c = Command::new("notify-send");
        c.args(["Host Sentry", text]);
        c
    };

    // Fire and forget: spawn, never wait.
    if let Err(e) = command.spawn() {
        eprintln!("[HS-ACTION] could not show alert: {e}");
    }
}
