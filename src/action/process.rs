//! Process actions: terminate by name, top-CPU report.

use std::cmp::Ordering;

use sysinfo::{ProcessesToUpdate, System};

/// Terminate every running instance of a process by name.
///
/// Matching is case-insensitive, like the probes. Instances that refuse the
/// signal (already gone, or insufficient privileges) are logged and skipped.
pub fn terminate(process_name: &str) {
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::All, true);

    let mut matched = 0usize;
    let mut killed = 0usize;
    for process in sys.processes().values() {
        if !process
            .name()
            .to_string_lossy()
            .eq_ignore_ascii_case(process_name)
        {
            continue;
        }
        matched += 1;
        if process.kill() {
            killed += 1;
        } else {
            eprintln!(
                "[HS-ACTION] could not terminate '{process_name}' (pid {}): it may have already exited or requires elevation",
                process.pid()
            );
        }
    }

    if matched == 0 {
        eprintln!("[HS-ACTION] terminate ran, but no active '{process_name}' instances were found");
    } else {
        eprintln!("[HS-ACTION] terminated {killed} of {matched} '{process_name}' instance(s)");
    }
}

/// Formatted report of the `count` most CPU-hungry processes, for use inside
/// alert or write-file callbacks.
pub fn top_processes(count: usize) -> String {
    let mut sys = System::new();
    // Two refreshes bracket a minimal interval so per-process CPU deltas are
    // meaningful.
    sys.refresh_processes(ProcessesToUpdate::All, true);
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_processes(ProcessesToUpdate::All, true);

    let mut processes: Vec<_> = sys.processes().values().collect();
    processes.sort_by(|a, b| {
        b.cpu_usage()
            .partial_cmp(&a.cpu_usage())
            .unwrap_or(Ordering::Equal)
    });

    let mut lines = vec![format!("Top {count} CPU-consuming processes:")];
    for process in processes.iter().take(count) {
        lines.push(format!(
            "  - PID: {}, Name: {}, CPU: {:.2}%",
            process.pid(),
            process.name().to_string_lossy(),
            process.cpu_usage()
        ));
    }
    lines.join("\n")
}
