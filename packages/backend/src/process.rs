//! Process liveness checks used when pruning stale registrations.

/// Whether a process with the given pid exists on this host.
#[cfg(target_os = "linux")]
pub fn is_running(pid: u32) -> bool {
    std::path::Path::new("/proc").join(pid.to_string()).exists()
}

/// Whether a process with the given pid exists on this host.
#[cfg(all(unix, not(target_os = "linux")))]
pub fn is_running(pid: u32) -> bool {
    std::process::Command::new("ps")
        .args(["-p", &pid.to_string()])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(true)
}

/// Whether a process with the given pid exists on this host.
#[cfg(not(unix))]
pub fn is_running(_pid: u32) -> bool {
    true
}
