//! Host statistics for the stats menu entry.

use std::path::Path;

/// Snapshot of host capacity shown to operators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostStats {
    pub disk_total_bytes: u64,
    pub disk_used_bytes: u64,
    pub disk_free_bytes: u64,
    pub hosted_scripts: usize,
    pub running_scripts: usize,
}

/// Collect disk usage for the volume holding `path`.
///
/// Returns zeroed figures when the syscall fails or on non-Unix hosts,
/// matching how absent data is rendered rather than erroring the chat.
pub fn host_stats(path: &Path, hosted_scripts: usize, running_scripts: usize) -> HostStats {
    let (disk_total_bytes, disk_used_bytes, disk_free_bytes) =
        disk_usage(path).unwrap_or((0, 0, 0));
    HostStats {
        disk_total_bytes,
        disk_used_bytes,
        disk_free_bytes,
        hosted_scripts,
        running_scripts,
    }
}

#[cfg(unix)]
fn disk_usage(path: &Path) -> Option<(u64, u64, u64)> {
    use std::ffi::CString;
    use std::mem::MaybeUninit;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes()).ok()?;
    let mut stat = MaybeUninit::<libc::statvfs>::uninit();

    // Safety: libc::statvfs is well-defined for valid paths.
    let ret = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if ret != 0 {
        return None;
    }
    let stat = unsafe { stat.assume_init() };

    let block_size = stat.f_frsize as u64;
    let total = stat.f_blocks as u64 * block_size;
    let free = stat.f_bavail as u64 * block_size;
    let used = total.saturating_sub(free);
    Some((total, used, free))
}

#[cfg(not(unix))]
fn disk_usage(_path: &Path) -> Option<(u64, u64, u64)> {
    None
}

/// Render stats as the chat message body.
pub fn format_host_stats(stats: &HostStats) -> String {
    format!(
        "Server stats\n\nDisk: {:.2} GiB used / {:.2} GiB total ({:.2} GiB free)\nHosted scripts: {}\nRunning scripts: {}",
        gib(stats.disk_used_bytes),
        gib(stats.disk_total_bytes),
        gib(stats.disk_free_bytes),
        stats.hosted_scripts,
        stats.running_scripts,
    )
}

fn gib(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0 * 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_usage_reports_consistent_figures() {
        let stats = host_stats(Path::new("/"), 5, 3);
        assert!(stats.disk_total_bytes >= stats.disk_used_bytes);
        assert!(stats.disk_total_bytes >= stats.disk_free_bytes);
        assert_eq!(stats.hosted_scripts, 5);
        assert_eq!(stats.running_scripts, 3);
    }

    #[test]
    fn missing_volume_renders_as_zero() {
        let stats = host_stats(Path::new("/definitely/not/a/mount"), 0, 0);
        assert_eq!(stats.disk_total_bytes, 0);
        assert_eq!(stats.disk_used_bytes, 0);
    }

    #[test]
    fn formatting_uses_gib_units() {
        let stats = HostStats {
            disk_total_bytes: 10 * 1024 * 1024 * 1024,
            disk_used_bytes: 5 * 1024 * 1024 * 1024 + 512 * 1024 * 1024,
            disk_free_bytes: 4 * 1024 * 1024 * 1024 + 512 * 1024 * 1024,
            hosted_scripts: 4,
            running_scripts: 2,
        };
        let text = format_host_stats(&stats);
        assert!(text.contains("5.50 GiB used / 10.00 GiB total"), "{text}");
        assert!(text.contains("Hosted scripts: 4"), "{text}");
        assert!(text.contains("Running scripts: 2"), "{text}");
    }
}
