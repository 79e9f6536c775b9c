//! Pid file written on spawn, removed on clean exit.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Contents of the worker pid file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PidFileInfo {
    pub pid: u32,
    pub port: u16,
    #[serde(rename = "startedAt")]
    pub started_at_epoch: i64,
}

/// Writes the pid file, creating the data directory if needed.
pub fn write(path: &Path, info: &PidFileInfo) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string(info)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, json)
}

/// Reads the pid file; missing or malformed files are `None`.
pub fn read(path: &Path) -> Option<PidFileInfo> {
    let content = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Removes the pid file; already-gone is fine.
pub fn remove(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), "failed to remove pid file: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn round_trips_pid_info() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("worker.pid");
        let info = PidFileInfo { pid: 4242, port: 41777, started_at_epoch: 1_700_000_000_000 };

        write(&path, &info).unwrap();
        assert_eq!(read(&path), Some(info));

        remove(&path);
        assert!(read(&path).is_none());
        // Double remove is harmless.
        remove(&path);
    }

    #[test]
    fn malformed_pid_file_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("worker.pid");
        std::fs::write(&path, "{not json").unwrap();
        assert!(read(&path).is_none());
    }
}
