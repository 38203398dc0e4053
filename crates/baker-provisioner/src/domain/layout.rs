//! # Data Directory Layout
//!
//! Paths the node writes inside its data directory, and the cleanup that
//! returns a directory to "identity only".

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Written by the node once its identity is generated.
pub const IDENTITY_FILE: &str = "identity.json";

/// Node configuration.
pub const CONFIG_FILE: &str = "config.json";

/// Storage version marker.
pub const VERSION_FILE: &str = "version.json";

/// Context (ledger state) directory.
pub const CONTEXT_DIR: &str = "context";

/// Block store directory.
pub const STORE_DIR: &str = "store";

/// Lock held by a running node.
pub const LOCK_FILE: &str = "lock";

/// Daily log files.
pub const DAILY_LOGS_DIR: &str = "daily_logs";

/// Everything removed by [`clean_node_state`]. `identity.json` is not listed.
pub const NODE_STATE_ENTRIES: [&str; 6] = [
    CONTEXT_DIR,
    DAILY_LOGS_DIR,
    LOCK_FILE,
    STORE_DIR,
    CONFIG_FILE,
    VERSION_FILE,
];

/// Path of the identity file inside `data_dir`.
pub fn identity_path(data_dir: &Path) -> PathBuf {
    data_dir.join(IDENTITY_FILE)
}

/// Whether the node has produced its identity.
pub fn identity_exists(data_dir: &Path) -> bool {
    identity_path(data_dir).is_file()
}

/// Remove node state below `data_dir`, keeping the directory itself and the
/// identity file. Missing entries are ignored.
///
/// Returns the entries that were actually removed.
pub fn clean_node_state(data_dir: &Path) -> io::Result<Vec<&'static str>> {
    let mut removed = Vec::new();

    for entry in NODE_STATE_ENTRIES {
        let path = data_dir.join(entry);
        let metadata = match std::fs::symlink_metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };

        if metadata.is_dir() {
            std::fs::remove_dir_all(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
        debug!(path = %path.display(), "Removed node state entry");
        removed.push(entry);
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn populate(dir: &Path) {
        fs::create_dir_all(dir.join(CONTEXT_DIR).join("index")).unwrap();
        fs::create_dir_all(dir.join(STORE_DIR)).unwrap();
        fs::create_dir_all(dir.join(DAILY_LOGS_DIR)).unwrap();
        fs::write(dir.join(DAILY_LOGS_DIR).join("daily-20240101.log"), "log").unwrap();
        fs::write(dir.join(LOCK_FILE), "").unwrap();
        fs::write(dir.join(CONFIG_FILE), "{}").unwrap();
        fs::write(dir.join(VERSION_FILE), "{}").unwrap();
        fs::write(dir.join(IDENTITY_FILE), "{}").unwrap();
    }

    #[test]
    fn test_clean_keeps_identity_and_directory() {
        let tmp = tempfile::tempdir().unwrap();
        populate(tmp.path());

        let removed = clean_node_state(tmp.path()).unwrap();

        assert_eq!(removed.len(), NODE_STATE_ENTRIES.len());
        assert!(tmp.path().is_dir());
        assert!(identity_exists(tmp.path()));
        for entry in NODE_STATE_ENTRIES {
            assert!(!tmp.path().join(entry).exists(), "{} should be gone", entry);
        }
    }

    #[test]
    fn test_clean_on_empty_directory_is_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let removed = clean_node_state(tmp.path()).unwrap();
        assert!(removed.is_empty());
    }

    #[test]
    fn test_clean_leaves_unrelated_files() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("snapshot.rolling"), "data").unwrap();
        fs::write(tmp.path().join(LOCK_FILE), "").unwrap();

        clean_node_state(tmp.path()).unwrap();

        assert!(tmp.path().join("snapshot.rolling").exists());
    }
}
