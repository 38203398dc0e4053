//! # Directory Provisioner
//!
//! Produces a data directory that is either newly created or was explicitly
//! wiped with the operator's consent, then hands it to the invoking user.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{DirectoryConfig, Ownership};
use crate::domain::ProvisionError;
use crate::ports::{DirectoryChoice, Prompter};

/// Allocates the node data directory.
pub struct DirectoryProvisioner {
    config: DirectoryConfig,
    prompter: Arc<dyn Prompter>,
}

impl DirectoryProvisioner {
    /// Create a provisioner.
    pub fn new(config: DirectoryConfig, prompter: Arc<dyn Prompter>) -> Self {
        Self { config, prompter }
    }

    /// Ask for a directory until one is usable.
    ///
    /// An existing path is deleted only after confirmation. Declining the
    /// deletion re-asks for a directory, or aborts if the operator does not
    /// want to pick another one. A failed deletion is fatal.
    pub async fn provision(&self) -> Result<PathBuf, ProvisionError> {
        let default = DirectoryChoice {
            parent: self.config.default_parent.clone(),
            name: self.config.default_name.clone(),
        };

        loop {
            let choice = self.prompter.data_directory(&default).await?;
            if choice.name.trim().is_empty() {
                warn!("[directory] Directory name must not be empty");
                continue;
            }

            let path = choice.path();
            if path.exists() {
                if self.prompter.confirm_delete(&path).await? {
                    info!(path = %path.display(), "[directory] Removing existing directory");
                    remove_existing(&path)?;
                } else if self.prompter.choose_another_directory().await? {
                    continue;
                } else {
                    return Err(ProvisionError::Aborted);
                }
            }

            std::fs::create_dir_all(&path).map_err(|source| ProvisionError::DirectoryCreate {
                path: path.clone(),
                source,
            })?;

            if let Some(owner) = self.config.owner {
                set_owner_recursive(&path, owner)?;
            }

            info!(path = %path.display(), "[directory] Data directory ready");
            return Ok(path);
        }
    }
}

fn remove_existing(path: &Path) -> Result<(), ProvisionError> {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    result.map_err(|source| ProvisionError::DirectoryDelete {
        path: path.to_path_buf(),
        source,
    })
}

/// `chown` `path` and everything below it, without following symlinks.
pub fn set_owner_recursive(path: &Path, owner: Ownership) -> Result<(), ProvisionError> {
    let ownership_err = |source| ProvisionError::Ownership {
        path: path.to_path_buf(),
        source,
    };

    std::os::unix::fs::lchown(path, Some(owner.uid), Some(owner.gid)).map_err(ownership_err)?;

    let metadata = std::fs::symlink_metadata(path).map_err(ownership_err)?;
    if metadata.is_dir() {
        for entry in std::fs::read_dir(path).map_err(ownership_err)? {
            let entry = entry.map_err(ownership_err)?;
            set_owner_recursive(&entry.path(), owner)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedPrompter;
    use std::os::unix::fs::MetadataExt;

    fn provisioner(parent: &Path, prompter: Arc<ScriptedPrompter>) -> DirectoryProvisioner {
        let config = DirectoryConfig {
            default_parent: parent.to_path_buf(),
            default_name: "node".to_string(),
            owner: None,
        };
        DirectoryProvisioner::new(config, prompter)
    }

    #[tokio::test]
    async fn test_fresh_directory_is_created_without_questions() {
        let tmp = tempfile::tempdir().unwrap();
        let prompter = Arc::new(ScriptedPrompter::new().with_directory(tmp.path(), "node"));

        let path = provisioner(tmp.path(), Arc::clone(&prompter))
            .provision()
            .await
            .unwrap();

        assert_eq!(path, tmp.path().join("node"));
        assert!(path.is_dir());
        assert_eq!(prompter.times_asked("confirm_delete"), 0);
    }

    #[tokio::test]
    async fn test_confirm_delete_yields_empty_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let existing = tmp.path().join("node");
        std::fs::create_dir_all(existing.join("store")).unwrap();
        std::fs::write(existing.join("config.json"), "{}").unwrap();

        let prompter = Arc::new(
            ScriptedPrompter::new()
                .with_directory(tmp.path(), "node")
                .with_delete_answer(true),
        );

        let path = provisioner(tmp.path(), prompter).provision().await.unwrap();

        assert!(path.is_dir());
        assert_eq!(std::fs::read_dir(&path).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_decline_delete_then_pick_another() {
        let tmp = tempfile::tempdir().unwrap();
        let existing = tmp.path().join("node");
        std::fs::create_dir_all(&existing).unwrap();
        std::fs::write(existing.join("keep.txt"), "keep").unwrap();

        let prompter = Arc::new(
            ScriptedPrompter::new()
                .with_directory(tmp.path(), "node")
                .with_delete_answer(false)
                .with_another_directory_answer(true)
                .with_directory(tmp.path(), "node-2"),
        );

        let path = provisioner(tmp.path(), Arc::clone(&prompter))
            .provision()
            .await
            .unwrap();

        assert_eq!(path, tmp.path().join("node-2"));
        assert!(existing.join("keep.txt").exists());
        assert_eq!(prompter.times_asked("data_directory"), 2);
    }

    #[tokio::test]
    async fn test_decline_delete_and_decline_another_aborts() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("node")).unwrap();

        let prompter = Arc::new(
            ScriptedPrompter::new()
                .with_directory(tmp.path(), "node")
                .with_delete_answer(false)
                .with_another_directory_answer(false),
        );

        let result = provisioner(tmp.path(), prompter).provision().await;
        assert!(matches!(result, Err(ProvisionError::Aborted)));
        assert!(tmp.path().join("node").exists());
    }

    #[tokio::test]
    async fn test_empty_name_is_asked_again() {
        let tmp = tempfile::tempdir().unwrap();
        let prompter = Arc::new(
            ScriptedPrompter::new()
                .with_directory(tmp.path(), "  ")
                .with_directory(tmp.path(), "node"),
        );

        let path = provisioner(tmp.path(), prompter).provision().await.unwrap();
        assert_eq!(path, tmp.path().join("node"));
    }

    #[test]
    fn test_failed_removal_is_a_delete_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("gone");

        match remove_existing(&missing) {
            Err(ProvisionError::DirectoryDelete { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected DirectoryDelete, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_undeletable_directory_is_fatal() {
        use std::os::unix::fs::PermissionsExt;

        // Root ignores directory permissions.
        if nix::unistd::geteuid().is_root() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let locked = tmp.path().join("locked");
        std::fs::create_dir_all(locked.join("node")).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();
        let prompter = Arc::new(
            ScriptedPrompter::new()
                .with_directory(&locked, "node")
                .with_delete_answer(true),
        );

        let result = provisioner(&locked, prompter.clone()).provision().await;

        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(matches!(result, Err(ProvisionError::DirectoryDelete { .. })));
        assert_eq!(prompter.times_asked("data_directory"), 1);
        assert!(locked.join("node").exists());
    }

    #[tokio::test]
    async fn test_ownership_applied_to_current_user() {
        let tmp = tempfile::tempdir().unwrap();
        let owner = Ownership {
            uid: nix::unistd::getuid().as_raw(),
            gid: nix::unistd::getgid().as_raw(),
        };
        let config = DirectoryConfig {
            default_parent: tmp.path().to_path_buf(),
            default_name: "node".to_string(),
            owner: Some(owner),
        };
        let prompter = Arc::new(ScriptedPrompter::new().with_directory(tmp.path(), "node"));

        let path = DirectoryProvisioner::new(config, prompter)
            .provision()
            .await
            .unwrap();

        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.uid(), owner.uid);
        assert_eq!(meta.gid(), owner.gid);
    }
}
