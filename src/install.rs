//! Persisting generated files
//!
//! Configs hold the interface private key, so they are created owner-only
//! from the start rather than tightened after the write.

use std::io::Write;
use std::path::Path;

use crate::error::InstallError;

/// Owner read/write, for interface configs
pub const MODE_OWNER_ONLY: u32 = 0o600;

/// Owner read/write, world readable, for service configuration such as jails
pub const MODE_PUBLIC_READ: u32 = 0o644;

/// Mode for directories the installer has to create
const MODE_PRIVATE_DIR: u32 = 0o700;

/// Destination for generated files
pub trait InstallTarget {
    /// Write `contents` to `path` with the given Unix mode
    fn persist(&self, path: &Path, contents: &str, mode: u32) -> Result<(), InstallError>;

    /// Whether something is already installed at `path`
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Writes to the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FileInstallTarget;

impl InstallTarget for FileInstallTarget {
    fn persist(&self, path: &Path, contents: &str, mode: u32) -> Result<(), InstallError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent)?;
        }

        let write_err = |source| InstallError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode);
        }

        let mut file = options.open(path).map_err(write_err)?;

        // The creation mode only applies to new files; tighten existing ones
        // before any secret is written into them
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(mode))
                .map_err(|source| InstallError::Permissions {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        #[cfg(not(unix))]
        let _ = mode;

        file.write_all(contents.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;

        tracing::info!("Installed {:?} (mode {:o})", path, mode);
        Ok(())
    }
}

/// Logs what would be written and leaves the filesystem alone
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunInstallTarget;

impl InstallTarget for DryRunInstallTarget {
    fn persist(&self, path: &Path, contents: &str, mode: u32) -> Result<(), InstallError> {
        tracing::info!(
            "[dry-run] would write {} bytes to {:?} (mode {:o})",
            contents.len(),
            path,
            mode
        );
        Ok(())
    }
}

fn ensure_dir(dir: &Path) -> Result<(), InstallError> {
    if dir.exists() {
        return Ok(());
    }

    std::fs::create_dir_all(dir).map_err(|source| InstallError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(MODE_PRIVATE_DIR))
            .map_err(|source| InstallError::Permissions {
                path: dir.to_path_buf(),
                source,
            })?;
    }

    tracing::debug!("Created directory {:?}", dir);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_persist_writes_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wg0.conf");

        FileInstallTarget
            .persist(&path, "[Interface]\nPrivateKey = K\n", MODE_OWNER_ONLY)
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "[Interface]\nPrivateKey = K\n"
        );
        assert!(FileInstallTarget.exists(&path));
    }

    #[test]
    fn test_persist_creates_private_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wireguard").join("wg0.conf");

        FileInstallTarget.persist(&path, "x\n", MODE_OWNER_ONLY).unwrap();
        assert!(path.exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(path.parent().unwrap())
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o700);
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_persist_tightens_existing_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wg0.conf");
        std::fs::write(&path, "old contents that are longer\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o666)).unwrap();

        FileInstallTarget.persist(&path, "new\n", MODE_OWNER_ONLY).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new\n");
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wg0.conf");

        DryRunInstallTarget.persist(&path, "x\n", MODE_OWNER_ONLY).unwrap();
        assert!(!path.exists());
        assert!(!DryRunInstallTarget.exists(&path));
    }
}
