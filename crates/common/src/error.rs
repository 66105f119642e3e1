//! Error types shared by the mount lifecycle
//!
//! Collaborators report [`TransportError`] and [`VfsError`]. The controller
//! wraps terminal failures in [`LifecycleError`], whose message carries the
//! phase that failed (`failed to mount ...` / `failed to unmount ...`).

use std::path::PathBuf;

/// Errors reported by a [`Transport`](crate::Transport)
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The mount point is already in use by another mount
    #[error("already mounted")]
    AlreadyMounted,
    /// The mount point does not exist or is not a directory
    #[error("invalid mount point: {0}")]
    InvalidMountPoint(PathBuf),
    /// The caller lacks permission to mount or unmount
    #[error("permission denied")]
    PermissionDenied,
    /// The mount is still in use and cannot be released
    #[error("resource busy")]
    Busy,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The transport violated its own protocol or gave up serving
    #[error("protocol error: {0}")]
    Protocol(String),
    /// The background serve task ended without producing an outcome
    #[error("serve task failed: {0}")]
    ServeTask(String),
}

impl TransportError {
    /// Classify an I/O error raised while mounting `mount_point`
    pub fn from_mount_io(err: std::io::Error, mount_point: impl Into<PathBuf>) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::NotFound | ErrorKind::NotADirectory => {
                TransportError::InvalidMountPoint(mount_point.into())
            }
            ErrorKind::PermissionDenied => TransportError::PermissionDenied,
            ErrorKind::AlreadyExists | ErrorKind::ResourceBusy => TransportError::AlreadyMounted,
            _ => TransportError::Io(err),
        }
    }
}

/// Errors reported by a [`Vfs`](crate::Vfs)
#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    #[error("root unavailable: {0}")]
    RootUnavailable(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal outcome of a failed mount lifecycle
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The transport refused to establish the mount; nothing was served
    #[error("failed to mount {}: {source}", mount_point.display())]
    Mount {
        mount_point: PathBuf,
        #[source]
        source: TransportError,
    },
    /// The serve loop ended abnormally
    #[error("failed to unmount {}: {source}", mount_point.display())]
    Serve {
        mount_point: PathBuf,
        #[source]
        source: TransportError,
    },
    /// The explicitly requested unmount failed
    #[error("failed to unmount {}: {source}", mount_point.display())]
    Unmount {
        mount_point: PathBuf,
        #[source]
        source: TransportError,
    },
}

impl LifecycleError {
    /// The underlying collaborator error
    pub fn transport_error(&self) -> &TransportError {
        match self {
            LifecycleError::Mount { source, .. }
            | LifecycleError::Serve { source, .. }
            | LifecycleError::Unmount { source, .. } => source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_tags() {
        let err = LifecycleError::Mount {
            mount_point: PathBuf::from("/mnt/x"),
            source: TransportError::AlreadyMounted,
        };
        assert_eq!(err.to_string(), "failed to mount /mnt/x: already mounted");

        let err = LifecycleError::Unmount {
            mount_point: PathBuf::from("/mnt/x"),
            source: TransportError::Busy,
        };
        assert_eq!(err.to_string(), "failed to unmount /mnt/x: resource busy");

        let err = LifecycleError::Serve {
            mount_point: PathBuf::from("/mnt/x"),
            source: TransportError::Protocol("short read".to_string()),
        };
        assert!(err.to_string().starts_with("failed to unmount /mnt/x"));
    }

    #[test]
    fn test_mount_io_classification() {
        let err = std::io::Error::from(std::io::ErrorKind::NotFound);
        assert!(matches!(
            TransportError::from_mount_io(err, "/nope"),
            TransportError::InvalidMountPoint(_)
        ));

        let err = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        assert!(matches!(
            TransportError::from_mount_io(err, "/mnt"),
            TransportError::PermissionDenied
        ));

        let err = std::io::Error::from(std::io::ErrorKind::Interrupted);
        assert!(matches!(
            TransportError::from_mount_io(err, "/mnt"),
            TransportError::Io(_)
        ));
    }
}
