//! FUSE [`Transport`] built on `fuser::Session`
//!
//! Option tokens map onto `fuser` mount options where the platform has an
//! equivalent; read-ahead and writeback caching are negotiated in the init
//! handshake instead. Unmounting shells out to `fusermount3`/`fusermount`
//! (`umount` on macOS) so a busy mount is reported rather than swallowed.

use std::path::Path;
use std::process::Command;
use std::sync::{Arc, OnceLock};

use common::{MountOption, MountOptions, Transport, TransportError};

use super::adapter::{FuseAdapter, KernelSettings, VfsSlot};
use super::mirror_fs::MirrorFs;

#[cfg(target_os = "macos")]
const UNMOUNT_COMMANDS: &[(&str, &[&str])] = &[("umount", &[])];
#[cfg(not(target_os = "macos"))]
const UNMOUNT_COMMANDS: &[(&str, &[&str])] = &[("fusermount3", &["-u"]), ("fusermount", &["-u"])];

/// An established FUSE session awaiting (or running) its serve loop
pub struct FuseConnection {
    session: fuser::Session<FuseAdapter>,
    vfs: VfsSlot,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FuseTransport;

impl FuseTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }
}

/// `fuser` options for the given tokens, in order
///
/// Tokens with no `fuser` equivalent on this platform are skipped.
pub fn fuser_options(options: &MountOptions) -> Vec<fuser::MountOption> {
    options.iter().filter_map(fuser_option).collect()
}

fn fuser_option(option: &MountOption) -> Option<fuser::MountOption> {
    let mapped = match option {
        MountOption::Subtype(name) => Some(fuser::MountOption::Subtype(name.clone())),
        MountOption::FsName(name) => Some(fuser::MountOption::FSName(name.clone())),
        MountOption::AllowOther => Some(fuser::MountOption::AllowOther),
        MountOption::AllowRoot => Some(fuser::MountOption::AllowRoot),
        MountOption::DefaultPermissions => Some(fuser::MountOption::DefaultPermissions),
        MountOption::ReadOnly => Some(fuser::MountOption::RO),
        #[cfg(target_os = "macos")]
        MountOption::VolumeName(_) | MountOption::NoAppleDouble | MountOption::NoAppleXattr => {
            Some(fuser::MountOption::CUSTOM(option.to_string()))
        }
        // negotiated during init, see KernelSettings
        MountOption::MaxReadAhead(_) | MountOption::WritebackCache => return None,
        _ => None,
    };

    if mapped.is_none() {
        tracing::debug!(option = %option, "mount option not supported on this platform, dropped");
    }
    mapped
}

/// Settings the adapter applies in the init handshake
pub fn kernel_settings(options: &MountOptions) -> KernelSettings {
    let max_read_ahead = options
        .iter()
        .find_map(|option| match option {
            MountOption::MaxReadAhead(bytes) => Some(*bytes),
            _ => None,
        })
        .unwrap_or(common::options::DEFAULT_MAX_READ_AHEAD);

    KernelSettings {
        max_read_ahead,
        writeback_cache: options.contains(&MountOption::WritebackCache),
        debug: options.debug(),
    }
}

fn check_mount_point(mount_point: &Path, options: &MountOptions) -> Result<(), TransportError> {
    let meta = std::fs::metadata(mount_point)
        .map_err(|e| TransportError::from_mount_io(e, mount_point))?;
    if !meta.is_dir() {
        return Err(TransportError::InvalidMountPoint(mount_point.to_path_buf()));
    }

    if !options.contains(&MountOption::AllowNonEmpty) {
        let mut entries = std::fs::read_dir(mount_point)
            .map_err(|e| TransportError::from_mount_io(e, mount_point))?;
        if entries.next().is_some() {
            return Err(TransportError::Io(std::io::Error::other(format!(
                "mount point {} is not empty, use --allow-non-empty to mount anyway",
                mount_point.display()
            ))));
        }
    }
    Ok(())
}

/// Classify a failed unmount command from its stderr
///
/// `None` means the mount was already gone.
pub fn classify_unmount_failure(stderr: &str) -> Option<TransportError> {
    let lower = stderr.to_lowercase();
    if lower.contains("not mounted") || lower.contains("not found in") {
        None
    } else if lower.contains("busy") {
        Some(TransportError::Busy)
    } else if lower.contains("permission denied") || lower.contains("not permitted") {
        Some(TransportError::PermissionDenied)
    } else {
        Some(TransportError::Protocol(stderr.trim().to_string()))
    }
}

impl Transport for FuseTransport {
    type Connection = FuseConnection;
    type Vfs = MirrorFs;

    fn mount(
        &self,
        mount_point: &Path,
        options: &MountOptions,
    ) -> Result<FuseConnection, TransportError> {
        check_mount_point(mount_point, options)?;

        let fuse_options = fuser_options(options);
        tracing::info!(
            mount_point = %mount_point.display(),
            options = ?fuse_options,
            "mounting"
        );

        let vfs: VfsSlot = Arc::new(OnceLock::new());
        let adapter = FuseAdapter::new(Arc::clone(&vfs), kernel_settings(options));
        let session = fuser::Session::new(adapter, mount_point, &fuse_options)
            .map_err(|e| TransportError::from_mount_io(e, mount_point))?;

        Ok(FuseConnection { session, vfs })
    }

    fn serve(
        &self,
        connection: &mut FuseConnection,
        vfs: Arc<MirrorFs>,
    ) -> Result<(), TransportError> {
        if connection.vfs.set(vfs).is_err() {
            return Err(TransportError::Protocol(
                "connection is already being served".to_string(),
            ));
        }
        connection.session.run()?;
        Ok(())
    }

    fn close(&self, connection: FuseConnection) -> Result<(), TransportError> {
        drop(connection);
        Ok(())
    }

    fn unmount(&self, mount_point: &Path) -> Result<(), TransportError> {
        for (program, args) in UNMOUNT_COMMANDS {
            let output = match Command::new(program).args(*args).arg(mount_point).output() {
                Ok(output) => output,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(program, "unmount helper not installed");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            if output.status.success() {
                tracing::debug!(program, mount_point = %mount_point.display(), "unmounted");
                return Ok(());
            }

            let stderr = String::from_utf8_lossy(&output.stderr);
            return match classify_unmount_failure(&stderr) {
                None => {
                    tracing::debug!(
                        mount_point = %mount_point.display(),
                        "already unmounted"
                    );
                    Ok(())
                }
                Some(err) => Err(err),
            };
        }

        Err(TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no unmount helper found (tried fusermount3, fusermount, umount)",
        )))
    }
}
