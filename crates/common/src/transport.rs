use std::path::Path;
use std::sync::Arc;

use crate::error::{TransportError, VfsError};
use crate::options::MountOptions;

/// Kernel-facing mount primitive
///
/// All methods block the calling thread. The lifecycle calls them from the
/// blocking pool, never from an async worker.
pub trait Transport: Send + Sync + 'static {
    /// Handle to an established mount, closed exactly once
    type Connection: Send + 'static;
    /// Filesystem served through this transport
    type Vfs: Vfs;

    /// Attach a mount at `mount_point`, returning once it is ready or rejected
    fn mount(
        &self,
        mount_point: &Path,
        options: &MountOptions,
    ) -> Result<Self::Connection, TransportError>;

    /// Serve requests until the mount goes away
    fn serve(
        &self,
        connection: &mut Self::Connection,
        vfs: Arc<Self::Vfs>,
    ) -> Result<(), TransportError>;

    /// Release the connection after serving has stopped
    fn close(&self, connection: Self::Connection) -> Result<(), TransportError>;

    /// Detach whatever is mounted at `mount_point`
    fn unmount(&self, mount_point: &Path) -> Result<(), TransportError>;
}

/// The slice of a virtual filesystem the lifecycle controller needs
pub trait Vfs: Send + Sync + 'static {
    type Root: RootNode;

    /// Name used to identify the filesystem to the kernel
    fn device_name(&self) -> String;

    fn root(&self) -> Result<Self::Root, VfsError>;
}

/// Root directory of a [`Vfs`]
pub trait RootNode {
    /// Drop every cached entry so the next access refetches it
    fn forget_all(&self);
}
