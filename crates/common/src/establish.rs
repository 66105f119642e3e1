//! Mount establishment
//!
//! Mounting is a blocking kernel round-trip, so it runs on the blocking
//! pool while the calling task waits for readiness or rejection.

use std::path::Path;
use std::sync::Arc;

use crate::error::TransportError;
use crate::options::MountOptions;
use crate::transport::Transport;

/// Mount through `transport` at `mount_point`
///
/// Failures are returned as-is; retrying is left to the operator.
pub async fn establish<T: Transport>(
    transport: &Arc<T>,
    mount_point: &Path,
    options: MountOptions,
) -> Result<T::Connection, TransportError> {
    tracing::debug!(mount_point = %mount_point.display(), %options, "mounting");

    let transport = Arc::clone(transport);
    let mount_point = mount_point.to_path_buf();
    tokio::task::spawn_blocking(move || transport.mount(&mount_point, &options))
        .await
        .map_err(|e| TransportError::Protocol(format!("mount task failed: {}", e)))?
}
