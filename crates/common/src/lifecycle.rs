//! Mount lifecycle controller
//!
//! Drives a single mount from establishment to release:
//!
//! ```text
//! Mounting --mount ok--> Serving --interrupt--> Unmounting --> Done | Failed
//!     |                    |  ^
//!     |                    |  +-- cache clear (forget_all, keep serving)
//!     |                    +--serve loop ends--> Done | Failed
//!     +--mount fails--> Failed
//! ```
//!
//! While serving, the controller waits on three sources at once: the serve
//! handle, interrupts and cache clears. There is no priority between them;
//! when several are ready `tokio::select!` picks one at random. Requests of
//! the same kind are handled in the order they arrived.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{LifecycleError, TransportError};
use crate::establish::establish;
use crate::events::LifecycleEvents;
use crate::options::{MountConfig, MountOptions};
use crate::serve::{supervise, ServeHandle, ServeResult};
use crate::transport::{RootNode, Transport, Vfs};

/// How long to wait for the serve loop after a successful unmount
pub const DEFAULT_UNMOUNT_GRACE: Duration = Duration::from_secs(10);

/// Observable controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Mounting,
    Serving,
    Unmounting,
    /// Finished cleanly
    Done,
    /// Finished with an error
    Failed,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Mounting => "mounting",
            LifecycleState::Serving => "serving",
            LifecycleState::Unmounting => "unmounting",
            LifecycleState::Done => "done",
            LifecycleState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Done | LifecycleState::Failed)
    }
}

impl std::str::FromStr for LifecycleState {
    type Err = UnknownState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "mounting" => LifecycleState::Mounting,
            "serving" => LifecycleState::Serving,
            "unmounting" => LifecycleState::Unmounting,
            "done" => LifecycleState::Done,
            "failed" => LifecycleState::Failed,
            other => return Err(UnknownState(other.to_string())),
        })
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown lifecycle state: {0}")]
pub struct UnknownState(pub String);

enum Exit {
    Served(ServeResult),
    Interrupted,
}

/// Owns one mount from start to finish
pub struct MountLifecycle<T: Transport> {
    transport: Arc<T>,
    vfs: Arc<T::Vfs>,
    mount_point: PathBuf,
    config: MountConfig,
    unmount_grace: Duration,
    state: watch::Sender<LifecycleState>,
}

impl<T: Transport> MountLifecycle<T> {
    pub fn new(
        transport: Arc<T>,
        vfs: Arc<T::Vfs>,
        mount_point: impl Into<PathBuf>,
        config: MountConfig,
    ) -> Self {
        let (state, _) = watch::channel(LifecycleState::Mounting);
        Self {
            transport,
            vfs,
            mount_point: mount_point.into(),
            config,
            unmount_grace: DEFAULT_UNMOUNT_GRACE,
            state,
        }
    }

    /// Bound the wait for the serve loop once an unmount has succeeded
    pub fn with_unmount_grace(mut self, grace: Duration) -> Self {
        self.unmount_grace = grace;
        self
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Mount, serve until interrupted or released, then report the outcome
    pub async fn run(self, events: LifecycleEvents) -> Result<(), LifecycleError> {
        let result = self.drive(&events).await;
        self.set_state(if result.is_ok() {
            LifecycleState::Done
        } else {
            LifecycleState::Failed
        });
        result
    }

    async fn drive(&self, events: &LifecycleEvents) -> Result<(), LifecycleError> {
        self.set_state(LifecycleState::Mounting);

        let options = MountOptions::build(&self.config, &self.vfs.device_name());
        let connection = establish(&self.transport, &self.mount_point, options)
            .await
            .map_err(|source| LifecycleError::Mount {
                mount_point: self.mount_point.clone(),
                source,
            })?;

        let mut serving = supervise(
            Arc::clone(&self.transport),
            connection,
            Arc::clone(&self.vfs),
        );
        self.set_state(LifecycleState::Serving);

        let exit = loop {
            tokio::select! {
                result = &mut serving => break Exit::Served(result),
                Ok(()) = events.interrupts.recv_async() => break Exit::Interrupted,
                Ok(()) = events.cache_clears.recv_async() => self.clear_cache(),
            }
        };

        match exit {
            Exit::Served(result) => {
                tracing::info!(
                    mount_point = %self.mount_point.display(),
                    "serve loop ended, mount released outside the controller"
                );
                result.map_err(|source| self.serve_error(source))
            }
            Exit::Interrupted => {
                tracing::info!(mount_point = %self.mount_point.display(), "interrupted, unmounting");
                self.unmount(serving).await
            }
        }
    }

    async fn unmount(&self, serving: ServeHandle) -> Result<(), LifecycleError> {
        self.set_state(LifecycleState::Unmounting);

        let transport = Arc::clone(&self.transport);
        let mount_point = self.mount_point.clone();
        let unmounted = match tokio::task::spawn_blocking(move || transport.unmount(&mount_point))
            .await
        {
            Ok(result) => result,
            Err(e) => Err(TransportError::Protocol(format!(
                "unmount task failed: {}",
                e
            ))),
        };

        if let Err(source) = unmounted {
            return Err(LifecycleError::Unmount {
                mount_point: self.mount_point.clone(),
                source,
            });
        }

        match tokio::time::timeout(self.unmount_grace, serving).await {
            Ok(result) => result.map_err(|source| self.serve_error(source)),
            Err(_) => {
                tracing::warn!(
                    mount_point = %self.mount_point.display(),
                    grace = ?self.unmount_grace,
                    "unmounted but serve loop has not returned"
                );
                Ok(())
            }
        }
    }

    fn clear_cache(&self) {
        match self.vfs.root() {
            Ok(root) => {
                root.forget_all();
                tracing::info!(mount_point = %self.mount_point.display(), "cache cleared");
            }
            Err(e) => {
                tracing::error!(
                    mount_point = %self.mount_point.display(),
                    error = %e,
                    "error reading root, cache not cleared"
                );
            }
        }
    }

    fn serve_error(&self, source: TransportError) -> LifecycleError {
        LifecycleError::Serve {
            mount_point: self.mount_point.clone(),
            source,
        }
    }

    fn set_state(&self, state: LifecycleState) {
        tracing::debug!(mount_point = %self.mount_point.display(), %state, "lifecycle state");
        self.state.send_replace(state);
    }
}
