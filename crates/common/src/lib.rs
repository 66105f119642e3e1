//! Mount lifecycle for rmount
//!
//! Mounts a virtual filesystem through a [`Transport`], serves it in the
//! background and coordinates the shutdown path between three racing
//! sources: the serve loop ending on its own, an operator interrupt and an
//! operator cache-clear request.
//!
//! The pieces, leaves first:
//!
//! - [`MountOptions::build`]: configuration to transport option tokens
//! - [`establish`]: blocking mount, ready or rejected
//! - [`supervise`]: background serve loop with a one-shot outcome
//! - [`MountLifecycle`]: the state machine tying them together

pub mod error;
pub mod establish;
pub mod events;
pub mod lifecycle;
pub mod options;
pub mod serve;
pub mod transport;

pub use error::{LifecycleError, TransportError, VfsError};
pub use establish::establish;
pub use events::{EventSender, EventsClosed, LifecycleEvents, TerminationRequest};
pub use lifecycle::{LifecycleState, MountLifecycle, DEFAULT_UNMOUNT_GRACE};
pub use options::{MountConfig, MountOption, MountOptions};
pub use serve::{supervise, ServeHandle, ServeResult};
pub use transport::{RootNode, Transport, Vfs};
