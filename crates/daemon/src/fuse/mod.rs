//! FUSE transport and the read-only mirror filesystem
//!
//! # Architecture
//!
//! - `FuseTransport`: mounts, serves and unmounts through `fuser`
//! - `FuseAdapter`: `fuser::Filesystem` glue forwarding to `MirrorFs`
//! - `MirrorFs`: read-only view of a local directory
//! - `InodeTable`: Bidirectional inode ↔ path mapping
//! - `FileCache`: TTL cache that a SIGHUP clears

mod adapter;
mod cache;
mod inode_table;
mod mirror_fs;
mod transport;

pub use adapter::{FuseAdapter, KernelSettings};
pub use cache::{CacheStats, FileCache, FileCacheConfig, NodeKind};
pub use inode_table::InodeTable;
pub use mirror_fs::{DirEntry, MirrorError, MirrorFs, MirrorRoot, Node};
pub use transport::{
    classify_unmount_failure, fuser_options, kernel_settings, FuseConnection, FuseTransport,
};
