//! `fuser::Filesystem` glue for [`MirrorFs`]
//!
//! The session is created at mount time but the filesystem is only handed
//! over when serving starts, so the adapter reads it from a shared slot.
//! The kernel sends nothing before `Session::run`, so the slot is always
//! filled by the time a request arrives.

use std::ffi::OsStr;
use std::sync::{Arc, OnceLock};
use std::time::UNIX_EPOCH;

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request,
};

use super::cache::{CachedAttr, NodeKind};
use super::mirror_fs::{MirrorFs, Node};

/// Filesystem slot filled when serving starts
pub type VfsSlot = Arc<OnceLock<Arc<MirrorFs>>>;

const BLOCK_SIZE: u32 = 4096;

/// Settings applied during the FUSE init handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelSettings {
    pub max_read_ahead: u32,
    pub writeback_cache: bool,
    /// Log every request under the `rmount::fuse` target
    pub debug: bool,
}

pub struct FuseAdapter {
    vfs: VfsSlot,
    settings: KernelSettings,
}

impl FuseAdapter {
    pub fn new(vfs: VfsSlot, settings: KernelSettings) -> Self {
        Self { vfs, settings }
    }

    fn vfs(&self) -> Option<&Arc<MirrorFs>> {
        self.vfs.get()
    }

    fn trace(&self, op: &'static str, ino: u64) {
        if self.settings.debug {
            tracing::debug!(target: "rmount::fuse", op, ino, "request");
        }
    }
}

fn file_type(kind: NodeKind) -> FileType {
    match kind {
        NodeKind::Directory => FileType::Directory,
        NodeKind::File => FileType::RegularFile,
        NodeKind::Symlink => FileType::Symlink,
    }
}

fn to_file_attr(ino: u64, attr: &CachedAttr) -> FileAttr {
    FileAttr {
        ino,
        size: attr.size,
        blocks: attr.size.div_ceil(512),
        atime: attr.mtime,
        mtime: attr.mtime,
        ctime: attr.ctime,
        crtime: UNIX_EPOCH,
        kind: file_type(attr.kind),
        perm: attr.perm,
        nlink: attr.nlink,
        uid: attr.uid,
        gid: attr.gid,
        rdev: 0,
        blksize: BLOCK_SIZE,
        flags: 0,
    }
}

fn reply_node(fs: &MirrorFs, node: &Node, reply: ReplyEntry) {
    reply.entry(&fs.ttl(), &to_file_attr(node.ino, &node.attr), 0);
}

impl Filesystem for FuseAdapter {
    fn init(
        &mut self,
        _req: &Request<'_>,
        config: &mut KernelConfig,
    ) -> Result<(), libc::c_int> {
        if let Err(nearest) = config.set_max_readahead(self.settings.max_read_ahead) {
            tracing::debug!(
                requested = self.settings.max_read_ahead,
                nearest,
                "kernel capped max_readahead"
            );
            let _ = config.set_max_readahead(nearest);
        }

        if self.settings.writeback_cache {
            if let Err(unsupported) = config.add_capabilities(fuser::consts::FUSE_WRITEBACK_CACHE)
            {
                tracing::warn!(unsupported, "kernel does not support writeback cache");
            }
        }

        tracing::debug!(settings = ?self.settings, "fuse session initialized");
        Ok(())
    }

    fn destroy(&mut self) {
        tracing::debug!("fuse session destroyed");
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        self.trace("lookup", parent);
        let Some(fs) = self.vfs() else {
            return reply.error(libc::EIO);
        };
        match fs.lookup(parent, name) {
            Ok(node) => reply_node(fs, &node, reply),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        self.trace("getattr", ino);
        let Some(fs) = self.vfs() else {
            return reply.error(libc::EIO);
        };
        match fs.getattr(ino) {
            Ok(node) => reply.attr(&fs.ttl(), &to_file_attr(node.ino, &node.attr)),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        self.trace("readlink", ino);
        let Some(fs) = self.vfs() else {
            return reply.error(libc::EIO);
        };
        match fs.readlink(ino) {
            Ok(target) => reply.data(&target),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, flags: i32, reply: ReplyOpen) {
        self.trace("open", ino);
        if flags & libc::O_ACCMODE != libc::O_RDONLY {
            return reply.error(libc::EROFS);
        }
        reply.opened(0, 0);
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        self.trace("read", ino);
        let Some(fs) = self.vfs() else {
            return reply.error(libc::EIO);
        };
        let Ok(offset) = u64::try_from(offset) else {
            return reply.error(libc::EINVAL);
        };
        match fs.read(ino, offset, size) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        self.trace("readdir", ino);
        let Some(fs) = self.vfs() else {
            return reply.error(libc::EIO);
        };
        let entries = match fs.readdir(ino) {
            Ok(entries) => entries,
            Err(e) => return reply.error(e.errno()),
        };

        let skip = usize::try_from(offset).unwrap_or(0);
        for (i, entry) in entries.iter().enumerate().skip(skip) {
            // offset of the *next* entry
            if reply.add(entry.ino, (i + 1) as i64, file_type(entry.kind), &entry.name) {
                break;
            }
        }
        reply.ok();
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        _offset: i64,
        _data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        self.trace("write", ino);
        reply.error(libc::EROFS);
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        _name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        self.trace("mkdir", parent);
        reply.error(libc::EROFS);
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        _name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        self.trace("create", parent);
        reply.error(libc::EROFS);
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, _name: &OsStr, reply: ReplyEmpty) {
        self.trace("unlink", parent);
        reply.error(libc::EROFS);
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, _name: &OsStr, reply: ReplyEmpty) {
        self.trace("rmdir", parent);
        reply.error(libc::EROFS);
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        _name: &OsStr,
        _newparent: u64,
        _newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        self.trace("rename", parent);
        reply.error(libc::EROFS);
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    #[test]
    fn test_file_attr_conversion() {
        let mtime = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let attr = CachedAttr {
            size: 1025,
            kind: NodeKind::File,
            perm: 0o640,
            nlink: 1,
            uid: 1000,
            gid: 100,
            mtime,
            ctime: SystemTime::UNIX_EPOCH,
        };

        let converted = to_file_attr(42, &attr);
        assert_eq!(converted.ino, 42);
        assert_eq!(converted.kind, FileType::RegularFile);
        assert_eq!(converted.blocks, 3);
        assert_eq!(converted.perm, 0o640);
        assert_eq!(converted.mtime, mtime);
        assert_eq!(converted.uid, 1000);
    }

    #[test]
    fn test_kinds_map_to_fuse_types() {
        assert_eq!(file_type(NodeKind::Directory), FileType::Directory);
        assert_eq!(file_type(NodeKind::Symlink), FileType::Symlink);
    }
}
