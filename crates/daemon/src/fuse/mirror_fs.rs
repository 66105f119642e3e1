//! Read-only mirror of a local directory
//!
//! Serves the tree under `source` as-is: lookups, attributes, listings,
//! symlink targets and file reads. Answers come from [`FileCache`] while
//! fresh; a cache clear forces the next request back to disk.

use std::ffi::OsStr;
use std::fs::Metadata;
use std::os::unix::fs::{FileExt, MetadataExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;

use common::{RootNode, Vfs, VfsError};

use super::cache::{CachedAttr, CachedDirEntry, FileCache, FileCacheConfig, NodeKind};
use super::inode_table::InodeTable;

/// A resolved node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub ino: u64,
    pub attr: CachedAttr,
}

/// One entry of a directory listing, `.` and `..` included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub ino: u64,
    pub kind: NodeKind,
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("no such file or directory: {0}")]
    NotFound(String),
    #[error("unknown inode {0}")]
    StaleInode(u64),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("is a directory: {0}")]
    IsADirectory(String),
    #[error("not a symlink: {0}")]
    NotASymlink(String),
    #[error("not a regular file: {0}")]
    NotAFile(String),
    #[error("invalid file name")]
    InvalidName,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MirrorError {
    /// Errno reported to the kernel
    pub fn errno(&self) -> i32 {
        match self {
            MirrorError::NotFound(_) | MirrorError::InvalidName => libc::ENOENT,
            MirrorError::StaleInode(_) => libc::ESTALE,
            MirrorError::NotADirectory(_) => libc::ENOTDIR,
            MirrorError::IsADirectory(_) => libc::EISDIR,
            MirrorError::NotASymlink(_) | MirrorError::NotAFile(_) => libc::EINVAL,
            MirrorError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
        }
    }
}

pub struct MirrorFs {
    source: PathBuf,
    device: String,
    inodes: RwLock<InodeTable>,
    cache: FileCache,
}

impl MirrorFs {
    /// Mirror the directory at `source`
    pub fn new(source: impl AsRef<Path>, cache: FileCacheConfig) -> Result<Self, VfsError> {
        let source = std::fs::canonicalize(source.as_ref())?;
        if !source.is_dir() {
            return Err(VfsError::RootUnavailable(format!(
                "{} is not a directory",
                source.display()
            )));
        }

        Ok(Self {
            device: source.display().to_string(),
            source,
            inodes: RwLock::new(InodeTable::new()),
            cache: FileCache::new(cache),
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    /// How long the kernel may keep entries and attributes
    pub fn ttl(&self) -> Duration {
        self.cache.config().kernel_ttl()
    }

    pub fn lookup(&self, parent: u64, name: &OsStr) -> Result<Node, MirrorError> {
        let name = name.to_str().ok_or(MirrorError::InvalidName)?;
        if name.is_empty() || name.contains('/') {
            return Err(MirrorError::InvalidName);
        }

        let parent_path = self.path_of(parent)?;
        let path = InodeTable::child_path(&parent_path, name);
        if self.cache.is_negative(&path) {
            return Err(MirrorError::NotFound(path));
        }

        let attr = match self.attr_of(&path) {
            Ok(attr) => attr,
            Err(MirrorError::NotFound(path)) => {
                self.cache.put_negative(&path);
                return Err(MirrorError::NotFound(path));
            }
            Err(e) => return Err(e),
        };

        let ino = self.inodes.write().get_or_create(&path);
        Ok(Node { ino, attr })
    }

    pub fn getattr(&self, ino: u64) -> Result<Node, MirrorError> {
        let path = self.path_of(ino)?;
        let attr = self.attr_of(&path)?;
        Ok(Node { ino, attr })
    }

    pub fn readdir(&self, ino: u64) -> Result<Vec<DirEntry>, MirrorError> {
        let path = self.path_of(ino)?;
        let listing = match self.cache.get_dir(&path) {
            Some(listing) => listing,
            None => {
                let listing = self.list_dir(&path)?;
                self.cache.put_dir(&path, listing)
            }
        };

        let mut inodes = self.inodes.write();
        let parent = inodes.get_or_create(&InodeTable::parent_path(&path));
        let mut entries = Vec::with_capacity(listing.len() + 2);
        entries.push(DirEntry {
            ino,
            kind: NodeKind::Directory,
            name: ".".to_string(),
        });
        entries.push(DirEntry {
            ino: parent,
            kind: NodeKind::Directory,
            name: "..".to_string(),
        });
        for entry in listing.iter() {
            entries.push(DirEntry {
                ino: inodes.get_or_create(&InodeTable::child_path(&path, &entry.name)),
                kind: entry.kind,
                name: entry.name.clone(),
            });
        }
        Ok(entries)
    }

    pub fn read(&self, ino: u64, offset: u64, size: u32) -> Result<Vec<u8>, MirrorError> {
        let path = self.path_of(ino)?;
        if let Some(data) = self.cache.get_content(&path) {
            return Ok(slice(&data, offset, size));
        }

        let attr = self.attr_of(&path)?;
        match attr.kind {
            NodeKind::Directory => return Err(MirrorError::IsADirectory(path)),
            NodeKind::Symlink => return Err(MirrorError::NotAFile(path)),
            NodeKind::File => {}
        }

        let disk_path = self.disk_path(&path);
        if attr.size <= self.cache.config().max_content_bytes {
            let data = Arc::new(std::fs::read(&disk_path)?);
            self.cache.put_content(&path, Arc::clone(&data));
            return Ok(slice(&data, offset, size));
        }

        let file = std::fs::File::open(&disk_path)?;
        let mut buf = vec![0; size as usize];
        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read_at(&mut buf[filled..], offset + filled as u64)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        buf.truncate(filled);
        Ok(buf)
    }

    pub fn readlink(&self, ino: u64) -> Result<Vec<u8>, MirrorError> {
        use std::os::unix::ffi::OsStrExt;

        let path = self.path_of(ino)?;
        let attr = self.attr_of(&path)?;
        if attr.kind != NodeKind::Symlink {
            return Err(MirrorError::NotASymlink(path));
        }
        let target = std::fs::read_link(self.disk_path(&path))?;
        Ok(target.as_os_str().as_bytes().to_vec())
    }

    fn path_of(&self, ino: u64) -> Result<String, MirrorError> {
        self.inodes
            .read()
            .get_path(ino)
            .map(str::to_string)
            .ok_or(MirrorError::StaleInode(ino))
    }

    fn disk_path(&self, path: &str) -> PathBuf {
        self.source.join(path.trim_start_matches('/'))
    }

    fn attr_of(&self, path: &str) -> Result<CachedAttr, MirrorError> {
        if let Some(attr) = self.cache.get_attr(path) {
            return Ok(attr);
        }

        let meta = match std::fs::symlink_metadata(self.disk_path(path)) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MirrorError::NotFound(path.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let attr = attr_from_metadata(&meta);
        self.cache.put_attr(path, attr.clone());
        Ok(attr)
    }

    fn list_dir(&self, path: &str) -> Result<Vec<CachedDirEntry>, MirrorError> {
        let attr = self.attr_of(path)?;
        if attr.kind != NodeKind::Directory {
            return Err(MirrorError::NotADirectory(path.to_string()));
        }

        let mut listing = Vec::new();
        for entry in std::fs::read_dir(self.disk_path(path))? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                tracing::debug!(dir = path, "skipping entry with non UTF-8 name");
                continue;
            };
            let file_type = entry.file_type()?;
            let kind = if file_type.is_dir() {
                NodeKind::Directory
            } else if file_type.is_symlink() {
                NodeKind::Symlink
            } else {
                NodeKind::File
            };
            listing.push(CachedDirEntry { name, kind });
        }
        // stable order keeps readdir offsets meaningful across calls
        listing.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listing)
    }
}

/// Root handle; clearing it drops every cached answer
pub struct MirrorRoot {
    cache: FileCache,
}

impl RootNode for MirrorRoot {
    fn forget_all(&self) {
        self.cache.invalidate_all();
        tracing::debug!("mirror cache invalidated");
    }
}

impl Vfs for MirrorFs {
    type Root = MirrorRoot;

    fn device_name(&self) -> String {
        self.device.clone()
    }

    fn root(&self) -> Result<MirrorRoot, VfsError> {
        match std::fs::metadata(&self.source) {
            Ok(meta) if meta.is_dir() => Ok(MirrorRoot {
                cache: self.cache.clone(),
            }),
            Ok(_) => Err(VfsError::RootUnavailable(format!(
                "{} is no longer a directory",
                self.source.display()
            ))),
            Err(e) => Err(VfsError::RootUnavailable(format!(
                "{}: {}",
                self.source.display(),
                e
            ))),
        }
    }
}

fn attr_from_metadata(meta: &Metadata) -> CachedAttr {
    let file_type = meta.file_type();
    let kind = if file_type.is_dir() {
        NodeKind::Directory
    } else if file_type.is_symlink() {
        NodeKind::Symlink
    } else {
        NodeKind::File
    };

    CachedAttr {
        size: meta.len(),
        kind,
        perm: (meta.mode() & 0o7777) as u16,
        nlink: meta.nlink() as u32,
        uid: meta.uid(),
        gid: meta.gid(),
        mtime: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        ctime: unix_time(meta.ctime(), meta.ctime_nsec()),
    }
}

fn unix_time(secs: i64, nsecs: i64) -> SystemTime {
    let secs = u64::try_from(secs).unwrap_or(0);
    let nsecs = u32::try_from(nsecs).unwrap_or(0);
    SystemTime::UNIX_EPOCH + Duration::new(secs, nsecs)
}

fn slice(data: &[u8], offset: u64, size: u32) -> Vec<u8> {
    let start = usize::try_from(offset).unwrap_or(usize::MAX).min(data.len());
    let end = start.saturating_add(size as usize).min(data.len());
    data[start..end].to_vec()
}
