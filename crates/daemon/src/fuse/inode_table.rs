//! Inode ↔ path mapping for the mirror filesystem
//!
//! Inodes handed to the kernel must stay valid for the life of the mount,
//! so entries are never reused. A cache clear leaves this table alone.

use std::collections::HashMap;

/// Bidirectional mapping between inodes and source-relative paths
#[derive(Debug)]
pub struct InodeTable {
    path_to_inode: HashMap<String, u64>,
    inode_to_path: HashMap<u64, String>,
    next_inode: u64,
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeTable {
    /// Root inode number (always 1 in FUSE)
    pub const ROOT_INODE: u64 = 1;

    pub fn new() -> Self {
        let mut table = Self {
            path_to_inode: HashMap::new(),
            inode_to_path: HashMap::new(),
            next_inode: Self::ROOT_INODE + 1,
        };
        table.path_to_inode.insert("/".to_string(), Self::ROOT_INODE);
        table.inode_to_path.insert(Self::ROOT_INODE, "/".to_string());
        table
    }

    /// Get or assign the inode for a path
    pub fn get_or_create(&mut self, path: &str) -> u64 {
        let normalized = Self::normalize_path(path);
        if let Some(&inode) = self.path_to_inode.get(&normalized) {
            return inode;
        }

        let inode = self.next_inode;
        self.next_inode += 1;
        self.path_to_inode.insert(normalized.clone(), inode);
        self.inode_to_path.insert(inode, normalized);
        inode
    }

    pub fn get_inode(&self, path: &str) -> Option<u64> {
        self.path_to_inode.get(&Self::normalize_path(path)).copied()
    }

    pub fn get_path(&self, inode: u64) -> Option<&str> {
        self.inode_to_path.get(&inode).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.inode_to_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inode_to_path.is_empty()
    }

    /// Path of `name` inside directory `parent`
    pub fn child_path(parent: &str, name: &str) -> String {
        let parent = Self::normalize_path(parent);
        if parent == "/" {
            format!("/{}", name)
        } else {
            format!("{}/{}", parent, name)
        }
    }

    /// Get the parent path of a given path
    pub fn parent_path(path: &str) -> String {
        let normalized = Self::normalize_path(path);
        match normalized.rfind('/') {
            Some(0) | None => "/".to_string(),
            Some(pos) => normalized[..pos].to_string(),
        }
    }

    fn normalize_path(path: &str) -> String {
        let path = path.trim();
        if path.is_empty() || path == "/" {
            return "/".to_string();
        }

        let mut normalized = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        if normalized.len() > 1 && normalized.ends_with('/') {
            normalized.pop();
        }
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_inode() {
        let table = InodeTable::new();
        assert_eq!(table.get_inode("/"), Some(InodeTable::ROOT_INODE));
        assert_eq!(table.get_path(InodeTable::ROOT_INODE), Some("/"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_get_or_create_is_stable() {
        let mut table = InodeTable::new();

        let foo = table.get_or_create("/foo");
        let again = table.get_or_create("foo/");
        let bar = table.get_or_create("/bar");

        assert_eq!(foo, again);
        assert_ne!(foo, bar);
        assert_ne!(foo, InodeTable::ROOT_INODE);
        assert_eq!(table.get_path(bar), Some("/bar"));
    }

    #[test]
    fn test_child_path() {
        assert_eq!(InodeTable::child_path("/", "a"), "/a");
        assert_eq!(InodeTable::child_path("/a", "b"), "/a/b");
        assert_eq!(InodeTable::child_path("/a/", "b"), "/a/b");
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(InodeTable::parent_path("/"), "/");
        assert_eq!(InodeTable::parent_path("/foo"), "/");
        assert_eq!(InodeTable::parent_path("/foo/bar"), "/foo");
        assert_eq!(InodeTable::parent_path("/foo/bar/baz"), "/foo/bar");
    }
}
