pub mod init;
#[cfg(feature = "fuse")]
pub mod mount;
pub mod options;
pub mod version;

pub use init::Init;
#[cfg(feature = "fuse")]
pub use mount::Mount;
pub use options::Options;
pub use version::Version;
