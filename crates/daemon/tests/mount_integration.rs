//! Integration tests for the FUSE transport under the mount lifecycle
//!
//! Mount-point validation runs everywhere. The end-to-end test needs
//! `/dev/fuse` and `fusermount3`, so it only runs when `RMOUNT_FUSE_TESTS=1`.

#![cfg(feature = "fuse")]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use common::{
    events, LifecycleError, LifecycleState, MountConfig, MountLifecycle, TerminationRequest,
    TransportError,
};
use rmount_daemon::fuse::{FileCacheConfig, FuseTransport, MirrorFs};

fn source_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("hello.txt"), b"hello through fuse").unwrap();
    std::fs::create_dir(dir.path().join("nested")).unwrap();
    dir
}

fn controller(source: &Path, mount_point: &Path, config: MountConfig) -> MountLifecycle<FuseTransport> {
    let vfs = Arc::new(MirrorFs::new(source, FileCacheConfig::default()).unwrap());
    MountLifecycle::new(FuseTransport::new(), vfs, mount_point, config)
        .with_unmount_grace(Duration::from_secs(2))
}

#[tokio::test]
async fn test_missing_mount_point_fails_to_mount() {
    let source = source_dir();
    let scratch = TempDir::new().unwrap();
    let mount_point = scratch.path().join("missing");

    let lifecycle = controller(source.path(), &mount_point, MountConfig::default());
    let state = lifecycle.subscribe();
    let (_sender, events) = events::channel(1);

    let err = lifecycle.run(events).await.unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::Mount {
            source: TransportError::InvalidMountPoint(_),
            ..
        }
    ));
    assert!(err
        .to_string()
        .starts_with(&format!("failed to mount {}", mount_point.display())));
    assert_eq!(*state.borrow(), LifecycleState::Failed);
}

#[tokio::test]
async fn test_non_empty_mount_point_needs_allow_non_empty() {
    let source = source_dir();
    let mount_point = TempDir::new().unwrap();
    std::fs::write(mount_point.path().join("occupied"), b"x").unwrap();

    let lifecycle = controller(source.path(), mount_point.path(), MountConfig::default());
    let (_sender, events) = events::channel(1);

    let err = lifecycle.run(events).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Mount { .. }));
    assert!(err.to_string().contains("--allow-non-empty"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_mount_serve_and_interrupt() {
    if std::env::var("RMOUNT_FUSE_TESTS").as_deref() != Ok("1") {
        eprintln!("skipping: set RMOUNT_FUSE_TESTS=1 to run FUSE mount tests");
        return;
    }

    let source = source_dir();
    let mount_point = TempDir::new().unwrap();
    let config = MountConfig {
        read_only: true,
        ..Default::default()
    };

    let lifecycle = controller(source.path(), mount_point.path(), config);
    let mut state = lifecycle.subscribe();
    let (sender, events) = events::channel(1);
    let run = tokio::spawn(lifecycle.run(events));

    tokio::time::timeout(
        Duration::from_secs(10),
        state.wait_for(|s| *s == LifecycleState::Serving),
    )
    .await
    .expect("mount never started serving")
    .unwrap();

    let mounted = mount_point.path().to_path_buf();
    let (contents, mut names) = tokio::task::spawn_blocking(move || {
        let contents = std::fs::read_to_string(mounted.join("hello.txt")).unwrap();
        let names: Vec<String> = std::fs::read_dir(&mounted)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        (contents, names)
    })
    .await
    .unwrap();
    names.sort();
    assert_eq!(contents, "hello through fuse");
    assert_eq!(names, ["hello.txt", "nested"]);

    sender.send(TerminationRequest::CacheClear).await.unwrap();
    sender.send(TerminationRequest::Interrupt).await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(10), run)
        .await
        .expect("lifecycle did not finish")
        .unwrap();
    assert!(result.is_ok(), "unexpected error: {:?}", result);
    assert!(std::fs::read_dir(mount_point.path()).unwrap().next().is_none());
}
