//! Shared test harness: a scriptable in-memory transport and VFS
//!
//! The fake serve loop blocks until the mount is "released", either by the
//! controller's unmount call or by the test simulating an external unmount.

#![allow(dead_code)]

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ::common::{
    LifecycleState, MountOptions, RootNode, Transport, TransportError, Vfs, VfsError,
};
use tokio::sync::watch;

pub const MOUNT_POINT: &str = "/mnt/x";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

pub struct FakeConnection {
    release: flume::Receiver<()>,
}

pub struct FakeTransport {
    mount_error: Mutex<Option<TransportError>>,
    serve_error: Mutex<Option<TransportError>>,
    close_error: Mutex<Option<TransportError>>,
    unmount_error: Mutex<Option<TransportError>>,
    release_on_unmount: AtomicBool,
    panic_on_serve: AtomicBool,
    mounts: AtomicUsize,
    serves: AtomicUsize,
    closes: AtomicUsize,
    unmounts: Mutex<Vec<PathBuf>>,
    options: Mutex<Option<MountOptions>>,
    release_tx: flume::Sender<()>,
    release_rx: flume::Receiver<()>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        let (release_tx, release_rx) = flume::unbounded();
        Arc::new(Self {
            mount_error: Mutex::new(None),
            serve_error: Mutex::new(None),
            close_error: Mutex::new(None),
            unmount_error: Mutex::new(None),
            release_on_unmount: AtomicBool::new(true),
            panic_on_serve: AtomicBool::new(false),
            mounts: AtomicUsize::new(0),
            serves: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            unmounts: Mutex::new(Vec::new()),
            options: Mutex::new(None),
            release_tx,
            release_rx,
        })
    }

    pub fn fail_mount(&self, err: TransportError) {
        *self.mount_error.lock().unwrap() = Some(err);
    }

    pub fn fail_serve(&self, err: TransportError) {
        *self.serve_error.lock().unwrap() = Some(err);
    }

    pub fn fail_close(&self, err: TransportError) {
        *self.close_error.lock().unwrap() = Some(err);
    }

    pub fn fail_unmount(&self, err: TransportError) {
        *self.unmount_error.lock().unwrap() = Some(err);
    }

    /// Unmount succeeds but leaves the serve loop running
    pub fn hang_after_unmount(&self) {
        self.release_on_unmount.store(false, Ordering::SeqCst);
    }

    pub fn panic_on_serve(&self) {
        self.panic_on_serve.store(true, Ordering::SeqCst);
    }

    /// Simulate someone running `fusermount -u` behind our back
    pub fn external_unmount(&self) {
        let _ = self.release_tx.send(());
    }

    pub fn mounts(&self) -> usize {
        self.mounts.load(Ordering::SeqCst)
    }

    pub fn serves(&self) -> usize {
        self.serves.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn unmounts(&self) -> Vec<PathBuf> {
        self.unmounts.lock().unwrap().clone()
    }

    pub fn options(&self) -> Option<MountOptions> {
        self.options.lock().unwrap().clone()
    }
}

impl Transport for FakeTransport {
    type Connection = FakeConnection;
    type Vfs = FakeVfs;

    fn mount(
        &self,
        _mount_point: &Path,
        options: &MountOptions,
    ) -> Result<FakeConnection, TransportError> {
        self.mounts.fetch_add(1, Ordering::SeqCst);
        *self.options.lock().unwrap() = Some(options.clone());
        if let Some(err) = self.mount_error.lock().unwrap().take() {
            return Err(err);
        }
        Ok(FakeConnection {
            release: self.release_rx.clone(),
        })
    }

    fn serve(
        &self,
        connection: &mut FakeConnection,
        _vfs: Arc<FakeVfs>,
    ) -> Result<(), TransportError> {
        self.serves.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_serve.load(Ordering::SeqCst) {
            panic!("serve loop blew up");
        }
        let _ = connection.release.recv();
        match self.serve_error.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn close(&self, _connection: FakeConnection) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        match self.close_error.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn unmount(&self, mount_point: &Path) -> Result<(), TransportError> {
        self.unmounts.lock().unwrap().push(mount_point.to_path_buf());
        if let Some(err) = self.unmount_error.lock().unwrap().take() {
            return Err(err);
        }
        if self.release_on_unmount.load(Ordering::SeqCst) {
            let _ = self.release_tx.send(());
        }
        Ok(())
    }
}

pub struct FakeVfs {
    forgets: Arc<AtomicUsize>,
    root_calls: AtomicUsize,
    root_fails: AtomicBool,
    forgotten_tx: flume::Sender<()>,
    forgotten_rx: flume::Receiver<()>,
}

impl FakeVfs {
    pub fn new() -> Arc<Self> {
        let (forgotten_tx, forgotten_rx) = flume::unbounded();
        Arc::new(Self {
            forgets: Arc::new(AtomicUsize::new(0)),
            root_calls: AtomicUsize::new(0),
            root_fails: AtomicBool::new(false),
            forgotten_tx,
            forgotten_rx,
        })
    }

    pub fn fail_root(&self, fail: bool) {
        self.root_fails.store(fail, Ordering::SeqCst);
    }

    pub fn forgets(&self) -> usize {
        self.forgets.load(Ordering::SeqCst)
    }

    pub fn root_calls(&self) -> usize {
        self.root_calls.load(Ordering::SeqCst)
    }

    /// Wait until `n` more forget_all calls have happened
    pub async fn wait_for_forgets(&self, n: usize) {
        for _ in 0..n {
            tokio::time::timeout(Duration::from_secs(5), self.forgotten_rx.recv_async())
                .await
                .expect("timed out waiting for forget_all")
                .expect("forget channel closed");
        }
    }
}

pub struct FakeRoot {
    forgets: Arc<AtomicUsize>,
    forgotten_tx: flume::Sender<()>,
}

impl RootNode for FakeRoot {
    fn forget_all(&self) {
        self.forgets.fetch_add(1, Ordering::SeqCst);
        let _ = self.forgotten_tx.send(());
    }
}

impl Vfs for FakeVfs {
    type Root = FakeRoot;

    fn device_name(&self) -> String {
        "fake:/remote".to_string()
    }

    fn root(&self) -> Result<FakeRoot, VfsError> {
        self.root_calls.fetch_add(1, Ordering::SeqCst);
        if self.root_fails.load(Ordering::SeqCst) {
            return Err(VfsError::RootUnavailable("remote went away".to_string()));
        }
        Ok(FakeRoot {
            forgets: Arc::clone(&self.forgets),
            forgotten_tx: self.forgotten_tx.clone(),
        })
    }
}

/// Wait for the controller to reach `target`
pub async fn wait_for_state(rx: &mut watch::Receiver<LifecycleState>, target: LifecycleState) {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|state| *state == target))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {}", target))
        .expect("controller dropped");
}

/// Poll `check` until it holds or `timeout` passes
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check().await
}
