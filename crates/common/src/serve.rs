//! Supervised serving of an established mount
//!
//! The serve loop blocks until the transport stops it, so it runs on the
//! blocking pool. A small async task waits for it and resolves a one-shot
//! [`ServeHandle`] with the outcome. The handle can only ever be resolved
//! once, and a panicking serve loop still resolves it and still closes the
//! connection.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::TransportError;
use crate::transport::Transport;

/// Terminal outcome of a serve loop
pub type ServeResult = Result<(), TransportError>;

/// Resolves once with the outcome of a supervised serve loop
#[derive(Debug)]
pub struct ServeHandle {
    rx: oneshot::Receiver<ServeResult>,
}

impl Future for ServeHandle {
    type Output = ServeResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // the reporter task always sends before it exits, so this only
            // happens when the runtime is shutting down underneath us
            Poll::Ready(Err(_)) => Poll::Ready(Err(TransportError::ServeTask(
                "serve task dropped without reporting".to_string(),
            ))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Serve `connection` in the background and close it when serving stops
///
/// The outcome is the serve error if there was one, otherwise the close
/// error. A panic in the serve loop is reported as
/// [`TransportError::ServeTask`] after the connection is closed. Nobody has
/// to read the handle for the task to finish.
pub fn supervise<T: Transport>(
    transport: Arc<T>,
    mut connection: T::Connection,
    vfs: Arc<T::Vfs>,
) -> ServeHandle {
    let (tx, rx) = oneshot::channel();

    let serving = tokio::task::spawn_blocking(move || {
        let served = panic::catch_unwind(AssertUnwindSafe(|| {
            transport.serve(&mut connection, vfs)
        }));
        let closed = transport.close(connection);
        match served {
            Ok(served) => served.and(closed),
            Err(payload) => Err(TransportError::ServeTask(format!(
                "serve loop panicked: {}",
                panic_message(payload.as_ref())
            ))),
        }
    });

    tokio::spawn(async move {
        let result = match serving.await {
            Ok(result) => result,
            Err(e) => Err(TransportError::ServeTask(e.to_string())),
        };
        tracing::debug!(ok = result.is_ok(), "serve loop finished");
        // the controller may already have stopped listening
        let _ = tx.send(result);
    });

    ServeHandle { rx }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
