//! Unix signal forwarding into a running mount
//!
//! SIGINT and SIGTERM unmount and exit, SIGHUP clears the filesystem cache.
//! The forwarder stops once the controller stops accepting requests.

use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;

use common::{EventSender, TerminationRequest};

/// Request delivered for a received signal
pub fn request_for(kind: SignalKind) -> Option<TerminationRequest> {
    if kind == SignalKind::interrupt() || kind == SignalKind::terminate() {
        Some(TerminationRequest::Interrupt)
    } else if kind == SignalKind::hangup() {
        Some(TerminationRequest::CacheClear)
    } else {
        None
    }
}

/// Install handlers and forward signals to `sender` on a background task
///
/// Handlers are installed before this returns, so a signal raised right
/// after the call is not lost.
pub fn forward(sender: EventSender) -> std::io::Result<JoinHandle<()>> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sighup = signal(SignalKind::hangup())?;

    Ok(tokio::spawn(async move {
        loop {
            let (name, kind) = tokio::select! {
                Some(()) = sigint.recv() => ("SIGINT", SignalKind::interrupt()),
                Some(()) = sigterm.recv() => ("SIGTERM", SignalKind::terminate()),
                Some(()) = sighup.recv() => ("SIGHUP", SignalKind::hangup()),
                else => break,
            };

            let Some(request) = request_for(kind) else {
                continue;
            };
            tracing::info!(signal = name, ?request, "received signal");

            if sender.send(request).await.is_err() {
                tracing::debug!("mount finished, no longer forwarding signals");
                break;
            }
        }
    }))
}
