//! Operator events delivered to a running mount
//!
//! Each kind of request gets its own bounded flume channel, so a burst of
//! cache clears can never crowd out an interrupt and a request raised while
//! the controller is busy stays queued.

/// Requests raised by the operating environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationRequest {
    /// Unmount and stop
    Interrupt,
    /// Invalidate cached filesystem state and keep serving
    CacheClear,
}

/// Cloneable handle used to deliver [`TerminationRequest`]s
#[derive(Debug, Clone)]
pub struct EventSender {
    interrupts: flume::Sender<()>,
    cache_clears: flume::Sender<()>,
}

/// Receiving side, consumed by the lifecycle controller
#[derive(Debug)]
pub struct LifecycleEvents {
    pub(crate) interrupts: flume::Receiver<()>,
    pub(crate) cache_clears: flume::Receiver<()>,
}

/// Create a sender/receiver pair buffering up to `capacity` of each kind
///
/// A capacity of zero is raised to one.
pub fn channel(capacity: usize) -> (EventSender, LifecycleEvents) {
    let capacity = capacity.max(1);
    let (interrupt_tx, interrupt_rx) = flume::bounded(capacity);
    let (cache_tx, cache_rx) = flume::bounded(capacity);

    (
        EventSender {
            interrupts: interrupt_tx,
            cache_clears: cache_tx,
        },
        LifecycleEvents {
            interrupts: interrupt_rx,
            cache_clears: cache_rx,
        },
    )
}

impl EventSender {
    /// Queue a request, waiting for buffer space if needed
    ///
    /// Fails only once the controller has finished.
    pub async fn send(&self, request: TerminationRequest) -> Result<(), EventsClosed> {
        self.channel(request)
            .send_async(())
            .await
            .map_err(|_| EventsClosed)
    }

    /// Queue a request without waiting
    pub fn try_send(&self, request: TerminationRequest) -> Result<(), EventsClosed> {
        self.channel(request).try_send(()).map_err(|_| EventsClosed)
    }

    fn channel(&self, request: TerminationRequest) -> &flume::Sender<()> {
        match request {
            TerminationRequest::Interrupt => &self.interrupts,
            TerminationRequest::CacheClear => &self.cache_clears,
        }
    }
}

/// The controller is no longer accepting requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("mount controller is no longer accepting requests")]
pub struct EventsClosed;
