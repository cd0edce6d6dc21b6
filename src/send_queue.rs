//! Ordered, unbounded frame queues feeding dedicated sender tasks.
//!
//! Enqueueing a frame is decoupled from the socket write so that state
//! handlers, the watchdog and the relay never block on a slow peer, and
//! so the attached-client transport can be swapped without touching its
//! producers. Frames enqueued while no transport is attached are
//! dropped; a newly attached peer expects a fresh stream.

use crate::transport::FrameWriter;
use std::sync::{Arc, Mutex};

/// Handle used to enqueue plaintext frames for a leg.
#[derive(Clone)]
pub struct SendQueue {
    tx: flume::Sender<Vec<u8>>,
}

impl SendQueue {
    /// Enqueues a frame. A closed queue means the leg is gone; the frame
    /// is silently dropped, which is the normal idle-teardown path.
    pub fn send(&self, frame: Vec<u8>) {
        self.tx.send(frame).ok();
    }
}

/// Receiving side of a send queue, drained by one sender task.
pub struct SendQueueBacklog {
    rx: flume::Receiver<Vec<u8>>,
}

impl SendQueueBacklog {
    /// Drains queued frames into the writer, in submission order, until
    /// every [`SendQueue`] handle is dropped or the socket fails.
    pub async fn drain(self, mut writer: FrameWriter) {
        while let Ok(frame) = self.rx.recv_async().await {
            if let Err(e) = writer.write_frame(frame).await {
                tracing::debug!("send queue: socket write failed: {e}");
                break;
            }
        }
    }

    #[cfg(test)]
    pub(crate) async fn recv(&self) -> Option<Vec<u8>> {
        self.rx.recv_async().await.ok()
    }

    #[cfg(test)]
    pub(crate) fn try_recv(&self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }
}

/// Creates a queue and its backlog.
pub fn send_queue() -> (SendQueue, SendQueueBacklog) {
    let (tx, rx) = flume::unbounded();
    (SendQueue { tx }, SendQueueBacklog { rx })
}

enum SlotState {
    Empty,
    /// A client socket was accepted and is mid-handshake.
    Claimed,
    Attached(SendQueue),
}

/// The currently attached client, if any.
///
/// Swapped on every client reconnect, which happens far more often than
/// world-state operations, so it gets its own lock distinct from the
/// state mutex. The lock is held only long enough to snapshot the
/// sender, never across a socket write.
#[derive(Clone)]
pub struct ClientSlot(Arc<Mutex<SlotState>>);

impl Default for ClientSlot {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(SlotState::Empty)))
    }
}

impl ClientSlot {
    /// Reserves the slot for a connecting client. Returns `false` if a
    /// client is already present; the caller must reject the socket.
    pub fn try_claim(&self) -> bool {
        let mut slot = self.0.lock().unwrap();
        match *slot {
            SlotState::Empty => {
                *slot = SlotState::Claimed;
                true
            }
            _ => false,
        }
    }

    /// Attaches the queue of a client that completed its login.
    pub fn attach(&self, queue: SendQueue) {
        *self.0.lock().unwrap() = SlotState::Attached(queue);
    }

    /// Empties the slot, dropping the attached queue (if any) so its
    /// sender task winds down and the socket closes.
    pub fn release(&self) {
        *self.0.lock().unwrap() = SlotState::Empty;
    }

    /// Whether a client is present (mid-handshake or attached).
    pub fn attached(&self) -> bool {
        !matches!(*self.0.lock().unwrap(), SlotState::Empty)
    }

    /// Forwards a frame to the attached client, if any; drops it
    /// otherwise. "No client" is a normal state, not an error.
    pub fn forward(&self, frame: Vec<u8>) {
        let queue = match &*self.0.lock().unwrap() {
            SlotState::Attached(queue) => queue.clone(),
            _ => return,
        };
        queue.send(frame);
    }
}
