//! Bounded per-session outbound queue with a differential drop policy.
//!
//! Producers (room broadcasts, direct replies) never block. The writer task
//! drains the queue onto the socket. On overflow, droppable frames evict the
//! oldest droppable frame already queued; critical frames force the session
//! closed instead, so a critical message is never lost silently.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use skirmish_core::constants::OUTBOUND_QUEUE_CAPACITY;
use skirmish_core::net::messages::ServerMessage;
use skirmish_core::net::protocol::encode_server_message;

/// An encoded frame awaiting delivery. The payload is shared zero-copy
/// across every recipient of a broadcast.
#[derive(Debug, Clone)]
pub struct Frame {
    pub payload: Bytes,
    pub droppable: bool,
}

impl Frame {
    pub fn new(payload: String, droppable: bool) -> Self {
        Self {
            payload: Bytes::from(payload),
            droppable,
        }
    }
}

/// Result of a non-blocking push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// The oldest droppable frame was evicted to make room.
    EvictedOldest,
    /// The new droppable frame was discarded (queue full of critical frames).
    DroppedNew,
    /// A critical frame did not fit; the session must close.
    Overflowed,
    Closed,
}

struct QueueInner {
    frames: VecDeque<Frame>,
    closed: bool,
}

pub struct OutboundQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    capacity: usize,
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::with_capacity(OUTBOUND_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                frames: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
        }
    }

    /// Non-blocking append with the drop policy applied on overflow.
    pub fn push(&self, frame: Frame) -> PushOutcome {
        let Ok(mut inner) = self.inner.lock() else {
            return PushOutcome::Closed;
        };
        if inner.closed {
            return PushOutcome::Closed;
        }
        if inner.frames.len() < self.capacity {
            inner.frames.push_back(frame);
            drop(inner);
            self.notify.notify_one();
            return PushOutcome::Queued;
        }
        if !frame.droppable {
            return PushOutcome::Overflowed;
        }
        match inner.frames.iter().position(|f| f.droppable) {
            Some(idx) => {
                inner.frames.remove(idx);
                inner.frames.push_back(frame);
                drop(inner);
                self.notify.notify_one();
                PushOutcome::EvictedOldest
            }
            None => PushOutcome::DroppedNew,
        }
    }

    /// Await the next frame. Returns `None` once the queue is closed and
    /// fully drained.
    pub async fn recv(&self) -> Option<Frame> {
        loop {
            let notified = self.notify.notified();
            {
                let Ok(mut inner) = self.inner.lock() else {
                    return None;
                };
                if let Some(frame) = inner.frames.pop_front() {
                    return Some(frame);
                }
                if inner.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Non-blocking pop.
    pub fn try_recv(&self) -> Option<Frame> {
        self.inner.lock().ok()?.frames.pop_front()
    }

    /// Mark the queue closed. Idempotent; already-queued frames still drain.
    pub fn close(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.closed = true;
        }
        self.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.frames.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cloneable handle for delivering messages to one session. Held by the room
/// membership map and by the session's own controller.
#[derive(Clone)]
pub struct SessionHandle {
    queue: Arc<OutboundQueue>,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub fn new(queue: Arc<OutboundQueue>, cancel: CancellationToken) -> Self {
        Self { queue, cancel }
    }

    /// Encode and enqueue one message for this session alone.
    pub fn send(&self, msg: &ServerMessage) {
        match encode_server_message(msg) {
            Ok(text) => self.send_frame(Frame::new(text, msg.is_droppable())),
            Err(e) => tracing::error!(error = %e, "Failed to encode server message"),
        }
    }

    /// Enqueue an already-encoded frame. A critical overflow means this
    /// client cannot keep up with messages it must not miss: close it.
    pub fn send_frame(&self, frame: Frame) {
        match self.queue.push(frame) {
            PushOutcome::Queued | PushOutcome::EvictedOldest | PushOutcome::Closed => {}
            PushOutcome::DroppedNew => {
                tracing::debug!("Outbound queue full, dropped state frame");
            }
            PushOutcome::Overflowed => {
                tracing::warn!("Outbound queue overflow on critical message, closing session");
                self.close();
            }
        }
    }

    /// Idempotent: signals both session tasks to stop and seals the queue.
    pub fn close(&self) {
        self.queue.close();
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
