use quill_core::error::ClientError;
use quill_protocol::frame::Frame;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// Non-negative stream ids available on one connection.
pub const MAX_STREAMS: usize = i16::MAX as usize + 1;

pub(crate) type ResponseSender = oneshot::Sender<Result<Frame, ClientError>>;

/// Requests sent on the connection that have not seen their response yet,
/// keyed by stream id. An entry leaves the table when its response arrives
/// or the connection closes, even if the caller stopped waiting.
#[derive(Debug)]
pub(crate) struct InFlight {
    sequence: AtomicU64,
    pending: Mutex<HashMap<i16, ResponseSender>>,
}

impl InFlight {
    pub(crate) fn new() -> Self {
        Self {
            sequence: AtomicU64::new(0),
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<i16, ResponseSender>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(&self, sender: ResponseSender) -> Result<i16, ClientError> {
        let mut pending = self.pending();
        if pending.len() >= MAX_STREAMS {
            return Err(ClientError::StreamsExhausted);
        }
        loop {
            let next = self.sequence.fetch_add(1, Ordering::Relaxed);
            let stream = (next % MAX_STREAMS as u64) as i16;
            if let std::collections::hash_map::Entry::Vacant(slot) = pending.entry(stream) {
                slot.insert(sender);
                return Ok(stream);
            }
        }
    }

    /// Hands `frame` to whoever registered its stream id. Returns false when
    /// nothing was waiting on that id.
    pub(crate) fn complete(&self, frame: Frame) -> bool {
        let sender = self.pending().remove(&frame.stream);
        match sender {
            Some(sender) => {
                let _ = sender.send(Ok(frame));
                true
            }
            None => false,
        }
    }

    pub(crate) fn cancel(&self, stream: i16) {
        self.pending().remove(&stream);
    }

    pub(crate) fn fail_all(&self, err: &ClientError) -> usize {
        let drained: Vec<ResponseSender> = self.pending().drain().map(|(_, s)| s).collect();
        let count = drained.len();
        for sender in drained {
            let _ = sender.send(Err(err.clone()));
        }
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.pending().len()
    }
}
