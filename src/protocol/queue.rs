//! Outbound send queue with per-frame delivery tracking, plus the inbound
//! arrival queue and SysEx chunk reassembly.
//!
//! The outbound side is stop-and-wait: the head frame is transmitted once,
//! then holds the queue until every reply it requires has been observed.
//! [`OutboundQueue::tick`] performs at most one state transition, so the
//! caller's work cycle stays non-blocking.

use crate::protocol::{ProtocolError, REASSEMBLY_MAX};
use bytes::BytesMut;
use std::collections::VecDeque;
use tracing::{debug, trace};

pub const OUTBOUND_CAPACITY: usize = 30;
pub const INBOUND_CAPACITY: usize = 40;

/// One outbound SysEx payload plus the delivery guarantees it expects.
#[derive(Debug, Clone)]
pub struct OutMessage {
    pub payload: Vec<u8>,
    pub id: u16,
    pub needs_ack: bool,
    pub needs_answer: bool,
}

impl OutMessage {
    pub fn new(payload: Vec<u8>, id: u16, needs_ack: bool, needs_answer: bool) -> Self {
        Self {
            payload,
            id,
            needs_ack,
            needs_answer,
        }
    }

    pub fn fire_and_forget(payload: Vec<u8>, id: u16) -> Self {
        Self::new(payload, id, false, false)
    }
}

/// Queue slot: the message plus its delivery state.
///
/// `acknowledged` and `answered` can only become true after `sent` is.
#[derive(Debug)]
struct Envelope {
    msg: OutMessage,
    sent: bool,
    acknowledged: bool,
    answered: bool,
}

impl Envelope {
    fn new(msg: OutMessage) -> Self {
        Self {
            msg,
            sent: false,
            acknowledged: false,
            answered: false,
        }
    }

    fn complete(&self) -> bool {
        if !self.sent {
            return false;
        }
        if self.msg.needs_ack {
            self.acknowledged && (!self.msg.needs_answer || self.answered)
        } else if self.msg.needs_answer {
            self.answered
        } else {
            true
        }
    }
}

/// Strict-FIFO outbound queue, advanced one transition per tick.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    queue: VecDeque<Envelope>,
}

impl OutboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, msg: OutMessage) -> Result<(), ProtocolError> {
        if self.queue.len() >= OUTBOUND_CAPACITY {
            return Err(ProtocolError::QueueFull {
                capacity: OUTBOUND_CAPACITY,
            });
        }
        trace!(
            id = msg.id,
            ack = msg.needs_ack,
            answer = msg.needs_answer,
            "enqueued"
        );
        self.queue.push_back(Envelope::new(msg));
        Ok(())
    }

    pub fn enqueue_all(
        &mut self,
        msgs: impl IntoIterator<Item = OutMessage>,
    ) -> Result<(), ProtocolError> {
        for msg in msgs {
            self.enqueue(msg)?;
        }
        Ok(())
    }

    /// Advance the head by one step. Returns the payload to transmit when
    /// the head frame has not been sent yet; otherwise checks whether the
    /// head is complete and drops it, freeing the next slot for the
    /// following tick.
    pub fn tick(&mut self) -> Option<&[u8]> {
        let head = self.queue.front_mut()?;
        if !head.sent {
            head.sent = true;
            trace!(id = head.msg.id, len = head.msg.payload.len(), "sending");
            return self.queue.front().map(|head| head.msg.payload.as_slice());
        }
        if head.complete() {
            let id = head.msg.id;
            self.queue.pop_front();
            trace!(id, "delivered");
        }
        None
    }

    /// Mark the sent head frame acknowledged. Returns the id it applied
    /// to, or `None` when nothing sent is waiting for an ack.
    pub fn acknowledge(&mut self) -> Option<u16> {
        let head = self.queue.front_mut()?;
        if head.sent && head.msg.needs_ack && !head.acknowledged {
            head.acknowledged = true;
            trace!(id = head.msg.id, "acknowledged");
            return Some(head.msg.id);
        }
        None
    }

    /// Mark the sent head frame answered.
    pub fn answer(&mut self) -> Option<u16> {
        let head = self.queue.front_mut()?;
        if head.sent && head.msg.needs_answer && !head.answered {
            head.answered = true;
            trace!(id = head.msg.id, "answered");
            return Some(head.msg.id);
        }
        None
    }

    pub fn head_id(&self) -> Option<u16> {
        self.queue.front().map(|e| e.msg.id)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop everything, including a stalled head. Returns the number of
    /// messages discarded.
    pub fn reset(&mut self) -> usize {
        let dropped = self.queue.len();
        if dropped > 0 {
            debug!(dropped, "outbound queue reset");
        }
        self.queue.clear();
        dropped
    }
}

/// Arrival queue of complete inbound SysEx messages.
#[derive(Debug, Default)]
pub struct InboundQueue {
    queue: VecDeque<Vec<u8>>,
}

impl InboundQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, msg: Vec<u8>) -> Result<(), ProtocolError> {
        if self.queue.len() >= INBOUND_CAPACITY {
            return Err(ProtocolError::InboundFull {
                capacity: INBOUND_CAPACITY,
            });
        }
        self.queue.push_back(msg);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Vec<u8>> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Accumulates transport chunks until one carries the final flag, then
/// yields the complete message.
#[derive(Debug, Default)]
pub struct Reassembly {
    buf: BytesMut,
}

impl Reassembly {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one chunk. On the final chunk the whole message is returned
    /// and the cursor resets. Overflow discards the partial message.
    pub fn feed(
        &mut self,
        chunk: &[u8],
        is_final: bool,
    ) -> Result<Option<Vec<u8>>, ProtocolError> {
        if self.buf.len() + chunk.len() > REASSEMBLY_MAX {
            self.buf.clear();
            return Err(ProtocolError::MessageTooLong {
                max: REASSEMBLY_MAX,
            });
        }
        self.buf.extend_from_slice(chunk);
        if is_final {
            Ok(Some(self.buf.split().to_vec()))
        } else {
            Ok(None)
        }
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}
