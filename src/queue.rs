//! Bounded, mutex-protected ordered container used once per active input
//! port (spec §4.1).
//!
//! The comparator is fixed rather than injected as a closure: priority is
//! always "window-relative position of `seq_port` against this port's
//! `current_port_sequence`" (spec §4.1), and the window-admission predicate
//! is always "too far from `to_consume_global_seq`" (spec invariant 3). Both
//! anchors are owned by [`crate::core::RxCore`] and shared into the queue as
//! `Arc<AtomicU8>` cells — a non-owning read capability per spec §9's "priority
//! oracle" design note, without the back-reference cycle a trait object would
//! need: the queue only ever reads the cell, never the core itself.

use crate::constants::MAX_QUEUE_CAPACITY;
use crate::error::{RxError, Result};
use crate::header::window_distance;
use crate::packet::Packet;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

/// Per-port ordered queue of admitted packets awaiting reassembly.
pub struct PortQueue {
    items: Mutex<VecDeque<Packet>>,
    capacity: usize,
    /// Shared with the core: `current_port_sequence[port]`.
    port_anchor: Arc<AtomicU8>,
    /// Shared with the core: `to_consume_global_seq`.
    global_anchor: Arc<AtomicU8>,
    max_reordering_window: u8,
}

impl PortQueue {
    pub fn new(port_anchor: Arc<AtomicU8>, global_anchor: Arc<AtomicU8>) -> Self {
        Self::with_capacity(
            port_anchor,
            global_anchor,
            MAX_QUEUE_CAPACITY,
            crate::constants::MAX_REORDERING_WINDOW,
        )
    }

    pub fn with_capacity(
        port_anchor: Arc<AtomicU8>,
        global_anchor: Arc<AtomicU8>,
        capacity: usize,
        max_reordering_window: u8,
    ) -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            capacity,
            port_anchor,
            global_anchor,
            max_reordering_window,
        }
    }

    fn priority_key(&self, pkt: &Packet) -> u8 {
        window_distance(pkt.seq_port(), self.port_anchor.load(Ordering::Acquire))
    }

    /// Inserts `pkt` keeping the queue sorted ascending by window-relative
    /// `seq_port` priority. Fails with [`RxError::QueueFull`] at capacity, or
    /// [`RxError::WindowExceeded`] if `pkt` violates invariant 3 relative to
    /// the current head (spec §4.1's `max_window_exceeded` predicate).
    pub fn push(&self, pkt: Packet) -> Result<()> {
        let mut items = self.items.lock().unwrap();

        if items.len() >= self.capacity {
            return Err(RxError::QueueFull);
        }

        let global_anchor = self.global_anchor.load(Ordering::Acquire);
        if window_distance(pkt.global_seq(), global_anchor) >= self.max_reordering_window {
            return Err(RxError::WindowExceeded);
        }

        let new_key = self.priority_key(&pkt);
        let mut insert_at = items.len();
        for (idx, existing) in items.iter().enumerate().rev() {
            if self.priority_key(existing) <= new_key {
                insert_at = idx + 1;
                break;
            }
            insert_at = idx;
        }
        items.insert(insert_at, pkt);
        Ok(())
    }

    /// Returns a clone of the head element.
    ///
    /// Precondition: `!is_empty()`.
    pub fn peek(&self) -> Packet {
        let items = self.items.lock().unwrap();
        items.front().expect("peek on empty queue").clone()
    }

    /// Removes and returns the head element.
    ///
    /// Precondition: `!is_empty()`.
    pub fn pop(&self) -> Packet {
        let mut items = self.items.lock().unwrap();
        items.pop_front().expect("pop on empty queue")
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().unwrap().is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn compute_buffer_size(&self) -> usize {
        let items = self.items.lock().unwrap();
        items
            .iter()
            .map(|p| crate::constants::HEADER_LEN + p.payload.len())
            .sum()
    }

    pub fn clear(&self) {
        self.items.lock().unwrap().clear();
    }

    /// Runs `f` over the queue contents head-to-tail while holding the queue
    /// lock, as required by the availability check (spec §4.3.2).
    pub fn with_locked_contents<R>(&self, f: impl FnOnce(&VecDeque<Packet>) -> R) -> R {
        let items = self.items.lock().unwrap();
        f(&items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{Header, MessageType};

    fn pkt(global_seq: u8, seq_port: u8, sub_seq: u8, more: bool, port: u8) -> Packet {
        Packet {
            header: Header {
                crc: 0,
                global_seq,
                sub_seq,
                msg_type: MessageType::Data,
                pdu_length: 0,
                seq_port,
                more_fragments: more,
                port,
            },
            payload: Vec::new(),
            channel: 0,
        }
    }

    fn fresh_queue() -> PortQueue {
        PortQueue::new(
            Arc::new(AtomicU8::new(0)),
            Arc::new(AtomicU8::new(0)),
        )
    }

    #[test]
    fn push_keeps_ascending_order_by_seq_port() {
        let q = fresh_queue();
        q.push(pkt(1, 5, 0, false, 1)).unwrap();
        q.push(pkt(0, 0, 0, false, 1)).unwrap();
        q.push(pkt(2, 3, 0, false, 1)).unwrap();

        assert_eq!(q.pop().seq_port(), 0);
        assert_eq!(q.pop().seq_port(), 3);
        assert_eq!(q.pop().seq_port(), 5);
    }

    #[test]
    fn ties_preserve_insertion_order() {
        let q = fresh_queue();
        let a = pkt(0, 0, 0, false, 1);
        let b = pkt(0, 0, 1, false, 1);
        q.push(a.clone()).unwrap();
        q.push(b.clone()).unwrap();
        assert_eq!(q.pop().sub_seq(), 0);
        assert_eq!(q.pop().sub_seq(), 1);
    }

    #[test]
    fn push_rejects_at_capacity() {
        let port_anchor = Arc::new(AtomicU8::new(0));
        let global_anchor = Arc::new(AtomicU8::new(0));
        let q = PortQueue::with_capacity(port_anchor, global_anchor, 1, 32);
        q.push(pkt(0, 0, 0, false, 1)).unwrap();
        assert_eq!(q.push(pkt(0, 1, 0, false, 1)), Err(RxError::QueueFull));
    }

    #[test]
    fn push_rejects_outside_reordering_window() {
        let global_anchor = Arc::new(AtomicU8::new(0));
        let q = PortQueue::with_capacity(Arc::new(AtomicU8::new(0)), global_anchor, 16, 32);
        assert_eq!(
            q.push(pkt(200, 0, 0, false, 1)),
            Err(RxError::WindowExceeded)
        );
    }
}
