//! Owns the mapping from port to priority queue, routes incoming packets to
//! the correct queue, and tracks which queues currently hold data (spec §4.2).

use crate::bitset::BitSet;
use crate::constants::DEFAULT_MAX_OUT_PORTS;
use crate::error::Result;
use crate::flat_map::FlatMap;
use crate::packet::Packet;
use crate::queue::PortQueue;
use crate::status::StatusSink;
use std::sync::atomic::AtomicU8;
use std::sync::{Arc, Mutex};

/// Words needed for a 128-bit set of ports (0..127).
const PORT_SET_WORDS: usize = DEFAULT_MAX_OUT_PORTS / 64;

pub struct Buffer {
    queues: Mutex<FlatMap<u8, Arc<PortQueue>>>,
    active_queues: Mutex<BitSet<PORT_SET_WORDS>>,
    global_anchor: Arc<AtomicU8>,
}

impl Buffer {
    pub fn new(global_anchor: Arc<AtomicU8>) -> Self {
        Self {
            queues: Mutex::new(FlatMap::new()),
            active_queues: Mutex::new(BitSet::new()),
            global_anchor,
        }
    }

    /// Routes `pkt` to `queues[pkt.port()]`, creating the queue lazily with
    /// `port_anchor` if this is the first packet seen for that port.
    /// `port_anchor` is ignored if the queue already exists.
    pub fn write(&self, pkt: Packet, port_anchor: Arc<AtomicU8>) -> Result<()> {
        let port = pkt.port();
        let queue = {
            let mut queues = self.queues.lock().unwrap();
            queues
                .entry(port)
                .or_insert_with(|| {
                    Arc::new(PortQueue::new(port_anchor, Arc::clone(&self.global_anchor)))
                })
                .clone()
        };
        queue.push(pkt)?;
        self.active_queues
            .lock()
            .unwrap()
            .set(port as usize);
        Ok(())
    }

    /// Returns the queue for `port` for read-only traversal under the
    /// queue's own lock, if any packets have ever arrived for it.
    pub fn get_queue(&self, port: u8) -> Option<Arc<PortQueue>> {
        self.queues.lock().unwrap().get(&port).cloned()
    }

    /// Pops the head packet for `port`, if the queue exists and is non-empty.
    pub fn get_next_packet(&self, port: u8) -> Option<Packet> {
        let queue = self.get_queue(port)?;
        if queue.is_empty() {
            return None;
        }
        let pkt = queue.pop();
        if queue.is_empty() {
            self.active_queues.lock().unwrap().unset(port as usize);
        }
        Some(pkt)
    }

    /// Drops all packets queued for `port` and notifies the status sink.
    pub fn clear_queue_for_port(&self, port: u8, sink: &dyn StatusSink) {
        if let Some(queue) = self.queues.lock().unwrap().get(&port) {
            queue.clear();
        }
        self.active_queues.lock().unwrap().unset(port as usize);
        sink.on_channel_status_changed(port, true);
    }

    /// Snapshot of ports whose queue currently holds at least one packet.
    pub fn get_active_queues(&self) -> Vec<u8> {
        let active = self.active_queues.lock().unwrap();
        (0..DEFAULT_MAX_OUT_PORTS as u8)
            .filter(|&p| active.get(p as usize))
            .collect()
    }

    /// Drops every packet in every queue, without forgetting the queues
    /// themselves (so their `port_anchor` capability survives a reset).
    pub fn clear(&self) {
        let queues = self.queues.lock().unwrap();
        for (_, queue) in queues.iter() {
            queue.clear();
        }
        drop(queues);
        *self.active_queues.lock().unwrap() = BitSet::new();
    }
}
