//! The RX state machine (spec §4.3): validates and classifies incoming
//! frames, places data frames into per-port reordering queues under the
//! sliding global-sequence window, reassembles fragmented messages in
//! per-port sub-sequence order, and wakes blocked consumers.

use crate::bitset::BitSet;
use crate::buffer::Buffer;
use crate::constants::{DEFAULT_MAX_OUT_PORTS, HEADER_LEN, RECEIVING_WINDOW_SIZE};
use crate::crc;
use crate::error::{RxError, Result};
use crate::flat_map::FlatMap;
use crate::header::{Header, MessageType, window_distance};
use crate::packet::{Packet, SyncPayload};
use crate::status::{NullStatusSink, StatusSink};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use tracing::{debug, error, warn};

const PORT_SET_WORDS: usize = DEFAULT_MAX_OUT_PORTS / 64;

/// Deferred notifications produced while the RX mutex was held, to be fired
/// once it is released (spec §9 "Callback thread safety": the sink must
/// never be called with the RX mutex held).
enum SinkCall {
    Synchronization(u32),
}

struct CoreState {
    active: bool,
    to_consume_global_seq: u8,
    last_received_global_seq: u8,
    receiving_window: u16,
    current_port_sequence: FlatMap<u8, Arc<AtomicU8>>,
    open_ports: BitSet<PORT_SET_WORDS>,
    available_messages: BitSet<PORT_SET_WORDS>,
    status_sink: Arc<dyn StatusSink>,
}

impl CoreState {
    fn new() -> Self {
        Self {
            active: false,
            to_consume_global_seq: 0,
            last_received_global_seq: 0,
            receiving_window: 0,
            current_port_sequence: FlatMap::new(),
            open_ports: BitSet::new(),
            available_messages: BitSet::new(),
            status_sink: Arc::new(NullStatusSink),
        }
    }

    fn port_anchor(&mut self, port: u8) -> Arc<AtomicU8> {
        Arc::clone(
            self.current_port_sequence
                .entry(port)
                .or_insert_with(|| Arc::new(AtomicU8::new(0))),
        )
    }
}

/// The receive-side core. Owns a single coarse mutex guarding all fields
/// described in spec §3, plus the per-port [`Buffer`] (which has its own
/// finer-grained per-queue locks, acquired only while the RX mutex is held).
pub struct RxCore {
    state: Mutex<CoreState>,
    available_cond: Condvar,
    global_anchor: Arc<AtomicU8>,
    buffer: Buffer,
}

impl Default for RxCore {
    fn default() -> Self {
        Self::new()
    }
}

impl RxCore {
    pub fn new() -> Self {
        let global_anchor = Arc::new(AtomicU8::new(0));
        Self {
            state: Mutex::new(CoreState::new()),
            available_cond: Condvar::new(),
            buffer: Buffer::new(Arc::clone(&global_anchor)),
            global_anchor,
        }
    }

    /// Sets `active = true` and resets the count-based flush trigger.
    pub fn start(&self) {
        let mut state = self.state.lock().unwrap();
        state.active = true;
        state.receiving_window = 0;
    }

    /// Sets `active = false` and wakes any blocked consumer, which observes
    /// inactivity on recheck (spec §4.3, §8 I8).
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.active = false;
        self.available_cond.notify_all();
    }

    /// Equivalent to [`Self::stop`] plus clearing the buffer, per-port
    /// counters, open ports, and the availability set.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap();
        state.active = false;
        state.to_consume_global_seq = 0;
        state.last_received_global_seq = 0;
        state.receiving_window = 0;
        for (_, anchor) in state.current_port_sequence.iter() {
            anchor.store(0, Ordering::Release);
        }
        state.current_port_sequence.clear();
        state.open_ports.clear();
        state.available_messages.clear();
        self.global_anchor.store(0, Ordering::Release);
        self.buffer.clear();
        self.available_cond.notify_all();
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().unwrap().active
    }

    pub fn open_port(&self, port: u8) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.active {
            return Err(RxError::ModuleInactive);
        }
        if state.open_ports.get(port as usize) {
            return Err(RxError::PortAlreadyOpen(port));
        }
        state.open_ports.set(port as usize);
        state.port_anchor(port);
        Ok(())
    }

    /// Does not drain buffered data for `port` (spec §4.3, §9 open question):
    /// the drop applies only to newly arriving frames.
    pub fn close_port(&self, port: u8) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.active {
            return Err(RxError::ModuleInactive);
        }
        if !state.open_ports.get(port as usize) {
            return Err(RxError::PortAlreadyClosed(port));
        }
        state.open_ports.unset(port as usize);
        Ok(())
    }

    pub fn set_status_interface(&self, sink: Arc<dyn StatusSink>) {
        self.state.lock().unwrap().status_sink = sink;
    }

    pub(crate) fn status_sink_snapshot(&self) -> Arc<dyn StatusSink> {
        Arc::clone(&self.state.lock().unwrap().status_sink)
    }

    pub fn is_new_message_available(&self) -> bool {
        let state = self.state.lock().unwrap();
        state
            .available_messages
            .next_one(0, DEFAULT_MAX_OUT_PORTS)
            .is_some()
    }

    /// The sliding-window anchor `to_consume_global_seq` (spec §3), exposed
    /// for observability: every currently queued packet's `global_seq` is
    /// within `MAX_REORDERING_WINDOW` of this value (invariant 3).
    pub fn to_consume_global_seq(&self) -> u8 {
        self.state.lock().unwrap().to_consume_global_seq
    }

    /// The `global_seq` of every packet currently queued for `port`,
    /// head-to-tail, or an empty vector if the port has no queue yet.
    /// Observability helper, not used by the ingress/consume paths.
    pub fn queued_global_seqs(&self, port: u8) -> Vec<u8> {
        let Some(queue) = self.buffer.get_queue(port) else {
            return Vec::new();
        };
        queue.with_locked_contents(|items| items.iter().map(|p| p.global_seq()).collect())
    }

    /// Snapshot of ports whose queue currently holds at least one packet
    /// (spec §4.2's `Buffer::get_active_queues`).
    pub fn active_queue_ports(&self) -> Vec<u8> {
        self.buffer.get_active_queues()
    }

    /// Entry point from the link (spec §4.3.1). `length` is implied by
    /// `bytes.len()`; frames larger than `MAX_LEN_S3TP_PACKET` are the
    /// driver's responsibility to avoid, not re-checked here.
    pub fn handle_frame(&self, channel: u8, _arq: bool, bytes: &[u8]) -> Result<()> {
        let mut pending_calls: Vec<SinkCall> = Vec::new();
        let mut pending_purges: Vec<u8> = Vec::new();
        let sink;

        {
            let mut state = self.state.lock().unwrap();
            if !state.active {
                return Err(RxError::ModuleInactive);
            }

            if bytes.len() < HEADER_LEN {
                return Err(RxError::Malformed);
            }
            let hdr = Header::decode(bytes);
            let pdu_len = hdr.pdu_length as usize;
            if bytes.len() < HEADER_LEN + pdu_len {
                return Err(RxError::Malformed);
            }
            let payload = &bytes[HEADER_LEN..HEADER_LEN + pdu_len];

            if crc::checksum(payload) != hdr.crc {
                warn!(port = hdr.port, "dropping frame: CRC mismatch");
                return Err(RxError::CrcInvalid);
            }

            match hdr.msg_type {
                MessageType::Sync => {
                    if let Some(sync) = SyncPayload::decode(payload) {
                        self.apply_sync(&mut state, &sync);
                        pending_calls.push(SinkCall::Synchronization(sync.sync_id));
                    }
                    sink = Arc::clone(&state.status_sink);
                    drop(state);
                    self.fire(sink, pending_calls);
                    return Ok(());
                }
                MessageType::Data => {}
                MessageType::Reserved(_) => {
                    warn!(port = hdr.port, "dropping frame: unrecognized message type");
                    return Err(RxError::InvalidType);
                }
            }

            if !state.open_ports.get(hdr.port as usize) {
                warn!(port = hdr.port, "dropping frame: port is closed");
                return Err(RxError::PortClosed);
            }

            let anchor = state.port_anchor(hdr.port);
            let pkt = Packet {
                header: hdr,
                payload: payload.to_vec(),
                channel,
            };
            if let Err(e) = self.buffer.write(pkt, anchor) {
                warn!(port = hdr.port, error = %e, "dropping frame");
                return Err(e);
            }
            debug!(
                port = hdr.port,
                global_seq = hdr.global_seq,
                seq_port = hdr.seq_port,
                "admitted frame"
            );

            if self.check_availability(&state, hdr.port) {
                if !state.available_messages.get(hdr.port as usize) {
                    state.available_messages.set(hdr.port as usize);
                }
                self.available_cond.notify_all();
            }

            let to_consume = state.to_consume_global_seq;
            let new_dist = window_distance(hdr.global_seq, to_consume);
            let cur_dist = window_distance(state.last_received_global_seq, to_consume);
            if (new_dist as u16) < RECEIVING_WINDOW_SIZE && new_dist > cur_dist {
                state.last_received_global_seq = hdr.global_seq;
            }

            state.receiving_window += 1;
            if state.receiving_window >= RECEIVING_WINDOW_SIZE {
                pending_purges = self.flush_queues(&mut state);
                state.receiving_window = 0;
            }

            sink = Arc::clone(&state.status_sink);
        }

        for port in pending_purges {
            self.buffer.clear_queue_for_port(port, sink.as_ref());
        }
        self.fire(sink, pending_calls);
        Ok(())
    }

    /// A SYNC frame repositions both the per-port expected sequence and the
    /// global reordering anchor to what the sender asserts — otherwise data
    /// frames keyed off the new per-port sequence would be rejected by the
    /// still-stale window admission check.
    fn apply_sync(&self, state: &mut CoreState, sync: &SyncPayload) {
        for (port, &seq) in sync.port_seq.iter().enumerate() {
            if seq != 0 {
                let anchor = state.port_anchor(port as u8);
                anchor.store(seq, Ordering::Release);
            }
        }
        state.last_received_global_seq = sync.tx_global_seq;
        state.to_consume_global_seq = sync.tx_global_seq;
        state.receiving_window = 0;
        self.global_anchor.store(sync.tx_global_seq, Ordering::Release);
    }

    /// Availability check (spec §4.3.2): walks the port's queue head-to-tail
    /// under the queue lock, looking for a contiguous fragment run starting
    /// at the expected `seq_port` and ending in `more_fragments = false`.
    fn check_availability(&self, state: &CoreState, port: u8) -> bool {
        let anchor = match state.current_port_sequence.get(&port) {
            Some(a) => a.load(Ordering::Acquire),
            None => return false,
        };
        let queue = match self.buffer.get_queue(port) {
            Some(q) => q,
            None => return false,
        };
        queue.with_locked_contents(|items| {
            let mut fragment: u8 = 0;
            for pkt in items.iter() {
                let expected = anchor.wrapping_add(fragment);
                if pkt.seq_port() != expected {
                    return false;
                }
                if pkt.more_fragments() {
                    if pkt.sub_seq() != fragment {
                        return false;
                    }
                } else if pkt.sub_seq() == fragment {
                    return true;
                } else {
                    return false;
                }
                fragment += 1;
            }
            false
        })
    }

    /// Window flush (spec §4.3.4): identifies queues whose head would violate
    /// invariant 3 once the anchor advances to `last_received_global_seq`,
    /// then advances `to_consume_global_seq`. Returns the ports to purge; the
    /// caller clears them via `Buffer::clear_queue_for_port` (so the
    /// `active_queues` bitset and the status-sink notification go through
    /// `Buffer`'s own contract, spec §4.2) after releasing the RX mutex
    /// (spec §9: the sink must never be called while it is held).
    ///
    /// Per spec §9's "outside the *new* window" framing, the purge check
    /// compares against `last_received_global_seq` (the anchor about to take
    /// effect), not the stale `to_consume_global_seq` — packets admitted
    /// under the old anchor can still be too far from the new one.
    fn flush_queues(&self, state: &mut CoreState) -> Vec<u8> {
        let new_anchor = state.last_received_global_seq;
        let mut to_purge = Vec::new();
        for port in self.buffer.get_active_queues() {
            let Some(queue) = self.buffer.get_queue(port) else {
                continue;
            };
            if queue.is_empty() {
                continue;
            }
            let head = queue.peek();
            if window_distance(head.global_seq(), new_anchor) >= crate::constants::MAX_REORDERING_WINDOW
            {
                state.available_messages.unset(port as usize);
                to_purge.push(port);
            }
        }
        state.to_consume_global_seq = new_anchor;
        self.global_anchor.store(new_anchor, Ordering::Release);
        to_purge
    }

    fn fire(&self, sink: Arc<dyn StatusSink>, calls: Vec<SinkCall>) {
        for call in calls {
            match call {
                SinkCall::Synchronization(sync_id) => sink.on_synchronization(sync_id),
            }
        }
    }

    /// Blocks the calling thread until a message is available or the core
    /// stops. The caller must recheck [`Self::is_active`] and
    /// [`Self::is_new_message_available`] after this returns: spurious
    /// wakeups are possible, and a concurrent `stop()` races freely with the
    /// wakeup this triggers.
    pub fn wait_for_next_available_message(&self) {
        let mut state = self.state.lock().unwrap();
        while state.active
            && state
                .available_messages
                .next_one(0, DEFAULT_MAX_OUT_PORTS)
                .is_none()
        {
            state = self.available_cond.wait(state).unwrap();
        }
    }

    /// Assembles the next complete message for some ready port (lowest
    /// numeric port, for determinism) and returns it (spec §4.3.5).
    pub fn get_next_complete_message(&self) -> Result<(u8, Vec<u8>)> {
        let mut state = self.state.lock().unwrap();
        self.assemble_locked(&mut state)
    }

    /// Idiomatic blocking receive: waits for a message and returns it in one
    /// call, holding the RX mutex internally throughout (spec §9's
    /// recommended replacement for the legacy external-mutex wait contract).
    pub fn recv(&self) -> Result<(u8, Vec<u8>)> {
        let mut state = self.state.lock().unwrap();
        loop {
            if !state.active {
                return Err(RxError::ModuleInactive);
            }
            if state
                .available_messages
                .next_one(0, DEFAULT_MAX_OUT_PORTS)
                .is_some()
            {
                return self.assemble_locked(&mut state);
            }
            state = self.available_cond.wait(state).unwrap();
        }
    }

    fn assemble_locked(&self, state: &mut CoreState) -> Result<(u8, Vec<u8>)> {
        if !state.active {
            return Err(RxError::ModuleInactive);
        }
        let Some(port) = state
            .available_messages
            .next_one(0, DEFAULT_MAX_OUT_PORTS)
        else {
            return Err(RxError::NoMessagesAvailable);
        };
        let port = port as u8;
        let anchor = state.port_anchor(port);

        let mut assembled = Vec::new();
        loop {
            let Some(pkt) = self.buffer.get_next_packet(port) else {
                error!(port, "ready port has no queued packet");
                return Err(RxError::InconsistentState);
            };
            let expected = anchor.load(Ordering::Acquire);
            if pkt.seq_port() != expected {
                error!(
                    port,
                    expected, got = pkt.seq_port(), "packet sequence inconsistent with expected sequence"
                );
                return Err(RxError::InconsistentState);
            }
            assembled.extend_from_slice(&pkt.payload);
            anchor.store(expected.wrapping_add(1), Ordering::Release);
            if !pkt.more_fragments() {
                break;
            }
        }

        if self.check_availability(state, port) {
            state.available_messages.set(port as usize);
            self.available_cond.notify_all();
        } else {
            state.available_messages.unset(port as usize);
        }

        Ok((port, assembled))
    }
}
