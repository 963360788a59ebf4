//! Packet and sync-record types (spec §3).

use crate::constants::DEFAULT_MAX_OUT_PORTS;
use crate::header::Header;

/// A frame after admission into the core: header plus its payload bytes and
/// the out-of-band channel tag the link supplied.
///
/// Owned by the [`crate::buffer::Buffer`] after `write` succeeds; dropped
/// when popped and consumed, or when its queue is cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    pub payload: Vec<u8>,
    pub channel: u8,
}

impl Packet {
    pub fn global_seq(&self) -> u8 {
        self.header.global_seq
    }

    pub fn sub_seq(&self) -> u8 {
        self.header.sub_seq
    }

    pub fn seq_port(&self) -> u8 {
        self.header.seq_port
    }

    pub fn port(&self) -> u8 {
        self.header.port
    }

    pub fn more_fragments(&self) -> bool {
        self.header.more_fragments
    }
}

/// A sync record's per-port expectation entry: the next expected `seq_port`
/// value per port, zero meaning "no information" (spec §3).
pub const MAX_PORTS: usize = DEFAULT_MAX_OUT_PORTS;

/// Fixed sync record carried as the payload of a `SYNC` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPayload {
    pub sync_id: u32,
    pub tx_global_seq: u8,
    pub port_seq: [u8; MAX_PORTS],
}

impl SyncPayload {
    /// Decodes a sync record from a SYNC frame's payload bytes.
    ///
    /// Layout: 4-byte little-endian `sync_id`, 1-byte `tx_global_seq`, then
    /// one byte per port in `port_seq`.
    ///
    /// Precondition: `bytes.len() >= 5 + MAX_PORTS`.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 5 + MAX_PORTS {
            return None;
        }
        let sync_id = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let tx_global_seq = bytes[4];
        let mut port_seq = [0u8; MAX_PORTS];
        port_seq.copy_from_slice(&bytes[5..5 + MAX_PORTS]);
        Some(SyncPayload {
            sync_id,
            tx_global_seq,
            port_seq,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(5 + MAX_PORTS);
        buf.extend_from_slice(&self.sync_id.to_le_bytes());
        buf.push(self.tx_global_seq);
        buf.extend_from_slice(&self.port_seq);
        buf
    }
}
