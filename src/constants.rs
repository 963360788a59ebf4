//! Compile-time tunables for the receive-side core.
//!
//! `RECEIVING_WINDOW_SIZE` and `MAX_REORDERING_WINDOW` must stay `<= 128` so
//! that modulo-256 "less than" comparisons (see [`crate::header::window_distance`])
//! remain unambiguous, and the latter must stay strictly smaller than the
//! former (spec §9).

/// Maximum encoded frame length accepted from the link, header included.
pub const MAX_LEN_S3TP_PACKET: usize = 1024;

/// Fixed wire header size in bytes.
pub const HEADER_LEN: usize = 8;

/// Largest PDU payload a header's 14-bit length field can express.
pub const MAX_PDU_LENGTH: usize = (1 << 14) - 1;

/// Number of admitted data packets between successive window flushes.
pub const RECEIVING_WINDOW_SIZE: u16 = 64;

/// Maximum modular distance from `to_consume_global_seq` a queued packet may have.
pub const MAX_REORDERING_WINDOW: u8 = 32;

/// Memory cap backing [`crate::queue::MAX_QUEUE_CAPACITY`].
pub const QUEUE_MEMORY_CAP_BYTES: usize = 1 << 20;

/// Derived bound on queued packets per port: `QUEUE_MEMORY_CAP_BYTES` divided
/// by a conservative worst-case packet footprint (header + max PDU).
pub const MAX_QUEUE_CAPACITY: usize = QUEUE_MEMORY_CAP_BYTES / (HEADER_LEN + MAX_PDU_LENGTH);

/// Logical ports a single core tracks concurrently (0..127, port is 7 bits).
pub const DEFAULT_MAX_OUT_PORTS: usize = 128;

/// Link channels 0..7; channel 7 is transmit-only telemetry.
pub const TELEMETRY_CHANNEL: u8 = 7;

const _: () = assert!(RECEIVING_WINDOW_SIZE as u32 <= 128);
const _: () = assert!((MAX_REORDERING_WINDOW as u16) < RECEIVING_WINDOW_SIZE);
