//! Receive-side core of the S3TP reliable-transport protocol.
//!
//! This crate owns everything on the inbound path above a single
//! ARQ-capable link and below the application: 8-byte header validation,
//! per-port sliding-window reordering, fragment reassembly, and the
//! condition-variable handoff that lets consumer threads block until a
//! complete message is ready. The link driver, the transmit/segmentation
//! side, and the socket/IPC surface above this crate are all out of scope —
//! see [`driver`] for the seam where link callbacks enter.
//!
//! ```no_run
//! use std::sync::Arc;
//! use s3tp_core::core::RxCore;
//!
//! let core = Arc::new(RxCore::new());
//! core.start();
//! core.open_port(3).unwrap();
//! // core.handle_frame(channel, arq, &bytes)?; // called by the driver
//! let (port, message) = core.recv().unwrap();
//! # let _ = (port, message);
//! ```

pub mod bitset;
pub mod buffer;
pub mod constants;
pub mod core;
pub mod crc;
pub mod driver;
pub mod error;
pub mod flat_map;
pub mod header;
pub mod packet;
pub mod queue;
pub mod status;

pub use core::RxCore;
pub use driver::DriverAdapter;
pub use error::{Result, RxError};
pub use status::{NullStatusSink, StatusSink};
