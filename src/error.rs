use thiserror::Error;

/// Errors surfaced by the RX core to its callers.
///
/// Frame-level transient errors (`CrcInvalid`, `PortClosed`, `InvalidType`,
/// `QueueFull`, `WindowExceeded`) leave core state untouched: the frame is
/// dropped and the error is returned. `InconsistentState` indicates a lost
/// protocol invariant rather than bad input; the core remains usable but the
/// affected message is lost.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RxError {
    #[error("module is not active")]
    ModuleInactive,
    #[error("port {0} is already open")]
    PortAlreadyOpen(u8),
    #[error("port {0} is already closed")]
    PortAlreadyClosed(u8),
    #[error("checksum validation failed")]
    CrcInvalid,
    #[error("frame destined for a closed port")]
    PortClosed,
    #[error("frame carries an unrecognized message type")]
    InvalidType,
    #[error("frame is shorter than its header and declared payload length")]
    Malformed,
    #[error("no reassembled message is currently available")]
    NoMessagesAvailable,
    #[error("packet sequence is inconsistent with expected per-port sequence")]
    InconsistentState,
    #[error("port queue is at capacity")]
    QueueFull,
    #[error("packet falls outside the reordering window")]
    WindowExceeded,
}

pub type Result<T> = std::result::Result<T, RxError>;
