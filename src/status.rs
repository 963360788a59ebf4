//! Outbound status sink (spec §6): notifies the owner of the core about link
//! transitions, channel-available events, and synchronization completion.
//!
//! Implementations must be non-reentrant with respect to the core: `handle_frame`
//! never calls back into the driver and never holds the RX mutex across a
//! sink callback (spec §9 "Callback thread safety"), so a `StatusSink` may
//! freely call back into the owning application, but must not call back into
//! the [`crate::core::RxCore`] it was installed on from within a callback.
pub trait StatusSink: Send + Sync {
    /// The physical link transitioned up (`true`) or down (`false`).
    fn on_link_status_changed(&self, up: bool);

    /// A channel's writability changed, or a port's queue was drained by a
    /// window flush (`writable = true` covers both "driver buffer empty" and
    /// "queue cleared", matching the teacher-adapted driver contract in spec §4.4).
    fn on_channel_status_changed(&self, channel: u8, writable: bool);

    /// A `SYNC` frame was processed and `sync_id` re-anchored the session.
    fn on_synchronization(&self, sync_id: u32);
}

/// A [`StatusSink`] that discards every notification. Useful as a default
/// when the owner only cares about `handle_frame`'s return value.
#[derive(Debug, Default)]
pub struct NullStatusSink;

impl StatusSink for NullStatusSink {
    fn on_link_status_changed(&self, _up: bool) {}
    fn on_channel_status_changed(&self, _channel: u8, _writable: bool) {}
    fn on_synchronization(&self, _sync_id: u32) {}
}
