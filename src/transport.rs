//! Realtime transport abstraction
//!
//! This module defines the trait for tunneling outbound events from the
//! engine to connected clients. The tunnel abstraction allows different
//! communication mechanisms (WebSockets, Server-Sent Events, test
//! harnesses) while maintaining a consistent interface. The engine never
//! owns or closes connections; the transport layer does.

use crate::engine::OutgoingEvent;

/// Trait for sending events through a communication tunnel
///
/// The engine looks tunnels up by connection identifier at send time
/// (the `tunnel_finder` closures throughout the engine), so a client
/// whose connection dropped is silently skipped rather than buffered.
pub trait Tunnel {
    /// Sends an outbound event to the client
    ///
    /// # Arguments
    ///
    /// * `event` - The event to deliver
    fn send_event(&self, event: &OutgoingEvent);
}
