//! Abstraction over the physical bus (SPI plus handshake GPIOs) so the
//! driver core can run against real hardware or a scripted test double

use std::fmt::Debug;

use crate::{Error, Result};

pub mod spi;

/// Byte-level access to the S1V30120 plus its control lines. One
/// implementation per physical attachment; the driver owns exactly one
/// and funnels every transaction through it.
///
/// Implementations must bound their handshake waits and report an
/// expired budget as [`Error::Timeout`] rather than spinning forever.
pub trait Bus {
    /// Pulse the reset line: mute gate off, chip select released,
    /// reset asserted for at least 10 ms with one dummy byte clocked
    /// to re-lock the bus clock idle level, then at least 150 ms for
    /// the device to boot. Failure here is only detected by the
    /// protocol steps that follow.
    fn hard_reset(&mut self) -> Result<()>;

    /// Block until the ready line is at the accept level (low), i.e.
    /// the device can take a new command
    fn wait_clear_to_send(&mut self) -> Result<()>;

    /// Block until the ready line reports a response waiting (high)
    fn wait_response_ready(&mut self) -> Result<()>;

    /// Assert chip select
    fn select(&mut self) -> Result<()>;

    /// Release chip select, ending the transaction
    fn deselect(&mut self) -> Result<()>;

    /// Clock one dummy byte out and return the byte clocked in
    fn transfer(&mut self) -> Result<u8>;

    /// Clock a block of bytes out, ignoring the inbound bytes
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Hold the bus quiet for the given number of microseconds. The
    /// protocol's settle times are hardware-characterized constants
    /// owned by the link layer.
    fn settle(&mut self, micros: u32) -> Result<()>;

    /// Drive the external amplifier mute gate
    fn set_mute(&mut self, mute: bool) -> Result<()>;
}

/// Map a HAL-level error into [`Error::Bus`], keeping its debug
/// rendering for diagnostics
pub(crate) fn bus_fault<E: Debug>(err: E) -> Error {
    Error::Bus(format!("{err:?}"))
}
