//! Frame-level exchange sequencing: handshake waits, chip-select
//! bracketing, the sync-byte discipline and per-response padding.
//!
//! The settle delays here are characterized from the hardware and are
//! part of the protocol, not tunable policy.

use tracing::trace;

use crate::bus::Bus;
use crate::protocol::{Opcode, Request, ResponseHeader, VersionReport, SYNC};
use crate::{Error, Result};

/// Settle time after asserting chip select before a command is clocked
pub(crate) const COMMAND_SETTLE_US: u32 = 200_000;
/// Settle time before an acknowledgment response is clocked in. The
/// version read skips this, matching the device's observed behaviour.
pub(crate) const RESPONSE_SETTLE_US: u32 = 20_000;
/// Discarded bytes allowed before the response sync marker shows up
const SYNC_SPIN_LIMIT: usize = 64;

/// Wait for the device to accept a command, then clock out the sync
/// byte and the frame. Chip select stays asserted; the matching
/// response read releases it.
pub(crate) fn send_request<B: Bus>(bus: &mut B, req: &Request) -> Result<()> {
    let frame = req.to_bytes();
    trace!(opcode = ?req.opcode(), len = frame.len(), "send request");
    bus.wait_clear_to_send()?;
    bus.select()?;
    bus.settle(COMMAND_SETTLE_US)?;
    bus.write(&[SYNC])?;
    bus.write(&frame)
}

/// Spin (bounded) until the sync marker is clocked in
pub(crate) fn wait_sync<B: Bus>(bus: &mut B) -> Result<()> {
    for _ in 0..SYNC_SPIN_LIMIT {
        if bus.transfer()? == SYNC {
            return Ok(());
        }
    }
    Err(Error::Timeout("response sync byte"))
}

fn read_exact<B: Bus, const N: usize>(bus: &mut B) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    for byte in &mut buf {
        *byte = bus.transfer()?;
    }
    Ok(buf)
}

/// Clock in and discard the trailing padding; the device requires the
/// transaction to be fully drained even though the tail carries no
/// information
fn drain<B: Bus>(bus: &mut B, count: usize) -> Result<()> {
    for _ in 0..count {
        bus.transfer()?;
    }
    Ok(())
}

/// Sync marker, `N` body bytes, padding. Chip select must already be
/// asserted; the caller releases it whether or not this succeeds.
fn read_frame<B: Bus, const N: usize>(
    bus: &mut B,
    pad: usize,
) -> Result<[u8; N]> {
    wait_sync(bus)?;
    let raw = read_exact::<B, N>(bus)?;
    drain(bus, pad)?;
    Ok(raw)
}

/// Read the acknowledgment now waiting on the bus and require it to be
/// the success acknowledgment for `expected`. Chip select is released
/// on every path, even a mid-transaction fault, so an error never
/// leaves the link held.
fn finish_ack<B: Bus>(bus: &mut B, expected: Opcode) -> Result<()> {
    bus.select()?;
    bus.settle(RESPONSE_SETTLE_US)?;
    let raw = read_frame::<B, 6>(bus, expected.trailing_pad());
    bus.deselect()?;
    let header = ResponseHeader::parse(raw?);
    trace!(?header, "response");
    header.expect(expected)
}

/// Wait for a response and require the success acknowledgment for
/// `expected`
pub(crate) fn read_ack<B: Bus>(bus: &mut B, expected: Opcode) -> Result<()> {
    bus.wait_response_ready()?;
    finish_ack(bus, expected)
}

/// Check for an unsolicited indication. A quiet response line means
/// "nothing to report" and returns `Ok(false)`; once the line goes
/// high the transaction is committed and any fault inside it is a real
/// error, not a quiet line.
pub(crate) fn poll_indication<B: Bus>(
    bus: &mut B,
    expected: Opcode,
) -> Result<bool> {
    match bus.wait_response_ready() {
        Ok(()) => finish_ack(bus, expected).map(|()| true),
        Err(Error::Timeout(_)) => Ok(false),
        Err(err) => Err(err),
    }
}

/// Read the 20-byte structured version response
pub(crate) fn read_version<B: Bus>(bus: &mut B) -> Result<VersionReport> {
    bus.wait_response_ready()?;
    bus.select()?;
    let raw =
        read_frame::<B, 20>(bus, Opcode::VersionResp.trailing_pad());
    bus.deselect()?;
    VersionReport::parse(&raw?)
}
