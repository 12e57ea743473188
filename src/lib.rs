//! Driver for the Epson S1V30120 text-to-speech coprocessor.
//!
//! The chip sits on a SPI bus with three extra lines: a handshake
//! "ready" line, an active-low reset, and an amplifier mute gate. It
//! boots empty; [`S1v30120::init`] resets it, verifies its identity,
//! uploads the firmware image into its SRAM, and configures the audio
//! path and speech engine. After that, [`S1v30120::speak`] submits
//! text and [`S1v30120::poll_finished`] polls for completion.
//!
//! The driver talks to the hardware through the [`bus::Bus`] trait;
//! [`bus::spi::SpiTransport`] implements it over `embedded-hal` 1.0.

pub use bringup::Step;
pub use bus::Bus;
pub use config::{AudioConfig, Parser, TtsConfig};
pub use error::{Error, Result};
pub use firmware::{FirmwareImage, BLOCK_LEN};
pub use protocol::{
    Opcode, Request, EXPECTED_HARDWARE_VERSION, MAX_MESSAGE_LEN,
    MAX_TEXT_LEN,
};

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

pub mod bringup;
pub mod bus;
pub mod config;
mod error;
pub mod firmware;
mod link;
pub mod protocol;

/// Volume request payload used during bring-up: 0 dB attenuation,
/// i.e. full output
const DEFAULT_VOLUME: u16 = 0x0000;

/// Cached per-device state. Version fields are zeroed whenever an
/// identity check fails; the busy flag only moves through speak/poll.
#[derive(Debug, Default)]
struct Session {
    hardware_version: u16,
    firmware_version: u16,
    firmware_features: u32,
    /// Optimistic: set the moment a speak request is clocked out, so
    /// "busy" means a request was sent, not that the device accepted
    /// it. Cleared only when the finished indication is observed.
    busy: bool,
}

impl Session {
    fn clear_versions(&mut self) {
        self.hardware_version = 0;
        self.firmware_version = 0;
        self.firmware_features = 0;
    }
}

/// Everything behind the exclusive-access gate: the bus and the
/// session caches it protects
#[derive(Debug)]
struct Inner<B> {
    bus: B,
    firmware: FirmwareImage,
    session: Session,
}

/// Handle to one S1V30120. Every operation that touches the bus takes
/// the internal gate first, so the handle can be shared across threads
/// and concurrent calls serialize into strictly sequential bus
/// transactions.
#[derive(Debug)]
pub struct S1v30120<B> {
    inner: Mutex<Inner<B>>,
}

impl<B: Bus> S1v30120<B> {
    /// Wrap a bus attachment and the firmware image to upload during
    /// bring-up. No bus traffic happens until [`init`](Self::init).
    pub fn new(bus: B, firmware: FirmwareImage) -> Self {
        Self {
            inner: Mutex::new(Inner {
                bus,
                firmware,
                session: Session::default(),
            }),
        }
    }

    /// Take the exclusive gate. A poisoned gate means a panic landed
    /// mid-transaction; the link is desynchronized either way and only
    /// a fresh `init` recovers it, so the lock itself stays usable.
    fn gate(&self) -> MutexGuard<'_, Inner<B>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Full bring-up: reset, verify hardware identity, upload and
    /// start the firmware, register the host interface, re-verify,
    /// then configure audio, volume and the speech engine with the
    /// given markup parser.
    ///
    /// Any failure aborts the whole sequence; there is no partial
    /// retry. Calling again is safe and starts over from reset, so
    /// repeated calls yield identical version readouts absent real
    /// hardware failure.
    pub fn init(&self, parser: Parser) -> Result<()> {
        let mut inner = self.gate();
        let mut step = Step::Reset;
        while step != Step::Ready {
            debug!(?step, "bring-up");
            match inner.run_step(step, parser) {
                Ok(()) => step = step.advance(),
                Err(err) => {
                    step = Step::Failed;
                    warn!(?step, %err, "bring-up aborted");
                    return Err(err);
                }
            }
        }
        debug!(
            hardware = inner.session.hardware_version,
            firmware = inner.session.firmware_version,
            "device ready"
        );
        Ok(())
    }

    /// Submit text to speak. Empty text is a no-op success that never
    /// touches the bus; text over [`MAX_TEXT_LEN`] bytes is truncated,
    /// not rejected. `mute` drives the amplifier gate for the whole
    /// utterance. With `flush` set the device drops whatever it is
    /// currently saying and starts this text; without it the device
    /// itself queues the text behind the current utterance.
    ///
    /// On return the session is marked busy even though only the
    /// acknowledgment, not completion, has been seen; poll with
    /// [`poll_finished`](Self::poll_finished).
    pub fn speak(&self, text: &str, mute: bool, flush: bool) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let mut inner = self.gate();
        inner.session.busy = true;
        inner.bus.set_mute(mute)?;
        let mut req = Request::new(Opcode::TtsSpeakReq);
        req.push_u8(u8::from(flush));
        req.push_text(text);
        inner.exchange(&req, Opcode::TtsSpeakResp)
    }

    /// One bus exchange asking whether the device has raised its
    /// finished indication since the last check. Observing it clears
    /// the busy flag and returns `true`; a quiet device returns
    /// `false` with busy left set. The indication is unsolicited, so
    /// only a quiet response line means "nothing to report yet" —
    /// once the line goes high, a fault inside the transaction is a
    /// real error.
    pub fn poll_finished(&self) -> Result<bool> {
        let mut inner = self.gate();
        if link::poll_indication(&mut inner.bus, Opcode::TtsFinishedInd)? {
            inner.session.busy = false;
            return Ok(true);
        }
        Ok(false)
    }

    /// Cached busy flag; no bus access
    pub fn is_running(&self) -> bool {
        self.gate().session.busy
    }

    /// Pause (`true`) or resume (`false`) the current utterance
    pub fn pause(&self, pause: bool) -> Result<()> {
        let mut req = Request::new(Opcode::TtsPauseReq);
        req.push_u8(u8::from(pause));
        self.gate().exchange(&req, Opcode::TtsPauseResp)
    }

    /// Stop the current utterance immediately
    pub fn stop(&self) -> Result<()> {
        let req = Request::new(Opcode::TtsStopReq);
        self.gate().exchange(&req, Opcode::TtsStopResp)
    }

    /// Set the analogue output gain. Zero is full output.
    pub fn set_volume(&self, gain: u16) -> Result<()> {
        let mut req = Request::new(Opcode::AudioVolumeReq);
        req.push_u16(gain);
        self.gate().exchange(&req, Opcode::AudioVolumeResp)
    }

    /// Protocol-level mute, independent of the GPIO mute gate
    pub fn set_device_mute(&self, mute: bool) -> Result<()> {
        let mut req = Request::new(Opcode::AudioMuteReq);
        req.push_u16(u16::from(mute));
        self.gate().exchange(&req, Opcode::AudioMuteResp)
    }

    /// Hardware version from the last successful identity check, or
    /// zero after a failed one
    pub fn hardware_version(&self) -> u16 {
        self.gate().session.hardware_version
    }

    /// Firmware version from the last successful identity check, or
    /// zero after a failed one
    pub fn firmware_version(&self) -> u16 {
        self.gate().session.firmware_version
    }

    /// Firmware feature bitmask from the last successful identity
    /// check
    pub fn firmware_features(&self) -> u32 {
        self.gate().session.firmware_features
    }
}

impl<B: Bus> Inner<B> {
    /// Send one request and require its success acknowledgment
    fn exchange(&mut self, req: &Request, expected: Opcode) -> Result<()> {
        link::send_request(&mut self.bus, req)?;
        link::read_ack(&mut self.bus, expected)
    }

    /// Query the version report and cache it. Anything but the one
    /// expected hardware version invalidates the cache and fails.
    fn refresh_version(&mut self) -> Result<()> {
        link::send_request(&mut self.bus, &Request::new(Opcode::VersionReq))?;
        match link::read_version(&mut self.bus) {
            Ok(report) if report.hardware == EXPECTED_HARDWARE_VERSION => {
                self.session.hardware_version = report.hardware;
                self.session.firmware_version = report.firmware;
                self.session.firmware_features = report.features;
                Ok(())
            }
            Ok(report) => {
                self.session.clear_versions();
                Err(Error::WrongHardware(report.hardware))
            }
            Err(err) => {
                self.session.clear_versions();
                Err(err)
            }
        }
    }

    /// Execute the bus work for one bring-up step
    fn run_step(&mut self, step: Step, parser: Parser) -> Result<()> {
        match step {
            Step::Reset => {
                self.session = Session::default();
                self.bus.hard_reset()
            }
            Step::VerifyHardware | Step::VerifyFirmware => {
                self.refresh_version()
            }
            Step::LoadFirmware => {
                firmware::upload(&mut self.bus, &self.firmware)
            }
            Step::Run => self.exchange(
                &Request::new(Opcode::BootRunReq),
                Opcode::BootRunResp,
            ),
            Step::Register => {
                let mut req = Request::new(Opcode::RegisterReq);
                req.push_slice(&[0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);
                self.exchange(&req, Opcode::RegisterResp)
            }
            Step::ConfigureAudio => {
                let mut req = Request::new(Opcode::AudioConfigReq);
                AudioConfig::default().encode(&mut req);
                self.exchange(&req, Opcode::AudioConfigResp)
            }
            Step::SetVolume => {
                let mut req = Request::new(Opcode::AudioVolumeReq);
                req.push_u16(DEFAULT_VOLUME);
                self.exchange(&req, Opcode::AudioVolumeResp)
            }
            Step::ConfigureTts => {
                let mut req = Request::new(Opcode::TtsConfigReq);
                TtsConfig {
                    parser,
                    ..TtsConfig::default()
                }
                .encode(&mut req);
                self.exchange(&req, Opcode::TtsConfigResp)
            }
            // terminal states do no bus work
            Step::Ready | Step::Failed => Ok(()),
        }
    }
}

#[cfg(test)]
pub(crate) mod testutil;
