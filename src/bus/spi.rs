//! [`Bus`] implementation over `embedded-hal` 1.0 SPI and GPIO traits

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiBus;
use tracing::{debug, trace};

use super::{bus_fault, Bus};
use crate::{Error, Result};

/// How long the reset line is held asserted
const RESET_HOLD_MS: u32 = 10;
/// Boot settle time after the reset line is released
const BOOT_SETTLE_MS: u32 = 150;
/// Spacing between handshake-line polls
const POLL_INTERVAL_US: u32 = 1000;
/// Default number of polls before a handshake wait gives up. At 1 ms
/// spacing this bounds a dead device to a 2 s hang; the longest
/// legitimate pause observed on real hardware is well under that.
const DEFAULT_POLL_BUDGET: u32 = 2000;

/// S1V30120 attachment over a raw SPI bus with manually driven chip
/// select and handshake lines.
///
/// The SPI peripheral must be configured for mode 3 (CPOL=1, CPHA=1),
/// MSB-first bit order, at roughly 750 kHz; chip select is a plain
/// GPIO because the protocol needs long settle delays between
/// asserting it and clocking the first byte.
#[derive(Debug)]
pub struct SpiTransport<SPI, CS, RST, RDY, MUTE, D> {
    spi: SPI,
    cs: CS,
    reset: RST,
    ready: RDY,
    mute: MUTE,
    delay: D,
    poll_budget: u32,
}

impl<SPI, CS, RST, RDY, MUTE, D> SpiTransport<SPI, CS, RST, RDY, MUTE, D>
where
    SPI: SpiBus,
    CS: OutputPin,
    RST: OutputPin,
    RDY: InputPin,
    MUTE: OutputPin,
    D: DelayNs,
{
    pub fn new(
        spi: SPI,
        cs: CS,
        reset: RST,
        ready: RDY,
        mute: MUTE,
        delay: D,
    ) -> Self {
        Self {
            spi,
            cs,
            reset,
            ready,
            mute,
            delay,
            poll_budget: DEFAULT_POLL_BUDGET,
        }
    }

    /// Override the handshake poll budget (number of 1 ms polls before
    /// a wait reports [`Error::Timeout`])
    #[must_use]
    pub fn with_poll_budget(mut self, polls: u32) -> Self {
        self.poll_budget = polls;
        self
    }

    fn wait_line(&mut self, high: bool, what: &'static str) -> Result<()> {
        for _ in 0..self.poll_budget {
            if self.ready.is_high().map_err(bus_fault)? == high {
                return Ok(());
            }
            self.delay.delay_us(POLL_INTERVAL_US);
        }
        Err(Error::Timeout(what))
    }
}

impl<SPI, CS, RST, RDY, MUTE, D> Bus
    for SpiTransport<SPI, CS, RST, RDY, MUTE, D>
where
    SPI: SpiBus,
    CS: OutputPin,
    RST: OutputPin,
    RDY: InputPin,
    MUTE: OutputPin,
    D: DelayNs,
{
    fn hard_reset(&mut self) -> Result<()> {
        debug!("hard reset");
        self.mute.set_low().map_err(bus_fault)?;
        self.cs.set_high().map_err(bus_fault)?;
        self.reset.set_low().map_err(bus_fault)?;
        // one dummy byte while in reset re-locks the clock idle level
        // for mode 3
        self.spi.write(&[0x00]).map_err(bus_fault)?;
        self.spi.flush().map_err(bus_fault)?;
        self.delay.delay_ms(RESET_HOLD_MS);
        self.reset.set_high().map_err(bus_fault)?;
        self.delay.delay_ms(BOOT_SETTLE_MS);
        Ok(())
    }

    fn wait_clear_to_send(&mut self) -> Result<()> {
        self.wait_line(false, "ready-to-receive line")
    }

    fn wait_response_ready(&mut self) -> Result<()> {
        self.wait_line(true, "response-available line")
    }

    fn select(&mut self) -> Result<()> {
        self.cs.set_low().map_err(bus_fault)
    }

    fn deselect(&mut self) -> Result<()> {
        self.spi.flush().map_err(bus_fault)?;
        self.cs.set_high().map_err(bus_fault)
    }

    fn transfer(&mut self) -> Result<u8> {
        let mut word = [0x00];
        self.spi.transfer_in_place(&mut word).map_err(bus_fault)?;
        Ok(word[0])
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        trace!(len = data.len(), "write block");
        self.spi.write(data).map_err(bus_fault)?;
        self.spi.flush().map_err(bus_fault)
    }

    fn settle(&mut self, micros: u32) -> Result<()> {
        self.delay.delay_us(micros);
        Ok(())
    }

    fn set_mute(&mut self, mute: bool) -> Result<()> {
        if mute {
            self.mute.set_high().map_err(bus_fault)
        } else {
            self.mute.set_low().map_err(bus_fault)
        }
    }
}
