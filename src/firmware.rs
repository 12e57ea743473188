//! Firmware image handling: the device boots from mask ROM and runs
//! nothing useful until a firmware image is loaded into its SRAM in
//! bounded blocks, each acknowledged before the next is sent.

use tracing::{debug, trace};

use crate::bus::Bus;
use crate::link;
use crate::protocol::{Opcode, Request, SYNC};
use crate::{Error, Result};

/// Largest payload a single boot-load request may carry (2048 bytes of
/// message minus the 4-byte header)
pub const BLOCK_LEN: usize = 2044;

/// Settle time between asserting chip select and clocking a block
const BLOCK_SETTLE_US: u32 = 20_000;
/// Settle time after a block before chip select is released
const BLOCK_TAIL_SETTLE_US: u32 = 1_000;

/// Immutable firmware image, fixed at build time by the application.
/// The vendor init-data blob is licensed material, so the crate does
/// not embed one; pass the byte array your board support package
/// ships.
#[derive(Copy, Clone, Debug)]
pub struct FirmwareImage {
    data: &'static [u8],
}

impl FirmwareImage {
    pub const fn new(data: &'static [u8]) -> Self {
        Self { data }
    }

    pub const fn len(&self) -> usize {
        self.data.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Split into upload blocks: every full [`BLOCK_LEN`] chunk, then
    /// exactly one remainder block. The remainder block is sent even
    /// when it is empty; the device tolerates the zero-length frame
    /// and the load protocol has always been driven this way.
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks {
            data: self.data,
            offset: 0,
            done: false,
        }
    }
}

/// Iterator over upload blocks, full blocks first, one trailing
/// remainder block last
#[derive(Debug)]
pub struct Blocks<'img> {
    data: &'img [u8],
    offset: usize,
    done: bool,
}

impl<'img> Iterator for Blocks<'img> {
    type Item = &'img [u8];

    fn next(&mut self) -> Option<&'img [u8]> {
        if self.done {
            return None;
        }
        if self.offset + BLOCK_LEN <= self.data.len() {
            let block = &self.data[self.offset..self.offset + BLOCK_LEN];
            self.offset += BLOCK_LEN;
            Some(block)
        } else {
            self.done = true;
            Some(&self.data[self.offset..])
        }
    }
}

/// Clock one boot-load frame out. Unlike every other request this does
/// not wait for the ready line; the device is in boot mode and accepts
/// blocks back to back once the previous one is acknowledged.
fn send_block<B: Bus>(bus: &mut B, block: &[u8]) -> Result<()> {
    let mut req = Request::new(Opcode::BootLoadReq);
    req.push_slice(block);
    let frame = req.to_bytes();
    bus.select()?;
    bus.settle(BLOCK_SETTLE_US)?;
    bus.write(&[SYNC])?;
    bus.write(&frame)?;
    bus.settle(BLOCK_TAIL_SETTLE_US)?;
    bus.deselect()
}

/// Drive the block-by-block load protocol. The first rejected block
/// aborts the upload; there is no retry and no rollback, the device is
/// left in an undefined state until the next full bring-up.
pub(crate) fn upload<B: Bus>(bus: &mut B, image: &FirmwareImage) -> Result<()> {
    debug!(len = image.len(), "uploading firmware image");
    for (index, block) in image.blocks().enumerate() {
        trace!(index, len = block.len(), "firmware block");
        send_block(bus, block)?;
        link::read_ack(bus, Opcode::BootLoadResp).map_err(|err| match err {
            Error::ResultCode { .. } => {
                Error::FirmwareBlockRejected { index }
            }
            other => other,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::{Event, ScriptedBus};

    #[test]
    fn split_4096_gives_two_full_blocks_and_a_tail() {
        let image = FirmwareImage::new(&[0u8; 4096]);
        let sizes: Vec<usize> =
            image.blocks().map(<[u8]>::len).collect();
        assert_eq!(sizes, [2044, 2044, 8]);
    }

    #[test]
    fn exact_multiple_still_sends_a_trailing_empty_block() {
        let image = FirmwareImage::new(&[0u8; 4088]);
        let sizes: Vec<usize> =
            image.blocks().map(<[u8]>::len).collect();
        assert_eq!(sizes, [2044, 2044, 0]);
    }

    #[test]
    fn empty_image_is_one_empty_block() {
        let image = FirmwareImage::new(&[]);
        let sizes: Vec<usize> =
            image.blocks().map(<[u8]>::len).collect();
        assert_eq!(sizes, [0]);
    }

    #[test]
    fn upload_frames_every_block_and_requires_each_ack() {
        let bus = ScriptedBus::new();
        for _ in 0..3 {
            bus.queue_ack(Opcode::BootLoadResp as u16, 0x0001);
        }
        let mut handle = bus.clone();
        upload(&mut handle, &FirmwareImage::new(&[0xAB; 4096])).unwrap();

        // block sends go out without the ready-line wait; only the
        // acknowledgment reads touch the handshake line
        assert!(
            !bus.log().contains(&Event::WaitClearToSend),
            "boot-load blocks must not wait for the ready line"
        );

        // sync bytes interleave with the frames; keep the frames only
        let frames: Vec<Vec<u8>> = bus
            .written()
            .into_iter()
            .filter(|w| w.len() > 1)
            .collect();
        assert_eq!(frames.len(), 3);
        for (frame, expect_len) in frames.iter().zip([2048u16, 2048, 12])
        {
            assert_eq!(
                u16::from_le_bytes([frame[0], frame[1]]),
                expect_len
            );
            assert_eq!(&frame[2..4], &[0x00, 0x10]);
            assert_eq!(frame.len(), expect_len as usize);
        }
    }

    #[test]
    fn first_rejected_block_aborts_the_upload() {
        let bus = ScriptedBus::new();
        bus.queue_ack(Opcode::BootLoadResp as u16, 0x0001);
        bus.queue_ack(Opcode::BootLoadResp as u16, 0x0000); // rejection
        let mut handle = bus.clone();
        let err = upload(&mut handle, &FirmwareImage::new(&[0xAB; 4096]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::FirmwareBlockRejected { index: 1 }
        ));
        // block 2 was never sent
        let frames = bus
            .written()
            .into_iter()
            .filter(|w| w.len() > 1)
            .count();
        assert_eq!(frames, 2);
    }
}
