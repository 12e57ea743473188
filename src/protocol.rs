//! Message framing for the S1V30120 ISC protocol
//!
//! Every message is `[len_lo, len_hi, op_lo, op_hi, payload...]` where
//! the length field counts the whole message including the two length
//! bytes themselves. On the wire each message is preceded by a single
//! [`SYNC`] marker byte.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use tracing::warn;

use crate::{Error, Result};

/// Sync marker preceding every message in either direction
pub const SYNC: u8 = 0xAA;

/// Longest text the speak request accepts; anything longer is truncated
pub const MAX_TEXT_LEN: usize = 248;

/// Largest framed text message: [`MAX_TEXT_LEN`] plus length field,
/// opcode, flush flag, NUL terminator and the sync byte
pub const MAX_MESSAGE_LEN: usize = MAX_TEXT_LEN + 7;

/// Hardware version the S1V30120 reports; anything else means the chip
/// on the bus is not the one this driver knows how to drive
pub const EXPECTED_HARDWARE_VERSION: u16 = 0x0402;

/// Message opcodes, from the S1V30120 protocol specification
#[derive(Copy, Clone, Debug, FromPrimitive, PartialEq, Eq)]
#[repr(u16)]
#[allow(missing_docs)]
pub enum Opcode {
    /// Fatal error indication raised by the device itself
    ErrorInd = 0x0000,
    RegisterReq = 0x0003,
    RegisterResp = 0x0004,
    VersionReq = 0x0005,
    VersionResp = 0x0006,
    /// Sent in place of the expected response when the device refuses
    /// a request in its current state
    MsgBlockedResp = 0x0007,
    AudioConfigReq = 0x0008,
    AudioConfigResp = 0x0009,
    AudioVolumeReq = 0x000A,
    AudioVolumeResp = 0x000B,
    AudioMuteReq = 0x000C,
    AudioMuteResp = 0x000D,
    TtsConfigReq = 0x0012,
    TtsConfigResp = 0x0013,
    TtsSpeakReq = 0x0014,
    TtsSpeakResp = 0x0015,
    TtsPauseReq = 0x0016,
    TtsPauseResp = 0x0017,
    TtsStopReq = 0x0018,
    TtsStopResp = 0x0019,
    TtsReadyInd = 0x0020,
    TtsFinishedInd = 0x0021,
    BootLoadReq = 0x1000,
    BootLoadResp = 0x1001,
    BootRunReq = 0x1002,
    BootRunResp = 0x1003,
}

impl Opcode {
    /// Result code this response reports on success. The boot-mode
    /// responses use 0x0001 where everything else uses 0x0000.
    pub(crate) const fn success_code(self) -> u16 {
        match self {
            Self::BootLoadResp | Self::BootRunResp => 0x0001,
            _ => 0x0000,
        }
    }

    /// Number of trailing padding bytes the device expects to see
    /// clocked after this response. Draining the wrong count
    /// desynchronizes the next transaction.
    pub(crate) const fn trailing_pad(self) -> usize {
        match self {
            Self::BootRunResp => 8,
            _ => 16,
        }
    }
}

/// Outbound request under construction. Owns its payload; the
/// length-prefixed frame is produced fresh by [`Request::to_bytes`].
#[derive(Debug)]
pub struct Request {
    opcode: Opcode,
    payload: Vec<u8>,
}

impl Request {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            payload: Vec::new(),
        }
    }

    pub const fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn push_u8(&mut self, val: u8) {
        self.payload.push(val);
    }

    pub fn push_u16(&mut self, val: u16) {
        self.payload.extend_from_slice(&val.to_le_bytes());
    }

    pub fn push_slice(&mut self, data: &[u8]) {
        self.payload.extend_from_slice(data);
    }

    /// Append text for the speak request: at most [`MAX_TEXT_LEN`]
    /// bytes of it, always NUL terminated. Longer input is truncated,
    /// not rejected.
    pub fn push_text(&mut self, text: &str) {
        let bytes = text.as_bytes();
        let len = bytes.len().min(MAX_TEXT_LEN);
        if len < bytes.len() {
            warn!(dropped = bytes.len() - len, "truncating speak text");
        }
        self.payload.extend_from_slice(&bytes[..len]);
        self.payload.push(0);
    }

    /// Serialise into the length-prefixed wire frame (sync byte not
    /// included; the link layer clocks that separately)
    pub fn to_bytes(&self) -> Vec<u8> {
        let len = self.payload.len() + 4;
        let mut frame = Vec::with_capacity(len);
        frame.extend_from_slice(&(len as u16).to_le_bytes());
        frame.extend_from_slice(&(self.opcode as u16).to_le_bytes());
        frame.extend_from_slice(&self.payload);
        frame
    }
}

/// Fixed 6-byte header every acknowledgment response starts with
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ResponseHeader {
    pub length: u16,
    pub opcode: u16,
    pub result: u16,
}

impl ResponseHeader {
    /// Decode the header from the 6 bytes following the sync marker
    pub fn parse(raw: [u8; 6]) -> Self {
        Self {
            length: u16::from_le_bytes([raw[0], raw[1]]),
            opcode: u16::from_le_bytes([raw[2], raw[3]]),
            result: u16::from_le_bytes([raw[4], raw[5]]),
        }
    }

    /// Require the header to be the success acknowledgment for
    /// `expected`, distinguishing a wrong opcode from a bad result
    pub fn expect(self, expected: Opcode) -> Result<()> {
        if self.opcode != expected as u16 {
            if let Some(op) = Opcode::from_u16(self.opcode) {
                warn!(?op, ?expected, "device answered with a different message");
            }
            return Err(Error::UnexpectedReply {
                expected: expected as u16,
                got: self.opcode,
            });
        }
        if self.result != expected.success_code() {
            return Err(Error::ResultCode {
                opcode: self.opcode,
                code: self.result,
            });
        }
        Ok(())
    }
}

/// Structured payload of the version response. Unlike the plain
/// acknowledgments this is a 20-byte block with fields at fixed
/// offsets and no result code.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VersionReport {
    pub hardware: u16,
    pub firmware: u16,
    pub features: u32,
}

impl VersionReport {
    /// Decode the 20-byte version block. The version words sit
    /// high-byte-first at offsets 4 and 6; the feature mask is a
    /// little-endian u32 at offset 8.
    pub fn parse(raw: &[u8; 20]) -> Result<Self> {
        let opcode = u16::from_le_bytes([raw[2], raw[3]]);
        if opcode != Opcode::VersionResp as u16 {
            return Err(Error::UnexpectedReply {
                expected: Opcode::VersionResp as u16,
                got: opcode,
            });
        }
        Ok(Self {
            hardware: u16::from_be_bytes([raw[4], raw[5]]),
            firmware: u16::from_be_bytes([raw[6], raw[7]]),
            features: u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]),
        })
    }
}
