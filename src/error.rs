//! Error types shared by every driver operation

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The underlying SPI bus or a GPIO line reported a fault. The
    /// message carries the transport's own error, formatted.
    #[error("bus transport fault: {0}")]
    Bus(String),

    /// A handshake line or the response sync byte did not turn up
    /// within the poll budget
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),

    /// The device answered with a different opcode than the request
    /// calls for
    #[error("unexpected response opcode {got:#06x} (expected {expected:#06x})")]
    UnexpectedReply { expected: u16, got: u16 },

    /// The response carried the right opcode but a failure result code
    #[error("response {opcode:#06x} carried result code {code:#06x}")]
    ResultCode { opcode: u16, code: u16 },

    /// The version report did not identify an S1V30120
    #[error("hardware version {0:#06x} is not an S1V30120 (expected 0x0402)")]
    WrongHardware(u16),

    /// The device refused a firmware block; the upload cannot resume
    /// and the whole bring-up must be restarted
    #[error("firmware block {index} rejected by the device")]
    FirmwareBlockRejected { index: usize },
}
