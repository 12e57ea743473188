//! The bring-up sequence as an explicit state machine. Transitions are
//! pure so the step ordering is testable without hardware; the driver
//! in `lib.rs` executes the bus work for each step.

/// One step of the bring-up sequence. Strictly linear: a step either
/// advances to the next or the whole sequence collapses to [`Failed`],
/// and the only way out of `Failed` is a fresh bring-up from the top.
///
/// [`Failed`]: Step::Failed
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// Pulse the reset line and wait out the boot settle time
    Reset,
    /// Query the version to confirm the chip identity before any
    /// firmware is present
    VerifyHardware,
    /// Transfer the firmware image block by block
    LoadFirmware,
    /// Tell the boot ROM to jump into the uploaded image
    Run,
    /// Register the host interface with the now-running firmware
    Register,
    /// Re-check the version now that the firmware answers
    VerifyFirmware,
    /// Fixed audio-path configuration
    ConfigureAudio,
    /// Output gain
    SetVolume,
    /// Speech-engine parameters, including the markup parser choice
    ConfigureTts,
    /// Bring-up complete, steady-state API available
    Ready,
    /// Absorbing failure state
    Failed,
}

impl Step {
    /// Successor on success. `Ready` and `Failed` absorb.
    pub const fn advance(self) -> Self {
        match self {
            Self::Reset => Self::VerifyHardware,
            Self::VerifyHardware => Self::LoadFirmware,
            Self::LoadFirmware => Self::Run,
            Self::Run => Self::Register,
            Self::Register => Self::VerifyFirmware,
            Self::VerifyFirmware => Self::ConfigureAudio,
            Self::ConfigureAudio => Self::SetVolume,
            Self::SetVolume => Self::ConfigureTts,
            Self::ConfigureTts => Self::Ready,
            Self::Ready => Self::Ready,
            Self::Failed => Self::Failed,
        }
    }

    /// Whether the sequence has stopped, successfully or not
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ready | Self::Failed)
    }
}
