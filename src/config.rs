//! Audio-path and speech-engine parameter sets. The defaults are the
//! fixed values the device is characterized with; only the markup
//! parser choice is expected to vary between deployments.

use crate::protocol::Request;

/// Which text-markup parser the speech engine runs
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Parser {
    /// DECtalk-style markup
    #[default]
    DecTalk,
    /// Epson's own markup
    Epson,
}

impl Parser {
    const fn flag(self) -> u8 {
        match self {
            Self::DecTalk => 0x00,
            Self::Epson => 0x01,
        }
    }
}

/// Audio output path configuration
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AudioConfig {
    /// 0x00 mono
    pub stereo: u8,
    /// 0x00 mute through 0x43 (+18 dB)
    pub gain: u8,
    /// Amplifier selection, 0x00 none
    pub amp: u8,
    /// 0x00 8 kHz, 0x01 11.025 kHz, ...
    pub sample_rate: u8,
    /// 0x00 application to DAC
    pub routing: u8,
    /// Deprecated by the vendor, must be zero
    pub tone_control: u8,
    /// 0x00 internally generated audio clock
    pub clock_source: u8,
    /// 0x00 DAC powered only while synthesis is outputting audio
    pub dac_always_on: u8,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            stereo: 0x00,
            gain: 0x43,
            amp: 0x00,
            sample_rate: 0x01,
            routing: 0x00,
            tone_control: 0x00,
            clock_source: 0x00,
            dac_always_on: 0x00,
        }
    }
}

impl AudioConfig {
    pub(crate) fn encode(&self, req: &mut Request) {
        req.push_u8(self.stereo);
        req.push_u8(self.gain);
        req.push_u8(self.amp);
        req.push_u8(self.sample_rate);
        req.push_u8(self.routing);
        req.push_u8(self.tone_control);
        req.push_u8(self.clock_source);
        req.push_u8(self.dac_always_on);
    }
}

/// Speech-engine configuration
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TtsConfig {
    /// 0x01 is the only documented value
    pub sample_rate: u8,
    /// 0x00 through 0x08
    pub voice: u8,
    pub parser: Parser,
    /// 0x00 US English, 0x01 Castilian Spanish, 0x04 Latin Spanish
    pub language: u8,
    /// Words per minute, valid 0x004B to 0x0258
    pub speaking_rate: u16,
    /// Must be zero
    pub data_source: u8,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            sample_rate: 0x01,
            voice: 0x00,
            parser: Parser::DecTalk,
            language: 0x00,
            speaking_rate: 200,
            data_source: 0x00,
        }
    }
}

impl TtsConfig {
    pub(crate) fn encode(&self, req: &mut Request) {
        req.push_u8(self.sample_rate);
        req.push_u8(self.voice);
        req.push_u8(self.parser.flag());
        req.push_u8(self.language);
        req.push_u16(self.speaking_rate);
        req.push_u8(self.data_source);
        req.push_u8(0x00);
    }
}
