//! Scripted in-memory [`Bus`] for driving the protocol in tests.
//! Records every line/select/transfer event and plays back canned
//! response streams, one per transaction.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::bus::Bus;
use crate::firmware::BLOCK_LEN;
use crate::protocol::{Opcode, SYNC};
use crate::{Error, Result};

/// One observable action on the bus, in order
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Reset,
    WaitClearToSend,
    WaitResponseReady,
    Select,
    Deselect,
    Mute(bool),
    Settle(u32),
    Write(Vec<u8>),
}

#[derive(Default)]
struct State {
    /// Response streams still to be served, one per transaction
    responses: VecDeque<Vec<u8>>,
    /// Stream currently being clocked in
    current: VecDeque<u8>,
    log: Vec<Event>,
}

/// Cloneable handle; the driver owns one clone, the test keeps another
/// to queue responses and inspect the log
#[derive(Clone, Default)]
pub struct ScriptedBus {
    state: Arc<Mutex<State>>,
}

impl ScriptedBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    /// Queue one raw response stream, served on the next transaction.
    /// Bytes past the end of the stream read back as zero (padding).
    pub fn queue_response(&self, bytes: Vec<u8>) {
        self.with(|s| s.responses.push_back(bytes));
    }

    /// Queue a 6-byte acknowledgment header with the given opcode and
    /// result
    pub fn queue_ack(&self, opcode: u16, result: u16) {
        let op = opcode.to_le_bytes();
        let res = result.to_le_bytes();
        self.queue_response(vec![
            SYNC, 0x06, 0x00, op[0], op[1], res[0], res[1],
        ]);
    }

    /// Queue the 20-byte structured version report
    pub fn queue_version(&self, hardware: u16, firmware: u16, features: u32) {
        let mut stream = vec![SYNC, 0x14, 0x00, 0x06, 0x00];
        stream.extend_from_slice(&hardware.to_be_bytes());
        stream.extend_from_slice(&firmware.to_be_bytes());
        stream.extend_from_slice(&features.to_le_bytes());
        stream.resize(21, 0x00);
        self.queue_response(stream);
    }

    /// Queue the whole happy-path bring-up conversation for a
    /// firmware image of the given size
    pub fn queue_init_responses(&self, firmware_len: usize) {
        self.queue_version(0x0402, 0x0216, 0x0000_001F);
        // full blocks plus the always-sent remainder block
        for _ in 0..firmware_len / BLOCK_LEN + 1 {
            self.queue_ack(Opcode::BootLoadResp as u16, 0x0001);
        }
        self.queue_ack(Opcode::BootRunResp as u16, 0x0001);
        self.queue_ack(Opcode::RegisterResp as u16, 0x0000);
        self.queue_version(0x0402, 0x0216, 0x0000_001F);
        self.queue_ack(Opcode::AudioConfigResp as u16, 0x0000);
        self.queue_ack(Opcode::AudioVolumeResp as u16, 0x0000);
        self.queue_ack(Opcode::TtsConfigResp as u16, 0x0000);
    }

    /// Everything the driver did, in order
    pub fn log(&self) -> Vec<Event> {
        self.with(|s| s.log.clone())
    }

    /// Just the written byte blocks, in order
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.log()
            .into_iter()
            .filter_map(|e| match e {
                Event::Write(bytes) => Some(bytes),
                _ => None,
            })
            .collect()
    }
}

impl Bus for ScriptedBus {
    fn hard_reset(&mut self) -> Result<()> {
        self.with(|s| s.log.push(Event::Reset));
        Ok(())
    }

    fn wait_clear_to_send(&mut self) -> Result<()> {
        self.with(|s| s.log.push(Event::WaitClearToSend));
        Ok(())
    }

    fn wait_response_ready(&mut self) -> Result<()> {
        self.with(|s| {
            s.log.push(Event::WaitResponseReady);
            match s.responses.pop_front() {
                Some(stream) => {
                    s.current = stream.into();
                    Ok(())
                }
                None => Err(Error::Timeout("response-available line")),
            }
        })
    }

    fn select(&mut self) -> Result<()> {
        self.with(|s| s.log.push(Event::Select));
        Ok(())
    }

    fn deselect(&mut self) -> Result<()> {
        self.with(|s| {
            s.log.push(Event::Deselect);
            // transaction over; anything unread is gone
            s.current.clear();
        });
        Ok(())
    }

    fn transfer(&mut self) -> Result<u8> {
        Ok(self.with(|s| s.current.pop_front().unwrap_or(0x00)))
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.with(|s| s.log.push(Event::Write(data.to_vec())));
        Ok(())
    }

    fn settle(&mut self, micros: u32) -> Result<()> {
        self.with(|s| s.log.push(Event::Settle(micros)));
        Ok(())
    }

    fn set_mute(&mut self, mute: bool) -> Result<()> {
        self.with(|s| s.log.push(Event::Mute(mute)));
        Ok(())
    }
}
