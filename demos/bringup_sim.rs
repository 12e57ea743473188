//! Dry-run of the full bring-up and a speak/poll cycle against a
//! simulated device, printing the wire traffic via `tracing`. Useful
//! for eyeballing the exact frames before wiring real hardware.
//!
//! Run with `cargo run --example bringup_sim --features examples`.

use std::collections::VecDeque;

use s1v30120::{Bus, Error, FirmwareImage, Parser, Result, S1v30120};

/// Stand-in for the chip: answers every request with the canned
/// success response a healthy device would produce
#[derive(Debug, Default)]
struct SimulatedDevice {
    responses: VecDeque<Vec<u8>>,
    current: VecDeque<u8>,
    speaking: bool,
}

impl SimulatedDevice {
    fn queue_ack(&mut self, opcode: u16, result: u16) {
        let op = opcode.to_le_bytes();
        let res = result.to_le_bytes();
        self.responses.push_back(vec![
            0xAA, 0x06, 0x00, op[0], op[1], res[0], res[1],
        ]);
    }

    fn queue_version(&mut self) {
        let mut stream = vec![0xAA, 0x14, 0x00, 0x06, 0x00];
        stream.extend_from_slice(&0x0402u16.to_be_bytes());
        stream.extend_from_slice(&0x0216u16.to_be_bytes());
        stream.extend_from_slice(&0x0000_001Fu32.to_le_bytes());
        stream.resize(21, 0x00);
        self.responses.push_back(stream);
    }

    /// React to one complete request frame
    fn handle_request(&mut self, frame: &[u8]) {
        let opcode = u16::from_le_bytes([frame[2], frame[3]]);
        match opcode {
            0x0005 => self.queue_version(),
            // boot-mode responses report 0x0001 on success
            0x1000 | 0x1002 => self.queue_ack(opcode + 1, 0x0001),
            0x0014 => {
                self.speaking = true;
                self.queue_ack(0x0015, 0x0000);
            }
            other => self.queue_ack(other + 1, 0x0000),
        }
    }
}

impl Bus for SimulatedDevice {
    fn hard_reset(&mut self) -> Result<()> {
        self.responses.clear();
        self.current.clear();
        self.speaking = false;
        Ok(())
    }

    fn wait_clear_to_send(&mut self) -> Result<()> {
        Ok(())
    }

    fn wait_response_ready(&mut self) -> Result<()> {
        if let Some(stream) = self.responses.pop_front() {
            self.current = stream.into();
            return Ok(());
        }
        if self.speaking {
            // pretend the utterance just finished
            self.speaking = false;
            self.queue_ack(0x0021, 0x0000);
            return self.wait_response_ready();
        }
        Err(Error::Timeout("response-available line"))
    }

    fn select(&mut self) -> Result<()> {
        Ok(())
    }

    fn deselect(&mut self) -> Result<()> {
        self.current.clear();
        Ok(())
    }

    fn transfer(&mut self) -> Result<u8> {
        Ok(self.current.pop_front().unwrap_or(0x00))
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        // a one-byte write is the sync marker; anything longer is a
        // complete request frame
        if data.len() > 1 {
            self.handle_request(data);
        }
        Ok(())
    }

    fn settle(&mut self, _micros: u32) -> Result<()> {
        Ok(())
    }

    fn set_mute(&mut self, _mute: bool) -> Result<()> {
        Ok(())
    }
}

static IMAGE: [u8; 4096] = [0x00; 4096];

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    let dev = S1v30120::new(
        SimulatedDevice::default(),
        FirmwareImage::new(&IMAGE),
    );

    dev.init(Parser::DecTalk)?;
    println!(
        "hardware {:#06x}, firmware {:#06x}, features {:#010x}",
        dev.hardware_version(),
        dev.firmware_version(),
        dev.firmware_features()
    );

    dev.speak("Hello from the simulated device", false, true)?;
    while !dev.poll_finished()? {}
    println!("utterance finished");

    Ok(())
}
