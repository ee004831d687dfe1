//! This example demonstrates a real [`PwmBus`] backend over I2C, using
//! `rppal` to drive an actual PCA9685 board from a Raspberry Pi. It never
//! builds by default: enable it with `--features rppal`.
//!
//! Register-level protocol (MODE1/PRESCALE, auto-increment restart, the
//! per-channel 12-bit on/off registers starting at 0x06) mirrors the PCA9685
//! datasheet sequence used by the teacher's own hardware backend; this file
//! only exists to show the seam is real, not to be a production I2C driver.

use std::sync::Arc;

use parking_lot::Mutex;
use quad_motion::bus::PwmBus;
use quad_motion::errors::Error;
use rppal::i2c::I2c;

const MODE1: u8 = 0x00;
const PRESCALE: u8 = 0xFE;
const BASE: u8 = 0x06;
const SLEEP: u8 = 0x10;
const RESET: u8 = 0x00;
const RESTART: u8 = 0x80;
const AUTO_INCREMENT: u8 = 0x20;
const OSC_CLOCK: f32 = 25_000_000.0;

// `I2c` is `Send` but not `Sync` (it's a single open file descriptor); a
// `Mutex` behind an `Arc` gives the whole bus the `Send + Sync + Clone` shape
// `PwmBus` requires of every implementation it stores in `Box<dyn PwmBus>`.
#[derive(Debug, Clone)]
pub struct Pca9685Bus {
    addresses: Vec<u8>,
    i2c: Arc<Mutex<I2c>>,
}

impl Pca9685Bus {
    pub fn open(addresses: impl IntoIterator<Item = u8>) -> Result<Self, Error> {
        let i2c = I2c::new().map_err(|e| Error::BusError {
            address: 0,
            info: format!("failed to open I2C bus: {e}"),
        })?;
        Ok(Self {
            addresses: addresses.into_iter().collect(),
            i2c: Arc::new(Mutex::new(i2c)),
        })
    }

    fn write_reg(&mut self, address: u8, register: u8, value: u8) -> Result<(), Error> {
        let mut i2c = self.i2c.lock();
        i2c.set_slave_address(address as u16).map_err(|e| Error::BusError {
            address,
            info: e.to_string(),
        })?;
        i2c.block_write(register, &[value]).map_err(|e| Error::BusError {
            address,
            info: e.to_string(),
        })
    }
}

impl PwmBus for Pca9685Bus {
    fn set_frequency(&mut self, hz: u16) -> Result<(), Error> {
        let prescale = ((OSC_CLOCK / (4096.0 * hz as f32)) + 0.5 - 1.0).clamp(3.0, 255.0) as u8;
        for address in self.addresses.clone() {
            self.write_reg(address, MODE1, RESET)?;
            self.write_reg(address, MODE1, SLEEP)?;
            self.write_reg(address, PRESCALE, prescale)?;
            self.write_reg(address, MODE1, RESET)?;
            self.write_reg(address, MODE1, RESTART | AUTO_INCREMENT)?;
        }
        Ok(())
    }

    fn write(&mut self, address: u8, channel: u8, duty16: u16) -> Result<(), Error> {
        // 16-bit duty down to the 12-bit on/off pair the PCA9685 registers hold.
        let duty12 = ((duty16 as u32 * 4095) / 65535) as u16;
        let reg = BASE + 4 * channel;
        self.write_reg(address, reg, 0)?;
        self.write_reg(address, reg + 1, 0)?;
        self.write_reg(address, reg + 2, (duty12 & 0xFF) as u8)?;
        self.write_reg(address, reg + 3, (duty12 >> 8) as u8)
    }

    fn close(&mut self) -> Result<(), Error> {
        for address in self.addresses.clone() {
            self.write_reg(address, MODE1, RESTART)?;
        }
        Ok(())
    }
}

fn main() {
    env_logger::init();
    match Pca9685Bus::open([0x40]) {
        Ok(mut bus) => {
            bus.set_frequency(50).expect("set frequency");
            bus.write(0x40, 0, 32768).expect("write duty");
            println!("wrote a mid-range duty to board 0x40 channel 0");
        }
        Err(e) => eprintln!("no PCA9685 reachable on this host: {e}"),
    }
}
