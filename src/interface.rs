/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Byte-level register access to the chip.

use crate::hal::blocking::i2c::{Write, WriteRead};
use crate::Error;

const ADDRESS: u8 = 0b0110_0000;

/// Longest burst the driver issues: one full Multisynth parameter block.
pub const MAX_BURST: usize = 9;

/// Register-addressed transport. Burst writes auto-increment the target
/// register for every byte.
pub trait RegisterInterface {
    fn read_register(&mut self, reg: u8) -> Result<u8, Error>;
    fn write_register(&mut self, reg: u8, byte: u8) -> Result<(), Error>;
    fn write_burst(&mut self, start: u8, bytes: &[u8]) -> Result<(), Error>;
}

fn i2c_error<E>(_: E) -> Error {
    Error::CommunicationError
}

/// [`RegisterInterface`] over a blocking `embedded-hal` I²C bus.
pub struct I2cInterface<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C, E> I2cInterface<I2C>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
{
    /// `address_bit` is the level of the A0 pin (Si5351A 10-MSOP has it tied
    /// low).
    pub fn new(i2c: I2C, address_bit: bool) -> Self {
        I2cInterface {
            i2c,
            address: ADDRESS | if address_bit { 1 } else { 0 },
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C, E> RegisterInterface for I2cInterface<I2C>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
{
    fn read_register(&mut self, reg: u8) -> Result<u8, Error> {
        let mut buffer = [0u8; 1];
        self.i2c
            .write_read(self.address, &[reg], &mut buffer)
            .map_err(i2c_error)?;
        Ok(buffer[0])
    }

    fn write_register(&mut self, reg: u8, byte: u8) -> Result<(), Error> {
        self.i2c
            .write(self.address, &[reg, byte])
            .map_err(i2c_error)
    }

    fn write_burst(&mut self, start: u8, bytes: &[u8]) -> Result<(), Error> {
        if bytes.len() > MAX_BURST {
            return Err(Error::InvalidParameter);
        }

        let mut buffer = [0u8; MAX_BURST + 1];
        buffer[0] = start;
        buffer[1..=bytes.len()].copy_from_slice(bytes);

        self.i2c
            .write(self.address, &buffer[..=bytes.len()])
            .map_err(i2c_error)
    }
}
