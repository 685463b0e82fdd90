/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Simulated I²C bus for unit tests.

use std::cell::RefCell;
use std::rc::Rc;

use crate::hal::blocking::i2c::{Write, WriteRead};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    /// Start register and the bytes written from there on.
    Write(u8, Vec<u8>),
    Read(u8),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BusError;

struct Bus {
    regs: [u8; 256],
    log: Vec<Transaction>,
    fail_in: Option<usize>,
    absent: bool,
    busy_polls: usize,
    last_address: Option<u8>,
}

/// Cheap handle; clones share the same register file and log.
#[derive(Clone)]
pub struct MockI2c(Rc<RefCell<Bus>>);

impl MockI2c {
    pub fn new() -> Self {
        MockI2c(Rc::new(RefCell::new(Bus {
            regs: [0; 256],
            log: Vec::new(),
            fail_in: None,
            absent: false,
            busy_polls: 0,
            last_address: None,
        })))
    }

    /// Nothing answers on the bus.
    pub fn absent() -> Self {
        let bus = MockI2c::new();
        bus.0.borrow_mut().absent = true;
        bus
    }

    pub fn log(&self) -> Vec<Transaction> {
        self.0.borrow().log.clone()
    }

    pub fn clear_log(&self) {
        self.0.borrow_mut().log.clear();
    }

    pub fn reg(&self, reg: u8) -> u8 {
        self.0.borrow().regs[reg as usize]
    }

    pub fn set_reg(&self, reg: u8, value: u8) {
        self.0.borrow_mut().regs[reg as usize] = value;
    }

    pub fn last_address(&self) -> Option<u8> {
        self.0.borrow().last_address
    }

    /// Fails the transaction `n` transactions from now (0 = the next one).
    pub fn fail_in(&self, n: usize) {
        self.0.borrow_mut().fail_in = Some(n);
    }

    /// Reports SYS_INIT for the next `polls` status reads.
    pub fn busy_for(&self, polls: usize) {
        self.0.borrow_mut().busy_polls = polls;
    }
}

impl Bus {
    fn begin(&mut self, address: u8) -> Result<(), BusError> {
        if self.absent {
            return Err(BusError);
        }
        self.last_address = Some(address);

        match self.fail_in {
            Some(0) => {
                self.fail_in = None;
                Err(BusError)
            }
            Some(n) => {
                self.fail_in = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Write for MockI2c {
    type Error = BusError;

    fn write(&mut self, address: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        let mut bus = self.0.borrow_mut();
        bus.begin(address)?;

        let start = bytes[0];
        for (offset, &byte) in bytes[1..].iter().enumerate() {
            bus.regs[start.wrapping_add(offset as u8) as usize] = byte;
        }
        bus.log.push(Transaction::Write(start, bytes[1..].to_vec()));
        Ok(())
    }
}

impl WriteRead for MockI2c {
    type Error = BusError;

    fn write_read(
        &mut self,
        address: u8,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        let mut bus = self.0.borrow_mut();
        bus.begin(address)?;

        let start = bytes[0];
        bus.log.push(Transaction::Read(start));

        if start == 0 && bus.busy_polls > 0 {
            bus.busy_polls -= 1;
            buffer[0] = 0b1000_0000;
            return Ok(());
        }

        for (offset, byte) in buffer.iter_mut().enumerate() {
            *byte = bus.regs[start.wrapping_add(offset as u8) as usize];
        }
        Ok(())
    }
}
