/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
/*!
A platform agnostic Rust driver for the three-output [Si5351A], based on the
[`embedded-hal`] traits, that turns a frequency plan into register writes.

## The Device

The Silicon Labs [Si5351] is an any-frequency CMOS clock generator. Two PLLs
multiply the crystal reference up to a 600..900 MHz VCO frequency, and each
output has its own fractional Multisynth divider that brings one of the VCOs
back down:

```text
fVCO = fXTAL * (a + b/c)        a = 15..90
fOUT = fVCO  / (a + b/c) / R    a = 4..2048, R = 1, 2, 4 .. 128
```

The device has an I²C interface.

## Usage

Import this crate and an `embedded_hal` implementation:

```ignore
extern crate stm32f103xx_hal as hal;
extern crate si5351_clockgen;
```

Initialize I²C bus (differs between `embedded_hal` implementations):

```ignore
# extern crate stm32f103xx_hal as hal;
use hal::i2c::I2c;
type I2C = ...;

# fn main() {
let i2c: I2C = initialize_i2c();
# }
```

Then instantiate and initialise the device:

```ignore
# extern crate si5351_clockgen;
use si5351_clockgen::{Crystal, CrystalLoad, Si5351, Si5351Device};

# fn main() {
let mut clock = Si5351Device::new(i2c, false);
clock.init(Crystal::new(25_000_000, CrystalLoad::_10))?;
# }
```

Or, if you have an [Adafruit module], you can use shortcut functions to
initialize it:

```ignore
# extern crate si5351_clockgen;
use si5351_clockgen::{Si5351, Si5351Device};

# fn main() {
let mut clock = Si5351Device::new_adafruit_module(i2c);
clock.init_adafruit_module()?;
# }
```

Program a PLL first, then the outputs that run from it:

```ignore
use si5351_clockgen::{ClockOutput, MultisynthDiv, OutputDivider, PLL};

// 25 MHz * 36 = 900 MHz
clock.setup_pll_int(PLL::A, 36)?;
// 900 MHz / 8 = 112.5 MHz
clock.setup_multisynth_int(ClockOutput::Clk0, PLL::A, MultisynthDiv::Div8)?;

// 25 MHz * (24 + 2/3) = 616.67 MHz, / (45 + 1/2) / 64 = 211.77 kHz
clock.setup_pll(PLL::B, 24, 2, 3)?;
clock.setup_multisynth(ClockOutput::Clk1, PLL::B, 45, 1, 2)?;
clock.setup_rdiv(ClockOutput::Clk1, OutputDivider::Div64)?;

clock.enable_outputs(true)?;
```

The driver is not `Sync`; share it between contexts behind a single mutex so
that multi-byte divider blocks are written without interleaving.

[Si5351]: https://www.silabs.com/documents/public/data-sheets/Si5351-B.pdf
[Si5351A]: https://www.silabs.com/documents/public/data-sheets/Si5351-B.pdf
[`embedded-hal`]: https://github.com/japaric/embedded-hal
[Adafruit module]: https://www.adafruit.com/product/2045
*/
//#![deny(missing_docs)]
#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate bitflags;
use embedded_hal as hal;

use crate::hal::blocking::i2c::{Write, WriteRead};
use core::convert::TryFrom;
use core::fmt;

pub mod codec;
pub mod interface;
pub mod planner;
pub mod regmap;

#[cfg(test)]
mod mock;

pub use crate::codec::{Params, Ratio, MAX_FRACTION};
pub use crate::interface::{I2cInterface, RegisterInterface};
pub use crate::planner::{Planner, MAX_OUTPUT_FREQ, MIN_OUTPUT_FREQ};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Nothing answered the probe, or the chip never left its init phase.
    DeviceNotFound,
    DeviceNotInitialised,
    InvalidParameter,
    /// A bus transaction failed; chip state is unknown until re-initialised.
    CommunicationError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::DeviceNotFound => write!(f, "Device Not Found"),
            Error::DeviceNotInitialised => write!(f, "Device Not Initialised"),
            Error::InvalidParameter => write!(f, "Invalid Parameter"),
            Error::CommunicationError => write!(f, "Communication Error"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CrystalLoad {
    _6,
    _8,
    _10,
}

pub const XTAL_25MHZ: u32 = 25_000_000;
pub const XTAL_27MHZ: u32 = 27_000_000;

/// Crystal reference; fixed once the device is initialised.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Crystal {
    pub freq: u32,
    pub load: CrystalLoad,
    pub ppm: u32,
}

impl Crystal {
    pub const fn new(freq: u32, load: CrystalLoad) -> Self {
        Crystal {
            freq,
            load,
            ppm: 30,
        }
    }

    pub const fn with_ppm(self, ppm: u32) -> Self {
        Crystal { ppm, ..self }
    }
}

impl Default for Crystal {
    /// The Adafruit breakout: 25 MHz, 10 pF.
    fn default() -> Self {
        Crystal::new(XTAL_25MHZ, CrystalLoad::_10)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PLL {
    A,
    B,
}

#[derive(Debug, Copy, Clone)]
pub enum FeedbackMultisynth {
    MSNA,
    MSNB,
}

#[derive(Debug, Copy, Clone)]
pub enum Multisynth {
    MS0,
    MS1,
    MS2,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockOutput {
    Clk0 = 0,
    Clk1,
    Clk2,
}

/// Divider values usable with [`Si5351::setup_multisynth_int`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MultisynthDiv {
    Div4 = 4,
    Div6 = 6,
    Div8 = 8,
}

/// R divider, stored on the chip as a power-of-two exponent.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputDivider {
    Div1 = 0,
    Div2,
    Div4,
    Div8,
    Div16,
    Div32,
    Div64,
    Div128,
}

const PLL_MULT_MIN: u8 = 15;
const PLL_MULT_MAX: u8 = 90;
const MS_DIV_MIN: u16 = 4;
const MS_DIV_MAX: u16 = 2048;

/// Status reads before giving up on a chip stuck in SYS_INIT.
const PROBE_ATTEMPTS: usize = 1000;

/// Soft reset as written by ClockBuilder: both PLLs plus the reserved bits.
const SOFT_RESET: u8 = 0xAC;

const OUTPUTS_ENABLED: u8 = 0x00;
const OUTPUTS_DISABLED: u8 = 0xFF;

impl PLL {
    pub fn multisynth(&self) -> FeedbackMultisynth {
        match *self {
            PLL::A => FeedbackMultisynth::MSNA,
            PLL::B => FeedbackMultisynth::MSNB,
        }
    }

    fn ix(&self) -> usize {
        *self as usize
    }
}

trait FractionalMultisynth {
    fn base_addr(&self) -> u8;
}

impl FractionalMultisynth for FeedbackMultisynth {
    fn base_addr(&self) -> u8 {
        match *self {
            FeedbackMultisynth::MSNA => Register::PllA.addr(),
            FeedbackMultisynth::MSNB => Register::PllB.addr(),
        }
    }
}

impl FractionalMultisynth for Multisynth {
    fn base_addr(&self) -> u8 {
        match *self {
            Multisynth::MS0 => Register::Ms0.addr(),
            Multisynth::MS1 => Register::Ms1.addr(),
            Multisynth::MS2 => Register::Ms2.addr(),
        }
    }
}

impl Multisynth {
    /// Parameter register holding the R divider and the top bits of P1.
    fn r_div_addr(&self) -> u8 {
        self.base_addr() + 2
    }
}

#[derive(Debug, Copy, Clone)]
enum Register {
    DeviceStatus = 0,
    OutputEnable = 3,
    Clk0 = 16,
    Clk1 = 17,
    Clk2 = 18,
    Clk3 = 19,
    Clk4 = 20,
    Clk5 = 21,
    Clk6 = 22,
    Clk7 = 23,
    PllA = 26,
    PllB = 34,
    Ms0 = 42,
    Ms1 = 50,
    Ms2 = 58,
    SpreadSpectrum = 149,
    PLLReset = 177,
    CrystalLoad = 183,
}

impl Register {
    pub fn addr(&self) -> u8 {
        *self as u8
    }
}

bitflags! {
    pub struct DeviceStatusBits: u8 {
        const SYS_INIT = 0b1000_0000;
        const LOL_B = 0b0100_0000;
        const LOL_A = 0b0010_0000;
        const LOS = 0b0001_0000;
    }
}

bitflags! {
    struct CrystalLoadBits: u8 {
        const RESERVED = 0b00_010010;
        const CL_MASK = 0b11_000000;
        const CL_6 = 0b01_000000;
        const CL_8 = 0b10_000000;
        const CL_10 = 0b11_000000;
    }
}

bitflags! {
    struct ClockControlBits: u8 {
        const CLK_PDN = 0b1000_0000;
        const MS_INT = 0b0100_0000;
        const MS_SRC = 0b0010_0000;
        const CLK_INV = 0b0001_0000;
        const CLK_SRC_MASK = 0b0000_1100;
        const CLK_SRC_XTAL = 0b0000_0000;
        const CLK_SRC_CLKIN = 0b0000_0100;
        const CLK_SRC_MS_ALT = 0b0000_1000;
        const CLK_SRC_MS = 0b0000_1100;
        const CLK_DRV_MASK = 0b0000_0011;
        const CLK_DRV_2 = 0b0000_0000;
        const CLK_DRV_4 = 0b0000_0001;
        const CLK_DRV_6 = 0b0000_0010;
        const CLK_DRV_8 = 0b0000_0011;
    }
}

bitflags! {
    /// Register 177 as AN619 names it. Some references swap PLL A and PLL B
    /// between bits 7 and 5; both are always written together (`0xA0`).
    struct PLLResetBits: u8 {
        const PLLB_RST = 0b1000_0000;
        const PLLA_RST = 0b0010_0000;
    }
}

bitflags! {
    struct SpreadSpectrumBits: u8 {
        const SSC_EN = 0b1000_0000;
    }
}

impl CrystalLoad {
    fn bits(self) -> u8 {
        (CrystalLoadBits::RESERVED
            | match self {
                CrystalLoad::_6 => CrystalLoadBits::CL_6,
                CrystalLoad::_8 => CrystalLoadBits::CL_8,
                CrystalLoad::_10 => CrystalLoadBits::CL_10,
            })
        .bits()
    }
}

impl ClockOutput {
    fn register(self) -> Register {
        match self {
            ClockOutput::Clk0 => Register::Clk0,
            ClockOutput::Clk1 => Register::Clk1,
            ClockOutput::Clk2 => Register::Clk2,
        }
    }

    fn multisynth(self) -> Multisynth {
        match self {
            ClockOutput::Clk0 => Multisynth::MS0,
            ClockOutput::Clk1 => Multisynth::MS1,
            ClockOutput::Clk2 => Multisynth::MS2,
        }
    }

    fn ix(&self) -> usize {
        *self as usize
    }
}

impl TryFrom<u8> for ClockOutput {
    type Error = Error;

    fn try_from(channel: u8) -> Result<Self, Error> {
        match channel {
            0 => Ok(ClockOutput::Clk0),
            1 => Ok(ClockOutput::Clk1),
            2 => Ok(ClockOutput::Clk2),
            _ => Err(Error::InvalidParameter),
        }
    }
}

impl OutputDivider {
    fn bits(&self) -> u8 {
        *self as u8
    }

    pub fn denominator(&self) -> u8 {
        1 << self.bits()
    }
}

impl TryFrom<u8> for OutputDivider {
    type Error = Error;

    /// From a power-of-two exponent, 0..=7.
    fn try_from(exponent: u8) -> Result<Self, Error> {
        match exponent {
            0 => Ok(OutputDivider::Div1),
            1 => Ok(OutputDivider::Div2),
            2 => Ok(OutputDivider::Div4),
            3 => Ok(OutputDivider::Div8),
            4 => Ok(OutputDivider::Div16),
            5 => Ok(OutputDivider::Div32),
            6 => Ok(OutputDivider::Div64),
            7 => Ok(OutputDivider::Div128),
            _ => Err(Error::InvalidParameter),
        }
    }
}

/// Si5351 driver
pub struct Si5351Device<IFACE> {
    iface: IFACE,
    crystal: Crystal,
    initialised: bool,
    planner: Planner,
}

pub trait Si5351 {
    fn init_adafruit_module(&mut self) -> Result<(), Error>;
    /// Probes the chip, then disables and powers down every output, sets the
    /// crystal load and turns spread spectrum off. Forgets all PLL and output
    /// settings.
    fn init(&mut self, crystal: Crystal) -> Result<(), Error>;
    fn read_device_status(&mut self) -> Result<DeviceStatusBits, Error>;

    fn setup_pll_int(&mut self, pll: PLL, mult: u8) -> Result<(), Error>;
    /// Programs `pll` to `mult + num / denom` times the crystal and resets
    /// both PLLs.
    fn setup_pll(&mut self, pll: PLL, mult: u8, num: u32, denom: u32) -> Result<(), Error>;
    fn setup_multisynth_int(
        &mut self,
        clk: ClockOutput,
        pll: PLL,
        div: MultisynthDiv,
    ) -> Result<(), Error>;
    /// Divides the VCO of an already programmed `pll` by `div + num / denom`
    /// and routes it to `clk`, powered up at 8 mA.
    fn setup_multisynth(
        &mut self,
        clk: ClockOutput,
        pll: PLL,
        div: u16,
        num: u32,
        denom: u32,
    ) -> Result<(), Error>;
    fn setup_rdiv(&mut self, clk: ClockOutput, r_div: OutputDivider) -> Result<(), Error>;

    fn enable_outputs(&mut self, enabled: bool) -> Result<(), Error>;
    fn enable_spread_spectrum(&mut self, enabled: bool) -> Result<(), Error>;

    /// Writes a full register dump, pair by pair. A failure part way through
    /// leaves the chip partially programmed.
    fn load_register_map(&mut self, map: &[(u8, u8)]) -> Result<(), Error>;
    fn load_clockbuilder_defaults(&mut self) -> Result<(), Error>;

    fn pll_frequency(&self, pll: PLL) -> Option<u32>;
    fn output_frequency(&self, clk: ClockOutput) -> Option<u32>;
}

impl<I2C, E> Si5351Device<I2cInterface<I2C>>
where
    I2C: WriteRead<Error = E> + Write<Error = E>,
{
    /// Creates a new driver from a I2C peripheral
    pub fn new(i2c: I2C, address_bit: bool) -> Self {
        Si5351Device::from_interface(I2cInterface::new(i2c, address_bit))
    }

    pub fn new_adafruit_module(i2c: I2C) -> Self {
        Si5351Device::new(i2c, false)
    }
}

impl<IFACE> Si5351Device<IFACE>
where
    IFACE: RegisterInterface,
{
    pub fn from_interface(iface: IFACE) -> Self {
        Si5351Device {
            iface,
            crystal: Crystal::default(),
            initialised: false,
            planner: Planner::new(),
        }
    }

    pub fn release(self) -> IFACE {
        self.iface
    }

    pub fn crystal(&self) -> Crystal {
        self.crystal
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    fn ensure_initialised(&self) -> Result<(), Error> {
        if self.initialised {
            Ok(())
        } else {
            Err(Error::DeviceNotInitialised)
        }
    }

    fn probe(&mut self) -> Result<(), Error> {
        for _ in 0..PROBE_ATTEMPTS {
            let status = self
                .read_device_status()
                .map_err(|_| Error::DeviceNotFound)?;
            if !status.contains(DeviceStatusBits::SYS_INIT) {
                return Ok(());
            }
        }

        Err(Error::DeviceNotFound)
    }

    fn reset_plls(&mut self) -> Result<(), Error> {
        // resetting only the reprogrammed PLL does not relock reliably
        self.write_register(
            Register::PLLReset,
            (PLLResetBits::PLLA_RST | PLLResetBits::PLLB_RST).bits(),
        )
    }

    fn write_spread_spectrum(&mut self, enabled: bool) -> Result<(), Error> {
        let current = self.read_register(Register::SpreadSpectrum)?;
        let value = if enabled {
            current | SpreadSpectrumBits::SSC_EN.bits()
        } else {
            current & !SpreadSpectrumBits::SSC_EN.bits()
        };

        self.write_register(Register::SpreadSpectrum, value)
    }

    fn read_register(&mut self, reg: Register) -> Result<u8, Error> {
        self.iface.read_register(reg.addr())
    }

    fn write_register(&mut self, reg: Register, byte: u8) -> Result<(), Error> {
        self.iface.write_register(reg.addr(), byte)
    }
}

impl<IFACE> Si5351 for Si5351Device<IFACE>
where
    IFACE: RegisterInterface,
{
    fn init_adafruit_module(&mut self) -> Result<(), Error> {
        self.init(Crystal::default())
    }

    fn init(&mut self, crystal: Crystal) -> Result<(), Error> {
        if crystal.freq == 0 {
            return Err(Error::InvalidParameter);
        }

        self.initialised = false;
        self.planner.reset();

        self.probe()?;

        self.write_register(Register::OutputEnable, OUTPUTS_DISABLED)?;
        const CLK_REGS: [Register; 8] = [
            Register::Clk0,
            Register::Clk1,
            Register::Clk2,
            Register::Clk3,
            Register::Clk4,
            Register::Clk5,
            Register::Clk6,
            Register::Clk7,
        ];
        for &reg in CLK_REGS.iter() {
            self.write_register(reg, ClockControlBits::CLK_PDN.bits())?;
        }

        self.write_register(Register::CrystalLoad, crystal.load.bits())?;
        self.write_spread_spectrum(false)?;

        self.crystal = crystal;
        self.initialised = true;

        #[cfg(feature = "defmt")]
        defmt::debug!("Si5351 initialised, crystal {} Hz", crystal.freq);

        Ok(())
    }

    fn read_device_status(&mut self) -> Result<DeviceStatusBits, Error> {
        Ok(DeviceStatusBits::from_bits_truncate(
            self.read_register(Register::DeviceStatus)?,
        ))
    }

    fn setup_pll_int(&mut self, pll: PLL, mult: u8) -> Result<(), Error> {
        self.setup_pll(pll, mult, 0, 1)
    }

    fn setup_pll(&mut self, pll: PLL, mult: u8, num: u32, denom: u32) -> Result<(), Error> {
        self.ensure_initialised()?;
        if mult < PLL_MULT_MIN || mult > PLL_MULT_MAX {
            return Err(Error::InvalidParameter);
        }
        let ratio = Ratio::new(mult.into(), num, denom)?;

        let params = Params::feedback(&ratio).checked()?;
        self.iface
            .write_burst(pll.multisynth().base_addr(), &params.to_pll_block())?;
        self.reset_plls()?;

        self.planner.record_pll(pll, self.crystal.freq, &ratio);

        #[cfg(feature = "defmt")]
        defmt::debug!("PLL {} = {} Hz ({})", pll, ratio.scale(self.crystal.freq), params);

        Ok(())
    }

    fn setup_multisynth_int(
        &mut self,
        clk: ClockOutput,
        pll: PLL,
        div: MultisynthDiv,
    ) -> Result<(), Error> {
        self.setup_multisynth(clk, pll, div as u16, 0, 1)
    }

    fn setup_multisynth(
        &mut self,
        clk: ClockOutput,
        pll: PLL,
        div: u16,
        num: u32,
        denom: u32,
    ) -> Result<(), Error> {
        self.ensure_initialised()?;
        if div < MS_DIV_MIN || div > MS_DIV_MAX {
            return Err(Error::InvalidParameter);
        }
        let ratio = Ratio::new(div.into(), num, denom)?;
        let params = Params::output(&ratio).checked()?;
        let freq = self.planner.plan_output(pll, &params)?;

        let ms = clk.multisynth();
        let r_div = self.planner.last_r_divider(clk);
        let block = params.to_multisynth_block(ms.base_addr(), r_div.bits());
        self.iface.write_burst(block[0], &block[1..])?;

        let ms_int = if ratio.is_integer() {
            ClockControlBits::MS_INT
        } else {
            ClockControlBits::empty()
        };
        let ms_src = match pll {
            PLL::A => ClockControlBits::empty(),
            PLL::B => ClockControlBits::MS_SRC,
        };
        let base = ClockControlBits::CLK_SRC_MS | ClockControlBits::CLK_DRV_8;
        self.write_register(clk.register(), (ms_int | ms_src | base).bits())?;

        self.planner.record_output(clk, freq);

        #[cfg(feature = "defmt")]
        defmt::debug!("{} from PLL {} = {} Hz", clk, pll, freq);

        Ok(())
    }

    fn setup_rdiv(&mut self, clk: ClockOutput, r_div: OutputDivider) -> Result<(), Error> {
        self.ensure_initialised()?;

        let addr = clk.multisynth().r_div_addr();
        let current = self.iface.read_register(addr)?;
        // bit 7 is reserved and written as zero
        let value = (current & 0x0F) | (r_div.bits() << codec::R_DIV_SHIFT);
        self.iface.write_register(addr, value)?;

        self.planner.record_r_divider(clk, r_div);

        #[cfg(feature = "defmt")]
        defmt::debug!("{} R divider = 1/{}", clk, r_div.denominator());

        Ok(())
    }

    fn enable_outputs(&mut self, enabled: bool) -> Result<(), Error> {
        self.ensure_initialised()?;

        self.write_register(
            Register::OutputEnable,
            if enabled {
                OUTPUTS_ENABLED
            } else {
                OUTPUTS_DISABLED
            },
        )
    }

    fn enable_spread_spectrum(&mut self, enabled: bool) -> Result<(), Error> {
        self.ensure_initialised()?;
        self.write_spread_spectrum(enabled)
    }

    fn load_register_map(&mut self, map: &[(u8, u8)]) -> Result<(), Error> {
        self.ensure_initialised()?;

        self.write_register(Register::OutputEnable, OUTPUTS_DISABLED)?;
        for &(reg, value) in map.iter() {
            self.iface.write_register(reg, value)?;
        }
        self.write_register(Register::PLLReset, SOFT_RESET)?;
        self.write_register(Register::OutputEnable, OUTPUTS_ENABLED)?;

        #[cfg(feature = "defmt")]
        defmt::debug!("loaded {} register values", map.len());

        Ok(())
    }

    fn load_clockbuilder_defaults(&mut self) -> Result<(), Error> {
        self.load_register_map(&regmap::CLOCKBUILDER_25MHZ)
    }

    fn pll_frequency(&self, pll: PLL) -> Option<u32> {
        self.planner.pll_frequency(pll)
    }

    fn output_frequency(&self, clk: ClockOutput) -> Option<u32> {
        self.planner.output_frequency(clk)
    }
}
