/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Fixed-point register encoding for the feedback (PLL) and output
//! Multisynth dividers.
//!
//! Every fractional divider on the chip is described by a ratio
//! `a + b / c` which the hardware stores as three packed parameters:
//!
//! ```text
//! P1[17:0] = 128 * a + floor(128 * b / c) - 512
//! P2[19:0] = 128 * b - c * floor(128 * b / c)
//! P3[19:0] = c
//! ```
//!
//! See Silicon Labs AN619, "Manually Generating an Si5351 Register Map".

use crate::Error;

/// Largest value a 20-bit numerator or denominator may take.
pub const MAX_FRACTION: u32 = 0x000F_FFFF;

const P1_MASK: u32 = 0x0003_FFFF;
const P23_MASK: u32 = 0x000F_FFFF;

/// R-divider field inside the third Multisynth parameter byte.
pub(crate) const R_DIV_SHIFT: u8 = 4;
pub(crate) const R_DIV_MASK: u8 = 0b0111_0000;

/// A divider or multiplier expressed as `int + num / denom`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ratio {
    pub int: u32,
    pub num: u32,
    pub denom: u32,
}

impl Ratio {
    /// Checks the 20-bit fraction limits. The integer part is range-checked
    /// by the caller since its bounds depend on the block being programmed.
    pub fn new(int: u32, num: u32, denom: u32) -> Result<Self, Error> {
        if denom == 0 || denom > MAX_FRACTION || num > MAX_FRACTION {
            return Err(Error::InvalidParameter);
        }

        Ok(Ratio { int, num, denom })
    }

    pub const fn integer(int: u32) -> Self {
        Ratio {
            int,
            num: 0,
            denom: 1,
        }
    }

    pub fn is_integer(&self) -> bool {
        self.num == 0
    }

    /// `floor(freq * (int + num / denom))`, saturating at `u32::MAX`.
    pub fn scale(&self, freq: u32) -> u32 {
        let whole = self.int as u64 * self.denom as u64 + self.num as u64;
        let scaled = freq as u64 * whole / self.denom as u64;
        scaled.min(u32::MAX as u64) as u32
    }

    /// `floor(freq / (int + num / denom))`, or 0 for a zero ratio.
    pub fn divide(&self, freq: u32) -> u32 {
        let whole = self.int as u64 * self.denom as u64 + self.num as u64;
        (freq as u64 * self.denom as u64)
            .checked_div(whole)
            .unwrap_or(0)
            .min(u32::MAX as u64) as u32
    }
}

/// The packed `P1`/`P2`/`P3` parameters of one divider block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Params {
    pub p1: u32,
    pub p2: u32,
    pub p3: u32,
}

impl Params {
    /// Parameters for a feedback Multisynth (PLL A or PLL B).
    pub fn feedback(ratio: &Ratio) -> Self {
        Params::encode(ratio, false)
    }

    /// Parameters for an output Multisynth. A denominator of exactly 1 with a
    /// non-zero numerator takes the simplified encoding.
    pub fn output(ratio: &Ratio) -> Self {
        Params::encode(ratio, true)
    }

    fn encode(ratio: &Ratio, simplify: bool) -> Self {
        let a = ratio.int;
        let b = ratio.num;
        let c = ratio.denom;

        if b == 0 {
            Params {
                p1: (128 * a).wrapping_sub(512),
                p2: 0,
                p3: c,
            }
        } else if simplify && c == 1 {
            Params {
                p1: (128 * a + 128 * b).wrapping_sub(512),
                p2: 128 * b - 128,
                p3: 1,
            }
        } else {
            // exact floor of a rational, no float rounding at the 20-bit edge
            let frac = (128u64 * b as u64 / c as u64) as u32;

            Params {
                p1: (128 * a + frac).wrapping_sub(512),
                p2: 128 * b - c * frac,
                p3: c,
            }
        }
    }

    /// Rejects parameters that do not fit their 18/20-bit register fields.
    pub fn checked(self) -> Result<Self, Error> {
        if self.p1 > P1_MASK || self.p2 > P23_MASK || self.p3 > P23_MASK {
            return Err(Error::InvalidParameter);
        }

        Ok(self)
    }

    /// `floor(freq / divider)` for the divider the chip decodes from these
    /// parameters, `(P1 + 512 + P2 / P3) / 128`. Differs from the source
    /// ratio in the simplified encoding, which the chip reads as
    /// `a + 2b - 1`.
    pub fn divide(&self, freq: u32) -> u32 {
        let p3 = self.p3 as u64;
        let divider = (self.p1 as u64 + 512) * p3 + self.p2 as u64;
        (freq as u64 * 128 * p3)
            .checked_div(divider)
            .unwrap_or(0)
            .min(u32::MAX as u64) as u32
    }

    /// The eight parameter registers of a PLL block, starting at its base
    /// register.
    pub fn to_pll_block(&self) -> [u8; 8] {
        let p1 = self.p1 & P1_MASK;
        let p2 = self.p2 & P23_MASK;
        let p3 = self.p3 & P23_MASK;

        [
            ((p3 & 0x0000_FF00) >> 8) as u8,
            p3 as u8,
            ((p1 & 0x0003_0000) >> 16) as u8,
            ((p1 & 0x0000_FF00) >> 8) as u8,
            p1 as u8,
            (((p3 & 0x000F_0000) >> 12) | ((p2 & 0x000F_0000) >> 16)) as u8,
            ((p2 & 0x0000_FF00) >> 8) as u8,
            p2 as u8,
        ]
    }

    /// A complete Multisynth burst: the base register followed by the eight
    /// parameter registers, with the channel's R-divider exponent merged into
    /// the third one.
    pub fn to_multisynth_block(&self, base_addr: u8, r_div_bits: u8) -> [u8; 9] {
        let params = self.to_pll_block();
        let mut block = [0u8; 9];
        block[0] = base_addr;
        block[1..].copy_from_slice(&params);
        block[3] |= (r_div_bits << R_DIV_SHIFT) & R_DIV_MASK;
        block
    }

    /// Recovers the parameters from eight parameter registers. R-divider and
    /// other control bits sharing those registers are ignored.
    pub fn from_block(block: &[u8; 8]) -> Self {
        let p3 = ((block[5] as u32 & 0xF0) << 12) | ((block[0] as u32) << 8) | block[1] as u32;
        let p1 = ((block[2] as u32 & 0x03) << 16) | ((block[3] as u32) << 8) | block[4] as u32;
        let p2 = ((block[5] as u32 & 0x0F) << 16) | ((block[6] as u32) << 8) | block[7] as u32;

        Params { p1, p2, p3 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_pll_multipliers() {
        for mult in 15..=90u32 {
            let params = Params::feedback(&Ratio::integer(mult));
            assert_eq!(
                params,
                Params {
                    p1: 128 * mult - 512,
                    p2: 0,
                    p3: 1,
                }
            );
        }
    }

    #[test]
    fn integer_mode_passes_denominator_through() {
        for &denom in [1u32, 3, 1000, MAX_FRACTION].iter() {
            let ratio = Ratio::new(36, 0, denom).unwrap();
            assert_eq!(Params::feedback(&ratio).p1, 128 * 36 - 512);
            assert_eq!(Params::feedback(&ratio).p2, 0);
            assert_eq!(Params::feedback(&ratio).p3, denom);
            assert_eq!(Params::output(&ratio), Params::feedback(&ratio));
        }
    }

    #[test]
    fn general_fractional_mode() {
        // 24 + 2/3: floor(256 / 3) = 85
        let params = Params::feedback(&Ratio::new(24, 2, 3).unwrap());
        assert_eq!(
            params,
            Params {
                p1: 128 * 24 + 85 - 512,
                p2: 1,
                p3: 3,
            }
        );
    }

    #[test]
    fn simplified_mode_only_applies_to_output_dividers() {
        let ratio = Ratio::new(45, 3, 1).unwrap();

        assert_eq!(
            Params::output(&ratio),
            Params {
                p1: 5632,
                p2: 256,
                p3: 1,
            }
        );
        assert_eq!(
            Params::feedback(&ratio),
            Params {
                p1: 5632,
                p2: 0,
                p3: 1,
            }
        );
    }

    #[test]
    fn floor_is_exact_at_20_bit_limit() {
        let params = Params::feedback(&Ratio::new(15, MAX_FRACTION - 1, MAX_FRACTION).unwrap());
        assert_eq!(params.p1, 128 * 15 + 127 - 512);
        assert_eq!(params.p2, 1_048_447);
        assert!(params.p2 <= P23_MASK);

        let params = Params::feedback(&Ratio::new(15, MAX_FRACTION, MAX_FRACTION).unwrap());
        assert_eq!(params.p1, 128 * 15 + 128 - 512);
        assert_eq!(params.p2, 0);
    }

    #[test]
    fn rejects_out_of_range_fractions() {
        assert_eq!(Ratio::new(20, 1, 0), Err(Error::InvalidParameter));
        assert_eq!(Ratio::new(20, MAX_FRACTION + 1, 5), Err(Error::InvalidParameter));
        assert_eq!(Ratio::new(20, 1, MAX_FRACTION + 1), Err(Error::InvalidParameter));
        assert!(Ratio::new(20, MAX_FRACTION, MAX_FRACTION).is_ok());
    }

    #[test]
    fn pll_block_layout() {
        let params = Params {
            p1: 0x3_1234,
            p2: 0xA_BCDE,
            p3: 0xF_0102,
        };
        assert_eq!(
            params.to_pll_block(),
            [0x01, 0x02, 0x03, 0x12, 0x34, 0xFA, 0xBC, 0xDE]
        );
    }

    #[test]
    fn matches_clockbuilder_pll_registers() {
        // 25 MHz * (28 + 4/5) = 720 MHz
        let pll_a = Params::feedback(&Ratio::new(28, 4, 5).unwrap());
        assert_eq!(
            pll_a.to_pll_block(),
            [0x00, 0x05, 0x00, 0x0C, 0x66, 0x00, 0x00, 0x02]
        );

        // 25 MHz * (28 + 128/625) = 705.12 MHz
        let pll_b = Params::feedback(&Ratio::new(28, 128, 625).unwrap());
        assert_eq!(
            pll_b.to_pll_block(),
            [0x02, 0x71, 0x00, 0x0C, 0x1A, 0x00, 0x00, 0x86]
        );
    }

    #[test]
    fn multisynth_block_carries_address_and_r_divider() {
        let params = Params::output(&Ratio::integer(6));
        assert_eq!(
            params.to_multisynth_block(42, 0),
            [42, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00]
        );

        let block = Params {
            p1: 0x3_0000,
            p2: 0,
            p3: 1,
        }
        .to_multisynth_block(50, 0b101);
        assert_eq!(block[0], 50);
        assert_eq!(block[3], 0b0101_0011);
    }

    #[test]
    fn unpacking_recovers_parameters() {
        let cases = [
            Params::feedback(&Ratio::new(24, 2, 3).unwrap()),
            Params::feedback(&Ratio::new(90, MAX_FRACTION - 1, MAX_FRACTION).unwrap()),
            Params::output(&Ratio::new(2048, 0, 1).unwrap()),
            Params::output(&Ratio::new(4, 77, 1).unwrap()),
            Params {
                p1: 0x3_FFFF,
                p2: 0xF_FFFF,
                p3: 0xF_FFFF,
            },
        ];

        for params in cases.iter() {
            assert_eq!(Params::from_block(&params.to_pll_block()), *params);

            let block = params.to_multisynth_block(58, 0b111);
            let mut regs = [0u8; 8];
            regs.copy_from_slice(&block[1..]);
            assert_eq!(Params::from_block(&regs), *params);
        }
    }

    #[test]
    fn p1_wider_than_18_bits_is_rejected() {
        // 128 * (2048 + 4) - 512 = 262144
        let params = Params::output(&Ratio::new(2048, 4, 1).unwrap());
        assert_eq!(params.p1, 262_144);
        assert_eq!(params.checked(), Err(Error::InvalidParameter));

        let params = Params::output(&Ratio::new(2047, 1, 1).unwrap());
        assert_eq!(params.checked(), Ok(params));
        assert_eq!(
            Params::feedback(&Ratio::new(90, MAX_FRACTION, MAX_FRACTION).unwrap()).checked(),
            Ok(Params::feedback(&Ratio::new(90, MAX_FRACTION, MAX_FRACTION).unwrap()))
        );
    }

    #[test]
    fn divide_uses_the_divider_the_registers_encode() {
        let vco = 900_000_000;

        let integer = Ratio::integer(8);
        assert_eq!(Params::output(&integer).divide(vco), integer.divide(vco));

        let general = Ratio::new(45, 1, 2).unwrap();
        assert_eq!(Params::output(&general).divide(vco), general.divide(vco));

        // simplified: 10 + 2 * 3 - 1 = 15
        assert_eq!(Params::output(&Ratio::new(10, 3, 1).unwrap()).divide(vco), 60_000_000);
        // agrees with the ratio only for a numerator of 1
        let one = Ratio::new(10, 1, 1).unwrap();
        assert_eq!(Params::output(&one).divide(vco), one.divide(vco));

        assert_eq!(Params { p1: 0, p2: 0, p3: 0 }.divide(vco), 0);
    }

    #[test]
    fn ratio_scaling() {
        assert_eq!(Ratio::integer(36).scale(25_000_000), 900_000_000);
        assert_eq!(Ratio::new(24, 2, 3).unwrap().scale(25_000_000), 616_666_666);
        assert_eq!(Ratio::integer(8).divide(900_000_000), 112_500_000);
        assert_eq!(Ratio::new(45, 1, 2).unwrap().divide(616_666_666), 13_553_113);
        assert_eq!(Ratio::integer(0).divide(900_000_000), 0);
    }
}
