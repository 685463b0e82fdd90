/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Bookkeeping for the PLL → Multisynth → R-divider chain.
//!
//! The chip cannot be queried for what it was told, so the driver remembers
//! which PLLs have been programmed and at what VCO frequency, and the last
//! R-divider applied to each output. The latter is needed because the R
//! divider shares a register with the top bits of the Multisynth `P1`
//! parameter, and a Multisynth burst rewrites that register.

use crate::codec::{Params, Ratio};
use crate::{ClockOutput, Error, OutputDivider, PLL};

/// Lowest Multisynth output the driver will program (before the R divider).
pub const MIN_OUTPUT_FREQ: u32 = 500_000;
/// Highest Multisynth output; faster clocks need the divide-by-4 mode.
pub const MAX_OUTPUT_FREQ: u32 = 150_000_000;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct ChannelState {
    r_div: OutputDivider,
    synth_freq: Option<u32>,
}

const CHANNEL_RESET: ChannelState = ChannelState {
    r_div: OutputDivider::Div1,
    synth_freq: None,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Planner {
    vco: [Option<u32>; 2],
    channels: [ChannelState; 3],
}

impl Default for Planner {
    fn default() -> Self {
        Planner::new()
    }
}

impl Planner {
    pub const fn new() -> Self {
        Planner {
            vco: [None; 2],
            channels: [CHANNEL_RESET; 3],
        }
    }

    /// Forgets every PLL and output.
    pub fn reset(&mut self) {
        *self = Planner::new();
    }

    /// Marks `pll` configured and returns its VCO frequency, rounded down.
    pub fn record_pll(&mut self, pll: PLL, xtal_freq: u32, ratio: &Ratio) -> u32 {
        let vco = ratio.scale(xtal_freq);
        self.vco[pll.ix()] = Some(vco);
        vco
    }

    pub fn require_configured(&self, pll: PLL) -> Result<u32, Error> {
        self.vco[pll.ix()].ok_or(Error::InvalidParameter)
    }

    pub fn pll_frequency(&self, pll: PLL) -> Option<u32> {
        self.vco[pll.ix()]
    }

    /// Frequency a Multisynth programmed with `params` would produce from
    /// `pll`. Fails if the PLL was never programmed or the result is outside
    /// the supported output range.
    pub fn plan_output(&self, pll: PLL, params: &Params) -> Result<u32, Error> {
        let vco = self.require_configured(pll)?;
        let freq = params.divide(vco);

        if freq < MIN_OUTPUT_FREQ || freq > MAX_OUTPUT_FREQ {
            return Err(Error::InvalidParameter);
        }

        Ok(freq)
    }

    pub fn record_output(&mut self, clk: ClockOutput, synth_freq: u32) {
        self.channels[clk.ix()].synth_freq = Some(synth_freq);
    }

    pub fn record_r_divider(&mut self, clk: ClockOutput, r_div: OutputDivider) {
        self.channels[clk.ix()].r_div = r_div;
    }

    pub fn last_r_divider(&self, clk: ClockOutput) -> OutputDivider {
        self.channels[clk.ix()].r_div
    }

    /// Final output frequency: Multisynth output after the R divider.
    pub fn output_frequency(&self, clk: ClockOutput) -> Option<u32> {
        let channel = &self.channels[clk.ix()];
        channel.synth_freq.map(|freq| freq >> channel.r_div.bits())
    }
}
