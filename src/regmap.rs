/*
   Copyright 2018 Ilya Epifanov

   Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
   http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
   http://opensource.org/licenses/MIT>, at your option. This file may not be
   copied, modified, or distributed except according to those terms.
*/
//! Prebuilt register maps, as exported by ClockBuilder Desktop.

/// 25 MHz crystal, CLK0 = 120.00 MHz, CLK1 = 12.00 MHz, CLK2 = 13.56 MHz.
///
/// Covers registers 15..=92 and 149..=170, in the order they are written.
pub const CLOCKBUILDER_25MHZ: [(u8, u8); 100] = [
    // PLL input source: crystal for both PLLs
    (15, 0x00),
    // CLK0: 8 mA, MS0, PLL A, integer mode, powered up
    (16, 0x4F),
    // CLK1: 8 mA, MS1, PLL A, integer mode, powered up
    (17, 0x4F),
    // CLK2: 8 mA, MS2, PLL B, integer mode, powered up
    (18, 0x6F),
    // CLK3..CLK7 powered down
    (19, 0x80),
    (20, 0x80),
    (21, 0x80),
    (22, 0x80),
    (23, 0x80),
    // CLK0..CLK7 drive low while disabled
    (24, 0x00),
    (25, 0x00),
    // PLL A: 28 + 4/5
    (26, 0x00),
    (27, 0x05),
    (28, 0x00),
    (29, 0x0C),
    (30, 0x66),
    (31, 0x00),
    (32, 0x00),
    (33, 0x02),
    // PLL B: 28 + 128/625
    (34, 0x02),
    (35, 0x71),
    (36, 0x00),
    (37, 0x0C),
    (38, 0x1A),
    (39, 0x00),
    (40, 0x00),
    (41, 0x86),
    // MS0: 6
    (42, 0x00),
    (43, 0x01),
    (44, 0x00),
    (45, 0x01),
    (46, 0x00),
    (47, 0x00),
    (48, 0x00),
    (49, 0x00),
    // MS1: 60
    (50, 0x00),
    (51, 0x01),
    (52, 0x00),
    (53, 0x1C),
    (54, 0x00),
    (55, 0x00),
    (56, 0x00),
    (57, 0x00),
    // MS2: 52
    (58, 0x00),
    (59, 0x01),
    (60, 0x00),
    (61, 0x18),
    (62, 0x00),
    (63, 0x00),
    (64, 0x00),
    (65, 0x00),
    // MS3..MS7 and their R dividers unused
    (66, 0x00),
    (67, 0x00),
    (68, 0x00),
    (69, 0x00),
    (70, 0x00),
    (71, 0x00),
    (72, 0x00),
    (73, 0x00),
    (74, 0x00),
    (75, 0x00),
    (76, 0x00),
    (77, 0x00),
    (78, 0x00),
    (79, 0x00),
    (80, 0x00),
    (81, 0x00),
    (82, 0x00),
    (83, 0x00),
    (84, 0x00),
    (85, 0x00),
    (86, 0x00),
    (87, 0x00),
    (88, 0x00),
    (89, 0x00),
    (90, 0x00),
    (91, 0x00),
    (92, 0x00),
    // spread spectrum off, phase offsets zero
    (149, 0x00),
    (150, 0x00),
    (151, 0x00),
    (152, 0x00),
    (153, 0x00),
    (154, 0x00),
    (155, 0x00),
    (156, 0x00),
    (157, 0x00),
    (158, 0x00),
    (159, 0x00),
    (160, 0x00),
    (161, 0x00),
    (162, 0x00),
    (163, 0x00),
    (164, 0x00),
    (165, 0x00),
    (166, 0x00),
    (167, 0x00),
    (168, 0x00),
    (169, 0x00),
    (170, 0x00),
];
