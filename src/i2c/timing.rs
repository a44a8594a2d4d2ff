// Licensed under the Apache-2.0 license

//! Bus clock selection for `I2CC_AC_TIMING`.
//!
//! The controller derives SCL from one of sixteen base clocks: the APB clock,
//! four clocks set by the global divider register, and successive halvings of
//! the fourth. The first base clock reachable with a divisor of at most 32 is
//! used.

use crate::i2c::common::TimingConfig;

/// Largest SCL divisor the timing register can express.
const MAX_DIVISOR: u32 = 32;
const MAX_BASE_CLOCK_INDEX: usize = 15;
/// Time base of the SMBus clock-low timeout counter.
const TIMEOUT_BASE_CLOCK: u32 = 2;
/// Clock-low timeout in 4096 us units (about 35 ms).
const SMBUS_CLOCK_LOW_TIMEOUT: u32 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockSelection {
    /// Value for `I2CC_AC_TIMING`.
    pub ac_timing: u32,
    /// Frequency of the selected base clock, in Hz.
    pub base_clock: u32,
}

/// Frequency of base clock `index` for the given APB clock and divider register.
pub fn base_clock(apb_hz: u32, divider_reg: u32, index: usize) -> u32 {
    let apb = u64::from(apb_hz);
    let clock = match index {
        0 => apb,
        1..=4 => {
            let div = u64::from((divider_reg >> ((index - 1) * 8)) & 0xff);
            apb * 2 / (div + 2)
        }
        _ => u64::from(base_clock(apb_hz, divider_reg, 4)) >> (index - 5),
    };
    u32::try_from(clock).unwrap_or(u32::MAX)
}

/// Computes the AC timing word for a `bus_hz` bus.
///
/// Non-zero manual SCL high/low values in `overrides` replace the computed
/// split; `manual_sda_hold` lands in the hold-time field.
pub fn select_clock(
    apb_hz: u32,
    divider_reg: u32,
    bus_hz: u32,
    overrides: &TimingConfig,
    smbus_timeout: bool,
) -> ClockSelection {
    let bus_hz = bus_hz.max(1);
    let (index, divisor) = (0..=MAX_BASE_CLOCK_INDEX)
        .find_map(|index| {
            let clock = base_clock(apb_hz, divider_reg, index);
            (clock / bus_hz <= MAX_DIVISOR).then_some((index, clock.div_ceil(bus_hz)))
        })
        .unwrap_or((MAX_BASE_CLOCK_INDEX, MAX_DIVISOR));
    let divisor = divisor.min(MAX_DIVISOR);

    let mut scl_low = (divisor * 9 / 16).saturating_sub(1).min(15);
    let mut scl_high = divisor.saturating_sub(scl_low + 2) & 0xf;
    if overrides.manual_scl_low != 0 {
        scl_low = u32::from(overrides.manual_scl_low) & 0xf;
    }
    if overrides.manual_scl_high != 0 {
        scl_high = u32::from(overrides.manual_scl_high) & 0xf;
    }

    let mut ac_timing = (scl_high.wrapping_sub(1) & 0xf) << 20
        | scl_high << 16
        | scl_low << 12
        | (u32::from(overrides.manual_sda_hold) & 0x3) << 28
        | index as u32;
    if smbus_timeout {
        ac_timing |= (TIMEOUT_BASE_CLOCK & 0x3) << 8;
        ac_timing |= (SMBUS_CLOCK_LOW_TIMEOUT & 0x1f) << 24;
    }

    ClockSelection {
        ac_timing,
        base_clock: base_clock(apb_hz, divider_reg, index),
    }
}
