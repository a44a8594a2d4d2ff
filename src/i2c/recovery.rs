// Licensed under the Apache-2.0 license

//! Bus recovery.
//!
//! When a target holds SDA low with SCL released, the controller can clock
//! SCL until the target lets go. The outcome arrives as a master interrupt
//! and is reported through the controller's recovery [`Completion`].
//!
//! [`Completion`]: crate::i2c::completion::Completion

use crate::common::Logger;
use crate::i2c::ast2600_i2c::Ast2600I2c;
use crate::i2c::error::Error;
use crate::i2c::hardware_interface::{DmaMapper, HardwareInterface};
use crate::i2c::registers::{FunCtrl, LineState, MasterCmd, I2CC_FUN_CTRL, I2CC_STS_AND_BUFF, I2CM_CMD_STS};
use crate::i2c::traits::SlaveTarget;
use crate::{i2c_debug, i2c_error};
use embedded_hal::delay::DelayNs;

impl<H, D, T, Dl, L> Ast2600I2c<H, D, T, Dl, L>
where
    H: HardwareInterface,
    D: DmaMapper,
    T: SlaveTarget,
    Dl: DelayNs,
    L: Logger,
{
    pub(crate) fn line_state(&self) -> LineState {
        LineState::from_bits_truncate(self.hw.read_reg(I2CC_STS_AND_BUFF))
    }

    pub fn bus_busy(&self) -> bool {
        self.line_state().contains(LineState::BUS_BUSY)
    }

    /// Attempts to free a stuck bus.
    ///
    /// An idle bus with SDA released is left untouched. Otherwise the slave
    /// function is suspended, the recovery command is issued if SDA is low
    /// while SCL is high, and the previous function control is restored on
    /// every exit.
    pub fn recover_bus(&mut self) -> Result<(), Error> {
        let state = self.line_state();
        if !state.contains(LineState::BUS_BUSY) && state.contains(LineState::SDA_LINE) {
            return Ok(());
        }
        i2c_debug!(self.logger, "bus recovery, line state {:#x}", state.bits());

        let ctrl = self.hw.read_reg(I2CC_FUN_CTRL);
        let suspended = ctrl & !(FunCtrl::MASTER_EN | FunCtrl::SLAVE_EN).bits();
        self.hw.write_reg(I2CC_FUN_CTRL, suspended);
        self.hw
            .write_reg(I2CC_FUN_CTRL, suspended | FunCtrl::MASTER_EN.bits());

        let result = self.clock_out_stuck_target();
        let result = result.and_then(|()| {
            if self.bus_busy() {
                i2c_error!(self.logger, "bus still busy after recovery");
                Err(Error::ProtocolViolation)
            } else {
                Ok(())
            }
        });

        self.hw.write_reg(I2CC_FUN_CTRL, ctrl);
        result
    }

    fn clock_out_stuck_target(&mut self) -> Result<(), Error> {
        let state = self.line_state();
        if state.contains(LineState::SDA_LINE) || !state.contains(LineState::SCL_LINE) {
            return Ok(());
        }
        self.recovery.reset();
        self.recovery.arm()?;
        self.hw
            .write_reg(I2CM_CMD_STS, MasterCmd::RECOVER_CMD_EN.bits());

        let timeout_us = self.config.xfer_timeout.to_micros();
        match self.wait_serviced(timeout_us, |this| this.recovery.poll()) {
            Some(Ok(_)) => Ok(()),
            Some(Err(err)) => {
                i2c_error!(self.logger, "recovery command failed: {:?}", err);
                Err(Error::ProtocolViolation)
            }
            None => {
                self.recovery.reset();
                Err(Error::BusTimeout)
            }
        }
    }
}
