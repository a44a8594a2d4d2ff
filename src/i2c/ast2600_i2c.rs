// Licensed under the Apache-2.0 license

//! AST2600 I2C controller: lifecycle, interrupt dispatch and the blocking
//! master entry points.
//!
//! Master, slave, recovery and SMBus logic live in their own modules as
//! further `impl` blocks of [`Ast2600I2c`].

use crate::common::{Logger, NoOpLogger};
use crate::i2c::common::{I2cConfig, I2cSpeed, I2cXferMode, TimingConfig};
use crate::i2c::completion::Completion;
use crate::i2c::error::Error;
use crate::i2c::hardware_interface::{DmaMapper, HardwareInterface};
use crate::i2c::master::{MasterSession, MAX_SESSION_MESSAGES};
use crate::i2c::message::Message;
use crate::i2c::planner::XferEngine;
use crate::i2c::registers::{
    FunCtrl, MasterIsr, SlaveIsr, I2CC_AC_TIMING, I2CC_FUN_CTRL, I2CM_IER, I2CM_ISR, I2CS_ADDR_CTRL,
    I2CS_IER, I2CS_ISR,
};
use crate::i2c::timing;
use crate::i2c::traits::{I2cHardwareCore, I2cMaster, SlaveTarget};
use crate::{i2c_debug, i2c_error};
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Operation, SevenBitAddress};
use heapless::Vec;

#[cfg(feature = "i2c_target")]
use crate::i2c::slave::SlaveSession;
#[cfg(not(feature = "i2c_target"))]
use core::marker::PhantomData;

/// Granularity of the bounded waits, in microseconds.
pub const POLL_INTERVAL_US: u32 = 10;
/// Operations accepted in one embedded-hal transaction.
pub const MAX_TRANSACTION_OPS: usize = MAX_SESSION_MESSAGES;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IrqReturn {
    None,
    Handled,
}

/// One controller instance.
///
/// Whoever holds `&mut` to the controller services it: an interrupt handler
/// calls [`Ast2600I2c::service_interrupt`], and the blocking master calls
/// service the unit inline while they own it. Either way a master session
/// advances without its caller's buffers.
pub struct Ast2600I2c<H, D, T, Dl, L = NoOpLogger>
where
    H: HardwareInterface,
    D: DmaMapper,
    T: SlaveTarget,
    Dl: DelayNs,
    L: Logger,
{
    pub(crate) hw: H,
    pub(crate) dma: D,
    pub(crate) delay: Dl,
    pub(crate) logger: L,
    pub(crate) config: I2cConfig,
    pub(crate) engine: XferEngine,
    pub(crate) master: MasterSession<D::Buffer>,
    pub(crate) recovery: Completion,
    pub(crate) alert_pending: bool,
    #[cfg(feature = "i2c_target")]
    pub(crate) slave: SlaveSession<T, D::Buffer>,
    #[cfg(not(feature = "i2c_target"))]
    _target: PhantomData<T>,
}

impl<H, D, T, Dl, L> Ast2600I2c<H, D, T, Dl, L>
where
    H: HardwareInterface,
    D: DmaMapper,
    T: SlaveTarget,
    Dl: DelayNs,
    L: Logger,
{
    /// Wraps the hardware. Nothing is programmed until [`Self::init`].
    pub fn new(hw: H, dma: D, delay: Dl, logger: L, config: I2cConfig) -> Self {
        let engine = XferEngine::new(config.xfer_mode, hw.pool_size());
        Self {
            hw,
            dma,
            delay,
            logger,
            config,
            engine,
            master: MasterSession::new(),
            recovery: Completion::new(),
            alert_pending: false,
            #[cfg(feature = "i2c_target")]
            slave: SlaveSession::new(),
            #[cfg(not(feature = "i2c_target"))]
            _target: PhantomData,
        }
    }

    pub fn config(&self) -> &I2cConfig {
        &self.config
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    /// Brings the controller to an idle master-enabled state.
    pub fn init(&mut self) {
        self.engine = XferEngine::new(self.config.xfer_mode, self.hw.pool_size());
        self.hw.write_reg(I2CC_FUN_CTRL, 0);
        let mut fun_ctrl = FunCtrl::BUS_AUTO_RELEASE | FunCtrl::MASTER_EN;
        if !self.config.multi_master {
            fun_ctrl |= FunCtrl::MULTI_MASTER_DIS;
        }
        self.hw.write_reg(I2CC_FUN_CTRL, fun_ctrl.bits());
        self.hw.write_reg(I2CS_ADDR_CTRL, 0);

        let timing = self.config.timing_config;
        self.configure_timing(&timing);

        self.hw.write_reg(I2CM_ISR, 0x0fff_ffff);
        self.hw.write_reg(I2CS_ISR, 0x0fff_ffff);
        let slave_ier = if self.config.xfer_mode == I2cXferMode::ByteMode {
            0xffff
        } else {
            SlaveIsr::PKT_DONE.bits()
        };
        self.hw.write_reg(I2CS_IER, slave_ier);

        let mut master_ier = MasterIsr::PKT_DONE | MasterIsr::BUS_RECOVER;
        if self.config.smbus_alert {
            master_ier |= MasterIsr::SMBUS_ALT;
        }
        self.hw.write_reg(I2CM_IER, master_ier.bits());
        self.master.reset();
        self.alert_pending = false;
        i2c_debug!(self.logger, "init mode {:?}", self.config.xfer_mode);
    }

    /// Programs bus timing and returns the selected base clock in Hz.
    pub fn configure_timing(&mut self, overrides: &TimingConfig) -> u32 {
        let apb = if overrides.clk_src != 0 {
            overrides.clk_src
        } else {
            self.hw.clock_rate()
        };
        let selection = timing::select_clock(
            apb,
            self.hw.global_clock_divider(),
            self.config.speed.hz(),
            overrides,
            self.config.smbus_timeout,
        );
        self.hw.write_reg(I2CC_AC_TIMING, selection.ac_timing);
        selection.base_clock
    }

    /// Single interrupt entry point.
    ///
    /// The slave role is served first unless a master packet completion is
    /// latched, in which case the master handler consumes it first.
    pub fn service_interrupt(&mut self) -> IrqReturn {
        #[cfg(feature = "i2c_target")]
        {
            let fun_ctrl = FunCtrl::from_bits_retain(self.hw.read_reg(I2CC_FUN_CTRL));
            if fun_ctrl.contains(FunCtrl::SLAVE_EN) && self.slave_irq() == IrqReturn::Handled {
                return IrqReturn::Handled;
            }
        }
        self.master_irq()
    }

    /// Returns and clears a latched SMBus alert.
    pub fn take_smbus_alert(&mut self) -> bool {
        let pending = self.alert_pending;
        if pending {
            self.alert_pending = false;
            self.hw
                .modify_reg(I2CM_IER, |ier| ier | MasterIsr::SMBUS_ALT.bits());
        }
        pending
    }

    /// Disables and re-enables the controller, cancelling any command.
    pub(crate) fn toggle_controller(&mut self) {
        let ctrl = self.hw.read_reg(I2CC_FUN_CTRL);
        self.hw.write_reg(I2CC_FUN_CTRL, 0);
        self.hw.write_reg(I2CC_FUN_CTRL, ctrl);
    }

    /// Polls `done` until it yields, servicing the controller in between.
    ///
    /// Returns `None` once `timeout_us` has elapsed without a result.
    pub(crate) fn wait_serviced(
        &mut self,
        timeout_us: u32,
        mut done: impl FnMut(&mut Self) -> nb::Result<usize, Error>,
    ) -> Option<Result<usize, Error>> {
        let mut waited = 0u32;
        loop {
            self.service_interrupt();
            match done(self) {
                Ok(count) => return Some(Ok(count)),
                Err(nb::Error::Other(err)) => return Some(Err(err)),
                Err(nb::Error::WouldBlock) => {}
            }
            if waited >= timeout_us {
                i2c_error!(self.logger, "wait expired after {} us", waited);
                return None;
            }
            self.delay.delay_us(POLL_INTERVAL_US);
            waited = waited.saturating_add(POLL_INTERVAL_US);
        }
    }
}

impl<H, D, T, Dl, L> I2cHardwareCore for Ast2600I2c<H, D, T, Dl, L>
where
    H: HardwareInterface,
    D: DmaMapper,
    T: SlaveTarget,
    Dl: DelayNs,
    L: Logger,
{
    type Error = Error;

    fn init(&mut self) {
        Ast2600I2c::init(self);
    }

    fn configure_timing(&mut self, speed: I2cSpeed, timing: &TimingConfig) -> Result<u32, Error> {
        self.config.speed = speed;
        self.config.timing_config = *timing;
        Ok(Ast2600I2c::configure_timing(self, timing))
    }

    fn enable_interrupts(&mut self, mask: u32) {
        self.hw.modify_reg(I2CM_IER, |ier| ier | mask);
    }

    fn clear_interrupts(&mut self, mask: u32) {
        self.hw.write_reg(I2CM_ISR, mask);
    }

    fn handle_interrupt(&mut self) {
        self.service_interrupt();
    }

    fn recover_bus(&mut self) -> Result<(), Error> {
        Ast2600I2c::recover_bus(self)
    }
}

impl<H, D, T, Dl, L> I2cMaster<SevenBitAddress> for Ast2600I2c<H, D, T, Dl, L>
where
    H: HardwareInterface,
    D: DmaMapper,
    T: SlaveTarget,
    Dl: DelayNs,
    L: Logger,
{
    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Error> {
        self.master_xfer(&mut [Message::write(addr, bytes)])
            .map(|_| ())
    }

    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Error> {
        self.master_xfer(&mut [Message::read(addr, buffer)])
            .map(|_| ())
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Error> {
        self.master_xfer(&mut [Message::write(addr, bytes), Message::read(addr, buffer)])
            .map(|_| ())
    }

    fn transaction_slice(
        &mut self,
        addr: SevenBitAddress,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Error> {
        if ops_slice.is_empty() {
            return Ok(());
        }
        let mut msgs: Vec<Message<'_>, MAX_TRANSACTION_OPS> = Vec::new();
        for op in ops_slice.iter_mut() {
            let msg = match op {
                Operation::Read(buffer) => Message::read(addr, buffer),
                Operation::Write(bytes) => Message::write(addr, bytes),
            };
            msgs.push(msg).map_err(|_| Error::InvalidArgument)?;
        }
        self.master_xfer(&mut msgs).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i2c::common::I2cConfigBuilder;
    use crate::i2c::registers::MasterCmd;
    use crate::i2c::sim::controller;

    #[test]
    fn init_programs_single_master_defaults() {
        let (ctl, _arena) = controller(I2cConfig::default());
        let hw = ctl.hardware();

        assert_eq!(
            hw.reg(I2CC_FUN_CTRL),
            (FunCtrl::BUS_AUTO_RELEASE | FunCtrl::MASTER_EN | FunCtrl::MULTI_MASTER_DIS).bits()
        );
        assert_eq!(hw.reg(I2CC_AC_TIMING), 0x0078_a004);
        assert_eq!(
            hw.reg(I2CM_IER),
            (MasterIsr::PKT_DONE | MasterIsr::BUS_RECOVER).bits()
        );
        assert_eq!(hw.reg(I2CS_IER), 0xffff);
        assert_eq!(hw.reg(I2CS_ADDR_CTRL), 0);
    }

    #[test]
    fn packet_modes_enable_only_slave_packet_interrupt() {
        let config = I2cConfigBuilder::new()
            .xfer_mode(I2cXferMode::DmaMode)
            .multi_master(true)
            .speed(I2cSpeed::Fast)
            .build();
        let (ctl, _arena) = controller(config);
        let hw = ctl.hardware();

        assert_eq!(hw.reg(I2CS_IER), SlaveIsr::PKT_DONE.bits());
        assert!(!FunCtrl::from_bits_retain(hw.reg(I2CC_FUN_CTRL)).contains(FunCtrl::MULTI_MASTER_DIS));
        assert_eq!(hw.reg(I2CC_AC_TIMING), 0x0056_6003);
    }

    #[test]
    fn timing_reconfiguration_reports_base_clock() {
        let (mut ctl, _arena) = controller(I2cConfig::default());
        let base = I2cHardwareCore::configure_timing(&mut ctl, I2cSpeed::Fast, &TimingConfig::default());
        assert_eq!(base, Ok(5_555_555));
        assert_eq!(ctl.config().speed, I2cSpeed::Fast);
        assert_eq!(ctl.hardware().reg(I2CC_AC_TIMING), 0x0056_6003);
    }

    #[test]
    fn smbus_alert_is_latched_and_masked_until_taken() {
        let config = I2cConfigBuilder::new().smbus_alert(true).build();
        let (mut ctl, _arena) = controller(config);
        assert!(MasterIsr::from_bits_retain(ctl.hardware().reg(I2CM_IER)).contains(MasterIsr::SMBUS_ALT));

        ctl.hardware_mut().raise_master(MasterIsr::SMBUS_ALT);
        assert_eq!(ctl.service_interrupt(), IrqReturn::Handled);
        let ier = MasterIsr::from_bits_retain(ctl.hardware().reg(I2CM_IER));
        assert!(!ier.contains(MasterIsr::SMBUS_ALT));
        assert_eq!(ctl.hardware().reg(I2CM_ISR), 0);

        assert!(ctl.take_smbus_alert());
        assert!(!ctl.take_smbus_alert());
        let ier = MasterIsr::from_bits_retain(ctl.hardware().reg(I2CM_IER));
        assert!(ier.contains(MasterIsr::SMBUS_ALT));
    }

    #[test]
    fn quiet_controller_reports_no_interrupt() {
        let (mut ctl, _arena) = controller(I2cConfig::default());
        assert_eq!(ctl.service_interrupt(), IrqReturn::None);
    }

    #[test]
    fn transaction_runs_operations_as_one_session() {
        let (mut ctl, _arena) = controller(I2cConfig::default());
        ctl.hardware_mut().device(0x50).regs.insert(0x01, vec![0x10, 0x20]);

        let mut buf = [0u8; 2];
        let mut ops = [Operation::Write(&[0x01]), Operation::Read(&mut buf)];
        assert_eq!(ctl.transaction_slice(0x50, &mut ops), Ok(()));
        assert_eq!(buf, [0x10, 0x20]);
        let stops = ctl
            .hardware()
            .master_commands()
            .iter()
            .filter(|cmd| cmd.contains(MasterCmd::STOP))
            .count();
        assert_eq!(stops, 1);
    }

    #[test]
    fn transaction_beyond_operation_limit_is_rejected() {
        let (mut ctl, _arena) = controller(I2cConfig::default());
        ctl.hardware_mut().device(0x50);
        let byte = [0u8];
        let mut ops: std::vec::Vec<Operation<'_>> = (0..=MAX_TRANSACTION_OPS)
            .map(|_| Operation::Write(&byte))
            .collect();

        assert_eq!(ctl.transaction_slice(0x50, &mut ops), Err(Error::InvalidArgument));
        assert!(ctl.hardware().master_commands().is_empty());
        assert_eq!(ctl.transaction_slice(0x50, &mut []), Ok(()));
    }
}
