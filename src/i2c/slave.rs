// Licensed under the Apache-2.0 license

//! Slave responder.
//!
//! Each data-movement mode reports slave progress with its own status
//! encodings. The handlers reduce the raw status to a key, look it up in the
//! mode's table and run the resulting [`SlaveAction`]: callback emissions in
//! a fixed order followed by the next receive or transmit posture. Every mode
//! presents the same callback sequence to the registered [`SlaveTarget`]:
//! `SlaveWrReq, SlaveWrRecvd*, [SlaveRdReq, SlaveRdProc*], SlaveStop`.

use crate::common::Logger;
use crate::i2c::ast2600_i2c::{Ast2600I2c, IrqReturn};
use crate::i2c::common::{I2cSEvent, SlaveStatus};
use crate::i2c::error::Error;
use crate::i2c::hardware_interface::{DmaBuffer, DmaDirection, DmaMapper, HardwareInterface};
use crate::i2c::planner::{write_pool, ModeCapability, XferEngine};
use crate::i2c::registers::{
    self, FunCtrl, MasterIsr, SlaveCmd, SlaveIsr, I2CC_BUFF_CTRL, I2CC_FUN_CTRL,
    I2CC_STS_AND_BUFF, I2CM_CMD_STS, I2CM_ISR, I2CS_ADDR_CTRL, I2CS_CMD_STS, I2CS_DMA_LEN,
    I2CS_DMA_LEN_STS, I2CS_IER, I2CS_ISR, I2CS_RX_DMA, I2CS_TX_DMA, SLAVE_ADDR1_ENABLE,
    SLAVE_MSG_BUF_SIZE,
};
use crate::i2c::traits::SlaveTarget;
use crate::{i2c_debug, i2c_error};
use embedded_hal::delay::DelayNs;

macro_rules! isr {
    ($first:ident $(| $rest:ident)*) => {
        SlaveIsr::$first$(.union(SlaveIsr::$rest))*
    };
}

/// Which read callback supplies the next transmit byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReadPhase {
    Requested,
    Processed,
}

/// Posture armed once the callbacks have run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Rearm {
    /// Leave the current command in place.
    Keep,
    Receive,
    /// Refresh the receive length; issue the command only if receive is not
    /// already enabled.
    ReceiveIfIdle,
    /// Issue the receive command twice so the unit leaves its match state.
    ReceiveTwice,
    Trigger,
    /// Zero the pool length before triggering, so the next start does not
    /// inherit a stale receive length.
    TriggerAfterClear,
    Transmit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SlaveAction {
    stop_before: bool,
    write_requested: bool,
    drain: bool,
    read: Option<ReadPhase>,
    stop_after: bool,
    rearm: Rearm,
}

impl SlaveAction {
    const fn arm(rearm: Rearm) -> Self {
        Self {
            stop_before: false,
            write_requested: false,
            drain: false,
            read: None,
            stop_after: false,
            rearm,
        }
    }

    const fn stop_first(mut self) -> Self {
        self.stop_before = true;
        self
    }

    const fn write_req(mut self) -> Self {
        self.write_requested = true;
        self
    }

    const fn drain(mut self) -> Self {
        self.drain = true;
        self
    }

    const fn read(mut self, phase: ReadPhase) -> Self {
        self.read = Some(phase);
        self
    }

    const fn stop(mut self) -> Self {
        self.stop_after = true;
        self
    }
}

type SlaveTable = &'static [(&'static [SlaveIsr], SlaveAction)];

// Rows listing several keys cover distinct silicon encodings of the same
// condition; each key is reachable.

/// DMA mode, keyed with `SLAVE_PENDING` removed.
const DMA_TABLE: SlaveTable = &[
    (
        &[isr!(SLAVE_MATCH | RX_DONE | WAIT_RX_DMA), isr!(SLAVE_MATCH | WAIT_RX_DMA)],
        SlaveAction::arm(Rearm::Receive).write_req().drain(),
    ),
    (
        &[isr!(SLAVE_MATCH | STOP)],
        SlaveAction::arm(Rearm::Receive).stop(),
    ),
    (
        &[
            isr!(SLAVE_MATCH | RX_DONE_NAK | RX_DONE | STOP),
            isr!(SLAVE_MATCH | WAIT_RX_DMA | RX_DONE | STOP),
            isr!(SLAVE_MATCH | RX_DONE | STOP),
        ],
        SlaveAction::arm(Rearm::Receive).write_req().drain().stop(),
    ),
    (
        &[
            isr!(RX_DONE_NAK | RX_DONE | STOP),
            isr!(RX_DONE | WAIT_RX_DMA | STOP),
            isr!(RX_DONE | STOP),
        ],
        SlaveAction::arm(Rearm::Receive).drain().stop(),
    ),
    (
        &[isr!(RX_DONE | WAIT_RX_DMA)],
        SlaveAction::arm(Rearm::Receive).drain(),
    ),
    (
        &[isr!(SLAVE_MATCH | RX_DONE | WAIT_TX_DMA)],
        SlaveAction::arm(Rearm::Transmit)
            .write_req()
            .drain()
            .read(ReadPhase::Requested),
    ),
    (
        &[isr!(RX_DONE | WAIT_TX_DMA)],
        SlaveAction::arm(Rearm::Transmit)
            .drain()
            .read(ReadPhase::Requested),
    ),
    (
        &[isr!(SLAVE_MATCH | WAIT_TX_DMA)],
        SlaveAction::arm(Rearm::Transmit).read(ReadPhase::Requested),
    ),
    (
        &[isr!(WAIT_TX_DMA)],
        SlaveAction::arm(Rearm::Transmit).read(ReadPhase::Processed),
    ),
    (
        &[isr!(TX_NAK | STOP)],
        SlaveAction::arm(Rearm::Receive).stop(),
    ),
    (
        &[isr!(SLAVE_MATCH | RX_DONE)],
        SlaveAction::arm(Rearm::Keep).write_req(),
    ),
    (&[isr!(STOP)], SlaveAction::arm(Rearm::Keep).stop()),
];

/// Buffer mode. `SLAVE_PENDING` is part of the key: a stop bundled with the
/// next transaction's match is reported before that transaction starts.
const BUFFER_TABLE: SlaveTable = &[
    (
        &[
            isr!(SLAVE_PENDING | WAIT_RX_DMA | SLAVE_MATCH | RX_DONE | STOP),
            isr!(SLAVE_PENDING | SLAVE_MATCH | RX_DONE | STOP),
        ],
        SlaveAction::arm(Rearm::ReceiveIfIdle)
            .stop_first()
            .write_req()
            .drain(),
    ),
    (
        &[isr!(SLAVE_PENDING | SLAVE_MATCH | STOP)],
        SlaveAction::arm(Rearm::ReceiveIfIdle)
            .stop_first()
            .write_req(),
    ),
    (
        &[
            isr!(SLAVE_PENDING | WAIT_RX_DMA | SLAVE_MATCH | RX_DONE),
            isr!(WAIT_RX_DMA | SLAVE_MATCH | RX_DONE),
        ],
        SlaveAction::arm(Rearm::ReceiveIfIdle).write_req().drain(),
    ),
    (
        &[isr!(WAIT_RX_DMA | SLAVE_MATCH)],
        SlaveAction::arm(Rearm::ReceiveIfIdle).write_req(),
    ),
    (
        &[isr!(WAIT_RX_DMA | RX_DONE)],
        SlaveAction::arm(Rearm::Receive).drain(),
    ),
    (
        &[isr!(SLAVE_PENDING | WAIT_RX_DMA | RX_DONE | STOP)],
        SlaveAction::arm(Rearm::Receive).drain().stop(),
    ),
    (
        &[
            isr!(SLAVE_PENDING | RX_DONE | STOP),
            isr!(RX_DONE | STOP),
        ],
        SlaveAction::arm(Rearm::TriggerAfterClear).drain().stop(),
    ),
    (
        &[isr!(WAIT_TX_DMA | SLAVE_MATCH)],
        SlaveAction::arm(Rearm::Transmit).read(ReadPhase::Requested),
    ),
    (
        &[isr!(WAIT_TX_DMA | RX_DONE)],
        SlaveAction::arm(Rearm::Transmit)
            .drain()
            .read(ReadPhase::Requested),
    ),
    (
        &[isr!(WAIT_TX_DMA)],
        SlaveAction::arm(Rearm::Transmit).read(ReadPhase::Processed),
    ),
    (
        &[isr!(SLAVE_MATCH | RX_DONE)],
        SlaveAction::arm(Rearm::ReceiveTwice).write_req(),
    ),
    (
        &[isr!(TX_NAK | STOP), isr!(STOP)],
        SlaveAction::arm(Rearm::Trigger).stop(),
    ),
];

/// Byte mode. The first byte after a match is the address and is dropped.
const BYTE_TABLE: SlaveTable = &[
    (
        &[isr!(SLAVE_MATCH | RX_DONE | WAIT_RX_DMA)],
        SlaveAction::arm(Rearm::Keep).write_req(),
    ),
    (
        &[isr!(RX_DONE | WAIT_RX_DMA)],
        SlaveAction::arm(Rearm::Keep).drain(),
    ),
    (
        &[isr!(SLAVE_MATCH | RX_DONE | WAIT_TX_DMA)],
        SlaveAction::arm(Rearm::Transmit).read(ReadPhase::Requested),
    ),
    (
        &[isr!(TX_ACK | WAIT_TX_DMA)],
        SlaveAction::arm(Rearm::Transmit).read(ReadPhase::Processed),
    ),
    (
        &[isr!(STOP), isr!(STOP | TX_NAK)],
        SlaveAction::arm(Rearm::Keep).stop(),
    ),
];

fn lookup(table: SlaveTable, key: SlaveIsr) -> Option<SlaveAction> {
    table
        .iter()
        .find(|(keys, _)| keys.contains(&key))
        .map(|&(_, action)| action)
}

/// Slave-role state of one controller.
pub struct SlaveSession<T, B> {
    pub(crate) target: Option<T>,
    address: Option<u8>,
    /// A remote master is mid-exchange with this target.
    pub(crate) operate: bool,
    scratch: Option<B>,
    last_event: Option<I2cSEvent>,
    error: Option<Error>,
}

impl<T, B> SlaveSession<T, B> {
    pub(crate) fn new() -> Self {
        Self {
            target: None,
            address: None,
            operate: false,
            scratch: None,
            last_event: None,
            error: None,
        }
    }
}

impl<H, D, T, Dl, L> Ast2600I2c<H, D, T, Dl, L>
where
    H: HardwareInterface,
    D: DmaMapper,
    T: SlaveTarget,
    Dl: DelayNs,
    L: Logger,
{
    /// Starts answering `address` with `target`.
    ///
    /// In DMA mode a scratch region for slave traffic is mapped here and held
    /// until [`Self::unregister_slave`].
    pub fn register_slave(&mut self, address: u8, target: T) -> Result<(), Error> {
        if self.slave.target.is_some() || address > 0x7f {
            return Err(Error::InvalidArgument);
        }
        let scratch = match self.engine {
            XferEngine::Dma(_) => Some(
                self.dma
                    .map(SLAVE_MSG_BUF_SIZE, DmaDirection::Bidirectional)?,
            ),
            XferEngine::Buffer(_) | XferEngine::Byte(_) => None,
        };
        if let Some(buf) = &scratch {
            self.hw.write_reg(I2CS_RX_DMA, buf.bus_addr());
            self.hw.write_reg(I2CS_TX_DMA, buf.bus_addr());
        }
        self.slave = SlaveSession {
            target: Some(target),
            address: Some(address),
            operate: false,
            scratch,
            last_event: None,
            error: None,
        };

        self.hw
            .modify_reg(I2CC_FUN_CTRL, |ctrl| ctrl | FunCtrl::SLAVE_EN.bits());
        self.rearm_slave(Rearm::Receive, 0);
        self.hw
            .write_reg(I2CS_ADDR_CTRL, u32::from(address) | SLAVE_ADDR1_ENABLE);
        i2c_debug!(self.logger, "slave registered at {:#04x}", address);
        Ok(())
    }

    /// Stops answering and hands the target back.
    pub fn unregister_slave(&mut self) -> Option<T> {
        let target = self.slave.target.take()?;
        self.hw.write_reg(I2CS_ADDR_CTRL, 0);
        self.hw
            .modify_reg(I2CC_FUN_CTRL, |ctrl| ctrl & !FunCtrl::SLAVE_EN.bits());
        self.slave = SlaveSession::new();
        Some(target)
    }

    pub fn slave_status(&self) -> SlaveStatus {
        let fun_ctrl = FunCtrl::from_bits_retain(self.hw.read_reg(I2CC_FUN_CTRL));
        SlaveStatus {
            enabled: fun_ctrl.contains(FunCtrl::SLAVE_EN),
            address: self.slave.address,
            operating: self.slave.operate,
            last_event: self.slave.last_event,
            error: self.slave.error,
        }
    }

    pub fn slave_target(&self) -> Option<&T> {
        self.slave.target.as_ref()
    }

    pub fn slave_target_mut(&mut self) -> Option<&mut T> {
        self.slave.target.as_mut()
    }

    /// Returns and clears the error recorded when a slave exchange was cut
    /// short locally.
    pub fn take_slave_error(&mut self) -> Option<Error> {
        self.slave.error.take()
    }

    pub(crate) fn slave_irq(&mut self) -> IrqReturn {
        let ier = self.hw.read_reg(I2CS_IER);
        let isr = self.hw.read_reg(I2CS_ISR);
        if isr & ier == 0 {
            return IrqReturn::None;
        }
        // A master completion latched first must be consumed before the
        // slave status that followed it.
        if MasterIsr::from_bits_retain(self.hw.read_reg(I2CM_ISR)).contains(MasterIsr::PKT_DONE) {
            return IrqReturn::None;
        }

        let status = SlaveIsr::from_bits_retain(isr).difference(SlaveIsr::ADDR_BOOKKEEPING);
        if status.contains(SlaveIsr::PKT_DONE) {
            self.slave_packet_irq(status);
        } else {
            self.slave_byte_irq(status);
        }
        IrqReturn::Handled
    }

    fn slave_packet_irq(&mut self, raw: SlaveIsr) {
        if let XferEngine::Buffer(_) = self.engine {
            self.take_over_shared_buffer();
        }

        if raw.contains(SlaveIsr::INACTIVE_TO) {
            i2c_debug!(self.logger, "slave inactivity timeout");
            self.rearm_slave(Rearm::Receive, 0);
            self.hw.write_reg(I2CS_ISR, SlaveIsr::PKT_DONE.bits());
            self.slave_event(I2cSEvent::SlaveStop, &mut 0);
            self.slave.operate = false;
            return;
        }

        let mut key = raw.difference(SlaveIsr::PKT_DONE | SlaveIsr::PKT_ERROR);
        if key.contains(SlaveIsr::SLAVE_MATCH) {
            self.slave.operate = true;
        }
        let table = match self.engine {
            XferEngine::Dma(_) => {
                key.remove(SlaveIsr::SLAVE_PENDING);
                DMA_TABLE
            }
            XferEngine::Buffer(_) | XferEngine::Byte(_) => BUFFER_TABLE,
        };
        match lookup(table, key) {
            Some(action) => self.run_slave_action(action),
            None => {
                i2c_debug!(self.logger, "unhandled slave isr {:#x}", raw.bits());
                self.rearm_slave(Rearm::Receive, 0);
            }
        }

        self.hw.write_reg(I2CS_ISR, SlaveIsr::PKT_DONE.bits());
        if raw.contains(SlaveIsr::STOP) && !raw.contains(SlaveIsr::SLAVE_PENDING) {
            self.slave.operate = false;
        }
    }

    fn slave_byte_irq(&mut self, status: SlaveIsr) {
        if status.contains(SlaveIsr::SLAVE_MATCH) {
            self.slave.operate = true;
        }
        match lookup(BYTE_TABLE, status) {
            Some(action) => self.run_slave_action(action),
            None => {
                i2c_debug!(self.logger, "unhandled slave byte isr {:#x}", status.bits());
                self.rearm_slave(Rearm::Receive, 0);
            }
        }
        self.hw.write_reg(I2CS_ISR, status.bits());
        if status.contains(SlaveIsr::STOP) {
            self.slave.operate = false;
        }
    }

    fn run_slave_action(&mut self, action: SlaveAction) {
        let mut value = match self.engine {
            XferEngine::Byte(_) => registers::rx_byte(self.hw.read_reg(I2CC_STS_AND_BUFF)),
            XferEngine::Buffer(_) | XferEngine::Dma(_) => 0,
        };
        if action.stop_before {
            self.slave_event(I2cSEvent::SlaveStop, &mut 0);
        }
        if action.write_requested {
            self.slave_event(I2cSEvent::SlaveWrReq, &mut 0);
        }
        if action.drain {
            self.drain_slave_rx();
        }
        if let Some(phase) = action.read {
            let event = match phase {
                ReadPhase::Requested => I2cSEvent::SlaveRdReq,
                ReadPhase::Processed => I2cSEvent::SlaveRdProc,
            };
            self.slave_event(event, &mut value);
        }
        if action.stop_after {
            self.slave_event(I2cSEvent::SlaveStop, &mut 0);
        }
        self.rearm_slave(action.rearm, value);
    }

    /// Replays every byte received in the last phase as `SlaveWrRecvd`.
    fn drain_slave_rx(&mut self) {
        match self.engine {
            XferEngine::Dma(_) => {
                let count = registers::dma_rx_len_sts(self.hw.read_reg(I2CS_DMA_LEN_STS))
                    .min(SLAVE_MSG_BUF_SIZE);
                for index in 0..count {
                    let mut byte = [0u8];
                    if let Some(scratch) = &self.slave.scratch {
                        scratch.read_at(index, &mut byte);
                    }
                    let [mut value] = byte;
                    self.slave_event(I2cSEvent::SlaveWrRecvd, &mut value);
                }
            }
            XferEngine::Buffer(mode) => {
                let count = registers::rx_buf_len(self.hw.read_reg(I2CC_BUFF_CTRL))
                    .min(mode.step_ceiling());
                for index in 0..count {
                    let mut value = self.hw.pool_read(mode.rx_offset() + index);
                    self.slave_event(I2cSEvent::SlaveWrRecvd, &mut value);
                }
            }
            XferEngine::Byte(_) => {
                let mut value = registers::rx_byte(self.hw.read_reg(I2CC_STS_AND_BUFF));
                self.slave_event(I2cSEvent::SlaveWrRecvd, &mut value);
            }
        }
    }

    fn rearm_slave(&mut self, rearm: Rearm, value: u8) {
        match self.engine {
            XferEngine::Dma(_) => self.rearm_slave_dma(rearm, value),
            XferEngine::Buffer(mode) => {
                let step = mode.step_ceiling();
                self.rearm_slave_buffer(rearm, value, step);
            }
            XferEngine::Byte(_) => {
                let mut cmd = SlaveCmd::ACTIVE_ALL;
                if rearm == Rearm::Transmit {
                    self.hw.write_reg(I2CC_STS_AND_BUFF, u32::from(value));
                    cmd |= SlaveCmd::TX_CMD;
                }
                self.hw.write_reg(I2CS_CMD_STS, cmd.bits());
            }
        }
    }

    fn rearm_slave_dma(&mut self, rearm: Rearm, value: u8) {
        match rearm {
            Rearm::Keep => {}
            Rearm::Transmit => {
                if let Some(scratch) = self.slave.scratch.as_mut() {
                    scratch.write_at(0, &[value]);
                }
                self.hw.write_reg(I2CS_DMA_LEN_STS, 0);
                self.hw
                    .write_reg(I2CS_DMA_LEN, registers::slave_tx_dma_len(1));
                self.hw.write_reg(
                    I2CS_CMD_STS,
                    (SlaveCmd::TRIGGER | SlaveCmd::TX_DMA_EN).bits(),
                );
            }
            Rearm::Receive
            | Rearm::ReceiveIfIdle
            | Rearm::ReceiveTwice
            | Rearm::Trigger
            | Rearm::TriggerAfterClear => {
                self.hw.write_reg(
                    I2CS_DMA_LEN,
                    registers::slave_rx_dma_len(SLAVE_MSG_BUF_SIZE),
                );
                self.hw.write_reg(
                    I2CS_CMD_STS,
                    (SlaveCmd::TRIGGER | SlaveCmd::RX_DMA_EN).bits(),
                );
            }
        }
    }

    fn rearm_slave_buffer(&mut self, rearm: Rearm, value: u8, step: usize) {
        let receive = (SlaveCmd::TRIGGER | SlaveCmd::RX_BUFF_EN).bits();
        match rearm {
            Rearm::Keep => {}
            Rearm::Receive => {
                self.hw
                    .write_reg(I2CC_BUFF_CTRL, registers::set_rx_buf_len(step));
                self.hw.write_reg(I2CS_CMD_STS, receive);
            }
            Rearm::ReceiveIfIdle => {
                let armed = SlaveCmd::from_bits_retain(self.hw.read_reg(I2CS_CMD_STS))
                    .contains(SlaveCmd::RX_BUFF_EN);
                if !armed {
                    self.hw.write_reg(I2CS_CMD_STS, receive);
                }
                self.hw
                    .write_reg(I2CC_BUFF_CTRL, registers::set_rx_buf_len(step));
            }
            Rearm::ReceiveTwice => {
                self.hw.write_reg(I2CS_CMD_STS, receive);
                self.hw.write_reg(I2CS_CMD_STS, receive);
            }
            Rearm::Trigger => {
                self.hw.write_reg(I2CS_CMD_STS, SlaveCmd::TRIGGER.bits());
            }
            Rearm::TriggerAfterClear => {
                self.hw.write_reg(I2CC_BUFF_CTRL, 1);
                self.hw.write_reg(I2CS_CMD_STS, SlaveCmd::TRIGGER.bits());
            }
            Rearm::Transmit => {
                write_pool(&mut self.hw, 0, &[value]);
                self.hw
                    .write_reg(I2CC_BUFF_CTRL, registers::set_tx_buf_len(1));
                self.hw.write_reg(
                    I2CS_CMD_STS,
                    (SlaveCmd::TRIGGER | SlaveCmd::TX_BUFF_EN).bits(),
                );
            }
        }
    }

    fn slave_event(&mut self, event: I2cSEvent, value: &mut u8) {
        self.slave.last_event = Some(event);
        if let Some(target) = self.slave.target.as_mut() {
            target.on_event(event, value);
        }
    }

    /// The pool is shared: a slave packet arriving while a master command is
    /// still pending cancels that command.
    fn take_over_shared_buffer(&mut self) {
        let pending = self.hw.read_reg(I2CM_CMD_STS) & 0xffff;
        if pending == 0 {
            return;
        }
        self.hw.write_reg(I2CM_CMD_STS, 0);
        self.hw.write_reg(I2CC_BUFF_CTRL, 0);
        i2c_error!(self.logger, "slave took over pending master command {:#x}", pending);
        if self.master.is_active() {
            self.finish(Err(Error::ControllerBusy));
        }
    }

    /// Claims the shared pool for a master session in Buffer mode.
    ///
    /// Returns whether slave interrupts were masked; the caller restores them
    /// once the first step is armed.
    pub(crate) fn claim_shared_buffer(&mut self) -> Result<bool, Error> {
        let XferEngine::Buffer(_) = self.engine else {
            return Ok(false);
        };
        if self.slave.target.is_none() {
            return Ok(false);
        }
        if self.slave.operate {
            return Err(Error::ControllerBusy);
        }
        self.hw.write_reg(I2CS_IER, 0);
        if self.hw.read_reg(I2CS_ISR) != 0 {
            self.hw.write_reg(I2CS_IER, SlaveIsr::PKT_DONE.bits());
            return Err(Error::ControllerBusy);
        }
        Ok(true)
    }

    /// Re-issues a pending slave packet command after a master receive step,
    /// keeping the shared unit from latching a permanent NAK.
    pub(crate) fn requeue_slave_command(&mut self) {
        let cmd = self.hw.read_reg(I2CS_CMD_STS);
        if SlaveCmd::from_bits_retain(cmd).contains(SlaveCmd::PKT_MODE_EN) {
            self.hw.write_reg(I2CS_CMD_STS, 0);
            self.hw.write_reg(I2CS_CMD_STS, cmd);
        }
    }

    /// Restores the receive posture after the controller was toggled on the
    /// timeout path. An exchange cut short is reported to the target as a
    /// stop and recorded as a local error.
    pub(crate) fn rearm_slave_after_reset(&mut self) {
        if self.slave.target.is_none() {
            return;
        }
        if self.slave.operate {
            self.slave.error = Some(Error::ResourceExhausted);
            self.slave.operate = false;
            self.slave_event(I2cSEvent::SlaveStop, &mut 0);
        }
        self.rearm_slave(Rearm::Receive, 0);
    }
}
