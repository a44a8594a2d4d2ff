// Licensed under the Apache-2.0 license

//! Master transaction driver.
//!
//! A session copies the shape of its messages when it starts and walks them
//! one hardware step at a time. Each packet completion is classified into a
//! [`MasterEvent`] and applied to the current [`MasterPhase`]; the transition
//! either arms the next step or ends the session through its [`Completion`].
//! The interrupt path never needs the caller's buffers: payloads live in DMA
//! scratch or in the session staging area until [`Ast2600I2c::poll_transfer`]
//! hands received bytes back.

use crate::common::Logger;
use crate::i2c::ast2600_i2c::{Ast2600I2c, IrqReturn};
use crate::i2c::completion::Completion;
use crate::i2c::error::{classify, Error};
use crate::i2c::hardware_interface::{DmaBuffer, DmaMapper, HardwareInterface};
use crate::i2c::message::{block_len, Direction, Message};
use crate::i2c::planner::{plan_step, ModeCapability, XferEngine};
use crate::i2c::registers::{MasterCmd, MasterIsr, I2CM_CMD_STS, I2CM_IER, I2CM_ISR};
use crate::i2c::traits::SlaveTarget;
use crate::{i2c_debug, i2c_error};
use embedded_hal::delay::DelayNs;
use heapless::Vec;

#[cfg(feature = "i2c_target")]
use crate::i2c::registers::{SlaveIsr, I2CS_IER};

/// Messages one session can carry.
pub const MAX_SESSION_MESSAGES: usize = 16;
/// Byte and Buffer mode payload bytes one session can hold, summed over its
/// messages. DMA payloads live in their scratch mappings instead.
pub const SESSION_STAGING_LEN: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MasterPhase {
    Idle,
    /// A data (or address-only) step is armed.
    AwaitingStep,
    /// All messages moved; a trailing stop-only step is armed.
    AwaitingStop,
    /// Result published, not yet consumed.
    Completed,
}

/// Packet-completion status reduced to what the session reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MasterEvent {
    PacketError,
    NotAcknowledged,
    Stop,
    TxAck,
    RxDone { stop: bool },
    Unrecognized,
}

const PACKET_BITS: MasterIsr = MasterIsr::TX_ACK
    .union(MasterIsr::TX_NAK)
    .union(MasterIsr::RX_DONE)
    .union(MasterIsr::NORMAL_STOP)
    .union(MasterIsr::PKT_ERROR);

/// Status encodings the controller reports on packet completion. Rows
/// mapping to the same event are distinct silicon encodings of one
/// condition and are all live.
const PACKET_TABLE: &[(MasterIsr, MasterEvent)] = &[
    (MasterIsr::PKT_ERROR, MasterEvent::PacketError),
    (
        MasterIsr::PKT_ERROR.union(MasterIsr::TX_NAK),
        MasterEvent::NotAcknowledged,
    ),
    (
        MasterIsr::PKT_ERROR
            .union(MasterIsr::TX_NAK)
            .union(MasterIsr::NORMAL_STOP),
        MasterEvent::NotAcknowledged,
    ),
    (MasterIsr::NORMAL_STOP, MasterEvent::Stop),
    (MasterIsr::TX_ACK, MasterEvent::TxAck),
    (
        MasterIsr::TX_ACK.union(MasterIsr::NORMAL_STOP),
        MasterEvent::TxAck,
    ),
    (MasterIsr::RX_DONE, MasterEvent::RxDone { stop: false }),
    (
        MasterIsr::RX_DONE.union(MasterIsr::NORMAL_STOP),
        MasterEvent::RxDone { stop: true },
    ),
];

pub fn classify_packet(status: MasterIsr) -> MasterEvent {
    let key = status & PACKET_BITS;
    PACKET_TABLE
        .iter()
        .find(|(bits, _)| *bits == key)
        .map_or(MasterEvent::Unrecognized, |&(_, event)| event)
}

/// The session's copy of one message.
///
/// Payload bytes sit in `scratch` when the mode maps one, otherwise in the
/// staging area starting at `staged`.
struct Leg<B> {
    addr: u8,
    direction: Direction,
    len: usize,
    /// Room for received bytes; block reads grow into it.
    capacity: usize,
    recv_len: bool,
    pec: bool,
    staged: usize,
    scratch: Option<B>,
}

impl<B: DmaBuffer> Leg<B> {
    fn first_byte(&self, staging: &[u8]) -> u8 {
        match &self.scratch {
            Some(scratch) => {
                let mut byte = [0u8; 1];
                scratch.read_at(0, &mut byte);
                let [value] = byte;
                value
            }
            None => staging.get(self.staged).copied().unwrap_or(0),
        }
    }

    /// Hands the received bytes to the caller's message.
    fn copy_out(&self, staging: &[u8], msg: &mut Message<'_>) {
        if self.direction != Direction::Read {
            return;
        }
        let dst = msg.rx_window(0, self.len);
        match &self.scratch {
            Some(scratch) => scratch.read_at(0, dst),
            None => {
                if let Some(src) = staging.get(self.staged..self.staged + dst.len()) {
                    dst.copy_from_slice(src);
                }
            }
        }
        msg.fixup_block_length();
    }
}

/// Outcome of accounting one receive step.
struct RxStep {
    complete: bool,
    block_len: Option<usize>,
}

/// State of the in-flight master session.
pub struct MasterSession<B> {
    pub(crate) phase: MasterPhase,
    legs: Vec<Leg<B>, MAX_SESSION_MESSAGES>,
    staging: Vec<u8, SESSION_STAGING_LEN>,
    index: usize,
    tx_count: usize,
    rx_count: usize,
    /// Bytes armed in the current step.
    armed: usize,
    stop_requested: bool,
    /// Next step opens a new message with a (repeated) start.
    fresh: bool,
    completion: Completion,
}

impl<B: DmaBuffer> MasterSession<B> {
    pub(crate) fn new() -> Self {
        Self {
            phase: MasterPhase::Idle,
            legs: Vec::new(),
            staging: Vec::new(),
            index: 0,
            tx_count: 0,
            rx_count: 0,
            armed: 0,
            stop_requested: false,
            fresh: true,
            completion: Completion::new(),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        matches!(
            self.phase,
            MasterPhase::AwaitingStep | MasterPhase::AwaitingStop
        )
    }

    fn count(&self) -> usize {
        self.legs.len()
    }

    /// Drops every leg, releasing DMA scratch.
    fn release(&mut self) {
        self.legs.clear();
        self.staging.clear();
        self.index = 0;
        self.tx_count = 0;
        self.rx_count = 0;
        self.armed = 0;
        self.stop_requested = false;
        self.fresh = true;
    }

    /// Returns to idle, releasing any DMA scratch.
    pub(crate) fn reset(&mut self) {
        self.release();
        self.phase = MasterPhase::Idle;
        self.completion.reset();
    }

    /// Copies the shape and payload of `msgs` into the session. Every DMA
    /// mapping is taken here, before any register is written.
    fn load<M>(
        &mut self,
        engine: &XferEngine,
        mapper: &mut M,
        msgs: &[Message<'_>],
    ) -> Result<(), Error>
    where
        M: DmaMapper<Buffer = B>,
    {
        self.release();
        for msg in msgs {
            let scratch = engine.begin_message(mapper, msg)?;
            let staged = self.staging.len();
            if scratch.is_none() {
                let staged_ok = match msg.direction() {
                    Direction::Write => self.staging.extend_from_slice(msg.data()),
                    Direction::Read => self.staging.resize(staged + msg.capacity(), 0),
                };
                staged_ok.map_err(|()| Error::ResourceExhausted)?;
            }
            let leg = Leg {
                addr: msg.address(),
                direction: msg.direction(),
                len: msg.len(),
                capacity: msg.capacity(),
                recv_len: msg.is_recv_len(),
                pec: msg.has_pec(),
                staged,
                scratch,
            };
            self.legs.push(leg).map_err(|_| Error::InvalidArgument)?;
        }
        Ok(())
    }

    /// Accounts the bytes received in the last step, re-deriving a block
    /// read's length once its count byte is in.
    fn collect_rx<H: HardwareInterface>(
        &mut self,
        engine: &XferEngine,
        hw: &H,
    ) -> Result<RxStep, Error> {
        let leg = self.legs.get_mut(self.index).ok_or(Error::InvalidArgument)?;
        let start = leg.staged + self.rx_count;
        let window: &mut [u8] = match leg.scratch {
            Some(_) => &mut [],
            None => self
                .staging
                .get_mut(start..start + self.armed)
                .unwrap_or(&mut []),
        };
        self.rx_count += engine.rx_collect(hw, window).min(self.armed);

        let mut fixed = None;
        if leg.recv_len && self.rx_count > 0 {
            let count = leg.first_byte(&self.staging);
            leg.len = block_len(count, leg.pec).min(leg.capacity);
            leg.recv_len = false;
            fixed = Some(leg.len);
        }
        Ok(RxStep {
            complete: self.rx_count >= leg.len,
            block_len: fixed,
        })
    }

    fn copy_out(&self, msgs: &mut [Message<'_>]) -> Result<(), Error> {
        let same_shape = msgs.len() == self.legs.len()
            && self.legs.iter().zip(msgs.iter()).all(|(leg, msg)| {
                leg.direction == msg.direction() && leg.capacity == msg.capacity()
            });
        if !same_shape {
            return Err(Error::InvalidArgument);
        }
        for (leg, msg) in self.legs.iter().zip(msgs.iter_mut()) {
            leg.copy_out(&self.staging, msg);
        }
        Ok(())
    }
}

fn validate(msgs: &[Message<'_>]) -> Result<(), Error> {
    if msgs.is_empty()
        || msgs.len() > MAX_SESSION_MESSAGES
        || msgs.iter().any(|msg| msg.address() > 0x7f)
    {
        return Err(Error::InvalidArgument);
    }
    Ok(())
}

impl<H, D, T, Dl, L> Ast2600I2c<H, D, T, Dl, L>
where
    H: HardwareInterface,
    D: DmaMapper,
    T: SlaveTarget,
    Dl: DelayNs,
    L: Logger,
{
    pub fn master_phase(&self) -> MasterPhase {
        self.master.phase
    }

    /// Runs `msgs` to completion, returning the number of messages moved.
    pub fn master_xfer(&mut self, msgs: &mut [Message<'_>]) -> Result<usize, Error> {
        validate(msgs)?;
        if !self.config.multi_master && self.bus_busy() {
            self.recover_bus()?;
        }

        #[cfg(feature = "i2c_target")]
        let slave_irq_masked = self.claim_shared_buffer()?;
        let started = self.start_transfer(msgs);
        #[cfg(feature = "i2c_target")]
        {
            if slave_irq_masked {
                self.hw.write_reg(I2CS_IER, SlaveIsr::PKT_DONE.bits());
            }
        }
        started?;

        let timeout_us = self.config.xfer_timeout.to_micros();
        match self.wait_serviced(timeout_us, |this| this.poll_transfer(msgs)) {
            Some(result) => result,
            None => Err(self.abort_transfer()),
        }
    }

    /// Arms the first step of a session and returns without waiting.
    ///
    /// The session takes its own copy of the messages; from here on the
    /// interrupt path advances it without `msgs`. DMA scratch is acquired
    /// before any register is written, so a mapping failure leaves the
    /// hardware untouched.
    pub fn start_transfer(&mut self, msgs: &[Message<'_>]) -> Result<(), Error> {
        validate(msgs)?;
        if self.master.is_active() {
            return Err(Error::ControllerBusy);
        }
        self.master.completion.arm()?;
        let started = self
            .master
            .load(&self.engine, &mut self.dma, msgs)
            .and_then(|()| {
                self.master.phase = MasterPhase::AwaitingStep;
                self.arm_step()
            });
        if let Err(err) = started {
            self.master.reset();
            return Err(err);
        }
        Ok(())
    }

    /// Consumes the session result once it is available, copying received
    /// bytes into `msgs`, which must be the set the session started with.
    pub fn poll_transfer(&mut self, msgs: &mut [Message<'_>]) -> nb::Result<usize, Error> {
        let result = self.master.completion.poll();
        if matches!(result, Err(nb::Error::WouldBlock)) {
            return result;
        }
        let result = match result {
            Ok(count) => self
                .master
                .copy_out(msgs)
                .map(|()| count)
                .map_err(nb::Error::Other),
            Err(err) => Err(err),
        };
        self.master.release();
        self.master.phase = MasterPhase::Idle;
        result
    }

    /// Timeout path: cancels the outstanding command by toggling the
    /// controller, re-arms the slave posture and releases DMA scratch.
    pub fn abort_transfer(&mut self) -> Error {
        i2c_error!(
            self.logger,
            "master timeout, isr {:#x}",
            self.hw.read_reg(I2CM_ISR)
        );
        self.toggle_controller();
        #[cfg(feature = "i2c_target")]
        self.rearm_slave_after_reset();
        self.master.reset();
        if self.config.multi_master && self.bus_busy() {
            if let Err(err) = self.recover_bus() {
                i2c_error!(self.logger, "recovery after timeout failed: {:?}", err);
            }
        }
        Error::BusTimeout
    }

    pub(crate) fn master_irq(&mut self) -> IrqReturn {
        let raw = self.hw.read_reg(I2CM_ISR);
        if raw == 0 {
            return IrqReturn::None;
        }
        let status = MasterIsr::from_bits_retain(raw);

        if status.contains(MasterIsr::BUS_RECOVER_FAIL) {
            self.hw
                .write_reg(I2CM_ISR, MasterIsr::BUS_RECOVER_FAIL.bits());
            self.toggle_controller();
            self.recovery.complete(Err(Error::ProtocolViolation));
            return IrqReturn::Handled;
        }
        if status.contains(MasterIsr::BUS_RECOVER) {
            self.hw.write_reg(I2CM_ISR, MasterIsr::BUS_RECOVER.bits());
            self.recovery.complete(Ok(0));
            return IrqReturn::Handled;
        }
        if self.config.smbus_alert && status.contains(MasterIsr::SMBUS_ALT) {
            self.hw
                .modify_reg(I2CM_IER, |ier| ier & !MasterIsr::SMBUS_ALT.bits());
            self.hw.write_reg(I2CM_ISR, MasterIsr::SMBUS_ALT.bits());
            self.alert_pending = true;
            i2c_debug!(self.logger, "smbus alert");
            return IrqReturn::Handled;
        }
        if let Some(err) = classify(status) {
            self.hw.write_reg(I2CM_ISR, raw);
            if self.master.is_active() {
                self.finish(Err(err));
            } else {
                i2c_error!(self.logger, "{:?} while idle, isr {:#x}", err, raw);
            }
            return IrqReturn::Handled;
        }
        if status.contains(MasterIsr::PKT_DONE) {
            // Cleared before re-arming: the next step may complete at once.
            self.hw.write_reg(I2CM_ISR, raw);
            if self.master.is_active() {
                self.on_packet(status);
            } else {
                i2c_debug!(self.logger, "stray packet done, isr {:#x}", raw);
            }
            return IrqReturn::Handled;
        }
        i2c_debug!(self.logger, "unhandled master isr {:#x}", raw);
        self.hw.write_reg(I2CM_ISR, raw);
        IrqReturn::Handled
    }

    fn on_packet(&mut self, status: MasterIsr) {
        let event = classify_packet(status);
        match (self.master.phase, event) {
            (_, MasterEvent::PacketError) => self.finish(Err(Error::Contention)),
            (_, MasterEvent::NotAcknowledged) => self.finish(Err(Error::TargetNotAcknowledged)),
            (MasterPhase::AwaitingStop, MasterEvent::Stop) => self.finish(Ok(self.master.count())),
            (MasterPhase::AwaitingStep, MasterEvent::Stop) => self.advance_message(),
            (MasterPhase::AwaitingStep, MasterEvent::TxAck) => self.on_tx_ack(),
            (MasterPhase::AwaitingStep, MasterEvent::RxDone { stop }) => self.on_rx_done(stop),
            (phase, event) => i2c_debug!(
                self.logger,
                "{:?} ignored in {:?}, isr {:#x}",
                event,
                phase,
                status.bits()
            ),
        }
    }

    fn on_tx_ack(&mut self) {
        let moved = self.engine.tx_moved(&self.hw).min(self.master.armed);
        self.master.tx_count += moved;
        let len = self.master.legs.get(self.master.index).map_or(0, |leg| leg.len);
        if self.master.tx_count >= len {
            self.advance_message();
        } else {
            self.rearm();
        }
    }

    fn on_rx_done(&mut self, stop: bool) {
        #[cfg(feature = "i2c_target")]
        {
            if !stop {
                self.requeue_slave_command();
            }
        }
        #[cfg(not(feature = "i2c_target"))]
        let _ = stop;

        match self.master.collect_rx(&self.engine, &self.hw) {
            Ok(step) => {
                if let Some(len) = step.block_len {
                    i2c_debug!(self.logger, "block read length {}", len);
                }
                if step.complete {
                    self.advance_message();
                } else {
                    self.rearm();
                }
            }
            Err(err) => self.finish(Err(err)),
        }
    }

    fn advance_message(&mut self) {
        let stop_sent = self.master.stop_requested;
        self.master.index += 1;
        self.master.tx_count = 0;
        self.master.rx_count = 0;
        self.master.fresh = true;

        if self.master.index < self.master.count() {
            self.rearm();
        } else if stop_sent {
            self.finish(Ok(self.master.count()));
        } else {
            // Last step carried no stop (a block read that ended on its
            // count byte); close the bus explicitly.
            self.master.phase = MasterPhase::AwaitingStop;
            self.master.stop_requested = true;
            self.hw
                .write_reg(I2CM_CMD_STS, (MasterCmd::PKT_EN | MasterCmd::STOP).bits());
        }
    }

    fn rearm(&mut self) {
        if let Err(err) = self.arm_step() {
            self.finish(Err(err));
        }
    }

    fn arm_step(&mut self) -> Result<(), Error> {
        let session = &mut self.master;
        let index = session.index;
        let last = index + 1 == session.legs.len();
        let leg = session.legs.get_mut(index).ok_or(Error::InvalidArgument)?;
        let moved = match leg.direction {
            Direction::Write => session.tx_count,
            Direction::Read => session.rx_count,
        };
        let plan = plan_step(
            leg.len,
            moved,
            leg.recv_len,
            self.engine.step_ceiling(),
            last,
        );

        let mut cmd = MasterCmd::PKT_EN;
        if session.fresh {
            cmd |= MasterCmd::start_packet(leg.addr);
        }
        match leg.direction {
            Direction::Write => {
                let staged: &[u8] = match leg.scratch {
                    Some(_) => &[],
                    None => session
                        .staging
                        .get(leg.staged..leg.staged + leg.len)
                        .unwrap_or(&[]),
                };
                cmd |= self.engine.stage_tx(
                    &mut self.hw,
                    leg.scratch.as_mut(),
                    staged,
                    moved,
                    plan.len,
                )?;
                if plan.stop {
                    cmd |= MasterCmd::STOP;
                }
            }
            Direction::Read => {
                // A zero-length read still clocks one byte, refused and
                // dropped, so the address goes out with the read bit.
                let address_only = plan.len == 0;
                cmd |= self.engine.stage_rx(
                    &mut self.hw,
                    leg.scratch.as_mut(),
                    plan.len.max(1),
                    moved,
                )?;
                if plan.stop || address_only {
                    cmd |= MasterCmd::RX_CMD_LAST;
                }
                if plan.stop {
                    cmd |= MasterCmd::STOP;
                }
            }
        }

        session.armed = plan.len;
        session.stop_requested = plan.stop;
        session.fresh = false;
        session.phase = MasterPhase::AwaitingStep;
        self.hw.write_reg(I2CM_CMD_STS, cmd.bits());
        Ok(())
    }

    pub(crate) fn finish(&mut self, result: Result<usize, Error>) {
        self.master.phase = MasterPhase::Completed;
        if result.is_err() {
            self.master.release();
        }
        if !self.master.completion.complete(result) {
            i2c_error!(self.logger, "session completed twice, kept first result");
        }
    }
}
