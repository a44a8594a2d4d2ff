// Licensed under the Apache-2.0 license

//! Per-step planning of master transfers.
//!
//! [`plan_step`] decides how many bytes the next hardware step moves and
//! whether it ends with a stop. The mode-specific register work hides behind
//! [`ModeCapability`], implemented once per data-movement strategy.

use crate::i2c::common::I2cXferMode;
use crate::i2c::error::Error;
use crate::i2c::hardware_interface::{DmaBuffer, DmaDirection, DmaMapper, HardwareInterface};
use crate::i2c::message::{Direction, Message};
use crate::i2c::registers::{
    self, MasterCmd, BUFF_LEN_FIELD_MAX, DMA_STEP_MAX, I2CC_BUFF_CTRL, I2CC_STS_AND_BUFF,
    I2CM_DMA_LEN, I2CM_DMA_LEN_STS, I2CM_RX_DMA, I2CM_TX_DMA, I2CS_ISR,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepPlan {
    pub len: usize,
    pub stop: bool,
}

/// Plans the next step of a message of `msg_len` bytes with `moved` done.
///
/// A pending block read moves only its count byte. Otherwise the step is
/// capped by `ceiling`, and a stop is requested only when this is the last
/// message and the remainder fits.
pub fn plan_step(
    msg_len: usize,
    moved: usize,
    recv_len_pending: bool,
    ceiling: usize,
    last: bool,
) -> StepPlan {
    if recv_len_pending {
        return StepPlan {
            len: 1,
            stop: false,
        };
    }
    let remaining = msg_len.saturating_sub(moved);
    if remaining > ceiling {
        StepPlan {
            len: ceiling,
            stop: false,
        }
    } else {
        StepPlan {
            len: remaining,
            stop: last,
        }
    }
}

/// Register sequencing of one data-movement strategy.
pub trait ModeCapability {
    /// Bytes one hardware step can move.
    fn step_ceiling(&self) -> usize;

    /// Acquires per-message resources. Only DMA returns a scratch buffer;
    /// transmit data is copied into it up front and received data stays in
    /// it until the session hands it back.
    fn begin_message<M: DmaMapper>(
        &self,
        mapper: &mut M,
        msg: &Message<'_>,
    ) -> Result<Option<M::Buffer>, Error>;

    /// Stages `len` bytes found at `offset` within the message and returns
    /// the command bits enabling its data phase. `staged` holds the whole
    /// message for modes without scratch.
    fn stage_tx<H: HardwareInterface, B: DmaBuffer>(
        &self,
        hw: &mut H,
        scratch: Option<&mut B>,
        staged: &[u8],
        offset: usize,
        len: usize,
    ) -> Result<MasterCmd, Error>;

    /// Arms a receive of `len` bytes landing at `offset` within the message.
    fn stage_rx<H: HardwareInterface, B: DmaBuffer>(
        &self,
        hw: &mut H,
        scratch: Option<&mut B>,
        len: usize,
        offset: usize,
    ) -> Result<MasterCmd, Error>;

    /// Bytes the hardware reports as transmitted in the last step.
    fn tx_moved<H: HardwareInterface>(&self, hw: &H) -> usize;

    /// Copies the bytes received in the last step into `dst`, returning how
    /// many arrived. DMA lands them in scratch and only reports the count.
    fn rx_collect<H: HardwareInterface>(&self, hw: &H, dst: &mut [u8]) -> usize;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ByteMode;

impl ModeCapability for ByteMode {
    fn step_ceiling(&self) -> usize {
        1
    }

    fn begin_message<M: DmaMapper>(
        &self,
        _mapper: &mut M,
        _msg: &Message<'_>,
    ) -> Result<Option<M::Buffer>, Error> {
        Ok(None)
    }

    fn stage_tx<H: HardwareInterface, B: DmaBuffer>(
        &self,
        hw: &mut H,
        _scratch: Option<&mut B>,
        staged: &[u8],
        offset: usize,
        len: usize,
    ) -> Result<MasterCmd, Error> {
        match staged.get(offset) {
            Some(&byte) if len > 0 => {
                hw.write_reg(I2CC_STS_AND_BUFF, u32::from(byte));
                Ok(MasterCmd::TX_CMD)
            }
            _ => Ok(MasterCmd::empty()),
        }
    }

    fn stage_rx<H: HardwareInterface, B: DmaBuffer>(
        &self,
        _hw: &mut H,
        _scratch: Option<&mut B>,
        _len: usize,
        _offset: usize,
    ) -> Result<MasterCmd, Error> {
        Ok(MasterCmd::RX_CMD)
    }

    fn tx_moved<H: HardwareInterface>(&self, _hw: &H) -> usize {
        1
    }

    fn rx_collect<H: HardwareInterface>(&self, hw: &H, dst: &mut [u8]) -> usize {
        match dst.first_mut() {
            Some(slot) => {
                *slot = registers::rx_byte(hw.read_reg(I2CC_STS_AND_BUFF));
                1
            }
            None => 0,
        }
    }
}

/// Pool-buffer strategy. Transmit data sits at the start of the pool, received
/// data at `rx_offset`.
#[derive(Clone, Copy, Debug)]
pub struct BufferMode {
    step: usize,
    rx_offset: usize,
}

impl BufferMode {
    pub fn new(pool_size: usize) -> Self {
        let half = pool_size / 2;
        Self {
            step: half.clamp(1, BUFF_LEN_FIELD_MAX),
            rx_offset: half,
        }
    }

    pub fn rx_offset(&self) -> usize {
        self.rx_offset
    }

    /// The pool is shared with the slave role; latched slave status means the
    /// slave owns it right now.
    fn ensure_pool_free<H: HardwareInterface>(hw: &H) -> Result<(), Error> {
        if hw.read_reg(I2CS_ISR) != 0 {
            return Err(Error::ControllerBusy);
        }
        Ok(())
    }
}

/// Copies `data` into the pool as little-endian words, zero-padding the tail.
pub(crate) fn write_pool<H: HardwareInterface>(hw: &mut H, base: usize, data: &[u8]) {
    for (index, part) in data.chunks(4).enumerate() {
        let mut word = [0u8; 4];
        word.iter_mut().zip(part).for_each(|(dst, src)| *dst = *src);
        hw.pool_write_word(base + index * 4, u32::from_le_bytes(word));
    }
}

impl ModeCapability for BufferMode {
    fn step_ceiling(&self) -> usize {
        self.step
    }

    fn begin_message<M: DmaMapper>(
        &self,
        _mapper: &mut M,
        _msg: &Message<'_>,
    ) -> Result<Option<M::Buffer>, Error> {
        Ok(None)
    }

    fn stage_tx<H: HardwareInterface, B: DmaBuffer>(
        &self,
        hw: &mut H,
        _scratch: Option<&mut B>,
        staged: &[u8],
        offset: usize,
        len: usize,
    ) -> Result<MasterCmd, Error> {
        let chunk = staged.get(offset..offset + len).unwrap_or(&[]);
        if chunk.is_empty() {
            return Ok(MasterCmd::empty());
        }
        Self::ensure_pool_free(hw)?;
        write_pool(hw, 0, chunk);
        hw.write_reg(I2CC_BUFF_CTRL, registers::set_tx_buf_len(chunk.len()));
        Ok(MasterCmd::TX_CMD | MasterCmd::TX_BUFF_EN)
    }

    fn stage_rx<H: HardwareInterface, B: DmaBuffer>(
        &self,
        hw: &mut H,
        _scratch: Option<&mut B>,
        len: usize,
        _offset: usize,
    ) -> Result<MasterCmd, Error> {
        Self::ensure_pool_free(hw)?;
        hw.write_reg(I2CC_BUFF_CTRL, registers::set_rx_buf_len(len));
        Ok(MasterCmd::RX_CMD | MasterCmd::RX_BUFF_EN)
    }

    fn tx_moved<H: HardwareInterface>(&self, hw: &H) -> usize {
        registers::tx_buf_len(hw.read_reg(I2CC_BUFF_CTRL))
    }

    fn rx_collect<H: HardwareInterface>(&self, hw: &H, dst: &mut [u8]) -> usize {
        let count = registers::rx_buf_len(hw.read_reg(I2CC_BUFF_CTRL)).min(dst.len());
        for (index, slot) in dst.iter_mut().take(count).enumerate() {
            *slot = hw.pool_read(self.rx_offset + index);
        }
        count
    }
}

/// Descriptor-based strategy over a per-message scratch mapping.
#[derive(Clone, Copy, Debug, Default)]
pub struct DmaMode;

impl ModeCapability for DmaMode {
    fn step_ceiling(&self) -> usize {
        DMA_STEP_MAX
    }

    fn begin_message<M: DmaMapper>(
        &self,
        mapper: &mut M,
        msg: &Message<'_>,
    ) -> Result<Option<M::Buffer>, Error> {
        match msg.direction() {
            Direction::Write if msg.is_empty() => Ok(None),
            Direction::Write => {
                let mut scratch = mapper.map(msg.len(), DmaDirection::ToDevice)?;
                scratch.write_at(0, msg.data());
                Ok(Some(scratch))
            }
            // Block reads grow past their provisional length, so map the
            // whole destination. A zero-length read still lands one byte.
            Direction::Read => Ok(Some(
                mapper.map(msg.capacity().max(1), DmaDirection::FromDevice)?,
            )),
        }
    }

    fn stage_tx<H: HardwareInterface, B: DmaBuffer>(
        &self,
        hw: &mut H,
        scratch: Option<&mut B>,
        _staged: &[u8],
        offset: usize,
        len: usize,
    ) -> Result<MasterCmd, Error> {
        if len == 0 {
            return Ok(MasterCmd::empty());
        }
        let scratch = scratch.ok_or(Error::ResourceExhausted)?;
        hw.write_reg(I2CM_DMA_LEN, registers::master_tx_dma_len(len));
        hw.write_reg(I2CM_TX_DMA, scratch.bus_addr().wrapping_add(offset as u32));
        Ok(MasterCmd::TX_CMD | MasterCmd::TX_DMA_EN)
    }

    fn stage_rx<H: HardwareInterface, B: DmaBuffer>(
        &self,
        hw: &mut H,
        scratch: Option<&mut B>,
        len: usize,
        offset: usize,
    ) -> Result<MasterCmd, Error> {
        let scratch = scratch.ok_or(Error::ResourceExhausted)?;
        hw.write_reg(I2CM_DMA_LEN, registers::master_rx_dma_len(len));
        hw.write_reg(I2CM_RX_DMA, scratch.bus_addr().wrapping_add(offset as u32));
        Ok(MasterCmd::RX_CMD | MasterCmd::RX_DMA_EN)
    }

    fn tx_moved<H: HardwareInterface>(&self, hw: &H) -> usize {
        registers::dma_tx_len_sts(hw.read_reg(I2CM_DMA_LEN_STS))
    }

    fn rx_collect<H: HardwareInterface>(&self, hw: &H, _dst: &mut [u8]) -> usize {
        registers::dma_rx_len_sts(hw.read_reg(I2CM_DMA_LEN_STS))
    }
}

/// The strategy selected at initialization.
#[derive(Clone, Copy, Debug)]
pub enum XferEngine {
    Byte(ByteMode),
    Buffer(BufferMode),
    Dma(DmaMode),
}

impl XferEngine {
    pub fn new(mode: I2cXferMode, pool_size: usize) -> Self {
        match mode {
            I2cXferMode::ByteMode => XferEngine::Byte(ByteMode),
            I2cXferMode::BuffMode => XferEngine::Buffer(BufferMode::new(pool_size)),
            I2cXferMode::DmaMode => XferEngine::Dma(DmaMode),
        }
    }
}

impl ModeCapability for XferEngine {
    fn step_ceiling(&self) -> usize {
        match self {
            XferEngine::Byte(m) => m.step_ceiling(),
            XferEngine::Buffer(m) => m.step_ceiling(),
            XferEngine::Dma(m) => m.step_ceiling(),
        }
    }

    fn begin_message<M: DmaMapper>(
        &self,
        mapper: &mut M,
        msg: &Message<'_>,
    ) -> Result<Option<M::Buffer>, Error> {
        match self {
            XferEngine::Byte(m) => m.begin_message(mapper, msg),
            XferEngine::Buffer(m) => m.begin_message(mapper, msg),
            XferEngine::Dma(m) => m.begin_message(mapper, msg),
        }
    }

    fn stage_tx<H: HardwareInterface, B: DmaBuffer>(
        &self,
        hw: &mut H,
        scratch: Option<&mut B>,
        staged: &[u8],
        offset: usize,
        len: usize,
    ) -> Result<MasterCmd, Error> {
        match self {
            XferEngine::Byte(m) => m.stage_tx(hw, scratch, staged, offset, len),
            XferEngine::Buffer(m) => m.stage_tx(hw, scratch, staged, offset, len),
            XferEngine::Dma(m) => m.stage_tx(hw, scratch, staged, offset, len),
        }
    }

    fn stage_rx<H: HardwareInterface, B: DmaBuffer>(
        &self,
        hw: &mut H,
        scratch: Option<&mut B>,
        len: usize,
        offset: usize,
    ) -> Result<MasterCmd, Error> {
        match self {
            XferEngine::Byte(m) => m.stage_rx(hw, scratch, len, offset),
            XferEngine::Buffer(m) => m.stage_rx(hw, scratch, len, offset),
            XferEngine::Dma(m) => m.stage_rx(hw, scratch, len, offset),
        }
    }

    fn tx_moved<H: HardwareInterface>(&self, hw: &H) -> usize {
        match self {
            XferEngine::Byte(m) => m.tx_moved(hw),
            XferEngine::Buffer(m) => m.tx_moved(hw),
            XferEngine::Dma(m) => m.tx_moved(hw),
        }
    }

    fn rx_collect<H: HardwareInterface>(&self, hw: &H, dst: &mut [u8]) -> usize {
        match self {
            XferEngine::Byte(m) => m.rx_collect(hw, dst),
            XferEngine::Buffer(m) => m.rx_collect(hw, dst),
            XferEngine::Dma(m) => m.rx_collect(hw, dst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i2c::sim::{DmaArena, SharedArena, SimDma, SimHw, POOL_RX_OFFSET};
    use std::rc::Rc;

    #[test]
    fn step_is_capped_and_stop_waits_for_remainder() {
        assert_eq!(plan_step(40, 0, false, 16, true), StepPlan { len: 16, stop: false });
        assert_eq!(plan_step(40, 32, false, 16, true), StepPlan { len: 8, stop: true });
        assert_eq!(plan_step(40, 32, false, 16, false), StepPlan { len: 8, stop: false });
        assert_eq!(plan_step(16, 0, false, 16, true), StepPlan { len: 16, stop: true });
    }

    #[test]
    fn pending_block_read_moves_only_count_byte() {
        assert_eq!(plan_step(2, 0, true, 4096, true), StepPlan { len: 1, stop: false });
    }

    #[test]
    fn empty_message_plans_a_bare_step() {
        assert_eq!(plan_step(0, 0, false, 1, true), StepPlan { len: 0, stop: true });
    }

    #[test]
    fn buffer_step_is_half_the_pool_within_field_limit() {
        let small = BufferMode::new(32);
        assert_eq!(small.step_ceiling(), 16);
        assert_eq!(small.rx_offset(), 16);

        let large = BufferMode::new(128);
        assert_eq!(large.step_ceiling(), BUFF_LEN_FIELD_MAX);
        assert_eq!(large.rx_offset(), 64);
        assert_eq!(XferEngine::new(I2cXferMode::ByteMode, 32).step_ceiling(), 1);
        assert_eq!(XferEngine::new(I2cXferMode::DmaMode, 32).step_ceiling(), DMA_STEP_MAX);
    }

    #[test]
    fn pool_words_are_little_endian_and_zero_padded() {
        let mut hw = SimHw::new(SharedArena::default());
        hw.pool = [0xee; 32];

        write_pool(&mut hw, 0, &[1, 2, 3, 4, 5]);

        assert_eq!(hw.pool[..8], [1, 2, 3, 4, 5, 0, 0, 0]);
        assert_eq!(hw.pool[8], 0xee);
    }

    #[test]
    fn buffer_stage_refuses_pool_owned_by_slave() {
        let mut hw = SimHw::new(SharedArena::default());
        hw.regs.insert(I2CS_ISR, 1 << 16);
        let mode = BufferMode::new(32);

        let staged = mode.stage_tx::<_, crate::i2c::sim::SimDmaBuffer>(&mut hw, None, &[1], 0, 1);
        assert_eq!(staged, Err(Error::ControllerBusy));
        assert!(hw.writes.is_empty());
    }

    #[test]
    fn buffer_receive_reads_from_rx_half() {
        let mut hw = SimHw::new(SharedArena::default());
        hw.pool[POOL_RX_OFFSET..POOL_RX_OFFSET + 3].copy_from_slice(&[7, 8, 9]);
        hw.regs.insert(I2CC_BUFF_CTRL, 3 << 24);
        let mode = BufferMode::new(32);

        let mut dst = [0u8; 4];
        let moved = mode.rx_collect(&hw, &mut dst);
        assert_eq!(moved, 3);
        assert_eq!(dst, [7, 8, 9, 0]);
    }

    #[test]
    fn dma_scratch_holds_write_data_and_full_read_capacity() {
        let arena: SharedArena = Rc::new(core::cell::RefCell::new(DmaArena::default()));
        let mut dma = SimDma {
            arena: Rc::clone(&arena),
        };

        let data = [0xa5u8; 6];
        let scratch = DmaMode
            .begin_message(&mut dma, &Message::write(0x10, &data))
            .unwrap()
            .unwrap();
        assert_eq!(arena.borrow().read(scratch.bus_addr(), 6), data);

        let mut buf = [0u8; 34];
        let block = Message::read_block(0x10, &mut buf, true).unwrap();
        let rx = DmaMode.begin_message(&mut dma, &block).unwrap().unwrap();
        assert_eq!(rx.len(), 34);

        assert!(DmaMode
            .begin_message(&mut dma, &Message::write(0x10, &[]))
            .unwrap()
            .is_none());
        let address_only = DmaMode
            .begin_message(&mut dma, &Message::read(0x10, &mut []))
            .unwrap()
            .unwrap();
        assert_eq!(address_only.len(), 1);
        drop((scratch, rx, address_only));
        assert_eq!(arena.borrow().live(), 0);
    }
}
