// Licensed under the Apache-2.0 license

//! Downward interfaces of the engine: register access to one controller and
//! the DMA mapping service.
//!
//! The engine never touches memory-mapped I/O directly. A board crate wraps
//! its peripheral access layer in a [`HardwareInterface`], and host tests plug
//! in a register-level simulator instead.

/// Raw access to one controller instance and its buffer pool.
pub trait HardwareInterface {
    fn read_reg(&self, offset: usize) -> u32;
    fn write_reg(&mut self, offset: usize, value: u32);

    /// Reads one byte of the controller's on-chip buffer pool.
    fn pool_read(&self, offset: usize) -> u8;
    /// Writes one aligned 32-bit word of the buffer pool. `offset` is in bytes.
    fn pool_write_word(&mut self, offset: usize, word: u32);
    /// Total pool size in bytes. Transmit uses the lower half, receive the upper.
    fn pool_size(&self) -> usize;

    /// APB clock feeding the controller, in Hz.
    fn clock_rate(&self) -> u32;
    /// Raw value of the global base-clock divider register.
    fn global_clock_divider(&self) -> u32;

    fn modify_reg(&mut self, offset: usize, f: impl FnOnce(u32) -> u32) {
        let value = self.read_reg(offset);
        self.write_reg(offset, f(value));
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DmaDirection {
    ToDevice,
    FromDevice,
    Bidirectional,
}

/// Mapping failure reported by a [`DmaMapper`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DmaMapError;

/// A device-visible scratch region.
///
/// Dropping the buffer releases the mapping. The engine holds a buffer only
/// while the hardware may access it, so every exit path of a transfer
/// releases it exactly once.
pub trait DmaBuffer {
    fn bus_addr(&self) -> u32;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies `data` into the region before the device reads it.
    fn write_at(&mut self, offset: usize, data: &[u8]);
    /// Copies device-written bytes out of the region.
    fn read_at(&self, offset: usize, dst: &mut [u8]);
}

pub trait DmaMapper {
    type Buffer: DmaBuffer;

    fn map(&mut self, len: usize, direction: DmaDirection) -> Result<Self::Buffer, DmaMapError>;
}

/// Mapper for systems without DMA. Every request fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoDma;

/// Uninhabited buffer type of [`NoDma`].
#[derive(Debug)]
pub enum NoDmaBuffer {}

impl DmaBuffer for NoDmaBuffer {
    fn bus_addr(&self) -> u32 {
        match *self {}
    }

    fn len(&self) -> usize {
        match *self {}
    }

    fn write_at(&mut self, _offset: usize, _data: &[u8]) {
        match *self {}
    }

    fn read_at(&self, _offset: usize, _dst: &mut [u8]) {
        match *self {}
    }
}

impl DmaMapper for NoDma {
    type Buffer = NoDmaBuffer;

    fn map(&mut self, _len: usize, _direction: DmaDirection) -> Result<NoDmaBuffer, DmaMapError> {
        Err(DmaMapError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::NoOpLogger;
    use crate::i2c::ast2600_i2c::Ast2600I2c;
    use crate::i2c::common::{I2cConfigBuilder, I2cXferMode};
    use crate::i2c::error::Error;
    use crate::i2c::message::Message;
    use crate::i2c::sim::{NoDelay, SimHw};
    use crate::i2c::traits::NoTarget;

    type NoDmaController = Ast2600I2c<SimHw, NoDma, NoTarget, NoDelay, NoOpLogger>;

    #[test]
    fn dma_mode_without_mapper_reports_exhaustion() {
        let config = I2cConfigBuilder::new()
            .xfer_mode(I2cXferMode::DmaMode)
            .build();
        let mut ctl = NoDmaController::new(SimHw::new(Default::default()), NoDma, NoDelay, NoOpLogger, config);
        ctl.init();
        ctl.hardware_mut().device(0x50);

        assert_eq!(
            ctl.master_xfer(&mut [Message::write(0x50, &[1])]),
            Err(Error::ResourceExhausted)
        );
        // Address-only writes need no scratch.
        assert_eq!(ctl.master_xfer(&mut [Message::write(0x50, &[])]), Ok(1));
    }

    #[test]
    fn modify_reg_reads_then_writes() {
        let mut hw = SimHw::new(Default::default());
        hw.write_reg(0x40, 0x0f);
        hw.modify_reg(0x40, |value| value | 0xf0);
        assert_eq!(hw.read_reg(0x40), 0xff);
    }
}
