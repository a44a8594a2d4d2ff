// Licensed under the Apache-2.0 license

//! SMBus protocol adapter.
//!
//! Each SMBus transaction type is expressed as one or two [`Message`]s and
//! run through the master driver. Packet Error Checking uses CRC-8 (poly 0x07)
//! over every byte on the wire, address bytes included.

use crate::common::Logger;
use crate::i2c::ast2600_i2c::Ast2600I2c;
use crate::i2c::error::Error;
use crate::i2c::hardware_interface::{DmaMapper, HardwareInterface};
use crate::i2c::message::{Message, SMBUS_BLOCK_MAX};
use crate::i2c::traits::SlaveTarget;
use crate::i2c_debug;
use embedded_hal::delay::DelayNs;
use heapless::Vec;

/// Command, count, largest block and PEC.
const WRITE_BUF_LEN: usize = SMBUS_BLOCK_MAX + 3;
/// Count, largest block and PEC.
const READ_BUF_LEN: usize = SMBUS_BLOCK_MAX + 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SmbusSize {
    Quick,
    Byte,
    ByteData,
    WordData,
    ProcCall,
    BlockData,
    BlockProcCall,
    I2cBlockData,
}

impl SmbusSize {
    /// Quick commands carry no data and I2C block transfers are raw I2C.
    pub fn supports_pec(self) -> bool {
        !matches!(self, SmbusSize::Quick | SmbusSize::I2cBlockData)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SmbusDirection {
    Write,
    Read,
}

/// Payload of an SMBus transaction, in either direction.
///
/// For an I2C block read the length of the supplied block selects how many
/// bytes are read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SmbusData {
    None,
    Byte(u8),
    Word(u16),
    Block(Vec<u8, SMBUS_BLOCK_MAX>),
}

impl SmbusData {
    fn byte(&self) -> Result<u8, Error> {
        match self {
            SmbusData::Byte(value) => Ok(*value),
            _ => Err(Error::InvalidArgument),
        }
    }

    fn word(&self) -> Result<u16, Error> {
        match self {
            SmbusData::Word(value) => Ok(*value),
            _ => Err(Error::InvalidArgument),
        }
    }

    fn block(&self) -> Result<&[u8], Error> {
        match self {
            SmbusData::Block(block) => Ok(block),
            _ => Err(Error::InvalidArgument),
        }
    }
}

/// Continues a PEC computation over `data`.
pub fn pec_update(crc: u8, data: &[u8]) -> u8 {
    data.iter()
        .fold(crc, |crc, &byte| smbus_pec::pec(&[crc ^ byte]))
}

/// Shape of the read phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReadShape {
    None,
    Fixed(usize),
    Block,
}

fn extend(buf: &mut Vec<u8, WRITE_BUF_LEN>, bytes: &[u8]) -> Result<(), Error> {
    buf.extend_from_slice(bytes)
        .map_err(|()| Error::InvalidArgument)
}

impl<H, D, T, Dl, L> Ast2600I2c<H, D, T, Dl, L>
where
    H: HardwareInterface,
    D: DmaMapper,
    T: SlaveTarget,
    Dl: DelayNs,
    L: Logger,
{
    /// Runs one SMBus transaction against the 7-bit `addr`.
    ///
    /// Transport failures surface as the master driver reports them. Faults
    /// in the data itself are kept apart from them: a PEC mismatch is
    /// [`Error::DataCorruption`] and an out-of-range block count from the
    /// target is [`Error::InvalidArgument`].
    pub fn smbus_xfer(
        &mut self,
        addr: u8,
        command: u8,
        size: SmbusSize,
        direction: SmbusDirection,
        data: &SmbusData,
        pec: bool,
    ) -> Result<SmbusData, Error> {
        if addr > 0x7f {
            return Err(Error::InvalidArgument);
        }
        let pec = pec && size.supports_pec();
        let mut wbuf: Vec<u8, WRITE_BUF_LEN> = Vec::new();
        let read = match (size, direction) {
            (SmbusSize::Quick, _) => ReadShape::None,
            (SmbusSize::Byte, SmbusDirection::Write) => {
                extend(&mut wbuf, &[command])?;
                ReadShape::None
            }
            (SmbusSize::Byte, SmbusDirection::Read) => ReadShape::Fixed(1),
            (SmbusSize::ByteData, SmbusDirection::Write) => {
                extend(&mut wbuf, &[command, data.byte()?])?;
                ReadShape::None
            }
            (SmbusSize::ByteData, SmbusDirection::Read) => {
                extend(&mut wbuf, &[command])?;
                ReadShape::Fixed(1)
            }
            (SmbusSize::WordData, SmbusDirection::Write) => {
                let [lo, hi] = data.word()?.to_le_bytes();
                extend(&mut wbuf, &[command, lo, hi])?;
                ReadShape::None
            }
            (SmbusSize::WordData, SmbusDirection::Read) => {
                extend(&mut wbuf, &[command])?;
                ReadShape::Fixed(2)
            }
            (SmbusSize::ProcCall, _) => {
                let [lo, hi] = data.word()?.to_le_bytes();
                extend(&mut wbuf, &[command, lo, hi])?;
                ReadShape::Fixed(2)
            }
            (SmbusSize::BlockData, SmbusDirection::Write) => {
                let block = data.block()?;
                extend(&mut wbuf, &[command, block.len() as u8])?;
                extend(&mut wbuf, block)?;
                ReadShape::None
            }
            (SmbusSize::BlockData, SmbusDirection::Read) => {
                extend(&mut wbuf, &[command])?;
                ReadShape::Block
            }
            (SmbusSize::BlockProcCall, _) => {
                let block = data.block()?;
                extend(&mut wbuf, &[command, block.len() as u8])?;
                extend(&mut wbuf, block)?;
                ReadShape::Block
            }
            (SmbusSize::I2cBlockData, SmbusDirection::Write) => {
                extend(&mut wbuf, &[command])?;
                extend(&mut wbuf, data.block()?)?;
                ReadShape::None
            }
            (SmbusSize::I2cBlockData, SmbusDirection::Read) => {
                let len = data.block()?.len();
                if len == 0 {
                    return Err(Error::InvalidArgument);
                }
                extend(&mut wbuf, &[command])?;
                ReadShape::Fixed(len)
            }
        };

        let has_write =
            !wbuf.is_empty() || (size == SmbusSize::Quick && direction == SmbusDirection::Write);
        let has_read = read != ReadShape::None
            || (size == SmbusSize::Quick && direction == SmbusDirection::Read);
        let addr_w = addr << 1;
        let addr_r = addr_w | 1;

        if pec && !has_read {
            let crc = pec_update(pec_update(0, &[addr_w]), &wbuf);
            extend(&mut wbuf, &[crc])?;
        }

        let mut rbuf = [0u8; READ_BUF_LEN];
        let fixed_len = match read {
            ReadShape::Fixed(len) => len + usize::from(pec),
            ReadShape::None | ReadShape::Block => 0,
        };
        let moved = if has_read {
            let read_msg = if read == ReadShape::Block {
                Message::read_block(addr, &mut rbuf, pec)?
            } else {
                Message::read(
                    addr,
                    rbuf.get_mut(..fixed_len)
                        .ok_or(Error::InvalidArgument)?,
                )
            };
            if has_write {
                self.master_xfer(&mut [Message::write(addr, &wbuf), read_msg])?
            } else {
                self.master_xfer(&mut [read_msg])?
            }
        } else {
            self.master_xfer(&mut [Message::write(addr, &wbuf)])?
        };

        let expected = usize::from(has_write) + usize::from(has_read);
        if moved != expected {
            return Err(Error::ProtocolViolation);
        }
        if read == ReadShape::None {
            return Ok(SmbusData::None);
        }

        let payload_len = match read {
            ReadShape::Block => {
                let count = rbuf.first().copied().unwrap_or(0);
                if usize::from(count) > SMBUS_BLOCK_MAX {
                    i2c_debug!(self.logger, "smbus block count {} out of range", count);
                    return Err(Error::InvalidArgument);
                }
                usize::from(count) + 1
            }
            ReadShape::Fixed(len) => len,
            ReadShape::None => 0,
        };
        let payload = rbuf.get(..payload_len).ok_or(Error::ProtocolViolation)?;

        if pec {
            let mut crc = 0;
            if has_write {
                crc = pec_update(pec_update(crc, &[addr_w]), &wbuf);
            }
            crc = pec_update(pec_update(crc, &[addr_r]), payload);
            let received = rbuf.get(payload_len).copied();
            if received != Some(crc) {
                i2c_debug!(
                    self.logger,
                    "smbus pec mismatch: computed {:#04x}, received {:?}",
                    crc,
                    received
                );
                return Err(Error::DataCorruption);
            }
        }

        let decoded = match (size, payload) {
            (SmbusSize::Byte | SmbusSize::ByteData, [value, ..]) => SmbusData::Byte(*value),
            (SmbusSize::WordData | SmbusSize::ProcCall, [lo, hi, ..]) => {
                SmbusData::Word(u16::from_le_bytes([*lo, *hi]))
            }
            (SmbusSize::BlockData | SmbusSize::BlockProcCall, [_, block @ ..]) => {
                SmbusData::Block(Vec::from_slice(block).map_err(|()| Error::ProtocolViolation)?)
            }
            (SmbusSize::I2cBlockData, block) => {
                SmbusData::Block(Vec::from_slice(block).map_err(|()| Error::ProtocolViolation)?)
            }
            _ => SmbusData::None,
        };
        Ok(decoded)
    }
}
