// Licensed under the Apache-2.0 license

//! Direction-homogeneous bus messages, the unit a master session advances over.

use crate::i2c::error::Error;

/// Largest SMBus block payload.
pub const SMBUS_BLOCK_MAX: usize = 32;

/// Length of a block read whose count byte is `count`: the count byte, the
/// block clamped to [`SMBUS_BLOCK_MAX`] and the optional PEC byte.
pub(crate) fn block_len(count: u8, pec: bool) -> usize {
    usize::from(count).min(SMBUS_BLOCK_MAX) + 1 + usize::from(pec)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Write,
    Read,
}

#[derive(Debug)]
enum Payload<'a> {
    Write(&'a [u8]),
    Read(&'a mut [u8]),
}

/// One addressed phase of a master transfer.
///
/// A read created with [`Message::read_block`] starts with a provisional
/// length; the first received byte supplies the real one.
#[derive(Debug)]
pub struct Message<'a> {
    addr: u8,
    payload: Payload<'a>,
    len: usize,
    recv_len: bool,
    pec: bool,
}

impl<'a> Message<'a> {
    pub fn write(addr: u8, data: &'a [u8]) -> Self {
        Self {
            addr,
            len: data.len(),
            payload: Payload::Write(data),
            recv_len: false,
            pec: false,
        }
    }

    pub fn read(addr: u8, buf: &'a mut [u8]) -> Self {
        Self {
            addr,
            len: buf.len(),
            payload: Payload::Read(buf),
            recv_len: false,
            pec: false,
        }
    }

    /// SMBus block read whose length arrives as the first byte.
    ///
    /// `buf` must hold the count byte, the largest block and the optional
    /// PEC byte.
    pub fn read_block(addr: u8, buf: &'a mut [u8], pec: bool) -> Result<Self, Error> {
        if buf.len() < 1 + SMBUS_BLOCK_MAX + usize::from(pec) {
            return Err(Error::InvalidArgument);
        }
        Ok(Self {
            addr,
            len: 1 + usize::from(pec),
            payload: Payload::Read(buf),
            recv_len: true,
            pec,
        })
    }

    pub fn address(&self) -> u8 {
        self.addr
    }

    pub fn direction(&self) -> Direction {
        match self.payload {
            Payload::Write(_) => Direction::Write,
            Payload::Read(_) => Direction::Read,
        }
    }

    /// Current length; block reads grow once their count byte arrives.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True while a block read still waits for its count byte.
    pub fn is_recv_len(&self) -> bool {
        self.recv_len
    }

    /// Bytes of the message: the outgoing data, or what has been received.
    pub fn data(&self) -> &[u8] {
        let all: &[u8] = match &self.payload {
            Payload::Write(data) => data,
            Payload::Read(buf) => buf,
        };
        all.get(..self.len).unwrap_or(all)
    }

    /// True for a block read that also receives a PEC byte.
    pub(crate) fn has_pec(&self) -> bool {
        self.pec
    }

    /// Destination window for `len` received bytes at `offset`.
    pub(crate) fn rx_window(&mut self, offset: usize, len: usize) -> &mut [u8] {
        match &mut self.payload {
            Payload::Read(buf) => {
                let end = (offset + len).min(buf.len());
                buf.get_mut(offset..end).unwrap_or(&mut [])
            }
            Payload::Write(_) => &mut [],
        }
    }

    /// Capacity available to the hardware for this message.
    pub(crate) fn capacity(&self) -> usize {
        match &self.payload {
            Payload::Write(data) => data.len(),
            Payload::Read(buf) => buf.len(),
        }
    }

    /// Re-derives a block read's length from its count byte.
    ///
    /// Clears the pending flag; later calls are no-ops. The count is clamped
    /// to [`SMBUS_BLOCK_MAX`], the raw byte stays in the buffer.
    pub(crate) fn fixup_block_length(&mut self) -> bool {
        if !self.recv_len {
            return false;
        }
        let count = match &self.payload {
            Payload::Read(buf) => buf.first().copied().unwrap_or(0),
            Payload::Write(_) => 0,
        };
        self.len = block_len(count, self.pec);
        self.recv_len = false;
        true
    }
}
