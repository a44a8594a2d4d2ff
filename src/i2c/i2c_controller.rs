// Licensed under the Apache-2.0 license

//! embedded-hal front-end.
//!
//! [`I2cController`] exposes any [`I2cMaster`] as an `embedded_hal::i2c::I2c`
//! bus, logging failed transactions through its [`Logger`].

use crate::common::{Logger, NoOpLogger};
use crate::i2c::traits::I2cMaster;
use crate::i2c_error;
use embedded_hal::i2c::{Operation, SevenBitAddress};

pub struct I2cController<H: I2cMaster, L: Logger = NoOpLogger> {
    pub hardware: H,
    pub logger: L,
}

impl<H: I2cMaster, L: Logger> I2cController<H, L> {
    pub fn new(hardware: H, logger: L) -> Self {
        Self { hardware, logger }
    }

    pub fn into_inner(self) -> H {
        self.hardware
    }
}

impl<H: I2cMaster, L: Logger> embedded_hal::i2c::ErrorType for I2cController<H, L> {
    type Error = H::Error;
}

impl<H: I2cMaster, L: Logger> embedded_hal::i2c::I2c for I2cController<H, L> {
    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.hardware
            .read(addr, buffer)
            .inspect_err(|err| i2c_error!(self.logger, "read {:#04x} failed: {:?}", addr, err))
    }

    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        self.hardware
            .write(addr, bytes)
            .inspect_err(|err| i2c_error!(self.logger, "write {:#04x} failed: {:?}", addr, err))
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.hardware
            .write_read(addr, bytes, buffer)
            .inspect_err(|err| {
                i2c_error!(self.logger, "write_read {:#04x} failed: {:?}", addr, err);
            })
    }

    fn transaction(
        &mut self,
        addr: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.hardware
            .transaction_slice(addr, operations)
            .inspect_err(|err| {
                i2c_error!(self.logger, "transaction {:#04x} failed: {:?}", addr, err);
            })
    }
}
