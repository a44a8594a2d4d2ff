// Licensed under the Apache-2.0 license

//! AST2600-class I2C/SMBus bus-controller engine.
//!
//! One [`Ast2600I2c`] drives one controller instance through a
//! [`HardwareInterface`]. Master transfers move in Byte, Buffer or DMA
//! steps; the optional slave role (feature `i2c_target`) answers a remote
//! master through a [`SlaveTarget`].

pub mod ast2600_i2c;
pub mod common;
pub mod completion;
pub mod error;
pub mod hardware_interface;
pub mod i2c_controller;
pub mod master;
pub mod message;
pub mod planner;
pub mod recovery;
pub mod registers;
#[cfg(feature = "i2c_target")]
pub mod slave;
#[cfg(feature = "i2c_target")]
pub mod slave_mqueue;
pub mod smbus;
pub mod timing;
pub mod traits;

#[cfg(test)]
pub(crate) mod sim;

pub use ast2600_i2c::{Ast2600I2c, IrqReturn};
pub use common::{
    I2cConfig, I2cConfigBuilder, I2cSEvent, I2cSpeed, I2cXferMode, SlaveStatus, TimingConfig,
};
pub use error::Error;
pub use hardware_interface::{DmaBuffer, DmaDirection, DmaMapError, DmaMapper, HardwareInterface, NoDma};
pub use i2c_controller::I2cController;
pub use master::MasterPhase;
pub use message::{Direction, Message};
#[cfg(feature = "i2c_target")]
pub use slave_mqueue::SlaveMqueue;
pub use smbus::{SmbusData, SmbusDirection, SmbusSize};
pub use traits::{I2cHardwareCore, I2cMaster, NoTarget, SlaveTarget};
