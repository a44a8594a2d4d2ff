// Licensed under the Apache-2.0 license

//! # I2C hardware abstraction traits
//!
//! Small traits composed into a full controller:
//!
//! ```text
//! I2cHardwareCore (foundation)
//!     └── I2cMaster (master operations)
//! SlaveTarget (callback side of the slave role)
//! ```

use crate::i2c::common::{I2cSEvent, I2cSpeed, TimingConfig};
use embedded_hal::i2c::{AddressMode, Operation, SevenBitAddress};

/// Core I2C hardware interface providing basic operations
///
/// This is the foundation trait that all I2C hardware implementations must provide.
///
/// # Examples
///
/// ```rust,no_run
/// use aspeed_i2c::i2c::{I2cHardwareCore, I2cSpeed, TimingConfig};
///
/// fn setup_i2c<T: I2cHardwareCore>(controller: &mut T) -> Result<u32, T::Error> {
///     controller.init();
///     controller.configure_timing(I2cSpeed::Fast, &TimingConfig::default())
/// }
/// ```
pub trait I2cHardwareCore {
    /// Hardware-specific error type that implements embedded-hal error traits
    type Error: embedded_hal::i2c::Error + core::fmt::Debug;

    /// Initialize the I2C hardware from its stored configuration
    fn init(&mut self);

    /// Configure the bus speed and timing overrides
    ///
    /// # Returns
    ///
    /// The frequency of the base clock the bus timing was derived from, in Hz.
    ///
    /// # Errors
    ///
    /// Returns an error if the requested timing cannot be programmed.
    fn configure_timing(&mut self, speed: I2cSpeed, timing: &TimingConfig)
        -> Result<u32, Self::Error>;

    /// Enable master interrupt sources in `mask`
    fn enable_interrupts(&mut self, mask: u32);

    /// Acknowledge master interrupt status bits in `mask`
    fn clear_interrupts(&mut self, mask: u32);

    /// Handle hardware interrupt events (called from ISR)
    ///
    /// Implementations must not block.
    fn handle_interrupt(&mut self);

    /// Attempt to recover the I2C bus from stuck conditions
    ///
    /// # Errors
    ///
    /// Returns an error if bus recovery fails.
    fn recover_bus(&mut self) -> Result<(), Self::Error>;
}

/// I2C Master mode operations
///
/// The address type `A` must implement `AddressMode` to ensure compatibility
/// with embedded-hal.
pub trait I2cMaster<A: AddressMode = SevenBitAddress>: I2cHardwareCore {
    /// Write bytes to the target at `addr`
    ///
    /// # Errors
    ///
    /// Returns an error if the target does not acknowledge or the bus fails.
    fn write(&mut self, addr: A, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Read `buffer.len()` bytes from the target at `addr`
    ///
    /// # Errors
    ///
    /// Returns an error if the target does not acknowledge or the bus fails.
    fn read(&mut self, addr: A, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Write then read with a repeated start in between
    ///
    /// # Errors
    ///
    /// Returns an error if either phase fails.
    fn write_read(&mut self, addr: A, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Execute `ops_slice` as one transaction, each operation separated by a
    /// repeated start
    ///
    /// # Errors
    ///
    /// Returns an error if any operation fails.
    fn transaction_slice(
        &mut self,
        addr: A,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Self::Error>;
}

/// Receiver of slave-role events.
///
/// `value` carries the received byte for `SlaveWrRecvd`. For `SlaveRdReq` and
/// `SlaveRdProc` the target stores the byte to transmit into it.
/// Called from interrupt context; implementations must not block.
pub trait SlaveTarget {
    fn on_event(&mut self, event: I2cSEvent, value: &mut u8);
}

/// Placeholder target for controllers that never act as a slave.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTarget;

impl SlaveTarget for NoTarget {
    fn on_event(&mut self, _event: I2cSEvent, _value: &mut u8) {}
}
