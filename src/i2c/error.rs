// Licensed under the Apache-2.0 license

//! Result taxonomy of the transfer engine and the classifier that maps raw
//! master status flags onto it.

use crate::i2c::hardware_interface::DmaMapError;
use crate::i2c::registers::MasterIsr;
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// Arbitration lost or packet error; the transfer may be retried.
    Contention,
    /// A bus line is held low past its timeout.
    BusBusy,
    /// The session did not complete in time.
    BusTimeout,
    ProtocolViolation,
    TargetNotAcknowledged,
    /// DMA mapping or scratch space unavailable.
    ResourceExhausted,
    /// Packet-error-check mismatch on otherwise successful transport.
    DataCorruption,
    InvalidArgument,
    Unsupported,
    /// The shared unit is owned by the slave role or by another session.
    ControllerBusy,
}

impl Error {
    /// True for failures a caller may retry without intervention.
    pub fn is_retryable(self) -> bool {
        matches!(self, Error::Contention | Error::ControllerBusy)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let text = match self {
            Error::Contention => "bus contention",
            Error::BusBusy => "bus line stuck",
            Error::BusTimeout => "transfer timed out",
            Error::ProtocolViolation => "protocol violation",
            Error::TargetNotAcknowledged => "target not acknowledged",
            Error::ResourceExhausted => "resource exhausted",
            Error::DataCorruption => "packet error check mismatch",
            Error::InvalidArgument => "invalid argument",
            Error::Unsupported => "unsupported operation",
            Error::ControllerBusy => "controller busy",
        };
        f.write_str(text)
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::Contention => ErrorKind::ArbitrationLoss,
            Error::TargetNotAcknowledged => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            Error::BusBusy | Error::ProtocolViolation => ErrorKind::Bus,
            _ => ErrorKind::Other,
        }
    }
}

impl From<DmaMapError> for Error {
    fn from(_: DmaMapError) -> Self {
        Error::ResourceExhausted
    }
}

/// Maps the error flags of a master status word to a result.
///
/// Returns `None` when no error flag is set. Arbitration loss takes
/// precedence over a stuck line, which takes precedence over an abnormal
/// condition.
pub fn classify(status: MasterIsr) -> Option<Error> {
    if status.contains(MasterIsr::ARBIT_LOSS) {
        Some(Error::Contention)
    } else if status.intersects(MasterIsr::SDA_DL_TO | MasterIsr::SCL_LOW_TO) {
        Some(Error::BusBusy)
    } else if status.contains(MasterIsr::ABNORMAL) {
        Some(Error::ProtocolViolation)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::Error as _;

    #[test]
    fn classify_maps_error_flags() {
        assert_eq!(classify(MasterIsr::ARBIT_LOSS), Some(Error::Contention));
        assert_eq!(classify(MasterIsr::SDA_DL_TO), Some(Error::BusBusy));
        assert_eq!(classify(MasterIsr::SCL_LOW_TO), Some(Error::BusBusy));
        assert_eq!(classify(MasterIsr::ABNORMAL), Some(Error::ProtocolViolation));
        assert_eq!(classify(MasterIsr::PKT_DONE | MasterIsr::TX_ACK), None);
    }

    #[test]
    fn arbitration_loss_wins_over_other_flags() {
        let status = MasterIsr::ARBIT_LOSS | MasterIsr::ABNORMAL | MasterIsr::SCL_LOW_TO;
        assert_eq!(classify(status), Some(Error::Contention));
    }

    #[test]
    fn embedded_hal_kinds() {
        assert_eq!(Error::Contention.kind(), ErrorKind::ArbitrationLoss);
        assert_eq!(
            Error::TargetNotAcknowledged.kind(),
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown)
        );
        assert_eq!(Error::DataCorruption.kind(), ErrorKind::Other);
        assert!(Error::Contention.is_retryable());
        assert!(!Error::DataCorruption.is_retryable());
    }
}
