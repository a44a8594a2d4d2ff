// Licensed under the Apache-2.0 license

//! Register map of one AST2600 I2C controller in "new register mode".
//!
//! Offsets are relative to the controller base. Status registers are
//! write-one-to-clear.

use bitflags::bitflags;

pub const I2CC_FUN_CTRL: usize = 0x00;
pub const I2CC_AC_TIMING: usize = 0x04;
pub const I2CC_STS_AND_BUFF: usize = 0x08;
pub const I2CC_BUFF_CTRL: usize = 0x0c;
pub const I2CM_IER: usize = 0x10;
pub const I2CM_ISR: usize = 0x14;
pub const I2CM_CMD_STS: usize = 0x18;
pub const I2CM_DMA_LEN: usize = 0x1c;
pub const I2CS_IER: usize = 0x20;
pub const I2CS_ISR: usize = 0x24;
pub const I2CS_CMD_STS: usize = 0x28;
pub const I2CS_DMA_LEN: usize = 0x2c;
pub const I2CM_TX_DMA: usize = 0x30;
pub const I2CM_RX_DMA: usize = 0x34;
pub const I2CS_TX_DMA: usize = 0x38;
pub const I2CS_RX_DMA: usize = 0x3c;
pub const I2CS_ADDR_CTRL: usize = 0x40;
pub const I2CM_DMA_LEN_STS: usize = 0x48;
pub const I2CS_DMA_LEN_STS: usize = 0x4c;

/// Largest descriptor a single DMA step may program.
pub const DMA_STEP_MAX: usize = 4096;
/// Receive scratch the slave role keeps armed in DMA mode.
pub const SLAVE_MSG_BUF_SIZE: usize = 256;
/// Width limit of the buffer-length fields in `I2CC_BUFF_CTRL`.
pub const BUFF_LEN_FIELD_MAX: usize = 32;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct FunCtrl: u32 {
        const MASTER_EN = 1 << 0;
        const SLAVE_EN = 1 << 1;
        const MULTI_MASTER_DIS = 1 << 15;
        const BUS_AUTO_RELEASE = 1 << 17;
    }
}

bitflags! {
    /// Line state bits of `I2CC_STS_AND_BUFF`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct LineState: u32 {
        const BUS_BUSY = 1 << 16;
        const SDA_LINE = 1 << 17;
        const SCL_LINE = 1 << 18;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct MasterIsr: u32 {
        const TX_ACK = 1 << 0;
        const TX_NAK = 1 << 1;
        const RX_DONE = 1 << 2;
        const ARBIT_LOSS = 1 << 3;
        const NORMAL_STOP = 1 << 4;
        const ABNORMAL = 1 << 5;
        const SCL_LOW_TO = 1 << 6;
        const SMBUS_ALT = 1 << 12;
        const BUS_RECOVER = 1 << 13;
        const SDA_DL_TO = 1 << 14;
        const BUS_RECOVER_FAIL = 1 << 15;
        const PKT_DONE = 1 << 16;
        const PKT_ERROR = 1 << 17;
        const PKT_TIMEOUT = 1 << 18;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct MasterCmd: u32 {
        const START = 1 << 0;
        const TX_CMD = 1 << 1;
        const RX_CMD = 1 << 3;
        const RX_CMD_LAST = 1 << 4;
        const STOP = 1 << 5;
        const TX_BUFF_EN = 1 << 6;
        const RX_BUFF_EN = 1 << 7;
        const TX_DMA_EN = 1 << 8;
        const RX_DMA_EN = 1 << 9;
        const RECOVER_CMD_EN = 1 << 11;
        const PKT_EN = 1 << 16;
        const PKT_ADDR = 0x7f << 24;
    }
}

impl MasterCmd {
    /// Packet-mode start command addressing the 7-bit `addr`.
    pub fn start_packet(addr: u8) -> Self {
        Self::PKT_EN | Self::START | Self::from_bits_retain((u32::from(addr) & 0x7f) << 24)
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SlaveIsr: u32 {
        const TX_ACK = 1 << 0;
        const TX_NAK = 1 << 1;
        const RX_DONE = 1 << 2;
        const RX_DONE_NAK = 1 << 3;
        const STOP = 1 << 4;
        const ABNOR_STOP = 1 << 5;
        const SLAVE_MATCH = 1 << 7;
        const INACTIVE_TO = 1 << 15;
        const PKT_DONE = 1 << 16;
        const PKT_ERROR = 1 << 17;
        const ADDR_MASK = 0x3 << 18;
        const ADDR1_NAK = 1 << 20;
        const ADDR2_NAK = 1 << 21;
        const ADDR3_NAK = 1 << 22;
        const WAIT_RX_DMA = 1 << 24;
        const WAIT_TX_DMA = 1 << 25;
        const SLAVE_PENDING = 1 << 29;
        const ADDR_INDICATE = 0x3 << 30;
    }
}

impl SlaveIsr {
    /// Address bookkeeping bits that carry no transaction state.
    pub const ADDR_BOOKKEEPING: Self = Self::ADDR_INDICATE
        .union(Self::ADDR_MASK)
        .union(Self::ADDR1_NAK)
        .union(Self::ADDR2_NAK)
        .union(Self::ADDR3_NAK);
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SlaveCmd: u32 {
        const TX_CMD = 1 << 2;
        const TX_BUFF_EN = 1 << 6;
        const RX_BUFF_EN = 1 << 7;
        const TX_DMA_EN = 1 << 8;
        const RX_DMA_EN = 1 << 9;
        const PKT_MODE_EN = 1 << 16;
        const ACTIVE_ALL = 0x3 << 17;
    }
}

impl SlaveCmd {
    /// Packet-mode posture answering every enabled address.
    pub const TRIGGER: Self = Self::ACTIVE_ALL.union(Self::PKT_MODE_EN);
}

pub const SLAVE_ADDR1_ENABLE: u32 = 1 << 7;

/// Receive byte latched in `I2CC_STS_AND_BUFF` (Byte mode).
pub fn rx_byte(sts_and_buff: u32) -> u8 {
    ((sts_and_buff >> 8) & 0xff) as u8
}

/// `I2CC_BUFF_CTRL` value arming a receive of `len` pool bytes.
pub fn set_rx_buf_len(len: usize) -> u32 {
    ((len.saturating_sub(1) as u32 & 0x1f) << 16) | 1
}

/// `I2CC_BUFF_CTRL` value arming a transmit of `len` pool bytes.
pub fn set_tx_buf_len(len: usize) -> u32 {
    ((len.saturating_sub(1) as u32 & 0x1f) << 8) | 1
}

pub fn rx_buf_len(buff_ctrl: u32) -> usize {
    ((buff_ctrl >> 24) & 0x3f) as usize
}

pub fn tx_buf_len(buff_ctrl: u32) -> usize {
    (((buff_ctrl >> 8) & 0x1f) + 1) as usize
}

/// Master `I2CM_DMA_LEN` value for a `len`-byte receive descriptor.
pub fn master_rx_dma_len(len: usize) -> u32 {
    ((len.saturating_sub(1) as u32 & 0xfff) << 16) | (1 << 31)
}

/// Master `I2CM_DMA_LEN` value for a `len`-byte transmit descriptor.
pub fn master_tx_dma_len(len: usize) -> u32 {
    (len.saturating_sub(1) as u32 & 0xfff) | (1 << 15)
}

/// Slave descriptors share the master encoding.
pub fn slave_rx_dma_len(len: usize) -> u32 {
    master_rx_dma_len(len)
}

pub fn slave_tx_dma_len(len: usize) -> u32 {
    master_tx_dma_len(len)
}

pub fn dma_tx_len_sts(sts: u32) -> usize {
    (sts & 0x1fff) as usize
}

pub fn dma_rx_len_sts(sts: u32) -> usize {
    ((sts >> 16) & 0x1fff) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_length_fields_round_trip_through_hardware_encoding() {
        assert_eq!(set_tx_buf_len(32), 0x1f01);
        assert_eq!(tx_buf_len(set_tx_buf_len(32)), 32);
        assert_eq!(tx_buf_len(set_tx_buf_len(1)), 1);
        assert_eq!(set_rx_buf_len(16), 0x000f_0001);
        assert_eq!(rx_buf_len(0x0300_0000), 3);
    }

    #[test]
    fn dma_length_encoding_uses_length_minus_one() {
        assert_eq!(master_tx_dma_len(4096), 0x8fff);
        assert_eq!(master_rx_dma_len(4), 0x8003_0000);
        assert_eq!(dma_rx_len_sts(0x0004_0000), 4);
        assert_eq!(dma_tx_len_sts(0x0004_0001), 1);
    }

    #[test]
    fn start_packet_places_address_in_top_byte() {
        let cmd = MasterCmd::start_packet(0x50);
        assert_eq!(cmd.bits(), 0x5001_0001);
    }
}
