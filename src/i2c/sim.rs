// Licensed under the Apache-2.0 license

//! Register-level simulator of one controller, its DMA memory and the bus
//! targets behind it. Commands execute synchronously when `I2CM_CMD_STS` is
//! written and latch their status for the next interrupt service.

use crate::common::NoOpLogger;
use crate::i2c::ast2600_i2c::Ast2600I2c;
use crate::i2c::common::{I2cConfig, I2cSEvent};
use crate::i2c::hardware_interface::{DmaBuffer, DmaDirection, DmaMapError, DmaMapper, HardwareInterface};
use crate::i2c::registers::*;
use crate::i2c::smbus::pec_update;
use crate::i2c::traits::SlaveTarget;
use embedded_hal::delay::DelayNs;
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

pub const POOL_SIZE: usize = 32;
pub const POOL_RX_OFFSET: usize = POOL_SIZE / 2;
const DMA_BASE: u32 = 0x8000_0000;

/// Device-visible memory with map/unmap accounting.
#[derive(Debug, Default)]
pub struct DmaArena {
    regions: BTreeMap<u32, Vec<u8>>,
    next: u32,
    pub maps: usize,
    pub unmaps: usize,
    pub fail_next_map: bool,
}

impl DmaArena {
    pub fn live(&self) -> usize {
        self.regions.len()
    }

    fn locate(&self, addr: u32) -> (u32, usize) {
        let (&base, region) = self
            .regions
            .range(..=addr)
            .next_back()
            .expect("address below every mapping");
        let offset = (addr - base) as usize;
        assert!(offset <= region.len(), "address {addr:#x} outside mapping");
        (base, offset)
    }

    pub fn read(&self, addr: u32, len: usize) -> Vec<u8> {
        let (base, offset) = self.locate(addr);
        self.regions[&base][offset..offset + len].to_vec()
    }

    pub fn write(&mut self, addr: u32, data: &[u8]) {
        let (base, offset) = self.locate(addr);
        let region = self.regions.get_mut(&base).unwrap();
        region[offset..offset + data.len()].copy_from_slice(data);
    }
}

pub type SharedArena = Rc<RefCell<DmaArena>>;

pub struct SimDma {
    pub arena: SharedArena,
}

pub struct SimDmaBuffer {
    arena: SharedArena,
    addr: u32,
    len: usize,
}

impl DmaMapper for SimDma {
    type Buffer = SimDmaBuffer;

    fn map(&mut self, len: usize, _direction: DmaDirection) -> Result<SimDmaBuffer, DmaMapError> {
        let mut arena = self.arena.borrow_mut();
        if arena.fail_next_map {
            arena.fail_next_map = false;
            return Err(DmaMapError);
        }
        let addr = DMA_BASE + arena.next;
        arena.next += (len as u32 + 0x20) & !0xf;
        arena.regions.insert(addr, vec![0; len]);
        arena.maps += 1;
        Ok(SimDmaBuffer {
            arena: Rc::clone(&self.arena),
            addr,
            len,
        })
    }
}

impl DmaBuffer for SimDmaBuffer {
    fn bus_addr(&self) -> u32 {
        self.addr
    }

    fn len(&self) -> usize {
        self.len
    }

    fn write_at(&mut self, offset: usize, data: &[u8]) {
        self.arena.borrow_mut().write(self.addr + offset as u32, data);
    }

    fn read_at(&self, offset: usize, dst: &mut [u8]) {
        let data = self.arena.borrow().read(self.addr + offset as u32, dst.len());
        dst.copy_from_slice(&data);
    }
}

impl Drop for SimDmaBuffer {
    fn drop(&mut self) {
        let mut arena = self.arena.borrow_mut();
        assert!(arena.regions.remove(&self.addr).is_some(), "double unmap");
        arena.unmaps += 1;
    }
}

/// Register-file target in the style of an EEPROM or SMBus device: the first
/// byte of a write selects a register, the rest is stored under it, and a read
/// returns the selected register.
#[derive(Debug, Default)]
pub struct SimDevice {
    pub regs: BTreeMap<u8, Vec<u8>>,
    /// Served by reads without a preceding register select.
    pub read_data: Vec<u8>,
    pub nak: bool,
    /// Verifies write PEC and appends PEC to reads.
    pub pec: bool,
    /// XOR applied to one byte of the next read response.
    pub flip: Option<(usize, u8)>,
    /// Raw bytes of each completed write phase.
    pub writes: Vec<Vec<u8>>,
    pub pec_failures: usize,
    transcript: Vec<u8>,
    current: Vec<u8>,
    response: VecDeque<u8>,
}

impl SimDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pec() -> Self {
        Self {
            pec: true,
            ..Self::default()
        }
    }

    fn start(&mut self, addr: u8, read: bool) {
        if read {
            let selected = self.current.first().copied();
            self.finish_write(false);
            self.transcript.push(addr << 1 | 1);
            let mut data = match selected {
                Some(reg) => self.regs.get(&reg).cloned().unwrap_or_default(),
                None => self.read_data.clone(),
            };
            if self.pec {
                let mut crc = pec_update(0, &self.transcript);
                crc = pec_update(crc, &data);
                data.push(crc);
            }
            if let Some((index, mask)) = self.flip.take() {
                if let Some(byte) = data.get_mut(index) {
                    *byte ^= mask;
                }
            }
            self.response = data.into();
        } else {
            self.finish_write(true);
            self.transcript.push(addr << 1);
        }
    }

    fn write(&mut self, byte: u8) {
        self.transcript.push(byte);
        self.current.push(byte);
    }

    fn read(&mut self) -> u8 {
        self.response.pop_front().unwrap_or(0xff)
    }

    fn stop(&mut self) {
        self.finish_write(true);
        self.transcript.clear();
        self.response.clear();
    }

    /// Closes a write phase; `store` is false when it only selected a register.
    fn finish_write(&mut self, store: bool) {
        if self.current.is_empty() {
            return;
        }
        let mut bytes = core::mem::take(&mut self.current);
        self.writes.push(bytes.clone());
        if !store {
            return;
        }
        if self.pec {
            let received = bytes.pop();
            let covered = self.transcript.len() - 1;
            if Some(pec_update(0, &self.transcript[..covered])) != received {
                self.pec_failures += 1;
                return;
            }
        }
        if let Some((&reg, rest)) = bytes.split_first() {
            if !rest.is_empty() {
                self.regs.insert(reg, rest.to_vec());
            }
        }
    }
}

#[derive(Debug)]
pub struct SimHw {
    pub regs: BTreeMap<usize, u32>,
    pub pool: [u8; POOL_SIZE],
    pub writes: Vec<(usize, u32)>,
    pub arena: SharedArena,
    pub devices: BTreeMap<u8, SimDevice>,
    addressed: Option<u8>,
    /// Master commands executed before the engine stops responding.
    pub stall_after: Option<usize>,
    pub sda_stuck: bool,
    pub bus_busy: bool,
    pub recovery_fixes: bool,
}

impl SimHw {
    pub fn new(arena: SharedArena) -> Self {
        Self {
            regs: BTreeMap::new(),
            pool: [0; POOL_SIZE],
            writes: Vec::new(),
            arena,
            devices: BTreeMap::new(),
            addressed: None,
            stall_after: None,
            sda_stuck: false,
            bus_busy: false,
            recovery_fixes: true,
        }
    }

    pub fn reg(&self, offset: usize) -> u32 {
        self.regs.get(&offset).copied().unwrap_or(0)
    }

    fn set(&mut self, offset: usize, value: u32) {
        self.regs.insert(offset, value);
    }

    fn raise(&mut self, offset: usize, bits: u32) {
        let value = self.reg(offset) | bits;
        self.set(offset, value);
    }

    /// Values written to `offset`, oldest first.
    pub fn written(&self, offset: usize) -> Vec<u32> {
        self.writes
            .iter()
            .filter(|(off, _)| *off == offset)
            .map(|&(_, value)| value)
            .collect()
    }

    /// Master commands issued, oldest first.
    pub fn master_commands(&self) -> Vec<MasterCmd> {
        self.written(I2CM_CMD_STS)
            .into_iter()
            .filter(|&value| value != 0)
            .map(MasterCmd::from_bits_retain)
            .collect()
    }

    pub fn device(&mut self, addr: u8) -> &mut SimDevice {
        self.devices.entry(addr).or_default()
    }

    pub fn raise_master(&mut self, status: MasterIsr) {
        self.raise(I2CM_ISR, status.bits());
    }

    /// Latches slave status as the hardware would at the end of a packet.
    pub fn raise_slave(&mut self, status: SlaveIsr) {
        self.raise(I2CS_ISR, status.bits());
    }

    /// Places bytes received by the slave role in the pool.
    pub fn slave_rx_pool(&mut self, data: &[u8]) {
        self.pool[POOL_RX_OFFSET..POOL_RX_OFFSET + data.len()].copy_from_slice(data);
        let ctrl = self.reg(I2CC_BUFF_CTRL) & !(0x3f << 24);
        self.set(I2CC_BUFF_CTRL, ctrl | (data.len() as u32) << 24);
    }

    /// Places bytes received by the slave role in its DMA buffer.
    pub fn slave_rx_dma(&mut self, data: &[u8]) {
        let addr = self.reg(I2CS_RX_DMA);
        self.arena.borrow_mut().write(addr, data);
        self.set(I2CS_DMA_LEN_STS, (data.len() as u32) << 16);
    }

    pub fn slave_rx_byte(&mut self, byte: u8) {
        self.set(I2CC_STS_AND_BUFF, u32::from(byte) << 8);
    }

    pub fn slave_tx_dma_byte(&self) -> u8 {
        self.arena.borrow().read(self.reg(I2CS_TX_DMA), 1)[0]
    }

    fn execute_master(&mut self, value: u32) {
        let cmd = MasterCmd::from_bits_retain(value);
        if cmd.contains(MasterCmd::RECOVER_CMD_EN) {
            self.set(I2CM_CMD_STS, 0);
            if self.recovery_fixes {
                self.sda_stuck = false;
                self.bus_busy = false;
                self.raise(I2CM_ISR, MasterIsr::BUS_RECOVER.bits());
            } else {
                self.raise(I2CM_ISR, MasterIsr::BUS_RECOVER_FAIL.bits());
            }
            return;
        }
        if let Some(remaining) = self.stall_after.as_mut() {
            if *remaining == 0 {
                self.set(I2CM_CMD_STS, value);
                return;
            }
            *remaining -= 1;
        }
        self.set(I2CM_CMD_STS, value & !0xffff);

        let mut isr = MasterIsr::PKT_DONE;
        if cmd.contains(MasterCmd::START) {
            let addr = ((value >> 24) & 0x7f) as u8;
            let read = cmd.contains(MasterCmd::RX_CMD);
            let acked = match self.devices.get_mut(&addr) {
                Some(device) if !device.nak => {
                    device.start(addr, read);
                    true
                }
                _ => false,
            };
            if !acked {
                isr |= MasterIsr::PKT_ERROR | MasterIsr::TX_NAK;
                if cmd.contains(MasterCmd::STOP) {
                    isr |= MasterIsr::NORMAL_STOP;
                }
                self.addressed = None;
                self.raise(I2CM_ISR, isr.bits());
                return;
            }
            self.addressed = Some(addr);
            if !cmd.intersects(MasterCmd::TX_CMD | MasterCmd::RX_CMD) {
                isr |= MasterIsr::TX_ACK;
            }
        }

        if cmd.contains(MasterCmd::TX_CMD) {
            let data = if cmd.contains(MasterCmd::TX_DMA_EN) {
                let len = (self.reg(I2CM_DMA_LEN) & 0xfff) as usize + 1;
                self.set(I2CM_DMA_LEN_STS, len as u32);
                self.arena.borrow().read(self.reg(I2CM_TX_DMA), len)
            } else if cmd.contains(MasterCmd::TX_BUFF_EN) {
                let len = tx_buf_len(self.reg(I2CC_BUFF_CTRL));
                self.pool[..len].to_vec()
            } else {
                vec![(self.reg(I2CC_STS_AND_BUFF) & 0xff) as u8]
            };
            if let Some(device) = self.addressed.and_then(|addr| self.devices.get_mut(&addr)) {
                data.iter().for_each(|&byte| device.write(byte));
            }
            isr |= MasterIsr::TX_ACK;
        }

        if cmd.contains(MasterCmd::RX_CMD) {
            let len = if cmd.contains(MasterCmd::RX_DMA_EN) {
                ((self.reg(I2CM_DMA_LEN) >> 16) & 0xfff) as usize + 1
            } else if cmd.contains(MasterCmd::RX_BUFF_EN) {
                ((self.reg(I2CC_BUFF_CTRL) >> 16) & 0x1f) as usize + 1
            } else {
                1
            };
            let data: Vec<u8> = match self.addressed.and_then(|addr| self.devices.get_mut(&addr)) {
                Some(device) => (0..len).map(|_| device.read()).collect(),
                None => vec![0xff; len],
            };
            if cmd.contains(MasterCmd::RX_DMA_EN) {
                let addr = self.reg(I2CM_RX_DMA);
                self.arena.borrow_mut().write(addr, &data);
                self.set(I2CM_DMA_LEN_STS, (len as u32) << 16);
            } else if cmd.contains(MasterCmd::RX_BUFF_EN) {
                self.pool[POOL_RX_OFFSET..POOL_RX_OFFSET + len].copy_from_slice(&data);
                let ctrl = self.reg(I2CC_BUFF_CTRL) & !(0x3f << 24);
                self.set(I2CC_BUFF_CTRL, ctrl | (len as u32) << 24);
            } else {
                self.set(I2CC_STS_AND_BUFF, u32::from(data[0]) << 8);
            }
            isr |= MasterIsr::RX_DONE;
        }

        if cmd.contains(MasterCmd::STOP) {
            if let Some(device) = self.addressed.take().and_then(|addr| self.devices.get_mut(&addr)) {
                device.stop();
            }
            isr |= MasterIsr::NORMAL_STOP;
        }
        self.raise(I2CM_ISR, isr.bits());
    }
}

impl HardwareInterface for SimHw {
    fn read_reg(&self, offset: usize) -> u32 {
        if offset == I2CC_STS_AND_BUFF {
            let mut line = LineState::SCL_LINE;
            if !self.sda_stuck {
                line |= LineState::SDA_LINE;
            }
            if self.bus_busy {
                line |= LineState::BUS_BUSY;
            }
            return (self.reg(offset) & 0xffff) | line.bits();
        }
        self.reg(offset)
    }

    fn write_reg(&mut self, offset: usize, value: u32) {
        self.writes.push((offset, value));
        match offset {
            // Acknowledging a slave packet releases its whole status.
            I2CS_ISR if value & SlaveIsr::PKT_DONE.bits() != 0 => self.set(offset, 0),
            I2CM_ISR | I2CS_ISR => {
                let remaining = self.reg(offset) & !value;
                self.set(offset, remaining);
            }
            // Zero cancels a pending command without issuing one.
            I2CM_CMD_STS if value == 0 => self.set(offset, 0),
            I2CM_CMD_STS => self.execute_master(value),
            I2CC_FUN_CTRL => {
                if value == 0 {
                    // Disabling the controller drops any pending command.
                    self.set(I2CM_CMD_STS, 0);
                }
                self.set(offset, value);
            }
            _ => self.set(offset, value),
        }
    }

    fn pool_read(&self, offset: usize) -> u8 {
        self.pool[offset]
    }

    fn pool_write_word(&mut self, offset: usize, word: u32) {
        self.pool[offset..offset + 4].copy_from_slice(&word.to_le_bytes());
    }

    fn pool_size(&self) -> usize {
        POOL_SIZE
    }

    fn clock_rate(&self) -> u32 {
        100_000_000
    }

    fn global_clock_divider(&self) -> u32 {
        0x6222_0803
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Slave target recording every event with the byte it carried.
#[derive(Debug, Default)]
pub struct RecordingTarget {
    pub events: Vec<(I2cSEvent, u8)>,
    pub replies: VecDeque<u8>,
}

impl RecordingTarget {
    pub fn kinds(&self) -> Vec<I2cSEvent> {
        self.events.iter().map(|&(event, _)| event).collect()
    }

    pub fn received(&self) -> Vec<u8> {
        self.events
            .iter()
            .filter(|(event, _)| *event == I2cSEvent::SlaveWrRecvd)
            .map(|&(_, value)| value)
            .collect()
    }
}

impl SlaveTarget for RecordingTarget {
    fn on_event(&mut self, event: I2cSEvent, value: &mut u8) {
        if matches!(event, I2cSEvent::SlaveRdReq | I2cSEvent::SlaveRdProc) {
            *value = self.replies.pop_front().unwrap_or(0xff);
        }
        self.events.push((event, *value));
    }
}

pub type SimController = Ast2600I2c<SimHw, SimDma, RecordingTarget, NoDelay, NoOpLogger>;

/// An initialized controller over a fresh simulator.
pub fn controller(config: I2cConfig) -> (SimController, SharedArena) {
    let arena = SharedArena::default();
    let hw = SimHw::new(Rc::clone(&arena));
    let dma = SimDma {
        arena: Rc::clone(&arena),
    };
    let mut ctl = Ast2600I2c::new(hw, dma, NoDelay, NoOpLogger, config);
    ctl.init();
    (ctl, arena)
}
