// Licensed under the Apache-2.0 license

//! Message-queue slave target.
//!
//! Each write addressed to this target becomes one message: the own address
//! in 8-bit form followed by the received bytes. Completed messages are
//! queued for the application; reads are answered from a staged response.

use crate::i2c::common::I2cSEvent;
use crate::i2c::traits::SlaveTarget;
use heapless::{Deque, Vec};

/// Byte returned to the remote master once the staged response is exhausted.
pub const IDLE_RESPONSE: u8 = 0xff;

pub struct SlaveMqueue<const MSG: usize, const DEPTH: usize> {
    address: u8,
    current: Vec<u8, MSG>,
    truncated: bool,
    reading: bool,
    queue: Deque<Vec<u8, MSG>, DEPTH>,
    dropped: usize,
    response: Vec<u8, MSG>,
    response_idx: usize,
}

impl<const MSG: usize, const DEPTH: usize> SlaveMqueue<MSG, DEPTH> {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            current: Vec::new(),
            truncated: false,
            reading: false,
            queue: Deque::new(),
            dropped: 0,
            response: Vec::new(),
            response_idx: 0,
        }
    }

    /// Oldest completed message.
    pub fn pop(&mut self) -> Option<Vec<u8, MSG>> {
        self.queue.pop_front()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Messages discarded because the queue was full.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Stages the bytes served to the next read. Excess bytes are ignored.
    pub fn set_response(&mut self, bytes: &[u8]) {
        self.response.clear();
        for &byte in bytes {
            if self.response.push(byte).is_err() {
                break;
            }
        }
        self.response_idx = 0;
    }

    fn next_response_byte(&mut self) -> u8 {
        match self.response.get(self.response_idx) {
            Some(&byte) => {
                self.response_idx += 1;
                byte
            }
            None => IDLE_RESPONSE,
        }
    }

    fn publish(&mut self) {
        // Only the address byte: nothing was written.
        if self.truncated || self.current.len() < 2 {
            return;
        }
        if self.queue.is_full() {
            self.queue.pop_front();
            self.dropped += 1;
        }
        let message = core::mem::take(&mut self.current);
        let _ = self.queue.push_back(message);
    }
}

impl<const MSG: usize, const DEPTH: usize> SlaveTarget for SlaveMqueue<MSG, DEPTH> {
    fn on_event(&mut self, event: I2cSEvent, value: &mut u8) {
        match event {
            I2cSEvent::SlaveWrReq => {
                self.reading = false;
                self.truncated = false;
                self.current.clear();
                let _ = self.current.push(self.address << 1);
            }
            I2cSEvent::SlaveWrRecvd => {
                if self.current.push(*value).is_err() {
                    self.truncated = true;
                }
            }
            I2cSEvent::SlaveRdReq => {
                self.reading = true;
                *value = self.next_response_byte();
            }
            I2cSEvent::SlaveRdProc => {
                *value = self.next_response_byte();
            }
            I2cSEvent::SlaveStop => {
                if self.reading {
                    if self.response_idx >= self.response.len() {
                        self.response.clear();
                        self.response_idx = 0;
                    }
                } else {
                    self.publish();
                }
                self.current.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(mq: &mut SlaveMqueue<4, 2>, bytes: &[u8]) {
        mq.on_event(I2cSEvent::SlaveWrReq, &mut 0);
        for &byte in bytes {
            let mut value = byte;
            mq.on_event(I2cSEvent::SlaveWrRecvd, &mut value);
        }
        mq.on_event(I2cSEvent::SlaveStop, &mut 0);
    }

    #[test]
    fn write_is_queued_with_address_prefix() {
        let mut mq = SlaveMqueue::<4, 2>::new(0x12);
        write(&mut mq, &[0xaa, 0xbb]);
        assert_eq!(mq.pop().unwrap().as_slice(), &[0x24, 0xaa, 0xbb]);
        assert!(mq.is_empty());
    }

    #[test]
    fn truncated_and_empty_writes_are_not_queued() {
        let mut mq = SlaveMqueue::<4, 2>::new(0x12);
        write(&mut mq, &[1, 2, 3, 4]);
        write(&mut mq, &[]);
        assert!(mq.is_empty());
    }

    #[test]
    fn full_queue_drops_oldest() {
        let mut mq = SlaveMqueue::<4, 2>::new(0x12);
        write(&mut mq, &[1]);
        write(&mut mq, &[2]);
        write(&mut mq, &[3]);
        assert_eq!(mq.dropped(), 1);
        assert_eq!(mq.pop().unwrap().as_slice(), &[0x24, 2]);
        assert_eq!(mq.pop().unwrap().as_slice(), &[0x24, 3]);
    }

    #[test]
    fn reads_serve_response_then_idle_byte() {
        let mut mq = SlaveMqueue::<4, 2>::new(0x12);
        mq.set_response(&[0x10, 0x20]);
        let mut value = 0;
        mq.on_event(I2cSEvent::SlaveRdReq, &mut value);
        assert_eq!(value, 0x10);
        mq.on_event(I2cSEvent::SlaveRdProc, &mut value);
        assert_eq!(value, 0x20);
        mq.on_event(I2cSEvent::SlaveRdProc, &mut value);
        assert_eq!(value, IDLE_RESPONSE);
        mq.on_event(I2cSEvent::SlaveStop, &mut 0);

        mq.on_event(I2cSEvent::SlaveRdReq, &mut value);
        assert_eq!(value, IDLE_RESPONSE);
    }
}
