// Licensed under the Apache-2.0 license

//! Single-shot completion signal shared between the interrupt path and the
//! caller waiting on a session.

use crate::i2c::error::Error;
use core::cell::Cell;
use critical_section::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Armed,
    Done(Result<usize, Error>),
}

pub struct Completion {
    state: Mutex<Cell<State>>,
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl Completion {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(State::Idle)),
        }
    }

    /// Arms the signal for a new session.
    ///
    /// Fails with [`Error::ControllerBusy`] while a previous session is armed
    /// or its result has not been consumed.
    pub fn arm(&self) -> Result<(), Error> {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            match cell.get() {
                State::Idle => {
                    cell.set(State::Armed);
                    Ok(())
                }
                State::Armed | State::Done(_) => Err(Error::ControllerBusy),
            }
        })
    }

    /// Publishes the session result. Returns `false`, keeping the first
    /// result, if the signal was not armed or already completed.
    pub fn complete(&self, result: Result<usize, Error>) -> bool {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            if cell.get() == State::Armed {
                cell.set(State::Done(result));
                true
            } else {
                false
            }
        })
    }

    /// Consumes the result if the session has ended.
    pub fn poll(&self) -> nb::Result<usize, Error> {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            match cell.get() {
                State::Done(result) => {
                    cell.set(State::Idle);
                    result.map_err(nb::Error::Other)
                }
                State::Armed => Err(nb::Error::WouldBlock),
                State::Idle => Err(nb::Error::Other(Error::InvalidArgument)),
            }
        })
    }

    pub fn is_armed(&self) -> bool {
        critical_section::with(|cs| self.state.borrow(cs).get() == State::Armed)
    }

    /// Drops any armed or unconsumed state.
    pub fn reset(&self) {
        critical_section::with(|cs| self.state.borrow(cs).set(State::Idle));
    }
}
