//! Simulated open-drain bus with a single target device.
//!
//! Both pins share one `BusState`. Every master write re-resolves the wire
//! levels and feeds edges to the target state machine, which detects
//! START/STOP, acknowledges (or not) each received byte, shifts out data on
//! reads and can hold SCL low to stretch the clock.

#![allow(dead_code)]

use std::cell::RefCell;
use std::convert::Infallible;
use std::rc::Rc;

use bitbang_twi::{I2cBB, Line, Timing, WriteOnly};
use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::digital::v2::{InputPin, OutputPin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Start,
    Stop,
    /// Byte clocked in by the target and whether it acknowledged it.
    Write { byte: u8, acked: bool },
    /// Byte shifted out by the target and whether the master acknowledged it.
    Read { byte: u8, acked: bool },
}

#[derive(Debug, Clone)]
pub struct Target {
    pub address: u8,
    /// Index of the byte to NACK within a transaction, address byte is 0.
    pub nack_at: Option<usize>,
    /// Bytes served on reads, repeated from the start on every transaction.
    pub data: Vec<u8>,
    /// SCL reads the target holds the clock low for after each stretched
    /// release.
    pub stretch_polls: u32,
    /// Stretch the clock of every data bit the target sends.
    pub stretch_data: bool,
    /// Stretch the clock of the ACK/NACK bit the master sends on reads.
    pub stretch_ack: bool,
    /// Bytes the target sends before data/ACK stretching starts.
    pub stretch_after: usize,
    /// Stretch the first SCL release after this many bytes were received
    /// in a write, i.e. a repeated START.
    pub stretch_restart_at: Option<usize>,
}

impl Target {
    pub fn new(address: u8) -> Self {
        Target {
            address,
            nack_at: None,
            data: Vec::new(),
            stretch_polls: 0,
            stretch_data: false,
            stretch_ack: false,
            stretch_after: 0,
            stretch_restart_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Receive,
    AckOut,
    Transmit,
    AckIn,
}

struct BusState {
    target: Target,

    master_scl_low: bool,
    master_sda_low: bool,
    target_scl_low: bool,
    target_sda_low: bool,
    scl: bool,
    sda: bool,

    phase: Phase,
    shift: u8,
    bits: u8,
    byte_index: usize,
    reading: bool,
    tx_pos: usize,
    master_acked: bool,
    stretch_remaining: u32,

    events: Vec<Event>,
    elapsed_us: u64,
}

impl BusState {
    fn new(target: Target) -> Self {
        BusState {
            target,
            master_scl_low: false,
            master_sda_low: false,
            target_scl_low: false,
            target_sda_low: false,
            scl: true,
            sda: true,
            phase: Phase::Idle,
            shift: 0,
            bits: 0,
            byte_index: 0,
            reading: false,
            tx_pos: 0,
            master_acked: false,
            stretch_remaining: 0,
            events: Vec::new(),
            elapsed_us: 0,
        }
    }

    fn settle(&mut self) {
        let scl = !(self.master_scl_low || self.target_scl_low);
        let sda = !(self.master_sda_low || self.target_sda_low);
        let (prev_scl, prev_sda) = (self.scl, self.sda);
        self.scl = scl;
        self.sda = sda;

        if scl && prev_scl && sda != prev_sda {
            if sda {
                self.on_stop();
            } else {
                self.on_start();
            }
        } else if scl && !prev_scl {
            self.on_rising();
        } else if !scl && prev_scl {
            self.on_falling();
            self.sda = !(self.master_sda_low || self.target_sda_low);
        }
    }

    fn on_start(&mut self) {
        self.events.push(Event::Start);
        self.phase = Phase::Receive;
        self.shift = 0;
        self.bits = 0;
        self.byte_index = 0;
        self.reading = false;
        self.tx_pos = 0;
        self.target_sda_low = false;
    }

    fn on_stop(&mut self) {
        self.events.push(Event::Stop);
        self.phase = Phase::Idle;
        self.target_sda_low = false;
    }

    fn on_rising(&mut self) {
        match self.phase {
            Phase::Receive => {
                self.shift = (self.shift << 1) | self.sda as u8;
                self.bits += 1;
            }
            Phase::AckIn => {
                self.master_acked = !self.sda;
                let byte = self.current_tx_byte();
                self.events.push(Event::Read {
                    byte,
                    acked: self.master_acked,
                });
            }
            Phase::Idle | Phase::AckOut | Phase::Transmit => {}
        }
    }

    fn on_falling(&mut self) {
        match self.phase {
            Phase::Receive if self.bits == 8 => {
                let byte = self.shift;
                let acked = self.accepts(byte);
                self.events.push(Event::Write { byte, acked });
                if acked {
                    if self.byte_index == 0 {
                        self.reading = byte & 1 == 1;
                    }
                    self.target_sda_low = true;
                    self.phase = Phase::AckOut;
                } else {
                    self.phase = Phase::Idle;
                }
            }
            Phase::AckOut => {
                self.target_sda_low = false;
                self.byte_index += 1;
                self.bits = 0;
                self.shift = 0;
                if self.reading {
                    self.phase = Phase::Transmit;
                    self.drive_tx_bit();
                } else {
                    self.phase = Phase::Receive;
                }
            }
            Phase::Transmit => {
                self.bits += 1;
                if self.bits == 8 {
                    self.target_sda_low = false;
                    self.phase = Phase::AckIn;
                } else {
                    self.drive_tx_bit();
                }
            }
            Phase::AckIn => {
                if self.master_acked {
                    self.tx_pos += 1;
                    self.bits = 0;
                    self.phase = Phase::Transmit;
                    self.drive_tx_bit();
                } else {
                    self.target_sda_low = false;
                    self.phase = Phase::Idle;
                }
            }
            Phase::Idle | Phase::Receive => {}
        }
    }

    fn accepts(&self, byte: u8) -> bool {
        if self.target.nack_at == Some(self.byte_index) {
            return false;
        }
        self.byte_index != 0 || byte >> 1 == self.target.address
    }

    fn current_tx_byte(&self) -> u8 {
        if self.target.data.is_empty() {
            0xff
        } else {
            self.target.data[self.tx_pos % self.target.data.len()]
        }
    }

    fn drive_tx_bit(&mut self) {
        let bit = (self.current_tx_byte() >> (7 - self.bits)) & 1;
        self.target_sda_low = bit == 0;
    }

    fn master_set(&mut self, line: Line, low: bool) {
        match line {
            Line::Clock => {
                let releasing = self.master_scl_low && !low;
                self.master_scl_low = low;
                if releasing && self.stretches() {
                    self.target_scl_low = true;
                    self.stretch_remaining = self.target.stretch_polls;
                }
            }
            Line::Data => self.master_sda_low = low,
        }
        self.settle();
    }

    fn stretches(&self) -> bool {
        if self.target.stretch_polls == 0 {
            return false;
        }
        let sending = self.tx_pos >= self.target.stretch_after;
        match self.phase {
            Phase::Transmit => sending && self.target.stretch_data,
            Phase::AckIn => sending && self.target.stretch_ack,
            Phase::Receive => {
                self.bits == 0 && self.target.stretch_restart_at == Some(self.byte_index)
            }
            Phase::Idle | Phase::AckOut => false,
        }
    }

    fn master_read(&mut self, line: Line) -> bool {
        if line == Line::Clock && self.stretch_remaining > 0 {
            self.stretch_remaining -= 1;
            if self.stretch_remaining == 0 {
                self.target_scl_low = false;
                self.settle();
            }
        }
        match line {
            Line::Clock => self.scl,
            Line::Data => self.sda,
        }
    }
}

/// Handle on the simulated bus, kept by the test after the pins are moved
/// into the master.
#[derive(Clone)]
pub struct SimBus(Rc<RefCell<BusState>>);

impl SimBus {
    pub fn new(target: Target) -> Self {
        SimBus(Rc::new(RefCell::new(BusState::new(target))))
    }

    pub fn pins(&self) -> (SimPin, SimPin, SimDelay) {
        (
            SimPin {
                bus: self.clone(),
                line: Line::Clock,
            },
            SimPin {
                bus: self.clone(),
                line: Line::Data,
            },
            SimDelay { bus: self.clone() },
        )
    }

    pub fn master(&self) -> I2cBB<SimPin, SimPin, SimDelay> {
        let (scl, sda, delay) = self.pins();
        I2cBB::new(scl, sda, delay)
    }

    pub fn master_with_timing(&self, timing: Timing) -> I2cBB<SimPin, SimPin, SimDelay> {
        let (scl, sda, delay) = self.pins();
        I2cBB::with_timing(scl, sda, delay, timing)
    }

    pub fn writer(&self) -> I2cBB<SimPin, SimPin, SimDelay, WriteOnly> {
        let (scl, sda, delay) = self.pins();
        I2cBB::new_write_only(scl, sda, delay)
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.borrow().events.clone()
    }

    pub fn clear_events(&self) {
        self.0.borrow_mut().events.clear();
    }

    pub fn elapsed_us(&self) -> u64 {
        self.0.borrow().elapsed_us
    }

    pub fn reset_clock(&self) {
        self.0.borrow_mut().elapsed_us = 0;
    }

    /// `true` when the master drives neither line.
    pub fn master_released(&self) -> bool {
        let bus = self.0.borrow();
        !bus.master_scl_low && !bus.master_sda_low
    }

    pub fn set_target(&self, target: Target) {
        self.0.borrow_mut().target = target;
    }
}

pub struct SimPin {
    bus: SimBus,
    line: Line,
}

impl OutputPin for SimPin {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.bus.0.borrow_mut().master_set(self.line, true);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.bus.0.borrow_mut().master_set(self.line, false);
        Ok(())
    }
}

impl InputPin for SimPin {
    type Error = Infallible;

    fn is_high(&self) -> Result<bool, Self::Error> {
        Ok(self.bus.0.borrow_mut().master_read(self.line))
    }

    fn is_low(&self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

pub struct SimDelay {
    bus: SimBus,
}

impl DelayUs<u32> for SimDelay {
    fn delay_us(&mut self, us: u32) {
        self.bus.0.borrow_mut().elapsed_us += u64::from(us);
    }
}

/// Byte transfers (written and read) in `events`.
pub fn transfers(events: &[Event]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, Event::Write { .. } | Event::Read { .. }))
        .count()
}
