//! Open-drain control of the two bus lines.
//!
//! Both pins must be configured as open-drain outputs with an external
//! pull-up. `set_low` pulls the line to ground, `set_high` stops driving it
//! and lets the resistor (or another bus participant) decide its level.

use embedded_hal::digital::v2::{InputPin, OutputPin};

use crate::i2c::Error;

/// One of the two bus wires.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Line {
    /// SCL
    Clock,
    /// SDA
    Data,
}

/// Exclusive owner of the SCL and SDA pins.
pub struct LineDriver<SCL, SDA> {
    scl: SCL,
    sda: SDA,
}

impl<SCL, SDA, E> LineDriver<SCL, SDA>
where
    SCL: OutputPin<Error = E> + InputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
{
    /// Wrap two open-drain pins. Nothing is driven until the first call.
    pub fn new(scl: SCL, sda: SDA) -> Self {
        LineDriver { scl, sda }
    }

    /// Release both lines, leaving the bus idle.
    pub fn release_all(&mut self) -> Result<(), Error<E>> {
        self.release(Line::Data)?;
        self.release(Line::Clock)
    }

    /// Actively pull `line` low.
    #[inline]
    pub fn drive_low(&mut self, line: Line) -> Result<(), Error<E>> {
        let res = match line {
            Line::Clock => self.scl.set_low(),
            Line::Data => self.sda.set_low(),
        };
        res.map_err(Error::Bus)
    }

    /// Stop driving `line`. It floats high only if no one else holds it.
    #[inline]
    pub fn release(&mut self, line: Line) -> Result<(), Error<E>> {
        let res = match line {
            Line::Clock => self.scl.set_high(),
            Line::Data => self.sda.set_high(),
        };
        res.map_err(Error::Bus)
    }

    /// Sample the wire level. Only meaningful while `line` is released.
    #[inline]
    pub fn read(&mut self, line: Line) -> Result<bool, Error<E>> {
        let level = match line {
            Line::Clock => self.scl.is_high(),
            Line::Data => self.sda.is_high(),
        };
        level.map_err(Error::Bus)
    }

    /// Give the pins back.
    pub fn free(self) -> (SCL, SDA) {
        (self.scl, self.sda)
    }
}
