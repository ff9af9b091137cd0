//! Wii Nunchuk over any blocking I2C bus.
//!
//! The controller answers at 0x52. After the `0x40 0x00` handshake every
//! sample is six obfuscated bytes; writing `0x00` asks it to latch the next
//! one.

use embedded_hal::blocking::i2c::{Read, Write};

/// Fixed bus address of the controller.
pub const ADDRESS: u8 = 0x52;

const SAMPLE_LEN: usize = 6;

/// Undo the controller's per-byte obfuscation.
#[inline]
pub fn decode(raw: u8) -> u8 {
    (raw ^ 0x17).wrapping_add(0x17)
}

/// Nunchuk driver holding the last decoded sample.
pub struct Nunchuk<I2C> {
    i2c: I2C,
    sample: [u8; SAMPLE_LEN],
}

impl<I2C, E> Nunchuk<I2C>
where
    I2C: Write<Error = E> + Read<Error = E>,
{
    pub fn new(i2c: I2C) -> Self {
        Nunchuk {
            i2c,
            sample: [0; SAMPLE_LEN],
        }
    }

    /// Send the handshake that switches the controller on.
    pub fn init(&mut self) -> Result<(), E> {
        self.i2c.write(ADDRESS, &[0x40, 0x00])
    }

    /// Fetch and decode one sample, then request the next.
    pub fn poll(&mut self) -> Result<&[u8; SAMPLE_LEN], E> {
        let mut raw = [0u8; SAMPLE_LEN];
        self.i2c.read(ADDRESS, &mut raw)?;
        for (dst, src) in self.sample.iter_mut().zip(raw.iter()) {
            *dst = decode(*src);
        }
        self.i2c.write(ADDRESS, &[0x00])?;
        Ok(&self.sample)
    }

    pub fn joystick_x(&self) -> u8 {
        self.sample[0]
    }

    pub fn joystick_y(&self) -> u8 {
        self.sample[1]
    }

    pub fn accel_x(&self) -> u8 {
        self.sample[2]
    }

    pub fn accel_y(&self) -> u8 {
        self.sample[3]
    }

    pub fn accel_z(&self) -> u8 {
        self.sample[4]
    }

    /// Buttons are active low.
    pub fn button_c(&self) -> bool {
        (self.sample[5] >> 1) & 1 == 0
    }

    pub fn button_z(&self) -> bool {
        self.sample[5] & 1 == 0
    }

    pub fn release(self) -> I2C {
        self.i2c
    }
}
