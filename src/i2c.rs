/*!
  # Synchronous bit banged two-wire master with clock stretching

  This implementation consumes the following hardware resources:
  - A blocking microsecond delay provider
  - Two GPIO pins for SDA and SCL lines.

  Unlike a free running timer, every phase of a bit has its own period
  (see [`Timing`]). Reception waits for SCL to actually read high before
  sampling, so targets that stretch the clock are supported up to
  [`Timing::stretch_timeout_us`].

  ## Hardware requirements

  1. Configure both GPIO pins as Open-Drain outputs that can also be read.
  2. Fit external pull-up resistors on both lines. Internal pull-ups are
     never enabled.

  ## Transactions

  Two flavours share the same engine:
  - [`I2cBB::new`] builds the read/write master. The R/W bit of the stored
    address byte is forced before every write and read.
  - [`I2cBB::new_write_only`] builds a master that can only write.

  ```ignore
    let mut i2c = bitbang_twi::i2c::I2cBB::new(scl, sda, delay);
    i2c.initialize_lines()?;

    // Nunchuk handshake
    i2c.set_target_address(0x52);
    i2c.append_bytes(&[0x40, 0x00]);
    i2c.execute_write()?;

    let mut sample = [0u8; 6];
    let n = i2c.execute_read(&mut sample)?;
  ```

  A NACK aborts the transaction on the spot: both lines are left released
  and no STOP is sent. The transfer buffer payload is cleared after every
  attempt, successful or not.
*/

use core::marker::PhantomData;

use embedded_hal::blocking::delay::DelayUs;
use embedded_hal::blocking::i2c::{Read, Write, WriteRead};
use embedded_hal::digital::v2::{InputPin, OutputPin};
use log::{debug, trace};

use crate::buffer::{Direction, TransferBuffer, PAYLOAD_CAPACITY};
use crate::line::{Line, LineDriver};
use crate::timing::Timing;

/// I2C error
#[derive(Debug, Eq, PartialEq)]
pub enum Error<E> {
    /// GPIO error
    Bus(E),
    /// No ack received
    NoAck,
    /// Target held SCL low longer than the stretch timeout
    ClockStretchTimeout {
        /// Bytes fully read into the input buffer before the stall
        received: usize,
    },
    /// Invalid input
    InvalidData,
}

mod sealed {
    pub trait Sealed {}
}

/// Transaction flavour of an [`I2cBB`].
pub trait Variant: sealed::Sealed {
    /// Whether the R/W bit is rewritten before each transaction.
    const FORCES_DIRECTION: bool;
}

/// Master that only ever writes. The address byte always carries R/W = 0.
#[derive(Debug)]
pub struct WriteOnly;

/// Master that can write and read.
#[derive(Debug)]
pub struct ReadWrite;

impl sealed::Sealed for WriteOnly {}
impl sealed::Sealed for ReadWrite {}

impl Variant for WriteOnly {
    const FORCES_DIRECTION: bool = false;
}

impl Variant for ReadWrite {
    const FORCES_DIRECTION: bool = true;
}

/// Bit banging I2C master
pub struct I2cBB<SCL, SDA, D, M = ReadWrite> {
    lines: LineDriver<SCL, SDA>,
    delay: D,
    timing: Timing,
    buffer: TransferBuffer,
    _variant: PhantomData<M>,
}

impl<SCL, SDA, D, E> I2cBB<SCL, SDA, D, ReadWrite>
where
    SCL: OutputPin<Error = E> + InputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    D: DelayUs<u32>,
{
    /// Create a read/write master with the default timing
    pub fn new(scl: SCL, sda: SDA, delay: D) -> Self {
        Self::with_timing(scl, sda, delay, Timing::default())
    }

    /// Create a read/write master with custom timing
    pub fn with_timing(scl: SCL, sda: SDA, delay: D, timing: Timing) -> Self {
        I2cBB::build(scl, sda, delay, timing)
    }

    /// Read `input.len()` bytes from the stored target address.
    ///
    /// Every byte but the last is acknowledged; the last one is NACKed so
    /// the target stops sending. Any payload appended before the call is
    /// discarded. Returns the number of bytes received.
    ///
    /// An empty `input` returns `Ok(0)` without touching the bus: once
    /// addressed for reading, the target owns SDA until it has sent a byte.
    /// On [`Error::ClockStretchTimeout`] the first `received` bytes of
    /// `input` hold valid data.
    pub fn execute_read(&mut self, input: &mut [u8]) -> Result<usize, Error<E>> {
        self.buffer.set_direction(Direction::Read);
        let address = self.buffer.address_byte();
        self.buffer.take_payload();

        if input.is_empty() {
            return Ok(0);
        }

        // ST
        self.i2c_start()?;

        // SAD + R
        self.send_byte(address)?;

        self.read_from_slave(input)?;

        // SP
        self.i2c_stop()?;

        Ok(input.len())
    }
}

impl<SCL, SDA, D, E> I2cBB<SCL, SDA, D, WriteOnly>
where
    SCL: OutputPin<Error = E> + InputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    D: DelayUs<u32>,
{
    /// Create a write-only master with the default timing
    pub fn new_write_only(scl: SCL, sda: SDA, delay: D) -> Self {
        I2cBB::build(scl, sda, delay, Timing::default())
    }

    /// Create a write-only master with custom timing
    pub fn write_only_with_timing(scl: SCL, sda: SDA, delay: D, timing: Timing) -> Self {
        I2cBB::build(scl, sda, delay, timing)
    }
}

impl<SCL, SDA, D, M, E> I2cBB<SCL, SDA, D, M>
where
    SCL: OutputPin<Error = E> + InputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    D: DelayUs<u32>,
    M: Variant,
{
    fn build(scl: SCL, sda: SDA, delay: D, timing: Timing) -> Self {
        I2cBB {
            lines: LineDriver::new(scl, sda),
            delay,
            timing,
            buffer: TransferBuffer::new(),
            _variant: PhantomData,
        }
    }

    /// Release both lines so the pull-ups take the bus idle
    pub fn initialize_lines(&mut self) -> Result<(), Error<E>> {
        self.lines.release_all()
    }

    /// Clear the transfer buffer and address `address` (7-bit) for writing
    pub fn set_target_address(&mut self, address: u8) {
        self.buffer.set_target_address(address);
    }

    /// Queue one payload byte. Returns `false` if the buffer is full and the
    /// byte was dropped.
    pub fn append_byte(&mut self, byte: u8) -> bool {
        self.buffer.append_byte(byte)
    }

    /// Queue payload bytes. Returns how many fit; the rest are dropped.
    pub fn append_bytes(&mut self, bytes: &[u8]) -> usize {
        self.buffer.append_bytes(bytes)
    }

    /// Send the address byte and queued payload, then STOP.
    ///
    /// Fails with [`Error::NoAck`] at the first unacknowledged byte, in which
    /// case no STOP is sent. The payload is cleared either way.
    pub fn execute_write(&mut self) -> Result<(), Error<E>> {
        if M::FORCES_DIRECTION {
            self.buffer.set_direction(Direction::Write);
        }
        let address = self.buffer.address_byte();
        let payload = self.buffer.take_payload();

        // ST
        self.i2c_start()?;

        // SAD + W
        self.send_byte(address)?;

        self.write_to_slave(&payload)?;

        // SP
        self.i2c_stop()
    }

    /// Pending transaction
    pub fn buffer(&self) -> &TransferBuffer {
        &self.buffer
    }

    /// Current timing table
    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Replace the timing table
    pub fn set_timing(&mut self, timing: Timing) {
        self.timing = timing;
    }

    /// Destroy the master and give back the pins and delay provider
    pub fn free(self) -> (SCL, SDA, D) {
        let (scl, sda) = self.lines.free();
        (scl, sda, self.delay)
    }

    fn i2c_start(&mut self) -> Result<(), Error<E>> {
        trace!("i2c start");

        self.lines.drive_low(Line::Data)?;
        self.wait_us(self.timing.start_setup_us);

        self.lines.drive_low(Line::Clock)?;
        self.wait_us(self.timing.start_hold_us);

        Ok(())
    }

    // Entered with SCL low after an acknowledged byte.
    fn i2c_repeated_start(&mut self) -> Result<(), Error<E>> {
        self.lines.release(Line::Data)?;
        self.wait_us(self.timing.start_setup_us);

        self.lines.release(Line::Clock)?;
        self.wait_for_scl_high()?;
        self.wait_us(self.timing.start_setup_us);

        self.i2c_start()
    }

    fn i2c_stop(&mut self) -> Result<(), Error<E>> {
        self.lines.drive_low(Line::Data)?;
        self.wait_us(self.timing.stop_setup_us);

        self.lines.release(Line::Clock)?;
        self.wait_us(self.timing.stop_hold_us);

        self.lines.release(Line::Data)?;
        self.wait_us(self.timing.stop_idle_us);

        trace!("i2c stop");
        Ok(())
    }

    /// Clock out `byte` MSB first and sample the ACK bit.
    ///
    /// On NACK both lines are left released and `false` is returned.
    fn i2c_write_byte(&mut self, byte: u8) -> Result<bool, Error<E>> {
        for bit_offset in 0..8 {
            if (byte >> (7 - bit_offset)) & 0b1 == 1 {
                self.lines.release(Line::Data)?;
            } else {
                self.lines.drive_low(Line::Data)?;
            }
            self.wait_us(self.timing.bit_setup_us);

            self.lines.release(Line::Clock)?;
            self.wait_us(self.timing.clock_high_us);

            self.lines.drive_low(Line::Clock)?;
            self.wait_us(self.timing.clock_low_us);
        }

        self.lines.release(Line::Data)?;
        self.wait_us(self.timing.ack_release_us);

        self.lines.release(Line::Clock)?;
        self.wait_us(self.timing.ack_sample_us);

        if self.lines.read(Line::Data)? {
            return Ok(false);
        }

        self.lines.drive_low(Line::Clock)?;
        self.wait_us(self.timing.ack_clock_low_us);
        self.wait_us(self.timing.ack_settle_us);

        Ok(true)
    }

    /// Clock in one byte MSB first, then answer with ACK or NACK.
    fn i2c_read_byte(&mut self, should_send_ack: bool) -> Result<u8, Error<E>> {
        let mut byte: u8 = 0;

        for bit_offset in 0..8 {
            self.wait_us(self.timing.recv_clock_low_us);
            self.lines.release(Line::Clock)?;
            self.wait_for_scl_high()?;

            if self.lines.read(Line::Data)? {
                byte |= 1 << (7 - bit_offset);
            }

            self.wait_us(self.timing.recv_clock_high_us);
            self.lines.drive_low(Line::Clock)?;
        }

        self.wait_us(self.timing.recv_ack_setup_us);
        if should_send_ack {
            self.lines.drive_low(Line::Data)?;
        }
        self.wait_us(self.timing.recv_ack_hold_us);

        self.lines.release(Line::Clock)?;
        self.wait_for_scl_high()?;
        self.wait_us(self.timing.recv_ack_high_us);

        self.lines.drive_low(Line::Clock)?;
        self.wait_us(self.timing.recv_ack_tail_us);

        self.lines.release(Line::Data)?;
        self.wait_us(self.timing.recv_release_us);

        Ok(byte)
    }

    /// Poll SCL once per microsecond until the target lets it go.
    fn wait_for_scl_high(&mut self) -> Result<(), Error<E>> {
        let mut waited: u32 = 0;
        while !self.lines.read(Line::Clock)? {
            if waited >= self.timing.stretch_timeout_us {
                debug!("clock stretched for more than {} us", waited);
                self.lines.release(Line::Data)?;
                return Err(Error::ClockStretchTimeout { received: 0 });
            }
            self.delay.delay_us(1);
            waited += 1;
        }
        Ok(())
    }

    #[inline]
    fn read_from_slave(&mut self, input: &mut [u8]) -> Result<(), Error<E>> {
        let last = input.len().saturating_sub(1);
        for (i, place) in input.iter_mut().enumerate() {
            *place = self.i2c_read_byte(i != last).map_err(|e| match e {
                Error::ClockStretchTimeout { .. } => Error::ClockStretchTimeout { received: i },
                e => e,
            })?;
        }
        Ok(())
    }

    #[inline]
    fn write_to_slave(&mut self, output: &[u8]) -> Result<(), Error<E>> {
        for byte in output {
            self.send_byte(*byte)?;
        }
        Ok(())
    }

    #[inline]
    fn send_byte(&mut self, byte: u8) -> Result<(), Error<E>> {
        if self.i2c_write_byte(byte)? {
            Ok(())
        } else {
            debug!("no ack for {:#04x}", byte);
            Err(Error::NoAck)
        }
    }

    #[inline]
    fn wait_us(&mut self, us: u32) {
        self.delay.delay_us(us);
    }
}

impl<SCL, SDA, D, M, E> Write for I2cBB<SCL, SDA, D, M>
where
    SCL: OutputPin<Error = E> + InputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    D: DelayUs<u32>,
    M: Variant,
{
    type Error = Error<E>;

    /// An empty `output` only addresses the target, which is handy for bus
    /// scans.
    fn write(&mut self, addr: u8, output: &[u8]) -> Result<(), Self::Error> {
        if output.len() > PAYLOAD_CAPACITY {
            return Err(Error::InvalidData);
        }

        self.set_target_address(addr);
        self.append_bytes(output);
        self.execute_write()
    }
}

impl<SCL, SDA, D, E> Read for I2cBB<SCL, SDA, D, ReadWrite>
where
    SCL: OutputPin<Error = E> + InputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    D: DelayUs<u32>,
{
    type Error = Error<E>;

    fn read(&mut self, addr: u8, input: &mut [u8]) -> Result<(), Self::Error> {
        if input.is_empty() {
            return Ok(());
        }

        self.set_target_address(addr);
        self.execute_read(input).map(|_| ())
    }
}

impl<SCL, SDA, D, E> WriteRead for I2cBB<SCL, SDA, D, ReadWrite>
where
    SCL: OutputPin<Error = E> + InputPin<Error = E>,
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    D: DelayUs<u32>,
{
    type Error = Error<E>;

    fn write_read(&mut self, addr: u8, output: &[u8], input: &mut [u8]) -> Result<(), Self::Error> {
        if output.is_empty() || input.is_empty() || output.len() > PAYLOAD_CAPACITY {
            return Err(Error::InvalidData);
        }

        self.set_target_address(addr);
        self.append_bytes(output);
        let payload = self.buffer.take_payload();

        // ST
        self.i2c_start()?;

        // SAD + W
        let address = self.buffer.address_byte();
        self.send_byte(address)?;

        self.write_to_slave(&payload)?;

        // SR
        self.i2c_repeated_start()?;

        // SAD + R
        self.buffer.set_direction(Direction::Read);
        let address = self.buffer.address_byte();
        self.send_byte(address)?;

        self.read_from_slave(input)?;

        // SP
        self.i2c_stop()
    }
}
