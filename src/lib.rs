//! This is a [bit banging] two-wire (I2C/TWI) master built on the
//! [`embedded-hal`] GPIO and delay traits.
//!
//! [bit banging]: https://en.wikipedia.org/wiki/Bit_banging
//! [`embedded-hal`]: https://github.com/rust-embedded/embedded-hal
//!
//! The master owns two open-drain lines and a blocking microsecond delay.
//! A transaction is staged in a fixed [`TransferBuffer`](buffer::TransferBuffer)
//! (one address byte and up to 32 payload bytes) and then clocked out with
//! the timing in [`Timing`](timing::Timing).
//!
//! ## Usage examples
//!
//! See the crate level docs of [`i2c`] and the [`nunchuk`] driver.

#![cfg_attr(not(test), no_std)]

pub mod buffer;
#[deny(missing_docs)]
pub mod i2c;
pub mod line;
pub mod nunchuk;
pub mod timing;

pub use buffer::{Direction, TransferBuffer, CAPACITY, PAYLOAD_CAPACITY};
pub use i2c::{Error, I2cBB, ReadWrite, WriteOnly};
pub use line::{Line, LineDriver};
pub use timing::Timing;
