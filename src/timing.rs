//! Bus timing table.
//!
//! Every delay the engine inserts between two line transitions is a field
//! here, in microseconds. The defaults are the periods the reference target
//! (a GBS 8220 scaler board and a Wii Nunchuk) were validated against; change
//! them only when driving a different peripheral.

/// Delays, in microseconds, used by the protocol engine.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Timing {
    /// SDA low to SCL low in a START.
    pub start_setup_us: u32,
    /// Hold after SCL goes low in a START.
    pub start_hold_us: u32,

    /// SDA settle before SCL is released, per transmitted bit.
    pub bit_setup_us: u32,
    /// SCL high period, per transmitted bit.
    pub clock_high_us: u32,
    /// SCL low period, per transmitted bit.
    pub clock_low_us: u32,

    /// SDA released to SCL released before the ACK bit.
    pub ack_release_us: u32,
    /// SCL released to SDA sampled for the ACK bit.
    pub ack_sample_us: u32,
    /// Hold after SCL goes low following an ACK.
    pub ack_clock_low_us: u32,
    /// Settle after an ACK before the next byte or STOP.
    pub ack_settle_us: u32,

    /// SDA low to SCL released in a STOP.
    pub stop_setup_us: u32,
    /// SCL released to SDA released in a STOP.
    pub stop_hold_us: u32,
    /// Bus free time after a STOP.
    pub stop_idle_us: u32,

    /// SCL low period before each received bit.
    pub recv_clock_low_us: u32,
    /// SCL high period after each received bit is sampled.
    pub recv_clock_high_us: u32,
    /// Wait after the eighth received bit before driving ACK/NACK.
    pub recv_ack_setup_us: u32,
    /// ACK/NACK settle before SCL is released.
    pub recv_ack_hold_us: u32,
    /// SCL high period of the ACK/NACK bit.
    pub recv_ack_high_us: u32,
    /// SCL low hold before SDA is released after ACK/NACK.
    pub recv_ack_tail_us: u32,
    /// Settle after SDA is released following ACK/NACK.
    pub recv_release_us: u32,

    /// Longest a target may hold SCL low while the master waits for it.
    pub stretch_timeout_us: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            start_setup_us: 10,
            start_hold_us: 10,

            bit_setup_us: 1,
            clock_high_us: 3,
            clock_low_us: 6,

            ack_release_us: 1,
            ack_sample_us: 3,
            ack_clock_low_us: 1,
            ack_settle_us: 15,

            stop_setup_us: 10,
            stop_hold_us: 11,
            stop_idle_us: 50,

            recv_clock_low_us: 15,
            recv_clock_high_us: 15,
            recv_ack_setup_us: 23,
            recv_ack_hold_us: 2,
            recv_ack_high_us: 13,
            recv_ack_tail_us: 23,
            recv_release_us: 2,

            // SMBus clock low timeout
            stretch_timeout_us: 25_000,
        }
    }
}

impl Timing {
    /// Bus time of one acknowledged transmitted byte, ignoring pin latency.
    pub fn byte_write_us(&self) -> u32 {
        8 * (self.bit_setup_us + self.clock_high_us + self.clock_low_us)
            + self.ack_release_us
            + self.ack_sample_us
            + self.ack_clock_low_us
            + self.ack_settle_us
    }

    /// Bus time of one received byte without clock stretching.
    pub fn byte_read_us(&self) -> u32 {
        8 * (self.recv_clock_low_us + self.recv_clock_high_us)
            + self.recv_ack_setup_us
            + self.recv_ack_hold_us
            + self.recv_ack_high_us
            + self.recv_ack_tail_us
            + self.recv_release_us
    }
}
