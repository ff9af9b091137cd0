//! Pending transaction storage: one address byte followed by up to
//! [`PAYLOAD_CAPACITY`] payload bytes.

use heapless::Vec;

/// Payload bytes a single transaction can carry.
pub const PAYLOAD_CAPACITY: usize = 32;

/// Total frame size including the address byte.
pub const CAPACITY: usize = PAYLOAD_CAPACITY + 1;

const RW_BIT: u8 = 0x01;

/// Transfer direction, encoded in bit 0 of the address byte.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Direction {
    /// Master writes to the target (R/W = 0)
    Write,
    /// Master reads from the target (R/W = 1)
    Read,
}

/// Address byte plus append-only payload for one bus transaction.
///
/// Appends past the capacity are dropped. The append methods report how much
/// was accepted so callers that care can detect truncation.
#[derive(Debug, Clone, Default)]
pub struct TransferBuffer {
    address_byte: u8,
    payload: Vec<u8, PAYLOAD_CAPACITY>,
}

impl TransferBuffer {
    pub fn new() -> Self {
        TransferBuffer::default()
    }

    /// Clear the payload and store `address` with the write direction.
    ///
    /// Only the low 7 bits of `address` are used.
    pub fn set_target_address(&mut self, address: u8) {
        self.payload.clear();
        self.address_byte = (address & 0x7f) << 1;
    }

    /// 7-bit target address.
    pub fn target_address(&self) -> u8 {
        self.address_byte >> 1
    }

    pub fn direction(&self) -> Direction {
        if self.address_byte & RW_BIT == 0 {
            Direction::Write
        } else {
            Direction::Read
        }
    }

    /// Force the R/W bit of the stored address byte.
    pub fn set_direction(&mut self, direction: Direction) {
        match direction {
            Direction::Write => self.address_byte &= !RW_BIT,
            Direction::Read => self.address_byte |= RW_BIT,
        }
    }

    /// Address byte as it goes on the wire.
    pub fn address_byte(&self) -> u8 {
        self.address_byte
    }

    /// Append one payload byte. Returns `false` if it was dropped.
    pub fn append_byte(&mut self, byte: u8) -> bool {
        self.payload.push(byte).is_ok()
    }

    /// Append as many of `bytes` as fit and return how many were taken.
    pub fn append_bytes(&mut self, bytes: &[u8]) -> usize {
        bytes.iter().take_while(|b| self.append_byte(**b)).count()
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Frame length on the wire, address byte included.
    pub fn len(&self) -> usize {
        self.payload.len() + 1
    }

    /// `true` if no payload is pending.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Hand the pending payload over to the engine and reset it.
    ///
    /// The address byte stays, so the same target can be addressed again
    /// without calling [`set_target_address`](Self::set_target_address).
    pub(crate) fn take_payload(&mut self) -> Vec<u8, PAYLOAD_CAPACITY> {
        core::mem::take(&mut self.payload)
    }
}
