//! Wire message type tags

use super::ProtocolError;

/// One-byte request/reply discriminant carried in every [`super::Header`].
///
/// Numeric values only need to be stable and distinct within one build of
/// the protocol — nothing in this spec requires a particular assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Login = 1,
    Status = 2,
    Deposit = 3,
    Withdraw = 4,
    Escrow = 5,
    Release = 6,
    Buy = 7,
    Sell = 8,
    Cancel = 9,
    Ack = 10,
    Nack = 11,
    Bought = 12,
    Sold = 13,
    Posted = 14,
    Canceled = 15,
    Traded = 16,
}

impl MessageType {
    pub fn from_u8(value: u8) -> Result<Self, ProtocolError> {
        Ok(match value {
            1 => Self::Login,
            2 => Self::Status,
            3 => Self::Deposit,
            4 => Self::Withdraw,
            5 => Self::Escrow,
            6 => Self::Release,
            7 => Self::Buy,
            8 => Self::Sell,
            9 => Self::Cancel,
            10 => Self::Ack,
            11 => Self::Nack,
            12 => Self::Bought,
            13 => Self::Sold,
            14 => Self::Posted,
            15 => Self::Canceled,
            16 => Self::Traded,
            other => return Err(ProtocolError::MalformedPacket(format!("unknown message type {other}"))),
        })
    }
}
