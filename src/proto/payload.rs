//! Fixed-layout payload structs, one per request/reply shape.
//!
//! Every field is a network-byte-order `u32` on the wire; internally the
//! exchange works in [`crate::core_types`] widths and narrows/widens at the
//! edge (see that module's doc comment for why).

use super::ProtocolError;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// DEPOSIT / WITHDRAW.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundsInfo {
    pub amount: u32,
}

impl FundsInfo {
    pub const WIRE_LEN: u16 = 4;

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, ProtocolError> {
        Ok(Self {
            amount: r.read_u32::<BigEndian>()?,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), ProtocolError> {
        w.write_u32::<BigEndian>(self.amount)?;
        Ok(())
    }
}

/// ESCROW / RELEASE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscrowInfo {
    pub quantity: u32,
}

impl EscrowInfo {
    pub const WIRE_LEN: u16 = 4;

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, ProtocolError> {
        Ok(Self {
            quantity: r.read_u32::<BigEndian>()?,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), ProtocolError> {
        w.write_u32::<BigEndian>(self.quantity)?;
        Ok(())
    }
}

/// BUY / SELL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderInfo {
    pub quantity: u32,
    pub price: u32,
}

impl OrderInfo {
    pub const WIRE_LEN: u16 = 8;

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, ProtocolError> {
        Ok(Self {
            quantity: r.read_u32::<BigEndian>()?,
            price: r.read_u32::<BigEndian>()?,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), ProtocolError> {
        w.write_u32::<BigEndian>(self.quantity)?;
        w.write_u32::<BigEndian>(self.price)?;
        Ok(())
    }
}

/// CANCEL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CancelInfo {
    pub order_id: u32,
}

impl CancelInfo {
    pub const WIRE_LEN: u16 = 4;

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, ProtocolError> {
        Ok(Self {
            order_id: r.read_u32::<BigEndian>()?,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), ProtocolError> {
        w.write_u32::<BigEndian>(self.order_id)?;
        Ok(())
    }
}

/// ACK payload carried by STATUS, DEPOSIT, WITHDRAW, ESCROW, RELEASE, BUY,
/// SELL and CANCEL replies. `order_id`/`quantity` are only meaningful for
/// BUY/SELL (new order id) and CANCEL (residual canceled quantity) replies;
/// zero otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusInfo {
    pub balance: u32,
    pub inventory: u32,
    pub bid: u32,
    pub ask: u32,
    pub last: u32,
    pub order_id: u32,
    pub quantity: u32,
}

impl StatusInfo {
    pub const WIRE_LEN: u16 = 28;

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, ProtocolError> {
        Ok(Self {
            balance: r.read_u32::<BigEndian>()?,
            inventory: r.read_u32::<BigEndian>()?,
            bid: r.read_u32::<BigEndian>()?,
            ask: r.read_u32::<BigEndian>()?,
            last: r.read_u32::<BigEndian>()?,
            order_id: r.read_u32::<BigEndian>()?,
            quantity: r.read_u32::<BigEndian>()?,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), ProtocolError> {
        w.write_u32::<BigEndian>(self.balance)?;
        w.write_u32::<BigEndian>(self.inventory)?;
        w.write_u32::<BigEndian>(self.bid)?;
        w.write_u32::<BigEndian>(self.ask)?;
        w.write_u32::<BigEndian>(self.last)?;
        w.write_u32::<BigEndian>(self.order_id)?;
        w.write_u32::<BigEndian>(self.quantity)?;
        Ok(())
    }
}

/// POSTED / CANCELED / BOUGHT / SOLD / TRADED.
///
/// For POSTED of a buy, `buyer_id` is the new order id and `seller_id` is 0
/// (symmetric for a sell). For CANCELED, only the side that owned the order
/// is non-zero and `price` is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NotifyInfo {
    pub buyer_id: u32,
    pub seller_id: u32,
    pub quantity: u32,
    pub price: u32,
}

impl NotifyInfo {
    pub const WIRE_LEN: u16 = 16;

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, ProtocolError> {
        Ok(Self {
            buyer_id: r.read_u32::<BigEndian>()?,
            seller_id: r.read_u32::<BigEndian>()?,
            quantity: r.read_u32::<BigEndian>()?,
            price: r.read_u32::<BigEndian>()?,
        })
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), ProtocolError> {
        w.write_u32::<BigEndian>(self.buyer_id)?;
        w.write_u32::<BigEndian>(self.seller_id)?;
        w.write_u32::<BigEndian>(self.quantity)?;
        w.write_u32::<BigEndian>(self.price)?;
        Ok(())
    }
}
