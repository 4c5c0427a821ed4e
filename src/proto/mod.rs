//! Wire protocol: a fixed 12-byte header followed by a fixed-size payload,
//! all fields big-endian. One frame per request or reply.

mod header;
mod message_type;
mod payload;

pub use header::{HEADER_LEN, Header};
pub use message_type::MessageType;
pub use payload::{CancelInfo, EscrowInfo, FundsInfo, NotifyInfo, OrderInfo, StatusInfo};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    #[error("protocol violation: {0}")]
    Violation(String),

    #[error("peer closed the connection")]
    PeerClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
