//! Real-time session multiplexing: the client hub and the wire protocol.

pub mod hub;
pub mod protocol;

pub use hub::{Client, Hub};
pub use protocol::{Encoding, WireMessage};
