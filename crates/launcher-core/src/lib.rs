//! Wire contract between the launcher daemon and its clients.

pub mod proto;

pub const PROTOCOL_VERSION: u32 = 1;
