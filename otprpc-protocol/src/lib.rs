//! # otprpc-protocol
//!
//! Wire protocol implementation for otprpc.
//!
//! This crate provides:
//! - The `Term` value model exchanged with remote nodes
//! - Binary framing with length prefix and CRC32C validation
//! - JSON request/response envelopes
//! - Error codes and protocol constants

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod term;

pub use codec::{Decoder, Encoder};
pub use error::{ErrorCode, ProtocolError};
pub use frame::{Frame, FrameFlags, FRAME_HEADER_SIZE, MAGIC};
pub use message::{
    HelloParams, Request, RequestBody, Response, ResponseError, ResponseStatus, RpcRequest,
};
pub use term::Term;

/// Protocol version supported by this implementation.
pub const PROTOCOL_VERSION: u16 = 1;

/// Default port of an otprpc node endpoint.
pub const DEFAULT_PORT: u16 = 7411;

/// Maximum frame payload size (16 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;
