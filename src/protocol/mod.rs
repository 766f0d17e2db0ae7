//! Coordinator-worker communication protocol.
//!
//! This module defines the wire protocol spoken between the sortnet
//! coordinator and its workers, the blocking transport that frames messages
//! over a byte stream, the coordinator-side [`Connection`] to one worker and
//! the worker-side [`WorkerServer`].
//!
//! # Overview
//!
//! A coordinator holds one persistent TCP connection per worker. Over it, the
//! coordinator sends a [`Message::Request`] carrying a segment to sort and
//! blocks until the matching [`Message::Response`] arrives; only one request
//! is ever in flight on a connection. When the run is over the coordinator
//! sends [`Message::Terminate`] and closes the socket. Both ends disable send
//! coalescing (`TCP_NODELAY`).
//!
//! # Binary Format
//!
//! Every frame starts with its kind; segment-carrying frames follow with a
//! length and the raw elements:
//!
//! ```text
//! Request:    kind = 0 (u32) | length (u32) | payload [u8; length]
//! Response:   kind = 1 (u32) | length (u32) | payload [u8; length]
//! Terminate:  kind = 2 (u32)
//! ```
//!
//! - Integers are encoded with bincode's big-endian fixed-int configuration.
//! - Each element is carried as its two's-complement octet.
//! - An unknown kind, or a stream ending inside a frame, is a protocol error.
//!   A stream ending cleanly between frames means the peer closed.
//!
//! # Key Components
//!
//! - [`Message`]: a single frame, with its [`MessageKind`].
//! - [`ProtocolTransport`]: frames messages over any `Read + Write` stream.
//! - [`Connection`]: guarded coordinator-side channel to one worker.
//! - [`WorkerServer`]: accepts connections and serves sort requests.
mod connection;
mod message;
mod server;
mod transport;

pub use connection::Connection;
pub use message::{Message, MessageKind};
pub use server::{ServerError, WorkerServer};
pub use transport::{ProtocolTransport, TransportError};
