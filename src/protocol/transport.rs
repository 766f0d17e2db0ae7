use std::io::{self, ErrorKind, Read, Write};

use bincode::{
    config::{BigEndian, Configuration, Fixint},
    decode_from_slice, decode_from_std_read, encode_into_std_write, encode_to_vec,
    error::{DecodeError, EncodeError},
};
use thiserror::Error;

use crate::sequence::Element;

use super::{Message, MessageKind};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to encode frame header: {0}")]
    Serialize(#[from] EncodeError),
    #[error("malformed frame: {0}")]
    Malformed(DecodeError),
    #[error("frame truncated, connection closed mid-message")]
    Truncated,
    #[error("payload of {0} elements exceeds the frame length field")]
    PayloadTooLarge(usize),
    #[error("expected {expected:?} message, received {found:?}")]
    UnexpectedMessage {
        expected: MessageKind,
        found: MessageKind,
    },
    #[error("sent {sent} elements but received {received}")]
    SizeMismatch { sent: usize, received: usize },
    #[error("connection closed by peer")]
    Closed,
    #[error("connection guard poisoned by a failed caller")]
    Poisoned,
    #[error("Transport IO Error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Framing violations; the stream can no longer be trusted.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            TransportError::Malformed(_)
                | TransportError::Truncated
                | TransportError::PayloadTooLarge(_)
                | TransportError::UnexpectedMessage { .. }
                | TransportError::SizeMismatch { .. }
        )
    }

    /// The peer is gone or the socket is unusable.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, TransportError::Closed | TransportError::Io(_))
    }
}

impl From<DecodeError> for TransportError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Io { inner, .. } if inner.kind() == ErrorKind::UnexpectedEof => {
                TransportError::Truncated
            }
            DecodeError::Io { inner, .. } => TransportError::Io(inner),
            err => TransportError::Malformed(err),
        }
    }
}

/// Encoded width of a [`MessageKind`] under the fixed-int config.
const KIND_LEN: usize = 4;

/// Frames [`Message`]s over a blocking byte stream.
pub struct ProtocolTransport<T: Read + Write> {
    stream: T,
    config: Configuration<BigEndian, Fixint>,
}

impl<T: Read + Write> ProtocolTransport<T> {
    pub fn new(stream: T) -> Self {
        let config = bincode::config::standard()
            .with_big_endian()
            .with_fixed_int_encoding();
        Self { stream, config }
    }

    pub fn get_ref(&self) -> &T {
        &self.stream
    }

    /// Write one complete frame and flush it.
    pub fn write_message(&mut self, message: &Message) -> Result<(), TransportError> {
        let mut frame = encode_to_vec(message.kind(), self.config)?;
        if let Some(segment) = message.payload() {
            let length = u32::try_from(segment.len())
                .map_err(|_| TransportError::PayloadTooLarge(segment.len()))?;
            encode_into_std_write(length, &mut frame, self.config)?;
            frame.extend(segment.iter().map(|&value| value as u8));
        }

        self.stream.write_all(&frame)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Read one complete frame. End of stream before the frame starts is
    /// reported as [`TransportError::Closed`].
    pub fn read_message(&mut self) -> Result<Message, TransportError> {
        let header = self.read_kind()?;
        let (kind, _): (MessageKind, usize) = decode_from_slice(&header, self.config)?;
        if !kind.has_payload() {
            return Ok(Message::Terminate);
        }

        let length: u32 = decode_from_std_read(&mut self.stream, self.config)?;
        let mut payload = Vec::new();
        (&mut self.stream)
            .take(u64::from(length))
            .read_to_end(&mut payload)?;
        if payload.len() < length as usize {
            return Err(TransportError::Truncated);
        }

        let segment = payload.into_iter().map(|byte| byte as Element).collect();
        Ok(Message::with_payload(kind, segment))
    }

    /// Read the raw kind header, telling a stream that ended between frames
    /// apart from one that ended inside the header.
    fn read_kind(&mut self) -> Result<[u8; KIND_LEN], TransportError> {
        let mut header = [0; KIND_LEN];
        let mut filled = 0;
        while filled < KIND_LEN {
            match self.stream.read(&mut header[filled..]) {
                Ok(0) if filled == 0 => return Err(TransportError::Closed),
                Ok(0) => return Err(TransportError::Truncated),
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(header)
    }
}
