use bincode::{Decode, Encode};

use crate::sequence::Element;

/// Wire discriminant leading every frame.
#[derive(Debug, Clone, Copy, Encode, Decode, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Response,
    Terminate,
}

impl MessageKind {
    /// Whether frames of this kind carry a length-prefixed segment.
    pub fn has_payload(self) -> bool {
        !matches!(self, MessageKind::Terminate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Segment to be sorted by a worker.
    Request(Vec<Element>),
    /// Sorted segment answering the previous request.
    Response(Vec<Element>),
    /// Ends the connection; no reply is sent.
    Terminate,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Request(_) => MessageKind::Request,
            Message::Response(_) => MessageKind::Response,
            Message::Terminate => MessageKind::Terminate,
        }
    }

    pub fn payload(&self) -> Option<&[Element]> {
        match self {
            Message::Request(segment) | Message::Response(segment) => Some(segment),
            Message::Terminate => None,
        }
    }

    pub(crate) fn with_payload(kind: MessageKind, segment: Vec<Element>) -> Self {
        match kind {
            MessageKind::Request => Message::Request(segment),
            MessageKind::Response => Message::Response(segment),
            MessageKind::Terminate => Message::Terminate,
        }
    }
}
