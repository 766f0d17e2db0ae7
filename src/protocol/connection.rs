use std::{
    fmt,
    net::{Shutdown, SocketAddr, TcpStream},
    sync::{Mutex, MutexGuard},
};

use log::{debug, trace};

use crate::sequence::Element;

use super::{Message, MessageKind, ProtocolTransport, TransportError};

/// Persistent channel from the coordinator to one worker.
///
/// All exchanges go through a per-connection guard, so concurrent callers
/// never interleave frames and at most one request is in flight.
pub struct Connection {
    address: SocketAddr,
    transport: Mutex<ProtocolTransport<TcpStream>>,
}

impl Connection {
    pub fn open(address: SocketAddr) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(address)?;
        stream.set_nodelay(true)?;
        debug!("connected to worker {address}");

        Ok(Self {
            address,
            transport: Mutex::new(ProtocolTransport::new(stream)),
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Send `segment` for sorting and block until the sorted segment arrives.
    pub fn send(&self, segment: &[Element]) -> Result<Vec<Element>, TransportError> {
        let mut transport = self.lock()?;
        trace!("sending {} elements to {}", segment.len(), self.address);
        transport.write_message(&Message::Request(segment.to_vec()))?;

        match transport.read_message()? {
            Message::Response(sorted) if sorted.len() == segment.len() => Ok(sorted),
            Message::Response(sorted) => Err(TransportError::SizeMismatch {
                sent: segment.len(),
                received: sorted.len(),
            }),
            other => Err(TransportError::UnexpectedMessage {
                expected: MessageKind::Response,
                found: other.kind(),
            }),
        }
    }

    /// Tell the worker this connection is done. No reply is expected.
    pub fn send_terminate(&self) -> Result<(), TransportError> {
        self.lock()?.write_message(&Message::Terminate)
    }

    pub fn close(self) -> Result<(), TransportError> {
        let transport = self
            .transport
            .into_inner()
            .map_err(|_| TransportError::Poisoned)?;
        transport.get_ref().shutdown(Shutdown::Both)?;
        debug!("closed connection to {}", self.address);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, ProtocolTransport<TcpStream>>, TransportError> {
        self.transport.lock().map_err(|_| TransportError::Poisoned)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
