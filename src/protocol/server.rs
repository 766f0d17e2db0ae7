use std::{
    io,
    net::{SocketAddr, TcpListener, TcpStream},
    sync::Arc,
    thread,
    time::Instant,
};

use log::{error, info, warn};
use thiserror::Error;

use crate::{
    config::Config,
    engine::{EngineError, SortEngine},
    protocol::{Message, ProtocolTransport},
};

use super::transport::TransportError;

/// Worker side of the protocol: sorts every segment it is sent.
pub struct WorkerServer {
    listener: TcpListener,
    engine: Arc<SortEngine>,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind worker listener: {0}")]
    Bind(#[from] io::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl WorkerServer {
    pub fn bind(address: SocketAddr, config: &Config) -> Result<Self, ServerError> {
        let engine = SortEngine::new(config)?;
        let listener = TcpListener::bind(address)?;

        Ok(Self {
            listener,
            engine: Arc::new(engine),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever, serving each on its own thread.
    pub fn listen(self) -> Result<(), TransportError> {
        info!("listening at {}", self.local_addr()?);

        for (id, stream) in self.listener.incoming().enumerate() {
            let id = id + 1;
            match stream {
                Ok(stream) => {
                    let engine = Arc::clone(&self.engine);
                    let spawned = thread::Builder::new()
                        .name(format!("sortnet-conn-{id}"))
                        .spawn(move || {
                            if let Err(e) = handle_connection(stream, id, &engine) {
                                error!("connection #{id} failed: {e}");
                            }
                        });
                    if let Err(e) = spawned {
                        error!("failed to spawn handler for connection #{id}: {e}");
                    }
                }
                Err(e) => warn!("broken connection: {e:?}"),
            }
        }
        Ok(())
    }
}

fn handle_connection(
    stream: TcpStream,
    id: usize,
    engine: &SortEngine,
) -> Result<(), TransportError> {
    stream.set_nodelay(true)?;
    info!("connection #{id} accepted from {}", stream.peer_addr()?);
    let mut transport = ProtocolTransport::new(stream);
    let mut requests = 0usize;

    loop {
        let message = match transport.read_message() {
            Ok(message) => message,
            Err(TransportError::Closed) => {
                warn!("connection #{id} closed without terminate");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match message {
            Message::Request(segment) => {
                requests += 1;
                info!(
                    "connection #{id}: request #{requests} received ({} elements)",
                    segment.len()
                );

                let started = Instant::now();
                let sorted = engine.sort(&segment);
                transport.write_message(&Message::Response(sorted))?;

                info!(
                    "connection #{id}: request #{requests} answered in {:?}",
                    started.elapsed()
                );
            }
            Message::Terminate => {
                info!("connection #{id} terminated after {requests} requests");
                return Ok(());
            }
            other => warn!(
                "connection #{id}: ignoring unexpected {:?} message",
                other.kind()
            ),
        }
    }
}
