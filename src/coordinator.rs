//! Distributed sort coordinator.
//!
//! The coordinator splits the input into one contiguous slice per worker,
//! ships every slice concurrently over that worker's [`Connection`], waits
//! for all sorted slices, and merge-reduces them with the local
//! [`SortEngine`]. A run either produces the complete sorted sequence or
//! fails as a whole; partial results are never returned.
//!
//! Connections are opened once, before any dispatch, and every configured
//! worker must be reachable. Whatever the outcome, [`sort_distributed`]
//! terminates and closes every connection before returning.
use std::{
    fmt,
    net::SocketAddr,
    thread,
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    config::Config,
    engine::{EngineError, SortEngine},
    protocol::{Connection, TransportError},
    sequence::{self, Element},
};

/// A worker that failed during dispatch or cleanup.
#[derive(Debug)]
pub struct WorkerFailure {
    pub index: usize,
    pub address: SocketAddr,
    pub error: TransportError,
}

impl fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker {} ({}): {}", self.index, self.address, self.error)
    }
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("worker {address} unreachable: {source}")]
    Connectivity {
        address: SocketAddr,
        source: TransportError,
    },

    #[error("{} of {total} workers failed: {}", .failures.len(), summarize(.failures))]
    Dispatch {
        total: usize,
        failures: Vec<WorkerFailure>,
    },

    #[error("dispatch to worker {0} was interrupted")]
    Interrupted(usize),

    #[error("failed to close {} connections: {}", .failures.len(), summarize(.failures))]
    Cleanup { failures: Vec<WorkerFailure> },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

fn summarize(failures: &[WorkerFailure]) -> String {
    failures
        .iter()
        .map(WorkerFailure::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result handed back to the caller of [`sort_distributed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortReport {
    pub sorted: Vec<Element>,
    pub elapsed: Duration,
    pub verified: bool,
}

/// Split `sequence` into `parts` contiguous slices of `len / parts`
/// elements; the last slice also takes the remaining `len % parts`.
pub fn partition(sequence: &[Element], parts: usize) -> Vec<&[Element]> {
    if parts == 0 {
        return Vec::new();
    }

    let base = sequence.len() / parts;
    (0..parts)
        .map(|i| {
            let start = i * base;
            let end = if i + 1 == parts {
                sequence.len()
            } else {
                start + base
            };
            &sequence[start..end]
        })
        .collect()
}

pub struct Coordinator {
    workers: Vec<Connection>,
    engine: SortEngine,
}

impl Coordinator {
    /// Connect to every worker in `addresses`. If any worker is unreachable
    /// the connections opened so far are torn down and nothing is sent.
    pub fn connect(addresses: &[SocketAddr], config: &Config) -> Result<Self, CoordinatorError> {
        if addresses.is_empty() {
            return Err(CoordinatorError::Configuration(
                "at least one worker address is required".to_string(),
            ));
        }

        let engine = SortEngine::new(config)?;
        let mut workers = Vec::with_capacity(addresses.len());
        for &address in addresses {
            match Connection::open(address) {
                Ok(connection) => workers.push(connection),
                Err(source) => {
                    let partial = Self { workers, engine };
                    if let Err(e) = partial.shutdown() {
                        warn!("{e}");
                    }
                    return Err(CoordinatorError::Connectivity { address, source });
                }
            }
        }

        info!("connected to {} workers", workers.len());
        Ok(Self { workers, engine })
    }

    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Sort `sequence` across all workers.
    pub fn sort(&self, sequence: &[Element]) -> Result<Vec<Element>, CoordinatorError> {
        if sequence.is_empty() {
            return Ok(Vec::new());
        }

        let slices = partition(sequence, self.workers.len());
        let sorted = self.dispatch(&slices)?;
        debug!("all {} slices sorted, merging", sorted.len());
        Ok(self.engine.merge_reduce(sorted))
    }

    /// Send one slice per worker concurrently and wait for every response.
    fn dispatch(&self, slices: &[&[Element]]) -> Result<Vec<Vec<Element>>, CoordinatorError> {
        let results: Vec<thread::Result<Result<Vec<Element>, TransportError>>> =
            thread::scope(|scope| {
                let handles: Vec<_> = self
                    .workers
                    .iter()
                    .zip(slices)
                    .enumerate()
                    .map(|(index, (connection, &slice))| {
                        debug!(
                            "dispatching {} elements to worker {index} ({})",
                            slice.len(),
                            connection.address()
                        );
                        scope.spawn(move || connection.send(slice))
                    })
                    .collect();

                handles.into_iter().map(|handle| handle.join()).collect()
            });

        let mut sorted = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        let mut interrupted = None;
        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(Ok(segment)) => sorted.push(segment),
                Ok(Err(error)) => failures.push(WorkerFailure {
                    index,
                    address: self.workers[index].address(),
                    error,
                }),
                Err(_) => {
                    interrupted.get_or_insert(index);
                }
            }
        }

        if let Some(index) = interrupted {
            return Err(CoordinatorError::Interrupted(index));
        }
        if !failures.is_empty() {
            return Err(CoordinatorError::Dispatch {
                total: self.workers.len(),
                failures,
            });
        }
        Ok(sorted)
    }

    /// Send terminate to and close every connection. All connections are
    /// attempted; failures are collected into one error.
    pub fn shutdown(self) -> Result<(), CoordinatorError> {
        let mut failures = Vec::new();
        for (index, connection) in self.workers.into_iter().enumerate() {
            let address = connection.address();
            let closed = connection
                .send_terminate()
                .and_then(|_| connection.close());
            if let Err(error) = closed {
                warn!("failed to close connection to worker {index} ({address}): {error}");
                failures.push(WorkerFailure {
                    index,
                    address,
                    error,
                });
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CoordinatorError::Cleanup { failures })
        }
    }
}

/// Connect to `addresses`, sort `sequence` across them, and always tear the
/// connections down afterwards. Cleanup failures are logged and do not
/// override the outcome of the sort.
pub fn sort_distributed(
    sequence: &[Element],
    addresses: &[SocketAddr],
    config: &Config,
) -> Result<SortReport, CoordinatorError> {
    let coordinator = Coordinator::connect(addresses, config)?;

    info!(
        "sorting {} elements across {} workers",
        sequence.len(),
        coordinator.workers()
    );
    let started = Instant::now();
    let result = coordinator.sort(sequence);
    let elapsed = started.elapsed();

    if let Err(e) = coordinator.shutdown() {
        warn!("{e}");
    }

    let sorted = result?;
    let verified = sequence::verify(&sorted);
    Ok(SortReport {
        sorted,
        elapsed,
        verified,
    })
}

#[cfg(test)]
mod tests {
    use std::{
        net::TcpListener,
        num::NonZeroUsize,
        sync::mpsc::{self, Receiver},
    };

    use rstest::*;

    use super::*;
    use crate::{
        engine::sequential_sort,
        protocol::{Message, MessageKind, ProtocolTransport, WorkerServer},
        sequence::generate,
    };

    fn config() -> Config {
        Config::new(NonZeroUsize::new(2).unwrap(), 32)
    }

    fn spawn_worker() -> SocketAddr {
        let server = WorkerServer::bind("127.0.0.1:0".parse().unwrap(), &config()).unwrap();
        let address = server.local_addr().unwrap();

        thread::spawn(move || server.listen());
        address
    }

    fn unreachable_address() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    /// Worker stand-in that records the kind of every message it receives
    /// and answers requests with `reply`.
    fn recording_worker<F>(reply: F) -> (SocketAddr, Receiver<MessageKind>)
    where
        F: Fn(Vec<Element>) -> Option<Message> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut transport = ProtocolTransport::new(stream);
            while let Ok(message) = transport.read_message() {
                tx.send(message.kind()).unwrap();
                match message {
                    Message::Request(segment) => match reply(segment) {
                        Some(response) => transport.write_message(&response).unwrap(),
                        None => return,
                    },
                    _ => return,
                }
            }
        });
        (address, rx)
    }

    /// Worker stand-in that answers a single request and then drops the
    /// connection. Signals once the socket is closed.
    fn answer_then_close() -> (SocketAddr, Receiver<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut transport = ProtocolTransport::new(stream);
            if let Ok(Message::Request(mut segment)) = transport.read_message() {
                segment.sort();
                transport.write_message(&Message::Response(segment)).unwrap();
            }
            drop(transport);
            tx.send(()).unwrap();
        });
        (address, rx)
    }

    #[rstest]
    #[case(10, 1)]
    #[case(10, 2)]
    #[case(10, 3)]
    #[case(3, 5)]
    #[case(0, 4)]
    #[case(1001, 7)]
    fn partition_covers_sequence(#[case] len: usize, #[case] parts: usize) {
        let sequence = generate(len, Some(1));
        let slices = partition(&sequence, parts);

        assert_eq!(slices.len(), parts);
        assert_eq!(slices.concat(), sequence);

        let base = len / parts;
        for slice in &slices[..parts - 1] {
            assert_eq!(slice.len(), base);
        }
        assert_eq!(slices[parts - 1].len(), base + len % parts);
    }

    #[test]
    fn partition_example() {
        let sequence = [5, 3, 3, 1, 4, 1, 5, 9, 2, 6];
        let slices = partition(&sequence, 2);

        let expected: Vec<&[Element]> = vec![&[5, 3, 3, 1, 4], &[1, 5, 9, 2, 6]];
        assert_eq!(slices, expected);
    }

    #[test]
    fn sort_across_two_workers() {
        let workers = [spawn_worker(), spawn_worker()];
        let sequence = [5, 3, 3, 1, 4, 1, 5, 9, 2, 6];

        let report = sort_distributed(&sequence, &workers, &config()).unwrap();

        assert_eq!(report.sorted, vec![1, 1, 2, 3, 3, 4, 5, 5, 6, 9]);
        assert!(report.verified);
    }

    #[rstest]
    #[case(1, 5000)]
    #[case(3, 12)]
    #[case(3, 20_001)]
    #[case(4, 3)]
    fn sort_is_sorted_permutation(#[case] workers: usize, #[case] len: usize) {
        let addresses: Vec<SocketAddr> = (0..workers).map(|_| spawn_worker()).collect();
        let sequence = generate(len, Some(len as u64));

        let report = sort_distributed(&sequence, &addresses, &config()).unwrap();

        let mut expected = sequence.clone();
        expected.sort();
        assert_eq!(report.sorted, expected);
        assert!(report.verified);
    }

    #[test]
    fn single_worker_matches_sequential_sort() {
        let sequence = generate(2500, Some(9));

        let report = sort_distributed(&sequence, &[spawn_worker()], &config()).unwrap();

        assert_eq!(report.sorted, sequential_sort(&sequence));
    }

    #[test]
    fn single_element_unchanged() {
        let workers = [spawn_worker(), spawn_worker()];

        let report = sort_distributed(&[-7], &workers, &config()).unwrap();

        assert_eq!(report.sorted, vec![-7]);
    }

    #[test]
    fn empty_input_dispatches_nothing() {
        let (address, kinds) = recording_worker(|segment| Some(Message::Response(segment)));

        let report = sort_distributed(&[], &[address], &config()).unwrap();

        assert!(report.sorted.is_empty());
        assert_eq!(kinds.recv().unwrap(), MessageKind::Terminate);
        assert!(kinds.recv().is_err());
    }

    #[test]
    fn no_workers_is_configuration_error() {
        let err = sort_distributed(&[1, 2], &[], &config()).unwrap_err();

        assert!(matches!(err, CoordinatorError::Configuration(_)));
    }

    #[test]
    fn unreachable_worker_fails_before_dispatch() {
        let (reachable, kinds) = recording_worker(|segment| Some(Message::Response(segment)));
        let missing = unreachable_address();

        let err = sort_distributed(&[3, 2, 1], &[reachable, missing], &config()).unwrap_err();

        match err {
            CoordinatorError::Connectivity { address, source } => {
                assert_eq!(address, missing);
                assert!(source.is_connectivity());
            }
            other => panic!("unexpected error: {other}"),
        }
        // The reachable worker only ever sees the terminate.
        assert_eq!(kinds.recv().unwrap(), MessageKind::Terminate);
        assert!(kinds.recv().is_err());
    }

    #[test]
    fn failed_worker_fails_whole_run() {
        let healthy = spawn_worker();
        let (failing, kinds) = recording_worker(|_| None);

        let err = sort_distributed(&generate(100, Some(4)), &[healthy, failing], &config())
            .unwrap_err();

        match err {
            CoordinatorError::Dispatch { total, failures } => {
                assert_eq!(total, 2);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].index, 1);
                assert_eq!(failures[0].address, failing);
                assert!(failures[0].error.is_connectivity());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(kinds.recv().unwrap(), MessageKind::Request);
    }

    #[test]
    fn dispatch_error_lists_failed_workers() {
        let error = CoordinatorError::Dispatch {
            total: 3,
            failures: vec![WorkerFailure {
                index: 2,
                address: "127.0.0.1:4000".parse().unwrap(),
                error: TransportError::Closed,
            }],
        };

        assert_eq!(
            error.to_string(),
            "1 of 3 workers failed: worker 2 (127.0.0.1:4000): connection closed by peer"
        );
    }

    #[test]
    fn coordinator_reuses_connections() {
        let workers = [spawn_worker(), spawn_worker(), spawn_worker()];
        let coordinator = Coordinator::connect(&workers, &config()).unwrap();

        assert_eq!(coordinator.workers(), 3);
        for seed in 0..3 {
            let sequence = generate(300, Some(seed));
            let mut expected = sequence.clone();
            expected.sort();
            assert_eq!(coordinator.sort(&sequence).unwrap(), expected);
        }

        coordinator.shutdown().unwrap();
    }

    #[test]
    fn worker_closing_after_answer_keeps_result() {
        let (address, _closed) = answer_then_close();
        let sequence = generate(250, Some(9));
        let mut expected = sequence.clone();
        expected.sort();

        let report = sort_distributed(&sequence, &[address], &config()).unwrap();

        assert_eq!(report.sorted, expected);
        assert!(report.verified);
    }

    #[test]
    fn shutdown_reports_closed_worker() {
        let (address, closed) = answer_then_close();
        let coordinator = Coordinator::connect(&[address], &config()).unwrap();

        let sorted = coordinator.sort(&[4, -2, 7, 0]).unwrap();
        assert_eq!(sorted, vec![-2, 0, 4, 7]);
        closed.recv().unwrap();

        match coordinator.shutdown().unwrap_err() {
            CoordinatorError::Cleanup { failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].index, 0);
                assert_eq!(failures[0].address, address);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
