use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use log::warn;

use super::backoff::ExponentialBackoff;
use super::comm::Communicator;
use crate::partition;

/**
 * A communicator connecting one process per rank over plain TCP. Each
 * message is sent on its own connection as a length-prefixed frame.
 * Sends are handed to a background thread through a channel so they never
 * block the compute loop.
 */
pub struct TcpCommunicator {
    rank: usize,
    num_peers: usize,
    listener: TcpListener,
    send_sink: Option<crossbeam_channel::Sender<(usize, Vec<u8>)>>,
    send_thread: Option<thread::JoinHandle<()>>,
}




// ============================================================================
impl TcpCommunicator {
    pub fn new(rank: usize, peers: Vec<SocketAddr>) -> Self {
        let listener = TcpListener::bind(peers[rank]).unwrap();
        let num_peers = peers.len();
        let (send_sink, send_source) = crossbeam_channel::unbounded::<(usize, Vec<u8>)>();
        let send_thread = thread::spawn(move || {
            for (rank, message) in send_source {
                let mut stream = connect_with_retry(peers[rank]);
                partition::write_frame(&mut stream, &message).expect("peer connection lost");
            }
        });
        Self {
            rank,
            num_peers,
            listener,
            send_sink: Some(send_sink),
            send_thread: Some(send_thread),
        }
    }
}

/// Peers come up in no particular order, so the first messages of a run may
/// race the remote listener. Retry for a while before giving up.
fn connect_with_retry(peer: SocketAddr) -> TcpStream {
    let backoff = ExponentialBackoff::new(
        Duration::from_millis(10),
        Duration::from_secs(1),
        2,
        Some(30),
    );
    for delay in backoff {
        match TcpStream::connect(peer) {
            Ok(stream) => return stream,
            Err(error) => {
                warn!("connect to {} failed ({}), retrying", peer, error);
                thread::sleep(delay);
            }
        }
    }
    panic!("could not connect to peer {}", peer);
}




// ============================================================================
impl Communicator for TcpCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.num_peers
    }

    fn send(&self, rank: usize, message: Vec<u8>) {
        self.send_sink
            .as_ref()
            .unwrap()
            .send((rank, message))
            .unwrap()
    }

    fn recv(&self) -> Vec<u8> {
        let (mut stream, _) = self.listener.accept().unwrap();
        partition::read_frame(&mut stream).expect("malformed message frame")
    }
}

impl Drop for TcpCommunicator {
    fn drop(&mut self) {
        self.send_sink.take().unwrap();
        self.send_thread.take().unwrap().join().unwrap();
    }
}
