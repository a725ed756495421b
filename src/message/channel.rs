use crossbeam_channel::{Receiver, Sender};

use super::comm::Communicator;

/**
 * A communicator connecting ranks living in the same process, backed by
 * unbounded channels. Useful for single-rank runs (a bus of one) and for
 * exercising multi-rank logic on threads, without any sockets.
 */
pub struct ChannelCommunicator {
    rank: usize,
    peers: Vec<Sender<Vec<u8>>>,
    inbox: Receiver<Vec<u8>>,
}




// ============================================================================
impl ChannelCommunicator {

    /// Create a fully-connected bus of `num_peers` communicators. Each one
    /// may be moved to its own thread.
    pub fn bus(num_peers: usize) -> Vec<Self> {
        let mut senders = Vec::with_capacity(num_peers);
        let mut inboxes = Vec::with_capacity(num_peers);
        for _ in 0..num_peers {
            let (s, r) = crossbeam_channel::unbounded();
            senders.push(s);
            inboxes.push(r);
        }
        inboxes
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| Self {
                rank,
                peers: senders.clone(),
                inbox,
            })
            .collect()
    }
}




// ============================================================================
impl Communicator for ChannelCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn send(&self, rank: usize, message: Vec<u8>) {
        self.peers[rank].send(message).unwrap()
    }

    fn recv(&self) -> Vec<u8> {
        self.inbox.recv().unwrap()
    }
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn messages_cross_the_bus() {
        let mut bus = ChannelCommunicator::bus(2);
        let b = bus.pop().unwrap();
        let a = bus.pop().unwrap();
        a.send(1, vec![1, 2, 3]);
        assert_eq!(b.recv(), vec![1, 2, 3]);
        assert_eq!(a.rank(), 0);
        assert_eq!(b.size(), 2);
    }
}
