//! Typed messages between neighbouring ranks. Every payload crossing a slab
//! boundary is a self-describing record encoded with MessagePack, so a
//! receiver can match on kind and sender instead of relying on a fragile
//! stream-of-doubles ordering; anything that arrives early is parked until
//! a matching receive is posted. The length-prefixed framing used by
//! byte-stream transports lives here as well.

use std::io::{self, Read, Write};

use serde::{Deserialize, Serialize};

use crate::grid::uid;
use crate::message::comm::Communicator;

/// Write one message frame: the payload length as a little-endian u64,
/// then the payload.
pub fn write_frame<W: Write>(stream: &mut W, message: &[u8]) -> io::Result<()> {
    stream.write_all(&(message.len() as u64).to_le_bytes())?;
    stream.write_all(message)
}

/// Read one message frame written by `write_frame`. A stream ending mid-
/// frame is an error, not a short read.
pub fn read_frame<R: Read>(stream: &mut R) -> io::Result<Vec<u8>> {
    let mut header = [0u8; 8];
    stream.read_exact(&mut header)?;
    let mut payload = vec![0u8; u64::from_le_bytes(header) as usize];
    stream.read_exact(&mut payload)?;
    Ok(payload)
}

/// Column-density state of one boundary ghost cell.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ColumnRecord {
    pub col_den: f64,
    pub dcol_den: f64,
}

/// The payload kinds exchanged between ranks.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Payload {
    /// Column densities for the receiver's boundary ghost cells, in the
    /// iteration order of the matching partition set.
    Thermo(Vec<ColumnRecord>),

    /// Primitive state for the receiver's boundary ghost cells.
    Hydro(Vec<[f64; uid::N]>),

    /// A candidate time step, used by the global reduction.
    TimeStep(f64),
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    from: usize,
    payload: Payload,
}




/**
 * Per-rank mailbox for typed neighbour exchange. Sends are fire-and-forget
 * through the transport; receives block until a payload of the requested
 * kind arrives from the requested rank, parking any other traffic.
 */
pub struct PartitionManager {
    rank: usize,
    pending: Vec<Envelope>,
}




// ============================================================================
impl PartitionManager {

    pub fn new(rank: usize) -> Self {
        Self {
            rank,
            pending: Vec::new(),
        }
    }

    pub fn send(&self, client: &dyn Communicator, dest: usize, payload: Payload) {
        let envelope = Envelope {
            from: self.rank,
            payload,
        };
        let bytes = rmp_serde::to_vec(&envelope).expect("payload serialization failed");
        client.send(dest, bytes);
    }

    fn recv_matching<F, T>(&mut self, client: &dyn Communicator, source: usize, matcher: F) -> T
    where
        F: Fn(&Payload) -> bool,
        T: FromPayload,
    {
        if let Some(i) = self
            .pending
            .iter()
            .position(|e| e.from == source && matcher(&e.payload))
        {
            return T::from_payload(self.pending.remove(i).payload);
        }
        loop {
            let bytes = client.recv();
            let envelope: Envelope =
                rmp_serde::from_slice(&bytes).expect("payload deserialization failed");
            if envelope.from == source && matcher(&envelope.payload) {
                return T::from_payload(envelope.payload);
            }
            self.pending.push(envelope);
        }
    }

    pub fn recv_thermo(&mut self, client: &dyn Communicator, source: usize) -> Vec<ColumnRecord> {
        self.recv_matching(client, source, |p| matches!(p, Payload::Thermo(_)))
    }

    pub fn recv_hydro(&mut self, client: &dyn Communicator, source: usize) -> Vec<[f64; uid::N]> {
        self.recv_matching(client, source, |p| matches!(p, Payload::Hydro(_)))
    }

    fn recv_time_step(&mut self, client: &dyn Communicator, source: usize) -> f64 {
        self.recv_matching(client, source, |p| matches!(p, Payload::TimeStep(_)))
    }

    /// Global minimum over all ranks, by a binomial-tree reduce to rank 0
    /// followed by a binomial-tree broadcast back out.
    pub fn all_reduce_min(&mut self, client: &dyn Communicator, value: f64) -> f64 {
        let r = client.rank();
        let p = client.size();
        let levels = tree_levels(p);

        let mut value = value;
        for level in 0..levels {
            let one = 1 << level;
            let two = 1 << (level + 1);
            if r % two == 0 {
                if r + one < p {
                    value = value.min(self.recv_time_step(client, r + one));
                }
            } else {
                self.send(client, r - one, Payload::TimeStep(value));
                break;
            }
        }
        for level in (0..levels).rev() {
            let one = 1 << level;
            let two = 1 << (level + 1);
            if r % two == 0 {
                if r + one < p {
                    self.send(client, r + one, Payload::TimeStep(value));
                }
            } else if r % two == one && level == trailing_level(r) {
                value = self.recv_time_step(client, r - one);
            }
        }
        value
    }
}

/// A non-root rank receives its broadcast value exactly once, at the level
/// of its lowest set bit.
fn trailing_level(rank: usize) -> usize {
    rank.trailing_zeros() as usize
}

/// Number of binomial-tree levels needed to span `count` ranks.
fn tree_levels(count: usize) -> usize {
    (usize::BITS - (count - 1).leading_zeros()) as usize
}

trait FromPayload {
    fn from_payload(payload: Payload) -> Self;
}

impl FromPayload for Vec<ColumnRecord> {
    fn from_payload(payload: Payload) -> Self {
        match payload {
            Payload::Thermo(records) => records,
            _ => unreachable!(),
        }
    }
}

impl FromPayload for Vec<[f64; uid::N]> {
    fn from_payload(payload: Payload) -> Self {
        match payload {
            Payload::Hydro(records) => records,
            _ => unreachable!(),
        }
    }
}

impl FromPayload for f64 {
    fn from_payload(payload: Payload) -> Self {
        match payload {
            Payload::TimeStep(dt) => dt,
            _ => unreachable!(),
        }
    }
}




// ============================================================================
#[cfg(test)]
mod test {
    use super::*;
    use crate::message::channel::ChannelCommunicator;

    #[test]
    fn frames_round_trip_through_a_byte_stream() {
        let mut buffer = Vec::new();
        write_frame(&mut buffer, b"colden").unwrap();
        write_frame(&mut buffer, b"").unwrap();

        let mut cursor = std::io::Cursor::new(buffer);
        assert_eq!(read_frame(&mut cursor).unwrap(), b"colden");
        assert_eq!(read_frame(&mut cursor).unwrap(), b"");
        // A drained stream is an error, not an empty frame.
        assert!(read_frame(&mut cursor).is_err());
    }

    #[test]
    fn typed_records_cross_intact() {
        let mut bus = ChannelCommunicator::bus(2);
        let b = bus.pop().unwrap();
        let a = bus.pop().unwrap();

        let pm_a = PartitionManager::new(0);
        let mut pm_b = PartitionManager::new(1);

        // A payload of a different kind arriving first must be parked.
        pm_a.send(&a, 1, Payload::TimeStep(9.0));
        pm_a.send(
            &a,
            1,
            Payload::Thermo(vec![ColumnRecord {
                col_den: 1.5,
                dcol_den: 0.25,
            }]),
        );
        drop(a);

        let records = pm_b.recv_thermo(&b, 0);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].col_den, 1.5);
        assert_eq!(records[0].dcol_den, 0.25);
    }

    #[test]
    fn all_reduce_min_agrees_on_every_rank() {
        for num_ranks in 1..=5 {
            let bus = ChannelCommunicator::bus(num_ranks);
            let handles: Vec<_> = bus
                .into_iter()
                .enumerate()
                .map(|(rank, client)| {
                    std::thread::spawn(move || {
                        let mut pm = PartitionManager::new(rank);
                        pm.all_reduce_min(&client, 10.0 + rank as f64)
                    })
                })
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), 10.0);
            }
        }
    }

    #[test]
    fn all_reduce_min_finds_an_interior_minimum() {
        let bus = ChannelCommunicator::bus(3);
        let values = [5.0, 1.25, 7.0];
        let handles: Vec<_> = bus
            .into_iter()
            .enumerate()
            .map(|(rank, client)| {
                std::thread::spawn(move || {
                    let mut pm = PartitionManager::new(rank);
                    pm.all_reduce_min(&client, values[rank])
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 1.25);
        }
    }
}
