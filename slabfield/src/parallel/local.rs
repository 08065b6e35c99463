//! Thread-backed communicator, one thread per rank.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::trace;

use crate::traits::parallel::{Communicator, Element, Incoming, Outgoing, Reducible};

const TAG_BARRIER: i32 = -1;
const TAG_REDUCE_GATHER: i32 = -2;
const TAG_REDUCE_SCATTER: i32 = -3;
const TAG_BROADCAST: i32 = -4;

/// Interval at which a blocked receive checks whether a peer has aborted.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

struct Envelope {
    context: u64,
    source: i32,
    tag: i32,
    payload: Vec<u8>,
}

struct Inbox {
    receiver: Receiver<Envelope>,
    pending: VecDeque<Envelope>,
}

/// A group of ranks living in one process, exchanging messages over channels.
///
/// Sends are buffered and never block. Each handle carries a context, so messages sent on a
/// [`Communicator::duplicate`] are never matched by receives on the parent.
pub struct LocalCommunicator {
    rank: i32,
    context: u64,
    duplicates: AtomicU64,
    mailboxes: Arc<Vec<Sender<Envelope>>>,
    inbox: Arc<Mutex<Inbox>>,
    aborted: Arc<AtomicBool>,
}

impl LocalCommunicator {
    /// Create the handles of a group of `size` ranks, indexed by rank.
    pub fn group(size: usize) -> Vec<LocalCommunicator> {
        assert!(size > 0, "a communicator needs at least one rank");

        let (senders, receivers): (Vec<_>, Vec<_>) = (0..size).map(|_| channel()).unzip();
        let mailboxes = Arc::new(senders);
        let aborted = Arc::new(AtomicBool::new(false));

        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, receiver)| LocalCommunicator {
                rank: rank as i32,
                context: 0,
                duplicates: AtomicU64::new(0),
                mailboxes: Arc::clone(&mailboxes),
                inbox: Arc::new(Mutex::new(Inbox {
                    receiver,
                    pending: VecDeque::new(),
                })),
                aborted: Arc::clone(&aborted),
            })
            .collect()
    }

    /// A communicator containing only the calling thread.
    pub fn solo() -> LocalCommunicator {
        let mut group = LocalCommunicator::group(1);
        group.remove(0)
    }

    fn post(&self, dest: i32, tag: i32, payload: Vec<u8>) {
        let envelope = Envelope {
            context: self.context,
            source: self.rank,
            tag,
            payload,
        };
        // A closed mailbox means the destination thread has already finished or panicked.
        if self.mailboxes[dest as usize].send(envelope).is_err() {
            self.aborted.store(true, Ordering::SeqCst);
            panic!("rank {} has shut down, cannot deliver message", dest);
        }
    }

    fn take(&self, source: i32, tag: i32) -> Vec<u8> {
        let mut inbox = self.inbox.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let matches = |e: &Envelope| e.context == self.context && e.source == source && e.tag == tag;

        if let Some(position) = inbox.pending.iter().position(matches) {
            if let Some(envelope) = inbox.pending.remove(position) {
                return envelope.payload;
            }
        }

        loop {
            let received = inbox.receiver.recv_timeout(POLL_INTERVAL);
            match received {
                Ok(envelope) if matches(&envelope) => return envelope.payload,
                Ok(envelope) => inbox.pending.push_back(envelope),
                Err(RecvTimeoutError::Timeout) => {
                    if self.aborted.load(Ordering::SeqCst) {
                        panic!("rank {}: peer rank aborted", self.rank);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    panic!("rank {}: communicator disconnected", self.rank)
                }
            }
        }
    }

    fn check_rank(&self, other: i32) {
        assert!(
            other >= 0 && other < self.size(),
            "rank {} out of range for communicator of size {}",
            other,
            self.size()
        );
    }
}

fn unpack<T: Element>(payload: &[u8], buf: &mut [T]) {
    let bytes: &mut [u8] = bytemuck::cast_slice_mut(buf);
    assert_eq!(
        bytes.len(),
        payload.len(),
        "message length does not match the receive buffer"
    );
    bytes.copy_from_slice(payload);
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> i32 {
        self.rank
    }

    fn size(&self) -> i32 {
        self.mailboxes.len() as i32
    }

    fn duplicate(&self) -> Self {
        // Collective, so every rank derives the same child context.
        let index = self.duplicates.fetch_add(1, Ordering::SeqCst) + 1;
        let context = self
            .context
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(index);
        trace!("rank {}: duplicate context {} -> {}", self.rank, self.context, context);

        LocalCommunicator {
            rank: self.rank,
            context,
            duplicates: AtomicU64::new(0),
            mailboxes: Arc::clone(&self.mailboxes),
            inbox: Arc::clone(&self.inbox),
            aborted: Arc::clone(&self.aborted),
        }
    }

    fn is_congruent(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.mailboxes, &other.mailboxes) && self.rank == other.rank
    }

    fn barrier(&self) {
        if self.rank == 0 {
            for source in 1..self.size() {
                self.take(source, TAG_BARRIER);
            }
            for dest in 1..self.size() {
                self.post(dest, TAG_BARRIER, Vec::new());
            }
        } else {
            self.post(0, TAG_BARRIER, Vec::new());
            self.take(0, TAG_BARRIER);
        }
    }

    fn all_reduce_sum<T: Reducible>(&self, send: &[T], recv: &mut [T]) {
        assert_eq!(send.len(), recv.len(), "reduction buffers differ in length");

        if self.rank == 0 {
            recv.copy_from_slice(send);
            let mut contribution = vec![T::default(); send.len()];
            // Fixed summation order, so results are reproducible between runs.
            for source in 1..self.size() {
                let payload = self.take(source, TAG_REDUCE_GATHER);
                unpack(&payload, &mut contribution);
                recv.iter_mut()
                    .zip(contribution.iter())
                    .for_each(|(r, &c)| *r = *r + c);
            }
            let result = bytemuck::cast_slice::<T, u8>(recv).to_vec();
            for dest in 1..self.size() {
                self.post(dest, TAG_REDUCE_SCATTER, result.clone());
            }
        } else {
            self.post(0, TAG_REDUCE_GATHER, bytemuck::cast_slice(send).to_vec());
            let payload = self.take(0, TAG_REDUCE_SCATTER);
            unpack(&payload, recv);
        }
    }

    fn broadcast_into<T: Element>(&self, root: i32, buf: &mut [T]) {
        self.check_rank(root);
        if self.rank == root {
            let payload = bytemuck::cast_slice::<T, u8>(buf).to_vec();
            for dest in (0..self.size()).filter(|&r| r != root) {
                self.post(dest, TAG_BROADCAST, payload.clone());
            }
        } else {
            let payload = self.take(root, TAG_BROADCAST);
            unpack(&payload, buf);
        }
    }

    fn send<T: Element>(&self, dest: i32, tag: i32, buf: &[T]) {
        assert!(tag >= 0, "negative tags are reserved");
        self.check_rank(dest);
        self.post(dest, tag, bytemuck::cast_slice(buf).to_vec());
    }

    fn receive_into<T: Element>(&self, source: i32, tag: i32, buf: &mut [T]) {
        assert!(tag >= 0, "negative tags are reserved");
        self.check_rank(source);
        let payload = self.take(source, tag);
        unpack(&payload, buf);
    }

    fn exchange<T: Element>(&self, sends: &[Outgoing<'_, T>], receives: &mut [Incoming<'_, T>]) {
        for message in sends {
            self.send(message.dest, message.tag, message.data);
        }
        for message in receives.iter_mut() {
            self.receive_into(message.source, message.tag, message.data);
        }
    }
}

struct AbortOnPanic(Arc<AtomicBool>);

impl Drop for AbortOnPanic {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.store(true, Ordering::SeqCst);
        }
    }
}

/// Run `f` once per rank of a fresh `nranks` group, each on its own thread.
///
/// Returns the per-rank results in rank order. A panic on any rank aborts the receives still
/// blocked on the other ranks, and is then propagated to the caller.
pub fn run_spmd<F, R>(nranks: usize, f: F) -> Vec<R>
where
    F: Fn(LocalCommunicator) -> R + Sync,
    R: Send,
{
    let comms = LocalCommunicator::group(nranks);
    let f = &f;

    std::thread::scope(|s| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                let guard = AbortOnPanic(Arc::clone(&comm.aborted));
                s.spawn(move || {
                    let _guard = guard;
                    f(comm)
                })
            })
            .collect();

        let mut results = Vec::with_capacity(nranks);
        let mut failure = None;
        for handle in handles {
            match handle.join() {
                Ok(result) => results.push(result),
                Err(payload) => {
                    failure.get_or_insert(payload);
                }
            }
        }

        if let Some(payload) = failure {
            std::panic::resume_unwind(payload);
        }
        results
    })
}
