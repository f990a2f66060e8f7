//! Thin façade over intra-process or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices* (no zero-copy guarantees).
//! Point-to-point handles are non-blocking; callers `.wait()` before they
//! trust a buffer. The reductions and the gather are collectives: every rank
//! must call them in the same order and the same number of times.

use crate::algs::wire::WireLen;
use crate::domain_error::DomainError;
use bytes::Bytes;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Typed message tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }
    pub const fn as_u16(self) -> u16 {
        self.0
    }
    /// Tag `by` slots after this one.
    pub const fn offset(self, by: u16) -> Self {
        Self(self.0.wrapping_add(by))
    }
}

/// Tags reserved for the built-in collectives.
pub const REDUCE_TAG: CommTag = CommTag(0xFF00);
pub const BROADCAST_TAG: CommTag = CommTag(0xFF01);
pub const GATHER_SIZE_TAG: CommTag = CommTag(0xFF02);
pub const GATHER_DATA_TAG: CommTag = CommTag(0xFF03);

/// Non-blocking communication interface.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive expecting `buf.len()` bytes. [`Wait::wait`] returns
    /// the message as sent; callers check its length.
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;

    /// Logical OR over all ranks.
    fn all_reduce_or(&self, local: bool) -> Result<bool, DomainError> {
        Ok(self.all_reduce_u64(u64::from(local), |a, b| a | b)? != 0)
    }

    /// Sum over all ranks.
    fn all_reduce_sum(&self, local: u64) -> Result<u64, DomainError> {
        self.all_reduce_u64(local, u64::wrapping_add)
    }

    /// Fold `op` over every rank's value (in rank order) and share the result.
    fn all_reduce_u64(&self, local: u64, op: fn(u64, u64) -> u64) -> Result<u64, DomainError> {
        reduce_via_root(self, local, op)
    }

    /// Collect every rank's bytes on `root`, indexed by rank. Non-root ranks
    /// get `None`.
    fn gather_bytes(&self, root: usize, local: &[u8]) -> Result<Option<Vec<Vec<u8>>>, DomainError> {
        gather_via_root(self, root, local)
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

fn decode_u64(peer: usize, raw: &[u8]) -> Result<u64, DomainError> {
    let bytes: [u8; 8] = raw.try_into().map_err(|_| DomainError::BufferSizeMismatch {
        neighbor: peer,
        expected: 8,
        got: raw.len(),
    })?;
    Ok(u64::from_le_bytes(bytes))
}

fn reduce_via_root<C: Communicator + ?Sized>(
    comm: &C,
    local: u64,
    op: fn(u64, u64) -> u64,
) -> Result<u64, DomainError> {
    let size = comm.size();
    if size == 1 {
        return Ok(local);
    }
    if comm.rank() == 0 {
        let mut acc = local;
        for peer in 1..size {
            let mut buf = [0u8; 8];
            let raw = comm
                .irecv(peer, REDUCE_TAG.as_u16(), &mut buf)
                .wait()
                .ok_or_else(|| DomainError::comm(peer, "missing reduction contribution"))?;
            acc = op(acc, decode_u64(peer, &raw)?);
        }
        let out = acc.to_le_bytes();
        let sends: Vec<_> = (1..size)
            .map(|peer| comm.isend(peer, BROADCAST_TAG.as_u16(), &out))
            .collect();
        for send in sends {
            let _ = send.wait();
        }
        Ok(acc)
    } else {
        let contribution = local.to_le_bytes();
        let send = comm.isend(0, REDUCE_TAG.as_u16(), &contribution);
        let mut buf = [0u8; 8];
        let raw = comm.irecv(0, BROADCAST_TAG.as_u16(), &mut buf).wait();
        let _ = send.wait();
        let raw = raw.ok_or_else(|| DomainError::comm(0, "missing reduction result"))?;
        decode_u64(0, &raw)
    }
}

fn gather_via_root<C: Communicator + ?Sized>(
    comm: &C,
    root: usize,
    local: &[u8],
) -> Result<Option<Vec<Vec<u8>>>, DomainError> {
    let (rank, size) = (comm.rank(), comm.size());
    if root >= size {
        return Err(DomainError::comm(root, format!("gather root outside {size} ranks")));
    }
    if rank != root {
        let len = WireLen::new(root, local.len())?;
        let s1 = comm.isend(root, GATHER_SIZE_TAG.as_u16(), bytemuck::bytes_of(&len));
        let s2 = comm.isend(root, GATHER_DATA_TAG.as_u16(), local);
        let _ = s1.wait();
        let _ = s2.wait();
        return Ok(None);
    }
    let mut out = Vec::with_capacity(size);
    for peer in 0..size {
        if peer == root {
            out.push(local.to_vec());
            continue;
        }
        let mut hdr = [0u8; WireLen::SIZE];
        let raw = comm
            .irecv(peer, GATHER_SIZE_TAG.as_u16(), &mut hdr)
            .wait()
            .ok_or_else(|| DomainError::comm(peer, "missing gather size header"))?;
        let expected = WireLen::decode(peer, &raw)?;
        let mut buf = vec![0u8; expected];
        let data = comm
            .irecv(peer, GATHER_DATA_TAG.as_u16(), &mut buf)
            .wait()
            .ok_or_else(|| DomainError::comm(peer, "missing gather payload"))?;
        if data.len() != expected {
            return Err(DomainError::BufferSizeMismatch {
                neighbor: peer,
                expected,
                got: data.len(),
            });
        }
        out.push(data);
    }
    Ok(Some(out))
}

// --- LocalComm: intra-process / multi-thread ---
type Key = (usize, usize, u16); // (src, dst, tag)

/// Per-universe FIFO mailboxes; messages with the same key arrive in order.
#[derive(Debug, Default)]
struct Mailbox {
    slots: DashMap<Key, VecDeque<Bytes>>,
}

impl Mailbox {
    fn push(&self, key: Key, data: Bytes) {
        self.slots.entry(key).or_default().push_back(data);
    }

    fn pop(&self, key: &Key) -> Option<Bytes> {
        self.slots.get_mut(key).and_then(|mut q| q.pop_front())
    }
}

/// Default time a [`LocalHandle`] waits before reporting a missing message.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(60);

/// In-process communicator: every rank of a universe is a thread sharing one
/// mailbox. Used for serial runs and for multi-rank tests.
#[derive(Clone, Debug)]
pub struct LocalComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
    recv_timeout: Duration,
}

impl LocalComm {
    /// One communicator per rank of a fresh universe of `size` ranks.
    pub fn universe(size: usize) -> Vec<LocalComm> {
        let mailbox = Arc::new(Mailbox::default());
        (0..size)
            .map(|rank| LocalComm {
                rank,
                size,
                mailbox: mailbox.clone(),
                recv_timeout: DEFAULT_RECV_TIMEOUT,
            })
            .collect()
    }

    /// Single-rank universe; self-addressed messages loop back.
    pub fn serial() -> LocalComm {
        Self::universe(1).remove(0)
    }

    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }
}

pub struct LocalHandle {
    mailbox: Arc<Mailbox>,
    key: Key,
    len: usize,
    timeout: Duration,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let start = Instant::now();
        let mut spins = 0u32;
        loop {
            if let Some(bytes) = self.mailbox.pop(&self.key) {
                if bytes.len() > self.len {
                    let (src, dst, tag) = self.key;
                    log::warn!(
                        "rank {dst}: {} bytes from rank {src} with tag {tag:#06x} overrun a {} byte receive",
                        bytes.len(),
                        self.len
                    );
                }
                return Some(bytes.to_vec());
            }
            if start.elapsed() >= self.timeout {
                let (src, dst, tag) = self.key;
                log::warn!("rank {dst}: no message from rank {src} with tag {tag:#06x}");
                return None;
            }
            if spins < 64 {
                spins += 1;
                std::thread::yield_now();
            } else {
                std::thread::sleep(Duration::from_micros(50));
            }
        }
    }
}

impl Communicator for LocalComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        self.mailbox
            .push((self.rank, peer, tag), Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
        LocalHandle {
            mailbox: self.mailbox.clone(),
            key: (peer, self.rank, tag),
            len: buf.len(),
            timeout: self.recv_timeout,
        }
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use crate::domain_error::DomainError;
    use mpi::collective::SystemOperation;
    use mpi::point_to_point::Status;
    use mpi::datatype::Equivalence;
    use mpi::request::StaticScope;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::{
        Communicator as _, CommunicatorCollectives as _, Destination as _, Source as _,
    };

    /// MPI communicator. The caller keeps the `mpi::environment::Universe`
    /// alive for as long as this value is used.
    pub struct MpiComm {
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        pub fn new(world: SimpleCommunicator) -> Self {
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self { world, rank, size }
        }

        pub fn world(&self) -> &SimpleCommunicator {
            &self.world
        }
    }

    /// Pending request plus the heap buffer it borrows. Must be waited on;
    /// dropping an incomplete request aborts in the MPI bindings.
    pub struct MpiHandle {
        request: Option<Box<dyn FnOnce() -> Status>>,
        buf: *mut [u8],
        is_recv: bool,
    }

    impl Wait for MpiHandle {
        fn wait(mut self) -> Option<Vec<u8>> {
            let status = (self.request.take()?)();
            // SAFETY: `buf` came from `Box::into_raw` and the request that
            // borrowed it has completed.
            let data = unsafe { Box::from_raw(self.buf) };
            if self.is_recv {
                let n = status.count(u8::equivalent_datatype()).max(0) as usize;
                Some(data[..n.min(data.len())].to_vec())
            } else {
                None
            }
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = MpiHandle;
        type RecvHandle = MpiHandle;

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> MpiHandle {
            let ptr: *mut [u8] = Box::into_raw(buf.to_vec().into_boxed_slice());
            // SAFETY: the allocation stays alive until `MpiHandle::wait` frees it.
            let data: &'static [u8] = unsafe { &*ptr };
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, data, i32::from(tag));
            MpiHandle {
                request: Some(Box::new(move || req.wait())),
                buf: ptr,
                is_recv: false,
            }
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiHandle {
            let ptr: *mut [u8] = Box::into_raw(vec![0u8; buf.len()].into_boxed_slice());
            // SAFETY: as above; nothing else touches the allocation meanwhile.
            let data: &'static mut [u8] = unsafe { &mut *ptr };
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_receive_into_with_tag(StaticScope, data, i32::from(tag));
            MpiHandle {
                request: Some(Box::new(move || req.wait())),
                buf: ptr,
                is_recv: true,
            }
        }

        fn all_reduce_or(&self, local: bool) -> Result<bool, DomainError> {
            let mut global = 0u8;
            self.world
                .all_reduce_into(&u8::from(local), &mut global, SystemOperation::max());
            Ok(global != 0)
        }

        fn all_reduce_sum(&self, local: u64) -> Result<u64, DomainError> {
            let mut global = 0u64;
            self.world
                .all_reduce_into(&local, &mut global, SystemOperation::sum());
            Ok(global)
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::{MpiComm, MpiHandle};
