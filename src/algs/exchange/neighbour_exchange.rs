//! Stage 2 of the neighbor exchange: move particle payloads and place them.
//!
//! [`post_exchange`] serializes every outgoing packet, trades sizes with
//! [`exchange_sizes`](super::size_exchange::exchange_sizes) and posts the
//! payload receives (sized strictly from the announced lengths) and sends.
//! [`PendingExchange::complete`] waits on everything and inserts each received
//! particle into the `next` bin of the cell it resolves to.

use super::size_exchange::exchange_sizes;
use super::{ExchangePlan, OutgoingPackets};
use crate::algs::communicator::{Communicator, Wait};
use crate::algs::wire::{decode_packet, encode_packet};
use crate::data::{Bin, LocalDomain};
use crate::domain_error::DomainError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeStats {
    pub sent: usize,
    pub received: usize,
}

struct PendingRecv<H> {
    source: usize,
    expected: usize,
    handle: H,
    _buf: Vec<u8>,
}

/// Posted but not yet completed exchange.
pub struct PendingExchange<C: Communicator> {
    recvs: Vec<PendingRecv<C::RecvHandle>>,
    sends: Vec<C::SendHandle>,
    _send_bufs: Vec<Vec<u8>>,
    sent: usize,
    maybe_err: Option<DomainError>,
}

/// Post all size and payload messages for this step and clear `packets`.
///
/// Every rank must call this once per committed step, with or without
/// particles to send.
pub fn post_exchange<C: Communicator>(
    comm: &C,
    plan: &ExchangePlan,
    packets: &mut OutgoingPackets,
) -> PendingExchange<C> {
    let tags = plan.tags();
    let mut maybe_err = None;

    let payloads: Vec<Vec<u8>> = plan
        .routes()
        .iter()
        .map(|r| {
            let packet = packets.packet(r.index);
            if r.dest.is_none() && !packet.is_empty() {
                maybe_err.get_or_insert_with(|| {
                    DomainError::comm(
                        comm.rank(),
                        format!("{} particles queued toward missing neighbor {:?}", packet.len(), r.offset),
                    )
                });
            }
            encode_packet(packet)
        })
        .collect();
    let lens: Vec<usize> = payloads.iter().map(Vec::len).collect();

    let sizes = match exchange_sizes(comm, plan, &lens) {
        Ok(sizes) => sizes,
        Err(e) => {
            maybe_err.get_or_insert(e);
            vec![None; plan.routes().len()]
        }
    };

    let mut recvs = Vec::new();
    for route in plan.routes() {
        if let (Some(source), Some(expected)) = (route.source, sizes[route.index]) {
            let mut buf = vec![0u8; expected];
            let handle = comm.irecv(source, tags.payload_tag(route.index), &mut buf);
            recvs.push(PendingRecv {
                source,
                expected,
                handle,
                _buf: buf,
            });
        }
    }

    let mut sends = Vec::new();
    let mut sent = 0;
    for route in plan.routes() {
        if let Some(dest) = route.dest {
            sends.push(comm.isend(
                dest,
                tags.payload_tag(route.index),
                &payloads[route.index],
            ));
            sent += packets.packet(route.index).len();
        }
    }
    log::trace!("rank {}: posted {sent} outgoing particles", comm.rank());
    packets.clear();

    PendingExchange {
        recvs,
        sends,
        _send_bufs: payloads,
        sent,
        maybe_err,
    }
}

impl<C: Communicator> PendingExchange<C> {
    /// Wait on every handle and insert received particles into `next` bins.
    pub fn complete(self, domain: &mut LocalDomain) -> Result<ExchangeStats, DomainError> {
        let PendingExchange {
            recvs,
            sends,
            sent,
            mut maybe_err,
            ..
        } = self;
        let rank = domain.partition().grid().rank();
        let mut received = 0;

        for recv in recvs {
            let data = recv.handle.wait();
            if maybe_err.is_some() {
                continue;
            }
            let result = match data {
                None => Err(DomainError::comm(recv.source, "failed to receive particle payload")),
                Some(raw) if raw.len() != recv.expected => Err(DomainError::BufferSizeMismatch {
                    neighbor: recv.source,
                    expected: recv.expected,
                    got: raw.len(),
                }),
                Some(raw) => place_packet(domain, &raw, recv.source, rank),
            };
            match result {
                Ok(n) => received += n,
                Err(e) => maybe_err = Some(e),
            }
        }

        for send in sends {
            let _ = send.wait();
        }

        match maybe_err {
            Some(err) => Err(err),
            None => Ok(ExchangeStats { sent, received }),
        }
    }
}

fn place_packet(
    domain: &mut LocalDomain,
    raw: &[u8],
    neighbor: usize,
    rank: usize,
) -> Result<usize, DomainError> {
    let particles = decode_packet(raw, neighbor)?;
    for p in &particles {
        domain
            .place_absolute(*p, Bin::Next)
            .map_err(|e| match e {
                DomainError::OutsideDomain(position) => DomainError::MisroutedParticle {
                    neighbor,
                    rank,
                    position,
                },
                other => other,
            })?;
    }
    Ok(particles.len())
}
