//! Stage 1 of the neighbor exchange: announce payload byte lengths.
//!
//! Every route with a source gets a size receive, every route with a
//! destination gets a size send. All handles are drained before returning,
//! even if an error occurs, so the peers are never left with dangling
//! requests.

use super::ExchangePlan;
use crate::algs::communicator::{Communicator, Wait};
use crate::algs::wire::WireLen;
use crate::domain_error::DomainError;

/// Send `payload_lens[i]` along route `i` and return the length announced by
/// each route's source (`None` where the route has no source).
pub fn exchange_sizes<C: Communicator>(
    comm: &C,
    plan: &ExchangePlan,
    payload_lens: &[usize],
) -> Result<Vec<Option<usize>>, DomainError> {
    let tags = plan.tags();

    // 0) every announced length must fit its prefix before anything is posted
    let announced = plan
        .routes()
        .iter()
        .filter_map(|route| {
            route
                .dest
                .map(|dest| WireLen::new(dest, payload_lens[route.index]).map(|len| (route.index, dest, len)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    // 1) post all receives
    let mut recv_size = Vec::with_capacity(plan.routes().len());
    for route in plan.routes() {
        if let Some(src) = route.source {
            let mut hdr = WireLen(0);
            let h = comm.irecv(
                src,
                tags.size_tag(route.index),
                bytemuck::bytes_of_mut(&mut hdr),
            );
            recv_size.push((route.index, src, h));
        }
    }

    // 2) post all sends and keep buffers alive until completion
    let mut pending_sends = Vec::with_capacity(announced.len());
    for (index, dest, len) in &announced {
        pending_sends.push(comm.isend(*dest, tags.size_tag(*index), bytemuck::bytes_of(len)));
    }

    // 3) wait for all recvs, keep the first error but drain the rest
    let mut sizes_in = vec![None; plan.routes().len()];
    let mut maybe_err = None;
    for (index, src, h) in recv_size {
        match h.wait() {
            Some(data) => match WireLen::decode(src, &data) {
                Ok(n) => sizes_in[index] = Some(n),
                Err(e) => {
                    maybe_err.get_or_insert(e);
                }
            },
            None => {
                maybe_err
                    .get_or_insert_with(|| DomainError::comm(src, "failed to receive packet size"));
            }
        }
    }

    // 4) always drain all send handles before returning
    for send in pending_sends {
        let _ = send.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(sizes_in),
    }
}
