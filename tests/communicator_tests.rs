mod util;

use std::time::Duration;
use tephra_domain::algs::communicator::{CommTag, Communicator, LocalComm, Wait};
use util::run_ranks;

#[test]
fn local_round_trip() {
    let tag = CommTag(0x1000);
    let comms = LocalComm::universe(2);

    let msg = b"hello";
    let _s = comms[0].isend(1, tag.as_u16(), msg);

    let mut buf = [0u8; 5];
    let h = comms[1].irecv(0, tag.as_u16(), &mut buf);
    let got = h.wait().unwrap();
    assert_eq!(&got, msg);
}

#[test]
fn local_fifo_order() {
    let tag = CommTag(0x1001);
    let comms = LocalComm::universe(2);

    for i in 0..10u8 {
        comms[0].isend(1, tag.as_u16(), &[i]);
    }
    let mut out = Vec::new();
    for _ in 0..10 {
        let mut b = [0u8; 1];
        let h = comms[1].irecv(0, tag.as_u16(), &mut b);
        out.push(h.wait().unwrap()[0]);
    }
    assert_eq!(out, (0u8..10u8).collect::<Vec<_>>());
}

#[test]
fn oversized_message_arrives_whole() {
    let tag = CommTag(0x1002);
    let comms = LocalComm::universe(2);

    comms[0].isend(1, tag.as_u16(), &[1, 2, 3, 4, 5, 6]);
    let mut b = [0u8; 4];
    let got = comms[1].irecv(0, tag.as_u16(), &mut b).wait().unwrap();
    assert_eq!(got, vec![1, 2, 3, 4, 5, 6]);
}

#[test]
fn tags_and_peers_are_separate_queues() {
    let comms = LocalComm::universe(3);
    comms[0].isend(2, 5, &[0]);
    comms[1].isend(2, 5, &[1]);
    comms[0].isend(2, 6, &[2]);
    let mut b = [0u8; 1];
    assert_eq!(comms[2].irecv(1, 5, &mut b).wait(), Some(vec![1]));
    assert_eq!(comms[2].irecv(0, 6, &mut b).wait(), Some(vec![2]));
    assert_eq!(comms[2].irecv(0, 5, &mut b).wait(), Some(vec![0]));
}

#[test]
fn missing_message_times_out() {
    let comm = LocalComm::serial().with_recv_timeout(Duration::from_millis(10));
    let mut b = [0u8; 1];
    assert!(comm.irecv(0, 1, &mut b).wait().is_none());
}

#[test]
fn commtag_offset_wrap() {
    let t = CommTag::new(u16::MAX).offset(1);
    assert_eq!(t.as_u16(), 0);
}

#[test]
fn collectives_agree_on_every_rank() {
    let results = run_ranks(5, |c| {
        let none = c.all_reduce_or(false).unwrap();
        let any = c.all_reduce_or(c.rank() == 4).unwrap();
        let sum = c.all_reduce_sum(10 * c.rank() as u64).unwrap();
        let max = c.all_reduce_u64(c.rank() as u64 * 3, u64::max).unwrap();
        (none, any, sum, max)
    });
    for r in results {
        assert_eq!(r, (false, true, 100, 12));
    }
}

#[test]
fn gather_collects_in_rank_order() {
    let results = run_ranks(4, |c| {
        let payload = vec![c.rank() as u8; c.rank()];
        c.gather_bytes(1, &payload).unwrap()
    });
    for (rank, r) in results.iter().enumerate() {
        if rank == 1 {
            let parts = r.as_ref().unwrap();
            assert_eq!(parts.len(), 4);
            for (i, part) in parts.iter().enumerate() {
                assert_eq!(part, &vec![i as u8; i]);
            }
        } else {
            assert!(r.is_none());
        }
    }
}

#[test]
fn gather_root_must_exist() {
    let comm = LocalComm::serial();
    assert!(comm.gather_bytes(3, &[]).is_err());
}
