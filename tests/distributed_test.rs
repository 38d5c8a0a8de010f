//! Multi-process distributed backend tests.
//!
//! These tests require MPI and the `distributed` feature flag.
//! Run with: mpirun -n 4 cargo test --features distributed --test distributed_test
//!
//! Without MPI installed, these tests are excluded from the default build.
//! MPI initializes once per process, so everything runs inside a single
//! `MpiBackend::run` scope.

#![cfg(feature = "distributed")]

use archipel::collectives::{gather, reduce_all, reduce_master};
use archipel::discovery::discover_parts_snd;
use archipel::exchange::{exchange, exchange_table};
use archipel::{Backend, MpiBackend, PartData, Table, MASTER};

#[test]
fn ring_exchange_across_processes() {
    MpiBackend::run(world_size(), |parts| {
        let n = parts.num_parts();
        let me = *parts.local();

        // Ring receive graph (degenerates for 1 or 2 ranks).
        let parts_rcv = parts.map(|&p| ring_neighbors(p, n));
        let parts_snd = discover_parts_snd(&parts_rcv, Some(&parts_rcv));

        let snd = parts.zip_map(&parts_snd, |&p, dsts| vec![p; dsts.len()]);
        let got = exchange(snd, &parts_rcv, &parts_snd);

        let expected = ring_neighbors(me, n);
        assert_eq!(got.local(), &expected, "rank {me} hears its ring neighbors");

        // Variable-length follow-up: each rank sends me+1 copies of its id
        // to every neighbor.
        let ragged_snd = parts.zip_map(&parts_snd, |&p, dsts| {
            let mut table = Table::new();
            for _ in dsts {
                table.push_slice(&vec![p; p + 1]);
            }
            table
        });
        let ragged = exchange_table(ragged_snd, &parts_rcv, &parts_snd);
        for (j, &src) in parts_rcv.local().iter().enumerate() {
            assert_eq!(
                ragged.local().slice(j),
                &vec![src; src + 1][..],
                "rank {me}, slot {j}"
            );
        }

        // Collectives over the same data.
        let values = parts.map(|&p| ((p + 1) * 10) as u64);
        let total: u64 = (1..=n as u64).map(|v| v * 10).sum();
        assert_eq!(reduce_all(&values, |a, b| a + b).into_any_part(), total);

        let at_master = reduce_master(&values, |a, b| a + b);
        if at_master.i_am_master() {
            assert_eq!(at_master.into_any_part(), Some(total));
        } else {
            assert_eq!(at_master.into_any_part(), None);
        }

        let collected = gather(&parts.map(|&p| p), MASTER);
        if collected.i_am_master() {
            assert_eq!(collected.into_any_part(), (0..n).collect::<Vec<_>>());
        }
        Ok(())
    })
    .expect("distributed run failed");
}

/// Number of MPI processes this test was launched with. `run` checks the
/// part count against the world size, so probe the environment the same
/// way mpirun communicates it.
fn world_size() -> usize {
    // Ask for whatever mpirun provided. Open MPI, MPICH and slurm each
    // export a world-size variable; fall back to a single process for
    // plain `cargo test`.
    ["OMPI_COMM_WORLD_SIZE", "PMI_SIZE", "SLURM_NTASKS"]
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(1)
}

fn ring_neighbors(p: usize, n: usize) -> Vec<usize> {
    let mut neighbors = vec![(p + n - 1) % n, (p + 1) % n];
    neighbors.sort_unstable();
    neighbors.dedup();
    neighbors.retain(|&q| q != p);
    neighbors
}
