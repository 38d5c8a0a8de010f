//! MPI backend: one execution context (process) per part.
//!
//! Requires the `distributed` feature flag and an MPI installation. Each
//! process holds exactly one part's local value; exchanges map onto the
//! transport's non-blocking primitives (immediate send/receive posted for
//! every neighbor, then drained together). rsmpi request objects are
//! scope-bound, so `schedule` drives a transfer to completion instead of
//! leaving it in flight; observable ordering semantics are unchanged.
//!
//! Message tags are drawn from a static counter. All processes run the
//! same driver (SPMD), so both ends of an exchange allocate the same tag
//! in the same program order; concurrent exchanges between the same pair
//! of parts stay distinguishable.

use std::sync::atomic::{AtomicI32, Ordering};

use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use crate::backend::{Backend, PartShape, Payload};
use crate::data::{PartData, MASTER};
use crate::error::{ArchipelError, Result};
use crate::table::Table;
use crate::task::Task;

/// The distributed substrate. Valid only between `mpi::initialize` and
/// finalization, i.e. inside [`MpiBackend::run`]; the world communicator
/// is fetched per operation rather than stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MpiBackend;

/// This process's slot of a distributed container: one local value, plus
/// the identity of the part it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MpiData<T> {
    item: T,
    part: usize,
    n_parts: usize,
}

impl<T> MpiData<T> {
    /// This part's local value.
    pub fn local(&self) -> &T {
        &self.item
    }

    /// This part's id (the process rank).
    pub fn part(&self) -> usize {
        self.part
    }
}

impl<T> PartData<T> for MpiData<T> {
    type Backend = MpiBackend;

    fn backend(&self) -> MpiBackend {
        MpiBackend
    }

    fn num_parts(&self) -> usize {
        self.n_parts
    }

    fn i_am_master(&self) -> bool {
        self.part == MASTER
    }

    fn map<U, F>(&self, mut f: F) -> MpiData<U>
    where
        F: FnMut(&T) -> U,
    {
        MpiData {
            item: f(&self.item),
            part: self.part,
            n_parts: self.n_parts,
        }
    }

    fn map_with_part<U, F>(&self, mut f: F) -> MpiData<U>
    where
        F: FnMut(usize, &T) -> U,
    {
        MpiData {
            item: f(self.part, &self.item),
            part: self.part,
            n_parts: self.n_parts,
        }
    }

    fn into_map<U, F>(self, mut f: F) -> MpiData<U>
    where
        F: FnMut(T) -> U,
    {
        MpiData {
            item: f(self.item),
            part: self.part,
            n_parts: self.n_parts,
        }
    }

    fn map_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut T),
    {
        f(&mut self.item);
    }

    fn zip_map<U, V, F>(&self, other: &MpiData<U>, mut f: F) -> MpiData<V>
    where
        F: FnMut(&T, &U) -> V,
    {
        assert_eq!(
            self.n_parts, other.n_parts,
            "combined distributed data must share the part count"
        );
        MpiData {
            item: f(&self.item, &other.item),
            part: self.part,
            n_parts: self.n_parts,
        }
    }

    fn into_zip<U>(self, other: MpiData<U>) -> MpiData<(T, U)> {
        assert_eq!(
            self.n_parts, other.n_parts,
            "combined distributed data must share the part count"
        );
        MpiData {
            item: (self.item, other.item),
            part: self.part,
            n_parts: self.n_parts,
        }
    }

    fn into_any_part(self) -> T {
        self.item
    }
}

impl Backend for MpiBackend {
    type Data<T> = MpiData<T>;

    fn get_parts(&self, shape: impl Into<PartShape>) -> Result<MpiData<usize>> {
        let n = shape.into().count();
        let world = SimpleCommunicator::world();
        let size = world.size() as usize;
        if n != size {
            return Err(ArchipelError::Configuration(format!(
                "requested {n} parts but the process group has {size} processes"
            )));
        }
        Ok(MpiData {
            item: world.rank() as usize,
            part: world.rank() as usize,
            n_parts: n,
        })
    }

    fn run<R, F>(shape: impl Into<PartShape>, driver: F) -> Result<R>
    where
        F: FnOnce(MpiData<usize>) -> Result<R>,
    {
        let universe = mpi::initialize().ok_or_else(|| {
            ArchipelError::Configuration("MPI initialization failed".into())
        })?;
        let world = universe.world();
        tracing::debug!(rank = world.rank(), size = world.size(), "process group up");

        // A configuration mismatch is deterministic on every rank, so it
        // returns gracefully everywhere; the universe drop finalizes.
        let parts = MpiBackend.get_parts(shape)?;
        match driver(parts) {
            Ok(result) => Ok(result),
            Err(err) => {
                // A rank that bails out on its own would leave its peers
                // blocked in wait; take the whole group down instead.
                tracing::error!(error = %err, "driver failed, aborting the process group");
                world.abort(1);
            }
        }
    }

    fn start_table_exchange<T: Payload>(
        &self,
        rcv: MpiData<Table<T>>,
        snd: MpiData<Table<T>>,
        parts_rcv: &MpiData<Vec<usize>>,
        parts_snd: &MpiData<Vec<usize>>,
        deps: MpiData<Task<()>>,
    ) -> MpiData<Task<(Table<T>, Table<T>)>> {
        let part = parts_rcv.part;
        let n_parts = parts_rcv.n_parts;
        for count in [parts_snd.n_parts, rcv.n_parts, snd.n_parts] {
            assert_eq!(n_parts, count, "combined distributed data must share the part count");
        }
        debug_assert_eq!(
            rcv.item.len(),
            parts_rcv.item.len(),
            "receive table must hold one slice per receive neighbor"
        );
        debug_assert_eq!(
            snd.item.len(),
            parts_snd.item.len(),
            "send table must hold one slice per send neighbor"
        );

        let tag = next_tag();
        let sources = parts_rcv.item.clone();
        let targets = parts_snd.item.clone();
        let task = deps.item.and_then(move |()| {
            let mut rcv_table = rcv.item;
            let snd_table = snd.item;
            transfer(&mut rcv_table, &snd_table, &sources, &targets, tag);
            (rcv_table, snd_table)
        });
        MpiData {
            item: task,
            part,
            n_parts,
        }
    }

    fn start_ragged_exchange<T: Payload>(
        &self,
        snd: MpiData<Table<T>>,
        parts_rcv: &MpiData<Vec<usize>>,
        parts_snd: &MpiData<Vec<usize>>,
        deps: MpiData<Task<()>>,
    ) -> MpiData<Task<(Table<T>, Table<T>)>> {
        let part = parts_rcv.part;
        let n_parts = parts_rcv.n_parts;
        for count in [parts_snd.n_parts, snd.n_parts] {
            assert_eq!(n_parts, count, "combined distributed data must share the part count");
        }

        // Tags for both phases are fixed now, at call time, so every rank
        // agrees on them no matter when the chain is scheduled.
        let count_tag = next_tag();
        let data_tag = next_tag();
        let sources = parts_rcv.item.clone();
        let targets = parts_snd.item.clone();
        let (sources2, targets2) = (sources.clone(), targets.clone());

        // Phases 1+2: derive per-neighbor send counts, exchange them over
        // the same graph through the fixed-size protocol.
        let counts = deps.item.and_then(move |()| {
            let snd_table = snd.item;
            let counts_snd = Table::of_units(snd_table.counts());
            let mut counts_rcv = Table::of_units(vec![0usize; sources.len()]);
            transfer(&mut counts_rcv, &counts_snd, &sources, &targets, count_tag);
            (snd_table, counts_rcv.into_data())
        });

        // Phases 3+4: rebuild the receive offsets by prefix sum, size the
        // buffer, then move the payloads over the agreed lengths.
        let task = counts.and_then(move |(snd_table, counts_rcv)| {
            let mut rcv_table = Table::with_counts(&counts_rcv);
            transfer(&mut rcv_table, &snd_table, &sources2, &targets2, data_tag);
            (rcv_table, snd_table)
        });

        MpiData {
            item: task,
            part,
            n_parts,
        }
    }
}

/// Drive one exchange: post a receive per source into disjoint table
/// slices, post a send per target, drain all requests. Zero-length slices
/// are posted too — the peer posts the matching empty message.
fn transfer<T: Payload>(
    rcv: &mut Table<T>,
    snd: &Table<T>,
    sources: &[usize],
    targets: &[usize],
    tag: i32,
) {
    let world = SimpleCommunicator::world();
    let _span =
        tracing::debug_span!("table_exchange", recvs = sources.len(), sends = targets.len(), tag)
            .entered();

    mpi::request::scope(|scope| {
        let mut requests = Vec::with_capacity(sources.len() + targets.len());
        for (slot, &src) in rcv.split_mut().into_iter().zip(sources) {
            requests.push(
                world
                    .process_at_rank(src as i32)
                    .immediate_receive_into_with_tag(scope, slot, tag),
            );
        }
        for (i, &dst) in targets.iter().enumerate() {
            requests.push(
                world
                    .process_at_rank(dst as i32)
                    .immediate_send_with_tag(scope, snd.slice(i), tag),
            );
        }
        for request in requests {
            request.wait_without_status();
        }
    });
}

static NEXT_TAG: AtomicI32 = AtomicI32::new(0);

const TAG_BASE: i32 = 64;
const TAG_SPAN: i32 = 16_384;

/// Fresh tag for one exchange, within the MPI_TAG_UB floor every
/// implementation guarantees.
fn next_tag() -> i32 {
    TAG_BASE + NEXT_TAG.fetch_add(1, Ordering::Relaxed).rem_euclid(TAG_SPAN)
}

#[cfg(test)]
mod tests {
    //! Local-value tests only; multi-process behavior is exercised by
    //! `tests/distributed_test.rs` under mpirun.

    use super::*;

    fn data<T>(item: T) -> MpiData<T> {
        MpiData {
            item,
            part: 2,
            n_parts: 4,
        }
    }

    #[test]
    fn map_applies_to_the_local_value() {
        let d = data(10);
        let e = d.map(|&v| v + 1);
        assert_eq!(*e.local(), 11);
        assert_eq!(e.part(), 2);
        assert_eq!(e.num_parts(), 4);
    }

    #[test]
    fn map_with_part_sees_the_rank() {
        let d = data("x");
        let e = d.map_with_part(|p, _| p);
        assert_eq!(*e.local(), 2);
    }

    #[test]
    fn master_is_rank_zero() {
        assert!(!data(0).i_am_master());
        let master = MpiData {
            item: 0,
            part: 0,
            n_parts: 4,
        };
        assert!(master.i_am_master());
    }

    #[test]
    #[should_panic(expected = "share the part count")]
    fn zip_map_rejects_mismatched_part_counts() {
        let a = data(1);
        let b = MpiData {
            item: 2,
            part: 2,
            n_parts: 5,
        };
        let _ = a.zip_map(&b, |x, y| x + y);
    }

    #[test]
    fn tags_stay_within_the_guaranteed_range() {
        for _ in 0..10 {
            let t = next_tag();
            assert!(t >= TAG_BASE && t < TAG_BASE + TAG_SPAN);
        }
    }
}
