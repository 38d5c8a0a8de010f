//! Collectives built on the exchange primitive: gather, scatter,
//! broadcast, the reduce family, and assembly of overlapping
//! contributions.
//!
//! None of these touch the communication internals — each one builds a
//! star or complete graph, runs an exchange, and folds locally.

use crate::backend::{Backend, Payload};
use crate::data::{no_deps, part_ids, wait_all, Data, PartData, MASTER};
use crate::exchange::exchange;
use crate::table::Table;
use crate::task::Task;

/// Collect every part's value at `root`, in part order. Other parts end
/// up with an empty buffer.
pub fn gather<T, D>(d: &D, root: usize) -> Data<D::Backend, Vec<T>>
where
    T: Payload,
    D: PartData<T>,
{
    let n = d.num_parts();
    assert!(root < n, "gather root {root} out of range for {n} parts");
    let parts_snd = d.map(|_| vec![root]);
    let parts_rcv = d.map_with_part(|p, _| if p == root { (0..n).collect() } else { Vec::new() });
    let snd = d.map(|v| vec![v.clone()]);
    exchange(snd, &parts_rcv, &parts_snd)
}

/// Collect every part's value at every part (the all-to-all case): one
/// exchange over the complete graph.
pub fn gather_all<T, D>(d: &D) -> Data<D::Backend, Vec<T>>
where
    T: Payload,
    D: PartData<T>,
{
    let n = d.num_parts();
    let all = d.map(|_| (0..n).collect::<Vec<usize>>());
    let snd = d.map(|v| vec![v.clone(); n]);
    exchange(snd, &all, &all)
}

/// Deliver `root`'s per-part values to their owning parts: the inverse of
/// [`gather`]. `root` must hold exactly one value per part; what other
/// parts hold is ignored.
pub fn scatter<T, D>(d: &D, root: usize) -> Data<D::Backend, T>
where
    T: Payload,
    D: PartData<Vec<T>>,
{
    let n = d.num_parts();
    assert!(root < n, "scatter root {root} out of range for {n} parts");
    let parts_snd = d.map_with_part(|p, values| {
        if p == root {
            assert_eq!(
                values.len(),
                n,
                "scatter root must hold one value per part"
            );
            (0..n).collect()
        } else {
            Vec::new()
        }
    });
    let parts_rcv = d.map(|_| vec![root]);
    let snd = d.map_with_part(|p, values| if p == root { values.clone() } else { Vec::new() });
    exchange(snd, &parts_rcv, &parts_snd).into_map(take_single)
}

/// Replicate `root`'s value on every part: a star exchange from one
/// source.
pub fn bcast<T, D>(d: &D, root: usize) -> Data<D::Backend, T>
where
    T: Payload,
    D: PartData<T>,
{
    let n = d.num_parts();
    assert!(root < n, "bcast root {root} out of range for {n} parts");
    let parts_snd = d.map_with_part(|p, _| if p == root { (0..n).collect() } else { Vec::new() });
    let parts_rcv = d.map(|_| vec![root]);
    let snd = d.map_with_part(|p, v| if p == root { vec![v.clone(); n] } else { Vec::new() });
    exchange(snd, &parts_rcv, &parts_snd).into_map(take_single)
}

/// Combine every part's value with `combine` and place the result at the
/// master part only; every other part gets `None`.
///
/// `combine` must be associative and is assumed commutative, here and in
/// the other reduce forms.
pub fn reduce_master<T, D, F>(d: &D, combine: F) -> Data<D::Backend, Option<T>>
where
    T: Payload,
    D: PartData<T>,
    F: Fn(T, T) -> T,
{
    let ids = part_ids(d);
    gather(d, MASTER)
        .into_zip::<usize>(ids)
        .into_map(|(values, p)| {
            if p == MASTER {
                values.into_iter().reduce(&combine)
            } else {
                None
            }
        })
}

/// Combine every part's value with `combine`, replicating the result on
/// every part.
pub fn reduce_all<T, D, F>(d: &D, combine: F) -> Data<D::Backend, T>
where
    T: Payload,
    D: PartData<T>,
    F: Fn(T, T) -> T,
{
    gather_all(d).into_map(|values| {
        values
            .into_iter()
            .reduce(&combine)
            .expect("distributed data holds at least one part")
    })
}

/// Combine every part's value with `combine` into a single per-context
/// result.
pub fn reduce<T, D, F>(d: &D, combine: F) -> T
where
    T: Payload,
    D: PartData<T>,
    F: Fn(T, T) -> T,
{
    reduce_all(d, combine).into_any_part()
}

/// Non-blocking assembly of overlapping contributions (e.g. shared
/// boundary degrees of freedom).
///
/// Every part owns a local array `values`. For the `i`-th send neighbor,
/// `slots_snd.slice(i)` names the local positions whose values are that
/// neighbor's contributions; for the `j`-th receive neighbor,
/// `slots_rcv.slice(j)` names the local positions the incoming
/// contributions are folded into with `combine(&mut own, incoming)`,
/// in receive-neighbor order. The task yields the updated array.
///
/// Note the direction: contributions flow from non-owning parts to the
/// owner, so `parts_snd` lists the owners this part contributes to and
/// `parts_rcv` the parts contributing to slots this part owns.
#[allow(clippy::too_many_arguments)]
pub fn start_assemble<T, D, F>(
    values: D,
    slots_snd: &Data<D::Backend, Table<usize>>,
    slots_rcv: &Data<D::Backend, Table<usize>>,
    parts_rcv: &Data<D::Backend, Vec<usize>>,
    parts_snd: &Data<D::Backend, Vec<usize>>,
    combine: F,
    deps: Data<D::Backend, Task<()>>,
) -> Data<D::Backend, Task<Vec<T>>>
where
    T: Payload,
    D: PartData<Vec<T>>,
    F: Fn(&mut T, T) + Clone + 'static,
{
    let backend = values.backend();

    // Pack contributions in send-neighbor order; sizes are known on both
    // sides, so the pre-sized table exchange applies directly.
    let snd = values.zip_map(slots_snd, |vals, slots: &Table<usize>| {
        let mut table = Table::new();
        for i in 0..slots.len() {
            let picked: Vec<T> = slots.slice(i).iter().map(|&s| vals[s].clone()).collect();
            table.push_slice(&picked);
        }
        table
    });
    let rcv = slots_rcv.map(|slots| Table::with_counts(&slots.counts()));
    let tasks = backend.start_table_exchange(rcv, snd, parts_rcv, parts_snd, deps);

    tasks
        .into_zip::<Vec<T>>(values)
        .into_zip::<Table<usize>>(slots_rcv.map(|t| t.clone()))
        .into_map(move |((task, mut vals), slots)| {
            let combine = combine.clone();
            task.and_then(move |(incoming, _snd)| {
                for j in 0..slots.len() {
                    for (&slot, contribution) in slots.slice(j).iter().zip(incoming.slice(j)) {
                        combine(&mut vals[slot], contribution.clone());
                    }
                }
                vals
            })
        })
}

/// Blocking form of [`start_assemble`].
pub fn assemble<T, D, F>(
    values: D,
    slots_snd: &Data<D::Backend, Table<usize>>,
    slots_rcv: &Data<D::Backend, Table<usize>>,
    parts_rcv: &Data<D::Backend, Vec<usize>>,
    parts_snd: &Data<D::Backend, Vec<usize>>,
    combine: F,
) -> Data<D::Backend, Vec<T>>
where
    T: Payload,
    D: PartData<Vec<T>>,
    F: Fn(&mut T, T) + Clone + 'static,
{
    let deps = no_deps(parts_rcv);
    wait_all(start_assemble(
        values, slots_snd, slots_rcv, parts_rcv, parts_snd, combine, deps,
    ))
}

/// The single element of a one-entry receive buffer.
fn take_single<T>(mut buffer: Vec<T>) -> T {
    debug_assert_eq!(buffer.len(), 1, "expected exactly one received value");
    buffer.pop().expect("missing received value")
}
