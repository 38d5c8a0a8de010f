//! Point-to-point neighbor exchange: the primitive every collective is
//! built on.
//!
//! The communication graph is a pair of per-part relations, `parts_rcv`
//! (who I receive from) and `parts_snd` (who receives from me), both in
//! stable neighbor-list order. Send buffers hold one entry per send
//! neighbor, receive buffers one per receive neighbor; `parts_snd` must be
//! the exact transpose of `parts_rcv` across parts
//! ([`discover_parts_snd`](crate::discovery::discover_parts_snd) derives
//! one from the other).
//!
//! The `start_*` forms are non-blocking: they take ownership of the
//! buffers and return one task per part; the buffers come back out of the
//! completed task and are unreadable until then. The plain forms are
//! blocking sugar — schedule everything, wait on everything, return the
//! receive buffers.
//!
//! Graph mismatches are not detected cooperatively: a part that waits for
//! a message nobody sends blocks forever on the distributed backend (the
//! simulated backend panics on the converse case, a send nobody expects).
//! There are no timeouts — exact or symmetric graphs are a caller
//! obligation.

use crate::backend::{Backend, Payload};
use crate::data::{no_deps, wait_all, Data, PartData};
use crate::table::Table;
use crate::task::Task;

/// Non-blocking fixed-size exchange into pre-sized receive buffers.
///
/// Part `p` sends `snd[p][i]` to `parts_snd[p][i]` and receives into
/// `rcv[p][j]` from `parts_rcv[p][j]`. `deps` completes first. The
/// returned task yields `(rcv, snd)` for each part.
pub fn start_exchange_into<T, D>(
    rcv: D,
    snd: D,
    parts_rcv: &Data<D::Backend, Vec<usize>>,
    parts_snd: &Data<D::Backend, Vec<usize>>,
    deps: Data<D::Backend, Task<()>>,
) -> Data<D::Backend, Task<(Vec<T>, Vec<T>)>>
where
    T: Payload,
    D: PartData<Vec<T>>,
{
    let backend = rcv.backend();
    let rcv = rcv.into_map(Table::of_units);
    let snd = snd.into_map(Table::of_units);
    backend
        .start_table_exchange(rcv, snd, parts_rcv, parts_snd, deps)
        .into_map(|t| t.and_then(|(r, s)| (r.into_data(), s.into_data())))
}

/// Allocating fixed-size exchange: receive buffers are sized from
/// `parts_rcv` (one default-initialized entry per receive neighbor), then
/// delegated to [`start_exchange_into`].
pub fn start_exchange<T, D>(
    snd: D,
    parts_rcv: &Data<D::Backend, Vec<usize>>,
    parts_snd: &Data<D::Backend, Vec<usize>>,
    deps: Data<D::Backend, Task<()>>,
) -> Data<D::Backend, Task<(Vec<T>, Vec<T>)>>
where
    T: Payload,
    D: PartData<Vec<T>>,
{
    let rcv = parts_rcv.map(|sources| vec![T::default(); sources.len()]);
    start_exchange_into(rcv, snd, parts_rcv, parts_snd, deps)
}

/// Non-blocking variable-length exchange of ragged tables; receive sizes
/// are negotiated by the four-phase protocol. The returned task yields
/// `(rcv, snd)` tables.
pub fn start_exchange_table<T, D>(
    snd: D,
    parts_rcv: &Data<D::Backend, Vec<usize>>,
    parts_snd: &Data<D::Backend, Vec<usize>>,
    deps: Data<D::Backend, Task<()>>,
) -> Data<D::Backend, Task<(Table<T>, Table<T>)>>
where
    T: Payload,
    D: PartData<Table<T>>,
{
    let backend = snd.backend();
    backend.start_ragged_exchange(snd, parts_rcv, parts_snd, deps)
}

/// Blocking fixed-size exchange: returns the filled receive buffers.
pub fn exchange<T, D>(
    snd: D,
    parts_rcv: &Data<D::Backend, Vec<usize>>,
    parts_snd: &Data<D::Backend, Vec<usize>>,
) -> Data<D::Backend, Vec<T>>
where
    T: Payload,
    D: PartData<Vec<T>>,
{
    let deps = no_deps(parts_rcv);
    wait_all(start_exchange(snd, parts_rcv, parts_snd, deps)).into_map(|(rcv, _snd)| rcv)
}

/// Blocking in-place fixed-size exchange: returns `(rcv, snd)` pairs.
pub fn exchange_into<T, D>(
    rcv: D,
    snd: D,
    parts_rcv: &Data<D::Backend, Vec<usize>>,
    parts_snd: &Data<D::Backend, Vec<usize>>,
) -> Data<D::Backend, (Vec<T>, Vec<T>)>
where
    T: Payload,
    D: PartData<Vec<T>>,
{
    let deps = no_deps(parts_rcv);
    wait_all(start_exchange_into(rcv, snd, parts_rcv, parts_snd, deps))
}

/// Blocking variable-length exchange: returns the received tables.
pub fn exchange_table<T, D>(
    snd: D,
    parts_rcv: &Data<D::Backend, Vec<usize>>,
    parts_snd: &Data<D::Backend, Vec<usize>>,
) -> Data<D::Backend, Table<T>>
where
    T: Payload,
    D: PartData<Table<T>>,
{
    let deps = no_deps(parts_rcv);
    wait_all(start_exchange_table(snd, parts_rcv, parts_snd, deps)).into_map(|(rcv, _snd)| rcv)
}
