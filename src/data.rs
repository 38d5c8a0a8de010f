//! The distributed-data abstraction: a total mapping from part id to a
//! local value, bound to one backend and one part count.
//!
//! `map`-style operations are the only way to touch local values and never
//! communicate; every cross-part effect goes through the exchange layer.
//! Part ids are 0-based ranks `0..num_parts`, matching MPI ranks.

use crate::backend::Backend;
use crate::task::Task;

/// The distinguished part used for centralized reporting.
pub const MASTER: usize = 0;

/// Convenience alias for the data container of backend `B`.
pub type Data<B, T> = <B as Backend>::Data<T>;

/// A value of type `T` on every part.
///
/// Any two instances combined in one operation must share the backend and
/// the part count; the backend link is enforced by the type system and the
/// part count by an assertion (a mismatch is a usage error, not a
/// recoverable condition).
///
/// The local-apply contract: closures passed to the `map` family may read
/// and mutate only the values handed to them, must not communicate, and
/// must be deterministic given identical inputs.
pub trait PartData<T>: Sized {
    type Backend: Backend<Data<T> = Self>;

    fn backend(&self) -> Self::Backend;

    fn num_parts(&self) -> usize;

    /// True on exactly one distinguished execution context: rank
    /// [`MASTER`] in the distributed backend, the single driver invocation
    /// in the simulated one. Stable across calls for a given backend.
    fn i_am_master(&self) -> bool;

    /// Apply `f` to every part's value independently.
    fn map<U, F>(&self, f: F) -> Data<Self::Backend, U>
    where
        F: FnMut(&T) -> U;

    /// Like [`map`](Self::map), with the part id as first argument.
    fn map_with_part<U, F>(&self, f: F) -> Data<Self::Backend, U>
    where
        F: FnMut(usize, &T) -> U;

    /// Consuming [`map`](Self::map): moves each local value into `f`.
    fn into_map<U, F>(self, f: F) -> Data<Self::Backend, U>
    where
        F: FnMut(T) -> U;

    /// Mutate every part's value in place. Mutation is local to the owning
    /// part; there are no cross-part side effects.
    fn map_mut<F>(&mut self, f: F)
    where
        F: FnMut(&mut T);

    /// Apply `f` across two containers part-wise.
    fn zip_map<U, V, F>(&self, other: &Data<Self::Backend, U>, f: F) -> Data<Self::Backend, V>
    where
        F: FnMut(&T, &U) -> V;

    /// Pair up two containers part-wise, consuming both.
    fn into_zip<U>(self, other: Data<Self::Backend, U>) -> Data<Self::Backend, (T, U)>;

    /// Collapse to a single local value: the calling context's own part in
    /// the distributed backend, part 0 in the simulated one. Meaningful for
    /// values known to be replicated on every part, or under an
    /// `i_am_master` guard.
    fn into_any_part(self) -> T;
}

/// The part id of every part, as data.
pub fn part_ids<T, D: PartData<T>>(d: &D) -> Data<D::Backend, usize> {
    d.map_with_part(|p, _| p)
}

/// A container of already-satisfied tasks shaped like `like` — the
/// no-dependency input for exchanges that wait on nothing.
pub fn no_deps<T, D: PartData<T>>(like: &D) -> Data<D::Backend, Task<()>> {
    like.map(|_| Task::ready(()))
}

/// Schedule every per-part task, wait on every per-part task, and return
/// the results. The blocking counterpart of the `start_*` operations.
pub fn wait_all<V: 'static, D: PartData<Task<V>>>(tasks: D) -> Data<D::Backend, V> {
    tasks.into_map(|t| t.wait())
}
