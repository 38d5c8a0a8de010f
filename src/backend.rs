//! Backend abstraction: the capability set every execution substrate
//! provides.
//!
//! Two substrates implement it: `SeqBackend` runs all parts inside one
//! sequential process (development, debugging), the `distributed`-feature
//! `MpiBackend` runs one part per MPI process. Algorithms written against
//! this trait run unmodified on either; a backend lacking a capability
//! fails at compile time rather than at dispatch.

use crate::data::PartData;
use crate::error::Result;
use crate::table::Table;
use crate::task::Task;

/// Requested part layout: a flat count or a multi-dimensional shape whose
/// product reduces to one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartShape {
    dims: Vec<usize>,
}

impl PartShape {
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Flat part count: the product of the dimensions.
    pub fn count(&self) -> usize {
        self.dims.iter().product()
    }
}

impl From<usize> for PartShape {
    fn from(n: usize) -> Self {
        Self { dims: vec![n] }
    }
}

impl From<[usize; 2]> for PartShape {
    fn from(dims: [usize; 2]) -> Self {
        Self { dims: dims.to_vec() }
    }
}

impl From<[usize; 3]> for PartShape {
    fn from(dims: [usize; 3]) -> Self {
        Self { dims: dims.to_vec() }
    }
}

/// Element types that can travel through an exchange.
///
/// With the `distributed` feature enabled the type must additionally map
/// onto an MPI datatype (`Equivalence`), since the same payload has to be
/// expressible on the wire.
#[cfg(not(feature = "distributed"))]
pub trait Payload: Clone + Default + Send + 'static {}
#[cfg(not(feature = "distributed"))]
impl<T: Clone + Default + Send + 'static> Payload for T {}

#[cfg(feature = "distributed")]
pub trait Payload: Clone + Default + Send + 'static + mpi::datatype::Equivalence {}
#[cfg(feature = "distributed")]
impl<T: Clone + Default + Send + 'static + mpi::datatype::Equivalence> Payload for T {}

/// An execution substrate realizing parts as simulated chunks or real
/// processes.
///
/// Backends own no per-part data; they are cheap handles constructed once
/// and cloned freely.
pub trait Backend: Clone + 'static {
    type Data<T>: PartData<T, Backend = Self>;

    /// Each execution context's own part id, as data.
    ///
    /// Fails with a `Configuration` error when `shape` is incompatible
    /// with the available execution contexts (zero parts, or a distributed
    /// process count that does not match).
    fn get_parts(&self, shape: impl Into<PartShape>) -> Result<Self::Data<usize>>;

    /// Scoped run: acquire the backend's execution context, hand the
    /// driver its part ids, and tear the context down on every exit path.
    /// The driver runs once per execution context.
    fn run<R, F>(shape: impl Into<PartShape>, driver: F) -> Result<R>
    where
        F: FnOnce(Self::Data<usize>) -> Result<R>;

    /// Non-blocking neighbor exchange of pre-sized ragged tables.
    ///
    /// Part `p` sends `snd[p].slice(i)` to `parts_snd[p][i]` and receives
    /// into `rcv[p].slice(j)` from `parts_rcv[p][j]`; both tables must be
    /// laid out in neighbor-list order, and the receive slices pre-sized to
    /// what each neighbor sends (the fixed-size exchange is the unit-slice
    /// case; [`start_ragged_exchange`](Self::start_ragged_exchange)
    /// negotiates unknown sizes first). `deps` completes before the
    /// exchange starts, which sequences dependent exchanges without a
    /// global barrier.
    ///
    /// Both tables are owned by the in-flight exchange and come back out of
    /// the completed task as `(rcv, snd)`.
    fn start_table_exchange<T: Payload>(
        &self,
        rcv: Self::Data<Table<T>>,
        snd: Self::Data<Table<T>>,
        parts_rcv: &Self::Data<Vec<usize>>,
        parts_snd: &Self::Data<Vec<usize>>,
        deps: Self::Data<Task<()>>,
    ) -> Self::Data<Task<(Table<T>, Table<T>)>>;

    /// Non-blocking variable-length exchange: the receiver does not know
    /// incoming sizes in advance.
    ///
    /// Four phases, each chained on the previous one's completion: derive
    /// per-neighbor send counts from the send table's offsets; exchange the
    /// counts through the fixed-size protocol; rebuild the receive offsets
    /// by prefix sum and size the receive buffer; exchange the payloads.
    /// The whole chain is exposed as a single task per part yielding
    /// `(rcv, snd)`.
    fn start_ragged_exchange<T: Payload>(
        &self,
        snd: Self::Data<Table<T>>,
        parts_rcv: &Self::Data<Vec<usize>>,
        parts_snd: &Self::Data<Vec<usize>>,
        deps: Self::Data<Task<()>>,
    ) -> Self::Data<Task<(Table<T>, Table<T>)>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_from_flat_count() {
        let s = PartShape::from(6);
        assert_eq!(s.dims(), &[6]);
        assert_eq!(s.count(), 6);
    }

    #[test]
    fn shape_product_reduces_to_flat_count() {
        assert_eq!(PartShape::from([2, 3]).count(), 6);
        assert_eq!(PartShape::from([2, 3, 4]).count(), 24);
    }
}
