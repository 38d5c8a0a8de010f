//! Backend-agnostic distributed data with asynchronous neighbor exchange.
//!
//! Parallel algorithms are written once against a distributed-data
//! abstraction — a value per *part*, local `map`-style transforms, and a
//! non-blocking point-to-point exchange — and run unchanged on two
//! substrates: a simulated backend iterating every part inside one process
//! (development, debugging) and an MPI backend with one process per part
//! (`distributed` feature).
//!
//! A driver generic over [`Backend`] receives its part ids from
//! [`Backend::run`], builds per-part data with [`PartData`] transforms,
//! and communicates through the exchange layer and the collectives built
//! on it (gather, scatter, broadcast, reduce, assemble). Non-blocking
//! operations hand their buffers to a [`Task`] and return them on
//! completion, so a buffer can never be touched while an exchange is in
//! flight.

pub mod backend;
pub mod collectives;
pub mod data;
pub mod discovery;
pub mod error;
pub mod exchange;
pub mod sequential;
pub mod table;
pub mod task;

#[cfg(feature = "distributed")]
pub mod backend_mpi;

pub use backend::{Backend, PartShape, Payload};
pub use data::{no_deps, part_ids, wait_all, Data, PartData, MASTER};
pub use error::{ArchipelError, Result};
pub use sequential::{SeqBackend, SeqData};
pub use table::Table;
pub use task::{Task, TaskState};

#[cfg(feature = "distributed")]
pub use backend_mpi::{MpiBackend, MpiData};
