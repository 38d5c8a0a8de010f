use archipel::collectives::{gather, reduce};
use archipel::discovery::discover_parts_snd;
use archipel::exchange::{exchange, exchange_table};
use archipel::{Backend, PartData, Result, SeqBackend, Table, MASTER};
use clap::Parser;

/// Distributed-data neighbor-exchange demo
#[derive(Parser)]
#[command(name = "archipel", version)]
struct Cli {
    /// Number of parts to split the computation into
    #[arg(long, default_value_t = 4)]
    parts: usize,

    /// Use the MPI backend instead of the sequential simulation
    /// (requires building with --features distributed and running
    /// under mpirun with a matching process count)
    #[arg(long)]
    mpi: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let result = if cli.mpi {
        run_mpi(cli.parts)
    } else {
        SeqBackend::run(cli.parts, demo_driver::<SeqBackend>)
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(feature = "distributed")]
fn run_mpi(parts: usize) -> Result<()> {
    archipel::MpiBackend::run(parts, demo_driver::<archipel::MpiBackend>)
}

#[cfg(not(feature = "distributed"))]
fn run_mpi(_parts: usize) -> Result<()> {
    Err(archipel::ArchipelError::Unsupported(
        "the mpi backend requires building with --features distributed".into(),
    ))
}

/// Ring demo: every part swaps ids with its ring neighbors, sends a
/// variable-length greeting around, and the master reports the totals.
fn demo_driver<B: Backend>(parts: B::Data<usize>) -> Result<()> {
    let n = parts.num_parts();

    // Receive from both ring neighbors; derive the send side from the
    // receive side over the (symmetric) ring as candidate graph.
    let parts_rcv = parts.map(|&p| ring_neighbors(p, n));
    let parts_snd = discover_parts_snd(&parts_rcv, Some(&parts_rcv));

    // Fixed-size exchange: each part sends its own id to every neighbor.
    let snd = parts.zip_map(&parts_snd, |&p, dsts| vec![p; dsts.len()]);
    let got = exchange(snd, &parts_rcv, &parts_snd);
    let neighbor_sum = got.map(|ids| ids.iter().sum::<usize>());

    // Variable-length exchange: part p sends p+1 copies of its id to each
    // neighbor; receive sizes are negotiated by the protocol.
    let ragged_snd = parts.zip_map(&parts_snd, |&p, dsts| {
        let mut table = Table::new();
        for _ in dsts {
            table.push_slice(&vec![p; p + 1]);
        }
        table
    });
    let ragged = exchange_table(ragged_snd, &parts_rcv, &parts_snd);
    let ragged_len = ragged.map(|t| t.total_len());

    let total = reduce(&parts, |a, b| a + b);
    tracing::info!(parts = n, total, "sum of part ids");

    // Centralized report at the master part; rows are in part order.
    let sums = gather(&neighbor_sum, MASTER);
    let lens = gather(&ragged_len, MASTER);
    if sums.i_am_master() {
        println!("part, neighbor_id_sum, ragged_elems_received");
        let lens = lens.into_any_part();
        for (p, (s, l)) in sums.into_any_part().iter().zip(lens.iter()).enumerate() {
            println!("{}, {}, {}", p, s, l);
        }
        println!("total_id_sum, {}", total);
    }
    Ok(())
}

/// Distinct ring neighbors of `p` (empty when the ring degenerates to a
/// single part).
fn ring_neighbors(p: usize, n: usize) -> Vec<usize> {
    let mut neighbors = vec![(p + n - 1) % n, (p + 1) % n];
    neighbors.sort_unstable();
    neighbors.dedup();
    neighbors.retain(|&q| q != p);
    neighbors
}
