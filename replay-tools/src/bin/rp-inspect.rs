use anyhow::{Context, Result};
use clap::Parser;
use replay::pool::PoolId;
use replay::pools::Pools;
use replay::snapshot::PoolsSnapshot;
use replay::store::sqlite::SqliteStore;
use replay::store::ContentStore;
use replay_tools::{hexdump, parse_range};
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Restores a pool snapshot and prints what each pool holds.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Snapshot JSON written by `PoolsSnapshot::save`.
    snapshot: PathBuf,

    /// SQLite database holding the snapshot's resources.
    #[arg(short, long)]
    store: PathBuf,

    /// Only inspect this pool.
    #[arg(short, long)]
    pool: Option<u32>,

    /// Dump the bytes in BASE:SIZE of each inspected pool. May be repeated.
    #[arg(short, long = "dump", value_parser = parse_range)]
    dumps: Vec<replay::range::Range>,

    /// Print the length of the C string starting at this address.
    #[arg(long, value_parser = replay_tools::parse_number)]
    strlen: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("RP_LOG"))
        .with_writer(io::stderr)
        .init();

    let file = File::open(&args.snapshot)
        .with_context(|| format!("cannot open snapshot {}", args.snapshot.display()))?;
    let snapshot = PoolsSnapshot::load(BufReader::new(file))?;
    let store = SqliteStore::open(&args.store)
        .with_context(|| format!("cannot open store {}", args.store.display()))?;
    tracing::debug!(resources = store.len()?, "store opened");

    let missing: Vec<_> = snapshot
        .pools
        .iter()
        .flat_map(|p| p.records.iter())
        .filter(|r| !store.contains(&r.id))
        .map(|r| r.id)
        .collect();
    for id in &missing {
        tracing::warn!(%id, "snapshot references a resource missing from the store");
    }

    let store: Arc<dyn ContentStore> = Arc::new(store);
    let pools = Pools::restore(&snapshot, store)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(
        out,
        "{} pools, {} records, next id {}",
        pools.len(),
        snapshot.record_count(),
        snapshot.next_id
    )?;

    for (id, pool) in pools.iter() {
        if args.pool.is_some_and(|want| PoolId(want) != id) {
            continue;
        }
        writeln!(out, "pool {id}: {} records", pool.record_count())?;
        for rec in pool.records() {
            writeln!(out, "  write {}", rec.dst)?;
        }
        for valid in pool.valid_ranges().iter() {
            writeln!(out, "  valid {valid}")?;
        }
        if let Some(ptr) = args.strlen {
            match pool.strlen(ptr)? {
                Some(len) => writeln!(out, "  strlen {} = {len}", replay::Hex(ptr))?,
                None => writeln!(out, "  strlen {} unterminated", replay::Hex(ptr))?,
            }
        }
        for rng in &args.dumps {
            let mut bytes = vec![0u8; rng.size as usize];
            pool.read(rng.base, &mut bytes)
                .with_context(|| format!("cannot read {rng} from pool {id}"))?;
            writeln!(out, "  dump {rng}")?;
            hexdump(&mut out, rng.base, &bytes)?;
        }
    }

    if !missing.is_empty() {
        anyhow::bail!("{} resources are missing from the store", missing.len());
    }
    Ok(())
}
