use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ranktree::{Error, IndexConfig, Interval, IntervalIndex};

/// Ranked interval index over string keys
#[derive(Parser, Debug)]
#[command(name = "ranktree", version, about)]
struct Args {
    /// Snapshot file, loaded at start and written on exit
    #[arg(long, default_value = "interval.str")]
    file: PathBuf,

    /// Mutations allowed before an automatic snapshot
    #[arg(long, default_value_t = 10_000)]
    threshold: u32,

    /// Separates an id's group prefix from the rest
    #[arg(long, default_value_t = '+')]
    delimiter: char,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Insert or replace an interval
    Insert {
        id: String,
        low: String,
        high: String,
        /// Rank; defaults to the current time in milliseconds
        #[arg(long)]
        rank: Option<u64>,
    },
    /// Delete one interval
    Delete { id: String },
    /// Delete every interval whose id starts with PREFIX and the delimiter
    DeletePrefix { prefix: String },
    /// Show one interval
    Get { id: String },
    /// Highest-ranked intervals overlapping [LOW, HIGH]
    Top {
        low: String,
        high: String,
        #[arg(short, default_value_t = 10)]
        k: usize,
        /// Use a full scan instead of the best-first search
        #[arg(long)]
        scan: bool,
    },
    /// Print the tree with its per-node aggregates
    Dump {
        /// One line per depth instead of one line per node
        #[arg(long)]
        levels: bool,
    },
}

fn print_interval(interval: &Interval<String>) {
    let stamp = interval
        .timestamp()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{}\t[{}, {}]\trank {}\t{}",
        interval.id, interval.low, interval.high, interval.rank, stamp
    );
}

/// Handle insert command
fn handle_insert(
    index: &mut IntervalIndex,
    id: String,
    low: String,
    high: String,
    rank: Option<u64>,
) -> Result<(), Error> {
    let record = match rank {
        Some(rank) => Interval::new(id, low, high, rank),
        None => Interval::stamped(id, low, high, Utc::now()),
    };
    if record.low > record.high {
        return Err(Error::InvertedInterval {
            low: record.low,
            high: record.high,
        });
    }
    let rank = record.rank;
    let id = record.id.clone();
    index.insert(record.id, record.low, record.high, record.rank)?;
    println!("Inserted {} at rank {}", id, rank);
    Ok(())
}

/// Handle delete command
fn handle_delete(index: &mut IntervalIndex, id: &str) -> Result<(), Error> {
    if index.delete(id)? {
        println!("Deleted {}", id);
    } else {
        println!("Interval not found");
    }
    Ok(())
}

/// Handle delete-prefix command
fn handle_delete_prefix(index: &mut IntervalIndex, prefix: &str) -> Result<(), Error> {
    let removed = index.delete_prefix(prefix)?;
    println!("Deleted {} intervals", removed);
    Ok(())
}

/// Handle get command
fn handle_get(index: &IntervalIndex, id: &str) -> Result<(), Error> {
    match index.lookup(id) {
        Some(interval) => print_interval(interval),
        None => println!("Interval not found"),
    }
    Ok(())
}

/// Handle top command
fn handle_top(index: &IntervalIndex, low: String, high: String, k: usize, scan: bool) -> Result<(), Error> {
    let start = Instant::now();
    let hits: Vec<&Interval<String>> = if scan {
        index.top_k(&low, &high, k)
    } else if index.is_empty() {
        Vec::new()
    } else {
        index.iter_top(low, high)?.take(k).collect()
    };
    let elapsed = start.elapsed();

    for interval in &hits {
        print_interval(interval);
    }
    println!("Total: {} intervals in {:?}", hits.len(), elapsed);
    Ok(())
}

/// Handle dump command
fn handle_dump(index: &IntervalIndex, levels: bool) -> Result<(), Error> {
    if levels {
        print!("{}", index.tree().level_order());
    } else {
        print!("{}", index.tree());
    }
    let stats = index.tree().stats();
    println!(
        "{} intervals, height {}, black height {}",
        stats.node_count, stats.height, stats.black_height
    );
    Ok(())
}

fn run(args: Args) -> Result<(), Error> {
    let config = IndexConfig {
        sync_threshold: args.threshold,
        id_delimiter: args.delimiter,
        ..IndexConfig::persistent(&args.file)
    };
    let mut index: IntervalIndex = IntervalIndex::open(config)?;

    match args.command {
        Command::Insert { id, low, high, rank } => handle_insert(&mut index, id, low, high, rank)?,
        Command::Delete { id } => handle_delete(&mut index, &id)?,
        Command::DeletePrefix { prefix } => handle_delete_prefix(&mut index, &prefix)?,
        Command::Get { id } => handle_get(&index, &id)?,
        Command::Top { low, high, k, scan } => handle_top(&index, low, high, k, scan)?,
        Command::Dump { levels } => handle_dump(&index, levels)?,
    }

    // Write now so failures reach the exit code instead of a drop warning
    if index.pending_mutations() > 0 {
        index.sync()?;
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Args::parse()) {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}
