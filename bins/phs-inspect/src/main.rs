//! Proven header store inspection tool.
//!
//! Opens a proven header database and prints its tip, individual headers,
//! header ranges, repository statistics, or a linkage check of the stored chain.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tracing::{debug, warn};

use phs_core::traits::HeaderRepository;
use phs_core::types::{Hash256, HashHeightPair, ProvenBlockHeader};
use phs_store::{RocksHeaderRepository, StoreConfig};

/// Inspect a proven block header database.
#[derive(Parser, Debug)]
#[command(name = "phs-inspect", version, about = "Inspect a proven block header database")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// TOML config file (values may also come from PHS_* variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory holding the provenheaders database
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format ("text" or "json")
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the persisted tip.
    Tip,
    /// Show the header stored at a height.
    Get {
        height: u64,
    },
    /// Look up a header by its hex hash.
    Find {
        hash: String,
    },
    /// Show consecutive headers starting at a height.
    Range {
        start: u64,
        #[arg(default_value_t = 10)]
        count: u64,
    },
    /// Summarize the stored headers without modifying the database.
    Stats,
    /// Check parent links and the hash index of every stored header.
    Verify,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = StoreConfig::load(cli.global.config.as_deref())
        .context("failed to load configuration")?;
    if let Some(dir) = cli.global.data_dir.clone() {
        config.data_dir = dir;
    }
    let level = cli
        .global
        .log_level
        .clone()
        .unwrap_or_else(|| config.log_level.clone());
    init_logging(&level, &cli.global.log_format);

    let db_path = config.db_path();
    if !db_path.exists() {
        bail!("no proven header database at {}", db_path.display());
    }
    debug!(path = %db_path.display(), "opening database");
    let repo = RocksHeaderRepository::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;

    let json_out = cli.global.json;
    match cli.command {
        Commands::Tip => cmd_tip(&repo, json_out),
        Commands::Get { height } => cmd_get(&repo, height, json_out),
        Commands::Find { hash } => cmd_find(&repo, &hash, json_out),
        Commands::Range { start, count } => cmd_range(&repo, start, count, json_out),
        Commands::Stats => cmd_stats(&repo, json_out),
        Commands::Verify => cmd_verify(&repo, json_out),
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_tip(repo: &RocksHeaderRepository, json_out: bool) -> Result<()> {
    let tip = repo.tip()?;
    if json_out {
        let value = match tip {
            Some(t) => tip_json(&t),
            None => serde_json::Value::Null,
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        match tip {
            Some(t) => println!("height={} hash={}", t.height, t.hash),
            None => println!("no tip (database never initialized)"),
        }
    }
    Ok(())
}

fn cmd_get(repo: &RocksHeaderRepository, height: u64, json_out: bool) -> Result<()> {
    let header = repo
        .get(height)?
        .with_context(|| format!("no header stored at height {height}"))?;
    print_headers(&[(height, header)], json_out)
}

fn cmd_find(repo: &RocksHeaderRepository, hash_hex: &str, json_out: bool) -> Result<()> {
    let hash = Hash256::from_hex(hash_hex).context("hash must be 64 hex characters")?;
    let height = repo
        .height_of(&hash)?
        .with_context(|| format!("hash {hash} is not indexed"))?;
    let header = repo
        .get(height)?
        .with_context(|| format!("hash index points at empty height {height}"))?;
    print_headers(&[(height, header)], json_out)
}

fn cmd_range(repo: &RocksHeaderRepository, start: u64, count: u64, json_out: bool) -> Result<()> {
    let headers = repo.get_range(start, count)?;
    if (headers.len() as u64) < count {
        warn!(
            requested = count,
            found = headers.len(),
            "range stopped at first missing height"
        );
    }
    let rows: Vec<(u64, ProvenBlockHeader)> = headers
        .into_iter()
        .enumerate()
        .map(|(i, h)| (start + i as u64, h))
        .collect();
    print_headers(&rows, json_out)
}

fn cmd_stats(repo: &RocksHeaderRepository, json_out: bool) -> Result<()> {
    let stats = repo.stats()?;
    if stats.missing_heights > 0 {
        warn!(missing = stats.missing_heights, "stored chain has gaps below the tip");
    }
    if json_out {
        let value = json!({
            "tip": stats.tip.as_ref().map(tip_json),
            "header_count": stats.header_count,
            "lowest_height": stats.lowest_height,
            "highest_height": stats.highest_height,
            "missing_heights": stats.missing_heights,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{stats}");
    }
    Ok(())
}

fn cmd_verify(repo: &RocksHeaderRepository, json_out: bool) -> Result<()> {
    let Some(tip) = repo.tip()? else {
        bail!("database has no tip");
    };

    let mut problems: Vec<String> = Vec::new();
    let mut prev: Option<Hash256> = None;
    for height in 0..=tip.height {
        let Some(header) = repo.get(height)? else {
            // Genesis is only a default tip; it need not be stored.
            if height > 0 {
                problems.push(format!("missing header at height {height}"));
            }
            prev = None;
            continue;
        };
        let hash = header.hash();
        if let Some(p) = prev {
            if header.prev_hash != p {
                problems.push(format!("height {height}: prev_hash does not match height {}", height - 1));
            }
        }
        if repo.height_of(&hash)? != Some(height) {
            problems.push(format!("height {height}: hash index does not point back"));
        }
        prev = Some(hash);
    }
    if let Some(p) = prev {
        if tip.hash != p {
            problems.push(format!("tip hash {} does not match stored header", tip.hash));
        }
    }

    if json_out {
        let value = json!({
            "tip": tip_json(&tip),
            "ok": problems.is_empty(),
            "problems": problems,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else if problems.is_empty() {
        println!("ok: {} headers up to {}", tip.height + 1, tip);
    } else {
        for problem in &problems {
            println!("{problem}");
        }
    }

    if !problems.is_empty() {
        bail!("{} problem(s) found", problems.len());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn tip_json(tip: &HashHeightPair) -> serde_json::Value {
    json!({ "height": tip.height, "hash": tip.hash.to_string() })
}

fn header_json(height: u64, header: &ProvenBlockHeader) -> serde_json::Value {
    json!({
        "height": height,
        "hash": header.hash().to_string(),
        "version": header.version,
        "prev_hash": header.prev_hash.to_string(),
        "merkle_root": header.merkle_root.to_string(),
        "timestamp": header.timestamp,
        "bits": format!("{:08x}", header.bits),
        "nonce": header.nonce,
        "merkle_proof": header.merkle_proof.iter().map(|h| h.to_string()).collect::<Vec<_>>(),
        "signature": hex::encode(&header.signature),
        "coinstake": hex::encode(&header.coinstake),
        "size": header.serialized_size(),
    })
}

fn print_headers(rows: &[(u64, ProvenBlockHeader)], json_out: bool) -> Result<()> {
    if json_out {
        let values: Vec<serde_json::Value> =
            rows.iter().map(|(height, h)| header_json(*height, h)).collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
        return Ok(());
    }
    for (height, header) in rows {
        println!(
            "{:>8}  {}  prev={}  ts={}  proof={}  size={}",
            height,
            header.hash(),
            header.prev_hash,
            header.timestamp,
            header.merkle_proof.len(),
            header.serialized_size(),
        );
    }
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}
