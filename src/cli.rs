//! Lenient command-line parsing.
//!
//! Invalid or malformed arguments leave the prior setting unchanged and
//! never abort; a malformed `/`-separated field is treated as absent.

use std::path::PathBuf;

use tracing::warn;

use gabel_core::{AxisOrder, PartitionSpec, MAX_COMBOS};
use gabel_parallel::{FilterSpec, MAX_WORKERS};

/// Default probe/rebalance timeout in seconds.
const DEFAULT_TIMEOUT: u32 = 60;
/// Largest accepted probe/rebalance timeout in seconds.
const MAX_TIMEOUT: u32 = 3600;

/// Parsed command line.
#[derive(Debug, Default)]
pub struct Cli {
    /// `-worker`: structured output for an external coordinator.
    pub worker_mode: bool,
    /// `-parallel N`: workers to fork; 0 means single-process.
    pub workers: u32,
    /// `-partition-order <tag>`.
    pub axis_order: AxisOrder,
    /// `-partition N/M`, `-partition-range S/T/X`, or `-single-combo C`.
    pub partition: Option<PartitionSpec>,
    /// `-first-move-partition N/M` or `-first-move-queue N`.
    pub filter: FilterSpec,
    /// `-probe [T]`: probe timeout per axis order.
    pub probe: Option<u32>,
    /// `-rebalance [T]`: reserved.
    pub rebalance: Option<u32>,
    /// Positional input file.
    pub input: Option<PathBuf>,
}

/// Scan `args` into a [`Cli`], skipping anything malformed.
pub fn parse(args: &[String]) -> Cli {
    let mut cli = Cli::default();
    let mut iter = args.iter().peekable();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-worker" => cli.worker_mode = true,
            "-parallel" => {
                if let Some(n) = required_number(&mut iter, 1, MAX_WORKERS) {
                    cli.workers = n;
                }
            }
            "-partition-order" => {
                if let Some(value) = iter.next() {
                    match value.parse::<AxisOrder>() {
                        Ok(order) => cli.axis_order = order,
                        Err(error) => warn!(%error, "ignoring -partition-order"),
                    }
                }
            }
            "-partition" => {
                if let Some((n, m)) = iter.next().and_then(|v| fraction(v)) {
                    match PartitionSpec::single(n - 1, m) {
                        Ok(spec) => cli.partition = Some(spec),
                        Err(error) => warn!(%error, "ignoring -partition"),
                    }
                }
            }
            "-partition-range" => {
                if let Some((s, t, x)) = iter.next().and_then(|v| triple(v)) {
                    match PartitionSpec::range(s, t, x) {
                        Ok(spec) => cli.partition = Some(spec),
                        Err(error) => warn!(%error, "ignoring -partition-range"),
                    }
                }
            }
            "-first-move-partition" => {
                if let Some((n, m)) = iter.next().and_then(|v| fraction(v)) {
                    cli.filter = FilterSpec::Static {
                        index: n - 1,
                        total: m,
                    };
                }
            }
            "-first-move-queue" => {
                if let Some(n) = required_number(&mut iter, 1, MAX_WORKERS) {
                    cli.filter = FilterSpec::Queue;
                    if cli.workers == 0 {
                        cli.workers = n;
                    }
                }
            }
            "-single-combo" => {
                if let Some(combo) = required_number(&mut iter, 0, MAX_COMBOS - 1) {
                    match PartitionSpec::single_combo(combo) {
                        Ok(spec) => cli.partition = Some(spec),
                        Err(error) => warn!(%error, "ignoring -single-combo"),
                    }
                }
            }
            "-probe" => {
                cli.probe = Some(optional_number(&mut iter, 1, MAX_TIMEOUT, DEFAULT_TIMEOUT));
            }
            "-rebalance" => {
                cli.rebalance = Some(optional_number(&mut iter, 1, MAX_TIMEOUT, DEFAULT_TIMEOUT));
            }
            other => {
                if !other.starts_with('-') && cli.input.is_none() {
                    cli.input = Some(PathBuf::from(other));
                } else {
                    warn!(argument = other, "ignoring unknown argument");
                }
            }
        }
    }

    cli
}

/// Consume the flag's value token and parse it within `[lo, hi]`.
fn required_number(
    iter: &mut std::iter::Peekable<std::slice::Iter<'_, String>>,
    lo: u32,
    hi: u32,
) -> Option<u32> {
    let value = iter.next()?;
    match value.parse::<u32>() {
        Ok(n) if (lo..=hi).contains(&n) => Some(n),
        _ => {
            warn!(value = value.as_str(), "ignoring out-of-range or malformed value");
            None
        }
    }
}

/// Consume the next token only if it parses within `[lo, hi]`; otherwise
/// leave it for the main scan and fall back to `default`.
fn optional_number(
    iter: &mut std::iter::Peekable<std::slice::Iter<'_, String>>,
    lo: u32,
    hi: u32,
    default: u32,
) -> u32 {
    if let Some(next) = iter.peek()
        && let Ok(n) = next.parse::<u32>()
        && (lo..=hi).contains(&n)
    {
        iter.next();
        return n;
    }
    default
}

/// Parse a 1-indexed `N/M` pair with `1 ≤ N ≤ M`.
fn fraction(token: &str) -> Option<(u32, u32)> {
    let (n, m) = token.split_once('/')?;
    let n: u32 = n.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if n >= 1 && n <= m { Some((n, m)) } else { None }
}

/// Parse an `S/T/X` triple.
fn triple(token: &str) -> Option<(u32, u32, u32)> {
    let (s, rest) = token.split_once('/')?;
    let (t, x) = rest.split_once('/')?;
    Some((s.parse().ok()?, t.parse().ok()?, x.parse().ok()?))
}
