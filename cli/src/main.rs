//! chainsub CLI: tail a published block or transaction stream.
//!
//! # Commands
//! ```bash
//! chainsub blocks --server 127.0.0.1 --port 5563 --count 10
//! chainsub txs    --forever --json
//! chainsub info
//! ```

use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::sync::oneshot;

use chainsub_core::{
    Block, BlockListener, DecodeErrorPolicy, Listener, ListenerConfig, PopMode, StreamKind,
    Transaction, TransactionListener,
};
use chainsub_zmq::SubscribeContext;

mod logging;

use logging::LogConfig;

#[derive(Parser)]
#[command(
    name = "chainsub",
    about = "Tail block and transaction streams published over ZeroMQ",
    version
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print (depth, block) pairs from the block stream
    Blocks(StreamArgs),

    /// Print transactions from the transaction stream
    Txs(StreamArgs),

    /// Show default endpoints and settings
    Info,
}

#[derive(Args)]
struct StreamArgs {
    /// Publisher host (default: localhost)
    #[arg(long)]
    server: Option<String>,
    /// Publisher port (default: 5563 for blocks, 5564 for transactions)
    #[arg(long)]
    port: Option<u16>,
    /// JSON listener config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Exit after this many items
    #[arg(long)]
    count: Option<u64>,
    /// How long each pop waits before checking listener health
    #[arg(long, default_value_t = 1_000, conflicts_with = "forever")]
    wait_ms: u64,
    /// Block on the queue indefinitely
    #[arg(long)]
    forever: bool,
    /// Skip malformed frames instead of stopping
    #[arg(long)]
    skip_malformed: bool,
    /// Print items as JSON lines
    #[arg(long)]
    json: bool,
}

impl StreamArgs {
    fn listener_config(&self, kind: StreamKind) -> Result<ListenerConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ListenerConfig::new(kind),
        };
        if config.kind != kind {
            bail!("config file is for the {} stream, not {kind}", config.kind);
        }
        if let Some(server) = &self.server {
            config.server = server.clone();
        }
        if let Some(port) = self.port {
            config.port = Some(port);
        }
        if self.skip_malformed {
            config.on_decode_error = DecodeErrorPolicy::Skip;
        }
        Ok(config)
    }

    fn pop_mode(&self) -> PopMode {
        if self.forever {
            PopMode::Forever
        } else {
            PopMode::Timeout(Duration::from_millis(self.wait_ms))
        }
    }
}

fn load_config(path: &Path) -> Result<ListenerConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_tracing(&LogConfig {
        level: if cli.verbose { "debug" } else { "info" }.into(),
        json: cli.log_json,
        ..LogConfig::default()
    });

    match cli.command {
        Commands::Blocks(args) => tail(StreamKind::Blocks, args).await,
        Commands::Txs(args) => tail(StreamKind::Transactions, args).await,
        Commands::Info => {
            cmd_info();
            Ok(())
        }
    }
}

fn cmd_info() {
    println!("chainsub v{}", env!("CARGO_PKG_VERSION"));
    for config in [ListenerConfig::blocks(), ListenerConfig::transactions()] {
        println!("  {:<13} {}", config.kind, config.endpoint());
    }
    let defaults = ListenerConfig::blocks();
    println!("  Poll interval:     {}ms", defaults.poll_interval_ms);
    println!("  On decode error:   terminate (--skip-malformed to continue)");
    println!("  Transport:         ZeroMQ SUB, all topics");
}

// ─── Tail ─────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct BlockRow {
    depth: u32,
    hash: String,
    tx_count: u64,
    size: usize,
}

#[derive(Serialize)]
struct TxRow {
    hash: String,
    size: usize,
}

async fn tail(kind: StreamKind, args: StreamArgs) -> Result<()> {
    let config = args.listener_config(kind)?;
    let ctx = SubscribeContext::new();
    let mode = args.pop_mode();
    let limit = args.count;
    let json = args.json;

    tracing::info!(endpoint = %config.endpoint(), %kind, "tailing stream");

    // The consumer runs on a plain thread so an interrupted blocking pop
    // does not hold up process exit.
    let (done_tx, done_rx) = oneshot::channel();
    match kind {
        StreamKind::Blocks => {
            let listener = BlockListener::connect(&ctx, &config)?;
            thread::spawn(move || {
                let _ = done_tx.send(drain(listener, mode, limit, |(depth, block)| {
                    print_block(depth, &block, json)
                }));
            });
        }
        StreamKind::Transactions => {
            let listener = TransactionListener::connect(&ctx, &config)?;
            thread::spawn(move || {
                let _ = done_tx.send(drain(listener, mode, limit, |tx| print_tx(&tx, json)));
            });
        }
    }

    tokio::select! {
        outcome = done_rx => {
            let seen = outcome.map_err(|_| anyhow!("consumer thread exited without a result"))??;
            tracing::info!(items = seen, "done");
            Ok(())
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
            Ok(())
        }
    }
}

/// Pop and emit items until `limit` is reached or the listener dies with an
/// empty queue. Once `limit` items are out, a later listener failure is only
/// logged.
fn drain<T: Send + 'static>(
    listener: Listener<T>,
    mode: PopMode,
    limit: Option<u64>,
    mut emit: impl FnMut(T) -> Result<()>,
) -> Result<u64> {
    let mut seen = 0;
    while limit.map_or(true, |n| seen < n) {
        match listener.pop(mode) {
            Some(item) => {
                emit(item)?;
                seen += 1;
            }
            None => {
                let status = listener.status();
                if let Some(err) = status.failure {
                    return Err(anyhow!(err).context(format!(
                        "listener on {} terminated after {} items",
                        listener.endpoint(),
                        status.items_enqueued
                    )));
                }
            }
        }
    }
    let endpoint = listener.endpoint().to_string();
    if let Err(e) = listener.shutdown() {
        tracing::warn!(%endpoint, error = %e, "listener failed after the last requested item");
    }
    Ok(seen)
}

fn print_block(depth: u32, block: &Block, json: bool) -> Result<()> {
    let row = BlockRow {
        depth,
        hash: block.hash().to_hex(),
        tx_count: block.tx_count(),
        size: block.size(),
    };
    if json {
        println!("{}", serde_json::to_string(&row)?);
    } else {
        println!("{:>8}  {}  {:>5} txs  {:>8} bytes", row.depth, row.hash, row.tx_count, row.size);
    }
    Ok(())
}

fn print_tx(tx: &Transaction, json: bool) -> Result<()> {
    let row = TxRow {
        hash: tx.hash().to_hex(),
        size: tx.size(),
    };
    if json {
        println!("{}", serde_json::to_string(&row)?);
    } else {
        println!("{}  {:>8} bytes", row.hash, row.size);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Arc;

    use bytes::Bytes;
    use chainsub_core::{
        BitcoinDecoder, FrameSource, ListenerError, TransactionFraming, TransportError,
    };

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "chainsub", "txs", "--server", "node", "--port", "9000", "--skip-malformed",
        ])
        .unwrap();
        let Commands::Txs(args) = cli.command else {
            panic!("expected txs");
        };
        let config = args.listener_config(StreamKind::Transactions).unwrap();
        assert_eq!(config.endpoint().to_string(), "tcp://node:9000");
        assert_eq!(config.on_decode_error, DecodeErrorPolicy::Skip);
        assert_eq!(args.pop_mode(), PopMode::Timeout(Duration::from_millis(1_000)));
    }

    #[test]
    fn forever_conflicts_with_wait() {
        assert!(Cli::try_parse_from(["chainsub", "blocks", "--forever", "--wait-ms", "5"]).is_err());
        let cli = Cli::try_parse_from(["chainsub", "blocks", "--forever"]).unwrap();
        let Commands::Blocks(args) = cli.command else {
            panic!("expected blocks");
        };
        assert_eq!(args.pop_mode(), PopMode::Forever);
        assert_eq!(args.listener_config(StreamKind::Blocks).unwrap().endpoint().port, 5563);
    }

    // ─── drain ────────────────────────────────────────────────────────────────

    /// Replays frames, then fails with `Closed` if `then_close`, else idles.
    struct Replay {
        frames: VecDeque<Vec<u8>>,
        then_close: bool,
    }

    impl FrameSource for Replay {
        fn recv_frame(&mut self) -> Result<Option<Bytes>, TransportError> {
            match self.frames.pop_front() {
                Some(frame) => Ok(Some(Bytes::from(frame))),
                None if self.then_close => Err(TransportError::Closed),
                None => {
                    thread::sleep(Duration::from_millis(5));
                    Ok(None)
                }
            }
        }

        fn endpoint(&self) -> &str {
            "tcp://replay:5564"
        }
    }

    /// A 10-byte transaction whose version field carries `n`.
    fn tx(n: u32) -> Vec<u8> {
        let mut raw = n.to_le_bytes().to_vec();
        raw.extend([0u8; 6]);
        raw
    }

    fn tx_listener(frames: Vec<Vec<u8>>, then_close: bool) -> Listener<Transaction> {
        let source = Replay {
            frames: frames.into(),
            then_close,
        };
        let framing = TransactionFraming::new(Arc::new(BitcoinDecoder));
        Listener::spawn(source, framing, &ListenerConfig::transactions()).unwrap()
    }

    const POLL: PopMode = PopMode::Timeout(Duration::from_millis(20));

    #[test]
    fn drain_stops_at_count_despite_later_failure() {
        // A malformed frame right after the requested items kills the listener.
        let listener = tx_listener(vec![tx(1), tx(2), tx(3), b"bad".to_vec()], false);
        let mut sizes = Vec::new();

        let seen = drain(listener, POLL, Some(3), |t| {
            sizes.push(t.size());
            Ok(())
        })
        .unwrap();

        assert_eq!(seen, 3);
        assert_eq!(sizes, vec![10, 10, 10]);
    }

    #[test]
    fn drain_reports_dead_listener_once_queue_is_empty() {
        let listener = tx_listener(vec![tx(1), tx(2)], true);
        let mut seen = 0;

        let err = drain(listener, POLL, None, |_| {
            seen += 1;
            Ok(())
        })
        .unwrap_err();

        assert_eq!(seen, 2);
        assert!(err.to_string().contains("terminated after 2 items"), "{err:#}");
        assert!(matches!(
            err.downcast_ref::<ListenerError>(),
            Some(ListenerError::Disconnected { .. })
        ));
    }

    #[test]
    fn drain_propagates_emit_errors() {
        let listener = tx_listener(vec![tx(1)], false);
        let err = drain(listener, POLL, Some(5), |_| bail!("stdout closed")).unwrap_err();
        assert_eq!(err.to_string(), "stdout closed");
    }
}
