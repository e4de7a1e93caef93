mod commands;

use std::io::IsTerminal;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scopestack")]
#[command(about = "Scope-bound allocation tracking demo", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log every frame and allocation event (overrides RUST_LOG)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Concatenate two strings, XOR every byte with 42, and show the stack at
    /// each step as the result is promoted outward
    Xor {
        /// First string
        a: String,

        /// Second string
        b: String,

        /// Only print the result line
        #[arg(short, long)]
        quiet: bool,
    },

    /// Build nested frames, fill them, and print the stack
    Dump {
        /// Number of nested frames
        #[arg(short, long, default_value = "2")]
        depth: usize,

        /// Allocations made in every frame
        #[arg(short, long, default_value = "2")]
        allocations: usize,

        /// Ownership set used by every frame
        #[arg(short, long, value_enum, default_value = "tree")]
        kind: Kind,

        /// Capacity of array frames
        #[arg(long, default_value = "4")]
        capacity: usize,

        /// Print the stack's counters after the frames are popped
        #[arg(long)]
        stats: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Tree,
    Array,
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("scopestack=debug"),
        _ => EnvFilter::new("scopestack=trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Xor { a, b, quiet } => commands::xor(&mut out, &a, &b, quiet),
        Commands::Dump {
            depth,
            allocations,
            kind,
            capacity,
            stats,
        } => {
            let kind = match kind {
                Kind::Tree => scopestack::FrameKind::Tree,
                Kind::Array => scopestack::FrameKind::array(capacity),
            };
            commands::dump(&mut out, depth, allocations, kind, stats)
        }
    }
}
