//! Tether command-line tool
//!
//! Talks to a running bridge (`send`, `repl`), evaluates instructions against
//! a simulated object graph (`eval`, `serve`), and prints signature tokens
//! (`sig`).

mod commands;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tether_engine::BridgeConfig;
use tracing_subscriber::EnvFilter;

use output::{resolve_color_choice, StyledOutput};

/// Environment variable holding the log filter
const LOG_ENV: &str = "TETHER_LOG";

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Reflection bridge client and tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to $TETHER_CONFIG, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Color output: auto, always, never
    #[arg(long, global = true)]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate instructions against a simulated graph
    Eval {
        /// Graph file (JSON)
        #[arg(short, long)]
        graph: PathBuf,
        /// Root used by unlabeled instructions
        #[arg(short, long)]
        root: Option<String>,
        /// Print the reflection cache afterwards
        #[arg(long)]
        cache: bool,
        /// Instructions to evaluate, in order
        #[arg(required = true)]
        instructions: Vec<String>,
    },

    /// Serve a simulated graph over TCP
    Serve {
        /// Graph file (JSON)
        #[arg(short, long)]
        graph: PathBuf,
        /// Root used by unlabeled instructions
        #[arg(short, long)]
        root: Option<String>,
        /// Listen address (overrides the config)
        #[arg(short, long)]
        addr: Option<String>,
    },

    /// Send one request to a running bridge
    Send {
        /// Bridge address (overrides the config)
        #[arg(short, long)]
        addr: Option<String>,
        /// Instruction or control command
        request: String,
    },

    /// Start an interactive session with a running bridge
    Repl {
        /// Bridge address (overrides the config)
        #[arg(short, long)]
        addr: Option<String>,
    },

    /// Print signature tokens for type names
    Sig {
        /// Parameter type names, e.g. int java.lang.String
        types: Vec<String>,
        /// Return type name; prints the full signature
        #[arg(long)]
        returns: Option<String>,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<BridgeConfig> {
    let config = match path {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::from_env()?,
    };
    Ok(config)
}

fn init_logging(fallback: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli, out: &mut StyledOutput) -> anyhow::Result<bool> {
    let config = load_config(cli.config.as_ref())?;
    init_logging(&config.log.filter);

    match cli.command {
        Commands::Eval {
            graph,
            root,
            cache,
            instructions,
        } => commands::eval::execute(&graph, &instructions, root.as_deref(), cache, &config, out),

        Commands::Serve { graph, root, addr } => {
            commands::serve::execute(graph, root, addr, &config, out)?;
            Ok(true)
        }

        Commands::Send { addr, request } => {
            let addr = addr.unwrap_or_else(|| config.transport.addr.clone());
            commands::send::execute(&addr, &request, out)
        }

        Commands::Repl { addr } => {
            let addr = addr.unwrap_or_else(|| config.transport.addr.clone());
            commands::repl::execute(&addr, out)?;
            Ok(true)
        }

        Commands::Sig { types, returns } => {
            commands::sig::execute(&types, returns.as_deref(), out)?;
            Ok(true)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut out = StyledOutput::new(resolve_color_choice(cli.color.as_deref()));

    let result = run(cli, &mut out);
    let code = match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            out.error(&format!("error: {:#}", e));
            ExitCode::FAILURE
        }
    };
    out.flush();
    code
}
