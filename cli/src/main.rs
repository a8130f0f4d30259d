//! `blink`: inspect and execute Solana Action URLs from the terminal.
//!
//! Four subcommands: `inspect` describes an action endpoint, `execute`
//! runs one (dry-run by default requires nothing but an account;
//! submission requires a keypair), `services` lists the built-in
//! catalog, and `link` expands a catalog entry into a concrete URL.
//! Failures print the structured error JSON to stderr and exit 1.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use blink_actions::catalog;
use blink_actions::ports::Signer;
use blink_actions::{
    ActionError, ActionsConfig, ErrorCode, ExecuteOutcome, ExecutionRequest, ParamValue, Pipeline,
};
use blink_ledger::{KeypairSigner, RpcLedger};

const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";

#[derive(Parser)]
#[command(name = "blink", version, about = "Inspect and execute Solana Action URLs")]
struct Cli {
    /// RPC node used for simulation and submission.
    #[arg(long, global = true, default_value = DEFAULT_RPC_URL)]
    rpc_url: String,

    /// Network timeout in seconds for every HTTP and RPC call.
    #[arg(long, global = true)]
    timeout: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve an Action URL and describe what it offers.
    Inspect {
        /// Action URL in any accepted encoding.
        url: String,
    },

    /// Fetch, sign, and submit an action's transaction.
    Execute {
        /// Action URL in any accepted encoding.
        url: String,

        /// Path to a 64-byte JSON keypair file.
        #[arg(long)]
        keypair: Option<PathBuf>,

        /// Account to build the transaction for. Defaults to the
        /// keypair's address.
        #[arg(long)]
        account: Option<String>,

        /// Action parameter as name=value. Repeatable.
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Simulate only; never sign or submit.
        #[arg(long)]
        dry_run: bool,
    },

    /// List the built-in service catalog.
    Services,

    /// Expand a catalog service into a concrete Action URL.
    Link {
        /// Service id (see `blink services`).
        service: String,

        /// Template parameter as name=value. Repeatable.
        #[arg(long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,
    },
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            match serde_json::to_string_pretty(&error.to_json()) {
                Ok(rendered) => eprintln!("{rendered}"),
                Err(_) => eprintln!("{error}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), ActionError> {
    let config = ActionsConfig {
        timeout_seconds: cli.timeout,
        ..Default::default()
    };

    match cli.command {
        Command::Inspect { url } => {
            let pipeline = Pipeline::new(&config)?;
            let result = pipeline.inspect(&url).await?;
            print_json(&result)
        }
        Command::Execute {
            url,
            keypair,
            account,
            params,
            dry_run,
        } => {
            let pipeline = Pipeline::new(&config)?;
            let timeout = std::time::Duration::from_secs(u64::from(cli.timeout.unwrap_or(10).max(1)));
            let ledger = RpcLedger::new(&cli.rpc_url, timeout)?;

            let signer: Box<dyn Signer> = match keypair {
                Some(path) => Box::new(KeypairSigner::from_file(&path)?),
                None if dry_run => {
                    let account = account.clone().ok_or_else(|| {
                        ActionError::new(
                            ErrorCode::BadArgs,
                            "--dry-run without --keypair requires --account",
                            false,
                        )
                    })?;
                    Box::new(UnconfiguredSigner { account })
                }
                None => {
                    return Err(ActionError::new(
                        ErrorCode::BadArgs,
                        "--keypair is required unless --dry-run",
                        false,
                    ));
                }
            };

            let account = account.unwrap_or_else(|| signer.address());
            let request = ExecutionRequest::new(url, account)
                .with_params(coerce_params(params))
                .with_dry_run(dry_run);

            let outcome = pipeline.execute(&request, &ledger, signer.as_ref()).await?;
            report_outcome(&outcome)
        }
        Command::Services => {
            for service in catalog::SERVICES {
                println!(
                    "{:<12} {:<10} {}",
                    service.id,
                    service.category.as_str(),
                    service.display_name
                );
            }
            Ok(())
        }
        Command::Link { service, params } => {
            let params: BTreeMap<String, String> = params.into_iter().collect();
            let url = catalog::build_url(&service, &params)?;
            println!("{url}");
            Ok(())
        }
    }
}

/// Map CLI text values onto the protocol's number/text distinction so
/// amounts serialize as JSON numbers.
fn coerce_params(params: Vec<(String, String)>) -> BTreeMap<String, ParamValue> {
    params
        .into_iter()
        .map(|(name, value)| {
            let coerced = if let Ok(int) = value.parse::<i64>() {
                ParamValue::from(int)
            } else if let Ok(float) = value.parse::<f64>() {
                ParamValue::from(float)
            } else {
                ParamValue::from(value)
            };
            (name, coerced)
        })
        .collect()
}

fn report_outcome(outcome: &ExecuteOutcome) -> Result<(), ActionError> {
    match outcome {
        ExecuteOutcome::Simulated { simulation, .. } => {
            tracing::info!(success = simulation.success, "simulation finished");
        }
        ExecuteOutcome::Submitted { signature, .. } => {
            tracing::info!(%signature, "transaction submitted");
        }
    }
    print_json(outcome)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), ActionError> {
    let rendered = serde_json::to_string_pretty(value).map_err(|e| {
        ActionError::new(
            ErrorCode::Internal,
            format!("failed to render output: {e}"),
            false,
        )
    })?;
    println!("{rendered}");
    Ok(())
}

/// Placeholder signer for keypair-less dry runs: provides the account
/// to build against, refuses to sign.
struct UnconfiguredSigner {
    account: String,
}

impl Signer for UnconfiguredSigner {
    fn sign(&self, _transaction: &str) -> Result<String, ActionError> {
        Err(ActionError::new(
            ErrorCode::Signing,
            "signing requires --keypair",
            false,
        ))
    }

    fn address(&self) -> String {
        self.account.clone()
    }
}
