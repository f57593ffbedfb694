//! # transfer-runner
//!
//! Runs the exchange workflows and balance queries against the configured
//! ledger gateway, or against an in-process simulated ledger.
//!
//! ## Examples
//!
//! ```text
//! transfer-runner --simulate royalty-exchange --price 33
//! transfer-runner plain-exchange --contract 0x00000000000000000000000000000000000013a5
//! transfer-runner balance 0.0.1001
//! transfer-runner contract-balance 0x00000000000000000000000000000000000013a5
//! ```
//!
//! ## Environment Variables
//!
//! `NETWORK` selects the mode; `{MODE}_OPERATOR_ACCOUNT_ID`,
//! `{MODE}_OPERATOR_KEYPAIR`, `{MODE}_GATEWAY_URL` and
//! `{MODE}_MIRROR_NODE_ENDPOINT` configure it. A `.env` file is honored.
//! `RUST_LOG` controls log verbosity (default `info`).

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use royalty_transfer::config::{AppConfig, NetworkMode};
use royalty_transfer::directory::{DirectoryResolver, MirrorDirectory};
use royalty_transfer::ledger::{AccountId, EvmAddress, GatewayLedger, LedgerNetwork, SimulatedLedger};
use royalty_transfer::utils::{format_minor, parse_major, MINOR_UNITS_PER_MAJOR};
use royalty_transfer::workflows::{self, ExchangeOutcome};
use royalty_transfer::{Error, Result, Services};

/// Operator balance of a simulated ledger.
const SIMULATED_OPERATOR_BALANCE: u64 = 50_000 * MINOR_UNITS_PER_MAJOR;

#[derive(Parser, Debug)]
#[command(name = "transfer-runner", version, about = "Delegated royalty transfer client")]
struct Cli {
    /// Run against an in-process ledger instead of the configured network
    #[arg(long, global = true)]
    simulate: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sell one serial of a royalty-free NFT through the spender contract
    PlainExchange {
        /// Contract-facing address of the spender
        #[arg(long, env = "SPENDER_CONTRACT_ADDRESS")]
        contract: Option<EvmAddress>,
    },
    /// Sell one serial of an NFT with a 1/10 royalty and verify the split
    RoyaltyExchange {
        #[arg(long, env = "SPENDER_CONTRACT_ADDRESS")]
        contract: Option<EvmAddress>,

        /// Price in major units
        #[arg(long, default_value = "33")]
        price: String,
    },
    /// Native balance of an account
    Balance { account: AccountId },
    /// Native balance of a contract, looked up by address
    ContractBalance { address: EvmAddress },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BalanceReport {
    subject: String,
    minor_units: u64,
    major_units: String,
}

struct Runtime {
    services: Services,
    simulated: Option<Arc<SimulatedLedger>>,
}

impl Runtime {
    fn simulated() -> Self {
        let (ledger, operator) = SimulatedLedger::genesis(SIMULATED_OPERATOR_BALANCE);
        let ledger = Arc::new(ledger);
        let config = AppConfig::for_operator(NetworkMode::Testnet, operator);
        info!("Using simulated ledger, operator {}", config.operator.account_id);

        Self {
            services: Services::new(&config, ledger.clone(), ledger.clone()),
            simulated: Some(ledger),
        }
    }

    fn networked() -> Result<Self> {
        let config = AppConfig::from_env()?;
        info!("Configuration loaded");
        info!("   Network: {}", config.network);
        info!("   Gateway: {}", config.gateway_url);
        info!("   Mirror: {}", config.mirror_url);
        info!("   Operator: {}", config.operator.account_id);

        let ledger: Arc<dyn LedgerNetwork> = Arc::new(GatewayLedger::new(
            &config.gateway_url,
            config.request_timeout,
            config.receipt_poll_interval,
        )?);
        let directory: Arc<dyn DirectoryResolver> =
            Arc::new(MirrorDirectory::new(config.mirror_url.clone(), config.request_timeout)?);

        Ok(Self {
            services: Services::new(&config, ledger, directory),
            simulated: None,
        })
    }

    /// The given contract, or a freshly registered one on a simulated ledger.
    fn contract(&self, contract: Option<EvmAddress>) -> Result<EvmAddress> {
        match (contract, &self.simulated) {
            (Some(address), _) => Ok(address),
            (None, Some(ledger)) => Ok(ledger.register_contract(0).to_evm_address()),
            (None, None) => Err(Error::InvalidOperation(
                "--contract (or SPENDER_CONTRACT_ADDRESS) is required".to_string(),
            )),
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).map_err(|e| Error::Encoding(e.to_string()))?;
    println!("{}", rendered);
    Ok(())
}

fn log_outcome(outcome: &ExchangeOutcome) {
    info!(
        "Serial {} of {} sold by {} to {} for {} ({})",
        outcome.serial,
        outcome.asset.id,
        outcome.seller,
        outcome.buyer,
        format_minor(outcome.price),
        outcome.receipt.transaction_id
    );
    if let Some(settlement) = &outcome.settlement {
        info!(
            "Collector {} received {}, seller kept {}",
            settlement.collector,
            format_minor(settlement.royalty),
            format_minor(settlement.seller_net)
        );
    }
}

async fn run(cli: Cli) -> Result<()> {
    let runtime = if cli.simulate {
        Runtime::simulated()
    } else {
        Runtime::networked()?
    };
    let services = &runtime.services;

    match cli.command {
        Command::PlainExchange { contract } => {
            let contract = runtime.contract(contract)?;
            let outcome = workflows::run_plain_exchange(services, &contract).await?;
            log_outcome(&outcome);
            print_json(&outcome)
        }
        Command::RoyaltyExchange { contract, price } => {
            let contract = runtime.contract(contract)?;
            let price = parse_major(&price)?;
            let outcome = workflows::run_royalty_exchange(services, &contract, price).await?;
            log_outcome(&outcome);
            print_json(&outcome)
        }
        Command::Balance { account } => {
            let balance = services.balances.query_native_balance(account).await?;
            print_json(&BalanceReport {
                subject: account.to_string(),
                minor_units: balance,
                major_units: format_minor(balance),
            })
        }
        Command::ContractBalance { address } => {
            let balance = services.balances.query_contract_native_balance(&address).await?;
            print_json(&BalanceReport {
                subject: address.to_string(),
                minor_units: balance,
                major_units: format_minor(balance),
            })
        }
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{}", e);
        std::process::exit(1);
    }
}
