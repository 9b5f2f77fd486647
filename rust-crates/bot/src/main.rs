use anyhow::{
    Context,
    Result,
    anyhow,
};
use clap::{
    ArgGroup,
    Parser,
};
use danger_tiles::{
    ContractClient,
    Tier,
    logging,
    resolve_network,
    wallets::{
        find_wallet,
        resolve_wallet_dir,
        unlock_wallet,
        wallet_from_env,
    },
};
use danger_tiles_bot::{
    Bot,
    BotConfig,
};
use deployments::{
    DeploymentEnv,
    DeploymentStore,
};
use ethers::{
    signers::LocalWallet,
    utils::parse_ether,
};
use std::time::Duration;
use tracing::{
    info,
    warn,
};

const PRIVATE_KEY_ENV: &str = "BOT_PRIVATE_KEY";

#[derive(Parser, Debug)]
#[command(
    name = "danger-tiles-bot",
    about = "Automated second player for Danger Tiles",
    version,
    group(ArgGroup::new("network").args(["testnet", "local"]))
)]
struct Args {
    /// Play on Monad testnet (default)
    #[arg(long)]
    testnet: bool,

    /// Play against a local node
    #[arg(long)]
    local: bool,

    /// Override RPC URL
    #[arg(long)]
    rpc_url: Option<String>,

    /// Override contract address
    #[arg(long)]
    contract: Option<String>,

    /// Keystore wallet name; without it the key is read from BOT_PRIVATE_KEY
    #[arg(long)]
    wallet: Option<String>,

    /// Override keystore directory (defaults to ~/.danger-tiles/wallets)
    #[arg(long)]
    wallet_dir: Option<String>,

    /// Milliseconds between polls
    #[arg(long, default_value_t = 5000)]
    poll_ms: u64,

    /// Milliseconds to wait before each move
    #[arg(long, default_value_t = 1500)]
    move_delay_ms: u64,

    /// Most games tracked at once
    #[arg(long, default_value_t = 3)]
    max_games: usize,

    /// Tiers to join, comma separated
    #[arg(long, value_delimiter = ',', default_value = "0,1,2")]
    tiers: Vec<u8>,

    /// Refuse to start below this balance, in MON
    #[arg(long, default_value_t = 2.0)]
    min_balance: f64,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_filter: String,
}

impl Args {
    fn env(&self) -> DeploymentEnv {
        if self.local {
            DeploymentEnv::Local
        } else {
            DeploymentEnv::Testnet
        }
    }

    fn bot_config(&self) -> Result<BotConfig> {
        let tiers = self
            .tiers
            .iter()
            .map(|t| Tier::try_from(*t))
            .collect::<Result<Vec<_>, _>>()
            .context("parsing --tiers")?;
        let min_balance = parse_ether(self.min_balance)
            .map_err(|e| anyhow!("invalid --min-balance {}: {e}", self.min_balance))?;
        Ok(BotConfig {
            poll_interval: Duration::from_millis(self.poll_ms),
            move_delay: Duration::from_millis(self.move_delay_ms),
            max_concurrent_games: self.max_games,
            tiers,
            min_balance,
        })
    }

    fn load_wallet(&self) -> Result<LocalWallet> {
        match self.wallet.as_deref() {
            Some(name) => {
                let dir = resolve_wallet_dir(self.wallet_dir.as_deref())
                    .context("resolving wallet directory")?;
                let descriptor =
                    find_wallet(&dir, name).context("locating requested wallet")?;
                unlock_wallet(&descriptor).context("unlocking keystore wallet")
            }
            None => wallet_from_env(PRIVATE_KEY_ENV)
                .with_context(|| format!("loading bot key from {PRIVATE_KEY_ENV}")),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_tracing(&args.log_filter);

    let config = args.bot_config()?;
    let store = DeploymentStore::new(args.env()).context("opening deployment store")?;
    let network = resolve_network(
        &store,
        args.rpc_url.as_deref(),
        args.contract.as_deref(),
    )
    .context("resolving network")?;
    let wallet = args.load_wallet()?;

    let client = ContractClient::connect(
        &network.rpc_url,
        network.contract,
        network.chain_id,
        Some(wallet),
    )
    .await
    .context("connecting to rpc")?;
    let mut bot = Bot::new(client, config)?;
    bot.ensure_funded().await?;

    match bot.resume_active_game().await {
        Ok(Some(game_id)) => info!(game_id, "resumed active game"),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "could not look up active game"),
    }

    bot.run(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    })
    .await
}
