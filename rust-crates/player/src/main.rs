use clap::{
    ArgGroup,
    Parser,
    Subcommand,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use danger_tiles::{
    ContractClient,
    GameContract,
    NetworkConfig,
    Tier,
    format_mon,
    history::{
        DEFAULT_LIMIT,
        DEFAULT_SCAN,
        recent_games,
    },
    join_with_required_payment,
    lobby::{
        lobby_stats,
        resolve_active_game,
    },
    logging,
    record_contract,
    resolve_network,
    wallets::{
        find_wallet,
        resolve_wallet_dir,
        unlock_wallet,
        wallet_from_env,
    },
};
use danger_tiles_player::watch::watch;
use deployments::{
    DeploymentEnv,
    DeploymentStore,
};
use ethers::{
    signers::LocalWallet,
    types::{
        Address,
        H256,
    },
};
use std::time::Duration;

const PRIVATE_KEY_ENV: &str = "PLAYER_PRIVATE_KEY";

#[derive(Parser, Debug)]
#[command(
    name = "danger-tiles",
    about = "Play Danger Tiles from the terminal",
    version,
    group(ArgGroup::new("network").args(["testnet", "local"]))
)]
struct Cli {
    /// Use Monad testnet (default)
    #[arg(long, global = true)]
    testnet: bool,

    /// Use a local node
    #[arg(long, global = true)]
    local: bool,

    /// Override RPC URL
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Override contract address
    #[arg(long, global = true)]
    contract: Option<String>,

    /// Keystore wallet name; falls back to PLAYER_PRIVATE_KEY
    #[arg(long, global = true)]
    wallet: Option<String>,

    /// Override keystore directory (defaults to ~/.danger-tiles/wallets)
    #[arg(long, global = true)]
    wallet_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Total games, waiting game per tier and your balance
    Lobby,
    /// Join the waiting game of a tier or open a new one
    Join {
        /// 0 = 1 MON, 1 = 5 MON, 2 = 10 MON
        #[arg(long)]
        tier: u8,
    },
    /// Open a tile
    Move {
        #[arg(long)]
        game: u64,
        /// 0..=24, row-major
        #[arg(long)]
        tile: u8,
    },
    /// Follow a game until it finishes
    Watch {
        /// Defaults to your active game
        #[arg(long)]
        game: Option<u64>,
        #[arg(long, default_value_t = 3000)]
        interval_ms: u64,
    },
    /// Store a contract address for the selected network so later commands
    /// find it without --contract
    Record {
        #[arg(long)]
        address: Address,
    },
    /// Your recently finished games
    History {
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
        #[arg(long, default_value_t = DEFAULT_SCAN)]
        scan: u64,
        /// Look up another address instead of your wallet
        #[arg(long)]
        player: Option<Address>,
    },
}

impl Cli {
    fn env(&self) -> DeploymentEnv {
        if self.local {
            DeploymentEnv::Local
        } else {
            DeploymentEnv::Testnet
        }
    }

    /// Reads work without a wallet; writes fail later with `WalletMissing`.
    fn load_wallet(&self) -> Result<Option<LocalWallet>> {
        if let Some(name) = self.wallet.as_deref() {
            let dir = resolve_wallet_dir(self.wallet_dir.as_deref())
                .wrap_err("resolving wallet directory")?;
            let descriptor = find_wallet(&dir, name).wrap_err("locating requested wallet")?;
            let wallet = unlock_wallet(&descriptor).wrap_err("unlocking keystore wallet")?;
            return Ok(Some(wallet));
        }
        if std::env::var_os(PRIVATE_KEY_ENV).is_some() {
            let wallet = wallet_from_env(PRIVATE_KEY_ENV)
                .wrap_err_with(|| format!("loading key from {PRIVATE_KEY_ENV}"))?;
            return Ok(Some(wallet));
        }
        Ok(None)
    }
}

fn me(client: &ContractClient) -> Result<Address> {
    client
        .signer()
        .ok_or_else(|| eyre!(danger_tiles::Error::WalletMissing))
}

fn print_tx(network: &NetworkConfig, tx_hash: H256) {
    match network.tx_url(tx_hash) {
        Some(url) => println!("tx: {url}"),
        None => println!("tx: {tx_hash:?}"),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    // `watch` redraws the board on stdout, so its logs go to a file.
    let _guard = match cli.command {
        Command::Watch { .. } => Some(logging::init_file_tracing(
            &logging::default_log_dir(),
            "watch.log",
            "info",
        )),
        _ => {
            logging::init_tracing("warn");
            None
        }
    };

    let store = DeploymentStore::new(cli.env()).map_err(|e| eyre!("{e:#}"))?;
    if let Command::Record { address } = cli.command {
        let record = record_contract(&store, address, cli.rpc_url.as_deref())
            .wrap_err("recording deployment")?;
        println!(
            "Recorded {address:?} for {} (chain {}, rpc {}) in {}",
            store.env(),
            record.chain_id,
            record.rpc_url,
            store.path().display()
        );
        return Ok(());
    }
    let network = resolve_network(&store, cli.rpc_url.as_deref(), cli.contract.as_deref())
        .wrap_err("resolving network")?;
    let wallet = cli.load_wallet()?;
    let client = ContractClient::connect(
        &network.rpc_url,
        network.contract,
        network.chain_id,
        wallet,
    )
    .await
    .wrap_err("connecting to rpc")?;

    match cli.command {
        Command::Lobby => {
            let stats = lobby_stats(&client, client.signer())
                .await
                .wrap_err("loading lobby")?;
            print!("{stats}");
        }
        Command::Join { tier } => {
            let tier = Tier::try_from(tier)?;
            let confirmed = join_with_required_payment(&client, tier)
                .await
                .wrap_err("joining game")?;
            print_tx(&network, confirmed.tx_hash);
            match client.player_active_game(me(&client)?).await? {
                Some(game_id) => {
                    let game = client.get_game(game_id).await?;
                    println!("Game #{game_id} ({tier}): {}", game.state);
                }
                None => println!("Joined {tier}, but no active game is recorded yet"),
            }
        }
        Command::Move { game, tile } => {
            let confirmed = client
                .make_move(game, tile)
                .await
                .wrap_err_with(|| format!("opening tile {tile} in game #{game}"))?;
            print_tx(&network, confirmed.tx_hash);
            let state = client.get_game(game).await?;
            println!("Game #{game}: {}", state.status_for(client.signer()));
        }
        Command::Watch { game, interval_ms } => {
            let game_id = match game {
                Some(id) => id,
                None => resolve_active_game(&client, me(&client)?)
                    .await?
                    .map(|(id, _)| id)
                    .ok_or_else(|| eyre!("no active game; pass --game"))?,
            };
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %e, "failed to listen for ctrl-c");
                    std::future::pending::<()>().await;
                }
            };
            let result = watch(
                &client,
                game_id,
                client.signer(),
                Duration::from_millis(interval_ms),
                &mut std::io::stdout(),
                shutdown,
            )
            .await
            .wrap_err("watching game")?;
            if result.is_none() {
                println!("Stopped watching game #{game_id}");
            }
        }
        // Returned before connecting.
        Command::Record { .. } => {}
        Command::History {
            limit,
            scan,
            player,
        } => {
            let player = match player {
                Some(address) => address,
                None => me(&client)?,
            };
            let entries = recent_games(&client, player, scan, limit)
                .await
                .wrap_err("loading history")?;
            if entries.is_empty() {
                println!("No finished games in the last {scan} games");
            }
            for entry in &entries {
                println!("{entry}");
            }
            if !entries.is_empty() {
                let wins = entries.iter().filter(|e| e.won).count();
                println!(
                    "{wins}/{} won, balance {} MON",
                    entries.len(),
                    format_mon(client.balance(player).await?)
                );
            }
        }
    }
    Ok(())
}
