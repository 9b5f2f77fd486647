//! Automated second player. Each tick it fills waiting games in the enabled
//! tiers and plays a random closed tile in every tracked game where it is on
//! turn. Failures are logged per tier or game and never stop the loop.

use anyhow::{
    Result,
    bail,
};
use danger_tiles::{
    GameContract,
    GameState,
    Tier,
    format_mon,
    join_with_required_payment,
    lobby::resolve_active_game,
    tiles::pick_unrevealed,
    types::short_address,
};
use ethers::types::{
    Address,
    U256,
};
use rand::{
    SeedableRng,
    rngs::StdRng,
};
use std::{
    collections::BTreeSet,
    future::Future,
    time::Duration,
};
use tokio::time::{
    MissedTickBehavior,
    interval,
    sleep,
};
use tracing::{
    debug,
    info,
    warn,
};

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub poll_interval: Duration,
    pub move_delay: Duration,
    pub max_concurrent_games: usize,
    pub tiers: Vec<Tier>,
    pub min_balance: U256,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5000),
            move_delay: Duration::from_millis(1500),
            max_concurrent_games: 3,
            tiers: Tier::ALL.to_vec(),
            min_balance: U256::exp10(18) * U256::from(2u8),
        }
    }
}

/// What one iteration did; used for logging and tests.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TickReport {
    pub joined: Vec<u64>,
    pub moves: Vec<(u64, u8)>,
    /// `(game_id, bot_won)`
    pub finished: Vec<(u64, bool)>,
}

pub struct Bot<C> {
    contract: C,
    address: Address,
    config: BotConfig,
    active: BTreeSet<u64>,
    rng: StdRng,
}

impl<C: GameContract> Bot<C> {
    pub fn new(contract: C, config: BotConfig) -> Result<Self> {
        Self::with_rng(contract, config, StdRng::from_os_rng())
    }

    pub fn with_seed(contract: C, config: BotConfig, seed: u64) -> Result<Self> {
        Self::with_rng(contract, config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(contract: C, config: BotConfig, rng: StdRng) -> Result<Self> {
        let Some(address) = contract.signer() else {
            bail!(danger_tiles::Error::WalletMissing);
        };
        Ok(Self {
            contract,
            address,
            config,
            active: BTreeSet::new(),
            rng,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn contract(&self) -> &C {
        &self.contract
    }

    pub fn active_games(&self) -> impl Iterator<Item = u64> + '_ {
        self.active.iter().copied()
    }

    /// Refuses to go on when the bot cannot cover a round of stakes.
    pub async fn ensure_funded(&self) -> Result<U256> {
        let balance = self.contract.balance(self.address).await?;
        if balance < self.config.min_balance {
            bail!(
                "bot balance {} MON is below the minimum of {} MON",
                format_mon(balance),
                format_mon(self.config.min_balance)
            );
        }
        info!(bot = %short_address(self.address), balance = %format_mon(balance), "bot funded");
        Ok(balance)
    }

    /// Picks up the game the contract still has the bot seated in.
    pub async fn resume_active_game(&mut self) -> Result<Option<u64>> {
        let resumed = resolve_active_game(&self.contract, self.address).await?;
        Ok(resumed.map(|(game_id, _)| {
            self.active.insert(game_id);
            game_id
        }))
    }

    pub async fn check_and_join_games(&mut self) -> Vec<u64> {
        let mut joined = Vec::new();
        for tier in self.config.tiers.clone() {
            if self.active.len() >= self.config.max_concurrent_games {
                debug!(tracked = self.active.len(), "at game limit, not joining");
                break;
            }
            match self.try_join_tier(tier).await {
                Ok(Some(game_id)) => joined.push(game_id),
                Ok(None) => {}
                Err(e) => warn!(%tier, error = %e, "failed to join waiting game"),
            }
        }
        joined
    }

    async fn try_join_tier(&mut self, tier: Tier) -> danger_tiles::Result<Option<u64>> {
        let Some(waiting) = self.contract.get_waiting_game(tier).await? else {
            return Ok(None);
        };
        if self.active.contains(&waiting) {
            return Ok(None);
        }
        let game = self.contract.get_game(waiting).await?;
        if game.player1 == self.address {
            debug!(game_id = waiting, "waiting game is our own");
            return Ok(None);
        }

        info!(%tier, game_id = waiting, opponent = %short_address(game.player1), "joining waiting game");
        join_with_required_payment(&self.contract, tier).await?;
        // Someone else may have taken the seat first, leaving us in a new game.
        // The join is mined at this point, so a failed lookup must not leave
        // the game untracked.
        let game_id = match self.contract.player_active_game(self.address).await {
            Ok(active) => active.unwrap_or(waiting),
            Err(e) => {
                warn!(game_id = waiting, error = %e, "active game lookup failed, tracking waiting game");
                waiting
            }
        };
        self.active.insert(game_id);
        info!(%tier, game_id, "joined game");
        Ok(Some(game_id))
    }

    pub async fn play_active_games(&mut self, report: &mut TickReport) {
        let tracked: Vec<u64> = self.active.iter().copied().collect();
        for game_id in tracked {
            if let Err(e) = self.play_game(game_id, report).await {
                warn!(game_id, error = %e, "failed to advance game");
            }
        }
    }

    async fn play_game(
        &mut self,
        game_id: u64,
        report: &mut TickReport,
    ) -> danger_tiles::Result<()> {
        let game = self.contract.get_game(game_id).await?;
        match game.state {
            GameState::Finished => {
                let won = game.winner == self.address;
                if won {
                    info!(game_id, payout = %format_mon(game.pot()), "bot won");
                } else {
                    info!(game_id, winner = %short_address(game.winner), "bot lost");
                }
                self.active.remove(&game_id);
                report.finished.push((game_id, won));
            }
            GameState::InProgress if game.is_turn_of(self.address) => {
                sleep(self.config.move_delay).await;
                let Some(tile) = pick_unrevealed(game.revealed_tiles, &mut self.rng) else {
                    warn!(game_id, "no closed tile left to open");
                    return Ok(());
                };
                info!(game_id, tile, "making move");
                self.contract.make_move(game_id, tile).await?;
                report.moves.push((game_id, tile));
            }
            state => debug!(game_id, %state, "nothing to do"),
        }
        Ok(())
    }

    pub async fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        if self.active.len() < self.config.max_concurrent_games {
            report.joined = self.check_and_join_games().await;
        }
        self.play_active_games(&mut report).await;
        report
    }

    /// Ticks every poll interval until `shutdown` resolves. A tick that has
    /// started runs to completion first.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);
        info!(
            bot = %short_address(self.address),
            tiers = ?self.config.tiers,
            max_games = self.config.max_concurrent_games,
            "bot started"
        );
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("shutdown requested, stopping bot");
                    break;
                }
                _ = ticker.tick() => {
                    let report = self.tick().await;
                    debug!(?report, tracked = self.active.len(), "tick complete");
                }
            }
        }
        Ok(())
    }
}
