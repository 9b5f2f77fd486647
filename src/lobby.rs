use crate::{
    client::{
        GameContract,
        format_mon,
    },
    error::Result,
    types::{
        GameData,
        GameState,
        Tier,
    },
};
use ethers::types::{
    Address,
    U256,
};
use futures::future::try_join_all;
use std::fmt;
use tracing::{
    debug,
    info,
};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LobbyStats {
    pub total_games: u64,
    /// Waiting game per tier, in [`Tier::ALL`] order.
    pub waiting: Vec<(Tier, Option<u64>)>,
    pub balance: Option<U256>,
}

impl LobbyStats {
    pub fn waiting_in(&self, tier: Tier) -> Option<u64> {
        self.waiting
            .iter()
            .find(|(t, _)| *t == tier)
            .and_then(|(_, id)| *id)
    }
}

impl fmt::Display for LobbyStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total games: {}", self.total_games)?;
        for (tier, waiting) in &self.waiting {
            match waiting {
                Some(id) => writeln!(f, "  {tier}: game #{id} waiting")?,
                None => writeln!(f, "  {tier}: no one waiting")?,
            }
        }
        if let Some(balance) = self.balance {
            writeln!(f, "Balance: {} MON", format_mon(balance))?;
        }
        Ok(())
    }
}

/// Game counter and waiting games for every tier, fetched concurrently.
/// `player` adds its balance.
pub async fn lobby_stats<C: GameContract>(
    contract: &C,
    player: Option<Address>,
) -> Result<LobbyStats> {
    let waiting_ids =
        try_join_all(Tier::ALL.map(|tier| contract.get_waiting_game(tier))).await?;
    let total_games = contract.game_counter().await?;
    let balance = match player {
        Some(who) => Some(contract.balance(who).await?),
        None => None,
    };
    Ok(LobbyStats {
        total_games,
        waiting: Tier::ALL.into_iter().zip(waiting_ids).collect(),
        balance,
    })
}

/// The game `player` is still seated in, if any. A finished game is not
/// resumed even when the contract has not cleared the pointer yet.
pub async fn resolve_active_game<C: GameContract>(
    contract: &C,
    player: Address,
) -> Result<Option<(u64, GameData)>> {
    let Some(game_id) = contract.player_active_game(player).await? else {
        debug!(?player, "no active game");
        return Ok(None);
    };
    let game = contract.get_game(game_id).await?;
    if game.state == GameState::Finished {
        debug!(game_id, "active game pointer refers to a finished game");
        return Ok(None);
    }
    info!(game_id, state = %game.state, "resuming active game");
    Ok(Some((game_id, game)))
}
