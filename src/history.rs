use crate::{
    client::{
        GameContract,
        format_mon,
    },
    error::Result,
    types::{
        GameState,
        Tier,
        short_address,
    },
};
use ethers::types::{
    Address,
    U256,
};
use std::fmt;
use tracing::warn;

pub const DEFAULT_SCAN: u64 = 30;
pub const DEFAULT_LIMIT: usize = 15;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HistoryEntry {
    pub game_id: u64,
    pub tier: Tier,
    pub opponent: Address,
    pub winner: Address,
    pub payout: U256,
    pub won: bool,
    /// `None` when the lookup failed; history still lists the game.
    pub danger_tiles: Option<[u8; 2]>,
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let outcome = if self.won { "WON " } else { "LOST" };
        write!(
            f,
            "#{:<6} {} {:>6} vs {}  payout {} MON",
            self.game_id,
            outcome,
            self.tier.to_string(),
            short_address(self.opponent),
            format_mon(self.payout),
        )?;
        if let Some([a, b]) = self.danger_tiles {
            write!(f, "  danger {a},{b}")?;
        }
        Ok(())
    }
}

/// Finished games involving `player`, newest first. Looks at no more than
/// `scan` ids below the game counter and keeps at most `limit` entries.
/// A game that fails to load is skipped.
pub async fn recent_games<C: GameContract>(
    contract: &C,
    player: Address,
    scan: u64,
    limit: usize,
) -> Result<Vec<HistoryEntry>> {
    let newest = contract.game_counter().await?;
    let oldest = newest.saturating_sub(scan).saturating_add(1).max(1);
    let mut entries = Vec::new();

    for game_id in (oldest..=newest).rev() {
        if entries.len() >= limit {
            break;
        }
        let game = match contract.get_game(game_id).await {
            Ok(game) => game,
            Err(e) => {
                warn!(game_id, error = %e, "skipping game in history");
                continue;
            }
        };
        if game.state != GameState::Finished {
            continue;
        }
        let Some(seat) = game.seat_of(player) else {
            continue;
        };
        let danger_tiles = match contract.get_dangerous_tiles(game_id).await {
            Ok(tiles) => Some(tiles),
            Err(e) => {
                warn!(game_id, error = %e, "could not load danger tiles");
                None
            }
        };
        entries.push(HistoryEntry {
            game_id,
            tier: game.tier,
            opponent: game.address_of(seat.other()),
            winner: game.winner,
            payout: game.pot(),
            won: game.winner == player,
            danger_tiles,
        });
    }
    Ok(entries)
}
