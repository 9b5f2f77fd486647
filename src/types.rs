use crate::{
    error::{
        Error,
        Result,
    },
    tiles::RevealedTiles,
};
use ethers::types::{
    Address,
    U256,
};
use std::fmt;

/// Number of tiles on the 5x5 board.
pub const GRID_SIZE: u8 = 25;

/// Raw `getGame` return tuple:
/// `(player1, player2, tier, betAmount, state, currentTurn, winner, revealedTiles)`.
pub type GameTuple = (Address, Address, u8, U256, u8, Address, Address, U256);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum GameState {
    WaitingForPlayer,
    WaitingForVrf,
    InProgress,
    Finished,
}

impl TryFrom<u8> for GameState {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(GameState::WaitingForPlayer),
            1 => Ok(GameState::WaitingForVrf),
            2 => Ok(GameState::InProgress),
            3 => Ok(GameState::Finished),
            other => Err(Error::UnknownState(other)),
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GameState::WaitingForPlayer => "Waiting for opponent",
            GameState::WaitingForVrf => "Generating tiles...",
            GameState::InProgress => "In progress",
            GameState::Finished => "Game over",
        };
        write!(f, "{label}")
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Tier {
    OneMon,
    FiveMon,
    TenMon,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::OneMon, Tier::FiveMon, Tier::TenMon];

    pub fn index(self) -> u8 {
        match self {
            Tier::OneMon => 0,
            Tier::FiveMon => 1,
            Tier::TenMon => 2,
        }
    }

    /// Stake in whole MON. The amount actually sent also carries the platform
    /// fee and always comes from `getRequiredPayment`.
    pub fn bet_mon(self) -> u64 {
        match self {
            Tier::OneMon => 1,
            Tier::FiveMon => 5,
            Tier::TenMon => 10,
        }
    }
}

impl TryFrom<u8> for Tier {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Tier::OneMon),
            1 => Ok(Tier::FiveMon),
            2 => Ok(Tier::TenMon),
            other => Err(Error::InvalidTier(other)),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} MON", self.bet_mon())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Seat {
    Player1,
    Player2,
}

impl Seat {
    pub fn other(self) -> Seat {
        match self {
            Seat::Player1 => Seat::Player2,
            Seat::Player2 => Seat::Player1,
        }
    }
}

/// One `getGame` snapshot. Owned by the contract; the client only ever reads it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GameData {
    pub player1: Address,
    pub player2: Address,
    pub tier: Tier,
    pub bet_amount: U256,
    pub state: GameState,
    pub current_turn: Address,
    pub winner: Address,
    pub revealed_tiles: RevealedTiles,
}

impl TryFrom<GameTuple> for GameData {
    type Error = Error;

    fn try_from(raw: GameTuple) -> Result<Self> {
        let (player1, player2, tier, bet_amount, state, current_turn, winner, revealed) =
            raw;
        Ok(GameData {
            player1,
            player2,
            tier: Tier::try_from(tier)?,
            bet_amount,
            state: GameState::try_from(state)?,
            current_turn,
            winner,
            revealed_tiles: RevealedTiles::new(revealed),
        })
    }
}

impl GameData {
    pub fn has_opponent(&self) -> bool {
        !self.player2.is_zero()
    }

    pub fn seat_of(&self, address: Address) -> Option<Seat> {
        if address.is_zero() {
            None
        } else if address == self.player1 {
            Some(Seat::Player1)
        } else if address == self.player2 {
            Some(Seat::Player2)
        } else {
            None
        }
    }

    pub fn address_of(&self, seat: Seat) -> Address {
        match seat {
            Seat::Player1 => self.player1,
            Seat::Player2 => self.player2,
        }
    }

    pub fn is_turn_of(&self, address: Address) -> bool {
        self.state == GameState::InProgress && self.current_turn == address
    }

    /// Amount the winner receives: both stakes.
    pub fn pot(&self) -> U256 {
        self.bet_amount.saturating_mul(U256::from(2u8))
    }

    pub fn loser(&self) -> Option<Address> {
        if self.state != GameState::Finished || self.winner.is_zero() {
            return None;
        }
        match self.seat_of(self.winner)? {
            Seat::Player1 => Some(self.player2),
            Seat::Player2 => Some(self.player1),
        }
    }

    pub fn involves(&self, address: Address) -> bool {
        self.seat_of(address).is_some()
    }

    /// Short status line from the point of view of `viewer`.
    pub fn status_for(&self, viewer: Option<Address>) -> String {
        match (self.state, viewer) {
            (GameState::InProgress, Some(me)) if self.involves(me) => {
                if self.current_turn == me {
                    "Your turn".to_string()
                } else {
                    "Opponent's turn".to_string()
                }
            }
            (GameState::InProgress, _) => match self.seat_of(self.current_turn) {
                Some(Seat::Player1) => "Player 1 to move".to_string(),
                Some(Seat::Player2) => "Player 2 to move".to_string(),
                None => self.state.to_string(),
            },
            (state, _) => state.to_string(),
        }
    }
}

/// `0x1234...abcd` form used in logs and the CLI.
pub fn short_address(address: Address) -> String {
    let full = format!("{address:?}");
    if full.len() <= 10 {
        return full;
    }
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}
