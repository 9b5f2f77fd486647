//! In-memory stand-in for the Danger Tiles contract. It enforces the rules the
//! client can observe (matchmaking per tier, VRF gate, turn order, danger ends
//! the game) so bot and watcher logic can be tested without a node.

use crate::{
    client::{
        Confirmed,
        GameContract,
    },
    error::{
        Error,
        Result,
    },
    tiles::RevealedTiles,
    types::{
        GRID_SIZE,
        GameData,
        GameState,
        Tier,
    },
};
use ethers::types::{
    Address,
    H256,
    U256,
};
use std::{
    collections::HashMap,
    sync::{
        Mutex,
        MutexGuard,
    },
};

pub const DEFAULT_DANGER_TILES: [u8; 2] = [23, 24];

pub fn mon(amount: u64) -> U256 {
    U256::exp10(18) * U256::from(amount)
}

/// Flat platform fee the fake charges on top of the stake.
pub fn fee() -> U256 {
    U256::exp10(16)
}

#[derive(Clone, Debug)]
struct FakeGame {
    data: GameData,
    danger: [u8; 2],
}

#[derive(Debug)]
struct FakeChain {
    games: Vec<FakeGame>,
    waiting: HashMap<Tier, u64>,
    active: HashMap<Address, u64>,
    balances: HashMap<Address, U256>,
    danger: [u8; 2],
    manual_vrf: bool,
    failing_reads: u32,
    failing_active_lookups: u32,
    moves: Vec<(u64, Address, u8)>,
    block: u64,
}

impl FakeChain {
    fn game_mut(&mut self, game_id: u64) -> Result<&mut FakeGame> {
        let index = game_id
            .checked_sub(1)
            .ok_or_else(|| Error::Reverted("Game does not exist".to_string()))?;
        self.games
            .get_mut(index as usize)
            .ok_or_else(|| Error::Reverted("Game does not exist".to_string()))
    }

    fn debit(&mut self, who: Address, amount: U256) -> Result<()> {
        let balance = self.balances.entry(who).or_insert_with(|| mon(100));
        if *balance < amount {
            return Err(Error::Reverted("insufficient funds".to_string()));
        }
        *balance -= amount;
        Ok(())
    }

    fn credit(&mut self, who: Address, amount: U256) {
        let balance = self.balances.entry(who).or_insert_with(|| mon(100));
        *balance += amount;
    }

    fn confirm(&mut self) -> Confirmed {
        self.block += 1;
        Confirmed {
            tx_hash: H256::from_low_u64_be(self.block),
            block_number: Some(self.block),
        }
    }

    fn read(&mut self) -> Result<()> {
        if self.failing_reads > 0 {
            self.failing_reads -= 1;
            return Err(Error::Rpc("injected rpc failure".to_string()));
        }
        Ok(())
    }
}

pub struct FakeGameContract {
    signer: Option<Address>,
    chain: Mutex<FakeChain>,
}

impl FakeGameContract {
    /// Fake whose writes are signed by `signer`. Games start as soon as the
    /// second player joins, with danger on [`DEFAULT_DANGER_TILES`].
    pub fn new(signer: Address) -> Self {
        Self {
            signer: Some(signer),
            chain: Mutex::new(FakeChain {
                games: Vec::new(),
                waiting: HashMap::new(),
                active: HashMap::new(),
                balances: HashMap::new(),
                danger: DEFAULT_DANGER_TILES,
                manual_vrf: false,
                failing_reads: 0,
                failing_active_lookups: 0,
                moves: Vec::new(),
                block: 0,
            }),
        }
    }

    /// Fake without a signer; every write through the trait fails.
    pub fn read_only() -> Self {
        Self {
            signer: None,
            ..Self::new(Address::zero())
        }
    }

    /// Danger tiles for games created from now on.
    pub fn with_danger_tiles(self, tiles: [u8; 2]) -> Self {
        self.lock().danger = tiles;
        self
    }

    /// Games stay in `WaitingForVrf` until [`Self::fulfill_vrf`].
    pub fn with_manual_vrf(self) -> Self {
        self.lock().manual_vrf = true;
        self
    }

    pub fn with_balance(self, who: Address, amount: U256) -> Self {
        self.lock().balances.insert(who, amount);
        self
    }

    /// The next `count` reads fail with a transient rpc error.
    pub fn fail_next_reads(&self, count: u32) {
        self.lock().failing_reads = count;
    }

    /// The next `count` `playerActiveGame` reads fail; other reads succeed.
    pub fn fail_next_active_game_lookups(&self, count: u32) {
        self.lock().failing_active_lookups = count;
    }

    fn lock(&self) -> MutexGuard<'_, FakeChain> {
        self.chain.lock().expect("fake chain lock poisoned")
    }

    pub fn required_payment(tier: Tier) -> U256 {
        mon(tier.bet_mon()) + fee()
    }

    pub fn balance_of(&self, who: Address) -> U256 {
        self.lock()
            .balances
            .get(&who)
            .copied()
            .unwrap_or_else(|| mon(100))
    }

    pub fn game(&self, game_id: u64) -> Option<GameData> {
        let index = game_id.checked_sub(1)? as usize;
        self.lock().games.get(index).map(|g| g.data.clone())
    }

    /// Every accepted move as `(game_id, mover, tile)` in order.
    pub fn moves(&self) -> Vec<(u64, Address, u8)> {
        self.lock().moves.clone()
    }

    /// Joins `tier` as `who`, filling the waiting game or opening a new one.
    /// Returns the game id.
    pub fn join_as(&self, who: Address, tier: Tier) -> Result<u64> {
        let mut chain = self.lock();
        // Also covers joining one's own waiting game.
        if chain.active.contains_key(&who) {
            return Err(Error::Reverted("Already in a game".to_string()));
        }
        chain.debit(who, Self::required_payment(tier))?;

        let waiting = chain.waiting.get(&tier).copied();
        let game_id = match waiting {
            Some(game_id) => {
                let manual_vrf = chain.manual_vrf;
                let game = chain.game_mut(game_id)?;
                game.data.player2 = who;
                if manual_vrf {
                    game.data.state = GameState::WaitingForVrf;
                } else {
                    game.data.state = GameState::InProgress;
                    game.data.current_turn = game.data.player1;
                }
                chain.waiting.remove(&tier);
                game_id
            }
            None => {
                let danger = chain.danger;
                chain.games.push(FakeGame {
                    data: GameData {
                        player1: who,
                        player2: Address::zero(),
                        tier,
                        bet_amount: mon(tier.bet_mon()),
                        state: GameState::WaitingForPlayer,
                        current_turn: Address::zero(),
                        winner: Address::zero(),
                        revealed_tiles: RevealedTiles::default(),
                    },
                    danger,
                });
                let game_id = chain.games.len() as u64;
                chain.waiting.insert(tier, game_id);
                game_id
            }
        };
        chain.active.insert(who, game_id);
        Ok(game_id)
    }

    /// Delivers the randomness for a game parked in `WaitingForVrf`.
    pub fn fulfill_vrf(&self, game_id: u64) -> Result<()> {
        let mut chain = self.lock();
        let game = chain.game_mut(game_id)?;
        if game.data.state != GameState::WaitingForVrf {
            return Err(Error::Reverted("Not waiting for VRF".to_string()));
        }
        game.data.state = GameState::InProgress;
        game.data.current_turn = game.data.player1;
        Ok(())
    }

    /// Opens `tile` as `who`. Opening a danger tile finishes the game and
    /// pays both stakes to the other player.
    pub fn move_as(&self, who: Address, game_id: u64, tile: u8) -> Result<()> {
        let mut chain = self.lock();
        let game = chain.game_mut(game_id)?;
        if game.data.state != GameState::InProgress {
            return Err(Error::Reverted("Game not in progress".to_string()));
        }
        if game.data.current_turn != who {
            return Err(Error::Reverted("Not your turn".to_string()));
        }
        if tile >= GRID_SIZE {
            return Err(Error::Reverted("Invalid tile".to_string()));
        }
        if game.data.revealed_tiles.is_revealed(tile) {
            return Err(Error::Reverted("Tile already revealed".to_string()));
        }

        game.data.revealed_tiles = game.data.revealed_tiles.with(tile);
        let other = if who == game.data.player1 {
            game.data.player2
        } else {
            game.data.player1
        };
        let finished = game.danger.contains(&tile).then(|| {
            game.data.state = GameState::Finished;
            game.data.winner = other;
            game.data.current_turn = Address::zero();
            game.data.pot()
        });
        if finished.is_none() {
            game.data.current_turn = other;
        }

        chain.moves.push((game_id, who, tile));
        if let Some(pot) = finished {
            chain.credit(other, pot);
            chain.active.remove(&who);
            chain.active.remove(&other);
        }
        Ok(())
    }

    fn signer_or_missing(&self) -> Result<Address> {
        self.signer.ok_or(Error::WalletMissing)
    }
}

impl GameContract for FakeGameContract {
    fn signer(&self) -> Option<Address> {
        self.signer
    }

    async fn join_game(&self, tier: Tier, value: U256) -> Result<Confirmed> {
        let who = self.signer_or_missing()?;
        if value < Self::required_payment(tier) {
            return Err(Error::Reverted("Incorrect payment".to_string()));
        }
        self.join_as(who, tier)?;
        Ok(self.lock().confirm())
    }

    async fn make_move(&self, game_id: u64, tile: u8) -> Result<Confirmed> {
        let who = self.signer_or_missing()?;
        if tile >= GRID_SIZE {
            return Err(Error::InvalidTile(tile));
        }
        self.move_as(who, game_id, tile)?;
        Ok(self.lock().confirm())
    }

    async fn get_game(&self, game_id: u64) -> Result<GameData> {
        self.lock().read()?;
        self.game(game_id)
            .ok_or_else(|| Error::Reverted("Game does not exist".to_string()))
    }

    async fn get_waiting_game(&self, tier: Tier) -> Result<Option<u64>> {
        let mut chain = self.lock();
        chain.read()?;
        Ok(chain.waiting.get(&tier).copied())
    }

    async fn get_required_payment(&self, tier: Tier) -> Result<U256> {
        self.lock().read()?;
        Ok(Self::required_payment(tier))
    }

    async fn game_counter(&self) -> Result<u64> {
        let mut chain = self.lock();
        chain.read()?;
        Ok(chain.games.len() as u64)
    }

    async fn player_active_game(&self, player: Address) -> Result<Option<u64>> {
        let mut chain = self.lock();
        chain.read()?;
        if chain.failing_active_lookups > 0 {
            chain.failing_active_lookups -= 1;
            return Err(Error::Rpc("injected active game lookup failure".to_string()));
        }
        Ok(chain.active.get(&player).copied())
    }

    async fn get_dangerous_tiles(&self, game_id: u64) -> Result<[u8; 2]> {
        let mut chain = self.lock();
        chain.read()?;
        let game = chain.game_mut(game_id)?;
        if game.data.state != GameState::Finished {
            return Ok([0, 0]);
        }
        Ok(game.danger)
    }

    async fn balance(&self, who: Address) -> Result<U256> {
        self.lock().read()?;
        Ok(self.balance_of(who))
    }
}
