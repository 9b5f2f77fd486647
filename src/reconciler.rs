//! Turns successive `getGame` polls into discrete game events.
//!
//! The chain's log window is too short to rely on event subscriptions, so the
//! client diffs each snapshot against the previous one and synthesizes the
//! transitions it can observe. Every event fires at most once per game and
//! kind, however often the same state is polled.

use crate::{
    tiles::{
        RevealedTiles,
        TileLedger,
        TileView,
    },
    types::{
        GRID_SIZE,
        GameData,
        GameState,
    },
};
use ethers::types::{
    Address,
    U256,
};
use std::collections::HashSet;
use tracing::debug;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GameEvent {
    OpponentJoined {
        player2: Address,
    },
    GameStarted,
    MoveMade {
        tile: u8,
        /// `None` when several tiles opened between two polls and the order
        /// of moves cannot be recovered.
        mover: Option<Address>,
        /// `None` when several tiles opened in the poll that finished the
        /// game, so the tile that ended it is unknown.
        hit_danger: Option<bool>,
    },
    GameFinished(GameResult),
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::OpponentJoined { .. } => EventKind::OpponentJoined,
            GameEvent::GameStarted => EventKind::GameStarted,
            GameEvent::MoveMade { tile, .. } => EventKind::MoveMade(*tile),
            GameEvent::GameFinished(_) => EventKind::GameFinished,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GameResult {
    pub winner: Address,
    pub payout: U256,
    /// Whether the watching wallet won; `None` for spectators.
    pub viewer_won: Option<bool>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    OpponentJoined,
    GameStarted,
    MoveMade(u8),
    GameFinished,
}

/// Remembers which (game, event) pairs were already announced.
#[derive(Clone, Debug, Default)]
pub struct NotificationGuard {
    fired: HashSet<(u64, EventKind)>,
}

impl NotificationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// True exactly once per `(game_id, kind)`.
    pub fn first_time(&mut self, game_id: u64, kind: EventKind) -> bool {
        self.fired.insert((game_id, kind))
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct LocalSnapshot {
    state: GameState,
    revealed: RevealedTiles,
    player2: Address,
    current_turn: Address,
}

impl From<&GameData> for LocalSnapshot {
    fn from(game: &GameData) -> Self {
        Self {
            state: game.state,
            revealed: game.revealed_tiles,
            player2: game.player2,
            current_turn: game.current_turn,
        }
    }
}

pub struct Reconciler {
    game_id: u64,
    viewer: Option<Address>,
    last: Option<LocalSnapshot>,
    guard: NotificationGuard,
    ledger: TileLedger,
}

impl Reconciler {
    pub fn new(game_id: u64, viewer: Option<Address>) -> Self {
        Self {
            game_id,
            viewer,
            last: None,
            guard: NotificationGuard::new(),
            ledger: TileLedger::new(),
        }
    }

    pub fn game_id(&self) -> u64 {
        self.game_id
    }

    pub fn ledger(&self) -> &TileLedger {
        &self.ledger
    }

    pub fn is_finished(&self) -> bool {
        self.last
            .is_some_and(|snapshot| snapshot.state == GameState::Finished)
    }

    /// Switch to another game. Snapshot and ledger are dropped; the guard is
    /// kept since it is keyed by game id.
    pub fn reset(&mut self, game_id: u64) {
        self.game_id = game_id;
        self.last = None;
        self.ledger.clear();
    }

    /// Feed one poll result, returning the transitions not announced before.
    /// The first poll only sets the baseline, except that an already finished
    /// game still reports its result.
    pub fn observe(&mut self, game: &GameData) -> Vec<GameEvent> {
        let current = LocalSnapshot::from(game);
        let previous = self.last.replace(current);
        debug!(game_id = self.game_id, ?current, ?previous, "reconciling snapshot");

        let mut candidates = Vec::new();
        if let Some(prev) = previous {
            if prev.player2.is_zero() && !current.player2.is_zero() {
                candidates.push(GameEvent::OpponentJoined {
                    player2: current.player2,
                });
            }
            if prev.state < GameState::InProgress && current.state == GameState::InProgress {
                candidates.push(GameEvent::GameStarted);
            }
            candidates.extend(self.infer_moves(prev, current, game));
        }
        if game.state == GameState::Finished {
            candidates.push(GameEvent::GameFinished(GameResult {
                winner: game.winner,
                payout: game.pot(),
                viewer_won: self.viewer.map(|me| me == game.winner),
            }));
        }

        candidates
            .into_iter()
            .filter(|event| self.guard.first_time(self.game_id, event.kind()))
            .collect()
    }

    fn infer_moves(
        &mut self,
        prev: LocalSnapshot,
        current: LocalSnapshot,
        game: &GameData,
    ) -> Vec<GameEvent> {
        if !matches!(current.state, GameState::InProgress | GameState::Finished) {
            return Vec::new();
        }
        let finished = current.state == GameState::Finished;
        let gained = current.revealed.newly_revealed(prev.revealed);
        match gained.as_slice() {
            [] => Vec::new(),
            [tile] if finished => {
                // The move that ended the game hit danger; its mover lost.
                self.ledger.record_danger(*tile);
                vec![GameEvent::MoveMade {
                    tile: *tile,
                    mover: game.loser(),
                    hit_danger: Some(true),
                }]
            }
            [tile] => {
                // Turn already advanced past the mover.
                let mover_seat = game.seat_of(current.current_turn).map(|seat| seat.other());
                if let Some(seat) = mover_seat {
                    self.ledger.record_safe(*tile, seat);
                }
                vec![GameEvent::MoveMade {
                    tile: *tile,
                    mover: mover_seat.map(|seat| game.address_of(seat)),
                    hit_danger: Some(false),
                }]
            }
            tiles => tiles
                .iter()
                .map(|tile| GameEvent::MoveMade {
                    tile: *tile,
                    mover: None,
                    hit_danger: (!finished).then_some(false),
                })
                .collect(),
        }
    }

    /// Marks the contract's danger tiles once the game is over and they are
    /// public.
    pub fn reveal_danger_tiles(&mut self, tiles: impl IntoIterator<Item = u8>) {
        for tile in tiles.into_iter().filter(|tile| *tile < GRID_SIZE) {
            self.ledger.record_danger(tile);
        }
    }

    pub fn views(&self, game: &GameData) -> [TileView; GRID_SIZE as usize] {
        let seat = self.viewer.and_then(|me| game.seat_of(me));
        self.ledger.views(game.revealed_tiles, seat)
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::types::Tier;

    fn addr(byte: u8) -> Address {
        Address::from([byte; 20])
    }

    fn alice() -> Address {
        addr(0xa1)
    }

    fn bob() -> Address {
        addr(0xb0)
    }

    fn waiting() -> GameData {
        GameData {
            player1: alice(),
            player2: Address::zero(),
            tier: Tier::OneMon,
            bet_amount: U256::exp10(18),
            state: GameState::WaitingForPlayer,
            current_turn: Address::zero(),
            winner: Address::zero(),
            revealed_tiles: RevealedTiles::default(),
        }
    }

    fn joined() -> GameData {
        GameData {
            player2: bob(),
            state: GameState::WaitingForVrf,
            ..waiting()
        }
    }

    fn started() -> GameData {
        GameData {
            state: GameState::InProgress,
            current_turn: alice(),
            ..joined()
        }
    }

    #[test]
    fn observe__first_poll_only_sets_baseline() {
        // given
        let mut sut = Reconciler::new(1, Some(alice()));

        // when
        let events = sut.observe(&started());

        // then
        assert!(events.is_empty());
    }

    #[test]
    fn observe__opponent_join_fires_once() {
        // given
        let mut sut = Reconciler::new(1, Some(alice()));
        sut.observe(&waiting());

        // when
        let first = sut.observe(&joined());
        let repeat = sut.observe(&joined());

        // then
        assert_eq!(first, vec![GameEvent::OpponentJoined { player2: bob() }]);
        assert!(repeat.is_empty());
    }

    #[test]
    fn observe__vrf_to_in_progress_fires_single_game_started() {
        // given
        let mut sut = Reconciler::new(1, Some(alice()));
        sut.observe(&joined());

        // when
        let first = sut.observe(&started());
        let repeat = sut.observe(&started());

        // then
        assert_eq!(first, vec![GameEvent::GameStarted]);
        assert!(repeat.is_empty());
    }

    #[test]
    fn observe__new_bit_is_attributed_to_player_whose_turn_passed() {
        // given
        let mut sut = Reconciler::new(1, Some(bob()));
        sut.observe(&started());
        let after_move = GameData {
            current_turn: bob(),
            revealed_tiles: RevealedTiles::from_indices([7]),
            ..started()
        };

        // when
        let events = sut.observe(&after_move);

        // then
        assert_eq!(
            events,
            vec![GameEvent::MoveMade {
                tile: 7,
                mover: Some(alice()),
                hit_danger: Some(false),
            }]
        );
        assert_eq!(sut.views(&after_move)[7], TileView::SafeOpponent);
    }

    #[test]
    fn observe__finished_game_reports_double_bet_payout_once() {
        // given
        let mut sut = Reconciler::new(1, Some(alice()));
        let before = GameData {
            current_turn: bob(),
            revealed_tiles: RevealedTiles::from_indices([0]),
            ..started()
        };
        sut.observe(&before);
        let finished = GameData {
            state: GameState::Finished,
            winner: alice(),
            revealed_tiles: RevealedTiles::from_indices([0, 12]),
            ..before.clone()
        };

        // when
        let events = sut.observe(&finished);
        let repeat = sut.observe(&finished);

        // then
        assert_eq!(
            events,
            vec![
                GameEvent::MoveMade {
                    tile: 12,
                    mover: Some(bob()),
                    hit_danger: Some(true),
                },
                GameEvent::GameFinished(GameResult {
                    winner: alice(),
                    payout: U256::exp10(18) * U256::from(2u8),
                    viewer_won: Some(true),
                }),
            ]
        );
        assert!(repeat.is_empty());
        assert_eq!(sut.views(&finished)[12], TileView::Danger);
        assert!(sut.is_finished());
    }

    #[test]
    fn observe__already_finished_game_still_reports_result_on_first_poll() {
        // given
        let mut sut = Reconciler::new(3, None);
        let finished = GameData {
            state: GameState::Finished,
            winner: bob(),
            ..started()
        };

        // when
        let events = sut.observe(&finished);

        // then
        assert!(matches!(
            events.as_slice(),
            [GameEvent::GameFinished(GameResult { viewer_won: None, .. })]
        ));
    }

    #[test]
    fn observe__several_new_bits_are_left_unattributed() {
        // given
        let mut sut = Reconciler::new(1, Some(alice()));
        sut.observe(&started());
        let skipped = GameData {
            revealed_tiles: RevealedTiles::from_indices([2, 5]),
            ..started()
        };

        // when
        let events = sut.observe(&skipped);

        // then
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|event| matches!(
            event,
            GameEvent::MoveMade {
                mover: None,
                hit_danger: Some(false),
                ..
            }
        )));
        assert_eq!(sut.views(&skipped)[2], TileView::Revealed);
    }

    #[test]
    fn observe__several_new_bits_in_finishing_poll_leave_danger_unknown() {
        // given
        let mut sut = Reconciler::new(1, Some(alice()));
        sut.observe(&started());
        let finished = GameData {
            state: GameState::Finished,
            winner: alice(),
            current_turn: Address::zero(),
            revealed_tiles: RevealedTiles::from_indices([3, 9]),
            ..started()
        };

        // when
        let events = sut.observe(&finished);

        // then
        let moves: Vec<_> = events
            .iter()
            .filter_map(|event| match event {
                GameEvent::MoveMade {
                    tile,
                    mover,
                    hit_danger,
                } => Some((*tile, *mover, *hit_danger)),
                _ => None,
            })
            .collect();
        assert_eq!(moves, vec![(3, None, None), (9, None, None)]);
        assert!(matches!(events.last(), Some(GameEvent::GameFinished(_))));
        assert_eq!(sut.views(&finished)[3], TileView::Revealed);
    }

    #[test]
    fn observe__start_and_first_move_in_one_poll_are_both_reported() {
        // given
        let mut sut = Reconciler::new(1, Some(alice()));
        sut.observe(&joined());
        let first_move = GameData {
            current_turn: bob(),
            revealed_tiles: RevealedTiles::from_indices([4]),
            ..started()
        };

        // when
        let events = sut.observe(&first_move);

        // then
        assert_eq!(
            events,
            vec![
                GameEvent::GameStarted,
                GameEvent::MoveMade {
                    tile: 4,
                    mover: Some(alice()),
                    hit_danger: Some(false),
                },
            ]
        );
        assert_eq!(sut.views(&first_move)[4], TileView::SafeMine);
    }

    #[test]
    fn reset__keeps_guard_for_previous_game() {
        // given
        let mut sut = Reconciler::new(1, Some(alice()));
        sut.observe(&waiting());
        sut.observe(&joined());

        // when
        sut.reset(1);
        sut.observe(&waiting());
        let events = sut.observe(&joined());

        // then
        assert!(events.is_empty());
    }

    #[test]
    fn reveal_danger_tiles__marks_closed_tiles_as_danger() {
        // given
        let mut sut = Reconciler::new(1, Some(alice()));
        let game = started();

        // when
        sut.reveal_danger_tiles([4, 30]);

        // then
        let views = sut.views(&game);
        assert_eq!(views[4], TileView::Danger);
        assert_eq!(views.iter().filter(|v| **v == TileView::Danger).count(), 1);
    }
}
