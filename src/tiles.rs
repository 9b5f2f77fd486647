use crate::types::{
    GRID_SIZE,
    Seat,
};
use ethers::types::U256;
use rand::{
    Rng,
    seq::IndexedRandom,
};
use std::collections::{
    BTreeSet,
    HashMap,
};

/// `revealedTiles` word from the contract: bit `i` set means tile `i` is open.
/// Only the low 25 bits carry meaning.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RevealedTiles(U256);

impl RevealedTiles {
    pub fn new(mask: U256) -> Self {
        Self(mask)
    }

    pub fn from_indices(indices: impl IntoIterator<Item = u8>) -> Self {
        let mask = indices
            .into_iter()
            .filter(|i| *i < GRID_SIZE)
            .fold(U256::zero(), |acc, i| acc | (U256::one() << usize::from(i)));
        Self(mask)
    }

    pub fn all() -> Self {
        Self::from_indices(0..GRID_SIZE)
    }

    pub fn raw(self) -> U256 {
        self.0
    }

    pub fn is_revealed(self, tile: u8) -> bool {
        if tile >= GRID_SIZE {
            return false;
        }
        !((self.0 >> usize::from(tile)) & U256::one()).is_zero()
    }

    pub fn with(self, tile: u8) -> Self {
        if tile >= GRID_SIZE {
            return self;
        }
        Self(self.0 | (U256::one() << usize::from(tile)))
    }

    pub fn decode(self) -> [bool; GRID_SIZE as usize] {
        let mut grid = [false; GRID_SIZE as usize];
        for (i, cell) in grid.iter_mut().enumerate() {
            *cell = self.is_revealed(i as u8);
        }
        grid
    }

    pub fn revealed(self) -> impl Iterator<Item = u8> {
        (0..GRID_SIZE).filter(move |i| self.is_revealed(*i))
    }

    pub fn unrevealed(self) -> Vec<u8> {
        (0..GRID_SIZE).filter(|i| !self.is_revealed(*i)).collect()
    }

    pub fn count(self) -> usize {
        self.revealed().count()
    }

    pub fn is_empty(self) -> bool {
        self.count() == 0
    }

    pub fn is_full(self) -> bool {
        self.count() == GRID_SIZE as usize
    }

    /// Tiles set in `self` that were clear in `previous`, lowest index first.
    pub fn newly_revealed(self, previous: RevealedTiles) -> Vec<u8> {
        self.revealed()
            .filter(|i| !previous.is_revealed(*i))
            .collect()
    }
}

/// Uniform pick among tiles that are still closed. `None` once the board is
/// full.
pub fn pick_unrevealed<R: Rng + ?Sized>(
    revealed: RevealedTiles,
    rng: &mut R,
) -> Option<u8> {
    revealed.unrevealed().choose(rng).copied()
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TileView {
    Hidden,
    SafeMine,
    SafeOpponent,
    Danger,
    /// Open, but no single mover could be attributed to it.
    Revealed,
}

impl TileView {
    pub fn glyph(self) -> char {
        match self {
            TileView::Hidden => '.',
            TileView::SafeMine => 'X',
            TileView::SafeOpponent => 'O',
            TileView::Danger => '!',
            TileView::Revealed => '?',
        }
    }
}

/// Client-side guess of who opened which tile and which tiles were deadly.
/// Purely cosmetic; the contract never exposes it.
#[derive(Clone, Debug, Default)]
pub struct TileLedger {
    owners: HashMap<u8, Seat>,
    danger: BTreeSet<u8>,
}

impl TileLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_safe(&mut self, tile: u8, seat: Seat) {
        if !self.danger.contains(&tile) {
            self.owners.insert(tile, seat);
        }
    }

    pub fn record_danger(&mut self, tile: u8) {
        self.owners.remove(&tile);
        self.danger.insert(tile);
    }

    pub fn owner(&self, tile: u8) -> Option<Seat> {
        self.owners.get(&tile).copied()
    }

    pub fn is_danger(&self, tile: u8) -> bool {
        self.danger.contains(&tile)
    }

    pub fn danger_tiles(&self) -> impl Iterator<Item = u8> + '_ {
        self.danger.iter().copied()
    }

    pub fn clear(&mut self) {
        self.owners.clear();
        self.danger.clear();
    }

    /// Display state for every tile. A spectator (`viewer == None`) sees
    /// player one's tiles as "mine". Known danger tiles show even while closed
    /// since they are only learned once the game is over.
    pub fn views(
        &self,
        revealed: RevealedTiles,
        viewer: Option<Seat>,
    ) -> [TileView; GRID_SIZE as usize] {
        let mine = viewer.unwrap_or(Seat::Player1);
        let mut views = [TileView::Hidden; GRID_SIZE as usize];
        for (i, view) in views.iter_mut().enumerate() {
            let tile = i as u8;
            *view = if self.is_danger(tile) {
                TileView::Danger
            } else if !revealed.is_revealed(tile) {
                TileView::Hidden
            } else {
                match self.owner(tile) {
                    Some(seat) if seat == mine => TileView::SafeMine,
                    Some(_) => TileView::SafeOpponent,
                    None => TileView::Revealed,
                }
            };
        }
        views
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;
    use rand::{
        SeedableRng,
        rngs::StdRng,
    };

    proptest! {
        #[test]
        fn decode__matches_each_bit_of_the_mask(bits in 0u32..(1 << 25)) {
            // given
            let revealed = RevealedTiles::new(U256::from(bits));

            // when
            let grid = revealed.decode();

            // then
            for (i, open) in grid.iter().enumerate() {
                prop_assert_eq!(*open, bits & (1 << i) != 0);
            }
        }

        #[test]
        fn from_indices__round_trips_through_revealed(indices in proptest::collection::btree_set(0u8..25, 0..25)) {
            // when
            let revealed = RevealedTiles::from_indices(indices.iter().copied());

            // then
            let back: BTreeSet<u8> = revealed.revealed().collect();
            prop_assert_eq!(back, indices);
        }
    }

    #[test]
    fn is_revealed__reports_each_single_bit_mask_for_all_25_tiles() {
        for tile in 0..GRID_SIZE {
            // given
            let revealed = RevealedTiles::new(U256::one() << usize::from(tile));

            // then
            for other in 0..GRID_SIZE {
                assert_eq!(revealed.is_revealed(other), other == tile);
            }
        }
    }

    #[test]
    fn is_revealed__ignores_bits_beyond_the_board() {
        // given
        let revealed = RevealedTiles::new(U256::MAX);

        // then
        assert!(!revealed.is_revealed(25));
        assert!(revealed.is_full());
    }

    #[test]
    fn newly_revealed__lists_only_bits_gained_since_previous() {
        // given
        let previous = RevealedTiles::from_indices([1, 4]);
        let current = RevealedTiles::from_indices([1, 4, 7]);

        // when
        let gained = current.newly_revealed(previous);

        // then
        assert_eq!(gained, vec![7]);
    }

    #[test]
    fn pick_unrevealed__only_returns_clear_tiles() {
        // given
        let revealed = RevealedTiles::from_indices(
            (0..GRID_SIZE).filter(|i| ![3, 9, 14].contains(i)),
        );
        let mut rng = StdRng::seed_from_u64(7);

        // when
        let picks: BTreeSet<u8> = (0..500)
            .map(|_| pick_unrevealed(revealed, &mut rng).unwrap())
            .collect();

        // then
        assert!(picks.iter().all(|tile| [3, 9, 14].contains(tile)));
        assert_eq!(picks.len(), 3);
    }

    #[test]
    fn pick_unrevealed__returns_none_when_board_is_full() {
        // given
        let mut rng = StdRng::seed_from_u64(1);

        // then
        assert_eq!(pick_unrevealed(RevealedTiles::all(), &mut rng), None);
    }

    #[test]
    fn views__map_owners_and_danger_relative_to_viewer() {
        // given
        let mut ledger = TileLedger::new();
        ledger.record_safe(0, Seat::Player1);
        ledger.record_safe(1, Seat::Player2);
        ledger.record_danger(2);
        let revealed = RevealedTiles::from_indices([0, 1, 2, 3]);

        // when
        let as_p2 = ledger.views(revealed, Some(Seat::Player2));

        // then
        assert_eq!(as_p2[0], TileView::SafeOpponent);
        assert_eq!(as_p2[1], TileView::SafeMine);
        assert_eq!(as_p2[2], TileView::Danger);
        assert_eq!(as_p2[3], TileView::Revealed);
        assert_eq!(as_p2[4], TileView::Hidden);
    }

    #[test]
    fn record_safe__does_not_override_known_danger() {
        // given
        let mut ledger = TileLedger::new();
        ledger.record_danger(5);

        // when
        ledger.record_safe(5, Seat::Player1);

        // then
        assert!(ledger.is_danger(5));
        assert_eq!(ledger.owner(5), None);
    }
}
