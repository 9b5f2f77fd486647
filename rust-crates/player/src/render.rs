use danger_tiles::{
    GRID_SIZE,
    GameData,
    GameEvent,
    TileView,
    format_mon,
    types::short_address,
};
use ethers::types::Address;

const ROW: usize = 5;

/// Plain 5x5 board, one glyph per tile, with row and column indices so a tile
/// number can be read off directly.
pub fn render_board(views: &[TileView; GRID_SIZE as usize]) -> String {
    let mut out = String::from("     0  1  2  3  4\n");
    for (row, tiles) in views.chunks(ROW).enumerate() {
        out.push_str(&format!("{:>3} ", row * ROW));
        for view in tiles {
            out.push_str(&format!(" {} ", view.glyph()));
        }
        out.push('\n');
    }
    out
}

pub fn render_frame(
    game_id: u64,
    game: &GameData,
    views: &[TileView; GRID_SIZE as usize],
    viewer: Option<Address>,
) -> String {
    let mut out = format!(
        "Game #{game_id} | {} | pot {} MON | {}\n",
        game.tier,
        format_mon(game.pot()),
        game.status_for(viewer)
    );
    out.push_str(&render_board(views));
    out.push_str("legend: . closed  X yours  O opponent  ! danger  ? opened\n");
    out
}

fn who(address: Option<Address>, viewer: Option<Address>) -> String {
    match (address, viewer) {
        (Some(a), Some(me)) if a == me => "You".to_string(),
        (Some(_), Some(_)) => "Opponent".to_string(),
        (Some(a), None) => short_address(a),
        (None, _) => "Someone".to_string(),
    }
}

pub fn describe_event(event: &GameEvent, viewer: Option<Address>) -> String {
    match event {
        GameEvent::OpponentJoined { player2 } => {
            format!("{} joined the game", short_address(*player2))
        }
        GameEvent::GameStarted => "Danger tiles are set, game started".to_string(),
        GameEvent::MoveMade {
            tile,
            mover,
            hit_danger: Some(false),
        } => format!("{} opened tile {tile}: safe", who(*mover, viewer)),
        GameEvent::MoveMade {
            tile,
            mover,
            hit_danger: Some(true),
        } => format!("{} opened tile {tile}: DANGER", who(*mover, viewer)),
        GameEvent::MoveMade {
            tile,
            mover,
            hit_danger: None,
        } => format!("{} opened tile {tile}", who(*mover, viewer)),
        GameEvent::GameFinished(result) => match result.viewer_won {
            Some(true) => format!("You won {} MON!", format_mon(result.payout)),
            Some(false) => "You lost.".to_string(),
            None => format!(
                "{} won {} MON",
                short_address(result.winner),
                format_mon(result.payout)
            ),
        },
    }
}
