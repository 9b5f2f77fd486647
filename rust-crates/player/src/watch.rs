use crate::render::{
    describe_event,
    render_frame,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
};
use danger_tiles::{
    GameContract,
    GameData,
    GameEvent,
    GameResult,
    GameState,
    Reconciler,
};
use ethers::types::Address;
use std::{
    future::Future,
    io::Write,
    time::Duration,
};
use tokio::time::{
    MissedTickBehavior,
    interval,
};
use tracing::{
    debug,
    info,
    warn,
};

pub struct WatchStep {
    pub game: GameData,
    pub events: Vec<GameEvent>,
}

impl WatchStep {
    pub fn result(&self) -> Option<&GameResult> {
        self.events.iter().find_map(|event| match event {
            GameEvent::GameFinished(result) => Some(result),
            _ => None,
        })
    }
}

/// Polls one game and turns each snapshot into events.
pub struct Watcher {
    reconciler: Reconciler,
    viewer: Option<Address>,
    danger_revealed: bool,
}

impl Watcher {
    pub fn new(game_id: u64, viewer: Option<Address>) -> Self {
        Self {
            reconciler: Reconciler::new(game_id, viewer),
            viewer,
            danger_revealed: false,
        }
    }

    pub fn game_id(&self) -> u64 {
        self.reconciler.game_id()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub async fn step<C: GameContract>(
        &mut self,
        contract: &C,
    ) -> danger_tiles::Result<WatchStep> {
        let game = contract.get_game(self.game_id()).await?;
        let events = self.reconciler.observe(&game);
        if game.state == GameState::Finished && !self.danger_revealed {
            match contract.get_dangerous_tiles(self.game_id()).await {
                Ok(tiles) => {
                    debug!(game_id = self.game_id(), ?tiles, "danger tiles revealed");
                    self.reconciler.reveal_danger_tiles(tiles);
                    self.danger_revealed = true;
                }
                Err(e) => warn!(error = %e, "could not load danger tiles"),
            }
        }
        Ok(WatchStep { game, events })
    }

    pub fn frame(&self, game: &GameData) -> String {
        render_frame(
            self.game_id(),
            game,
            &self.reconciler.views(game),
            self.viewer,
        )
    }
}

/// Prints every event once and a fresh board whenever something changed.
/// Returns the result when the game finishes, or `None` on shutdown.
/// Transient rpc errors are logged and retried on the next tick; a failed
/// write to `out` ends the watch.
pub async fn watch<C: GameContract, W: Write>(
    contract: &C,
    game_id: u64,
    viewer: Option<Address>,
    poll_interval: Duration,
    out: &mut W,
    shutdown: impl Future<Output = ()>,
) -> Result<Option<GameResult>> {
    let mut watcher = Watcher::new(game_id, viewer);
    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);
    let mut drawn = false;
    info!(game_id, "watching game");

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!(game_id, "stopped watching");
                return Ok(None);
            }
            _ = ticker.tick() => {
                let step = match watcher.step(contract).await {
                    Ok(step) => step,
                    Err(e) if e.is_transient() => {
                        warn!(game_id, error = %e, "poll failed, retrying");
                        continue;
                    }
                    Err(e) => {
                        return Err(e).wrap_err_with(|| format!("polling game #{game_id}"));
                    }
                };
                for event in &step.events {
                    writeln!(out, "{}", describe_event(event, viewer))
                        .wrap_err("writing game event")?;
                }
                if !drawn || !step.events.is_empty() {
                    write!(out, "{}", watcher.frame(&step.game)).wrap_err("drawing board")?;
                    drawn = true;
                }
                out.flush().wrap_err("flushing output")?;
                if let Some(result) = step.result() {
                    return Ok(Some(result.clone()));
                }
            }
        }
    }
}
