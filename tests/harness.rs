#![allow(non_snake_case)]

use danger_tiles::{
    Error,
    GameContract,
    GameEvent,
    GameState,
    Reconciler,
    Tier,
    TileView,
    history::recent_games,
    join_with_required_payment,
    lobby::{
        lobby_stats,
        resolve_active_game,
    },
    test_helpers::{
        FakeGameContract,
        fee,
        mon,
    },
};
use ethers::types::Address;

fn alice() -> Address {
    Address::from([0xa1; 20])
}

fn bob() -> Address {
    Address::from([0xb0; 20])
}

#[tokio::test]
async fn full_game__join_play_finish_and_show_in_history() {
    // given
    let contract = FakeGameContract::new(alice()).with_danger_tiles([11, 17]);

    // when alice opens a game and bob fills it
    join_with_required_payment(&contract, Tier::OneMon)
        .await
        .unwrap();
    let lobby = lobby_stats(&contract, Some(alice())).await.unwrap();
    let (game_id, waiting) = resolve_active_game(&contract, alice())
        .await
        .unwrap()
        .unwrap();
    let mut reconciler = Reconciler::new(game_id, Some(alice()));
    reconciler.observe(&waiting);
    contract.join_as(bob(), Tier::OneMon).unwrap();
    let joined = reconciler.observe(&contract.get_game(game_id).await.unwrap());

    // and they trade moves until bob opens a danger tile
    contract.make_move(game_id, 4).await.unwrap();
    let after_alice = reconciler.observe(&contract.get_game(game_id).await.unwrap());
    contract.move_as(bob(), game_id, 17).unwrap();
    let finished = contract.get_game(game_id).await.unwrap();
    let last = reconciler.observe(&finished);
    reconciler.reveal_danger_tiles(contract.get_dangerous_tiles(game_id).await.unwrap());

    // then
    assert_eq!(lobby.waiting_in(Tier::OneMon), Some(game_id));
    assert_eq!(
        joined,
        vec![
            GameEvent::OpponentJoined { player2: bob() },
            GameEvent::GameStarted,
        ]
    );
    assert!(matches!(
        after_alice.as_slice(),
        [GameEvent::MoveMade { tile: 4, mover: Some(m), hit_danger: Some(false) }] if *m == alice()
    ));
    assert_eq!(last.len(), 2);
    assert!(matches!(
        &last[1],
        GameEvent::GameFinished(result) if result.viewer_won == Some(true)
    ));
    assert_eq!(finished.state, GameState::Finished);
    let views = reconciler.views(&finished);
    assert_eq!(views[4], TileView::SafeMine);
    assert_eq!(views[11], TileView::Danger);
    assert_eq!(views[17], TileView::Danger);

    let history = recent_games(&contract, alice(), 30, 15).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].won);
    assert_eq!(history[0].danger_tiles, Some([11, 17]));
    assert_eq!(contract.balance_of(alice()), mon(100) - mon(1) - fee() + mon(2));
    assert_eq!(resolve_active_game(&contract, alice()).await.unwrap(), None);
}

#[tokio::test]
async fn make_move__out_of_turn_is_reverted_and_changes_nothing() {
    // given
    let contract = FakeGameContract::new(alice());
    contract.join_as(bob(), Tier::TenMon).unwrap();
    join_with_required_payment(&contract, Tier::TenMon)
        .await
        .unwrap();
    let mut reconciler = Reconciler::new(1, Some(alice()));
    reconciler.observe(&contract.get_game(1).await.unwrap());

    // when
    let result = contract.make_move(1, 3).await;

    // then
    assert!(matches!(result, Err(Error::Reverted(reason)) if reason == "Not your turn"));
    assert!(
        reconciler
            .observe(&contract.get_game(1).await.unwrap())
            .is_empty()
    );
}

#[tokio::test]
async fn writes__without_a_wallet_fail_with_wallet_missing() {
    // given
    let contract = FakeGameContract::read_only();

    // when
    let joined = join_with_required_payment(&contract, Tier::OneMon).await;
    let moved = contract.make_move(1, 0).await;

    // then
    assert!(matches!(joined, Err(Error::WalletMissing)));
    assert!(matches!(moved, Err(Error::WalletMissing)));
    assert_eq!(contract.game_counter().await.unwrap(), 0);
}

#[tokio::test]
async fn make_move__rejects_tiles_outside_the_board() {
    // given
    let contract = FakeGameContract::new(alice());

    // then
    assert!(matches!(
        contract.make_move(1, 25).await,
        Err(Error::InvalidTile(25))
    ));
}

#[tokio::test]
async fn join_game__underpaying_is_reverted() {
    // given
    let contract = FakeGameContract::new(alice());

    // when
    let result = contract.join_game(Tier::FiveMon, mon(5)).await;

    // then
    assert!(matches!(result, Err(Error::Reverted(_))));
    assert_eq!(contract.balance_of(alice()), mon(100));
}
