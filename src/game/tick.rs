//! Authoritative Simulation Tick
//!
//! Advances one room snapshot by exactly one discrete step. The function is
//! pure state transition: snapshot in, snapshot + ordered event list out.
//! All iteration is over `BTreeMap`s, so two instances advancing the same
//! snapshot produce identical results.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::grid::Point;
use crate::game::events::{BoardEventKind, GameEvent, PlayerResult};
use crate::game::state::{BoardState, GameMode, RoomStatus, FRUIT_SCORE};

/// Result of advancing a room by one tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick, in emission order.
    pub events: Vec<GameEvent>,
    /// Whether the match finished this tick. The caller deletes the
    /// snapshot from the store instead of persisting it.
    pub finished: bool,
}

/// Run one simulation tick.
///
/// Per-tick phases:
/// 1. Compute each alive player's candidate head from its current heading.
/// 2. Eliminate candidates that leave the board or land on any cell a
///    living snake occupied at tick start. Head-to-head movers into the
///    same empty cell are all eliminated. Each check is independent of
///    processing order.
/// 3. Move survivors: grow onto a fruit cell (+10, team credit, replacement
///    spawn) or drop the tail for a constant-length move.
/// 4. Evaluate the mode's termination rule and compute final standings.
///
/// Rooms not `IN_GAME` are left untouched.
pub fn advance(board: &mut BoardState) -> TickResult {
    let mut result = TickResult::default();

    if board.status != RoomStatus::InGame {
        return result;
    }

    // Phase 1: candidate heads, all derived from the pre-tick snapshot.
    let occupied = board.occupied_cells();
    let mut candidates: BTreeMap<String, Point> = BTreeMap::new();
    for player in board.players.values().filter(|p| p.alive) {
        if let Some(head) = player.head() {
            candidates.insert(player.name.clone(), player.direction.step(head));
        }
    }

    // Contested cells: two heads entering the same cell kill both movers.
    let mut entering: BTreeMap<Point, u32> = BTreeMap::new();
    for cell in candidates.values() {
        *entering.entry(*cell).or_insert(0) += 1;
    }

    // Phase 2: independent elimination checks against pre-tick state.
    let mut doomed: BTreeSet<String> = BTreeSet::new();
    for (name, candidate) in &candidates {
        let off_board = !candidate.in_bounds(board.width, board.height);
        let hits_snake = occupied.contains(candidate);
        let contested = entering.get(candidate).copied().unwrap_or(0) > 1;
        if off_board || hits_snake || contested {
            doomed.insert(name.clone());
        }
    }

    // Phase 3: apply eliminations and movement in sorted player order.
    let mut collisions: Vec<(String, u32, u32)> = Vec::new();
    let mut feedings: Vec<String> = Vec::new();

    for (name, candidate) in &candidates {
        if doomed.contains(name) {
            // Standing at the moment of elimination: last among the living.
            let position = board.alive_count() as u32;
            if let Some(player) = board.players.get_mut(name) {
                player.eliminate();
                collisions.push((name.clone(), player.score, position));
            }
            continue;
        }

        let ate = board.fruits.remove(candidate);
        if let Some(player) = board.players.get_mut(name) {
            player.add_head(*candidate);
            if ate {
                player.add_score(FRUIT_SCORE);
            } else {
                player.remove_tail();
            }
        }

        if ate {
            if board.game_mode == GameMode::Team {
                if let Some(team_id) = board.player_to_team.get(name).cloned() {
                    if let Some(team) = board.teams.get_mut(&team_id) {
                        team.add_score(FRUIT_SCORE);
                    }
                }
            }
            // Replacement fruit in the same tick; the set never drains.
            board.spawn_fruit();
            feedings.push(name.clone());
        }
    }

    if board.game_mode == GameMode::Team {
        board.refresh_team_eliminations();
    }

    // Phase 4: termination.
    result.finished = board.is_game_finished();
    if result.finished {
        board.status = RoomStatus::Finished;
    }

    // Emit events against the post-tick snapshot: collisions, feedings,
    // the unconditional per-tick update, then the terminal pair.
    for (name, final_score, position) in collisions {
        result.events.push(GameEvent::board(
            BoardEventKind::Collision,
            Some(name.clone()),
            board.clone(),
        ));
        result
            .events
            .push(GameEvent::eliminated(&name, &board.room_id, final_score, position));
    }
    for name in feedings {
        result.events.push(GameEvent::board(
            BoardEventKind::Fruit,
            Some(name),
            board.clone(),
        ));
        result.events.push(GameEvent::score_update(board));
    }
    result
        .events
        .push(GameEvent::board(BoardEventKind::Update, None, board.clone()));
    if result.finished {
        result
            .events
            .push(GameEvent::board(BoardEventKind::End, None, board.clone()));
        result
            .events
            .push(GameEvent::finished(&board.room_id, final_results(board)));
    }

    result
}

/// Final standings for every player in the room, alive or eliminated.
pub fn final_results(board: &BoardState) -> Vec<PlayerResult> {
    board
        .players
        .values()
        .map(|player| PlayerResult {
            username: player.name.clone(),
            final_score: player.score,
            position: board.position_of(&player.name),
            won: board.player_won(&player.name),
        })
        .collect()
}
