//! Room State Definitions
//!
//! The authoritative snapshot of one match: board geometry, players,
//! fruit, teams, and the PRNG that places fruit. Uses `BTreeMap`/`BTreeSet`
//! for deterministic iteration order, and serializes to the camelCase JSON
//! layout the store and the client transport both expect.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::core::grid::{Direction, Point};
use crate::core::rng::DeterministicRng;

/// Default board width in cells.
pub const DEFAULT_BOARD_WIDTH: i32 = 40;

/// Default board height in cells.
pub const DEFAULT_BOARD_HEIGHT: i32 = 30;

/// Points awarded per fruit eaten.
pub const FRUIT_SCORE: u32 = 10;

/// Fruits placed on the board when a match starts.
pub const INITIAL_FRUIT_COUNT: usize = 5;

/// Snake colors assigned by join index at room start.
const PLAYER_COLORS: [&str; 4] = ["#FF0000", "#00FF00", "#0000FF", "#FFFF00"];

// =============================================================================
// ENUMS
// =============================================================================

/// Lifecycle status of a room. Transitions are one-way:
/// WAITING -> IN_GAME -> FINISHED.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    /// Room created, match not started.
    Waiting,
    /// Match running; the scheduler advances it every tick.
    InGame,
    /// Match over; the snapshot is deleted right after the terminal events.
    Finished,
}

/// Game mode, fixed at room start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameMode {
    /// Free-for-all; last snake alive or first to the target score.
    Competitive,
    /// Two fixed teams of two; team score decides.
    Team,
    /// Shared-goal mode. Has no defined termination rule yet (product gap):
    /// rooms in this mode never auto-finish.
    Cooperative,
}

// =============================================================================
// PLAYER
// =============================================================================

/// One player's state inside a match.
///
/// Players are never removed from the room: elimination flips `alive` so
/// final standings can still be computed after the match ends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Player name; immutable map key for the match.
    pub name: String,
    /// Snake color, assigned by join index.
    pub color: String,
    /// Snake body cells, head first.
    pub snake: VecDeque<Point>,
    /// Current heading; last write from Direction Intake wins.
    pub direction: Direction,
    /// Score this match. Monotonic while alive.
    pub score: u32,
    /// One-way flag, true -> false on elimination.
    pub alive: bool,
    /// High-water mark of `score`.
    pub max_score: u32,
}

impl Player {
    /// Create a player with a single-segment snake at `head`, heading right.
    pub fn new(name: impl Into<String>, color: impl Into<String>, head: Point) -> Self {
        let mut snake = VecDeque::new();
        snake.push_front(head);
        Self {
            name: name.into(),
            color: color.into(),
            snake,
            direction: Direction::Right,
            score: 0,
            alive: true,
            max_score: 0,
        }
    }

    /// Current head cell.
    pub fn head(&self) -> Option<Point> {
        self.snake.front().copied()
    }

    /// Grow: insert a new head cell.
    pub fn add_head(&mut self, cell: Point) {
        self.snake.push_front(cell);
    }

    /// Constant-length move: drop the tail cell.
    pub fn remove_tail(&mut self) {
        self.snake.pop_back();
    }

    /// Add points, tracking the high-water mark.
    pub fn add_score(&mut self, points: u32) {
        self.score = self.score.saturating_add(points);
        if self.score > self.max_score {
            self.max_score = self.score;
        }
    }

    /// Mark the player eliminated. The body stays where it is.
    pub fn eliminate(&mut self) {
        self.alive = false;
    }

    /// Number of body segments.
    pub fn len(&self) -> usize {
        self.snake.len()
    }

    /// True when the snake has no segments (never the case in a live room).
    pub fn is_empty(&self) -> bool {
        self.snake.is_empty()
    }
}

// =============================================================================
// TEAM
// =============================================================================

/// A team in TEAM mode. Membership is fixed at formation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    /// Team identifier (`team1`, `team2`).
    pub team_id: String,
    /// Member player names in join order.
    pub player_ids: Vec<String>,
    /// Sum of member fruit points.
    pub team_score: u32,
    /// True once no member is alive.
    pub eliminated: bool,
    /// Display color.
    pub team_color: String,
}

impl Team {
    /// Create a team. `team1` is blue, everything else black, matching the
    /// client's color scheme.
    pub fn new(team_id: impl Into<String>, player_ids: Vec<String>) -> Self {
        let team_id = team_id.into();
        let team_color = if team_id == "team1" { "blue" } else { "black" };
        Self {
            team_id,
            player_ids,
            team_score: 0,
            eliminated: false,
            team_color: team_color.to_string(),
        }
    }

    /// Add points to the team total.
    pub fn add_score(&mut self, points: u32) {
        self.team_score = self.team_score.saturating_add(points);
    }
}

// =============================================================================
// BOARD STATE (ROOM SNAPSHOT)
// =============================================================================

/// Complete serializable state of one room.
///
/// This is the unit of persistence: the scheduler reads one snapshot,
/// advances it a tick, and writes it back. The fruit RNG is part of the
/// snapshot so any instance resuming the room continues the same random
/// sequence.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardState {
    /// Room identifier; immutable for the snapshot's lifetime.
    pub room_id: String,
    /// Board width in cells.
    pub width: i32,
    /// Board height in cells.
    pub height: i32,
    /// Lifecycle status.
    pub status: RoomStatus,
    /// Mode, fixed at room start.
    pub game_mode: GameMode,
    /// Score threshold that ends the match early.
    pub target_score: u32,
    /// Players by name. Sole source of snake/direction truth.
    pub players: BTreeMap<String, Player>,
    /// Fruit cells. Never coincides with a snake cell at spawn time.
    pub fruits: BTreeSet<Point>,
    /// Teams by id (TEAM mode only, empty otherwise).
    pub teams: BTreeMap<String, Team>,
    /// Player name -> team id (TEAM mode only).
    pub player_to_team: BTreeMap<String, String>,
    /// Seed the fruit RNG was created from.
    pub seed: u64,
    /// Fruit RNG state. Serialized so replacement fruit is identical no
    /// matter which instance runs the tick.
    pub rng: DeterministicRng,
}

impl BoardState {
    /// Build the snapshot for a starting match.
    ///
    /// Player `i` of the ordered roster spawns at `(0, 2*i)` heading right,
    /// with a palette color by index. In TEAM mode with exactly four
    /// players, players 0-1 form `team1` and 2-3 form `team2`. Spawns the
    /// initial fruit.
    pub fn new(
        room_id: impl Into<String>,
        roster: &[String],
        game_mode: GameMode,
        target_score: u32,
        seed: u64,
    ) -> Self {
        let mut board = Self {
            room_id: room_id.into(),
            width: DEFAULT_BOARD_WIDTH,
            height: DEFAULT_BOARD_HEIGHT,
            status: RoomStatus::InGame,
            game_mode,
            target_score,
            players: BTreeMap::new(),
            fruits: BTreeSet::new(),
            teams: BTreeMap::new(),
            player_to_team: BTreeMap::new(),
            seed,
            rng: DeterministicRng::new(seed),
        };

        for (i, name) in roster.iter().enumerate() {
            let color = PLAYER_COLORS[i % PLAYER_COLORS.len()];
            let spawn = Point::new(0, 2 * i as i32);
            board
                .players
                .insert(name.clone(), Player::new(name.clone(), color, spawn));
        }

        board.assign_teams(roster);

        for _ in 0..INITIAL_FRUIT_COUNT {
            board.spawn_fruit();
        }

        board
    }

    /// Form teams once, immediately after all players are added.
    ///
    /// Only TEAM mode with exactly four players gets automatic assignment;
    /// membership never changes afterwards.
    fn assign_teams(&mut self, roster: &[String]) {
        if self.game_mode != GameMode::Team || roster.len() != 4 {
            return;
        }

        let team1 = Team::new("team1", roster[0..2].to_vec());
        let team2 = Team::new("team2", roster[2..4].to_vec());
        for member in &team1.player_ids {
            self.player_to_team.insert(member.clone(), "team1".into());
        }
        for member in &team2.player_ids {
            self.player_to_team.insert(member.clone(), "team2".into());
        }
        self.teams.insert("team1".into(), team1);
        self.teams.insert("team2".into(), team2);
    }

    /// Spawn one fruit on a uniformly random free cell.
    ///
    /// Rejection sampling against living snake cells; the board is sparse
    /// enough (at most a handful of snakes) that this terminates quickly.
    pub fn spawn_fruit(&mut self) {
        let occupied = self.occupied_cells();
        loop {
            let candidate = Point::new(
                self.rng.next_below(self.width as u32) as i32,
                self.rng.next_below(self.height as u32) as i32,
            );
            if !occupied.contains(&candidate) {
                self.fruits.insert(candidate);
                return;
            }
        }
    }

    /// Cells occupied by living snakes.
    pub fn occupied_cells(&self) -> BTreeSet<Point> {
        self.players
            .values()
            .filter(|p| p.alive)
            .flat_map(|p| p.snake.iter().copied())
            .collect()
    }

    /// Number of players still alive.
    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.alive).count()
    }

    /// Whether any member of `team_id` is still alive.
    pub fn team_has_alive(&self, team_id: &str) -> bool {
        self.teams
            .get(team_id)
            .map(|team| {
                team.player_ids
                    .iter()
                    .any(|name| self.players.get(name).is_some_and(|p| p.alive))
            })
            .unwrap_or(false)
    }

    /// Flip `eliminated` on teams that lost their last living member.
    pub fn refresh_team_eliminations(&mut self) {
        let dead_teams: Vec<String> = self
            .teams
            .keys()
            .filter(|id| !self.team_has_alive(id))
            .cloned()
            .collect();
        for id in dead_teams {
            if let Some(team) = self.teams.get_mut(&id) {
                team.eliminated = true;
            }
        }
    }

    /// The team that wins the match.
    ///
    /// The sole team with living members when the others fell, or on a
    /// target-score finish the surviving team with the highest total.
    pub fn winning_team(&self) -> Option<String> {
        let mut alive: Vec<&Team> = self
            .teams
            .values()
            .filter(|t| self.team_has_alive(&t.team_id))
            .collect();
        alive.sort_by_key(|t| t.team_score);
        alive.last().map(|t| t.team_id.clone())
    }

    /// Evaluate the mode's termination rule (after movement resolution).
    pub fn is_game_finished(&self) -> bool {
        match self.game_mode {
            GameMode::Competitive => {
                self.players.values().any(|p| p.score >= self.target_score)
                    || self.alive_count() <= 1
            }
            GameMode::Team => {
                let alive_teams = self
                    .teams
                    .keys()
                    .filter(|id| self.team_has_alive(id))
                    .count();
                self.teams.values().any(|t| t.team_score >= self.target_score)
                    || alive_teams <= 1
            }
            // No termination rule defined for this mode yet; never ends on
            // its own.
            GameMode::Cooperative => false,
        }
    }

    /// Final position of a player: 1 + count of players with a strictly
    /// greater score. Ties share a position.
    pub fn position_of(&self, name: &str) -> u32 {
        let score = self.players.get(name).map(|p| p.score).unwrap_or(0);
        1 + self
            .players
            .values()
            .filter(|other| other.name != name && other.score > score)
            .count() as u32
    }

    /// Whether `name` counts as a winner at finish time.
    pub fn player_won(&self, name: &str) -> bool {
        match self.game_mode {
            GameMode::Competitive => self.players.get(name).is_some_and(|p| p.alive),
            GameMode::Team => match (self.player_to_team.get(name), self.winning_team()) {
                (Some(team), Some(winner)) => *team == winner,
                _ => false,
            },
            GameMode::Cooperative => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_new_board_layout() {
        let board = BoardState::new(
            "room-1",
            &roster(&["ada", "grace", "linus"]),
            GameMode::Competitive,
            100,
            7,
        );

        assert_eq!(board.status, RoomStatus::InGame);
        assert_eq!(board.width, DEFAULT_BOARD_WIDTH);
        assert_eq!(board.height, DEFAULT_BOARD_HEIGHT);
        assert_eq!(board.fruits.len(), INITIAL_FRUIT_COUNT);

        // Spawn rows follow roster order, not map order.
        assert_eq!(board.players["ada"].head(), Some(Point::new(0, 0)));
        assert_eq!(board.players["grace"].head(), Some(Point::new(0, 2)));
        assert_eq!(board.players["linus"].head(), Some(Point::new(0, 4)));
        assert!(board.players.values().all(|p| p.direction == Direction::Right));
        assert_eq!(board.players["ada"].color, "#FF0000");
        assert_eq!(board.players["grace"].color, "#00FF00");
    }

    #[test]
    fn test_team_auto_assignment_pairs_by_join_order() {
        let names = roster(&["p1", "p2", "p3", "p4"]);
        let board = BoardState::new("room-t", &names, GameMode::Team, 50, 1);

        assert_eq!(board.teams.len(), 2);
        assert_eq!(board.teams["team1"].player_ids, vec!["p1", "p2"]);
        assert_eq!(board.teams["team2"].player_ids, vec!["p3", "p4"]);
        assert_eq!(board.player_to_team["p3"], "team2");
        assert_eq!(board.teams["team1"].team_color, "blue");
        assert_eq!(board.teams["team2"].team_color, "black");
    }

    #[test]
    fn test_no_teams_outside_team_mode_or_wrong_count() {
        let board = BoardState::new(
            "room-c",
            &roster(&["p1", "p2", "p3", "p4"]),
            GameMode::Competitive,
            50,
            1,
        );
        assert!(board.teams.is_empty());

        let board = BoardState::new("room-3", &roster(&["p1", "p2", "p3"]), GameMode::Team, 50, 1);
        assert!(board.teams.is_empty());
    }

    #[test]
    fn test_fruit_never_spawns_on_a_snake() {
        let mut board = BoardState::new("room-f", &roster(&["solo"]), GameMode::Competitive, 100, 3);
        // Give the snake a long body to make collisions likely.
        let body: VecDeque<Point> = (0..30).map(|x| Point::new(x, 0)).collect();
        board.players.get_mut("solo").unwrap().snake = body;

        for _ in 0..200 {
            board.spawn_fruit();
        }
        let occupied = board.occupied_cells();
        assert!(board.fruits.iter().all(|f| !occupied.contains(f)));
    }

    #[test]
    fn test_competitive_finishes_on_target_score_with_everyone_alive() {
        let mut board = BoardState::new(
            "room-s",
            &roster(&["a", "b", "c"]),
            GameMode::Competitive,
            30,
            9,
        );
        assert!(!board.is_game_finished());

        board.players.get_mut("b").unwrap().add_score(30);
        assert_eq!(board.alive_count(), 3);
        assert!(board.is_game_finished());
    }

    #[test]
    fn test_competitive_finishes_on_last_snake() {
        let mut board = BoardState::new("room-l", &roster(&["a", "b"]), GameMode::Competitive, 100, 2);
        board.players.get_mut("a").unwrap().eliminate();
        assert!(board.is_game_finished());
    }

    #[test]
    fn test_team_finish_and_winning_team() {
        let names = roster(&["p1", "p2", "p3", "p4"]);
        let mut board = BoardState::new("room-t", &names, GameMode::Team, 50, 4);
        assert!(!board.is_game_finished());

        board.players.get_mut("p1").unwrap().eliminate();
        board.players.get_mut("p2").unwrap().eliminate();
        board.refresh_team_eliminations();

        assert!(board.teams["team1"].eliminated);
        assert!(!board.teams["team2"].eliminated);
        assert!(board.is_game_finished());
        assert_eq!(board.winning_team().as_deref(), Some("team2"));
        assert!(board.player_won("p3"));
        assert!(!board.player_won("p1"));
    }

    #[test]
    fn test_cooperative_never_auto_finishes() {
        let mut board = BoardState::new("room-coop", &roster(&["a", "b"]), GameMode::Cooperative, 10, 5);
        board.players.get_mut("a").unwrap().add_score(50);
        board.players.get_mut("b").unwrap().eliminate();
        assert!(!board.is_game_finished());
    }

    #[test]
    fn test_positions_share_rank_on_ties() {
        let mut board = BoardState::new(
            "room-p",
            &roster(&["a", "b", "c", "d"]),
            GameMode::Competitive,
            1000,
            6,
        );
        board.players.get_mut("a").unwrap().add_score(30);
        board.players.get_mut("b").unwrap().add_score(20);
        board.players.get_mut("c").unwrap().add_score(20);

        assert_eq!(board.position_of("a"), 1);
        assert_eq!(board.position_of("b"), 2);
        assert_eq!(board.position_of("c"), 2);
        assert_eq!(board.position_of("d"), 4);
    }

    #[test]
    fn test_snapshot_wire_format_is_camel_case() {
        let board = BoardState::new("room-w", &roster(&["a"]), GameMode::Competitive, 100, 8);
        let json = serde_json::to_value(&board).unwrap();
        assert_eq!(json["roomId"], "room-w");
        assert_eq!(json["status"], "IN_GAME");
        assert_eq!(json["gameMode"], "COMPETITIVE");
        assert!(json["targetScore"].is_number());
        assert!(json.get("playerToTeam").is_some());
    }
}
