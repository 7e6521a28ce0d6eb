use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::sessionstate::GameRenderer;

pub const GRID_ROWS: u32 = 10;
pub const GRID_COLS: u32 = 10;

/// Index of the player's own grid in `update` payloads.
pub const OWN_GRID: usize = 0;
/// Index of the opponent's grid in `update` payloads.
pub const OPPONENT_GRID: usize = 1;

/// Whose turn it is. The server sends `true`/`false` for "your turn",
/// numeric player ids are accepted as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Turn {
    Mine(bool),
    Player(u64),
}

impl Turn {
    /// `None` when the turn names a player id this client cannot map to itself.
    pub fn is_own(&self) -> Option<bool> {
        match self {
            Turn::Mine(own) => Some(*own),
            Turn::Player(_) => None,
        }
    }
}

/// Payload of an `update` event, the state after a move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub turn: Turn,
    /// which of the two grids `grid` replaces
    pub grid_index: i64,
    /// forwarded untouched to the renderer
    pub grid: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellMark {
    Untouched,
    Miss,
    Hit,
}

impl CellMark {
    fn from_wire(value: i64) -> Self {
        match value {
            1 => CellMark::Miss,
            2 => CellMark::Hit,
            _ => CellMark::Untouched,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ship {
    pub x: u32,
    pub y: u32,
    pub size: u32,
    pub hits: u32,
    pub horizontal: bool,
}

impl Ship {
    pub fn is_sunk(&self) -> bool {
        self.hits >= self.size
    }

    pub fn covers(&self, x: u32, y: u32) -> bool {
        if self.horizontal {
            y == self.y && x >= self.x && x - self.x < self.size
        } else {
            x == self.x && y >= self.y && y - self.y < self.size
        }
    }

    /// Whether every cell of the ship lies on a 10x10 board.
    pub fn fits_on_board(&self) -> bool {
        let (start, across, length, width) = if self.horizontal {
            (self.x, self.y, GRID_COLS, GRID_ROWS)
        } else {
            (self.y, self.x, GRID_ROWS, GRID_COLS)
        };
        across < width && start.checked_add(self.size).map_or(false, |end| end <= length)
    }
}

/// One player's board as the server describes it. The own grid lists every
/// ship, the opponent grid only the sunk ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    /// row major, one entry per cell
    pub shots: Vec<i64>,
    pub ships: Vec<Ship>,
}

impl Grid {
    pub fn mark(&self, x: u32, y: u32) -> CellMark {
        if x >= GRID_COLS || y >= GRID_ROWS {
            return CellMark::Untouched;
        }
        let index = (y * GRID_COLS + x) as usize;
        self.shots
            .get(index)
            .map_or(CellMark::Untouched, |value| CellMark::from_wire(*value))
    }

    pub fn ship_at(&self, x: u32, y: u32) -> Option<&Ship> {
        self.ships.iter().find(|ship| ship.covers(x, y))
    }
}

/// A square on the opponent grid, sent as the payload of `shot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Square {
    pub x: u32,
    pub y: u32,
}

/// What the client knows about the running match. Reset on every `join`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoardState {
    grids: [Option<Grid>; 2],
    turn: Option<Turn>,
    game_over: Option<bool>,
}

impl BoardState {
    pub fn grid(&self, index: usize) -> Option<&Grid> {
        self.grids.get(index).and_then(Option::as_ref)
    }

    pub fn turn(&self) -> Option<Turn> {
        self.turn
    }

    /// `Some(is_winner)` once the server has ended the match.
    pub fn game_over(&self) -> Option<bool> {
        self.game_over
    }

    /// Whether clicking `square` on the opponent grid makes sense right now.
    /// The server stays the authority, this only greys out the board.
    pub fn can_shoot(&self, square: Square) -> bool {
        if self.game_over.is_some() || self.turn.and_then(|turn| turn.is_own()) != Some(true) {
            return false;
        }
        self.grid(OPPONENT_GRID)
            .map_or(false, |grid| grid.mark(square.x, square.y) == CellMark::Untouched)
    }
}

impl GameRenderer for BoardState {
    fn init_game(&mut self) {
        *self = BoardState::default();
    }

    fn update_grid(&mut self, grid_index: i64, grid: Value) {
        let slot = match usize::try_from(grid_index) {
            Ok(index) if index < self.grids.len() => index,
            _ => {
                warn!("Dropping grid with index {}", grid_index);
                return;
            }
        };
        match serde_json::from_value::<Grid>(grid) {
            Ok(grid) => match grid.ships.iter().find(|ship| !ship.fits_on_board()) {
                Some(ship) => warn!("Dropping grid {} with off-board ship {:?}", grid_index, ship),
                None => self.grids[slot] = Some(grid),
            },
            Err(e) => warn!("Dropping undrawable grid {}: {}", grid_index, e),
        }
    }

    fn set_turn(&mut self, turn: Turn) {
        self.turn = Some(turn);
    }

    fn set_game_over(&mut self, is_winner: bool) {
        self.game_over = Some(is_winner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn empty_shots() -> Vec<i64> {
        vec![0; (GRID_ROWS * GRID_COLS) as usize]
    }

    #[test]
    fn decodes_server_update() {
        let raw = json!({
            "turn": true,
            "gridIndex": 1,
            "grid": {"shots": empty_shots(), "ships": []}
        })
        .to_string();
        let state: GameState = serde_json::from_str(&raw).unwrap();
        assert_eq!(state.turn, Turn::Mine(true));
        assert_eq!(state.grid_index, 1);
        assert!(state.grid["ships"].as_array().unwrap().is_empty());
    }

    #[test]
    fn numeric_turn_is_accepted() {
        let state: GameState = serde_json::from_str(r#"{"turn":2,"gridIndex":0,"grid":[]}"#).unwrap();
        assert_eq!(state.turn, Turn::Player(2));
        assert_eq!(state.turn.is_own(), None);
    }

    #[test]
    fn ship_covers_its_cells() {
        let ship = Ship { x: 3, y: 2, size: 4, hits: 0, horizontal: true };
        assert!(ship.covers(3, 2));
        assert!(ship.covers(6, 2));
        assert!(!ship.covers(7, 2));
        assert!(!ship.covers(3, 3));

        let ship = Ship { x: 1, y: 1, size: 5, hits: 5, horizontal: false };
        assert!(ship.covers(1, 5));
        assert!(!ship.covers(1, 6));
        assert!(ship.is_sunk());
    }

    #[test]
    fn oversized_ship_covers_without_overflow() {
        let ship = Ship { x: 5, y: 0, size: u32::MAX, hits: 0, horizontal: true };
        assert!(ship.covers(9, 0));
        assert!(!ship.covers(4, 0));
        assert!(!ship.fits_on_board());
    }

    #[test]
    fn ships_must_stay_on_the_board() {
        assert!(Ship { x: 6, y: 9, size: 4, hits: 0, horizontal: true }.fits_on_board());
        assert!(!Ship { x: 7, y: 0, size: 4, hits: 0, horizontal: true }.fits_on_board());
        assert!(!Ship { x: 0, y: 10, size: 2, hits: 0, horizontal: true }.fits_on_board());
        assert!(Ship { x: 9, y: 5, size: 5, hits: 0, horizontal: false }.fits_on_board());
        assert!(!Ship { x: 10, y: 0, size: 1, hits: 0, horizontal: false }.fits_on_board());
    }

    #[test]
    fn grid_with_off_board_ship_keeps_previous() {
        let mut board = BoardState::default();
        let ship = json!({"x": 1, "y": 1, "size": 3, "hits": 0, "horizontal": false});
        board.update_grid(0, json!({"shots": empty_shots(), "ships": [ship]}));

        let runaway = json!({"x": 5, "y": 0, "size": 4294967295u32, "hits": 0, "horizontal": true});
        board.update_grid(0, json!({"shots": empty_shots(), "ships": [runaway]}));

        let grid = board.grid(OWN_GRID).unwrap();
        assert_eq!(grid.ships.len(), 1);
        for y in 0..GRID_ROWS {
            for x in 0..GRID_COLS {
                assert_eq!(grid.ship_at(x, y).is_some(), x == 1 && (1..4).contains(&y));
            }
        }
    }

    #[test]
    fn grid_marks_are_row_major() {
        let mut shots = empty_shots();
        shots[2 * GRID_COLS as usize + 7] = 2;
        shots[9] = 1;
        let grid = Grid { shots, ships: Vec::new() };
        assert_eq!(grid.mark(7, 2), CellMark::Hit);
        assert_eq!(grid.mark(9, 0), CellMark::Miss);
        assert_eq!(grid.mark(0, 0), CellMark::Untouched);
        assert_eq!(grid.mark(10, 0), CellMark::Untouched);
    }

    #[test]
    fn board_stores_grids_by_index() {
        let mut board = BoardState::default();
        board.update_grid(0, json!({"shots": empty_shots(), "ships": []}));
        assert!(board.grid(OWN_GRID).is_some());
        assert!(board.grid(OPPONENT_GRID).is_none());

        board.update_grid(5, json!({"shots": [], "ships": []}));
        board.update_grid(-1, json!({"shots": [], "ships": []}));
        assert!(board.grid(OPPONENT_GRID).is_none());
    }

    #[test]
    fn undrawable_grid_keeps_previous() {
        let mut board = BoardState::default();
        board.update_grid(1, json!({"shots": [1], "ships": []}));
        board.update_grid(1, json!([1, 2, 3]));
        assert_eq!(board.grid(OPPONENT_GRID).unwrap().shots, vec![1]);
    }

    #[test]
    fn init_game_resets_everything() {
        let mut board = BoardState::default();
        board.update_grid(0, json!({"shots": [], "ships": []}));
        board.set_turn(Turn::Mine(true));
        board.set_game_over(false);
        board.init_game();
        assert_eq!(board, BoardState::default());
    }

    #[test]
    fn shooting_needs_own_turn_and_fresh_cell() {
        let mut board = BoardState::default();
        let mut shots = empty_shots();
        shots[0] = 1;
        board.update_grid(1, json!({"shots": shots, "ships": []}));

        let fresh = Square { x: 4, y: 4 };
        assert!(!board.can_shoot(fresh));

        board.set_turn(Turn::Mine(true));
        assert!(board.can_shoot(fresh));
        assert!(!board.can_shoot(Square { x: 0, y: 0 }));

        board.set_game_over(true);
        assert!(!board.can_shoot(fresh));
    }
}
