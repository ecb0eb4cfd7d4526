//! Grid world for the maze game

use super::interpreter::MazeApi;
use crate::exercise::{load_document, LoadError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Error building a maze from a level map
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LevelError {
    #[error("level map is empty")]
    Empty,

    #[error("unknown cell '{ch}' at row {row}, column {column}")]
    UnknownCell { ch: char, row: usize, column: usize },

    #[error("level has no start marker (one of ^ > v <)")]
    NoStart,

    #[error("level has more than one start marker")]
    MultipleStarts,

    #[error("level has no goal (G)")]
    NoGoal,

    #[error("level has more than one goal")]
    MultipleGoals,

    #[error("position ({x}, {y}) is outside the grid or on a wall")]
    BlockedPosition { x: usize, y: usize },
}

/// Kind of a grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cell {
    Wall,
    Open,
    Goal,
}

/// Compass heading; rows grow southwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Heading {
    North,
    East,
    South,
    West,
}

impl Heading {
    pub const ALL: [Heading; 4] = [Heading::North, Heading::East, Heading::South, Heading::West];

    pub fn turned_left(self) -> Self {
        match self {
            Heading::North => Heading::West,
            Heading::West => Heading::South,
            Heading::South => Heading::East,
            Heading::East => Heading::North,
        }
    }

    pub fn turned_right(self) -> Self {
        match self {
            Heading::North => Heading::East,
            Heading::East => Heading::South,
            Heading::South => Heading::West,
            Heading::West => Heading::North,
        }
    }

    /// Column and row offset of one step in this heading
    pub fn delta(self) -> (i64, i64) {
        match self {
            Heading::North => (0, -1),
            Heading::East => (1, 0),
            Heading::South => (0, 1),
            Heading::West => (-1, 0),
        }
    }

    fn marker(self) -> char {
        match self {
            Heading::North => '^',
            Heading::East => '>',
            Heading::South => 'v',
            Heading::West => '<',
        }
    }

    fn from_marker(ch: char) -> Option<Self> {
        match ch {
            '^' => Some(Heading::North),
            '>' => Some(Heading::East),
            'v' | 'V' => Some(Heading::South),
            '<' => Some(Heading::West),
            _ => None,
        }
    }
}

impl fmt::Display for Heading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Heading::North => write!(f, "N"),
            Heading::East => write!(f, "E"),
            Heading::South => write!(f, "S"),
            Heading::West => write!(f, "W"),
        }
    }
}

/// Direction relative to the player's heading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelativeDirection {
    Forward,
    Left,
    Right,
}

impl RelativeDirection {
    pub fn from_heading(self, heading: Heading) -> Heading {
        match self {
            RelativeDirection::Forward => heading,
            RelativeDirection::Left => heading.turned_left(),
            RelativeDirection::Right => heading.turned_right(),
        }
    }
}

impl std::str::FromStr for RelativeDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "forward" | "ahead" => Ok(RelativeDirection::Forward),
            "left" => Ok(RelativeDirection::Left),
            "right" => Ok(RelativeDirection::Right),
            _ => Err(format!("Unknown direction: {}", s)),
        }
    }
}

/// Column/row coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Maze state. Mutated only through the [`MazeApi`] primitives and [`reset`](Self::reset).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MazeWorld {
    grid: Vec<Vec<Cell>>,
    start: Position,
    start_heading: Heading,
    goal: Position,
    player: Position,
    heading: Heading,
}

impl MazeWorld {
    /// Build a world from an explicit grid. The goal cell is marked in the grid.
    pub fn new(
        mut grid: Vec<Vec<Cell>>,
        start: Position,
        heading: Heading,
        goal: Position,
    ) -> Result<Self, LevelError> {
        if grid.is_empty() || grid.iter().all(Vec::is_empty) {
            return Err(LevelError::Empty);
        }

        let open = |grid: &Vec<Vec<Cell>>, p: Position| {
            grid.get(p.y)
                .and_then(|row| row.get(p.x))
                .is_some_and(|cell| *cell != Cell::Wall)
        };
        if !open(&grid, start) {
            return Err(LevelError::BlockedPosition {
                x: start.x,
                y: start.y,
            });
        }
        if !open(&grid, goal) {
            return Err(LevelError::BlockedPosition {
                x: goal.x,
                y: goal.y,
            });
        }
        grid[goal.y][goal.x] = Cell::Goal;

        Ok(Self {
            grid,
            start,
            start_heading: heading,
            goal,
            player: start,
            heading,
        })
    }

    /// All-open rectangle
    pub fn open(
        width: usize,
        height: usize,
        start: Position,
        heading: Heading,
        goal: Position,
    ) -> Result<Self, LevelError> {
        Self::new(vec![vec![Cell::Open; width]; height], start, heading, goal)
    }

    /// Parse an ASCII map: `#` wall, `.` or space open, `G` goal, `^ > v <` start.
    /// Short rows are padded with walls.
    pub fn parse<S: AsRef<str>>(rows: &[S]) -> Result<Self, LevelError> {
        let mut grid = Vec::new();
        let mut start = None;
        let mut goal = None;

        for (y, row) in rows.iter().enumerate() {
            let mut cells = Vec::new();
            for (x, ch) in row.as_ref().chars().enumerate() {
                let cell = match ch {
                    '#' => Cell::Wall,
                    '.' | ' ' => Cell::Open,
                    'G' | 'g' => {
                        if goal.replace(Position::new(x, y)).is_some() {
                            return Err(LevelError::MultipleGoals);
                        }
                        Cell::Goal
                    }
                    other => match Heading::from_marker(other) {
                        Some(heading) => {
                            if start.replace((Position::new(x, y), heading)).is_some() {
                                return Err(LevelError::MultipleStarts);
                            }
                            Cell::Open
                        }
                        None => {
                            return Err(LevelError::UnknownCell {
                                ch: other,
                                row: y + 1,
                                column: x + 1,
                            })
                        }
                    },
                };
                cells.push(cell);
            }
            grid.push(cells);
        }

        let width = grid.iter().map(Vec::len).max().unwrap_or(0);
        if width == 0 {
            return Err(LevelError::Empty);
        }
        for row in &mut grid {
            row.resize(width, Cell::Wall);
        }

        let (start, heading) = start.ok_or(LevelError::NoStart)?;
        let goal = goal.ok_or(LevelError::NoGoal)?;
        Self::new(grid, start, heading, goal)
    }

    pub fn width(&self) -> usize {
        self.grid.first().map(Vec::len).unwrap_or(0)
    }

    pub fn height(&self) -> usize {
        self.grid.len()
    }

    pub fn player(&self) -> Position {
        self.player
    }

    pub fn heading(&self) -> Heading {
        self.heading
    }

    pub fn goal(&self) -> Position {
        self.goal
    }

    pub fn at_goal(&self) -> bool {
        self.player == self.goal
    }

    /// Cell at a signed coordinate; outside the grid reads as wall
    pub fn cell(&self, x: i64, y: i64) -> Cell {
        if x < 0 || y < 0 {
            return Cell::Wall;
        }
        self.grid
            .get(y as usize)
            .and_then(|row| row.get(x as usize))
            .copied()
            .unwrap_or(Cell::Wall)
    }

    fn neighbor(&self, heading: Heading) -> (i64, i64) {
        let (dx, dy) = heading.delta();
        (self.player.x as i64 + dx, self.player.y as i64 + dy)
    }

    /// Whether the cell in a relative direction is walkable
    pub fn is_path(&self, direction: RelativeDirection) -> bool {
        let (x, y) = self.neighbor(direction.from_heading(self.heading));
        self.cell(x, y) != Cell::Wall
    }

    /// Back to the start position and heading
    pub fn reset(&mut self) {
        self.player = self.start;
        self.heading = self.start_heading;
    }

    /// ASCII rendering with the player drawn as its heading marker
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (y, row) in self.grid.iter().enumerate() {
            for (x, cell) in row.iter().enumerate() {
                let ch = if self.player == Position::new(x, y) {
                    self.heading.marker()
                } else {
                    match cell {
                        Cell::Wall => '#',
                        Cell::Open => '.',
                        Cell::Goal => 'G',
                    }
                };
                out.push(ch);
            }
            out.push('\n');
        }
        out
    }
}

impl MazeApi for MazeWorld {
    fn move_forward(&mut self) {
        let (x, y) = self.neighbor(self.heading);
        if self.cell(x, y) != Cell::Wall {
            self.player = Position::new(x as usize, y as usize);
        }
    }

    fn turn_left(&mut self) {
        self.heading = self.heading.turned_left();
    }

    fn turn_right(&mut self) {
        self.heading = self.heading.turned_right();
    }

    fn is_path_forward(&self) -> bool {
        self.is_path(RelativeDirection::Forward)
    }

    fn is_path_left(&self) -> bool {
        self.is_path(RelativeDirection::Left)
    }

    fn is_path_right(&self) -> bool {
        self.is_path(RelativeDirection::Right)
    }
}

/// Level file: a named ASCII map with an optional step limit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MazeLevel {
    #[serde(default)]
    pub name: String,

    pub map: Vec<String>,

    /// Overrides the configured step limit
    #[serde(default)]
    pub max_steps: Option<u32>,
}

impl MazeLevel {
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let level: Self = load_document(path)?;
        level
            .world()
            .map_err(|e| LoadError::Invalid(format!("{}: {}", path.display(), e)))?;
        Ok(level)
    }

    /// Fresh world for this level
    pub fn world(&self) -> Result<MazeWorld, LevelError> {
        MazeWorld::parse(self.map.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Player boxed in by walls on every side
    fn boxed_in(heading: Heading) -> MazeWorld {
        let mut world = MazeWorld::parse(&["###G", "#>##", "####"]).unwrap();
        world.heading = heading;
        world.start_heading = heading;
        world
    }

    #[test]
    fn test_parse_level() {
        let world = MazeWorld::parse(&["#####", "#>.G#", "#####"]).unwrap();
        assert_eq!(world.width(), 5);
        assert_eq!(world.height(), 3);
        assert_eq!(world.player(), Position::new(1, 1));
        assert_eq!(world.heading(), Heading::East);
        assert_eq!(world.goal(), Position::new(3, 1));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(MazeWorld::parse::<&str>(&[]), Err(LevelError::Empty));
        assert_eq!(MazeWorld::parse(&["..G"]), Err(LevelError::NoStart));
        assert_eq!(MazeWorld::parse(&[">.."]), Err(LevelError::NoGoal));
        assert_eq!(MazeWorld::parse(&[">.<G"]), Err(LevelError::MultipleStarts));
        assert_eq!(MazeWorld::parse(&[">GG"]), Err(LevelError::MultipleGoals));
        assert_eq!(
            MazeWorld::parse(&[">.xG"]),
            Err(LevelError::UnknownCell {
                ch: 'x',
                row: 1,
                column: 3
            })
        );
    }

    #[test]
    fn test_ragged_rows_padded_with_walls() {
        let world = MazeWorld::parse(&[">..G", "."]).unwrap();
        assert_eq!(world.cell(3, 1), Cell::Wall);
        assert_eq!(world.cell(0, 1), Cell::Open);
    }

    #[test]
    fn test_move_into_wall_is_noop_for_all_headings() {
        for heading in Heading::ALL {
            let mut world = boxed_in(heading);
            let before = (world.player(), world.heading());
            world.move_forward();
            assert_eq!((world.player(), world.heading()), before, "heading {}", heading);
        }
    }

    #[test]
    fn test_move_off_grid_is_noop() {
        let mut world = MazeWorld::open(2, 1, Position::new(0, 0), Heading::West, Position::new(1, 0))
            .unwrap();
        world.move_forward();
        assert_eq!(world.player(), Position::new(0, 0));
    }

    #[test]
    fn test_four_turns_restore_heading() {
        for heading in Heading::ALL {
            let mut world = boxed_in(heading);
            for _ in 0..4 {
                world.turn_left();
            }
            assert_eq!(world.heading(), heading);
            for _ in 0..4 {
                world.turn_right();
            }
            assert_eq!(world.heading(), heading);
        }
    }

    #[test]
    fn test_turn_cycle_order() {
        assert_eq!(Heading::North.turned_right(), Heading::East);
        assert_eq!(Heading::East.turned_right(), Heading::South);
        assert_eq!(Heading::North.turned_left(), Heading::West);
    }

    #[test]
    fn test_path_queries() {
        // Facing east from the corner of an L-shaped corridor
        let world = MazeWorld::parse(&["#G##", "#>.#", "####"]).unwrap();
        assert!(world.is_path_forward());
        assert!(world.is_path_left());
        assert!(!world.is_path_right());
    }

    #[test]
    fn test_reset() {
        let mut world = MazeWorld::parse(&[">..G"]).unwrap();
        world.move_forward();
        world.turn_right();
        world.reset();
        assert_eq!(world.player(), Position::new(0, 0));
        assert_eq!(world.heading(), Heading::East);
    }

    #[test]
    fn test_render() {
        let mut world = MazeWorld::parse(&["#####", "#>.G#", "#####"]).unwrap();
        world.move_forward();
        assert_eq!(world.render(), "#####\n#.>G#\n#####\n");
    }

    #[test]
    fn test_blocked_goal_rejected() {
        let grid = vec![vec![Cell::Open, Cell::Wall]];
        let err = MazeWorld::new(grid, Position::new(0, 0), Heading::East, Position::new(1, 0))
            .unwrap_err();
        assert_eq!(err, LevelError::BlockedPosition { x: 1, y: 0 });
    }

    #[test]
    fn test_level_from_yaml() {
        let level: MazeLevel = serde_yaml::from_str(
            "name: corridor\nmap:\n  - \"#####\"\n  - \"#>.G#\"\n  - \"#####\"\nmax_steps: 20\n",
        )
        .unwrap();
        assert_eq!(level.max_steps, Some(20));
        assert_eq!(level.world().unwrap().goal(), Position::new(3, 1));
    }
}
