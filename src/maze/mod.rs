//! Block-programmed maze game
//!
//! A [`BlockProgram`] is compiled to flat [`Instruction`]s which an
//! [`Interpreter`] executes one at a time against anything implementing
//! [`MazeApi`]. [`MazeSession`] ties a level, its world and a program together.

pub mod blocks;
pub mod interpreter;
pub mod session;
pub mod world;

pub use blocks::{compile, Block, BlockProgram, CompileError, CompiledProgram};
pub use interpreter::{Instruction, Interpreter, MazeApi, StepOutcome};
pub use session::{CancelHandle, MazeSession, RunOutcome, RunReport, BLOCK_PROGRAMS_TABLE};
pub use world::{Cell, Heading, LevelError, MazeLevel, MazeWorld, Position, RelativeDirection};
