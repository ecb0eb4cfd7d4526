//! Step-wise execution of compiled maze programs

use super::world::RelativeDirection;
use log::debug;
use serde::{Deserialize, Serialize};

/// Everything a maze program can do to its world
pub trait MazeApi {
    fn move_forward(&mut self);
    fn turn_left(&mut self);
    fn turn_right(&mut self);
    fn is_path_forward(&self) -> bool;
    fn is_path_left(&self) -> bool;
    fn is_path_right(&self) -> bool;
}

/// Flat instruction; jump targets are instruction indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Instruction {
    Move,
    TurnLeft,
    TurnRight,
    JumpUnlessPath {
        direction: RelativeDirection,
        target: usize,
    },
    Jump {
        target: usize,
    },
}

/// Result of a single [`Interpreter::step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// One instruction was executed
    Stepped,
    /// No instructions left
    Finished,
    /// The step budget ran out before the program finished
    StepLimitExceeded,
}

/// Program counter over a fixed instruction list
#[derive(Debug, Clone)]
pub struct Interpreter {
    instructions: Vec<Instruction>,
    pc: usize,
    steps: u32,
    max_steps: u32,
}

impl Interpreter {
    pub fn new(instructions: Vec<Instruction>, max_steps: u32) -> Self {
        Self {
            instructions,
            pc: 0,
            steps: 0,
            max_steps,
        }
    }

    /// Instructions executed so far
    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn is_finished(&self) -> bool {
        self.pc >= self.instructions.len()
    }

    /// Execute exactly one instruction against `api`
    pub fn step<A: MazeApi + ?Sized>(&mut self, api: &mut A) -> StepOutcome {
        let Some(instruction) = self.instructions.get(self.pc).copied() else {
            return StepOutcome::Finished;
        };
        if self.steps >= self.max_steps {
            debug!("step limit {} reached at pc {}", self.max_steps, self.pc);
            return StepOutcome::StepLimitExceeded;
        }

        self.steps += 1;
        self.pc = match instruction {
            Instruction::Move => {
                api.move_forward();
                self.pc + 1
            }
            Instruction::TurnLeft => {
                api.turn_left();
                self.pc + 1
            }
            Instruction::TurnRight => {
                api.turn_right();
                self.pc + 1
            }
            Instruction::JumpUnlessPath { direction, target } => {
                let open = match direction {
                    RelativeDirection::Forward => api.is_path_forward(),
                    RelativeDirection::Left => api.is_path_left(),
                    RelativeDirection::Right => api.is_path_right(),
                };
                if open {
                    self.pc + 1
                } else {
                    target
                }
            }
            Instruction::Jump { target } => target,
        };
        StepOutcome::Stepped
    }

    /// Step until the program finishes or the budget runs out
    pub fn run_to_end<A: MazeApi + ?Sized>(&mut self, api: &mut A) -> StepOutcome {
        loop {
            match self.step(api) {
                StepOutcome::Stepped => continue,
                outcome => return outcome,
            }
        }
    }
}
