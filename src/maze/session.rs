//! A maze level with the program being edited for it

use super::blocks::{compile, BlockProgram, CompileError, CompiledProgram};
use super::interpreter::{Interpreter, StepOutcome};
use super::world::{Heading, LevelError, MazeLevel, MazeWorld, Position};
use crate::config::MazeConfig;
use crate::store::{get_as, upsert_as, Filter, Store, StoreError};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Table holding one saved program per block id
pub const BLOCK_PROGRAMS_TABLE: &str = "block_programs";

/// Stops a running program before its next step
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunOutcome {
    /// Program finished with the player on the goal
    Success,
    /// Program finished anywhere else
    Failure,
    StepLimitExceeded,
    Cancelled,
}

impl RunOutcome {
    pub fn is_success(self) -> bool {
        self == RunOutcome::Success
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Success => write!(f, "Congratulations, you reached the goal!"),
            RunOutcome::Failure => write!(f, "Not quite, try again"),
            RunOutcome::StepLimitExceeded => {
                write!(f, "Step limit reached, does the program loop forever?")
            }
            RunOutcome::Cancelled => write!(f, "Run cancelled"),
        }
    }
}

/// Summary of a finished run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub steps: u32,
    pub position: Position,
    pub heading: Heading,
}

#[derive(Debug, Serialize, Deserialize)]
struct BlockProgramRecord {
    block_id: String,
    /// Program as JSON text
    program: String,
    /// Compiled script; empty when the program does not compile
    source: String,
}

/// Level, world and program for one maze exercise
#[derive(Debug)]
pub struct MazeSession {
    level: MazeLevel,
    world: MazeWorld,
    program: BlockProgram,
    compiled: Option<CompiledProgram>,
    config: MazeConfig,
    cancel: CancelHandle,
}

impl MazeSession {
    pub fn new(level: MazeLevel, config: MazeConfig) -> Result<Self, LevelError> {
        let world = level.world()?;
        Ok(Self {
            level,
            world,
            program: BlockProgram::default(),
            compiled: None,
            config,
            cancel: CancelHandle::default(),
        })
    }

    pub fn level(&self) -> &MazeLevel {
        &self.level
    }

    pub fn world(&self) -> &MazeWorld {
        &self.world
    }

    pub fn program(&self) -> &BlockProgram {
        &self.program
    }

    /// Replace the program; the next run recompiles it
    pub fn set_program(&mut self, program: BlockProgram) {
        self.program = program;
        self.compiled = None;
    }

    pub fn compile(&mut self) -> Result<&CompiledProgram, CompileError> {
        let compiled = match self.compiled.take() {
            Some(compiled) => compiled,
            None => compile(&self.program)?,
        };
        Ok(self.compiled.insert(compiled))
    }

    /// Step budget: the level's own limit, else the configured one
    pub fn max_steps(&self) -> u32 {
        self.level.max_steps.unwrap_or(self.config.max_steps)
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn reset(&mut self) {
        self.world.reset();
    }

    /// Compile, reset the world and execute the program step by step.
    ///
    /// `observer` sees the world after every executed instruction. Steps are
    /// separated by the configured delay. A compile error leaves the world
    /// untouched. Any earlier cancellation is cleared when the run starts.
    pub fn run<F>(&mut self, mut observer: F) -> Result<RunReport, CompileError>
    where
        F: FnMut(&MazeWorld, u32),
    {
        let instructions = self.compile()?.instructions.clone();
        let max_steps = self.max_steps();
        let delay = Duration::from_millis(self.config.step_delay_ms);

        self.world.reset();
        self.cancel.clear();
        let mut interpreter = Interpreter::new(instructions, max_steps);

        let outcome = loop {
            if self.cancel.is_cancelled() {
                break RunOutcome::Cancelled;
            }
            match interpreter.step(&mut self.world) {
                StepOutcome::Stepped => {
                    observer(&self.world, interpreter.steps());
                    if !delay.is_zero() && !interpreter.is_finished() {
                        std::thread::sleep(delay);
                    }
                }
                StepOutcome::Finished if self.world.at_goal() => break RunOutcome::Success,
                StepOutcome::Finished => break RunOutcome::Failure,
                StepOutcome::StepLimitExceeded => break RunOutcome::StepLimitExceeded,
            }
        };

        debug!(
            "maze '{}' finished after {} steps: {:?}",
            self.level.name,
            interpreter.steps(),
            outcome
        );
        Ok(RunReport {
            outcome,
            steps: interpreter.steps(),
            position: self.world.player(),
            heading: self.world.heading(),
        })
    }

    /// Persist the program and its compiled script under `block_id`
    pub fn save(&mut self, store: &mut dyn Store, block_id: &str) -> Result<(), StoreError> {
        let source = match self.compile() {
            Ok(compiled) => compiled.source.clone(),
            Err(e) => {
                debug!("saving '{}' without a script: {}", block_id, e);
                String::new()
            }
        };
        let record = BlockProgramRecord {
            block_id: block_id.to_string(),
            program: serde_json::to_string(&self.program)?,
            source,
        };
        upsert_as(store, BLOCK_PROGRAMS_TABLE, &record, &["block_id"])
    }

    /// Restore the program saved under `block_id`. Returns false if none was saved.
    pub fn load(&mut self, store: &dyn Store, block_id: &str) -> Result<bool, StoreError> {
        let filter = Filter::new().eq("block_id", block_id);
        let Some(record) = get_as::<BlockProgramRecord>(store, BLOCK_PROGRAMS_TABLE, &filter)?
        else {
            return Ok(false);
        };
        let program: BlockProgram = serde_json::from_str(&record.program)?;
        self.set_program(program);
        Ok(true)
    }
}

impl Drop for MazeSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
