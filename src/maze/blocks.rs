//! Block programs and their compilation to interpreter instructions

use super::interpreter::Instruction;
use super::world::RelativeDirection;
use crate::exercise::{load_document, LoadError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;

/// Error compiling a block program
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("unknown block type '{0}'")]
    UnknownBlock(String),

    #[error("unknown path direction '{0}' (expected forward, left or right)")]
    UnknownDirection(String),
}

/// A program block. Directions stay textual until compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Block {
    MoveForward,
    TurnLeft,
    TurnRight,
    IfPath {
        direction: String,
        body: Vec<Block>,
    },
    IfElsePath {
        direction: String,
        then_body: Vec<Block>,
        else_body: Vec<Block>,
    },
    WhilePath {
        direction: String,
        body: Vec<Block>,
    },
    /// Block type this compiler does not know
    Other { kind: String },
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum TaggedBlock {
    MoveForward,
    TurnLeft,
    TurnRight,
    IfPath {
        direction: String,
        #[serde(default)]
        body: Vec<Block>,
    },
    IfElsePath {
        direction: String,
        #[serde(default, rename = "then")]
        then_body: Vec<Block>,
        #[serde(default, rename = "else")]
        else_body: Vec<Block>,
    },
    WhilePath {
        direction: String,
        #[serde(default)]
        body: Vec<Block>,
    },
}

const KNOWN_BLOCKS: [&str; 6] = [
    "moveForward",
    "turnLeft",
    "turnRight",
    "ifPath",
    "ifElsePath",
    "whilePath",
];

impl TryFrom<Value> for Block {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| "block is missing its 'type'".to_string())?
            .to_string();

        if !KNOWN_BLOCKS.contains(&kind.as_str()) {
            return Ok(Block::Other { kind });
        }

        let tagged: TaggedBlock =
            serde_json::from_value(value).map_err(|e| format!("block '{}': {}", kind, e))?;
        Ok(match tagged {
            TaggedBlock::MoveForward => Block::MoveForward,
            TaggedBlock::TurnLeft => Block::TurnLeft,
            TaggedBlock::TurnRight => Block::TurnRight,
            TaggedBlock::IfPath { direction, body } => Block::IfPath { direction, body },
            TaggedBlock::IfElsePath {
                direction,
                then_body,
                else_body,
            } => Block::IfElsePath {
                direction,
                then_body,
                else_body,
            },
            TaggedBlock::WhilePath { direction, body } => Block::WhilePath { direction, body },
        })
    }
}

impl From<Block> for Value {
    fn from(block: Block) -> Self {
        let tagged = match block {
            Block::MoveForward => TaggedBlock::MoveForward,
            Block::TurnLeft => TaggedBlock::TurnLeft,
            Block::TurnRight => TaggedBlock::TurnRight,
            Block::IfPath { direction, body } => TaggedBlock::IfPath { direction, body },
            Block::IfElsePath {
                direction,
                then_body,
                else_body,
            } => TaggedBlock::IfElsePath {
                direction,
                then_body,
                else_body,
            },
            Block::WhilePath { direction, body } => TaggedBlock::WhilePath { direction, body },
            Block::Other { kind } => return serde_json::json!({ "type": kind }),
        };
        serde_json::to_value(tagged).unwrap_or(Value::Null)
    }
}

/// Top-level sequence of blocks, as saved by the editor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockProgram {
    pub blocks: Vec<Block>,
}

impl BlockProgram {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        load_document(path)
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Instructions plus the equivalent textual script
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledProgram {
    pub instructions: Vec<Instruction>,
    pub source: String,
}

/// Compile a block program. Pure; fails on the first unsupported block.
pub fn compile(program: &BlockProgram) -> Result<CompiledProgram, CompileError> {
    let mut compiler = Compiler::default();
    compiler.sequence(&program.blocks)?;
    Ok(CompiledProgram {
        instructions: compiler.instructions,
        source: compiler.source,
    })
}

#[derive(Default)]
struct Compiler {
    instructions: Vec<Instruction>,
    source: String,
    depth: usize,
}

impl Compiler {
    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.source.push_str("  ");
        }
        self.source.push_str(text);
        self.source.push('\n');
    }

    fn push(&mut self, instruction: Instruction) -> usize {
        self.instructions.push(instruction);
        self.instructions.len() - 1
    }

    /// Point a previously emitted jump at the next instruction
    fn patch(&mut self, at: usize) {
        let next = self.instructions.len();
        match &mut self.instructions[at] {
            Instruction::JumpUnlessPath { target, .. } | Instruction::Jump { target } => {
                *target = next
            }
            _ => {}
        }
    }

    fn nested(&mut self, blocks: &[Block]) -> Result<(), CompileError> {
        self.depth += 1;
        let result = self.sequence(blocks);
        self.depth -= 1;
        result
    }

    fn sequence(&mut self, blocks: &[Block]) -> Result<(), CompileError> {
        blocks.iter().try_for_each(|block| self.block(block))
    }

    fn block(&mut self, block: &Block) -> Result<(), CompileError> {
        match block {
            Block::MoveForward => {
                self.push(Instruction::Move);
                self.line("moveForward();");
            }
            Block::TurnLeft => {
                self.push(Instruction::TurnLeft);
                self.line("turnLeft();");
            }
            Block::TurnRight => {
                self.push(Instruction::TurnRight);
                self.line("turnRight();");
            }
            Block::IfPath { direction, body } => {
                let direction = parse_direction(direction)?;
                let skip = self.push(Instruction::JumpUnlessPath {
                    direction,
                    target: 0,
                });
                self.line(&format!("if ({}) {{", query(direction)));
                self.nested(body)?;
                self.line("}");
                self.patch(skip);
            }
            Block::IfElsePath {
                direction,
                then_body,
                else_body,
            } => {
                let direction = parse_direction(direction)?;
                let to_else = self.push(Instruction::JumpUnlessPath {
                    direction,
                    target: 0,
                });
                self.line(&format!("if ({}) {{", query(direction)));
                self.nested(then_body)?;
                let to_end = self.push(Instruction::Jump { target: 0 });
                self.patch(to_else);
                self.line("} else {");
                self.nested(else_body)?;
                self.line("}");
                self.patch(to_end);
            }
            Block::WhilePath { direction, body } => {
                let direction = parse_direction(direction)?;
                let head = self.instructions.len();
                let exit = self.push(Instruction::JumpUnlessPath {
                    direction,
                    target: 0,
                });
                self.line(&format!("while ({}) {{", query(direction)));
                self.nested(body)?;
                self.push(Instruction::Jump { target: head });
                self.line("}");
                self.patch(exit);
            }
            Block::Other { kind } => return Err(CompileError::UnknownBlock(kind.clone())),
        }
        Ok(())
    }
}

fn parse_direction(direction: &str) -> Result<RelativeDirection, CompileError> {
    direction
        .parse()
        .map_err(|_| CompileError::UnknownDirection(direction.to_string()))
}

fn query(direction: RelativeDirection) -> &'static str {
    match direction {
        RelativeDirection::Forward => "isPathForward()",
        RelativeDirection::Left => "isPathLeft()",
        RelativeDirection::Right => "isPathRight()",
    }
}
