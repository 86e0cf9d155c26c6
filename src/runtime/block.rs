//! Source blocks as produced by the editor and stored in project files
//!
//! A script is a flat list of blocks. C-shaped blocks (`repeat`, `forever`,
//! `if`) are closed by an explicit `control_end` block; the first block may be
//! a trigger ("hat"). Opcodes are plain identifiers and are only interpreted
//! by [`crate::runtime::compile`].

use serde::{Deserialize, Serialize};

use super::value::Value;

/// One block in a script, before compilation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Opcode identifier (e.g. `motion_movesteps`).
    pub opcode: String,
    /// Positional input slots.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<BlockInput>,
}

impl Block {
    /// Block with no inputs.
    pub fn new(opcode: impl Into<String>) -> Self {
        Self {
            opcode: opcode.into(),
            inputs: Vec::new(),
        }
    }

    /// Block with the given inputs.
    pub fn with_inputs(opcode: impl Into<String>, inputs: Vec<BlockInput>) -> Self {
        Self {
            opcode: opcode.into(),
            inputs,
        }
    }
}

/// An input slot value as stored in a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum BlockInput {
    /// Literal number/text/bool typed into the slot.
    Literal(Value),
    /// Reference to a variable, resolved when the block runs.
    Variable(String),
    /// Nested reporter block.
    Reporter(Box<Block>),
}

impl BlockInput {
    /// Literal input.
    pub fn literal(value: impl Into<Value>) -> Self {
        BlockInput::Literal(value.into())
    }

    /// Variable reference input.
    pub fn variable(name: impl Into<String>) -> Self {
        BlockInput::Variable(name.into())
    }

    /// Nested reporter input.
    pub fn reporter(opcode: impl Into<String>, inputs: Vec<BlockInput>) -> Self {
        BlockInput::Reporter(Box::new(Block::with_inputs(opcode, inputs)))
    }
}

/// Shorthand constructors for building scripts in code and tests.
pub mod blocks {
    use super::{Block, BlockInput};

    /// `when flag clicked`
    pub fn when_flag_clicked() -> Block {
        Block::new("event_whenflagclicked")
    }

    /// `when <key> key pressed`
    pub fn when_key_pressed(key: &str) -> Block {
        Block::with_inputs("event_whenkeypressed", vec![BlockInput::literal(key)])
    }

    /// `when I receive <message>`
    pub fn when_i_receive(message: &str) -> Block {
        Block::with_inputs(
            "event_whenbroadcastreceived",
            vec![BlockInput::literal(message)],
        )
    }

    /// `when I start as a clone`
    pub fn when_i_start_as_clone() -> Block {
        Block::new("control_start_as_clone")
    }

    /// `move <steps> steps`
    pub fn move_steps(steps: f64) -> Block {
        Block::with_inputs("motion_movesteps", vec![BlockInput::literal(steps)])
    }

    /// `change x by <dx>`
    pub fn change_x_by(dx: impl Into<BlockInput>) -> Block {
        Block::with_inputs("motion_changexby", vec![dx.into()])
    }

    /// `change y by <dy>`
    pub fn change_y_by(dy: impl Into<BlockInput>) -> Block {
        Block::with_inputs("motion_changeyby", vec![dy.into()])
    }

    /// `go to x: <x> y: <y>`
    pub fn go_to_xy(x: f64, y: f64) -> Block {
        Block::with_inputs(
            "motion_gotoxy",
            vec![BlockInput::literal(x), BlockInput::literal(y)],
        )
    }

    /// `glide <secs> secs to x: <x> y: <y>`
    pub fn glide_to_xy(secs: f64, x: f64, y: f64) -> Block {
        Block::with_inputs(
            "motion_glidesecstoxy",
            vec![
                BlockInput::literal(secs),
                BlockInput::literal(x),
                BlockInput::literal(y),
            ],
        )
    }

    /// `show`
    pub fn show() -> Block {
        Block::new("looks_show")
    }

    /// `hide`
    pub fn hide() -> Block {
        Block::new("looks_hide")
    }

    /// `wait <secs> seconds`
    pub fn wait_secs(secs: f64) -> Block {
        Block::with_inputs("control_wait", vec![BlockInput::literal(secs)])
    }

    /// `repeat <times>` (must be closed with [`end`])
    pub fn repeat(times: impl Into<BlockInput>) -> Block {
        Block::with_inputs("control_repeat", vec![times.into()])
    }

    /// `forever` (must be closed with [`end`])
    pub fn forever() -> Block {
        Block::new("control_forever")
    }

    /// `if <condition> then` (must be closed with [`end`])
    pub fn if_then(condition: BlockInput) -> Block {
        Block::with_inputs("control_if", vec![condition])
    }

    /// Closer for the innermost open C-block.
    pub fn end() -> Block {
        Block::new("control_end")
    }

    /// `set <name> to <value>`
    pub fn set_variable(name: &str, value: impl Into<BlockInput>) -> Block {
        Block::with_inputs(
            "data_setvariableto",
            vec![BlockInput::literal(name), value.into()],
        )
    }

    /// `change <name> by <delta>`
    pub fn change_variable(name: &str, delta: impl Into<BlockInput>) -> Block {
        Block::with_inputs(
            "data_changevariableby",
            vec![BlockInput::literal(name), delta.into()],
        )
    }

    /// `broadcast <message>`
    pub fn broadcast(message: &str) -> Block {
        Block::with_inputs("event_broadcast", vec![BlockInput::literal(message)])
    }

    /// `create clone of <target>`
    pub fn create_clone_of(target: &str) -> Block {
        Block::with_inputs("control_create_clone_of", vec![BlockInput::literal(target)])
    }

    /// `delete this clone`
    pub fn delete_this_clone() -> Block {
        Block::new("control_delete_this_clone")
    }

    /// `stop this script`
    pub fn stop_this_script() -> Block {
        Block::new("control_stop_this_script")
    }

    /// `stop all`
    pub fn stop_all() -> Block {
        Block::new("control_stop_all")
    }
}

impl From<f64> for BlockInput {
    fn from(n: f64) -> Self {
        BlockInput::literal(n)
    }
}

impl From<&str> for BlockInput {
    fn from(text: &str) -> Self {
        BlockInput::literal(text)
    }
}
