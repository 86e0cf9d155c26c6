//! Compiled script representation
//!
//! Compilation resolves every opcode to an [`Instruction`] variant with typed
//! input slots and records, for each C-block opener, the index of its matching
//! `end`. Nothing here is re-derived while a script runs.

use std::sync::Arc;

use super::block::Block;
use super::value::Value;

/// How a script gets started.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// `when flag clicked`: started by [`crate::runtime::Scheduler::start`].
    Start,
    /// `when <key> key pressed`. The key `any` matches every key.
    KeyPress(String),
    /// `when I receive <message>`.
    Receive(String),
    /// `when I start as a clone`.
    CloneStart,
    /// Loose fragment with no trigger; never started.
    None,
}

/// A compiled script: trigger plus a flat instruction body.
#[derive(Debug, Clone)]
pub struct Script {
    /// Trigger classification taken from the hat block.
    pub trigger: Trigger,
    /// Instructions following the hat block.
    pub body: Vec<Instruction>,
    /// Source blocks the script was compiled from, kept for persistence.
    pub source: Arc<[Block]>,
}

impl Script {
    /// Number of instructions in the body.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    /// Whether the body is empty.
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// Compiled input slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Literal value.
    Literal(Value),
    /// Variable looked up as thread snapshot, then actor store, then globals.
    VariableRef(String),
    /// Nested reporter evaluated before the enclosing instruction runs.
    Reporter(Box<Reporter>),
    /// Slot left empty in the source; the slot default applies.
    Missing,
}

/// Reporter (expression) blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum Reporter {
    /// Binary arithmetic.
    Arithmetic(ArithmeticOp, Input, Input),
    /// Binary comparison producing a boolean.
    Compare(CompareOp, Input, Input),
    /// Logical and.
    And(Input, Input),
    /// Logical or.
    Or(Input, Input),
    /// Logical not.
    Not(Input),
    /// Text concatenation.
    Join(Input, Input),
    /// Attribute of the actor running the thread.
    Attribute(ActorAttribute),
    /// Seconds since the run started.
    Timer,
    /// Unrecognized reporter opcode; evaluates to nothing.
    Unknown(String),
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOp {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `mod` (result takes the sign of the divisor)
    Modulo,
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `<`
    LessThan,
    /// `>`
    GreaterThan,
    /// `=`
    Equals,
}

/// Actor attributes readable from reporters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorAttribute {
    /// `x position`
    X,
    /// `y position`
    Y,
    /// `direction`
    Direction,
    /// `size`
    Size,
}

/// Target of `create clone of`.
#[derive(Debug, Clone, PartialEq)]
pub enum CloneTarget {
    /// The actor running the instruction.
    Myself,
    /// Another actor, named by an input.
    Named(Input),
}

/// Command instructions.
///
/// `end` fields hold the body index of the matching [`Instruction::End`].
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Move along the current heading.
    MoveSteps { steps: Input },
    /// Rotate clockwise by degrees.
    TurnRight { degrees: Input },
    /// Rotate counter-clockwise by degrees.
    TurnLeft { degrees: Input },
    /// Jump to a position.
    GoTo { x: Input, y: Input },
    /// Move to a position over time (timed).
    Glide { secs: Input, x: Input, y: Input },
    /// Set the heading.
    PointInDirection { direction: Input },
    /// Offset x.
    ChangeX { dx: Input },
    /// Offset y.
    ChangeY { dy: Input },
    /// Set x.
    SetX { x: Input },
    /// Set y.
    SetY { y: Input },
    /// Show a speech bubble and suspend for its duration (timed).
    SayFor { message: Input, secs: Input },
    /// Show a speech bubble without suspending.
    Say { message: Input },
    /// Make the actor visible.
    Show,
    /// Hide the actor.
    Hide,
    /// Grow or shrink by a percentage.
    ChangeSize { delta: Input },
    /// Set size percentage.
    SetSize { size: Input },
    /// Emit a sound event; `until_done` suspends for the sound's length.
    PlaySound { sound: Input, until_done: bool },
    /// Suspend the thread.
    Wait { secs: Input },
    /// Counted loop opener.
    Repeat { times: Input, end: usize },
    /// Unbounded loop opener.
    Forever { end: usize },
    /// Conditional opener; skips to after `end` when false.
    If { condition: Input, end: usize },
    /// Closer for the innermost open C-block.
    End,
    /// Stop the whole run.
    StopAll,
    /// Deactivate the current thread.
    StopThisScript,
    /// Write a variable.
    SetVariable { name: String, value: Input },
    /// Add to a variable.
    ChangeVariable { name: String, delta: Input },
    /// Start every matching receive script.
    Broadcast { message: Input },
    /// Clone an actor.
    CreateClone { target: CloneTarget },
    /// Delete the current actor if it is a clone.
    DeleteThisClone,
    /// Unrecognized opcode; executes as a no-op.
    Unknown { opcode: String },
}

impl Instruction {
    /// Matching `end` index for C-block openers.
    pub fn block_end(&self) -> Option<usize> {
        match self {
            Instruction::Repeat { end, .. }
            | Instruction::Forever { end }
            | Instruction::If { end, .. } => Some(*end),
            _ => None,
        }
    }
}
