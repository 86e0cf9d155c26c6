//! Instruction dispatcher
//!
//! Interprets one instruction against one thread and its actor. Dispatch
//! never fails: unresolvable inputs fall back to per-slot defaults and unknown
//! instructions are no-ops. Work that reaches beyond the running thread
//! (broadcasts, clones, glides, stop-all) is recorded in [`Effects`] and
//! applied by the scheduler once the instruction has finished.

use std::time::Duration;

use super::RuntimeConfig;
use super::actor::{ActorId, ActorRegistry, Speech, VariableStore};
use super::compile::MYSELF;
use super::ir::{
    ActorAttribute, ArithmeticOp, CloneTarget, CompareOp, Input, Instruction, Reporter,
};
use super::scheduler::StageEvent;
use super::thread::{LoopFrame, LoopKind, Thread};
use super::timer::StageTime;
use super::value::Value;

/// Length of a sound played with `play sound until done`.
pub const SOUND_LENGTH: Duration = Duration::from_millis(1000);

/// Where the cursor goes after an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Advance by one
    Next,
    /// Continue at the given index
    Jump(usize),
}

/// Result of dispatching one instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// How long the thread must sleep; zero means no suspension
    pub suspend: Duration,
    /// Cursor movement
    pub flow: Flow,
}

impl Outcome {
    fn next() -> Self {
        Self {
            suspend: Duration::ZERO,
            flow: Flow::Next,
        }
    }

    fn suspend(duration: Duration) -> Self {
        Self {
            suspend: duration,
            flow: Flow::Next,
        }
    }

    fn jump(target: usize) -> Self {
        Self {
            suspend: Duration::ZERO,
            flow: Flow::Jump(target),
        }
    }
}

/// Move-over-time request for the scheduler's animation timers
#[derive(Debug, Clone, PartialEq)]
pub struct GlideRequest {
    /// Actor to move
    pub actor: ActorId,
    /// Destination
    pub to: (f64, f64),
    /// Total glide time
    pub duration: Duration,
}

/// Side effects requested during dispatch
#[derive(Debug, Default)]
pub struct Effects {
    /// Messages to broadcast, in order
    pub broadcasts: Vec<String>,
    /// Actors to clone
    pub clones: Vec<ActorId>,
    /// The running actor asked to delete itself
    pub delete_self: bool,
    /// `stop all` was executed
    pub stop_all: bool,
    /// Glides to start
    pub glides: Vec<GlideRequest>,
    /// Events for the render layer
    pub events: Vec<StageEvent>,
}

/// Everything one instruction may read or write
pub struct DispatchContext<'a> {
    /// Running thread
    pub thread: &'a mut Thread,
    /// Actor registry
    pub actors: &'a mut ActorRegistry,
    /// Global variables
    pub globals: &'a VariableStore,
    /// Current stage time
    pub now: StageTime,
    /// Stage time at which the run started
    pub started_at: StageTime,
    /// Runtime configuration
    pub config: &'a RuntimeConfig,
    /// Collected side effects
    pub effects: &'a mut Effects,
}

/// Execute one instruction.
pub fn dispatch(instruction: &Instruction, ctx: &mut DispatchContext<'_>) -> Outcome {
    let cursor = ctx.thread.cursor;

    match instruction {
        Instruction::MoveSteps { steps } => {
            let steps = number(ctx, steps, 10.0);
            with_actor(ctx, |state| {
                let radians = state.direction.to_radians();
                state.x += steps * radians.sin();
                state.y += steps * radians.cos();
            });
            Outcome::next()
        }
        Instruction::TurnRight { degrees } => {
            let degrees = number(ctx, degrees, 15.0);
            with_actor(ctx, |state| state.set_direction(state.direction + degrees));
            Outcome::next()
        }
        Instruction::TurnLeft { degrees } => {
            let degrees = number(ctx, degrees, 15.0);
            with_actor(ctx, |state| state.set_direction(state.direction - degrees));
            Outcome::next()
        }
        Instruction::GoTo { x, y } => {
            let (x, y) = (number(ctx, x, 0.0), number(ctx, y, 0.0));
            with_actor(ctx, |state| {
                state.x = x;
                state.y = y;
            });
            Outcome::next()
        }
        Instruction::Glide { secs, x, y } => {
            let duration = seconds(number(ctx, secs, 1.0));
            let to = (number(ctx, x, 0.0), number(ctx, y, 0.0));
            ctx.effects.glides.push(GlideRequest {
                actor: ctx.thread.actor.clone(),
                to,
                duration,
            });
            Outcome::suspend(duration)
        }
        Instruction::PointInDirection { direction } => {
            let direction = number(ctx, direction, 90.0);
            with_actor(ctx, |state| state.set_direction(direction));
            Outcome::next()
        }
        Instruction::ChangeX { dx } => {
            let dx = number(ctx, dx, 10.0);
            with_actor(ctx, |state| state.x += dx);
            Outcome::next()
        }
        Instruction::ChangeY { dy } => {
            let dy = number(ctx, dy, 10.0);
            with_actor(ctx, |state| state.y += dy);
            Outcome::next()
        }
        Instruction::SetX { x } => {
            let x = number(ctx, x, 0.0);
            with_actor(ctx, |state| state.x = x);
            Outcome::next()
        }
        Instruction::SetY { y } => {
            let y = number(ctx, y, 0.0);
            with_actor(ctx, |state| state.y = y);
            Outcome::next()
        }
        Instruction::SayFor { message, secs } => {
            let text = text(ctx, message, "Hello!");
            let duration = seconds(number(ctx, secs, 2.0));
            say(ctx, text, duration);
            Outcome::suspend(duration)
        }
        Instruction::Say { message } => {
            let text = text(ctx, message, "Hello!");
            let duration = ctx.config.say_duration();
            say(ctx, text, duration);
            Outcome::next()
        }
        Instruction::Show => {
            with_actor(ctx, |state| state.visible = true);
            Outcome::next()
        }
        Instruction::Hide => {
            with_actor(ctx, |state| state.visible = false);
            Outcome::next()
        }
        Instruction::ChangeSize { delta } => {
            let delta = number(ctx, delta, 10.0);
            with_actor(ctx, |state| state.size = (state.size + delta).max(0.0));
            Outcome::next()
        }
        Instruction::SetSize { size } => {
            let size = number(ctx, size, 100.0);
            with_actor(ctx, |state| state.size = size.max(0.0));
            Outcome::next()
        }
        Instruction::PlaySound { sound, until_done } => {
            let sound = text(ctx, sound, "pop");
            tracing::debug!(actor = %ctx.thread.actor, %sound, "playing sound");
            ctx.effects.events.push(StageEvent::SoundPlayed {
                actor: ctx.thread.actor.clone(),
                sound,
            });
            if *until_done {
                Outcome::suspend(SOUND_LENGTH)
            } else {
                Outcome::next()
            }
        }
        Instruction::Wait { secs } => Outcome::suspend(seconds(number(ctx, secs, 1.0))),
        Instruction::Repeat { times, end } => {
            let times = number(ctx, times, 10.0).round();
            if times < 1.0 {
                return Outcome::jump(end + 1);
            }
            ctx.thread.loops.push(LoopFrame {
                kind: LoopKind::Repeat {
                    remaining: times as u64 - 1,
                },
                resume: cursor + 1,
                exit: end + 1,
            });
            Outcome::next()
        }
        Instruction::Forever { end } => {
            ctx.thread.loops.push(LoopFrame {
                kind: LoopKind::Forever,
                resume: cursor + 1,
                exit: end + 1,
            });
            Outcome::next()
        }
        Instruction::If { condition, end } => {
            let holds = resolve(ctx, condition).is_some_and(|value| value.is_truthy());
            if holds {
                Outcome::next()
            } else {
                Outcome::jump(end + 1)
            }
        }
        Instruction::End => match ctx.thread.loops.close(cursor) {
            Some(target) => Outcome::jump(target),
            None => Outcome::next(),
        },
        Instruction::StopAll => {
            ctx.effects.stop_all = true;
            Outcome::next()
        }
        Instruction::StopThisScript => {
            ctx.thread.active = false;
            Outcome::next()
        }
        Instruction::SetVariable { name, value } => {
            let value = resolve(ctx, value).unwrap_or(Value::Number(0.0));
            write_variable(ctx, name, value);
            Outcome::next()
        }
        Instruction::ChangeVariable { name, delta } => {
            let delta = number(ctx, delta, 1.0);
            let current = ctx
                .thread
                .variables
                .get(name)
                .or_else(|| {
                    ctx.actors
                        .get(&ctx.thread.actor)
                        .and_then(|actor| actor.variables.get(name))
                })
                .and_then(Value::to_number)
                .unwrap_or(0.0);
            write_variable(ctx, name, Value::Number(current + delta));
            Outcome::next()
        }
        Instruction::Broadcast { message } => {
            let message = text(ctx, message, "message1");
            ctx.effects.broadcasts.push(message);
            Outcome::next()
        }
        Instruction::CreateClone { target } => {
            let origin = match target {
                CloneTarget::Myself => ctx.thread.actor.clone(),
                CloneTarget::Named(input) => {
                    let name = text(ctx, input, MYSELF);
                    if name == MYSELF {
                        ctx.thread.actor.clone()
                    } else {
                        ActorId::new(name)
                    }
                }
            };
            ctx.effects.clones.push(origin);
            Outcome::next()
        }
        Instruction::DeleteThisClone => {
            ctx.effects.delete_self = true;
            Outcome::next()
        }
        Instruction::Unknown { opcode } => {
            tracing::warn!(
                actor = %ctx.thread.actor,
                thread = %ctx.thread.id,
                %opcode,
                "skipping unrecognized instruction"
            );
            Outcome::next()
        }
    }
}

/// Resolve an input slot to a value.
///
/// Variable references are looked up in the thread snapshot, then the actor's
/// store, then globals. Returns `None` when nothing resolves.
pub fn resolve(ctx: &DispatchContext<'_>, input: &Input) -> Option<Value> {
    match input {
        Input::Literal(value) => Some(value.clone()),
        Input::VariableRef(name) => ctx
            .thread
            .variables
            .get(name)
            .or_else(|| {
                ctx.actors
                    .get(&ctx.thread.actor)
                    .and_then(|actor| actor.variables.get(name))
            })
            .or_else(|| ctx.globals.get(name))
            .cloned(),
        Input::Reporter(reporter) => evaluate(ctx, reporter),
        Input::Missing => None,
    }
}

/// Evaluate a reporter synchronously, including every nested input.
pub fn evaluate(ctx: &DispatchContext<'_>, reporter: &Reporter) -> Option<Value> {
    match reporter {
        Reporter::Arithmetic(op, lhs, rhs) => {
            let a = number(ctx, lhs, 0.0);
            let b = number(ctx, rhs, 0.0);
            let result = match op {
                ArithmeticOp::Add => a + b,
                ArithmeticOp::Subtract => a - b,
                ArithmeticOp::Multiply => a * b,
                ArithmeticOp::Divide => a / b,
                ArithmeticOp::Modulo => a - b * (a / b).floor(),
            };
            Some(Value::Number(result))
        }
        Reporter::Compare(op, lhs, rhs) => {
            let a = resolve(ctx, lhs).unwrap_or_else(|| Value::from(""));
            let b = resolve(ctx, rhs).unwrap_or_else(|| Value::from(""));
            let ordering = a.compare(&b);
            let holds = match op {
                CompareOp::LessThan => ordering.is_lt(),
                CompareOp::GreaterThan => ordering.is_gt(),
                CompareOp::Equals => ordering.is_eq(),
            };
            Some(Value::Bool(holds))
        }
        Reporter::And(lhs, rhs) => Some(Value::Bool(truthy(ctx, lhs) && truthy(ctx, rhs))),
        Reporter::Or(lhs, rhs) => Some(Value::Bool(truthy(ctx, lhs) || truthy(ctx, rhs))),
        Reporter::Not(operand) => Some(Value::Bool(!truthy(ctx, operand))),
        Reporter::Join(lhs, rhs) => Some(Value::Text(format!(
            "{}{}",
            text(ctx, lhs, ""),
            text(ctx, rhs, "")
        ))),
        Reporter::Attribute(attribute) => {
            let state = &ctx.actors.get(&ctx.thread.actor)?.state;
            let value = match attribute {
                ActorAttribute::X => state.x,
                ActorAttribute::Y => state.y,
                ActorAttribute::Direction => state.direction,
                ActorAttribute::Size => state.size,
            };
            Some(Value::Number(value))
        }
        Reporter::Timer => Some(Value::Number(
            ctx.now.since(ctx.started_at).as_secs_f64(),
        )),
        Reporter::Unknown(opcode) => {
            tracing::debug!(%opcode, "unrecognized reporter evaluates to nothing");
            None
        }
    }
}

fn number(ctx: &DispatchContext<'_>, input: &Input, default: f64) -> f64 {
    resolve(ctx, input)
        .and_then(|value| value.to_number())
        .unwrap_or(default)
}

fn text(ctx: &DispatchContext<'_>, input: &Input, default: &str) -> String {
    resolve(ctx, input)
        .map(|value| value.to_text())
        .unwrap_or_else(|| default.to_string())
}

fn truthy(ctx: &DispatchContext<'_>, input: &Input) -> bool {
    resolve(ctx, input).is_some_and(|value| value.is_truthy())
}

fn seconds(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_millis((secs * 1000.0).round() as u64)
    } else {
        Duration::ZERO
    }
}

fn with_actor(ctx: &mut DispatchContext<'_>, mutate: impl FnOnce(&mut super::actor::ActorState)) {
    if let Some(actor) = ctx.actors.get_mut(&ctx.thread.actor) {
        mutate(&mut actor.state);
    }
}

fn say(ctx: &mut DispatchContext<'_>, text: String, duration: Duration) {
    let until = ctx.now + duration;
    let speech = (!text.is_empty()).then(|| Speech {
        text: text.clone(),
        until,
    });
    with_actor(ctx, |state| state.speech = speech);
    ctx.effects.events.push(StageEvent::Said {
        actor: ctx.thread.actor.clone(),
        text,
    });
}

fn write_variable(ctx: &mut DispatchContext<'_>, name: &str, value: Value) {
    ctx.thread.variables.insert(name.to_string(), value.clone());
    if let Some(actor) = ctx.actors.get_mut(&ctx.thread.actor) {
        actor.variables.insert(name.to_string(), value);
    }
}
