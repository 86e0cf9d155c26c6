//! Compile source blocks into executable scripts
//!
//! Three passes over a block list:
//! 1. classify the hat block (if any) into a [`Trigger`]
//! 2. map each opcode to a typed [`Instruction`] by exact identity
//! 3. bracket-match C-block openers against `control_end` closers and record
//!    each opener's end index
//!
//! Unknown opcodes compile to [`Instruction::Unknown`]; structural faults are
//! rejected here so they can never surface mid-execution.

use std::sync::Arc;

use super::block::{Block, BlockInput};
use super::error::{CompileError, CompileResult};
use super::ir::{
    ActorAttribute, ArithmeticOp, CloneTarget, CompareOp, Input, Instruction, Reporter, Script,
    Trigger,
};

/// Literal accepted by `create clone of` to mean the running actor.
pub const MYSELF: &str = "_myself_";

const DEFAULT_MESSAGE: &str = "message1";
const DEFAULT_KEY: &str = "space";
const DEFAULT_VARIABLE: &str = "my variable";

/// Compile one script.
pub fn compile_script(blocks: &[Block]) -> CompileResult<Script> {
    let (trigger, offset) = match blocks.first() {
        Some(head) => match parse_trigger(head, 0)? {
            Some(trigger) => (trigger, 1),
            None => (Trigger::None, 0),
        },
        None => (Trigger::None, 0),
    };

    let mut body = Vec::with_capacity(blocks.len() - offset);
    for (index, block) in blocks.iter().enumerate().skip(offset) {
        if is_trigger(&block.opcode) {
            return Err(CompileError::MisplacedTrigger {
                index,
                opcode: block.opcode.clone(),
            });
        }
        body.push(compile_instruction(block));
    }

    match_brackets(&mut body, blocks, offset)?;

    Ok(Script {
        trigger,
        body,
        source: Arc::from(blocks),
    })
}

/// Compile every script of an actor, stopping at the first structural error.
pub fn compile_scripts(scripts: &[Vec<Block>]) -> CompileResult<Vec<Arc<Script>>> {
    scripts
        .iter()
        .map(|blocks| compile_script(blocks).map(Arc::new))
        .collect()
}

fn is_trigger(opcode: &str) -> bool {
    matches!(
        opcode,
        "event_whenflagclicked"
            | "event_whenkeypressed"
            | "event_whenbroadcastreceived"
            | "control_start_as_clone"
    )
}

fn parse_trigger(block: &Block, index: usize) -> CompileResult<Option<Trigger>> {
    let literal_or = |default: &str| -> CompileResult<String> {
        match block.inputs.first() {
            None => Ok(default.to_string()),
            Some(BlockInput::Literal(value)) => Ok(value.to_text()),
            Some(_) => Err(CompileError::InvalidTrigger {
                index,
                opcode: block.opcode.clone(),
            }),
        }
    };

    let trigger = match block.opcode.as_str() {
        "event_whenflagclicked" => Trigger::Start,
        "event_whenkeypressed" => Trigger::KeyPress(literal_or(DEFAULT_KEY)?),
        "event_whenbroadcastreceived" => Trigger::Receive(literal_or(DEFAULT_MESSAGE)?),
        "control_start_as_clone" => Trigger::CloneStart,
        _ => return Ok(None),
    };
    Ok(Some(trigger))
}

fn compile_instruction(block: &Block) -> Instruction {
    let slot = |i: usize| compile_input(block.inputs.get(i));

    match block.opcode.as_str() {
        "motion_movesteps" => Instruction::MoveSteps { steps: slot(0) },
        "motion_turnright" => Instruction::TurnRight { degrees: slot(0) },
        "motion_turnleft" => Instruction::TurnLeft { degrees: slot(0) },
        "motion_gotoxy" => Instruction::GoTo {
            x: slot(0),
            y: slot(1),
        },
        "motion_glidesecstoxy" => Instruction::Glide {
            secs: slot(0),
            x: slot(1),
            y: slot(2),
        },
        "motion_pointindirection" => Instruction::PointInDirection { direction: slot(0) },
        "motion_changexby" => Instruction::ChangeX { dx: slot(0) },
        "motion_changeyby" => Instruction::ChangeY { dy: slot(0) },
        "motion_setx" => Instruction::SetX { x: slot(0) },
        "motion_sety" => Instruction::SetY { y: slot(0) },
        "looks_sayforsecs" => Instruction::SayFor {
            message: slot(0),
            secs: slot(1),
        },
        "looks_say" => Instruction::Say { message: slot(0) },
        "looks_show" => Instruction::Show,
        "looks_hide" => Instruction::Hide,
        "looks_changesizeby" => Instruction::ChangeSize { delta: slot(0) },
        "looks_setsizeto" => Instruction::SetSize { size: slot(0) },
        "sound_play" => Instruction::PlaySound {
            sound: slot(0),
            until_done: false,
        },
        "sound_playuntildone" => Instruction::PlaySound {
            sound: slot(0),
            until_done: true,
        },
        "control_wait" => Instruction::Wait { secs: slot(0) },
        "control_repeat" => Instruction::Repeat {
            times: slot(0),
            end: 0,
        },
        "control_forever" => Instruction::Forever { end: 0 },
        "control_if" => Instruction::If {
            condition: slot(0),
            end: 0,
        },
        "control_end" => Instruction::End,
        "control_stop_all" => Instruction::StopAll,
        "control_stop_this_script" => Instruction::StopThisScript,
        "control_create_clone_of" => Instruction::CreateClone {
            target: clone_target(block.inputs.first()),
        },
        "control_delete_this_clone" => Instruction::DeleteThisClone,
        "data_setvariableto" => Instruction::SetVariable {
            name: variable_name(block.inputs.first()),
            value: slot(1),
        },
        "data_changevariableby" => Instruction::ChangeVariable {
            name: variable_name(block.inputs.first()),
            delta: slot(1),
        },
        "event_broadcast" => Instruction::Broadcast { message: slot(0) },
        other => Instruction::Unknown {
            opcode: other.to_string(),
        },
    }
}

fn compile_input(input: Option<&BlockInput>) -> Input {
    match input {
        None => Input::Missing,
        Some(BlockInput::Literal(value)) => Input::Literal(value.clone()),
        Some(BlockInput::Variable(name)) => Input::VariableRef(name.clone()),
        Some(BlockInput::Reporter(block)) => Input::Reporter(Box::new(compile_reporter(block))),
    }
}

fn compile_reporter(block: &Block) -> Reporter {
    let slot = |i: usize| compile_input(block.inputs.get(i));
    let arithmetic = |op| Reporter::Arithmetic(op, slot(0), slot(1));
    let compare = |op| Reporter::Compare(op, slot(0), slot(1));

    match block.opcode.as_str() {
        "operator_add" => arithmetic(ArithmeticOp::Add),
        "operator_subtract" => arithmetic(ArithmeticOp::Subtract),
        "operator_multiply" => arithmetic(ArithmeticOp::Multiply),
        "operator_divide" => arithmetic(ArithmeticOp::Divide),
        "operator_mod" => arithmetic(ArithmeticOp::Modulo),
        "operator_lt" => compare(CompareOp::LessThan),
        "operator_gt" => compare(CompareOp::GreaterThan),
        "operator_equals" => compare(CompareOp::Equals),
        "operator_and" => Reporter::And(slot(0), slot(1)),
        "operator_or" => Reporter::Or(slot(0), slot(1)),
        "operator_not" => Reporter::Not(slot(0)),
        "operator_join" => Reporter::Join(slot(0), slot(1)),
        "motion_xposition" => Reporter::Attribute(ActorAttribute::X),
        "motion_yposition" => Reporter::Attribute(ActorAttribute::Y),
        "motion_direction" => Reporter::Attribute(ActorAttribute::Direction),
        "looks_size" => Reporter::Attribute(ActorAttribute::Size),
        "sensing_timer" => Reporter::Timer,
        other => Reporter::Unknown(other.to_string()),
    }
}

fn variable_name(input: Option<&BlockInput>) -> String {
    match input {
        Some(BlockInput::Literal(value)) => value.to_text(),
        Some(BlockInput::Variable(name)) => name.clone(),
        _ => DEFAULT_VARIABLE.to_string(),
    }
}

fn clone_target(input: Option<&BlockInput>) -> CloneTarget {
    match input {
        None => CloneTarget::Myself,
        Some(BlockInput::Literal(value)) if value.to_text() == MYSELF => CloneTarget::Myself,
        Some(other) => CloneTarget::Named(compile_input(Some(other))),
    }
}

fn match_brackets(body: &mut [Instruction], blocks: &[Block], offset: usize) -> CompileResult<()> {
    let mut open: Vec<usize> = Vec::new();

    for index in 0..body.len() {
        let is_opener = matches!(
            body[index],
            Instruction::Repeat { .. } | Instruction::Forever { .. } | Instruction::If { .. }
        );
        if is_opener {
            open.push(index);
        } else if body[index] == Instruction::End {
            let opener = open.pop().ok_or(CompileError::UnmatchedCloser {
                index: index + offset,
            })?;
            if let Instruction::Repeat { end, .. }
            | Instruction::Forever { end }
            | Instruction::If { end, .. } = &mut body[opener]
            {
                *end = index;
            }
        }
    }

    if let Some(opener) = open.pop() {
        return Err(CompileError::UnclosedBlock {
            index: opener + offset,
            opcode: blocks[opener + offset].opcode.clone(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::block::blocks::*;
    use crate::runtime::value::Value;

    #[test]
    fn test_trigger_is_stripped_from_body() {
        let script = compile_script(&[when_flag_clicked(), move_steps(10.0)]).unwrap();
        assert_eq!(script.trigger, Trigger::Start);
        assert_eq!(script.len(), 1);
        assert_eq!(script.source.len(), 2);
    }

    #[test]
    fn test_receive_trigger_reads_literal() {
        let script = compile_script(&[when_i_receive("go")]).unwrap();
        assert_eq!(script.trigger, Trigger::Receive("go".into()));
    }

    #[test]
    fn test_fragment_without_hat() {
        let script = compile_script(&[move_steps(1.0)]).unwrap();
        assert_eq!(script.trigger, Trigger::None);
        assert_eq!(script.len(), 1);
    }

    #[test]
    fn test_nested_brackets_record_end_indices() {
        let script = compile_script(&[
            when_flag_clicked(),
            forever(),               // 0
            repeat(3.0),             // 1
            move_steps(1.0),         // 2
            end(),                   // 3
            if_then(BlockInput::literal(true)), // 4
            end(),                   // 5
            end(),                   // 6
        ])
        .unwrap();

        assert_eq!(script.body[0].block_end(), Some(6));
        assert_eq!(script.body[1].block_end(), Some(3));
        assert_eq!(script.body[4].block_end(), Some(5));
    }

    #[test]
    fn test_unmatched_closer_rejected() {
        let err = compile_script(&[when_flag_clicked(), move_steps(1.0), end()]).unwrap_err();
        assert_eq!(err, CompileError::UnmatchedCloser { index: 2 });
    }

    #[test]
    fn test_unclosed_opener_rejected() {
        let err = compile_script(&[when_flag_clicked(), repeat(2.0), forever(), end()])
            .unwrap_err();
        assert_eq!(
            err,
            CompileError::UnclosedBlock {
                index: 1,
                opcode: "control_repeat".into()
            }
        );
    }

    #[test]
    fn test_misplaced_trigger_rejected() {
        let err = compile_script(&[move_steps(1.0), when_flag_clicked()]).unwrap_err();
        assert!(matches!(err, CompileError::MisplacedTrigger { index: 1, .. }));
    }

    #[test]
    fn test_trigger_with_reporter_input_rejected() {
        let hat = Block::with_inputs(
            "event_whenbroadcastreceived",
            vec![BlockInput::variable("name")],
        );
        assert!(matches!(
            compile_script(&[hat]),
            Err(CompileError::InvalidTrigger { index: 0, .. })
        ));
    }

    #[test]
    fn test_unknown_opcode_compiles_to_noop() {
        let script = compile_script(&[Block::new("pen_clear")]).unwrap();
        assert_eq!(
            script.body[0],
            Instruction::Unknown {
                opcode: "pen_clear".into()
            }
        );
    }

    #[test]
    fn test_reporter_inputs_compile() {
        let block = Block::with_inputs(
            "motion_changexby",
            vec![BlockInput::reporter(
                "operator_multiply",
                vec![BlockInput::variable("speed"), BlockInput::literal(2.0)],
            )],
        );
        let script = compile_script(&[block]).unwrap();
        assert_eq!(
            script.body[0],
            Instruction::ChangeX {
                dx: Input::Reporter(Box::new(Reporter::Arithmetic(
                    ArithmeticOp::Multiply,
                    Input::VariableRef("speed".into()),
                    Input::Literal(Value::Number(2.0)),
                ))),
            }
        );
    }

    #[test]
    fn test_clone_target_myself() {
        let script = compile_script(&[create_clone_of(MYSELF), create_clone_of("Cat")]).unwrap();
        assert_eq!(
            script.body[0],
            Instruction::CreateClone {
                target: CloneTarget::Myself
            }
        );
        assert_eq!(
            script.body[1],
            Instruction::CreateClone {
                target: CloneTarget::Named(Input::Literal(Value::from("Cat")))
            }
        );
    }
}
