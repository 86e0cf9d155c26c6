//! End-to-end scheduling scenarios
//!
//! Drives whole projects through the scheduler on simulated time and checks
//! observable actor state: positions, variables, and thread lifetimes.

use stagehand::runtime::block::BlockInput;
use stagehand::runtime::block::blocks::*;
use stagehand::runtime::{ActorId, ActorRecord, Project, RuntimeConfig, Scheduler, Value};
use std::time::Duration;

fn stage(project: Project) -> Scheduler {
    Scheduler::from_project(RuntimeConfig::default(), &project).unwrap()
}

fn single(blocks: Vec<stagehand::runtime::Block>) -> Scheduler {
    stage(Project::new().with_actor(ActorRecord::new("a").with_script(blocks)))
}

fn x(scheduler: &Scheduler) -> f64 {
    scheduler.actor(&ActorId::new("a")).unwrap().state.x
}

fn var(scheduler: &Scheduler, name: &str) -> Value {
    scheduler.actor(&ActorId::new("a")).unwrap().variables[name].clone()
}

#[test]
fn test_move_wait_move_after_600ms() {
    let mut scheduler = single(vec![
        when_flag_clicked(),
        move_steps(10.0),
        wait_secs(0.5),
        move_steps(10.0),
    ]);

    scheduler.start();
    scheduler.advance(Duration::from_millis(600));

    assert!((x(&scheduler) - 20.0).abs() < 1e-9, "x = {}", x(&scheduler));
}

#[test]
fn test_wait_resumes_no_earlier_than_its_duration() {
    let mut scheduler = single(vec![
        when_flag_clicked(),
        wait_secs(1.0),
        change_x_by(1.0),
    ]);

    scheduler.start();
    scheduler.advance(Duration::from_millis(999));
    assert_eq!(x(&scheduler), 0.0);

    scheduler.advance(Duration::from_millis(60));
    assert_eq!(x(&scheduler), 1.0);
}

#[test]
fn test_shorter_wait_started_later_finishes_first() {
    let mut scheduler = stage(
        Project::new().with_actor(
            ActorRecord::new("a")
                .with_script(vec![
                    when_flag_clicked(),
                    wait_secs(1.0),
                    change_variable("long", 1.0),
                ])
                .with_script(vec![
                    when_flag_clicked(),
                    wait_secs(0.2),
                    change_variable("short", 1.0),
                ]),
        ),
    );

    scheduler.start();
    scheduler.advance(Duration::from_millis(500));
    assert_eq!(var(&scheduler, "short"), Value::Number(1.0));
    assert!(!scheduler.actor(&ActorId::new("a")).unwrap().variables.contains_key("long"));

    scheduler.advance(Duration::from_millis(700));
    assert_eq!(var(&scheduler, "long"), Value::Number(1.0));
}

#[test]
fn test_repeat_three_runs_body_three_times() {
    let mut scheduler = single(vec![
        when_flag_clicked(),
        repeat(3.0),
        change_variable("count", 1.0),
        end(),
        set_variable("done", "yes"),
    ]);

    scheduler.start();
    scheduler.advance(Duration::from_secs(1));

    assert_eq!(var(&scheduler, "count"), Value::Number(3.0));
    assert_eq!(var(&scheduler, "done"), Value::from("yes"));
    assert_eq!(scheduler.stats().total_threads, 0);
}

#[test]
fn test_repeat_zero_and_negative_skip_body() {
    for times in [0.0, -2.0] {
        let mut scheduler = single(vec![
            when_flag_clicked(),
            repeat(times),
            change_variable("count", 1.0),
            end(),
            set_variable("done", "yes"),
        ]);

        scheduler.start();
        scheduler.advance(Duration::from_secs(1));

        let actor = scheduler.actor(&ActorId::new("a")).unwrap();
        assert!(!actor.variables.contains_key("count"), "repeat {times}");
        assert_eq!(actor.variables["done"], Value::from("yes"));
    }
}

#[test]
fn test_repeat_count_from_variable() {
    let mut scheduler = stage(
        Project::new().with_actor(
            ActorRecord::new("a")
                .with_variable("n", 4.0)
                .with_script(vec![
                    when_flag_clicked(),
                    repeat(BlockInput::variable("n")),
                    change_x_by(1.0),
                    end(),
                ]),
        ),
    );

    scheduler.start();
    scheduler.advance(Duration::from_secs(1));
    assert_eq!(x(&scheduler), 4.0);
}

#[test]
fn test_nested_repeats_multiply() {
    let mut scheduler = single(vec![
        when_flag_clicked(),
        repeat(3.0),
        repeat(2.0),
        change_x_by(1.0),
        end(),
        change_variable("outer", 1.0),
        end(),
    ]);

    scheduler.start();
    scheduler.advance(Duration::from_secs(2));

    assert_eq!(x(&scheduler), 6.0);
    assert_eq!(var(&scheduler, "outer"), Value::Number(3.0));
}

#[test]
fn test_forever_stays_active_until_stopped() {
    let mut scheduler = single(vec![
        when_flag_clicked(),
        forever(),
        change_x_by(1.0),
        end(),
    ]);

    let thread = scheduler.start()[0];
    for _ in 0..50 {
        scheduler.advance(Duration::from_millis(100));
        assert!(scheduler.thread(thread).is_some_and(|t| t.active));
    }
    assert!(x(&scheduler) > 100.0);

    scheduler.stop();
    assert!(scheduler.thread(thread).is_none());
    let frozen = x(&scheduler);
    scheduler.advance(Duration::from_secs(1));
    assert_eq!(x(&scheduler), frozen);
}

#[test]
fn test_if_evaluates_condition_deterministically() {
    let condition = BlockInput::reporter(
        "operator_lt",
        vec![BlockInput::variable("hp"), BlockInput::literal(5.0)],
    );
    for (hp, expected) in [(3.0, 10.0), (7.0, 0.0)] {
        for _ in 0..5 {
            let mut scheduler = stage(
                Project::new().with_actor(
                    ActorRecord::new("a").with_variable("hp", hp).with_script(vec![
                        when_flag_clicked(),
                        if_then(condition.clone()),
                        change_x_by(10.0),
                        end(),
                    ]),
                ),
            );
            scheduler.start();
            scheduler.advance(Duration::from_millis(200));
            assert_eq!(x(&scheduler), expected, "hp = {hp}");
        }
    }
}

#[test]
fn test_threads_interleave_one_instruction_per_tick() {
    let mut scheduler = stage(
        Project::new().with_actor(
            ActorRecord::new("a")
                .with_script(vec![
                    when_flag_clicked(),
                    set_variable("log", "first"),
                    set_variable("log", BlockInput::reporter(
                        "operator_join",
                        vec![BlockInput::variable("log"), BlockInput::literal("-a")],
                    )),
                ])
                .with_script(vec![
                    when_flag_clicked(),
                    set_variable("log", BlockInput::reporter(
                        "operator_join",
                        vec![BlockInput::variable("log"), BlockInput::literal("-b")],
                    )),
                ]),
        ),
    );

    scheduler.start();
    // Both threads run their first instruction at start. The second thread
    // has no snapshot entry for `log`, so it reads the actor store.
    assert_eq!(var(&scheduler, "log"), Value::from("first-b"));

    // The first thread reads its own snapshot, which never saw "-b".
    scheduler.advance(Duration::from_millis(10));
    assert_eq!(var(&scheduler, "log"), Value::from("first-a"));
}

#[test]
fn test_unknown_opcode_does_not_disturb_other_threads() {
    let mut scheduler = stage(
        Project::new().with_actor(
            ActorRecord::new("a")
                .with_script(vec![
                    when_flag_clicked(),
                    stagehand::runtime::Block::new("pen_down"),
                    change_x_by(1.0),
                ])
                .with_script(vec![when_flag_clicked(), change_y_by(5.0)]),
        ),
    );

    scheduler.start();
    scheduler.advance(Duration::from_millis(100));

    let state = &scheduler.actor(&ActorId::new("a")).unwrap().state;
    assert_eq!(state.x, 1.0);
    assert_eq!(state.y, 5.0);
}

#[test]
fn test_restart_resets_run() {
    let mut scheduler = single(vec![when_flag_clicked(), forever(), change_x_by(1.0), end()]);

    let first = scheduler.run_id();
    scheduler.start();
    let run = scheduler.run_id();
    scheduler.advance(Duration::from_millis(100));
    scheduler.start();

    assert_ne!(first, run);
    assert_ne!(scheduler.run_id(), run);
    assert_eq!(scheduler.stats().total_threads, 1);
}
