//! Storage and real-time driver integration tests
//!
//! Tests the complete flow from an initialized storage root through saving,
//! reloading, and running a project against the wall clock.

use stagehand::runtime::block::blocks::*;
use stagehand::runtime::block::{Block, BlockInput};
use stagehand::runtime::{ActorRecord, Project, Runtime, RuntimeConfig, Value};
use std::time::Duration;
use tempfile::TempDir;

fn game() -> Project {
    Project::new()
        .with_global("speed", 2.0)
        .with_actor(
            ActorRecord::new("player")
                .with_variable("score", 0.0)
                .with_script(vec![
                    when_flag_clicked(),
                    repeat(5.0),
                    change_variable("score", 1.0),
                    end(),
                    broadcast("done"),
                ]),
        )
        .with_actor(
            ActorRecord::new("referee")
                .with_script(vec![when_i_receive("done"), set_variable("verdict", "over")]),
        )
}

#[test]
fn test_runtime_initialization() {
    let temp = TempDir::new().unwrap();
    let config = RuntimeConfig {
        root: temp.path().join("stage"),
        max_clones: 12,
        ..RuntimeConfig::default()
    };

    Runtime::init(config.clone()).unwrap();
    let runtime = Runtime::load(config.root.clone()).unwrap();

    assert_eq!(runtime.config().max_clones, 12);
    assert_eq!(runtime.storage().root(), config.root.as_path());
    assert!(runtime.storage().list_projects().unwrap().is_empty());
}

#[test]
fn test_saved_stage_captures_progress() {
    let temp = TempDir::new().unwrap();
    let config = RuntimeConfig {
        root: temp.path().to_path_buf(),
        ..RuntimeConfig::default()
    };
    Runtime::init(config.clone()).unwrap();
    let runtime = Runtime::new(config.clone()).unwrap();

    runtime.install(&game()).unwrap();
    {
        let mut scheduler = runtime.scheduler_mut();
        scheduler.start();
        scheduler.advance(Duration::from_secs(1));
    }
    runtime.save_project("after-run").unwrap();

    let reloaded = Runtime::load(config.root).unwrap();
    reloaded.load_project("after-run").unwrap();
    let scheduler = reloaded.scheduler_mut();
    let player = scheduler.actor(&"player".into()).unwrap();
    let referee = scheduler.actor(&"referee".into()).unwrap();

    assert_eq!(player.variables["score"], Value::Number(5.0));
    assert_eq!(referee.variables["verdict"], Value::from("over"));
    assert_eq!(scheduler.globals()["speed"], Value::Number(2.0));
    assert!(!scheduler.is_running());
}

#[test]
fn test_import_rejects_structurally_broken_project() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("broken.json");
    let broken = Project::new().with_actor(
        ActorRecord::new("cat").with_script(vec![when_flag_clicked(), end()]),
    );
    std::fs::write(&path, serde_json::to_vec(&broken).unwrap()).unwrap();

    let runtime = Runtime::new(RuntimeConfig {
        root: temp.path().to_path_buf(),
        ..RuntimeConfig::default()
    })
    .unwrap();

    assert!(runtime.import_project(&path).is_err());
    assert!(runtime.scheduler_mut().actors().is_empty());
}

#[tokio::test]
async fn test_driver_runs_project_in_real_time() {
    let temp = TempDir::new().unwrap();
    let runtime = Runtime::new(RuntimeConfig {
        root: temp.path().to_path_buf(),
        ..RuntimeConfig::default()
    })
    .unwrap();
    runtime.install(&game()).unwrap();
    runtime.scheduler_mut().start();

    let stats = runtime
        .driver()
        .with_frame(Duration::from_millis(5))
        .run_for(Duration::from_millis(300))
        .await;

    let scheduler = runtime.scheduler_mut();
    assert_eq!(scheduler.now().as_millis(), 300);
    assert_eq!(
        scheduler.actor(&"player".into()).unwrap().variables["score"],
        Value::Number(5.0)
    );
    assert!(stats.threads_spawned >= 2);
}

#[test]
fn test_non_finite_results_survive_save_and_reload() {
    let temp = TempDir::new().unwrap();
    let config = RuntimeConfig {
        root: temp.path().to_path_buf(),
        ..RuntimeConfig::default()
    };
    Runtime::init(config.clone()).unwrap();
    let runtime = Runtime::new(config.clone()).unwrap();

    let one_over_zero = || {
        BlockInput::reporter(
            "operator_divide",
            vec![BlockInput::literal(1.0), BlockInput::literal(0.0)],
        )
    };
    let project = Project::new().with_actor(ActorRecord::new("cat").with_script(vec![
        when_flag_clicked(),
        set_variable("ratio", one_over_zero()),
        change_x_by(one_over_zero()),
        Block::with_inputs("motion_turnright", vec![one_over_zero()]),
    ]));
    runtime.install(&project).unwrap();
    {
        let mut scheduler = runtime.scheduler_mut();
        scheduler.start();
        scheduler.advance(Duration::from_millis(50));
    }
    runtime.save_project("divided").unwrap();

    let reloaded = Runtime::load(config.root).unwrap();
    reloaded.load_project("divided").unwrap();
    let scheduler = reloaded.scheduler_mut();
    let cat = scheduler.actor(&"cat".into()).unwrap();

    assert_eq!(cat.variables["ratio"], Value::Number(f64::INFINITY));
    assert_eq!(cat.state.x, f64::INFINITY);
    assert_eq!(cat.state.direction, 90.0);
}
