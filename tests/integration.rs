//! Integration tests for practica

use practica::{
    config::Config,
    diagnostic::FailureKind,
    evaluate,
    exercise::{CodeBuffer, Language, Lesson},
    maze::{compile, BlockProgram, CompileError, MazeLevel, MazeSession, Position, RunOutcome},
    preview,
    progress::ProgressRecord,
    rule::Rule,
    runner::{RunnerState, StepRunner},
    store::{JsonFileStore, Store},
};
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use tempfile::TempDir;

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_lesson() -> Lesson {
    Lesson::load(&fixtures_path().join("intro-html.yaml")).unwrap()
}

fn load_site(name: &str) -> CodeBuffer {
    CodeBuffer::load_dir(&fixtures_path().join(name)).unwrap()
}

fn quiet_config() -> Config {
    let mut config = Config::default();
    config.maze.step_delay_ms = 0;
    config
}

#[test]
fn test_load_lesson_fixture() {
    let lesson = load_lesson();
    assert_eq!(lesson.slug, "intro-html");
    assert_eq!(lesson.steps.len(), 3);
    assert_eq!(lesson.starter_code.get(Language::Html), "<!-- write your page here -->");

    let languages: Vec<Language> = lesson.steps[2]
        .validation_rules
        .iter()
        .map(|(language, _)| language)
        .collect();
    assert_eq!(languages, vec![Language::Css, Language::Js]);
    assert_eq!(
        lesson.steps[1].validation_rules.iter().next().unwrap().1,
        &[Rule::must_have_ids(&["title", "menu"])][..]
    );
}

#[test]
fn test_complete_site_passes_every_step() {
    let lesson = load_lesson();
    let code = load_site("site");
    for step in &lesson.steps {
        let result = evaluate(&code, &step.validation_rules);
        assert!(result.passed(), "step {}: {:?}", step.step_number, result.messages());
    }
}

#[test]
fn test_partial_site_reports_missing_ids_in_order() {
    let lesson = load_lesson();
    let code = load_site("site-partial");

    assert!(evaluate(&code, &lesson.steps[0].validation_rules).passed());

    let result = evaluate(&code, &lesson.steps[1].validation_rules);
    assert_eq!(
        result.messages(),
        vec![
            "Missing element with id \"title\"",
            "Missing element with id \"menu\""
        ]
    );
    assert!(result
        .failures()
        .iter()
        .all(|f| f.kind == FailureKind::RuleViolation));

    // No stylesheet or script: both languages fail, nothing is skipped
    let result = evaluate(&code, &lesson.steps[2].validation_rules);
    assert_eq!(result.len(), 2);
}

#[test]
fn test_lesson_progress_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("progress.json");

    {
        let store = JsonFileStore::open(&db).unwrap();
        let mut runner = StepRunner::new(load_lesson(), "ada", store);
        assert_eq!(runner.load_progress(), RunnerState::Viewing(0));
        runner.set_code(load_site("site-partial"));

        assert!(runner.check().unwrap().passed());
        assert_eq!(runner.advance().unwrap(), RunnerState::Viewing(1));
        assert!(!runner.check().unwrap().passed());
        assert_eq!(runner.state(), RunnerState::Viewing(1));
        assert!(runner.take_warnings().is_empty());
    }

    let store = JsonFileStore::open(&db).unwrap();
    let saved = ProgressRecord::load(&store, "ada", "intro-html")
        .unwrap()
        .unwrap();
    assert_eq!(saved.current_step, 1);
    assert!(!saved.completed);

    let mut runner = StepRunner::new(load_lesson(), "ada", store);
    assert_eq!(runner.load_progress(), RunnerState::Viewing(1));
    runner.set_code(load_site("site"));
    for _ in 1..3 {
        assert!(runner.check().unwrap().passed());
        runner.advance().unwrap();
    }
    assert_eq!(runner.state(), RunnerState::Completed);
    drop(runner);

    let store = JsonFileStore::open(&db).unwrap();
    let mut runner = StepRunner::new(load_lesson(), "ada", store);
    assert_eq!(runner.load_progress(), RunnerState::Completed);
}

#[test]
fn test_other_user_starts_fresh() {
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("progress.json");

    let mut runner = StepRunner::new(load_lesson(), "ada", JsonFileStore::open(&db).unwrap());
    runner.load_progress();
    runner.set_code(load_site("site"));
    runner.check().unwrap();
    runner.advance().unwrap();
    drop(runner);

    let mut runner = StepRunner::new(load_lesson(), "grace", JsonFileStore::open(&db).unwrap());
    assert_eq!(runner.load_progress(), RunnerState::Viewing(0));
}

#[test]
fn test_maze_solution_reaches_goal() {
    let level = MazeLevel::load(&fixtures_path().join("corridor.yaml")).unwrap();
    let program = BlockProgram::load(&fixtures_path().join("corridor-solution.json")).unwrap();

    let mut session = MazeSession::new(level, quiet_config().maze).unwrap();
    session.set_program(program);

    let mut positions = Vec::new();
    let report = session.run(|world, _| positions.push(world.player())).unwrap();
    assert_eq!(report.outcome, RunOutcome::Success);
    assert_eq!(report.position, Position::new(3, 3));
    assert!(positions.contains(&Position::new(3, 1)));
    assert!(report.steps <= 200);
}

#[test]
fn test_maze_solution_script() {
    let program = BlockProgram::load(&fixtures_path().join("corridor-solution.json")).unwrap();
    let compiled = compile(&program).unwrap();
    assert_eq!(
        compiled.source,
        "while (isPathForward()) {\n  moveForward();\n  if (isPathRight()) {\n    turnRight();\n  }\n}\n"
    );
}

#[test]
fn test_unknown_block_aborts_run() {
    let level = MazeLevel::load(&fixtures_path().join("corridor.yaml")).unwrap();
    let program = BlockProgram::load(&fixtures_path().join("unknown-block.json")).unwrap();

    let mut session = MazeSession::new(level, quiet_config().maze).unwrap();
    let start = session.world().player();
    session.set_program(program);

    let err = session.run(|_, _| {}).unwrap_err();
    assert_eq!(err, CompileError::UnknownBlock("fooType".to_string()));
    assert_eq!(session.world().player(), start);
}

#[test]
fn test_block_program_saved_to_file_store() {
    let temp = TempDir::new().unwrap();
    let db = temp.path().join("blocks.json");
    let level = MazeLevel::load(&fixtures_path().join("corridor.yaml")).unwrap();
    let program = BlockProgram::load(&fixtures_path().join("corridor-solution.json")).unwrap();

    let mut session = MazeSession::new(level.clone(), quiet_config().maze).unwrap();
    session.set_program(program.clone());
    let mut store = JsonFileStore::open(&db).unwrap();
    session.save(&mut store, "corridor-1").unwrap();
    drop(store);

    let store = JsonFileStore::open(&db).unwrap();
    let mut restored = MazeSession::new(level, quiet_config().maze).unwrap();
    assert!(restored.load(&store, "corridor-1").unwrap());
    assert_eq!(restored.program(), &program);
}

#[test]
fn test_preview_from_site() {
    let page = preview::render(&load_site("site"));
    assert!(page.starts_with("<!DOCTYPE html><html><head><style>h1 {"));
    assert!(page.contains("<body><h1 id=\"title\">Hello</h1>"));
    assert!(page.ends_with("</script></body></html>"));
}

#[test]
fn test_config_file_drives_evaluator() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(".practicarc.yaml");
    std::fs::write(&path, "evaluator:\n  trim_code: false\n").unwrap();
    let config = Config::load(&path).unwrap();
    assert!(!config.evaluator.trim_code);

    let lesson = Lesson::from_yaml(
        "slug: exact\nsteps:\n  - step_number: 1\n    instruction: x\n    validation_rules:\n      js:\n        - type: regex\n          pattern: '^let'\n",
    )
    .unwrap();
    let code = CodeBuffer::new().with(Language::Js, "  let x = 1;");

    let untrimmed = practica::Evaluator::new(config.evaluator);
    assert!(!untrimmed
        .evaluate(&code, &lesson.steps[0].validation_rules)
        .passed());
    assert!(evaluate(&code, &lesson.steps[0].validation_rules).passed());
}

#[test]
fn test_store_trait_object_usage() {
    let temp = TempDir::new().unwrap();
    let mut store = JsonFileStore::open(&temp.path().join("db.json")).unwrap();
    let dyn_store: &mut dyn Store = &mut store;
    let mut record = ProgressRecord::start("u", "l");
    record.save(dyn_store).unwrap();
    assert!(ProgressRecord::load(&store, "u", "l").unwrap().is_some());
}
