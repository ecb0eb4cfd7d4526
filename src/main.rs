//! practica CLI - lesson checker and maze runner
//!
//! Usage:
//!   practica check lesson.yaml --step 2 --dir site/    # Check code against one step
//!   practica lesson lesson.yaml --user ada --dir site/ # Walk a lesson with saved progress
//!   practica maze level.yaml program.json              # Run a block program
//!   practica compile program.json                      # Show the compiled script
//!   practica preview --dir site/ --out preview.html    # Build the preview page
//!   practica rules lesson.yaml                         # List the rules of each step

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use practica::config::{ColorMode, Config, OutputFormat};
use practica::evaluator::Evaluator;
use practica::exercise::{CodeBuffer, Lesson};
use practica::maze::{compile, BlockProgram, MazeLevel, MazeSession};
use practica::output::{formatter, CheckReport, OutputFormatter};
use practica::runner::{RunnerState, StepRunner};
use practica::store::{JsonFileStore, MemoryStore, Store};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "practica",
    version,
    about = "Exercise checker and block-program maze runner",
    long_about = "Checks HTML/CSS/JS code against the declarative rules of a lesson step, \
                  tracks lesson progress, and runs block programs in a grid maze."
)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, global = true)]
    format: Option<Format>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the code in a directory against one lesson step
    Check {
        /// Lesson file (YAML or JSON)
        lesson: PathBuf,

        /// Step number to check (defaults to the first step)
        #[arg(short, long)]
        step: Option<u32>,

        /// Directory holding index.html, style.css and script.js
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Re-check whenever a code file changes
        #[arg(short, long)]
        watch: bool,

        /// Clear screen before each check (use with --watch)
        #[arg(long, requires = "watch")]
        clear: bool,
    },

    /// Walk through a lesson with the code in a directory, saving progress
    Lesson {
        /// Lesson file (YAML or JSON)
        lesson: PathBuf,

        /// User whose progress is tracked
        #[arg(short, long)]
        user: String,

        /// Directory holding index.html, style.css and script.js
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// JSON database file for progress
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Run a block program in a maze level
    Maze {
        /// Level file (YAML or JSON)
        level: PathBuf,

        /// Block program file (JSON or YAML)
        program: PathBuf,

        /// Pause between steps in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Print the maze after every step
        #[arg(long)]
        show: bool,

        /// JSON database file to save the program in
        #[arg(long)]
        store: Option<PathBuf>,

        /// Block id the program is saved under
        #[arg(long, requires = "store")]
        block_id: Option<String>,
    },

    /// Print the script a block program compiles to
    Compile {
        /// Block program file (JSON or YAML)
        program: PathBuf,
    },

    /// Render the live preview page for a code directory
    Preview {
        /// Directory holding index.html, style.css and script.js
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// List the validation rules of every step in a lesson
    Rules {
        /// Lesson file (YAML or JSON)
        lesson: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::load_default().unwrap_or_else(|e| {
            log::warn!("ignoring default config: {}", e);
            Config::default()
        }),
    };

    let format = cli.format.map(|f| match f {
        Format::Text => OutputFormat::Text,
        Format::Json => OutputFormat::Json,
    });
    let (delay_ms, store_path) = match &cli.command {
        Commands::Maze {
            delay_ms, store, ..
        } => (*delay_ms, store.clone()),
        Commands::Lesson { store, .. } => (None, store.clone()),
        _ => (None, None),
    };
    config.merge_cli(format, delay_ms, store_path);

    match (cli.no_color, config.output.color) {
        (true, _) | (false, ColorMode::Never) => colored::control::set_override(false),
        (false, ColorMode::Always) => colored::control::set_override(true),
        (false, ColorMode::Auto) => {}
    }
    let colored = !cli.no_color && config.output.color != ColorMode::Never;
    let out = formatter(config.output.format, colored);

    let code = match cli.command {
        Commands::Check {
            lesson,
            step,
            dir,
            watch,
            clear,
        } => handle_check(&config, out.as_ref(), &lesson, step, &dir, watch, clear)?,
        Commands::Lesson {
            lesson, user, dir, ..
        } => handle_lesson(&config, out.as_ref(), &lesson, &user, &dir)?,
        Commands::Maze {
            level,
            program,
            show,
            block_id,
            ..
        } => handle_maze(&config, out.as_ref(), &level, &program, show, block_id)?,
        Commands::Compile { program } => handle_compile(&config, &program)?,
        Commands::Preview { dir, out: target } => handle_preview(&dir, target.as_deref())?,
        Commands::Rules { lesson } => {
            let lesson = load_lesson(&lesson)?;
            println!("{}", out.format_rules(&lesson));
            0
        }
    };

    std::process::exit(code);
}

fn load_lesson(path: &Path) -> Result<Lesson> {
    Lesson::load(path).with_context(|| format!("Failed to load lesson {}", path.display()))
}

/// Starter code overlaid with whatever code files exist in `dir`
fn load_code(lesson: &Lesson, dir: &Path) -> Result<CodeBuffer> {
    let files = CodeBuffer::load_dir(dir)
        .with_context(|| format!("Failed to read code from {}", dir.display()))?;
    let mut code = lesson.starter_code.clone();
    for language in files.languages() {
        code.set(language, files.get(language));
    }
    Ok(code)
}

fn handle_check(
    config: &Config,
    out: &dyn OutputFormatter,
    path: &Path,
    step: Option<u32>,
    dir: &Path,
    watch: bool,
    clear: bool,
) -> Result<i32> {
    let lesson = load_lesson(path)?;
    let index = match step {
        Some(number) => match lesson.index_of(number) {
            Some(index) => index,
            None => bail!("Lesson '{}' has no step {}", lesson.slug, number),
        },
        None => 0,
    };
    let Some(step) = lesson.step(index) else {
        bail!("Lesson '{}' has no steps", lesson.slug);
    };
    let evaluator = Evaluator::new(config.evaluator.clone());

    let check = || -> Result<i32> {
        let code = load_code(&lesson, dir)?;
        let result = evaluator.evaluate(&code, &step.validation_rules);
        println!(
            "{}",
            out.format_check(&CheckReport {
                lesson: &lesson,
                step,
                result: &result,
            })
        );
        Ok(result.exit_code())
    };

    if !watch {
        return check();
    }

    println!("{} {}", "Watching".cyan().bold(), dir.display());
    practica::watch::watch_and_run(dir, clear, |_| {
        if let Err(e) = check() {
            eprintln!("{}: {:#}", "error".red().bold(), e);
        }
    })?;
    Ok(0)
}

fn handle_lesson(
    config: &Config,
    out: &dyn OutputFormatter,
    path: &Path,
    user: &str,
    dir: &Path,
) -> Result<i32> {
    let lesson = load_lesson(path)?;
    let code = load_code(&lesson, dir)?;

    match &config.store.path {
        Some(store_path) => {
            let store = JsonFileStore::open(store_path)
                .with_context(|| format!("Failed to open store {}", store_path.display()))?;
            walk_lesson(config, out, StepRunner::new(lesson, user, store), code)
        }
        None => walk_lesson(config, out, StepRunner::new(lesson, user, MemoryStore::new()), code),
    }
}

/// Check and advance until a step fails or the lesson is complete
fn walk_lesson<S: Store>(
    config: &Config,
    out: &dyn OutputFormatter,
    runner: StepRunner<S>,
    code: CodeBuffer,
) -> Result<i32> {
    let mut runner = runner.with_evaluator_config(config.evaluator.clone());
    runner.load_progress();
    runner.set_code(code);

    let exit_code = loop {
        if runner.state() == RunnerState::Completed {
            println!(
                "{} Lesson '{}' completed",
                "✓".green().bold(),
                runner.lesson().slug
            );
            break 0;
        }

        let result = runner.check()?;
        if let Some(step) = runner.current_step() {
            println!(
                "{}",
                out.format_check(&CheckReport {
                    lesson: runner.lesson(),
                    step,
                    result: &result,
                })
            );
        }
        if !result.passed() {
            break result.exit_code();
        }
        runner.advance()?;
    };

    for warning in runner.take_warnings() {
        eprintln!("{}: {}", "warning".yellow().bold(), warning);
    }
    Ok(exit_code)
}

fn handle_maze(
    config: &Config,
    out: &dyn OutputFormatter,
    level_path: &Path,
    program_path: &Path,
    show: bool,
    block_id: Option<String>,
) -> Result<i32> {
    let level = MazeLevel::load(level_path)
        .with_context(|| format!("Failed to load level {}", level_path.display()))?;
    let program = BlockProgram::load(program_path)
        .with_context(|| format!("Failed to load program {}", program_path.display()))?;

    let mut session = MazeSession::new(level, config.maze.clone())?;
    session.set_program(program);

    let report = session.run(|world, step| {
        if show {
            println!("step {}\n{}", step, world.render());
        }
    })?;
    println!("{}", out.format_run(session.level(), &report));

    if let (Some(store_path), Some(block_id)) = (&config.store.path, block_id) {
        let saved = JsonFileStore::open(store_path)
            .and_then(|mut store| session.save(&mut store, &block_id));
        if let Err(e) = saved {
            log::warn!("could not save program '{}': {}", block_id, e);
            eprintln!("{}: could not save program: {}", "warning".yellow().bold(), e);
        }
    }

    Ok(if report.outcome.is_success() { 0 } else { 1 })
}

fn handle_compile(config: &Config, path: &Path) -> Result<i32> {
    let program = BlockProgram::load(path)
        .with_context(|| format!("Failed to load program {}", path.display()))?;
    let compiled = compile(&program)?;
    match config.output.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&compiled)?),
        OutputFormat::Text => print!("{}", compiled.source),
    }
    Ok(0)
}

fn handle_preview(dir: &Path, target: Option<&Path>) -> Result<i32> {
    let code = CodeBuffer::load_dir(dir)
        .with_context(|| format!("Failed to read code from {}", dir.display()))?;
    let page = practica::preview::render(&code);
    match target {
        Some(path) => {
            std::fs::write(path, page)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("{} Wrote {}", "success".green().bold(), path.display());
        }
        None => println!("{}", page),
    }
    Ok(0)
}
