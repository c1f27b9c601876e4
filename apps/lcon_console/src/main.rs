use std::env;
use std::error::Error;
use std::fs::File;
use std::io;
use std::process::ExitCode;
use std::rc::Rc;

use clap::{Parser, ValueEnum};
use crossterm::cursor::Show;
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use lcon_log::{LogConfig, init_logging, parse_level};
use lcon_schema::{ModuleManifest, Validatable};
use lcon_scripting::adapters::LuaRuntimeAdapter;
use lcon_scripting::api::PresetRegistry;
use lcon_scripting::{ScriptEngine, ScriptHost};

mod app_paths;
use app_paths::AppPaths;

mod config;
use config::Config;

mod console;
use console::{Console, ConsoleGui, ConsoleInput, ConsoleSettings, HeadlessGui, MutedSounds};

mod terminal;
use terminal::{TerminalEvent, TerminalPanel};

const VERSION: &str = "0.1.0";
const LOG_FILE_NAME: &str = "lcon_console.log";
/// Virtual screen height used when no terminal is attached
const BATCH_SCREEN_ROWS: i32 = 24;

/// Get default config path based on executable location
fn default_config_path() -> String {
    env::current_exe()
        .ok()
        .and_then(|exe_path| {
            let stem = exe_path.file_stem()?;
            let parent = exe_path.parent()?;
            Some(parent.join(stem).with_extension("json"))
        })
        .and_then(|path| path.to_str().map(|s| s.to_string()))
        .unwrap_or_else(|| "./lcon_console.json".to_string())
}

/// Documents `--schema` can print
#[derive(ValueEnum, Clone, Copy, Debug)]
enum SchemaKind {
    /// The console configuration file
    Config,
    /// The presets.json manifest of a data module
    Module,
}

/// Lua developer console
#[derive(Parser, Debug)]
#[command(name = "lcon_console")]
#[command(version = VERSION)]
#[command(about = "Developer console with an embedded Lua scripting bridge", long_about = None)]
struct Args {
    /// Path to configuration file (JSON); defaults apply when it does not exist
    #[arg(short, long, default_value_t = default_config_path())]
    config: String,

    /// Custom home directory for console output files and relative data paths
    #[arg(long, env = "LCON_HOME")]
    home: Option<String>,

    /// Log to lcon_console.log in the data directory instead of stdout
    #[arg(long, env = "LCON_LOG_FILE")]
    log_file: bool,

    /// Run Lua statements without the terminal UI, print the transcript and exit
    #[arg(short, long)]
    exec: Option<String>,

    /// Run a Lua script file (relative to data_dir) without the terminal UI, print the transcript and exit
    #[arg(short, long)]
    script: Option<String>,

    /// Print the JSON schema of a configuration document and exit
    #[arg(long, value_enum)]
    schema: Option<SchemaKind>,
}

impl Args {
    fn is_batch(&self) -> bool {
        self.exec.is_some() || self.script.is_some()
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Some(kind) = args.schema {
        return print_schema(kind);
    }

    // We can't log errors yet, so we use eprintln! for early failures
    let config = if std::path::Path::new(&args.config).is_file() {
        match Config::from_json_file(&args.config) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load config from '{}': {}", args.config, e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        Config::default()
    };

    let paths = match AppPaths::new(args.home.as_deref()) {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("Failed to prepare application directories: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let batch = args.is_batch();
    if !batch && !terminal::is_terminal() {
        eprintln!("Not attached to a terminal; use --exec or --script to run headless");
        return ExitCode::FAILURE;
    }

    // The terminal UI draws over stdout, so interactive sessions always log to file
    let log_to_file = args.log_file || !batch;
    let mut log_config = LogConfig::<File>::new("lcon_console::")
        .with_level(parse_level(&config.log_level))
        .with_stdout(!log_to_file);
    if log_to_file {
        let log_path = paths.output_file(LOG_FILE_NAME);
        match File::create(&log_path) {
            Ok(file) => log_config = log_config.with_log_file(file),
            Err(e) => eprintln!("Unable to create {}: {}", log_path.display(), e),
        }
    }
    if let Err(e) = init_logging(log_config) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!("Lua Console v{}", VERSION);
    info!("Configuration: {}", args.config);

    debug!("Settings:");
    debug!("  Data Dir: {}", config.data_dir);
    debug!("  Base Module: {}", config.base_module);
    debug!("  Tick Rate: {} Hz", config.tick_rate);
    debug!("  Log Level: {}", config.log_level);
    debug!("  Output Dir: {}", paths.data_dir().display());

    let mut engine = match build_engine(&config, args.home.as_deref()) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Failed to start the script engine: {}", e);
            eprintln!("Failed to start the script engine: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let settings = console_settings(&config, &paths);

    let code = if batch {
        run_batch(&args, &mut engine, settings)
    } else {
        match run_interactive(&mut engine, settings, config.tick_rate).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Terminal console failed: {}", e);
                eprintln!("Terminal console failed: {}", e);
                ExitCode::FAILURE
            }
        }
    };

    let leaked = engine.shutdown();
    if leaked > 0 {
        warn!("{} script-owned entities were still alive at shutdown", leaked);
    }
    info!("Shutdown complete");

    code
}

fn print_schema(kind: SchemaKind) -> ExitCode {
    let schema = match kind {
        SchemaKind::Config => Config::schema_json(),
        SchemaKind::Module => ModuleManifest::schema_json(),
    };
    match schema {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to generate schema: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Load the data modules and start the Lua engine, then run the autorun scripts
fn build_engine(config: &Config, custom_home: Option<&str>) -> Result<ScriptEngine, Box<dyn Error>> {
    let data_dir = config.resolve_data_dir(custom_home)?;

    let presets = match PresetRegistry::load_data_dir(&data_dir, &config.module_suffix, &config.base_module) {
        Ok(registry) => {
            info!(
                "Loaded {} presets from {} data modules in {}",
                registry.preset_count(),
                registry.modules().len(),
                data_dir.display()
            );
            registry
        }
        Err(e) => {
            warn!("{}; continuing without data modules", e);
            PresetRegistry::new()
        }
    };

    let host = Rc::new(ScriptHost::new(config.script_config(data_dir), presets, "lua"));
    let adapter = LuaRuntimeAdapter::new(host.clone())?;
    let mut engine = ScriptEngine::new(Box::new(adapter), host);
    info!("Script engine ready ({})", engine.runtime_type());

    for script in &config.autorun {
        match engine.run_script_file(script, true) {
            Ok(()) => info!(script = %script, "Autorun script finished"),
            Err(e) => warn!(script = %script, "Autorun script failed: {}", e),
        }
    }

    Ok(engine)
}

fn console_settings(config: &Config, paths: &AppPaths) -> ConsoleSettings {
    ConsoleSettings {
        screen_ratio: config.console_screen_ratio,
        output_dir: paths.data_dir().clone(),
        transcript_file: paths.output_file(&config.transcript_file),
        input_log_file: paths.output_file(&config.input_log_file),
        save_input_log_on_exit: config.save_input_log_on_exit,
        log_to_cli: config.log_to_cli,
    }
}

/// Run `--script` and/or `--exec`, then print the transcript
///
/// Fails when any statement or the script file ended in an error.
fn run_batch(args: &Args, engine: &mut ScriptEngine, settings: ConsoleSettings) -> ExitCode {
    let mut console = Console::new(HeadlessGui::new(BATCH_SCREEN_ROWS), MutedSounds, settings);
    console.drain_script_output(engine);

    let mut failed = false;

    if let Some(script) = &args.script {
        engine.clear_errors();
        // The error, if any, is read back from the engine below
        let _ = engine.run_script_file(script, false);
        console.drain_script_output(engine);
        if let Some(error) = engine.last_error().map(str::to_string) {
            console.print_string(&format!("ERROR: {}", error));
            failed = true;
        }
    }

    if let Some(code) = &args.exec {
        console.gui_mut().set_input_text(code);
        console.feed_multiple_strings(engine);
    }

    engine.update();
    console.drain_script_output(engine);
    failed |= console.failed_statements() > 0;

    console.shutdown();
    println!("{}", console.transcript());

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Drive the terminal console until Ctrl+C
async fn run_interactive(
    engine: &mut ScriptEngine,
    settings: ConsoleSettings,
    tick_rate: u64,
) -> Result<(), Box<dyn Error>> {
    let (cols, rows) = crossterm::terminal::size()?;
    let (mut events, mut reader) = terminal::spawn_terminal_event_reader()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let mut console = Console::new(TerminalPanel::new(cols, rows), MutedSounds, settings);
    console.set_enabled(true);

    info!("Entering console loop. Press Ctrl+C to quit");
    let result = tick_loop(&mut console, engine, &mut events, tick_rate).await;

    if let Err(e) = execute!(stdout, LeaveAlternateScreen, Show) {
        warn!("Failed to restore the terminal screen: {}", e);
    }
    reader.stop_async().await;
    console.shutdown();

    result
}

async fn tick_loop(
    console: &mut Console<TerminalPanel>,
    engine: &mut ScriptEngine,
    events: &mut tokio::sync::mpsc::Receiver<TerminalEvent>,
    tick_rate: u64,
) -> Result<(), Box<dyn Error>> {
    let mut stdout = io::stdout();
    let mut ticker = interval(Duration::from_secs_f64(1.0 / tick_rate.max(1) as f64));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let mut input = ConsoleInput::new();
        loop {
            match events.try_recv() {
                Ok(TerminalEvent::Key(key)) => {
                    if terminal::is_quit(&key) {
                        info!("Quit requested");
                        return Ok(());
                    }
                    match terminal::key_event_to_press(&key) {
                        Some(press) => input.push(press),
                        None => console.gui_mut().apply_key(&key),
                    }
                }
                Ok(TerminalEvent::Paste(text)) => console.gui_mut().paste(&text),
                Ok(TerminalEvent::Resize(cols, rows)) => {
                    console.gui_mut().resize(cols, rows);
                    let ratio = console.screen_ratio();
                    console.set_screen_size(ratio);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("Terminal event reader stopped");
                    return Ok(());
                }
            }
        }

        console.update(&input, engine);
        engine.update();

        for id in engine.host().take_submitted() {
            if let Some(entity) = engine.host().reclaim_entity(id) {
                info!(entity = %id, "{} \"{}\" submitted to the scene", entity.kind, entity.preset_name);
            }
        }

        console.gui().draw(&mut stdout)?;
    }
}
