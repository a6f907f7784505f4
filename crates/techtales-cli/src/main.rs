//! TechTales CLI
//!
//! Serves the lesson API, or generates and inspects lessons from the terminal.

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use techtales_export::{json::JsonExporter, write_bundle, MarkdownExporter};
use techtales_orchestrator::{
    create_router, store_from_config, AppState, Config, Lesson, LessonOrchestrator,
    StorageBackend,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 8001;

/// TechTales - illustrated technology lessons
///
/// Generates a story, one diagram per visual cue, and a quiz for a technology
/// topic, pitched at the requested age group and difficulty.
#[derive(Parser, Debug)]
#[command(name = "techtales")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: techtales.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Language model to use, overriding the config file
    #[arg(long, value_name = "MODEL", global = true)]
    model: Option<String>,

    /// Directory holding saved lessons, overriding the config file
    #[arg(long, value_name = "DIR", global = true)]
    storage_dir: Option<String>,

    /// Per-call language model timeout in seconds, overriding the config file
    #[arg(long, value_name = "SECONDS", global = true)]
    timeout: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,
    },

    /// Generate a lesson and print or export it
    Generate {
        /// The technology topic to teach
        #[arg(value_name = "TOPIC")]
        topic: String,

        /// Audience: child, teen or adult
        #[arg(short, long, default_value = "teen")]
        age_group: String,

        /// Depth: beginner, intermediate or advanced
        #[arg(short, long, default_value = "beginner")]
        difficulty: String,

        /// Write a lesson bundle (Markdown, JSON, diagrams) to this directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Print JSON instead of Markdown
        #[arg(long)]
        json: bool,
    },

    /// List saved lessons, newest first
    List,

    /// Print a saved lesson
    Show {
        /// Lesson id
        #[arg(value_name = "ID")]
        id: String,

        /// Write a lesson bundle to this directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Print JSON instead of Markdown
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(config = ?args.config, command = ?args.command, "Parsed arguments");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    // Apply CLI argument overrides
    if let Some(ref model) = args.model {
        config.model.clone_from(model);
    }
    if let Some(ref dir) = args.storage_dir {
        config.storage.dir.clone_from(dir);
        config.storage.backend = StorageBackend::File;
    }
    if let Some(timeout) = args.timeout {
        config.request_timeout_seconds = timeout;
    }

    // Re-validate after overrides
    config.validate()?;

    match args.command {
        Command::Serve { port, host } => serve(config, SocketAddr::new(host, port)).await,
        Command::Generate {
            topic,
            age_group,
            difficulty,
            output,
            json,
        } => generate(&config, &topic, &age_group, &difficulty, output.as_deref(), json).await,
        Command::List => list(&config).await,
        Command::Show { id, output, json } => show(&config, &id, output.as_deref(), json).await,
    }
}

async fn serve(config: Config, addr: SocketAddr) -> anyhow::Result<()> {
    print_config(&config);

    let state = AppState::from_config(config)?;
    let router = create_router(state);

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    tracing::info!(%addr, "HTTP API server listening");
    println!("TechTales API running on http://{addr}/api/");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
    }
}

async fn generate(
    config: &Config,
    topic: &str,
    age_group: &str,
    difficulty: &str,
    output: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let orchestrator = LessonOrchestrator::from_config(config)?;

    tracing::info!(topic, age_group, difficulty, "Generating lesson");
    let lesson = orchestrator
        .generate_lesson(topic, age_group, difficulty)
        .await?;

    if lesson.quiz.is_empty() {
        eprintln!("Note: the quiz could not be generated; the lesson has no questions.");
    }
    if !lesson.is_saved() {
        eprintln!("Note: the lesson could not be saved; see the log for details.");
    }

    emit(&lesson, output, json)
}

async fn list(config: &Config) -> anyhow::Result<()> {
    let lessons = store_from_config(config).list().await?;

    if lessons.is_empty() {
        println!("No saved lessons.");
        return Ok(());
    }

    for lesson in &lessons {
        let created = lesson
            .created_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{}  {created}  {:<5} {:<12} {}",
            lesson.id.as_deref().unwrap_or("-"),
            lesson.age_group.as_str(),
            lesson.difficulty.as_str(),
            lesson.topic
        );
    }
    Ok(())
}

async fn show(config: &Config, id: &str, output: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let lesson = store_from_config(config).get(id).await?;
    emit(&lesson, output, json)
}

/// Writes a bundle when `output` is set, otherwise prints the lesson.
fn emit(lesson: &Lesson, output: Option<&Path>, json: bool) -> anyhow::Result<()> {
    if let Some(dir) = output {
        let bundle = write_bundle(lesson, dir)?;
        println!("Lesson written to {}", bundle.dir.display());
        for file in bundle.files() {
            println!("  {}", file.display());
        }
        return Ok(());
    }

    if json {
        println!("{}", JsonExporter::new(lesson).generate_pretty()?);
    } else {
        print!("{}", MarkdownExporter::new(lesson).generate());
    }
    Ok(())
}

/// Loads configuration from the specified path or the current directory.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Provider: {}", config.llm_provider);
    println!("  Model: {}", config.model);
    println!("  Request timeout: {}s", config.request_timeout_seconds);
    println!("  Storage: {:?} ({})", config.storage.backend, config.storage.dir);
}
