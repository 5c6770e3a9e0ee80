//! Judge server binary
//!
//! Loads the YAML configuration (if any), connects to the local Docker daemon
//! and serves the judge over HTTP until Ctrl+C or SIGTERM.

use anyhow::Result;
use clap::{Parser, Subcommand};
use judge_core::config::{ConfigLoader, JudgeConfig};
use judge_core::executors::{DockerRuntime, SandboxRuntime};
use judge_core::session::{InMemorySessionStore, SessionManager};
use judge_core::{all_profiles, JudgeService};
use judge_server::{shutdown_signal, FileProblemRepository, JudgeServer, ServerConfig};
use log::LevelFilter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Judge Server - sandboxed multi-language code execution")]
struct Cli {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(long, short, default_value = "judge.yaml", help = "Configuration file; defaults apply if it does not exist")]
    config: PathBuf,

    #[clap(long, help = "Overrides server.bind_addr")]
    bind_addr: Option<String>,

    #[clap(long, help = "Overrides problems_dir")]
    problems_dir: Option<PathBuf>,

    #[clap(long, short, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the judge server (default command)
    Run,
    /// List supported languages and their sandbox limits
    Languages,
    /// Pull every sandbox image ahead of time
    Pull,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let log_level_filter = cli.log_level.parse().unwrap_or(LevelFilter::Info);
    env_logger::Builder::new()
        .filter_level(log_level_filter)
        .init();

    match cli.command {
        Some(Commands::Languages) => {
            print_languages();
            Ok(())
        }
        Some(Commands::Pull) => pull_images().await,
        Some(Commands::Run) | None => {
            let mut config = load_config(&cli.config).await?;
            if let Some(bind_addr) = cli.bind_addr {
                config.server.bind_addr = bind_addr;
            }
            if let Some(problems_dir) = cli.problems_dir {
                config.problems_dir = problems_dir;
            }
            config.validate()?;
            run_server(config).await
        }
    }
}

async fn load_config(path: &Path) -> Result<JudgeConfig> {
    if path.exists() {
        log::info!("Loading configuration from file: {}", path.display());
        Ok(ConfigLoader::from_file(path).await?)
    } else {
        log::info!("No configuration file at {}, using defaults", path.display());
        Ok(JudgeConfig::default())
    }
}

async fn run_server(config: JudgeConfig) -> Result<()> {
    let runtime = DockerRuntime::new()?;
    if !runtime.is_available().await {
        anyhow::bail!("Docker daemon is not reachable");
    }
    let runtime: Arc<dyn SandboxRuntime> = Arc::new(runtime);

    let session_settings = config.session_settings();
    tokio::fs::create_dir_all(&session_settings.workspace_root).await?;
    log::info!(
        "Session workspaces under {}",
        session_settings.workspace_root.display()
    );

    let sessions = Arc::new(SessionManager::new(
        runtime.clone(),
        Arc::new(InMemorySessionStore::new()),
        session_settings,
    ));
    let judge = Arc::new(JudgeService::new(
        runtime,
        sessions,
        config.execution_settings(),
    ));

    log::info!("Problems directory: {}", config.problems_dir.display());
    let problems = Arc::new(FileProblemRepository::new(config.problems_dir.clone()));

    let server_config = ServerConfig::from_judge_config(&config)?.with_logging(true);
    log::info!("Starting judge server on {}...", server_config.bind_addr);

    let server = JudgeServer::new(judge, problems, server_config);
    if let Err(e) = server.serve_with_shutdown(shutdown_signal()).await {
        log::error!("Server failed: {}", e);
        return Err(e.into());
    }

    log::info!("Judge server shut down gracefully.");
    Ok(())
}

fn print_languages() {
    println!(
        "{:<12} {:<16} {:<26} {:>8} {:>5}",
        "LANGUAGE", "ALIASES", "IMAGE", "MEMORY", "CPU"
    );
    for profile in all_profiles() {
        println!(
            "{:<12} {:<16} {:<26} {:>5} MB {:>5}",
            profile.name,
            profile.aliases.join(","),
            profile.image,
            profile.memory_mb,
            profile.cpu_cores
        );
    }
}

async fn pull_images() -> Result<()> {
    let runtime = DockerRuntime::new()?;
    for profile in all_profiles() {
        println!("Pulling {} ({})...", profile.image, profile.name);
        runtime.ensure_image(profile.image).await?;
    }
    println!("All sandbox images are available.");
    Ok(())
}
