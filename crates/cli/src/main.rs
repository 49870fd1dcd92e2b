mod backend;

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::Context,
    clap::{Args, Parser, Subcommand},
    cmdbot_channels::{CommandCallback, CommandLine, InputFrontend},
    cmdbot_config::{DataStore, FileStore, paths},
    cmdbot_cron::CronInputFrontend,
    cmdbot_discord::{DiscordConfig, DiscordFrontend, config::DEFAULT_CATEGORY},
    tokio::sync::mpsc,
    tracing::{debug, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use crate::backend::{BACKEND_CATEGORY, Backend, FILE_DIR_KEY, dispatch};

#[derive(Parser)]
#[command(name = "cmdbot", about = "cmdbot: a command-line bot on Discord", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Discord and serve commands until interrupted.
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Config file (default ~/.config/cmdbot/cmdbot.toml).
    #[arg(long, env = "CMDBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Writable data file for learned settings (default ~/.config/cmdbot/data.toml).
    #[arg(long, env = "CMDBOT_DATA")]
    data: Option<PathBuf>,

    /// Message that binds the server it is posted in (overrides config).
    #[arg(long)]
    init_cmd: Option<String>,

    /// Prefix marking a message as a command.
    #[arg(long, default_value = "!")]
    prefix: String,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if cli.log_json {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_thread_ids(false))
            .init();
    }
}

fn open_store(args: &RunArgs) -> anyhow::Result<FileStore> {
    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => paths::default_config_path()?,
    };
    let data_path = match &args.data {
        Some(path) => path.clone(),
        None => paths::default_data_path()?,
    };
    FileStore::open(&config_path, data_path)
        .with_context(|| format!("failed to open config {}", config_path.display()))
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let store: Arc<dyn DataStore> = Arc::new(open_store(&args)?);
    let mut config = DiscordConfig::from_store(store.as_ref(), DEFAULT_CATEGORY);
    if let Some(init_cmd) = args.init_cmd {
        config = config.with_init_cmd(init_cmd);
    }
    let jobs = cmdbot_cron::load_jobs(store.as_ref()).context("failed to load cron jobs")?;

    let discord = DiscordFrontend::connect(Arc::clone(&store), config);
    let cron = (!jobs.is_empty()).then(|| Arc::new(CronInputFrontend::new(jobs)));

    let (tx, mut rx) = mpsc::unbounded_channel::<CommandLine>();
    let callback: CommandCallback = Arc::new(move |line| {
        if tx.send(line).is_err() {
            debug!("command line dropped: dispatch loop stopped");
        }
    });

    discord
        .input()
        .run(Arc::clone(&callback))
        .await
        .context("failed to start the Discord front end")?;

    let cron_task = cron.as_ref().map(|cron| {
        let cron = Arc::clone(cron);
        let callback = Arc::clone(&callback);
        tokio::spawn(async move {
            if let Err(e) = cron.run(callback).await {
                warn!(error = %e, "cron front end failed");
            }
        })
    });
    drop(callback);

    let mut backend = Backend::new(args.prefix);
    if let Some(dir) = store.get(BACKEND_CATEGORY, FILE_DIR_KEY) {
        info!(file_dir = %dir, "file command enabled");
        backend = backend.with_file_dir(dir);
    }
    info!("cmdbot running, press Ctrl-C to stop");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!(error = %e, "failed to listen for Ctrl-C");
                }
                info!("shutting down");
                break;
            }
            line = rx.recv() => {
                let Some(line) = line else { break };
                dispatch(&backend, discord.output(), &line).await;
            }
        }
    }

    if let Some(cron) = &cron {
        cron.kill().await;
    }
    if let Some(task) = cron_task
        && let Err(e) = task.await
    {
        warn!(error = %e, "cron task panicked");
    }
    discord.input().kill().await;
    info!("cmdbot stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_telemetry(&cli);

    match cli.command {
        Commands::Run(args) => run(args).await,
    }
}
