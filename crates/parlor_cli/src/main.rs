mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;
use parlor_core::ParlorConfig;
use tracing::info;

#[derive(Parser)]
#[command(name = "parlor")]
#[command(about = "Discord chat bot backed by a local language model")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Discord bot
    Bot,
    /// Convert character card images to JSON
    Import {
        /// Card image, JSON card, or a directory of them
        path: PathBuf,

        /// Write cards here instead of next to the images
        #[arg(short = 'o', long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .rgb_colors(miette::RgbColors::Preferred)
                .with_cause_chain()
                .color(true)
                .context_lines(5)
                .tab_width(2)
                .break_words(true)
                .build(),
        )
    }))?;
    miette::set_panic_hook();
    let cli = Cli::parse();

    use tracing_appender::rolling;
    use tracing_subscriber::{
        EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt,
    };

    // Create log directory in user's data directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("parlor")
        .join("logs");
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = rolling::daily(&log_dir, "parlor.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = if cli.debug {
        EnvFilter::new(
            "parlor=debug,parlor_core=debug,parlor_cards=debug,parlor_discord=debug,serenity=warn,info",
        )
    } else {
        EnvFilter::new(
            "parlor=info,parlor_core=info,parlor_cards=info,parlor_discord=info,serenity=warn,warn",
        )
    };

    let terminal_layer = if cli.debug {
        fmt::layer()
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .pretty()
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_writer(std::io::stderr)
            .compact()
            .boxed()
    };

    // File layer always logs at debug
    let file_env_filter = EnvFilter::new(
        "parlor=debug,parlor_core=debug,parlor_cards=debug,parlor_discord=debug,serenity=info,info",
    );
    let file_layer = fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_ansi(false)
        .with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(terminal_layer.with_filter(env_filter))
        .with(file_layer.with_filter(file_env_filter))
        .init();

    info!(
        "Logging initialized. Logs are being written to: {:?}",
        log_dir.join("parlor.log")
    );

    match cli.command {
        Commands::Bot => {
            let config = load_config(cli.config.as_deref())?;
            commands::bot::run(config).await
        }
        Commands::Import { path, out } => commands::import::run(&path, out.as_deref()),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<ParlorConfig> {
    match path {
        Some(path) => info!("Loading config from: {:?}", path),
        None => info!("Loading config from standard locations"),
    }
    let mut config = ParlorConfig::load_or_default(path)?;
    config.apply_env()?;
    Ok(config)
}
