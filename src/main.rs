use clap::{Parser, Subcommand};
use logtide::cli::{self, show::ShowArgs};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logtide")]
#[command(about = "Ship build logs to fluentd and read them back from CloudWatch", long_about = None)]
struct Cli {
    /// YAML config file; without one, configuration comes from the environment
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ship stdin as a build's log output
    Ship {
        /// Build name in `stream/build/` form
        name: String,
        #[arg(long)]
        step: Option<String>,
    },
    /// Print a build's log from the store
    Show {
        /// Build name in `stream/build/` form
        name: String,
        #[arg(long)]
        step: Option<String>,
        /// Wait (bounded) for the store to catch up and report completeness
        #[arg(long)]
        complete: bool,
        /// Byte offset to start printing from
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout is reserved for log text.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logtide=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = logtide::config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Ship { name, step } => {
            cli::ship::run(&config, &name, step.as_deref()).await?;
        }
        Commands::Show {
            name,
            step,
            complete,
            offset,
        } => {
            cli::show::run(
                &config,
                ShowArgs {
                    name: &name,
                    step: step.as_deref(),
                    complete,
                    offset,
                },
            )
            .await?;
        }
        Commands::Config => cli::config::print(&config)?,
    }

    Ok(())
}
