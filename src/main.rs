use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use tailcast::{DeliveryError, Settings, Subscriber, TailService};

#[derive(Parser)]
#[command(name = "tailcast")]
#[command(about = "Follow the tail of growing files under a configured root")]
struct Cli {
    /// Settings file to use instead of the discovered one
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default settings file
    Init {
        /// Overwrite an existing settings file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration
    Config,

    /// Follow files under the root, printing lines to stdout
    Follow {
        /// File names, resolved under the configured root
        names: Vec<String>,

        /// History lines to replay per file (overrides config)
        #[arg(short, long)]
        lines: Option<usize>,
    },
}

/// Stdout printer; with several files each line carries its source name.
struct StdoutSubscriber {
    prefix: Option<String>,
}

impl Subscriber for StdoutSubscriber {
    fn deliver(&mut self, line: &[u8]) -> Result<(), DeliveryError> {
        let mut out = std::io::stdout().lock();
        if let Some(prefix) = &self.prefix {
            write!(out, "{prefix}: ")?;
        }
        out.write_all(line)?;
        out.write_all(b"\n")?;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .map_err(|e| anyhow::anyhow!("failed to load settings: {e}"))?;

    tailcast::logging::init(&settings.logging);

    match cli.command {
        Commands::Init { force } => init_settings(force),
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&settings)?);
            Ok(())
        }
        Commands::Follow { names, lines } => follow(settings, names, lines).await,
    }
}

fn init_settings(force: bool) -> Result<()> {
    let path = Settings::config_path();
    if path.exists() && !force {
        anyhow::bail!("{} already exists, use --force to overwrite", path.display());
    }
    Settings::default()
        .save(&path)
        .map_err(|e| anyhow::anyhow!("cannot write {}: {e}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}

async fn follow(mut settings: Settings, names: Vec<String>, lines: Option<usize>) -> Result<()> {
    anyhow::ensure!(!names.is_empty(), "no file names given");
    if let Some(lines) = lines {
        settings.tail.init_lines = lines;
    }

    let (service, handle) = TailService::builder()
        .root(settings.root.clone())
        .config(settings.tail.clone())
        .build()?;
    let service_task = tokio::spawn(service.run());

    let label = names.len() > 1;
    for name in &names {
        let subscriber = StdoutSubscriber {
            prefix: label.then(|| name.clone()),
        };
        handle
            .attach(name, subscriber)
            .await
            .with_context(|| format!("cannot follow {name}"))?;
    }

    tokio::signal::ctrl_c().await?;
    handle.shutdown().await;
    let _ = service_task.await;
    Ok(())
}
