//! urlfs binary entry point
//!
//! Small command-line front end over the URL dispatch layer, built with the
//! `cli` feature.
//!
//! ```bash
//! urlfs cat file:///etc/hostname
//! urlfs cat --limit 512 file:///var/log/syslog
//! echo hello | urlfs put file:///tmp/greeting.txt
//! urlfs --timeout 2000 ls file:///tmp
//! urlfs watch file:///tmp/greeting.txt
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::AsyncWriteExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use urlfs::{
    to_io_reader, to_io_writer, BoxReadCloser, BoxWriteCloser, Context, FileWatchFn,
    ReadCloserExt, Registry, UrlfsConfig,
};

#[derive(Parser)]
#[command(name = "urlfs", version, about = "Read, write, list and watch objects by URL")]
struct Cli {
    /// JSON configuration file
    #[arg(long, env = "URLFS_CONFIG")]
    config: Option<PathBuf>,

    /// Deadline for the operation in milliseconds (overrides the config)
    #[arg(long)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Copy an object to stdout
    Cat {
        url: Url,

        /// Stop after this many bytes
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Replace an object with stdin
    Put { url: Url },
    /// Append stdin to an object
    Append { url: Url },
    /// List the entries beneath a URL
    Ls { url: Url },
    /// Delete an object
    Rm { url: Url },
    /// Print a line for every change of an object until interrupted
    Watch { url: Url },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "urlfs=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => UrlfsConfig::load(path)?,
        None => UrlfsConfig::default(),
    };
    let registry = Registry::from_config(&config)?;

    let timeout = cli
        .timeout
        .map(Duration::from_millis)
        .or(config.default_timeout);
    let ctx = match timeout {
        Some(timeout) => Context::background().with_timeout(timeout),
        None => Context::background(),
    };

    match cli.command {
        Command::Cat { url, limit } => {
            let reader = registry.open_reader(&ctx, &url).await?;
            let reader: BoxReadCloser = match limit {
                Some(limit) => Box::new(reader.take(limit)),
                None => reader,
            };
            let mut reader = to_io_reader(reader);
            let mut stdout = tokio::io::stdout();
            tokio::io::copy(&mut reader, &mut stdout).await?;
            stdout.flush().await?;
            reader.close().await?;
        }
        Command::Put { url } => {
            let writer = registry.open_writer(&ctx, &url).await?;
            copy_stdin(writer).await?;
        }
        Command::Append { url } => {
            let writer = registry.open_appender(&ctx, &url).await?;
            copy_stdin(writer).await?;
        }
        Command::Ls { url } => {
            for entry in registry.list_entries(&ctx, &url).await? {
                println!("{}", entry);
            }
        }
        Command::Rm { url } => {
            registry.remove(&ctx, &url).await?;
        }
        Command::Watch { url } => {
            // Only the notification matters; the fresh reader is dropped unread.
            let watcher: FileWatchFn = Arc::new(|changed: Url, _contents: BoxReadCloser| {
                println!("changed: {}", changed);
            });
            let mut watch = registry.watch_file(&ctx, &url, watcher).await?;
            tracing::info!(%url, "Watching, press Ctrl-C to stop");

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    err = watch.errors().recv() => match err {
                        Some(err) => eprintln!("watch error: {}", err),
                        None => break,
                    },
                }
            }
            watch.cancel()?;
        }
    }

    Ok(())
}

async fn copy_stdin(writer: BoxWriteCloser) -> std::io::Result<()> {
    let mut writer = to_io_writer(writer);
    let mut stdin = tokio::io::stdin();
    tokio::io::copy(&mut stdin, &mut writer).await?;
    writer.shutdown().await
}
