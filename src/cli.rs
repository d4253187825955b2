use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::client::Client;
use crate::config::Config;
use crate::listing::{format_size, FileRecord};

/// CLI for cloudpull: drive an external cloud-storage tool to list,
/// download and report quota.
#[derive(Parser)]
#[clap(
    name = "cloudpull",
    version,
    about = "Front end for an external cloud-storage CLI: list files, download content, report quota"
)]
pub struct Cli {
    /// Pass --debug through to the external tool
    #[clap(long, global = true)]
    pub debug: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List files and directories
    Ls {
        /// Remote directory path
        #[clap(long, default_value = "/")]
        path: String,
        /// Long format display
        #[clap(short, long)]
        long: bool,
        /// Human readable sizes
        #[clap(short = 'H', long)]
        human: bool,
    },
    /// Download a file or folder
    Download {
        /// Remote path to download
        #[clap(long, default_value = "/")]
        path: String,
        /// Local output directory
        #[clap(long, default_value = "./downloads")]
        output: PathBuf,
        /// Initial download concurrency
        #[clap(long, default_value_t = 3)]
        count: usize,
        /// Suppress the periodic progress statistics
        #[clap(long)]
        no_progress: bool,
    },
    /// Show cloud storage quota
    Quota {
        /// Print raw byte counts instead of human readable sizes
        #[clap(long)]
        raw: bool,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env();
    let mut client = Client::from_env();
    client.set_debug(cli.debug);

    match cli.command {
        Commands::Ls { path, long, human } => {
            client
                .check_config(&config)
                .await
                .context("configuration check failed")?;
            let files = client.list_files(&path, long, human).await?;
            print_files(&files, long, human);
        }
        Commands::Download {
            path,
            output,
            count,
            no_progress,
        } => {
            client
                .check_config(&config)
                .await
                .context("configuration check failed")?;
            println!("Starting download: {path}");
            println!("Output directory: {}", output.display());
            client.download(&path, &output, count, !no_progress).await?;
            print_metrics(&client);
        }
        Commands::Quota { raw } => {
            client
                .check_config(&config)
                .await
                .context("configuration check failed")?;
            let quota = client.quota().await?;
            println!("Cloud storage quota:");
            println!("  Total: {}", format_size(quota.total, !raw));
            println!("  Used:  {}", format_size(quota.used, !raw));
            if let Some(ratio) = quota.usage_ratio() {
                println!("  Usage: {:.1}%", ratio * 100.0);
            }
        }
    }

    Ok(())
}

fn print_files(files: &[FileRecord], long_format: bool, human: bool) {
    if files.is_empty() {
        println!("Directory is empty");
        return;
    }

    if long_format {
        println!("{:<10} {:<12} {}", "Type", "Size", "Name");
        println!("{}", "-".repeat(50));
        for file in files {
            println!(
                "{:<10} {:<12} {}",
                file.kind,
                format_size(file.size, human),
                file.name
            );
        }
    } else {
        for file in files {
            println!("{:<10} {}", file.kind, file.name);
        }
    }
}

fn print_metrics<I: crate::contract::Invoke>(client: &Client<I>) {
    let snapshot = client.metrics_snapshot();
    let stats = client.download_stats();
    println!("Performance:");
    println!("  Operations: {}", snapshot.operations);
    println!("  Errors:     {}", snapshot.errors);
    if let Some(average) = snapshot.average_duration {
        println!("  Average:    {average:?}");
    }
    println!("  Completed downloads: {}", stats.completed);
    println!("  Concurrency level:   {}", stats.concurrency);
}
