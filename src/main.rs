//! hiveforgectl - hiveforge client.
//!
//! Usage:
//!   hiveforgectl hash <DIR>                 Hash a directory and submit the result
//!   hiveforgectl hash <DIR> --no-submit     Hash and write the result file only
//!   hiveforgectl -d hash <DIR>              Same, with debug logging
//!   hiveforgectl --help                     Show help

mod config;
mod credential;
mod payload;
mod submit;

use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result, eyre};
use humansize::{DECIMAL, format_size};
use tracing_subscriber::EnvFilter;

use hiveforge_core::{HashConfig, HashRunSummary};
use hiveforge_scan::{DirectoryHasher, ProgressRender, ProgressSnapshot, summary_text};

use crate::config::ClientConfig;
use crate::credential::Credential;
use crate::submit::Submitter;

#[derive(Parser)]
#[command(
    name = "hiveforgectl",
    version,
    about = "Fingerprint directories with content-defined chunking",
    long_about = "hiveforgectl walks a directory, splits every file into content-defined \
                  chunks, hashes them with BLAKE3 and submits the result tree to the \
                  hiveforge API."
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Hash a directory tree
    Hash {
        /// Directory to hash
        dir: PathBuf,

        /// Where to write the JSON result
        #[arg(short, long, default_value = "hash_result.json")]
        output: PathBuf,

        /// Skip uploading the result
        #[arg(long)]
        no_submit: bool,

        /// Overall time limit in minutes
        #[arg(long, value_name = "MINUTES", default_value = "30")]
        timeout: u64,

        /// Skip the initial file count
        #[arg(long)]
        no_prescan: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    match cli.command {
        Command::Hash {
            dir,
            output,
            no_submit,
            timeout,
            no_prescan,
        } => {
            let client = if no_submit {
                None
            } else {
                Some(ClientConfig::load()?)
            };
            let debug = cli.debug || client.as_ref().is_some_and(|c| c.debug);
            init_tracing(debug);

            let hash_config = HashConfig::builder()
                .root(dir)
                .run_timeout(Duration::from_secs(timeout.saturating_mul(60)))
                .prescan(!no_prescan)
                .build()
                .map_err(|e| eyre!("Invalid options: {e}"))?;

            run_hash(hash_config, &output, client.as_ref()).await
        }
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

async fn run_hash(
    config: HashConfig,
    output: &Path,
    client: Option<&ClientConfig>,
) -> Result<()> {
    eprintln!("Hashing {}...", config.root.display());

    let hasher = DirectoryHasher::new(config);
    let summary = match hasher.run(TerminalRender::new()).await {
        Ok(summary) => summary,
        Err(err) => {
            if let Some(partial) = err.partial() {
                print_summary(partial);
                write_result(partial, output)?;
                eprintln!("Partial result written to {}", output.display());
            }
            return Err(err).wrap_err("Error hashing directory");
        }
    };

    print_summary(&summary);
    write_result(&summary, output)?;
    println!("Result written to {}", output.display());

    if let Some(client) = client {
        let credential_path = Credential::default_path()
            .ok_or_else(|| eyre!("Cannot locate home directory for the credential"))?;
        Submitter::new(client, credential_path)?
            .submit(&summary)
            .await
            .wrap_err("Error sending hash result to API")?;
        println!("Hash result successfully sent");
    }

    Ok(())
}

fn print_summary(summary: &HashRunSummary) {
    println!();
    println!("{}", "─".repeat(60));
    print!("{}", summary_text(summary));
    println!("{}", "─".repeat(60));
}

fn write_result(summary: &HashRunSummary, output: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(output, json).wrap_err_with(|| format!("Failed to write {}", output.display()))
}

/// Redraws the progress block in place on stderr.
struct TerminalRender {
    last_lines: usize,
    enabled: bool,
}

impl TerminalRender {
    fn new() -> Self {
        Self {
            last_lines: 0,
            enabled: io::stderr().is_terminal(),
        }
    }

    fn clear(&mut self, out: &mut impl Write) {
        if self.last_lines > 0 {
            let _ = write!(out, "\x1b[{}A\x1b[J", self.last_lines);
            self.last_lines = 0;
        }
    }
}

impl ProgressRender for TerminalRender {
    fn render(&mut self, snapshot: &ProgressSnapshot) {
        if !self.enabled {
            return;
        }
        let mut out = io::stderr().lock();
        self.clear(&mut out);

        let lines = snapshot.render_lines();
        for line in &lines {
            let _ = writeln!(out, "{line}");
        }
        self.last_lines = lines.len();
        let _ = out.flush();
    }

    fn finish(&mut self, snapshot: &ProgressSnapshot) {
        if self.enabled {
            let mut out = io::stderr().lock();
            self.clear(&mut out);
            let _ = out.flush();
        } else {
            eprintln!(
                "Processed {} files ({})",
                snapshot.files_processed,
                format_size(snapshot.bytes_processed, DECIMAL)
            );
        }
    }
}
