//! Runebuf - load text into a block-list rune buffer, edit it, write it out.
//!
//! # Usage
//!
//! ```bash
//! runebuf notes.txt --put 0:"# Title\n" --output notes.txt
//! cat big.log | runebuf --backing scratch --stats > /dev/null
//! runebuf --block-size 64 --save
//! ```

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use runebuf::config::{
    Backing, ConfigFlags, clear_config_flags, global_config_path, load_config_flags,
    local_override_path, parse_flag_tokens, save_config_flags,
};
use runebuf::perf;
use runebuf::splice::Splice;

/// Load text into a block-list rune buffer, apply edits, and write it back out
#[derive(Parser, Debug)]
#[command(name = "runebuf", version, about, long_about = None)]
struct Cli {
    /// Text file to load (stdin when omitted or "-")
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Replace runes FROM..TO with TEXT ("FROM,TO:TEXT" or "AT:TEXT"); repeatable
    #[arg(long = "put", value_name = "EDIT")]
    puts: Vec<Splice>,

    /// Write the result here instead of stdout
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Runes per storage block
    #[arg(long, value_name = "N")]
    block_size: Option<usize>,

    /// Where storage blocks live
    #[arg(long, value_enum)]
    backing: Option<Backing>,

    /// Directory for the scratch file
    #[arg(long, value_name = "DIR")]
    scratch_dir: Option<PathBuf>,

    /// Print block statistics to stderr
    #[arg(long)]
    stats: bool,

    /// Print phase timings to stderr
    #[arg(long)]
    perf: bool,

    /// Save current command-line flags as defaults in .runebufrc
    #[arg(long)]
    save: bool,

    /// Clear saved defaults in .runebufrc
    #[arg(long)]
    clear: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(&raw_args);

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
        if cli.file.is_none() && cli.puts.is_empty() {
            return Ok(());
        }
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags);
    perf::set_enabled(effective.perf);

    let options = effective.store_options();
    tracing::debug!(?options, "opening buffer");
    let mut runes = options.open().context("Failed to create buffer")?;

    {
        let mut scope = perf::scope("load");
        let consumed = match cli.file.as_deref() {
            Some(path) if path.as_os_str() != "-" => {
                let file = File::open(path)
                    .with_context(|| format!("Failed to open {}", path.display()))?;
                runes
                    .read_from(file)
                    .with_context(|| format!("Failed to read {}", path.display()))?
            }
            _ => runes.read_from(io::stdin().lock()).context("Failed to read stdin")?,
        };
        scope.set_bytes(consumed);
    }

    {
        let _scope = perf::scope("edit");
        for put in &cli.puts {
            put.apply(&mut runes)
                .with_context(|| format!("Failed to apply edit at {}", put.at))?;
        }
    }

    {
        let mut scope = perf::scope("save");
        let written = match &cli.output {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                runes.write_to(BufWriter::new(file))
            }
            None => runes.write_to(BufWriter::new(io::stdout().lock())),
        }
        .context("Failed to write output")?;
        scope.set_bytes(written);
    }

    if effective.stats {
        eprintln!("{}", runes.stats());
    }

    runes.close().context("Failed to release buffer")
}
