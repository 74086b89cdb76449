use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::runes::{Runes, checked_block_bytes};
use crate::store::{MemorySlots, ScratchFile, Slots};

/// Block size, in runes, used when nothing else is configured.
pub const DEFAULT_RUNE_BLOCK_SIZE: usize = 4096;

/// Largest block size, in runes, that [`StoreOptions::open`] accepts.
pub const MAX_RUNE_BLOCK_SIZE: usize = 1 << 24;

/// Where block slots live.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backing {
    #[default]
    Memory,
    Scratch,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    pub block_size: Option<usize>,
    pub backing: Option<Backing>,
    pub scratch_dir: Option<PathBuf>,
    pub stats: bool,
    pub perf: bool,
}

impl ConfigFlags {
    pub fn union(&self, other: &Self) -> Self {
        Self {
            block_size: other.block_size.or(self.block_size),
            backing: other.backing.or(self.backing),
            scratch_dir: other
                .scratch_dir
                .clone()
                .or_else(|| self.scratch_dir.clone()),
            stats: self.stats || other.stats,
            perf: self.perf || other.perf,
        }
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            block_size: self.block_size.unwrap_or(DEFAULT_RUNE_BLOCK_SIZE),
            backing: self.backing.unwrap_or_default(),
            scratch_dir: self.scratch_dir.clone(),
        }
    }
}

/// How to build a rune buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Runes per block.
    pub block_size: usize,
    pub backing: Backing,
    /// Directory for the scratch file; the system temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_RUNE_BLOCK_SIZE,
            backing: Backing::Memory,
            scratch_dir: None,
        }
    }
}

impl StoreOptions {
    /// Create an empty rune buffer with the configured backing. A block size
    /// of zero selects the default, as [`Runes::new`] does.
    ///
    /// # Errors
    /// Returns [`io::ErrorKind::InvalidInput`] if the block size exceeds
    /// [`MAX_RUNE_BLOCK_SIZE`], or an error if a scratch file cannot be created.
    pub fn open(&self) -> io::Result<Runes<Box<dyn Slots>>> {
        let capacity = Some(self.block_size)
            .filter(|&n| n <= MAX_RUNE_BLOCK_SIZE)
            .and_then(checked_block_bytes)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!(
                        "block size {} exceeds {MAX_RUNE_BLOCK_SIZE} runes",
                        self.block_size
                    ),
                )
            })?;
        let slots: Box<dyn Slots> = match (self.backing, &self.scratch_dir) {
            (Backing::Memory, _) => Box::new(MemorySlots::new(capacity)),
            (Backing::Scratch, None) => Box::new(ScratchFile::new(capacity)?),
            (Backing::Scratch, Some(dir)) => Box::new(ScratchFile::in_dir(capacity, dir)?),
        };
        Ok(Runes::with_slots(slots))
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("runebuf").join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("runebuf")
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("runebuf").join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config").join("runebuf").join("config");
        }
    }

    PathBuf::from(".runebufrc")
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".runebufrc")
}

pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split_whitespace().map(ToOwned::to_owned))
        .collect::<Vec<_>>();
    Ok(parse_flag_tokens(&tokens))
}

pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = Vec::new();
    lines.push("# runebuf defaults (saved with --save)".to_string());
    if let Some(size) = flags.block_size {
        lines.push(format!("--block-size {size}"));
    }
    if let Some(backing) = flags.backing {
        let backing_str = match backing {
            Backing::Memory => "memory",
            Backing::Scratch => "scratch",
        };
        lines.push(format!("--backing {backing_str}"));
    }
    if let Some(dir) = &flags.scratch_dir {
        lines.push(format!("--scratch-dir {}", dir.display()));
    }
    if flags.stats {
        lines.push("--stats".to_string());
    }
    if flags.perf {
        lines.push("--perf".to_string());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Pick the persistable flags out of a command line or config file.
///
/// Unknown tokens and malformed values are ignored.
pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        if token == "--stats" {
            flags.stats = true;
        } else if token == "--perf" {
            flags.perf = true;
        } else if token == "--block-size" {
            if let Some(next) = tokens.get(i + 1) {
                flags.block_size = parse_block_size(next);
                i += 1;
            }
        } else if let Some(value) = token.strip_prefix("--block-size=") {
            flags.block_size = parse_block_size(value);
        } else if token == "--backing" {
            if let Some(next) = tokens.get(i + 1) {
                flags.backing = parse_backing(next);
                i += 1;
            }
        } else if let Some(value) = token.strip_prefix("--backing=") {
            flags.backing = parse_backing(value);
        } else if token == "--scratch-dir" {
            if let Some(next) = tokens.get(i + 1) {
                flags.scratch_dir = Some(PathBuf::from(next));
                i += 1;
            }
        } else if let Some(value) = token.strip_prefix("--scratch-dir=") {
            flags.scratch_dir = Some(PathBuf::from(value));
        }
        i += 1;
    }
    flags
}

fn parse_block_size(s: &str) -> Option<usize> {
    s.parse().ok().filter(|&n| n > 0)
}

fn parse_backing(s: &str) -> Option<Backing> {
    match s {
        "memory" => Some(Backing::Memory),
        "scratch" => Some(Backing::Scratch),
        _ => None,
    }
}
