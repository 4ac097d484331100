//! Simulation settings, read from an optional TOML file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use milky_pool::{Library, LibraryConfig, LibraryError};
use serde::{Deserialize, Serialize};

/// How the pool is grown before workers start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FillStrategy {
    /// Leave the pool at the size of the item list
    None,

    /// Duplicate values in index order
    #[default]
    Ordered,

    /// Duplicate values in shuffled passes
    Random,
}

impl FillStrategy {
    /// Grow `library` to `target` slots with this strategy
    pub fn apply<T>(self, library: &Library<T>, target: usize) -> Result<(), LibraryError> {
        match self {
            Self::None => Ok(()),
            Self::Ordered => library.fill(target),
            Self::Random => library.randomly_fill(target),
        }
    }
}

/// Which free slot a worker receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BorrowStrategy {
    /// Lowest free key
    #[default]
    First,

    /// Uniformly random free slot
    Random,
}

fn default_workers() -> usize {
    4
}

fn default_rounds() -> usize {
    10
}

fn default_hold_ms() -> u64 {
    1
}

fn default_backoff_us() -> u64 {
    200
}

/// Settings for `milky simulate`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Borrow/use/return cycles per worker
    #[serde(default = "default_rounds")]
    pub rounds: usize,

    /// Pool size to grow to; defaults to the worker count
    #[serde(default)]
    pub target: Option<usize>,

    /// Growth strategy
    #[serde(default)]
    pub fill: FillStrategy,

    /// Borrow strategy
    #[serde(default)]
    pub borrow: BorrowStrategy,

    /// How long a worker holds a slot (milliseconds)
    #[serde(default = "default_hold_ms")]
    pub hold_ms: u64,

    /// Pause between borrow attempts when nothing is free (microseconds)
    #[serde(default = "default_backoff_us")]
    pub backoff_us: u64,

    /// Library settings
    #[serde(default)]
    pub library: LibraryConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            rounds: default_rounds(),
            target: None,
            fill: FillStrategy::default(),
            borrow: BorrowStrategy::default(),
            hold_ms: default_hold_ms(),
            backoff_us: default_backoff_us(),
            library: LibraryConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;

        toml::from_str(&text).with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Pool size the simulation grows to
    pub fn target(&self) -> usize {
        self.target.unwrap_or(self.workers)
    }
}
