//! `milky simulate`: run worker threads against a shared library.
//!
//! Each worker repeatedly borrows a slot, holds it for a while and returns it.
//! Borrowing never blocks, so workers that find nothing free back off and
//! poll again.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use log::{debug, info};
use milky_pool::{Library, LibraryError, LockStats, Slot};

use crate::config::{BorrowStrategy, FillStrategy, SimulationConfig};
use crate::items;

/// Arguments for the simulate command
#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// File with one item per line
    #[clap(long)]
    pub items: PathBuf,

    /// TOML file with simulation settings
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Number of worker threads
    #[clap(long)]
    pub workers: Option<usize>,

    /// Borrow/use/return cycles per worker
    #[clap(long)]
    pub rounds: Option<usize>,

    /// Pool size to grow to (defaults to the worker count)
    #[clap(long)]
    pub target: Option<usize>,

    /// Growth strategy
    #[clap(long, value_enum)]
    pub fill: Option<FillStrategy>,

    /// Borrow strategy
    #[clap(long, value_enum)]
    pub borrow: Option<BorrowStrategy>,

    /// How long each worker holds a slot (milliseconds)
    #[clap(long)]
    pub hold_ms: Option<u64>,

    /// Seed for the library's random source
    #[clap(long)]
    pub seed: Option<u64>,
}

impl SimulateArgs {
    /// Settings from the config file, overridden by command-line flags
    pub fn resolve(&self) -> Result<SimulationConfig> {
        let mut config = match &self.config {
            Some(path) => SimulationConfig::load(path)?,
            None => SimulationConfig::default(),
        };

        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(rounds) = self.rounds {
            config.rounds = rounds;
        }
        if self.target.is_some() {
            config.target = self.target;
        }
        if let Some(fill) = self.fill {
            config.fill = fill;
        }
        if let Some(borrow) = self.borrow {
            config.borrow = borrow;
        }
        if let Some(hold_ms) = self.hold_ms {
            config.hold_ms = hold_ms;
        }
        if self.seed.is_some() {
            config.library.seed = self.seed;
        }

        Ok(config)
    }
}

/// Outcome of a simulation run
#[derive(Debug)]
pub struct SimulationReport {
    /// Final slot list
    pub slots: Vec<Slot<String>>,

    /// Number of completed cycles per slot key
    pub uses: BTreeMap<usize, usize>,

    /// Lock statistics for the run
    pub lock: LockStats,

    /// Wall-clock duration of the worker phase
    pub elapsed: Duration,
}

impl SimulationReport {
    /// Total completed cycles
    pub fn total_uses(&self) -> usize {
        self.uses.values().sum()
    }

    /// Human-readable summary
    pub fn render(&self) -> String {
        let mut out = String::from("key\tvalue\tuses\n");
        for slot in &self.slots {
            let uses = self.uses.get(&slot.key()).copied().unwrap_or(0);
            out.push_str(&format!("{}\t{}\t{}\n", slot.key(), slot.value(), uses));
        }
        out.push_str(&format!("slots: {}\n", self.slots.len()));
        out.push_str(&format!("total uses: {}\n", self.total_uses()));
        out.push_str(&format!(
            "lock acquisitions: {} (contention {:.2})\n",
            self.lock.acquisitions,
            self.lock.contention_factor()
        ));
        out.push_str(&format!("elapsed: {:.2?}\n", self.elapsed));
        out
    }
}

fn borrow(library: &Library<String>, strategy: BorrowStrategy) -> Option<Slot<String>> {
    match strategy {
        BorrowStrategy::First => library.try_borrow_first(),
        BorrowStrategy::Random => library.try_borrow_random(),
    }
}

fn worker(library: &Library<String>, config: &SimulationConfig) -> Vec<usize> {
    let hold = Duration::from_millis(config.hold_ms);
    let backoff = Duration::from_micros(config.backoff_us);
    let mut used = Vec::with_capacity(config.rounds);

    while used.len() < config.rounds {
        let Some(slot) = borrow(library, config.borrow) else {
            thread::sleep(backoff);
            continue;
        };

        thread::sleep(hold);
        used.push(slot.key());
        library.return_slot(&slot);
    }

    used
}

/// Run the simulation described by `config` over `values`
pub fn run(values: Vec<String>, config: &SimulationConfig) -> Result<SimulationReport> {
    if config.workers == 0 {
        bail!("At least one worker is required");
    }

    let library = Library::with_config(config.library.clone());
    library.replace(values);

    // With nothing to borrow, workers would poll forever.
    if library.is_empty() {
        return Err(LibraryError::Empty).context("No items to simulate with");
    }

    config
        .fill
        .apply(&library, config.target())
        .context("Cannot grow the library")?;

    info!(
        "Simulating {} workers x {} rounds over {} slots",
        config.workers,
        config.rounds,
        library.len()
    );

    let started = Instant::now();
    let mut uses = BTreeMap::new();

    let shared = &library;
    thread::scope(|scope| -> Result<()> {
        let handles: Vec<_> = (0..config.workers)
            .map(|_| scope.spawn(move || worker(shared, config)))
            .collect();

        for handle in handles {
            let keys = handle
                .join()
                .map_err(|_| anyhow!("Worker thread panicked"))?;
            for key in keys {
                *uses.entry(key).or_insert(0) += 1;
            }
        }

        Ok(())
    })?;

    let elapsed = started.elapsed();
    debug!("Simulation finished in {:.2?}", elapsed);

    Ok(SimulationReport {
        slots: library.snapshot(),
        uses,
        lock: library.lock_stats(),
        elapsed,
    })
}

/// Entry point for `milky simulate`
pub fn execute(args: &SimulateArgs) -> Result<String> {
    let config = args.resolve()?;
    let values = items::load(&args.items)?;

    Ok(run(values, &config)?.render())
}

#[cfg(test)]
mod tests {
    use super::*;
    use milky_pool::LibraryConfig;

    fn config(workers: usize, rounds: usize) -> SimulationConfig {
        SimulationConfig {
            workers,
            rounds,
            hold_ms: 0,
            backoff_us: 10,
            library: LibraryConfig::named("test").with_seed(3),
            ..SimulationConfig::default()
        }
    }

    fn values() -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    #[test]
    fn test_every_round_completes() {
        let report = run(values(), &config(6, 20)).unwrap();

        assert_eq!(report.total_uses(), 120);
        assert_eq!(report.slots.len(), 6);
    }

    #[test]
    fn test_random_fill_and_borrow() {
        let mut config = config(4, 10);
        config.fill = FillStrategy::Random;
        config.borrow = BorrowStrategy::Random;
        config.target = Some(5);

        let report = run(values(), &config).unwrap();

        assert_eq!(report.slots.len(), 5);
        assert_eq!(report.total_uses(), 40);
    }

    #[test]
    fn test_more_workers_than_slots() {
        let mut config = config(8, 5);
        config.fill = FillStrategy::None;

        let report = run(values(), &config).unwrap();

        assert_eq!(report.slots.len(), 2);
        assert_eq!(report.total_uses(), 40);
    }

    #[test]
    fn test_empty_items_fail() {
        let err = run(Vec::new(), &config(2, 1)).unwrap_err();
        assert!(format!("{:#}", err).contains("library contains 0 items"));
    }

    #[test]
    fn test_empty_items_fail_without_fill() {
        let mut config = config(2, 1);
        config.fill = FillStrategy::None;

        let err = run(Vec::new(), &config).unwrap_err();
        assert!(format!("{:#}", err).contains("library contains 0 items"));
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(run(values(), &config(0, 1)).is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let args = SimulateArgs {
            items: PathBuf::from("items.txt"),
            config: None,
            workers: Some(3),
            rounds: None,
            target: Some(9),
            fill: Some(FillStrategy::Random),
            borrow: None,
            hold_ms: None,
            seed: Some(11),
        };

        let config = args.resolve().unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.rounds, 10);
        assert_eq!(config.target(), 9);
        assert_eq!(config.fill, FillStrategy::Random);
        assert_eq!(config.library.seed, Some(11));
    }
}
