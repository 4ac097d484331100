//! `milky inspect`: grow a library and print its slots.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use milky_pool::{Library, LibraryConfig};

use crate::config::FillStrategy;
use crate::items;

/// Arguments for the inspect command
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// File with one item per line
    #[clap(long)]
    pub items: PathBuf,

    /// Growth strategy
    #[clap(long, value_enum, default_value_t = FillStrategy::None)]
    pub fill: FillStrategy,

    /// Pool size to grow to
    #[clap(long)]
    pub target: Option<usize>,

    /// Seed for random growth
    #[clap(long)]
    pub seed: Option<u64>,
}

/// Build the library described by `args` and render its slots
pub fn execute(args: &InspectArgs) -> Result<String> {
    let values = items::load(&args.items)?;

    let mut config = LibraryConfig::named("inspect");
    config.seed = args.seed;

    let library = Library::with_config(config);
    library.replace(values);

    let target = args.target.unwrap_or_else(|| library.len());
    args.fill
        .apply(&library, target)
        .with_context(|| format!("Cannot grow {} to {} slots", args.items.display(), target))?;

    let mut out = String::new();
    for slot in library.snapshot() {
        out.push_str(&format!("{}\t{}\n", slot.key(), slot.value()));
    }
    out.push_str(&format!("total: {}\n", library.len()));

    Ok(out)
}
