//! Loading item lists.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;

/// Read one item per line, skipping blank lines and `#` comments
pub fn load(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read items from {}", path.display()))?;

    let items: Vec<String> = parse(&text);
    debug!("Loaded {} items from {}", items.len(), path.display());

    Ok(items)
}

fn parse(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}
