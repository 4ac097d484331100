//! Configuration for a [`Library`](crate::Library).

use serde::{Deserialize, Serialize};

fn default_name() -> String {
    "library".to_string()
}

/// Settings applied when a library is constructed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Name used in log output and lock diagnostics
    #[serde(default = "default_name")]
    pub name: String,

    /// Seed for the random source behind `randomly_fill` and
    /// `try_borrow_random`. `None` seeds from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            seed: None,
        }
    }
}

impl LibraryConfig {
    /// Config with the given name and no fixed seed
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Fix the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
