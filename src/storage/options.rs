use std::fmt;

use serde::{Deserialize, Serialize};

/// SQLite `synchronous` pragma levels.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Synchronous {
    /// Sync on every commit.
    #[default]
    Full,
    /// Sync at WAL checkpoints only.
    Normal,
    /// Leave syncing to the OS.
    Off,
}

impl Synchronous {
    pub(crate) fn pragma_value(self) -> &'static str {
        match self {
            Synchronous::Full => "FULL",
            Synchronous::Normal => "NORMAL",
            Synchronous::Off => "OFF",
        }
    }
}

impl fmt::Display for Synchronous {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Synchronous::Full => "full",
            Synchronous::Normal => "normal",
            Synchronous::Off => "off",
        })
    }
}

/// Options used when opening an on-disk store.
#[derive(Clone, Debug, Default)]
pub struct StoreOptions {
    /// Whether to create the database if it doesn't exist.
    pub create_if_missing: bool,
    /// Durability level for committed batches.
    pub synchronous: Synchronous,
}

impl StoreOptions {
    /// Options that create the database when missing.
    pub fn create() -> Self {
        Self {
            create_if_missing: true,
            ..Self::default()
        }
    }

    /// Sets the durability level.
    pub fn synchronous(mut self, synchronous: Synchronous) -> Self {
        self.synchronous = synchronous;
        self
    }
}
