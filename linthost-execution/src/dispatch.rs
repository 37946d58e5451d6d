//! Choosing which dispatcher a worker is launched with

use linthost_engine::FLAT_CONFIG_FILE;
use linthost_ipc::{DispatcherVariant, Prerequisite};
use std::collections::HashMap;

/// Maps (engine major version, uses flat config) to a dispatcher.
///
/// Versions with no entry get the fallback, so an engine that is too old
/// still gets a worker: it answers `debug` and rejects everything else with
/// an incompatible-version error.
#[derive(Debug, Clone)]
pub struct DispatcherRegistry {
    entries: HashMap<(u64, bool), DispatcherVariant>,
    fallback: DispatcherVariant,
}

impl Default for DispatcherRegistry {
    fn default() -> Self {
        let mut registry = Self::empty(DispatcherVariant::Modern);
        registry.insert(8, false, DispatcherVariant::V8);
        registry.insert(8, true, DispatcherVariant::V8Flat);
        registry
    }
}

impl DispatcherRegistry {
    pub fn empty(fallback: DispatcherVariant) -> Self {
        Self {
            entries: HashMap::new(),
            fallback,
        }
    }

    pub fn insert(&mut self, major: u64, flat_config: bool, variant: DispatcherVariant) {
        self.entries.insert((major, flat_config), variant);
    }

    pub fn lookup(&self, major: Option<u64>, flat_config: bool) -> DispatcherVariant {
        major
            .and_then(|major| self.entries.get(&(major, flat_config)))
            .copied()
            .unwrap_or(self.fallback)
    }

    pub fn select(&self, prerequisite: &Prerequisite) -> DispatcherVariant {
        self.lookup(
            prerequisite.engine_major_version(),
            uses_flat_config(prerequisite),
        )
    }
}

fn uses_flat_config(prerequisite: &Prerequisite) -> bool {
    prerequisite
        .engine_config
        .as_ref()
        .and_then(|path| path.file_name())
        .is_some_and(|name| name == FLAT_CONFIG_FILE)
}
