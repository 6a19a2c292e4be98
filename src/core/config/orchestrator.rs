use crate::core::config::data::Config;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};
use std::time::SystemTime;

#[derive(Default)]
pub(crate) struct ConfigCacheState {
    config: Option<Config>,
    modified: Option<SystemTime>,
}

/// Caches the on-disk config and reloads it when the file's mtime moves.
pub(crate) struct ConfigOrchestrator {
    path: PathBuf,
    state: Mutex<ConfigCacheState>,
}

pub(crate) static CONFIG_ORCHESTRATOR: LazyLock<ConfigOrchestrator> =
    LazyLock::new(|| ConfigOrchestrator::new(Config::get_config_path()));

#[cfg(test)]
pub(crate) static TEST_ORCHESTRATOR: LazyLock<Mutex<Option<ConfigOrchestrator>>> =
    LazyLock::new(|| Mutex::new(None));

impl ConfigOrchestrator {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self {
            path,
            state: Mutex::new(ConfigCacheState::default()),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    fn refresh(&self, state: &mut ConfigCacheState) -> Result<Config, Box<dyn std::error::Error>> {
        let disk_modified = Self::modified_time(&self.path);
        if state.config.is_none() || state.modified != disk_modified {
            let config = Config::load_from_path(&self.path)?;
            state.modified = disk_modified;
            state.config = Some(config);
        }
        Ok(state.config.clone().unwrap_or_default())
    }

    pub(crate) fn load_with_cache(&self) -> Result<Config, Box<dyn std::error::Error>> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.refresh(&mut state)
    }

    pub(crate) fn persist(&self, config: Config) -> Result<(), Box<dyn std::error::Error>> {
        config.save_to_path(&self.path)?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.modified = Self::modified_time(&self.path);
        state.config = Some(config);
        Ok(())
    }

    pub(crate) fn mutate<F, T>(&self, mutator: F) -> Result<T, Box<dyn std::error::Error>>
    where
        F: FnOnce(&mut Config) -> Result<T, Box<dyn std::error::Error>>,
    {
        let mut working = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            self.refresh(&mut state)?
        };
        let result = mutator(&mut working)?;
        self.persist(working)?;
        Ok(result)
    }

    fn modified_time(path: &Path) -> Option<SystemTime> {
        fs::metadata(path).ok()?.modified().ok()
    }
}

#[cfg(test)]
fn with_orchestrator<T>(f: impl FnOnce(&ConfigOrchestrator) -> T) -> T {
    let guard = TEST_ORCHESTRATOR.lock().unwrap_or_else(|e| e.into_inner());
    match guard.as_ref() {
        Some(orchestrator) => f(orchestrator),
        None => f(&CONFIG_ORCHESTRATOR),
    }
}

#[cfg(not(test))]
fn with_orchestrator<T>(f: impl FnOnce(&ConfigOrchestrator) -> T) -> T {
    f(&CONFIG_ORCHESTRATOR)
}

impl Config {
    pub fn load() -> Result<Config, Box<dyn std::error::Error>> {
        with_orchestrator(|orchestrator| orchestrator.load_with_cache())
    }

    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        with_orchestrator(|orchestrator| orchestrator.persist(self.clone()))
    }

    pub fn mutate<F, T>(mutator: F) -> Result<T, Box<dyn std::error::Error>>
    where
        F: FnOnce(&mut Config) -> Result<T, Box<dyn std::error::Error>>,
    {
        with_orchestrator(|orchestrator| orchestrator.mutate(mutator))
    }

    /// Path of the file `load` and `save` operate on.
    pub fn active_path() -> PathBuf {
        with_orchestrator(|orchestrator| orchestrator.path().to_path_buf())
    }

    #[cfg(test)]
    pub(crate) fn set_test_config_path(path: PathBuf) {
        let mut guard = TEST_ORCHESTRATOR.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(ConfigOrchestrator::new(path));
    }

    #[cfg(test)]
    pub(crate) fn clear_test_config_override() {
        let mut guard = TEST_ORCHESTRATOR.lock().unwrap_or_else(|e| e.into_inner());
        guard.take();
    }
}
