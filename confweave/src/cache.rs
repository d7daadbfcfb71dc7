//! Modification time cache of merged imports
//!
//! A cache record holds the resolved sections of a finished import and the
//! modification time of every file it read. The record is used only while
//! every one of those files still has the recorded time; anything else,
//! including a missing or unreadable record, is a miss.

use crate::configurable::{Configurable, ReadMode, Section, Sections};
use crate::import::{ImportContext, ImportIniConfig};
use crate::ini::IniConfig;
use crate::interpolate;
use crate::writer;
use crate::{ConfigError, ConfigResult, Serializer};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord {
    snapshot: Snapshot,
    watched: Vec<WatchedFile>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    default_section: String,
    sections: Sections,
}

#[derive(Debug, Serialize, Deserialize)]
struct WatchedFile {
    path: PathBuf,
    mtime: SystemTime,
}

fn modified(path: &Path) -> std::io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}

/// A cache record at a fixed path
#[derive(Debug, Clone)]
pub struct ConfigCache {
    path: PathBuf,
}

impl ConfigCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cached store, if every watched file is unchanged
    pub fn load(&self) -> Option<IniConfig> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) => {
                debug!("cache miss: {}: {}", self.path.display(), e);
                return None;
            }
        };
        let record: CacheRecord = match serde_json::from_str(&text) {
            Ok(record) => record,
            Err(e) => {
                warn!("ignoring unreadable cache {}: {}", self.path.display(), e);
                return None;
            }
        };
        for watched in &record.watched {
            match modified(&watched.path) {
                Ok(mtime) if mtime == watched.mtime => {}
                _ => {
                    info!("cache miss: {} changed", watched.path.display());
                    return None;
                }
            }
        }
        info!("cache hit: {}", self.path.display());
        let files = record.watched.into_iter().map(|w| w.path).collect();
        Some(
            IniConfig::from_sections(
                format!("cache {}", self.path.display()),
                record.snapshot.sections,
            )
            .with_interpolation(true)
            .with_default_section(record.snapshot.default_section)
            .with_source_files(files),
        )
    }

    /// Replace the record with the resolved values of `config` and the
    /// current modification times of `files`
    pub fn save(&self, config: &dyn Configurable, files: &[PathBuf]) -> ConfigResult<()> {
        let sections = writer::snapshot(config, ReadMode::Interpolated)?
            .into_iter()
            .map(|(name, options)| {
                let options: Section = options
                    .into_iter()
                    .map(|(k, v)| (k, interpolate::escape(&v)))
                    .collect();
                (name, options)
            })
            .collect();
        let unique: IndexSet<&PathBuf> = files.iter().collect();
        let watched = unique
            .into_iter()
            .map(|path| {
                let mtime = modified(path).map_err(|e| ConfigError::file_read(path, e))?;
                Ok(WatchedFile {
                    path: path.clone(),
                    mtime,
                })
            })
            .collect::<ConfigResult<Vec<_>>>()?;
        let record = CacheRecord {
            snapshot: Snapshot {
                default_section: config.default_section().to_string(),
                sections,
            },
            watched,
        };
        let json = serde_json::to_string_pretty(&record).map_err(|source| ConfigError::Json {
            origin: self.path.display().to_string(),
            source,
        })?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|e| ConfigError::file_write(dir, e))?;
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| ConfigError::file_write(dir, e))?;
        tmp.write_all(json.as_bytes())
            .map_err(|e| ConfigError::file_write(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| ConfigError::file_write(&self.path, e.error))?;
        info!(
            "saved cache {} watching {} files",
            self.path.display(),
            record.watched.len()
        );
        Ok(())
    }

    /// Remove the record, returning whether one existed
    pub fn clear(&self) -> ConfigResult<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ConfigError::file_write(&self.path, e)),
        }
    }
}

/// An [`ImportIniConfig`] that skips the import while its cache is valid
#[derive(Debug)]
pub struct CachedImportConfig {
    cache: ConfigCache,
    import: ImportIniConfig,
    store: IniConfig,
    from_cache: bool,
}

impl CachedImportConfig {
    pub fn new(cache: ConfigCache, import: ImportIniConfig) -> Self {
        Self {
            cache,
            import,
            store: IniConfig::new(),
            from_cache: false,
        }
    }

    /// Use the cache when valid, otherwise import and rewrite the cache
    ///
    /// Failing to write the cache is logged and does not fail the load.
    pub fn load(&mut self) -> ConfigResult<()> {
        if let Some(store) = self.cache.load() {
            self.store = store;
            self.from_cache = true;
            return Ok(());
        }
        self.import.start_file_capture();
        let loaded = self.import.load();
        let files = self.import.stop_file_capture();
        loaded?;
        if let Err(e) = self.cache.save(&self.import, &files) {
            warn!("could not write cache {}: {}", self.cache.path().display(), e);
        }
        self.store = self.import.store().clone();
        self.from_cache = false;
        Ok(())
    }

    /// Whether the last load came from the cache
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    pub fn cache(&self) -> &ConfigCache {
        &self.cache
    }

    pub fn into_store(self) -> IniConfig {
        self.store
    }
}

impl Configurable for CachedImportConfig {
    fn origin(&self) -> String {
        self.import.origin()
    }

    fn sections(&self) -> Vec<String> {
        self.store.sections()
    }

    fn options(&self, section: &str, mode: ReadMode) -> ConfigResult<Section> {
        self.store.options(section, mode)
    }

    fn set_option(&mut self, section: &str, option: &str, value: &str) -> ConfigResult<()> {
        self.store.set_option(section, option, value)
    }

    fn remove_section(&mut self, section: &str) -> ConfigResult<bool> {
        self.store.remove_section(section)
    }

    fn default_section(&self) -> &str {
        self.store.default_section()
    }

    fn serializer(&self) -> &Serializer {
        self.store.serializer()
    }

    fn source_files(&self) -> Vec<PathBuf> {
        self.store.source_files()
    }

    fn interpolates(&self) -> bool {
        true
    }

    fn fallback(&self) -> Option<&Sections> {
        self.store.fallback()
    }

    fn resolve_imports(&mut self, _context: &ImportContext) -> ConfigResult<()> {
        if self.sections().is_empty() {
            self.load()?;
        }
        Ok(())
    }
}
