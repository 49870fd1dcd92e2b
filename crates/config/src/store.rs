use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
};

use {toml::Table, tracing::debug};

use crate::error::{Error, Result};

/// Categorised string settings, some user-edited, some written back by the bot.
pub trait DataStore: Send + Sync {
    /// Look up `key` in `category`. Written data shadows user config.
    fn get(&self, category: &str, key: &str) -> Option<String>;

    /// Persist `value` under `category.key`.
    fn set(&self, category: &str, key: &str, value: &str) -> Result<()>;

    /// Path the operator should edit, for error messages.
    fn config_path(&self) -> &Path;

    /// Whole `category` table from the user config, if present.
    fn section(&self, category: &str) -> Option<Table>;
}

fn scalar_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Datetime(d) => Some(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => None,
    }
}

fn lookup(table: &Table, category: &str, key: &str) -> Option<String> {
    table
        .get(category)
        .and_then(toml::Value::as_table)
        .and_then(|section| section.get(key))
        .and_then(scalar_to_string)
}

fn insert(table: &mut Table, category: &str, key: &str, value: &str) {
    let section = table
        .entry(category.to_string())
        .or_insert_with(|| toml::Value::Table(Table::new()));
    if !section.is_table() {
        *section = toml::Value::Table(Table::new());
    }
    if let toml::Value::Table(section) = section {
        section.insert(key.to_string(), toml::Value::String(value.to_string()));
    }
}

fn read_table(path: &Path) -> Result<Table> {
    if !path.exists() {
        return Ok(Table::new());
    }
    let raw = fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    raw.parse::<Table>().map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

// ── TOML file-backed implementation ──────────────────────────────────

/// Read-only user config overlaid by a data file the bot writes to.
pub struct FileStore {
    config_path: PathBuf,
    data_path: PathBuf,
    config: Table,
    data: RwLock<Table>,
}

impl FileStore {
    /// Load both files. Missing files are treated as empty.
    pub fn open(config_path: impl Into<PathBuf>, data_path: impl Into<PathBuf>) -> Result<Self> {
        let config_path = config_path.into();
        let data_path = data_path.into();
        let config = read_table(&config_path)?;
        let data = read_table(&data_path)?;
        debug!(
            config = %config_path.display(),
            data = %data_path.display(),
            "loaded config store"
        );
        Ok(Self {
            config_path,
            data_path,
            config,
            data: RwLock::new(data),
        })
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    fn write_data(&self, data: &Table) -> Result<()> {
        if let Some(parent) = self.data_path.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let raw = toml::to_string_pretty(data)?;
        fs::write(&self.data_path, raw).map_err(|source| Error::Write {
            path: self.data_path.clone(),
            source,
        })
    }
}

impl DataStore for FileStore {
    fn get(&self, category: &str, key: &str) -> Option<String> {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        lookup(&data, category, key).or_else(|| lookup(&self.config, category, key))
    }

    fn set(&self, category: &str, key: &str, value: &str) -> Result<()> {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        insert(&mut data, category, key, value);
        self.write_data(&data)
    }

    fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn section(&self, category: &str) -> Option<Table> {
        self.config.get(category).and_then(toml::Value::as_table).cloned()
    }
}

// ── In-memory implementation ─────────────────────────────────────────

/// Non-persistent store, handy for tests and throwaway runs.
pub struct MemoryStore {
    config_path: PathBuf,
    table: RwLock<Table>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            config_path: PathBuf::from("<memory>"),
            table: RwLock::new(Table::new()),
        }
    }

    #[must_use]
    pub fn with(self, category: &str, key: &str, value: &str) -> Self {
        insert(
            &mut self.table.write().unwrap_or_else(|e| e.into_inner()),
            category,
            key,
            value,
        );
        self
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStore for MemoryStore {
    fn get(&self, category: &str, key: &str) -> Option<String> {
        lookup(
            &self.table.read().unwrap_or_else(|e| e.into_inner()),
            category,
            key,
        )
    }

    fn set(&self, category: &str, key: &str, value: &str) -> Result<()> {
        insert(
            &mut self.table.write().unwrap_or_else(|e| e.into_inner()),
            category,
            key,
            value,
        );
        Ok(())
    }

    fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn section(&self, category: &str) -> Option<Table> {
        self.table
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(category)
            .and_then(toml::Value::as_table)
            .cloned()
    }
}
