use crate::storage::{DbFile, HeapFile, StorageError, TableId, TupleDesc, Type};
use log::info;
use std::collections::HashMap;
use std::io::{self, BufRead};
use std::path::Path;
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("no such table: {0}")]
    NoSuchTable(String),

    #[error("invalid catalog entry: {0}")]
    InvalidEntry(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Clone)]
struct TableEntry {
    file: Arc<dyn DbFile>,
    name: String,
    primary_key: String,
}

/// Registry of the tables in the database: table id to backing file, schema
/// and primary key, plus a name index.
///
/// Names follow last-write-wins: registering a table under an existing name
/// displaces the previous owner from both maps, and re-registering a file id
/// under a new name drops the stale name mapping.
pub struct Catalog {
    inner: RwLock<CatalogInner>,
}

#[derive(Default)]
struct CatalogInner {
    tables: HashMap<TableId, TableEntry>,
    names: HashMap<String, TableId>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(CatalogInner::default()),
        }
    }

    /// Register a table. `file.id()` becomes the table id.
    pub fn add_table(&self, file: Arc<dyn DbFile>, name: &str, primary_key: &str) {
        let id = file.id();
        let mut inner = self.inner.write().unwrap();

        if let Some(&displaced_id) = inner.names.get(name) {
            inner.tables.remove(&displaced_id);
        }
        if let Some(stale) = inner.tables.get(&id).map(|entry| entry.name.clone()) {
            inner.names.remove(&stale);
        }

        inner.tables.insert(
            id,
            TableEntry {
                file,
                name: name.to_string(),
                primary_key: primary_key.to_string(),
            },
        );
        inner.names.insert(name.to_string(), id);
    }

    /// Id of the table with the given name.
    pub fn table_id(&self, name: &str) -> CatalogResult<TableId> {
        self.inner
            .read()
            .unwrap()
            .names
            .get(name)
            .copied()
            .ok_or_else(|| CatalogError::NoSuchTable(name.to_string()))
    }

    /// Backing file of a table, if the id is known.
    pub fn try_file(&self, id: TableId) -> Option<Arc<dyn DbFile>> {
        self.inner
            .read()
            .unwrap()
            .tables
            .get(&id)
            .map(|entry| entry.file.clone())
    }

    /// Backing file of a table.
    pub fn file(&self, id: TableId) -> CatalogResult<Arc<dyn DbFile>> {
        self.try_file(id)
            .ok_or_else(|| CatalogError::NoSuchTable(format!("id {}", id)))
    }

    /// Schema of a table.
    pub fn tuple_desc(&self, id: TableId) -> CatalogResult<Arc<TupleDesc>> {
        Ok(self.file(id)?.tuple_desc().clone())
    }

    pub fn table_name(&self, id: TableId) -> CatalogResult<String> {
        self.inner
            .read()
            .unwrap()
            .tables
            .get(&id)
            .map(|entry| entry.name.clone())
            .ok_or_else(|| CatalogError::NoSuchTable(format!("id {}", id)))
    }

    pub fn primary_key(&self, id: TableId) -> CatalogResult<String> {
        self.inner
            .read()
            .unwrap()
            .tables
            .get(&id)
            .map(|entry| entry.primary_key.clone())
            .ok_or_else(|| CatalogError::NoSuchTable(format!("id {}", id)))
    }

    /// Ids of every registered table.
    pub fn table_ids(&self) -> Vec<TableId> {
        self.inner.read().unwrap().tables.keys().copied().collect()
    }

    /// Drop every table from the catalog.
    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.tables.clear();
        inner.names.clear();
    }

    /// Load a schema file and register one table per line.
    ///
    /// Each line reads `name (field_name field_type[ pk], ...)`, with types
    /// `int` and `string` (case-insensitive); the data lives in `name.dat`
    /// next to the schema file.
    pub fn load_schema<P: AsRef<Path>>(&self, schema_path: P) -> CatalogResult<()> {
        let schema_path = schema_path.as_ref();
        let base = schema_path.parent().unwrap_or_else(|| Path::new("."));
        let reader = io::BufReader::new(std::fs::File::open(schema_path)?);

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (name, fields) = Self::split_entry(line)
                .ok_or_else(|| CatalogError::InvalidEntry(line.to_string()))?;

            let mut types = Vec::new();
            let mut names = Vec::new();
            let mut primary_key = String::new();
            for column in fields.split(',') {
                let mut parts = column.split_whitespace();
                let field_name = parts
                    .next()
                    .ok_or_else(|| CatalogError::InvalidEntry(line.to_string()))?;
                let type_name = parts
                    .next()
                    .ok_or_else(|| CatalogError::InvalidEntry(line.to_string()))?;
                let field_type = Type::parse(type_name)
                    .ok_or_else(|| CatalogError::InvalidEntry(line.to_string()))?;
                match parts.next() {
                    Some("pk") => primary_key = field_name.to_string(),
                    Some(_) => return Err(CatalogError::InvalidEntry(line.to_string())),
                    None => {}
                }
                names.push(Some(field_name.to_string()));
                types.push(field_type);
            }
            if types.is_empty() {
                return Err(CatalogError::InvalidEntry(line.to_string()));
            }

            let desc = Arc::new(TupleDesc::new(types, names));
            let data_path = base.join(format!("{}.dat", name));
            let file = Arc::new(HeapFile::open(&data_path, desc)?);
            info!("catalog: added table {} from {}", name, data_path.display());
            self.add_table(file, name, &primary_key);
        }
        Ok(())
    }

    fn split_entry(line: &str) -> Option<(&str, &str)> {
        let open = line.find('(')?;
        let close = line.rfind(')')?;
        if close < open {
            return None;
        }
        let name = line[..open].trim();
        if name.is_empty() {
            return None;
        }
        Some((name, line[open + 1..close].trim()))
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}
