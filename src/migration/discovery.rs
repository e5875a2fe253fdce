//! Migration discovery from a directory listing.
//!
//! File names follow `<timestamp>_<snake_case_name>.<ext>`, e.g.
//! `2024_01_15_093000_create_accounts_table.sql`. The leading all-digit
//! segments form the timestamp; the rest is the migration's snake-case name,
//! whose PascalCase form (`CreateAccountsTable`) is the class name code
//! migrations are registered under. `.sql` files are loaded directly.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::Migration;
use crate::error::{OrmError, OrmResult};
use crate::naming;
use crate::schema::Schema;

/// A migration file name split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// The full stem; this is what the ledger records.
    pub name: String,
    pub timestamp: String,
    /// The snake-case part after the timestamp.
    pub snake_name: String,
    pub path: PathBuf,
}

impl MigrationFile {
    pub fn class_name(&self) -> String {
        naming::pascal(&self.snake_name)
    }

    pub fn is_sql(&self) -> bool {
        self.path.extension().is_some_and(|ext| ext == "sql")
    }
}

/// Split a migration path into timestamp and name. Returns `None` when the
/// stem has no leading timestamp or nothing after it.
pub fn parse_file_name(path: &Path) -> Option<MigrationFile> {
    let stem = path.file_stem()?.to_str()?;
    let segments: Vec<&str> = stem.split('_').collect();
    let digits = segments
        .iter()
        .take_while(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
        .count();
    if digits == 0 || digits == segments.len() {
        return None;
    }

    Some(MigrationFile {
        name: stem.to_string(),
        timestamp: segments[..digits].join("_"),
        snake_name: segments[digits..].join("_"),
        path: path.to_path_buf(),
    })
}

pub type MigrationFactory = fn() -> Box<dyn Migration>;

fn construct<M: Migration + Default + 'static>() -> Box<dyn Migration> {
    Box::new(M::default())
}

/// Code migrations by class name.
#[derive(Default)]
pub struct MigrationRegistry {
    factories: HashMap<String, MigrationFactory>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `M` under `class_name`.
    pub fn register<M: Migration + Default + 'static>(&mut self, class_name: &str) -> &mut Self {
        self.factories.insert(class_name.to_string(), construct::<M>);
        self
    }

    pub fn register_factory(&mut self, class_name: &str, factory: MigrationFactory) -> &mut Self {
        self.factories.insert(class_name.to_string(), factory);
        self
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.factories.contains_key(class_name)
    }

    pub fn instantiate(&self, class_name: &str) -> Option<Box<dyn Migration>> {
        self.factories.get(class_name).map(|factory| factory())
    }
}

/// A migration written as plain SQL with `-- up` and `-- down` sections.
/// Statements within a section are separated by `;`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlFileMigration {
    up: Vec<String>,
    down: Vec<String>,
}

impl SqlFileMigration {
    pub fn parse(source: &str) -> Self {
        let mut up = String::new();
        let mut down = String::new();
        let mut in_down = false;

        for line in source.lines() {
            match line.trim().to_ascii_lowercase().as_str() {
                "-- up" | "--up" => in_down = false,
                "-- down" | "--down" => in_down = true,
                _ => {
                    let section = if in_down { &mut down } else { &mut up };
                    section.push_str(line);
                    section.push('\n');
                }
            }
        }

        Self {
            up: split_statements(&up),
            down: split_statements(&down),
        }
    }

    pub fn from_file(path: &Path) -> OrmResult<Self> {
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    pub fn up_statements(&self) -> &[String] {
        &self.up
    }

    pub fn down_statements(&self) -> &[String] {
        &self.down
    }
}

fn split_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl Migration for SqlFileMigration {
    fn up(&self, schema: &mut Schema<'_>) -> OrmResult<()> {
        self.up.iter().try_for_each(|sql| schema.statement(sql))
    }

    fn down(&self, schema: &mut Schema<'_>) -> OrmResult<()> {
        self.down.iter().try_for_each(|sql| schema.statement(sql))
    }
}

/// Load every migration in `dir`, sorted by name.
///
/// `.sql` files are parsed; any other timestamped file is resolved through
/// `registry` by class name and is an error when unregistered. Files without
/// a timestamp prefix are ignored.
pub fn discover(
    dir: &Path,
    registry: &MigrationRegistry,
) -> OrmResult<Vec<(String, Box<dyn Migration>)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(file) = parse_file_name(&path) {
            files.push(file);
        }
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));

    let mut migrations: Vec<(String, Box<dyn Migration>)> = Vec::with_capacity(files.len());
    for file in files {
        if migrations.iter().any(|(name, _)| *name == file.name) {
            return Err(OrmError::Config(format!(
                "duplicate migration '{}' in {}",
                file.name,
                dir.display()
            )));
        }
        let migration: Box<dyn Migration> = if file.is_sql() {
            Box::new(SqlFileMigration::from_file(&file.path)?)
        } else {
            registry.instantiate(&file.class_name()).ok_or_else(|| {
                OrmError::Config(format!(
                    "no migration registered as '{}' for {}",
                    file.class_name(),
                    file.path.display()
                ))
            })?
        };
        migrations.push((file.name, migration));
    }
    Ok(migrations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_name() {
        let file = parse_file_name(Path::new("db/2024_01_15_093000_create_accounts_table.rs")).unwrap();
        assert_eq!(file.name, "2024_01_15_093000_create_accounts_table");
        assert_eq!(file.timestamp, "2024_01_15_093000");
        assert_eq!(file.snake_name, "create_accounts_table");
        assert_eq!(file.class_name(), "CreateAccountsTable");
        assert!(!file.is_sql());
    }

    #[test]
    fn test_parse_file_name_rejects_untimestamped() {
        assert!(parse_file_name(Path::new("README.md")).is_none());
        assert!(parse_file_name(Path::new("20240115.sql")).is_none());
    }

    #[test]
    fn test_sql_sections() {
        let migration = SqlFileMigration::parse(
            "-- up\nCREATE TABLE a (id INTEGER);\nCREATE TABLE b (id INTEGER);\n\n-- down\nDROP TABLE b;\nDROP TABLE a;\n",
        );
        assert_eq!(
            migration.up_statements(),
            &["CREATE TABLE a (id INTEGER)".to_string(), "CREATE TABLE b (id INTEGER)".to_string()]
        );
        assert_eq!(
            migration.down_statements(),
            &["DROP TABLE b".to_string(), "DROP TABLE a".to_string()]
        );
    }

    #[test]
    fn test_registry() {
        let mut registry = MigrationRegistry::new();
        registry.register::<SqlFileMigration>("Empty");
        assert!(registry.contains("Empty"));
        assert!(registry.instantiate("Missing").is_none());
        assert!(registry.instantiate("Empty").is_some());
    }
}
