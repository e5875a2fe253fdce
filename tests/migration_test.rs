use std::fs;

use pretty_assertions::assert_eq;
use tabula::migration::{MigrationStatus, discover};
use tabula::prelude::*;

#[derive(Default)]
struct CreateAccountsTable;

impl Migration for CreateAccountsTable {
    fn up(&self, schema: &mut Schema<'_>) -> OrmResult<()> {
        schema.create("accounts", |table| {
            table.id();
            table.string("email", 255).unique();
            table.timestamps();
        })
    }

    fn down(&self, schema: &mut Schema<'_>) -> OrmResult<()> {
        schema.drop_if_exists("accounts")
    }
}

#[derive(Default)]
struct AddNameToAccounts;

impl Migration for AddNameToAccounts {
    fn up(&self, schema: &mut Schema<'_>) -> OrmResult<()> {
        schema.table("accounts", |table| {
            table.string("name", 100).nullable();
        })
    }

    fn down(&self, schema: &mut Schema<'_>) -> OrmResult<()> {
        schema.table("accounts", |table| table.drop_column("name"))
    }
}

fn registry() -> MigrationRegistry {
    let mut registry = MigrationRegistry::new();
    registry
        .register::<CreateAccountsTable>("CreateAccountsTable")
        .register::<AddNameToAccounts>("AddNameToAccounts");
    registry
}

fn migrations_dir() -> anyhow::Result<tempfile::TempDir> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("2024_01_01_000000_create_accounts_table.rs"), "")?;
    fs::write(
        dir.path().join("2024_01_02_000000_create_posts_table.sql"),
        "-- up\n\
         CREATE TABLE posts (id INTEGER PRIMARY KEY, title TEXT NOT NULL);\n\
         CREATE INDEX posts_title_index ON posts (title);\n\
         -- down\n\
         DROP TABLE posts;\n",
    )?;
    fs::write(dir.path().join("2024_01_03_000000_add_name_to_accounts.rs"), "")?;
    fs::write(dir.path().join("README.md"), "not a migration")?;
    Ok(dir)
}

fn names(statuses: &[MigrationStatus]) -> Vec<(&str, MigrationState)> {
    statuses.iter().map(|s| (s.name.as_str(), s.state)).collect()
}

#[test]
fn test_discover_orders_by_name() -> anyhow::Result<()> {
    let dir = migrations_dir()?;
    let found: Vec<String> = discover(dir.path(), &registry())?
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert_eq!(
        found,
        vec![
            "2024_01_01_000000_create_accounts_table",
            "2024_01_02_000000_create_posts_table",
            "2024_01_03_000000_add_name_to_accounts",
        ]
    );
    Ok(())
}

#[test]
fn test_discover_unregistered_class_fails() -> anyhow::Result<()> {
    let dir = migrations_dir()?;
    fs::write(dir.path().join("2024_02_01_000000_create_tags_table.rs"), "")?;
    let err = discover(dir.path(), &registry()).err().expect("unregistered migration");
    assert!(matches!(err, OrmError::Config(_)));
    assert!(err.to_string().contains("CreateTagsTable"));
    Ok(())
}

#[test]
fn test_migrate_is_idempotent() -> anyhow::Result<()> {
    let dir = migrations_dir()?;
    let manager = MigrationManager::from_directory(dir.path(), &registry())?;
    let mut conn = SqlxConnection::connect("sqlite::memory:")?;

    assert_eq!(manager.migrate(&mut conn, None)?.len(), 3);
    assert!(manager.migrate(&mut conn, None)?.is_empty());
    assert_eq!(manager.ran(&mut conn)?.len(), 3);

    let mut schema = Schema::new(&mut conn);
    assert!(schema.has_table("posts")?);
    assert!(schema.has_column("accounts", "name")?);
    Ok(())
}

#[test]
fn test_rollback_reverts_last_batch() -> anyhow::Result<()> {
    let dir = migrations_dir()?;
    let manager = MigrationManager::from_directory(dir.path(), &registry())?;
    let mut conn = SqlxConnection::connect("sqlite::memory:")?;

    manager.migrate(&mut conn, Some(2))?;
    manager.migrate(&mut conn, None)?;
    let ran = manager.ran(&mut conn)?;
    assert_eq!(ran.iter().map(|r| r.batch).collect::<Vec<_>>(), vec![1, 1, 2]);

    let reverted = manager.rollback(&mut conn, Some(1))?;
    assert_eq!(reverted, vec!["2024_01_03_000000_add_name_to_accounts"]);
    assert_eq!(manager.ran(&mut conn)?.len(), 2);
    assert!(!Schema::new(&mut conn).has_column("accounts", "name")?);

    let reverted = manager.rollback(&mut conn, None)?;
    assert_eq!(
        reverted,
        vec!["2024_01_02_000000_create_posts_table", "2024_01_01_000000_create_accounts_table"]
    );
    let mut schema = Schema::new(&mut conn);
    assert!(!schema.has_table("accounts")?);
    assert!(!schema.has_table("posts")?);
    Ok(())
}

#[test]
fn test_reset_refresh_status() -> anyhow::Result<()> {
    let dir = migrations_dir()?;
    let manager = MigrationManager::from_directory(dir.path(), &registry())?;
    let mut conn = SqlxConnection::connect("sqlite::memory:")?;

    manager.migrate(&mut conn, Some(1))?;
    assert_eq!(
        names(&manager.status(&mut conn)?),
        vec![
            ("2024_01_01_000000_create_accounts_table", MigrationState::Ran),
            ("2024_01_02_000000_create_posts_table", MigrationState::Pending),
            ("2024_01_03_000000_add_name_to_accounts", MigrationState::Pending),
        ]
    );

    manager.migrate(&mut conn, None)?;
    assert_eq!(manager.reset(&mut conn)?.len(), 3);
    assert!(manager.ran(&mut conn)?.is_empty());

    assert_eq!(manager.refresh(&mut conn)?.len(), 3);
    let status = manager.status(&mut conn)?;
    assert!(status.iter().all(|s| s.state == MigrationState::Ran && s.batch == Some(1)));
    Ok(())
}

#[test]
fn test_failed_migration_leaves_no_trace() -> anyhow::Result<()> {
    let dir = migrations_dir()?;
    fs::write(
        dir.path().join("2024_01_04_000000_broken.sql"),
        "-- up\nCREATE TABLE tags (id INTEGER PRIMARY KEY);\nALTER TABLE ghosts ADD COLUMN x INTEGER;\n-- down\nDROP TABLE tags;\n",
    )?;
    let manager = MigrationManager::from_directory(dir.path(), &registry())?;
    let mut conn = SqlxConnection::connect("sqlite::memory:")?;

    let err = manager.migrate(&mut conn, None).unwrap_err();
    let OrmError::Migration { name, .. } = &err else {
        panic!("expected a migration error, got {err:?}");
    };
    assert_eq!(name, "2024_01_04_000000_broken");

    assert!(manager.ran(&mut conn)?.is_empty());
    let mut schema = Schema::new(&mut conn);
    assert!(!schema.has_table("accounts")?);
    assert!(!schema.has_table("tags")?);
    Ok(())
}

#[test]
fn test_config_drives_directory_and_table() -> anyhow::Result<()> {
    let dir = migrations_dir()?;
    let config = Config::parse(&format!(
        "[database]\nurl = \"sqlite::memory:\"\n\n[migrations]\ndirectory = \"{}\"\ntable = \"schema_history\"\n",
        dir.path().display()
    ))?;
    let manager = MigrationManager::from_config(&config, &registry())?;
    assert_eq!(manager.table(), "schema_history");

    let mut conn = SqlxConnection::from_config(&config)?;
    manager.migrate(&mut conn, None)?;
    assert!(Schema::new(&mut conn).has_table("schema_history")?);
    Ok(())
}
