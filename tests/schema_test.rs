use pretty_assertions::assert_eq;
use tabula::prelude::*;

fn create_posts_table() -> Blueprint {
    let mut table = Blueprint::create("posts");
    table.id();
    table.string("title", 255);
    table.foreign_id("account_id");
    table.timestamps();
    table
}

#[test]
fn test_posts_blueprint_has_one_primary_key() -> anyhow::Result<()> {
    for dialect in [Dialect::Sqlite, Dialect::Postgres, Dialect::Mysql] {
        let sql = create_posts_table().to_sql(dialect)?.join(";\n");
        assert_eq!(sql.matches("PRIMARY KEY").count(), 1, "{dialect}: {sql}");
    }
    Ok(())
}

#[test]
fn test_blueprint_applies_on_sqlite() -> anyhow::Result<()> {
    let mut conn = SqlxConnection::connect("sqlite::memory:")?;
    let mut schema = Schema::new(&mut conn);

    schema.build(&create_posts_table())?;
    for column in ["id", "title", "account_id", "created_at", "updated_at"] {
        assert!(schema.has_column("posts", column)?, "missing {column}");
    }

    schema.table("posts", |table| {
        table.rename_column("title", "headline");
        table.index(&["account_id"]);
    })?;
    assert!(schema.has_column("posts", "headline")?);
    assert!(!schema.has_column("posts", "title")?);

    schema.table("posts", |table| table.drop_index("posts_account_id_index"))?;
    Ok(())
}

#[test]
fn test_sqlite_rejects_column_modification() -> anyhow::Result<()> {
    let mut conn = SqlxConnection::connect("sqlite::memory:")?;
    let mut schema = Schema::new(&mut conn);
    schema.build(&create_posts_table())?;

    let err = schema
        .table("posts", |table| {
            table.string("title", 500).change();
        })
        .unwrap_err();
    assert!(matches!(err, OrmError::Schema(_)));
    Ok(())
}

#[test]
fn test_alter_applies_in_declared_order() -> anyhow::Result<()> {
    let mut conn = SqlxConnection::connect("sqlite::memory:")?;
    let mut schema = Schema::new(&mut conn);
    schema.build(&create_posts_table())?;

    schema.table("posts", |table| {
        table.string("slug", 100).nullable();
        table.rename_column("slug", "permalink");
        table.foreign_id("editor_id").nullable().constrained();
    })?;
    assert!(schema.has_column("posts", "permalink")?);
    assert!(!schema.has_column("posts", "slug")?);
    assert!(schema.has_column("posts", "editor_id")?);
    Ok(())
}
