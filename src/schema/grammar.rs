//! DDL generation for blueprints.

use super::types::ColumnType;
use super::blueprint::{
    Blueprint, BlueprintMode, ColumnDefault, ColumnDefinition, Command, ForeignKeyDefinition,
    IndexDefinition, IndexKind, Step,
};
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::value::Value;

impl Blueprint {
    /// DDL for this blueprint's mode.
    pub fn statements(&self, dialect: Dialect) -> OrmResult<Vec<String>> {
        match self.mode {
            BlueprintMode::Create => self.to_sql(dialect),
            BlueprintMode::Alter => self.to_alter_sql(dialect),
        }
    }

    /// Generate CREATE TABLE SQL, followed by one statement per named index
    /// and, on Postgres, per column comment.
    ///
    /// Column-level and table-level primary keys are merged into a single
    /// `PRIMARY KEY (...)` clause. On SQLite a lone auto-increment key is
    /// declared inline as `INTEGER PRIMARY KEY AUTOINCREMENT` instead.
    pub fn to_sql(&self, dialect: Dialect) -> OrmResult<Vec<String>> {
        if self.columns.is_empty() {
            return Err(OrmError::Schema(format!(
                "table '{}' must declare at least one column",
                self.table
            )));
        }
        let q = |ident: &str| dialect.quote_identifier(ident);

        let primary = self.primary_columns();
        let inline_pk = dialect == Dialect::Sqlite
            && primary.len() == 1
            && self
                .columns
                .iter()
                .any(|c| c.name == primary[0] && c.column_type.is_auto_increment());

        let mut defs = Vec::new();
        for col in &self.columns {
            let inline = inline_pk && col.name == primary[0];
            defs.push(column_sql(dialect, col, inline, None));
        }

        if !primary.is_empty() && !inline_pk {
            defs.push(format!("PRIMARY KEY ({})", quote_list(dialect, &primary)));
        }

        for fk in self.foreign_key_definitions() {
            defs.push(format!(
                "CONSTRAINT {} FOREIGN KEY ({}) {}",
                q(&fk.name(&self.table)),
                quote_list(dialect, &fk.columns),
                references_sql(dialect, &self.table, fk)?
            ));
        }

        let mut statements = vec![format!("CREATE TABLE {} ({})", q(&self.table), defs.join(", "))];
        statements.extend(self.index_statements(dialect));
        statements.extend(self.comment_statements(dialect));
        Ok(statements)
    }

    /// Generate ALTER TABLE SQL: column additions, column changes and
    /// commands in the order they were declared, then primary key, indexes,
    /// foreign keys and comments.
    pub fn to_alter_sql(&self, dialect: Dialect) -> OrmResult<Vec<String>> {
        let q = |ident: &str| dialect.quote_identifier(ident);
        let table = q(&self.table);
        let foreign_keys = self.foreign_key_definitions();
        let mut statements = Vec::new();

        // SQLite only accepts foreign keys inline on the column being added.
        let mut inline_refs: Vec<&ForeignKeyDefinition> = Vec::new();
        if dialect == Dialect::Sqlite {
            for &fk in &foreign_keys {
                let added = fk.columns.len() == 1
                    && self
                        .columns
                        .iter()
                        .any(|c| !c.change && c.name == fk.columns[0]);
                if !added {
                    return Err(OrmError::Schema(format!(
                        "SQLite cannot add foreign key '{}' to existing columns",
                        fk.name(&self.table)
                    )));
                }
                inline_refs.push(fk);
            }
        }

        for step in &self.steps {
            match *step {
                Step::Command(index) => {
                    statements.push(command_sql(dialect, &table, &self.commands[index])?);
                }
                Step::Column(index) => {
                    let col = &self.columns[index];
                    if col.change {
                        statements.extend(modify_column_sql(dialect, &self.table, col)?);
                        continue;
                    }
                    if col.primary && dialect == Dialect::Sqlite {
                        return Err(OrmError::Schema(format!(
                            "SQLite cannot add primary key column '{}' to an existing table",
                            col.name
                        )));
                    }
                    let reference = match inline_refs.iter().find(|fk| fk.columns[0] == col.name) {
                        Some(fk) => Some(references_sql(dialect, &self.table, fk)?),
                        None => None,
                    };
                    statements.push(format!(
                        "ALTER TABLE {} ADD COLUMN {}",
                        table,
                        column_sql(dialect, col, false, reference.as_deref())
                    ));
                }
            }
        }

        let primary = self.primary_columns_added();
        if !primary.is_empty() {
            if dialect == Dialect::Sqlite {
                return Err(OrmError::Schema(format!(
                    "SQLite cannot add a primary key to existing table '{}'",
                    self.table
                )));
            }
            statements.push(format!(
                "ALTER TABLE {} ADD PRIMARY KEY ({})",
                table,
                quote_list(dialect, &primary)
            ));
        }

        statements.extend(self.index_statements(dialect));

        if dialect != Dialect::Sqlite {
            for &fk in &foreign_keys {
                statements.push(format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) {}",
                    table,
                    q(&fk.name(&self.table)),
                    quote_list(dialect, &fk.columns),
                    references_sql(dialect, &self.table, fk)?
                ));
            }
        }

        statements.extend(self.comment_statements(dialect));
        Ok(statements)
    }

    /// Primary key columns from column modifiers and `primary(..)`, de-duplicated.
    fn primary_columns(&self) -> Vec<String> {
        let column_level = self
            .columns
            .iter()
            .filter(|c| c.primary)
            .map(|c| c.name.clone());
        let index_level = self
            .indexes
            .iter()
            .filter(|i| i.kind == IndexKind::Primary)
            .flat_map(|i| i.columns.iter().cloned());

        let mut columns: Vec<String> = Vec::new();
        for name in column_level.chain(index_level) {
            if !columns.contains(&name) {
                columns.push(name);
            }
        }
        columns
    }

    fn primary_columns_added(&self) -> Vec<String> {
        self.primary_columns()
            .into_iter()
            .filter(|name| !self.columns.iter().any(|c| c.change && c.name == *name))
            .collect()
    }

    /// Unique and plain indexes, from column modifiers and `unique(..)`/`index(..)`.
    fn index_statements(&self, dialect: Dialect) -> Vec<String> {
        let q = |ident: &str| dialect.quote_identifier(ident);
        let column_level = self.columns.iter().flat_map(|c| {
            let mut found = Vec::new();
            if c.unique {
                found.push(IndexDefinition {
                    kind: IndexKind::Unique,
                    columns: vec![c.name.clone()],
                });
            }
            if c.index {
                found.push(IndexDefinition {
                    kind: IndexKind::Index,
                    columns: vec![c.name.clone()],
                });
            }
            found
        });

        column_level
            .chain(self.indexes.iter().cloned())
            .filter(|i| i.kind != IndexKind::Primary)
            .map(|i| {
                let unique = if i.kind == IndexKind::Unique { "UNIQUE " } else { "" };
                format!(
                    "CREATE {}INDEX {} ON {} ({})",
                    unique,
                    q(&i.name(&self.table)),
                    q(&self.table),
                    quote_list(dialect, &i.columns)
                )
            })
            .collect()
    }

    fn comment_statements(&self, dialect: Dialect) -> Vec<String> {
        if dialect != Dialect::Postgres {
            return Vec::new();
        }
        self.columns
            .iter()
            .filter_map(|c| {
                c.comment.as_ref().map(|text| {
                    format!(
                        "COMMENT ON COLUMN {}.{} IS {}",
                        dialect.quote_identifier(&self.table),
                        dialect.quote_identifier(&c.name),
                        dialect.quote_literal(text)
                    )
                })
            })
            .collect()
    }
}

/// One column definition. `inline_pk` renders SQLite's
/// `INTEGER PRIMARY KEY AUTOINCREMENT`.
fn command_sql(dialect: Dialect, table: &str, command: &Command) -> OrmResult<String> {
    let q = |ident: &str| dialect.quote_identifier(ident);
    Ok(match command {
        Command::DropColumn(name) => format!("ALTER TABLE {} DROP COLUMN {}", table, q(name)),
        Command::RenameColumn { from, to } => {
            format!("ALTER TABLE {} RENAME COLUMN {} TO {}", table, q(from), q(to))
        }
        Command::DropIndex(name) => match dialect {
            Dialect::Mysql => format!("ALTER TABLE {} DROP INDEX {}", table, q(name)),
            Dialect::Sqlite | Dialect::Postgres => format!("DROP INDEX {}", q(name)),
        },
        Command::DropForeign(name) => match dialect {
            Dialect::Mysql => format!("ALTER TABLE {} DROP FOREIGN KEY {}", table, q(name)),
            Dialect::Postgres => format!("ALTER TABLE {} DROP CONSTRAINT {}", table, q(name)),
            Dialect::Sqlite => {
                return Err(OrmError::Schema(format!(
                    "SQLite cannot drop foreign key '{}' from an existing table",
                    name
                )));
            }
        },
    })
}

fn column_sql(
    dialect: Dialect,
    col: &ColumnDefinition,
    inline_pk: bool,
    reference: Option<&str>,
) -> String {
    let mut line = format!(
        "{} {}",
        dialect.quote_identifier(&col.name),
        col.column_type.sql_type(dialect)
    );

    if inline_pk {
        line.push_str(" PRIMARY KEY AUTOINCREMENT");
    }
    if dialect == Dialect::Mysql && col.unsigned && col.column_type.is_integer() {
        line.push_str(" UNSIGNED");
    }

    line.push_str(if col.nullable && !col.primary { " NULL" } else { " NOT NULL" });

    if dialect == Dialect::Mysql && col.column_type.is_auto_increment() {
        line.push_str(" AUTO_INCREMENT");
    }

    if let Some(default) = &col.default {
        line.push_str(" DEFAULT ");
        line.push_str(&default_sql(dialect, default));
    }

    if let ColumnType::Enum(allowed) = &col.column_type {
        let options = allowed
            .iter()
            .map(|a| dialect.quote_literal(a))
            .collect::<Vec<_>>()
            .join(", ");
        line.push_str(&format!(
            " CHECK ({} IN ({}))",
            dialect.quote_identifier(&col.name),
            options
        ));
    }

    if dialect == Dialect::Mysql {
        if let Some(text) = &col.comment {
            line.push_str(" COMMENT ");
            line.push_str(&dialect.quote_literal(text));
        }
    }

    if let Some(reference) = reference {
        line.push(' ');
        line.push_str(reference);
    }
    line
}

fn modify_column_sql(dialect: Dialect, table: &str, col: &ColumnDefinition) -> OrmResult<Vec<String>> {
    let q = |ident: &str| dialect.quote_identifier(ident);
    match dialect {
        Dialect::Sqlite => Err(OrmError::Schema(format!(
            "SQLite cannot modify column '{}'; recreate the table instead",
            col.name
        ))),
        Dialect::Mysql => Ok(vec![format!(
            "ALTER TABLE {} MODIFY COLUMN {}",
            q(table),
            column_sql(dialect, col, false, None)
        )]),
        Dialect::Postgres => {
            let prefix = format!("ALTER TABLE {} ALTER COLUMN {}", q(table), q(&col.name));
            let mut statements = vec![format!(
                "{} TYPE {}",
                prefix,
                col.column_type.sql_type(dialect)
            )];
            statements.push(if col.nullable {
                format!("{} DROP NOT NULL", prefix)
            } else {
                format!("{} SET NOT NULL", prefix)
            });
            statements.push(match &col.default {
                Some(default) => format!("{} SET DEFAULT {}", prefix, default_sql(dialect, default)),
                None => format!("{} DROP DEFAULT", prefix),
            });
            Ok(statements)
        }
    }
}

fn references_sql(dialect: Dialect, table: &str, fk: &ForeignKeyDefinition) -> OrmResult<String> {
    let target = fk.on.as_ref().ok_or_else(|| {
        OrmError::Schema(format!(
            "foreign key '{}' does not name the table it references",
            fk.name(table)
        ))
    })?;
    let mut sql = format!(
        "REFERENCES {} ({})",
        dialect.quote_identifier(target),
        quote_list(dialect, &fk.references)
    );
    if let Some(action) = &fk.on_delete {
        sql.push_str(" ON DELETE ");
        sql.push_str(action);
    }
    if let Some(action) = &fk.on_update {
        sql.push_str(" ON UPDATE ");
        sql.push_str(action);
    }
    Ok(sql)
}

/// Defaults are literals: DDL cannot take bound parameters.
fn default_sql(dialect: Dialect, default: &ColumnDefault) -> String {
    match default {
        ColumnDefault::CurrentTimestamp => "CURRENT_TIMESTAMP".to_string(),
        ColumnDefault::Value(value) => match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => match dialect {
                Dialect::Postgres => (if *b { "TRUE" } else { "FALSE" }).to_string(),
                Dialect::Sqlite | Dialect::Mysql => (if *b { "1" } else { "0" }).to_string(),
            },
            Value::Int(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            other => dialect.quote_literal(&other.to_string()),
        },
    }
}

fn quote_list(dialect: Dialect, names: &[String]) -> String {
    names
        .iter()
        .map(|n| dialect.quote_identifier(n))
        .collect::<Vec<_>>()
        .join(", ")
}
