//! Blueprint: a declarative description of one table's columns, indexes and
//! constraints. Pure data; [`grammar`](super::grammar) turns it into DDL.
//!
//! ```rust,ignore
//! schema.create("posts", |table| {
//!     table.id();
//!     table.string("title", 255);
//!     table.text("body").nullable();
//!     table.foreign_id("account_id").constrained().cascade_on_delete();
//!     table.timestamps();
//! })?;
//! ```

use super::types::ColumnType;
use crate::naming;
use crate::value::Value;

/// Whether the blueprint creates a new table or alters an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlueprintMode {
    Create,
    Alter,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnDefault {
    Value(Value),
    CurrentTimestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub default: Option<ColumnDefault>,
    pub unsigned: bool,
    pub primary: bool,
    pub unique: bool,
    pub index: bool,
    pub comment: Option<String>,
    /// Modify an existing column instead of adding one (alter only).
    pub change: bool,
    /// Foreign key declared on this column.
    pub foreign: Option<ForeignKeyDefinition>,
}

impl ColumnDefinition {
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            nullable: false,
            default: None,
            unsigned: false,
            primary: false,
            unique: false,
            index: false,
            comment: None,
            change: false,
            foreign: None,
        }
    }

    pub fn nullable(&mut self) -> &mut Self {
        self.nullable = true;
        self
    }

    pub fn default(&mut self, value: impl Into<Value>) -> &mut Self {
        self.default = Some(ColumnDefault::Value(value.into()));
        self
    }

    /// Default to the current timestamp.
    pub fn use_current(&mut self) -> &mut Self {
        self.default = Some(ColumnDefault::CurrentTimestamp);
        self
    }

    pub fn unsigned(&mut self) -> &mut Self {
        self.unsigned = true;
        self
    }

    pub fn primary(&mut self) -> &mut Self {
        self.primary = true;
        self
    }

    pub fn unique(&mut self) -> &mut Self {
        self.unique = true;
        self
    }

    pub fn index(&mut self) -> &mut Self {
        self.index = true;
        self
    }

    pub fn comment(&mut self, text: &str) -> &mut Self {
        self.comment = Some(text.to_string());
        self
    }

    pub fn change(&mut self) -> &mut Self {
        self.change = true;
        self
    }

    /// Foreign key to the conventional table: `account_id` -> `accounts.id`.
    pub fn constrained(&mut self) -> &mut ForeignKeyDefinition {
        let stem = self.name.strip_suffix("_id").unwrap_or(&self.name);
        let table = naming::table_name(stem);
        self.references("id").on(&table)
    }

    /// Foreign key to `column`; name the table with `on`.
    pub fn references(&mut self, column: &str) -> &mut ForeignKeyDefinition {
        let mut foreign = ForeignKeyDefinition::new(&self.name);
        foreign.references(column);
        self.foreign.insert(foreign)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Primary,
    Unique,
    Index,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    pub kind: IndexKind,
    pub columns: Vec<String>,
}

impl IndexDefinition {
    /// `{table}_{columns}_{unique|index}`.
    pub fn name(&self, table: &str) -> String {
        let suffix = match self.kind {
            IndexKind::Primary => "primary",
            IndexKind::Unique => "unique",
            IndexKind::Index => "index",
        };
        format!("{}_{}_{}", table, self.columns.join("_"), suffix)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDefinition {
    pub columns: Vec<String>,
    pub references: Vec<String>,
    pub on: Option<String>,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
}

impl ForeignKeyDefinition {
    fn new(column: &str) -> Self {
        Self {
            columns: vec![column.to_string()],
            references: vec!["id".to_string()],
            on: None,
            on_delete: None,
            on_update: None,
        }
    }

    pub fn references(&mut self, column: &str) -> &mut Self {
        self.references = vec![column.to_string()];
        self
    }

    pub fn on(&mut self, table: &str) -> &mut Self {
        self.on = Some(table.to_string());
        self
    }

    pub fn on_delete(&mut self, action: &str) -> &mut Self {
        self.on_delete = Some(action.to_ascii_uppercase());
        self
    }

    pub fn on_update(&mut self, action: &str) -> &mut Self {
        self.on_update = Some(action.to_ascii_uppercase());
        self
    }

    pub fn cascade_on_delete(&mut self) -> &mut Self {
        self.on_delete("CASCADE")
    }

    pub fn null_on_delete(&mut self) -> &mut Self {
        self.on_delete("SET NULL")
    }

    /// `{table}_{columns}_foreign`.
    pub fn name(&self, table: &str) -> String {
        format!("{}_{}_foreign", table, self.columns.join("_"))
    }
}

/// One entry of an alter blueprint, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Column(usize),
    Command(usize),
}

/// A queued alteration, applied in the order it was declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    DropColumn(String),
    RenameColumn { from: String, to: String },
    DropIndex(String),
    DropForeign(String),
}

#[derive(Debug, Clone)]
pub struct Blueprint {
    pub(crate) table: String,
    pub(crate) mode: BlueprintMode,
    pub(crate) columns: Vec<ColumnDefinition>,
    pub(crate) indexes: Vec<IndexDefinition>,
    pub(crate) foreign_keys: Vec<ForeignKeyDefinition>,
    pub(crate) commands: Vec<Command>,
    pub(crate) steps: Vec<Step>,
}

impl Blueprint {
    pub fn create(table: &str) -> Self {
        Self::new(table, BlueprintMode::Create)
    }

    pub fn alter(table: &str) -> Self {
        Self::new(table, BlueprintMode::Alter)
    }

    fn new(table: &str, mode: BlueprintMode) -> Self {
        Self {
            table: table.to_string(),
            mode,
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            commands: Vec::new(),
            steps: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn mode(&self) -> BlueprintMode {
        self.mode
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    /// Append a column of any type.
    pub fn column(&mut self, name: &str, column_type: ColumnType) -> &mut ColumnDefinition {
        let index = self.columns.len();
        self.columns.push(ColumnDefinition::new(name, column_type));
        self.steps.push(Step::Column(index));
        &mut self.columns[index]
    }

    // ========== Keys ==========

    /// `id`: auto-incrementing unsigned big-integer primary key.
    pub fn id(&mut self) -> &mut ColumnDefinition {
        self.big_increments("id")
    }

    pub fn increments(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Increments).unsigned().primary()
    }

    pub fn big_increments(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::BigIncrements).unsigned().primary()
    }

    /// Unsigned big integer meant to hold another table's `id`.
    pub fn foreign_id(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::BigInteger).unsigned()
    }

    pub fn uuid(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Uuid)
    }

    // ========== Scalars ==========

    pub fn string(&mut self, name: &str, length: u16) -> &mut ColumnDefinition {
        self.column(name, ColumnType::String(length))
    }

    pub fn text(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Text)
    }

    pub fn integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Integer)
    }

    pub fn big_integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::BigInteger)
    }

    pub fn small_integer(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::SmallInteger)
    }

    pub fn decimal(&mut self, name: &str, precision: u8, scale: u8) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Decimal(precision, scale))
    }

    pub fn float(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Float)
    }

    pub fn boolean(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Boolean)
    }

    pub fn json(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Json)
    }

    pub fn enum_(&mut self, name: &str, allowed: &[&str]) -> &mut ColumnDefinition {
        let allowed = allowed.iter().map(|a| a.to_string()).collect();
        self.column(name, ColumnType::Enum(allowed))
    }

    pub fn date(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Date)
    }

    pub fn date_time(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::DateTime)
    }

    pub fn timestamp(&mut self, name: &str) -> &mut ColumnDefinition {
        self.column(name, ColumnType::Timestamp)
    }

    /// Nullable `created_at` and `updated_at`.
    pub fn timestamps(&mut self) {
        self.timestamp("created_at").nullable();
        self.timestamp("updated_at").nullable();
    }

    /// Nullable `deleted_at`.
    pub fn soft_deletes(&mut self) -> &mut ColumnDefinition {
        self.timestamp("deleted_at").nullable()
    }

    // ========== Indexes & constraints ==========

    pub fn primary(&mut self, columns: &[&str]) {
        self.add_index(IndexKind::Primary, columns);
    }

    pub fn unique(&mut self, columns: &[&str]) {
        self.add_index(IndexKind::Unique, columns);
    }

    pub fn index(&mut self, columns: &[&str]) {
        self.add_index(IndexKind::Index, columns);
    }

    fn add_index(&mut self, kind: IndexKind, columns: &[&str]) {
        self.indexes.push(IndexDefinition {
            kind,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
    }

    /// Start a foreign key on `column`; name the target with `references`/`on`.
    pub fn foreign(&mut self, column: &str) -> &mut ForeignKeyDefinition {
        let index = self.foreign_keys.len();
        self.foreign_keys.push(ForeignKeyDefinition::new(column));
        &mut self.foreign_keys[index]
    }

    /// Table-level foreign keys followed by column-level ones.
    pub(crate) fn foreign_key_definitions(&self) -> Vec<&ForeignKeyDefinition> {
        self.foreign_keys
            .iter()
            .chain(self.columns.iter().filter_map(|c| c.foreign.as_ref()))
            .collect()
    }

    // ========== Alterations ==========

    fn push_command(&mut self, command: Command) {
        self.steps.push(Step::Command(self.commands.len()));
        self.commands.push(command);
    }

    pub fn drop_column(&mut self, name: &str) {
        self.push_command(Command::DropColumn(name.to_string()));
    }

    pub fn rename_column(&mut self, from: &str, to: &str) {
        self.push_command(Command::RenameColumn {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    /// Drop an index by its full name (see [`IndexDefinition::name`]).
    pub fn drop_index(&mut self, name: &str) {
        self.push_command(Command::DropIndex(name.to_string()));
    }

    /// Drop a foreign key by its full name (see [`ForeignKeyDefinition::name`]).
    pub fn drop_foreign(&mut self, name: &str) {
        self.push_command(Command::DropForeign(name.to_string()));
    }
}
