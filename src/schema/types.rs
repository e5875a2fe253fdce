//! Column types.

use crate::dialect::Dialect;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    /// Auto-incrementing 32-bit integer
    Increments,
    /// Auto-incrementing 64-bit integer
    BigIncrements,
    Integer,
    BigInteger,
    SmallInteger,
    /// VARCHAR with a length limit
    String(u16),
    Text,
    /// DECIMAL(precision, scale)
    Decimal(u8, u8),
    Float,
    Boolean,
    Json,
    /// String restricted to the listed values
    Enum(Vec<String>),
    Date,
    DateTime,
    Timestamp,
    Uuid,
}

impl ColumnType {
    pub const fn is_auto_increment(&self) -> bool {
        matches!(self, Self::Increments | Self::BigIncrements)
    }

    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Increments
                | Self::BigIncrements
                | Self::Integer
                | Self::BigInteger
                | Self::SmallInteger
        )
    }

    /// The SQL type name. Auto-increment columns render their full
    /// key-generation clause separately, except on Postgres where the
    /// serial types carry it.
    ///
    /// SQLite keeps to its storage classes: booleans are integers, dates
    /// and JSON are text.
    pub fn sql_type(&self, dialect: Dialect) -> String {
        match dialect {
            Dialect::Sqlite => match self {
                Self::Increments
                | Self::BigIncrements
                | Self::Integer
                | Self::BigInteger
                | Self::SmallInteger
                | Self::Boolean => "INTEGER".to_string(),
                Self::String(len) => format!("VARCHAR({})", len),
                Self::Enum(_) => "VARCHAR(255)".to_string(),
                Self::Text | Self::Json | Self::Date | Self::DateTime | Self::Timestamp => {
                    "TEXT".to_string()
                }
                Self::Decimal(..) | Self::Float => "REAL".to_string(),
                Self::Uuid => "CHAR(36)".to_string(),
            },
            Dialect::Postgres => match self {
                Self::Increments => "SERIAL".to_string(),
                Self::BigIncrements => "BIGSERIAL".to_string(),
                Self::Integer => "INTEGER".to_string(),
                Self::BigInteger => "BIGINT".to_string(),
                Self::SmallInteger => "SMALLINT".to_string(),
                Self::String(len) => format!("VARCHAR({})", len),
                Self::Enum(_) => "VARCHAR(255)".to_string(),
                Self::Text => "TEXT".to_string(),
                Self::Decimal(p, s) => format!("DECIMAL({}, {})", p, s),
                Self::Float => "DOUBLE PRECISION".to_string(),
                Self::Boolean => "BOOLEAN".to_string(),
                Self::Json => "JSONB".to_string(),
                Self::Date => "DATE".to_string(),
                Self::DateTime | Self::Timestamp => "TIMESTAMP".to_string(),
                Self::Uuid => "UUID".to_string(),
            },
            Dialect::Mysql => match self {
                Self::Increments | Self::Integer => "INT".to_string(),
                Self::BigIncrements | Self::BigInteger => "BIGINT".to_string(),
                Self::SmallInteger => "SMALLINT".to_string(),
                Self::String(len) => format!("VARCHAR({})", len),
                Self::Enum(_) => "VARCHAR(255)".to_string(),
                Self::Text => "TEXT".to_string(),
                Self::Decimal(p, s) => format!("DECIMAL({}, {})", p, s),
                Self::Float => "DOUBLE".to_string(),
                Self::Boolean => "TINYINT(1)".to_string(),
                Self::Json => "JSON".to_string(),
                Self::Date => "DATE".to_string(),
                Self::DateTime => "DATETIME".to_string(),
                Self::Timestamp => "TIMESTAMP".to_string(),
                Self::Uuid => "CHAR(36)".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_types_per_dialect() {
        assert_eq!(ColumnType::BigIncrements.sql_type(Dialect::Postgres), "BIGSERIAL");
        assert_eq!(ColumnType::BigIncrements.sql_type(Dialect::Mysql), "BIGINT");
        assert_eq!(ColumnType::BigIncrements.sql_type(Dialect::Sqlite), "INTEGER");
        assert_eq!(ColumnType::Boolean.sql_type(Dialect::Sqlite), "INTEGER");
        assert_eq!(ColumnType::Json.sql_type(Dialect::Postgres), "JSONB");
        assert_eq!(ColumnType::Decimal(8, 2).sql_type(Dialect::Mysql), "DECIMAL(8, 2)");
        assert_eq!(ColumnType::String(100).sql_type(Dialect::Sqlite), "VARCHAR(100)");
    }
}
