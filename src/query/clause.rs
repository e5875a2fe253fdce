//! Predicate, ordering and visibility types accumulated by the query builder.

use std::fmt;
use std::str::FromStr;

use crate::value::Value;

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
        }
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "=" | "==" => Ok(Operator::Eq),
            "!=" | "<>" => Ok(Operator::Ne),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Lte),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Gte),
            "like" => Ok(Operator::Like),
            "not like" => Ok(Operator::NotLike),
            other => Err(format!("Invalid operator: '{}'", other)),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// `column IN (SELECT select FROM table WHERE column = value)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Subquery {
    pub table: String,
    pub select: String,
    pub column: String,
    pub value: Value,
}

/// One WHERE predicate. Predicates are always joined with AND.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: String,
        op: Operator,
        value: Value,
    },
    In {
        column: String,
        values: Vec<Value>,
        negated: bool,
    },
    Between {
        column: String,
        low: Value,
        high: Value,
    },
    /// Compares only the date part of `column`.
    Date {
        column: String,
        op: Operator,
        value: Value,
    },
    Null {
        column: String,
        negated: bool,
    },
    InSubquery {
        column: String,
        subquery: Subquery,
    },
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(format!("Invalid sort direction: '{}'", other)),
        }
    }
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderClause {
    pub column: String,
    pub direction: Direction,
}

/// Which soft-deleted rows a query sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrashedMode {
    /// Exclude soft-deleted rows.
    #[default]
    Default,
    WithTrashed,
    OnlyTrashed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_from_str() {
        assert_eq!("=".parse::<Operator>(), Ok(Operator::Eq));
        assert_eq!("<>".parse::<Operator>(), Ok(Operator::Ne));
        assert_eq!("NOT LIKE".parse::<Operator>(), Ok(Operator::NotLike));
        assert!("~".parse::<Operator>().is_err());
    }

    #[test]
    fn test_direction_case_insensitive() {
        assert_eq!("DESC".parse::<Direction>(), Ok(Direction::Desc));
        assert_eq!("Asc".parse::<Direction>(), Ok(Direction::Asc));
        assert!("sideways".parse::<Direction>().is_err());
    }
}
