//! Validation rule parser using nom.
//!
//! # Syntax
//!
//! ```text
//! required|email|min:3|max:255|in:draft,published
//! ───┬──── ──┬── ──┬── ───┬─── ────────┬─────────
//!    │       │     │      │            └── Rule with a list parameter
//!    │       │     │      └── Rule with a numeric parameter
//!    │       │     └── Rules are separated by `|`
//!    │       └── Flag rule
//!    └── Flag rule
//! ```
//!
//! Rule names the validator does not know are kept as [`Rule::Unknown`] so
//! they can be reported and skipped at validation time.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1},
    combinator::{map, map_res, opt, recognize},
    error::{Error, ErrorKind},
    multi::separated_list1,
    sequence::{pair, preceded, tuple},
};

use crate::entity::validation::Rule;
use crate::error::{OrmError, OrmResult};

/// Parse a `|`-separated rule list.
pub fn parse_rules(input: &str) -> OrmResult<Vec<Rule>> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Vec::new());
    }

    match separated_list1(char('|'), parse_rule)(input) {
        Ok(("", rules)) => Ok(rules),
        Ok((remaining, _)) => Err(OrmError::Config(format!(
            "Invalid validation rules '{}': unexpected '{}' at offset {}",
            input,
            remaining,
            input.len() - remaining.len()
        ))),
        Err(e) => Err(OrmError::Config(format!(
            "Invalid validation rules '{}': {:?}",
            input, e
        ))),
    }
}

fn parse_rule(input: &str) -> IResult<&str, Rule> {
    let (input, _) = take_while(|c: char| c == ' ')(input)?;
    alt((parse_bound, parse_in, parse_named))(input)
}

/// `min:N` / `max:N`.
fn parse_bound(input: &str) -> IResult<&str, Rule> {
    let (input, (name, _, n)) = tuple((alt((tag("min"), tag("max"))), char(':'), parse_number))(input)?;
    let rule = if name == "min" { Rule::Min(n) } else { Rule::Max(n) };
    Ok((input, rule))
}

/// `in:a,b,c`.
fn parse_in(input: &str) -> IResult<&str, Rule> {
    map(
        preceded(
            tag("in:"),
            separated_list1(char(','), take_while1(|c: char| c != ',' && c != '|')),
        ),
        |options: Vec<&str>| Rule::In(options.into_iter().map(|o| o.trim().to_string()).collect()),
    )(input)
}

/// Parameterless rules, plus unknown rules with any parameter.
fn parse_named(input: &str) -> IResult<&str, Rule> {
    let start = input;
    let (input, name) = take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)?;
    let (input, param) = opt(preceded(char(':'), take_while(|c: char| c != '|')))(input)?;

    let rule = match (name, param) {
        ("required", None) => Rule::Required,
        ("email", None) => Rule::Email,
        ("numeric", None) => Rule::Numeric,
        ("integer", None) => Rule::Integer,
        ("string", None) => Rule::String,
        ("boolean", None) => Rule::Boolean,
        // A known rule with a missing or malformed parameter.
        ("min" | "max" | "in", _) => {
            return Err(nom::Err::Failure(Error::new(start, ErrorKind::Verify)));
        }
        (other, _) => Rule::Unknown(other.to_string()),
    };
    Ok((input, rule))
}

fn parse_number(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize(tuple((opt(char('-')), digit1, opt(pair(char('.'), digit1))))),
        |s: &str| s.parse::<f64>(),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let rules = parse_rules("required|email").unwrap();
        assert_eq!(rules, vec![Rule::Required, Rule::Email]);
    }

    #[test]
    fn test_parse_bounds() {
        let rules = parse_rules("string|min:3|max:2.5").unwrap();
        assert_eq!(rules, vec![Rule::String, Rule::Min(3.0), Rule::Max(2.5)]);
    }

    #[test]
    fn test_parse_in_list() {
        let rules = parse_rules("required|in:draft, published").unwrap();
        assert_eq!(
            rules,
            vec![
                Rule::Required,
                Rule::In(vec!["draft".to_string(), "published".to_string()])
            ]
        );
    }

    #[test]
    fn test_unknown_rule_is_kept() {
        let rules = parse_rules("required|confirmed|regex:abc").unwrap();
        assert_eq!(
            rules,
            vec![
                Rule::Required,
                Rule::Unknown("confirmed".into()),
                Rule::Unknown("regex".into())
            ]
        );
    }

    #[test]
    fn test_malformed_bound_is_rejected() {
        assert!(parse_rules("min:abc").is_err());
        assert!(parse_rules("max").is_err());
        assert!(parse_rules("required||email").is_err());
    }

    #[test]
    fn test_empty() {
        assert!(parse_rules("  ").unwrap().is_empty());
    }
}
