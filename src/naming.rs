//! Naming conventions: table names, foreign keys, pivot tables and
//! migration class names are all derived from type names.

use heck::{ToSnakeCase, ToUpperCamelCase};

/// `BlogPost` -> `blog_post`.
pub fn snake(name: &str) -> String {
    name.to_snake_case()
}

/// `create_users_table` -> `CreateUsersTable`.
pub fn pascal(name: &str) -> String {
    name.to_upper_camel_case()
}

/// English plural of a lower-case word.
pub fn plural(word: &str) -> String {
    if word.is_empty() {
        return String::new();
    }
    let consonant_y = word.ends_with('y')
        && !word[..word.len() - 1].ends_with(['a', 'e', 'i', 'o', 'u']);
    if consonant_y {
        format!("{}ies", &word[..word.len() - 1])
    } else if word.ends_with(['s', 'x', 'z']) || word.ends_with("ch") || word.ends_with("sh") {
        format!("{}es", word)
    } else {
        format!("{}s", word)
    }
}

/// Default table for an entity type: `Category` -> `categories`.
pub fn table_name(type_name: &str) -> String {
    let snake = snake(type_name);
    match snake.rsplit_once('_') {
        Some((head, last)) => format!("{}_{}", head, plural(last)),
        None => plural(&snake),
    }
}

/// Default foreign key pointing at an entity type: `Account` -> `account_id`.
pub fn foreign_key(type_name: &str) -> String {
    format!("{}_id", snake(type_name))
}

/// Default pivot table joining two entity types, alphabetical: `post_tag`.
pub fn pivot_table(a: &str, b: &str) -> String {
    let mut names = [snake(a), snake(b)];
    names.sort();
    names.join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_name() {
        assert_eq!(table_name("Account"), "accounts");
        assert_eq!(table_name("Category"), "categories");
        assert_eq!(table_name("Box"), "boxes");
        assert_eq!(table_name("Day"), "days");
        assert_eq!(table_name("BlogPost"), "blog_posts");
        assert_eq!(table_name("Branch"), "branches");
    }

    #[test]
    fn test_foreign_key() {
        assert_eq!(foreign_key("Account"), "account_id");
        assert_eq!(foreign_key("BlogPost"), "blog_post_id");
    }

    #[test]
    fn test_pivot_table_is_alphabetical() {
        assert_eq!(pivot_table("Tag", "Post"), "post_tag");
        assert_eq!(pivot_table("Post", "Tag"), "post_tag");
        assert_eq!(pivot_table("Role", "Account"), "account_role");
    }

    #[test]
    fn test_pascal() {
        assert_eq!(pascal("create_users_table"), "CreateUsersTable");
    }
}
