//! SQL identifier validation and quoting.
//!
//! Table and schema names come from configuration and end up in generated
//! statement text, so they are restricted to plain identifiers and always
//! emitted double-quoted. Values never go through here; they are bound as
//! positional parameters.

use once_cell::sync::Lazy;
use regex::Regex;

/// PostgreSQL truncates identifiers longer than this (NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_LEN: usize = 63;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"));

/// Whether `name` is a plain identifier safe to embed in statement text.
pub fn is_valid_identifier(name: &str) -> bool {
    name.len() <= MAX_IDENTIFIER_LEN && IDENTIFIER_RE.is_match(name)
}

/// Double-quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quote a string literal, doubling embedded quotes.
///
/// Only used for catalog lookups in installer DDL where the value is an
/// already-validated identifier.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `"schema"."table"`.
pub fn qualified_name(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(is_valid_identifier("moodle_events"));
        assert!(is_valid_identifier("_events2"));
        assert!(is_valid_identifier("Events"));
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("2events"));
        assert!(!is_valid_identifier("events; DROP TABLE x"));
        assert!(!is_valid_identifier("public.events"));
        assert!(!is_valid_identifier("ev\"ents"));
        assert!(!is_valid_identifier(&"a".repeat(64)));
        assert!(is_valid_identifier(&"a".repeat(63)));
    }

    #[test]
    fn test_quote_ident_doubles_quotes() {
        assert_eq!(quote_ident("events"), "\"events\"");
        assert_eq!(quote_ident("ev\"il"), "\"ev\"\"il\"");
    }

    #[test]
    fn test_quote_literal_doubles_quotes() {
        assert_eq!(quote_literal("public"), "'public'");
        assert_eq!(quote_literal("o'brien"), "'o''brien'");
    }

    #[test]
    fn test_qualified_name() {
        assert_eq!(
            qualified_name("public", "moodle_events"),
            "\"public\".\"moodle_events\""
        );
    }

    proptest! {
        #[test]
        fn quoted_ident_never_has_unpaired_quote(name in ".*") {
            let quoted = quote_ident(&name);
            let inner = &quoted[1..quoted.len() - 1];
            prop_assert_eq!(inner.replace("\"\"", "").contains('"'), false);
        }
    }
}
