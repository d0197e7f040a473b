//! LIKE pattern dialects.
//!
//! CQL writes "any run" as `%` and "one character" as `_`; the predicate tree
//! stores `*` and `.`. In both dialects a wildcard directly preceded by `!`
//! is escaped and passes through untouched.

const ESCAPE: char = '!';

/// Convert a CQL LIKE pattern to the tree's pattern dialect.
pub fn cql_to_internal(pattern: &str) -> String {
    translate(pattern, ('%', '*'), ('_', '.'))
}

/// Convert a tree pattern back to a CQL LIKE pattern.
pub fn internal_to_cql(pattern: &str) -> String {
    translate(pattern, ('*', '%'), ('.', '_'))
}

fn translate(pattern: &str, any: (char, char), single: (char, char)) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut prev = None;
    for c in pattern.chars() {
        let escaped = prev == Some(ESCAPE);
        let mapped = match c {
            c if c == any.0 && !escaped => any.1,
            c if c == single.0 && !escaped => single.1,
            c => c,
        };
        out.push(mapped);
        prev = Some(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cql_to_internal() {
        assert_eq!(cql_to_internal("ab%cd_"), "ab*cd.");
        assert_eq!(cql_to_internal("%"), "*");
        assert_eq!(cql_to_internal(""), "");
    }

    #[test]
    fn test_internal_to_cql() {
        assert_eq!(internal_to_cql("ab*cd."), "ab%cd_");
        assert_eq!(internal_to_cql("*.*"), "%_%");
    }

    #[test]
    fn test_escaped_wildcards_pass_through() {
        assert_eq!(cql_to_internal("100!% sure_"), "100!% sure.");
        assert_eq!(cql_to_internal("a!_b"), "a!_b");
        assert_eq!(internal_to_cql("a!*b!.c*"), "a!*b!.c%");
    }

    #[test]
    fn test_only_immediate_predecessor_escapes() {
        assert_eq!(cql_to_internal("!a%"), "!a*");
        assert_eq!(cql_to_internal("!!%"), "!!%");
    }

    #[test]
    fn test_non_ascii_is_preserved() {
        assert_eq!(cql_to_internal("Zürich%"), "Zürich*");
        assert_eq!(internal_to_cql("Genève."), "Genève_");
    }
}
