use once_cell::sync::Lazy;
use regex::Regex;

// Lone project ids of the form `domain.com:proj` contain the project
// delimiter themselves and have to be recognised before the generic split.
static DOMAIN_QUALIFIED_PROJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.-]+\.[\w.-]+:[\w-]*:?$").expect("pattern is well-formed"));

/// Split an identifier into `(project_id, dataset_id, table_id)` parts
/// without validating them; missing parts come back empty.
///
/// The project part is everything before the last `:`. Once a project is
/// known the dataset/table split is on the first `.`; for a bare string it
/// is on the last `.`, so that `a.b.c` reads its trailing word as the table.
pub fn parse_identifier(identifier: &str) -> (&str, &str, &str) {
    if DOMAIN_QUALIFIED_PROJECT.is_match(identifier) {
        return (identifier, "", "");
    }

    let (project_id, rest) = match identifier.rfind(':') {
        Some(position) => (&identifier[..position], &identifier[position + 1..]),
        None => ("", identifier),
    };

    let (dataset_id, table_id) = if !project_id.is_empty() {
        match rest.find('.') {
            Some(position) => (&rest[..position], &rest[position + 1..]),
            None => (rest, ""),
        }
    } else {
        match rest.rfind('.') {
            Some(position) => (&rest[..position], &rest[position + 1..]),
            None => ("", rest),
        }
    };

    (project_id, dataset_id, table_id)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_identifier() {
        let cases = [
            ("", ("", "", "")),
            ("prj:", ("prj", "", "")),
            ("prj:ds", ("prj", "ds", "")),
            ("prj:ds.tbl", ("prj", "ds", "tbl")),
            ("ds.", ("", "ds", "")),
            ("ds.tbl", ("", "ds", "tbl")),
            ("tbl", ("", "", "tbl")),
        ];
        for (identifier, expected) in cases {
            assert_eq!(parse_identifier(identifier), expected, "`{identifier}`");
        }
    }

    #[test]
    fn test_parse_domain_qualified_project() {
        let cases = [
            ("example.com:prj", ("example.com:prj", "", "")),
            // The whole string is the project id, trailing delimiter and all.
            ("example.com:prj:", ("example.com:prj:", "", "")),
            ("example.com:prj-2", ("example.com:prj-2", "", "")),
            ("www.example.com:prj", ("www.example.com:prj", "", "")),
            ("example.com:prj:ds", ("example.com:prj", "ds", "")),
            ("example.com:prj:ds.tbl", ("example.com:prj", "ds", "tbl")),
        ];
        for (identifier, expected) in cases {
            assert_eq!(parse_identifier(identifier), expected, "`{identifier}`");
        }
    }

    #[test]
    fn test_bare_dotted_string_prefers_trailing_table() {
        // Only one dot is meaningful; the rightmost split keeps the table.
        assert_eq!(parse_identifier("a.b.c"), ("", "a.b", "c"));
    }
}
