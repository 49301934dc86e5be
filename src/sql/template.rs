//! SQL templating
//!
//! Templates use Jinja syntax (`{{ name }}`). [`render`] quotes values that
//! are not numbers; [`render_raw`] substitutes them untouched.

use crate::error::Result;
use minijinja::Environment;
use std::collections::BTreeMap;
use std::path::Path;

/// Template variables by name
pub type Variables = BTreeMap<String, String>;

/// Numbers pass through; anything else becomes a single-quoted SQL string
/// literal with embedded quotes doubled.
pub fn quote_value(value: &str) -> String {
    if value.trim().parse::<f64>().is_ok() {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "''"))
    }
}

/// Render with values quoted by [`quote_value`]
pub fn render(template: &str, variables: &Variables) -> Result<String> {
    let quoted: Variables = variables
        .iter()
        .map(|(k, v)| (k.clone(), quote_value(v)))
        .collect();
    render_raw(template, &quoted)
}

/// Render with values substituted as given
pub fn render_raw(template: &str, variables: &Variables) -> Result<String> {
    let env = Environment::new();
    Ok(env.render_str(template, variables)?)
}

/// Read a template file and [`render`] it
pub fn render_file(path: &Path, variables: &Variables) -> Result<String> {
    let template = std::fs::read_to_string(path)?;
    render(&template, variables)
}

/// Split a script on `;`, trimming and dropping empty statements
pub fn split_statements(script: &str) -> Vec<String> {
    script
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Statements whose result set is kept
pub fn returns_rows(statement: &str) -> bool {
    let lower = statement.trim_start().to_ascii_lowercase();
    lower.starts_with("select") || lower.starts_with("with")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_quotes_non_numeric() {
        let sql = render(
            "SELECT * FROM t WHERE d >= {{ start }} AND id = {{ id }} AND r > {{ rate }}",
            &vars(&[("start", "2024-01-01"), ("id", "42"), ("rate", "-0.5")]),
        )
        .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM t WHERE d >= '2024-01-01' AND id = 42 AND r > -0.5"
        );
    }

    #[test]
    fn test_render_raw_keeps_values() {
        let sql = render_raw("SELECT {{ cols }} FROM {{ table }}", &vars(&[("cols", "a, b"), ("table", "t")]))
            .unwrap();
        assert_eq!(sql, "SELECT a, b FROM t");
    }

    #[test]
    fn test_embedded_quote() {
        assert_eq!(quote_value("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn test_split_statements() {
        let statements = split_statements("USE db;\n\n  SELECT 1 ; ;\nwith x as (select 1) select * from x;");
        assert_eq!(statements.len(), 3);
        assert_eq!(statements[0], "USE db");
        assert!(returns_rows(&statements[1]));
        assert!(returns_rows(&statements[2]));
        assert!(!returns_rows(&statements[0]));
    }

    #[test]
    fn test_render_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("q.sql");
        std::fs::write(&path, "SELECT * FROM t WHERE name = {{ name }}").unwrap();
        let sql = render_file(&path, &vars(&[("name", "abc")])).unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE name = 'abc'");
    }
}
