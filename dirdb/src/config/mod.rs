// Config file I/O - line-oriented key=value / key: value parsing

use crate::error::Result;
use std::path::Path;

/// Ordered key/value pairs parsed from a config file.
/// Keys keep their dotted form; [`ConfigMap::to_nested`] builds the
/// structured view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigMap {
    pairs: Vec<(String, String)>,
}

impl ConfigMap {
    /// All pairs in file order. A key repeated in the file appears once
    /// per occurrence; consumers that want a map take the last occurrence.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Look up a key, last occurrence wins.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Expand dotted keys into a nested JSON object.
    /// `a.b.c = 1` becomes `{"a": {"b": {"c": "1"}}}`; later pairs win on
    /// conflicting paths.
    pub fn to_nested(&self) -> serde_json::Value {
        let mut root = serde_json::Map::new();
        for (key, value) in &self.pairs {
            insert_dotted(&mut root, key, value);
        }
        serde_json::Value::Object(root)
    }
}

fn insert_dotted(map: &mut serde_json::Map<String, serde_json::Value>, key: &str, value: &str) {
    match key.split_once('.') {
        None => {
            map.insert(key.to_string(), serde_json::Value::String(value.to_string()));
        }
        Some((head, rest)) => {
            let entry = map
                .entry(head.to_string())
                .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
            if !entry.is_object() {
                *entry = serde_json::Value::Object(serde_json::Map::new());
            }
            if let serde_json::Value::Object(child) = entry {
                insert_dotted(child, rest, value);
            }
        }
    }
}

/// Parse config text into ordered key/value pairs.
/// Blank lines and `#` comments are skipped. A line splits at whichever of
/// `=` or `:` occurs first; lines with neither are skipped. One matching
/// pair of surrounding quotes is stripped from the value. Pairs with an
/// empty key or value are dropped.
pub fn parse_config_str(text: &str) -> ConfigMap {
    let mut pairs = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = split_line(line) else {
            continue;
        };
        let key = key.trim();
        let value = strip_quotes(value.trim());
        if key.is_empty() || value.is_empty() {
            continue;
        }
        pairs.push((key.to_string(), value.to_string()));
    }
    ConfigMap { pairs }
}

/// Parse a config file. Missing file is an IO error; callers that treat the
/// file as optional check existence first.
pub fn parse_config_file(path: &Path) -> Result<ConfigMap> {
    let text = std::fs::read_to_string(path)?;
    Ok(parse_config_str(&text))
}

/// Split at the earliest delimiter on the line, `=` or `:`.
fn split_line(line: &str) -> Option<(&str, &str)> {
    let pos = match (line.find('='), line.find(':')) {
        (Some(eq), Some(colon)) => eq.min(colon),
        (Some(eq), None) => eq,
        (None, Some(colon)) => colon,
        (None, None) => return None,
    };
    Some((&line[..pos], &line[pos + 1..]))
}

/// Strip one matching pair of surrounding quotes (single or double).
fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_both_delimiters() {
        let map = parse_config_str("db.name=Foo\ndb.version: 1.0\n");
        assert_eq!(
            map.pairs(),
            &[
                ("db.name".to_string(), "Foo".to_string()),
                ("db.version".to_string(), "1.0".to_string()),
            ]
        );
    }

    #[test]
    fn test_skips_comments_and_blank_lines() {
        let map = parse_config_str("# comment\n\n  \nkey=value\n");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("key"), Some("value"));
    }

    #[test]
    fn test_skips_malformed_lines() {
        let map = parse_config_str("no delimiter here\nkey=value\n");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_earliest_delimiter_wins() {
        // A colon before the '=' belongs to the key/value split, not the value
        let map = parse_config_str("note: a=b\nurl=http://example.com\n");
        assert_eq!(map.get("note"), Some("a=b"));
        assert_eq!(map.get("url"), Some("http://example.com"));
    }

    #[test]
    fn test_strips_matching_quotes() {
        let map = parse_config_str("a=\"quoted\"\nb='single'\nc=\"mismatched'\n");
        assert_eq!(map.get("a"), Some("quoted"));
        assert_eq!(map.get("b"), Some("single"));
        assert_eq!(map.get("c"), Some("\"mismatched'"));
    }

    #[test]
    fn test_drops_empty_key_or_value() {
        let map = parse_config_str("=value\nkey=\nok=1\n");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("ok"), Some("1"));
    }

    #[test]
    fn test_last_occurrence_wins() {
        let map = parse_config_str("key=first\nkey=second\n");
        assert_eq!(map.get("key"), Some("second"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_to_nested() {
        let map = parse_config_str("db.name=Foo\ndb.pool.size=4\ntop=1\n");
        let nested = map.to_nested();
        assert_eq!(nested["db"]["name"], "Foo");
        assert_eq!(nested["db"]["pool"]["size"], "4");
        assert_eq!(nested["top"], "1");
    }

    #[test]
    fn test_to_nested_leaf_then_branch() {
        // A later deeper path replaces the earlier leaf
        let map = parse_config_str("a=1\na.b=2\n");
        let nested = map.to_nested();
        assert_eq!(nested["a"]["b"], "2");
    }
}
