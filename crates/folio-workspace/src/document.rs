// document.rs — Content pages with YAML front matter.
//
// A page on disk looks like:
//
//   ---
//   layout: |-
//     article
//   title: |-
//     Hello
//   ---
//   Body text...
//
// Values are always written as YAML block literals so that multi-line
// strings and punctuation survive untouched, and so that a change to one
// key touches only that key's lines (which keeps git merges clean).

use std::collections::BTreeMap;

use serde_yaml::Value;

use crate::error::{Result, WorkspaceError};

/// Front-matter keys and their string values, rendered in key order.
pub type FrontMatter = BTreeMap<String, String>;

const MARKER: &str = "---\n";

/// A page: front matter plus body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub front_matter: FrontMatter,
    pub body: String,
}

impl Document {
    pub fn new(front_matter: FrontMatter, body: impl Into<String>) -> Self {
        Self {
            front_matter,
            body: body.into(),
        }
    }

    /// Split a page into front matter and body. Text without a leading
    /// `---` line is all body.
    pub fn parse(text: &str) -> Result<Self> {
        let Some(rest) = text.strip_prefix(MARKER) else {
            return Ok(Self::new(FrontMatter::new(), text));
        };

        let (yaml, body) = if let Some(rest_body) = rest.strip_prefix(MARKER) {
            ("", rest_body)
        } else if let Some(end) = rest.find("\n---\n") {
            (&rest[..=end], &rest[end + 5..])
        } else if let Some(yaml) = rest.strip_suffix("\n---") {
            (yaml, "")
        } else {
            return Err(WorkspaceError::FrontMatter(
                "front matter is not closed by a '---' line".to_string(),
            ));
        };

        Ok(Self::new(load_mapping(yaml)?, body))
    }

    /// Render the page back to text.
    pub fn render(&self) -> String {
        let mut out = String::from(MARKER);
        out.push_str(&render_block_yaml(
            self.front_matter.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        ));
        out.push_str(MARKER);
        out.push_str(&self.body);
        out
    }

    pub fn title(&self) -> Option<&str> {
        self.front_matter.get("title").map(String::as_str)
    }
}

/// Parse a YAML mapping into string values. Scalars are stringified; nested
/// structures are kept as their YAML text.
pub fn load_mapping(yaml: &str) -> Result<FrontMatter> {
    if yaml.trim().is_empty() {
        return Ok(FrontMatter::new());
    }

    let mapping = match serde_yaml::from_str::<Value>(yaml)? {
        Value::Mapping(mapping) => mapping,
        Value::Null => return Ok(FrontMatter::new()),
        other => {
            return Err(WorkspaceError::FrontMatter(format!(
                "expected a mapping, found {:?}",
                other
            )))
        }
    };

    let mut out = FrontMatter::new();
    for (key, value) in mapping {
        let key = scalar_to_string(key)?;
        out.insert(key, scalar_to_string(value)?);
    }
    Ok(out)
}

fn scalar_to_string(value: Value) -> Result<String> {
    Ok(match value {
        Value::String(s) => s,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(&other)?.trim_end().to_string(),
    })
}

/// Render key/value pairs as YAML with every value in block-literal style.
pub fn render_block_yaml<'a>(fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut out = String::new();
    for (key, value) in fields {
        out.push_str(&render_key(key));
        out.push(':');

        if value.is_empty() {
            out.push_str(" ''\n");
            continue;
        }

        // `|+` keeps a trailing newline, `|-` strips the one we add.
        let (chomp, content) = match value.strip_suffix('\n') {
            Some(stripped) => ('+', stripped),
            None => ('-', value),
        };
        let indent_hint = if content.starts_with(&[' ', '\n'][..]) { "2" } else { "" };
        out.push_str(&format!(" |{}{}\n", indent_hint, chomp));

        for line in content.split('\n') {
            if !line.is_empty() {
                out.push_str("  ");
                out.push_str(line);
            }
            out.push('\n');
        }
    }
    out
}

fn render_key(key: &str) -> String {
    let plain = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if plain {
        key.to_string()
    } else {
        format!("\"{}\"", key.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn front(pairs: &[(&str, &str)]) -> FrontMatter {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn renders_block_literals() {
        let doc = Document::new(front(&[("title", "Hello"), ("layout", "article")]), "Body\n");
        assert_eq!(
            doc.render(),
            "---\nlayout: |-\n  article\ntitle: |-\n  Hello\n---\nBody\n"
        );
    }

    #[test]
    fn awkward_values_survive_a_round_trip() {
        let values = [
            "multi\nline\nvalue",
            "ends with newline\n",
            "  leading spaces",
            "colons: and # hashes",
            "blank\n\nline inside",
            "",
        ];
        for value in values {
            let doc = Document::new(front(&[("title", value), ("odd key", "x")]), "body");
            let parsed = Document::parse(&doc.render()).unwrap();
            assert_eq!(parsed, doc, "value {:?}", value);
        }
    }

    #[test]
    fn text_without_front_matter_is_body() {
        let doc = Document::parse("just words\n").unwrap();
        assert!(doc.front_matter.is_empty());
        assert_eq!(doc.body, "just words\n");
    }

    #[test]
    fn plain_yaml_front_matter_is_accepted() {
        let doc =
            Document::parse("---\ntitle: Plain\ncount: 3\npublished: true\n---\nText").unwrap();
        assert_eq!(doc.title(), Some("Plain"));
        assert_eq!(doc.front_matter["count"], "3");
        assert_eq!(doc.front_matter["published"], "true");
        assert_eq!(doc.body, "Text");
    }

    #[test]
    fn unclosed_front_matter_is_an_error() {
        assert!(matches!(
            Document::parse("---\ntitle: x\nno end"),
            Err(WorkspaceError::FrontMatter(_))
        ));
    }

    #[test]
    fn non_mapping_front_matter_is_an_error() {
        assert!(Document::parse("---\n- a\n- b\n---\n").is_err());
    }
}
