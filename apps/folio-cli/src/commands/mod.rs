pub mod activity;
pub mod content;
pub mod review;

use std::fs;
use std::path::Path;

use folio_workspace::FrontMatter;

/// First seven characters of a commit id.
pub fn short(sha: &str) -> &str {
    &sha[..sha.len().min(7)]
}

/// Parse repeated `key=value` flags into front matter.
pub fn parse_front_matter(pairs: &[String]) -> anyhow::Result<FrontMatter> {
    let mut front = FrontMatter::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("expected key=value, got '{}'", pair))?;
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("empty front matter key in '{}'", pair);
        }
        front.insert(key.to_string(), value.to_string());
    }
    Ok(front)
}

/// Page body from `--body` or `--body-file`; empty when neither is given.
pub fn read_body(body: Option<&str>, body_file: Option<&Path>) -> anyhow::Result<String> {
    match (body, body_file) {
        (Some(_), Some(_)) => anyhow::bail!("pass either --body or --body-file, not both"),
        (Some(text), None) => Ok(text.to_string()),
        (None, Some(path)) => Ok(fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?),
        (None, None) => Ok(String::new()),
    }
}
