// identity.rs — The author/committer attached to mutating git calls.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name and email recorded as author and committer on every commit, merge
/// and tag made through a [`crate::Git`] carrying this identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Identity for a user known only by email; the local part becomes the name.
    pub fn from_email(email: impl Into<String>) -> Self {
        let email = email.into();
        let name = email.split('@').next().unwrap_or_default().to_string();
        Self { name, email }
    }

    /// Environment variables that make git use this identity.
    pub(crate) fn env(&self) -> [(&'static str, &str); 4] {
        [
            ("GIT_AUTHOR_NAME", self.name.as_str()),
            ("GIT_AUTHOR_EMAIL", self.email.as_str()),
            ("GIT_COMMITTER_NAME", self.name.as_str()),
            ("GIT_COMMITTER_EMAIL", self.email.as_str()),
        ]
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_email_uses_local_part_as_name() {
        let id = Identity::from_email("erica@example.com");
        assert_eq!(id.name, "erica");
        assert_eq!(id.email, "erica@example.com");
        assert_eq!(id.to_string(), "erica <erica@example.com>");
    }

    #[test]
    fn env_sets_author_and_committer() {
        let id = Identity::new("Frances", "frances@example.com");
        let env = id.env();
        assert!(env.contains(&("GIT_AUTHOR_EMAIL", "frances@example.com")));
        assert!(env.contains(&("GIT_COMMITTER_NAME", "Frances")));
    }
}
