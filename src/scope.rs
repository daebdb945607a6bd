use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::OAuthError;

/// Closed scope vocabulary. Free-form scope strings don't exist here:
/// anything a client can be granted has to be listed below, so a typo'd or
/// made-up scope dies at the parse boundary instead of in a policy check.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Read,
    Write,
    Profile,
    Admin,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Read => "read",
            Scope::Write => "write",
            Scope::Profile => "profile",
            Scope::Admin => "admin",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = OAuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Scope::Read),
            "write" => Ok(Scope::Write),
            "profile" => Ok(Scope::Profile),
            "admin" => Ok(Scope::Admin),
            other => Err(OAuthError::InvalidScope(format!("unknown scope '{other}'"))),
        }
    }
}

/// A set of scopes. Backed by a `BTreeSet` so the rendered form is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSet(BTreeSet<Scope>);

impl ScopeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the RFC 6749 space-separated wire form, e.g. `"read write"`.
    pub fn parse(s: &str) -> Result<Self, OAuthError> {
        s.split_whitespace().map(Scope::from_str).collect()
    }

    pub fn contains(&self, scope: Scope) -> bool {
        self.0.contains(&scope)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Scope> + '_ {
        self.0.iter().copied()
    }

    /// Accept `requested` only if every requested scope is already in
    /// `self`. Reports the first scope that isn't.
    pub fn authorize_subset(&self, requested: &ScopeSet) -> Result<(), OAuthError> {
        for scope in &requested.0 {
            if !self.0.contains(scope) {
                return Err(OAuthError::InvalidScope(format!(
                    "requested scope '{scope}' is not authorized for this token"
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for scope in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            write!(f, "{scope}")?;
        }
        Ok(())
    }
}

impl FromIterator<Scope> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = Scope>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
