use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::network::range::Cidr;

/// A named range of managed devices, keyed by its canonical CIDR.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setup {
    pub iprange: String,
    pub name: String,
    pub slug: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl Setup {
    /// The CIDR is already validated by construction of `Cidr`.
    pub fn new(name: &str, cidr: &Cidr, now: DateTime<Utc>) -> Self {
        let name = name.trim();
        let name = if name.is_empty() {
            cidr.to_string()
        } else {
            name.to_string()
        };
        Self {
            iprange: cidr.to_string(),
            slug: slugify(&name),
            name,
            created: now,
            updated: now,
        }
    }

    pub fn rename(&mut self, name: &str, now: DateTime<Utc>) {
        self.name = name.trim().to_string();
        self.slug = slugify(&self.name);
        self.updated = now;
    }

    /// Whether `key` names this setup by CIDR, slug or display name.
    pub fn matches(&self, key: &str) -> bool {
        let key = key.trim();
        self.iprange == key || self.slug == key || self.name == key
    }
}

/// Lowercase ASCII alphanumerics joined by single dashes: `Gofre Hall #2` -> `gofre-hall-2`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(ch.to_ascii_lowercase());
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("setup");
    }
    slug
}
