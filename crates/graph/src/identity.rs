use crate::facts::{ComponentFact, NodeKind};
use sha2::{Digest, Sha256};

/// Stable node id for a fact: a pure function of (kind, name, source_path).
///
/// Ids are lowercase `[a-z0-9_]` so they can be emitted as bare diagram tokens.
/// A fact without a name gets a synthetic id derived from its full content.
pub fn node_id(fact: &ComponentFact) -> String {
    if fact.name.trim().is_empty() {
        let canonical = serde_json::to_vec(fact).unwrap_or_default();
        return format!("{}_unnamed_{}", kind_slug(&fact.kind), short_hash(&canonical));
    }
    identity_key(&fact.kind, &fact.name, fact.source_path.as_deref())
}

pub fn identity_key(kind: &NodeKind, name: &str, source_path: Option<&str>) -> String {
    let mut id = format!("{}_{}", kind_slug(kind), slugify(name));
    if let Some(path) = source_path {
        id.push('_');
        id.push_str(&short_hash(normalize_path(path).as_bytes()));
    }
    id
}

pub fn kind_slug(kind: &NodeKind) -> String {
    slugify(kind.as_str())
}

/// Lowercase, `[a-z0-9_]`, no leading/trailing/double underscores
pub fn slugify(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }

    if slug.is_empty() {
        // Non-ASCII names still need a distinct token
        format!("h{}", short_hash(raw.as_bytes()))
    } else {
        slug
    }
}

/// Repository-relative, forward slashes, no `./` prefix, no trailing slash.
/// The repository root normalizes to the empty string.
pub fn normalize_path(raw: &str) -> String {
    let mut path = raw.trim().replace('\\', "/");
    while let Some(stripped) = path.strip_prefix("./") {
        path = stripped.to_string();
    }
    while path.ends_with('/') {
        path.pop();
    }
    if path == "." {
        path.clear();
    }
    path
}

fn short_hash(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .take(4)
        .map(|b| format!("{b:02x}"))
        .collect()
}
