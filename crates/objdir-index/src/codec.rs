//! Path codec
//!
//! Maps object paths onto the flat key space. Every directory level
//! `bucket/a/` owns three markers:
//!
//! - head `bucket/a/-` sorting before any child
//! - node `bucket/a/.child` (or `bucket/a/.child/` for a sub-directory)
//! - tail `bucket/a/~` sorting after any child
//!
//! The head and tail bracket the level so a short prefix scan can tell an
//! empty directory from a populated one.

use objdir_common::{Error, Result};

/// Head sentinel, appended to a level prefix
pub const HEAD_SENTINEL: char = '-';
/// Node marker, prepended to a child name
pub const NODE_MARKER: char = '.';
/// Tail sentinel, appended to a level prefix
pub const TAIL_SENTINEL: char = '~';

/// Value stored under head keys
pub const HEAD_VALUE: &[u8] = b"head";
/// Value stored under tail keys
pub const TAIL_VALUE: &[u8] = b"tail";
/// Value stored under node keys of ancestor directories
pub const PARENT_DIR_VALUE: &[u8] = b"parent_dir";

/// Kind of a marker key within one level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Head,
    Node,
    Tail,
}

/// The three markers of one directory level, for one child
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelMarkers {
    /// Level prefix, always ending in `/`
    pub prefix: String,
    /// `prefix` + head sentinel
    pub head: String,
    /// `prefix` + node marker + child name (`/`-terminated for directories)
    pub node: String,
    /// `prefix` + tail sentinel
    pub tail: String,
}

impl LevelMarkers {
    fn new(prefix: &str, child: &str, child_is_dir: bool) -> Self {
        let slash = if child_is_dir { "/" } else { "" };
        Self {
            prefix: prefix.to_string(),
            head: format!("{prefix}{HEAD_SENTINEL}"),
            node: format!("{prefix}{NODE_MARKER}{child}{slash}"),
            tail: format!("{prefix}{TAIL_SENTINEL}"),
        }
    }

    /// Keys in head, node, tail order
    pub fn keys(&self) -> [&str; 3] {
        [&self.head, &self.node, &self.tail]
    }
}

fn split_trailing_slash(path: &str) -> (&str, bool) {
    match path.strip_suffix('/') {
        Some(trimmed) => (trimmed, true),
        None => (path, false),
    }
}

/// Check that `path` names an object or directory below a bucket.
///
/// Accepts `bucket/x` and `bucket/x/` forms. Rejects paths without a
/// separator, with an empty bucket name, or with empty segments.
pub fn validate_path(path: &str) -> Result<()> {
    let (trimmed, _) = split_trailing_slash(path);
    if !trimmed.contains('/') {
        return Err(Error::malformed_path(path, "missing '/' separator"));
    }
    if trimmed.split('/').any(str::is_empty) {
        return Err(Error::malformed_path(path, "empty path segment"));
    }
    Ok(())
}

/// Check that `path` names a bucket root, `bucket` or `bucket/`
pub fn validate_bucket_path(path: &str) -> Result<()> {
    let (trimmed, _) = split_trailing_slash(path);
    if trimmed.is_empty() {
        return Err(Error::malformed_path(path, "empty bucket name"));
    }
    if trimmed.contains('/') {
        return Err(Error::malformed_path(path, "not a bucket root"));
    }
    Ok(())
}

/// Number of separators in a path, ignoring a trailing one
pub fn depth(path: &str) -> usize {
    split_trailing_slash(path).0.matches('/').count()
}

/// Decompose a path into per-level markers, immediate parent first.
///
/// A path of depth `d` yields `d - 1` levels. The bucket root level is
/// never emitted. The innermost node keeps the path's own trailing slash;
/// every ancestor node is `/`-terminated.
pub fn decompose_levels(path: &str) -> Vec<LevelMarkers> {
    let (mut current, mut is_dir) = split_trailing_slash(path);
    let mut remaining = current.matches('/').count();
    let mut levels = Vec::with_capacity(remaining.saturating_sub(1));

    while remaining >= 2 {
        let Some(pos) = current.rfind('/') else {
            break;
        };
        levels.push(LevelMarkers::new(&current[..=pos], &current[pos + 1..], is_dir));
        current = &current[..pos];
        is_dir = true;
        remaining -= 1;
    }
    levels
}

/// Flat marker sequence: head, node, tail per level, immediate parent first
pub fn decompose(path: &str) -> Vec<String> {
    decompose_levels(path)
        .into_iter()
        .flat_map(|level| [level.head, level.node, level.tail])
        .collect()
}

/// Canonical node key under which a path's own entry lives.
///
/// `bucket/a/b/c.txt` maps to `bucket/a/b/.c.txt`, a directory path
/// `bucket/a/b/` to `bucket/a/.b/`, and a bucket root `bucket/` to
/// `.bucket/`.
pub fn node_key(path: &str) -> String {
    let (trimmed, is_dir) = split_trailing_slash(path);
    let slash = if is_dir { "/" } else { "" };
    match trimmed.rfind('/') {
        Some(pos) => format!(
            "{}{NODE_MARKER}{}{slash}",
            &trimmed[..=pos],
            &trimmed[pos + 1..]
        ),
        None => format!("{NODE_MARKER}{trimmed}{slash}"),
    }
}

/// Prefix of the level that contains `path`.
///
/// `bucket/a/b/c.txt` and `bucket/a/b/c/` are both in `bucket/a/b/`.
pub fn parent_prefix(path: &str) -> Option<&str> {
    let (trimmed, _) = split_trailing_slash(path);
    trimmed.rfind('/').map(|pos| &trimmed[..=pos])
}

/// True for the bucket root level, e.g. `bucket/`
pub fn is_bucket_root(prefix: &str) -> bool {
    depth(prefix) == 0
}

/// Head key of a level
pub fn head_key(prefix: &str) -> String {
    format!("{prefix}{HEAD_SENTINEL}")
}

/// Tail key of a level
pub fn tail_key(prefix: &str) -> String {
    format!("{prefix}{TAIL_SENTINEL}")
}

/// Classify a scanned key by the character right after the level prefix.
///
/// Returns `None` for keys outside the prefix and for keys that belong to
/// a deeper level, including the contents of dot-named sub-directories.
pub fn classify(key: &[u8], prefix: &str) -> Option<MarkerKind> {
    let rest = key.strip_prefix(prefix.as_bytes())?;
    match rest {
        [b'-'] => Some(MarkerKind::Head),
        [b'~'] => Some(MarkerKind::Tail),
        [b'.', name @ ..] => {
            let name = name.strip_suffix(b"/").unwrap_or(name);
            (!name.is_empty() && !name.contains(&b'/')).then_some(MarkerKind::Node)
        }
        _ => None,
    }
}

/// Child name and directory flag of a node key within `prefix`
pub fn child_of(key: &[u8], prefix: &str) -> Option<(String, bool)> {
    if classify(key, prefix)? != MarkerKind::Node {
        return None;
    }
    let name = &key[prefix.len() + 1..];
    let (name, is_dir) = match name.strip_suffix(b"/") {
        Some(trimmed) => (trimmed, true),
        None => (name, false),
    };
    Some((String::from_utf8_lossy(name).into_owned(), is_dir))
}

/// True if a stored value is a head, tail or ancestor placeholder
pub fn is_placeholder(value: &[u8]) -> bool {
    value == HEAD_VALUE || value == TAIL_VALUE || value == PARENT_DIR_VALUE
}
