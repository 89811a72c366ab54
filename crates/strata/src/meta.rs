//! location tracking during normalisation
//!
//! A [Meta] is the [Root] document being normalised plus the path taken to reach the current value. The path
//! is a list of `(label, suffix)` segments: `at("images")` pushes `("images", "")` and `indexed_at(2)` pushes
//! `("", "[2]")`, so the rendered path reads `images[2]`.
use crate::value::Value;
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Rendered by [Meta::source] when the root can't say where a value came from
pub const UNKNOWN_SOURCE: &str = "<unknown>";

/// The whole document a [Meta] points into
pub trait Root: fmt::Debug + Send + Sync {
    /// Value at a dotted path
    fn lookup(&self, path: &str) -> Option<Value>;

    /// Name of the source that provided the value at `path`
    fn source_for(&self, _path: &str) -> anyhow::Result<String> {
        anyhow::bail!("root does not track sources")
    }

    /// Used for equality and ordering of [Meta]s
    fn describe(&self) -> String {
        format!("{self:?}")
    }
}

impl Root for Value {
    fn lookup(&self, path: &str) -> Option<Value> {
        self.get_path(path).cloned()
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

#[derive(Clone)]
pub struct Meta {
    root: Arc<dyn Root>,
    segments: Vec<(String, String)>,
}

impl Meta {
    pub fn new(root: impl Root + 'static) -> Self {
        Self::from_root(Arc::new(root))
    }

    pub fn from_root(root: Arc<dyn Root>) -> Self {
        Self {
            root,
            segments: Vec::new(),
        }
    }

    /// Rooted at an empty object
    pub fn empty() -> Self {
        Self::new(Value::Object(IndexMap::new()))
    }

    pub fn root(&self) -> &Arc<dyn Root> {
        &self.root
    }

    pub fn segments(&self) -> &[(String, String)] {
        &self.segments
    }

    fn push(&self, label: String, suffix: String) -> Self {
        let mut segments = self.segments.clone();
        segments.push((label, suffix));
        Self {
            root: Arc::clone(&self.root),
            segments,
        }
    }

    /// Descend into a key
    pub fn at(&self, key: impl Into<String>) -> Self {
        self.push(key.into(), String::new())
    }

    /// Descend into an index
    pub fn indexed_at(&self, index: usize) -> Self {
        self.push(String::new(), format!("[{index}]"))
    }

    /// Labels joined with `.`, suffixes appended directly
    pub fn path(&self) -> String {
        let mut complete = String::new();
        for (label, suffix) in &self.segments {
            if !label.is_empty() && !complete.is_empty() {
                complete.push('.');
            }
            complete.push_str(label);
            complete.push_str(suffix);
        }
        complete
    }

    /// Like [Meta::path] but without index suffixes, suitable for lookups in the root
    pub fn nonspecial_path(&self) -> String {
        self.segments
            .iter()
            .map(|(label, _)| label.as_str())
            .filter(|label| !label.is_empty())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Where the current value came from, [UNKNOWN_SOURCE] if the root can't tell
    pub fn source(&self) -> String {
        match self.root.source_for(&self.nonspecial_path()) {
            Ok(source) => source,
            Err(error) => {
                tracing::trace!(%error, path = %self.path(), "no source");
                UNKNOWN_SOURCE.to_string()
            }
        }
    }

    /// `_key_name_0` is the innermost label, `_key_name_1` its parent and so on
    pub fn key_names(&self) -> IndexMap<String, Value> {
        self.segments
            .iter()
            .rev()
            .enumerate()
            .map(|(index, (label, _))| (format!("_key_name_{index}"), Value::from(label.as_str())))
            .collect()
    }

    /// `{path=...}` or `{source=..., path=...}` when the source is known
    pub fn error_format(&self) -> String {
        let source = self.source();
        if source == UNKNOWN_SOURCE {
            format!("{{path={}}}", self.path())
        } else {
            format!("{{source={source}, path={}}}", self.path())
        }
    }
}

impl fmt::Debug for Meta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Meta").field("path", &self.path()).finish()
    }
}

impl PartialEq for Meta {
    fn eq(&self, other: &Self) -> bool {
        (Arc::ptr_eq(&self.root, &other.root) || self.root.describe() == other.root.describe())
            && self.path() == other.path()
    }
}

impl PartialOrd for Meta {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(
            self.root
                .describe()
                .cmp(&other.root.describe())
                .then_with(|| self.path().cmp(&other.path())),
        )
    }
}
