//! configuration documents from several sources
//!
//! A [Document] merges mappings from any number of sources into one [Value]. Objects are merged key by key,
//! anything else is replaced by the later source. For every dotted key the document remembers which source set it
//! last, so errors can point at the file a bad value came from (see [crate::Meta::source]).
use crate::meta::Root;
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct Document {
    sources: Vec<String>,
    value: IndexMap<String, Value>,
    origins: BTreeMap<String, usize>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a mapping into the document
    pub fn insert(&mut self, mapping: IndexMap<String, Value>, source: impl Into<String>) {
        let source_index = self.sources.len();
        self.sources.push(source.into());

        for (key, value) in mapping {
            self.record(&key, &value, source_index);
            match self.value.get_mut(&key) {
                Some(existing) => merge(existing, value),
                None => {
                    self.value.insert(key, value);
                }
            }
        }
    }

    fn record(&mut self, path: &str, value: &Value, source_index: usize) {
        self.origins.insert(path.to_string(), source_index);
        match value {
            Value::Object(object) => {
                for (key, value) in object {
                    self.record(&format!("{path}.{key}"), value, source_index);
                }
            }
            // anything but an object replaces what was there, nested keys included
            _ => {
                let nested = format!("{path}.");
                self.origins.retain(|key, _| !key.starts_with(&nested));
            }
        }
    }

    fn insert_value(&mut self, value: Value, source: String) -> Result<(), LoadError> {
        match value {
            Value::Object(mapping) => {
                self.insert(mapping, source);
                Ok(())
            }
            other => Err(LoadError::NotAMapping {
                source_name: source,
                got: other.type_name(),
            }),
        }
    }

    pub fn parse_hcl(&mut self, text: &str, source: impl Into<String>) -> Result<(), LoadError> {
        let value: hcl::Value = hcl::from_str(text)?;
        self.insert_value(value.into(), source.into())
    }

    pub fn parse_yaml(&mut self, text: &str, source: impl Into<String>) -> Result<(), LoadError> {
        let value: serde_yaml::Value = serde_yaml::from_str(text)?;
        self.insert_value(value.into(), source.into())
    }

    pub fn parse_json(&mut self, text: &str, source: impl Into<String>) -> Result<(), LoadError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        self.insert_value(value.into(), source.into())
    }

    /// Loads `.hcl`, `.yaml`/`.yml` or `.json` files
    pub fn load_file(&mut self, file_path: &Path) -> Result<(), LoadError> {
        let file_path = file_path.canonicalize()?;
        tracing::info!(path=%file_path.display(), "loading file");

        let extension = file_path
            .extension()
            .and_then(|extension| extension.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let file_contents = std::fs::read_to_string(&file_path)?;
        let source = file_path.display().to_string();

        match extension.as_str() {
            "hcl" => self.parse_hcl(&file_contents, source),
            "yaml" | "yml" => self.parse_yaml(&file_contents, source),
            "json" => self.parse_json(&file_contents, source),
            _ => Err(LoadError::UnknownExtension(file_path)),
        }
    }

    pub fn value(&self) -> Value {
        Value::Object(self.value.clone())
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Source that set the most specific key leading to `path`
    pub fn source_of(&self, path: &str) -> Option<&str> {
        let mut candidate = path;
        loop {
            if let Some(index) = self.origins.get(candidate) {
                return self.sources.get(*index).map(String::as_str);
            }
            candidate = &candidate[..candidate.rfind('.')?];
        }
    }
}

fn merge(existing: &mut Value, value: Value) {
    match (existing, value) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(current) => merge(current, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (existing, value) => *existing = value,
    }
}

impl Root for Document {
    fn lookup(&self, path: &str) -> Option<Value> {
        if let Some(value) = self.value.get(path) {
            return Some(value.clone());
        }
        let (first, rest) = path.split_once('.')?;
        self.value.get(first)?.get_path(rest).cloned()
    }

    fn source_for(&self, path: &str) -> anyhow::Result<String> {
        self.source_of(path)
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("no source set {path}"))
    }

    fn describe(&self) -> String {
        format!("Document({})", self.sources.join(", "))
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Unable to parse hcl")]
    HclParseFailed(#[from] hcl::Error),
    #[error("Unable to parse yaml")]
    YamlParseFailed(#[from] serde_yaml::Error),
    #[error("Unable to parse json")]
    JsonParseFailed(#[from] serde_json::Error),
    #[error("{source_name} must contain a mapping, got {got}")]
    NotAMapping {
        source_name: String,
        got: &'static str,
    },
    #[error("Don't know how to load {0}")]
    UnknownExtension(PathBuf),
}

/// Utility macro to create a [Document] from hcl
///
/// A single document
/// ```
/// # use strata::document;
/// document!("attribute = 42");
/// ```
///
/// Several documents, each with a source name
/// ```
/// # use strata::document;
/// document! {
///   "one.hcl" => "attribute_one = 1",
///   "two.hcl" => "attribute_two = 2"
/// };
/// ```
///
/// # Panic
/// Panics on invalid input
///
/// ```should_panic
/// # use strata::document;
/// document!("not = valid = hcl");
/// ```
#[macro_export]
macro_rules! document {
    { $expr:expr } => {
        $crate::document! { "<inline>" => $expr }
    };
    { $($source:expr => $expr:expr),+ } => {{
        let mut document = $crate::document::Document::default();
        $(
            document.parse_hcl($expr, $source).expect("document must parse");
        )+
        document
    }};
}
