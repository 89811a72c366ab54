//! error reporting
//!
//! Every failure during normalisation or addon resolution is an [Error]: a [Kind], a message, a sorted
//! set of named fields and any number of nested errors. Errors render three ways
//! - [Error::oneline]: `"<description>. <message>"\tkey=value...`
//! - [std::fmt::Display]: the oneline followed by every nested error, indented
//! - [Error::as_dict]: structured json
//!
//! Mistakes in declarations (as opposed to bad input) are [ProgrammerError]s.
use crate::meta::Meta;
use std::collections::BTreeMap;
use std::fmt;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error taxonomy
///
/// Some kinds are refinements of others, see [Kind::is_a].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    BadSpec,
    BadSpecValue,
    BadDirectory,
    BadFilename,
    DeprecatedKey,
    BadSpecDefinition,
    BadOptionFormat,
    NoSuchAddon,
    BadImport,
    BadHook,
    DepCycle,
}

impl Kind {
    /// Fixed description printed in front of the message
    pub fn desc(self) -> &'static str {
        match self {
            Kind::BadSpec => "Something wrong with this specification",
            Kind::BadSpecValue => "Bad value",
            Kind::BadDirectory => "Expected a path to a directory",
            Kind::BadFilename => "Expected a path to a filename",
            Kind::DeprecatedKey => "Key is deprecated",
            Kind::BadSpecDefinition => "Spec isn't defined so well",
            Kind::BadOptionFormat => "",
            Kind::NoSuchAddon => "No such addon",
            Kind::BadImport => "Failed to import addon",
            Kind::BadHook => "Bad Hook",
            Kind::DepCycle => "",
        }
    }

    pub fn parent(self) -> Option<Kind> {
        match self {
            Kind::BadSpecValue => Some(Kind::BadSpec),
            Kind::BadDirectory
            | Kind::BadFilename
            | Kind::DeprecatedKey
            | Kind::BadSpecDefinition => Some(Kind::BadSpecValue),
            _ => None,
        }
    }

    /// `BadDirectory` is a `BadSpecValue` is a `BadSpec`
    pub fn is_a(self, other: Kind) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind == other {
                return true;
            }
            current = kind.parent();
        }
        false
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone)]
pub struct Error {
    kind: Kind,
    message: String,
    fields: BTreeMap<String, serde_json::Value>,
    errors: Vec<Error>,
}

impl Error {
    pub fn new(kind: Kind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            fields: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn bad_spec(message: impl Into<String>) -> Self {
        Self::new(Kind::BadSpec, message)
    }

    pub fn bad_spec_value(message: impl Into<String>) -> Self {
        Self::new(Kind::BadSpecValue, message)
    }

    pub fn bad_spec_definition(message: impl Into<String>) -> Self {
        Self::new(Kind::BadSpecDefinition, message)
    }

    pub fn bad_option_format(message: impl Into<String>) -> Self {
        Self::new(Kind::BadOptionFormat, message)
    }

    /// Attach a named field
    ///
    /// Values that can't be serialized are stored as their serialization error.
    pub fn with(mut self, key: impl Into<String>, value: impl serde::Serialize) -> Self {
        let value = serde_json::to_value(value)
            .unwrap_or_else(|error| serde_json::Value::String(error.to_string()));
        self.fields.insert(key.into(), value);
        self
    }

    /// Attach the location as the `meta` field
    pub fn meta(self, meta: &Meta) -> Self {
        let formatted = meta.error_format();
        self.with("meta", formatted)
    }

    pub fn with_errors(mut self, errors: Vec<Error>) -> Self {
        self.errors.extend(errors);
        self
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn is_a(&self, kind: Kind) -> bool {
        self.kind.is_a(kind)
    }

    pub fn is_bad_spec(&self) -> bool {
        self.is_a(Kind::BadSpec)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.fields
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    fn full_message(&self) -> String {
        let desc = self.kind.desc();
        match (desc.is_empty(), self.message.is_empty()) {
            (false, false) => format!("{desc}. {}", self.message),
            (false, true) => desc.to_string(),
            (true, _) => self.message.clone(),
        }
    }

    /// Single line summary: message in quotes followed by tab separated `key=value` fields
    pub fn oneline(&self) -> String {
        let info = self
            .fields
            .iter()
            .map(|(key, value)| format!("{key}={}", render_field(value)))
            .collect::<Vec<_>>()
            .join("\t");

        let message = self.full_message();
        match (message.is_empty(), info.is_empty()) {
            (false, false) => format!("\"{message}\"\t{info}"),
            (false, true) => format!("\"{message}\""),
            (true, _) => info,
        }
    }

    pub fn as_dict(&self) -> serde_json::Value {
        let mut dict = serde_json::Map::new();
        dict.insert(
            "message".to_string(),
            serde_json::Value::String(self.full_message()),
        );
        for (key, value) in &self.fields {
            dict.insert(key.clone(), value.clone());
        }
        if !self.errors.is_empty() {
            dict.insert(
                "errors".to_string(),
                self.errors.iter().map(Error::as_dict).collect(),
            );
        }
        serde_json::Value::Object(dict)
    }
}

fn render_field(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.oneline())?;
        if self.errors.is_empty() {
            return Ok(());
        }

        f.write_str("\nerrors:\n=======\n\n\t")?;
        let nested = self
            .errors
            .iter()
            .map(|error| format!("{}\n-------", error.to_string().replace('\n', "\n\t")))
            .collect::<Vec<_>>()
            .join("\n\t");
        f.write_str(&nested)
    }
}

impl std::error::Error for Error {}

impl PartialEq for Error {
    /// Nested errors compare regardless of their order
    fn eq(&self, other: &Self) -> bool {
        if self.kind != other.kind
            || self.message != other.message
            || self.fields != other.fields
            || self.errors.len() != other.errors.len()
        {
            return false;
        }

        let mut remaining: Vec<&Error> = other.errors.iter().collect();
        self.errors.iter().all(|error| {
            match remaining.iter().position(|candidate| *candidate == error) {
                Some(index) => {
                    remaining.swap_remove(index);
                    true
                }
                None => false,
            }
        })
    }
}

/// Mistakes made while declaring hooks and fields
#[derive(thiserror::Error, Debug)]
pub enum ProgrammerError {
    #[error("Sorry, can't specify extras and post_register at the same time")]
    ExtrasWithPostRegister,
    #[error("hook {hook} was declared {declared} but given a {given} function")]
    HookMismatch {
        hook: String,
        declared: &'static str,
        given: &'static str,
    },
    #[error("extras of hook {hook} are malformed: {error}")]
    BadExtras { hook: String, error: Error },
    #[error("after_format was specified when formatted was false")]
    AfterFormatWithoutFormatted,
}
