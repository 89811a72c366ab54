//! specs that run values through a [Formatter]
use super::{string_spec, Spec, SpecFactory, SpecRef};
use crate::error::{Error, Result};
use crate::formatter::{Formatter, Options};
use crate::meta::Meta;
use crate::value::{Value, ValueType};
use std::fmt;
use std::sync::Arc;

/// Normalise with `spec`, then format the result
///
/// `after_format` is applied to the formatted value. Values the spec doesn't produce as a string skip
/// formatting and go straight to `after_format`.
#[derive(Clone)]
pub struct Formatted {
    spec: SpecRef,
    formatter: Arc<dyn Formatter>,
    expected_type: Option<ValueType>,
    after_format: Option<SpecFactory>,
}

impl Formatted {
    pub fn new(spec: SpecRef, formatter: Arc<dyn Formatter>) -> Self {
        Self {
            spec,
            formatter,
            expected_type: None,
            after_format: None,
        }
    }

    pub fn expected_type(mut self, expected_type: impl Into<Option<ValueType>>) -> Self {
        self.expected_type = expected_type.into();
        self
    }

    pub fn after_format(mut self, after_format: Option<SpecFactory>) -> Self {
        self.after_format = after_format;
        self
    }
}

impl fmt::Debug for Formatted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formatted")
            .field("spec", &self.spec)
            .field("formatter", &self.formatter)
            .field("expected_type", &self.expected_type)
            .field("after_format", &self.after_format.is_some())
            .finish()
    }
}

impl Spec for Formatted {
    fn normalise_either(&self, meta: &Meta, val: &Value) -> Result<Value> {
        let after_format = self.after_format.as_ref().map(|make| make());
        let specd = self.spec.normalise(meta, val.clone())?;

        if !matches!(specd, Value::String(_)) {
            if let Some(after_format) = &after_format {
                return after_format.normalise(meta, specd);
            }
        }

        let path = meta.path();
        let chain = if path.is_empty() { vec![] } else { vec![path] };
        let mut formatted = self.formatter.format(&Options::new(meta), specd, &chain)?;

        if let Some(after_format) = &after_format {
            formatted = after_format.normalise(meta, formatted)?;
        }

        if let Some(expected_type) = self.expected_type {
            if !expected_type.matches(&formatted) {
                return Err(Error::bad_spec_value("Expected a different type")
                    .with("expected", expected_type)
                    .with("got", formatted.type_name())
                    .meta(meta));
            }
        }

        Ok(formatted)
    }

    fn fake(&self, meta: &Meta, with_non_defaulted: bool) -> Option<Value> {
        if !with_non_defaulted {
            return Some(Value::NotSpecified);
        }
        self.normalise_either(meta, &Value::NotSpecified)
            .inspect_err(|error| tracing::debug!(%error, path = %meta.path(), "couldn't fake a formatted value"))
            .ok()
    }
}

/// Formats a string until it stops changing, then looks up the key it names
///
/// `"images.{_key_name_1}.tag"` at `images.web` first becomes `"images.web.tag"` and the result is the value
/// found at that key. Revisiting an earlier output is a "Recursive formatting" error.
#[derive(Clone)]
pub struct ManyFormat {
    spec: SpecRef,
    formatter: Arc<dyn Formatter>,
    expected_type: Option<ValueType>,
}

impl ManyFormat {
    pub fn new(spec: SpecRef, formatter: Arc<dyn Formatter>) -> Self {
        Self {
            spec,
            formatter,
            expected_type: None,
        }
    }

    pub fn expected_type(mut self, expected_type: impl Into<Option<ValueType>>) -> Self {
        self.expected_type = expected_type.into();
        self
    }
}

impl fmt::Debug for ManyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManyFormat")
            .field("spec", &self.spec)
            .field("formatter", &self.formatter)
            .field("expected_type", &self.expected_type)
            .finish()
    }
}

impl Spec for ManyFormat {
    fn normalise_either(&self, meta: &Meta, val: &Value) -> Result<Value> {
        let mut val = self.spec.normalise(meta, val.clone())?;
        let once = Formatted::new(string_spec(), Arc::clone(&self.formatter))
            .expected_type(ValueType::String);

        let mut done: Vec<Value> = Vec::new();
        loop {
            let normalised = once.normalise(meta, val.clone())?;
            if normalised == val {
                break;
            }

            let seen = done.contains(&normalised);
            done.push(normalised.clone());
            if seen {
                return Err(Error::bad_spec_value("Recursive formatting")
                    .with("done", &done)
                    .meta(meta));
            }
            val = normalised;
        }

        tracing::trace!(%val, path = %meta.path(), "formatting stabilised");
        Formatted::new(string_spec(), Arc::clone(&self.formatter))
            .expected_type(self.expected_type)
            .normalise(meta, Value::String(format!("{{{val}}}")))
    }

    fn fake(&self, meta: &Meta, with_non_defaulted: bool) -> Option<Value> {
        if !with_non_defaulted {
            return Some(Value::NotSpecified);
        }
        self.normalise_either(meta, &Value::NotSpecified)
            .inspect_err(|error| tracing::debug!(%error, path = %meta.path(), "couldn't fake a formatted value"))
            .ok()
    }
}
