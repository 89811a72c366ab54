//! specs that wrap other specs
use super::{apply_validators, collect, Spec, SpecFactory, SpecRef};
use crate::error::{Error, Result};
use crate::field::{FieldSpec, Schema};
use crate::formatter::Formatter;
use crate::meta::Meta;
use crate::validators::Validator;
use crate::value::{Value, ValueType};
use std::fmt;
use std::sync::Arc;

/// Uses `default` when the value is absent
#[derive(Debug, derive_new::new)]
pub struct Defaulted {
    spec: SpecRef,
    default: Value,
}

impl Spec for Defaulted {
    fn default(&self, _meta: &Meta) -> Option<Value> {
        Some(self.default.clone())
    }

    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        self.spec.normalise(meta, val)
    }
}

/// Fails when the value is absent
#[derive(Debug, derive_new::new)]
pub struct Required {
    spec: SpecRef,
}

impl Spec for Required {
    fn normalise_empty(&self, meta: &Meta) -> Result<Value> {
        Err(Error::bad_spec_value("Expected a value but got none").meta(meta))
    }

    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        self.spec.normalise(meta, val)
    }

    fn fake(&self, meta: &Meta, with_non_defaulted: bool) -> Option<Value> {
        Some(self.spec.fake_filled(meta, with_non_defaulted))
    }
}

/// Keeps an absent value absent instead of using the inner spec's default
#[derive(Debug, derive_new::new)]
pub struct OptionalSpec {
    spec: SpecRef,
}

impl Spec for OptionalSpec {
    fn normalise_empty(&self, _meta: &Meta) -> Result<Value> {
        Ok(Value::NotSpecified)
    }

    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        self.spec.normalise(meta, val)
    }

    fn fake(&self, meta: &Meta, with_non_defaulted: bool) -> Option<Value> {
        Some(self.spec.fake_filled(meta, with_non_defaulted))
    }
}

/// First spec that accepts the value wins
#[derive(Debug, derive_new::new)]
pub struct OrSpec {
    specs: Vec<SpecRef>,
}

impl Spec for OrSpec {
    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        let mut errors = Vec::new();
        for spec in &self.specs {
            if let Some(normalised) = collect(spec.normalise(meta, val.clone()), &mut errors)? {
                return Ok(normalised);
            }
        }

        Err(
            Error::bad_spec_value("Value doesn't match any of the options")
                .with("val", &val)
                .meta(meta)
                .with_errors(errors),
        )
    }
}

/// Every spec in turn, each receiving the previous result
#[derive(Debug, derive_new::new)]
pub struct AndSpec {
    specs: Vec<SpecRef>,
}

impl Spec for AndSpec {
    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        let mut transformations = vec![val.clone()];
        let mut errors = Vec::new();

        let mut current = val;
        for spec in &self.specs {
            match collect(spec.normalise(meta, current.clone()), &mut errors)? {
                Some(normalised) => {
                    transformations.push(normalised.clone());
                    current = normalised;
                }
                None => break,
            }
        }

        if !errors.is_empty() {
            return Err(
                Error::bad_spec_value("Value didn't match one of the options")
                    .with("transformations", &transformations)
                    .meta(meta)
                    .with_errors(errors),
            );
        }

        Ok(current)
    }
}

/// Picks a spec by the type of the value
pub struct MatchSpec {
    arms: Vec<(ValueType, SpecFactory)>,
    fallback: Option<SpecFactory>,
}

impl MatchSpec {
    pub fn new(arms: Vec<(ValueType, SpecFactory)>, fallback: Option<SpecFactory>) -> Self {
        Self { arms, fallback }
    }
}

impl fmt::Debug for MatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchSpec")
            .field("arms", &self.arms.iter().map(|(t, _)| t).collect::<Vec<_>>())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl Spec for MatchSpec {
    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        let arm = self
            .arms
            .iter()
            .find(|(value_type, _)| value_type.matches(&val))
            .map(|(_, make)| make)
            .or(self.fallback.as_ref());

        match arm {
            Some(make) => make().normalise(meta, val),
            None => Err(
                Error::bad_spec_value("Value doesn't match any of the options")
                    .with("got", val.type_name())
                    .with(
                        "expected",
                        self.arms.iter().map(|(t, _)| *t).collect::<Vec<_>>(),
                    )
                    .meta(meta),
            ),
        }
    }
}

/// What [CreateSpec::create] is handed
pub enum Creation<T> {
    /// Kept as it is
    Existing(T),
    Raw(Value),
}

impl<T> From<Value> for Creation<T> {
    fn from(val: Value) -> Self {
        Creation::Raw(val)
    }
}

/// Validates a value, then creates a `T` from its fields
///
/// Absent values skip the validators and are created from an empty object, so every field falls back to its
/// default.
pub struct CreateSpec<T> {
    fields: FieldSpec<T>,
    validators: Vec<Arc<dyn Validator>>,
}

impl<T: Schema + 'static> CreateSpec<T> {
    pub fn new(validators: Vec<Arc<dyn Validator>>) -> Self {
        Self {
            fields: FieldSpec::new(),
            validators,
        }
    }

    pub fn formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.fields = self.fields.formatter(formatter);
        self
    }

    pub fn create(&self, meta: &Meta, val: impl Into<Creation<T>>) -> Result<T> {
        match val.into() {
            Creation::Existing(created) => Ok(created),
            Creation::Raw(Value::NotSpecified) => self.fields.normalise(meta, Value::NotSpecified),
            Creation::Raw(val) => {
                let val = apply_validators(meta, val, &self.validators, None)?;
                self.fields.normalise(meta, val)
            }
        }
    }
}

impl<T> fmt::Debug for CreateSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateSpec")
            .field("fields", &self.fields)
            .field("validators", &self.validators)
            .finish()
    }
}

/// Nests as the object of normalised field values
impl<T> Spec for CreateSpec<T> {
    fn normalise_empty(&self, meta: &Meta) -> Result<Value> {
        Spec::normalise(&self.fields, meta, Value::NotSpecified)
    }

    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        let val = apply_validators(meta, val, &self.validators, None)?;
        Spec::normalise(&self.fields, meta, val)
    }

    fn fake(&self, meta: &Meta, with_non_defaulted: bool) -> Option<Value> {
        self.fields.fake(meta, with_non_defaulted)
    }
}

pub type Constructor = Arc<dyn Fn(&Meta, Value) -> Result<Value> + Send + Sync>;

/// Normalises with `spec` and hands the result to a constructor
pub struct ContainerSpec {
    spec: SpecRef,
    make: Constructor,
    created: Option<ValueType>,
}

impl ContainerSpec {
    pub fn new(
        spec: SpecRef,
        make: impl Fn(&Meta, Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            spec,
            make: Arc::new(make),
            created: None,
        }
    }

    /// Values of this type were already constructed and are returned as they are
    pub fn already_created(mut self, value_type: ValueType) -> Self {
        self.created = Some(value_type);
        self
    }
}

impl fmt::Debug for ContainerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerSpec")
            .field("spec", &self.spec)
            .field("created", &self.created)
            .finish_non_exhaustive()
    }
}

impl Spec for ContainerSpec {
    fn normalise(&self, meta: &Meta, val: Value) -> Result<Value> {
        if self.created.is_some_and(|created| created.matches(&val)) {
            return Ok(val);
        }
        (self.make)(meta, self.spec.normalise(meta, val)?)
    }

    fn fake(&self, meta: &Meta, with_non_defaulted: bool) -> Option<Value> {
        (self.make)(meta, self.spec.fake_filled(meta, with_non_defaulted))
            .inspect_err(|error| tracing::debug!(%error, path = %meta.path(), "couldn't fake a container"))
            .ok()
    }
}

/// Hands out [Delay]s instead of normalising straight away
#[derive(Debug, derive_new::new)]
pub struct Delayed {
    spec: SpecRef,
}

impl Delayed {
    pub fn normalise(&self, meta: &Meta, val: Value) -> Delay {
        Delay {
            spec: Arc::clone(&self.spec),
            meta: meta.clone(),
            pending: Pending::Normalise(val),
        }
    }

    pub fn fake(&self, meta: &Meta, with_non_defaulted: bool) -> Delay {
        Delay {
            spec: Arc::clone(&self.spec),
            meta: meta.clone(),
            pending: Pending::Fake(with_non_defaulted),
        }
    }
}

#[derive(Debug)]
enum Pending {
    Normalise(Value),
    Fake(bool),
}

/// A normalisation that happens when [Delay::run] is called
#[derive(Debug)]
pub struct Delay {
    spec: SpecRef,
    meta: Meta,
    pending: Pending,
}

impl Delay {
    pub fn run(self) -> Result<Value> {
        match self.pending {
            Pending::Normalise(val) => self.spec.normalise(&self.meta, val),
            Pending::Fake(with_non_defaulted) => Ok(self.spec.fake_filled(&self.meta, with_non_defaulted)),
        }
    }
}
