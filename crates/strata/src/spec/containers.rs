//! specs for objects, lists and tuples
use super::{collect, dictionary_spec, expected, Spec, SpecRef};
use crate::error::{Error, Kind, Result};
use crate::meta::Meta;
use crate::value::{Value, ValueType};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

fn failed(meta: &Meta, errors: Vec<Error>) -> Error {
    Error::bad_spec_value("").meta(meta).with_errors(errors)
}

/// Any object, empty defaults to `{}`
#[derive(Debug)]
pub struct DictionarySpec;

impl Spec for DictionarySpec {
    fn default(&self, _meta: &Meta) -> Option<Value> {
        Some(Value::Object(IndexMap::new()))
    }

    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        match val {
            Value::Object(_) => Ok(val),
            other => Err(expected("Expected a dictionary", meta, &other)),
        }
    }
}

/// Object with every key normalised by one spec and every value by another
#[derive(Debug)]
pub struct DictOf {
    name_spec: SpecRef,
    value_spec: SpecRef,
    nested: bool,
}

impl DictOf {
    pub fn new(name_spec: SpecRef, value_spec: SpecRef) -> Self {
        Self {
            name_spec,
            value_spec,
            nested: false,
        }
    }

    /// Object values are normalised as another level of this spec
    pub fn nested(mut self) -> Self {
        self.nested = true;
        self
    }
}

impl Spec for DictOf {
    fn default(&self, _meta: &Meta) -> Option<Value> {
        Some(Value::Object(IndexMap::new()))
    }

    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        let Value::Object(object) = dictionary_spec().normalise(meta, val)? else {
            return Err(Error::bad_spec("Expected a dictionary").meta(meta));
        };

        tracing::trace!(path = %meta.path(), keys = object.len(), "normalising dictionary");
        let mut result = IndexMap::new();
        let mut errors = Vec::new();
        for (key, value) in object {
            let key_meta = meta.at(key.as_str());
            let Some(name) = collect(
                self.name_spec.normalise(&key_meta, Value::String(key)),
                &mut errors,
            )?
            else {
                continue;
            };

            let normalised = if self.nested && matches!(value, Value::Object(_)) {
                self.normalise(&key_meta, value)
            } else {
                self.value_spec.normalise(&key_meta, value)
            };

            if let Some(normalised) = collect(normalised, &mut errors)? {
                let name = match name {
                    Value::String(name) => name,
                    other => other.to_string(),
                };
                result.insert(name, normalised);
            }
        }

        if !errors.is_empty() {
            return Err(failed(meta, errors));
        }

        Ok(Value::Object(result))
    }
}

/// List of values all normalised by one spec, a single value becomes a list of one
#[derive(Debug)]
pub struct ListOf {
    spec: SpecRef,
    expect: Option<ValueType>,
}

impl ListOf {
    pub fn new(spec: SpecRef) -> Self {
        Self { spec, expect: None }
    }

    /// Items already of this type are kept as they are, everything the spec produces must be of this type
    pub fn expect(mut self, value_type: ValueType) -> Self {
        self.expect = Some(value_type);
        self
    }
}

impl Spec for ListOf {
    fn default(&self, _meta: &Meta) -> Option<Value> {
        Some(Value::List(Vec::new()))
    }

    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        if let Some(expect) = self.expect {
            if expect.matches(&val) && !matches!(val, Value::List(_)) {
                return Ok(Value::List(vec![val]));
            }
        }

        let items = match val {
            Value::List(items) => items,
            other => vec![other],
        };
        tracing::trace!(path = %meta.path(), items = items.len(), "normalising list");

        let mut result = Vec::with_capacity(items.len());
        let mut errors = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            if self.expect.is_some_and(|expect| expect.matches(&item)) {
                result.push(item);
                continue;
            }

            let item_meta = meta.indexed_at(index);
            let Some(normalised) = collect(self.spec.normalise(&item_meta, item), &mut errors)?
            else {
                continue;
            };

            if let Some(expect) = self.expect {
                if !expect.matches(&normalised) {
                    errors.push(
                        Error::bad_spec_value("Expected normaliser to create a specific object")
                            .with("expected", expect)
                            .with("got", normalised.type_name())
                            .meta(&item_meta),
                    );
                    continue;
                }
            }
            result.push(normalised);
        }

        if !errors.is_empty() {
            return Err(failed(meta, errors));
        }

        Ok(Value::List(result))
    }
}

/// Tuple of values all normalised by one spec, a single value becomes a tuple of one
#[derive(Debug, derive_new::new)]
pub struct TupleOf {
    spec: SpecRef,
}

impl Spec for TupleOf {
    fn default(&self, _meta: &Meta) -> Option<Value> {
        Some(Value::Tuple(Vec::new()))
    }

    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        let items = match val {
            Value::List(items) | Value::Tuple(items) => items,
            other => vec![other],
        };

        let mut result = Vec::with_capacity(items.len());
        let mut errors = Vec::new();
        for (index, item) in items.into_iter().enumerate() {
            if let Some(normalised) =
                collect(self.spec.normalise(&meta.indexed_at(index), item), &mut errors)?
            {
                result.push(normalised);
            }
        }

        if !errors.is_empty() {
            return Err(failed(meta, errors));
        }

        Ok(Value::Tuple(result))
    }
}

/// Object with a fixed set of keys, each with its own spec
///
/// Every declared key is present in the result, keys that are not declared are dropped.
#[derive(Debug, derive_new::new)]
pub struct SetOptions {
    options: IndexMap<String, SpecRef>,
}

impl SetOptions {
    pub fn options(&self) -> &IndexMap<String, SpecRef> {
        &self.options
    }
}

impl Spec for SetOptions {
    fn default(&self, _meta: &Meta) -> Option<Value> {
        Some(Value::Object(IndexMap::new()))
    }

    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        let Value::Object(mut object) = dictionary_spec().normalise(meta, val)? else {
            return Err(Error::bad_spec("Expected a dictionary").meta(meta));
        };
        tracing::trace!(path = %meta.path(), options = ?self.options.keys().collect::<Vec<_>>(), "setting options");

        let mut result = IndexMap::new();
        let mut errors = Vec::new();
        for (key, spec) in &self.options {
            let next = object.shift_remove(key).unwrap_or_default();
            if let Some(normalised) = collect(spec.normalise(&meta.at(key.as_str()), next), &mut errors)? {
                result.insert(key.clone(), normalised);
            }
        }

        if !errors.is_empty() {
            return Err(failed(meta, errors));
        }

        Ok(Value::Object(result))
    }

    fn fake(&self, meta: &Meta, with_non_defaulted: bool) -> Option<Value> {
        let mut result = IndexMap::new();
        for (key, spec) in &self.options {
            let fake = spec.fake_filled(&meta.at(key.as_str()), with_non_defaulted);
            if !fake.is_not_specified() || with_non_defaulted {
                result.insert(key.clone(), fake);
            }
        }
        Some(Value::Object(result))
    }
}

/// Tuple of an exact length, each position with its own spec
#[derive(Debug, derive_new::new)]
pub struct TupleSpec {
    specs: Vec<SpecRef>,
}

impl Spec for TupleSpec {
    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        let Value::Tuple(items) = val else {
            return Err(expected("Expected a tuple", meta, &val));
        };

        if items.len() != self.specs.len() {
            return Err(
                Error::bad_spec_value("Expected tuple to be of a particular length")
                    .with("expected", self.specs.len())
                    .with("got", items.len())
                    .meta(meta),
            );
        }

        let mut result = Vec::with_capacity(items.len());
        let mut errors = Vec::new();
        for (index, (spec, item)) in self.specs.iter().zip(items).enumerate() {
            match spec.normalise(&meta.indexed_at(index), item) {
                Ok(normalised) => result.push(normalised),
                Err(error) if error.is_a(Kind::BadSpecValue) => errors.push(error),
                Err(error) => return Err(error),
            }
        }

        if !errors.is_empty() {
            return Err(Error::bad_spec_value("Value failed some specifications")
                .meta(meta)
                .with_errors(errors));
        }

        Ok(Value::Tuple(result))
    }
}

pub type DictMaker = Arc<dyn Fn(&Meta, bool) -> Value + Send + Sync>;

/// Booleans are turned into an object by `dict_maker` before the spec sees them
pub struct DictFromBool {
    dict_maker: DictMaker,
    spec: SpecRef,
}

impl DictFromBool {
    pub fn new(dict_maker: DictMaker, spec: SpecRef) -> Self {
        Self { dict_maker, spec }
    }
}

impl fmt::Debug for DictFromBool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictFromBool")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

impl Spec for DictFromBool {
    fn normalise_empty(&self, meta: &Meta) -> Result<Value> {
        self.normalise_filled(meta, Value::Object(IndexMap::new()))
    }

    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        let val = match val {
            Value::Boolean(enabled) => (self.dict_maker)(meta, enabled),
            other => other,
        };
        self.spec.normalise(meta, val)
    }

    fn fake(&self, meta: &Meta, with_non_defaulted: bool) -> Option<Value> {
        Some(self.spec.fake_filled(meta, with_non_defaulted))
    }
}
