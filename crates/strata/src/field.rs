//! declarative fields
//!
//! A type describes its shape as a [Fields] table, one [Field] per key. [FieldSpec] builds a spec from the
//! table and creates the type from the normalised values:
//!
//! ```
//! use strata::field::{Field, FieldSpec, FieldValues, Fields, Schema};
//! use strata::spec::{integer_spec, required, string_spec};
//! use strata::{Meta, Result, Value};
//!
//! struct Server {
//!     name: String,
//!     port: i64,
//! }
//!
//! impl Schema for Server {
//!     fn fields() -> Fields {
//!         Fields::new()
//!             .field("name", Field::new(string_spec).wrapper(required))
//!             .field("port", Field::new(integer_spec).default(8080))
//!     }
//!
//!     fn create(mut values: FieldValues) -> Result<Self> {
//!         Ok(Self {
//!             name: values.string("name")?,
//!             port: values.integer("port")?,
//!         })
//!     }
//! }
//!
//! let server = FieldSpec::<Server>::new().empty_normalise([("name", "web")]).unwrap();
//! assert_eq!(server.port, 8080);
//! ```
use crate::error::{Error, ProgrammerError, Result};
use crate::formatter::Formatter;
use crate::meta::Meta;
use crate::spec::{
    any_spec, defaulted, factory, none_spec, optional_spec, or_spec, required, Formatted,
    SetOptions, Spec, SpecFactory, SpecRef,
};
use crate::value::Value;
use indexmap::IndexMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

pub type Wrapper = Arc<dyn Fn(SpecRef) -> SpecRef + Send + Sync>;

#[derive(Clone)]
pub enum FieldDefault {
    Value(Value),
    Factory(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl FieldDefault {
    fn resolve(&self) -> Value {
        match self {
            FieldDefault::Value(value) => value.clone(),
            FieldDefault::Factory(make) => make(),
        }
    }
}

#[derive(Clone)]
pub struct Field {
    spec: SpecFactory,
    help: Option<String>,
    formatted: bool,
    wrapper: Option<Wrapper>,
    default: Option<FieldDefault>,
    nullable: bool,
    after_format: Option<SpecFactory>,
}

impl Field {
    pub fn new(spec: impl Fn() -> SpecRef + Send + Sync + 'static) -> Self {
        Self {
            spec: factory(spec),
            help: None,
            formatted: false,
            wrapper: None,
            default: None,
            nullable: false,
            after_format: None,
        }
    }

    /// Absent becomes `null` and `null` is accepted
    pub fn nullable_field(spec: impl Fn() -> SpecRef + Send + Sync + 'static) -> Self {
        Self::new(spec).nullable()
    }

    /// Formatted as it is, then normalised with `spec`
    pub fn format_into(spec: impl Fn() -> SpecRef + Send + Sync + 'static) -> Self {
        Self {
            formatted: true,
            after_format: Some(factory(spec)),
            ..Self::new(any_spec)
        }
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(FieldDefault::Value(default.into()));
        self
    }

    /// Default computed every time a spec is made
    pub fn default_with(mut self, make: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(FieldDefault::Factory(Arc::new(make)));
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn formatted(mut self) -> Self {
        self.formatted = true;
        self
    }

    pub fn wrapper(mut self, wrapper: impl Fn(SpecRef) -> SpecRef + Send + Sync + 'static) -> Self {
        self.wrapper = Some(Arc::new(wrapper));
        self
    }

    /// Spec for the formatted value, only for formatted fields
    pub fn after_format(
        mut self,
        spec: impl Fn() -> SpecRef + Send + Sync + 'static,
    ) -> std::result::Result<Self, ProgrammerError> {
        if !self.formatted {
            return Err(ProgrammerError::AfterFormatWithoutFormatted);
        }
        self.after_format = Some(factory(spec));
        Ok(self)
    }

    pub fn help_text(&self) -> Option<&str> {
        self.help.as_deref()
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    fn wrapped(&self, outer: fn(SpecRef) -> SpecRef) -> Self {
        let inner = self.wrapper.clone();
        let wrapper: Wrapper = match inner {
            Some(inner) => Arc::new(move |spec: SpecRef| outer(inner(spec))),
            None => Arc::new(outer),
        };
        Self {
            wrapper: Some(wrapper),
            ..self.clone()
        }
    }

    /// Build the spec: nullable, then default, then formatting, then the wrapper
    pub fn make_spec(&self, meta: &Meta, formatter: Option<&Arc<dyn Formatter>>) -> Result<SpecRef> {
        let mut spec = (self.spec)();
        let mut after_format = self.after_format.clone();

        if self.nullable {
            spec = defaulted(or_spec(vec![none_spec(), spec]), Value::Null);
            after_format = after_format.map(|make| factory(move || or_spec(vec![none_spec(), make()])));
        }

        if let Some(default) = &self.default {
            spec = defaulted(spec, default.resolve());
        }

        if self.formatted {
            let Some(formatter) = formatter else {
                return Err(Error::bad_spec("Need a formatter to be defined").meta(meta));
            };
            spec = Arc::new(Formatted::new(spec, Arc::clone(formatter)).after_format(after_format));
        }

        if let Some(wrapper) = &self.wrapper {
            spec = wrapper(spec);
        }

        Ok(spec)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("help", &self.help)
            .field("formatted", &self.formatted)
            .field("wrapper", &self.wrapper.is_some())
            .field("default", &self.default.as_ref().map(FieldDefault::resolve))
            .field("nullable", &self.nullable)
            .field("after_format", &self.after_format.is_some())
            .finish()
    }
}

/// Named fields of a type
#[derive(Debug, Clone, Default)]
pub struct Fields {
    fields: IndexMap<String, Field>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.insert(name.into(), field);
        self
    }

    /// Fields of `parent` that aren't declared here
    pub fn inherit(self, parent: &Fields) -> Self {
        let mut fields = parent.fields.clone();
        for (name, field) in self.fields {
            fields.insert(name, field);
        }
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(name, field)| (name.as_str(), field))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// A new table with only the `wanted` fields, wrapped according to `selection`
    pub fn selection<S: Into<String>>(
        &self,
        wanted: impl IntoIterator<Item = S>,
        selection: &Selection,
    ) -> Result<Fields> {
        let wanted: Vec<String> = wanted.into_iter().map(Into::into).collect();

        let missing: Vec<&String> = wanted
            .iter()
            .filter(|name| !self.fields.contains_key(name.as_str()))
            .collect();
        if !missing.is_empty() {
            return Err(
                Error::bad_spec("Tried to make a selection from keys that don't exist")
                    .with("missing", missing)
                    .with("available", self.names().collect::<Vec<_>>())
                    .with("wanted", &wanted),
            );
        }

        for (wrap_as, keys) in [("optional", &selection.optional), ("required", &selection.required)] {
            let missing: Vec<&String> = keys.iter().filter(|key| !wanted.contains(key)).collect();
            if !missing.is_empty() {
                return Err(Error::bad_spec("Tried to wrap keys that didn't exist")
                    .with("wrap_as", wrap_as)
                    .with("missing", missing)
                    .with("available", &wanted));
            }
        }

        let fields = self
            .fields
            .iter()
            .filter(|(name, _)| wanted.contains(name))
            .map(|(name, field)| {
                let field = match selection.mode(name) {
                    Some(Mode::Optional) if field.has_default() => field.clone(),
                    Some(Mode::Optional) => field.wrapped(optional_spec),
                    Some(Mode::Required) => field.wrapped(required),
                    None => field.clone(),
                };
                (name.clone(), field)
            })
            .collect();

        Ok(Fields { fields })
    }
}

enum Mode {
    Optional,
    Required,
}

/// How [Fields::selection] wraps the selected fields
///
/// Named keys win over the `all_` switches and `optional` wins over `required`.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    optional: Vec<String>,
    required: Vec<String>,
    all_optional: bool,
    all_required: bool,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn optional<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.optional.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn required<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.required.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn all_optional(mut self) -> Self {
        self.all_optional = true;
        self
    }

    pub fn all_required(mut self) -> Self {
        self.all_required = true;
        self
    }

    fn mode(&self, name: &str) -> Option<Mode> {
        if self.optional.iter().any(|key| key == name) {
            Some(Mode::Optional)
        } else if self.all_required || self.required.iter().any(|key| key == name) {
            Some(Mode::Required)
        } else if self.all_optional {
            Some(Mode::Optional)
        } else {
            None
        }
    }
}

/// Normalised values handed to [Schema::create]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldValues {
    values: IndexMap<String, Value>,
}

impl FieldValues {
    pub fn new(values: IndexMap<String, Value>) -> Self {
        Self { values }
    }

    /// The value, [Value::NotSpecified] if there is none
    pub fn take(&mut self, name: &str) -> Value {
        self.values.shift_remove(name).unwrap_or_default()
    }

    fn wrong_type(name: &str, expected: &str, got: &Value) -> Error {
        Error::bad_spec_value(format!("Expected {name} to be a {expected}"))
            .with("field", name)
            .with("got", got.type_name())
    }

    pub fn string(&mut self, name: &str) -> Result<String> {
        match self.take(name) {
            Value::String(s) => Ok(s),
            other => Err(Self::wrong_type(name, "string", &other)),
        }
    }

    /// Absent and `null` are `None`
    pub fn optional_string(&mut self, name: &str) -> Result<Option<String>> {
        match self.take(name) {
            Value::NotSpecified | Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Err(Self::wrong_type(name, "string", &other)),
        }
    }

    pub fn integer(&mut self, name: &str) -> Result<i64> {
        match self.take(name) {
            Value::Integer(i) => Ok(i),
            other => Err(Self::wrong_type(name, "integer", &other)),
        }
    }

    pub fn boolean(&mut self, name: &str) -> Result<bool> {
        match self.take(name) {
            Value::Boolean(b) => Ok(b),
            other => Err(Self::wrong_type(name, "boolean", &other)),
        }
    }

    /// A nested object created with its own [Schema]
    pub fn schema<S: Schema>(&mut self, name: &str) -> Result<S> {
        match self.take(name) {
            Value::Object(values) => S::create(FieldValues::new(values)),
            other => Err(Self::wrong_type(name, "object", &other)),
        }
    }

    pub fn into_inner(self) -> IndexMap<String, Value> {
        self.values
    }
}

/// A type that declares its fields
pub trait Schema: Sized {
    fn fields() -> Fields;

    fn create(values: FieldValues) -> Result<Self>;
}

/// Field access on created instances
pub trait Fielded {
    fn field_names(&self) -> Vec<String>;

    fn get(&self, name: &str) -> Option<Value>;

    fn as_dict(&self) -> IndexMap<String, Value> {
        self.field_names()
            .into_iter()
            .filter_map(|name| self.get(&name).map(|value| (name, value)))
            .collect()
    }
}

/// Instance of a table of fields that has no type of its own, see [FieldSpec::record]
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    name: String,
    values: IndexMap<String, Value>,
}

impl Record {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Fielded for Record {
    fn field_names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }
}

type Create<T> = Arc<dyn Fn(FieldValues) -> Result<T> + Send + Sync>;

/// Normalises an object into a `T` using a table of fields
pub struct FieldSpec<T> {
    name: String,
    fields: Fields,
    formatter: Option<Arc<dyn Formatter>>,
    create: Create<T>,
    created: PhantomData<fn() -> T>,
}

impl<T: Schema + 'static> FieldSpec<T> {
    pub fn new() -> Self {
        Self::from_parts(std::any::type_name::<T>(), T::fields(), Arc::new(T::create))
    }
}

impl<T: Schema + 'static> Default for FieldSpec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldSpec<Record> {
    /// For tables that were put together at runtime, like a [Fields::selection]
    pub fn record(name: impl Into<String>, fields: Fields) -> Self {
        let name = name.into();
        let record_name = name.clone();
        Self::from_parts(
            name,
            fields,
            Arc::new(move |values: FieldValues| {
                Ok(Record {
                    name: record_name.clone(),
                    values: values.into_inner(),
                })
            }),
        )
    }
}

impl<T> FieldSpec<T> {
    fn from_parts(name: impl Into<String>, fields: Fields, create: Create<T>) -> Self {
        Self {
            name: name.into(),
            fields,
            formatter: None,
            create,
            created: PhantomData,
        }
    }

    pub fn formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// One spec per field, sorted by name
    pub fn make_spec(&self, meta: &Meta) -> Result<SetOptions> {
        let mut names: Vec<&str> = self.fields.names().collect();
        names.sort_unstable();

        let mut options = IndexMap::new();
        let mut errors = Vec::new();
        for name in names {
            let Some(field) = self.fields.get(name) else {
                continue;
            };
            match field.make_spec(&meta.at(name), self.formatter.as_ref()) {
                Ok(spec) => {
                    options.insert(name.to_string(), spec);
                }
                Err(error) if error.is_bad_spec() => errors.push(error),
                Err(error) => return Err(error),
            }
        }

        if !errors.is_empty() {
            return Err(Error::bad_spec("").with_errors(errors));
        }

        Ok(SetOptions::new(options))
    }

    /// Normalised values before they are turned into a `T`
    pub fn normalise_values(&self, meta: &Meta, val: Value) -> Result<IndexMap<String, Value>> {
        let val = match val {
            Value::NotSpecified => Value::Object(IndexMap::new()),
            other => other,
        };

        match self.make_spec(meta)?.normalise(meta, val)? {
            Value::Object(values) => Ok(values),
            other => Err(Error::bad_spec("Expected fields to normalise into a dictionary")
                .with("got", other.type_name())
                .meta(meta)),
        }
    }

    pub fn normalise(&self, meta: &Meta, val: Value) -> Result<T> {
        let values = self.normalise_values(meta, val)?;
        tracing::trace!(name = %self.name, path = %meta.path(), "creating");
        (self.create)(FieldValues::new(values))
    }

    /// Normalise keyword style values at an empty [Meta]
    pub fn empty_normalise<K: Into<String>, V: Into<Value>>(
        &self,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Result<T> {
        self.normalise(&Meta::empty(), values.into_iter().collect())
    }
}

impl<T> fmt::Debug for FieldSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("formatter", &self.formatter)
            .finish_non_exhaustive()
    }
}

/// Nests as an object of normalised values, after checking that a `T` can be created from them
impl<T> Spec for FieldSpec<T> {
    fn normalise(&self, meta: &Meta, val: Value) -> Result<Value> {
        let values = self.normalise_values(meta, val)?;
        (self.create)(FieldValues::new(values.clone()))?;
        Ok(Value::Object(values))
    }

    fn fake(&self, meta: &Meta, with_non_defaulted: bool) -> Option<Value> {
        self.make_spec(meta)
            .ok()
            .map(|spec| spec.fake_filled(meta, with_non_defaulted))
    }
}
