//! composable specifications
//!
//! A [Spec] turns a raw [Value] into a normalised [Value] or fails with an [Error] that records where
//! ([Meta]) and why. Every spec dispatches through [Spec::normalise]:
//!
//! 1. [Spec::normalise_either] runs first for every value. Returning anything other than
//!    [Value::NotSpecified] ends normalisation with that value.
//! 2. A [Value::NotSpecified] input goes to [Spec::normalise_empty], which falls back to [Spec::default].
//! 3. Anything else goes to [Spec::normalise_filled].
//!
//! Structural specs (`dictof`, `listof`, `set_options`, ...) keep normalising after a child failed and report all
//! failures as nested errors. Only errors that are a [Kind::BadSpec] are collected this way, anything else
//! propagates immediately.
//!
//! Specs are shared as [SpecRef]. The lowercase functions in this module construct the common forms, the
//! structs offer builders for the less common options.
use crate::error::{Error, Kind, Result};
use crate::field::Schema;
use crate::formatter::Formatter;
use crate::meta::Meta;
use crate::validators::Validator;
use crate::value::{Value, ValueType};
use std::fmt;
use std::sync::Arc;

pub mod combinators;
pub mod containers;
pub mod formatted;
pub mod many_item;
pub mod primitives;

pub use combinators::*;
pub use containers::*;
pub use formatted::*;
pub use many_item::*;
pub use primitives::*;

pub type SpecRef = Arc<dyn Spec>;

/// Produces a fresh spec each time it's called
pub type SpecFactory = Arc<dyn Fn() -> SpecRef + Send + Sync>;

pub trait Spec: fmt::Debug + Send + Sync {
    fn normalise(&self, meta: &Meta, val: Value) -> Result<Value> {
        let either = self.normalise_either(meta, &val)?;
        if !either.is_not_specified() {
            return Ok(either);
        }

        if val.is_not_specified() {
            self.normalise_empty(meta)
        } else {
            self.normalise_filled(meta, val)
        }
    }

    fn normalise_either(&self, _meta: &Meta, _val: &Value) -> Result<Value> {
        Ok(Value::NotSpecified)
    }

    fn normalise_empty(&self, meta: &Meta) -> Result<Value> {
        Ok(self.default(meta).unwrap_or_default())
    }

    fn default(&self, _meta: &Meta) -> Option<Value> {
        None
    }

    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        Err(Error::bad_spec("Spec doesn't know how to deal with this value")
            .with("spec", format!("{self:?}"))
            .with("val", &val)
            .meta(meta))
    }

    /// Plausible value for documentation and examples
    fn fake(&self, _meta: &Meta, _with_non_defaulted: bool) -> Option<Value> {
        None
    }

    fn fake_filled(&self, meta: &Meta, with_non_defaulted: bool) -> Value {
        self.fake(meta, with_non_defaulted)
            .or_else(|| self.default(meta))
            .unwrap_or_default()
    }
}

/// Keeps `Ok` values, pushes [Kind::BadSpec] errors onto `errors` and propagates everything else
pub(crate) fn collect<T>(result: Result<T>, errors: &mut Vec<Error>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(error) if error.is_bad_spec() => {
            errors.push(error);
            Ok(None)
        }
        Err(error) => Err(error),
    }
}

pub(crate) fn expected(message: &str, meta: &Meta, val: &Value) -> Error {
    Error::bad_spec_value(message)
        .with("got", val.type_name())
        .meta(meta)
}

/// Runs every validator against `val` and reports all failures together
///
/// Returns `chain_value` (the original value when `None`).
pub fn apply_validators(
    meta: &Meta,
    val: Value,
    validators: &[Arc<dyn Validator>],
    chain_value: Option<Value>,
) -> Result<Value> {
    let mut errors = Vec::new();
    for validator in validators {
        if let Err(error) = validator.validate(meta, val.clone()) {
            if !error.is_a(Kind::BadSpecValue) {
                return Err(error);
            }
            errors.push(error);
        }
    }

    if !errors.is_empty() {
        return Err(Error::bad_spec_value("Failed to validate")
            .meta(meta)
            .with_errors(errors));
    }

    Ok(chain_value.unwrap_or(val))
}

pub fn pass_through_spec() -> SpecRef {
    Arc::new(PassThrough)
}

pub fn always_same_spec(result: impl Into<Value>) -> SpecRef {
    Arc::new(AlwaysSame::new(result.into()))
}

pub fn any_spec() -> SpecRef {
    Arc::new(AnySpec)
}

pub fn overridden(value: impl Into<Value>) -> SpecRef {
    Arc::new(Overridden::new(value.into()))
}

pub fn boolean() -> SpecRef {
    Arc::new(BooleanSpec)
}

pub fn string_spec() -> SpecRef {
    Arc::new(StringSpec)
}

pub fn integer_spec() -> SpecRef {
    Arc::new(IntegerSpec)
}

pub fn float_spec() -> SpecRef {
    Arc::new(FloatSpec)
}

pub fn string_or_int_as_string_spec() -> SpecRef {
    Arc::new(StringOrIntAsString)
}

pub fn valid_string_spec(validators: Vec<Arc<dyn Validator>>) -> SpecRef {
    Arc::new(ValidString::new(validators))
}

pub fn integer_choice_spec(choices: impl IntoIterator<Item = i64>) -> SpecRef {
    Arc::new(IntegerChoice::new(choices.into_iter().collect()))
}

pub fn string_choice_spec<S: Into<String>>(choices: impl IntoIterator<Item = S>) -> SpecRef {
    Arc::new(StringChoice::new(choices.into_iter().map(Into::into).collect()))
}

pub fn none_spec() -> SpecRef {
    Arc::new(NoneSpec)
}

pub fn typed(value_type: ValueType) -> SpecRef {
    Arc::new(Typed::new(value_type))
}

pub fn directory_spec() -> SpecRef {
    Arc::new(DirectorySpec::new())
}

pub fn filename_spec() -> SpecRef {
    Arc::new(FilenameSpec::new())
}

pub fn dictionary_spec() -> SpecRef {
    Arc::new(DictionarySpec)
}

pub fn dictof(name_spec: SpecRef, value_spec: SpecRef) -> SpecRef {
    Arc::new(DictOf::new(name_spec, value_spec))
}

pub fn listof(spec: SpecRef) -> SpecRef {
    Arc::new(ListOf::new(spec))
}

pub fn tupleof(spec: SpecRef) -> SpecRef {
    Arc::new(TupleOf::new(spec))
}

pub fn set_options<K: Into<String>>(options: impl IntoIterator<Item = (K, SpecRef)>) -> SpecRef {
    Arc::new(SetOptions::new(
        options.into_iter().map(|(k, v)| (k.into(), v)).collect(),
    ))
}

pub fn tuple_spec(specs: Vec<SpecRef>) -> SpecRef {
    Arc::new(TupleSpec::new(specs))
}

pub fn dict_from_bool_spec(
    dict_maker: impl Fn(&Meta, bool) -> Value + Send + Sync + 'static,
    spec: SpecRef,
) -> SpecRef {
    Arc::new(DictFromBool::new(Arc::new(dict_maker), spec))
}

pub fn defaulted(spec: SpecRef, default: impl Into<Value>) -> SpecRef {
    Arc::new(Defaulted::new(spec, default.into()))
}

pub fn required(spec: SpecRef) -> SpecRef {
    Arc::new(Required::new(spec))
}

pub fn optional_spec(spec: SpecRef) -> SpecRef {
    Arc::new(OptionalSpec::new(spec))
}

pub fn or_spec(specs: Vec<SpecRef>) -> SpecRef {
    Arc::new(OrSpec::new(specs))
}

pub fn and_spec(specs: Vec<SpecRef>) -> SpecRef {
    Arc::new(AndSpec::new(specs))
}

pub fn match_spec(arms: Vec<(ValueType, SpecFactory)>, fallback: Option<SpecFactory>) -> SpecRef {
    Arc::new(MatchSpec::new(arms, fallback))
}

pub fn create_spec<T: Schema + 'static>(validators: Vec<Arc<dyn Validator>>) -> SpecRef {
    Arc::new(CreateSpec::<T>::new(validators))
}

pub fn container_spec(
    spec: SpecRef,
    make: impl Fn(&Meta, Value) -> Result<Value> + Send + Sync + 'static,
) -> SpecRef {
    Arc::new(ContainerSpec::new(spec, make))
}

pub fn delayed(spec: SpecRef) -> Delayed {
    Delayed::new(spec)
}

pub fn formatted(spec: SpecRef, formatter: Arc<dyn Formatter>) -> SpecRef {
    Arc::new(Formatted::new(spec, formatter))
}

pub fn many_format(spec: SpecRef, formatter: Arc<dyn Formatter>) -> SpecRef {
    Arc::new(ManyFormat::new(spec, formatter))
}

pub fn many_item_formatted_spec<M: ManyItem + 'static>(item: M) -> SpecRef {
    Arc::new(ManyItemFormattedSpec::new(item))
}

/// Wraps a spec creating function into a [SpecFactory]
pub fn factory(make: impl Fn() -> SpecRef + Send + Sync + 'static) -> SpecFactory {
    Arc::new(make)
}
