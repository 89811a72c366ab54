//! scalar specs
use super::{apply_validators, expected, string_spec, Spec, SpecRef};
use crate::error::{Error, Kind, Result};
use crate::meta::Meta;
use crate::validators::Validator;
use crate::value::{Value, ValueType};
use std::path::Path;
use std::sync::Arc;

/// Returns the value unchanged
#[derive(Debug)]
pub struct PassThrough;

impl Spec for PassThrough {
    fn normalise_either(&self, _meta: &Meta, val: &Value) -> Result<Value> {
        Ok(val.clone())
    }
}

/// Ignores the value and returns a fixed result
#[derive(Debug, derive_new::new)]
pub struct AlwaysSame {
    result: Value,
}

impl Spec for AlwaysSame {
    fn normalise_either(&self, _meta: &Meta, _val: &Value) -> Result<Value> {
        Ok(self.result.clone())
    }
}

/// Accepts anything, including [Value::NotSpecified]
#[derive(Debug)]
pub struct AnySpec;

impl Spec for AnySpec {
    fn normalise(&self, _meta: &Meta, val: Value) -> Result<Value> {
        Ok(val)
    }
}

/// Always the given value, whatever was provided
#[derive(Debug, derive_new::new)]
pub struct Overridden {
    value: Value,
}

impl Spec for Overridden {
    fn normalise(&self, _meta: &Meta, _val: Value) -> Result<Value> {
        Ok(self.value.clone())
    }

    fn default(&self, _meta: &Meta) -> Option<Value> {
        Some(self.value.clone())
    }
}

#[derive(Debug)]
pub struct BooleanSpec;

impl Spec for BooleanSpec {
    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        match val {
            Value::Boolean(_) => Ok(val),
            other => Err(expected("Expected a boolean", meta, &other)),
        }
    }
}

/// Strings, empty defaults to `""`
#[derive(Debug)]
pub struct StringSpec;

impl Spec for StringSpec {
    fn default(&self, _meta: &Meta) -> Option<Value> {
        Some(Value::from(""))
    }

    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        match val {
            Value::String(_) => Ok(val),
            other => Err(expected("Expected a string", meta, &other)),
        }
    }
}

/// Integers, or strings made only of digits
#[derive(Debug)]
pub struct IntegerSpec;

impl Spec for IntegerSpec {
    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        match val {
            Value::Integer(_) => Ok(val),
            Value::String(ref s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => {
                s.parse::<i64>().map(Value::Integer).map_err(|error| {
                    Error::bad_spec_value("Couldn't transform value into an integer")
                        .with("error", error.to_string())
                        .meta(meta)
                })
            }
            other => Err(expected("Expected an integer", meta, &other)),
        }
    }
}

/// Decimals, integers and strings that parse as a decimal
#[derive(Debug)]
pub struct FloatSpec;

impl Spec for FloatSpec {
    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        match val {
            Value::Integer(i) => Ok(Value::Decimal(i as f64)),
            Value::Decimal(_) => Ok(val),
            Value::String(ref s) => s.trim().parse::<f64>().map(Value::Decimal).map_err(|error| {
                expected("Expected a float", meta, &val).with("error", error.to_string())
            }),
            other => Err(expected("Expected a float", meta, &other)),
        }
    }
}

#[derive(Debug)]
pub struct StringOrIntAsString;

impl Spec for StringOrIntAsString {
    fn default(&self, _meta: &Meta) -> Option<Value> {
        Some(Value::from(""))
    }

    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        match val {
            Value::String(_) => Ok(val),
            Value::Integer(i) => Ok(Value::String(i.to_string())),
            other => Err(expected("Expected a string or integer", meta, &other)),
        }
    }
}

/// A string that passes every validator
#[derive(Debug, derive_new::new)]
pub struct ValidString {
    validators: Vec<Arc<dyn Validator>>,
}

impl Spec for ValidString {
    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        let val = string_spec().normalise(meta, val)?;
        apply_validators(meta, val, &self.validators, None)
    }
}

#[derive(Debug)]
pub struct IntegerChoice {
    choices: Vec<i64>,
    reason: String,
}

impl IntegerChoice {
    pub fn new(choices: Vec<i64>) -> Self {
        Self {
            choices,
            reason: "Expected one of the available choices".to_string(),
        }
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }
}

impl Spec for IntegerChoice {
    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        let val = IntegerSpec.normalise(meta, val)?;
        match val.as_i64() {
            Some(choice) if self.choices.contains(&choice) => Ok(val),
            _ => Err(Error::bad_spec_value(self.reason.as_str())
                .with("available", &self.choices)
                .with("got", &val)
                .meta(meta)),
        }
    }
}

#[derive(Debug)]
pub struct StringChoice {
    choices: Vec<String>,
    reason: String,
}

impl StringChoice {
    pub fn new(choices: Vec<String>) -> Self {
        Self {
            choices,
            reason: "Expected one of the available choices".to_string(),
        }
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }
}

impl Spec for StringChoice {
    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        let val = StringSpec.normalise(meta, val)?;
        match val.as_str() {
            Some(choice) if self.choices.iter().any(|c| c == choice) => Ok(val),
            _ => Err(Error::bad_spec_value(self.reason.as_str())
                .with("available", &self.choices)
                .with("got", &val)
                .meta(meta)),
        }
    }
}

/// Only `null`, absent becomes `null`
#[derive(Debug)]
pub struct NoneSpec;

impl Spec for NoneSpec {
    fn normalise_empty(&self, _meta: &Meta) -> Result<Value> {
        Ok(Value::Null)
    }

    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        match val {
            Value::Null => Ok(val),
            other => Err(expected("Expected None", meta, &other)),
        }
    }
}

/// Only values of one [ValueType]
#[derive(Debug, derive_new::new)]
pub struct Typed {
    value_type: ValueType,
}

impl Spec for Typed {
    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        if !self.value_type.matches(&val) {
            return Err(expected("Got the wrong type of value", meta, &val)
                .with("expected", self.value_type));
        }
        Ok(val)
    }
}

/// Path to an existing directory
#[derive(Debug)]
pub struct DirectorySpec {
    spec: SpecRef,
}

impl DirectorySpec {
    pub fn new() -> Self {
        Self {
            spec: string_spec(),
        }
    }

    /// Spec producing the path string
    pub fn spec(mut self, spec: SpecRef) -> Self {
        self.spec = spec;
        self
    }
}

impl Default for DirectorySpec {
    fn default() -> Self {
        Self::new()
    }
}

impl Spec for DirectorySpec {
    fn normalise_either(&self, meta: &Meta, val: &Value) -> Result<Value> {
        let val = self.spec.normalise(meta, val.clone())?;
        let Some(directory) = val.as_str() else {
            return Err(Error::new(Kind::BadDirectory, "Didn't even get a string")
                .with("got", val.type_name())
                .meta(meta));
        };

        let path = Path::new(directory);
        if !path.exists() {
            return Err(Error::new(Kind::BadDirectory, "Got something that didn't exist")
                .with("directory", directory)
                .meta(meta));
        }
        if !path.is_dir() {
            return Err(Error::new(
                Kind::BadDirectory,
                "Got something that exists but isn't a directory",
            )
            .with("directory", directory)
            .meta(meta));
        }

        Ok(val)
    }

    fn fake(&self, meta: &Meta, with_non_defaulted: bool) -> Option<Value> {
        Some(self.spec.fake_filled(meta, with_non_defaulted))
    }
}

/// Path to a file
#[derive(Debug)]
pub struct FilenameSpec {
    spec: SpecRef,
    may_not_exist: bool,
}

impl FilenameSpec {
    pub fn new() -> Self {
        Self {
            spec: string_spec(),
            may_not_exist: false,
        }
    }

    pub fn spec(mut self, spec: SpecRef) -> Self {
        self.spec = spec;
        self
    }

    /// Accept paths that don't exist (yet)
    pub fn may_not_exist(mut self) -> Self {
        self.may_not_exist = true;
        self
    }
}

impl Default for FilenameSpec {
    fn default() -> Self {
        Self::new()
    }
}

impl Spec for FilenameSpec {
    fn normalise_filled(&self, meta: &Meta, val: Value) -> Result<Value> {
        let val = self.spec.normalise(meta, val)?;
        let Some(filename) = val.as_str() else {
            return Err(Error::new(Kind::BadFilename, "Didn't even get a string")
                .with("got", val.type_name())
                .meta(meta));
        };

        let path = Path::new(filename);
        if !self.may_not_exist && !path.exists() {
            return Err(Error::new(Kind::BadFilename, "Got something that didn't exist")
                .with("filename", filename)
                .meta(meta));
        }
        if path.exists() && !path.is_file() {
            return Err(
                Error::new(Kind::BadFilename, "Got something that exists but isn't a file")
                    .with("filename", filename)
                    .meta(meta),
            );
        }

        Ok(val)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::spec::*;
    use pretty_assertions::assert_eq;

    fn meta() -> Meta {
        Meta::empty().at("key")
    }

    #[test]
    fn strings() {
        assert_eq!(string_spec().normalise(&meta(), Value::NotSpecified).unwrap(), "".into());
        assert_eq!(string_spec().normalise(&meta(), "s".into()).unwrap(), "s".into());
        let default = string_spec().default(&meta()).unwrap();
        assert_eq!(string_spec().normalise(&meta(), default).unwrap(), "".into());

        let error = string_spec().normalise(&meta(), 1.into()).unwrap_err();
        assert_eq!(
            error,
            Error::bad_spec_value("Expected a string")
                .with("got", "integer")
                .meta(&meta())
        );
    }

    #[test]
    fn integers() {
        let spec = integer_spec();
        assert_eq!(spec.normalise(&meta(), 5.into()).unwrap(), 5.into());
        assert_eq!(spec.normalise(&meta(), "42".into()).unwrap(), 42.into());
        assert_eq!(spec.normalise(&meta(), Value::NotSpecified).unwrap(), Value::NotSpecified);
        assert_eq!(
            spec.normalise(&meta(), "4a".into()).unwrap_err().message(),
            "Expected an integer"
        );
        assert_eq!(
            spec.normalise(&meta(), "99999999999999999999".into())
                .unwrap_err()
                .message(),
            "Couldn't transform value into an integer"
        );
        assert_eq!(
            spec.normalise(&meta(), true.into()).unwrap_err().message(),
            "Expected an integer"
        );
    }

    #[test]
    fn floats() {
        let spec = float_spec();
        assert_eq!(spec.normalise(&meta(), 2.into()).unwrap(), Value::Decimal(2.0));
        assert_eq!(spec.normalise(&meta(), " 1.5 ".into()).unwrap(), Value::Decimal(1.5));
        assert_eq!(
            spec.normalise(&meta(), true.into()).unwrap_err().message(),
            "Expected a float"
        );
        assert_eq!(
            spec.normalise(&meta(), "one".into()).unwrap_err().message(),
            "Expected a float"
        );
    }

    #[test]
    fn string_or_int() {
        let spec = string_or_int_as_string_spec();
        assert_eq!(spec.normalise(&meta(), 3.into()).unwrap(), "3".into());
        assert_eq!(spec.normalise(&meta(), "3".into()).unwrap(), "3".into());
        assert!(spec.normalise(&meta(), 3.5.into()).is_err());
    }

    #[test]
    fn choices() {
        let spec = string_choice_spec(["blue", "green"]);
        assert_eq!(spec.normalise(&meta(), "blue".into()).unwrap(), "blue".into());
        let error = spec.normalise(&meta(), "red".into()).unwrap_err();
        assert_eq!(error.message(), "Expected one of the available choices");
        assert_eq!(error.field("available"), Some(&serde_json::json!(["blue", "green"])));

        let spec = IntegerChoice::new(vec![1, 2]).reason("Pick a level");
        assert_eq!(spec.normalise(&meta(), "2".into()).unwrap(), 2.into());
        assert_eq!(spec.normalise(&meta(), 3.into()).unwrap_err().message(), "Pick a level");
    }

    #[test]
    fn none_and_typed() {
        assert_eq!(none_spec().normalise(&meta(), Value::NotSpecified).unwrap(), Value::Null);
        assert_eq!(none_spec().normalise(&meta(), Value::Null).unwrap(), Value::Null);
        assert!(none_spec().normalise(&meta(), 0.into()).is_err());

        let spec = typed(ValueType::Tuple);
        assert_eq!(
            spec.normalise(&meta(), ("a", 1).into()).unwrap(),
            Value::tuple(["a".into(), Value::from(1)])
        );
        assert_eq!(
            spec.normalise(&meta(), vec![1].into()).unwrap_err().message(),
            "Got the wrong type of value"
        );
    }

    #[test]
    fn fixed_values() {
        assert_eq!(pass_through_spec().normalise(&meta(), 1.into()).unwrap(), 1.into());
        assert_eq!(always_same_spec("same").normalise(&meta(), 1.into()).unwrap(), "same".into());
        assert_eq!(overridden(3).normalise(&meta(), 1.into()).unwrap(), 3.into());
        assert_eq!(overridden(3).normalise(&meta(), Value::NotSpecified).unwrap(), 3.into());
        assert_eq!(any_spec().normalise(&meta(), Value::NotSpecified).unwrap(), Value::NotSpecified);
    }

    #[test]
    fn boolean_values() {
        assert_eq!(boolean().normalise(&meta(), false.into()).unwrap(), false.into());
        assert_eq!(
            boolean().normalise(&meta(), "yes".into()).unwrap_err().message(),
            "Expected a boolean"
        );
    }

    #[test]
    fn paths() {
        let directory = tempfile::tempdir().unwrap();
        let file = directory.path().join("file.txt");
        std::fs::write(&file, "contents").unwrap();
        let directory_name = directory.path().to_string_lossy().to_string();
        let file_name = file.to_string_lossy().to_string();

        assert_eq!(
            directory_spec()
                .normalise(&meta(), directory_name.clone().into())
                .unwrap(),
            directory_name.clone().into()
        );
        let error = directory_spec()
            .normalise(&meta(), file_name.clone().into())
            .unwrap_err();
        assert_eq!(error.kind(), Kind::BadDirectory);
        assert_eq!(error.message(), "Got something that exists but isn't a directory");
        assert!(error.is_bad_spec());

        assert_eq!(
            filename_spec().normalise(&meta(), file_name.clone().into()).unwrap(),
            file_name.into()
        );
        let missing = directory.path().join("missing").to_string_lossy().to_string();
        let error = filename_spec()
            .normalise(&meta(), missing.clone().into())
            .unwrap_err();
        assert_eq!(error.kind(), Kind::BadFilename);
        assert!(FilenameSpec::new()
            .may_not_exist()
            .normalise(&meta(), missing.into())
            .is_ok());
        assert_eq!(
            filename_spec()
                .normalise(&meta(), directory_name.into())
                .unwrap_err()
                .message(),
            "Got something that exists but isn't a file"
        );
    }
}
