//! checks that pass values through unchanged
//!
//! A [Validator] only looks at a value and either accepts it or fails. Absent values are never validated.
//! Use [spec] to turn a validator into a [Spec], or give several to [crate::spec::valid_string_spec] /
//! [crate::spec::apply_validators].
use crate::error::{Error, Kind, Result};
use crate::meta::Meta;
use crate::spec::{dictionary_spec, Spec, SpecRef};
use crate::value::Value;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, LazyLock};

pub trait Validator: fmt::Debug + Send + Sync {
    fn validate(&self, meta: &Meta, val: Value) -> Result<Value>;
}

/// A [Validator] used as a [Spec]
#[derive(Debug)]
pub struct ValidatorSpec {
    validator: Arc<dyn Validator>,
}

impl Spec for ValidatorSpec {
    fn normalise_either(&self, meta: &Meta, val: &Value) -> Result<Value> {
        if val.is_not_specified() {
            return Ok(Value::NotSpecified);
        }
        self.validator.validate(meta, val.clone())
    }
}

pub fn spec(validator: impl Validator + 'static) -> SpecRef {
    Arc::new(ValidatorSpec {
        validator: Arc::new(validator),
    })
}

fn object<'a>(meta: &Meta, val: &'a Value) -> Result<&'a indexmap::IndexMap<String, Value>> {
    val.as_object().ok_or_else(|| {
        Error::bad_spec_value("Expected a dictionary")
            .with("got", val.type_name())
            .meta(meta)
    })
}

fn is_set(object: &indexmap::IndexMap<String, Value>, key: &str) -> bool {
    object.get(key).is_some_and(|value| !value.is_not_specified())
}

fn string<'a>(meta: &Meta, val: &'a Value) -> Result<&'a str> {
    val.as_str().ok_or_else(|| {
        Error::bad_spec_value("Expected a string")
            .with("got", val.type_name())
            .meta(meta)
    })
}

/// At least one of the keys is set
#[derive(Debug)]
pub struct HasEither {
    choices: Vec<String>,
}

impl HasEither {
    pub fn new<S: Into<String>>(choices: impl IntoIterator<Item = S>) -> Self {
        Self {
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }
}

impl Validator for HasEither {
    fn validate(&self, meta: &Meta, val: Value) -> Result<Value> {
        let found = object(meta, &val)?;
        if !self.choices.iter().any(|key| is_set(found, key)) {
            return Err(
                Error::bad_spec_value("Need to specify atleast one of the required keys")
                    .with("choices", &self.choices)
                    .meta(meta),
            );
        }
        Ok(val)
    }
}

/// Exactly one of the keys is set
#[derive(Debug)]
pub struct HasOnlyOneOf {
    choices: Vec<String>,
}

impl HasOnlyOneOf {
    pub fn new<S: Into<String>>(choices: impl IntoIterator<Item = S>) -> Result<Self> {
        let choices: Vec<String> = choices.into_iter().map(Into::into).collect();
        if choices.is_empty() {
            return Err(Error::bad_spec_definition("Must specify atleast one choice")
                .with("got", &choices));
        }
        Ok(Self { choices })
    }
}

impl Validator for HasOnlyOneOf {
    fn validate(&self, meta: &Meta, val: Value) -> Result<Value> {
        let found = object(meta, &val)?;
        let set = self.choices.iter().filter(|key| is_set(found, key)).count();
        if set != 1 {
            return Err(
                Error::bad_spec_value("Can only specify exactly one of the available choices")
                    .with("choices", &self.choices)
                    .meta(meta),
            );
        }
        Ok(val)
    }
}

/// Keys come in mutually exclusive groups, a value uses every key of exactly one group
#[derive(Debug)]
pub struct EitherKeys {
    groups: Vec<Vec<String>>,
}

impl EitherKeys {
    pub fn new(groups: Vec<Vec<String>>) -> Result<Self> {
        let mut found = BTreeSet::new();
        let mut common = BTreeSet::new();
        for key in groups.iter().flatten() {
            if !found.insert(key) {
                common.insert(key);
            }
        }

        if !common.is_empty() {
            return Err(Error::bad_spec_definition("Found common keys in the choices")
                .with("common", &common));
        }

        Ok(Self { groups })
    }

    fn others(&self, index: usize) -> impl Iterator<Item = &String> {
        self.groups
            .iter()
            .enumerate()
            .filter(move |(other, _)| *other != index)
            .flat_map(|(_, group)| group)
    }
}

impl Validator for EitherKeys {
    fn validate(&self, meta: &Meta, val: Value) -> Result<Value> {
        let val = dictionary_spec().normalise(meta, val)?;
        let found = object(meta, &val)?;

        let mut associates = Vec::new();
        let mut perfect = Vec::new();
        for (index, group) in self.groups.iter().enumerate() {
            let present = group.iter().filter(|key| found.contains_key(*key)).count();
            if present > 0 {
                associates.push(index);
                if present == group.len() {
                    perfect.push(index);
                }
            }
        }

        match (perfect.as_slice(), associates.as_slice()) {
            ([], []) => Err(Error::bad_spec_value("Value associates with no groups")
                .with("val", &val)
                .with("choices", &self.groups)
                .meta(meta)),
            ([], [index]) => {
                let group = &self.groups[*index];
                let (present, missing): (Vec<&String>, Vec<&String>) =
                    group.iter().partition(|key| found.contains_key(*key));
                let invalid: Vec<&String> = self
                    .others(*index)
                    .filter(|key| found.contains_key(*key))
                    .collect();
                Err(Error::bad_spec_value("Missing keys from this group")
                    .with("group", group)
                    .with("found", present)
                    .with("invalid", invalid)
                    .with("missing", missing)
                    .meta(meta))
            }
            ([index], _) => {
                let invalid: Vec<&String> = self
                    .others(*index)
                    .filter(|key| found.contains_key(*key))
                    .collect();
                if !invalid.is_empty() {
                    return Err(Error::bad_spec_value(
                        "Value associates with a group but has keys from other groups",
                    )
                    .with("associates_with", &self.groups[*index])
                    .with("invalid", invalid)
                    .meta(meta));
                }
                Ok(val)
            }
            (indices, associates) => {
                let indices = if indices.is_empty() { associates } else { indices };
                Err(Error::bad_spec_value("Value associates with multiple groups")
                    .with(
                        "associates",
                        indices.iter().map(|i| &self.groups[*i]).collect::<Vec<_>>(),
                    )
                    .with("got", &val)
                    .meta(meta))
            }
        }
    }
}

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

#[derive(Debug, Default)]
pub struct NoWhitespace;

impl NoWhitespace {
    pub fn new() -> Self {
        Self
    }
}

impl Validator for NoWhitespace {
    fn validate(&self, meta: &Meta, val: Value) -> Result<Value> {
        if WHITESPACE.is_match(string(meta, &val)?) {
            return Err(Error::bad_spec_value("Expected no whitespace")
                .with("val", &val)
                .meta(meta));
        }
        Ok(val)
    }
}

#[derive(Debug, Default)]
pub struct NoDots {
    reason: Option<String>,
}

impl NoDots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
        }
    }
}

impl Validator for NoDots {
    fn validate(&self, meta: &Meta, val: Value) -> Result<Value> {
        if string(meta, &val)?.contains('.') {
            let reason = self.reason.as_deref().unwrap_or("Expected no dots");
            return Err(Error::bad_spec_value(reason).with("val", &val).meta(meta));
        }
        Ok(val)
    }
}

/// Every regex matches at the start of the value
#[derive(Debug)]
pub struct Regexed {
    regexes: Vec<(String, Regex)>,
}

impl Regexed {
    pub fn new<S: Into<String>>(patterns: impl IntoIterator<Item = S>) -> Result<Self> {
        let mut regexes = Vec::new();
        for pattern in patterns {
            let pattern = pattern.into();
            let regex = Regex::new(&format!("^(?:{pattern})")).map_err(|error| {
                Error::bad_spec_definition("Invalid regex")
                    .with("spec", &pattern)
                    .with("error", error.to_string())
            })?;
            regexes.push((pattern, regex));
        }
        Ok(Self { regexes })
    }
}

impl Validator for Regexed {
    fn validate(&self, meta: &Meta, val: Value) -> Result<Value> {
        let s = string(meta, &val)?;
        for (pattern, regex) in &self.regexes {
            if !regex.is_match(s) {
                return Err(
                    Error::bad_spec_value("Expected value to match regex, it didn't")
                        .with("spec", pattern)
                        .with("val", &val)
                        .meta(meta),
                );
            }
        }
        Ok(val)
    }
}

/// Fails when the key is present at all
#[derive(Debug)]
pub struct DeprecatedKey {
    key: String,
    reason: String,
}

impl DeprecatedKey {
    pub fn new(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl Validator for DeprecatedKey {
    fn validate(&self, meta: &Meta, val: Value) -> Result<Value> {
        if val.get(&self.key).is_some() {
            return Err(Error::new(Kind::DeprecatedKey, "")
                .with("key", &self.key)
                .with("reason", &self.reason)
                .meta(meta));
        }
        Ok(val)
    }
}

#[derive(Debug)]
pub struct Choice {
    choices: Vec<Value>,
}

impl Choice {
    pub fn new<V: Into<Value>>(choices: impl IntoIterator<Item = V>) -> Self {
        Self {
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }
}

impl Validator for Choice {
    fn validate(&self, meta: &Meta, val: Value) -> Result<Value> {
        if !self.choices.contains(&val) {
            return Err(
                Error::bad_spec_value("Expected the value to be one of the valid choices")
                    .with("got", &val)
                    .with("choices", &self.choices)
                    .meta(meta),
            );
        }
        Ok(val)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn object(keys: &[&str]) -> Value {
        keys.iter().map(|key| (*key, 1)).collect()
    }

    fn groups(groups: &[&[&str]]) -> Vec<Vec<String>> {
        groups
            .iter()
            .map(|group| group.iter().map(|key| key.to_string()).collect())
            .collect()
    }

    #[test]
    fn absent_values_are_not_validated() {
        let meta = Meta::empty();
        assert_eq!(
            spec(NoDots::new()).normalise(&meta, Value::NotSpecified).unwrap(),
            Value::NotSpecified
        );
        assert_eq!(
            spec(HasEither::new(["a"])).normalise(&meta, Value::NotSpecified).unwrap(),
            Value::NotSpecified
        );
    }

    #[test]
    fn has_either_and_only_one() {
        let meta = Meta::empty();
        let either = spec(HasEither::new(["a", "b"]));
        assert!(either.normalise(&meta, object(&["a"])).is_ok());
        assert_eq!(
            either.normalise(&meta, object(&["c"])).unwrap_err().message(),
            "Need to specify atleast one of the required keys"
        );

        let only = spec(HasOnlyOneOf::new(["a", "b"]).unwrap());
        assert!(only.normalise(&meta, object(&["b"])).is_ok());
        assert!(only.normalise(&meta, object(&["a", "b"])).is_err());
        assert!(only.normalise(&meta, object(&[])).is_err());

        let error = HasOnlyOneOf::new(Vec::<String>::new()).unwrap_err();
        assert_eq!(error.kind(), Kind::BadSpecDefinition);
    }

    #[test]
    fn either_keys_groups() {
        let meta = Meta::empty();
        let validator = spec(EitherKeys::new(groups(&[&["a", "b"], &["c"]])).unwrap());

        assert!(validator.normalise(&meta, object(&["a", "b", "other"])).is_ok());
        assert!(validator.normalise(&meta, object(&["c"])).is_ok());

        let message = |keys: &[&str]| {
            validator
                .normalise(&meta, object(keys))
                .unwrap_err()
                .message()
                .to_string()
        };
        assert_eq!(message(&[]), "Value associates with no groups");
        assert_eq!(message(&["a"]), "Missing keys from this group");
        assert_eq!(
            message(&["a", "b", "c"]),
            "Value associates with multiple groups"
        );

        let error = EitherKeys::new(groups(&[&["a"], &["a", "b"]])).unwrap_err();
        assert_eq!(error.field("common"), Some(&serde_json::json!(["a"])));
    }

    #[test]
    fn either_keys_with_stray_keys() {
        let meta = Meta::empty();
        let validator =
            EitherKeys::new(groups(&[&["a", "b"], &["c", "d"]])).unwrap();
        let error = validator.validate(&meta, object(&["a", "b", "c"])).unwrap_err();
        assert_eq!(
            error.message(),
            "Value associates with a group but has keys from other groups"
        );
        assert_eq!(error.field("invalid"), Some(&serde_json::json!(["c"])));
    }

    #[test]
    fn strings() {
        let meta = Meta::empty();
        assert!(NoWhitespace::new().validate(&meta, "a_b".into()).is_ok());
        assert!(NoWhitespace::new().validate(&meta, "a b".into()).is_err());

        assert_eq!(
            NoDots::reason("dots are evil")
                .validate(&meta, "a.b".into())
                .unwrap_err()
                .message(),
            "dots are evil"
        );

        let regexed = Regexed::new(["[a-z]+", "ab"]).unwrap();
        assert!(regexed.validate(&meta, "abc".into()).is_ok());
        assert!(regexed.validate(&meta, "xab".into()).is_err());
        assert_eq!(
            Regexed::new(["("]).unwrap_err().kind(),
            Kind::BadSpecDefinition
        );
    }

    #[test]
    fn deprecated_and_choice() {
        let meta = Meta::empty().at("config");
        let error = DeprecatedKey::new("old", "use new instead")
            .validate(&meta, object(&["old"]))
            .unwrap_err();
        assert_eq!(error.kind(), Kind::DeprecatedKey);
        assert!(error.is_a(Kind::BadSpecValue));
        assert!(DeprecatedKey::new("old", "")
            .validate(&meta, object(&["new"]))
            .is_ok());

        let choice = Choice::new([1, 2]);
        assert_eq!(choice.validate(&meta, 2.into()).unwrap(), 2.into());
        assert!(choice.validate(&meta, 3.into()).is_err());
    }
}
