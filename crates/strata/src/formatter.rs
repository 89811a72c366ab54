//! string formatting against the document being normalised
//!
//! `"{images.web.tag}"` is replaced by the value found at `images.web.tag` in the [crate::meta::Root]. Names
//! that aren't in the root fall back to the `_key_name_<n>` labels of the current path (see
//! [Meta::key_names]), which lets a value refer to keys relative to itself.
use crate::error::{Error, Result};
use crate::meta::Meta;
use crate::value::Value;
use indexmap::IndexMap;
use std::fmt;

/// What a [Formatter] can look keys up in
pub struct Options<'a> {
    meta: &'a Meta,
    key_names: IndexMap<String, Value>,
}

impl<'a> Options<'a> {
    pub fn new(meta: &'a Meta) -> Self {
        Self {
            meta,
            key_names: meta.key_names(),
        }
    }

    pub fn meta(&self) -> &Meta {
        self.meta
    }

    /// The root wins over key names
    pub fn get(&self, key: &str) -> Option<Value> {
        self.meta
            .root()
            .lookup(key)
            .or_else(|| self.key_names.get(key).cloned())
    }
}

pub trait Formatter: fmt::Debug + Send + Sync {
    /// Format `value`, `chain` holds the keys currently being expanded
    fn format(&self, options: &Options<'_>, value: Value, chain: &[String]) -> Result<Value>;
}

#[derive(Debug, PartialEq)]
enum Piece {
    Literal(String),
    Field(String),
}

/// Replaces `{key}` with the value of `key`, `{{` and `}}` are literal braces
///
/// Looked up strings are formatted as well. A template that is a single placeholder returns the looked up
/// value as it is, otherwise everything is joined into a string.
#[derive(Debug, Default)]
pub struct OptionsFormatter;

impl OptionsFormatter {
    pub fn new() -> Self {
        Self
    }

    fn parse(template: &str) -> Result<Vec<Piece>> {
        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut field = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => field.push(c),
                            None => {
                                return Err(Error::bad_option_format(
                                    "expected '}' before end of string",
                                )
                                .with("template", template))
                            }
                        }
                    }
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                    }
                    pieces.push(Piece::Field(field));
                }
                '}' => {
                    return Err(
                        Error::bad_option_format("Single '}' encountered in format string")
                            .with("template", template),
                    )
                }
                c => literal.push(c),
            }
        }

        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }
        Ok(pieces)
    }

    fn field(&self, options: &Options<'_>, key: &str, chain: &[String]) -> Result<Value> {
        if key.contains(':') || key.contains('!') {
            return Err(Error::bad_option_format("Format specs are not supported")
                .with("key", key)
                .with("chain", chain));
        }

        if chain.iter().any(|link| link == key) {
            let mut chain = chain.to_vec();
            chain.push(key.to_string());
            return Err(Error::bad_option_format("Recursive option").with("chain", chain));
        }

        let Some(value) = options.get(key) else {
            return Err(Error::bad_option_format("Can't find key in options")
                .with("key", key)
                .with("chain", chain));
        };

        let mut chain = chain.to_vec();
        chain.push(key.to_string());
        tracing::trace!(key, ?chain, "expanding");
        self.format(options, value, &chain)
    }
}

impl Formatter for OptionsFormatter {
    fn format(&self, options: &Options<'_>, value: Value, chain: &[String]) -> Result<Value> {
        let Value::String(template) = value else {
            return Ok(value);
        };

        let mut results = Vec::new();
        for piece in Self::parse(&template)? {
            match piece {
                Piece::Literal(literal) => results.push(Value::String(literal)),
                Piece::Field(key) => results.push(self.field(options, &key, chain)?),
            }
        }

        if results.len() == 1 {
            return Ok(results.remove(0));
        }

        Ok(Value::String(
            results.iter().map(ToString::to_string).collect::<String>(),
        ))
    }
}
