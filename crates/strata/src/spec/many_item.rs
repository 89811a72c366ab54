//! values made of several positional parts
//!
//! `"8080:80"`, `["8080", 80]` and `{"8080": 80}` all describe the same two slots. A [ManyItem] declares the
//! slots and hooks into every step, [ManyItemFormattedSpec] drives the steps:
//!
//! 1. split the value into slots (lists as they are, strings at the separators, single key objects into
//!    key and value, anything else as one slot)
//! 2. check the number of slots
//! 3. for every slot: [ManyItem::determine], [ManyItem::spec_wrapper], normalise, [ManyItem::alter]
//! 4. [ManyItem::create_result]
//!
//! Slots are numbered from 0. The `slots` handed to the hooks hold every slot up to and including the current
//! one, as normalised so far.
use super::{Formatted, Spec, SpecRef};
use crate::error::{Error, Result};
use crate::formatter::Formatter;
use crate::meta::Meta;
use crate::value::{Value, ValueType};
use std::fmt;
use std::sync::Arc;

/// A spec for one slot
#[derive(Debug, Clone)]
pub struct ItemSpec {
    pub spec: SpecRef,
    /// Slots already of this type are not normalised again
    pub expected_type: Option<ValueType>,
}

impl ItemSpec {
    pub fn new(spec: SpecRef) -> Self {
        Self {
            spec,
            expected_type: None,
        }
    }

    pub fn expecting(spec: SpecRef, expected_type: ValueType) -> Self {
        Self {
            spec,
            expected_type: Some(expected_type),
        }
    }
}

impl From<SpecRef> for ItemSpec {
    fn from(spec: SpecRef) -> Self {
        Self::new(spec)
    }
}

pub trait ManyItem: fmt::Debug + Send + Sync {
    /// Mandatory slots
    fn specs(&self) -> Vec<ItemSpec>;

    /// Slots after the mandatory ones that may be left out
    fn optional_specs(&self) -> Vec<ItemSpec> {
        Vec::new()
    }

    /// Every character is a separator, tried in order
    fn separators(&self) -> &str {
        ":"
    }

    fn value_name(&self) -> String {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full).to_string()
    }

    /// Values for which normalisation is skipped entirely
    fn already_created(&self, _val: &Value) -> bool {
        false
    }

    fn formatter(&self) -> Option<Arc<dyn Formatter>> {
        None
    }

    /// Replace the raw value of a slot before it's normalised, `None` keeps it
    fn determine(
        &self,
        _index: usize,
        _slots: &[Value],
        _meta: &Meta,
        _original: &Value,
    ) -> Result<Option<Value>> {
        Ok(None)
    }

    fn spec_wrapper(
        &self,
        _index: usize,
        spec: SpecRef,
        _slots: &[Value],
        _meta: &Meta,
        _original: &Value,
        _dividers: &[String],
    ) -> Result<SpecRef> {
        Ok(spec)
    }

    /// Change a slot after it was normalised
    fn alter(
        &self,
        _index: usize,
        _slots: &[Value],
        val: Value,
        _meta: &Meta,
        _original: &Value,
    ) -> Result<Value> {
        Ok(val)
    }

    fn create_result(
        &self,
        slots: Vec<Value>,
        meta: &Meta,
        original: &Value,
        dividers: Vec<String>,
    ) -> Result<Value>;
}

#[derive(Debug, derive_new::new)]
pub struct ManyItemFormattedSpec<M> {
    item: M,
}

impl<M: ManyItem> ManyItemFormattedSpec<M> {
    fn split(&self, meta: &Meta, val: &Value) -> Result<(Vec<Value>, Vec<String>)> {
        match val {
            Value::List(items) | Value::Tuple(items) => Ok((
                items.clone(),
                vec![":".to_string(); items.len().saturating_sub(1)],
            )),
            Value::String(s) => Ok(self.split_string(s)),
            Value::Object(object) => {
                if object.len() != 1 {
                    return Err(Error::bad_spec_value("Value as a dict must only be one item")
                        .with("got", val)
                        .meta(meta));
                }
                let (key, value) = object.iter().next().map_or_else(
                    || (Value::NotSpecified, Value::NotSpecified),
                    |(k, v)| (Value::from(k.as_str()), v.clone()),
                );
                Ok((vec![key, value], vec![":".to_string()]))
            }
            other => Ok((vec![other.clone()], vec![])),
        }
    }

    fn split_string(&self, s: &str) -> (Vec<Value>, Vec<String>) {
        let separators = self.item.separators();
        if separators.is_empty() {
            return (vec![Value::from(s)], vec![]);
        }

        let mut slots = Vec::new();
        let mut dividers = Vec::new();
        let mut rest = s;
        while !rest.is_empty() {
            let Some((head, tail, separator)) = separators
                .chars()
                .find_map(|separator| {
                    rest.split_once(separator)
                        .map(|(head, tail)| (head, tail, separator))
                })
            else {
                break;
            };
            slots.push(Value::from(head));
            dividers.push(separator.to_string());
            rest = tail;
        }
        slots.push(Value::from(rest));
        (slots, dividers)
    }

    fn validate_split(&self, slots: &[Value], meta: &Meta, original: &Value) -> Result<()> {
        let mandatory = self.item.specs().len();
        let optional = self.item.optional_specs().len();
        if slots.len() < mandatory || slots.len() > mandatory + optional {
            return Err(
                Error::bad_spec_value("The value is a list with the wrong number of items")
                    .with("got", original)
                    .with("got_length", slots.len())
                    .with("min_length", mandatory)
                    .with("max_length", mandatory + optional)
                    .with("looking_at", self.item.value_name())
                    .meta(meta),
            );
        }
        Ok(())
    }

    fn normalise_slot(&self, spec: SpecRef, meta: &Meta, val: Value) -> Result<Value> {
        match self.item.formatter() {
            Some(formatter) => Formatted::new(spec, formatter).normalise(meta, val),
            None => spec.normalise(meta, val),
        }
    }
}

impl<M: ManyItem> Spec for ManyItemFormattedSpec<M> {
    fn normalise(&self, meta: &Meta, val: Value) -> Result<Value> {
        if self.item.already_created(&val) {
            return Ok(val);
        }

        let (mut slots, dividers) = self.split(meta, &val)?;
        self.validate_split(&slots, meta, &val)?;

        let mandatory = self.item.specs();
        let mandatory_count = mandatory.len();
        let all = mandatory.into_iter().chain(self.item.optional_specs());

        for (index, item_spec) in all.enumerate() {
            if slots.len() <= index {
                slots.push(Value::NotSpecified);
            }

            if let Some(determined) = self.item.determine(index, &slots[..=index], meta, &val)? {
                slots[index] = determined;
            }

            let spec = self.item.spec_wrapper(
                index,
                item_spec.spec,
                &slots[..=index],
                meta,
                &val,
                &dividers,
            )?;

            let mut slot = slots[index].clone();
            let specified = !slot.is_not_specified();
            let already_typed = item_spec
                .expected_type
                .is_some_and(|expected| expected.matches(&slot));
            if (index < mandatory_count || specified) && !already_typed {
                slot = self.normalise_slot(spec, meta, slot)?;
            }

            slots[index] = self.item.alter(index, &slots[..=index], slot, meta, &val)?;
        }

        self.item.create_result(slots, meta, &val, dividers)
    }
}
