//! addons and what they produce
//!
//! An [Addon] is one `(namespace, name)` [Pair] that was found in the registry. Its hooks only run when
//! [Addon::resolved] is first asked for, the results are kept from then on. Dependencies come from two places:
//!
//! - extras the hooks declared up front, known as soon as the addon is imported
//! - extras of the [AddonResult]s, only known once the addon was resolved
use crate::error::{Error, Kind, Result};
use crate::hook::{Hook, HookFailure, HookKind};
use crate::layers::Dependencies;
use crate::meta::Meta;
use crate::spec::{listof, string_spec, tuple_spec, tupleof, SpecRef};
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Name that stands for every addon registered in a namespace
pub const ALL: &str = "__all__";

/// Normalised key path to the spec for the configuration found there
pub type Specs = IndexMap<Vec<String>, SpecRef>;

pub type Kwargs = IndexMap<String, Value>;

/// `(namespace, names)`
pub type Extras = Vec<(String, Vec<String>)>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pair {
    pub namespace: String,
    pub name: String,
}

impl Pair {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn is_all(&self) -> bool {
        self.name == ALL
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

impl<N: Into<String>, S: Into<String>> From<(N, S)> for Pair {
    fn from((namespace, name): (N, S)) -> Self {
        Self::new(namespace, name)
    }
}

/// Where the specs of resolved addons end up
pub trait Collector {
    /// Configuration that hooks can read and change
    fn configuration(&mut self) -> &mut IndexMap<String, Value>;

    /// Called once for every [AddonResult] that has specs
    fn register_converters(&mut self, specs: &Specs);
}

/// What an ordinary hook produces
#[derive(Debug, Clone, Default)]
pub struct AddonResult {
    specs: Specs,
    extras: Extras,
}

impl AddonResult {
    pub fn new(specs: Specs, extras: Extras) -> Self {
        Self { specs, extras }
    }

    pub fn specs(&self) -> &Specs {
        &self.specs
    }

    pub fn extras(&self) -> &Extras {
        &self.extras
    }

    /// Same specs, different extras
    pub fn with_extras(&self, extras: Extras) -> Self {
        Self {
            specs: self.specs.clone(),
            extras,
        }
    }
}

/// The spec extras are checked with unless a namespace brings its own
pub fn default_extras_spec() -> SpecRef {
    listof(tuple_spec(vec![string_spec(), tupleof(string_spec())]))
}

/// Turns normalised extras back into [Extras]
pub(crate) fn extras_from_value(val: Value, meta: &Meta) -> Result<Extras> {
    let malformed = |val: &Value| {
        Error::bad_spec_value("Expected extras to be a list of (namespace, names)")
            .with("got", val)
            .meta(meta)
    };

    let Value::List(items) = val else {
        return Err(malformed(&val));
    };

    items
        .into_iter()
        .map(|item| match &item {
            Value::Tuple(parts) => match parts.as_slice() {
                [Value::String(namespace), Value::List(names) | Value::Tuple(names)] => {
                    let names = names
                        .iter()
                        .map(|name| name.as_str().map(str::to_string))
                        .collect::<Option<Vec<_>>>()
                        .ok_or_else(|| malformed(&item))?;
                    Ok((namespace.clone(), names))
                }
                [Value::String(namespace), Value::String(name)] => {
                    Ok((namespace.clone(), vec![name.clone()]))
                }
                _ => Err(malformed(&item)),
            },
            _ => Err(malformed(&item)),
        })
        .collect()
}

/// Handed to ordinary hooks for building their [AddonResult]
#[derive(Debug, Clone)]
pub struct ResultMaker {
    namespace: String,
    extras_spec: SpecRef,
}

impl ResultMaker {
    pub fn new(namespace: impl Into<String>, extras_spec: SpecRef) -> Self {
        Self {
            namespace: namespace.into(),
            extras_spec,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// `extras` is a list of `(namespace, names)`
    pub fn make(&self, specs: Specs, extras: impl Into<Value>) -> Result<AddonResult> {
        let meta = Meta::empty().at("extras");
        let extras = self.extras_spec.normalise(&meta, extras.into())?;
        Ok(AddonResult::new(specs, extras_from_value(extras, &meta)?))
    }
}

/// Runs the hooks of an addon
pub trait Resolver: fmt::Debug + Send + Sync {
    fn resolve(&self, collector: &mut dyn Collector) -> std::result::Result<Vec<AddonResult>, HookFailure>;

    fn post_register(
        &self,
        collector: &mut dyn Collector,
        kwargs: &Kwargs,
    ) -> std::result::Result<(), HookFailure>;
}

/// Runs a list of [Hook]s
#[derive(Debug, derive_new::new)]
pub struct HookResolver {
    hooks: Vec<Hook>,
    result_maker: ResultMaker,
}

impl Resolver for HookResolver {
    fn resolve(&self, collector: &mut dyn Collector) -> std::result::Result<Vec<AddonResult>, HookFailure> {
        let mut results = Vec::new();
        for hook in &self.hooks {
            let HookKind::Ordinary { run, .. } = hook.kind() else {
                continue;
            };
            tracing::debug!(hook = hook.name(), namespace = self.result_maker.namespace(), "running hook");
            let result = run(collector, &self.result_maker).map_err(|error| HookFailure {
                hook: hook.name().to_string(),
                error,
            })?;
            results.extend(result);
        }
        Ok(results)
    }

    fn post_register(
        &self,
        collector: &mut dyn Collector,
        kwargs: &Kwargs,
    ) -> std::result::Result<(), HookFailure> {
        for hook in &self.hooks {
            let HookKind::PostRegister { run } = hook.kind() else {
                continue;
            };
            tracing::debug!(hook = hook.name(), namespace = self.result_maker.namespace(), "running post register hook");
            run(collector, kwargs).map_err(|error| HookFailure {
                hook: hook.name().to_string(),
                error,
            })?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct Addon {
    namespace: String,
    name: String,
    extras: Vec<Pair>,
    resolver: Arc<dyn Resolver>,
    resolved: Option<Vec<AddonResult>>,
}

impl Addon {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        extras: Vec<Pair>,
        resolver: Arc<dyn Resolver>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            extras,
            resolver,
            resolved: None,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pair(&self) -> Pair {
        Pair::new(&self.namespace, &self.name)
    }

    /// Dependencies declared before any hook ran
    pub fn extras(&self) -> &[Pair] {
        &self.extras
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }

    fn bad_hook(&self, failure: HookFailure, message: &str) -> Error {
        Error::new(Kind::BadHook, "").with_errors(vec![Error::new(Kind::BadHook, message)
            .with("name", &self.name)
            .with("namespace", &self.namespace)
            .with("hook", &failure.hook)
            .with("error", format!("{:#}", failure.error))])
    }

    /// Results of the ordinary hooks, they only run the first time
    pub fn resolved(&mut self, collector: &mut dyn Collector) -> Result<&[AddonResult]> {
        if self.resolved.is_none() {
            tracing::debug!(addon = %self.pair(), "resolving");
            let results = self
                .resolver
                .resolve(collector)
                .map_err(|failure| self.bad_hook(failure, "Failed to resolve a hook"))?;
            self.resolved = Some(results);
        }
        Ok(self.resolved.as_deref().unwrap_or_default())
    }

    /// Hand the specs of every result to the collector
    pub fn process(&mut self, collector: &mut dyn Collector) -> Result<()> {
        let results = self.resolved(collector)?.to_vec();
        for result in results.iter().filter(|result| !result.specs().is_empty()) {
            collector.register_converters(result.specs());
        }
        Ok(())
    }

    pub fn post_register(&self, collector: &mut dyn Collector, kwargs: &Kwargs) -> Result<()> {
        self.resolver
            .post_register(collector, kwargs)
            .map_err(|failure| self.bad_hook(failure, "Failed to run a post register hook"))
    }

    /// Replace the memoised results
    pub fn replace_resolved(&mut self, results: Vec<AddonResult>) {
        self.resolved = Some(results);
    }

    pub fn unresolved_dependencies(&self) -> impl Iterator<Item = Pair> + '_ {
        self.extras.iter().cloned()
    }

    /// Extras of the results, empty until the addon was resolved
    pub fn resolved_dependencies(&self) -> impl Iterator<Item = Pair> + '_ {
        self.resolved
            .iter()
            .flatten()
            .flat_map(|result| result.extras())
            .flat_map(|(namespace, names)| names.iter().map(move |name| Pair::new(namespace, name)))
    }
}

impl Dependencies<Pair> for Addon {
    fn dependencies(&self, _all: &BTreeMap<Pair, Self>) -> Vec<Pair> {
        self.unresolved_dependencies()
            .chain(self.resolved_dependencies())
            .collect()
    }
}
