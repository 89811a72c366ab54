//! finding addons
//!
//! An [AddonRegistry] maps `(namespace, name)` to the [Entry]s that provide the hooks of that addon. Several
//! entries may be registered under the same name, their hooks are combined. [Registry] is the one filled by
//! explicit [Registry::register] calls.
//!
//! The [AddonGetter] only sees namespaces that were added to it and takes a snapshot of the registry at that
//! moment. Asking for a namespace it doesn't know is not an error, it just finds nothing.
use crate::addon::{default_extras_spec, Addon, HookResolver, Pair, ResultMaker, ALL};
use crate::error::{Error, Kind, Result};
use crate::hook::Hook;
use crate::spec::SpecRef;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Something that provides hooks once it's loaded
pub trait Entry: fmt::Debug + Send + Sync {
    fn resolve(&self) -> anyhow::Result<Vec<Hook>>;
}

/// An [Entry] with hooks that are already there
#[derive(Debug, Clone, Default)]
pub struct Module {
    name: String,
    hooks: Vec<Hook>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hooks: Vec::new(),
        }
    }

    pub fn hook(mut self, hook: Hook) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Entry for Module {
    fn resolve(&self) -> anyhow::Result<Vec<Hook>> {
        Ok(self.hooks.clone())
    }
}

type Entries = IndexMap<String, Vec<Arc<dyn Entry>>>;

#[derive(Debug, Default)]
pub struct Registry {
    namespaces: BTreeMap<String, Entries>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        entry: impl Entry + 'static,
    ) -> &mut Self {
        self.namespaces
            .entry(namespace.into())
            .or_default()
            .entry(name.into())
            .or_default()
            .push(Arc::new(entry));
        self
    }

}

/// Where the [AddonGetter] looks addons up
pub trait AddonRegistry: fmt::Debug + Send + Sync {
    /// Every name registered in `namespace`
    fn list_all(&self, namespace: &str) -> Vec<Pair>;

    fn find_candidates(&self, namespace: &str, name: &str) -> Vec<Arc<dyn Entry>>;
}

impl AddonRegistry for Registry {
    fn list_all(&self, namespace: &str) -> Vec<Pair> {
        self.namespaces
            .get(namespace)
            .map(|entries| {
                entries
                    .keys()
                    .map(|name| Pair::new(namespace, name))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn find_candidates(&self, namespace: &str, name: &str) -> Vec<Arc<dyn Entry>> {
        self.namespaces
            .get(namespace)
            .and_then(|entries| entries.get(name))
            .cloned()
            .unwrap_or_default()
    }
}

#[derive(Debug)]
struct Namespace {
    extras_spec: SpecRef,
    entries: Entries,
}

#[derive(Debug)]
pub struct AddonGetter {
    registry: Arc<dyn AddonRegistry>,
    namespaces: BTreeMap<String, Namespace>,
}

impl AddonGetter {
    pub fn new(registry: Arc<dyn AddonRegistry>) -> Self {
        Self {
            registry,
            namespaces: BTreeMap::new(),
        }
    }

    pub fn add_namespace(&mut self, namespace: impl Into<String>) -> &mut Self {
        self.add_namespace_with_spec(namespace, default_extras_spec())
    }

    /// `extras_spec` checks the extras of results made in this namespace
    pub fn add_namespace_with_spec(
        &mut self,
        namespace: impl Into<String>,
        extras_spec: SpecRef,
    ) -> &mut Self {
        let namespace = namespace.into();
        let entries: Entries = self
            .registry
            .list_all(&namespace)
            .into_iter()
            .map(|pair| {
                let candidates = self.registry.find_candidates(&pair.namespace, &pair.name);
                (pair.name, candidates)
            })
            .collect();
        tracing::debug!(%namespace, entries = entries.len(), "adding namespace");
        self.namespaces.insert(
            namespace,
            Namespace {
                extras_spec,
                entries,
            },
        );
        self
    }

    pub fn knows(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    /// Every addon of `namespace` as it was when the namespace was added
    pub fn all_for(&self, namespace: &str) -> Vec<Pair> {
        let Some(found) = self.namespaces.get(namespace) else {
            tracing::warn!(namespace, "Unknown plugin namespace");
            return Vec::new();
        };
        found
            .entries
            .keys()
            .map(|name| Pair::new(namespace, name))
            .collect()
    }

    /// Import the addon, `None` when the namespace is unknown
    ///
    /// `known` are the pairs the caller already has, `__all__` in declared extras expands to everything
    /// else in that namespace.
    pub fn get(&self, namespace: &str, name: &str, known: &[Pair]) -> Result<Option<Addon>> {
        let Some(found) = self.namespaces.get(namespace) else {
            tracing::warn!(
                namespace,
                name,
                available = ?self.namespaces.keys().collect::<Vec<_>>(),
                "Unknown plugin namespace"
            );
            return Ok(None);
        };

        let full_name = Pair::new(namespace, name).to_string();
        let candidates = found.entries.get(name).cloned().unwrap_or_default();
        match candidates.len() {
            0 => return Err(Error::new(Kind::NoSuchAddon, "").with("addon", &full_name)),
            1 => tracing::info!(addon = %full_name, "Found addon"),
            count => tracing::warn!(addon = %full_name, count, "Found multiple entries"),
        }

        let mut hooks = Vec::new();
        let mut errors = Vec::new();
        for candidate in &candidates {
            match candidate.resolve() {
                Ok(resolved) => hooks.extend(resolved),
                Err(error) => errors.push(
                    Error::new(Kind::BadImport, "")
                        .with("addon", &full_name)
                        .with("error", format!("{error:#}")),
                ),
            }
        }
        if !errors.is_empty() {
            return Err(Error::new(Kind::BadImport, "").with_errors(errors));
        }

        let extras = self.extras(&hooks, known);
        let resolver = HookResolver::new(
            hooks,
            ResultMaker::new(namespace, Arc::clone(&found.extras_spec)),
        );
        Ok(Some(Addon::new(namespace, name, extras, Arc::new(resolver))))
    }

    fn extras(&self, hooks: &[Hook], known: &[Pair]) -> Vec<Pair> {
        let mut extras: Vec<Pair> = Vec::new();
        for (namespace, names) in hooks.iter().flat_map(Hook::extras) {
            for name in names {
                let pairs = if name == ALL {
                    let mut all: Vec<Pair> = self
                        .all_for(namespace)
                        .into_iter()
                        .filter(|pair| !known.contains(pair))
                        .collect();
                    all.sort();
                    all
                } else {
                    vec![Pair::new(namespace, name)]
                };

                for pair in pairs {
                    if !extras.contains(&pair) {
                        extras.push(pair);
                    }
                }
            }
        }
        extras
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hook::{AddonHook, HookFn};
    use pretty_assertions::assert_eq;

    #[derive(Debug)]
    struct Broken;

    impl Entry for Broken {
        fn resolve(&self) -> anyhow::Result<Vec<Hook>> {
            anyhow::bail!("couldn't load")
        }
    }

    fn hook(extras: Vec<(&str, &str)>) -> Hook {
        AddonHook::new()
            .extras(extras)
            .declare("hook", HookFn::ordinary(|_, _| Ok(None)))
            .unwrap()
    }

    fn registry() -> Arc<Registry> {
        let mut registry = Registry::new();
        registry
            .register("blue", "one", Module::new("one").hook(hook(vec![("green", ALL)])))
            .register("blue", "two", Module::new("two").hook(hook(vec![("blue", "one")])))
            .register("blue", "two", Module::new("two_again").hook(hook(vec![("blue", "three")])))
            .register("blue", "three", Module::new("three"))
            .register("green", "one", Module::new("one"))
            .register("green", "two", Module::new("two"))
            .register("green", "three", Module::new("three"))
            .register("red", "broken", Broken)
            .register("red", "broken", Broken);
        Arc::new(registry)
    }

    fn getter() -> AddonGetter {
        let mut getter = AddonGetter::new(registry());
        getter.add_namespace("blue").add_namespace("green").add_namespace("red");
        getter
    }

    #[test]
    fn listing() {
        let registry = registry();
        assert_eq!(
            registry.list_all("green"),
            vec![
                Pair::new("green", "one"),
                Pair::new("green", "two"),
                Pair::new("green", "three")
            ]
        );
        assert!(registry.list_all("yellow").is_empty());
        assert_eq!(registry.find_candidates("blue", "two").len(), 2);

        assert_eq!(getter().all_for("blue").len(), 3);
        assert!(getter().all_for("yellow").is_empty());
    }

    #[test]
    fn unknown_namespace_is_nothing() {
        assert!(getter().get("yellow", "one", &[]).unwrap().is_none());
    }

    #[test]
    fn unknown_name_is_an_error() {
        let error = getter().get("blue", "four", &[]).unwrap_err();
        assert_eq!(error.kind(), Kind::NoSuchAddon);
        assert_eq!(error.field("addon"), Some(&serde_json::json!("blue.four")));
    }

    #[test]
    fn import_failures_are_collected() {
        let error = getter().get("red", "broken", &[]).unwrap_err();
        assert_eq!(error.kind(), Kind::BadImport);
        assert_eq!(error.errors().len(), 2);
        assert_eq!(
            error.errors()[0].field("error"),
            Some(&serde_json::json!("couldn't load"))
        );
    }

    #[test]
    fn extras_of_every_candidate() {
        let addon = getter().get("blue", "two", &[]).unwrap().unwrap();
        assert_eq!(addon.pair(), Pair::new("blue", "two"));
        assert_eq!(
            addon.extras(),
            &[Pair::new("blue", "one"), Pair::new("blue", "three")]
        );
    }

    #[test]
    fn all_expands_without_known() {
        let addon = getter()
            .get("blue", "one", &[Pair::new("green", "two")])
            .unwrap()
            .unwrap();
        assert_eq!(
            addon.extras(),
            &[Pair::new("green", "one"), Pair::new("green", "three")]
        );
    }

    /// Offers a single addon in every namespace
    #[derive(Debug)]
    struct Everywhere;

    impl AddonRegistry for Everywhere {
        fn list_all(&self, namespace: &str) -> Vec<Pair> {
            vec![Pair::new(namespace, "only")]
        }

        fn find_candidates(&self, _namespace: &str, name: &str) -> Vec<Arc<dyn Entry>> {
            if name != "only" {
                return Vec::new();
            }
            let entry: Arc<dyn Entry> = Arc::new(Module::new("only").hook(hook(vec![("blue", "one")])));
            vec![entry]
        }
    }

    #[test]
    fn other_registries_plug_in() {
        let mut getter = AddonGetter::new(Arc::new(Everywhere));
        getter.add_namespace("anything");
        assert_eq!(getter.all_for("anything"), vec![Pair::new("anything", "only")]);

        let addon = getter.get("anything", "only", &[]).unwrap().unwrap();
        assert_eq!(addon.extras(), &[Pair::new("blue", "one")]);

        let error = getter.get("anything", "other", &[]).unwrap_err();
        assert_eq!(error.kind(), Kind::NoSuchAddon);
    }

    #[test]
    fn knows_added_namespaces() {
        let mut registry = Registry::new();
        registry.register("blue", "one", Module::new("one"));
        let registry: Arc<dyn AddonRegistry> = Arc::new(registry);

        let mut getter = AddonGetter::new(Arc::clone(&registry));
        getter.add_namespace("blue");
        assert!(getter.knows("blue"));
        assert!(!getter.knows("green"));
        assert_eq!(getter.all_for("blue"), vec![Pair::new("blue", "one")]);
    }
}
