//! registering addons until nothing new turns up
//!
//! Resolving an addon can reveal dependencies that have to be imported and resolved in turn, so
//! [Register] works in rounds:
//!
//! 1. [Register::add_pairs] what was asked for
//! 2. [Register::recursive_import_known] imports everything known, adding the extras declared by hooks,
//!    until no new pair shows up. No hook runs yet.
//! 3. [Register::recursive_resolve_imported] resolves the imported addons in layer order. Extras of the
//!    results are imported and resolved in the next round, until a round finds nothing new.
//! 4. [Register::post_register] runs post register hooks in layer order.
//!
//! [Register::register] does all of it:
//!
//! ```
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//! use strata::addon::{Collector, Specs};
//! use strata::getter::{AddonGetter, Module, Registry};
//! use strata::hook::{AddonHook, HookFn};
//! use strata::{Register, Value};
//! use indexmap::IndexMap;
//!
//! #[derive(Default)]
//! struct Configuration(IndexMap<String, Value>);
//!
//! impl Collector for Configuration {
//!     fn configuration(&mut self) -> &mut IndexMap<String, Value> {
//!         &mut self.0
//!     }
//!
//!     fn register_converters(&mut self, _specs: &Specs) {}
//! }
//!
//! let hook = AddonHook::new()
//!     .declare("hello", HookFn::ordinary(|collector, _| {
//!         collector.configuration().insert("hello".to_string(), "world".into());
//!         Ok(None)
//!     }))
//!     .unwrap();
//!
//! let mut registry = Registry::new();
//! registry.register("greetings", "hello", Module::new("hello").hook(hook));
//! let mut getter = AddonGetter::new(Arc::new(registry));
//! getter.add_namespace("greetings");
//!
//! let mut register = Register::new(getter, Configuration::default());
//! register.register([("greetings", "hello")], &BTreeMap::new()).unwrap();
//! assert_eq!(register.collector().0.get("hello"), Some(&Value::from("world")));
//! ```
use crate::addon::{Addon, AddonResult, Collector, Extras, Kwargs, Pair, ALL};
use crate::error::Result;
use crate::getter::AddonGetter;
use crate::layers::Layers;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, derive_new::new)]
pub struct Register<C> {
    addon_getter: AddonGetter,
    collector: C,
    #[new(default)]
    known: Vec<Pair>,
    #[new(default)]
    imported: BTreeMap<Pair, Addon>,
    #[new(default)]
    resolved: BTreeMap<Pair, Vec<AddonResult>>,
}

impl<C: Collector> Register<C> {
    /// Add, import, resolve, then post register
    ///
    /// `extra_args` holds the keyword arguments for the post register hooks of each namespace.
    pub fn register<P: Into<Pair>>(
        &mut self,
        pairs: impl IntoIterator<Item = P>,
        extra_args: &BTreeMap<String, Kwargs>,
    ) -> Result<()> {
        self.add_pairs(pairs);
        self.recursive_import_known()?;
        self.recursive_resolve_imported()?;
        self.post_register(extra_args)
    }

    /// Returns the pairs that weren't known yet, `__all__` is expanded after the other pairs
    pub fn add_pairs<P: Into<Pair>>(&mut self, pairs: impl IntoIterator<Item = P>) -> Vec<Pair> {
        let mut import_all = BTreeSet::new();
        let mut found = Vec::new();

        for pair in pairs.into_iter().map(Into::into) {
            if pair.is_all() {
                import_all.insert(pair.namespace);
            } else if !self.known.contains(&pair) {
                found.push(pair.clone());
                self.known.push(pair);
            }
        }

        for namespace in import_all {
            for pair in self.addon_getter.all_for(&namespace) {
                if !self.known.contains(&pair) {
                    found.push(pair.clone());
                    self.known.push(pair);
                }
            }
        }

        found
    }

    /// Pairs added from `(namespace, names)`, sorted
    pub fn add_pairs_from_extras(&mut self, extras: &Extras) -> Vec<Pair> {
        let mut found = Vec::new();
        for (namespace, names) in extras {
            for name in names {
                found.extend(self.add_pairs([Pair::new(namespace, name)]));
            }
        }
        found.sort();
        found
    }

    /// Import until no new pairs show up, returns whether anything was imported
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn recursive_import_known(&mut self) -> Result<bool> {
        let mut added = false;
        while self.import_known()? {
            added = true;
        }
        Ok(added)
    }

    fn import_known(&mut self) -> Result<bool> {
        let mut added = false;
        for pair in self.known.clone() {
            if self.imported.contains_key(&pair) {
                continue;
            }

            match self.addon_getter.get(&pair.namespace, &pair.name, &self.known)? {
                None => self.known.retain(|known| known != &pair),
                Some(addon) => {
                    let extras = addon.extras().to_vec();
                    tracing::trace!(%pair, ?extras, "imported");
                    self.imported.insert(pair, addon);
                    self.add_pairs(extras);
                    added = true;
                }
            }
        }
        Ok(added)
    }

    /// Resolve in rounds until a round finds nothing new
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn recursive_resolve_imported(&mut self) -> Result<()> {
        let mut round = 0;
        while self.resolve_imported()? {
            round += 1;
            tracing::debug!(round, known = self.known.len(), "found more addons");
        }
        Ok(())
    }

    fn resolve_imported(&mut self) -> Result<bool> {
        for pair in self.layered_pairs()?.into_iter().flatten() {
            if self.resolved.contains_key(&pair) {
                continue;
            }
            let Some(addon) = self.imported.get_mut(&pair) else {
                continue;
            };

            let results = addon.resolved(&mut self.collector)?.to_vec();
            addon.process(&mut self.collector)?;

            let mut expanded = Vec::with_capacity(results.len());
            for result in results {
                let found = self.add_pairs_from_extras(result.extras());
                if has_all(result.extras()) {
                    expanded.push(result.with_extras(expand_all(result.extras(), found)));
                } else {
                    expanded.push(result);
                }
            }

            if let Some(addon) = self.imported.get_mut(&pair) {
                addon.replace_resolved(expanded.clone());
            }
            self.resolved.insert(pair, expanded);
        }

        self.recursive_import_known()
    }

    /// Run post register hooks in layer order with the arguments for their namespace
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn post_register(&mut self, extra_args: &BTreeMap<String, Kwargs>) -> Result<()> {
        let empty = Kwargs::new();
        for pair in self.layered_pairs()?.into_iter().flatten() {
            let Some(addon) = self.imported.get(&pair) else {
                continue;
            };
            let kwargs = extra_args.get(&pair.namespace).unwrap_or(&empty);
            addon.post_register(&mut self.collector, kwargs)?;
        }
        Ok(())
    }

    /// Imported addons in dependency order, worked out again on every call
    pub fn layered(&self) -> Result<Vec<Vec<(&Pair, &Addon)>>> {
        Ok(self.layers()?.layered())
    }

    fn layered_pairs(&self) -> Result<Vec<Vec<Pair>>> {
        Ok(self.layers()?.layered_names().to_vec())
    }

    fn layers(&self) -> Result<Layers<'_, Pair, Addon>> {
        let mut layers = Layers::new(&self.imported);
        layers.add_all_to_layers()?;
        Ok(layers)
    }

    pub fn known(&self) -> &[Pair] {
        &self.known
    }

    pub fn imported(&self) -> &BTreeMap<Pair, Addon> {
        &self.imported
    }

    pub fn resolved(&self) -> &BTreeMap<Pair, Vec<AddonResult>> {
        &self.resolved
    }

    pub fn collector(&self) -> &C {
        &self.collector
    }

    pub fn collector_mut(&mut self) -> &mut C {
        &mut self.collector
    }

    pub fn into_collector(self) -> C {
        self.collector
    }
}

fn has_all(extras: &Extras) -> bool {
    extras
        .iter()
        .any(|(_, names)| names.iter().any(|name| name == ALL))
}

/// `__all__` replaced with the names that were actually found
fn expand_all(extras: &Extras, found: Vec<Pair>) -> Extras {
    let mut want: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (namespace, names) in extras {
        for name in names.iter().filter(|name| *name != ALL) {
            want.entry(namespace.clone()).or_default().insert(name.clone());
        }
    }
    for pair in found {
        want.entry(pair.namespace).or_default().insert(pair.name);
    }

    want.into_iter()
        .map(|(namespace, names)| (namespace, names.into_iter().collect()))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::addon::test::RecordingCollector;
    use crate::addon::Specs;
    use crate::error::Kind;
    use crate::getter::{Module, Registry};
    use crate::hook::{AddonHook, HookFn};
    use crate::spec::string_spec;
    use crate::value::Value;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn pairs(items: &[(&str, &str)]) -> Vec<Pair> {
        items.iter().map(|pair| Pair::from(*pair)).collect()
    }

    fn declares(extras: Vec<(&str, &str)>) -> Module {
        Module::new("declares").hook(
            AddonHook::new()
                .extras(extras)
                .declare("declares", HookFn::ordinary(|_, _| Ok(None)))
                .unwrap(),
        )
    }

    fn discovers(extras: Vec<(&'static str, &'static str)>) -> Module {
        Module::new("discovers").hook(
            AddonHook::new()
                .declare(
                    "discovers",
                    HookFn::ordinary(move |_, result_maker| {
                        let mut specs = Specs::new();
                        specs.insert(vec!["key".to_string()], string_spec());
                        Ok(Some(result_maker.make(specs, extras.clone())?))
                    }),
                )
                .unwrap(),
        )
    }

    fn records(label: &'static str) -> Module {
        Module::new(label).hook(
            AddonHook::new()
                .post_register()
                .declare(
                    "records",
                    HookFn::post_register(move |collector, kwargs| {
                        let seen = collector
                            .configuration()
                            .entry("post_register".to_string())
                            .or_insert_with(|| Value::List(Vec::new()));
                        if let Value::List(items) = seen {
                            items.push(Value::from((label, kwargs.get("x").cloned().unwrap_or_default())));
                        }
                        Ok(())
                    }),
                )
                .unwrap(),
        )
    }

    fn register_with(registry: Registry, namespaces: &[&str]) -> Register<RecordingCollector> {
        let mut getter = AddonGetter::new(Arc::new(registry));
        for namespace in namespaces {
            getter.add_namespace(*namespace);
        }
        Register::new(getter, RecordingCollector::default())
    }

    #[test]
    fn starts_empty() {
        let register = register_with(Registry::new(), &[]);
        assert!(register.known().is_empty());
        assert!(register.imported().is_empty());
        assert!(register.resolved().is_empty());
    }

    #[test]
    fn adding_pairs() {
        let mut registry = Registry::new();
        registry
            .register("one", "a", Module::new("a"))
            .register("one", "b", Module::new("b"));
        let mut register = register_with(registry, &["one"]);

        assert_eq!(
            register.add_pairs([("one", "x"), ("two", "y")]),
            pairs(&[("one", "x"), ("two", "y")])
        );
        assert!(register.add_pairs([("one", "x")]).is_empty());
        assert_eq!(
            register.add_pairs([("one", ALL), ("one", "a")]),
            pairs(&[("one", "a"), ("one", "b")])
        );
        assert_eq!(
            register.known(),
            pairs(&[("one", "x"), ("two", "y"), ("one", "a"), ("one", "b")])
        );
    }

    #[test]
    fn unresolved_dependencies_are_layered() {
        let mut registry = Registry::new();
        registry
            .register("ns", "one", declares(vec![("ns", "two")]))
            .register("ns", "two", declares(vec![("ns", "three")]))
            .register("ns", "three", Module::new("three"));
        let mut register = register_with(registry, &["ns"]);

        register.add_pairs([("ns", "one")]);
        assert!(register.recursive_import_known().unwrap());
        assert!(!register.recursive_import_known().unwrap());

        let layered: Vec<Vec<String>> = register
            .layered()
            .unwrap()
            .into_iter()
            .map(|layer| layer.into_iter().map(|(pair, _)| pair.to_string()).collect())
            .collect();
        assert_eq!(
            layered,
            vec![vec!["ns.three"], vec!["ns.two"], vec!["ns.one"]]
        );
        assert_eq!(
            register.layered_pairs().unwrap(),
            vec![
                pairs(&[("ns", "three")]),
                pairs(&[("ns", "two")]),
                pairs(&[("ns", "one")])
            ]
        );
    }

    #[test]
    fn unknown_namespaces_are_dropped() {
        let mut registry = Registry::new();
        registry.register("ns", "one", declares(vec![("elsewhere", "thing")]));
        let mut register = register_with(registry, &["ns"]);

        register.add_pairs([("ns", "one"), ("nowhere", "two")]);
        register.recursive_import_known().unwrap();
        assert_eq!(register.known(), pairs(&[("ns", "one")]));
        assert_eq!(register.imported().len(), 1);
    }

    #[test]
    fn resolving_discovers_more() {
        let mut registry = Registry::new();
        registry
            .register("ns", "one", discovers(vec![("ns", "two")]))
            .register("ns", "two", discovers(vec![("other", ALL)]))
            .register("other", "a", Module::new("a"))
            .register("other", "b", Module::new("b"));
        let mut register = register_with(registry, &["ns", "other"]);

        register.add_pairs([("ns", "one")]);
        register.recursive_import_known().unwrap();
        assert_eq!(register.imported().len(), 1);

        register.recursive_resolve_imported().unwrap();
        assert_eq!(
            register.known(),
            pairs(&[("ns", "one"), ("ns", "two"), ("other", "a"), ("other", "b")])
        );
        assert_eq!(register.resolved().len(), 4);
        assert_eq!(register.imported().len(), 4);
        assert_eq!(register.collector().registered.len(), 2);

        let expanded = &register.resolved()[&Pair::new("ns", "two")];
        assert_eq!(
            expanded[0].extras(),
            &vec![("other".to_string(), vec!["a".to_string(), "b".to_string()])]
        );
        let addon = &register.imported()[&Pair::new("ns", "two")];
        assert_eq!(
            addon.resolved_dependencies().collect::<Vec<_>>(),
            pairs(&[("other", "a"), ("other", "b")])
        );

        // Converged, so another round changes nothing
        register.recursive_resolve_imported().unwrap();
        assert_eq!(register.known().len(), 4);
        assert_eq!(register.collector().registered.len(), 2);
    }

    #[test]
    fn expanding_all_keeps_named_extras() {
        let extras = vec![
            ("one".to_string(), vec!["x".to_string(), ALL.to_string()]),
            ("two".to_string(), vec!["y".to_string()]),
        ];
        assert!(has_all(&extras));
        assert_eq!(
            expand_all(&extras, pairs(&[("one", "a"), ("one", "x")])),
            vec![
                ("one".to_string(), vec!["a".to_string(), "x".to_string()]),
                ("two".to_string(), vec!["y".to_string()]),
            ]
        );
    }

    #[test]
    fn cycles_found_while_resolving() {
        let mut registry = Registry::new();
        registry
            .register("ns", "one", discovers(vec![("ns", "two")]))
            .register("ns", "two", discovers(vec![("ns", "one")]));
        let mut register = register_with(registry, &["ns"]);

        let error = register
            .register([("ns", "one")], &BTreeMap::new())
            .unwrap_err();
        assert_eq!(error.kind(), Kind::DepCycle);
        assert_eq!(
            error.field("chain"),
            Some(&serde_json::json!(["ns.one", "ns.two", "ns.one"]))
        );
    }

    #[test]
    fn post_register_in_layer_order() {
        let mut registry = Registry::new();
        registry
            .register("ns", "first", declares(vec![("other", "second")]))
            .register("ns", "first", records("first"))
            .register("other", "second", records("second"));
        let mut register = register_with(registry, &["ns", "other"]);

        let mut kwargs = Kwargs::new();
        kwargs.insert("x".to_string(), 1.into());
        let extra_args = BTreeMap::from([("ns".to_string(), kwargs)]);

        register.register([("ns", "first")], &extra_args).unwrap();
        assert_eq!(
            register.collector().configuration.get("post_register"),
            Some(&Value::List(vec![
                Value::from(("second", Value::NotSpecified)),
                Value::from(("first", 1)),
            ]))
        );
    }
}
