//! dependency layering
//!
//! [Layers] places items into layers so that everything an item depends on lives in an earlier layer:
//!
//! ```text
//! five -> [four, two]        layer 0: one
//! four -> [three]            layer 1: three
//! two -> [three]             layer 2: four, two
//! three -> [one]             layer 3: five
//! ```
//!
//! Dependencies are placed depth first. A dependency that is already on the path being walked is a
//! [Kind::DepCycle], reaching the same item again over a different path is fine.
use crate::error::{Error, Kind, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Something that can tell which other items it depends on
pub trait Dependencies<K>: Sized {
    fn dependencies(&self, all: &BTreeMap<K, Self>) -> Vec<K>;
}

#[derive(Debug)]
pub struct Layers<'a, K, D> {
    deps: Vec<K>,
    all_deps: &'a BTreeMap<K, D>,
    accounted: BTreeSet<K>,
    layered: Vec<Vec<K>>,
}

impl<'a, K, D> Layers<'a, K, D>
where
    K: Ord + Clone + fmt::Display,
    D: Dependencies<K>,
{
    /// Layer everything in `all_deps`
    pub fn new(all_deps: &'a BTreeMap<K, D>) -> Self {
        Self::with_deps(all_deps.keys().cloned(), all_deps)
    }

    /// Layer `deps`, looking dependencies up in `all_deps`
    pub fn with_deps(deps: impl IntoIterator<Item = K>, all_deps: &'a BTreeMap<K, D>) -> Self {
        Self {
            deps: deps.into_iter().collect(),
            all_deps,
            accounted: BTreeSet::new(),
            layered: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.accounted.clear();
        self.layered.clear();
    }

    pub fn add_all_to_layers(&mut self) -> Result<()> {
        let mut deps = self.deps.clone();
        deps.sort();
        for dep in &deps {
            self.add_to_layers(dep)?;
        }
        Ok(())
    }

    pub fn add_to_layers(&mut self, name: &K) -> Result<()> {
        self.add_with_chain(name, &[])
    }

    fn add_with_chain(&mut self, name: &K, chain: &[K]) -> Result<()> {
        if !self.accounted.insert(name.clone()) {
            return Ok(());
        }

        let Some(item) = self.all_deps.get(name) else {
            tracing::warn!(%name, "not layering unknown dependency");
            return Ok(());
        };

        let mut chain = chain.to_vec();
        chain.push(name.clone());

        let mut dependencies = item.dependencies(self.all_deps);
        dependencies.sort();
        for dependency in &dependencies {
            if chain.contains(dependency) {
                let cycle: Vec<String> = chain
                    .iter()
                    .chain([dependency])
                    .map(ToString::to_string)
                    .collect();
                return Err(Error::new(Kind::DepCycle, "").with("chain", cycle));
            }
            self.add_with_chain(dependency, &chain)?;
        }

        let layer = self
            .layered
            .iter()
            .enumerate()
            .filter(|(_, layer)| dependencies.iter().any(|dependency| layer.contains(dependency)))
            .map(|(index, _)| index + 1)
            .max()
            .unwrap_or(0);

        if self.layered.len() <= layer {
            self.layered.resize_with(layer + 1, Vec::new);
        }
        tracing::trace!(%name, layer, "layered");
        self.layered[layer].push(name.clone());
        Ok(())
    }

    pub fn layered_names(&self) -> &[Vec<K>] {
        &self.layered
    }

    /// Every layer as `(name, item)`
    pub fn layered(&self) -> Vec<Vec<(&'a K, &'a D)>> {
        self.layered
            .iter()
            .map(|layer| {
                layer
                    .iter()
                    .filter_map(|name| self.all_deps.get_key_value(name))
                    .collect()
            })
            .collect()
    }
}
