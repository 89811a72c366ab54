//! Addons registering specs with a collector, which then normalises a document with them
use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use strata::addon::{Collector, Kwargs, Pair, Specs, ALL};
use strata::document::Document;
use strata::getter::{AddonGetter, Module, Registry};
use strata::hook::{AddonHook, HookFn};
use strata::meta::Root;
use strata::spec::{defaulted, integer_spec, SpecRef};
use strata::{document, Kind, Meta, Register, Result, Value};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("STRATA_LOG"))
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Debug, Default)]
struct Configuration {
    configuration: IndexMap<String, Value>,
    converters: IndexMap<Vec<String>, SpecRef>,
}

impl Collector for Configuration {
    fn configuration(&mut self) -> &mut IndexMap<String, Value> {
        &mut self.configuration
    }

    fn register_converters(&mut self, specs: &Specs) {
        for (path, spec) in specs {
            self.converters.insert(path.clone(), spec.clone());
        }
    }
}

impl Configuration {
    fn normalise(&self, document: Document) -> Result<BTreeMap<String, Value>> {
        let root = Meta::new(document);
        let mut normalised = BTreeMap::new();
        for (path, spec) in &self.converters {
            let meta = path.iter().fold(root.clone(), |meta, key| meta.at(key.as_str()));
            let value = root.root().lookup(&path.join(".")).unwrap_or_default();
            normalised.insert(path.join("."), spec.normalise(&meta, value)?);
        }
        Ok(normalised)
    }
}

fn port(path: &str, default: i64) -> Specs {
    let mut specs = Specs::new();
    specs.insert(
        vec![path.to_string(), "port".to_string()],
        defaulted(integer_spec(), default),
    );
    specs
}

fn tool(name: &'static str) -> Module {
    Module::new(name).hook(
        AddonHook::new()
            .post_register()
            .declare(
                "announce",
                HookFn::post_register(move |collector, kwargs| {
                    let tools = collector
                        .configuration()
                        .entry("tools".to_string())
                        .or_insert_with(|| Value::List(Vec::new()));
                    if let Value::List(tools) = tools {
                        tools.push(Value::from((name, kwargs.get("verbose").cloned().unwrap_or_default())));
                    }
                    Ok(())
                }),
            )
            .unwrap(),
    )
}

fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register(
            "app",
            "web",
            Module::new("web").hook(
                AddonHook::new()
                    .extras(vec![("app", "db")])
                    .declare(
                        "ports",
                        HookFn::ordinary(|_, result_maker| {
                            Ok(Some(result_maker.make(port("web", 80), Value::List(Vec::new()))?))
                        }),
                    )
                    .unwrap(),
            ),
        )
        .register(
            "app",
            "db",
            Module::new("db").hook(
                AddonHook::new()
                    .declare(
                        "ports",
                        HookFn::ordinary(|_, result_maker| {
                            Ok(Some(result_maker.make(port("db", 5432), vec![("tools", ALL)])?))
                        }),
                    )
                    .unwrap(),
            ),
        )
        .register("tools", "lint", tool("lint"))
        .register("tools", "fmt", tool("fmt"));
    registry
}

fn register() -> Register<Configuration> {
    let mut getter = AddonGetter::new(std::sync::Arc::new(registry()));
    getter.add_namespace("app").add_namespace("tools");
    Register::new(getter, Configuration::default())
}

fn kwargs() -> BTreeMap<String, Kwargs> {
    let mut kwargs = Kwargs::new();
    kwargs.insert("verbose".to_string(), true.into());
    BTreeMap::from([("tools".to_string(), kwargs)])
}

#[test]
fn registers_everything_that_turns_up() {
    init_logging();
    let mut register = register();
    register.register([("app", "web")], &kwargs()).unwrap();

    let mut known = register.known().to_vec();
    known.sort();
    assert_eq!(
        known,
        vec![
            Pair::new("app", "db"),
            Pair::new("app", "web"),
            Pair::new("tools", "fmt"),
            Pair::new("tools", "lint"),
        ]
    );
    assert_eq!(register.resolved().len(), 4);

    let layered: Vec<Vec<String>> = register
        .layered()
        .unwrap()
        .into_iter()
        .map(|layer| layer.into_iter().map(|(pair, _)| pair.to_string()).collect())
        .collect();
    assert_eq!(
        layered,
        vec![vec!["tools.fmt", "tools.lint"], vec!["app.db"], vec!["app.web"]]
    );

    assert_eq!(
        register.resolved()[&Pair::new("app", "db")][0].extras(),
        &vec![(
            "tools".to_string(),
            vec!["fmt".to_string(), "lint".to_string()]
        )]
    );
    assert_eq!(
        register.collector().configuration.get("tools"),
        Some(&Value::List(vec![
            Value::from(("fmt", true)),
            Value::from(("lint", true)),
        ]))
    );
}

#[test]
fn registered_specs_normalise_the_document() {
    init_logging();
    let mut register = register();
    register.register([("app", "web")], &kwargs()).unwrap();
    let configuration = register.into_collector();

    let normalised = configuration
        .normalise(document!("services.hcl" => "web { port = \"8080\" }"))
        .unwrap();
    assert_eq!(
        normalised,
        BTreeMap::from([
            ("db.port".to_string(), Value::from(5432)),
            ("web.port".to_string(), Value::from(8080)),
        ])
    );

    let error = configuration
        .normalise(document!("services.hcl" => "web { port = \"eighty\" }"))
        .unwrap_err();
    insta::assert_snapshot!(
        error.oneline().replace('\t', " | "),
        @r#""Bad value. Expected an integer" | got=string | meta={source=services.hcl, path=web.port}"#
    );
}

#[test]
fn unknown_addons_stop_registration() {
    init_logging();
    let mut register = register();

    let error = register.register([("app", "cache")], &kwargs()).unwrap_err();
    assert_eq!(error.kind(), Kind::NoSuchAddon);
    insta::assert_snapshot!(error.oneline().replace('\t', " | "), @r#""No such addon" | addon=app.cache"#);
}

#[test]
fn declared_cycles_are_found_before_anything_runs() {
    init_logging();
    let declares = |other: &'static str| {
        Module::new(other).hook(
            AddonHook::new()
                .extras(vec![("app", other)])
                .declare(
                    "declares",
                    HookFn::ordinary(|_, _| anyhow::bail!("resolved a cycle")),
                )
                .unwrap(),
        )
    };

    let mut registry = Registry::new();
    registry
        .register("app", "a", declares("b"))
        .register("app", "b", declares("a"));
    let mut getter = AddonGetter::new(std::sync::Arc::new(registry));
    getter.add_namespace("app");
    let mut register = Register::new(getter, Configuration::default());

    let error = register.register([("app", "a")], &BTreeMap::new()).unwrap_err();
    assert_eq!(error.kind(), Kind::DepCycle);
    assert_eq!(
        error.field("chain"),
        Some(&serde_json::json!(["app.a", "app.b", "app.a"]))
    );
}
