//! Normalising a document merged from several sources
//!
//! Errors are compared as a tree of onelines, tabs shown as ` | `.
use pretty_assertions::assert_eq;
use std::sync::Arc;
use strata::document::Document;
use strata::field::{Field, FieldSpec, FieldValues, Fields, Schema};
use strata::formatter::OptionsFormatter;
use strata::meta::Root;
use strata::spec::{integer_spec, required, string_spec, valid_string_spec};
use strata::validators::NoWhitespace;
use strata::{Error, Meta, Result};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("STRATA_LOG"))
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Debug, PartialEq)]
struct Service {
    name: String,
    image: String,
    port: i64,
}

impl Schema for Service {
    fn fields() -> Fields {
        Fields::new()
            .field(
                "name",
                Field::new(|| valid_string_spec(vec![Arc::new(NoWhitespace::new())])).wrapper(required),
            )
            .field("image", Field::new(string_spec).formatted().help("where to pull from"))
            .field("port", Field::new(integer_spec).default(8080))
    }

    fn create(mut values: FieldValues) -> Result<Self> {
        Ok(Self {
            name: values.string("name")?,
            image: values.string("image")?,
            port: values.integer("port")?,
        })
    }
}

fn document() -> Document {
    let mut document = Document::new();
    document
        .parse_yaml(
            r#"
registry: example.com
services:
  web:
    name: web
    image: "{registry}/{_key_name_1}"
  db:
    name: data base
"#,
            "base.yaml",
        )
        .unwrap();
    document
        .parse_hcl(
            r#"
services {
  db {
    port = "five"
  }
}
"#,
            "override.hcl",
        )
        .unwrap();
    document
}

fn service(meta: &Meta, name: &str) -> Result<Service> {
    let services = meta.at("services");
    let meta = services.at(name);
    let value = meta.root().lookup(&meta.nonspecial_path()).unwrap_or_default();
    FieldSpec::<Service>::new()
        .formatter(Arc::new(OptionsFormatter::new()))
        .normalise(&meta, value)
}

fn report(error: &Error) -> String {
    fn walk(error: &Error, depth: usize, lines: &mut Vec<String>) {
        lines.push(format!("{}{}", "  ".repeat(depth), error.oneline().replace('\t', " | ")));
        for nested in error.errors() {
            walk(nested, depth + 1, lines);
        }
    }

    let mut lines = Vec::new();
    walk(error, 0, &mut lines);
    lines.join("\n")
}

#[test]
fn formats_against_the_whole_document() {
    init_logging();
    let meta = Meta::new(document());

    assert_eq!(
        service(&meta, "web").unwrap(),
        Service {
            name: "web".to_string(),
            image: "example.com/web".to_string(),
            port: 8080,
        }
    );
}

#[test]
fn reports_every_problem_with_its_source() {
    init_logging();
    let meta = Meta::new(document());

    let error = service(&meta, "db").unwrap_err();
    insta::assert_snapshot!(report(&error), @r#"
    "Bad value" | meta={source=override.hcl, path=services.db}
      "Bad value. Failed to validate" | meta={source=base.yaml, path=services.db.name}
        "Bad value. Expected no whitespace" | meta={source=base.yaml, path=services.db.name} | val=data base
      "Bad value. Expected an integer" | got=string | meta={source=override.hcl, path=services.db.port}
    "#);
}

#[test]
fn missing_services_only_need_required_fields() {
    init_logging();
    let meta = Meta::new(document());

    let error = service(&meta, "cache").unwrap_err();
    assert_eq!(error.errors().len(), 1);
    assert_eq!(error.errors()[0].message(), "Expected a value but got none");
    assert_eq!(
        error.errors()[0].field("meta"),
        Some(&serde_json::json!("{source=override.hcl, path=services.cache.name}"))
    );

    let values = FieldSpec::<Service>::new()
        .formatter(Arc::new(OptionsFormatter::new()))
        .normalise_values(&meta.at("services").at("cache"), [("name", "cache")].into_iter().collect())
        .unwrap();
    assert_eq!(values.get("port"), Some(&8080.into()));
    assert_eq!(values.get("image"), Some(&"".into()));
}
