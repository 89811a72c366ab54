//! # strata - layered addons and normalised configuration
//!
//! ## Introduction for developers
//!
//! Read this to understand how `strata` works internally. There are two halves that meet at the
//! [addon::Collector]: addons register specs with the collector, and the collector uses the specs to normalise
//! configuration.
//!
//! ### Terms
//!
//! - a **pair** is a `(namespace, name)` that identifies one addon ([addon::Pair])
//! - an **addon** is a set of hooks found in the [getter::Registry] under a pair
//! - a **hook** is a function an addon runs, either while it is resolved (ordinary) or at the very end
//!   (post register)
//! - **extras** are the pairs an addon depends on
//! - a **spec** turns a raw [Value] into a normalised one or explains why it can't ([spec::Spec])
//! - a **meta** is where in the document a spec is looking ([Meta])
//!
//! ### Registering addons
//!
//! see [register::Register]
//!
//! Addons can't tell everything they depend on up front. Hooks declare extras before they run, but the
//! [addon::AddonResult]s they return can add more. So registration repeats until nothing new turns up:
//!
//! ```text
//!   add pairs ──> import known ──> resolve in layers ──> post register
//!                    ^                   │
//!                    └── new extras ─────┘
//! ```
//!
//! Importing only looks hooks up, it never runs them. Resolving runs the ordinary hooks of every addon whose
//! dependencies were resolved before it, which is what [layers::Layers] works out. A dependency that leads back
//! to itself is a [error::Kind::DepCycle].
//!
//! The name `__all__` stands for every addon of a namespace. It is expanded as soon as it is seen, and the
//! results of resolved addons keep the expanded names rather than `__all__`.
//!
//! ### Normalising values
//!
//! see [spec]
//!
//! Values are [Value]s, which know the difference between a key that is missing ([Value::NotSpecified]) and a
//! key that is `null`. Specs are small and composed:
//!
//! ```
//! use strata::spec::{defaulted, dictof, integer_spec, listof, string_spec, Spec};
//! use strata::{Meta, Value};
//!
//! let spec = dictof(string_spec(), defaulted(listof(integer_spec()), vec![80]));
//! let normalised = spec
//!     .normalise(&Meta::empty(), serde_json::json!({"web": "8080"}).into())
//!     .unwrap();
//! assert_eq!(normalised, serde_json::json!({"web": [8080]}).into());
//! ```
//!
//! Structural specs keep going when a child fails, so one run reports every problem at once as a tree of
//! [Error]s, each knowing its path (and source, when the [Meta] root is a [document::Document]).
//!
//! Types describe their shape with a table of [field::Field]s, see [field].
//!
//! ### Formatting
//!
//! see [formatter]
//!
//! Strings can refer to other values of the document as `{dotted.key}`. [spec::many_format] keeps formatting
//! until the value stops changing and refuses to go around in circles.
//!
pub mod addon;
pub mod document;
pub mod error;
pub mod field;
pub mod formatter;
pub mod getter;
pub mod hook;
pub mod layers;
pub mod meta;
pub mod register;
pub mod spec;
pub mod validators;
pub mod value;

pub use error::{Error, Kind, ProgrammerError, Result};
pub use meta::Meta;
pub use register::Register;
pub use value::{Value, ValueType};
