//! hook declaration
//!
//! Addons provide their behaviour as hooks. An ordinary hook runs while its addon is resolved and may return an
//! [AddonResult] (made with the [ResultMaker] it is handed). A post register hook runs once everything has been
//! resolved, in dependency order, with the keyword arguments given for its namespace.
//!
//! ```
//! use strata::hook::{AddonHook, HookFn};
//!
//! let hook = AddonHook::new()
//!     .extras(vec![("storage", "__all__")])
//!     .declare(
//!         "register_storage",
//!         HookFn::ordinary(|_collector, result_maker| {
//!             Ok(Some(result_maker.make(Default::default(), vec![("storage", "disk")])?))
//!         }),
//!     )
//!     .unwrap();
//! assert_eq!(hook.extras(), &[("storage".to_string(), vec!["__all__".to_string()])]);
//! ```
use crate::addon::{extras_from_value, AddonResult, Collector, Extras, Kwargs, ResultMaker};
use crate::error::ProgrammerError;
use crate::meta::Meta;
use crate::spec::{listof, string_spec, tuple_spec};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

pub type OrdinaryFn =
    Arc<dyn Fn(&mut dyn Collector, &ResultMaker) -> anyhow::Result<Option<AddonResult>> + Send + Sync>;

pub type PostRegisterFn = Arc<dyn Fn(&mut dyn Collector, &Kwargs) -> anyhow::Result<()> + Send + Sync>;

/// The function behind a hook
#[derive(Clone)]
pub enum HookFn {
    Ordinary(OrdinaryFn),
    PostRegister(PostRegisterFn),
}

impl HookFn {
    pub fn ordinary(
        run: impl Fn(&mut dyn Collector, &ResultMaker) -> anyhow::Result<Option<AddonResult>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        HookFn::Ordinary(Arc::new(run))
    }

    pub fn post_register(
        run: impl Fn(&mut dyn Collector, &Kwargs) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        HookFn::PostRegister(Arc::new(run))
    }

    fn kind_name(&self) -> &'static str {
        match self {
            HookFn::Ordinary(_) => "ordinary",
            HookFn::PostRegister(_) => "post_register",
        }
    }
}

#[derive(Clone)]
pub enum HookKind {
    Ordinary { extras: Extras, run: OrdinaryFn },
    PostRegister { run: PostRegisterFn },
}

#[derive(Clone)]
pub struct Hook {
    name: String,
    kind: HookKind,
}

impl Hook {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &HookKind {
        &self.kind
    }

    pub fn is_post_register(&self) -> bool {
        matches!(self.kind, HookKind::PostRegister { .. })
    }

    /// Dependencies declared before the hook runs, empty for post register hooks
    pub fn extras(&self) -> &[(String, Vec<String>)] {
        match &self.kind {
            HookKind::Ordinary { extras, .. } => extras,
            HookKind::PostRegister { .. } => &[],
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("name", &self.name)
            .field("post_register", &self.is_post_register())
            .field("extras", &self.extras())
            .finish()
    }
}

/// A hook that returned an error
#[derive(thiserror::Error, Debug)]
#[error("hook {hook} failed: {error:#}")]
pub struct HookFailure {
    pub hook: String,
    pub error: anyhow::Error,
}

/// Declares hooks
///
/// `extras` is a list of `(namespace, names)` where `names` is one name or a list of names. The name
/// `__all__` stands for everything registered in that namespace.
#[derive(Debug, Clone, Default)]
pub struct AddonHook {
    extras: Value,
    post_register: bool,
}

impl AddonHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extras(mut self, extras: impl Into<Value>) -> Self {
        self.extras = extras.into();
        self
    }

    pub fn post_register(mut self) -> Self {
        self.post_register = true;
        self
    }

    fn has_extras(&self) -> bool {
        match &self.extras {
            Value::NotSpecified | Value::Null => false,
            Value::List(items) | Value::Tuple(items) => !items.is_empty(),
            Value::Object(object) => !object.is_empty(),
            _ => true,
        }
    }

    pub fn declare(&self, name: impl Into<String>, run: HookFn) -> Result<Hook, ProgrammerError> {
        let name = name.into();
        if self.post_register && self.has_extras() {
            return Err(ProgrammerError::ExtrasWithPostRegister);
        }

        let kind = match run {
            HookFn::Ordinary(run) if !self.post_register => {
                let spec = listof(tuple_spec(vec![string_spec(), listof(string_spec())]));
                let meta = Meta::empty();
                let extras = spec
                    .normalise(&meta, self.extras.clone())
                    .and_then(|extras| extras_from_value(extras, &meta))
                    .map_err(|error| ProgrammerError::BadExtras {
                        hook: name.clone(),
                        error,
                    })?;
                HookKind::Ordinary { extras, run }
            }
            HookFn::PostRegister(run) if self.post_register => HookKind::PostRegister { run },
            other => {
                return Err(ProgrammerError::HookMismatch {
                    hook: name,
                    declared: if self.post_register {
                        "post_register"
                    } else {
                        "ordinary"
                    },
                    given: other.kind_name(),
                })
            }
        };

        Ok(Hook { name, kind })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn nothing() -> HookFn {
        HookFn::ordinary(|_, _| Ok(None))
    }

    #[test]
    fn extras_are_normalised() {
        let hook = AddonHook::new()
            .extras(vec![
                Value::from(("one", "two")),
                Value::from(("three", vec!["four", "five"])),
            ])
            .declare("hook", nothing())
            .unwrap();
        assert_eq!(
            hook.extras(),
            &[
                ("one".to_string(), vec!["two".to_string()]),
                (
                    "three".to_string(),
                    vec!["four".to_string(), "five".to_string()]
                ),
            ]
        );
        assert!(!hook.is_post_register());

        let single = AddonHook::new()
            .extras(("one", "two"))
            .declare("hook", nothing())
            .unwrap();
        assert_eq!(single.extras(), &[("one".to_string(), vec!["two".to_string()])]);

        let none = AddonHook::new().declare("hook", nothing()).unwrap();
        assert!(none.extras().is_empty());
    }

    #[test]
    fn malformed_extras() {
        let error = AddonHook::new()
            .extras(vec![Value::from(1)])
            .declare("hook", nothing())
            .unwrap_err();
        assert!(matches!(error, ProgrammerError::BadExtras { ref hook, .. } if hook == "hook"));
    }

    #[test]
    fn post_register_and_extras_dont_mix() {
        let error = AddonHook::new()
            .extras(("one", "two"))
            .post_register()
            .declare("hook", HookFn::post_register(|_, _| Ok(())))
            .unwrap_err();
        assert!(matches!(error, ProgrammerError::ExtrasWithPostRegister));

        let hook = AddonHook::new()
            .extras(Vec::<Value>::new())
            .post_register()
            .declare("hook", HookFn::post_register(|_, _| Ok(())))
            .unwrap();
        assert!(hook.is_post_register());
        assert!(hook.extras().is_empty());
    }

    #[test]
    fn declared_kind_must_match() {
        let error = AddonHook::new()
            .post_register()
            .declare("hook", nothing())
            .unwrap_err();
        assert!(matches!(
            error,
            ProgrammerError::HookMismatch {
                declared: "post_register",
                given: "ordinary",
                ..
            }
        ));

        let error = AddonHook::new()
            .declare("hook", HookFn::post_register(|_, _| Ok(())))
            .unwrap_err();
        assert!(matches!(
            error,
            ProgrammerError::HookMismatch {
                declared: "ordinary",
                given: "post_register",
                ..
            }
        ));
    }
}
