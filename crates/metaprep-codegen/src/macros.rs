//! Macro definitions and macro overloading.
//!
//! An overloaded macro is a family of variants selected by the values of
//! some of its parameters. `PICK(N, X)` overloaded on `N` with the values
//! `1` and `2` generates:
//!
//! ```c
//! #define __MACRO_OVERLOAD__PICK__1(X) A
//! #define __MACRO_OVERLOAD__PICK__2(X) B
//! #define PICK(N, X) __MACRO_OVERLOAD__PICK__##N(X)
//! ```
//!
//! The variants are emitted where `define` is called; the dispatcher is
//! emitted once, when the owning directive finishes.

use metaprep_types::text::{dedent, DedentOptions};

use crate::emitter::Emitter;
use crate::error::{CodegenError, CodegenResult};
use crate::scope::Scope;

/// Prefix of every overload variant's name.
pub const OVERLOAD_PREFIX: &str = "__MACRO_OVERLOAD__";

/// A `#define` to emit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroDef {
    pub name: String,
    pub params: Option<Vec<String>>,
    pub expansion: String,
    pub do_while: bool,
    /// Overload keys and the values this definition is selected by.
    pub overload: Vec<(String, String)>,
}

impl MacroDef {
    pub fn new(name: impl Into<String>, expansion: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expansion: expansion.into(),
            ..Default::default()
        }
    }

    pub fn params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = Some(params.into_iter().map(Into::into).collect());
        self
    }

    pub fn do_while(mut self, do_while: bool) -> Self {
        self.do_while = do_while;
        self
    }

    pub fn overload(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overload.push((key.into(), value.into()));
        self
    }
}

/// Every variant of an overloaded macro shares its parameters and keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverloadGroup {
    pub params: Vec<String>,
    pub keys: Vec<String>,
}

impl OverloadGroup {
    /// Parameters that are passed through to the variant.
    pub fn rest(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter(|p| !self.keys.contains(p))
            .map(String::as_str)
            .collect()
    }
}

/// `__MACRO_OVERLOAD__name__v1__v2`
pub fn variant_name<S: AsRef<str>>(name: &str, values: &[S]) -> String {
    let values: Vec<&str> = values.iter().map(AsRef::as_ref).collect();
    format!("{OVERLOAD_PREFIX}{name}__{}", values.join("__"))
}

/// `#define name(params) __MACRO_OVERLOAD__name__##k1##__##k2[(rest)]`
pub fn dispatcher(name: &str, group: &OverloadGroup) -> String {
    let pasted = group.keys.join("##__##");
    let rest = group.rest();
    let call = if rest.is_empty() {
        String::new()
    } else {
        format!("({})", rest.join(", "))
    };
    format!(
        "#define {name}({}) {OVERLOAD_PREFIX}{name}__##{pasted}{call}",
        group.params.join(", ")
    )
}

fn is_paste_fragment(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Emitter {
    /// Emit a macro definition, or one variant of an overloaded macro.
    pub fn define(&mut self, def: &MacroDef) -> CodegenResult<()> {
        if def.overload.is_empty() {
            self.define_plain(&def.name, def.params.as_deref(), &def.expansion, def.do_while);
            return Ok(());
        }

        let params = def
            .params
            .clone()
            .ok_or_else(|| CodegenError::OverloadWithoutParams(def.name.clone()))?;
        for (key, value) in &def.overload {
            if !params.contains(key) {
                return Err(CodegenError::OverloadKeyNotParam {
                    name: def.name.clone(),
                    key: key.clone(),
                    params: params.join(", "),
                });
            }
            if !is_paste_fragment(value) {
                return Err(CodegenError::InvalidOverloadValue {
                    name: def.name.clone(),
                    value: value.clone(),
                });
            }
        }

        let group = OverloadGroup {
            params,
            keys: def.overload.iter().map(|(k, _)| k.clone()).collect(),
        };
        self.register_overload(&def.name, group.clone())?;

        let values: Vec<&str> = def.overload.iter().map(|(_, v)| v.as_str()).collect();
        let rest: Vec<String> = group.rest().into_iter().map(str::to_string).collect();
        let rest = (!rest.is_empty()).then_some(rest);
        self.define_plain(
            &variant_name(&def.name, &values),
            rest.as_deref(),
            &def.expansion,
            def.do_while,
        );
        Ok(())
    }

    fn register_overload(&mut self, name: &str, group: OverloadGroup) -> CodegenResult<()> {
        if let Some(owner) = self.owners.get(name) {
            if owner != self.owner() {
                return Err(CodegenError::OverloadOwned {
                    name: name.to_string(),
                    owner: owner.clone(),
                });
            }
        }
        match self.overloads.get(name) {
            Some(existing) if *existing != group => {
                Err(CodegenError::OverloadMismatch(name.to_string()))
            }
            Some(_) => Ok(()),
            None => {
                let owner = self.owner().to_string();
                self.owners.insert(name.to_string(), owner);
                self.overloads.insert(name.to_string(), group);
                Ok(())
            }
        }
    }

    fn define_plain(&mut self, name: &str, params: Option<&[String]>, expansion: &str, do_while: bool) {
        let signature = match params {
            Some(params) => format!("{name}({})", params.join(", ")),
            None => name.to_string(),
        };
        let expansion = dedent(
            expansion,
            DedentOptions {
                skip_leading_blank: true,
                ..Default::default()
            },
        );

        if expansion.contains('\n') {
            let open = self.enter(Scope::new(format!("#define {signature}")));
            if do_while {
                let inner = self.enter(Scope::new("do").opening("{").closing("}\nwhile (false)"));
                self.line(&expansion);
                self.exit(inner);
            } else {
                self.line(&expansion);
            }
            self.exit(open);
        } else if do_while {
            self.line(&format!("#define {signature} do {{ {expansion} }} while (false)"));
        } else {
            self.line(&format!("#define {signature} {expansion}"));
        }
    }

    /// Emit the dispatcher of every overload group registered by this directive.
    pub(crate) fn emit_dispatchers(&mut self) {
        let dispatchers: Vec<String> = self
            .overloads
            .iter()
            .map(|(name, group)| dispatcher(name, group))
            .collect();
        for line in dispatchers {
            self.line(&line);
        }
    }
}
