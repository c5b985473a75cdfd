//! Conditional chains: one branch per item, in a chosen style.

use std::fmt;
use std::str::FromStr;

use crate::emitter::{with_scope, EmitContext, Emitter};
use crate::error::{CodegenError, CodegenResult};
use crate::scope::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStyle {
    /// Independent `if (c) { }` blocks.
    If,
    /// `if (c) { } else if (c) { } ...`
    ElseIf,
    /// Independent `#if c ... #endif` blocks.
    PreIf,
    /// `#if c ... #elif c ... #endif`
    PreElif,
}

impl FromStr for ChainStyle {
    type Err = CodegenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "if" => Ok(ChainStyle::If),
            "else if" => Ok(ChainStyle::ElseIf),
            "#if" => Ok(ChainStyle::PreIf),
            "#elif" => Ok(ChainStyle::PreElif),
            other => Err(CodegenError::UnknownChainStyle(other.to_string())),
        }
    }
}

impl fmt::Display for ChainStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChainStyle::If => "if",
            ChainStyle::ElseIf => "else if",
            ChainStyle::PreIf => "#if",
            ChainStyle::PreElif => "#elif",
        };
        write!(f, "{s}")
    }
}

impl ChainStyle {
    /// Whether consecutive branches form one chain that can end in an else.
    pub fn chains(self) -> bool {
        matches!(self, ChainStyle::ElseIf | ChainStyle::PreElif)
    }

    /// The scope opening branch `index` of `count`.
    ///
    /// In a `#elif` chain only the last scope closes with `#endif`, and not
    /// even that one when an else branch follows.
    pub fn entrance(self, index: usize, count: usize, condition: &str, has_otherwise: bool) -> Scope {
        match self {
            ChainStyle::If => Scope::new(format!("if ({condition})")),
            ChainStyle::ElseIf if index == 0 => Scope::new(format!("if ({condition})")),
            ChainStyle::ElseIf => Scope::new(format!("else if ({condition})")),
            ChainStyle::PreIf => Scope::new(format!("#if {condition}")),
            ChainStyle::PreElif => {
                let header = if index == 0 {
                    format!("#if {condition}")
                } else {
                    format!("#elif {condition}")
                };
                let closing = if index + 1 == count && !has_otherwise {
                    "#endif"
                } else {
                    ""
                };
                Scope::new(header).closing(closing)
            }
        }
    }

    /// The scope of the trailing else branch.
    pub fn otherwise(self) -> CodegenResult<Scope> {
        match self {
            ChainStyle::ElseIf => Ok(Scope::new("else")),
            ChainStyle::PreElif => Ok(Scope::new("#else")),
            other => Err(CodegenError::OtherwiseWithoutChain(other.to_string())),
        }
    }
}

/// Emit one branch per item through `cx`. `condition` yields each branch's
/// condition, `body` fills it. With no items, an `otherwise` body is emitted
/// bare.
pub fn chain<C, T, E>(
    cx: &mut C,
    items: &[T],
    style: ChainStyle,
    mut condition: impl FnMut(&mut C, &T) -> Result<String, E>,
    mut body: impl FnMut(&mut C, &T) -> Result<(), E>,
    otherwise: Option<impl FnOnce(&mut C) -> Result<(), E>>,
) -> Result<(), E>
where
    C: EmitContext + ?Sized,
    E: From<CodegenError>,
{
    let else_scope = match &otherwise {
        Some(_) => Some(style.otherwise()?),
        None => None,
    };
    for (index, item) in items.iter().enumerate() {
        let cond = condition(cx, item)?;
        let scope = style.entrance(index, items.len(), &cond, else_scope.is_some());
        with_scope(cx, scope, |cx| body(cx, item))?;
    }
    match (otherwise, else_scope) {
        (Some(otherwise), Some(_)) if items.is_empty() => otherwise(cx),
        (Some(otherwise), Some(scope)) => with_scope(cx, scope, otherwise),
        _ => Ok(()),
    }
}

impl Emitter {
    /// [`chain`] on the emitter itself.
    pub fn ifs<T, E>(
        &mut self,
        items: &[T],
        style: ChainStyle,
        condition: impl FnMut(&mut Self, &T) -> Result<String, E>,
        body: impl FnMut(&mut Self, &T) -> Result<(), E>,
        otherwise: Option<impl FnOnce(&mut Self) -> Result<(), E>>,
    ) -> Result<(), E>
    where
        E: From<CodegenError>,
    {
        chain(self, items, style, condition, body, otherwise)
    }
}
