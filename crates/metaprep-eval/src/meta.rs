//! The `Meta` handle: script bindings of the code-generation toolkit.
//!
//! Each method converts script values into toolkit definitions and runs the
//! matching [`Emitter`] primitive. Callbacks (scope bodies, enum
//! collectors, chain conditions) are script functions, so the evaluator is
//! the [`EmitContext`] handed to the toolkit's closure helpers.

use metaprep_codegen::{
    chain, with_scope, with_section, ChainStyle, CountStyle, EmitContext, Emitter, EnumDef,
    EnumMember, Lut, LutMember, LutRow, MacroDef, Scope,
};

use crate::builtins::{expect_list, expect_str, Args};
use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;
use crate::value::Value;

/// Methods available on `Meta`.
pub const META_METHODS: &[&str] = &["line", "blank", "enter", "enums", "define", "lut", "ifs", "section"];

fn optional_str(value: Option<Value>, what: &str) -> EvalResult<Option<String>> {
    match value {
        None | Some(Value::Nil) => Ok(None),
        Some(value) => expect_str(&value, what).map(Some),
    }
}

fn string_list(value: &Value, what: &str) -> EvalResult<Vec<String>> {
    match value {
        Value::Str(s) => Ok(s
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()),
        Value::List(items) => items.borrow().iter().map(|p| expect_str(p, what)).collect(),
        other => Err(EvalError::type_error(format!(
            "{what} must be a string or a list, not {}",
            other.type_name()
        ))),
    }
}

impl EmitContext for Evaluator<'_> {
    fn emitter(&mut self) -> &mut Emitter {
        &mut *self.emitter
    }
}

impl Evaluator<'_> {
    pub(crate) fn call_meta(&mut self, method: &str, mut args: Args) -> EvalResult<Value> {
        let label = format!("Meta.{method}");
        self.native(&label, |ev| {
            match method {
                "line" => ev.meta_line(&mut args)?,
                "blank" => ev.emitter.blank(),
                "enter" => ev.meta_enter(&mut args)?,
                "enums" => ev.meta_enums(&mut args)?,
                "define" => ev.meta_define(&mut args)?,
                "lut" => ev.meta_lut(&mut args)?,
                "ifs" => ev.meta_ifs(&mut args)?,
                "section" => ev.meta_section(&mut args)?,
                other => {
                    let mut message = format!("Meta has no method '{other}'");
                    let close = metaprep_types::text::did_you_mean(other, META_METHODS.iter().copied());
                    if let Some(best) = close.first() {
                        message.push_str(&format!("; did you mean '{best}'?"));
                    }
                    return Err(EvalError::attribute(message));
                }
            }
            args.finish()?;
            Ok(Value::Nil)
        })
    }

    /// `Meta.line(text, ...)`: strings are emitted as fragments, lists one
    /// element per fragment. With no argument, one blank line.
    fn meta_line(&mut self, args: &mut Args) -> EvalResult<()> {
        let fragments = args.rest();
        if fragments.is_empty() {
            self.emitter.blank();
        }
        for fragment in fragments {
            match fragment {
                Value::List(items) => {
                    let items = items.borrow().clone();
                    for item in items {
                        self.emitter.line(&item.to_string());
                    }
                }
                other => self.emitter.line(&other.to_string()),
            }
        }
        Ok(())
    }

    /// `Meta.enter(header, body, opening:, closing:, indented:)`
    fn meta_enter(&mut self, args: &mut Args) -> EvalResult<()> {
        let header = optional_str(args.take("header"), "Meta.enter() header")?;
        let body = args.required("body")?;
        let mut scope = match header {
            Some(header) => Scope::new(header),
            None => Scope::anonymous(),
        };
        if let Some(opening) = optional_str(args.take_named("opening"), "opening")? {
            scope = scope.opening(opening);
        }
        if let Some(closing) = optional_str(args.take_named("closing"), "closing")? {
            scope = scope.closing(closing);
        }
        if let Some(indented) = args.take_named("indented") {
            scope = scope.indented(indented.is_truthy());
        }

        with_scope(self, scope, |ev| ev.call_with(&body, Vec::new())).map(drop)
    }

    /// `Meta.enums(name, type, members, count:)`
    ///
    /// `members` is a list of names and `[name, value]` pairs, or a function
    /// that receives an empty list and fills it.
    fn meta_enums(&mut self, args: &mut Args) -> EvalResult<()> {
        let name = expect_str(&args.required("name")?, "enumeration name")?;
        let underlying = optional_str(args.take("type"), "enumeration type")?;
        let members = match args.required("members")? {
            collector @ (Value::Function(_) | Value::Builtin(_)) => {
                let list = Value::list(Vec::new());
                self.call_with(&collector, vec![list.clone()])?;
                list
            }
            list => list,
        };
        let count = match args.take("count") {
            None => CountStyle::default(),
            Some(Value::Nil | Value::Bool(false)) => CountStyle::None,
            Some(Value::Bool(true)) => CountStyle::default(),
            Some(style) => expect_str(&style, "count style")?.parse()?,
        };

        let members = expect_list(&members, "enumeration members")?
            .borrow()
            .iter()
            .map(enum_member)
            .collect::<EvalResult<Vec<_>>>()?;
        let def = EnumDef::new(name, underlying.as_deref())
            .collect(|all| all.extend(members))
            .count(count);
        self.emitter.enums(&def)?;
        Ok(())
    }

    /// `Meta.define(name, [params,] expansion, do_while:, overload:)`
    fn meta_define(&mut self, args: &mut Args) -> EvalResult<()> {
        let name = expect_str(&args.required("name")?, "macro name")?;
        let mut params = args.take_named("params");
        let mut expansion = args.take_named("expansion");
        let do_while = args.take_named("do_while").is_some_and(|v| v.is_truthy());
        let overload = args.take_named("overload");

        let mut positional = args.rest();
        if expansion.is_none() {
            expansion = positional.pop();
        }
        if params.is_none() && !positional.is_empty() {
            params = Some(positional.remove(0));
        }
        if !positional.is_empty() {
            return Err(EvalError::type_error(
                "Meta.define() takes a name, optional parameters and an expansion",
            ));
        }
        let expansion = match expansion {
            Some(Value::Str(text)) => text,
            Some(other) => other.c_repr()?,
            None => return Err(EvalError::type_error("Meta.define() missing argument 'expansion'")),
        };

        let mut def = MacroDef::new(name, expansion).do_while(do_while);
        match params {
            None | Some(Value::Nil) => {}
            Some(params) => def = def.params(string_list(&params, "macro parameter")?),
        }
        match overload {
            None | Some(Value::Nil) => {}
            Some(Value::Record(keys)) => {
                for (key, value) in keys.borrow().iter() {
                    def = def.overload(key.clone(), value.c_repr()?);
                }
            }
            Some(other) => {
                return Err(EvalError::type_error(format!(
                    "overload must be a record, not {}",
                    other.type_name()
                )))
            }
        }
        self.emitter.define(&def)?;
        Ok(())
    }

    /// `Meta.lut([type,] name, rows)`
    fn meta_lut(&mut self, args: &mut Args) -> EvalResult<()> {
        let mut ty = args.take_named("type");
        let mut positional = args.rest();
        if positional.len() == 3 {
            ty = Some(positional.remove(0));
        }
        let [name, rows]: [Value; 2] = positional.try_into().map_err(|_| {
            EvalError::type_error("Meta.lut() takes an optional type, a name and rows")
        })?;
        let name = expect_str(&name, "look-up table name")?;
        let ty = optional_str(ty, "look-up table type")?;

        let rows = expect_list(&rows, "look-up table rows")?
            .borrow()
            .iter()
            .map(|row| lut_row(&name, row))
            .collect::<EvalResult<Vec<_>>>()?;
        self.emitter.lut(&Lut { ty, name, rows })?;
        Ok(())
    }

    /// `Meta.ifs(items, style, condition, body, otherwise:)`
    fn meta_ifs(&mut self, args: &mut Args) -> EvalResult<()> {
        let items = expect_list(&args.required("items")?, "Meta.ifs() items")?
            .borrow()
            .clone();
        let style: ChainStyle = match args.take("style") {
            Some(style) => expect_str(&style, "chain style")?.parse()?,
            None => ChainStyle::ElseIf,
        };
        let condition = args.required("condition")?;
        let body = args.required("body")?;
        let otherwise = match args.take("otherwise") {
            None | Some(Value::Nil) => None,
            Some(otherwise) => Some(otherwise),
        };

        chain(
            self,
            &items,
            style,
            |ev, item| match ev.call_with(&condition, vec![item.clone()])? {
                Value::Str(text) => Ok(text),
                other => other.c_repr(),
            },
            |ev, item| ev.call_with(&body, vec![item.clone()]).map(drop),
            otherwise.map(|otherwise| {
                move |ev: &mut Self| ev.call_with(&otherwise, Vec::new()).map(drop)
            }),
        )
    }

    /// `Meta.section(text, body)`
    fn meta_section(&mut self, args: &mut Args) -> EvalResult<()> {
        let text = expect_str(&args.required("text")?, "section text")?;
        let body = args.required("body")?;
        with_section(self, text, |ev| ev.call_with(&body, Vec::new())).map(drop)
    }
}

fn enum_member(value: &Value) -> EvalResult<EnumMember> {
    match value {
        Value::Str(name) => Ok(EnumMember::new(name.as_str())),
        Value::List(pair) => match pair.borrow().as_slice() {
            [Value::Str(name), value] => Ok(EnumMember::valued(name.as_str(), value.c_repr()?)),
            _ => Err(EvalError::value("an enumeration member pair is [name, value]")),
        },
        other => Err(EvalError::type_error(format!(
            "an enumeration member must be a name or a [name, value] pair, not {}",
            other.type_name()
        ))),
    }
}

fn malformed(table: &str, reason: impl Into<String>) -> EvalError {
    metaprep_codegen::CodegenError::MalformedLut {
        table: table.to_string(),
        reason: reason.into(),
    }
    .into()
}

/// A row is a record of members, or a list holding an optional leading
/// index followed by members. A member is `[name, value]`,
/// `[type, name, value]` or a record of `name: value` pairs.
fn lut_row(table: &str, row: &Value) -> EvalResult<LutRow> {
    let cells = match row {
        Value::Record(_) => vec![row.clone()],
        Value::List(cells) => cells.borrow().clone(),
        other => {
            return Err(malformed(
                table,
                format!("an entry must be a list or a record, not {}", other.type_name()),
            ))
        }
    };

    let mut cells = cells.as_slice();
    let mut index = None;
    if let Some(first) = cells.first() {
        if !matches!(first, Value::List(_) | Value::Record(_)) {
            index = Some(first.c_repr()?);
            cells = &cells[1..];
        }
    }

    let mut members = Vec::new();
    for cell in cells {
        match cell {
            Value::Record(fields) => {
                for (name, value) in fields.borrow().iter() {
                    members.push(LutMember::new(name.clone(), value.c_repr()?));
                }
            }
            Value::List(parts) => match parts.borrow().as_slice() {
                [Value::Str(name), value] => members.push(LutMember::new(name.as_str(), value.c_repr()?)),
                [Value::Str(ty), Value::Str(name), value] => {
                    members.push(LutMember::typed(ty.as_str(), name.as_str(), value.c_repr()?))
                }
                _ => {
                    return Err(malformed(
                        table,
                        "a member is [name, value] or [type, name, value]",
                    ))
                }
            },
            other => {
                return Err(malformed(
                    table,
                    format!("unexpected {} among an entry's members", other.type_name()),
                ))
            }
        }
    }
    Ok(LutRow { index, members })
}
