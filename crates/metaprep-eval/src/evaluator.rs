//! Tree-walking evaluator for directive bodies.
//!
//! Evaluates a parsed unit against an [`Env`] whose outermost scope is the
//! directive namespace. Generation requests go to the run's [`Emitter`].
//!
//! Every script function call and every native call pushes a frame; when an
//! error leaves the innermost frame the whole stack is copied into the
//! error's trace, so diagnostics can walk from the failing line outward.

use std::rc::Rc;

use indexmap::IndexMap;
use metaprep_codegen::Emitter;
use metaprep_types::ast::*;
use metaprep_types::Span;

use crate::builtins::{self, compare, expect_int, resolve_index, Args, Builtin};
use crate::env::Env;
use crate::error::{EvalError, EvalResult, FrameSite, TraceFrame};
use crate::value::{Closure, Value};

/// Deepest chain of script calls before evaluation gives up. Kept low enough
/// to fire well inside a 2 MiB thread stack in unoptimized builds.
pub const MAX_CALL_DEPTH: usize = 64;

/// Largest string (in bytes) or list (in items) a repetition may build.
pub const MAX_REPEAT_LEN: usize = 1 << 24;

/// How a statement finished.
#[derive(Debug)]
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// The directive evaluator.
pub struct Evaluator<'e> {
    pub(crate) emitter: &'e mut Emitter,
    frames: Vec<TraceFrame>,
    /// Unit whose code is running; new closures remember it.
    unit: usize,
    /// Script calls in progress.
    calls: usize,
    /// Loops enclosing the current statement within the current call.
    loops: usize,
}

impl<'e> Evaluator<'e> {
    pub fn new(emitter: &'e mut Emitter) -> Self {
        Self {
            emitter,
            frames: Vec::new(),
            unit: 0,
            calls: 0,
            loops: 0,
        }
    }

    /// Run a whole unit against `env`.
    pub fn run(&mut self, program: &Program, unit: usize, env: &mut Env) -> EvalResult<()> {
        self.unit = unit;
        let frame = TraceFrame {
            site: FrameSite::Unit(unit),
            line: program.span.start_line,
            label: None,
        };
        self.with_frame(frame, |ev| {
            for stmt in &program.stmts {
                match ev.exec_stmt(stmt, env)? {
                    Flow::Normal => {}
                    Flow::Break | Flow::Continue => {
                        return Err(EvalError::other("loop control outside a loop"))
                    }
                    Flow::Return(_) => break,
                }
            }
            Ok(())
        })
    }

    // ── Frames ────────────────────────────────────────────────────────────────

    fn with_frame<T>(
        &mut self,
        frame: TraceFrame,
        body: impl FnOnce(&mut Self) -> EvalResult<T>,
    ) -> EvalResult<T> {
        self.frames.push(frame);
        let result = body(self);
        let result = result.map_err(|mut err| {
            if err.trace.is_empty() {
                err.trace = self.frames.iter().rev().cloned().collect();
            }
            err
        });
        self.frames.pop();
        result
    }

    /// Run native code under a frame labelled `label`.
    pub(crate) fn native<T>(
        &mut self,
        label: &str,
        body: impl FnOnce(&mut Self) -> EvalResult<T>,
    ) -> EvalResult<T> {
        let frame = TraceFrame {
            site: FrameSite::Native,
            line: 0,
            label: Some(label.to_string()),
        };
        self.with_frame(frame, body)
    }

    fn mark(&mut self, span: Span) {
        if let Some(frame) = self.frames.last_mut() {
            if frame.site != FrameSite::Native {
                frame.line = span.start_line;
            }
        }
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Statements
    // ══════════════════════════════════════════════════════════════════════════

    fn exec_stmt(&mut self, stmt: &Stmt, env: &mut Env) -> EvalResult<Flow> {
        self.mark(stmt.span());
        match stmt {
            Stmt::Let(s) => {
                let value = self.eval_expr(&s.value, env)?;
                env.define(&s.name.name, value);
            }
            Stmt::Set(s) => {
                let value = self.eval_expr(&s.value, env)?;
                self.mark(s.span);
                self.assign(&s.target, value, env)?;
            }
            Stmt::Function(decl) => {
                if let Some(name) = &decl.name {
                    let closure = self.closure(decl, env);
                    env.define(&name.name, closure);
                }
            }
            Stmt::If(s) => return self.exec_if(s, env),
            Stmt::For(s) => return self.exec_for(s, env),
            Stmt::While(s) => {
                self.loops += 1;
                let result = self.exec_while(s, env);
                self.loops -= 1;
                return result;
            }
            Stmt::Break(_) | Stmt::Continue(_) if self.loops == 0 => {
                let word = if matches!(stmt, Stmt::Break(_)) { "break" } else { "continue" };
                return Err(EvalError::other(format!("'{word}' outside a loop")));
            }
            Stmt::Break(_) => return Ok(Flow::Break),
            Stmt::Continue(_) => return Ok(Flow::Continue),
            Stmt::Return(s) => {
                let value = match &s.value {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => Value::Nil,
                };
                return Ok(Flow::Return(value));
            }
            Stmt::Assert(s) => {
                if !self.eval_expr(&s.condition, env)?.is_truthy() {
                    let message = match &s.message {
                        Some(expr) => self.eval_expr(expr, env)?.to_string(),
                        None => "assertion failed".to_string(),
                    };
                    self.mark(s.span);
                    return Err(EvalError::new(crate::ErrorKind::Assertion, message));
                }
            }
            Stmt::Global(s) => {
                for name in &s.names {
                    env.declare_global(&name.name);
                }
            }
            Stmt::Expr(s) => {
                self.eval_expr(&s.expr, env)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_block(&mut self, block: &Block, env: &mut Env) -> EvalResult<Flow> {
        env.push_scope();
        let result = self.exec_stmts(&block.stmts, env);
        env.pop_scope();
        result
    }

    fn exec_stmts(&mut self, stmts: &[Stmt], env: &mut Env) -> EvalResult<Flow> {
        for stmt in stmts {
            match self.exec_stmt(stmt, env)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_if(&mut self, s: &IfStmt, env: &mut Env) -> EvalResult<Flow> {
        if self.eval_expr(&s.condition, env)?.is_truthy() {
            return self.exec_block(&s.then_block, env);
        }
        match &s.else_branch {
            Some(ElseBranch::ElseIf(next)) => {
                self.mark(next.span);
                self.exec_if(next, env)
            }
            Some(ElseBranch::Block(block)) => self.exec_block(block, env),
            None => Ok(Flow::Normal),
        }
    }

    fn exec_for(&mut self, s: &ForStmt, env: &mut Env) -> EvalResult<Flow> {
        let items: Vec<Value> = match self.eval_expr(&s.iterable, env)? {
            Value::List(items) => items.borrow().clone(),
            Value::Str(text) => text.chars().map(|c| Value::Str(c.to_string())).collect(),
            Value::Record(fields) => fields.borrow().keys().map(|k| Value::str(k.as_str())).collect(),
            other => {
                return Err(EvalError::type_error(format!(
                    "cannot iterate over {}",
                    other.type_name()
                )))
            }
        };

        self.loops += 1;
        let mut outcome = Ok(Flow::Normal);
        for (i, item) in items.into_iter().enumerate() {
            env.push_scope();
            env.define(&s.item.name, item);
            if let Some(index) = &s.index {
                env.define(&index.name, Value::Int(i as i64));
            }
            let flow = self.exec_stmts(&s.body.stmts, env);
            env.pop_scope();
            match flow {
                Ok(Flow::Normal | Flow::Continue) => {}
                Ok(Flow::Break) => break,
                other => {
                    outcome = other;
                    break;
                }
            }
        }
        self.loops -= 1;
        outcome
    }

    fn exec_while(&mut self, s: &WhileStmt, env: &mut Env) -> EvalResult<Flow> {
        loop {
            self.mark(s.span);
            if !self.eval_expr(&s.condition, env)?.is_truthy() {
                return Ok(Flow::Normal);
            }
            match self.exec_block(&s.body, env)? {
                Flow::Normal | Flow::Continue => {}
                Flow::Break => return Ok(Flow::Normal),
                ret @ Flow::Return(_) => return Ok(ret),
            }
        }
    }

    fn assign(&mut self, target: &Expr, value: Value, env: &mut Env) -> EvalResult<()> {
        match &target.kind {
            ExprKind::Identifier(name) => {
                if env.set(name, value) {
                    Ok(())
                } else {
                    Err(EvalError::name(format!(
                        "name '{name}' is not defined; declare it with 'let' first"
                    )))
                }
            }
            ExprKind::Field { object, field } => match self.eval_expr(object, env)? {
                Value::Record(fields) => {
                    fields.borrow_mut().insert(field.name.clone(), value);
                    Ok(())
                }
                other => Err(EvalError::attribute(format!(
                    "cannot set field '{}' of {}",
                    field.name,
                    other.type_name()
                ))),
            },
            ExprKind::Index { object, index } => {
                let container = self.eval_expr(object, env)?;
                let key = self.eval_expr(index, env)?;
                match (&container, &key) {
                    (Value::List(items), Value::Int(i)) => {
                        let mut items = items.borrow_mut();
                        let at = resolve_index(*i, items.len())
                            .ok_or_else(|| EvalError::key(format!("list index {i} out of range")))?;
                        items[at] = value;
                        Ok(())
                    }
                    (Value::Record(fields), Value::Str(k)) => {
                        fields.borrow_mut().insert(k.clone(), value);
                        Ok(())
                    }
                    _ => Err(EvalError::type_error(format!(
                        "cannot assign into {} with a {} index",
                        container.type_name(),
                        key.type_name()
                    ))),
                }
            }
            ExprKind::Paren(inner) => self.assign(inner, value, env),
            _ => Err(EvalError::other("invalid assignment target")),
        }
    }

    // ══════════════════════════════════════════════════════════════════════════
    // Expressions
    // ══════════════════════════════════════════════════════════════════════════

    pub(crate) fn eval_expr(&mut self, expr: &Expr, env: &mut Env) -> EvalResult<Value> {
        self.mark(expr.span);
        match &expr.kind {
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Float(f) => Ok(Value::Float(*f)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Nil => Ok(Value::Nil),
            ExprKind::Interpolation(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        StringPart::Literal(text) => out.push_str(text),
                        StringPart::Expr(e) => out.push_str(&self.eval_expr(e, env)?.to_string()),
                    }
                }
                Ok(Value::Str(out))
            }
            ExprKind::List(items) => {
                let items = items
                    .iter()
                    .map(|item| self.eval_expr(item, env))
                    .collect::<EvalResult<Vec<_>>>()?;
                Ok(Value::list(items))
            }
            ExprKind::Record(fields) => {
                let mut record = IndexMap::new();
                for field in fields {
                    let value = self.eval_expr(&field.value, env)?;
                    record.insert(field.key.name.clone(), value);
                }
                Ok(Value::record(record))
            }
            ExprKind::Identifier(name) => lookup(name, env),
            ExprKind::Call { callee, args } => self.eval_call(expr, callee, args, env),
            ExprKind::Field { object, field } => {
                let object = self.eval_expr(object, env)?;
                self.mark(expr.span);
                get_field(&object, &field.name)
            }
            ExprKind::Index { object, index } => {
                let object = self.eval_expr(object, env)?;
                let index = self.eval_expr(index, env)?;
                self.mark(expr.span);
                get_index(&object, &index)
            }
            ExprKind::Binary { left, op, right } => self.eval_binary(expr, left, *op, right, env),
            ExprKind::Unary { op, operand } => {
                let value = self.eval_expr(operand, env)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOp::Neg => match value {
                        Value::Int(n) => n
                            .checked_neg()
                            .map(Value::Int)
                            .ok_or_else(|| EvalError::value("integer overflow")),
                        Value::Float(f) => Ok(Value::Float(-f)),
                        other => Err(EvalError::type_error(format!(
                            "cannot negate {}",
                            other.type_name()
                        ))),
                    },
                }
            }
            ExprKind::Lambda(decl) => Ok(self.closure(decl, env)),
            ExprKind::Paren(inner) => self.eval_expr(inner, env),
        }
    }

    fn closure(&self, decl: &Rc<FnDecl>, env: &Env) -> Value {
        Value::Function(Rc::new(Closure {
            decl: Rc::clone(decl),
            env: env.clone(),
            unit: self.unit,
        }))
    }

    fn eval_binary(
        &mut self,
        expr: &Expr,
        left: &Expr,
        op: BinOp,
        right: &Expr,
        env: &mut Env,
    ) -> EvalResult<Value> {
        let lhs = self.eval_expr(left, env)?;
        match op {
            BinOp::And if !lhs.is_truthy() => return Ok(lhs),
            BinOp::Or if lhs.is_truthy() => return Ok(lhs),
            BinOp::And | BinOp::Or => return self.eval_expr(right, env),
            _ => {}
        }
        let rhs = self.eval_expr(right, env)?;
        self.mark(expr.span);
        binary(op, &lhs, &rhs)
    }

    // ── Calls ─────────────────────────────────────────────────────────────────

    fn eval_call(
        &mut self,
        expr: &Expr,
        callee: &Expr,
        args: &[Arg],
        env: &mut Env,
    ) -> EvalResult<Value> {
        if let ExprKind::Field { object, field } = &callee.kind {
            let receiver = self.eval_expr(object, env)?;
            let args = self.eval_args(&field.name, args, env)?;
            self.mark(expr.span);
            return self.call_method(&receiver, &field.name, args);
        }
        let function = self.eval_expr(callee, env)?;
        let name = match &callee.kind {
            ExprKind::Identifier(name) => name.clone(),
            _ => function.to_string(),
        };
        let args = self.eval_args(&name, args, env)?;
        self.mark(expr.span);
        self.call_value(&function, args)
    }

    fn eval_args(&mut self, callee: &str, args: &[Arg], env: &mut Env) -> EvalResult<Args> {
        let mut positional = Vec::new();
        let mut named = IndexMap::new();
        for arg in args {
            let value = self.eval_expr(&arg.value, env)?;
            match &arg.name {
                Some(name) => {
                    named.insert(name.name.clone(), value);
                }
                None => positional.push(value),
            }
        }
        Ok(Args::new(callee, positional, named))
    }

    fn call_method(&mut self, receiver: &Value, method: &str, args: Args) -> EvalResult<Value> {
        match receiver {
            Value::Meta => self.call_meta(method, args),
            Value::Record(fields) => {
                let member = fields.borrow().get(method).cloned();
                match member {
                    Some(function) => self.call_value(&function, args),
                    None => builtins::call_method(receiver, method, args),
                }
            }
            _ => builtins::call_method(receiver, method, args),
        }
    }

    /// Call any callable value.
    pub fn call_value(&mut self, function: &Value, args: Args) -> EvalResult<Value> {
        match function {
            Value::Function(closure) => self.call_closure(closure, args),
            Value::Builtin(builtin) => {
                let builtin = *builtin;
                self.native(builtin.name(), |_| builtin.call(args))
            }
            other => Err(EvalError::type_error(format!(
                "{} is not callable",
                other.type_name()
            ))),
        }
    }

    /// Call `function` with positional arguments only.
    pub(crate) fn call_with(&mut self, function: &Value, positional: Vec<Value>) -> EvalResult<Value> {
        let name = function.to_string();
        self.call_value(function, Args::new(name, positional, IndexMap::new()))
    }

    fn call_closure(&mut self, closure: &Rc<Closure>, mut args: Args) -> EvalResult<Value> {
        if self.calls >= MAX_CALL_DEPTH {
            return Err(EvalError::other(format!(
                "maximum call depth of {MAX_CALL_DEPTH} exceeded"
            )));
        }
        let decl = &closure.decl;
        let mut env = closure.env.clone();
        env.push_scope();
        for param in &decl.params {
            let value = args.take(&param.name).ok_or_else(|| {
                EvalError::type_error(format!(
                    "{}() missing argument '{}'",
                    closure.label(),
                    param.name
                ))
            })?;
            env.define(&param.name, value);
        }
        args.finish()?;

        let frame = TraceFrame {
            site: FrameSite::Unit(closure.unit),
            line: decl.span.start_line,
            label: Some(closure.label()),
        };
        let saved_unit = std::mem::replace(&mut self.unit, closure.unit);
        let saved_loops = std::mem::replace(&mut self.loops, 0);
        self.calls += 1;
        let result = self.with_frame(frame, |ev| ev.exec_body(&decl.body.stmts, &mut env));
        self.calls -= 1;
        self.loops = saved_loops;
        self.unit = saved_unit;
        result
    }

    /// A body's value is its `return`, or its trailing expression statement.
    fn exec_body(&mut self, stmts: &[Stmt], env: &mut Env) -> EvalResult<Value> {
        let (last, init) = match stmts.split_last() {
            Some((Stmt::Expr(last), init)) => (Some(last), init),
            _ => (None, stmts),
        };
        if let Flow::Return(value) = self.exec_stmts(init, env)? {
            return Ok(value);
        }
        match last {
            Some(last) => {
                self.mark(last.span);
                self.eval_expr(&last.expr, env)
            }
            None => Ok(Value::Nil),
        }
    }
}

// ── Pure helpers ─────────────────────────────────────────────────────────────

fn lookup(name: &str, env: &Env) -> EvalResult<Value> {
    if let Some(value) = env.get(name) {
        return Ok(value);
    }
    if name == "Meta" {
        return Ok(Value::Meta);
    }
    Builtin::from_name(name)
        .map(Value::Builtin)
        .ok_or_else(|| EvalError::name(format!("name '{name}' is not defined")))
}

fn get_field(object: &Value, field: &str) -> EvalResult<Value> {
    match object {
        Value::Record(fields) => fields
            .borrow()
            .get(field)
            .cloned()
            .ok_or_else(|| EvalError::attribute(format!("record has no field '{field}'"))),
        Value::Meta => Err(EvalError::attribute(format!(
            "'Meta.{field}' is not a value; call it as a method"
        ))),
        other => Err(EvalError::attribute(format!(
            "{} has no field '{field}'",
            other.type_name()
        ))),
    }
}

fn get_index(object: &Value, index: &Value) -> EvalResult<Value> {
    match (object, index) {
        (Value::List(items), Value::Int(i)) => {
            let items = items.borrow();
            resolve_index(*i, items.len())
                .map(|at| items[at].clone())
                .ok_or_else(|| EvalError::key(format!("list index {i} out of range")))
        }
        (Value::Str(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            resolve_index(*i, chars.len())
                .map(|at| Value::Str(chars[at].to_string()))
                .ok_or_else(|| EvalError::key(format!("string index {i} out of range")))
        }
        (Value::Record(fields), Value::Str(key)) => fields
            .borrow()
            .get(key)
            .cloned()
            .ok_or_else(|| EvalError::key(format!("no key '{key}' in record"))),
        _ => Err(EvalError::type_error(format!(
            "cannot index {} with {}",
            object.type_name(),
            index.type_name()
        ))),
    }
}

fn overflow(op: BinOp) -> EvalError {
    EvalError::value(format!("integer overflow in '{}'", op.as_str()))
}

/// Repetition count for an operand of `len` units; the result stays within
/// [`MAX_REPEAT_LEN`].
fn repeat(count: &Value, len: usize, op: BinOp) -> EvalResult<usize> {
    let n = expect_int(count, &format!("right operand of '{}'", op.as_str()))?;
    let n = usize::try_from(n.max(0)).map_err(|_| EvalError::value("repetition too large"))?;
    match len.checked_mul(n) {
        Some(total) if total <= MAX_REPEAT_LEN => Ok(n),
        _ => Err(EvalError::value("repetition too large")),
    }
}

fn binary(op: BinOp, lhs: &Value, rhs: &Value) -> EvalResult<Value> {
    use Value::{Float, Int, Str};

    let unsupported = || {
        EvalError::type_error(format!(
            "unsupported operands for '{}': {} and {}",
            op.as_str(),
            lhs.type_name(),
            rhs.type_name()
        ))
    };

    match op {
        BinOp::Eq => return Ok(Value::Bool(lhs == rhs)),
        BinOp::NotEq => return Ok(Value::Bool(lhs != rhs)),
        BinOp::Less => return Ok(Value::Bool(compare(lhs, rhs)?.is_lt())),
        BinOp::Greater => return Ok(Value::Bool(compare(lhs, rhs)?.is_gt())),
        BinOp::LessEq => return Ok(Value::Bool(compare(lhs, rhs)?.is_le())),
        BinOp::GreaterEq => return Ok(Value::Bool(compare(lhs, rhs)?.is_ge())),
        _ => {}
    }

    match (op, lhs, rhs) {
        (BinOp::Add, Str(a), Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (BinOp::Mul, Str(s), count @ Int(_)) => Ok(Value::Str(s.repeat(repeat(count, s.len(), op)?))),
        (BinOp::Mul, Value::List(items), count @ Int(_)) => {
            let items = items.borrow();
            let n = repeat(count, items.len(), op)?;
            let repeated = (0..n).flat_map(|_| items.iter().cloned()).collect();
            Ok(Value::list(repeated))
        }
        (_, Int(a), Int(b)) => {
            let (a, b) = (*a, *b);
            let result = match op {
                BinOp::Add => a.checked_add(b),
                BinOp::Sub => a.checked_sub(b),
                BinOp::Mul => a.checked_mul(b),
                BinOp::Div | BinOp::Mod if b == 0 => {
                    return Err(EvalError::value("division by zero"))
                }
                BinOp::Div => a.checked_div(b),
                BinOp::Mod => a.checked_rem_euclid(b),
                _ => return Err(unsupported()),
            };
            result.map(Int).ok_or_else(|| overflow(op))
        }
        (_, Int(_) | Float(_), Int(_) | Float(_)) => {
            let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
                return Err(unsupported());
            };
            match op {
                BinOp::Add => Ok(Float(a + b)),
                BinOp::Sub => Ok(Float(a - b)),
                BinOp::Mul => Ok(Float(a * b)),
                BinOp::Div | BinOp::Mod if b == 0.0 => Err(EvalError::value("division by zero")),
                BinOp::Div => Ok(Float(a / b)),
                BinOp::Mod => Ok(Float(a.rem_euclid(b))),
                _ => Err(unsupported()),
            }
        }
        _ => Err(unsupported()),
    }
}
