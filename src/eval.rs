//! Expression evaluator for interpolation markers.
//!
//! Expressions are parsed with the oxc JavaScript parser and evaluated
//! directly over the AST against a [`Scope`]. Only the read-only subset that
//! makes sense inside markup is supported: member paths, literals, array
//! literals, arithmetic, comparisons, logical and conditional operators, and
//! calls to a fixed set of string, array and number methods or to callable
//! scope members.

use oxc_allocator::Allocator;
use oxc_ast::ast::{CallExpression, Expression};
use oxc_parser::Parser;
use oxc_span::SourceType;
use oxc_syntax::operator::{BinaryOperator, LogicalOperator, UnaryOperator};
use std::cell::Cell;
use std::cmp::Ordering;

use crate::error::EvalWarning;
use crate::scope::Scope;
use crate::value::{format_number, Value};

/// Deepest bracket, unary or AST nesting an expression may reach.
pub const MAX_NESTING: usize = 128;

/// Largest string `repeat` may build, in bytes.
const MAX_REPEAT_BYTES: usize = 1 << 20;

/// Evaluates `expression` and stringifies the result.
///
/// The result is not HTML-escaped; that is the interpolation layer's job.
pub fn evaluate(expression: &str, scope: &Scope) -> Result<String, EvalWarning> {
    if expression.trim().is_empty() {
        return Ok(String::new());
    }
    evaluate_value(expression, scope).map(|value| value.render())
}

/// Evaluates `expression` to a runtime [`Value`].
pub fn evaluate_value(expression: &str, scope: &Scope) -> Result<Value, EvalWarning> {
    let source = expression.trim();
    if nesting_depth(source) > MAX_NESTING {
        return Err(EvalWarning::TooDeep(MAX_NESTING));
    }
    let allocator = Allocator::default();
    let source_type = SourceType::default();

    let expr = Parser::new(&allocator, source, source_type)
        .parse_expression()
        .map_err(|errors| {
            EvalWarning::Syntax(
                errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;

    Evaluator {
        scope,
        depth: Cell::new(0),
    }
    .eval(&expr)
}

/// Upper bound on how deeply the parser will recurse for `source`: open
/// brackets plus runs of prefix operators, ignoring string literal contents.
fn nesting_depth(source: &str) -> usize {
    let mut depth = 0usize;
    let mut prefix_run = 0usize;
    let mut deepest = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in source.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            '!' | '~' | '-' | '+' => prefix_run += 1,
            c if c.is_whitespace() => continue,
            _ => {}
        }
        if !matches!(c, '!' | '~' | '-' | '+') {
            prefix_run = 0;
        }
        deepest = deepest.max(depth + prefix_run);
    }
    deepest
}

struct Evaluator<'s> {
    scope: &'s Scope,
    depth: Cell<usize>,
}

impl Evaluator<'_> {
    fn eval(&self, expr: &Expression) -> Result<Value, EvalWarning> {
        let depth = self.depth.get() + 1;
        if depth > MAX_NESTING {
            return Err(EvalWarning::TooDeep(MAX_NESTING));
        }
        self.depth.set(depth);
        let result = self.eval_node(expr);
        self.depth.set(depth - 1);
        result
    }

    fn eval_node(&self, expr: &Expression) -> Result<Value, EvalWarning> {
        match expr {
            Expression::BooleanLiteral(lit) => Ok(Value::Bool(lit.value)),
            Expression::NullLiteral(_) => Ok(Value::Null),
            Expression::NumericLiteral(lit) => Ok(Value::Number(lit.value)),
            Expression::StringLiteral(lit) => Ok(Value::String(lit.value.to_string())),
            Expression::TemplateLiteral(tpl) => {
                let mut out = String::new();
                for (i, quasi) in tpl.quasis.iter().enumerate() {
                    let text = quasi
                        .value
                        .cooked
                        .as_ref()
                        .map_or(quasi.value.raw.as_str(), |cooked| cooked.as_str());
                    out.push_str(text);
                    if let Some(inner) = tpl.expressions.get(i) {
                        out.push_str(&self.eval(inner)?.render());
                    }
                }
                Ok(Value::String(out))
            }
            Expression::Identifier(ident) => self.identifier(ident.name.as_str()),
            Expression::StaticMemberExpression(member) => {
                let object = self.eval(&member.object)?;
                let property = member.property.name.as_str();
                object
                    .get(property)
                    .ok_or_else(|| EvalWarning::Unresolved(member_path(expr, property)))
            }
            Expression::ComputedMemberExpression(member) => {
                let object = self.eval(&member.object)?;
                let key = match self.eval(&member.expression)? {
                    Value::Number(n) => format_number(n),
                    other => other.render(),
                };
                object
                    .get(&key)
                    .ok_or_else(|| EvalWarning::Unresolved(member_path(expr, &key)))
            }
            Expression::CallExpression(call) => self.call(call),
            Expression::ArrayExpression(array) => {
                let mut items = Vec::with_capacity(array.elements.len());
                for element in &array.elements {
                    match element.as_expression() {
                        Some(e) => items.push(self.eval(e)?),
                        None => return Err(EvalWarning::Unsupported("spread or hole in array")),
                    }
                }
                Ok(Value::Array(items))
            }
            Expression::BinaryExpression(bin) => {
                let left = self.eval(&bin.left)?;
                let right = self.eval(&bin.right)?;
                binary(bin.operator, left, right)
            }
            Expression::LogicalExpression(logical) => {
                let left = self.eval(&logical.left)?;
                match logical.operator {
                    LogicalOperator::And if !left.is_truthy() => Ok(left),
                    LogicalOperator::Or if left.is_truthy() => Ok(left),
                    LogicalOperator::Coalesce if !left.is_nullish() => Ok(left),
                    _ => self.eval(&logical.right),
                }
            }
            Expression::UnaryExpression(unary) => {
                let value = self.eval(&unary.argument)?;
                match unary.operator {
                    UnaryOperator::UnaryNegation => Ok(Value::Number(-value.to_number())),
                    UnaryOperator::UnaryPlus => Ok(Value::Number(value.to_number())),
                    UnaryOperator::LogicalNot => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOperator::Typeof => Ok(Value::from(match value {
                        Value::Null | Value::Array(_) | Value::Object(_) => "object",
                        other => other.type_name(),
                    })),
                    _ => Err(EvalWarning::Unsupported("unary operator")),
                }
            }
            Expression::ConditionalExpression(cond) => {
                if self.eval(&cond.test)?.is_truthy() {
                    self.eval(&cond.consequent)
                } else {
                    self.eval(&cond.alternate)
                }
            }
            Expression::ParenthesizedExpression(paren) => self.eval(&paren.expression),
            _ => Err(EvalWarning::Unsupported("expression kind")),
        }
    }

    fn identifier(&self, name: &str) -> Result<Value, EvalWarning> {
        if let Some(value) = self.scope.get(name) {
            return Ok(Value::from(value));
        }
        match name {
            "undefined" => Ok(Value::Undefined),
            "NaN" => Ok(Value::Number(f64::NAN)),
            "Infinity" => Ok(Value::Number(f64::INFINITY)),
            _ => Err(EvalWarning::Unresolved(name.to_string())),
        }
    }

    fn call(&self, call: &CallExpression) -> Result<Value, EvalWarning> {
        let mut args = Vec::with_capacity(call.arguments.len());
        for arg in &call.arguments {
            match arg.as_expression() {
                Some(e) => args.push(self.eval(e)?),
                None => return Err(EvalWarning::Unsupported("spread argument")),
            }
        }

        if let Some(path) = dotted_path(&call.callee) {
            if let Some(function) = self.scope.function(&path) {
                return Ok(function(&args));
            }
        }

        match &call.callee {
            Expression::StaticMemberExpression(member) => {
                let receiver = self.eval(&member.object)?;
                call_method(&receiver, member.property.name.as_str(), &args)
            }
            other => Err(EvalWarning::NotCallable(
                dotted_path(other).unwrap_or_else(|| "expression".to_string()),
            )),
        }
    }
}

/// `a.b.c` for identifier/static-member chains.
fn dotted_path(expr: &Expression) -> Option<String> {
    match expr {
        Expression::Identifier(ident) => Some(ident.name.to_string()),
        Expression::StaticMemberExpression(member) => {
            dotted_path(&member.object).map(|base| format!("{}.{}", base, member.property.name))
        }
        _ => None,
    }
}

fn member_path(expr: &Expression, fallback: &str) -> String {
    dotted_path(expr).unwrap_or_else(|| fallback.to_string())
}

fn binary(op: BinaryOperator, left: Value, right: Value) -> Result<Value, EvalWarning> {
    let ordered = |accept: fn(Ordering) -> bool| {
        Value::Bool(left.compare(&right).map_or(false, accept))
    };

    Ok(match op {
        BinaryOperator::Addition => match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            _ => Value::String(left.render() + &right.render()),
        },
        BinaryOperator::Subtraction => Value::Number(left.to_number() - right.to_number()),
        BinaryOperator::Multiplication => Value::Number(left.to_number() * right.to_number()),
        BinaryOperator::Division => Value::Number(left.to_number() / right.to_number()),
        BinaryOperator::Remainder => Value::Number(left.to_number() % right.to_number()),
        BinaryOperator::Exponential => Value::Number(left.to_number().powf(right.to_number())),
        BinaryOperator::LessThan => ordered(|o| o == Ordering::Less),
        BinaryOperator::LessEqualThan => ordered(|o| o != Ordering::Greater),
        BinaryOperator::GreaterThan => ordered(|o| o == Ordering::Greater),
        BinaryOperator::GreaterEqualThan => ordered(|o| o != Ordering::Less),
        BinaryOperator::Equality => Value::Bool(left.loose_equals(&right)),
        BinaryOperator::Inequality => Value::Bool(!left.loose_equals(&right)),
        BinaryOperator::StrictEquality => Value::Bool(left == right),
        BinaryOperator::StrictInequality => Value::Bool(left != right),
        _ => return Err(EvalWarning::Unsupported("binary operator")),
    })
}

fn call_method(receiver: &Value, method: &str, args: &[Value]) -> Result<Value, EvalWarning> {
    let unknown = || EvalWarning::UnknownMethod {
        method: method.to_string(),
        receiver: receiver.type_name(),
    };
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Undefined);

    match receiver {
        Value::String(s) if method == "repeat" => repeat(s, &arg(0)),
        Value::String(s) => string_method(s, method, args).ok_or_else(unknown),
        Value::Array(items) => match method {
            "join" => {
                let separator = match arg(0) {
                    Value::Undefined => ",".to_string(),
                    other => other.render(),
                };
                Ok(Value::String(
                    items
                        .iter()
                        .map(|item| {
                            if item.is_nullish() {
                                String::new()
                            } else {
                                item.render()
                            }
                        })
                        .collect::<Vec<_>>()
                        .join(&separator),
                ))
            }
            "indexOf" => {
                let needle = arg(0);
                Ok(Value::Number(
                    items
                        .iter()
                        .position(|item| *item == needle)
                        .map_or(-1.0, |i| i as f64),
                ))
            }
            "includes" => {
                let needle = arg(0);
                Ok(Value::Bool(items.contains(&needle)))
            }
            "concat" => {
                let mut out = items.clone();
                for value in args {
                    match value {
                        Value::Array(more) => out.extend(more.iter().cloned()),
                        other => out.push(other.clone()),
                    }
                }
                Ok(Value::Array(out))
            }
            "slice" => {
                let (start, end) = slice_bounds(items.len(), &arg(0), &arg(1));
                Ok(Value::Array(items[start..end].to_vec()))
            }
            "reverse" => Ok(Value::Array(items.iter().rev().cloned().collect())),
            "toString" => Ok(Value::String(receiver.render())),
            _ => Err(unknown()),
        },
        Value::Number(n) => match method {
            "toFixed" if !n.is_finite() => Ok(Value::String(format_number(*n))),
            "toFixed" => {
                let digits = arg(0).to_number();
                let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 100.0) as usize };
                Ok(Value::String(format!("{:.*}", digits, n)))
            }
            "toString" => Ok(Value::String(format_number(*n))),
            _ => Err(unknown()),
        },
        Value::Bool(_) if method == "toString" => Ok(Value::String(receiver.render())),
        _ => Err(unknown()),
    }
}

fn string_method(s: &str, method: &str, args: &[Value]) -> Option<Value> {
    let arg = |i: usize| args.get(i).cloned().unwrap_or(Value::Undefined);
    let text_arg = |i: usize| match arg(i) {
        Value::Undefined => "undefined".to_string(),
        other => other.render(),
    };
    let chars: Vec<char> = s.chars().collect();

    let value = match method {
        "toUpperCase" => Value::String(s.to_uppercase()),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "trim" => Value::String(s.trim().to_string()),
        "toString" => Value::String(s.to_string()),
        "indexOf" => Value::Number(
            s.find(text_arg(0).as_str())
                .map_or(-1.0, |byte| s[..byte].chars().count() as f64),
        ),
        "lastIndexOf" => Value::Number(
            s.rfind(text_arg(0).as_str())
                .map_or(-1.0, |byte| s[..byte].chars().count() as f64),
        ),
        "includes" => Value::Bool(s.contains(text_arg(0).as_str())),
        "startsWith" => Value::Bool(s.starts_with(text_arg(0).as_str())),
        "endsWith" => Value::Bool(s.ends_with(text_arg(0).as_str())),
        "charAt" => {
            let index = arg(0).to_number();
            let index = if index.is_nan() { 0.0 } else { index };
            Value::String(
                (index >= 0.0)
                    .then(|| chars.get(index as usize))
                    .flatten()
                    .map(|c| c.to_string())
                    .unwrap_or_default(),
            )
        }
        "slice" => {
            let (start, end) = slice_bounds(chars.len(), &arg(0), &arg(1));
            Value::String(chars[start..end].iter().collect())
        }
        "substring" => {
            let clamp = |v: Value, default: usize| match v {
                Value::Undefined => default,
                other => {
                    let n = other.to_number();
                    if n.is_nan() {
                        0
                    } else {
                        n.clamp(0.0, chars.len() as f64) as usize
                    }
                }
            };
            let a = clamp(arg(0), 0);
            let b = clamp(arg(1), chars.len());
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            Value::String(chars[start..end].iter().collect())
        }
        "split" => match arg(0) {
            Value::Undefined => Value::Array(vec![Value::from(s)]),
            separator => {
                let separator = separator.render();
                if separator.is_empty() {
                    Value::Array(chars.iter().map(|c| Value::String(c.to_string())).collect())
                } else {
                    Value::Array(s.split(separator.as_str()).map(Value::from).collect())
                }
            }
        },
        "replace" => Value::String(s.replacen(text_arg(0).as_str(), &text_arg(1), 1)),
        "concat" => Value::String(
            args.iter()
                .fold(s.to_string(), |acc, value| acc + &value.render()),
        ),
        _ => return None,
    };
    Some(value)
}

fn repeat(s: &str, count: &Value) -> Result<Value, EvalWarning> {
    let out_of_range = |reason| EvalWarning::OutOfRange {
        method: "repeat",
        reason,
    };
    let count = match count {
        Value::Undefined => 0.0,
        other => other.to_number(),
    };
    let count = if count.is_nan() { 0.0 } else { count.trunc() };
    if count < 0.0 || count.is_infinite() {
        return Err(out_of_range("count must be a finite non-negative number"));
    }
    if count * s.len() as f64 > MAX_REPEAT_BYTES as f64 {
        return Err(out_of_range("result too large"));
    }
    Ok(Value::String(s.repeat(count as usize)))
}

/// Resolves `slice(start, end)` arguments with negative offsets.
fn slice_bounds(len: usize, start: &Value, end: &Value) -> (usize, usize) {
    let resolve = |v: &Value, default: usize| -> usize {
        match v {
            Value::Undefined => default,
            other => {
                let n = other.to_number();
                if n.is_nan() {
                    0
                } else if n < 0.0 {
                    (len as f64 + n).max(0.0) as usize
                } else {
                    n.min(len as f64) as usize
                }
            }
        }
    };
    let start = resolve(start, 0);
    let end = resolve(end, len);
    (start, end.max(start))
}
