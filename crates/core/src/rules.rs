//! Permission rule engine -- pure logic, no I/O.
//!
//! Rules are stored as serialized JsonLogic. They are parsed into a
//! [`RuleNode`] tree and evaluated against a JSON context built by
//! [`crate::permissions`]. Parsing never executes anything; unknown operators
//! are rejected at parse time.
//!
//! Storage conventions:
//!
//! - empty text, `null` and `{}` mean "no rule configured" and deny;
//! - `true` / `"true"` mean "no restriction" and allow without evaluation.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;

/// Stored value meaning "no restriction configured".
pub const ALLOW_ALL: &str = "true";

/// Default for every rule column.
pub const DENY_ALL: &str = "{}";

/// Maximum nesting depth accepted by the parser.
const MAX_DEPTH: usize = 64;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("Regel ist kein gültiges JSON: {0}")]
    InvalidJson(String),

    #[error("Unbekannter Operator '{0}'")]
    UnknownOperator(String),

    #[error("Operator '{op}' erwartet {expected} Argumente")]
    Arity { op: Operator, expected: &'static str },

    #[error("Regel ist zu tief verschachtelt")]
    TooDeep,

    #[error("Ungültige Regel: {0}")]
    Malformed(String),
}

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

/// Supported JsonLogic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    If,
    Eq,
    StrictEq,
    NotEq,
    StrictNotEq,
    Not,
    Truthy,
    And,
    Or,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Cat,
    Missing,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::If => "if",
            Operator::Eq => "==",
            Operator::StrictEq => "===",
            Operator::NotEq => "!=",
            Operator::StrictNotEq => "!==",
            Operator::Not => "!",
            Operator::Truthy => "!!",
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::In => "in",
            Operator::Cat => "cat",
            Operator::Missing => "missing",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s {
            "if" | "?:" => Operator::If,
            "==" => Operator::Eq,
            "===" => Operator::StrictEq,
            "!=" => Operator::NotEq,
            "!==" => Operator::StrictNotEq,
            "!" => Operator::Not,
            "!!" => Operator::Truthy,
            "and" => Operator::And,
            "or" => Operator::Or,
            "<" => Operator::Lt,
            "<=" => Operator::Lte,
            ">" => Operator::Gt,
            ">=" => Operator::Gte,
            "in" => Operator::In,
            "cat" => Operator::Cat,
            "missing" => Operator::Missing,
            other => return Err(RuleError::UnknownOperator(other.to_string())),
        };
        Ok(op)
    }
}

/// A parsed rule expression.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleNode {
    Literal(Value),
    Array(Vec<RuleNode>),
    Var {
        path: Box<RuleNode>,
        default: Option<Box<RuleNode>>,
    },
    Op {
        op: Operator,
        args: Vec<RuleNode>,
    },
}

impl RuleNode {
    /// Parse a JSON value into an expression tree.
    pub fn parse(value: &Value) -> Result<Self, RuleError> {
        parse_node(value, 0)
    }
}

fn parse_node(value: &Value, depth: usize) -> Result<RuleNode, RuleError> {
    if depth > MAX_DEPTH {
        return Err(RuleError::TooDeep);
    }
    match value {
        Value::Array(items) => Ok(RuleNode::Array(
            items
                .iter()
                .map(|v| parse_node(v, depth + 1))
                .collect::<Result<_, _>>()?,
        )),
        Value::Object(map) if map.is_empty() => Ok(RuleNode::Literal(value.clone())),
        Value::Object(map) => {
            if map.len() > 1 {
                let keys: Vec<&str> = map.keys().map(String::as_str).collect();
                return Err(RuleError::Malformed(format!(
                    "Objekt mit mehreren Operatoren ({})",
                    keys.join(", ")
                )));
            }
            let Some((key, raw_args)) = map.iter().next() else {
                return Ok(RuleNode::Literal(value.clone()));
            };
            let mut args = parse_args(raw_args, depth + 1)?;
            if key == "var" {
                let mut drained = args.drain(..);
                let path = drained
                    .next()
                    .unwrap_or(RuleNode::Literal(Value::String(String::new())));
                let default = drained.next().map(Box::new);
                return Ok(RuleNode::Var {
                    path: Box::new(path),
                    default,
                });
            }
            let op: Operator = key.parse()?;
            check_arity(op, args.len())?;
            Ok(RuleNode::Op { op, args })
        }
        other => Ok(RuleNode::Literal(other.clone())),
    }
}

/// JsonLogic allows a single non-array argument as sugar for `[arg]`.
fn parse_args(raw: &Value, depth: usize) -> Result<Vec<RuleNode>, RuleError> {
    match raw {
        Value::Array(items) => items.iter().map(|v| parse_node(v, depth)).collect(),
        single => Ok(vec![parse_node(single, depth)?]),
    }
}

fn check_arity(op: Operator, n: usize) -> Result<(), RuleError> {
    let expected = match op {
        Operator::Eq | Operator::StrictEq | Operator::NotEq | Operator::StrictNotEq => {
            (n == 2).then_some(()).ok_or("2")
        }
        Operator::Gt | Operator::Gte | Operator::In => (n == 2).then_some(()).ok_or("2"),
        Operator::Lt | Operator::Lte => (n == 2 || n == 3).then_some(()).ok_or("2 oder 3"),
        Operator::Not | Operator::Truthy => (n == 1).then_some(()).ok_or("1"),
        Operator::And | Operator::Or => (n >= 1).then_some(()).ok_or("mindestens 1"),
        Operator::If | Operator::Cat | Operator::Missing => Ok(()),
    };
    expected.map_err(|expected| RuleError::Arity { op, expected })
}

// ---------------------------------------------------------------------------
// Rule (stored field)
// ---------------------------------------------------------------------------

/// A stored permission rule after parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Unconditional allow (`true` / `"true"`).
    Allow,
    /// No rule configured (`{}`, empty, `null`).
    Deny,
    Expr(RuleNode),
}

impl Rule {
    /// Parse a rule as stored in a `*_permissions` TEXT column.
    pub fn parse(raw: &str) -> Result<Self, RuleError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Rule::Deny);
        }
        if trimmed == ALLOW_ALL {
            return Ok(Rule::Allow);
        }
        let value: Value =
            serde_json::from_str(trimmed).map_err(|e| RuleError::InvalidJson(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Interpret an already-decoded JSON rule.
    pub fn from_value(value: &Value) -> Result<Self, RuleError> {
        match value {
            Value::Bool(true) => Ok(Rule::Allow),
            Value::String(s) if s == ALLOW_ALL => Ok(Rule::Allow),
            Value::Null => Ok(Rule::Deny),
            Value::Object(map) if map.is_empty() => Ok(Rule::Deny),
            other => Ok(Rule::Expr(RuleNode::parse(other)?)),
        }
    }

    /// Evaluate to a boolean decision. Errors surface as `Err`.
    pub fn evaluate(&self, context: &Value) -> Result<bool, RuleError> {
        match self {
            Rule::Allow => Ok(true),
            Rule::Deny => Ok(false),
            Rule::Expr(node) => evaluate(node, context).map(|v| truthy(&v)),
        }
    }

    /// Deny-on-error decision.
    pub fn allows(&self, context: &Value) -> bool {
        self.evaluate(context).unwrap_or(false)
    }
}

/// Parse and evaluate a stored rule; any parse or evaluation error denies.
pub fn is_allowed(raw: &str, context: &Value) -> bool {
    Rule::parse(raw).map(|rule| rule.allows(context)).unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluate an expression tree against `data`.
pub fn evaluate(node: &RuleNode, data: &Value) -> Result<Value, RuleError> {
    match node {
        RuleNode::Literal(v) => Ok(v.clone()),
        RuleNode::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(|n| evaluate(n, data))
                .collect::<Result<_, _>>()?,
        )),
        RuleNode::Var { path, default } => {
            let path = evaluate(path, data)?;
            match lookup(data, &path) {
                Some(v) if !v.is_null() => Ok(v.clone()),
                _ => match default {
                    Some(d) => evaluate(d, data),
                    None => Ok(Value::Null),
                },
            }
        }
        RuleNode::Op { op, args } => apply(*op, args, data),
    }
}

fn apply(op: Operator, args: &[RuleNode], data: &Value) -> Result<Value, RuleError> {
    check_arity(op, args.len())?;
    match op {
        Operator::And => {
            let mut last = Value::Null;
            for arg in args {
                last = evaluate(arg, data)?;
                if !truthy(&last) {
                    return Ok(last);
                }
            }
            Ok(last)
        }
        Operator::Or => {
            let mut last = Value::Null;
            for arg in args {
                last = evaluate(arg, data)?;
                if truthy(&last) {
                    return Ok(last);
                }
            }
            Ok(last)
        }
        Operator::If => {
            for pair in args.chunks(2) {
                match pair {
                    [cond, then] => {
                        if truthy(&evaluate(cond, data)?) {
                            return evaluate(then, data);
                        }
                    }
                    [otherwise] => return evaluate(otherwise, data),
                    _ => {}
                }
            }
            Ok(Value::Null)
        }
        Operator::Not => Ok(Value::Bool(!truthy(&evaluate(&args[0], data)?))),
        Operator::Truthy => Ok(Value::Bool(truthy(&evaluate(&args[0], data)?))),
        Operator::Eq | Operator::NotEq | Operator::StrictEq | Operator::StrictNotEq => {
            let a = evaluate(&args[0], data)?;
            let b = evaluate(&args[1], data)?;
            let result = match op {
                Operator::Eq => loose_eq(&a, &b),
                Operator::NotEq => !loose_eq(&a, &b),
                Operator::StrictEq => strict_eq(&a, &b),
                _ => !strict_eq(&a, &b),
            };
            Ok(Value::Bool(result))
        }
        Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte => {
            let values = args
                .iter()
                .map(|a| evaluate(a, data))
                .collect::<Result<Vec<_>, _>>()?;
            let holds = |a: &Value, b: &Value| match (op, compare(a, b)) {
                (_, None) => false,
                (Operator::Lt, Some(o)) => o == Ordering::Less,
                (Operator::Lte, Some(o)) => o != Ordering::Greater,
                (Operator::Gt, Some(o)) => o == Ordering::Greater,
                (_, Some(o)) => o != Ordering::Less,
            };
            Ok(Value::Bool(values.windows(2).all(|w| holds(&w[0], &w[1]))))
        }
        Operator::In => {
            let needle = evaluate(&args[0], data)?;
            let haystack = evaluate(&args[1], data)?;
            let found = match &haystack {
                Value::Array(items) => items.iter().any(|item| strict_eq(item, &needle)),
                Value::String(s) => s.contains(&stringify(&needle)),
                _ => false,
            };
            Ok(Value::Bool(found))
        }
        Operator::Cat => {
            let mut out = String::new();
            for arg in args {
                out.push_str(&stringify(&evaluate(arg, data)?));
            }
            Ok(Value::String(out))
        }
        Operator::Missing => {
            let values = args
                .iter()
                .map(|a| evaluate(a, data))
                .collect::<Result<Vec<_>, _>>()?;
            let keys = match values.as_slice() {
                [Value::Array(keys), ..] => keys.clone(),
                _ => values,
            };
            let missing = keys
                .into_iter()
                .filter(|key| match lookup(data, key) {
                    None | Some(Value::Null) => true,
                    Some(Value::String(s)) => s.is_empty(),
                    Some(_) => false,
                })
                .collect();
            Ok(Value::Array(missing))
        }
    }
}

/// Resolve a `var` path (`"a.b.0.c"`, a number, or `""` for the whole context).
fn lookup<'a>(data: &'a Value, path: &Value) -> Option<&'a Value> {
    let path = match path {
        Value::Null => return Some(data),
        Value::String(s) if s.is_empty() => return Some(data),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    resolve_path(data, &path)
}

/// Resolve a dot-separated path (`"a.b.0"`) inside a JSON value.
pub fn resolve_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(data, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// JsonLogic truthiness: like JavaScript, except that `[]` is falsy.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        _ => None,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn strict_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(_), Value::Number(_))
        | (Value::String(_), Value::String(_))
        | (Value::Bool(_), Value::Bool(_)) => strict_eq(a, b),
        (Value::Array(_), _) | (_, Value::Array(_)) | (Value::Object(_), _) | (_, Value::Object(_)) => {
            a == b
        }
        _ => match (to_number(a), to_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => to_number(a)?.partial_cmp(&to_number(b)?),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
