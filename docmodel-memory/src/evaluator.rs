//! Query evaluation over JSON documents.
//!
//! Expressions evaluate to `Option<Value>`, where `None` is the dialect's `undefined`: a missing
//! property, a comparison between values of different types, or a function applied to the wrong
//! kind of argument. A `WHERE` clause keeps a document only when it evaluates to `true`.

use serde_json::{Map, Value, json};
use std::{cmp::Ordering, collections::HashMap};

use docmodel_core::query::QueryParameter;

use crate::sql::{Accessor, CompareOp, Expr, Projection, SelectQuery, SqlError, SqlResult};

const FUNCTIONS: [&str; 10] = [
    "ARRAY_CONTAINS",
    "ARRAY_LENGTH",
    "CONTAINS",
    "COUNT",
    "ENDSWITH",
    "IS_DEFINED",
    "IS_NULL",
    "LOWER",
    "STARTSWITH",
    "UPPER",
];

/// Comparable representation of JSON values.
///
/// All numbers are normalized to f64, so `1` and `1.0` compare equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Value> for Comparable<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => Comparable::Null,
            Value::Bool(value) => Comparable::Bool(*value),
            Value::Number(value) => Comparable::Number(value.as_f64().unwrap_or(f64::NAN)),
            Value::String(value) => Comparable::String(value),
            Value::Array(values) => Comparable::Array(values.iter().map(Comparable::from).collect()),
            Value::Object(map) => Comparable::Map(
                map.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect(),
            ),
        }
    }
}

impl Comparable<'_> {
    fn same_kind(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

fn compare(op: CompareOp, left: &Value, right: &Value) -> Option<bool> {
    let (left, right) = (Comparable::from(left), Comparable::from(right));
    if !left.same_kind(&right) {
        return None;
    }

    match op {
        CompareOp::Eq => Some(left == right),
        CompareOp::Ne => Some(left != right),
        CompareOp::Lt => left.partial_cmp(&right).map(Ordering::is_lt),
        CompareOp::Lte => left.partial_cmp(&right).map(Ordering::is_le),
        CompareOp::Gt => left.partial_cmp(&right).map(Ordering::is_gt),
        CompareOp::Gte => left.partial_cmp(&right).map(Ordering::is_ge),
    }
}

/// `true` when every property of `pattern` appears in `candidate` with an equal value.
fn partial_match(candidate: &Value, pattern: &Value) -> bool {
    match (candidate, pattern) {
        (Value::Object(candidate), Value::Object(pattern)) => pattern.iter().all(|(key, value)| {
            candidate
                .get(key)
                .is_some_and(|found| Comparable::from(found) == Comparable::from(value))
        }),
        _ => Comparable::from(candidate) == Comparable::from(pattern),
    }
}

/// Evaluates expressions against one document.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Value,
    alias: &'a str,
    parameters: &'a [QueryParameter],
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Value, alias: &'a str, parameters: &'a [QueryParameter]) -> Self {
        Self {
            document,
            alias,
            parameters,
        }
    }

    /// `true` when `expr` evaluates to boolean `true`.
    pub fn matches(&self, expr: &Expr) -> SqlResult<bool> {
        Ok(matches!(self.evaluate(expr)?, Some(Value::Bool(true))))
    }

    pub fn evaluate(&self, expr: &Expr) -> SqlResult<Option<Value>> {
        match expr {
            Expr::Literal(value) => Ok(Some(value.clone())),
            Expr::Parameter(name) => self.parameter(name).map(|value| Some(value.clone())),
            Expr::Path(root, accessors) => self.path(root, accessors),
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(value) = self.evaluate(item)? {
                        values.push(value);
                    }
                }
                Ok(Some(Value::Array(values)))
            }
            Expr::Compare(left, op, right) => {
                match (self.evaluate(left)?, self.evaluate(right)?) {
                    (Some(left), Some(right)) => Ok(compare(*op, &left, &right).map(Value::Bool)),
                    _ => Ok(None),
                }
            }
            Expr::In(needle, haystack) => {
                let Some(needle) = self.evaluate(needle)? else {
                    return Ok(None);
                };
                for item in haystack {
                    if let Some(candidate) = self.evaluate(item)? {
                        if compare(CompareOp::Eq, &needle, &candidate) == Some(true) {
                            return Ok(Some(Value::Bool(true)));
                        }
                    }
                }
                Ok(Some(Value::Bool(false)))
            }
            Expr::And(left, right) => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                Ok(match (as_bool(&left), as_bool(&right)) {
                    (Some(false), _) | (_, Some(false)) => Some(Value::Bool(false)),
                    (Some(true), Some(true)) => Some(Value::Bool(true)),
                    _ => None,
                })
            }
            Expr::Or(left, right) => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                Ok(match (as_bool(&left), as_bool(&right)) {
                    (Some(true), _) | (_, Some(true)) => Some(Value::Bool(true)),
                    (Some(false), Some(false)) => Some(Value::Bool(false)),
                    _ => None,
                })
            }
            Expr::Not(inner) => Ok(as_bool(&self.evaluate(inner)?).map(|b| Value::Bool(!b))),
            Expr::Call(name, args) => self.call(name, args),
        }
    }

    fn parameter(&self, name: &str) -> SqlResult<&'a Value> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
            .ok_or_else(|| SqlError(format!("Parameter '{name}' is not defined.")))
    }

    fn path(&self, root: &str, accessors: &[Accessor]) -> SqlResult<Option<Value>> {
        if root != self.alias {
            return Err(SqlError(format!("Identifier '{root}' could not be resolved.")));
        }

        let mut current = Some(self.document);
        for accessor in accessors {
            let Some(value) = current else {
                break;
            };

            current = match accessor {
                Accessor::Property(name) => value.get(name.as_str()),
                Accessor::Index(index) => match self.evaluate(index)? {
                    Some(Value::String(name)) => value.get(name.as_str()),
                    Some(Value::Number(n)) => n
                        .as_u64()
                        .and_then(|i| usize::try_from(i).ok())
                        .and_then(|i| value.get(i)),
                    _ => None,
                },
            };
        }

        Ok(current.cloned())
    }

    fn call(&self, name: &str, args: &[Expr]) -> SqlResult<Option<Value>> {
        let arity = |min: usize, max: usize| {
            if args.len() < min || args.len() > max {
                Err(SqlError(format!(
                    "The {name} function requires between {min} and {max} argument(s)."
                )))
            } else {
                Ok(())
            }
        };

        match name {
            "IS_DEFINED" => {
                arity(1, 1)?;
                Ok(Some(Value::Bool(self.evaluate(&args[0])?.is_some())))
            }
            "IS_NULL" => {
                arity(1, 1)?;
                Ok(Some(Value::Bool(matches!(self.evaluate(&args[0])?, Some(Value::Null)))))
            }
            "ARRAY_CONTAINS" => {
                arity(2, 3)?;
                let partial = match args.get(2) {
                    Some(arg) => matches!(self.evaluate(arg)?, Some(Value::Bool(true))),
                    None => false,
                };
                let (Some(Value::Array(items)), Some(needle)) =
                    (self.evaluate(&args[0])?, self.evaluate(&args[1])?)
                else {
                    return Ok(None);
                };

                let found = items.iter().any(|item| {
                    if partial {
                        partial_match(item, &needle)
                    } else {
                        Comparable::from(item) == Comparable::from(&needle)
                    }
                });
                Ok(Some(Value::Bool(found)))
            }
            "ARRAY_LENGTH" => {
                arity(1, 1)?;
                Ok(match self.evaluate(&args[0])? {
                    Some(Value::Array(items)) => Some(json!(items.len())),
                    _ => None,
                })
            }
            "STARTSWITH" | "ENDSWITH" | "CONTAINS" => {
                arity(2, 3)?;
                let ignore_case = match args.get(2) {
                    Some(arg) => matches!(self.evaluate(arg)?, Some(Value::Bool(true))),
                    None => false,
                };
                let (Some(Value::String(text)), Some(Value::String(part))) =
                    (self.evaluate(&args[0])?, self.evaluate(&args[1])?)
                else {
                    return Ok(None);
                };

                let (text, part) = if ignore_case {
                    (text.to_lowercase(), part.to_lowercase())
                } else {
                    (text, part)
                };
                let found = match name {
                    "STARTSWITH" => text.starts_with(&part),
                    "ENDSWITH" => text.ends_with(&part),
                    _ => text.contains(&part),
                };
                Ok(Some(Value::Bool(found)))
            }
            "LOWER" | "UPPER" => {
                arity(1, 1)?;
                Ok(match self.evaluate(&args[0])? {
                    Some(Value::String(text)) if name == "LOWER" => Some(Value::String(text.to_lowercase())),
                    Some(Value::String(text)) => Some(Value::String(text.to_uppercase())),
                    _ => None,
                })
            }
            "COUNT" => Err(SqlError(
                "Aggregate functions are only supported as the whole SELECT expression.".to_string(),
            )),
            other => Err(SqlError(format!("'{other}' is not a recognized built-in function name."))),
        }
    }
}

fn as_bool(value: &Option<Value>) -> Option<bool> {
    match value {
        Some(Value::Bool(b)) => Some(*b),
        _ => None,
    }
}

/// Checks that every parameter is bound, every path starts at the query alias and every function
/// is known, before any document is looked at.
fn resolve(query: &SelectQuery, parameters: &[QueryParameter]) -> SqlResult<()> {
    for expr in query.expressions() {
        expr.walk(&mut |expr| match expr {
            Expr::Parameter(name) if !parameters.iter().any(|p| &p.name == name) => {
                Err(SqlError(format!("Parameter '{name}' is not defined.")))
            }
            Expr::Path(root, _) if root != &query.alias => {
                Err(SqlError(format!("Identifier '{root}' could not be resolved.")))
            }
            Expr::Call(name, _) if !FUNCTIONS.contains(&name.as_str()) => Err(SqlError(format!(
                "'{name}' is not a recognized built-in function name."
            ))),
            _ => Ok(()),
        })?;
    }

    Ok(())
}

/// Evaluates a clause that must be a non-negative integer, such as `OFFSET` or `TOP`.
fn constant(
    expr: Option<&Expr>,
    clause: &str,
    alias: &str,
    parameters: &[QueryParameter],
) -> SqlResult<Option<usize>> {
    let Some(expr) = expr else {
        return Ok(None);
    };

    DocumentEvaluator::new(&Value::Null, alias, parameters)
        .evaluate(expr)?
        .and_then(|value| value.as_u64())
        .and_then(|n| usize::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| SqlError(format!("The {clause} value must be a non-negative integer.")))
}

/// Runs `query` over `documents`, returning the result rows.
pub(crate) fn execute<'a>(
    query: &SelectQuery,
    documents: impl IntoIterator<Item = &'a Value>,
    parameters: &[QueryParameter],
) -> SqlResult<Vec<Value>> {
    resolve(query, parameters)?;

    let alias = query.alias.as_str();
    let top = constant(query.top.as_ref(), "TOP", alias, parameters)?;
    let offset = constant(query.offset.as_ref(), "OFFSET", alias, parameters)?;
    let limit = constant(query.limit.as_ref(), "LIMIT", alias, parameters)?;

    let mut filtered = Vec::new();
    for document in documents {
        let evaluator = DocumentEvaluator::new(document, alias, parameters);
        let keep = match &query.filter {
            Some(filter) => evaluator.matches(filter)?,
            None => true,
        };
        if keep {
            filtered.push(document);
        }
    }

    let rows = match count_argument(query) {
        Some(argument) => {
            let mut count = 0usize;
            for document in &filtered {
                if DocumentEvaluator::new(document, alias, parameters)
                    .evaluate(argument)?
                    .is_some()
                {
                    count += 1;
                }
            }
            vec![project_count(query, count)]
        }
        None => {
            let mut rows = Vec::with_capacity(filtered.len());
            for document in filtered {
                if let Some(row) = project(query, document, parameters)? {
                    rows.push(row);
                }
            }
            rows
        }
    };

    Ok(rows
        .into_iter()
        .skip(offset.unwrap_or(0))
        .take(limit.unwrap_or(usize::MAX))
        .take(top.unwrap_or(usize::MAX))
        .collect())
}

/// The argument of a `COUNT(...)` that makes up the whole projection.
fn count_argument(query: &SelectQuery) -> Option<&Expr> {
    match &query.projection {
        Projection::Items(items) if items.len() == 1 => match &items[0].expr {
            Expr::Call(name, args) if name == "COUNT" && args.len() == 1 => Some(&args[0]),
            _ => None,
        },
        _ => None,
    }
}

fn project_count(query: &SelectQuery, count: usize) -> Value {
    if query.value {
        return json!(count);
    }

    let name = match &query.projection {
        Projection::Items(items) => items[0].alias.clone(),
        Projection::All => None,
    };
    json!({ name.unwrap_or_else(|| "$1".to_string()): count })
}

fn project(
    query: &SelectQuery,
    document: &Value,
    parameters: &[QueryParameter],
) -> SqlResult<Option<Value>> {
    let items = match &query.projection {
        Projection::All => return Ok(Some(document.clone())),
        Projection::Items(items) => items,
    };

    let evaluator = DocumentEvaluator::new(document, &query.alias, parameters);
    if query.value {
        return evaluator.evaluate(&items[0].expr);
    }

    let mut row = Map::new();
    let mut unnamed = 0;
    for item in items {
        let name = match item.alias.as_deref().or_else(|| item.expr.projected_name()) {
            Some(name) => name.to_string(),
            None => {
                unnamed += 1;
                format!("${unnamed}")
            }
        };

        if let Some(value) = evaluator.evaluate(&item.expr)? {
            row.insert(name, value);
        }
    }

    Ok(Some(Value::Object(row)))
}
