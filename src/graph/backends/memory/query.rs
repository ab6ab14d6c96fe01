//! Parser and evaluator for the in-memory driver's SQL subset.

use std::cmp::Ordering;

use pest::Parser;
use pest_derive::Parser;
use serde_json::{Number, Value as JsonValue};

use crate::error::StorageError;
use crate::graph::element::Record;

#[derive(Parser)]
#[grammar = "graph/backends/memory/sql.pest"]
struct SqlParser;

/// What a select reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    Class(String),
    Cluster(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: JsonValue,
}

/// A parsed `select` statement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Select {
    pub target: Target,
    pub conditions: Vec<Condition>,
    pub order_by: Option<(String, bool)>,
    pub limit: Option<usize>,
}

impl Select {
    pub fn parse(text: &str) -> Result<Self, StorageError> {
        let statement = SqlParser::parse(Rule::select, text)
            .map_err(|e| StorageError::InvalidQuery(format!("{}", e)))?
            .next()
            .ok_or_else(|| StorageError::InvalidQuery(format!("empty query: {}", text)))?;

        let mut target = None;
        let mut conditions = Vec::new();
        let mut order_by = None;
        let mut limit = None;

        for pair in statement.into_inner() {
            match pair.as_rule() {
                Rule::target => target = Some(parse_target(pair)?),
                Rule::where_clause => {
                    for condition in pair.into_inner() {
                        conditions.push(parse_condition(condition)?);
                    }
                }
                Rule::order_clause => {
                    let mut inner = pair.into_inner();
                    let field = inner
                        .next()
                        .map(|p| p.as_str().to_string())
                        .ok_or_else(|| invalid("order by without field"))?;
                    let ascending = inner
                        .next()
                        .map(|p| !p.as_str().eq_ignore_ascii_case("desc"))
                        .unwrap_or(true);
                    order_by = Some((field, ascending));
                }
                Rule::limit_clause => {
                    let text = pair.as_str();
                    let count = pair
                        .into_inner()
                        .next()
                        .ok_or_else(|| invalid("limit without count"))?
                        .as_str()
                        .parse::<usize>()
                        .map_err(|e| invalid(&format!("bad limit in '{}': {}", text, e)))?;
                    limit = Some(count);
                }
                _ => {}
            }
        }

        Ok(Self {
            target: target.ok_or_else(|| invalid("missing target"))?,
            conditions,
            order_by,
            limit,
        })
    }

    /// True when the record satisfies every condition.
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }

    /// Filters, orders and truncates candidate records.
    pub fn apply(&self, candidates: Vec<Record>) -> Vec<Record> {
        let mut selected: Vec<Record> = candidates.into_iter().filter(|r| self.matches(r)).collect();

        if let Some((field, ascending)) = &self.order_by {
            selected.sort_by(|a, b| {
                let ordering = compare(&field_value(a, field), &field_value(b, field))
                    .unwrap_or(Ordering::Equal);
                if *ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

impl Condition {
    fn matches(&self, record: &Record) -> bool {
        let actual = field_value(record, &self.field);
        match self.operator {
            Operator::Eq => equals(&actual, &self.value),
            Operator::Ne => !equals(&actual, &self.value),
            Operator::Lt => compare(&actual, &self.value) == Some(Ordering::Less),
            Operator::Le => matches!(
                compare(&actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::Gt => compare(&actual, &self.value) == Some(Ordering::Greater),
            Operator::Ge => matches!(
                compare(&actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }
}

fn invalid(message: &str) -> StorageError {
    StorageError::InvalidQuery(message.to_string())
}

fn parse_target(pair: pest::iterators::Pair<Rule>) -> Result<Target, StorageError> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| invalid("missing target"))?;
    let rule = inner.as_rule();
    let name = inner
        .into_inner()
        .next()
        .map(|p| p.as_str().to_string())
        .ok_or_else(|| invalid("missing target name"))?;

    match rule {
        Rule::cluster_target => Ok(Target::Cluster(name)),
        _ => Ok(Target::Class(name)),
    }
}

fn parse_condition(pair: pest::iterators::Pair<Rule>) -> Result<Condition, StorageError> {
    let mut inner = pair.into_inner();
    let field = inner
        .next()
        .ok_or_else(|| invalid("condition without field"))?
        .as_str()
        .to_string();
    let operator = match inner.next().map(|p| p.as_str()) {
        Some("=") => Operator::Eq,
        Some("!=") | Some("<>") => Operator::Ne,
        Some("<") => Operator::Lt,
        Some("<=") => Operator::Le,
        Some(">") => Operator::Gt,
        Some(">=") => Operator::Ge,
        other => return Err(invalid(&format!("unknown operator {:?}", other))),
    };
    let literal = inner
        .next()
        .ok_or_else(|| invalid("condition without value"))?;

    Ok(Condition {
        field,
        operator,
        value: parse_literal(literal)?,
    })
}

fn parse_literal(pair: pest::iterators::Pair<Rule>) -> Result<JsonValue, StorageError> {
    match pair.as_rule() {
        Rule::string => Ok(JsonValue::String(
            pair.into_inner()
                .next()
                .map(|p| p.as_str().to_string())
                .unwrap_or_default(),
        )),
        Rule::rid => Ok(JsonValue::String(pair.as_str().to_string())),
        Rule::number => {
            let text = pair.as_str();
            if text.contains('.') {
                text.parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(JsonValue::Number)
                    .ok_or_else(|| invalid(&format!("bad number {}", text)))
            } else {
                text.parse::<i64>()
                    .map(JsonValue::from)
                    .map_err(|e| invalid(&format!("bad number {}: {}", text, e)))
            }
        }
        Rule::bool_lit => Ok(JsonValue::Bool(pair.as_str().eq_ignore_ascii_case("true"))),
        Rule::null_lit => Ok(JsonValue::Null),
        other => Err(invalid(&format!("unexpected literal {:?}", other))),
    }
}

/// Reads a field, record attribute (`@rid`, `@class`, `@version`), edge
/// endpoint (`out`, `in`) or dotted path into an embedded value.
pub(crate) fn field_value(record: &Record, field: &str) -> JsonValue {
    match field {
        "@rid" => {
            return record
                .rid
                .map(|r| JsonValue::String(r.to_string()))
                .unwrap_or(JsonValue::Null)
        }
        "@class" => return JsonValue::String(record.class.clone()),
        "@version" => return JsonValue::from(record.version),
        _ => {}
    }

    let mut segments = field.split('.');
    let head = segments.next().unwrap_or_default();

    let root = if let Some(value) = record.properties.get(head) {
        value.clone()
    } else if let Some(rid) = record.links.get(head) {
        JsonValue::String(rid.to_string())
    } else if head == "out" {
        record.out.map(|r| JsonValue::String(r.to_string())).unwrap_or(JsonValue::Null)
    } else if head == "in" {
        record.in_.map(|r| JsonValue::String(r.to_string())).unwrap_or(JsonValue::Null)
    } else {
        JsonValue::Null
    };

    segments.fold(root, |value, segment| {
        value.get(segment).cloned().unwrap_or(JsonValue::Null)
    })
}

fn equals(left: &JsonValue, right: &JsonValue) -> bool {
    match (left, right) {
        (JsonValue::Number(a), JsonValue::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn compare(left: &JsonValue, right: &JsonValue) -> Option<Ordering> {
    match (left, right) {
        (JsonValue::Number(a), JsonValue::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (JsonValue::String(a), JsonValue::String(b)) => Some(a.cmp(b)),
        (JsonValue::Bool(a), JsonValue::Bool(b)) => Some(a.cmp(b)),
        (JsonValue::Null, JsonValue::Null) => Some(Ordering::Equal),
        (JsonValue::Null, _) => Some(Ordering::Less),
        (_, JsonValue::Null) => Some(Ordering::Greater),
        _ => None,
    }
}
