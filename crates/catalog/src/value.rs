//! Attribute values: resolved [`Value`]s and their declared form, [`Expr`]

use crate::error::{Error, Result};
use crate::reference::parse_template;
use crate::types::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use crate::reference::{Reference, TemplatePart};

/// An attribute value in the catalog: either a literal or a typed reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    /// Nested block, ordered by key
    Block(BTreeMap<String, Value>),
    Ref(Reference),
    /// Interpolated string; literal runs and references
    Template(Vec<TemplatePart>),
}

impl Value {
    /// Check if the value (or anything nested in it) holds a reference
    pub fn has_references(&self) -> bool {
        let mut found = Vec::new();
        self.collect_references("", &mut found);
        !found.is_empty()
    }

    /// Walk the value, pushing `(attribute path, reference)` pairs
    pub(crate) fn collect_references<'a>(
        &'a self,
        path: &str,
        out: &mut Vec<(String, &'a Reference)>,
    ) {
        match self {
            Value::Ref(reference) => out.push((path.to_string(), reference)),
            Value::Template(parts) => {
                for part in parts {
                    if let TemplatePart::Ref(reference) = part {
                        out.push((path.to_string(), reference));
                    }
                }
            }
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    item.collect_references(&format!("{path}[{i}]"), out);
                }
            }
            Value::Block(fields) => {
                for (key, field) in fields {
                    field.collect_references(&child_path(path, key), out);
                }
            }
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
        }
    }
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

/// A declared attribute value before resolution.
///
/// References and templates are still text here; [`Expr::resolve`] turns
/// them into typed [`Value`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Expr>),
    Block(BTreeMap<String, Expr>),
    /// Reference expression text, e.g. `aws_iam_role.node.arn`
    Ref(String),
    /// Text with `${...}` interpolations
    Template(String),
}

impl Expr {
    pub fn string(s: impl Into<String>) -> Self {
        Expr::String(s.into())
    }

    pub fn reference(text: impl Into<String>) -> Self {
        Expr::Ref(text.into())
    }

    pub fn template(text: impl Into<String>) -> Self {
        Expr::Template(text.into())
    }

    pub fn block<K: Into<String>>(fields: impl IntoIterator<Item = (K, Expr)>) -> Self {
        Expr::Block(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Resolve into a [`Value`].
    ///
    /// `entity` and `path` only label the error for the first malformed
    /// reference found.
    pub fn resolve(&self, entity: &EntityId, path: &str) -> Result<Value> {
        let malformed = |text: &String, reason| Error::MalformedReference {
            entity: entity.clone(),
            attribute: path.to_string(),
            text: text.clone(),
            reason,
        };

        match self {
            Expr::Null => Ok(Value::Null),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Ref(text) => Reference::parse(text)
                .map(Value::Ref)
                .map_err(|e| malformed(text, e)),
            Expr::Template(text) => parse_template(text)
                .map(Value::Template)
                .map_err(|e| malformed(text, e)),
            Expr::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| item.resolve(entity, &format!("{path}[{i}]")))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
            Expr::Block(fields) => {
                let mut resolved = BTreeMap::new();
                for (key, field) in fields {
                    resolved.insert(key.clone(), field.resolve(entity, &child_path(path, key))?);
                }
                Ok(Value::Block(resolved))
            }
        }
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::String(s.to_string())
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::Bool(b)
    }
}

impl From<f64> for Expr {
    fn from(n: f64) -> Self {
        Expr::Number(n)
    }
}
