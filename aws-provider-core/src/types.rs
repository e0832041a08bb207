//! IAM policy documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::arn::{is_valid_account_id, Arn};
use crate::error::{ProviderError, ProviderResult};

pub const POLICY_VERSION: &str = "2012-10-17";

/// A single string or a list of strings, as IAM accepts for most fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionType {
    Single(String),
    Multiple(Vec<String>),
}

impl ActionType {
    fn normalized(&self) -> Vec<&str> {
        let mut values: Vec<&str> = match self {
            Self::Single(value) => vec![value.as_str()],
            Self::Multiple(values) => values.iter().map(String::as_str).collect(),
        };
        values.sort_unstable();
        values.dedup();
        values
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// Unknown keys are rejected so that a document is never re-serialized
/// with fields missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Statement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub effect: Effect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_principal: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_action: Option<ActionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ActionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_resource: Option<ActionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
}

fn strings(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => None,
    }
}

/// IAM stores `"AWS": "123456789012"` as the account root ARN, so both
/// reduce to the account id.
fn canonical_aws_principal(value: String) -> String {
    if is_valid_account_id(&value) {
        return value;
    }
    match value.parse::<Arn>() {
        Ok(arn) if arn.service == "iam" && arn.resource == "root" => arn.account_id,
        _ => value,
    }
}

/// Principal block as sorted value lists per principal type. `"*"` is the
/// same as `{"AWS": "*"}`.
fn normalized_principal(value: &Value) -> Option<BTreeMap<String, Vec<String>>> {
    let entries = match value {
        Value::String(s) if s == "*" => {
            return Some(BTreeMap::from([("AWS".to_string(), vec![s.clone()])]));
        }
        Value::Object(entries) => entries,
        _ => return None,
    };
    entries
        .iter()
        .map(|(kind, values)| {
            let mut values = strings(values)?;
            if kind == "AWS" {
                values = values.into_iter().map(canonical_aws_principal).collect();
            }
            values.sort_unstable();
            values.dedup();
            Some((kind.clone(), values))
        })
        .collect()
}

type ConditionBlock = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Condition block with every value list sorted. Numbers and booleans are
/// compared by their JSON text.
fn normalized_condition(value: &Value) -> Option<ConditionBlock> {
    fn texts(value: &Value) -> Option<Vec<String>> {
        let items = match value {
            Value::Array(items) => items.as_slice(),
            other => std::slice::from_ref(other),
        };
        let mut texts = items
            .iter()
            .map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                Value::Bool(b) => Some(b.to_string()),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;
        texts.sort_unstable();
        texts.dedup();
        Some(texts)
    }

    value
        .as_object()?
        .iter()
        .map(|(operator, keys)| {
            let keys = keys
                .as_object()?
                .iter()
                .map(|(key, values)| Some((key.clone(), texts(values)?)))
                .collect::<Option<BTreeMap<_, _>>>()?;
            Some((operator.clone(), keys))
        })
        .collect()
}

fn same_block<T: PartialEq>(
    a: Option<&Value>,
    b: Option<&Value>,
    normalize: impl Fn(&Value) -> Option<T>,
) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => match (normalize(a), normalize(b)) {
            (Some(left), Some(right)) => left == right,
            _ => a == b,
        },
        _ => false,
    }
}

impl Statement {
    fn equivalent(&self, other: &Self) -> bool {
        fn values(field: Option<&ActionType>) -> Vec<&str> {
            field.map(ActionType::normalized).unwrap_or_default()
        }

        self.sid.as_deref().unwrap_or_default() == other.sid.as_deref().unwrap_or_default()
            && self.effect == other.effect
            && same_block(self.principal.as_ref(), other.principal.as_ref(), normalized_principal)
            && same_block(
                self.not_principal.as_ref(),
                other.not_principal.as_ref(),
                normalized_principal,
            )
            && values(self.action.as_ref()) == values(other.action.as_ref())
            && values(self.not_action.as_ref()) == values(other.not_action.as_ref())
            && values(self.resource.as_ref()) == values(other.resource.as_ref())
            && values(self.not_resource.as_ref()) == values(other.not_resource.as_ref())
            && same_block(self.condition.as_ref(), other.condition.as_ref(), normalized_condition)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct PolicyDocument {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub statement: Vec<Statement>,
}

impl PolicyDocument {
    pub fn new(statement: Vec<Statement>) -> Self {
        Self {
            version: POLICY_VERSION.to_string(),
            id: None,
            statement,
        }
    }

    pub fn from_json(text: &str) -> ProviderResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| ProviderError::validation("policy document", e.to_string()))
    }

    pub fn to_json(&self) -> ProviderResult<String> {
        serde_json::to_string(self)
            .map_err(|e| ProviderError::validation("policy document", e.to_string()))
    }

    /// Semantic equality: statement order, single-vs-list values, value
    /// order and account-id vs root-ARN principals do not matter.
    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.version == other.version
            && self.id == other.id
            && self.statement.len() == other.statement.len()
            && self
                .statement
                .iter()
                .all(|a| other.statement.iter().any(|b| a.equivalent(b)))
            && other
                .statement
                .iter()
                .all(|b| self.statement.iter().any(|a| a.equivalent(b)))
    }
}

/// Compare two JSON policy documents. Documents that do not parse as
/// policies are compared as plain JSON.
pub fn policies_equivalent(a: &str, b: &str) -> bool {
    match (PolicyDocument::from_json(a), PolicyDocument::from_json(b)) {
        (Ok(a), Ok(b)) => a.is_equivalent(&b),
        _ => match (
            serde_json::from_str::<Value>(a),
            serde_json::from_str::<Value>(b),
        ) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        },
    }
}
