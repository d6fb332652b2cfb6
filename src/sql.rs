//! SQL building helpers shared by the Postgres stores.
//!
//! Identifiers and values take strictly separate paths into SQL text:
//! identifiers are validated and go through [`quote_ident`], values are
//! always bound as parameters. Nothing caller-supplied is ever interpolated
//! into a statement.

use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};

use crate::document::{FilterValue, MetadataFilter};
use crate::error::{Result, StoreError};

/// Whether `s` is a plain SQL identifier: letters, digits, and underscores,
/// not starting with a digit.
pub(crate) fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quote an identifier for inclusion in SQL text, doubling any embedded
/// double quotes.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Validate a metadata filter before any SQL is built: the field must look
/// like a plain identifier and the value arity must match the operator.
pub(crate) fn validate_filter(filter: &MetadataFilter) -> Result<()> {
    if !is_valid_identifier(&filter.field) {
        return Err(StoreError::Validation(format!(
            "invalid metadata filter field: {:?}",
            filter.field
        )));
    }
    match (&filter.value, filter.operator.takes_list()) {
        (FilterValue::Many(values), true) if values.is_empty() => Err(StoreError::Validation(
            format!("operator {} requires a non-empty list value", filter.operator),
        )),
        (FilterValue::Many(_), true) | (FilterValue::One(_), false) => Ok(()),
        (FilterValue::Many(_), false) => Err(StoreError::Validation(format!(
            "operator {} takes a single value, not a list",
            filter.operator
        ))),
        (FilterValue::One(_), true) => Err(StoreError::Validation(format!(
            "operator {} requires a list value",
            filter.operator
        ))),
    }
}

/// Append `metadata->>field <op> value` to the query. The field and every
/// value are bound as parameters; only the operator token, from a closed
/// enum, enters the SQL text directly.
pub(crate) fn push_metadata_filter(
    qb: &mut QueryBuilder<'_, Postgres>,
    filter: &MetadataFilter,
) -> Result<()> {
    validate_filter(filter)?;
    qb.push("metadata->>");
    qb.push_bind(filter.field.clone());
    qb.push(" ");
    qb.push(filter.operator.sql());
    match &filter.value {
        FilterValue::Many(values) => {
            qb.push(" (");
            let mut separated = qb.separated(", ");
            for value in values {
                separated.push_bind(filter_value_text(value));
            }
            qb.push(")");
        }
        FilterValue::One(value) => {
            qb.push(" ");
            qb.push_bind(filter_value_text(value));
        }
    }
    Ok(())
}

/// Text form of a metadata value, matching what Postgres yields for a
/// `metadata->>field` extraction: strings verbatim, everything else in its
/// JSON rendering. Both backends compare through this so filter semantics
/// stay identical.
pub(crate) fn filter_value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// pgvector text form: `[x,y,z]`.
pub(crate) fn format_vector(vector: &[f32]) -> String {
    format!("[{}]", vector.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(","))
}

/// Parse the pgvector text form back into components.
pub(crate) fn parse_vector_text(text: &str) -> Result<Vec<f32>> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|t| t.strip_suffix(']'))
        .ok_or_else(|| StoreError::Storage(format!("malformed vector literal: {text:?}")))?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|e| StoreError::Storage(format!("malformed vector component {part:?}: {e}")))
        })
        .collect()
}
