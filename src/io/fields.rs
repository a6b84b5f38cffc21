//! Attribute field resolution.
//!
//! Building datasets name their height and slope columns inconsistently, so
//! callers pass an ordered list of candidate names and we pick the first one
//! that actually exists. Matching is case-sensitive.

use std::collections::BTreeSet;

use crate::domain::FieldCandidates;
use crate::error::{AppError, ErrorKind};

/// Height and slope columns found in a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFields {
    pub height: String,
    pub slope: String,
}

/// Return the first candidate present in `schema`.
pub fn resolve_field(schema: &BTreeSet<String>, candidates: &[String]) -> Result<String, AppError> {
    candidates
        .iter()
        .find(|name| schema.contains(name.as_str()))
        .cloned()
        .ok_or_else(|| {
            AppError::new(
                ErrorKind::SchemaMismatch,
                format!("No matching field found in [{}]", candidates.join(", ")),
            )
        })
}

/// Resolve both the height and the slope column.
pub fn resolve_fields(schema: &BTreeSet<String>, candidates: &FieldCandidates) -> Result<ResolvedFields, AppError> {
    let height = resolve_field(schema, &candidates.height)?;
    let slope = resolve_field(schema, &candidates.slope)?;
    Ok(ResolvedFields { height, slope })
}
