use skua_compiler::{ColumnSlot, QueryResultCol, QueryResultRow, ScanKind, SqlValue};

use crate::backend::BackendError;

/// Fit one raw driver row into the pre-typed slots derived from the plan
/// entry's row schema. Arity or type mismatches are scan failures; narrow
/// numeric coercions (the driver reporting a count as signed, say) are
/// accepted.
pub(crate) fn scan_row(
    slots: &[ColumnSlot],
    raw: Vec<SqlValue>,
    table_name: &str,
) -> Result<QueryResultRow, BackendError> {
    if raw.len() != slots.len() {
        return Err(BackendError::new(format!(
            "row has {} columns, schema expects {}",
            raw.len(),
            slots.len()
        )));
    }
    let mut cols = Vec::with_capacity(slots.len());
    for (slot, value) in slots.iter().zip(raw) {
        cols.push(QueryResultCol {
            name: slot.name.clone(),
            value: coerce(slot, value)?,
        });
    }
    Ok(QueryResultRow {
        index: table_name.to_string(),
        cols,
    })
}

fn coerce(slot: &ColumnSlot, value: SqlValue) -> Result<SqlValue, BackendError> {
    let ok = match (slot.kind, &value) {
        (ScanKind::Dynamic, _) => true,
        (_, SqlValue::Null) => true,
        (ScanKind::Int, SqlValue::Int(_) | SqlValue::UInt(_)) => true,
        (ScanKind::UInt, SqlValue::UInt(_)) => true,
        (ScanKind::UInt, SqlValue::Int(v)) => *v >= 0,
        (ScanKind::Float, SqlValue::Float(_) | SqlValue::Int(_) | SqlValue::UInt(_)) => true,
        (ScanKind::Text, SqlValue::Str(_)) => true,
        (ScanKind::Timestamp, SqlValue::Time(_)) => true,
        (ScanKind::FloatArray, SqlValue::Floats(_)) => true,
        _ => false,
    };
    if ok {
        Ok(value)
    } else {
        Err(BackendError::new(format!(
            "column {} cannot hold {value:?} (expected {:?})",
            slot.name, slot.kind
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(kind: ScanKind) -> ColumnSlot {
        ColumnSlot {
            kind,
            name: "c".to_string(),
        }
    }

    #[test]
    fn arity_mismatch_is_an_error() {
        let slots = vec![slot(ScanKind::UInt)];
        assert!(scan_row(&slots, vec![], "t").is_err());
    }

    #[test]
    fn signed_count_is_accepted_when_non_negative() {
        let slots = vec![slot(ScanKind::UInt)];
        assert!(scan_row(&slots, vec![SqlValue::Int(5)], "t").is_ok());
        assert!(scan_row(&slots, vec![SqlValue::Int(-5)], "t").is_err());
    }

    #[test]
    fn type_mismatch_is_an_error() {
        let slots = vec![slot(ScanKind::FloatArray)];
        assert!(scan_row(&slots, vec![SqlValue::Str("no".into())], "t").is_err());
    }
}
