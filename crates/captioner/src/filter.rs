//! Decides whether a decoded event should be captioned at all.

use pipeline::{EventType, SkipReason, StorageEvent, TableName};

/// Returns `Ok(())` if `event` should run through the pipeline, or the reason
/// it is skipped.
///
/// Only inserts are captioned. An event that names a table must name
/// `expected_table`; an event without a table is accepted.
pub fn should_caption(event: &StorageEvent, expected_table: &TableName) -> Result<(), SkipReason> {
    if event.event_type != EventType::Insert {
        return Err(SkipReason::NotAnInsert(event.event_type));
    }

    match event.table.as_deref() {
        Some(table) if table != expected_table.as_str() => Err(SkipReason::UnexpectedTable {
            actual: table.to_string(),
            expected: expected_table.clone(),
        }),
        _ => Ok(()),
    }
}
