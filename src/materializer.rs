//! Turns accepted assignments into persisted shift/entry pairs.

use crate::data::{Assignment, EntryId, ShiftId};
use crate::error::StoreResult;
use crate::store::{Store, UnitOfWork};
use log::{error, info};
use serde::Serialize;

/// Shift type recorded for shifts written by the optimizer.
pub const OPTIMIZED_SHIFT_TYPE: &str = "Optimized";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializedEntry {
    pub shift_id: ShiftId,
    pub entry_id: EntryId,
}

/// Writes one Shift and one ScheduleEntry per assignment in a single transaction.
///
/// Append-only: existing rows are never touched, so applying the same proposal
/// twice writes it twice. On any failure nothing is committed.
pub fn apply(store: &mut Store, assignments: &[Assignment]) -> StoreResult<Vec<MaterializedEntry>> {
    let uow = store.unit_of_work()?;
    let mut written = Vec::with_capacity(assignments.len());
    for assignment in assignments {
        let pair = write_one(&uow, assignment).inspect_err(|e| {
            error!(
                "Materializing {:?} failed, rolling back {} pending rows: {}",
                assignment,
                written.len(),
                e
            )
        })?;
        written.push(pair);
    }
    uow.commit()?;
    info!("Materialized {} assignments", written.len());
    Ok(written)
}

fn write_one(
    uow: &UnitOfWork<'_>,
    assignment: &Assignment,
) -> StoreResult<MaterializedEntry> {
    let shift_id = uow.insert_shift(
        assignment.doctor_id,
        assignment.time_slot.start(),
        assignment.time_slot.end(),
        OPTIMIZED_SHIFT_TYPE,
    )?;
    let entry_id = uow.insert_entry(assignment.day, &assignment.room, shift_id)?;
    Ok(MaterializedEntry { shift_id, entry_id })
}
