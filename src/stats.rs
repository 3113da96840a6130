//! Workload figures for a set of assignments or persisted entries.

use crate::data::{intervals_overlap, Assignment, DoctorId, Minutes, ScheduledShift};
use itertools::Itertools;
use serde::Serialize;

/// Hours reported by [`WorkloadSummary::hourly_load`], 08:00 through 23:00.
pub const REPORTED_HOURS: std::ops::Range<u32> = 8..24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorWorkload {
    pub doctor_id: DoctorId,
    pub assignments: usize,
    pub minutes: Minutes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HourLoad {
    pub hour: u32,
    pub active: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSummary {
    pub total_assignments: usize,
    pub total_minutes: Minutes,
    pub doctors: Vec<DoctorWorkload>,
    pub hourly_load: Vec<HourLoad>,
}

pub fn summarize_assignments(assignments: &[Assignment]) -> WorkloadSummary {
    summarize(
        assignments
            .iter()
            .map(|a| (a.doctor_id, a.time_slot.start(), a.time_slot.end())),
    )
}

pub fn summarize_scheduled(entries: &[ScheduledShift]) -> WorkloadSummary {
    summarize(entries.iter().map(|e| (e.doctor_id, e.start, e.end)))
}

fn summarize(items: impl Iterator<Item = (DoctorId, Minutes, Minutes)>) -> WorkloadSummary {
    let items: Vec<_> = items.collect();

    let doctors = items
        .iter()
        .map(|&(doctor_id, start, end)| (doctor_id, end.saturating_sub(start)))
        .into_group_map()
        .into_iter()
        .map(|(doctor_id, spans)| DoctorWorkload {
            doctor_id,
            assignments: spans.len(),
            minutes: spans.iter().sum(),
        })
        .sorted_by_key(|w| w.doctor_id)
        .collect();

    let hourly_load = REPORTED_HOURS
        .map(|hour| HourLoad {
            hour,
            active: items
                .iter()
                .filter(|(_, start, end)| intervals_overlap(*start, *end, hour * 60, hour * 60 + 60))
                .count(),
        })
        .collect();

    WorkloadSummary {
        total_assignments: items.len(),
        total_minutes: items.iter().map(|(_, s, e)| e.saturating_sub(*s)).sum(),
        doctors,
        hourly_load,
    }
}
