//! The functional surface used by the presentation layer.
//!
//! Control flow of an optimization run: roster checks, validator short-circuit,
//! model build, solve, and (unless a dry run) materialization. The run is split
//! into [`snapshot`], [`propose`] and [`commit`] so the store is only needed
//! while reading and writing.

use crate::data::{Assignment, Day, Doctor, DoctorId, Room, TimeSlot};
use crate::error::{ConfigurationError, SchedulerError, SchedulerResult};
use crate::materializer::{self, MaterializedEntry};
use crate::model;
use crate::solver::{self, SolveStatus, SolverSettings};
use crate::stats::{self, WorkloadSummary};
use crate::store::{EntryFilter, Store};
use crate::validator::{self, Conflict};
use log::{info, warn};
use serde::Serialize;

/// Everything an optimization run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationOutcome {
    /// `None` when the validator short-circuited and no solver ran.
    pub status: Option<SolveStatus>,
    pub already_optimal: bool,
    pub assignments: Vec<Assignment>,
    pub materialized: Vec<MaterializedEntry>,
}

impl OptimizationOutcome {
    fn skipped() -> Self {
        Self {
            status: None,
            already_optimal: true,
            assignments: Vec::new(),
            materialized: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSlot {
    pub day: Day,
    pub time_slot: TimeSlot,
}

/// True when the department's persisted schedule already satisfies every hard rule.
pub fn is_schedule_optimized(
    store: &Store,
    department: &str,
    days: &[Day],
    rooms: &[String],
    slots: &[TimeSlot],
) -> SchedulerResult<bool> {
    require_department(store, department)?;
    let entries = store.scheduled_shifts(&EntryFilter::department(department))?;
    Ok(validator::is_valid(&entries, days, rooms, slots))
}

/// Proposes (and unless `dry_run`, persists) a schedule for one department.
///
/// Returns an empty list when the current schedule is already valid or when no
/// schedule could be produced.
pub fn optimize_shifts(
    store: &mut Store,
    department: &str,
    days: &[Day],
    rooms: &[String],
    slots: &[TimeSlot],
    dry_run: bool,
    settings: &SolverSettings,
) -> SchedulerResult<Vec<Assignment>> {
    plan_shifts(store, department, days, rooms, slots, dry_run, settings)
        .map(|outcome| outcome.assignments)
}

/// Like [`optimize_shifts`], reporting the solver status and written rows too.
///
/// Runs [`snapshot`], [`propose`] and, unless `dry_run`, [`commit`] in turn.
pub fn plan_shifts(
    store: &mut Store,
    department: &str,
    days: &[Day],
    rooms: &[String],
    slots: &[TimeSlot],
    dry_run: bool,
    settings: &SolverSettings,
) -> SchedulerResult<OptimizationOutcome> {
    let snapshot = snapshot(store, department, days, rooms, slots)?;
    let outcome = propose(&snapshot, settings)?;
    if dry_run {
        return Ok(outcome);
    }
    commit(store, &snapshot, outcome)
}

/// Roster and validity of one department, read from the store in one go.
///
/// The solve phase works from this alone, so callers can release the store
/// before calling [`propose`].
#[derive(Debug, Clone)]
pub struct PlanningSnapshot {
    pub department: String,
    pub doctors: Vec<Doctor>,
    pub rooms: Vec<Room>,
    pub days: Vec<Day>,
    pub slots: Vec<TimeSlot>,
    pub already_optimal: bool,
}

impl PlanningSnapshot {
    fn room_names(&self) -> Vec<String> {
        self.rooms.iter().map(|r| r.name.clone()).collect()
    }
}

/// Read phase: roster checks and the validator verdict on the current schedule.
pub fn snapshot(
    store: &Store,
    department: &str,
    days: &[Day],
    rooms: &[String],
    slots: &[TimeSlot],
) -> SchedulerResult<PlanningSnapshot> {
    require_department(store, department)?;
    let doctors = store.doctors_in_department(department)?;
    if doctors.is_empty() {
        return Err(ConfigurationError::NoDoctors(department.to_string()).into());
    }
    let rooms = department_rooms(store, department, rooms)?;
    let mut snapshot = PlanningSnapshot {
        department: department.to_string(),
        doctors,
        rooms,
        days: days.to_vec(),
        slots: slots.to_vec(),
        already_optimal: false,
    };
    let entries = store.scheduled_shifts(&EntryFilter::department(department))?;
    snapshot.already_optimal =
        validator::is_valid(&entries, days, &snapshot.room_names(), slots);
    Ok(snapshot)
}

/// Solve phase: builds and solves the model. Touches no store.
pub fn propose(
    snapshot: &PlanningSnapshot,
    settings: &SolverSettings,
) -> SchedulerResult<OptimizationOutcome> {
    if snapshot.already_optimal {
        info!(
            "The existing schedule for {} is already optimized; no optimization needed.",
            snapshot.department
        );
        return Ok(OptimizationOutcome::skipped());
    }
    let model = model::build(
        &snapshot.department,
        &snapshot.doctors,
        &snapshot.rooms,
        &snapshot.days,
        &snapshot.slots,
    )?;
    let solved = solver::solve(&model, settings);
    Ok(OptimizationOutcome {
        status: Some(solved.status),
        already_optimal: false,
        assignments: solved.assignments,
        materialized: Vec::new(),
    })
}

/// Apply phase: materializes a proposal.
///
/// The snapshot scope is validated again first; if another run made it valid
/// in the meantime nothing is written.
pub fn commit(
    store: &mut Store,
    snapshot: &PlanningSnapshot,
    mut outcome: OptimizationOutcome,
) -> SchedulerResult<OptimizationOutcome> {
    if outcome.assignments.is_empty() {
        return Ok(outcome);
    }
    let entries = store.scheduled_shifts(&EntryFilter::department(&snapshot.department))?;
    if validator::is_valid(&entries, &snapshot.days, &snapshot.room_names(), &snapshot.slots) {
        warn!(
            "Schedule for {} became valid while solving; discarding the proposal",
            snapshot.department
        );
        return Ok(OptimizationOutcome::skipped());
    }
    outcome.materialized = materializer::apply(store, &outcome.assignments)?;
    Ok(outcome)
}

/// Every (day, slot) whose start instant is free in the doctor's existing schedule.
pub fn recommend_available_slots(
    store: &Store,
    doctor_id: DoctorId,
) -> SchedulerResult<Vec<AvailableSlot>> {
    if store.find_doctor(doctor_id)?.is_none() {
        return Err(SchedulerError::UnknownDoctor(doctor_id));
    }
    let booked = store.scheduled_shifts(&EntryFilter::doctor(doctor_id))?;
    let available = Day::ALL
        .into_iter()
        .flat_map(|day| TimeSlot::ALL.into_iter().map(move |time_slot| AvailableSlot { day, time_slot }))
        .filter(|candidate| {
            let instant = candidate.time_slot.start();
            !booked
                .iter()
                .any(|e| e.day == candidate.day && e.start <= instant && instant < e.end)
        })
        .collect();
    Ok(available)
}

/// All pairs of entries booked into the same room at intersecting times.
pub fn schedule_conflicts(store: &Store, department: &str) -> SchedulerResult<Vec<Conflict>> {
    require_department(store, department)?;
    let entries = store.scheduled_shifts(&EntryFilter::department(department))?;
    Ok(validator::find_conflicts(&entries))
}

pub fn workload(store: &Store, department: &str) -> SchedulerResult<WorkloadSummary> {
    require_department(store, department)?;
    let entries = store.scheduled_shifts(&EntryFilter::department(department))?;
    Ok(stats::summarize_scheduled(&entries))
}

fn require_department(store: &Store, department: &str) -> SchedulerResult<()> {
    match store.find_department(department)? {
        Some(_) => Ok(()),
        None => Err(ConfigurationError::UnknownDepartment(department.to_string()).into()),
    }
}

/// The department's rooms named in `requested`; other names are ignored.
fn department_rooms(
    store: &Store,
    department: &str,
    requested: &[String],
) -> SchedulerResult<Vec<Room>> {
    let owned = store.rooms_in_department(department)?;
    for name in requested.iter().filter(|n| !owned.iter().any(|r| &r.name == *n)) {
        warn!("Ignoring room {name}: it does not belong to {department}");
    }
    let rooms: Vec<Room> = owned
        .into_iter()
        .filter(|r| requested.contains(&r.name))
        .collect();
    if rooms.is_empty() {
        return Err(ConfigurationError::NoRooms(department.to_string()).into());
    }
    Ok(rooms)
}
