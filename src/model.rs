//! Builds the binary assignment model for one department.
//!
//! Variables `0..decisions.len()` are the assignment booleans, laid out over a
//! dense doctor × day × room × slot grid in tie-break order (doctor id, day,
//! room name, slot). The remaining variables are `hosts(doctor, day, room)`
//! indicators used by the room capacity rule.

use crate::data::{Assignment, ContractType, Day, Doctor, Minutes, Room, TimeSlot};
use crate::error::ConfigurationError;
use crate::validator::{
    full_time_pairs, FULL_TIME_DAILY_MINUTES, PART_TIME_DAILY_MINUTES, PART_TIME_EARLIEST_START,
    ROOM_FULL_TIME_CAPACITY, ROOM_PART_TIME_CAPACITY,
};
use itertools::Itertools;
use log::{info, trace};

pub type VarIndex = usize;

const TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    AtMost,
    AtLeast,
    Exactly,
}

/// `Σ coef·var (sense) rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub name: String,
    pub terms: Vec<(VarIndex, f64)>,
    pub sense: Sense,
    pub rhs: f64,
}

impl LinearConstraint {
    fn new(name: String, terms: Vec<(VarIndex, f64)>, sense: Sense, rhs: f64) -> Self {
        Self {
            name,
            terms,
            sense,
            rhs,
        }
    }

    pub fn lhs(&self, values: &[bool]) -> f64 {
        self.terms
            .iter()
            .filter(|(var, _)| values[*var])
            .map(|(_, coef)| coef)
            .sum()
    }

    pub fn is_satisfied(&self, values: &[bool]) -> bool {
        let lhs = self.lhs(values);
        match self.sense {
            Sense::AtMost => lhs <= self.rhs + TOLERANCE,
            Sense::AtLeast => lhs >= self.rhs - TOLERANCE,
            Sense::Exactly => (lhs - self.rhs).abs() <= TOLERANCE,
        }
    }
}

/// One assignment variable: indices into the model's doctor and room lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub doctor: usize,
    pub day: Day,
    pub room: usize,
    pub slot: TimeSlot,
}

#[derive(Debug, Clone)]
pub struct ShiftModel {
    pub department: String,
    pub doctors: Vec<Doctor>,
    pub rooms: Vec<Room>,
    pub days: Vec<Day>,
    pub slots: Vec<TimeSlot>,
    pub decisions: Vec<Decision>,
    pub variable_count: usize,
    pub constraints: Vec<LinearConstraint>,
    pub objective: Vec<(VarIndex, f64)>,
    grid: Vec<Option<VarIndex>>,
}

/// Translates a roster and day/slot universe into a [`ShiftModel`].
///
/// Doctors and rooms outside `department` are ignored. The slot universe is
/// `slots` plus the part-time slots.
pub fn build(
    department: &str,
    doctors: &[Doctor],
    rooms: &[Room],
    days: &[Day],
    slots: &[TimeSlot],
) -> Result<ShiftModel, ConfigurationError> {
    let doctors: Vec<Doctor> = doctors
        .iter()
        .filter(|d| d.department == department)
        .sorted_by_key(|d| d.id)
        .dedup_by(|a, b| a.id == b.id)
        .cloned()
        .collect();
    if doctors.is_empty() {
        return Err(ConfigurationError::NoDoctors(department.to_string()));
    }
    let rooms: Vec<Room> = rooms
        .iter()
        .filter(|r| r.department == department)
        .sorted_by(|a, b| a.name.cmp(&b.name))
        .dedup_by(|a, b| a.name == b.name)
        .cloned()
        .collect();
    if rooms.is_empty() {
        return Err(ConfigurationError::NoRooms(department.to_string()));
    }
    let days: Vec<Day> = days.iter().copied().sorted().dedup().collect();
    if days.is_empty() {
        return Err(ConfigurationError::NoDays(department.to_string()));
    }
    let slots = TimeSlot::universe(slots);

    info!(
        "Building shift model for {} with {} doctors, {} rooms, {} days and {} slots...",
        department,
        doctors.len(),
        rooms.len(),
        days.len(),
        slots.len()
    );

    let mut model = ShiftModel {
        department: department.to_string(),
        grid: vec![None; doctors.len() * days.len() * rooms.len() * slots.len()],
        doctors,
        rooms,
        days,
        slots,
        decisions: Vec::new(),
        variable_count: 0,
        constraints: Vec::new(),
        objective: Vec::new(),
    };

    // pre-filter slots a contract can never hold on that day
    for doctor in 0..model.doctors.len() {
        for &day in &model.days.clone() {
            for room in 0..model.rooms.len() {
                for &slot in &model.slots.clone() {
                    if is_assignment_possible(model.doctors[doctor].contract_type, day, slot) {
                        let cell = model.cell(doctor, day, room, slot);
                        model.grid[cell] = Some(model.decisions.len());
                        model.decisions.push(Decision {
                            doctor,
                            day,
                            room,
                            slot,
                        });
                    }
                }
            }
        }
    }
    model.variable_count = model.decisions.len();
    trace!(
        "Generated {} assignment variables out of a theoretical maximum of {}.",
        model.decisions.len(),
        model.grid.len()
    );

    model.add_room_exclusivity();
    model.add_doctor_exclusivity();
    model.add_daily_hours();
    model.add_room_capacity();
    model.objective = (0..model.decisions.len()).map(|var| (var, 1.0)).collect();

    info!(
        "Shift model has {} variables and {} constraints.",
        model.variable_count,
        model.constraints.len()
    );
    Ok(model)
}

fn is_assignment_possible(contract: ContractType, day: Day, slot: TimeSlot) -> bool {
    match contract {
        ContractType::FullTime => full_time_pairs(day).iter().flatten().any(|s| *s == slot),
        ContractType::PartTime => slot.start() >= PART_TIME_EARLIEST_START,
    }
}

impl ShiftModel {
    fn cell(&self, doctor: usize, day: Day, room: usize, slot: TimeSlot) -> usize {
        let day_pos = self.days.iter().position(|d| *d == day).unwrap_or(0);
        let slot_pos = self.slots.iter().position(|s| *s == slot).unwrap_or(0);
        ((doctor * self.days.len() + day_pos) * self.rooms.len() + room) * self.slots.len()
            + slot_pos
    }

    /// Assignment variable for a grid cell, `None` when pre-filtered or out of range.
    pub fn variable(&self, doctor: usize, day: Day, room: usize, slot: TimeSlot) -> Option<VarIndex> {
        if doctor >= self.doctors.len()
            || room >= self.rooms.len()
            || !self.days.contains(&day)
            || !self.slots.contains(&slot)
        {
            return None;
        }
        self.grid[self.cell(doctor, day, room, slot)]
    }

    pub fn assignment(&self, var: VarIndex) -> Option<Assignment> {
        let decision = self.decisions.get(var)?;
        let doctor = &self.doctors[decision.doctor];
        Some(Assignment {
            doctor_id: doctor.id,
            day: decision.day,
            room: self.rooms[decision.room].name.clone(),
            time_slot: decision.slot,
            doctor: doctor.name.clone(),
        })
    }

    /// Assignments whose variable is true, in tie-break order.
    pub fn assignments(&self, values: &[bool]) -> Vec<Assignment> {
        (0..self.decisions.len())
            .filter(|var| values.get(*var).copied().unwrap_or(false))
            .filter_map(|var| self.assignment(var))
            .collect()
    }

    /// Sets each `hosts` indicator to whether its doctor holds any slot in that room that day.
    pub fn complete(&self, assignments: &[bool]) -> Vec<bool> {
        let mut values = vec![false; self.variable_count];
        for (var, value) in assignments.iter().take(self.decisions.len()).enumerate() {
            values[var] = *value;
        }
        for constraint in self.constraints.iter().filter(|c| c.name.starts_with("link[")) {
            let [(x, _), (h, _)] = constraint.terms[..] else {
                continue;
            };
            if values[x] {
                values[h] = true;
            }
        }
        values
    }

    pub fn objective_value(&self, values: &[bool]) -> f64 {
        self.objective
            .iter()
            .filter(|(var, _)| values[*var])
            .map(|(_, coef)| coef)
            .sum()
    }

    pub fn violated_constraint(&self, values: &[bool]) -> Option<&LinearConstraint> {
        self.constraints.iter().find(|c| !c.is_satisfied(values))
    }

    pub fn is_feasible(&self, values: &[bool]) -> bool {
        values.len() == self.variable_count && self.violated_constraint(values).is_none()
    }

    /// Distinct slot start instants; interval overlap reduces to these points.
    fn instants(&self) -> Vec<Minutes> {
        self.slots.iter().map(|s| s.start()).sorted().dedup().collect()
    }

    fn vars_where(&self, keep: impl Fn(&Decision) -> bool) -> Vec<VarIndex> {
        self.decisions
            .iter()
            .enumerate()
            .filter(|(_, d)| keep(d))
            .map(|(var, _)| var)
            .collect()
    }

    fn add_room_exclusivity(&mut self) {
        for &day in &self.days.clone() {
            for room in 0..self.rooms.len() {
                for instant in self.instants() {
                    let vars = self.vars_where(|d| {
                        d.day == day && d.room == room && d.slot.contains(instant)
                    });
                    if vars.len() > 1 {
                        let name = format!("room[{}/{}]@{}", day, self.rooms[room].name, instant);
                        self.push(name, ones(&vars), Sense::AtMost, 1.0);
                    }
                }
            }
        }
    }

    fn add_doctor_exclusivity(&mut self) {
        for doctor in 0..self.doctors.len() {
            for &day in &self.days.clone() {
                for instant in self.instants() {
                    let vars = self.vars_where(|d| {
                        d.doctor == doctor && d.day == day && d.slot.contains(instant)
                    });
                    if vars.len() > 1 {
                        let name = format!("doctor[{}/{}]@{}", self.doctors[doctor].id, day, instant);
                        self.push(name, ones(&vars), Sense::AtMost, 1.0);
                    }
                }
            }
        }
    }

    fn add_daily_hours(&mut self) {
        for doctor in 0..self.doctors.len() {
            let id = self.doctors[doctor].id;
            for &day in &self.days.clone() {
                let minutes: Vec<(VarIndex, f64)> = self
                    .vars_where(|d| d.doctor == doctor && d.day == day)
                    .into_iter()
                    .map(|var| (var, f64::from(self.decisions[var].slot.minutes())))
                    .collect();
                match self.doctors[doctor].contract_type {
                    ContractType::FullTime => {
                        let anchor = self.vars_where(|d| {
                            d.doctor == doctor && d.day == day && d.slot == TimeSlot::Morning
                        });
                        self.push(
                            format!("full_time_minutes[{id}/{day}]"),
                            minutes,
                            Sense::Exactly,
                            f64::from(FULL_TIME_DAILY_MINUTES),
                        );
                        self.push(
                            format!("full_time_morning[{id}/{day}]"),
                            ones(&anchor),
                            Sense::Exactly,
                            1.0,
                        );
                    }
                    ContractType::PartTime => {
                        self.push(
                            format!("part_time_min[{id}/{day}]"),
                            minutes.clone(),
                            Sense::AtLeast,
                            f64::from(PART_TIME_DAILY_MINUTES[0]),
                        );
                        self.push(
                            format!("part_time_max[{id}/{day}]"),
                            minutes,
                            Sense::AtMost,
                            f64::from(PART_TIME_DAILY_MINUTES[1]),
                        );
                    }
                }
            }
        }
    }

    fn add_room_capacity(&mut self) {
        for &day in &self.days.clone() {
            for room in 0..self.rooms.len() {
                let mut full_time = Vec::new();
                let mut part_time = Vec::new();
                for doctor in 0..self.doctors.len() {
                    let vars = self.vars_where(|d| d.doctor == doctor && d.day == day && d.room == room);
                    if vars.is_empty() {
                        continue;
                    }
                    let hosts = self.variable_count;
                    self.variable_count += 1;
                    for var in vars {
                        self.push(
                            format!("link[{var}]"),
                            vec![(var, 1.0), (hosts, -1.0)],
                            Sense::AtMost,
                            0.0,
                        );
                    }
                    match self.doctors[doctor].contract_type {
                        ContractType::FullTime => full_time.push(hosts),
                        ContractType::PartTime => part_time.push(hosts),
                    }
                }
                let room_name = self.rooms[room].name.clone();
                if full_time.len() > ROOM_FULL_TIME_CAPACITY {
                    self.push(
                        format!("full_time_capacity[{day}/{room_name}]"),
                        ones(&full_time),
                        Sense::AtMost,
                        ROOM_FULL_TIME_CAPACITY as f64,
                    );
                }
                if part_time.len() > ROOM_PART_TIME_CAPACITY {
                    self.push(
                        format!("part_time_capacity[{day}/{room_name}]"),
                        ones(&part_time),
                        Sense::AtMost,
                        ROOM_PART_TIME_CAPACITY as f64,
                    );
                }
            }
        }
    }

    fn push(&mut self, name: String, terms: Vec<(VarIndex, f64)>, sense: Sense, rhs: f64) {
        self.constraints
            .push(LinearConstraint::new(name, terms, sense, rhs));
    }
}

fn ones(vars: &[VarIndex]) -> Vec<(VarIndex, f64)> {
    vars.iter().map(|var| (*var, 1.0)).collect()
}
