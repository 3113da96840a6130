use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Store row ids
pub type DoctorId = i64;
pub type ShiftId = i64;
pub type EntryId = i64;
/// Minutes since midnight.
pub type Minutes = u32;

/// Employment contract of a doctor, stored as `Full-Time` / `Part-Time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum ContractType {
    #[serde(rename = "Full-Time")]
    FullTime,
    #[serde(rename = "Part-Time")]
    PartTime,
}

impl ContractType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContractType::FullTime => "Full-Time",
            ContractType::PartTime => "Part-Time",
        }
    }
}

impl FromStr for ContractType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Full-Time" => Ok(ContractType::FullTime),
            "Part-Time" => Ok(ContractType::PartTime),
            other => Err(format!("unknown contract type: {other}")),
        }
    }
}

/// Working days in canonical order. Friday is never scheduled.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize,
)]
pub enum Day {
    Saturday,
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
}

impl Day {
    pub const ALL: [Day; 6] = [
        Day::Saturday,
        Day::Sunday,
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Day::Saturday => "Saturday",
            Day::Sunday => "Sunday",
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Day {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Day::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| format!("not a working day: {s}"))
    }
}

/// The closed set of shift slots. Declaration order is the canonical slot order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize,
)]
pub enum TimeSlot {
    #[serde(rename = "08:00-12:00")]
    Morning,
    #[serde(rename = "12:00-16:00")]
    Midday,
    #[serde(rename = "16:00-20:00")]
    Evening,
    #[serde(rename = "14:00-18:00")]
    Afternoon,
    #[serde(rename = "18:00-22:00")]
    Night,
}

impl TimeSlot {
    pub const ALL: [TimeSlot; 5] = [
        TimeSlot::Morning,
        TimeSlot::Midday,
        TimeSlot::Evening,
        TimeSlot::Afternoon,
        TimeSlot::Night,
    ];

    /// Slots offered when the caller does not name any.
    pub const BASE: [TimeSlot; 3] = [TimeSlot::Morning, TimeSlot::Midday, TimeSlot::Evening];

    /// Slots open to part-time contracts; always part of a model's universe.
    pub const LATE: [TimeSlot; 2] = [TimeSlot::Afternoon, TimeSlot::Night];

    pub fn start(self) -> Minutes {
        match self {
            TimeSlot::Morning => 8 * 60,
            TimeSlot::Midday => 12 * 60,
            TimeSlot::Evening => 16 * 60,
            TimeSlot::Afternoon => 14 * 60,
            TimeSlot::Night => 18 * 60,
        }
    }

    pub fn end(self) -> Minutes {
        self.start() + 4 * 60
    }

    pub fn minutes(self) -> Minutes {
        self.end() - self.start()
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeSlot::Morning => "08:00-12:00",
            TimeSlot::Midday => "12:00-16:00",
            TimeSlot::Evening => "16:00-20:00",
            TimeSlot::Afternoon => "14:00-18:00",
            TimeSlot::Night => "18:00-22:00",
        }
    }

    pub fn overlaps(self, other: TimeSlot) -> bool {
        intervals_overlap(self.start(), self.end(), other.start(), other.end())
    }

    pub fn contains(self, instant: Minutes) -> bool {
        self.start() <= instant && instant < self.end()
    }

    /// Finds the slot with exactly this interval.
    pub fn from_interval(start: Minutes, end: Minutes) -> Option<TimeSlot> {
        TimeSlot::ALL
            .into_iter()
            .find(|s| s.start() == start && s.end() == end)
    }

    /// Caller slots plus the late slots, deduplicated, in canonical order.
    pub fn universe(requested: &[TimeSlot]) -> Vec<TimeSlot> {
        TimeSlot::ALL
            .into_iter()
            .filter(|s| requested.contains(s) || TimeSlot::LATE.contains(s))
            .collect()
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Half-open interval intersection.
pub fn intervals_overlap(a_start: Minutes, a_end: Minutes, b_start: Minutes, b_end: Minutes) -> bool {
    a_start < b_end && b_start < a_end
}

/// Parses `HH:MM` into minutes since midnight.
pub fn parse_clock(text: &str) -> Option<Minutes> {
    let (hours, minutes) = text.split_once(':')?;
    let hours: Minutes = hours.trim().parse().ok()?;
    let minutes: Minutes = minutes.trim().parse().ok()?;
    if hours >= 24 || minutes >= 60 {
        return None;
    }
    Some(hours * 60 + minutes)
}

pub fn format_clock(minutes: Minutes) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// A department that owns doctors and rooms.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Department {
    pub name: String,
    pub location: Option<String>,
    pub branch: Option<String>,
}

/// A doctor as read from the store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    pub id: DoctorId,
    pub name: String,
    pub department: String,
    pub contract_type: ContractType,
    pub designation: Option<String>,
}

/// A physical room owned by a department.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Room {
    pub name: String,
    pub department: String,
}

/// "Doctor works this room during this slot on this day."
///
/// Field order gives the deterministic tie-break order: doctor id, day, room name, slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub doctor_id: DoctorId,
    pub day: Day,
    pub room: String,
    pub time_slot: TimeSlot,
    pub doctor: String,
}

/// A schedule entry joined with its shift and doctor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledShift {
    pub entry_id: EntryId,
    pub shift_id: ShiftId,
    pub doctor_id: DoctorId,
    pub contract_type: ContractType,
    pub day: Day,
    pub room: String,
    pub start: Minutes,
    pub end: Minutes,
}

impl ScheduledShift {
    pub fn minutes(&self) -> Minutes {
        self.end.saturating_sub(self.start)
    }

    pub fn slot(&self) -> Option<TimeSlot> {
        TimeSlot::from_interval(self.start, self.end)
    }

    pub fn overlaps(&self, other: &ScheduledShift) -> bool {
        intervals_overlap(self.start, self.end, other.start, other.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_labels_round_trip_through_serde() {
        let json = serde_json::to_string(&TimeSlot::Afternoon).unwrap();
        assert_eq!(json, "\"14:00-18:00\"");
        let back: TimeSlot = serde_json::from_str("\"18:00-22:00\"").unwrap();
        assert_eq!(back, TimeSlot::Night);
    }

    #[test]
    fn friday_is_not_a_working_day() {
        assert!("Friday".parse::<Day>().is_err());
        assert!(serde_json::from_str::<Day>("\"Friday\"").is_err());
        assert_eq!("Thursday".parse::<Day>(), Ok(Day::Thursday));
    }

    #[test]
    fn overlapping_slots_use_time_not_labels() {
        assert!(TimeSlot::Midday.overlaps(TimeSlot::Afternoon));
        assert!(TimeSlot::Evening.overlaps(TimeSlot::Night));
        assert!(!TimeSlot::Morning.overlaps(TimeSlot::Midday));
        assert!(!TimeSlot::Afternoon.overlaps(TimeSlot::Night));
    }

    #[test]
    fn universe_always_contains_late_slots() {
        assert_eq!(
            TimeSlot::universe(&TimeSlot::BASE),
            TimeSlot::ALL.to_vec()
        );
        assert_eq!(
            TimeSlot::universe(&[TimeSlot::Morning]),
            vec![TimeSlot::Morning, TimeSlot::Afternoon, TimeSlot::Night]
        );
    }

    #[test]
    fn clock_parsing() {
        assert_eq!(parse_clock("08:00"), Some(480));
        assert_eq!(parse_clock("22:00"), Some(1320));
        assert_eq!(parse_clock("24:00"), None);
        assert_eq!(parse_clock("8"), None);
        assert_eq!(format_clock(14 * 60), "14:00");
    }

    #[test]
    fn assignments_sort_in_tie_break_order() {
        let make = |doctor_id, day, room: &str, time_slot| Assignment {
            doctor_id,
            day,
            room: room.to_string(),
            time_slot,
            doctor: format!("Dr {doctor_id}"),
        };
        let mut list = vec![
            make(2, Day::Saturday, "A", TimeSlot::Morning),
            make(1, Day::Monday, "A", TimeSlot::Morning),
            make(1, Day::Saturday, "B", TimeSlot::Morning),
            make(1, Day::Saturday, "A", TimeSlot::Afternoon),
            make(1, Day::Saturday, "A", TimeSlot::Evening),
        ];
        list.sort();
        let keys: Vec<_> = list
            .iter()
            .map(|a| (a.doctor_id, a.day, a.room.as_str(), a.time_slot))
            .collect();
        assert_eq!(
            keys,
            vec![
                (1, Day::Saturday, "A", TimeSlot::Evening),
                (1, Day::Saturday, "A", TimeSlot::Afternoon),
                (1, Day::Saturday, "B", TimeSlot::Morning),
                (1, Day::Monday, "A", TimeSlot::Morning),
                (2, Day::Saturday, "A", TimeSlot::Morning),
            ]
        );
    }
}
