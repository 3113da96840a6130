//! Checks whether a materialized schedule already satisfies every hard rule.

use crate::data::{ContractType, Day, DoctorId, EntryId, Minutes, ScheduledShift, TimeSlot};
use itertools::Itertools;
use log::debug;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

pub const FULL_TIME_DAILY_MINUTES: Minutes = 480;
pub const PART_TIME_DAILY_MINUTES: [Minutes; 2] = [240, 300];
pub const PART_TIME_EARLIEST_START: Minutes = 14 * 60;
/// Most distinct full-time doctors one room hosts on one day.
pub const ROOM_FULL_TIME_CAPACITY: usize = 1;
/// Most distinct part-time doctors one room hosts on one day.
pub const ROOM_PART_TIME_CAPACITY: usize = 2;

/// The first rule a schedule was found to break.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    RoomOverlap { entry: EntryId, other: EntryId },
    RoomCapacity { day: Day, room: String, contract: ContractType, doctors: usize },
    OutsideSlotUniverse { entry: EntryId },
    FullTimeHours { doctor: DoctorId, day: Day, minutes: Minutes },
    FullTimePattern { doctor: DoctorId, day: Day },
    PartTimeTooEarly { entry: EntryId },
    PartTimeHours { doctor: DoctorId, day: Day, minutes: Minutes },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::RoomOverlap { entry, other } => {
                write!(f, "entry {entry} overlaps entry {other} in the same room")
            }
            Violation::RoomCapacity { day, room, contract, doctors } => write!(
                f,
                "room {room} hosts {doctors} {} doctors on {day}",
                contract.as_str()
            ),
            Violation::OutsideSlotUniverse { entry } => {
                write!(f, "entry {entry} does not match any allowed time slot")
            }
            Violation::FullTimeHours { doctor, day, minutes } => write!(
                f,
                "full-time doctor {doctor} works {minutes} minutes on {day}, expected {FULL_TIME_DAILY_MINUTES}"
            ),
            Violation::FullTimePattern { doctor, day } => {
                write!(f, "full-time doctor {doctor} has an invalid slot pair on {day}")
            }
            Violation::PartTimeTooEarly { entry } => {
                write!(f, "part-time entry {entry} starts before 14:00")
            }
            Violation::PartTimeHours { doctor, day, minutes } => write!(
                f,
                "part-time doctor {doctor} works {minutes} minutes on {day}, expected 240 or 300"
            ),
        }
    }
}

/// Two entries booked into the same room at intersecting times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub day: Day,
    pub room: String,
    pub entry_id: EntryId,
    pub conflicting_entry_id: EntryId,
}

/// True when the scoped schedule is non-empty and breaks no hard rule.
///
/// Entries are scoped to `days` and `rooms`; `slots` is widened with the
/// part-time slots the same way the model builder widens it.
pub fn is_valid(
    entries: &[ScheduledShift],
    days: &[Day],
    rooms: &[String],
    slots: &[TimeSlot],
) -> bool {
    let scoped = scope(entries, days, rooms);
    if scoped.is_empty() {
        debug!("No scheduled entries in scope; schedule is not optimized");
        return false;
    }
    match check(&scoped, &TimeSlot::universe(slots)) {
        Some(violation) => {
            debug!("Schedule is not valid: {violation}");
            false
        }
        None => true,
    }
}

/// First violation among the scoped entries, if any.
pub fn first_violation(
    entries: &[ScheduledShift],
    days: &[Day],
    rooms: &[String],
    slots: &[TimeSlot],
) -> Option<Violation> {
    check(&scope(entries, days, rooms), &TimeSlot::universe(slots))
}

/// Every pair of entries sharing a (day, room) with intersecting intervals.
pub fn find_conflicts(entries: &[ScheduledShift]) -> Vec<Conflict> {
    let refs: Vec<&ScheduledShift> = entries.iter().collect();
    by_day_room(&refs)
        .into_iter()
        .sorted_by(|a, b| a.0.cmp(&b.0))
        .flat_map(|((day, room), group)| {
            overlapping_pairs(group)
                .into_iter()
                .map(move |(a, b)| Conflict {
                    day,
                    room: room.to_string(),
                    entry_id: a.entry_id,
                    conflicting_entry_id: b.entry_id,
                })
        })
        .collect()
}

fn scope<'a>(
    entries: &'a [ScheduledShift],
    days: &[Day],
    rooms: &[String],
) -> Vec<&'a ScheduledShift> {
    entries
        .iter()
        .filter(|e| days.contains(&e.day) && rooms.iter().any(|r| *r == e.room))
        .collect()
}

fn check(entries: &[&ScheduledShift], universe: &[TimeSlot]) -> Option<Violation> {
    for ((day, room), group) in by_day_room(entries).into_iter().sorted_by(|a, b| a.0.cmp(&b.0)) {
        for (contract, capacity) in [
            (ContractType::FullTime, ROOM_FULL_TIME_CAPACITY),
            (ContractType::PartTime, ROOM_PART_TIME_CAPACITY),
        ] {
            let doctors = group
                .iter()
                .filter(|e| e.contract_type == contract)
                .map(|e| e.doctor_id)
                .unique()
                .count();
            if doctors > capacity {
                return Some(Violation::RoomCapacity {
                    day,
                    room: room.to_string(),
                    contract,
                    doctors,
                });
            }
        }
        if let Some((a, b)) = overlapping_pairs(group).into_iter().next() {
            return Some(Violation::RoomOverlap {
                entry: a.entry_id,
                other: b.entry_id,
            });
        }
    }

    let daily: HashMap<(DoctorId, Day), Vec<&ScheduledShift>> = entries
        .iter()
        .map(|e| ((e.doctor_id, e.day), *e))
        .into_group_map();

    for entry in entries {
        let Some(slot) = entry.slot().filter(|s| universe.contains(s)) else {
            return Some(Violation::OutsideSlotUniverse {
                entry: entry.entry_id,
            });
        };
        let same_day = &daily[&(entry.doctor_id, entry.day)];
        let minutes: Minutes = same_day.iter().map(|e| e.minutes()).sum();

        match entry.contract_type {
            ContractType::FullTime => {
                if minutes != FULL_TIME_DAILY_MINUTES {
                    return Some(Violation::FullTimeHours {
                        doctor: entry.doctor_id,
                        day: entry.day,
                        minutes,
                    });
                }
                let pair: Vec<TimeSlot> = same_day.iter().filter_map(|e| e.slot()).sorted().collect();
                if !is_full_time_pair(entry.day, &pair) {
                    return Some(Violation::FullTimePattern {
                        doctor: entry.doctor_id,
                        day: entry.day,
                    });
                }
            }
            ContractType::PartTime => {
                if slot.start() < PART_TIME_EARLIEST_START {
                    return Some(Violation::PartTimeTooEarly {
                        entry: entry.entry_id,
                    });
                }
                if !PART_TIME_DAILY_MINUTES.contains(&minutes) {
                    return Some(Violation::PartTimeHours {
                        doctor: entry.doctor_id,
                        day: entry.day,
                        minutes,
                    });
                }
            }
        }
    }
    None
}

/// The slot pairs a full-time doctor may work on `day`, sorted in canonical order.
pub fn full_time_pairs(day: Day) -> &'static [[TimeSlot; 2]] {
    if day == Day::Thursday {
        &[[TimeSlot::Morning, TimeSlot::Night]]
    } else {
        &[
            [TimeSlot::Morning, TimeSlot::Midday],
            [TimeSlot::Morning, TimeSlot::Evening],
        ]
    }
}

fn is_full_time_pair(day: Day, sorted_slots: &[TimeSlot]) -> bool {
    full_time_pairs(day)
        .iter()
        .any(|pair| pair.as_slice() == sorted_slots)
}

fn by_day_room<'a>(
    entries: &[&'a ScheduledShift],
) -> HashMap<(Day, &'a str), Vec<&'a ScheduledShift>> {
    entries
        .iter()
        .map(|e| ((e.day, e.room.as_str()), *e))
        .into_group_map()
}

/// Sweep over one (day, room) group sorted by start time.
fn overlapping_pairs(
    mut group: Vec<&ScheduledShift>,
) -> Vec<(&ScheduledShift, &ScheduledShift)> {
    group.sort_by_key(|e| (e.start, e.end, e.entry_id));
    let mut pairs = Vec::new();
    for (i, current) in group.iter().enumerate() {
        for next in &group[i + 1..] {
            if next.start >= current.end {
                break;
            }
            if next.entry_id != current.entry_id && current.overlaps(next) {
                pairs.push((*current, *next));
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(
        entry_id: EntryId,
        doctor_id: DoctorId,
        contract_type: ContractType,
        day: Day,
        room: &str,
        slot: TimeSlot,
    ) -> ScheduledShift {
        ScheduledShift {
            entry_id,
            shift_id: entry_id,
            doctor_id,
            contract_type,
            day,
            room: room.to_string(),
            start: slot.start(),
            end: slot.end(),
        }
    }

    fn rooms() -> Vec<String> {
        vec!["A".to_string(), "B".to_string()]
    }

    use ContractType::{FullTime, PartTime};

    #[test]
    fn straight_and_split_full_time_days_are_valid() {
        let entries = vec![
            entry(1, 1, FullTime, Day::Monday, "A", TimeSlot::Morning),
            entry(2, 1, FullTime, Day::Monday, "A", TimeSlot::Midday),
            entry(3, 2, FullTime, Day::Monday, "B", TimeSlot::Morning),
            entry(4, 2, FullTime, Day::Monday, "B", TimeSlot::Evening),
        ];
        assert!(is_valid(&entries, &Day::ALL, &rooms(), &TimeSlot::BASE));
    }

    #[test]
    fn overlapping_intervals_in_one_room_are_invalid_even_with_different_labels() {
        let entries = vec![
            entry(1, 1, FullTime, Day::Monday, "A", TimeSlot::Morning),
            entry(2, 1, FullTime, Day::Monday, "A", TimeSlot::Midday),
            entry(3, 2, PartTime, Day::Monday, "A", TimeSlot::Afternoon),
        ];
        assert_eq!(
            first_violation(&entries, &Day::ALL, &rooms(), &TimeSlot::BASE),
            Some(Violation::RoomOverlap { entry: 2, other: 3 })
        );
        assert!(!is_valid(&entries, &Day::ALL, &rooms(), &TimeSlot::BASE));
    }

    #[test]
    fn touching_intervals_do_not_overlap() {
        let entries = vec![
            entry(1, 1, PartTime, Day::Sunday, "A", TimeSlot::Afternoon),
            entry(2, 2, PartTime, Day::Sunday, "A", TimeSlot::Night),
        ];
        assert!(is_valid(&entries, &Day::ALL, &rooms(), &TimeSlot::BASE));
    }

    #[test]
    fn thursday_requires_the_exact_morning_and_night_pair() {
        let split = vec![
            entry(1, 1, FullTime, Day::Thursday, "A", TimeSlot::Morning),
            entry(2, 1, FullTime, Day::Thursday, "A", TimeSlot::Evening),
        ];
        assert_eq!(
            first_violation(&split, &Day::ALL, &rooms(), &TimeSlot::BASE),
            Some(Violation::FullTimePattern { doctor: 1, day: Day::Thursday })
        );

        let thursday = vec![
            entry(1, 1, FullTime, Day::Thursday, "A", TimeSlot::Morning),
            entry(2, 1, FullTime, Day::Thursday, "A", TimeSlot::Night),
        ];
        assert!(is_valid(&thursday, &Day::ALL, &rooms(), &TimeSlot::BASE));
    }

    #[test]
    fn second_full_time_doctor_in_a_room_exceeds_capacity() {
        // no interval overlaps, but room A hosts both full-time doctors
        let entries = vec![
            entry(1, 1, FullTime, Day::Monday, "A", TimeSlot::Morning),
            entry(2, 1, FullTime, Day::Monday, "B", TimeSlot::Midday),
            entry(3, 2, FullTime, Day::Monday, "B", TimeSlot::Morning),
            entry(4, 2, FullTime, Day::Monday, "A", TimeSlot::Evening),
        ];
        assert!(find_conflicts(&entries).is_empty());
        assert_eq!(
            first_violation(&entries, &[Day::Monday], &rooms(), &TimeSlot::BASE),
            Some(Violation::RoomCapacity {
                day: Day::Monday,
                room: "A".to_string(),
                contract: FullTime,
                doctors: 2,
            })
        );
        assert!(!is_valid(&entries, &[Day::Monday], &rooms(), &TimeSlot::BASE));
    }

    #[test]
    fn third_part_time_doctor_in_a_room_exceeds_capacity() {
        let two = vec![
            entry(1, 1, PartTime, Day::Sunday, "A", TimeSlot::Afternoon),
            entry(2, 2, PartTime, Day::Sunday, "A", TimeSlot::Night),
        ];
        assert!(is_valid(&two, &Day::ALL, &rooms(), &TimeSlot::BASE));

        let mut three = two;
        three.push(entry(3, 3, PartTime, Day::Sunday, "A", TimeSlot::Evening));
        assert!(matches!(
            first_violation(&three, &Day::ALL, &rooms(), &TimeSlot::BASE),
            Some(Violation::RoomCapacity { doctors: 3, contract: PartTime, .. })
        ));
    }

    #[test]
    fn full_time_half_day_is_invalid() {
        let entries = vec![entry(1, 1, FullTime, Day::Monday, "A", TimeSlot::Morning)];
        assert_eq!(
            first_violation(&entries, &Day::ALL, &rooms(), &TimeSlot::BASE),
            Some(Violation::FullTimeHours { doctor: 1, day: Day::Monday, minutes: 240 })
        );
    }

    #[test]
    fn part_time_before_two_pm_is_invalid() {
        let entries = vec![entry(1, 1, PartTime, Day::Monday, "A", TimeSlot::Morning)];
        assert_eq!(
            first_violation(&entries, &Day::ALL, &rooms(), &TimeSlot::BASE),
            Some(Violation::PartTimeTooEarly { entry: 1 })
        );
    }

    #[test]
    fn part_time_double_slot_exceeds_daily_hours() {
        let entries = vec![
            entry(1, 1, PartTime, Day::Monday, "A", TimeSlot::Afternoon),
            entry(2, 1, PartTime, Day::Monday, "B", TimeSlot::Night),
        ];
        assert_eq!(
            first_violation(&entries, &Day::ALL, &rooms(), &TimeSlot::BASE),
            Some(Violation::PartTimeHours { doctor: 1, day: Day::Monday, minutes: 480 })
        );
    }

    #[test]
    fn off_grid_intervals_are_rejected() {
        let mut odd = entry(1, 1, PartTime, Day::Monday, "A", TimeSlot::Afternoon);
        odd.start = 15 * 60;
        odd.end = 19 * 60;
        assert_eq!(
            first_violation(&[odd], &Day::ALL, &rooms(), &TimeSlot::BASE),
            Some(Violation::OutsideSlotUniverse { entry: 1 })
        );
    }

    #[test]
    fn empty_scope_is_not_optimized() {
        let entries = vec![entry(1, 1, PartTime, Day::Monday, "Z", TimeSlot::Afternoon)];
        assert!(!is_valid(&entries, &Day::ALL, &rooms(), &TimeSlot::BASE));
        assert!(!is_valid(&[], &Day::ALL, &rooms(), &TimeSlot::BASE));
    }

    #[test]
    fn conflicts_list_every_overlapping_pair() {
        let entries = vec![
            entry(1, 1, FullTime, Day::Monday, "A", TimeSlot::Midday),
            entry(2, 2, PartTime, Day::Monday, "A", TimeSlot::Afternoon),
            entry(3, 3, FullTime, Day::Monday, "A", TimeSlot::Evening),
            entry(4, 4, PartTime, Day::Monday, "B", TimeSlot::Afternoon),
        ];
        let pairs: Vec<_> = find_conflicts(&entries)
            .into_iter()
            .map(|c| (c.entry_id, c.conflicting_entry_id))
            .collect();
        assert_eq!(pairs, vec![(1, 2), (2, 3)]);
    }
}
