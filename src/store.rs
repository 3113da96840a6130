//! SQLite persistence store: rosters, materialized shifts and schedule entries.
//!
//! Every connection is opened with foreign keys on and a busy timeout, and the
//! schema is created on open. Writes of shift/entry pairs go through a
//! [`UnitOfWork`], which is a single SQLite transaction.

use crate::data::{
    format_clock, parse_clock, ContractType, Day, Department, Doctor, DoctorId, EntryId, Minutes,
    Room, ScheduledShift, ShiftId,
};
use crate::error::{StoreError, StoreResult};
use log::{debug, trace};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use std::time::Duration;

pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS department (
    id          INTEGER PRIMARY KEY,
    name        TEXT NOT NULL UNIQUE,
    location    TEXT,
    branch      TEXT
);
CREATE TABLE IF NOT EXISTS doctor (
    id            INTEGER PRIMARY KEY,
    name          TEXT NOT NULL,
    department    TEXT NOT NULL,
    designation   TEXT,
    contract_type TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS room (
    id              INTEGER PRIMARY KEY,
    room_name       TEXT NOT NULL,
    department_name TEXT NOT NULL,
    UNIQUE (room_name, department_name)
);
CREATE TABLE IF NOT EXISTS shift (
    id          INTEGER PRIMARY KEY,
    start_time  TEXT NOT NULL,
    end_time    TEXT NOT NULL,
    shift_type  TEXT NOT NULL,
    doctor_id   INTEGER NOT NULL REFERENCES doctor(id) ON DELETE CASCADE
);
CREATE TABLE IF NOT EXISTS schedule_entry (
    id        INTEGER PRIMARY KEY,
    day       TEXT NOT NULL,
    room      TEXT NOT NULL,
    shift_id  INTEGER NOT NULL REFERENCES shift(id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_schedule_entry_day_room ON schedule_entry(day, room);
CREATE INDEX IF NOT EXISTS idx_shift_doctor ON shift(doctor_id);
"#;

/// Optional filters for [`Store::scheduled_shifts`].
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub department: Option<String>,
    pub day: Option<Day>,
    pub room: Option<String>,
    pub doctor_id: Option<DoctorId>,
}

impl EntryFilter {
    pub fn department(name: &str) -> Self {
        Self {
            department: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn doctor(doctor_id: DoctorId) -> Self {
        Self {
            doctor_id: Some(doctor_id),
            ..Self::default()
        }
    }
}

pub struct Store {
    conn: Connection,
}

impl Store {
    /// Opens (or creates) the database at `path`.
    pub fn open(path: &str) -> StoreResult<Self> {
        debug!("Opening schedule store at {path}");
        Self::configure(Connection::open(path)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn add_department(&self, department: &Department) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO department (name, location, branch) VALUES (?1, ?2, ?3)",
            params![department.name, department.location, department.branch],
        )?;
        Ok(())
    }

    pub fn find_department(&self, name: &str) -> StoreResult<Option<Department>> {
        let department = self
            .conn
            .query_row(
                "SELECT name, location, branch FROM department WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Department {
                        name: row.get(0)?,
                        location: row.get(1)?,
                        branch: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(department)
    }

    pub fn add_doctor(
        &self,
        name: &str,
        department: &str,
        contract_type: ContractType,
        designation: Option<&str>,
    ) -> StoreResult<Doctor> {
        self.conn.execute(
            "INSERT INTO doctor (name, department, designation, contract_type) VALUES (?1, ?2, ?3, ?4)",
            params![name, department, designation, contract_type.as_str()],
        )?;
        Ok(Doctor {
            id: self.conn.last_insert_rowid(),
            name: name.to_string(),
            department: department.to_string(),
            contract_type,
            designation: designation.map(str::to_string),
        })
    }

    pub fn add_room(&self, room: &Room) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO room (room_name, department_name) VALUES (?1, ?2)",
            params![room.name, room.department],
        )?;
        Ok(())
    }

    pub fn find_doctor(&self, doctor_id: DoctorId) -> StoreResult<Option<Doctor>> {
        let raw = self
            .conn
            .query_row(
                "SELECT id, name, department, designation, contract_type FROM doctor WHERE id = ?1",
                params![doctor_id],
                raw_doctor,
            )
            .optional()?;
        raw.map(RawDoctor::into_doctor).transpose()
    }

    /// Doctors of a department ordered by id.
    pub fn doctors_in_department(&self, department: &str) -> StoreResult<Vec<Doctor>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, department, designation, contract_type FROM doctor \
             WHERE department = ?1 ORDER BY id",
        )?;
        let raws = stmt
            .query_map(params![department], raw_doctor)?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawDoctor::into_doctor).collect()
    }

    /// Rooms of a department ordered by name.
    pub fn rooms_in_department(&self, department: &str) -> StoreResult<Vec<Room>> {
        let mut stmt = self.conn.prepare(
            "SELECT room_name, department_name FROM room WHERE department_name = ?1 ORDER BY room_name",
        )?;
        let rooms = stmt
            .query_map(params![department], |row| {
                Ok(Room {
                    name: row.get(0)?,
                    department: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rooms)
    }

    /// Schedule entries joined with their shift and doctor, ordered by entry id.
    pub fn scheduled_shifts(&self, filter: &EntryFilter) -> StoreResult<Vec<ScheduledShift>> {
        let mut sql = String::from(
            "SELECT e.id, s.id, d.id, d.contract_type, e.day, e.room, s.start_time, s.end_time \
             FROM schedule_entry e \
             JOIN shift s ON s.id = e.shift_id \
             JOIN doctor d ON d.id = s.doctor_id \
             WHERE 1 = 1",
        );
        let mut values: Vec<Value> = Vec::new();
        if let Some(department) = &filter.department {
            values.push(Value::Text(department.clone()));
            sql.push_str(&format!(" AND d.department = ?{}", values.len()));
        }
        if let Some(day) = filter.day {
            values.push(Value::Text(day.as_str().to_string()));
            sql.push_str(&format!(" AND e.day = ?{}", values.len()));
        }
        if let Some(room) = &filter.room {
            values.push(Value::Text(room.clone()));
            sql.push_str(&format!(" AND e.room = ?{}", values.len()));
        }
        if let Some(doctor_id) = filter.doctor_id {
            values.push(Value::Integer(doctor_id));
            sql.push_str(&format!(" AND d.id = ?{}", values.len()));
        }
        sql.push_str(" ORDER BY e.id");
        trace!("scheduled_shifts query: {sql}");

        let mut stmt = self.conn.prepare(&sql)?;
        let raws = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok(RawScheduledShift {
                    entry_id: row.get(0)?,
                    shift_id: row.get(1)?,
                    doctor_id: row.get(2)?,
                    contract_type: row.get(3)?,
                    day: row.get(4)?,
                    room: row.get(5)?,
                    start_time: row.get(6)?,
                    end_time: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        raws.into_iter().map(RawScheduledShift::into_scheduled).collect()
    }

    /// Records a single shift/entry pair outside the optimizer, e.g. a manual edit.
    pub fn record_shift(
        &mut self,
        doctor_id: DoctorId,
        day: Day,
        room: &str,
        start: Minutes,
        end: Minutes,
        shift_type: &str,
    ) -> StoreResult<(ShiftId, EntryId)> {
        let uow = self.unit_of_work()?;
        let shift_id = uow.insert_shift(doctor_id, start, end, shift_type)?;
        let entry_id = uow.insert_entry(day, room, shift_id)?;
        uow.commit()?;
        Ok((shift_id, entry_id))
    }

    pub fn count_rows(&self, table: StoreTable) -> StoreResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.name());
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    /// Starts an explicit unit of work. Dropping it without [`UnitOfWork::commit`] rolls back.
    pub fn unit_of_work(&mut self) -> StoreResult<UnitOfWork<'_>> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| StoreError::Transaction(e.to_string()))?;
        Ok(UnitOfWork { tx })
    }
}

#[derive(Debug, Clone, Copy)]
pub enum StoreTable {
    Shift,
    ScheduleEntry,
}

impl StoreTable {
    fn name(self) -> &'static str {
        match self {
            StoreTable::Shift => "shift",
            StoreTable::ScheduleEntry => "schedule_entry",
        }
    }
}

/// One atomic batch of shift/entry inserts.
pub struct UnitOfWork<'conn> {
    tx: Transaction<'conn>,
}

impl UnitOfWork<'_> {
    pub fn insert_shift(
        &self,
        doctor_id: DoctorId,
        start: Minutes,
        end: Minutes,
        shift_type: &str,
    ) -> StoreResult<ShiftId> {
        self.tx.execute(
            "INSERT INTO shift (start_time, end_time, shift_type, doctor_id) VALUES (?1, ?2, ?3, ?4)",
            params![format_clock(start), format_clock(end), shift_type, doctor_id],
        )?;
        Ok(self.tx.last_insert_rowid())
    }

    pub fn insert_entry(&self, day: Day, room: &str, shift_id: ShiftId) -> StoreResult<EntryId> {
        self.tx.execute(
            "INSERT INTO schedule_entry (day, room, shift_id) VALUES (?1, ?2, ?3)",
            params![day.as_str(), room, shift_id],
        )?;
        Ok(self.tx.last_insert_rowid())
    }

    pub fn commit(self) -> StoreResult<()> {
        self.tx
            .commit()
            .map_err(|e| StoreError::Transaction(e.to_string()))
    }
}

struct RawDoctor {
    id: DoctorId,
    name: String,
    department: String,
    designation: Option<String>,
    contract_type: String,
}

fn raw_doctor(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDoctor> {
    Ok(RawDoctor {
        id: row.get(0)?,
        name: row.get(1)?,
        department: row.get(2)?,
        designation: row.get(3)?,
        contract_type: row.get(4)?,
    })
}

impl RawDoctor {
    fn into_doctor(self) -> StoreResult<Doctor> {
        let contract_type = self
            .contract_type
            .parse()
            .map_err(|_| StoreError::CorruptValue {
                column: "doctor.contract_type",
                value: self.contract_type.clone(),
            })?;
        Ok(Doctor {
            id: self.id,
            name: self.name,
            department: self.department,
            contract_type,
            designation: self.designation,
        })
    }
}

struct RawScheduledShift {
    entry_id: EntryId,
    shift_id: ShiftId,
    doctor_id: DoctorId,
    contract_type: String,
    day: String,
    room: String,
    start_time: String,
    end_time: String,
}

impl RawScheduledShift {
    fn into_scheduled(self) -> StoreResult<ScheduledShift> {
        let corrupt = |column: &'static str, value: &str| StoreError::CorruptValue {
            column,
            value: value.to_string(),
        };
        Ok(ScheduledShift {
            entry_id: self.entry_id,
            shift_id: self.shift_id,
            doctor_id: self.doctor_id,
            contract_type: self
                .contract_type
                .parse()
                .map_err(|_| corrupt("doctor.contract_type", &self.contract_type))?,
            day: self
                .day
                .parse()
                .map_err(|_| corrupt("schedule_entry.day", &self.day))?,
            room: self.room,
            start: parse_clock(&self.start_time)
                .ok_or_else(|| corrupt("shift.start_time", &self.start_time))?,
            end: parse_clock(&self.end_time)
                .ok_or_else(|| corrupt("shift.end_time", &self.end_time))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (Store, Doctor, Doctor) {
        let store = Store::open_in_memory().unwrap();
        store
            .add_department(&Department {
                name: "Cardiology".into(),
                location: Some("North wing".into()),
                branch: None,
            })
            .unwrap();
        let full = store
            .add_doctor("Dr Amal", "Cardiology", ContractType::FullTime, Some("Consultant"))
            .unwrap();
        let part = store
            .add_doctor("Dr Basel", "Cardiology", ContractType::PartTime, None)
            .unwrap();
        store
            .add_doctor("Dr Carim", "Neurology", ContractType::FullTime, None)
            .unwrap();
        for name in ["Room 2", "Room 1"] {
            store
                .add_room(&Room {
                    name: name.into(),
                    department: "Cardiology".into(),
                })
                .unwrap();
        }
        (store, full, part)
    }

    #[test]
    fn rosters_are_department_scoped_and_ordered() {
        let (store, full, part) = seeded();
        let doctors = store.doctors_in_department("Cardiology").unwrap();
        assert_eq!(doctors, vec![full, part]);
        let rooms: Vec<_> = store
            .rooms_in_department("Cardiology")
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(rooms, vec!["Room 1", "Room 2"]);
        assert!(store.find_department("Oncology").unwrap().is_none());
    }

    #[test]
    fn filters_compose_on_joined_entries() {
        let (mut store, full, part) = seeded();
        store
            .record_shift(full.id, Day::Monday, "Room 1", 480, 720, "Manual")
            .unwrap();
        store
            .record_shift(part.id, Day::Monday, "Room 2", 840, 1080, "Manual")
            .unwrap();
        store
            .record_shift(part.id, Day::Sunday, "Room 2", 840, 1080, "Manual")
            .unwrap();

        let all = store
            .scheduled_shifts(&EntryFilter::department("Cardiology"))
            .unwrap();
        assert_eq!(all.len(), 3);

        let monday_room_two = store
            .scheduled_shifts(&EntryFilter {
                day: Some(Day::Monday),
                room: Some("Room 2".into()),
                ..EntryFilter::default()
            })
            .unwrap();
        assert_eq!(monday_room_two.len(), 1);
        assert_eq!(monday_room_two[0].doctor_id, part.id);
        assert_eq!(monday_room_two[0].contract_type, ContractType::PartTime);
        assert_eq!((monday_room_two[0].start, monday_room_two[0].end), (840, 1080));

        let by_doctor = store.scheduled_shifts(&EntryFilter::doctor(full.id)).unwrap();
        assert_eq!(by_doctor.len(), 1);
    }

    #[test]
    fn dropped_unit_of_work_rolls_back() {
        let (mut store, full, _) = seeded();
        {
            let uow = store.unit_of_work().unwrap();
            uow.insert_shift(full.id, 480, 720, "Optimized").unwrap();
        }
        assert_eq!(store.count_rows(StoreTable::Shift).unwrap(), 0);
    }

    #[test]
    fn shift_for_unknown_doctor_is_rejected() {
        let (mut store, _, _) = seeded();
        let err = store
            .record_shift(999, Day::Monday, "Room 1", 480, 720, "Manual")
            .unwrap_err();
        assert!(matches!(err, StoreError::ForeignKeyViolation(_) | StoreError::Query(_)));
        assert_eq!(store.count_rows(StoreTable::Shift).unwrap(), 0);
    }
}
