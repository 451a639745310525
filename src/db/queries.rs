use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{ActivityEvent, Appointment, AppointmentStatus, Client, Vehicle};

const DT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── Clients ──

pub fn create_client(conn: &Connection, client: &Client) -> anyhow::Result<()> {
    let created_at = client.created_at.format(DT_FORMAT).to_string();
    conn.execute(
        "INSERT INTO clients (id, name, phone, email, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![client.id, client.name, client.phone, client.email, created_at],
    )?;
    Ok(())
}

pub fn get_client(conn: &Connection, id: &str) -> anyhow::Result<Option<Client>> {
    let result = conn.query_row(
        "SELECT id, name, phone, email, created_at FROM clients WHERE id = ?1",
        params![id],
        |row| Ok(parse_client_row(row)),
    );

    match result {
        Ok(client) => Ok(Some(client?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_clients(conn: &Connection, limit: i64) -> anyhow::Result<Vec<Client>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, phone, email, created_at FROM clients ORDER BY created_at DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], |row| Ok(parse_client_row(row)))?;

    let mut clients = vec![];
    for row in rows {
        clients.push(row??);
    }
    Ok(clients)
}

fn parse_client_row(row: &rusqlite::Row) -> anyhow::Result<Client> {
    let id: String = row.get(0)?;
    let name: String = row.get(1)?;
    let phone: Option<String> = row.get(2)?;
    let email: Option<String> = row.get(3)?;
    let created_at_str: String = row.get(4)?;

    let created_at = NaiveDateTime::parse_from_str(&created_at_str, DT_FORMAT)
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(Client {
        id,
        name,
        phone,
        email,
        created_at,
    })
}

// ── Vehicles ──

pub fn create_vehicle(conn: &Connection, vehicle: &Vehicle) -> anyhow::Result<()> {
    let created_at = vehicle.created_at.format(DT_FORMAT).to_string();
    conn.execute(
        "INSERT INTO vehicles (id, client_id, make, model, plate, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            vehicle.id,
            vehicle.client_id,
            vehicle.make,
            vehicle.model,
            vehicle.plate,
            created_at,
        ],
    )?;
    Ok(())
}

pub fn get_vehicle(conn: &Connection, id: &str) -> anyhow::Result<Option<Vehicle>> {
    let result = conn.query_row(
        "SELECT id, client_id, make, model, plate, created_at FROM vehicles WHERE id = ?1",
        params![id],
        |row| Ok(parse_vehicle_row(row)),
    );

    match result {
        Ok(vehicle) => Ok(Some(vehicle?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_vehicle_row(row: &rusqlite::Row) -> anyhow::Result<Vehicle> {
    let id: String = row.get(0)?;
    let client_id: String = row.get(1)?;
    let make: String = row.get(2)?;
    let model: String = row.get(3)?;
    let plate: Option<String> = row.get(4)?;
    let created_at_str: String = row.get(5)?;

    let created_at = NaiveDateTime::parse_from_str(&created_at_str, DT_FORMAT)
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(Vehicle {
        id,
        client_id,
        make,
        model,
        plate,
        created_at,
    })
}

// ── Appointments ──

const APPOINTMENT_COLUMNS: &str = "id, client_id, vehicle_id, scheduled_at, duration_minutes, \
     status, home_visit, location, notes, reminder_sent, created_at, updated_at";

pub fn create_appointment(conn: &Connection, appointment: &Appointment) -> anyhow::Result<()> {
    let scheduled_at = appointment.scheduled_at.format(DT_FORMAT).to_string();
    let created_at = appointment.created_at.format(DT_FORMAT).to_string();
    let updated_at = appointment.updated_at.format(DT_FORMAT).to_string();

    conn.execute(
        "INSERT INTO appointments (id, client_id, vehicle_id, scheduled_at, duration_minutes, status, home_visit, location, notes, reminder_sent, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            appointment.id,
            appointment.client_id,
            appointment.vehicle_id,
            scheduled_at,
            appointment.duration_minutes,
            appointment.status.as_str(),
            appointment.home_visit as i32,
            appointment.location,
            appointment.notes,
            appointment.reminder_sent as i32,
            created_at,
            updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_appointment_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Appointment>> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1");
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_appointment_row(row)));

    match result {
        Ok(appointment) => Ok(Some(appointment?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Appointments starting inside [start, end], minus statuses that have
/// released their slot. Used by the availability check.
pub fn get_appointments_in_range(
    conn: &Connection,
    start: &NaiveDateTime,
    end: &NaiveDateTime,
) -> anyhow::Result<Vec<Appointment>> {
    let start_str = start.format(DT_FORMAT).to_string();
    let end_str = end.format(DT_FORMAT).to_string();

    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE scheduled_at >= ?1 AND scheduled_at <= ?2
           AND status NOT IN ('canceled', 'no-show')
         ORDER BY scheduled_at ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![start_str, end_str], |row| {
        Ok(parse_appointment_row(row))
    })?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

/// The reminder job's working set: everything at or after `now` that has
/// not already run its course.
pub fn list_upcoming(conn: &Connection, now: &NaiveDateTime) -> anyhow::Result<Vec<Appointment>> {
    let now_str = now.format(DT_FORMAT).to_string();

    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE scheduled_at >= ?1
           AND status NOT IN ('completed', 'canceled', 'no-show')
         ORDER BY scheduled_at ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![now_str], |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

/// Still marked `scheduled` after the start time has passed.
pub fn list_overdue_scheduled(
    conn: &Connection,
    now: &NaiveDateTime,
) -> anyhow::Result<Vec<Appointment>> {
    let now_str = now.format(DT_FORMAT).to_string();

    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE scheduled_at < ?1 AND status = 'scheduled'
         ORDER BY scheduled_at ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![now_str], |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn update_appointment_status(
    conn: &Connection,
    id: &str,
    status: &AppointmentStatus,
) -> anyhow::Result<bool> {
    let now = Utc::now().naive_utc().format(DT_FORMAT).to_string();
    let count = conn.execute(
        "UPDATE appointments SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id],
    )?;
    Ok(count > 0)
}

/// One-way: the flag is only ever raised here, never cleared anywhere.
pub fn set_reminder_sent(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let now = Utc::now().naive_utc().format(DT_FORMAT).to_string();
    let count = conn.execute(
        "UPDATE appointments SET reminder_sent = 1, updated_at = ?1 WHERE id = ?2",
        params![now, id],
    )?;
    Ok(count > 0)
}

pub fn get_all_appointments(
    conn: &Connection,
    status_filter: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Appointment>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status_filter {
        Some(status) => (
            format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE status = ?1
                 ORDER BY scheduled_at DESC LIMIT ?2"
            ),
            vec![
                Box::new(status.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
            ],
        ),
        None => (
            format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments
                 ORDER BY scheduled_at DESC LIMIT ?1"
            ),
            vec![Box::new(limit) as Box<dyn rusqlite::types::ToSql>],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn count_upcoming(conn: &Connection, now: &NaiveDateTime) -> anyhow::Result<i64> {
    let now_str = now.format(DT_FORMAT).to_string();
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM appointments
         WHERE scheduled_at >= ?1 AND status NOT IN ('completed', 'canceled', 'no-show')",
        params![now_str],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let id: String = row.get(0)?;
    let client_id: String = row.get(1)?;
    let vehicle_id: Option<String> = row.get(2)?;
    let scheduled_at_str: String = row.get(3)?;
    let duration_minutes: i32 = row.get(4)?;
    let status_str: String = row.get(5)?;
    let home_visit: bool = row.get::<_, i32>(6)? != 0;
    let location: Option<String> = row.get(7)?;
    let notes: Option<String> = row.get(8)?;
    let reminder_sent: bool = row.get::<_, i32>(9)? != 0;
    let created_at_str: String = row.get(10)?;
    let updated_at_str: String = row.get(11)?;

    let scheduled_at = NaiveDateTime::parse_from_str(&scheduled_at_str, DT_FORMAT)
        .unwrap_or_else(|_| Utc::now().naive_utc());
    let created_at = NaiveDateTime::parse_from_str(&created_at_str, DT_FORMAT)
        .unwrap_or_else(|_| Utc::now().naive_utc());
    let updated_at = NaiveDateTime::parse_from_str(&updated_at_str, DT_FORMAT)
        .unwrap_or_else(|_| Utc::now().naive_utc());

    Ok(Appointment {
        id,
        client_id,
        vehicle_id,
        scheduled_at,
        duration_minutes,
        status: AppointmentStatus::parse(&status_str),
        home_visit,
        location,
        notes,
        reminder_sent,
        created_at,
        updated_at,
    })
}

// ── Activity Log ──

pub fn append_activity(
    conn: &Connection,
    day: &str,
    line: &str,
    created_at: &NaiveDateTime,
) -> anyhow::Result<i64> {
    let created_at_str = created_at.format(DT_FORMAT).to_string();
    conn.execute(
        "INSERT INTO activity_log (day, line, created_at) VALUES (?1, ?2, ?3)",
        params![day, line, created_at_str],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_activity_for_day(conn: &Connection, day: &str) -> anyhow::Result<Vec<ActivityEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, day, line, created_at FROM activity_log WHERE day = ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![day], |row| {
        Ok(ActivityEvent {
            id: row.get(0)?,
            day: row.get(1)?,
            line: row.get(2)?,
            created_at: row.get(3)?,
        })
    })?;

    let mut events = vec![];
    for row in rows {
        events.push(row?);
    }
    Ok(events)
}

pub fn get_activity_since(conn: &Connection, since_id: i64) -> anyhow::Result<Vec<ActivityEvent>> {
    let mut stmt = conn.prepare(
        "SELECT id, day, line, created_at FROM activity_log WHERE id > ?1 ORDER BY id ASC",
    )?;
    let rows = stmt.query_map(params![since_id], |row| {
        Ok(ActivityEvent {
            id: row.get(0)?,
            day: row.get(1)?,
            line: row.get(2)?,
            created_at: row.get(3)?,
        })
    })?;

    let mut events = vec![];
    for row in rows {
        events.push(row?);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        conn.execute(
            "INSERT INTO clients (id, name, created_at) VALUES ('client-1', 'Client One', datetime('now'))",
            [],
        )
        .unwrap();
        conn
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn make_appointment(id: &str, start: &str, status: AppointmentStatus) -> Appointment {
        let now = Utc::now().naive_utc();
        Appointment {
            id: id.to_string(),
            client_id: "client-1".to_string(),
            vehicle_id: None,
            scheduled_at: dt(start),
            duration_minutes: 60,
            status,
            home_visit: false,
            location: None,
            notes: None,
            reminder_sent: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_list_upcoming_filters_terminal_statuses() {
        let conn = setup_db();
        let now = dt("2025-06-16 08:00");

        for (id, start, status) in [
            ("a", "2025-06-16 10:00", AppointmentStatus::Scheduled),
            ("b", "2025-06-16 11:00", AppointmentStatus::Confirmed),
            ("c", "2025-06-16 12:00", AppointmentStatus::Completed),
            ("d", "2025-06-16 13:00", AppointmentStatus::Canceled),
            ("e", "2025-06-16 14:00", AppointmentStatus::NoShow),
            ("f", "2025-06-15 10:00", AppointmentStatus::Scheduled),
        ] {
            create_appointment(&conn, &make_appointment(id, start, status)).unwrap();
        }

        let upcoming = list_upcoming(&conn, &now).unwrap();
        let ids: Vec<&str> = upcoming.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_list_overdue_scheduled_only() {
        let conn = setup_db();
        let now = dt("2025-06-16 12:00");

        create_appointment(
            &conn,
            &make_appointment("past-sched", "2025-06-16 11:00", AppointmentStatus::Scheduled),
        )
        .unwrap();
        create_appointment(
            &conn,
            &make_appointment("past-conf", "2025-06-16 10:00", AppointmentStatus::Confirmed),
        )
        .unwrap();
        create_appointment(
            &conn,
            &make_appointment("future", "2025-06-16 13:00", AppointmentStatus::Scheduled),
        )
        .unwrap();

        let overdue = list_overdue_scheduled(&conn, &now).unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, "past-sched");
    }

    #[test]
    fn test_set_reminder_sent_round_trip() {
        let conn = setup_db();
        create_appointment(
            &conn,
            &make_appointment("a", "2025-06-16 10:00", AppointmentStatus::Confirmed),
        )
        .unwrap();

        assert!(set_reminder_sent(&conn, "a").unwrap());
        let appt = get_appointment_by_id(&conn, "a").unwrap().unwrap();
        assert!(appt.reminder_sent);

        assert!(!set_reminder_sent(&conn, "missing").unwrap());
    }

    #[test]
    fn test_activity_partitioned_by_day() {
        let conn = setup_db();
        let ts = dt("2025-06-16 09:30");

        append_activity(&conn, "2025-06-16", "first line", &ts).unwrap();
        append_activity(&conn, "2025-06-16", "second line", &ts).unwrap();
        append_activity(&conn, "2025-06-17", "other day", &ts).unwrap();

        let day = list_activity_for_day(&conn, "2025-06-16").unwrap();
        assert_eq!(day.len(), 2);
        assert_eq!(day[0].line, "first line");

        let other = list_activity_for_day(&conn, "2025-06-17").unwrap();
        assert_eq!(other.len(), 1);
    }
}
