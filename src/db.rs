use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AttendanceError, Result};
use crate::import::{self, ExportRow, SessionRows};
use crate::models::{
    AttendanceBatch, AttendanceEvent, AttendanceStatus, Student, StudentMark, Subject,
};
use crate::store::AttendanceStore;

const EVENT_COLUMNS: &str = "a.student_id, st.roll_number, a.subject_id, s.name AS subject_name, \
     s.code AS subject_code, a.class_date, a.status, a.remarks, a.faculty_name";

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed attendance store.
#[derive(Clone)]
pub struct PgAttendanceStore {
    pool: PgPool,
}

impl PgAttendanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn event_from_row(row: &PgRow) -> Result<AttendanceEvent> {
    let status: String = row.try_get("status")?;
    Ok(AttendanceEvent {
        student_id: row.try_get("student_id")?,
        roll_number: Some(row.try_get("roll_number")?),
        subject_id: row.try_get("subject_id")?,
        subject_name: row.try_get("subject_name")?,
        subject_code: row.try_get("subject_code")?,
        date: row.try_get("class_date")?,
        status: status.parse()?,
        remarks: row.try_get("remarks")?,
        faculty_name: row.try_get("faculty_name")?,
    })
}

#[async_trait]
impl AttendanceStore for PgAttendanceStore {
    async fn student_events(&self, student_id: Uuid) -> Result<Vec<AttendanceEvent>> {
        let query = format!(
            "SELECT {EVENT_COLUMNS} \
             FROM campus_attendance.attendance a \
             JOIN campus_attendance.subjects s ON s.id = a.subject_id \
             JOIN campus_attendance.students st ON st.id = a.student_id \
             WHERE a.student_id = $1 \
             ORDER BY a.class_date DESC, s.code"
        );
        let rows = sqlx::query(&query)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(event_from_row).collect()
    }

    async fn session_events(
        &self,
        subject_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>> {
        let query = format!(
            "SELECT {EVENT_COLUMNS} \
             FROM campus_attendance.attendance a \
             JOIN campus_attendance.subjects s ON s.id = a.subject_id \
             JOIN campus_attendance.students st ON st.id = a.student_id \
             WHERE a.subject_id = $1 AND a.class_date = $2 \
             ORDER BY st.roll_number"
        );
        let rows = sqlx::query(&query)
            .bind(subject_id)
            .bind(date)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(event_from_row).collect()
    }

    async fn insert_batch(&self, batch: &AttendanceBatch) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        match record_batch(&mut *tx, batch).await {
            Ok(inserted) => {
                tx.commit().await?;
                debug!(
                    subject_id = %batch.subject().id,
                    date = %batch.date(),
                    inserted,
                    "attendance batch recorded"
                );
                Ok(inserted)
            }
            Err(err) => {
                tx.rollback().await?;
                Err(err)
            }
        }
    }

    async fn import_session(&self, session: &SessionRows, class_name: &str) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        match stage_session(&mut *tx, session, class_name).await {
            Ok(inserted) => {
                tx.commit().await?;
                Ok(inserted)
            }
            Err(err) => {
                tx.rollback().await?;
                Err(err)
            }
        }
    }
}

/// Claims the session and writes every mark on `conn`. The caller owns the
/// transaction and must roll it back on error.
async fn record_batch(conn: &mut PgConnection, batch: &AttendanceBatch) -> Result<usize> {
    let subject_id = batch.subject().id;
    let date = batch.date();

    // Claiming the session row is the duplicate guard; a concurrent claim
    // for the same (subject, date) either waits on it or affects no rows.
    let claimed = sqlx::query(
        r#"
        INSERT INTO campus_attendance.attendance_sessions
        (subject_id, class_date, faculty_name)
        VALUES ($1, $2, $3)
        ON CONFLICT (subject_id, class_date) DO NOTHING
        "#,
    )
    .bind(subject_id)
    .bind(date)
    .bind(batch.faculty_name())
    .execute(&mut *conn)
    .await?;

    if claimed.rows_affected() == 0 {
        warn!(%subject_id, %date, "attendance already marked, rejecting batch");
        return Err(AttendanceError::AlreadyMarked { subject_id, date });
    }

    for mark in batch.marks() {
        sqlx::query(
            r#"
            INSERT INTO campus_attendance.attendance
            (id, student_id, subject_id, class_date, status, remarks, faculty_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(mark.student_id)
        .bind(subject_id)
        .bind(date)
        .bind(mark.status.as_str())
        .bind(mark.remarks.as_deref())
        .bind(batch.faculty_name())
        .execute(&mut *conn)
        .await?;
    }

    Ok(batch.marks().len())
}

async fn stage_session(
    conn: &mut PgConnection,
    session: &SessionRows,
    class_name: &str,
) -> Result<usize> {
    let subject = ensure_subject(
        conn,
        &session.subject_name,
        &session.subject_code,
        class_name,
    )
    .await?;

    let mut marks = Vec::with_capacity(session.rows.len());
    for row in &session.rows {
        let student_id =
            ensure_student(conn, &row.student_name, &row.roll_number, class_name).await?;
        marks.push(StudentMark {
            student_id,
            status: row.status,
            remarks: row.remarks.clone(),
        });
    }

    let batch = AttendanceBatch::new(subject, session.class_date, &session.faculty_name, marks)?;
    record_batch(conn, &batch).await
}

pub async fn subject_by_code(pool: &PgPool, code: &str) -> Result<Subject> {
    let row = sqlx::query("SELECT id, name, code FROM campus_attendance.subjects WHERE code = $1")
        .bind(code)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AttendanceError::UnknownSubject(code.to_string()))?;

    subject_from_row(&row)
}

fn subject_from_row(row: &PgRow) -> Result<Subject> {
    Ok(Subject {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        code: row.try_get("code")?,
    })
}

fn student_from_row(row: &PgRow) -> Result<Student> {
    Ok(Student {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        roll_number: row.try_get("roll_number")?,
        class_name: row.try_get("class_name")?,
    })
}

pub async fn student_by_roll(pool: &PgPool, roll_number: &str) -> Result<Student> {
    let row = sqlx::query(
        "SELECT id, full_name, roll_number, class_name \
         FROM campus_attendance.students WHERE roll_number = $1",
    )
    .bind(roll_number)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AttendanceError::UnknownStudent(roll_number.to_string()))?;

    student_from_row(&row)
}

/// Students enrolled in the class that takes the subject.
pub async fn class_roster(pool: &PgPool, subject_id: Uuid) -> Result<Vec<Student>> {
    let rows = sqlx::query(
        r#"
        SELECT st.id, st.full_name, st.roll_number, st.class_name
        FROM campus_attendance.students st
        JOIN campus_attendance.subjects su ON su.class_name = st.class_name
        WHERE su.id = $1
        ORDER BY st.roll_number
        "#,
    )
    .bind(subject_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(student_from_row).collect()
}

/// Inserts the student unless the roll number is taken; an existing record
/// keeps its name and class.
async fn ensure_student(
    conn: &mut PgConnection,
    full_name: &str,
    roll_number: &str,
    class_name: &str,
) -> Result<Uuid> {
    sqlx::query(
        r#"
        INSERT INTO campus_attendance.students (id, full_name, roll_number, class_name)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (roll_number) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(full_name)
    .bind(roll_number)
    .bind(class_name)
    .execute(&mut *conn)
    .await?;

    let id = sqlx::query("SELECT id FROM campus_attendance.students WHERE roll_number = $1")
        .bind(roll_number)
        .fetch_one(&mut *conn)
        .await?
        .try_get("id")?;
    Ok(id)
}

async fn ensure_subject(
    conn: &mut PgConnection,
    name: &str,
    code: &str,
    class_name: &str,
) -> Result<Subject> {
    sqlx::query(
        r#"
        INSERT INTO campus_attendance.subjects (id, name, code, class_name)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (code) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(code)
    .bind(class_name)
    .execute(&mut *conn)
    .await?;

    let row = sqlx::query("SELECT id, name, code FROM campus_attendance.subjects WHERE code = $1")
        .bind(code)
        .fetch_one(&mut *conn)
        .await?;
    subject_from_row(&row)
}

/// Loads a small demo class through the regular import path, so running it
/// twice only reports skipped sessions.
pub async fn seed(store: &PgAttendanceStore) -> anyhow::Result<import::ImportOutcome> {
    let class_name = "CSE-2025-A";
    let students = [
        ("Ananya Sharma", "CSE25A-001"),
        ("Rohan Verma", "CSE25A-002"),
        ("Meera Pillai", "CSE25A-003"),
    ];
    let structures = ("CS201", "Data Structures");
    let discrete = ("MA201", "Discrete Mathematics");
    let plan = [
        (structures, (2025, 8, 4), "Dr. Rao", ["present", "late", "absent"]),
        (structures, (2025, 8, 6), "Dr. Rao", ["present", "present", "present"]),
        (discrete, (2025, 8, 5), "Prof. Nair", ["late", "present", "absent"]),
        (discrete, (2025, 9, 2), "Prof. Nair", ["present", "absent", "present"]),
    ];

    let mut sessions = Vec::with_capacity(plan.len());
    for ((code, name), (y, m, d), faculty, statuses) in plan {
        let class_date = NaiveDate::from_ymd_opt(y, m, d)
            .ok_or_else(|| anyhow::anyhow!("invalid seed date {y}-{m}-{d}"))?;
        let mut rows = Vec::with_capacity(students.len());
        for ((student_name, roll_number), status) in students.iter().zip(statuses) {
            rows.push(ExportRow {
                roll_number: roll_number.to_string(),
                student_name: student_name.to_string(),
                subject_code: code.to_string(),
                subject_name: name.to_string(),
                class_date,
                status: status.parse::<AttendanceStatus>()?,
                remarks: None,
                faculty_name: faculty.to_string(),
            });
        }
        sessions.push(SessionRows {
            subject_code: code.to_string(),
            subject_name: name.to_string(),
            class_date,
            faculty_name: faculty.to_string(),
            rows,
        });
    }

    Ok(import::import_sessions(store, &sessions, class_name).await?)
}
