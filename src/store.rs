use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AttendanceError, Result};
use crate::import::SessionRows;
use crate::models::{AttendanceBatch, AttendanceEvent, Student, StudentMark, Subject};

/// Persistence for attendance events.
///
/// `insert_batch` must check and claim the `(subject, date)` session in one
/// conditional write: if any record already exists for that session the whole
/// batch is rejected with [`AttendanceError::AlreadyMarked`] and nothing is
/// written.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// All events for a student, newest class first.
    async fn student_events(&self, student_id: Uuid) -> Result<Vec<AttendanceEvent>>;

    async fn session_events(
        &self,
        subject_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>>;

    /// Returns the number of events written.
    async fn insert_batch(&self, batch: &AttendanceBatch) -> Result<usize>;

    /// Records one imported session, creating the students and subject it
    /// names when the store has not seen them. Existing student and subject
    /// records are never changed, and a rejected session writes nothing.
    async fn import_session(&self, session: &SessionRows, class_name: &str) -> Result<usize>;
}

#[derive(Default)]
struct MemoryState {
    sessions: HashSet<(Uuid, NaiveDate)>,
    events: Vec<AttendanceEvent>,
    students: HashMap<String, Student>,
    subjects: HashMap<String, Subject>,
}

impl MemoryState {
    fn roll_number(&self, student_id: Uuid) -> Option<String> {
        self.students
            .values()
            .find(|s| s.id == student_id)
            .map(|s| s.roll_number.clone())
    }

    fn record(&mut self, batch: &AttendanceBatch) -> Result<usize> {
        let subject_id = batch.subject().id;
        let date = batch.date();

        if !self.sessions.insert((subject_id, date)) {
            warn!(%subject_id, %date, "attendance already marked, rejecting batch");
            return Err(AttendanceError::AlreadyMarked { subject_id, date });
        }

        let mut events = batch.events();
        for event in &mut events {
            event.roll_number = self.roll_number(event.student_id);
        }
        let inserted = events.len();
        self.events.extend(events);
        debug!(%subject_id, %date, inserted, "attendance batch recorded");
        Ok(inserted)
    }
}

/// In-process store. The session check and the insert share one lock.
#[derive(Default)]
pub struct MemoryAttendanceStore {
    state: Mutex<MemoryState>,
}

impl MemoryAttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn student(&self, roll_number: &str) -> Option<Student> {
        self.lock().students.get(roll_number).cloned()
    }

    pub fn subject(&self, code: &str) -> Option<Subject> {
        self.lock().subjects.get(code).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        // Batches are appended with a single extend, so a poisoned lock never
        // holds half a batch.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl AttendanceStore for MemoryAttendanceStore {
    async fn student_events(&self, student_id: Uuid) -> Result<Vec<AttendanceEvent>> {
        let state = self.lock();
        let mut events: Vec<AttendanceEvent> = state
            .events
            .iter()
            .filter(|event| event.student_id == student_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(events)
    }

    async fn session_events(
        &self,
        subject_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<AttendanceEvent>> {
        let state = self.lock();
        Ok(state
            .events
            .iter()
            .filter(|event| event.subject_id == subject_id && event.date == date)
            .cloned()
            .collect())
    }

    async fn insert_batch(&self, batch: &AttendanceBatch) -> Result<usize> {
        self.lock().record(batch)
    }

    async fn import_session(&self, session: &SessionRows, class_name: &str) -> Result<usize> {
        let mut state = self.lock();

        let subject = match state.subjects.get(&session.subject_code) {
            Some(existing) => existing.clone(),
            None => Subject {
                id: Uuid::new_v4(),
                name: session.subject_name.clone(),
                code: session.subject_code.clone(),
            },
        };

        let mut new_students: Vec<Student> = Vec::new();
        let mut marks = Vec::with_capacity(session.rows.len());
        for row in &session.rows {
            let known = state
                .students
                .get(&row.roll_number)
                .or_else(|| new_students.iter().find(|s| s.roll_number == row.roll_number))
                .map(|s| s.id);
            let student_id = match known {
                Some(id) => id,
                None => {
                    let id = Uuid::new_v4();
                    new_students.push(Student {
                        id,
                        full_name: row.student_name.clone(),
                        roll_number: row.roll_number.clone(),
                        class_name: class_name.to_string(),
                    });
                    id
                }
            };
            marks.push(StudentMark {
                student_id,
                status: row.status,
                remarks: row.remarks.clone(),
            });
        }

        let batch = AttendanceBatch::new(
            subject.clone(),
            session.class_date,
            &session.faculty_name,
            marks,
        )?;
        if state.sessions.contains(&(subject.id, session.class_date)) {
            warn!(
                subject_id = %subject.id,
                date = %session.class_date,
                "attendance already marked, rejecting import"
            );
            return Err(AttendanceError::AlreadyMarked {
                subject_id: subject.id,
                date: session.class_date,
            });
        }

        state.subjects.entry(subject.code.clone()).or_insert(subject);
        for student in new_students {
            state.students.insert(student.roll_number.clone(), student);
        }
        state.record(&batch)
    }
}
