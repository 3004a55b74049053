//! Task repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Read task history (current and superseded cycles).
//! - Replace the current rotation atomically.
//! - Persist single- and two-task transitions with optimistic concurrency.
//!
//! # Invariants
//! - Embedded votes and swap requests are owned child rows of their task and
//!   are rewritten together with it.
//! - `replace_rotation` supersedes the whole current set and inserts the new
//!   one inside one IMMEDIATE transaction: all or nothing.
//! - Updates match `uuid`, `version` and `superseded_at IS NULL`; any write to
//!   a superseded task fails with `NotFound`.

use crate::db::DbError;
use crate::model::area::Frequency;
use crate::model::person::PersonId;
use crate::model::task::{
    SwapRequest, SwapStatus, Task, TaskId, TaskValidationError, VerificationStatus,
    VerificationVote,
};
use crate::repo::{bool_to_int, from_epoch_ms, int_to_bool, to_epoch_ms};
use chrono::{DateTime, Utc};
use log::{info, warn};
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    uuid,
    area,
    frequency,
    temporary_responsible,
    start_date,
    end_date,
    completed,
    completed_at,
    marked_incomplete,
    verification_status,
    version
FROM tasks";

const ROLE_RESPONSIBLE: &str = "responsible";
const ROLE_VERIFIER: &str = "verifier";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for task and roster persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(TaskValidationError),
    Db(DbError),
    NotFound(TaskId),
    /// Task exists but was written by someone else since it was read.
    StaleVersion { task: TaskId, expected: u64 },
    /// The current rotation changed between planning and replacement.
    StaleRotation,
    PersonNotFound(PersonId),
    InvalidInput(String),
    InvalidData(String),
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::StaleVersion { task, expected } => write!(
                f,
                "task {task} changed concurrently (expected version {expected})"
            ),
            Self::StaleRotation => write!(f, "current rotation changed concurrently"),
            Self::PersonNotFound(id) => write!(f, "person not found: {id}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::MissingRequiredTable(table) => write!(f, "missing required table: {table}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TaskValidationError> for RepoError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Row counts touched by one rotation replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaceSummary {
    pub superseded: usize,
    pub inserted: usize,
}

/// Storage contract consumed by rotation and task services.
pub trait TaskRepository {
    /// Every task ever stored, most recent start first.
    fn list_history(&self) -> RepoResult<Vec<Task>>;
    /// Tasks of the current rotation, ordered by area name.
    fn list_current(&self) -> RepoResult<Vec<Task>>;
    /// One task of the current rotation. Superseded tasks are not returned.
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    /// Supersedes the current rotation and stores `tasks` as the new one.
    ///
    /// `expected_current` is the current task set the plan was computed
    /// against; a different stored set fails with `StaleRotation`.
    fn replace_rotation(
        &self,
        expected_current: &[TaskId],
        tasks: &[Task],
        now: DateTime<Utc>,
    ) -> RepoResult<ReplaceSummary>;
    /// Writes `task` if its stored version still equals `task.version`.
    /// Returns the stored task with the bumped version.
    fn update_task(&self, task: &Task) -> RepoResult<Task>;
    /// Writes two tasks with version checks; both or neither are stored.
    fn update_task_pair(&self, first: &Task, second: &Task) -> RepoResult<(Task, Task)>;
    /// Pending swap requests by `requester` across the current rotation.
    fn count_pending_swap_requests(&self, requester: &str) -> RepoResult<usize>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        for table in ["tasks", "task_members", "verification_votes", "swap_requests"] {
            if !table_exists(conn, table)? {
                return Err(RepoError::MissingRequiredTable(table));
            }
        }
        Ok(Self { conn })
    }

    fn query_tasks(&self, sql: &str) -> RepoResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }
        for task in &mut tasks {
            load_children(self.conn, task)?;
        }
        Ok(tasks)
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn list_history(&self) -> RepoResult<Vec<Task>> {
        self.query_tasks(&format!(
            "{TASK_SELECT_SQL} ORDER BY start_date DESC, created_at DESC, uuid ASC;"
        ))
    }

    fn list_current(&self) -> RepoResult<Vec<Task>> {
        self.query_tasks(&format!(
            "{TASK_SELECT_SQL} WHERE superseded_at IS NULL ORDER BY area ASC, uuid ASC;"
        ))
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TASK_SELECT_SQL}
             WHERE uuid = ?1
               AND superseded_at IS NULL;"
        ))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            let mut task = parse_task_row(row)?;
            load_children(self.conn, &mut task)?;
            return Ok(Some(task));
        }
        Ok(None)
    }

    fn replace_rotation(
        &self,
        expected_current: &[TaskId],
        tasks: &[Task],
        now: DateTime<Utc>,
    ) -> RepoResult<ReplaceSummary> {
        for task in tasks {
            task.validate()?;
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let stored_current = current_task_ids(&tx)?;
        let expected: BTreeSet<String> = expected_current.iter().map(Uuid::to_string).collect();
        if stored_current != expected {
            warn!(
                "event=rotation_replace module=repo status=error error_code=stale_rotation expected={} stored={}",
                expected.len(),
                stored_current.len()
            );
            return Err(RepoError::StaleRotation);
        }

        tx.execute(
            "DELETE FROM swap_requests
             WHERE status = 'pending'
               AND task_uuid IN (SELECT uuid FROM tasks WHERE superseded_at IS NULL);",
            [],
        )?;
        let superseded = tx.execute(
            "UPDATE tasks
             SET superseded_at = ?1,
                 version = version + 1
             WHERE superseded_at IS NULL;",
            [to_epoch_ms(now)],
        )?;
        for task in tasks {
            insert_task(&tx, task)?;
        }
        tx.commit()?;

        info!(
            "event=rotation_replace module=repo status=ok superseded={} inserted={}",
            superseded,
            tasks.len()
        );
        Ok(ReplaceSummary {
            superseded,
            inserted: tasks.len(),
        })
    }

    fn update_task(&self, task: &Task) -> RepoResult<Task> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let stored = update_task_in_tx(&tx, task)?;
        tx.commit()?;
        Ok(stored)
    }

    fn update_task_pair(&self, first: &Task, second: &Task) -> RepoResult<(Task, Task)> {
        if first.id == second.id {
            return Err(RepoError::InvalidInput(format!(
                "pair update names the same task twice: {}",
                first.id
            )));
        }
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let stored_first = update_task_in_tx(&tx, first)?;
        let stored_second = update_task_in_tx(&tx, second)?;
        tx.commit()?;
        Ok((stored_first, stored_second))
    }

    fn count_pending_swap_requests(&self, requester: &str) -> RepoResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM swap_requests sr
             INNER JOIN tasks t ON t.uuid = sr.task_uuid
             WHERE sr.requester = ?1
               AND sr.status = 'pending'
               AND t.superseded_at IS NULL;",
            [requester],
            |row| row.get(0),
        )?;
        usize::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("invalid pending count `{count}`")))
    }
}

fn insert_task(conn: &Connection, task: &Task) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO tasks (
            uuid,
            area,
            frequency,
            temporary_responsible,
            start_date,
            end_date,
            completed,
            completed_at,
            marked_incomplete,
            verification_status,
            version
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
        params![
            task.id.to_string(),
            task.area.as_str(),
            task.frequency.as_str(),
            task.temporary_responsible.as_deref(),
            to_epoch_ms(task.start_date),
            to_epoch_ms(task.end_date),
            bool_to_int(task.completed),
            task.completed_at.map(to_epoch_ms),
            bool_to_int(task.marked_incomplete),
            task.verification_status.as_str(),
            version_to_db(task.version)?,
        ],
    )?;
    write_children(conn, task)
}

fn update_task_in_tx(conn: &Connection, task: &Task) -> RepoResult<Task> {
    task.validate()?;
    let task_uuid = task.id.to_string();

    let changed = conn.execute(
        "UPDATE tasks
         SET
            area = ?2,
            frequency = ?3,
            temporary_responsible = ?4,
            start_date = ?5,
            end_date = ?6,
            completed = ?7,
            completed_at = ?8,
            marked_incomplete = ?9,
            verification_status = ?10,
            version = version + 1
         WHERE uuid = ?1
           AND version = ?11
           AND superseded_at IS NULL;",
        params![
            task_uuid.as_str(),
            task.area.as_str(),
            task.frequency.as_str(),
            task.temporary_responsible.as_deref(),
            to_epoch_ms(task.start_date),
            to_epoch_ms(task.end_date),
            bool_to_int(task.completed),
            task.completed_at.map(to_epoch_ms),
            bool_to_int(task.marked_incomplete),
            task.verification_status.as_str(),
            version_to_db(task.version)?,
        ],
    )?;

    if changed == 0 {
        if current_task_exists(conn, task_uuid.as_str())? {
            warn!(
                "event=task_update module=repo status=error error_code=stale_version expected_version={}",
                task.version
            );
            return Err(RepoError::StaleVersion {
                task: task.id,
                expected: task.version,
            });
        }
        return Err(RepoError::NotFound(task.id));
    }

    for table in ["task_members", "verification_votes", "swap_requests"] {
        conn.execute(
            &format!("DELETE FROM {table} WHERE task_uuid = ?1;"),
            [task_uuid.as_str()],
        )?;
    }
    write_children(conn, task)?;

    let mut stored = task.clone();
    stored.version = task.version + 1;
    Ok(stored)
}

fn write_children(conn: &Connection, task: &Task) -> RepoResult<()> {
    let task_uuid = task.id.to_string();

    let members = task
        .responsibles
        .iter()
        .enumerate()
        .map(|(position, person)| (ROLE_RESPONSIBLE, position, person))
        .chain(
            task.verifiers
                .iter()
                .enumerate()
                .map(|(position, person)| (ROLE_VERIFIER, position, person)),
        );
    for (role, position, person) in members {
        conn.execute(
            "INSERT INTO task_members (task_uuid, role, position, person_id)
             VALUES (?1, ?2, ?3, ?4);",
            params![task_uuid.as_str(), role, position as i64, person.as_str()],
        )?;
    }

    for (position, vote) in task.votes.iter().enumerate() {
        conn.execute(
            "INSERT INTO verification_votes (
                uuid, task_uuid, position, verifier, approved, comment, cast_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                vote.id.to_string(),
                task_uuid.as_str(),
                position as i64,
                vote.verifier.as_str(),
                bool_to_int(vote.approved),
                vote.comment.as_deref(),
                to_epoch_ms(vote.cast_at),
            ],
        )?;
    }

    for (position, request) in task.swap_requests.iter().enumerate() {
        conn.execute(
            "INSERT INTO swap_requests (
                uuid, task_uuid, position, requester, offered_task_uuid,
                status, created_at, responded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);",
            params![
                request.id.to_string(),
                task_uuid.as_str(),
                position as i64,
                request.requester.as_str(),
                request.offered_task.to_string(),
                request.status.as_str(),
                to_epoch_ms(request.created_at),
                request.responded_at.map(to_epoch_ms),
            ],
        )?;
    }

    Ok(())
}

fn load_children(conn: &Connection, task: &mut Task) -> RepoResult<()> {
    let task_uuid = task.id.to_string();

    let mut stmt = conn.prepare(
        "SELECT role, person_id
         FROM task_members
         WHERE task_uuid = ?1
         ORDER BY role ASC, position ASC;",
    )?;
    let mut rows = stmt.query([task_uuid.as_str()])?;
    while let Some(row) = rows.next()? {
        let role: String = row.get("role")?;
        let person: String = row.get("person_id")?;
        match role.as_str() {
            ROLE_RESPONSIBLE => task.responsibles.push(person),
            ROLE_VERIFIER => task.verifiers.push(person),
            other => {
                return Err(RepoError::InvalidData(format!(
                    "invalid role `{other}` in task_members.role"
                )));
            }
        }
    }

    let mut stmt = conn.prepare(
        "SELECT uuid, verifier, approved, comment, cast_at
         FROM verification_votes
         WHERE task_uuid = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([task_uuid.as_str()])?;
    while let Some(row) = rows.next()? {
        task.votes.push(VerificationVote {
            id: parse_uuid(&row.get::<_, String>("uuid")?, "verification_votes.uuid")?,
            verifier: row.get("verifier")?,
            approved: int_to_bool(row.get("approved")?, "verification_votes.approved")?,
            comment: row.get("comment")?,
            cast_at: from_epoch_ms(row.get("cast_at")?, "verification_votes.cast_at")?,
        });
    }

    let mut stmt = conn.prepare(
        "SELECT uuid, requester, offered_task_uuid, status, created_at, responded_at
         FROM swap_requests
         WHERE task_uuid = ?1
         ORDER BY position ASC;",
    )?;
    let mut rows = stmt.query([task_uuid.as_str()])?;
    while let Some(row) = rows.next()? {
        let status_text: String = row.get("status")?;
        let status = SwapStatus::parse(&status_text).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid swap status `{status_text}` in swap_requests.status"
            ))
        })?;
        let responded_at = match row.get::<_, Option<i64>>("responded_at")? {
            Some(value) => Some(from_epoch_ms(value, "swap_requests.responded_at")?),
            None => None,
        };
        task.swap_requests.push(SwapRequest {
            id: parse_uuid(&row.get::<_, String>("uuid")?, "swap_requests.uuid")?,
            requester: row.get("requester")?,
            offered_task: parse_uuid(
                &row.get::<_, String>("offered_task_uuid")?,
                "swap_requests.offered_task_uuid",
            )?,
            status,
            created_at: from_epoch_ms(row.get("created_at")?, "swap_requests.created_at")?,
            responded_at,
        });
    }

    Ok(())
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let id = parse_uuid(&row.get::<_, String>("uuid")?, "tasks.uuid")?;

    let frequency_text: String = row.get("frequency")?;
    let frequency = Frequency::parse(&frequency_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid frequency `{frequency_text}` in tasks.frequency"
        ))
    })?;

    let status_text: String = row.get("verification_status")?;
    let verification_status = VerificationStatus::parse(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid verification status `{status_text}` in tasks.verification_status"
        ))
    })?;

    let completed_at = match row.get::<_, Option<i64>>("completed_at")? {
        Some(value) => Some(from_epoch_ms(value, "tasks.completed_at")?),
        None => None,
    };

    let version_value: i64 = row.get("version")?;
    let version = u64::try_from(version_value).map_err(|_| {
        RepoError::InvalidData(format!("invalid version `{version_value}` in tasks.version"))
    })?;

    Ok(Task {
        id,
        area: row.get("area")?,
        frequency,
        responsibles: Vec::new(),
        temporary_responsible: row.get("temporary_responsible")?,
        start_date: from_epoch_ms(row.get("start_date")?, "tasks.start_date")?,
        end_date: from_epoch_ms(row.get("end_date")?, "tasks.end_date")?,
        verifiers: Vec::new(),
        completed: int_to_bool(row.get("completed")?, "tasks.completed")?,
        completed_at,
        marked_incomplete: int_to_bool(row.get("marked_incomplete")?, "tasks.marked_incomplete")?,
        verification_status,
        votes: Vec::new(),
        swap_requests: Vec::new(),
        version,
    })
}

fn parse_uuid(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn version_to_db(version: u64) -> RepoResult<i64> {
    i64::try_from(version)
        .map_err(|_| RepoError::InvalidInput(format!("task version `{version}` out of range")))
}

fn current_task_ids(conn: &Connection) -> RepoResult<BTreeSet<String>> {
    let mut stmt = conn.prepare("SELECT uuid FROM tasks WHERE superseded_at IS NULL;")?;
    let mut rows = stmt.query([])?;
    let mut ids = BTreeSet::new();
    while let Some(row) = rows.next()? {
        ids.insert(row.get::<_, String>(0)?);
    }
    Ok(ids)
}

fn current_task_exists(conn: &Connection, task_uuid: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM tasks
            WHERE uuid = ?1
              AND superseded_at IS NULL
        );",
        [task_uuid],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
