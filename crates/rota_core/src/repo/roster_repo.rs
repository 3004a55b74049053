//! Roster repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Listing order is join order (first upsert wins), which is also the
//!   planner's tie-break order.
//! - Upserting an existing person keeps its position in that order.

use crate::model::person::{Person, PersonId};
use crate::repo::task_repo::{table_exists, RepoError, RepoResult};
use crate::repo::{bool_to_int, int_to_bool};
use rusqlite::{params, Connection, Row};
use std::collections::BTreeMap;

const PERSON_SELECT_SQL: &str = "SELECT id, display_name, available, preferences FROM people";

/// Person reader/writer used by planning and the CLI.
pub trait RosterRepository {
    fn upsert_person(&self, person: &Person) -> RepoResult<()>;
    fn get_person(&self, id: &str) -> RepoResult<Option<Person>>;
    fn list_people(&self) -> RepoResult<Vec<Person>>;
    /// People flagged available for the next cycle, in join order.
    fn list_available(&self) -> RepoResult<Vec<Person>>;
    fn set_availability(&self, id: &str, available: bool) -> RepoResult<()>;
}

/// SQLite-backed roster repository.
pub struct SqliteRosterRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRosterRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        if !table_exists(conn, "people")? {
            return Err(RepoError::MissingRequiredTable("people"));
        }
        Ok(Self { conn })
    }

    fn query_people(&self, sql: &str) -> RepoResult<Vec<Person>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([])?;
        let mut people = Vec::new();
        while let Some(row) = rows.next()? {
            people.push(parse_person_row(row)?);
        }
        Ok(people)
    }
}

impl RosterRepository for SqliteRosterRepository<'_> {
    fn upsert_person(&self, person: &Person) -> RepoResult<()> {
        if person.id.trim().is_empty() {
            return Err(RepoError::InvalidInput("person id must not be blank".to_string()));
        }
        if person.display_name.trim().is_empty() {
            return Err(RepoError::InvalidInput(format!(
                "display name of `{}` must not be blank",
                person.id
            )));
        }
        let preferences = serde_json::to_string(&person.preferences)
            .map_err(|err| RepoError::InvalidInput(format!("preferences: {err}")))?;

        self.conn.execute(
            "INSERT INTO people (id, display_name, available, preferences)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                available = excluded.available,
                preferences = excluded.preferences,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                person.id.as_str(),
                person.display_name.trim(),
                bool_to_int(person.available),
                preferences,
            ],
        )?;
        Ok(())
    }

    fn get_person(&self, id: &str) -> RepoResult<Option<Person>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PERSON_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_person_row(row)?));
        }
        Ok(None)
    }

    fn list_people(&self) -> RepoResult<Vec<Person>> {
        self.query_people(&format!("{PERSON_SELECT_SQL} ORDER BY rowid ASC;"))
    }

    fn list_available(&self) -> RepoResult<Vec<Person>> {
        self.query_people(&format!(
            "{PERSON_SELECT_SQL} WHERE available = 1 ORDER BY rowid ASC;"
        ))
    }

    fn set_availability(&self, id: &str, available: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE people
             SET
                available = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, bool_to_int(available)],
        )?;
        if changed == 0 {
            return Err(RepoError::PersonNotFound(PersonId::from(id)));
        }
        Ok(())
    }
}

fn parse_person_row(row: &Row<'_>) -> RepoResult<Person> {
    let id: String = row.get("id")?;
    let preferences_text: String = row.get("preferences")?;
    let preferences: BTreeMap<String, String> = serde_json::from_str(&preferences_text)
        .map_err(|err| {
            RepoError::InvalidData(format!("invalid preferences for `{id}` in people: {err}"))
        })?;

    Ok(Person {
        display_name: row.get("display_name")?,
        available: int_to_bool(row.get("available")?, "people.available")?,
        preferences,
        id,
    })
}
