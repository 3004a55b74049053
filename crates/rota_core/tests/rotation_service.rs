use chrono::{DateTime, Duration, TimeZone, Utc};
use rota_core::db::open_db_in_memory;
use rota_core::{
    EngineConfig, ErrorKind, Person, RosterRepository, RotationService, SqliteRosterRepository,
    SqliteTaskRepository, Task, TaskRepository,
};
use rusqlite::Connection;
use std::collections::BTreeSet;

fn cycle_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap()
}

fn seed_roster(conn: &Connection, available: &[&str], unavailable: &[&str]) {
    let roster = SqliteRosterRepository::try_new(conn).unwrap();
    for id in available {
        roster.upsert_person(&Person::new(*id, id.to_uppercase())).unwrap();
    }
    for id in unavailable {
        roster
            .upsert_person(&Person::new(*id, id.to_uppercase()).with_availability(false))
            .unwrap();
    }
}

fn service(conn: &Connection) -> RotationService<SqliteTaskRepository<'_>, SqliteRosterRepository<'_>> {
    RotationService::new(
        SqliteTaskRepository::try_new(conn).unwrap(),
        SqliteRosterRepository::try_new(conn).unwrap(),
        EngineConfig::default(),
    )
}

fn responsibles_of<'a>(tasks: &'a [Task], area: &str) -> BTreeSet<&'a str> {
    tasks
        .iter()
        .find(|task| task.area == area)
        .unwrap()
        .responsibles
        .iter()
        .map(String::as_str)
        .collect()
}

#[test]
fn first_rotation_staffs_every_area_from_available_people() {
    let conn = open_db_in_memory().unwrap();
    seed_roster(&conn, &["ana", "bea", "carl", "dani", "eva", "fede"], &["omar"]);

    let outcome = service(&conn).run_rotation(cycle_start()).unwrap();
    assert_eq!(outcome.tasks.len(), 8);
    assert_eq!(outcome.superseded, 0);
    assert!((outcome.target_workload - 28.0 / 6.0).abs() < 1e-9);

    let config = EngineConfig::default();
    for task in &outcome.tasks {
        let area = config.areas.get(&task.area).unwrap();
        assert_eq!(task.responsibles.len(), area.people_needed as usize);
        assert_eq!(task.verifiers.len(), 3);
        assert_eq!(task.frequency, area.frequency);
        assert_eq!(task.start_date, cycle_start());
        assert!(!task.responsibles.iter().any(|id| id == "omar"));
        assert!(!task.verifiers.iter().any(|id| id == "omar"));
    }

    let pasto = outcome
        .tasks
        .iter()
        .find(|task| task.area == "Cortar el pasto")
        .unwrap();
    assert_eq!(
        pasto.end_date,
        Utc.with_ymd_and_hms(2024, 2, 15, 8, 0, 0).unwrap()
    );

    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();
    assert_eq!(tasks.list_current().unwrap().len(), 8);
}

#[test]
fn next_rotation_supersedes_and_rotates_hardest_area() {
    let conn = open_db_in_memory().unwrap();
    seed_roster(&conn, &["ana", "bea", "carl", "dani"], &[]);
    let service = service(&conn);

    let first = service.run_rotation(cycle_start()).unwrap();
    let second = service
        .run_rotation(cycle_start() + Duration::days(7))
        .unwrap();
    assert_eq!(second.superseded, 8);

    let first_pasto = responsibles_of(&first.tasks, "Cortar el pasto");
    let second_pasto = responsibles_of(&second.tasks, "Cortar el pasto");
    assert_eq!(first_pasto, BTreeSet::from(["ana", "bea"]));
    assert!(first_pasto.is_disjoint(&second_pasto));

    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();
    let current: BTreeSet<_> = tasks
        .list_current()
        .unwrap()
        .into_iter()
        .map(|task| task.id)
        .collect();
    let expected: BTreeSet<_> = second.tasks.iter().map(|task| task.id).collect();
    assert_eq!(current, expected);
    assert_eq!(tasks.list_history().unwrap().len(), 16);
}

#[test]
fn failed_plan_leaves_current_rotation_untouched() {
    let conn = open_db_in_memory().unwrap();
    seed_roster(&conn, &["ana", "bea", "carl"], &[]);
    let service = service(&conn);
    let first = service.run_rotation(cycle_start()).unwrap();

    let roster = SqliteRosterRepository::try_new(&conn).unwrap();
    roster.set_availability("bea", false).unwrap();
    roster.set_availability("carl", false).unwrap();

    let err = service
        .run_rotation(cycle_start() + Duration::days(7))
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::PreconditionFailed));

    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();
    assert_eq!(tasks.list_current().unwrap().len(), first.tasks.len());
    assert_eq!(tasks.list_history().unwrap().len(), first.tasks.len());
}
