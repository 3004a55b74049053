use chrono::{DateTime, Duration, TimeZone, Utc};
use rota_core::db::open_db_in_memory;
use rota_core::{
    EngineError, ErrorKind, Frequency, ServiceError, SqliteTaskRepository, SwapStatus, Task,
    TaskRepository, TaskService,
};
use rusqlite::Connection;

fn cycle_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 4, 1, 8, 0, 0).unwrap()
}

fn task(area: &str, responsibles: &[&str]) -> Task {
    Task::assigned(
        area,
        Frequency::Weekly,
        responsibles.iter().map(|id| id.to_string()).collect(),
        vec!["vera".to_string(), "walt".to_string()],
        cycle_start(),
        cycle_start() + Duration::days(7),
    )
}

/// Stores a rotation of Cocina (ana), Baño (bea), Living (carl, dani) and
/// Terraza (eva).
fn seed(conn: &Connection) -> Vec<Task> {
    let tasks = vec![
        task("Cocina", &["ana"]),
        task("Baño", &["bea"]),
        task("Living", &["carl", "dani"]),
        task("Terraza", &["eva"]),
    ];
    SqliteTaskRepository::try_new(conn)
        .unwrap()
        .replace_rotation(&[], &tasks, cycle_start())
        .unwrap();
    tasks
}

fn service(conn: &Connection) -> TaskService<SqliteTaskRepository<'_>> {
    TaskService::new(SqliteTaskRepository::try_new(conn).unwrap())
}

fn later(hours: i64) -> DateTime<Utc> {
    cycle_start() + Duration::hours(hours)
}

#[test]
fn accepted_request_exchanges_responsibles_on_both_tasks() {
    let conn = open_db_in_memory().unwrap();
    let seeded = seed(&conn);
    let (cocina, bano) = (seeded[0].id, seeded[1].id);
    let service = service(&conn);

    let requested = service.request_swap(cocina, bano, "bea", later(1)).unwrap();
    assert_eq!(requested.version, 1);
    let request = requested.swap_requests[0].clone();
    assert_eq!(request.status, SwapStatus::Pending);
    assert_eq!(request.offered_task, bano);

    let resolution = service
        .respond_to_swap(cocina, request.id, "ana", true, later(2))
        .unwrap();
    let offered = resolution.offered.clone().unwrap();
    assert_eq!(resolution.requested.responsibles, vec!["bea".to_string()]);
    assert_eq!(offered.responsibles, vec!["ana".to_string()]);

    let stored_cocina = service.get_task(cocina).unwrap();
    let stored_bano = service.get_task(bano).unwrap();
    assert_eq!(stored_cocina.responsibles, vec!["bea".to_string()]);
    assert_eq!(stored_bano.responsibles, vec!["ana".to_string()]);
    assert_eq!(stored_cocina.version, 2);
    assert_eq!(stored_bano.version, 1);

    let accepted = stored_cocina.swap_request(request.id).unwrap();
    assert_eq!(accepted.status, SwapStatus::Accepted);
    assert_eq!(accepted.responded_at, Some(later(2)));
}

#[test]
fn rejected_request_changes_no_assignment() {
    let conn = open_db_in_memory().unwrap();
    let seeded = seed(&conn);
    let (cocina, bano) = (seeded[0].id, seeded[1].id);
    let service = service(&conn);

    let requested = service.request_swap(cocina, bano, "bea", later(1)).unwrap();
    let request_id = requested.swap_requests[0].id;
    let resolution = service
        .respond_to_swap(cocina, request_id, "ana", false, later(2))
        .unwrap();
    assert!(resolution.offered.is_none());

    let stored_cocina = service.get_task(cocina).unwrap();
    assert_eq!(stored_cocina.responsibles, vec!["ana".to_string()]);
    assert_eq!(
        stored_cocina.swap_request(request_id).unwrap().status,
        SwapStatus::Rejected
    );
    assert_eq!(
        service.get_task(bano).unwrap().responsibles,
        vec!["bea".to_string()]
    );

    let err = service
        .respond_to_swap(cocina, request_id, "ana", true, later(3))
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::InvalidState));
}

#[test]
fn pending_ceiling_and_duplicates_are_conflicts() {
    let conn = open_db_in_memory().unwrap();
    let seeded = seed(&conn);
    let (cocina, bano, living, terraza) = (seeded[0].id, seeded[1].id, seeded[2].id, seeded[3].id);
    let service = service(&conn).with_swap_limit(2);

    service.request_swap(cocina, bano, "bea", later(1)).unwrap();
    let err = service
        .request_swap(cocina, bano, "bea", later(2))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Engine(EngineError::DuplicateSwapRequest { .. })
    ));
    assert_eq!(err.kind(), Some(ErrorKind::Conflict));

    service.request_swap(living, bano, "bea", later(3)).unwrap();
    let err = service
        .request_swap(terraza, bano, "bea", later(4))
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Engine(EngineError::TooManyPendingSwapRequests {
            pending: 2,
            limit: 2,
            ..
        })
    ));
    assert!(service
        .get_task(terraza)
        .unwrap()
        .swap_requests
        .is_empty());
}

#[test]
fn only_holders_may_offer_or_answer() {
    let conn = open_db_in_memory().unwrap();
    let seeded = seed(&conn);
    let (cocina, bano) = (seeded[0].id, seeded[1].id);
    let service = service(&conn);

    let err = service
        .request_swap(cocina, bano, "carl", later(1))
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::PreconditionFailed));

    let requested = service.request_swap(cocina, bano, "bea", later(1)).unwrap();
    let request_id = requested.swap_requests[0].id;
    let err = service
        .respond_to_swap(cocina, request_id, "bea", true, later(2))
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::PreconditionFailed));

    let err = service
        .respond_to_swap(cocina, uuid::Uuid::new_v4(), "ana", true, later(2))
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::NotFound));
}

#[test]
fn accepting_fails_once_requester_gave_the_offered_task_away() {
    let conn = open_db_in_memory().unwrap();
    let seeded = seed(&conn);
    let (cocina, bano, terraza) = (seeded[0].id, seeded[1].id, seeded[3].id);
    let service = service(&conn);

    let requested = service.request_swap(cocina, bano, "bea", later(1)).unwrap();
    let request_id = requested.swap_requests[0].id;
    service.direct_swap(bano, terraza, "bea").unwrap();
    let bano_before = service.get_task(bano).unwrap();
    assert_eq!(bano_before.responsibles, vec!["eva".to_string()]);

    let err = service
        .respond_to_swap(cocina, request_id, "ana", true, later(2))
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::PreconditionFailed));

    let stored_cocina = service.get_task(cocina).unwrap();
    assert_eq!(stored_cocina.responsibles, vec!["ana".to_string()]);
    assert_eq!(
        stored_cocina.swap_request(request_id).unwrap().status,
        SwapStatus::Pending
    );
    assert_eq!(service.get_task(bano).unwrap(), bano_before);
}

#[test]
fn direct_swap_exchanges_sets_and_clears_overrides() {
    let conn = open_db_in_memory().unwrap();
    let seeded = seed(&conn);
    let (cocina, living) = (seeded[0].id, seeded[2].id);
    let service = service(&conn);

    service
        .set_temporary_responsible(living, "carl", Some("eva".to_string()))
        .unwrap();

    let (first, second) = service.direct_swap(cocina, living, "ana").unwrap();
    assert_eq!(first.responsibles, vec!["carl".to_string(), "dani".to_string()]);
    assert_eq!(second.responsibles, vec!["ana".to_string()]);
    assert!(second.temporary_responsible.is_none());

    let stored_living = service.get_task(living).unwrap();
    assert_eq!(stored_living, second);

    let err = service.direct_swap(cocina, living, "bea").unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::PreconditionFailed));
}

#[test]
fn unknown_task_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let seeded = seed(&conn);
    let service = service(&conn);

    let missing = uuid::Uuid::new_v4();
    let err = service
        .request_swap(missing, seeded[1].id, "bea", later(1))
        .unwrap_err();
    assert!(matches!(err, ServiceError::TaskNotFound(id) if id == missing));
    assert_eq!(err.kind(), Some(ErrorKind::NotFound));
}
