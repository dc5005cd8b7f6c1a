use chrono::{TimeZone, Utc};
use serde_json::{json, Map};

use seda_core::models::{Schedule, ScheduleOptions, TaskArgs, TaskPath, TimeWindow};
use seda_core::task_path;
use seda_domain::{SedaError, TaskHandler, TaskRegistry};

fn send_report() {}

fn echo() -> TaskHandler {
    TaskHandler::blocking(|args: TaskArgs| Ok(json!(args.args)))
}

fn path() -> TaskPath {
    TaskPath::new("reports::daily", "send_report")
}

fn schedule(options: ScheduleOptions) -> Schedule {
    Schedule::new(path(), "cron(0 8 * * ? *)", options)
}

#[test]
fn test_register_task_is_append_only() {
    let registry = TaskRegistry::new();
    let first = registry.register_task(task_path!(send_report), echo()).unwrap();
    let second = registry.register_task(task_path!(send_report), echo()).unwrap();
    send_report();

    assert_eq!(first, second);
    assert_eq!(first.path.to_string(), "registry_test.send_report");
    assert_eq!(registry.tasks().unwrap().len(), 2);
}

#[tokio::test]
async fn test_resolve_registered_task() {
    let registry = TaskRegistry::new();
    registry.register_task(path(), echo()).unwrap();

    let handler = registry.resolve("reports.daily.send_report").unwrap();
    let result = handler.invoke(TaskArgs::new().with_arg(1)).await.unwrap();
    assert_eq!(result, json!([1]));
}

#[test]
fn test_resolve_first_registration_wins() {
    let registry = TaskRegistry::new();
    registry
        .register_task(path(), TaskHandler::blocking(|_| Ok(json!("first"))))
        .unwrap();
    registry
        .register_task(path(), TaskHandler::blocking(|_| Ok(json!("second"))))
        .unwrap();

    let handler = registry.resolve("reports.daily.send_report").unwrap();
    assert_eq!(handler.invoke_blocking(TaskArgs::new()).unwrap(), json!("first"));
}

#[test]
fn test_resolve_errors_are_import_path() {
    let registry = TaskRegistry::new();
    registry.register_task(path(), echo()).unwrap();

    for bad in ["send_report", "missing.module.task", "reports.daily.other"] {
        let err = registry.resolve(bad).unwrap_err();
        assert!(matches!(err, SedaError::ImportPath(_)), "{bad}: {err}");
    }
}

#[test]
fn test_duplicate_schedule_rejected() {
    let registry = TaskRegistry::new();
    registry.register_schedule(schedule(ScheduleOptions::new()), echo()).unwrap();

    let err = registry
        .register_schedule(schedule(ScheduleOptions::new()), echo())
        .unwrap_err();
    assert!(matches!(err, SedaError::DuplicateSchedule(_)));
    assert_eq!(registry.schedules().unwrap().len(), 1);
}

#[test]
fn test_schedules_differing_in_one_field_are_distinct() {
    let mut kwargs = Map::new();
    kwargs.insert("channel".to_string(), json!("email"));
    let start = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();

    let variants = vec![
        Schedule::new(path(), "cron(0 9 * * ? *)", ScheduleOptions::new()),
        Schedule::new(TaskPath::new("reports::weekly", "send_report"), "cron(0 8 * * ? *)", ScheduleOptions::new()),
        schedule(ScheduleOptions::new().args(vec![json!(1)])),
        schedule(ScheduleOptions::new().kwargs(kwargs)),
        schedule(ScheduleOptions::new().timezone("Europe/Paris")),
        schedule(ScheduleOptions::new().time_window(TimeWindow::flexible(10))),
        schedule(ScheduleOptions::new().start_date(start)),
        schedule(ScheduleOptions::new().end_date(start)),
    ];

    let registry = TaskRegistry::new();
    registry.register_schedule(schedule(ScheduleOptions::new()), echo()).unwrap();
    for variant in variants {
        registry.register_schedule(variant, echo()).unwrap();
    }
    assert_eq!(registry.schedules().unwrap().len(), 9);
}

#[test]
fn test_scheduled_task_is_resolvable() {
    let registry = TaskRegistry::new();
    registry.register_schedule(schedule(ScheduleOptions::new()), echo()).unwrap();
    assert!(registry.resolve("reports.daily.send_report").is_ok());
    assert!(registry.tasks().unwrap().is_empty());
}
