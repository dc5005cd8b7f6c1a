use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::{json, Value};

use seda::{
    DefaultHandler, DispatchReceipt, DispatchService, InvocationContext, Seda, SedaConfig, SedaError,
    SedaResult, ScheduleOptions, TaskArgs, TaskHandler, TaskOutcome, TaskPath,
};
use seda_core::AppSection;
use seda_infrastructure::InMemoryCloud;

fn config(function_name: Option<&str>) -> SedaConfig {
    SedaConfig {
        app: AppSection {
            function_name: function_name.map(str::to_string),
            ..AppSection::default()
        },
        ..SedaConfig::default()
    }
}

fn app(cloud: &InMemoryCloud, function_name: Option<&str>) -> Arc<Seda> {
    let app = Seda::builder(config(function_name))
        .session(Arc::new(cloud.clone()))
        .build()
        .unwrap();
    Arc::new(app)
}

fn add(args: TaskArgs) -> SedaResult<Value> {
    let a: i64 = args.arg(0)?;
    let b: i64 = args.kwarg("b")?.unwrap_or(1);
    Ok(json!(a + b))
}

fn add_path() -> TaskPath {
    TaskPath::new("billing::math", "add")
}

#[tokio::test]
async fn test_sync_mode_runs_task_in_process() {
    let cloud = InMemoryCloud::new("eu-west-1", "123456789012");
    let app = app(&cloud, None);
    let task = app.task(add_path(), TaskHandler::blocking(add)).unwrap();

    let outcome = task
        .call(TaskArgs::new().with_arg(2).with_kwarg("b", 5))
        .await
        .unwrap();
    assert_eq!(outcome, TaskOutcome::Completed(json!(7)));
    assert!(cloud.calls().is_empty());
}

#[test]
fn test_sync_mode_blocking_call_bridges_async_task() {
    let cloud = InMemoryCloud::new("eu-west-1", "123456789012");
    let app = app(&cloud, None);
    let task = app
        .task(
            TaskPath::new("billing::math", "double"),
            TaskHandler::from_async(|args: TaskArgs| async move {
                let n: i64 = args.arg(0)?;
                Ok(json!(n * 2))
            }),
        )
        .unwrap();

    let outcome = task.call_blocking(TaskArgs::new().with_arg(21)).unwrap();
    assert_eq!(outcome.value(), Some(&json!(42)));
}

#[tokio::test]
async fn test_remote_mode_publishes_to_topic() {
    let cloud = InMemoryCloud::new("eu-west-1", "123456789012");
    cloud.add_function("billing");
    let app = app(&cloud, Some("billing"));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let task = app
        .task(
            add_path(),
            TaskHandler::blocking(move |args| {
                counter.fetch_add(1, Ordering::SeqCst);
                add(args)
            }),
        )
        .unwrap();
    app.deploy().await.unwrap();

    let outcome = task.call(TaskArgs::new().with_arg(1)).await.unwrap();
    assert!(matches!(
        outcome,
        TaskOutcome::Dispatched(DispatchReceipt::Published { .. })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let published = cloud.published();
    assert_eq!(published.len(), 1);
    assert_eq!(
        published[0].target_arn,
        "arn:aws:sns:eu-west-1:123456789012:seda-async-f-billing"
    );
    assert_eq!(published[0].message["task"]["path"], "billing.math.add");
    assert_eq!(published[0].message["task"]["args"], json!([1]));
}

#[tokio::test]
async fn test_remote_mode_invokes_function_directly() {
    let cloud = InMemoryCloud::new("eu-west-1", "123456789012");
    cloud.add_function("billing");
    let app = app(&cloud, Some("billing"));
    let task = app
        .task_with_service(add_path(), TaskHandler::blocking(add), DispatchService::Invoke)
        .unwrap();

    let outcome = task
        .call(TaskArgs::new().with_arg(1).with_kwarg("b", 2))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        TaskOutcome::Dispatched(DispatchReceipt::Invoked { status_code: 202 })
    );

    let invocations = cloud.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].function_name, "billing");
    assert_eq!(invocations[0].invocation_type, "Event");
    assert_eq!(invocations[0].payload["task"]["kwargs"], json!({ "b": 2 }));
}

#[test]
fn test_remote_mode_blocking_call_dispatches() {
    let cloud = InMemoryCloud::new("eu-west-1", "123456789012");
    cloud.add_function("billing");
    let app = app(&cloud, Some("billing"));
    let task = app
        .task(add_path(), TaskHandler::blocking(add))
        .unwrap()
        .with_service(DispatchService::Invoke);

    let outcome = task.call_blocking(TaskArgs::new().with_arg(3)).unwrap();
    assert!(outcome.receipt().is_some());
    assert_eq!(cloud.invocations().len(), 1);
}

#[tokio::test]
async fn test_function_override_switches_to_remote_mode() {
    let cloud = InMemoryCloud::new("eu-west-1", "123456789012");
    cloud.add_function("staging");
    let app = app(&cloud, None);
    let task = app
        .task_with_service(add_path(), TaskHandler::blocking(add), DispatchService::Invoke)
        .unwrap();

    {
        let _guard = app.override_function("staging");
        let outcome = task.call(TaskArgs::new().with_arg(1)).await.unwrap();
        assert!(outcome.receipt().is_some());
    }
    assert!(app.is_sync());
    let outcome = task.call(TaskArgs::new().with_arg(1)).await.unwrap();
    assert_eq!(outcome, TaskOutcome::Completed(json!(2)));
}

#[tokio::test]
async fn test_at_creates_onetime_schedule() {
    let cloud = InMemoryCloud::new("eu-west-1", "123456789012");
    cloud.add_function("billing");
    let app = app(&cloud, Some("billing"));
    let task = app.task(add_path(), TaskHandler::blocking(add)).unwrap();
    app.deploy().await.unwrap();

    let when = NaiveDate::from_ymd_opt(2030, 5, 1)
        .unwrap()
        .and_hms_milli_opt(12, 30, 15, 500)
        .unwrap();
    let created = task
        .at(when, ScheduleOptions::new().args(vec![json!(4)]))
        .await
        .unwrap();
    assert!(created.schedule_arn.contains("seda-f-billing-onetime"));

    let schedules = cloud.schedules("seda-f-billing-onetime");
    assert_eq!(schedules.len(), 1);
    assert_eq!(schedules[0].schedule_expression, "at(2030-05-01T12:30:15)");
    assert!(cloud.schedules("seda-f-billing").is_empty());
}

#[tokio::test]
async fn test_registered_schedules_are_deployed_once_each() {
    let cloud = InMemoryCloud::new("eu-west-1", "123456789012");
    cloud.add_function("billing");
    let app = app(&cloud, Some("billing"));

    let options = ScheduleOptions::new().args(vec![json!(1)]);
    app.schedule(add_path(), "rate(1 hour)", options.clone(), TaskHandler::blocking(add))
        .unwrap();
    let duplicate = app.schedule(add_path(), "rate(1 hour)", options, TaskHandler::blocking(add));
    assert!(matches!(duplicate, Err(SedaError::DuplicateSchedule(_))));
    app.schedule(
        add_path(),
        "rate(1 hour)",
        ScheduleOptions::new().args(vec![json!(2)]),
        TaskHandler::blocking(add),
    )
    .unwrap();

    let report = app.deploy().await.unwrap();
    assert_eq!(report.schedule_arns.len(), 2);
    assert_eq!(cloud.schedules("seda-f-billing").len(), 2);
}

#[tokio::test]
async fn test_inbound_event_runs_registered_task() {
    let cloud = InMemoryCloud::new("eu-west-1", "123456789012");
    let app = app(&cloud, Some("billing"));
    app.task(add_path(), TaskHandler::blocking(add)).unwrap();

    let context = InvocationContext::new("billing", "req-1");
    let event = json!({ "task": { "path": "billing.math.add", "args": [40], "kwargs": { "b": 2 } } });
    let result = app.handle(event, &context).await.unwrap();
    assert_eq!(result, Some(json!(42)));

    let missing = json!({ "task": { "path": "billing.math.sub" } });
    assert!(matches!(
        app.handle(missing, &context).await,
        Err(SedaError::ImportPath(_))
    ));
}

#[tokio::test]
async fn test_account_and_arn_use_cached_identity() {
    let cloud = InMemoryCloud::new("eu-west-1", "123456789012");
    let app = app(&cloud, Some("billing"));

    assert_eq!(app.account_id().await.unwrap(), "123456789012");
    assert_eq!(
        app.arn("iam:role/x").await.unwrap(),
        "arn:aws:iam::123456789012:role/x"
    );
    assert_eq!(
        app.arn("lambda:function:billing").await.unwrap(),
        "arn:aws:lambda:eu-west-1:123456789012:function:billing"
    );
    assert_eq!(cloud.call_count("sts", "GetCallerIdentity"), 1);
}

#[test]
fn test_process_wide_instance_is_built_once() {
    Seda::reset_global();
    assert!(Seda::global().is_none());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            std::thread::spawn(move || {
                let name = format!("fn-{i}");
                Seda::builder(config(Some(&name))).init().unwrap()
            })
        })
        .collect();
    let apps: Vec<Arc<Seda>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(apps.iter().all(|app| Arc::ptr_eq(app, &apps[0])));

    let again = Seda::builder(config(Some("other"))).init().unwrap();
    assert!(Arc::ptr_eq(&again, &apps[0]));
    assert_ne!(again.target().get().as_deref(), Some("other"));
    assert!(Seda::global().is_some());

    Seda::reset_global();
    assert!(Seda::global().is_none());
}

#[tokio::test]
async fn test_default_handler_sees_paths_below_api_base_path() {
    let cloud = InMemoryCloud::new("eu-west-1", "123456789012");
    let mut config = config(Some("billing"));
    config.app.api_base_path = "/billing".to_string();
    let echo: Arc<dyn DefaultHandler> =
        Arc::new(|event: Value, _: &InvocationContext| -> SedaResult<Value> { Ok(event) });
    let app = Seda::builder(config)
        .session(Arc::new(cloud.clone()))
        .default_handler(echo)
        .build()
        .unwrap();

    let context = InvocationContext::new("billing", "req-2");
    let result = app
        .handle(json!({ "rawPath": "/billing/invoices" }), &context)
        .await
        .unwrap();
    assert_eq!(result, Some(json!({ "rawPath": "/invoices" })));
}
