use std::sync::{Arc, Mutex};

use clap::Parser;
use serde_json::json;

use seda::cli::{execute, load_app, run, AppCatalog, Cli, Commands, EXIT_FAILURE};
use seda::{Seda, SedaConfig, SedaError, TaskHandler, TaskPath};
use seda_infrastructure::InMemoryCloud;

/// 进程级实例在本文件的测试之间共享
static GLOBAL_LOCK: Mutex<()> = Mutex::new(());

fn parse(args: &[&str]) -> Commands {
    let mut argv = vec!["seda"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap().command.unwrap()
}

fn app(cloud: &InMemoryCloud) -> Seda {
    Seda::builder(SedaConfig::default())
        .session(Arc::new(cloud.clone()))
        .build()
        .unwrap()
}

#[test]
fn test_parse_deploy_options() {
    let cli = Cli::try_parse_from([
        "seda",
        "--log-level",
        "debug",
        "deploy",
        "--app",
        "billing.app:seda",
        "--app-dir",
        "services/billing",
        "-f",
        "billing",
    ])
    .unwrap();
    assert_eq!(cli.log_level.as_deref(), Some("debug"));
    let command = cli.command.unwrap();
    assert_eq!(command.app_args().path.as_deref(), Some("billing.app:seda"));
    assert_eq!(command.app_args().app_dir.to_str(), Some("services/billing"));
    assert_eq!(command.function_args().function.as_deref(), Some("billing"));
}

#[test]
fn test_parse_remove_and_debug_commands() {
    assert!(matches!(parse(&["remove", "--yes"]), Commands::Remove { yes: true, .. }));
    assert!(matches!(parse(&["remove"]), Commands::Remove { yes: false, .. }));
    match parse(&["shell", "ls -la", "--function", "billing"]) {
        Commands::Shell { command, function, .. } => {
            assert_eq!(command, "ls -la");
            assert_eq!(function.function.as_deref(), Some("billing"));
        }
        other => panic!("unexpected command {other:?}"),
    }
    assert!(matches!(
        parse(&["python", "print(1)"]),
        Commands::Python { code, .. } if code == "print(1)"
    ));
    assert_eq!(parse(&["deploy"]).app_args().app_dir.to_str(), Some("."));
}

#[test]
fn test_parse_version_and_bad_log_level() {
    let cli = Cli::try_parse_from(["seda", "--version"]).unwrap();
    assert!(cli.version);
    assert!(cli.command.is_none());
    assert!(Cli::try_parse_from(["seda", "--log-level", "loud", "deploy"]).is_err());
}

#[tokio::test]
async fn test_missing_function_name_exits_with_failure() {
    let cloud = InMemoryCloud::new("eu-west-1", "123456789012");
    let status = execute(&app(&cloud), parse(&["deploy"])).await.unwrap();
    assert_eq!(status, EXIT_FAILURE);
    assert!(cloud.calls().is_empty());
}

#[tokio::test]
async fn test_deploy_with_absent_function_fails() {
    let cloud = InMemoryCloud::new("eu-west-1", "123456789012");
    let err = execute(&app(&cloud), parse(&["deploy", "-f", "billing"]))
        .await
        .unwrap_err();
    assert!(matches!(err, SedaError::FunctionNotFound { name } if name == "billing"));
}

#[tokio::test]
async fn test_deploy_and_remove_restore_function_name() {
    let cloud = InMemoryCloud::new("eu-west-1", "123456789012");
    cloud.add_function("billing");
    let app = app(&cloud);

    let status = execute(&app, parse(&["deploy", "-f", "billing"])).await.unwrap();
    assert_eq!(status, 0);
    assert!(app.is_sync());
    assert_eq!(cloud.topic_arns().len(), 1);

    let status = execute(&app, parse(&["remove", "--yes", "-f", "billing"]))
        .await
        .unwrap();
    assert_eq!(status, 0);
    assert!(app.is_sync());
    assert!(cloud.topic_arns().is_empty());
    assert!(!cloud.has_role("seda-schedule-eu-west-1-f-billing"));
}

#[tokio::test]
async fn test_shell_invokes_function_synchronously() {
    let cloud = InMemoryCloud::new("eu-west-1", "123456789012");
    cloud.add_function("billing");
    cloud.set_invoke_log("hello\nREPORT RequestId: 1\tDuration: 1 ms\n");
    let app = app(&cloud);

    let status = execute(&app, parse(&["shell", "echo hello", "-f", "billing"]))
        .await
        .unwrap();
    assert_eq!(status, 0);

    let invocations = cloud.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].invocation_type, "RequestResponse");
    assert_eq!(invocations[0].payload, json!({ "shell": "echo hello" }));
}

#[tokio::test]
async fn test_python_against_missing_function_fails() {
    let cloud = InMemoryCloud::new("eu-west-1", "123456789012");
    let err = execute(&app(&cloud), parse(&["python", "print(1)", "-f", "ghost"]))
        .await
        .unwrap_err();
    assert!(matches!(err, SedaError::FunctionNotFound { .. }));
}

#[test]
fn test_load_app_runs_registered_setup() {
    let _lock = GLOBAL_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    Seda::reset_global();

    let catalog = AppCatalog::new().register("billing.app:seda", |app: &Arc<Seda>| {
        app.task(
            TaskPath::new("billing::jobs", "charge"),
            TaskHandler::blocking(|_| Ok(json!(null))),
        )?;
        Ok(())
    });

    let app = load_app(SedaConfig::default(), Some("billing.app:seda"), &catalog).unwrap();
    assert_eq!(app.registry().tasks().unwrap().len(), 1);
    assert!(Arc::ptr_eq(&app, &Seda::global().unwrap()));

    Seda::reset_global();
}

#[test]
fn test_load_app_rejects_unknown_path() {
    let _lock = GLOBAL_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    Seda::reset_global();

    let catalog = AppCatalog::new();
    let err = load_app(SedaConfig::default(), Some("billing.app:seda"), &catalog).unwrap_err();
    assert!(matches!(err, SedaError::ImportPath(_)));
    let err = load_app(SedaConfig::default(), Some("billing.app"), &catalog).unwrap_err();
    assert!(matches!(err, SedaError::ImportPath(_)));
    assert!(Seda::global().is_none());

    let app = load_app(SedaConfig::default(), None, &catalog).unwrap();
    assert!(app.registry().tasks().unwrap().is_empty());

    Seda::reset_global();
}

#[tokio::test]
async fn test_run_loads_config_from_app_dir() {
    let _lock = GLOBAL_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    Seda::reset_global();

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("seda.toml"),
        "[app]\nfunction_name = \"billing\"\n\n[remote]\nregion = \"eu-west-1\"\n",
    )
    .unwrap();
    let app_dir = dir.path().to_str().unwrap();
    let cli = Cli::try_parse_from(["seda", "deploy", "--app-dir", app_dir]).unwrap();

    // 内存后端中没有这个函数，命令以失败状态结束
    run(cli, &AppCatalog::new()).await.unwrap();
    let app = Seda::global().unwrap();
    assert_eq!(app.config().app.function_name.as_deref(), Some("billing"));
    assert_eq!(app.client().region(), "eu-west-1");

    Seda::reset_global();
}

#[tokio::test]
async fn test_run_rejects_missing_config_file() {
    let cli = Cli::try_parse_from(["seda", "deploy", "--config", "/nonexistent/seda.toml"]).unwrap();
    assert!(run(cli, &AppCatalog::new()).await.is_err());
}
