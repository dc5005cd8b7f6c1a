//! 命令行入口
//!
//! - `deploy`: 创建应用需要的全部远程资源，目标函数不存在时以状态码 1 退出
//! - `remove`: 删除这些资源，未加 `--yes` 时先确认
//! - `shell` / `python`: 在目标函数上执行调试命令并打印日志尾部

pub mod catalog;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};

use seda_core::{init_logging, LoggingError, SedaConfig, SedaError, SedaResult};
use seda_worker::{format_log_tail, RemoteCommand};

use crate::app::Seda;
pub use catalog::{split_app_path, AppCatalog, AppSetup};

/// Seda 命令行工具
#[derive(Parser, Debug)]
#[command(name = "seda")]
#[command(about = "Serverless 任务分发与定时调度的资源管理工具")]
#[command(disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// 显示版本信息
    #[arg(long)]
    pub version: bool,

    /// 配置文件路径，未指定时在应用目录中查找 seda.toml
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// 日志级别，覆盖配置文件
    #[arg(long, global = true, value_parser = ["trace", "debug", "info", "warn", "error"])]
    pub log_level: Option<String>,

    /// 日志格式，覆盖配置文件
    #[arg(long, global = true, value_parser = ["json", "pretty", "compact"])]
    pub log_format: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct AppArgs {
    /// 应用路径 (<module>:<attr>)
    #[arg(long = "app", value_name = "MODULE:ATTR")]
    pub path: Option<String>,

    /// 在此目录中查找应用配置
    #[arg(long, default_value = ".")]
    pub app_dir: PathBuf,
}

#[derive(Args, Debug, Clone, Default)]
pub struct FunctionArgs {
    /// Lambda 函数名，覆盖配置
    #[arg(short = 'f', long = "function")]
    pub function: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 部署应用
    Deploy {
        #[command(flatten)]
        app: AppArgs,
        #[command(flatten)]
        function: FunctionArgs,
    },
    /// 删除应用创建的资源
    Remove {
        #[command(flatten)]
        app: AppArgs,
        #[command(flatten)]
        function: FunctionArgs,
        /// 跳过确认
        #[arg(short, long)]
        yes: bool,
    },
    /// 在远程函数中执行 Shell 命令
    Shell {
        #[command(flatten)]
        app: AppArgs,
        #[command(flatten)]
        function: FunctionArgs,
        command: String,
    },
    /// 在远程函数中执行 Python 代码
    Python {
        #[command(flatten)]
        app: AppArgs,
        #[command(flatten)]
        function: FunctionArgs,
        code: String,
    },
}

impl Commands {
    pub fn app_args(&self) -> &AppArgs {
        match self {
            Commands::Deploy { app, .. }
            | Commands::Remove { app, .. }
            | Commands::Shell { app, .. }
            | Commands::Python { app, .. } => app,
        }
    }

    pub fn function_args(&self) -> &FunctionArgs {
        match self {
            Commands::Deploy { function, .. }
            | Commands::Remove { function, .. }
            | Commands::Shell { function, .. }
            | Commands::Python { function, .. } => function,
        }
    }
}

pub fn version_info() -> String {
    format!(
        "seda {} - {} {}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

fn confirm(prompt: &str) -> std::io::Result<bool> {
    println!("{prompt} (y/N)");
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

/// 解析 `--app` 并在应用实例上执行登记；未指定时使用只含配置的应用
pub fn load_app(
    config: SedaConfig,
    path: Option<&str>,
    catalog: &AppCatalog,
) -> SedaResult<Arc<Seda>> {
    let setup = path.map(|path| catalog.resolve(path)).transpose()?;
    let app = Seda::builder(config).init()?;
    if let Some(setup) = setup {
        setup(&app)?;
    }
    Ok(app)
}

/// 命令失败时的退出状态
pub const EXIT_FAILURE: u8 = 1;

fn report_failure(err: &SedaError) -> u8 {
    match err {
        SedaError::FunctionNotFound { .. } | SedaError::ImportPath(_) => {
            error!("{}", err);
        }
        other => {
            error!("{}: {}", other.user_message(), other);
        }
    }
    EXIT_FAILURE
}

/// 重复初始化时沿用已有的订阅者，其他失败打印到标准错误
fn report_logging_setup(result: Result<(), LoggingError>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) if err.is_already_initialized() => true,
        Err(err) => {
            eprintln!("日志初始化失败: {err}");
            false
        }
    }
}

async fn invoke_remote(app: &Seda, command: RemoteCommand) -> SedaResult<()> {
    let response = app.run_remote(&command).await?;
    if let Some(error) = &response.function_error {
        warn!("远程函数返回错误: {}", error);
    }
    match response.log_result.as_deref() {
        Some(log) => println!("{}", format_log_tail(log)?),
        None => warn!("远程调用没有返回日志"),
    }
    Ok(())
}

/// 在已加载的应用上执行子命令
///
/// `--function` 只在命令执行期间生效，命令结束后恢复原函数名。返回进程退出状态。
pub async fn execute(app: &Seda, command: Commands) -> SedaResult<u8> {
    let _guard = command
        .function_args()
        .function
        .clone()
        .map(|name| app.override_function(name));
    if app.is_sync() {
        error!("需要指定 Lambda 函数名 (--function 或 AWS_LAMBDA_FUNCTION_NAME)");
        return Ok(EXIT_FAILURE);
    }

    match command {
        Commands::Deploy { .. } => {
            let report = app.deploy().await?;
            info!("创建了 {} 个定时任务", report.schedule_arns.len());
        }
        Commands::Remove { yes, .. } => {
            if !yes {
                let confirmed = confirm("确定要删除应用的全部资源吗?")
                    .map_err(|e| SedaError::Internal(format!("读取确认输入失败: {e}")))?;
                if !confirmed {
                    println!("已取消删除操作");
                    return Ok(EXIT_FAILURE);
                }
            }
            app.remove().await?;
        }
        Commands::Shell { command, .. } => {
            invoke_remote(app, RemoteCommand::Shell(command)).await?;
        }
        Commands::Python { code, .. } => {
            invoke_remote(app, RemoteCommand::Code(code)).await?;
        }
    }
    Ok(0)
}

/// 命令行主流程：加载配置、初始化日志、加载应用并执行子命令
pub async fn run(cli: Cli, catalog: &AppCatalog) -> Result<ExitCode> {
    if cli.version {
        println!("{}", version_info());
        return Ok(ExitCode::SUCCESS);
    }
    let Some(command) = cli.command else {
        <Cli as clap::CommandFactory>::command()
            .print_help()
            .context("打印帮助信息失败")?;
        return Ok(ExitCode::SUCCESS);
    };

    let app_args = command.app_args().clone();
    let config = SedaConfig::load_with(cli.config.as_deref(), Some(&app_args.app_dir))
        .context("加载配置失败")?;

    let log_level = cli
        .log_level
        .unwrap_or_else(|| config.observability.log_level.clone());
    let log_format = cli
        .log_format
        .unwrap_or_else(|| config.observability.log_format.clone());
    report_logging_setup(init_logging(&log_level, &log_format));

    let app = match load_app(config, app_args.path.as_deref(), catalog) {
        Ok(app) => app,
        Err(err) => {
            error!("应用无法加载");
            return Ok(ExitCode::from(report_failure(&err)));
        }
    };

    let status = match execute(&app, command).await {
        Ok(status) => status,
        Err(err) => report_failure(&err),
    };
    Ok(ExitCode::from(status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        <Cli as clap::CommandFactory>::command().debug_assert();
    }

    #[test]
    fn test_logging_setup_reports_only_unexpected_failures() {
        assert!(report_logging_setup(Ok(())));
        assert!(report_logging_setup(Err(LoggingError::AlreadyInitialized)));
        assert!(!report_logging_setup(Err(LoggingError::UnsupportedFormat(
            "xml".to_string()
        ))));
        assert!(!report_logging_setup(Err(LoggingError::InvalidFilter {
            directive: "=[".to_string(),
            reason: "bad".to_string(),
        })));
    }

    #[test]
    fn test_version_info_names_package() {
        assert!(version_info().starts_with(&format!("seda {}", env!("CARGO_PKG_VERSION"))));
    }
}
