//! # Seda
//!
//! 把普通函数登记为可远程分发的任务，通过消息主题、直接调用或定时触发执行，
//! 并维护分发依赖的远程资源（角色、策略、主题、定时分组）。
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use seda::{Seda, SedaConfig, TaskArgs, TaskHandler, task_path};
//! use serde_json::json;
//!
//! fn send_email(args: seda::TaskArgs) -> seda::SedaResult<serde_json::Value> {
//!     let to: String = args.arg(0)?;
//!     Ok(json!({ "sent": to }))
//! }
//!
//! # async fn demo() -> seda::SedaResult<()> {
//! let app: Arc<Seda> = Seda::builder(SedaConfig::default()).init()?;
//! let task = app.task(task_path!(send_email), TaskHandler::blocking(send_email))?;
//! task.call(TaskArgs::new().with_arg("ops@example.com")).await?;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod cli;

pub use app::{Seda, SedaBuilder, TaskHandle, TaskOutcome};
pub use seda_core::models::{InvocationContext, Schedule, ScheduleOptions, TaskArgs, TaskPath};
pub use seda_core::{task_path, DispatchService, SedaConfig, SedaError, SedaResult};
pub use seda_dispatcher::DeployReport;
pub use seda_domain::TaskHandler;
pub use seda_worker::{DefaultHandler, DispatchReceipt, RemoteCommand};
