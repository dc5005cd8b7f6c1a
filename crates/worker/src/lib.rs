//! 任务运行时
//!
//! - [`DispatchRouter`]: 解析入站事件并在本地执行
//! - [`TaskInvoker`]: 把任务投递到远程函数
//! - [`executors`]: 调试入口使用的子进程执行器

pub mod executors;
pub mod invoker;
pub mod router;

pub use executors::{CodeExecutor, CommandExecutor, CommandOutput, ShellExecutor};
pub use invoker::{format_log_tail, DispatchReceipt, RemoteCommand, TaskInvoker};
pub use router::{route, BasePathHandler, DefaultHandler, DispatchRouter, Route};
