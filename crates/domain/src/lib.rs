//! # 任务身份与注册表
//!
//! 把普通函数登记为可按字符串路径寻址的任务，并对定时任务按完整参数判重。
//!
//! - [`TaskHandler`]: 任务函数的两种调用约定（阻塞 / 异步）
//! - [`TaskRegistry`]: 任务列表、定时任务列表与路径索引

pub mod handler;
pub mod registry;

pub use handler::TaskHandler;
pub use registry::{Task, TaskRegistry};
pub use seda_core::{SedaError, SedaResult};
