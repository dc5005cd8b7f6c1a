//! 配置管理
//!
//! - [`SedaConfig`]: 进程级配置，启动时加载一次
//! - [`FunctionTarget`]: 可在 CLI 命令期间临时覆盖的目标函数名

pub mod models;
pub mod target;

pub use models::*;
pub use target::{FunctionOverride, FunctionTarget};
