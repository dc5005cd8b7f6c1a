//! 远程资源栈的对账编排
//!
//! - [`StackResources`]: 单项资源的创建与删除
//! - [`Reconciler`]: 按依赖顺序幂等地部署与拆除整套资源

pub mod reconciler;
pub mod stack;

pub use reconciler::{DeployReport, Reconciler, StackReconciler};
pub use stack::StackResources;
