use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use seda_core::models::TaskArgs;
use seda_core::{SedaError, SedaResult};

pub type BlockingFn = dyn Fn(TaskArgs) -> SedaResult<Value> + Send + Sync;
pub type AsyncFn = dyn Fn(TaskArgs) -> BoxFuture<'static, SedaResult<Value>> + Send + Sync;

/// 任务函数
///
/// 调用约定在登记时由调用方声明，而不是在运行时探测：
/// - `Blocking`: 普通同步函数，在异步上下文中被放到阻塞线程池执行
/// - `Async`: 返回 future 的函数，在同步上下文中由一次性工作线程上的独立运行时驱动
#[derive(Clone)]
pub enum TaskHandler {
    Blocking(Arc<BlockingFn>),
    Async(Arc<AsyncFn>),
}

impl TaskHandler {
    pub fn blocking<F>(f: F) -> Self
    where
        F: Fn(TaskArgs) -> SedaResult<Value> + Send + Sync + 'static,
    {
        Self::Blocking(Arc::new(f))
    }

    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(TaskArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = SedaResult<Value>> + Send + 'static,
    {
        Self::Async(Arc::new(move |args| Box::pin(f(args))))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }

    /// 在异步上下文中执行
    pub async fn invoke(&self, args: TaskArgs) -> SedaResult<Value> {
        match self {
            Self::Blocking(f) => {
                let f = Arc::clone(f);
                tokio::task::spawn_blocking(move || f(args))
                    .await
                    .map_err(|e| SedaError::task_execution(format!("任务线程异常退出: {e}")))?
            }
            Self::Async(f) => f(args).await,
        }
    }

    /// 在同步上下文中执行
    ///
    /// 异步函数交给一个新线程，在该线程上新建单线程运行时执行，完成后运行时随线程销毁。
    /// 调用方即使已处于某个运行时内也不会嵌套阻塞。
    pub fn invoke_blocking(&self, args: TaskArgs) -> SedaResult<Value> {
        match self {
            Self::Blocking(f) => f(args),
            Self::Async(f) => {
                let future = f(args);
                std::thread::spawn(move || {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                        .map_err(|e| SedaError::task_execution(format!("创建运行时失败: {e}")))?;
                    runtime.block_on(future)
                })
                .join()
                .map_err(|_| SedaError::task_execution("任务线程发生 panic"))?
            }
        }
    }
}

impl fmt::Debug for TaskHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocking(_) => f.write_str("TaskHandler::Blocking"),
            Self::Async(_) => f.write_str("TaskHandler::Async"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn double() -> TaskHandler {
        TaskHandler::blocking(|args: TaskArgs| Ok(json!(args.arg::<i64>(0)? * 2)))
    }

    fn async_double() -> TaskHandler {
        TaskHandler::from_async(|args: TaskArgs| async move {
            tokio::task::yield_now().await;
            Ok::<_, SedaError>(json!(args.arg::<i64>(0)? * 2))
        })
    }

    #[tokio::test]
    async fn test_invoke_both_conventions() {
        let args = TaskArgs::new().with_arg(21);
        assert_eq!(double().invoke(args.clone()).await.unwrap(), json!(42));
        assert_eq!(async_double().invoke(args).await.unwrap(), json!(42));
        assert!(async_double().is_async());
        assert!(!double().is_async());
    }

    #[test]
    fn test_invoke_blocking_outside_runtime() {
        let args = TaskArgs::new().with_arg(5);
        assert_eq!(async_double().invoke_blocking(args.clone()).unwrap(), json!(10));
        assert_eq!(double().invoke_blocking(args).unwrap(), json!(10));
    }

    #[tokio::test]
    async fn test_invoke_blocking_inside_runtime() {
        let result = async_double().invoke_blocking(TaskArgs::new().with_arg(1));
        assert_eq!(result.unwrap(), json!(2));
    }

    #[tokio::test]
    async fn test_task_errors_propagate() {
        let failing = TaskHandler::blocking(|_| Err(SedaError::task_execution("boom")));
        let err = failing.invoke(TaskArgs::new()).await.unwrap_err();
        assert!(matches!(err, SedaError::TaskExecution(_)));
    }
}
