use std::sync::{Arc, RwLock};

use crate::{SedaError, SedaResult};

/// 当前的目标函数
///
/// 未设置函数名时处于同步模式：任务在本进程内直接执行。CLI 可以通过
/// [`FunctionTarget::override_with`] 在命令执行期间临时替换函数名。
#[derive(Debug, Clone, Default)]
pub struct FunctionTarget {
    name: Arc<RwLock<Option<String>>>,
}

impl FunctionTarget {
    pub fn new(name: Option<String>) -> Self {
        Self {
            name: Arc::new(RwLock::new(name)),
        }
    }

    fn current(&self) -> Option<String> {
        match self.name.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace(&self, name: Option<String>) -> Option<String> {
        let mut guard = match self.name.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::replace(&mut *guard, name)
    }

    pub fn is_sync(&self) -> bool {
        self.current().is_none()
    }

    pub fn get(&self) -> Option<String> {
        self.current()
    }

    /// 目标函数名，同步模式下返回配置错误
    pub fn function_name(&self) -> SedaResult<String> {
        self.current()
            .ok_or_else(|| SedaError::config_error("需要指定 Lambda 函数名"))
    }

    /// 临时替换函数名，返回的守卫在析构时恢复原值
    #[must_use = "守卫析构时立即恢复原函数名"]
    pub fn override_with(&self, name: impl Into<String>) -> FunctionOverride {
        let previous = self.replace(Some(name.into()));
        FunctionOverride {
            target: self.clone(),
            previous: Some(previous),
        }
    }
}

/// [`FunctionTarget::override_with`] 的守卫
#[derive(Debug)]
pub struct FunctionOverride {
    target: FunctionTarget,
    previous: Option<Option<String>>,
}

impl Drop for FunctionOverride {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.target.replace(previous);
        }
    }
}
