use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use seda_core::{SedaError, SedaResult};

use crate::app::Seda;

/// 在应用实例上登记任务与定时任务的函数
pub type AppSetup = Arc<dyn Fn(&Arc<Seda>) -> SedaResult<()> + Send + Sync>;

/// `--app <module:attr>` 可加载的应用
///
/// 嵌入方的可执行文件在启动 CLI 前按导入路径登记应用；CLI 按路径取出并在
/// 进程级实例上执行登记函数。
#[derive(Clone, Default)]
pub struct AppCatalog {
    apps: BTreeMap<String, AppSetup>,
}

/// 拆分 `<module>:<attr>` 形式的应用路径
pub fn split_app_path(path: &str) -> SedaResult<(&str, &str)> {
    match path.rsplit_once(':') {
        Some((module, attr)) if !module.is_empty() && !attr.is_empty() => Ok((module, attr)),
        _ => Err(SedaError::import_path(format!(
            "应用路径 \"{path}\" 必须是 \"<mod>:<attr>\" 格式"
        ))),
    }
}

impl AppCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(mut self, path: impl Into<String>, setup: F) -> Self
    where
        F: Fn(&Arc<Seda>) -> SedaResult<()> + Send + Sync + 'static,
    {
        self.apps.insert(path.into(), Arc::new(setup));
        self
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.apps.keys().map(String::as_str)
    }

    pub fn resolve(&self, path: &str) -> SedaResult<AppSetup> {
        let (module, attr) = split_app_path(path)?;
        self.apps.get(path).cloned().ok_or_else(|| {
            SedaError::import_path(format!("模块 \"{module}\" 中找不到应用 \"{attr}\""))
        })
    }
}

impl fmt::Debug for AppCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.apps.keys()).finish()
    }
}
