use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{PoisonError, RwLock};

use seda_core::models::{Schedule, TaskPath};
use seda_core::{SedaError, SedaResult};
use tracing::debug;

use crate::handler::TaskHandler;

/// 可寻址的任务
///
/// 相等与哈希只看 `path`。
#[derive(Clone)]
pub struct Task {
    pub path: TaskPath,
    pub handler: TaskHandler,
}

impl Task {
    pub fn new(path: TaskPath, handler: TaskHandler) -> Self {
        Self { path, handler }
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for Task {}

impl Hash for Task {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<@task {}>", self.path)
    }
}

#[derive(Default)]
struct RegistryState {
    /// 声明顺序，仅用于展示
    tasks: Vec<Task>,
    schedules: Vec<Schedule>,
    /// 路径索引，同一路径以首次登记为准
    handlers: HashMap<String, TaskHandler>,
    modules: HashSet<String>,
}

impl RegistryState {
    fn index(&mut self, path: &TaskPath, handler: &TaskHandler) {
        self.modules.insert(path.module().to_string());
        self.handlers
            .entry(path.to_string())
            .or_insert_with(|| handler.clone());
    }
}

fn poison_err<T>(_: PoisonError<T>) -> SedaError {
    SedaError::Internal("任务注册表锁已中毒".to_string())
}

/// 任务注册表
///
/// 启动时登记，之后按路径解析。解析结果直接来自登记时建立的索引，
/// 同一路径每次都得到同一个函数对象。
#[derive(Default)]
pub struct TaskRegistry {
    state: RwLock<RegistryState>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记任务
    ///
    /// 任务列表只追加，同一函数重复登记会得到两个路径相同的条目，不视为错误。
    pub fn register_task(&self, path: TaskPath, handler: TaskHandler) -> SedaResult<Task> {
        let task = Task::new(path, handler);
        let mut state = self.state.write().map_err(poison_err)?;
        state.index(&task.path, &task.handler);
        state.tasks.push(task.clone());
        debug!("登记任务: {}", task.path);
        Ok(task)
    }

    /// 登记定时任务
    ///
    /// 判重键与已有定时任务相同时返回 [`SedaError::DuplicateSchedule`]，此时不做任何远程调用。
    pub fn register_schedule(
        &self,
        schedule: Schedule,
        handler: TaskHandler,
    ) -> SedaResult<Schedule> {
        let mut state = self.state.write().map_err(poison_err)?;
        if state.schedules.iter().any(|existing| existing == &schedule) {
            return Err(SedaError::DuplicateSchedule(schedule.to_string()));
        }
        state.index(&schedule.path, &handler);
        state.schedules.push(schedule.clone());
        debug!("登记定时任务: {}", schedule);
        Ok(schedule)
    }

    /// 按点分路径解析任务函数
    pub fn resolve(&self, path: &str) -> SedaResult<TaskHandler> {
        let parsed = TaskPath::parse(path)?;
        let state = self.state.read().map_err(poison_err)?;

        if let Some(handler) = state.handlers.get(path) {
            return Ok(handler.clone());
        }
        if !state.modules.contains(parsed.module()) {
            return Err(SedaError::import_path(format!(
                "模块 \"{}\" 中没有登记任何任务",
                parsed.module()
            )));
        }
        Err(SedaError::import_path(format!(
            "模块 \"{}\" 中找不到 \"{}\"",
            parsed.module(),
            parsed.name()
        )))
    }

    pub fn tasks(&self) -> SedaResult<Vec<Task>> {
        Ok(self.state.read().map_err(poison_err)?.tasks.clone())
    }

    pub fn schedules(&self) -> SedaResult<Vec<Schedule>> {
        Ok(self.state.read().map_err(poison_err)?.schedules.clone())
    }
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.read() {
            Ok(state) => f
                .debug_struct("TaskRegistry")
                .field("tasks", &state.tasks)
                .field("schedules", &state.schedules.len())
                .finish(),
            Err(_) => f.write_str("TaskRegistry(<poisoned>)"),
        }
    }
}
