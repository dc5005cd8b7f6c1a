use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDateTime;
use serde_json::Value;
use tracing::{debug, info};

use seda_core::models::{InvocationContext, Schedule, ScheduleOptions, TaskArgs, TaskPath};
use seda_core::{
    DispatchService, FunctionOverride, FunctionTarget, RemoteConfig, ResourceNames, SedaConfig,
    SedaError, SedaResult, Session,
};
use seda_dispatcher::{DeployReport, Reconciler, StackReconciler, StackResources};
use seda_domain::{Task, TaskHandler, TaskRegistry};
use seda_infrastructure::types::{CreateScheduleResponse, InvokeResponse};
use seda_infrastructure::{InMemoryCloud, RemoteClient, ResourceLocator};
use seda_worker::{
    BasePathHandler, CommandExecutor, DefaultHandler, DispatchReceipt, DispatchRouter,
    RemoteCommand, TaskInvoker,
};

/// 内存后端未配置账号时使用的占位账号
const MEMORY_ACCOUNT_ID: &str = "000000000000";

static GLOBAL_APP: Mutex<Option<Arc<Seda>>> = Mutex::new(None);

fn session_from_config(remote: &RemoteConfig) -> SedaResult<Arc<dyn Session>> {
    let credentials = remote
        .credentials()
        .map_err(|e| SedaError::config_error(e.to_string()))?;
    match remote.backend.as_str() {
        "memory" => {
            let mut cloud = InMemoryCloud::new(
                remote.region_or_default(),
                remote
                    .account_id
                    .clone()
                    .unwrap_or_else(|| MEMORY_ACCOUNT_ID.to_string()),
            );
            if let Some(profile) = &remote.profile {
                cloud = cloud.with_profile(profile.clone());
            }
            if let Some(credentials) = credentials {
                cloud = cloud.with_credentials(credentials);
            }
            Ok(Arc::new(cloud))
        }
        other => Err(SedaError::config_error(format!("不支持的远程后端: {other}"))),
    }
}

/// [`Seda`] 的构建器
pub struct SedaBuilder {
    config: SedaConfig,
    session: Option<Arc<dyn Session>>,
    default_handler: Option<Arc<dyn DefaultHandler>>,
    shell_executor: Option<Arc<dyn CommandExecutor>>,
    code_executor: Option<Arc<dyn CommandExecutor>>,
}

impl SedaBuilder {
    pub fn new(config: SedaConfig) -> Self {
        Self {
            config,
            session: None,
            default_handler: None,
            shell_executor: None,
            code_executor: None,
        }
    }

    /// 指定远程会话；未指定时按 `remote.backend` 创建
    pub fn session(mut self, session: Arc<dyn Session>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn default_handler(mut self, handler: Arc<dyn DefaultHandler>) -> Self {
        self.default_handler = Some(handler);
        self
    }

    pub fn shell_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.shell_executor = Some(executor);
        self
    }

    pub fn code_executor(mut self, executor: Arc<dyn CommandExecutor>) -> Self {
        self.code_executor = Some(executor);
        self
    }

    /// 构建独立的应用实例，不影响进程级实例
    pub fn build(self) -> SedaResult<Seda> {
        let config = self.config;
        let session = match self.session {
            Some(session) => session,
            None => session_from_config(&config.remote)?,
        };
        let region = session.region().to_string();
        let target = FunctionTarget::new(config.app.function_name.clone());
        let names = ResourceNames::new(&config.naming, region.clone(), target.clone());

        let client = Arc::new(RemoteClient::new(session));
        let locator = Arc::new(ResourceLocator::new(
            Arc::clone(&client),
            config.remote.account_id.clone(),
        ));
        let stack = Arc::new(StackResources::new(
            Arc::clone(&client),
            Arc::clone(&locator),
            names.clone(),
            &config.reconcile,
        )?);
        let reconciler = Reconciler::new(Arc::clone(&stack));
        let invoker = TaskInvoker::new(Arc::clone(&client), locator, names);

        let registry = Arc::new(TaskRegistry::new());
        let mut router = DispatchRouter::new(Arc::clone(&registry), &config.dispatch);
        if let Some(handler) = self.default_handler {
            router = router
                .with_default_handler(BasePathHandler::wrap(&config.app.api_base_path, handler));
        }
        if let Some(executor) = self.shell_executor {
            router = router.with_shell_executor(executor);
        }
        if let Some(executor) = self.code_executor {
            router = router.with_code_executor(executor);
        }

        info!(
            "初始化应用 {}: region={}, function={:?}",
            config.app.name,
            region,
            target.get()
        );
        Ok(Seda {
            config,
            target,
            registry,
            client,
            stack,
            reconciler,
            invoker,
            router,
        })
    }

    /// 构建进程级实例
    ///
    /// 第一次成功构建的实例被保存下来，之后的调用直接返回它，本次构建器的参数被忽略。
    pub fn init(self) -> SedaResult<Arc<Seda>> {
        let mut slot = GLOBAL_APP.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(app) = slot.as_ref() {
            debug!("应用已初始化，复用已有实例");
            return Ok(Arc::clone(app));
        }
        let app = Arc::new(self.build()?);
        *slot = Some(Arc::clone(&app));
        Ok(app)
    }
}

/// 应用对象
///
/// 持有任务注册表、目标函数、远程客户端以及建立在其上的对账器、出站投递器和入站分发器。
/// 进程内通常只有一个实例，通过 [`SedaBuilder::init`] 获得。
pub struct Seda {
    config: SedaConfig,
    target: FunctionTarget,
    registry: Arc<TaskRegistry>,
    client: Arc<RemoteClient>,
    stack: Arc<StackResources>,
    reconciler: Reconciler,
    invoker: TaskInvoker,
    router: DispatchRouter,
}

impl Seda {
    pub fn builder(config: SedaConfig) -> SedaBuilder {
        SedaBuilder::new(config)
    }

    /// 进程级实例，尚未初始化时返回 `None`
    pub fn global() -> Option<Arc<Seda>> {
        GLOBAL_APP
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 丢弃进程级实例，之后的 [`SedaBuilder::init`] 会重新构建
    pub fn reset_global() {
        GLOBAL_APP
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn config(&self) -> &SedaConfig {
        &self.config
    }

    pub fn target(&self) -> &FunctionTarget {
        &self.target
    }

    pub fn is_sync(&self) -> bool {
        self.target.is_sync()
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn client(&self) -> &Arc<RemoteClient> {
        &self.client
    }

    pub fn stack(&self) -> &Arc<StackResources> {
        &self.stack
    }

    pub fn router(&self) -> &DispatchRouter {
        &self.router
    }

    pub async fn account_id(&self) -> SedaResult<String> {
        self.stack.locator().account_id().await
    }

    /// 资源 ARN，`key` 形如 `iam:role/x`、`lambda:function:x`
    pub async fn arn(&self, key: &str) -> SedaResult<String> {
        self.stack.locator().arn(key).await
    }

    /// 在守卫存活期间把目标函数临时换成 `name`
    pub fn override_function(&self, name: impl Into<String>) -> FunctionOverride {
        self.target.override_with(name)
    }

    /// 登记任务，出站时使用配置的默认投递方式
    pub fn task(self: &Arc<Self>, path: TaskPath, handler: TaskHandler) -> SedaResult<TaskHandle> {
        let service = self.config.dispatch.default_service;
        self.task_with_service(path, handler, service)
    }

    pub fn task_with_service(
        self: &Arc<Self>,
        path: TaskPath,
        handler: TaskHandler,
        service: DispatchService,
    ) -> SedaResult<TaskHandle> {
        let task = self.registry.register_task(path, handler)?;
        Ok(TaskHandle {
            app: Arc::clone(self),
            task,
            service,
        })
    }

    /// 登记定时任务，部署时创建；完全相同的声明返回 [`SedaError::DuplicateSchedule`]
    pub fn schedule(
        &self,
        path: TaskPath,
        expression: impl Into<String>,
        options: ScheduleOptions,
        handler: TaskHandler,
    ) -> SedaResult<Schedule> {
        self.registry
            .register_schedule(Schedule::new(path, expression, options), handler)
    }

    pub async fn deploy(&self) -> SedaResult<DeployReport> {
        let schedules = self.registry.schedules()?;
        self.reconciler.deploy(&schedules).await
    }

    pub async fn remove(&self) -> SedaResult<()> {
        self.reconciler.remove().await
    }

    /// 在目标函数上执行调试命令
    pub async fn run_remote(&self, command: &RemoteCommand) -> SedaResult<InvokeResponse> {
        self.invoker.run_remote(command).await
    }

    /// 函数入口：处理一个入站事件
    pub async fn handle(
        &self,
        event: Value,
        context: &InvocationContext,
    ) -> SedaResult<Option<Value>> {
        self.router.handle(event, context).await
    }

    /// 同步的宿主入口
    pub fn handle_blocking(
        &self,
        event: Value,
        context: &InvocationContext,
    ) -> SedaResult<Option<Value>> {
        self.router.handle_blocking(event, context)
    }
}

impl std::fmt::Debug for Seda {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Seda")
            .field("name", &self.config.app.name)
            .field("region", &self.client.region())
            .field("function", &self.target.get())
            .field("registry", &self.registry)
            .finish()
    }
}

/// 任务调用结果
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// 同步模式下在本进程执行完毕
    Completed(Value),
    /// 已投递到远程执行
    Dispatched(DispatchReceipt),
}

impl TaskOutcome {
    pub fn value(&self) -> Option<&Value> {
        match self {
            TaskOutcome::Completed(value) => Some(value),
            TaskOutcome::Dispatched(_) => None,
        }
    }

    pub fn receipt(&self) -> Option<&DispatchReceipt> {
        match self {
            TaskOutcome::Completed(_) => None,
            TaskOutcome::Dispatched(receipt) => Some(receipt),
        }
    }
}

/// 已登记任务的调用入口
///
/// 每次调用时检查目标函数：同步模式下直接在本进程执行，否则把
/// `{path, args, kwargs}` 投递到消息主题或直接异步调用目标函数。
#[derive(Clone)]
pub struct TaskHandle {
    app: Arc<Seda>,
    task: Task,
    service: DispatchService,
}

impl TaskHandle {
    pub fn path(&self) -> &TaskPath {
        &self.task.path
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn service(&self) -> DispatchService {
        self.service
    }

    pub fn with_service(mut self, service: DispatchService) -> Self {
        self.service = service;
        self
    }

    pub async fn call(&self, args: TaskArgs) -> SedaResult<TaskOutcome> {
        if self.app.is_sync() {
            debug!("同步执行任务 {}", self.task.path);
            return self.task.handler.invoke(args).await.map(TaskOutcome::Completed);
        }
        self.app
            .invoker
            .dispatch(&self.task.path, &args, self.service)
            .await
            .map(TaskOutcome::Dispatched)
    }

    /// 在同步代码中调用
    ///
    /// 远程投递交给一个临时线程上的单线程运行时完成，调用方线程阻塞到投递结束。
    pub fn call_blocking(&self, args: TaskArgs) -> SedaResult<TaskOutcome> {
        if self.app.is_sync() {
            return self
                .task
                .handler
                .invoke_blocking(args)
                .map(TaskOutcome::Completed);
        }
        std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let runtime = tokio::runtime::Builder::new_current_thread()
                        .enable_all()
                        .build()
                        .map_err(|e| SedaError::Internal(format!("创建运行时失败: {e}")))?;
                    runtime.block_on(self.call(args))
                })
                .join()
                .map_err(|_| SedaError::task_execution("投递线程发生 panic"))?
        })
    }

    /// 在 `when` 触发一次，立即在一次性分组中创建定时任务
    pub async fn at(
        &self,
        when: NaiveDateTime,
        options: ScheduleOptions,
    ) -> SedaResult<CreateScheduleResponse> {
        let schedule = Schedule::onetime(self.task.path.clone(), when, options);
        info!("创建一次性定时任务 {}", schedule);
        self.app.stack.create_schedule(&schedule).await
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("path", &self.task.path)
            .field("service", &self.service)
            .finish()
    }
}
