use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command;
use tracing::{info, warn};

use seda_core::{SedaError, SedaResult};

/// 子进程执行结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub execution_time_ms: u64,
}

impl CommandOutput {
    pub fn to_value(&self) -> SedaResult<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// 调试入口的命令执行器
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, source: &str) -> SedaResult<CommandOutput>;

    fn name(&self) -> &str;
}

async fn run_command(program: &str, args: &[String]) -> SedaResult<CommandOutput> {
    let start_time = Instant::now();
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| SedaError::task_execution(format!("启动命令 {program} 失败: {e}")))?;

    let stdout = String::from_utf8_lossy(&output.stdout).trim_end().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).trim_end().to_string();
    // 输出写入日志，远程调用方从日志尾部读取
    for line in stdout.lines() {
        info!("{}", line);
    }
    for line in stderr.lines() {
        warn!("{}", line);
    }

    let result = CommandOutput {
        success: output.status.success(),
        exit_code: output.status.code(),
        stdout,
        stderr,
        execution_time_ms: start_time.elapsed().as_millis() as u64,
    };
    info!(
        "命令执行完成: program={}, success={}, exit_code={:?}, duration={}ms",
        program, result.success, result.exit_code, result.execution_time_ms
    );
    Ok(result)
}

/// Shell 命令执行器，按 shell 规则拆分参数后直接启动进程，不经过 shell 解释
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor;

impl ShellExecutor {
    pub fn new() -> Self {
        Self
    }

    /// 按 shell 引号规则拆分命令行
    pub fn split(command: &str) -> SedaResult<Vec<String>> {
        let parts = shlex::split(command)
            .ok_or_else(|| SedaError::invalid_argument(format!("无法解析命令: {command}")))?;
        if parts.is_empty() {
            return Err(SedaError::invalid_argument("命令为空"));
        }
        Ok(parts)
    }
}

#[async_trait]
impl CommandExecutor for ShellExecutor {
    async fn execute(&self, command: &str) -> SedaResult<CommandOutput> {
        let parts = Self::split(command)?;
        info!("执行Shell命令: {:?}", parts);
        run_command(&parts[0], &parts[1..]).await
    }

    fn name(&self) -> &str {
        "shell"
    }
}

/// 代码执行器：交给配置的解释器以 `-c` 方式执行，无沙箱
#[derive(Debug, Clone)]
pub struct CodeExecutor {
    interpreter: String,
}

impl CodeExecutor {
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }
}

#[async_trait]
impl CommandExecutor for CodeExecutor {
    async fn execute(&self, code: &str) -> SedaResult<CommandOutput> {
        warn!("通过 {} 执行原始代码", self.interpreter);
        run_command(&self.interpreter, &["-c".to_string(), code.to_string()]).await
    }

    fn name(&self) -> &str {
        "code"
    }
}
