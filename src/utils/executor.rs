//! 跨平台命令执行器
//!
//! 所有外部工具（venv、pip、jupyter）都通过这里启动。
//! `exec_with_env` 继承父进程的 stdin/stdout/stderr；
//! `capture_with_env` 收集输出供调用方解析。

use crate::error::{Result, SetupError};
use std::collections::HashMap;
use std::path::Path;
use std::process::{Command, Stdio};

/// 子进程输出
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// 成功输出
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// 失败输出
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// 合并 stdout 与 stderr，原样保留用于报错
    pub fn combined(&self) -> String {
        match (self.stdout.trim(), self.stderr.trim()) {
            ("", err) => err.to_string(),
            (out, "") => out.to_string(),
            (out, err) => format!("{}\n{}", out, err),
        }
    }

    /// 非零退出码转换为 `CommandFailed`
    pub fn into_result(self, program: &Path) -> Result<CommandOutput> {
        if self.success() {
            Ok(self)
        } else {
            Err(SetupError::CommandFailed {
                program: program.display().to_string(),
                code: self.code,
                output: self.combined(),
            })
        }
    }
}

/// 外部命令运行接口
///
/// 各步骤只依赖该接口，测试中用假实现替换。
pub trait CommandRunner {
    /// 执行命令并继承标准流，返回退出码
    fn exec_with_env(
        &self,
        program: &Path,
        args: &[String],
        env_vars: &HashMap<String, String>,
    ) -> Result<i32>;

    /// 执行命令并捕获输出
    fn capture_with_env(
        &self,
        program: &Path,
        args: &[String],
        env_vars: &HashMap<String, String>,
    ) -> Result<CommandOutput>;
}

/// 基于 `std::process::Command` 的执行器
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandExecutor;

impl CommandExecutor {
    fn build(program: &Path, args: &[String], env_vars: &HashMap<String, String>) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args);

        // 子进程默认继承当前环境，这里只覆盖显式传入的变量
        for (key, value) in env_vars {
            cmd.env(key, value);
        }

        cmd
    }

    fn not_found(program: &Path, err: std::io::Error) -> SetupError {
        match err.kind() {
            std::io::ErrorKind::NotFound => SetupError::CommandNotFound(format!(
                "{}: {} (请确保命令在 PATH 中或使用完整路径)",
                program.display(),
                err
            )),
            std::io::ErrorKind::PermissionDenied => {
                SetupError::PermissionDenied(format!("{}: {}", program.display(), err))
            }
            _ => SetupError::Io(err),
        }
    }
}

impl CommandRunner for CommandExecutor {
    fn exec_with_env(
        &self,
        program: &Path,
        args: &[String],
        env_vars: &HashMap<String, String>,
    ) -> Result<i32> {
        tracing::debug!(program = %program.display(), ?args, "执行命令");

        let status = Self::build(program, args, env_vars)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| Self::not_found(program, e))?;

        // 被信号终止时没有退出码
        Ok(status.code().unwrap_or(130))
    }

    fn capture_with_env(
        &self,
        program: &Path,
        args: &[String],
        env_vars: &HashMap<String, String>,
    ) -> Result<CommandOutput> {
        tracing::debug!(program = %program.display(), ?args, "执行命令 (捕获输出)");

        let output = Self::build(program, args, env_vars)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Self::not_found(program, e))?;

        Ok(CommandOutput {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// 将字符串切片转换为参数列表
pub fn args<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}
