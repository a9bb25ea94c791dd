//! 虚拟环境管理
//!
//! 环境是否有效只看内部解释器是否存在。无效目录会被整体删除后重建。

use crate::error::{Result, SetupError};
use crate::utils::executor::{CommandRunner, args};
use crate::utils::paths::file_exists;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// 隔离的包环境
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    root: PathBuf,
}

impl Environment {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 环境内的解释器路径
    pub fn python(&self) -> PathBuf {
        if cfg!(target_os = "windows") {
            self.root.join("Scripts").join("python.exe")
        } else {
            self.root.join("bin").join("python")
        }
    }

    /// 有效性 = 内部解释器存在
    pub fn is_valid(&self) -> bool {
        file_exists(&self.python())
    }

    /// 返回有效环境的解释器（绝对路径），否则报错
    ///
    /// 内核描述与子进程都可能在其他工作目录下使用这个路径。
    pub fn require_python(&self) -> Result<PathBuf> {
        if self.is_valid() {
            Ok(std::path::absolute(self.python())?)
        } else {
            Err(SetupError::EnvironmentMissing(self.root.clone()))
        }
    }
}

/// `ensure` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    AlreadyValid,
    Created,
    /// 删除了无效目录后重建
    Recreated,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::AlreadyValid => write!(f, "已存在且有效"),
            Outcome::Created => write!(f, "已创建"),
            Outcome::Recreated => write!(f, "已重建"),
        }
    }
}

/// 环境创建器
pub struct EnvironmentProvisioner<'a, R: CommandRunner> {
    runner: &'a R,
}

impl<'a, R: CommandRunner> EnvironmentProvisioner<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self { runner }
    }

    /// 确保环境存在且有效（幂等）
    ///
    /// `force` 为 true 时即使有效也删除重建。
    pub fn ensure(&self, env: &Environment, interpreter: &Path, force: bool) -> Result<Outcome> {
        let root = env.root();

        if env.is_valid() && !force {
            tracing::debug!(dir = %root.display(), "虚拟环境有效，跳过");
            return Ok(Outcome::AlreadyValid);
        }

        let existed = root.exists();
        if existed {
            tracing::warn!(dir = %root.display(), "删除无效或需重建的虚拟环境");
            std::fs::remove_dir_all(root)?;
        }

        self.create(env, interpreter)?;

        Ok(if existed {
            Outcome::Recreated
        } else {
            Outcome::Created
        })
    }

    fn create(&self, env: &Environment, interpreter: &Path) -> Result<()> {
        let root = env.root();
        let venv_args = args(["-m".to_string(), "venv".to_string(), root.display().to_string()]);

        let output = self
            .runner
            .capture_with_env(interpreter, &venv_args, &HashMap::new())?;

        if !output.success() {
            return Err(SetupError::EnvironmentCreation {
                dir: root.to_path_buf(),
                output: output.combined(),
            });
        }

        // venv 成功返回但没有生成解释器（例如缺少 ensurepip 的精简发行版）
        if !env.is_valid() {
            return Err(SetupError::EnvironmentCreation {
                dir: root.to_path_buf(),
                output: format!("未生成解释器: {}", env.python().display()),
            });
        }

        Ok(())
    }
}
