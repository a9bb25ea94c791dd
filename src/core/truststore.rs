//! 证书路径配置
//!
//! 证书路径作为显式的 `TrustStore` 值在各步骤之间传递，
//! 只有在最外层（main）才读取或写入进程级环境变量。

use crate::config::settings::TrustSettings;
use crate::error::{Result, SetupError};
use crate::utils::executor::{CommandRunner, args};
use crate::utils::paths::file_exists;
use crate::utils::system_env::UserEnvStore;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// 证书变量及其指向的文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustStore {
    variable: String,
    path: PathBuf,
}

impl TrustStore {
    /// 创建并校验：路径必须是已存在的文件
    pub fn new(variable: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !file_exists(&path) {
            return Err(SetupError::CertificateMissing(path));
        }
        Ok(Self {
            variable: variable.into(),
            path,
        })
    }

    /// 从当前进程环境读取（仅在最外层使用）
    ///
    /// 变量未设置时返回 None；指向不存在的文件时报错。
    pub fn from_ambient(variable: &str) -> Result<Option<Self>> {
        match std::env::var_os(variable).filter(|v| !v.is_empty()) {
            Some(value) => Self::new(variable, PathBuf::from(value)).map(Some),
            None => Ok(None),
        }
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 子进程需要注入的变量
    pub fn env_vars(&self) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        self.apply_to(&mut vars);
        vars
    }

    /// 写入给定的变量表
    pub fn apply_to(&self, vars: &mut HashMap<String, String>) {
        vars.insert(self.variable.clone(), self.path.display().to_string());
    }
}

/// 可选证书的变量表
pub fn env_vars(trust: Option<&TrustStore>) -> HashMap<String, String> {
    trust.map(TrustStore::env_vars).unwrap_or_default()
}

/// 证书路径配置器
pub struct TrustStoreConfigurator<'a, R: CommandRunner> {
    runner: &'a R,
    settings: &'a TrustSettings,
}

impl<'a, R: CommandRunner> TrustStoreConfigurator<'a, R> {
    pub fn new(runner: &'a R, settings: &'a TrustSettings) -> Self {
        Self { runner, settings }
    }

    /// 向环境中的证书包查询路径
    pub fn query_bundle(&self, python: &Path) -> Result<PathBuf> {
        let script = format!(
            "import {pkg}; print({pkg}.where())",
            pkg = self.settings.package
        );
        let output = self
            .runner
            .capture_with_env(python, &args(["-c".to_string(), script]), &HashMap::new())?
            .into_result(python)?;

        let path = output.stdout.trim();
        if path.is_empty() {
            return Err(SetupError::Parse(format!(
                "{} 没有返回证书路径",
                self.settings.package
            )));
        }
        Ok(PathBuf::from(path))
    }

    /// 查询并校验证书路径
    pub fn configure(&self, python: &Path) -> Result<TrustStore> {
        let bundle = self.query_bundle(python)?;
        let trust = TrustStore::new(&self.settings.variable, bundle)?;
        tracing::debug!(variable = trust.variable(), path = %trust.path().display(), "证书路径已确定");
        Ok(trust)
    }

    /// 持久化到用户级配置
    pub fn persist(&self, trust: &TrustStore, store: &dyn UserEnvStore) -> Result<()> {
        store.set_var(trust.variable(), &trust.path().display().to_string())
    }

    /// 清除用户级配置中的值
    pub fn clear(&self, store: &dyn UserEnvStore) -> Result<()> {
        store.unset_var(&self.settings.variable)
    }
}
