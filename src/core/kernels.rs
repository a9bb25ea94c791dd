//! 内核注册
//!
//! 直接在 Jupyter 用户数据目录下写入 `kernels/<id>/kernel.json`。
//! 规范: https://jupyter-client.readthedocs.io/en/latest/kernels.html#kernel-specs

use crate::error::{Result, SetupError};
use crate::utils::paths::{self, read_file, write_file_safe};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// kernel.json 内容
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct KernelSpec {
    /// 启动内核的命令行
    pub argv: Vec<String>,
    /// 界面中显示的名称
    pub display_name: String,
    pub language: String,
    /// 启动内核时设置的环境变量
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl KernelSpec {
    pub fn new(python: &Path, display_name: &str) -> Self {
        Self {
            argv: vec![
                python.display().to_string(),
                "-m".to_string(),
                "ipykernel_launcher".to_string(),
                "-f".to_string(),
                "{connection_file}".to_string(),
            ],
            display_name: display_name.to_string(),
            language: "python".to_string(),
            env: None,
            metadata: Some(serde_json::json!({ "debugger": true })),
        }
    }

    /// 附加环境变量；空表不写入
    pub fn with_env(mut self, vars: HashMap<String, String>) -> Self {
        if !vars.is_empty() {
            self.env = Some(vars.into_iter().collect());
        }
        self
    }

    /// 内核使用的解释器
    pub fn interpreter(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }
}

/// 已注册的内核
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct KernelEntry {
    pub name: String,
    pub resource_dir: PathBuf,
    pub spec: KernelSpec,
}

/// 校验内核 id
pub fn validate_name(name: &str) -> Result<()> {
    static NAME: OnceLock<Regex> = OnceLock::new();
    let re = NAME.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("静态正则"));

    if re.is_match(name) && name != "." && name != ".." {
        Ok(())
    } else {
        Err(SetupError::InvalidKernelName(name.to_string()))
    }
}

/// 用户级内核注册表
#[derive(Debug, Clone)]
pub struct KernelRegistrar {
    kernels_dir: PathBuf,
}

impl KernelRegistrar {
    /// 使用指定的数据目录
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            kernels_dir: data_dir.into().join("kernels"),
        }
    }

    /// 使用当前用户的 Jupyter 数据目录
    pub fn for_user() -> Result<Self> {
        Ok(Self::new(paths::get_jupyter_data_dir()?))
    }

    pub fn kernels_dir(&self) -> &Path {
        &self.kernels_dir
    }

    fn spec_path(&self, name: &str) -> PathBuf {
        self.kernels_dir.join(name).join("kernel.json")
    }

    /// 注册（同名覆盖），返回 kernel.json 路径
    pub fn register(&self, name: &str, spec: &KernelSpec) -> Result<PathBuf> {
        validate_name(name)?;

        let spec_path = self.spec_path(name);
        let spec_json = serde_json::to_string_pretty(spec)?;
        write_file_safe(&spec_path, &spec_json)?;

        tracing::debug!(kernel = name, path = %spec_path.display(), "写入内核描述");
        Ok(spec_path)
    }

    /// 读取单个内核
    pub fn get(&self, name: &str) -> Result<Option<KernelEntry>> {
        validate_name(name)?;
        let spec_path = self.spec_path(name);
        if !spec_path.is_file() {
            return Ok(None);
        }

        let spec: KernelSpec = serde_json::from_str(&read_file(&spec_path)?)?;
        Ok(Some(KernelEntry {
            name: name.to_string(),
            resource_dir: self.kernels_dir.join(name),
            spec,
        }))
    }

    /// 列出所有内核（按 id 排序）；无法解析的条目跳过
    pub fn list(&self) -> Result<Vec<KernelEntry>> {
        if !self.kernels_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for dir in std::fs::read_dir(&self.kernels_dir)? {
            let dir = dir?;
            if !dir.file_type()?.is_dir() {
                continue;
            }
            let name = dir.file_name().to_string_lossy().into_owned();
            match self.get(&name) {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {}
                Err(e) => tracing::warn!(kernel = %name, error = %e, "跳过无法解析的内核"),
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// 卸载内核
    ///
    /// 未注册时：`missing_ok` 为 true 返回 Ok(false)，否则返回 `KernelNotFound`。
    pub fn uninstall(&self, name: &str, missing_ok: bool) -> Result<bool> {
        validate_name(name)?;
        let dir = self.kernels_dir.join(name);

        if !dir.is_dir() {
            return if missing_ok {
                Ok(false)
            } else {
                Err(SetupError::KernelNotFound(name.to_string()))
            };
        }

        std::fs::remove_dir_all(&dir)?;
        Ok(true)
    }
}
