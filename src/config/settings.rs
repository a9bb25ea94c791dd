//! nbenv.toml 配置
//!
//! 查找顺序：`--config` > ./nbenv.toml > ~/.nbenv/config.toml > 内置默认值。
//! 首个存在的文件生效，文件中缺省的字段回落到默认值。

use crate::error::{Result, SetupError};
use crate::types::{DiscoveryKind, PinPolicy};
use crate::utils::paths::{self, file_exists, read_file, write_file_safe};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 全部配置
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub environment: EnvironmentSettings,
    pub interpreter: InterpreterSettings,
    pub packages: PackageSettings,
    pub trust: TrustSettings,
    pub kernel: KernelSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnvironmentSettings {
    /// 虚拟环境目录
    pub dir: PathBuf,
    /// 依赖清单文件
    pub manifest: PathBuf,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("venv"),
            manifest: PathBuf::from("requirements.lock"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InterpreterSettings {
    /// 显式指定的解释器（优先级最高）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// 在 PATH 中查找的可执行文件名
    pub names: Vec<String>,
    /// 回退探测的版本，从新到旧
    pub versions: Vec<String>,
    /// 自定义候选路径，非空时替代按版本生成的列表
    pub candidates: Vec<PathBuf>,
    /// 发现策略及其顺序
    pub strategies: Vec<DiscoveryKind>,
}

impl Default for InterpreterSettings {
    fn default() -> Self {
        let names = if cfg!(target_os = "windows") {
            vec!["python".to_string(), "python3".to_string()]
        } else {
            vec!["python3".to_string(), "python".to_string()]
        };

        Self {
            path: None,
            names,
            versions: ["3.14", "3.13", "3.12", "3.11", "3.10"]
                .iter()
                .map(|v| v.to_string())
                .collect(),
            candidates: Vec::new(),
            strategies: DiscoveryKind::DEFAULT_ORDER.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PackageSettings {
    pub required: Vec<String>,
    /// 安装失败时跳过，不中断流程
    pub optional: Vec<String>,
    /// 安装后下载的 NLTK 语料
    pub corpora: Vec<String>,
    pub policy: PinPolicy,
}

impl Default for PackageSettings {
    fn default() -> Self {
        let required = [
            "jupyter",
            "ipykernel",
            "pandas",
            "numpy",
            "matplotlib",
            "seaborn",
            "nltk",
            "textblob",
            "scikit-learn",
            "certifi",
        ];

        Self {
            required: required.iter().map(|p| p.to_string()).collect(),
            optional: vec!["wordcloud".to_string()],
            corpora: vec!["vader_lexicon".to_string()],
            policy: PinPolicy::Pinned,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrustSettings {
    /// 证书路径变量名
    pub variable: String,
    /// 提供证书包的 Python 包
    pub package: String,
}

impl Default for TrustSettings {
    fn default() -> Self {
        Self {
            variable: "SSL_CERT_FILE".to_string(),
            package: "certifi".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct KernelSettings {
    pub name: String,
    pub display_name: String,
}

impl Default for KernelSettings {
    fn default() -> Self {
        Self {
            name: "social_media_sentiment".to_string(),
            display_name: "Python (Social Media Sentiment)".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
    pub notebook_dir: PathBuf,
    pub no_browser: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8888,
            notebook_dir: PathBuf::from("."),
            no_browser: false,
        }
    }
}

impl Settings {
    /// 按优先级加载配置，返回配置与其来源文件
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            if !file_exists(path) {
                return Err(SetupError::FileNotFound(path.to_path_buf()));
            }
            return Ok((Self::load_from_file(path)?, Some(path.to_path_buf())));
        }

        for path in [paths::get_project_config_path()?, paths::get_user_config_path()?] {
            if file_exists(&path) {
                tracing::debug!(path = %path.display(), "加载配置文件");
                return Ok((Self::load_from_file(&path)?, Some(path)));
            }
        }

        Ok((Self::default(), None))
    }

    /// 从文件加载配置
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = read_file(path)?;
        Self::parse(&content)
    }

    /// 解析 TOML 文本
    pub fn parse(content: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// 序列化为 TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// 写入配置文件；已存在且未指定 force 时返回 false
    pub fn save(&self, path: &Path, force: bool) -> Result<bool> {
        if path.exists() && !force {
            return Ok(false);
        }
        write_file_safe(path, &self.to_toml()?)?;
        Ok(true)
    }

    fn validate(&self) -> Result<()> {
        if self.packages.required.is_empty() {
            return Err(SetupError::Config("packages.required 不能为空".to_string()));
        }
        if self.interpreter.strategies.is_empty() {
            return Err(SetupError::Config("interpreter.strategies 不能为空".to_string()));
        }
        if self.trust.variable.trim().is_empty() {
            return Err(SetupError::Config("trust.variable 不能为空".to_string()));
        }
        if self.server.port == 0 {
            return Err(SetupError::Config("server.port 不能为 0".to_string()));
        }
        Ok(())
    }
}
