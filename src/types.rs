//! 核心数据结构定义 (表达原则：用数据结构表达逻辑)

use serde::{Deserialize, Serialize};
use std::fmt;

/// 引导流程的步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// 定位解释器
    Locate,
    /// 创建虚拟环境
    Provision,
    /// 安装依赖
    Install,
    /// 配置证书路径
    Trust,
    /// 注册内核
    Kernel,
    /// 启动服务器
    Serve,
}

impl Step {
    /// 按执行顺序排列的所有步骤
    pub const ALL: [Step; 6] = [
        Step::Locate,
        Step::Provision,
        Step::Install,
        Step::Trust,
        Step::Kernel,
        Step::Serve,
    ];

    /// 步骤序号（从 1 开始）
    #[must_use]
    pub fn number(&self) -> usize {
        Step::ALL.iter().position(|s| s == self).map_or(0, |i| i + 1)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Locate => write!(f, "定位解释器"),
            Step::Provision => write!(f, "创建虚拟环境"),
            Step::Install => write!(f, "安装依赖"),
            Step::Trust => write!(f, "配置证书路径"),
            Step::Kernel => write!(f, "注册内核"),
            Step::Serve => write!(f, "启动服务器"),
        }
    }
}

/// 依赖版本策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PinPolicy {
    /// 若清单已存在，按清单中的版本安装
    #[default]
    Pinned,
    /// 总是升级到最新版本
    Floating,
}

impl PinPolicy {
    /// 从字符串解析
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pinned" | "pin" => Some(PinPolicy::Pinned),
            "floating" | "float" => Some(PinPolicy::Floating),
            _ => None,
        }
    }
}

impl fmt::Display for PinPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinPolicy::Pinned => write!(f, "pinned"),
            PinPolicy::Floating => write!(f, "floating"),
        }
    }
}

/// 解释器发现策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryKind {
    /// NBENV_PYTHON 或 interpreter.path
    Override,
    /// 命令搜索路径
    Path,
    /// Windows 注册表 (PEP 514)
    Registry,
    /// 按版本生成的固定路径
    Candidates,
}

impl DiscoveryKind {
    /// 默认顺序
    pub const DEFAULT_ORDER: [DiscoveryKind; 4] = [
        DiscoveryKind::Override,
        DiscoveryKind::Path,
        DiscoveryKind::Registry,
        DiscoveryKind::Candidates,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryKind::Override => "override",
            DiscoveryKind::Path => "path",
            DiscoveryKind::Registry => "registry",
            DiscoveryKind::Candidates => "candidates",
        }
    }
}

impl fmt::Display for DiscoveryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 运行时选项 (支持详细/安静模式切换)
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub verbose: bool,
}

/// 输出格式类型
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" | "j" => OutputFormat::Json,
            _ => OutputFormat::Text,
        }
    }
}
