//! 错误处理模块 (修复原则：明确抛出异常)

use std::error::Error;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("文件IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("解析错误: {0}")]
    Parse(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("权限不足: {0}")]
    PermissionDenied(String),

    #[error("文件不存在: {0}")]
    FileNotFound(PathBuf),

    #[error("JSON序列化错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("未找到可用的解释器 (已尝试: {0})")]
    InterpreterNotFound(String),

    #[error("指定的解释器不存在: {0}")]
    InterpreterOverrideMissing(PathBuf),

    #[error("虚拟环境创建失败: {dir}\n{output}")]
    EnvironmentCreation { dir: PathBuf, output: String },

    #[error("虚拟环境无效或不存在: {0}")]
    EnvironmentMissing(PathBuf),

    #[error("清单缺少以下依赖: {}", .0.join(", "))]
    ManifestIncomplete(Vec<String>),

    #[error("证书文件不存在: {0}")]
    CertificateMissing(PathBuf),

    #[error("无效的内核名称: {0}")]
    InvalidKernelName(String),

    #[error("内核未注册: {0}")]
    KernelNotFound(String),

    #[error("命令未找到: {0}")]
    CommandNotFound(String),

    #[error("命令执行失败: {program} (退出码 {code})\n{output}")]
    CommandFailed {
        program: String,
        code: i32,
        output: String,
    },

    #[error("系统环境变量写入失败: {0}")]
    SystemEnvWriteFailed(String),

    #[error("无效参数: {0}")]
    InvalidArgument(String),
}

impl From<toml::de::Error> for SetupError {
    fn from(err: toml::de::Error) -> Self {
        SetupError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for SetupError {
    fn from(err: toml::ser::Error) -> Self {
        SetupError::Config(err.to_string())
    }
}

/// 详细的错误报告函数 (透明原则)
impl SetupError {
    /// 报告错误，支持详细/安静模式
    /// verbose = true: 详细错误链
    /// verbose = false: 关键信息
    pub fn report(&self, verbose: bool) {
        if verbose {
            eprintln!("❌ 错误: {}", self);

            if let Some(source) = self.source() {
                eprintln!("  └─ 原因: {}", source);
                let mut current = source.source();
                while let Some(next) = current {
                    eprintln!("     └─ {}", next);
                    current = next.source();
                }
            }
        } else {
            match self {
                SetupError::InterpreterNotFound(_) => {
                    eprintln!("未找到解释器，可设置 NBENV_PYTHON 指定路径")
                }
                SetupError::InterpreterOverrideMissing(path) => {
                    eprintln!("指定的解释器不存在: {} (检查 NBENV_PYTHON 或 interpreter.path)", path.display())
                }
                SetupError::EnvironmentMissing(dir) => {
                    eprintln!("虚拟环境不可用: {} (先运行 nbenv provision)", dir.display())
                }
                SetupError::CertificateMissing(path) => {
                    eprintln!("证书文件不存在: {}", path.display())
                }
                SetupError::KernelNotFound(name) => eprintln!("内核未注册: {}", name),
                SetupError::PermissionDenied(msg) => eprintln!("权限被拒绝: {}", msg),
                SetupError::FileNotFound(path) => eprintln!("文件不存在: {}", path.display()),
                SetupError::CommandFailed { program, code, .. } => {
                    eprintln!("命令失败: {} (退出码 {})", program, code)
                }
                _ => eprintln!("错误: {}", self),
            }
        }
    }

    /// 进程退出码
    pub fn exit_code(&self) -> i32 {
        match self {
            SetupError::InvalidArgument(_) | SetupError::InvalidKernelName(_) => 2,
            _ => 1,
        }
    }
}

/// 简化 Result 类型别名
pub type Result<T> = std::result::Result<T, SetupError>;
