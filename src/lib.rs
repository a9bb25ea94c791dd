//! nbenv - 情感分析 Notebook 环境引导工具
//!
//! 六个步骤：定位解释器 → 创建虚拟环境 → 安装依赖 → 配置证书路径 → 注册内核 → 启动服务器

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod types;
pub mod utils;

#[cfg(test)]
pub mod test_utils;

// 重新导出常用类型
pub use config::Settings;
pub use error::{Result, SetupError};
pub use types::{DiscoveryKind, OutputFormat, PinPolicy, Step};
