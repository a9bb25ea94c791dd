//! CLI 参数定义

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// nbenv - 情感分析 Notebook 环境引导工具
#[derive(Parser)]
#[command(
    name = "nbenv",
    version,
    about = "情感分析 Notebook 环境引导工具",
    long_about = "定位解释器、创建虚拟环境、安装依赖、配置证书路径、注册内核并启动 Notebook 服务器"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 详细输出模式
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 配置文件路径（默认 ./nbenv.toml 或 ~/.nbenv/config.toml）
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 定位解释器
    Locate,

    /// 创建虚拟环境（已有效时跳过）
    Provision {
        /// 删除并重建
        #[arg(long)]
        recreate: bool,
    },

    /// 安装依赖并写入清单
    Install {
        /// 版本策略 (pinned/floating)
        #[arg(short, long)]
        policy: Option<String>,
    },

    /// 配置证书路径变量
    Trust {
        /// 写入用户级配置
        #[arg(short, long, conflicts_with_all = ["clear", "show"])]
        persist: bool,
        /// 清除用户级配置中的值
        #[arg(long, conflicts_with = "show")]
        clear: bool,
        /// 显示当前值
        #[arg(long)]
        show: bool,
    },

    /// 内核管理
    #[command(subcommand)]
    Kernel(KernelCommands),

    /// 启动 Notebook 服务器
    Serve {
        /// 监听端口
        #[arg(short, long)]
        port: Option<u16>,
        /// 不自动打开浏览器
        #[arg(long)]
        no_browser: bool,
    },

    /// 依次执行全部步骤
    Bootstrap {
        /// 删除并重建虚拟环境
        #[arg(long)]
        recreate: bool,
        /// 写入用户级证书变量
        #[arg(long)]
        persist_trust: bool,
        /// 注册内核后停止，不启动服务器
        #[arg(long)]
        no_serve: bool,
    },

    /// 显示当前状态
    Status,

    /// 诊断问题
    Doctor,

    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum KernelCommands {
    /// 注册内核（同名覆盖）
    Install {
        /// 内核 id
        #[arg(short, long)]
        name: Option<String>,
        /// 显示名称
        #[arg(short, long)]
        display_name: Option<String>,
    },
    /// 列出已注册内核
    List {
        /// 输出格式 (text/json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// 卸载内核
    Uninstall {
        /// 内核 id
        name: String,
        /// 未注册时不报错
        #[arg(long)]
        missing_ok: bool,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// 生成默认配置文件 ./nbenv.toml
    Init {
        #[arg(short, long)]
        force: bool,
    },
    /// 显示生效的配置
    Show,
}

/// 解析版本策略参数
pub fn parse_policy(policy: &str) -> crate::error::Result<crate::types::PinPolicy> {
    crate::types::PinPolicy::parse(policy).ok_or_else(|| {
        crate::error::SetupError::InvalidArgument(format!(
            "无效的版本策略: {} (可选 pinned/floating)",
            policy
        ))
    })
}
