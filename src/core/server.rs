//! 启动 Notebook 服务器
//!
//! 服务器在前台运行直到被中断，退出码透传给调用方。

use crate::config::settings::ServerSettings;
use crate::core::truststore::{self, TrustStore};
use crate::error::Result;
use crate::utils::executor::{CommandRunner, args};
use std::path::Path;

/// 访问地址
pub fn access_url(port: u16) -> String {
    format!("http://localhost:{}/", port)
}

/// Notebook 服务器启动器
pub struct NotebookServer<'a, R: CommandRunner> {
    runner: &'a R,
    settings: &'a ServerSettings,
}

impl<'a, R: CommandRunner> NotebookServer<'a, R> {
    pub fn new(runner: &'a R, settings: &'a ServerSettings) -> Self {
        Self { runner, settings }
    }

    /// 启动参数
    pub fn arguments(&self) -> Vec<String> {
        let mut server_args = args(["-m", "notebook"]);
        server_args.push(format!("--port={}", self.settings.port));
        server_args.push(format!(
            "--notebook-dir={}",
            self.settings.notebook_dir.display()
        ));
        if self.settings.no_browser {
            server_args.push("--no-browser".to_string());
        }
        server_args
    }

    /// 阻塞运行服务器，返回其退出码
    pub fn launch(&self, python: &Path, trust: Option<&TrustStore>) -> Result<i32> {
        println!("Notebook 服务器地址: {}", access_url(self.settings.port));
        println!("按 Ctrl+C 停止");

        let code = self
            .runner
            .exec_with_env(python, &self.arguments(), &truststore::env_vars(trust))?;

        tracing::debug!(code, "服务器已退出");
        Ok(code)
    }
}
