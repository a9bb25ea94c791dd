//! 依赖安装
//!
//! 必需包一次性安装；可选包逐个安装，失败只记录不报错。
//! 安装完成后用 `pip freeze` 覆盖写入清单，并校验必需包全部在清单中。

use crate::config::format::requirements::Manifest;
use crate::config::settings::PackageSettings;
use crate::error::{Result, SetupError};
use crate::types::PinPolicy;
use crate::utils::executor::{CommandRunner, args};
use crate::utils::paths::{file_exists, read_file, write_file_safe};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// 安装报告
#[derive(Debug, Clone, Default)]
pub struct InstallReport {
    /// 写入清单的条目数
    pub installed: usize,
    /// 按清单版本固定安装的包
    pub pinned: Vec<String>,
    /// 跳过的可选包
    pub skipped: Vec<String>,
    /// 下载失败的语料
    pub corpora_failed: Vec<String>,
}

/// 依赖安装器
pub struct DependencyInstaller<'a, R: CommandRunner> {
    runner: &'a R,
    packages: &'a PackageSettings,
    manifest_path: PathBuf,
    env_vars: HashMap<String, String>,
}

impl<'a, R: CommandRunner> DependencyInstaller<'a, R> {
    pub fn new(runner: &'a R, packages: &'a PackageSettings, manifest_path: &Path) -> Self {
        Self {
            runner,
            packages,
            manifest_path: manifest_path.to_path_buf(),
            env_vars: HashMap::new(),
        }
    }

    /// 传给 pip 的额外环境变量（例如证书路径）
    pub fn with_env(mut self, env_vars: HashMap<String, String>) -> Self {
        self.env_vars = env_vars;
        self
    }

    /// 安装全部依赖并写入清单
    pub fn install(&self, python: &Path, policy: PinPolicy) -> Result<InstallReport> {
        let mut report = InstallReport::default();

        let requirements = self.requirements(policy, &mut report)?;
        let mut pip_args = args(["-m", "pip", "install", "--upgrade"]);
        pip_args.extend(requirements);

        self.runner
            .capture_with_env(python, &pip_args, &self.env_vars)?
            .into_result(python)?;

        for package in &self.packages.optional {
            let opt_args = args(["-m", "pip", "install", "--upgrade", package.as_str()]);
            let output = self.runner.capture_with_env(python, &opt_args, &self.env_vars)?;
            if !output.success() {
                tracing::warn!(package = %package, "可选依赖安装失败，已跳过");
                report.skipped.push(package.clone());
            }
        }

        let manifest = self.snapshot(python)?;
        report.installed = manifest.len();

        let missing = manifest.missing(&self.packages.required);
        if !missing.is_empty() {
            return Err(SetupError::ManifestIncomplete(
                missing.into_iter().map(String::from).collect(),
            ));
        }

        report.corpora_failed = self.download_corpora(python)?;

        Ok(report)
    }

    /// 生成 pip 参数；pinned 策略下按已有清单固定版本
    fn requirements(&self, policy: PinPolicy, report: &mut InstallReport) -> Result<Vec<String>> {
        let previous = match policy {
            PinPolicy::Pinned if file_exists(&self.manifest_path) => {
                Some(Manifest::parse(&read_file(&self.manifest_path)?)?)
            }
            _ => None,
        };

        let requirements = self
            .packages
            .required
            .iter()
            .map(|name| match previous.as_ref().and_then(|m| m.version_of(name)) {
                Some(version) => {
                    report.pinned.push(name.clone());
                    format!("{}=={}", name, version)
                }
                None => name.clone(),
            })
            .collect();

        Ok(requirements)
    }

    /// `pip freeze` 并覆盖写入清单
    pub fn snapshot(&self, python: &Path) -> Result<Manifest> {
        let freeze_args = args(["-m", "pip", "freeze"]);
        let output = self
            .runner
            .capture_with_env(python, &freeze_args, &self.env_vars)?
            .into_result(python)?;

        let manifest = Manifest::parse(&output.stdout)?;
        write_file_safe(&self.manifest_path, &manifest.serialize())?;
        tracing::debug!(path = %self.manifest_path.display(), entries = manifest.len(), "写入清单");

        Ok(manifest)
    }

    /// 下载 NLTK 语料；失败不中断，返回失败列表
    fn download_corpora(&self, python: &Path) -> Result<Vec<String>> {
        if self.packages.corpora.is_empty() {
            return Ok(Vec::new());
        }

        let mut dl_args = args(["-m", "nltk.downloader", "-q"]);
        dl_args.extend(self.packages.corpora.iter().cloned());

        let output = self.runner.capture_with_env(python, &dl_args, &self.env_vars)?;
        if output.success() {
            Ok(Vec::new())
        } else {
            tracing::warn!(output = %output.combined(), "语料下载失败");
            Ok(self.packages.corpora.clone())
        }
    }
}
