//! 解释器定位
//!
//! 按配置的顺序依次尝试各个发现策略，第一个成功的结果即为答案。
//! 只做文件系统、注册表与 PATH 探测，不执行解释器。

use crate::config::settings::InterpreterSettings;
use crate::error::{Result, SetupError};
use crate::types::DiscoveryKind;
use crate::utils::paths::file_exists;
use std::fmt;
use std::path::{Path, PathBuf};

/// 覆盖解释器路径的环境变量
pub const OVERRIDE_VAR: &str = "NBENV_PYTHON";

/// 定位结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    pub path: PathBuf,
    /// 命中的策略名称
    pub strategy: &'static str,
}

impl fmt::Display for Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// 发现策略
pub trait DiscoveryStrategy {
    /// 策略名称（用于日志与诊断）
    fn name(&self) -> &'static str;

    /// 尝试定位；未找到返回 Ok(None)，返回错误时整个定位中止
    fn discover(&self) -> Result<Option<PathBuf>>;
}

/// 显式指定的路径（环境变量或配置）
///
/// 指定了但文件不存在时报错，不回退到其他策略。
pub struct ExplicitOverride {
    path: Option<PathBuf>,
}

impl ExplicitOverride {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// 从 `NBENV_PYTHON` 或配置读取，环境变量优先
    pub fn from_env_or(configured: Option<PathBuf>) -> Self {
        let from_env = std::env::var_os(OVERRIDE_VAR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::new(from_env.or(configured))
    }
}

impl DiscoveryStrategy for ExplicitOverride {
    fn name(&self) -> &'static str {
        DiscoveryKind::Override.as_str()
    }

    fn discover(&self) -> Result<Option<PathBuf>> {
        match &self.path {
            None => Ok(None),
            Some(path) if file_exists(path) => Ok(Some(path.clone())),
            Some(path) => Err(SetupError::InterpreterOverrideMissing(path.clone())),
        }
    }
}

/// 在命令搜索路径中查找
pub struct SearchPath {
    names: Vec<String>,
    /// 自定义搜索路径；None 时使用 PATH
    paths: Option<std::ffi::OsString>,
}

impl SearchPath {
    pub fn new(names: Vec<String>) -> Self {
        Self { names, paths: None }
    }

    /// 使用指定的搜索路径代替 PATH
    pub fn with_paths(names: Vec<String>, paths: impl Into<std::ffi::OsString>) -> Self {
        Self {
            names,
            paths: Some(paths.into()),
        }
    }

    /// 依次查找各个名称；自定义搜索路径需要 `cwd`，缺失时跳过
    fn lookup(&self, cwd: Option<&Path>) -> Option<PathBuf> {
        for name in &self.names {
            let found = match (&self.paths, cwd) {
                (Some(paths), Some(cwd)) => which::which_in(name, Some(paths), cwd),
                (Some(_), None) => {
                    tracing::debug!(name = %name, "无法获取当前目录，跳过自定义搜索路径");
                    continue;
                }
                (None, _) => which::which(name),
            };

            match found {
                Ok(path) if !is_store_alias(&path) => return Some(path),
                Ok(path) => {
                    tracing::debug!(path = %path.display(), "跳过应用商店别名");
                }
                Err(_) => {}
            }
        }
        None
    }
}

impl DiscoveryStrategy for SearchPath {
    fn name(&self) -> &'static str {
        DiscoveryKind::Path.as_str()
    }

    fn discover(&self) -> Result<Option<PathBuf>> {
        let cwd = match &self.paths {
            Some(_) => std::env::current_dir().ok(),
            None => None,
        };
        Ok(self.lookup(cwd.as_deref()))
    }
}

/// Windows 上 WindowsApps 下的 python.exe 只是安装引导程序
fn is_store_alias(path: &Path) -> bool {
    cfg!(target_os = "windows")
        && path
            .components()
            .any(|c| c.as_os_str().eq_ignore_ascii_case("WindowsApps"))
}

/// PEP 514 注册表项
#[cfg(target_os = "windows")]
const PYTHON_CORE_KEY: &str = r"Software\Python\PythonCore";

/// 读取 Windows 注册表中登记的解释器（HKCU 优先于 HKLM）
///
/// 其他平台上总是未命中。
pub struct Registry {
    #[cfg_attr(not(target_os = "windows"), allow(dead_code))]
    versions: Vec<String>,
}

impl Registry {
    /// `versions` 为空时接受所有登记的版本
    pub fn new(versions: Vec<String>) -> Self {
        Self { versions }
    }

    #[cfg(target_os = "windows")]
    fn installed() -> Vec<(String, PathBuf)> {
        use winreg::RegKey;
        use winreg::enums::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE};

        let mut found = Vec::new();
        for hive in [HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE] {
            let Ok(core) = RegKey::predef(hive).open_subkey(PYTHON_CORE_KEY) else {
                continue;
            };
            for tag in core.enum_keys().filter_map(|k| k.ok()) {
                let Ok(install) = core.open_subkey(format!(r"{}\InstallPath", tag)) else {
                    continue;
                };
                let exe = install
                    .get_value::<String, _>("ExecutablePath")
                    .map(PathBuf::from)
                    .or_else(|_| {
                        install
                            .get_value::<String, _>("")
                            .map(|dir| Path::new(&dir).join("python.exe"))
                    });
                if let Ok(exe) = exe {
                    found.push((tag, exe));
                }
            }
        }
        found
    }
}

/// 解析 "3.12"、"3.12-32"、"3.13t" 之类的标签
#[cfg(any(target_os = "windows", test))]
fn tag_version(tag: &str) -> Option<(u32, u32)> {
    let mut parts = tag.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor: String = parts.next()?.chars().take_while(char::is_ascii_digit).collect();
    Some((major, minor.parse().ok()?))
}

/// 过滤版本并按从新到旧排序；同版本保持原顺序
#[cfg(any(target_os = "windows", test))]
fn rank_installed(installed: Vec<(String, PathBuf)>, versions: &[String]) -> Vec<PathBuf> {
    let wanted: Vec<(u32, u32)> = versions.iter().filter_map(|v| tag_version(v)).collect();

    let mut ranked: Vec<((u32, u32), PathBuf)> = installed
        .into_iter()
        .filter_map(|(tag, exe)| tag_version(&tag).map(|v| (v, exe)))
        .filter(|(v, _)| wanted.is_empty() || wanted.contains(v))
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    ranked.into_iter().map(|(_, exe)| exe).collect()
}

impl DiscoveryStrategy for Registry {
    fn name(&self) -> &'static str {
        DiscoveryKind::Registry.as_str()
    }

    #[cfg(target_os = "windows")]
    fn discover(&self) -> Result<Option<PathBuf>> {
        Ok(rank_installed(Self::installed(), &self.versions)
            .into_iter()
            .find(|exe| file_exists(exe)))
    }

    #[cfg(not(target_os = "windows"))]
    fn discover(&self) -> Result<Option<PathBuf>> {
        Ok(None)
    }
}

/// 按固定顺序探测候选路径
pub struct FixedPaths {
    candidates: Vec<PathBuf>,
}

impl FixedPaths {
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    /// 根据版本列表生成当前平台的候选路径（保持版本顺序）
    pub fn for_versions(versions: &[String]) -> Self {
        let mut candidates = Vec::new();

        for version in versions {
            if cfg!(target_os = "windows") {
                let compact = version.replace('.', "");
                if let Some(local) = dirs::data_local_dir() {
                    candidates.push(
                        local
                            .join("Programs")
                            .join("Python")
                            .join(format!("Python{}", compact))
                            .join("python.exe"),
                    );
                }
                candidates.push(
                    PathBuf::from(r"C:\Program Files")
                        .join(format!("Python{}", compact))
                        .join("python.exe"),
                );
            } else {
                let exe = format!("python{}", version);
                for dir in ["/usr/local/bin", "/usr/bin", "/opt/homebrew/bin"] {
                    candidates.push(Path::new(dir).join(&exe));
                }
            }
        }

        Self { candidates }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }
}

impl DiscoveryStrategy for FixedPaths {
    fn name(&self) -> &'static str {
        DiscoveryKind::Candidates.as_str()
    }

    fn discover(&self) -> Result<Option<PathBuf>> {
        Ok(self.candidates.iter().find(|p| file_exists(p)).cloned())
    }
}

/// 解释器定位器
pub struct InterpreterLocator {
    strategies: Vec<Box<dyn DiscoveryStrategy>>,
}

impl InterpreterLocator {
    pub fn new(strategies: Vec<Box<dyn DiscoveryStrategy>>) -> Self {
        Self { strategies }
    }

    /// 按 `interpreter.strategies` 的顺序组装策略链
    pub fn from_settings(settings: &InterpreterSettings) -> Self {
        let strategies = settings
            .strategies
            .iter()
            .map(|kind| -> Box<dyn DiscoveryStrategy> {
                match kind {
                    DiscoveryKind::Override => {
                        Box::new(ExplicitOverride::from_env_or(settings.path.clone()))
                    }
                    DiscoveryKind::Path => Box::new(SearchPath::new(settings.names.clone())),
                    DiscoveryKind::Registry => Box::new(Registry::new(settings.versions.clone())),
                    DiscoveryKind::Candidates if settings.candidates.is_empty() => {
                        Box::new(FixedPaths::for_versions(&settings.versions))
                    }
                    DiscoveryKind::Candidates => {
                        Box::new(FixedPaths::new(settings.candidates.clone()))
                    }
                }
            })
            .collect();

        Self::new(strategies)
    }

    /// 依次尝试所有策略
    pub fn locate(&self) -> Result<Interpreter> {
        for strategy in &self.strategies {
            if let Some(path) = strategy.discover()? {
                tracing::debug!(strategy = strategy.name(), path = %path.display(), "找到解释器");
                return Ok(Interpreter {
                    path,
                    strategy: strategy.name(),
                });
            }
            tracing::debug!(strategy = strategy.name(), "策略未命中");
        }

        let tried: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        Err(SetupError::InterpreterNotFound(tried.join(", ")))
    }
}
