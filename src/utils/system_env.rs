//! 跨平台用户级环境变量持久化
//!
//! - Windows: 使用 PowerShell 写入 HKEY_CURRENT_USER\Environment，读取走注册表
//! - Linux/macOS: 写入 shell 配置文件 (~/.bashrc, ~/.zshrc 等)

use crate::error::{Result, SetupError};
use crate::utils::paths::write_file_safe;
use std::path::{Path, PathBuf};

/// 用户级变量存储
pub trait UserEnvStore {
    /// 持久化变量（覆盖旧值）
    fn set_var(&self, key: &str, value: &str) -> Result<()>;

    /// 删除变量；不存在时不报错
    fn unset_var(&self, key: &str) -> Result<()>;

    /// 读取已持久化的值
    fn get_var(&self, key: &str) -> Result<Option<String>>;

    /// 存储位置描述（用于输出）
    fn location(&self) -> String;
}

/// 写入指定 shell 配置文件的存储
///
/// 每个变量占两行：标记注释 + export 行。
#[derive(Debug, Clone)]
pub struct ProfileEnvStore {
    path: PathBuf,
}

impl ProfileEnvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn marker(key: &str) -> String {
        format!("# nbenv: {}", key)
    }

    fn export_line(key: &str, value: &str) -> String {
        // 单引号内只需转义单引号本身
        format!("export {}='{}'", key, value.replace('\'', r"'\''"))
    }

    /// 去掉该变量的标记行、export 行以及其后的一个空行
    fn strip(content: &str, key: &str) -> Vec<String> {
        let marker = Self::marker(key);
        let prefix = format!("export {}=", key);

        let mut lines: Vec<String> = Vec::new();
        let mut skip_blank = false;

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed == marker || trimmed.starts_with(&prefix) {
                skip_blank = true;
                continue;
            }
            if skip_blank && trimmed.is_empty() {
                skip_blank = false;
                continue;
            }
            skip_blank = false;
            lines.push(line.to_string());
        }

        lines
    }

    fn read(&self) -> Result<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, lines: &[String]) -> Result<()> {
        let end = lines
            .iter()
            .rposition(|l| !l.trim().is_empty())
            .map_or(0, |i| i + 1);
        let mut content = lines[..end].join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        write_file_safe(&self.path, &content)
            .map_err(|e| SetupError::SystemEnvWriteFailed(format!("{}: {}", self.path.display(), e)))
    }
}

impl UserEnvStore for ProfileEnvStore {
    fn set_var(&self, key: &str, value: &str) -> Result<()> {
        let mut lines = Self::strip(&self.read()?, key);

        if lines.last().is_some_and(|l| !l.trim().is_empty()) {
            lines.push(String::new());
        }
        lines.push(Self::marker(key));
        lines.push(Self::export_line(key, value));

        self.write(&lines)
    }

    fn unset_var(&self, key: &str) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let lines = Self::strip(&self.read()?, key);
        self.write(&lines)
    }

    fn get_var(&self, key: &str) -> Result<Option<String>> {
        let prefix = format!("export {}=", key);
        let value = self
            .read()?
            .lines()
            .rev()
            .find_map(|l| l.trim().strip_prefix(&prefix).map(str::to_string))
            .map(|v| unquote(&v));
        Ok(value)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

fn unquote(value: &str) -> String {
    let v = value.trim();
    if v.len() >= 2 && v.starts_with('\'') && v.ends_with('\'') {
        v[1..v.len() - 1].replace(r"'\''", "'")
    } else if v.len() >= 2 && v.starts_with('"') && v.ends_with('"') {
        v[1..v.len() - 1].to_string()
    } else {
        v.to_string()
    }
}

/// 操作系统的用户级变量存储
pub struct SystemEnvWriter {
    #[cfg(not(target_os = "windows"))]
    profile: ProfileEnvStore,
}

impl SystemEnvWriter {
    /// 探测当前用户的存储位置
    pub fn detect() -> Result<Self> {
        #[cfg(target_os = "windows")]
        {
            Ok(Self {})
        }

        #[cfg(not(target_os = "windows"))]
        {
            Ok(Self {
                profile: ProfileEnvStore::new(Self::shell_config_file()?),
            })
        }
    }

    /// 选择 shell 配置文件：已存在的候选优先，否则按平台默认
    #[cfg(not(target_os = "windows"))]
    fn shell_config_file() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| SetupError::SystemEnvWriteFailed("无法获取 HOME 目录".to_string()))?;

        let shell = std::env::var("SHELL").unwrap_or_default();
        let candidates: &[&str] = if shell.ends_with("zsh") {
            &[".zshrc", ".zprofile"]
        } else if cfg!(target_os = "macos") {
            &[".zshrc", ".bash_profile", ".bashrc", ".zprofile"]
        } else {
            &[".bashrc", ".zshrc", ".profile"]
        };

        for name in candidates {
            let path = home.join(name);
            if path.exists() {
                return Ok(path);
            }
        }

        Ok(home.join(candidates[0]))
    }

    #[cfg(target_os = "windows")]
    fn powershell(script: &str) -> Result<()> {
        let output = std::process::Command::new("powershell")
            .args(["-NoProfile", "-Command", script])
            .output()
            .map_err(|e| SetupError::SystemEnvWriteFailed(format!("无法执行 PowerShell: {}", e)))?;

        if !output.status.success() {
            let error_msg = String::from_utf8_lossy(&output.stderr);
            if error_msg.contains("拒绝") || error_msg.contains("Access denied") {
                return Err(SetupError::PermissionDenied(error_msg.trim().to_string()));
            }
            return Err(SetupError::SystemEnvWriteFailed(error_msg.trim().to_string()));
        }

        Ok(())
    }

}

/// PowerShell 单引号字面量：不展开 `$` 与反引号，内部单引号加倍
#[cfg(any(target_os = "windows", test))]
fn powershell_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

impl UserEnvStore for SystemEnvWriter {
    fn set_var(&self, key: &str, value: &str) -> Result<()> {
        #[cfg(target_os = "windows")]
        {
            Self::powershell(&format!(
                "[Environment]::SetEnvironmentVariable({}, {}, 'User')",
                powershell_literal(key),
                powershell_literal(value)
            ))
        }

        #[cfg(not(target_os = "windows"))]
        {
            self.profile.set_var(key, value)
        }
    }

    fn unset_var(&self, key: &str) -> Result<()> {
        #[cfg(target_os = "windows")]
        {
            Self::powershell(&format!(
                "[Environment]::SetEnvironmentVariable({}, $null, 'User')",
                powershell_literal(key)
            ))
        }

        #[cfg(not(target_os = "windows"))]
        {
            self.profile.unset_var(key)
        }
    }

    fn get_var(&self, key: &str) -> Result<Option<String>> {
        #[cfg(target_os = "windows")]
        {
            use winreg::RegKey;
            use winreg::enums::HKEY_CURRENT_USER;

            let env = RegKey::predef(HKEY_CURRENT_USER)
                .open_subkey("Environment")
                .map_err(|e| SetupError::SystemEnvWriteFailed(format!("无法打开注册表: {}", e)))?;
            match env.get_value::<String, _>(key) {
                Ok(value) => Ok(Some(value)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        }

        #[cfg(not(target_os = "windows"))]
        {
            self.profile.get_var(key)
        }
    }

    fn location(&self) -> String {
        #[cfg(target_os = "windows")]
        {
            r"HKEY_CURRENT_USER\Environment".to_string()
        }

        #[cfg(not(target_os = "windows"))]
        {
            self.profile.location()
        }
    }
}
