//! 跨平台路径处理工具 (传统原则：常识性接口设计)

use crate::error::{Result, SetupError};
use std::path::{Path, PathBuf};

/// 获取用户配置目录：~/.nbenv
pub fn get_config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SetupError::Config("无法找到用户主目录".to_string()))?;

    Ok(home.join(".nbenv"))
}

/// 用户级配置文件：~/.nbenv/config.toml
pub fn get_user_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.toml"))
}

/// 项目级配置文件：./nbenv.toml
pub fn get_project_config_path() -> Result<PathBuf> {
    let current_dir = std::env::current_dir()
        .map_err(|e| SetupError::Config(format!("无法获取当前目录: {}", e)))?;
    Ok(current_dir.join("nbenv.toml"))
}

/// Jupyter 用户数据目录
///
/// 优先使用 `JUPYTER_DATA_DIR`，否则按平台约定：
/// - Linux: ~/.local/share/jupyter
/// - macOS: ~/Library/Jupyter
/// - Windows: %APPDATA%\jupyter
pub fn get_jupyter_data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("JUPYTER_DATA_DIR").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }

    let home = dirs::home_dir()
        .ok_or_else(|| SetupError::Config("无法找到用户主目录".to_string()))?;

    if cfg!(target_os = "windows") {
        let appdata = dirs::data_dir().unwrap_or_else(|| home.join("AppData").join("Roaming"));
        Ok(appdata.join("jupyter"))
    } else if cfg!(target_os = "macos") {
        Ok(home.join("Library").join("Jupyter"))
    } else {
        Ok(home.join(".local").join("share").join("jupyter"))
    }
}

/// 检查文件是否存在
pub fn file_exists(path: &Path) -> bool {
    path.exists() && path.is_file()
}

/// 读取文件内容，返回错误时提供详细信息
pub fn read_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(SetupError::FileNotFound(path.to_path_buf()));
    }
    std::fs::read_to_string(path).map_err(|e| {
        SetupError::Io(std::io::Error::new(
            e.kind(),
            format!("读取文件 {} 失败: {}", path.display(), e),
        ))
    })
}

/// 安全写入文件 (使用临时文件 + 原子替换)
pub fn write_file_safe(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::EnvGuard;
    use serial_test::serial;

    #[test]
    fn test_write_file_safe_creates_parent() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("nested").join("requirements.lock");

        write_file_safe(&path, "numpy==2.1.0\n").unwrap();

        assert!(file_exists(&path));
        assert_eq!(read_file(&path).unwrap(), "numpy==2.1.0\n");
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_write_file_safe_overwrites() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("out.txt");

        write_file_safe(&path, "old").unwrap();
        write_file_safe(&path, "new").unwrap();

        assert_eq!(read_file(&path).unwrap(), "new");
    }

    #[test]
    fn test_read_missing_file() {
        let temp = tempfile::tempdir().unwrap();
        let result = read_file(&temp.path().join("missing"));
        assert!(matches!(result, Err(SetupError::FileNotFound(_))));
    }

    #[test]
    fn test_file_exists_rejects_directory() {
        let temp = tempfile::tempdir().unwrap();
        assert!(!file_exists(temp.path()));
    }

    #[test]
    #[serial]
    fn test_jupyter_data_dir_override() {
        let guard = EnvGuard::new();
        guard.set_var("JUPYTER_DATA_DIR", "/tmp/jupyter-data");

        assert_eq!(
            get_jupyter_data_dir().unwrap(),
            PathBuf::from("/tmp/jupyter-data")
        );
    }

    #[test]
    #[serial]
    fn test_jupyter_data_dir_ignores_empty_override() {
        let guard = EnvGuard::new();
        guard.set_var("JUPYTER_DATA_DIR", "");

        let dir = get_jupyter_data_dir().unwrap();
        assert!(dir.ends_with("jupyter") || dir.ends_with("Jupyter"));
    }
}
