//! CLI 集成测试
//!
//! 使用 assert_cmd 进行命令行集成测试。只覆盖不需要真实解释器和网络的命令。

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// 创建临时测试环境
fn create_test_env() -> TempDir {
    tempfile::tempdir().unwrap()
}

/// 在临时目录中运行 nbenv，隔离用户目录与 Jupyter 数据目录
fn nbenv(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_nbenv"));
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env("USERPROFILE", dir)
        .env("JUPYTER_DATA_DIR", dir.join("jupyter"))
        .env_remove("NBENV_PYTHON")
        .env_remove("SSL_CERT_FILE")
        .env_remove("RUST_LOG");
    cmd
}

/// 伪造一个虚拟环境（只需要内部解释器存在）
fn fake_venv(dir: &Path) -> PathBuf {
    let python = if cfg!(windows) {
        dir.join("venv").join("Scripts").join("python.exe")
    } else {
        dir.join("venv").join("bin").join("python")
    };
    fs::create_dir_all(python.parent().unwrap()).unwrap();
    fs::write(&python, "").unwrap();
    python
}

mod basic_commands {
    use super::*;

    #[test]
    fn test_help_command() {
        let temp_dir = create_test_env();
        nbenv(temp_dir.path())
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("bootstrap"))
            .stdout(predicate::str::contains("kernel"));
    }

    #[test]
    fn test_version_command() {
        let temp_dir = create_test_env();
        nbenv(temp_dir.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_unknown_subcommand_fails() {
        let temp_dir = create_test_env();
        nbenv(temp_dir.path()).arg("frobnicate").assert().failure();
    }
}

mod config_commands {
    use super::*;

    #[test]
    fn test_config_init_and_show() {
        let temp_dir = create_test_env();

        nbenv(temp_dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("nbenv.toml"));
        assert!(temp_dir.path().join("nbenv.toml").exists());

        nbenv(temp_dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("social_media_sentiment"))
            .stdout(predicate::str::contains("port = 8888"));
    }

    #[test]
    fn test_config_init_does_not_overwrite() {
        let temp_dir = create_test_env();
        let path = temp_dir.path().join("nbenv.toml");
        fs::write(&path, "[server]\nport = 9999\n").unwrap();

        nbenv(temp_dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--force"));

        assert_eq!(fs::read_to_string(&path).unwrap(), "[server]\nport = 9999\n");
    }

    #[test]
    fn test_project_config_is_used() {
        let temp_dir = create_test_env();
        fs::write(temp_dir.path().join("nbenv.toml"), "[server]\nport = 9999\n").unwrap();

        nbenv(temp_dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("port = 9999"));
    }

    #[test]
    fn test_explicit_missing_config_fails() {
        let temp_dir = create_test_env();
        nbenv(temp_dir.path())
            .args(["--config", "missing.toml", "status"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("配置初始化失败"));
    }

    #[test]
    fn test_invalid_config_fails() {
        let temp_dir = create_test_env();
        fs::write(temp_dir.path().join("nbenv.toml"), "[packages]\nrequired = []\n").unwrap();

        nbenv(temp_dir.path()).arg("status").assert().failure();
    }
}

mod locate_commands {
    use super::*;

    #[test]
    fn test_locate_with_override() {
        let temp_dir = create_test_env();
        let python = temp_dir.path().join("custom-python");
        fs::write(&python, "").unwrap();

        nbenv(temp_dir.path())
            .env("NBENV_PYTHON", &python)
            .args(["locate", "--verbose"])
            .assert()
            .success()
            .stdout(predicate::str::contains("custom-python"))
            .stdout(predicate::str::contains("override"));
    }

    #[test]
    fn test_locate_fails_when_nothing_found() {
        let temp_dir = create_test_env();
        let config = temp_dir.path().join("nbenv.toml");
        fs::write(
            &config,
            "[interpreter]\nnames = [\"nbenv-no-such-python\"]\ncandidates = [\"/nonexistent/python3.12\"]\n",
        )
        .unwrap();

        nbenv(temp_dir.path())
            .arg("locate")
            .assert()
            .failure()
            .stderr(predicate::str::contains("未找到解释器"));
    }
}

mod environment_commands {
    use super::*;

    #[test]
    fn test_install_requires_environment() {
        let temp_dir = create_test_env();
        nbenv(temp_dir.path())
            .arg("install")
            .assert()
            .failure()
            .stderr(predicate::str::contains("nbenv provision"));
    }

    #[test]
    fn test_install_rejects_bad_policy() {
        let temp_dir = create_test_env();
        fake_venv(temp_dir.path());

        nbenv(temp_dir.path())
            .args(["install", "--policy", "newest"])
            .assert()
            .code(2);
    }

    #[test]
    fn test_serve_requires_environment() {
        let temp_dir = create_test_env();
        nbenv(temp_dir.path()).arg("serve").assert().failure();
    }

    #[test]
    fn test_status_reports_missing_environment() {
        let temp_dir = create_test_env();
        nbenv(temp_dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("不存在"))
            .stdout(predicate::str::contains("http://localhost:8888/"));
    }

    #[test]
    fn test_doctor_reports_issues() {
        let temp_dir = create_test_env();
        nbenv(temp_dir.path())
            .arg("doctor")
            .assert()
            .failure()
            .stdout(predicate::str::contains("nbenv provision"));
    }
}

mod kernel_commands {
    use super::*;

    #[test]
    fn test_kernel_round_trip() {
        let temp_dir = create_test_env();
        fake_venv(temp_dir.path());

        nbenv(temp_dir.path())
            .args(["kernel", "install"])
            .assert()
            .success()
            .stdout(predicate::str::contains("social_media_sentiment"));

        let spec = temp_dir
            .path()
            .join("jupyter")
            .join("kernels")
            .join("social_media_sentiment")
            .join("kernel.json");
        assert!(spec.exists());

        nbenv(temp_dir.path())
            .args(["kernel", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("social_media_sentiment"));

        nbenv(temp_dir.path())
            .args(["kernel", "uninstall", "social_media_sentiment"])
            .assert()
            .success();

        nbenv(temp_dir.path())
            .args(["kernel", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("social_media_sentiment").not());
    }

    #[test]
    fn test_kernel_list_json() {
        let temp_dir = create_test_env();
        fake_venv(temp_dir.path());

        nbenv(temp_dir.path())
            .args(["kernel", "install", "--name", "demo", "--display-name", "Demo"])
            .assert()
            .success();

        let output = nbenv(temp_dir.path())
            .args(["kernel", "list", "--format", "json"])
            .output()
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();

        assert_eq!(json[0]["name"], "demo");
        assert_eq!(json[0]["spec"]["display_name"], "Demo");
    }

    #[test]
    fn test_uninstall_missing_kernel() {
        let temp_dir = create_test_env();

        nbenv(temp_dir.path())
            .args(["kernel", "uninstall", "social_media_sentiment"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("内核未注册"));

        nbenv(temp_dir.path())
            .args(["kernel", "uninstall", "social_media_sentiment", "--missing-ok"])
            .assert()
            .success();
    }

    #[test]
    fn test_invalid_kernel_name() {
        let temp_dir = create_test_env();
        fake_venv(temp_dir.path());

        nbenv(temp_dir.path())
            .args(["kernel", "install", "--name", "bad name"])
            .assert()
            .code(2);
    }
}

#[cfg(unix)]
mod trust_commands {
    use super::*;

    const PROFILE: &str = "alias ll='ls -l'\n\n# nbenv: SSL_CERT_FILE\nexport SSL_CERT_FILE='/opt/certs/cacert.pem'\n";

    fn nbenv_bash(dir: &Path) -> Command {
        let mut cmd = nbenv(dir);
        cmd.env("SHELL", "/bin/bash");
        cmd
    }

    #[test]
    fn test_trust_show_reads_profile() {
        let temp_dir = create_test_env();
        fs::write(temp_dir.path().join(".bashrc"), PROFILE).unwrap();

        nbenv_bash(temp_dir.path())
            .args(["trust", "--show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("/opt/certs/cacert.pem"))
            .stdout(predicate::str::contains("当前进程: (未设置)"));
    }

    #[test]
    fn test_trust_clear_reverts_profile() {
        let temp_dir = create_test_env();
        let profile = temp_dir.path().join(".bashrc");
        fs::write(&profile, PROFILE).unwrap();

        nbenv_bash(temp_dir.path())
            .args(["trust", "--clear"])
            .assert()
            .success();

        let content = fs::read_to_string(&profile).unwrap();
        assert_eq!(content, "alias ll='ls -l'\n");

        nbenv_bash(temp_dir.path())
            .args(["trust", "--show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("/opt/certs/cacert.pem").not());
    }

    #[test]
    fn test_trust_clear_without_profile() {
        let temp_dir = create_test_env();

        nbenv_bash(temp_dir.path())
            .args(["trust", "--clear"])
            .assert()
            .success();
        assert!(!temp_dir.path().join(".bashrc").exists());
    }
}

#[cfg(unix)]
mod bootstrap_commands {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// 用 shell 脚本模拟解释器：venv 复制自身，pip freeze 输出固定清单，
    /// `-c` 输出证书路径，其余调用直接成功
    fn fake_python(dir: &Path, cert: &Path) -> PathBuf {
        let script = format!(
            r#"#!/bin/sh
if [ "$1" = "-m" ] && [ "$2" = "venv" ]; then
    mkdir -p "$3/bin" && cp "$0" "$3/bin/python" && chmod +x "$3/bin/python"
    exit 0
fi
if [ "$1" = "-m" ] && [ "$2" = "pip" ] && [ "$3" = "freeze" ]; then
    printf '%s\n' certifi==2024.8.30 ipykernel==6.29.5 jupyter==1.1.1 matplotlib==3.9.2 \
        nltk==3.9.1 numpy==2.1.3 pandas==2.2.3 scikit-learn==1.5.2 seaborn==0.13.2 \
        textblob==0.18.0 wordcloud==1.9.4
    exit 0
fi
if [ "$1" = "-c" ]; then
    echo "{}"
    exit 0
fi
exit 0
"#,
            cert.display()
        );

        let python = dir.join("system").join("python3");
        fs::create_dir_all(python.parent().unwrap()).unwrap();
        fs::write(&python, script).unwrap();
        fs::set_permissions(&python, fs::Permissions::from_mode(0o755)).unwrap();
        python
    }

    #[test]
    fn test_bootstrap_without_server() {
        let temp_dir = create_test_env();
        let cert = temp_dir.path().join("cacert.pem");
        fs::write(&cert, "").unwrap();
        let python = fake_python(temp_dir.path(), &cert);

        nbenv(temp_dir.path())
            .env("NBENV_PYTHON", &python)
            .args(["bootstrap", "--no-serve"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[1/6]"))
            .stdout(predicate::str::contains("[5/6]"))
            .stdout(predicate::str::contains("[6/6]").not());

        assert!(temp_dir.path().join("venv").join("bin").join("python").is_file());

        let manifest = fs::read_to_string(temp_dir.path().join("requirements.lock")).unwrap();
        assert!(manifest.contains("nltk==3.9.1"));

        let spec = fs::read_to_string(
            temp_dir
                .path()
                .join("jupyter")
                .join("kernels")
                .join("social_media_sentiment")
                .join("kernel.json"),
        )
        .unwrap();
        let spec: serde_json::Value = serde_json::from_str(&spec).unwrap();
        assert_eq!(spec["env"]["SSL_CERT_FILE"], cert.display().to_string());
        let argv0 = Path::new(spec["argv"][0].as_str().unwrap());
        assert!(argv0.is_absolute());
        assert!(argv0.ends_with("venv/bin/python"));

        // 第二次运行：环境已有效，不重建
        nbenv(temp_dir.path())
            .env("NBENV_PYTHON", &python)
            .args(["bootstrap", "--no-serve"])
            .assert()
            .success()
            .stdout(predicate::str::contains("已存在且有效"));
    }
}
