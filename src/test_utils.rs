//! 测试工具模块
//!
//! 提供统一的测试环境管理，避免环境变量污染；
//! 以及替代真实子进程的 `FakeRunner`。

use crate::error::Result;
use crate::utils::executor::{CommandOutput, CommandRunner};
use std::cell::RefCell;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

/// 环境变量守卫 - 自动清理
pub struct EnvGuard {
    original_vars: HashMap<String, String>,
}

impl Default for EnvGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvGuard {
    /// 创建一个新的环境守卫，记录当前环境变量
    pub fn new() -> Self {
        let original_vars: HashMap<String, String> = env::vars().collect();
        Self { original_vars }
    }

    /// 设置测试环境变量（自动包装为 unsafe）
    pub fn set_var(&self, key: &str, value: &str) {
        unsafe {
            env::set_var(key, value);
        }
    }

    /// 移除环境变量（自动包装为 unsafe）
    pub fn remove_var(&self, key: &str) {
        unsafe {
            env::remove_var(key);
        }
    }
}

impl Drop for EnvGuard {
    /// 释放时恢复原始环境变量
    fn drop(&mut self) {
        let current_vars: Vec<String> = env::vars().map(|(k, _)| k).collect();
        for key in current_vars {
            if !self.original_vars.contains_key(&key) {
                self.remove_var(&key);
            }
        }

        for (key, value) in &self.original_vars {
            if env::var(key).ok().as_deref() != Some(value.as_str()) {
                self.set_var(key, value);
            }
        }
    }
}

/// 创建一个空的“可执行文件”（只用于存在性检查）
pub fn touch(path: &Path) -> PathBuf {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, "").unwrap();
    path.to_path_buf()
}

type Handler = Box<dyn Fn(&Path, &[String]) -> CommandOutput>;

/// 记录调用并按脚本返回结果的假执行器
pub struct FakeRunner {
    handler: Handler,
    calls: RefCell<Vec<(PathBuf, Vec<String>, HashMap<String, String>)>>,
}

impl FakeRunner {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Path, &[String]) -> CommandOutput + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// 所有调用都成功且无输出
    pub fn succeeding() -> Self {
        Self::new(|_, _| CommandOutput::ok(""))
    }

    /// 已记录的参数列表
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.borrow().iter().map(|(_, a, _)| a.clone()).collect()
    }

    /// 最后一次调用注入的环境变量
    pub fn last_env(&self) -> Option<HashMap<String, String>> {
        self.calls.borrow().last().map(|(_, _, e)| e.clone())
    }

    /// 最后一次调用的程序
    pub fn last_program(&self) -> Option<PathBuf> {
        self.calls.borrow().last().map(|(p, _, _)| p.clone())
    }

    fn record(&self, program: &Path, args: &[String], env_vars: &HashMap<String, String>) {
        self.calls
            .borrow_mut()
            .push((program.to_path_buf(), args.to_vec(), env_vars.clone()));
    }
}

impl CommandRunner for FakeRunner {
    fn exec_with_env(
        &self,
        program: &Path,
        args: &[String],
        env_vars: &HashMap<String, String>,
    ) -> Result<i32> {
        self.record(program, args, env_vars);
        Ok((self.handler)(program, args).code)
    }

    fn capture_with_env(
        &self,
        program: &Path,
        args: &[String],
        env_vars: &HashMap<String, String>,
    ) -> Result<CommandOutput> {
        self.record(program, args, env_vars);
        Ok((self.handler)(program, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env_guard_cleanup() {
        {
            let guard = EnvGuard::new();
            guard.set_var("NBENV_TEST_CLEANUP_VAR", "cleanup_test");
            assert_eq!(env::var("NBENV_TEST_CLEANUP_VAR").unwrap(), "cleanup_test");
        }
        assert!(env::var("NBENV_TEST_CLEANUP_VAR").is_err());
    }

    #[test]
    fn test_fake_runner_records_calls() {
        let runner = FakeRunner::succeeding();
        runner
            .capture_with_env(Path::new("py"), &["-V".to_string()], &HashMap::new())
            .unwrap();
        assert_eq!(runner.calls(), vec![vec!["-V".to_string()]]);
        assert_eq!(runner.last_program().unwrap(), PathBuf::from("py"));
    }
}
