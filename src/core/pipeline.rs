//! 引导流程：按顺序执行六个步骤
//!
//! 任一步骤失败即停止，已完成步骤的效果保留。每个步骤本身幂等，
//! 重新运行即可从失败处继续。

use crate::config::settings::Settings;
use crate::core::installer::{DependencyInstaller, InstallReport};
use crate::core::kernels::{KernelRegistrar, KernelSpec};
use crate::core::locator::{Interpreter, InterpreterLocator};
use crate::core::provisioner::{Environment, EnvironmentProvisioner, Outcome};
use crate::core::server::NotebookServer;
use crate::core::truststore::{self, TrustStore, TrustStoreConfigurator};
use crate::error::{Result, SetupError};
use crate::types::Step;
use crate::utils::executor::CommandRunner;
use crate::utils::system_env::UserEnvStore;
use std::path::PathBuf;

/// 引导选项
#[derive(Debug, Clone, Default)]
pub struct BootstrapOptions {
    /// 强制重建虚拟环境
    pub recreate: bool,
    /// 持久化证书变量
    pub persist_trust: bool,
    /// 完成注册后不启动服务器
    pub no_serve: bool,
}

/// 引导结果
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub interpreter: Interpreter,
    pub environment: Outcome,
    pub install: InstallReport,
    pub trust: TrustStore,
    pub kernel_spec: PathBuf,
    /// 服务器退出码；未启动时为 None
    pub server_exit: Option<i32>,
}

/// 引导流程
pub struct Bootstrap<'a, R: CommandRunner> {
    settings: &'a Settings,
    runner: &'a R,
    registrar: &'a KernelRegistrar,
    user_env: Option<&'a dyn UserEnvStore>,
}

impl<'a, R: CommandRunner> Bootstrap<'a, R> {
    pub fn new(settings: &'a Settings, runner: &'a R, registrar: &'a KernelRegistrar) -> Self {
        Self {
            settings,
            runner,
            registrar,
            user_env: None,
        }
    }

    /// 指定证书变量的持久化位置
    pub fn with_user_env(mut self, store: &'a dyn UserEnvStore) -> Self {
        self.user_env = Some(store);
        self
    }

    /// 依次执行各步骤；`on_step` 在每个步骤完成后回调
    pub fn run<F>(
        &self,
        locator: &InterpreterLocator,
        options: &BootstrapOptions,
        mut on_step: F,
    ) -> Result<BootstrapReport>
    where
        F: FnMut(Step, &str),
    {
        let settings = self.settings;

        if options.persist_trust && self.user_env.is_none() {
            return Err(SetupError::InvalidArgument(
                "persist_trust 需要先通过 with_user_env 指定存储位置".to_string(),
            ));
        }

        // 1. 定位解释器
        let interpreter = locator.locate()?;
        on_step(Step::Locate, &interpreter.to_string());

        // 2. 虚拟环境
        let env = Environment::new(&settings.environment.dir);
        let outcome = EnvironmentProvisioner::new(self.runner).ensure(
            &env,
            &interpreter.path,
            options.recreate,
        )?;
        on_step(Step::Provision, &format!("{} ({})", env.root().display(), outcome));
        let python = env.require_python()?;

        // 3. 依赖
        let install = DependencyInstaller::new(
            self.runner,
            &settings.packages,
            &settings.environment.manifest,
        )
        .install(&python, settings.packages.policy)?;
        on_step(
            Step::Install,
            &format!(
                "{} 个包 -> {}",
                install.installed,
                settings.environment.manifest.display()
            ),
        );

        // 4. 证书
        let configurator = TrustStoreConfigurator::new(self.runner, &settings.trust);
        let trust = configurator.configure(&python)?;
        if let Some(store) = self.user_env.filter(|_| options.persist_trust) {
            configurator.persist(&trust, store)?;
        }
        on_step(
            Step::Trust,
            &format!("{}={}", trust.variable(), trust.path().display()),
        );

        // 5. 内核
        let spec = KernelSpec::new(&python, &settings.kernel.display_name)
            .with_env(truststore::env_vars(Some(&trust)));
        let kernel_spec = self.registrar.register(&settings.kernel.name, &spec)?;
        on_step(Step::Kernel, &settings.kernel.name);

        // 6. 服务器
        let server_exit = if options.no_serve {
            None
        } else {
            let code = NotebookServer::new(self.runner, &settings.server).launch(&python, Some(&trust))?;
            on_step(Step::Serve, &format!("退出码 {}", code));
            Some(code)
        };

        Ok(BootstrapReport {
            interpreter,
            environment: outcome,
            install,
            trust,
            kernel_spec,
            server_exit,
        })
    }
}
