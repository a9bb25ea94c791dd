//! nbenv 主程序入口
//!
//! 设计原则：
//! - 模块化：入口代码简洁，逻辑委托给各模块
//! - 安静模式：除命令本身的结果外默认无输出
//! - 错误处理：详细/安静错误模式，通过 --verbose 切换
//! - 进程级环境变量只在这里读取（证书路径的最终回退）

use clap::Parser;
use nbenv::cli::{self, Cli, Commands, ConfigCommands, KernelCommands};
use nbenv::config::Settings;
use nbenv::config::format::requirements::Manifest;
use nbenv::core::installer::DependencyInstaller;
use nbenv::core::kernels::{KernelRegistrar, KernelSpec};
use nbenv::core::locator::InterpreterLocator;
use nbenv::core::pipeline::{Bootstrap, BootstrapOptions};
use nbenv::core::provisioner::{Environment, EnvironmentProvisioner};
use nbenv::core::server::{self, NotebookServer};
use nbenv::core::truststore::{self, TrustStore, TrustStoreConfigurator};
use nbenv::error::Result;
use nbenv::types::{Config, OutputFormat};
use nbenv::utils::executor::{CommandExecutor, CommandRunner, args};
use nbenv::utils::paths::{self, file_exists, read_file};
use nbenv::utils::system_env::{SystemEnvWriter, UserEnvStore};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = init_config(&cli);

    let (settings, source) = match Settings::load(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("配置初始化失败: {}", e);
            std::process::exit(1);
        }
    };

    let ctx = Context {
        config,
        settings,
        source,
        runner: CommandExecutor,
    };

    match run_command(cli.command, &ctx) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            e.report(ctx.config.verbose);
            std::process::exit(e.exit_code());
        }
    }
}

/// 日志：默认 warn，--verbose 时 nbenv 为 debug；RUST_LOG 优先
fn init_logging(verbose: bool) {
    let default = if verbose { "warn,nbenv=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// 初始化运行时选项
fn init_config(cli: &Cli) -> Config {
    Config {
        verbose: cli.verbose,
    }
}

/// 命令执行上下文
struct Context {
    config: Config,
    settings: Settings,
    source: Option<PathBuf>,
    runner: CommandExecutor,
}

impl Context {
    fn environment(&self) -> Environment {
        Environment::new(&self.settings.environment.dir)
    }

    fn locator(&self) -> InterpreterLocator {
        InterpreterLocator::from_settings(&self.settings.interpreter)
    }

    /// 证书路径：优先查询环境中的证书包，失败时回退到进程环境变量
    fn trust_store(&self, python: &Path) -> Result<Option<TrustStore>> {
        let configurator = TrustStoreConfigurator::new(&self.runner, &self.settings.trust);
        match configurator.configure(python) {
            Ok(trust) => Ok(Some(trust)),
            Err(e) => {
                tracing::warn!(error = %e, "无法从环境获取证书路径，回退到当前环境变量");
                TrustStore::from_ambient(&self.settings.trust.variable)
            }
        }
    }
}

/// 运行具体命令，返回进程退出码
fn run_command(command: Commands, ctx: &Context) -> Result<i32> {
    let verbose = ctx.config.verbose;
    let settings = &ctx.settings;

    match command {
        Commands::Locate => {
            let interpreter = ctx.locator().locate()?;
            println!("{}", interpreter);
            if verbose {
                println!("  (策略: {})", interpreter.strategy);
            }
        }

        Commands::Provision { recreate } => {
            let interpreter = ctx.locator().locate()?;
            let env = ctx.environment();
            let outcome =
                EnvironmentProvisioner::new(&ctx.runner).ensure(&env, &interpreter.path, recreate)?;
            println!("✓ 虚拟环境 {}: {}", outcome, env.root().display());
        }

        Commands::Install { policy } => {
            let python = ctx.environment().require_python()?;
            let policy = match policy {
                Some(p) => cli::parse_policy(&p)?,
                None => settings.packages.policy,
            };

            // 环境里还没有证书包，沿用进程中已有的证书路径
            let ambient = TrustStore::from_ambient(&settings.trust.variable)?;
            let report = DependencyInstaller::new(
                &ctx.runner,
                &settings.packages,
                &settings.environment.manifest,
            )
            .with_env(truststore::env_vars(ambient.as_ref()))
            .install(&python, policy)?;

            println!(
                "✓ 已安装 {} 个包，清单: {}",
                report.installed,
                settings.environment.manifest.display()
            );
            if !report.pinned.is_empty() && verbose {
                println!("  按清单固定版本: {}", report.pinned.join(", "));
            }
            for package in &report.skipped {
                println!("  ○ 跳过可选依赖: {}", package);
            }
            if !report.corpora_failed.is_empty() {
                println!("  ⚠️  语料下载失败: {}", report.corpora_failed.join(", "));
            }
        }

        Commands::Trust {
            persist,
            clear,
            show,
        } => {
            let store = SystemEnvWriter::detect()?;
            let configurator = TrustStoreConfigurator::new(&ctx.runner, &settings.trust);
            let variable = &settings.trust.variable;

            if show {
                let persisted = store.get_var(variable)?;
                let current = std::env::var(variable).ok();
                println!(
                    "用户级 ({}): {}",
                    store.location(),
                    persisted.as_deref().unwrap_or("(未设置)")
                );
                println!("当前进程: {}", current.as_deref().unwrap_or("(未设置)"));
            } else if clear {
                configurator.clear(&store)?;
                if verbose {
                    println!("✓ 已清除 {} ({})", variable, store.location());
                }
            } else {
                let python = ctx.environment().require_python()?;
                let trust = configurator.configure(&python)?;
                println!("{}={}", trust.variable(), trust.path().display());
                if persist {
                    configurator.persist(&trust, &store)?;
                    println!("✓ 已写入 {}，新开的终端生效", store.location());
                }
            }
        }

        Commands::Kernel(kernel_cmd) => run_kernel_command(kernel_cmd, ctx)?,

        Commands::Serve { port, no_browser } => {
            let python = ctx.environment().require_python()?;
            let mut server_settings = settings.server.clone();
            if let Some(port) = port {
                server_settings.port = port;
            }
            server_settings.no_browser |= no_browser;

            let trust = ctx.trust_store(&python)?;
            return NotebookServer::new(&ctx.runner, &server_settings).launch(&python, trust.as_ref());
        }

        Commands::Bootstrap {
            recreate,
            persist_trust,
            no_serve,
        } => {
            let registrar = KernelRegistrar::for_user()?;
            let store = SystemEnvWriter::detect()?;
            let options = BootstrapOptions {
                recreate,
                persist_trust,
                no_serve,
            };

            let report = Bootstrap::new(settings, &ctx.runner, &registrar)
                .with_user_env(&store)
                .run(&ctx.locator(), &options, |step, detail| {
                    println!("[{}/6] ✓ {}: {}", step.number(), step, detail);
                })?;

            if let Some(code) = report.server_exit {
                return Ok(code);
            }
            println!(
                "\n✅ 完成。运行 `nbenv serve` 后访问 {}",
                server::access_url(settings.server.port)
            );
        }

        Commands::Status => show_status(ctx)?,

        Commands::Doctor => {
            let issues = diagnose(ctx)?;
            if issues > 0 {
                return Ok(1);
            }
        }

        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init { force } => {
                let path = paths::get_project_config_path()?;
                if Settings::default().save(&path, force)? {
                    println!("✓ 已生成配置文件: {}", path.display());
                } else {
                    println!("○ 配置文件已存在: {} (使用 --force 覆盖)", path.display());
                }
            }
            ConfigCommands::Show => {
                match &ctx.source {
                    Some(path) => println!("# 来源: {}", path.display()),
                    None => println!("# 来源: 内置默认值"),
                }
                print!("{}", settings.to_toml()?);
            }
        },
    }

    Ok(0)
}

/// 内核子命令
fn run_kernel_command(command: KernelCommands, ctx: &Context) -> Result<()> {
    let registrar = KernelRegistrar::for_user()?;
    let settings = &ctx.settings;

    match command {
        KernelCommands::Install { name, display_name } => {
            let python = ctx.environment().require_python()?;
            let name = name.unwrap_or_else(|| settings.kernel.name.clone());
            let display_name = display_name.unwrap_or_else(|| settings.kernel.display_name.clone());

            let trust = ctx.trust_store(&python)?;
            let spec = KernelSpec::new(&python, &display_name)
                .with_env(truststore::env_vars(trust.as_ref()));
            let path = registrar.register(&name, &spec)?;

            println!("✓ 已注册内核 {} ({})", name, display_name);
            if ctx.config.verbose {
                println!("  {}", path.display());
            }
        }

        KernelCommands::List { format } => {
            let kernels = registrar.list()?;
            match OutputFormat::from(format.as_str()) {
                OutputFormat::Text => {
                    for kernel in &kernels {
                        println!(
                            "{}\t{}\t{}",
                            kernel.name,
                            kernel.spec.display_name,
                            kernel.spec.interpreter().unwrap_or("-")
                        );
                    }
                }
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&kernels)?);
                }
            }
        }

        KernelCommands::Uninstall { name, missing_ok } => {
            let removed = registrar.uninstall(&name, missing_ok)?;
            if ctx.config.verbose {
                if removed {
                    println!("✓ 已卸载内核: {}", name);
                } else {
                    println!("○ 内核未注册: {}", name);
                }
            }
        }
    }

    Ok(())
}

/// 显示当前状态
fn show_status(ctx: &Context) -> Result<()> {
    let settings = &ctx.settings;

    match &ctx.source {
        Some(path) => println!("配置文件: {}", path.display()),
        None => println!("配置文件: (内置默认值)"),
    }

    match ctx.locator().locate() {
        Ok(interpreter) => println!("解释器: {} [{}]", interpreter, interpreter.strategy),
        Err(_) => println!("解释器: 未找到"),
    }

    let env = ctx.environment();
    let env_state = if env.is_valid() {
        "有效"
    } else if env.root().exists() {
        "无效"
    } else {
        "不存在"
    };
    println!("虚拟环境: {} [{}]", env.root().display(), env_state);

    let manifest_path = &settings.environment.manifest;
    if file_exists(manifest_path) {
        let manifest = Manifest::parse(&read_file(manifest_path)?)?;
        println!("依赖清单: {} [{} 个包]", manifest_path.display(), manifest.len());
    } else {
        println!("依赖清单: {} [不存在]", manifest_path.display());
    }

    let variable = &settings.trust.variable;
    let persisted = SystemEnvWriter::detect()
        .and_then(|store| store.get_var(variable))
        .ok()
        .flatten();
    println!(
        "证书变量: {} = {}",
        variable,
        persisted.as_deref().unwrap_or("(未持久化)")
    );

    let registrar = KernelRegistrar::for_user()?;
    let registered = registrar.get(&settings.kernel.name)?.is_some();
    println!(
        "内核: {} [{}]",
        settings.kernel.name,
        if registered { "已注册" } else { "未注册" }
    );

    println!("服务器地址: {}", server::access_url(settings.server.port));

    if ctx.config.verbose {
        println!("\n已注册的全部内核 ({}):", registrar.kernels_dir().display());
        for kernel in registrar.list()? {
            println!("  {} - {}", kernel.name, kernel.spec.display_name);
        }
    }

    Ok(())
}

/// 诊断问题，返回问题数
fn diagnose(ctx: &Context) -> Result<usize> {
    let settings = &ctx.settings;

    println!("🔍 nbenv 环境诊断\n");
    println!("平台: {}", std::env::consts::OS);
    println!("──────────────────────────────────────────────\n");

    let mut issues = 0;
    let mut warnings = 0;

    // 1. 解释器
    println!("🐍 1. 解释器");
    match ctx.locator().locate() {
        Ok(interpreter) => {
            let version = ctx
                .runner
                .capture_with_env(&interpreter.path, &args(["--version"]), &Default::default())
                .map(|out| out.combined())
                .unwrap_or_else(|e| format!("无法执行: {}", e));
            println!("   ✓ {} ({})", interpreter, version.trim());
        }
        Err(e) => {
            println!("   ❌ {}", e);
            println!("   解决：安装 Python 3.10+ 或设置 NBENV_PYTHON");
            issues += 1;
        }
    }
    println!();

    // 2. 虚拟环境
    println!("📦 2. 虚拟环境");
    let env = ctx.environment();
    if env.is_valid() {
        println!("   ✓ {}", env.python().display());
    } else {
        println!("   ❌ 无效或不存在: {}", env.root().display());
        println!("   解决：nbenv provision");
        issues += 1;
    }
    println!();

    // 3. 依赖清单
    println!("📄 3. 依赖清单");
    let manifest_path = &settings.environment.manifest;
    if file_exists(manifest_path) {
        let manifest = Manifest::parse(&read_file(manifest_path)?)?;
        let missing = manifest.missing(&settings.packages.required);
        if missing.is_empty() {
            println!("   ✓ {} 个包，必需依赖齐全", manifest.len());
        } else {
            println!("   ❌ 缺少: {}", missing.join(", "));
            println!("   解决：nbenv install");
            issues += 1;
        }
    } else {
        println!("   ○ 清单不存在: {}", manifest_path.display());
        warnings += 1;
    }
    println!();

    // 4. 证书变量
    println!("🔐 4. 证书变量");
    let variable = &settings.trust.variable;
    match SystemEnvWriter::detect().and_then(|store| store.get_var(variable)) {
        Ok(Some(value)) if file_exists(Path::new(&value)) => {
            println!("   ✓ {} = {}", variable, value);
        }
        Ok(Some(value)) => {
            println!("   ❌ {} 指向不存在的文件: {}", variable, value);
            println!("   解决：nbenv trust --persist");
            issues += 1;
        }
        Ok(None) => {
            println!("   ○ {} 未持久化", variable);
            warnings += 1;
        }
        Err(e) => {
            println!("   ❌ 无法读取: {}", e);
            issues += 1;
        }
    }
    println!();

    // 5. 内核
    println!("🧩 5. 内核");
    let registrar = KernelRegistrar::for_user()?;
    match registrar.get(&settings.kernel.name)? {
        Some(kernel) => {
            let interpreter = kernel.spec.interpreter().unwrap_or_default();
            if file_exists(Path::new(interpreter)) {
                println!("   ✓ {} -> {}", kernel.name, interpreter);
            } else {
                println!("   ❌ {} 指向不存在的解释器: {}", kernel.name, interpreter);
                println!("   解决：nbenv kernel install");
                issues += 1;
            }
        }
        None => {
            println!("   ○ {} 未注册", settings.kernel.name);
            warnings += 1;
        }
    }
    println!();

    // 6. 脚本执行策略（仅 Windows）
    if cfg!(target_os = "windows") {
        println!("🛡️ 6. 脚本执行策略");
        let policy = ctx.runner.capture_with_env(
            Path::new("powershell"),
            &args(["-NoProfile", "-Command", "Get-ExecutionPolicy -Scope CurrentUser"]),
            &Default::default(),
        );
        match policy {
            Ok(out) if matches!(out.stdout.trim(), "Restricted" | "AllSigned") => {
                println!("   ❌ 当前策略: {}，无法运行虚拟环境激活脚本", out.stdout.trim());
                println!("   解决：Set-ExecutionPolicy -Scope CurrentUser RemoteSigned");
                issues += 1;
            }
            Ok(out) => println!("   ✓ 当前策略: {}", out.stdout.trim()),
            Err(e) => {
                println!("   ○ 无法检测: {}", e);
                warnings += 1;
            }
        }
        println!();
    }

    println!("──────────────────────────────────────────────");
    if issues == 0 && warnings == 0 {
        println!("✅ 所有检查通过");
    } else {
        if issues > 0 {
            println!("❌ 发现 {} 个问题需要修复", issues);
        }
        if warnings > 0 {
            println!("⚠️  发现 {} 个警告", warnings);
        }
    }

    Ok(issues)
}

