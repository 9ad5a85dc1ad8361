//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::cli::args::{Args, Commands, LogLevel, OutputFormat, ProbeArgs};
use crate::config::{Config, ConfigLoader, EnvTargets, TomlConfigLoader};
use crate::error::{Result, ServiceProbeError};
use crate::logging::LoggingSystem;
use crate::probe::{mysql, redis, ProbeKind, ProbeResult, ProbeSummary, Prober, ServiceProber};
use crate::web::WebServer;
use async_trait::async_trait;
use clap::ValueEnum;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 加载配置文件，文件不存在时使用默认配置（仅环境变量目标）
pub async fn load_config_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        info!("配置文件不存在: {}，使用默认配置", path.display());
        return Ok(Config::default());
    }

    let loader = TomlConfigLoader::new(true);
    loader.load_from_file(path).await
}

/// 确定日志级别
///
/// `--log-level` 或 `SERVICE_PROBE_LOG_LEVEL` 优先，其次是配置文件中的
/// `global.log_level`；配置无法加载时使用 info。
pub async fn resolve_log_level(args: &Args) -> LogLevel {
    if let Some(level) = &args.log_level {
        return level.clone();
    }

    load_config_or_default(&args.get_config_path())
        .await
        .ok()
        .and_then(|config| <LogLevel as ValueEnum>::from_str(&config.global.log_level, true).ok())
        .unwrap_or(LogLevel::Info)
}

/// 打印探测结果
fn print_results(results: &[ProbeResult], format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(results)?);
        }
        OutputFormat::Text => {
            for result in results {
                print_text_result(result);
            }
        }
    }
    Ok(())
}

/// 打印单个文本格式结果
fn print_text_result(result: &ProbeResult) {
    let status_icon = if result.status().is_healthy() {
        "✓"
    } else {
        "✗"
    };
    println!(
        "{} {} ({} {}) - {} - {}ms",
        status_icon,
        result.target_name,
        result.kind,
        result.address(),
        result.status(),
        result.elapsed_ms()
    );

    if let Some(version) = &result.version {
        println!("  版本: {version}");
    }
    for (name, value) in &result.metrics {
        println!("  {name}: {value}");
    }
    if let Some(error) = &result.error_message {
        println!("  错误: {error}");
    }
}

/// 检测命令
pub struct CheckCommand;

#[async_trait]
impl Command for CheckCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Check { target, format } = &args.command {
            self.perform_check(args, target.as_deref(), format).await
        } else {
            Ok(())
        }
    }
}

impl CheckCommand {
    /// 执行一次探测
    async fn perform_check(
        &self,
        args: &Args,
        target_name: Option<&str>,
        format: &OutputFormat,
    ) -> Result<()> {
        let config = load_config_or_default(&args.get_config_path()).await?;
        let targets: Vec<_> = config
            .resolve_targets_from_env()?
            .into_iter()
            .filter(|target| target_name.map_or(true, |name| target.name == name))
            .collect();

        if targets.is_empty() {
            return Err(match target_name {
                Some(name) => ServiceProbeError::Other(anyhow::anyhow!("未找到名为 '{name}' 的目标")),
                None => ServiceProbeError::Other(anyhow::anyhow!("未找到任何启用的目标")),
            });
        }

        info!("开始探测 {} 个目标", targets.len());
        let results = ServiceProber::new().probe_batch(&targets).await;
        results.iter().for_each(LoggingSystem::probe_log);
        print_results(&results, format)?;

        let summary = ProbeSummary::from_results(&results);
        if summary.all_up() {
            Ok(())
        } else {
            Err(ServiceProbeError::Other(anyhow::anyhow!(
                "{} 个目标中有 {} 个异常",
                summary.total,
                summary.total - summary.up
            )))
        }
    }
}

/// 单目标探测命令（`redis` / `mysql`）
pub struct ProbeCommand {
    kind: ProbeKind,
}

impl ProbeCommand {
    /// 创建指定协议的探测命令
    pub fn new(kind: ProbeKind) -> Self {
        Self { kind }
    }

    /// 命令行参数优先，未指定的主机和端口按环境变量和配置的 `env_file` 解析
    fn resolve_address(&self, probe_args: &ProbeArgs, config: &Config) -> Result<(String, u16)> {
        let source = config.global.env_source()?;
        let (env_host, env_port) = EnvTargets::resolve(|key| source.get(key), &config.global)
            .into_iter()
            .find(|target| target.kind == self.kind)
            .map(|target| (target.host, target.port))
            .unwrap_or_else(|| (self.kind.to_string(), self.kind.default_port()));

        Ok((
            probe_args.host.clone().unwrap_or(env_host),
            probe_args.port.unwrap_or(env_port),
        ))
    }
}

#[async_trait]
impl Command for ProbeCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let probe_args = match &args.command {
            Commands::Redis(probe_args) | Commands::Mysql(probe_args) => probe_args,
            _ => return Ok(()),
        };

        let config = load_config_or_default(&args.get_config_path()).await?;
        let (host, port) = self.resolve_address(probe_args, &config)?;
        let connect_timeout = Duration::from_millis(probe_args.connect_timeout_ms);
        let read_timeout = Duration::from_millis(probe_args.read_timeout_ms);

        let result = match self.kind {
            ProbeKind::Redis => redis::probe(&host, port, connect_timeout, read_timeout).await,
            ProbeKind::Mysql => mysql::probe(&host, port, connect_timeout, read_timeout).await,
        };
        LoggingSystem::probe_log(&result);

        match probe_args.format {
            OutputFormat::Json => println!("{}", result.to_json()?),
            OutputFormat::Text => print_text_result(&result),
        }

        if result.status().is_healthy() {
            Ok(())
        } else {
            Err(ServiceProbeError::Other(anyhow::anyhow!(
                "{} 探测失败: {}",
                self.kind,
                result.error_message.unwrap_or_default()
            )))
        }
    }
}

/// 等待 Ctrl+C
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("收到中断信号，正在停止服务..."),
        Err(err) => error!("监听中断信号失败: {}", err),
    }
}

/// Web 状态页命令
pub struct ServeCommand;

#[async_trait]
impl Command for ServeCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let Commands::Serve { bind, port } = &args.command else {
            return Ok(());
        };

        let config = load_config_or_default(&args.get_config_path()).await?;
        let targets = config.resolve_targets_from_env()?;

        let mut web_config = config.global.web.clone().unwrap_or_default();
        if let Some(bind) = bind {
            web_config.bind_address = bind.clone();
        }
        if let Some(port) = port {
            web_config.port = *port;
        }

        if targets.is_empty() {
            warn!("没有任何探测目标，状态页将为空");
        }
        for target in &targets {
            info!("探测目标: {} ({} {})", target.name, target.kind, target.address());
        }

        let server = WebServer::new(web_config, targets, Arc::new(ServiceProber::new()));
        server.start(shutdown_signal()).await
    }
}

/// 初始化命令
pub struct InitCommand;

#[async_trait]
impl Command for InitCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Init { config_path, force } = &args.command {
            self.create_config_file(config_path, *force).await
        } else {
            Ok(())
        }
    }
}

impl InitCommand {
    /// 配置文件模板
    const TEMPLATE: &'static str = include_str!("../../templates/config.toml");

    /// 创建配置文件
    async fn create_config_file(&self, config_path: &Path, force: bool) -> Result<()> {
        if config_path.exists() && !force {
            eprintln!("配置文件已存在: {}", config_path.display());
            eprintln!("使用 --force 参数覆盖现有文件");
            return Ok(());
        }

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tokio::fs::write(config_path, Self::TEMPLATE).await?;

        println!("配置文件已创建: {}", config_path.display());
        println!("请编辑配置文件以添加您的探测目标");

        Ok(())
    }
}

/// 验证命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Validate {
            config_path,
            verbose,
        } = &args.command
        {
            let config_file = config_path
                .clone()
                .unwrap_or_else(|| args.get_config_path());

            self.validate_config_file(&config_file, *verbose).await
        } else {
            Ok(())
        }
    }
}

impl ValidateCommand {
    /// 验证配置文件
    async fn validate_config_file(&self, config_path: &Path, verbose: bool) -> Result<()> {
        println!("验证配置文件: {}", config_path.display());

        let loader = TomlConfigLoader::new(true);
        let config = loader.load_from_file(config_path).await?;

        if verbose {
            println!("配置验证通过！");
            println!("全局配置:");
            println!("  日志级别: {}", config.global.log_level);
            println!("  连接超时: {}ms", config.global.connect_timeout_ms);
            println!("  读取超时: {}ms", config.global.read_timeout_ms);
            println!(
                "  环境变量目标: {}",
                if config.global.use_env_targets { "是" } else { "否" }
            );

            println!("目标配置:");
            for (i, target) in config.targets.iter().enumerate() {
                let resolved = target.to_target(&config.global);
                println!("  {}. {} ({} {})", i + 1, target.name, target.kind, resolved.address());
                println!(
                    "     超时: 连接 {}ms / 读取 {}ms",
                    resolved.connect_timeout.as_millis(),
                    resolved.read_timeout.as_millis()
                );
                println!("     启用状态: {}", if target.enabled { "是" } else { "否" });
            }
        } else {
            println!("✓ 配置文件验证通过");
            println!("✓ 找到 {} 个目标配置", config.targets.len());
        }

        Ok(())
    }
}

/// 版本命令
pub struct VersionCommand;

#[async_trait]
impl Command for VersionCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Version { format } = &args.command {
            match format {
                OutputFormat::Json => {
                    let version_info = serde_json::json!({
                        "name": crate::APP_NAME,
                        "version": crate::VERSION,
                        "description": crate::APP_DESCRIPTION,
                        "protocols": ProbeKind::ALL,
                    });
                    println!("{}", serde_json::to_string_pretty(&version_info)?);
                }
                OutputFormat::Text => {
                    println!("{} v{}", crate::APP_NAME, crate::VERSION);
                    println!("{}", crate::APP_DESCRIPTION);
                }
            }
        }
        Ok(())
    }
}
