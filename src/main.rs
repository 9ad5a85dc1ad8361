//! Service Probe 主程序入口
//!
//! Redis/MySQL 连通性探测工具

use anyhow::{Context, Result};
use clap::Parser;
use service_probe::cli::args::{Args, Commands, LogLevel};
use service_probe::cli::commands::{
    resolve_log_level, CheckCommand, Command, InitCommand, ProbeCommand, ServeCommand,
    ValidateCommand, VersionCommand,
};
use service_probe::logging::{LogConfig, LoggingSystem};
use service_probe::probe::ProbeKind;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();

    // 初始化日志系统，命令行未指定级别时读取配置文件
    let level = resolve_log_level(&args).await;
    let verbose = args.verbose || level == LogLevel::Debug;
    let mut log_config = LogConfig {
        level: level.into(),
        console: true,
        json_format: false,
        ..Default::default()
    };
    if verbose {
        log_config
            .module_levels
            .insert("service_probe".to_string(), log::LevelFilter::Debug);
    }

    let _logging_system = LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;

    info!("Service Probe v{} 启动", service_probe::VERSION);

    if let Err(e) = execute_command(&args).await {
        error!("命令执行失败: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// 执行CLI命令
async fn execute_command(args: &Args) -> Result<()> {
    let command: Box<dyn Command> = match &args.command {
        Commands::Check { .. } => Box::new(CheckCommand),
        Commands::Redis(_) => Box::new(ProbeCommand::new(ProbeKind::Redis)),
        Commands::Mysql(_) => Box::new(ProbeCommand::new(ProbeKind::Mysql)),
        Commands::Serve { .. } => Box::new(ServeCommand),
        Commands::Init { .. } => Box::new(InitCommand),
        Commands::Validate { .. } => Box::new(ValidateCommand),
        Commands::Version { .. } => Box::new(VersionCommand),
    };

    command
        .execute(args)
        .await
        .with_context(|| format!("{} 命令执行失败", command_name(&args.command)))
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Check { .. } => "check",
        Commands::Redis(_) => "redis",
        Commands::Mysql(_) => "mysql",
        Commands::Serve { .. } => "serve",
        Commands::Init { .. } => "init",
        Commands::Validate { .. } => "validate",
        Commands::Version { .. } => "version",
    }
}
