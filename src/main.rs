use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::prelude::*;
use versionscan_lib::commands::{compare, diagnostics, log, scan};
use versionscan_lib::logging::{self, get_log_dir, LogConfig, SizeRotatingWriter};
use versionscan_lib::models::{Credentials, RemoteScanRequest, ScanRequest, ScanTarget};
use versionscan_lib::AppState;

#[derive(Parser)]
#[command(name = "versionscan", version, about = "Scan executables and compare release folders")]
struct Cli {
    /// 配置与日志目录
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct RemoteArgs {
    /// 远程主机名或 IP
    #[arg(long)]
    host: String,
    /// 用户名，缺省读取 VERSIONSCAN_REMOTE_USER
    #[arg(long, env = "VERSIONSCAN_REMOTE_USER")]
    user: String,
    /// 存放密码的环境变量名
    #[arg(long, default_value = "VERSIONSCAN_REMOTE_PASSWORD")]
    password_env: String,
}

impl RemoteArgs {
    fn credentials(&self) -> anyhow::Result<Credentials> {
        let password = std::env::var(&self.password_env)
            .with_context(|| format!("环境变量 {} 未设置", self.password_env))?;
        Ok(Credentials::new(self.user.clone(), password))
    }
}

#[derive(Args)]
struct ScanArgs {
    /// 文件名通配符
    #[arg(long)]
    pattern: Option<String>,
    /// 只扫描顶层
    #[arg(long)]
    no_recurse: bool,
    /// 只扫描这些子目录
    #[arg(long = "folder")]
    folders: Vec<String>,
}

#[derive(Subcommand)]
enum Command {
    /// 扫描本地目录
    Scan {
        directory: String,
        #[command(flatten)]
        args: ScanArgs,
    },
    /// 扫描远程目录
    ScanRemote {
        path: String,
        #[command(flatten)]
        remote: RemoteArgs,
        #[command(flatten)]
        args: ScanArgs,
    },
    /// 匹配并对比两个版本目录
    Compare {
        current: String,
        future: String,
        #[arg(long)]
        pattern: Option<String>,
        /// 在远程主机上对比
        #[arg(long)]
        host: Option<String>,
        #[arg(long, env = "VERSIONSCAN_REMOTE_USER")]
        user: Option<String>,
        #[arg(long, default_value = "VERSIONSCAN_REMOTE_PASSWORD")]
        password_env: String,
    },
    /// 只匹配目录
    Match { current: String, future: String },
    /// 测试远程连接
    TestRemote {
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// 在远程 Application 事件日志中记录本次连接
    LogEvent {
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// 检查远程目录
    ValidateRemote {
        path: String,
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// 在远程常用位置查找目录
    FindRemote {
        name: String,
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// 检查本地目录
    Check { path: String },
    /// 格式化字节数，或给出文件路径
    Size { value: String },
    /// 显示当前配置，--init 写入默认值
    Config {
        #[arg(long)]
        init: bool,
    },
    /// 查看或修改日志配置
    LogConfig {
        #[arg(long)]
        enabled: Option<bool>,
        #[arg(long)]
        max_size_mb: Option<u32>,
        #[arg(long)]
        level: Option<String>,
    },
}

/// 初始化日志系统：文件 + stderr
fn init_logging(config_dir: &std::path::Path) {
    let config = LogConfig::load(config_dir);
    if !config.enabled {
        let _ = tracing::subscriber::set_global_default(tracing_subscriber::registry());
        return;
    }

    let rust_log = std::env::var("RUST_LOG").ok();
    let env_filter = logging::env_filter(&config, rust_log.as_deref());

    // 文件日志创建失败时只输出到控制台
    let file_writer = SizeRotatingWriter::new(&get_log_dir(config_dir), config.max_size_mb);
    let file_layer = file_writer.as_ref().ok().map(|writer| {
        tracing_subscriber::fmt::layer()
            .with_writer(writer.clone())
            .with_ansi(false)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
    });

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer);
    let _ = tracing::subscriber::set_global_default(subscriber);

    if let Err(e) = file_writer {
        tracing::warn!("无法创建日志文件: {}", e);
    }
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn scan_request(directory: String, args: ScanArgs, default_pattern: &str) -> ScanRequest {
    ScanRequest::new(directory)
        .with_pattern(args.pattern.unwrap_or_else(|| default_pattern.to_string()))
        .with_recursive(!args.no_recurse)
        .with_folders(args.folders)
}

async fn run(state: &AppState, command: Command) -> anyhow::Result<bool> {
    let pattern = state.config.default_pattern.clone();

    let success = match command {
        Command::Scan { directory, args } => {
            let result = scan::scan_local(state, scan_request(directory, args, &pattern)).await;
            print(&result)?;
            result.success
        }
        Command::ScanRemote { path, remote, args } => {
            let request = RemoteScanRequest::new(remote.host.clone(), remote.credentials()?, path)
                .with_pattern(args.pattern.unwrap_or(pattern))
                .with_recursive(!args.no_recurse)
                .with_folders(args.folders);
            let result = scan::scan_remote(state, request).await;
            print(&result)?;
            result.success
        }
        Command::Compare {
            current,
            future,
            pattern,
            host,
            user,
            password_env,
        } => {
            let target = match host {
                Some(host) => {
                    let remote = RemoteArgs {
                        host,
                        user: user.context("远程对比需要 --user")?,
                        password_env,
                    };
                    ScanTarget::Remote {
                        credentials: remote.credentials()?,
                        host: remote.host,
                    }
                }
                None => ScanTarget::Local,
            };
            let result =
                compare::compare_folders(state, &current, &future, &target, pattern.as_deref()).await;
            print(&result)?;
            result.success
        }
        Command::Match { current, future } => {
            let result = compare::match_directories(state, &current, &future, &ScanTarget::Local).await;
            print(&result)?;
            result.success
        }
        Command::TestRemote { remote } => {
            let result = diagnostics::test_connection(state, &remote.host, &remote.credentials()?).await;
            print(&result)?;
            result.success
        }
        Command::LogEvent { remote } => {
            let result =
                diagnostics::log_connection_event(state, &remote.host, &remote.credentials()?).await;
            print(&result)?;
            result.success
        }
        Command::ValidateRemote { path, remote } => {
            let result =
                diagnostics::validate_remote_directory(state, &remote.host, &remote.credentials()?, &path)
                    .await;
            print(&result)?;
            result.success
        }
        Command::FindRemote { name, remote } => {
            let result =
                diagnostics::find_remote_directory(state, &remote.host, &remote.credentials()?, &name)
                    .await;
            print(&result)?;
            result.success
        }
        Command::Check { path } => {
            let result = diagnostics::check_local_directory(&path).await;
            print(&result)?;
            result.success
        }
        Command::Size { value } => {
            let report = match value.parse::<u64>() {
                Ok(bytes) => scan::describe_size(bytes),
                Err(_) => scan::describe_file_size(&value)
                    .await
                    .map_err(anyhow::Error::msg)?,
            };
            print(&report)?;
            true
        }
        Command::Config { init } => {
            if init {
                state.config.save(&state.config_dir)?;
                LogConfig::load(&state.config_dir).save(&state.config_dir)?;
                tracing::info!("已写入配置: {:?}", state.config_dir.join("config.json"));
            }
            print(&state.config)?;
            true
        }
        Command::LogConfig {
            enabled,
            max_size_mb,
            level,
        } => {
            let config = log::update_log_config(state, enabled, max_size_mb, level)
                .map_err(anyhow::Error::msg)?;
            print(&config)?;
            true
        }
    };
    Ok(success)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let state = AppState::new(cli.config_dir).context("初始化应用状态失败")?;
    init_logging(&state.config_dir);

    let interrupt = state.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cleanup();
        }
    });

    if !run(&state, cli.command).await? {
        std::process::exit(1);
    }
    Ok(())
}
