use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use invoice_intake::config::Config;
use invoice_intake::orchestrator::App;
use invoice_intake::utils::logging;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "invoice-intake",
    about = "批量提交发票文件进行抽取与一致性校验",
    version
)]
struct Cli {
    /// TOML 配置文件（不指定时读取环境变量）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 把目录中的发票作为一个批次处理（默认命令）
    Batch(BatchArgs),
    /// 启动抽取网关
    Serve(ServeArgs),
}

#[derive(Args, Debug, Default)]
struct BatchArgs {
    /// 覆盖配置中的发票目录
    #[arg(long)]
    input: Option<String>,
    /// 覆盖配置中的报告文件路径
    #[arg(long)]
    report: Option<String>,
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// 覆盖配置中的网关监听地址
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let mut config = match &cli.config {
        Some(path) => Config::from_toml_file(path)?,
        None => Config::from_env(),
    };

    // 初始化日志
    let _ = logging::init(config.verbose_logging);

    match cli.command.unwrap_or(Command::Batch(BatchArgs::default())) {
        Command::Batch(args) => {
            if let Some(input) = args.input {
                config.input_folder = input;
            }
            if let Some(report) = args.report {
                config.report_file = report;
            }
            App::initialize(config).await?.run().await?;
        }
        Command::Serve(args) => {
            if let Some(bind) = args.bind {
                config.gateway_bind = bind;
            }
            config.validate()?;
            invoice_intake::gateway::serve(&config).await?;
        }
    }

    Ok(())
}
