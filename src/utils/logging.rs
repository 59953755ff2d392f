/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use crate::config::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化日志
///
/// 优先使用 `RUST_LOG`；未设置时按 `verbose` 选择 debug 或 info
///
/// # 返回
/// 重复初始化时返回错误（测试中可以忽略）
pub fn init(verbose: bool) -> Result<(), String> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "invoice_intake=debug,info"
        } else {
            "info"
        })
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .try_init()
        .map_err(|e| e.to_string())
}

/// 记录程序启动信息
///
/// # 参数
/// - `config`: 当前配置
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 发票批量抽取模式");
    info!("🌐 抽取服务: {}", config.extraction_endpoint);
    info!(
        "📊 同时上传上限: {}",
        if config.max_concurrent_uploads == 0 {
            "不限".to_string()
        } else {
            config.max_concurrent_uploads.to_string()
        }
    );
    info!("📏 单文件上限: {} 字节", config.max_file_size_bytes);
    info!("{}", "=".repeat(60));
}

/// 记录文件加载信息
///
/// # 参数
/// - `total`: 文件总数
/// - `max_concurrent`: 同时上传上限
pub fn log_files_loaded(total: usize, max_concurrent: usize) {
    info!("✓ 找到 {} 个待处理的发票", total);
    if max_concurrent > 0 {
        info!("📋 全部作为一个批次提交，最多同时上传 {} 个\n", max_concurrent);
    } else {
        info!("📋 全部作为一个批次提交\n");
    }
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
