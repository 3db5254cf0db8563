use std::path::{Path, PathBuf};

use clap::Parser;
use dxfgeo_config::{AppConfig, ConfigError};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

mod runner;

/// 将 DXF 图纸转换为 GeoJSON，并按需执行合并、消隐等处理阶段。
#[derive(Debug, Parser)]
#[command(name = "dxfgeo", version)]
pub struct Cli {
    /// 输入文件：`.dxf` 会先转换，`.geojson`/`.json` 直接读取
    pub input: PathBuf,

    /// 输出路径，缺省时写到标准输出
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 配置文件路径
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 依次执行的处理阶段，可重复指定；缺省时使用配置中的 pipeline.stages
    #[arg(long = "stage", value_name = "NAME")]
    pub stages: Vec<String>,

    /// 坐标已是经纬度，跳过投影
    #[arg(long)]
    pub identity: bool,

    /// 覆盖率阈值（0..=100）
    #[arg(long, value_name = "N")]
    pub min_covered_pct: Option<f64>,

    /// 保留被遮挡面的原始几何，而不是可见剩余部分
    #[arg(long)]
    pub no_clip: bool,
}

fn main() {
    let cli = Cli::parse();
    let config = match load_configuration(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            init_logging(DEFAULT_LOG_LEVEL);
            error!(error = %err, "加载配置失败");
            std::process::exit(1);
        }
    };
    init_logging(&config.logging.level);
    info!(input = %cli.input.display(), "启动 dxfgeo");

    match runner::run(&cli, &config) {
        Ok(summary) => info!(
            features = summary.features,
            stages = summary.stages,
            "处理完成"
        ),
        Err(err) => {
            error!(error = %err, "处理失败");
            std::process::exit(1);
        }
    }
}

const DEFAULT_LOG_LEVEL: &str = "info";

/// 显式指定的配置优先，否则按环境变量与默认路径自动发现。
/// 文件存在但无法读取、解析或校验时返回错误，不静默回退到默认值。
fn load_configuration(override_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match override_path {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::discover(),
    }
}

fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    // 标准输出留给 GeoJSON
    let subscriber = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if subscriber.try_init().is_err() {
        // 已初始化，忽略
    }
}
