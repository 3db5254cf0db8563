use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_ENV_VAR: &str = "DXFGEO_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub projection: ProjectionConfig,
    #[serde(default)]
    pub tessellation: TessellationConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub visibility: VisibilityConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// 从显式路径加载配置并校验取值范围。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// 自动发现配置文件：优先读取环境变量 `DXFGEO_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV_VAR) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tessellation.segments_per_arc == 0 {
            return Err(ConfigError::Invalid(
                "tessellation.segments_per_arc 必须至少为 1".to_string(),
            ));
        }
        if !(1..=60).contains(&self.projection.utm_zone) {
            return Err(ConfigError::Invalid(format!(
                "projection.utm_zone 必须在 1..=60 之间，实际为 {}",
                self.projection.utm_zone
            )));
        }
        validate_covered_pct(self.visibility.min_covered_pct)?;
        if !self.merge.closure_tolerance.is_finite() || self.merge.closure_tolerance < 0.0 {
            return Err(ConfigError::Invalid(
                "merge.closure_tolerance 必须为非负有限数".to_string(),
            ));
        }
        if self.merge.line_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "merge.line_batch_size 必须至少为 1".to_string(),
            ));
        }
        if self.visibility.order_by.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "visibility.order_by 不能为空".to_string(),
            ));
        }
        Ok(())
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionKind {
    #[default]
    Utm,
    Identity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hemisphere {
    #[default]
    North,
    South,
}

/// 源坐标系设置。图纸坐标系由配置决定，不从 DXF 内容推断。
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProjectionConfig {
    #[serde(default)]
    pub kind: ProjectionKind,
    #[serde(default = "ProjectionConfig::default_zone")]
    pub utm_zone: u8,
    #[serde(default)]
    pub hemisphere: Hemisphere,
}

impl ProjectionConfig {
    fn default_zone() -> u8 {
        44
    }
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            kind: ProjectionKind::default(),
            utm_zone: Self::default_zone(),
            hemisphere: Hemisphere::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TessellationConfig {
    #[serde(default = "TessellationConfig::default_segments")]
    pub segments_per_arc: usize,
}

impl TessellationConfig {
    fn default_segments() -> usize {
        24
    }
}

impl Default for TessellationConfig {
    fn default() -> Self {
        Self {
            segments_per_arc: Self::default_segments(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MergeConfig {
    #[serde(default = "MergeConfig::default_tolerance")]
    pub closure_tolerance: f64,
    #[serde(default = "MergeConfig::default_batch_size")]
    pub line_batch_size: usize,
}

impl MergeConfig {
    fn default_tolerance() -> f64 {
        1e-10
    }

    fn default_batch_size() -> usize {
        1000
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            closure_tolerance: Self::default_tolerance(),
            line_batch_size: Self::default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VisibilityConfig {
    #[serde(default = "VisibilityConfig::default_order_by")]
    pub order_by: String,
    #[serde(default = "VisibilityConfig::default_min_covered_pct")]
    pub min_covered_pct: f64,
    #[serde(default = "VisibilityConfig::default_clip")]
    pub clip_remainder: bool,
}

impl VisibilityConfig {
    fn default_order_by() -> String {
        "z".to_string()
    }

    fn default_min_covered_pct() -> f64 {
        70.0
    }

    fn default_clip() -> bool {
        true
    }
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            order_by: Self::default_order_by(),
            min_covered_pct: Self::default_min_covered_pct(),
            clip_remainder: Self::default_clip(),
        }
    }
}

/// 转换之后依次执行的处理阶段。
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub stages: Vec<String>,
}

/// 覆盖率阈值必须位于 0..=100，命令行覆盖值同样适用。
pub fn validate_covered_pct(pct: f64) -> Result<(), ConfigError> {
    if !(0.0..=100.0).contains(&pct) {
        return Err(ConfigError::Invalid(format!(
            "visibility.min_covered_pct 必须在 0..=100 之间，实际为 {pct}"
        )));
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
    #[error("配置无效: {0}")]
    Invalid(String),
}
