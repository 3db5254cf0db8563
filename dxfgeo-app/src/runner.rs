use std::io::Write;
use std::path::{Path, PathBuf};

use dxfgeo_config::{
    AppConfig, ConfigError, Hemisphere as ConfigHemisphere, ProjectionKind, validate_covered_pct,
};
use dxfgeo_core::geojson::FeatureCollection;
use dxfgeo_engine::{
    ConvertError, ConvertOptions, Converter, VisibilityOptions,
    projection::{Hemisphere, Identity, ProjectionError, Projector, Utm},
    stage::{StageBus, StageContext, StageSettings},
};
use dxfgeo_io::{CollectionLoader, CollectionSaver, GeoJsonFacade, IoError};
use thiserror::Error;
use tracing::{debug, info};

use crate::Cli;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unsupported input {0:?}: expected .dxf, .geojson or .json")]
    UnsupportedInput(PathBuf),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error(transparent)]
    Convert(#[from] ConvertError),
    #[error(transparent)]
    Io(#[from] IoError),
    #[error("failed to write output: {0}")]
    Output(#[source] std::io::Error),
    #[error("unknown stage `{name}`, available: {available}")]
    UnknownStage { name: String, available: String },
    #[error("stage `{name}` failed: {message}")]
    StageFailed { name: String, message: String },
}

#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub features: usize,
    pub stages: usize,
}

enum InputKind {
    Dxf,
    GeoJson,
}

fn input_kind(path: &Path) -> Option<InputKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "dxf" => Some(InputKind::Dxf),
        "geojson" | "json" => Some(InputKind::GeoJson),
        _ => None,
    }
}

pub fn run(cli: &Cli, config: &AppConfig) -> Result<RunSummary, AppError> {
    let kind =
        input_kind(&cli.input).ok_or_else(|| AppError::UnsupportedInput(cli.input.clone()))?;

    let bus = StageBus::new();
    let stages: &[String] = if cli.stages.is_empty() {
        &config.pipeline.stages
    } else {
        &cli.stages
    };
    let settings = build_settings(cli, config)?;
    // 先校验阶段名，避免转换完才发现拼写错误
    for name in stages {
        if !bus.contains(name) {
            return Err(AppError::UnknownStage {
                name: name.clone(),
                available: bus.available_stages().join(", "),
            });
        }
    }

    let mut collection = match kind {
        InputKind::Dxf => {
            let converter = Converter::new(
                build_projector(cli, config)?,
                ConvertOptions {
                    segments_per_arc: config.tessellation.segments_per_arc,
                },
            );
            info!(projection = %converter.projector().name(), "开始转换 DXF");
            converter.convert_dxf_file(&cli.input)?
        }
        InputKind::GeoJson => GeoJsonFacade::new().load_collection(&cli.input)?,
    };

    run_stages(&bus, stages, &mut collection, &settings)?;

    write_output(&collection, cli.output.as_deref())?;
    Ok(RunSummary {
        features: collection.len(),
        stages: stages.len(),
    })
}

fn build_projector(cli: &Cli, config: &AppConfig) -> Result<Box<dyn Projector>, AppError> {
    if cli.identity {
        return Ok(Box::new(Identity));
    }
    match config.projection.kind {
        ProjectionKind::Identity => Ok(Box::new(Identity)),
        ProjectionKind::Utm => {
            let hemisphere = match config.projection.hemisphere {
                ConfigHemisphere::North => Hemisphere::North,
                ConfigHemisphere::South => Hemisphere::South,
            };
            Ok(Box::new(Utm::new(config.projection.utm_zone, hemisphere)?))
        }
    }
}

fn build_settings(cli: &Cli, config: &AppConfig) -> Result<StageSettings, AppError> {
    let min_covered_pct = match cli.min_covered_pct {
        Some(pct) => {
            validate_covered_pct(pct)?;
            pct
        }
        None => config.visibility.min_covered_pct,
    };
    Ok(StageSettings {
        visibility: VisibilityOptions {
            order_by: config.visibility.order_by.clone(),
            min_covered_pct,
            clip_remainder: config.visibility.clip_remainder && !cli.no_clip,
        },
        closure_tolerance: config.merge.closure_tolerance,
        line_batch_size: config.merge.line_batch_size,
    })
}

fn run_stages(
    bus: &StageBus,
    stages: &[String],
    collection: &mut FeatureCollection,
    settings: &StageSettings,
) -> Result<(), AppError> {
    let mut context = StageContext {
        collection,
        settings,
    };
    for name in stages {
        let response = bus.dispatch(name, &mut context);
        let message = response.message.unwrap_or_default();
        if !response.success {
            return Err(AppError::StageFailed {
                name: name.clone(),
                message,
            });
        }
        debug!(stage = %name, %message, "阶段完成");
    }
    Ok(())
}

fn write_output(collection: &FeatureCollection, output: Option<&Path>) -> Result<(), AppError> {
    let facade = GeoJsonFacade::new();
    match output {
        Some(path) => {
            facade.save_collection(collection, path)?;
            info!(path = %path.display(), "已写出 GeoJSON");
        }
        None => {
            let text = facade.to_string(collection)?;
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(text.as_bytes())
                .and_then(|_| stdout.write_all(b"\n"))
                .map_err(AppError::Output)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["dxfgeo"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[test]
    fn input_kind_by_extension() {
        assert!(matches!(input_kind(Path::new("a.DXF")), Some(InputKind::Dxf)));
        assert!(matches!(input_kind(Path::new("a.geojson")), Some(InputKind::GeoJson)));
        assert!(matches!(input_kind(Path::new("a.json")), Some(InputKind::GeoJson)));
        assert!(input_kind(Path::new("a.shp")).is_none());
        assert!(input_kind(Path::new("noext")).is_none());
    }

    #[test]
    fn cli_overrides_visibility_settings() {
        let config = AppConfig::default();
        let settings = build_settings(
            &cli(&["in.dxf", "--min-covered-pct", "40", "--no-clip"]),
            &config,
        )
        .unwrap();
        assert_eq!(settings.visibility.min_covered_pct, 40.0);
        assert!(!settings.visibility.clip_remainder);

        let defaults = build_settings(&cli(&["in.dxf"]), &config).unwrap();
        assert_eq!(defaults.visibility.min_covered_pct, 70.0);
        assert!(defaults.visibility.clip_remainder);
    }

    #[test]
    fn out_of_range_covered_pct_flag_is_rejected() {
        let config = AppConfig::default();
        for flag in ["--min-covered-pct=150", "--min-covered-pct=-1"] {
            let err = build_settings(&cli(&["in.dxf", flag]), &config).unwrap_err();
            assert!(matches!(err, AppError::Config(ConfigError::Invalid(_))), "{flag}: {err}");
        }
    }

    #[test]
    fn identity_flag_wins_over_config() {
        let config = AppConfig::default();
        let projector = build_projector(&cli(&["in.dxf", "--identity"]), &config).unwrap();
        assert_eq!(projector.project(10.0, 20.0).unwrap(), [10.0, 20.0]);
    }

    #[test]
    fn unknown_stage_is_rejected_before_loading() {
        let config = AppConfig::default();
        let err = run(&cli(&["missing.dxf", "--stage", "bogus"]), &config).unwrap_err();
        match err {
            AppError::UnknownStage { name, available } => {
                assert_eq!(name, "bogus");
                assert!(available.contains("resolve"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
