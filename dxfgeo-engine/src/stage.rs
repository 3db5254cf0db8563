use std::collections::HashMap;

use dxfgeo_core::geojson::FeatureCollection;

use crate::dissolve::{flatten, union_polygons};
use crate::lines::{DEFAULT_LINE_BATCH_SIZE, clean_coords, combine_lines, line_only};
use crate::merge::convert_to_multi_geometry;
use crate::rings::DEFAULT_CLOSURE_TOLERANCE;
use crate::visibility::{VisibilityOptions, process_overlapping_polygons};

#[derive(Debug, Clone)]
pub struct StageResponse {
    pub success: bool,
    pub message: Option<String>,
}

impl StageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// 各处理阶段共享的参数。
#[derive(Debug, Clone)]
pub struct StageSettings {
    pub visibility: VisibilityOptions,
    pub closure_tolerance: f64,
    pub line_batch_size: usize,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            visibility: VisibilityOptions::default(),
            closure_tolerance: DEFAULT_CLOSURE_TOLERANCE,
            line_batch_size: DEFAULT_LINE_BATCH_SIZE,
        }
    }
}

pub trait StageHandler: Send + Sync {
    fn name(&self) -> &'static str;
    fn execute(&self, context: &mut StageContext<'_>) -> StageResponse;
}

pub struct StageContext<'a> {
    pub collection: &'a mut FeatureCollection,
    pub settings: &'a StageSettings,
}

pub struct StageBus {
    handlers: HashMap<&'static str, Box<dyn StageHandler>>,
}

impl StageBus {
    pub fn new() -> Self {
        let mut bus = Self {
            handlers: HashMap::new(),
        };
        bus.register(MergeStage);
        bus.register(ResolveStage);
        bus.register(UnionStage);
        bus.register(FlattenStage);
        bus.register(LinesStage);
        bus.register(CombineStage);
        bus.register(CleanStage);
        bus
    }

    pub fn register<H: StageHandler + 'static>(&mut self, handler: H) {
        self.handlers.insert(handler.name(), Box::new(handler));
    }

    pub fn dispatch(&self, name: &str, context: &mut StageContext<'_>) -> StageResponse {
        if let Some(handler) = self.handlers.get(name) {
            handler.execute(context)
        } else {
            StageResponse::err(format!("未知阶段: {name}"))
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// 已注册阶段名，按字母排序。
    pub fn available_stages(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for StageBus {
    fn default() -> Self {
        Self::new()
    }
}

struct MergeStage;

impl StageHandler for MergeStage {
    fn name(&self) -> &'static str {
        "merge"
    }

    fn execute(&self, context: &mut StageContext<'_>) -> StageResponse {
        let merged = convert_to_multi_geometry(context.collection, context.settings.closure_tolerance);
        *context.collection = merged;
        StageResponse::ok(format!("合并后共 {} 个要素", context.collection.len()))
    }
}

struct ResolveStage;

impl StageHandler for ResolveStage {
    fn name(&self) -> &'static str {
        "resolve"
    }

    fn execute(&self, context: &mut StageContext<'_>) -> StageResponse {
        let before = context.collection.len();
        let resolved = process_overlapping_polygons(context.collection, &context.settings.visibility);
        *context.collection = resolved;
        StageResponse::ok(format!(
            "消隐后保留 {} / {} 个要素",
            context.collection.len(),
            before
        ))
    }
}

struct UnionStage;

impl StageHandler for UnionStage {
    fn name(&self) -> &'static str {
        "union"
    }

    fn execute(&self, context: &mut StageContext<'_>) -> StageResponse {
        match union_polygons(context.collection) {
            Ok(feature) => {
                context.collection.features = vec![feature];
                StageResponse::ok("面要素已合并为单个要素")
            }
            Err(err) => StageResponse::err(format!("面要素合并失败: {err}")),
        }
    }
}

struct FlattenStage;

impl StageHandler for FlattenStage {
    fn name(&self) -> &'static str {
        "flatten"
    }

    fn execute(&self, context: &mut StageContext<'_>) -> StageResponse {
        let flat = flatten(context.collection);
        *context.collection = flat;
        StageResponse::ok(format!("拆分后共 {} 个要素", context.collection.len()))
    }
}

struct LinesStage;

impl StageHandler for LinesStage {
    fn name(&self) -> &'static str {
        "lines"
    }

    fn execute(&self, context: &mut StageContext<'_>) -> StageResponse {
        let lines = line_only(context.collection);
        *context.collection = lines;
        StageResponse::ok(format!("保留 {} 个线要素", context.collection.len()))
    }
}

struct CombineStage;

impl StageHandler for CombineStage {
    fn name(&self) -> &'static str {
        "combine"
    }

    fn execute(&self, context: &mut StageContext<'_>) -> StageResponse {
        let combined = combine_lines(context.collection, context.settings.line_batch_size);
        *context.collection = combined;
        StageResponse::ok("线要素已合并")
    }
}

struct CleanStage;

impl StageHandler for CleanStage {
    fn name(&self) -> &'static str {
        "clean"
    }

    fn execute(&self, context: &mut StageContext<'_>) -> StageResponse {
        let cleaned = clean_coords(context.collection);
        *context.collection = cleaned;
        StageResponse::ok("坐标已清理")
    }
}
