pub mod convert;
pub mod dissolve;
pub mod lines;
pub mod merge;
pub mod planar;
pub mod projection;
pub mod rings;
pub mod stage;
pub mod tessellate;
pub mod visibility;

pub mod errors {
    use thiserror::Error;

    use crate::planar::GeometryOpError;
    use crate::projection::ProjectionError;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("no polygon features to union")]
        NoPolygons,
        #[error("polygon union failed: {0}")]
        Union(#[from] GeometryOpError),
        #[error("invalid projection settings: {0}")]
        Projection(#[from] ProjectionError),
    }
}

pub use convert::{ConvertError, ConvertOptions, Converter};
pub use errors::EngineError;
pub use visibility::{VisibilityOptions, keep_top_visible, process_overlapping_polygons};
