use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF decoding error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Buffer of {len} values does not match a {width}x{height} grid")]
    ShapeMismatch { width: usize, height: usize, len: usize },

    #[error("Geotransform is not invertible")]
    DegenerateTransform,

    #[error("Incompatible tiles: {0}")]
    IncompatibleTiles(String),

    #[error("No input rasters")]
    EmptyInput,

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Seed ({x}, {y}) lies outside the raster")]
    SeedOutOfBounds { x: f64, y: f64 },

    #[error("Seed cell (col {col}, row {row}) lies outside the raster")]
    SeedCellOutOfBounds { col: usize, row: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
