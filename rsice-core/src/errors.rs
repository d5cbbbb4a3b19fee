use thiserror::Error;

/// Error type for invalid operations.
#[derive(Error, Debug)]
pub enum RSIceError {
    #[error("{0}")]
    Error(String),
    #[error("Failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed dataset {path}: {reason}")]
    MalformedDataset { path: String, reason: String },
    #[error("Unsupported dataset format '{0}'. Expected a .nc or .json file")]
    UnsupportedFormat(String),
    #[error("NetCDF support is not enabled. Rebuild with `--features netcdf` to read {0}")]
    FeatureDisabled(String),
    #[error("Variable '{0}' not found in dataset")]
    MissingVariable(String),
    #[error("Missing variables needed for {derived}: {missing}")]
    MissingInputs { derived: String, missing: String },
    #[error("Dimension '{dim}' not found. Available dimensions: {available}")]
    MissingDimension { dim: String, available: String },
    #[error("Index {index} is out of bounds for dimension '{dim}' of length {len}")]
    IndexOutOfBounds { dim: String, index: usize, len: usize },
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("No month selected. Set `month` (1-12) in the configuration or pass --month")]
    MonthNotSet,
    #[error("Invalid month {0}. Months are numbered 1 (January) to 12 (December)")]
    InvalidMonth(u32),
    #[error("Month selection found {count} time steps for year {year}, expected exactly 1")]
    AmbiguousMonthSelection { year: i32, count: usize },
    #[error("No {month} time step in year {year}")]
    MonthMissing { month: String, year: i32 },
    #[error("The time axis has no {0} time steps")]
    MonthNotFound(String),
    #[error("Cannot decode time axis: {0}")]
    TimeDecoding(String),
    #[error("Wrong input units. Expected {0}, got {1}")]
    WrongUnits(String, String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Rendering failed: {0}")]
    Render(String),
    #[error("Serialization failed: {0}")]
    Serialization(String),
    #[error("Singular matrix: {0}")]
    SingularMatrix(String),
}

/// Convenience type for `Result<T, RSIceError>`.
pub type RSIceResult<T> = Result<T, RSIceError>;
