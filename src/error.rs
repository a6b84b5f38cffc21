/// Broad failure categories. Each one maps to a stable process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Input dataset is missing or cannot be opened.
    NotFound,
    /// None of the candidate height/slope fields exist in the dataset.
    SchemaMismatch,
    /// The dataset opened but is not a usable feature collection.
    InvalidInput,
    /// Caller passed a parameter outside its domain.
    InvalidArgument,
    /// Required configuration is missing or malformed.
    Config,
    /// Filesystem failure while writing outputs.
    Io,
    /// The remote processing engine rejected or failed a request.
    Engine,
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::InvalidArgument | ErrorKind::Config => 2,
            ErrorKind::NotFound | ErrorKind::SchemaMismatch | ErrorKind::InvalidInput => 3,
            ErrorKind::Io => 4,
            ErrorKind::Engine => 5,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    kind: ErrorKind,
    message: String,
}

impl AppError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, message)
    }

    pub fn engine(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Engine, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn exit_code(&self) -> u8 {
        self.kind.exit_code()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("kind", &self.kind)
            .field("exit_code", &self.exit_code())
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Per-building failure. These never abort a run; the assembler records them
/// as diagnostics and moves on to the next building.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("footprint is not a valid polygon: {0}")]
    InvalidFootprint(String),

    #[error("footprint has non-finite coordinates")]
    NonFiniteCoordinates,

    #[error("footprint has no polygonal geometry ({0})")]
    NotPolygonal(String),

    #[error("base height must be a finite value >= 0, got {0}")]
    InvalidHeight(f64),

    #[error("slope must be within [0, 90) degrees, got {0}")]
    InvalidSlope(f64),

    #[error("attribute '{field}' is missing or not numeric")]
    MissingAttribute { field: String },

    #[error("feature has no geometry")]
    MissingGeometry,

    #[error("footprint could not be reprojected: {0}")]
    Reprojection(String),
}
