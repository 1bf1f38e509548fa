use thiserror::Error;

/// Top-level error type for the geotag crate.
#[derive(Debug, Error)]
pub enum GeotagError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Mesh(#[from] MeshError),
}

impl GeotagError {
    /// Returns `true` for errors the caller can report to a user and recover
    /// from by fixing the input directives.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Errors detected while validating directives, before geometry is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{requested} directives need attribute bits but only {available} are available")]
    BitBudgetExceeded { requested: usize, available: usize },

    #[error("directive name `{0}` is used more than once")]
    DuplicateName(String),

    #[error("internal surface tolerance must be below 90 degrees, got {degrees}")]
    InternalTolerance { degrees: f64 },

    #[error("angular tolerance {degrees} is not a valid angle in degrees")]
    InvalidTolerance { degrees: f64 },

    #[error("distance tolerance {value} must be finite and non-negative")]
    InvalidDistance { value: f64 },

    #[error("load `{load}` targets unknown or unsuitable directive `{target}`")]
    UnknownTarget { load: String, target: String },
}

/// Errors caused by structurally inconsistent geometry.
///
/// These are invariant violations: retrying with the same input cannot succeed.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    #[error("classification failed: {0}")]
    Unclassified(String),

    #[error("invalid solid: {0}")]
    InvalidSolid(String),

    #[error("entity not found: {0}")]
    EntityNotFound(&'static str),
}

/// Errors caused by malformed mesh input.
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("element {element} references node {node} but the mesh has {count} nodes")]
    NodeOutOfRange {
        element: usize,
        node: usize,
        count: usize,
    },

    #[error("element {element} is out of range ({count} elements)")]
    ElementOutOfRange { element: usize, count: usize },

    #[error("face {face} is out of range for element {element}")]
    FaceOutOfRange { element: usize, face: usize },

    #[error("element {element} has {found} nodes, expected {expected}")]
    ConnectivityMismatch {
        element: usize,
        found: usize,
        expected: usize,
    },
}

/// Convenience type alias for results using [`GeotagError`].
pub type Result<T> = std::result::Result<T, GeotagError>;
