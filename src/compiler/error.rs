use thiserror::Error;

///
/// Errors emitted while compiling a `Drawing` into SSG lines.
///
#[derive(Error, Debug, PartialEq)]
pub enum CompileError {
    #[error("Polyline {polyline} has fewer than 2 points")]
    TooFewPoints { polyline: usize },

    #[error("Polyline {polyline} vertex {vertex} is coincident with the previous vertex")]
    CoincidentPoints { polyline: usize, vertex: usize },

    #[error("Polyline {polyline} vertex {vertex} lies outside the configured soft limits")]
    OutOfBounds { polyline: usize, vertex: usize },

    #[error("Total vertex count {actual} exceeds the configured maximum {limit}")]
    TooManyVertices { limit: usize, actual: usize },

    #[error("Total path length {actual:.2}mm exceeds the configured maximum {limit:.2}mm")]
    PathTooLong { limit: f64, actual: f64 },
}
