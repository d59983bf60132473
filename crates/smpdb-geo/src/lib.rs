//! Curated gazetteer and layered geocoding resolution.
//!
//! A small YAML gazetteer maps place names, aliases, and shorthand
//! abbreviations to a region classification plus optional coordinates.
//! [`Gazetteer::resolve`] walks candidate texts through exact, then fuzzy,
//! then unresolved layers; unresolved is a value, never an error, so a
//! location commit can always proceed.

use thiserror::Error;

mod gazetteer;
mod resolve;

pub use gazetteer::{load_gazetteer, Gazetteer, GazetteerEntry, GazetteerFile};
pub use resolve::{GeoResolution, ResolutionMethod};

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("failed to read gazetteer file {path}: {source}")]
    FileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse gazetteer YAML: {0}")]
    FileParse(#[from] serde_yaml::Error),

    #[error("invalid gazetteer: {0}")]
    Validation(String),
}
