//! Error types for `cleave-gltf`

use thiserror::Error;

/// The error type for `cleave-gltf` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ==================== Accessor Codec Errors ====================
    /// The accessor declares a componentType code outside the fixed table.
    #[error("unsupported componentType: {code} (supported: 5120-5123, 5125, 5126)")]
    UnsupportedComponentType {
        /// The componentType code found in the accessor.
        code: u32,
    },

    /// The accessor declares an element type outside the fixed table.
    #[error("unsupported accessor type: {name:?} (supported: SCALAR, VEC2-4, MAT2-4)")]
    UnsupportedElementType {
        /// The type string found in the accessor.
        name: String,
    },

    // ==================== Document Link Errors ====================
    /// An index does not resolve in its target array. Signals a corrupt
    /// document or a broken internal invariant.
    #[error("dangling {entity} reference: index {index} out of range (array has {len})")]
    DanglingReference {
        /// The kind of entity the index points into.
        entity: &'static str,
        /// The out-of-range index.
        index: usize,
        /// The length of the target array.
        len: usize,
    },

    /// Reindexing could not locate an entity by identity. Always an internal
    /// invariant violation, never a user input error.
    #[error("{entity} no longer present in its owning array while reindexing")]
    ReferenceNotFound {
        /// The kind of entity whose handle failed to resolve.
        entity: &'static str,
    },

    // ==================== Binary Layout Errors ====================
    /// A declared byte range extends past its parent's materialized bytes.
    #[error("{entity} byte range {offset}+{len} exceeds available {available} bytes")]
    ByteRangeOutOfBounds {
        /// The entity whose range is invalid.
        entity: &'static str,
        /// The declared byte offset.
        offset: usize,
        /// The declared byte length.
        len: usize,
        /// The bytes actually available in the parent.
        available: usize,
    },

    /// An entity's bytes were needed while it carries none.
    #[error("{entity} {index} has no data loaded")]
    DataNotLoaded {
        /// The kind of entity missing its bytes.
        entity: &'static str,
        /// The entity's index in its top-level array.
        index: usize,
    },

    /// A buffer holds bytes to flush but declares no side-file URI.
    #[error("buffer {index} has data but no uri to write it to")]
    MissingUri {
        /// The buffer index.
        index: usize,
    },

    // ==================== Mesh Splitting Errors ====================
    /// A primitive mode other than triangle list (4) was passed to the splitter.
    #[error("unsupported primitive mode: {mode} (only triangle list, 4, is supported)")]
    UnsupportedPrimitiveMode {
        /// The mode value found on the primitive.
        mode: u32,
    },

    /// An indexed primitive is missing the POSITION attribute.
    #[error("primitive has no POSITION attribute")]
    MissingPositions,

    /// A primitive passed to the component finder has no indices accessor.
    #[error("primitive has no indices accessor")]
    MissingIndices,
}

/// A specialized Result type for `cleave-gltf` operations.
pub type Result<T> = std::result::Result<T, Error>;
