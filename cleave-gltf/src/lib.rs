//! # cleave-gltf
//!
//! A pure-Rust library for editing glTF 2.0 scene documents and splitting
//! meshes into their topologically disconnected pieces.
//!
//! A glTF document references its geometry through three levels of binary
//! addressing - buffers (raw bytes in side files), buffer views (byte-range
//! crops) and accessors (typed element views). This crate loads a document,
//! materializes that binary data, discovers the disconnected triangle groups
//! of each mesh by welding vertices with equal positions, rewrites every
//! group into its own primitive, and repacks the binary layout minimally and
//! 4-byte aligned before writing the result back out.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use cleave_gltf::prelude::*;
//!
//! let mut document = Document::load(Path::new("model.gltf"))?;
//! split_disconnected_meshes(&mut document)?;
//! document.write(Path::new("split.gltf"))?;
//! # Ok::<(), cleave_gltf::Error>(())
//! ```
//!
//! Fields the model does not interpret (materials, animations, extensions,
//! `asset` metadata, ...) are carried through load and write verbatim.

pub mod codec;
pub mod document;
pub mod error;
pub mod split;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::codec::{ComponentType, ElementType, Layout};
    pub use crate::document::{
        Accessor, AccessorLink, Buffer, BufferView, Document, Link, Mesh, MeshLink, Node,
        NodeLink, Primitive,
    };
    pub use crate::error::{Error, Result};
    pub use crate::split::{
        expand_multiprimitive_mesh, expand_multiprimitive_meshes, find_connected_components,
        split_disconnected_mesh, split_disconnected_meshes, Component, UnionFind,
    };
}
