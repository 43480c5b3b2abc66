//! Entity types for the glTF document model.
//!
//! Every entity lives in a top-level array owned by [`Document`]. Cross-entity
//! links that the editor rewrites (node→mesh, node→child, primitive→accessor)
//! are [`Link`] values that toggle between array indices and identity handles;
//! links the editor never rewrites (accessor→bufferView, bufferView→buffer)
//! stay plain indices. JSON keys the model does not interpret are captured in
//! per-entity `extra` maps and written back verbatim.
//!
//! [`Document`]: super::Document

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::codec::Layout;
use crate::error::Result;

/// Identity handle for a [`Mesh`]. Stable across array growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MeshId(pub(crate) u32);

/// Identity handle for a [`Node`]. Stable across array growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeId(pub(crate) u32);

/// Identity handle for an [`Accessor`]. Stable across array growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AccessorId(pub(crate) u32);

/// A rewritable cross-entity link.
///
/// `Index` is the on-disk form: a position in the target top-level array.
/// `Id` is the in-memory reference form: an identity handle that survives
/// appends to the array. Two structurally equal entities always carry
/// distinct handles, so handle equality is identity, not value equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link<I> {
    /// Position in the owning top-level array.
    Index(usize),
    /// Identity handle, valid while the document is in reference mode.
    Id(I),
}

pub type MeshLink = Link<MeshId>;
pub type NodeLink = Link<NodeId>;
pub type AccessorLink = Link<AccessorId>;

impl<I: Copy> Link<I> {
    /// The array index, if this link is in index form.
    pub fn as_index(self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(index),
            Self::Id(_) => None,
        }
    }

    /// The identity handle, if this link is in reference form.
    pub fn as_id(self) -> Option<I> {
        match self {
            Self::Index(_) => None,
            Self::Id(id) => Some(id),
        }
    }
}

impl<I> Serialize for Link<I> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Index(index) => serializer.serialize_u64(*index as u64),
            Self::Id(_) => Err(serde::ser::Error::custom(
                "cannot serialize an identity link; restore index mode first",
            )),
        }
    }
}

impl<'de, I> Deserialize<'de> for Link<I> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(Self::Index(usize::deserialize(deserializer)?))
    }
}

/// Raw byte payload, lazily loaded from a URI-addressed side file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Buffer {
    /// Side-file path, relative to the document's directory. A buffer
    /// without a URI carries its bytes purely in memory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(rename = "byteLength")]
    pub byte_length: usize,
    /// Materialized bytes. Never serialized.
    #[serde(skip)]
    pub data: Option<Vec<u8>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A byte-range view into exactly one [`Buffer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferView {
    pub buffer: usize,
    #[serde(rename = "byteOffset", default)]
    pub byte_offset: usize,
    #[serde(rename = "byteLength")]
    pub byte_length: usize,
    /// Materialized copy of this view's slice. Never serialized.
    #[serde(skip)]
    pub data: Option<Vec<u8>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A typed element view into exactly one [`BufferView`].
///
/// `component_type` and `element_type` are stored raw and validated by the
/// codec at point of use, so documents carrying exotic accessors still load
/// and round-trip unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accessor {
    #[serde(skip)]
    pub id: AccessorId,
    #[serde(rename = "bufferView")]
    pub buffer_view: usize,
    #[serde(rename = "byteOffset", default)]
    pub byte_offset: usize,
    pub count: usize,
    #[serde(rename = "componentType")]
    pub component_type: u32,
    #[serde(rename = "type")]
    pub element_type: String,
    /// Per-component lower bound, one value per scalar component.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<Vec<f64>>,
    /// Per-component upper bound, one value per scalar component.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<Vec<f64>>,
    /// Materialized copy of this accessor's byte range. Never serialized.
    #[serde(skip)]
    pub data: Option<Vec<u8>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Accessor {
    /// The fixed record layout declared by this accessor.
    pub fn layout(&self) -> Result<Layout> {
        Layout::new(&self.element_type, self.component_type)
    }
}

/// One piece of indexed geometry inside a [`Mesh`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Primitive {
    /// Topology mode. Absent means triangle list (4), the glTF default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
    /// Semantic attribute name → accessor link, in document order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attributes: IndexMap<String, AccessorLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indices: Option<AccessorLink>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Primitive {
    /// The triangle-list mode value, the only topology the splitter supports.
    pub const TRIANGLES: u32 = 4;

    /// The declared mode, or the glTF default when absent.
    pub fn effective_mode(&self) -> u32 {
        self.mode.unwrap_or(Self::TRIANGLES)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mesh {
    #[serde(skip)]
    pub id: MeshId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primitives: Vec<Primitive>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(skip)]
    pub id: NodeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh: Option<MeshLink>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeLink>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_link_deserializes_to_index() {
        let link: MeshLink = serde_json::from_value(json!(3)).unwrap();
        assert_eq!(link, Link::Index(3));
        assert_eq!(link.as_index(), Some(3));
        assert_eq!(link.as_id(), None);
    }

    #[test]
    fn test_identity_link_refuses_to_serialize() {
        let link: MeshLink = Link::Id(MeshId(7));
        assert!(serde_json::to_value(link).is_err());
    }

    #[test]
    fn test_unknown_keys_survive_round_trip() {
        let source = json!({
            "buffer": 0,
            "byteOffset": 8,
            "byteLength": 24,
            "byteStride": 12,
            "target": 34962
        });
        let view: BufferView = serde_json::from_value(source.clone()).unwrap();
        assert_eq!(view.extra.get("byteStride"), Some(&json!(12)));
        assert_eq!(serde_json::to_value(&view).unwrap(), source);
    }

    #[test]
    fn test_primitive_mode_defaults_to_triangles() {
        let primitive: Primitive =
            serde_json::from_value(json!({"attributes": {"POSITION": 0}})).unwrap();
        assert_eq!(primitive.effective_mode(), Primitive::TRIANGLES);
        assert_eq!(
            primitive.attributes.get("POSITION"),
            Some(&Link::Index(0))
        );
    }
}
