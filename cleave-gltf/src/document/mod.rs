//! The glTF document: one owned tree of buffers, views, accessors, meshes
//! and nodes, plus the two-mode link representation it is edited through.
//!
//! A freshly loaded document is in *index mode*: every rewritable link is a
//! position in its top-level array, exactly as stored on disk. Editing
//! operations flip individual concerns into *reference mode*, where links
//! are identity handles that stay valid while arrays grow. Both directions
//! are idempotent and exact inverses as long as no referenced entity is
//! removed from its owning array in between.

mod data;
mod types;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub use types::{
    Accessor, AccessorId, AccessorLink, Buffer, BufferView, Link, Mesh, MeshId, MeshLink, Node,
    NodeId, NodeLink, Primitive,
};

/// An owned, in-memory glTF scene document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Uninterpreted top-level fields (`asset`, `scenes`, `scene`,
    /// `materials`, extensions, ...), written back verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buffers: Vec<Buffer>,
    #[serde(rename = "bufferViews", default, skip_serializing_if = "Vec::is_empty")]
    pub buffer_views: Vec<BufferView>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accessors: Vec<Accessor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meshes: Vec<Mesh>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Node>,

    /// Directory buffer URIs resolve against.
    #[serde(skip)]
    pub(crate) base_dir: PathBuf,
    #[serde(skip)]
    node_mesh_reference: bool,
    #[serde(skip)]
    accessor_reference: bool,
    #[serde(skip)]
    pub(crate) accessor_data: bool,
    #[serde(skip)]
    next_id: u32,
}

impl Document {
    /// Load a document from a `.gltf`/`.json` file. Buffer side files are
    /// not touched until data is materialized.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut document: Self = serde_json::from_str(&text)?;
        document.base_dir = path.parent().unwrap_or(Path::new("")).to_path_buf();
        document.assign_ids();
        tracing::debug!(
            "Loaded {:?}: {} buffers, {} accessors, {} meshes, {} nodes",
            path,
            document.buffers.len(),
            document.accessors.len(),
            document.meshes.len(),
            document.nodes.len()
        );
        Ok(document)
    }

    /// Build a document from an in-memory JSON value. Buffer URIs resolve
    /// against the current directory.
    pub fn from_json(value: Value) -> Result<Self> {
        let mut document: Self = serde_json::from_value(value)?;
        document.assign_ids();
        Ok(document)
    }

    /// Write the document to `path`, restoring index mode and flushing each
    /// buffer's bytes to its URI-addressed side file next to `path`.
    ///
    /// Nothing is written until every in-memory transform has succeeded.
    pub fn write(&mut self, path: &Path) -> Result<()> {
        self.set_node_mesh_reference(false)?;
        self.set_accessor_reference(false)?;
        self.set_accessor_data(false)?;

        for (index, buffer) in self.buffers.iter().enumerate() {
            if buffer.data.is_some() && buffer.uri.is_none() {
                return Err(Error::MissingUri { index });
            }
        }
        let text = serde_json::to_string(self)?;

        let dir = path.parent().unwrap_or(Path::new(""));
        for buffer in &mut self.buffers {
            if let (Some(data), Some(uri)) = (buffer.data.take(), buffer.uri.as_deref()) {
                tracing::debug!("Writing {} bytes to {:?}", data.len(), dir.join(uri));
                fs::write(dir.join(uri), data)?;
            }
        }
        fs::write(path, text)?;
        tracing::info!("Wrote {:?}", path);
        Ok(())
    }

    /// Hand out identity handles to every entity that carries one. Called
    /// once per load; newly created entities get handles from the same
    /// counter via the `alloc_*` methods.
    fn assign_ids(&mut self) {
        let mut next = self.next_id;
        for mesh in &mut self.meshes {
            mesh.id = MeshId(next);
            next += 1;
        }
        for node in &mut self.nodes {
            node.id = NodeId(next);
            next += 1;
        }
        for accessor in &mut self.accessors {
            accessor.id = AccessorId(next);
            next += 1;
        }
        self.next_id = next;
    }

    pub(crate) fn alloc_mesh_id(&mut self) -> MeshId {
        self.next_id += 1;
        MeshId(self.next_id - 1)
    }

    pub(crate) fn alloc_node_id(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId(self.next_id - 1)
    }

    pub(crate) fn alloc_accessor_id(&mut self) -> AccessorId {
        self.next_id += 1;
        AccessorId(self.next_id - 1)
    }

    /// Whether node→mesh and node→child links are in reference form.
    pub fn node_mesh_reference(&self) -> bool {
        self.node_mesh_reference
    }

    /// Whether primitive→accessor links are in reference form.
    pub fn accessor_reference(&self) -> bool {
        self.accessor_reference
    }

    /// Toggle node→mesh and node→child links between index and reference
    /// form. Setting the current mode is a no-op.
    pub fn set_node_mesh_reference(&mut self, mode: bool) -> Result<()> {
        if mode == self.node_mesh_reference {
            return Ok(());
        }
        self.node_mesh_reference = mode;
        if mode {
            self.dereference_nodes()
        } else {
            self.reindex_nodes()
        }
    }

    /// Toggle primitive attribute/indices links between index and reference
    /// form. Setting the current mode is a no-op.
    pub fn set_accessor_reference(&mut self, mode: bool) -> Result<()> {
        if mode == self.accessor_reference {
            return Ok(());
        }
        self.accessor_reference = mode;
        if mode {
            self.dereference_accessors()
        } else {
            self.reindex_accessors()
        }
    }

    fn dereference_nodes(&mut self) -> Result<()> {
        let node_ids: Vec<NodeId> = self.nodes.iter().map(|node| node.id).collect();
        for node in &mut self.nodes {
            if let Some(Link::Index(index)) = node.mesh {
                let mesh = self.meshes.get(index).ok_or(Error::DanglingReference {
                    entity: "mesh",
                    index,
                    len: self.meshes.len(),
                })?;
                node.mesh = Some(Link::Id(mesh.id));
            }
            for child in &mut node.children {
                if let Link::Index(index) = *child {
                    let id = node_ids.get(index).ok_or(Error::DanglingReference {
                        entity: "node",
                        index,
                        len: node_ids.len(),
                    })?;
                    *child = Link::Id(*id);
                }
            }
        }
        Ok(())
    }

    fn reindex_nodes(&mut self) -> Result<()> {
        // Identity lookup: handles are unique per entity, so a handle→position
        // map is the exact-identity search over the owning array.
        let mesh_positions: HashMap<MeshId, usize> = self
            .meshes
            .iter()
            .enumerate()
            .map(|(position, mesh)| (mesh.id, position))
            .collect();
        let node_positions: HashMap<NodeId, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(position, node)| (node.id, position))
            .collect();
        for node in &mut self.nodes {
            if let Some(Link::Id(id)) = node.mesh {
                let position = mesh_positions
                    .get(&id)
                    .ok_or(Error::ReferenceNotFound { entity: "mesh" })?;
                node.mesh = Some(Link::Index(*position));
            }
            for child in &mut node.children {
                if let Link::Id(id) = *child {
                    let position = node_positions
                        .get(&id)
                        .ok_or(Error::ReferenceNotFound { entity: "node" })?;
                    *child = Link::Index(*position);
                }
            }
        }
        Ok(())
    }

    fn dereference_accessors(&mut self) -> Result<()> {
        let accessors = &self.accessors;
        let len = accessors.len();
        let resolve = |link: &mut AccessorLink| -> Result<()> {
            if let Link::Index(index) = *link {
                let accessor = accessors.get(index).ok_or(Error::DanglingReference {
                    entity: "accessor",
                    index,
                    len,
                })?;
                *link = Link::Id(accessor.id);
            }
            Ok(())
        };
        for mesh in &mut self.meshes {
            for primitive in &mut mesh.primitives {
                for link in primitive.attributes.values_mut() {
                    resolve(link)?;
                }
                if let Some(link) = &mut primitive.indices {
                    resolve(link)?;
                }
            }
        }
        Ok(())
    }

    fn reindex_accessors(&mut self) -> Result<()> {
        let positions: HashMap<AccessorId, usize> = self
            .accessors
            .iter()
            .enumerate()
            .map(|(position, accessor)| (accessor.id, position))
            .collect();
        let resolve = |link: &mut AccessorLink| -> Result<()> {
            if let Link::Id(id) = *link {
                let position = positions
                    .get(&id)
                    .ok_or(Error::ReferenceNotFound { entity: "accessor" })?;
                *link = Link::Index(*position);
            }
            Ok(())
        };
        for mesh in &mut self.meshes {
            for primitive in &mut mesh.primitives {
                for link in primitive.attributes.values_mut() {
                    resolve(link)?;
                }
                if let Some(link) = &mut primitive.indices {
                    resolve(link)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn node_document() -> Document {
        Document::from_json(json!({
            "asset": {"version": "2.0"},
            "meshes": [
                {"name": "a", "primitives": []},
                {"name": "a", "primitives": []}
            ],
            "nodes": [
                {"name": "root", "children": [1, 2]},
                {"name": "left", "mesh": 0},
                {"name": "right", "mesh": 1}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_node_mesh_round_trip() {
        let mut document = node_document();
        let before = serde_json::to_value(&document).unwrap();

        document.set_node_mesh_reference(true).unwrap();
        assert!(document.nodes[1].mesh.unwrap().as_id().is_some());
        document.set_node_mesh_reference(false).unwrap();

        assert_eq!(serde_json::to_value(&document).unwrap(), before);
    }

    #[test]
    fn test_structurally_equal_meshes_stay_distinct() {
        // Both meshes serialize identically; identity links must still
        // resolve back to their original positions.
        let mut document = node_document();
        document.set_node_mesh_reference(true).unwrap();
        document.set_node_mesh_reference(false).unwrap();
        assert_eq!(document.nodes[1].mesh, Some(Link::Index(0)));
        assert_eq!(document.nodes[2].mesh, Some(Link::Index(1)));
    }

    #[test]
    fn test_toggle_is_idempotent() {
        let mut document = node_document();
        document.set_node_mesh_reference(true).unwrap();
        let snapshot = document.nodes.clone();
        document.set_node_mesh_reference(true).unwrap();
        assert_eq!(document.nodes, snapshot);
    }

    #[test]
    fn test_dereference_reports_dangling_index() {
        let mut document = Document::from_json(json!({
            "nodes": [{"name": "n", "mesh": 5}]
        }))
        .unwrap();
        let error = document.set_node_mesh_reference(true).unwrap_err();
        assert!(matches!(
            error,
            Error::DanglingReference { entity: "mesh", index: 5, len: 0 }
        ));
    }

    #[test]
    fn test_reindex_reports_removed_entity() {
        let mut document = node_document();
        document.set_node_mesh_reference(true).unwrap();
        document.meshes.remove(1);
        let error = document.set_node_mesh_reference(false).unwrap_err();
        assert!(matches!(error, Error::ReferenceNotFound { entity: "mesh" }));
    }

    #[test]
    fn test_accessor_link_round_trip() {
        let mut document = Document::from_json(json!({
            "accessors": [
                {"bufferView": 0, "byteOffset": 0, "count": 3, "componentType": 5126, "type": "VEC3"},
                {"bufferView": 0, "byteOffset": 36, "count": 3, "componentType": 5123, "type": "SCALAR"}
            ],
            "meshes": [{
                "name": "m",
                "primitives": [{"mode": 4, "attributes": {"POSITION": 0}, "indices": 1}]
            }]
        }))
        .unwrap();
        let before = serde_json::to_value(&document).unwrap();

        document.set_accessor_reference(true).unwrap();
        let primitive = &document.meshes[0].primitives[0];
        assert!(primitive.attributes["POSITION"].as_id().is_some());
        assert!(primitive.indices.unwrap().as_id().is_some());

        document.set_accessor_reference(false).unwrap();
        assert_eq!(serde_json::to_value(&document).unwrap(), before);
    }
}
