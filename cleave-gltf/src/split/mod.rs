//! Mesh topology splitting.
//!
//! Discovers the disconnected pieces of a triangle-list primitive and
//! rewrites the mesh so every piece becomes its own primitive backed by
//! freshly packed accessors with a compact local index range. Two triangles
//! belong to the same piece when they share a vertex *position* - exact
//! coordinate equality, regardless of which index slot stores the vertex -
//! so seams welded by position survive as one piece.

mod union_find;

pub use union_find::UnionFind;

use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

use indexmap::IndexMap;
use serde_json::Map;

use crate::document::{
    Accessor, AccessorId, AccessorLink, Document, Link, Mesh, Node, Primitive,
};
use crate::error::{Error, Result};

/// A maximal group of triangles transitively linked by shared vertex
/// positions. Groups returned by [`find_connected_components`] partition the
/// primitive's triangle indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Triangle indices belonging to this group, ascending.
    pub triangles: Vec<usize>,
}

fn accessor_index(link: AccessorLink) -> Result<usize> {
    link.as_index()
        .ok_or(Error::ReferenceNotFound { entity: "accessor" })
}

fn read_accessor(document: &Document, index: usize) -> Result<Vec<Vec<f64>>> {
    let accessor = document.accessors.get(index).ok_or(Error::DanglingReference {
        entity: "accessor",
        index,
        len: document.accessors.len(),
    })?;
    let data = accessor.data.as_deref().ok_or(Error::DataNotLoaded {
        entity: "accessor",
        index,
    })?;
    accessor.layout()?.unpack(data)
}

/// Group one primitive's triangles into connected components.
///
/// Ensures accessor links are in index form and accessor data is
/// materialized, then welds triangles by exact position: the first triangle
/// to use a position owns it, and every later triangle touching the same
/// position is unioned into the owner's group. A trailing index run shorter
/// than one triangle is ignored.
pub fn find_connected_components(
    document: &mut Document,
    mesh_index: usize,
    primitive_index: usize,
) -> Result<Vec<Component>> {
    document.set_accessor_reference(false)?;
    document.set_accessor_data(true)?;

    let mesh = document.meshes.get(mesh_index).ok_or(Error::DanglingReference {
        entity: "mesh",
        index: mesh_index,
        len: document.meshes.len(),
    })?;
    let primitive = mesh
        .primitives
        .get(primitive_index)
        .ok_or(Error::DanglingReference {
            entity: "primitive",
            index: primitive_index,
            len: mesh.primitives.len(),
        })?;
    let mode = primitive.effective_mode();
    if mode != Primitive::TRIANGLES {
        return Err(Error::UnsupportedPrimitiveMode { mode });
    }
    let position_link = *primitive
        .attributes
        .get("POSITION")
        .ok_or(Error::MissingPositions)?;
    let indices_link = primitive.indices.ok_or(Error::MissingIndices)?;

    let positions = read_accessor(document, accessor_index(position_link)?)?;
    let index_values = read_accessor(document, accessor_index(indices_link)?)?;
    let vertex_indices: Vec<usize> = index_values
        .iter()
        .map(|element| element[0] as usize)
        .collect();

    let mut groups = UnionFind::new();
    let mut first_owner: HashMap<Vec<u64>, usize> = HashMap::new();
    for (triangle, corners) in vertex_indices.chunks_exact(3).enumerate() {
        groups.new_element();
        for &vertex in corners {
            let position = positions.get(vertex).ok_or(Error::DanglingReference {
                entity: "vertex",
                index: vertex,
                len: positions.len(),
            })?;
            let key: Vec<u64> = position.iter().map(|value| value.to_bits()).collect();
            match first_owner.entry(key) {
                Entry::Occupied(owner) => groups.union(*owner.get(), triangle),
                Entry::Vacant(slot) => {
                    slot.insert(triangle);
                }
            }
        }
    }

    Ok(groups
        .groups()
        .into_iter()
        .map(|triangles| Component { triangles })
        .collect())
}

/// Split one mesh into its disconnected pieces, one primitive per piece.
///
/// Any multiprimitive structure is expanded first and the new meshes this
/// produces are split too, through an explicit work queue (never by
/// iterating a growing collection). Afterwards the mesh holds one primitive
/// per connected component; [`expand_multiprimitive_meshes`] promotes those
/// into meshes of their own.
pub fn split_disconnected_mesh(document: &mut Document, mesh_index: usize) -> Result<()> {
    document.set_node_mesh_reference(true)?;
    document.set_accessor_reference(false)?;

    let mut queue = VecDeque::from([mesh_index]);
    while let Some(index) = queue.pop_front() {
        let added = expand_multiprimitive_mesh(document, index)?;
        queue.extend(added);
        split_mesh(document, index)?;
    }
    Ok(())
}

/// Split every mesh in the document into its disconnected pieces, then
/// expand the rebuilt multiprimitive meshes so each piece ends up as its
/// own mesh under its own node.
pub fn split_disconnected_meshes(document: &mut Document) -> Result<()> {
    document.set_node_mesh_reference(true)?;
    document.set_accessor_reference(false)?;
    document.set_accessor_data(true)?;

    // Meshes appended while splitting are handled by the pass that created
    // them; only the meshes present at entry need visiting.
    for mesh_index in 0..document.meshes.len() {
        split_disconnected_mesh(document, mesh_index)?;
    }
    expand_multiprimitive_meshes(document)
}

/// Rebuild `mesh_index`'s sole primitive as one primitive per connected
/// component. The original accessors stay in the accessor array; only the
/// mesh's primitive list is rewritten.
fn split_mesh(document: &mut Document, mesh_index: usize) -> Result<()> {
    let mesh = document.meshes.get(mesh_index).ok_or(Error::DanglingReference {
        entity: "mesh",
        index: mesh_index,
        len: document.meshes.len(),
    })?;
    let Some(primitive) = mesh.primitives.first() else {
        return Ok(());
    };
    if primitive.indices.is_none() {
        tracing::warn!("Mesh {} primitive is not indexed; skipping split", mesh_index);
        return Ok(());
    }

    let mut components = find_connected_components(document, mesh_index, 0)?;
    if components.is_empty() {
        // No triangles at all; still rebuild, so the contract stays
        // "content unchanged, layout rebuilt".
        components.push(Component {
            triangles: Vec::new(),
        });
    }
    tracing::info!(
        "Mesh {} ({:?}): {} connected component(s)",
        mesh_index,
        document.meshes[mesh_index].name.as_deref().unwrap_or(""),
        components.len()
    );

    // Pull everything needed from the original primitive before the
    // accessor array starts growing.
    let primitive = &document.meshes[mesh_index].primitives[0];
    let mode = primitive.mode;
    let primitive_extra = primitive.extra.clone();
    let attributes: Vec<(String, usize)> = primitive
        .attributes
        .iter()
        .map(|(name, link)| Ok((name.clone(), accessor_index(*link)?)))
        .collect::<Result<_>>()?;
    let indices_index = accessor_index(primitive.indices.ok_or(Error::MissingIndices)?)?;

    let attribute_values: Vec<Vec<Vec<f64>>> = attributes
        .iter()
        .map(|(_, index)| read_accessor(document, *index))
        .collect::<Result<_>>()?;
    let index_values = read_accessor(document, indices_index)?;
    let triangles: Vec<[usize; 3]> = index_values
        .chunks_exact(3)
        .map(|run| [run[0][0] as usize, run[1][0] as usize, run[2][0] as usize])
        .collect();

    let mut new_primitives = Vec::with_capacity(components.len());
    for component in &components {
        // Compact relabeling: the first sight of an original vertex index
        // within this component assigns the next local index.
        let mut local: HashMap<usize, usize> = HashMap::new();
        let mut vertex_order: Vec<usize> = Vec::new();
        let mut local_indices: Vec<usize> = Vec::new();
        for &triangle in &component.triangles {
            for &vertex in &triangles[triangle] {
                let next = local.len();
                let slot = *local.entry(vertex).or_insert(next);
                if slot == next {
                    vertex_order.push(vertex);
                }
                local_indices.push(slot);
            }
        }

        let mut new_attributes = IndexMap::new();
        for ((name, source_index), values) in attributes.iter().zip(&attribute_values) {
            let elements: Vec<Vec<f64>> = vertex_order
                .iter()
                .map(|&vertex| {
                    values.get(vertex).cloned().ok_or(Error::DanglingReference {
                        entity: "vertex",
                        index: vertex,
                        len: values.len(),
                    })
                })
                .collect::<Result<_>>()?;
            let index = append_accessor(document, *source_index, &elements)?;
            new_attributes.insert(name.clone(), Link::Index(index));
        }

        let elements: Vec<Vec<f64>> = local_indices
            .iter()
            .map(|&index| vec![index as f64])
            .collect();
        let indices_accessor = append_accessor(document, indices_index, &elements)?;

        new_primitives.push(Primitive {
            mode,
            attributes: new_attributes,
            indices: Some(Link::Index(indices_accessor)),
            extra: primitive_extra.clone(),
        });
    }

    let mesh = &mut document.meshes[mesh_index];
    mesh.primitives.extend(new_primitives);
    mesh.primitives.remove(0);
    Ok(())
}

/// Append a fresh accessor holding `elements` in `source_index`'s declared
/// layout and return its index. The new accessor inherits the source's
/// `(bufferView, byteOffset)` sort key, so the next repack packs it right
/// after its sibling data; `min`/`max` are recomputed only when the source
/// declared them.
fn append_accessor(
    document: &mut Document,
    source_index: usize,
    elements: &[Vec<f64>],
) -> Result<usize> {
    let source = document.accessors.get(source_index).ok_or(Error::DanglingReference {
        entity: "accessor",
        index: source_index,
        len: document.accessors.len(),
    })?;
    let layout = source.layout()?;
    let mut data = Vec::with_capacity(elements.len() * layout.element_size());
    layout.pack(elements, &mut data);
    let mut accessor = Accessor {
        id: AccessorId::default(),
        buffer_view: source.buffer_view,
        byte_offset: source.byte_offset,
        count: elements.len(),
        component_type: source.component_type,
        element_type: source.element_type.clone(),
        min: source.min.as_ref().map(|_| component_minima(elements)),
        max: source.max.as_ref().map(|_| component_maxima(elements)),
        data: Some(data),
        extra: source.extra.clone(),
    };
    accessor.id = document.alloc_accessor_id();
    let index = document.accessors.len();
    document.accessors.push(accessor);
    Ok(index)
}

/// Promote each of a mesh's secondary primitives into its own mesh and
/// return the indices of the meshes created.
///
/// Every node referencing the original mesh is rewired: its mesh link is
/// removed and it receives one fresh child node per resulting mesh - the
/// retained mesh first, then the new ones in primitive order.
pub fn expand_multiprimitive_mesh(
    document: &mut Document,
    mesh_index: usize,
) -> Result<Vec<usize>> {
    document.set_node_mesh_reference(true)?;

    let len = document.meshes.len();
    let mesh = document
        .meshes
        .get_mut(mesh_index)
        .ok_or(Error::DanglingReference {
            entity: "mesh",
            index: mesh_index,
            len,
        })?;
    if mesh.primitives.len() <= 1 {
        return Ok(Vec::new());
    }
    let original_id = mesh.id;
    let base_name = mesh.name.clone();
    let spares: Vec<Primitive> = mesh.primitives.drain(1..).collect();
    tracing::debug!(
        "Expanding mesh {} into {} single-primitive meshes",
        mesh_index,
        spares.len() + 1
    );

    let mut added = Vec::with_capacity(spares.len());
    let mut resulting_ids = vec![original_id];
    for (offset, primitive) in spares.into_iter().enumerate() {
        let id = document.alloc_mesh_id();
        document.meshes.push(Mesh {
            id,
            name: base_name.as_ref().map(|name| format!("{name} ({offset})")),
            primitives: vec![primitive],
            extra: Map::new(),
        });
        added.push(document.meshes.len() - 1);
        resulting_ids.push(id);
    }

    // Only the nodes present before expansion are scanned; the children
    // appended below never target the expanded mesh.
    let node_count = document.nodes.len();
    for node_index in 0..node_count {
        if document.nodes[node_index].mesh != Some(Link::Id(original_id)) {
            continue;
        }
        let node_name = document.nodes[node_index].name.clone();
        let mut children = Vec::with_capacity(resulting_ids.len());
        for (offset, &mesh_id) in resulting_ids.iter().enumerate() {
            let id = document.alloc_node_id();
            document.nodes.push(Node {
                id,
                name: node_name.as_ref().map(|name| format!("{name} ({offset})")),
                mesh: Some(Link::Id(mesh_id)),
                children: Vec::new(),
                extra: Map::new(),
            });
            children.push(Link::Id(id));
        }
        let node = &mut document.nodes[node_index];
        node.mesh = None;
        node.children = children;
    }
    Ok(added)
}

/// Expand every multiprimitive mesh in the document.
pub fn expand_multiprimitive_meshes(document: &mut Document) -> Result<()> {
    document.set_node_mesh_reference(true)?;
    let mut queue: VecDeque<usize> = (0..document.meshes.len()).collect();
    while let Some(mesh_index) = queue.pop_front() {
        let added = expand_multiprimitive_mesh(document, mesh_index)?;
        queue.extend(added);
    }
    Ok(())
}

fn component_minima(elements: &[Vec<f64>]) -> Vec<f64> {
    let mut minima: Vec<f64> = Vec::new();
    for element in elements {
        for (axis, &value) in element.iter().enumerate() {
            match minima.get_mut(axis) {
                Some(current) => {
                    if value < *current {
                        *current = value;
                    }
                }
                None => minima.push(value),
            }
        }
    }
    minima
}

fn component_maxima(elements: &[Vec<f64>]) -> Vec<f64> {
    let mut maxima: Vec<f64> = Vec::new();
    for element in elements {
        for (axis, &value) in element.iter().enumerate() {
            match maxima.get_mut(axis) {
                Some(current) => {
                    if value > *current {
                        *current = value;
                    }
                }
                None => maxima.push(value),
            }
        }
    }
    maxima
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_extrema() {
        let elements = vec![
            vec![1.0, -2.0, 3.0],
            vec![-4.0, 5.0, 0.5],
            vec![0.0, 0.0, 9.0],
        ];
        assert_eq!(component_minima(&elements), vec![-4.0, -2.0, 0.5]);
        assert_eq!(component_maxima(&elements), vec![1.0, 5.0, 9.0]);
    }

    #[test]
    fn test_accessor_index_rejects_identity_link() {
        assert!(accessor_index(Link::Index(2)).is_ok());
        assert!(matches!(
            accessor_index(Link::Id(AccessorId::default())),
            Err(Error::ReferenceNotFound { entity: "accessor" })
        ));
    }
}
