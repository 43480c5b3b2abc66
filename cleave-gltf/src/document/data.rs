//! Buffer materialization - slicing binary payloads into accessors and
//! repacking them into a minimal, aligned layout.
//!
//! Forward: buffer side files are read whole, buffer views copy their byte
//! range out of their buffer, accessors copy their byte range out of their
//! view. Reverse: accessor bytes are re-appended into their views and views
//! into their buffers, each at a 4-byte-aligned offset, in ascending
//! `(parent, byteOffset)` order. The reverse pass rebuilds the physical
//! layout from scratch because splitting appends accessors whose declared
//! offsets no longer match any real byte position.

use std::fs;

use super::Document;
use crate::error::{Error, Result};

/// Accessor and buffer-view offsets are aligned to this boundary on repack.
const BYTE_ALIGNMENT: usize = 4;

fn pad_to_alignment(bytes: &mut Vec<u8>) {
    let padding = (BYTE_ALIGNMENT - (bytes.len() % BYTE_ALIGNMENT)) % BYTE_ALIGNMENT;
    bytes.extend(std::iter::repeat_n(0u8, padding));
}

fn slice_range(bytes: &[u8], offset: usize, len: usize, entity: &'static str) -> Result<Vec<u8>> {
    offset
        .checked_add(len)
        .and_then(|end| bytes.get(offset..end))
        .map(<[u8]>::to_vec)
        .ok_or(Error::ByteRangeOutOfBounds {
            entity,
            offset,
            len,
            available: bytes.len(),
        })
}

impl Document {
    /// Whether accessor byte data is currently materialized.
    pub fn accessor_data(&self) -> bool {
        self.accessor_data
    }

    /// Materialize (`true`) or repack and drop (`false`) the byte data
    /// behind every buffer, buffer view and accessor. Setting the current
    /// state is a no-op.
    pub fn set_accessor_data(&mut self, data: bool) -> Result<()> {
        if data == self.accessor_data {
            return Ok(());
        }
        self.accessor_data = data;
        if data {
            self.materialize()
        } else {
            self.repack()
        }
    }

    fn materialize(&mut self) -> Result<()> {
        for buffer in &mut self.buffers {
            if buffer.data.is_some() {
                // Already carrying bytes (in-memory buffer or a previous
                // repack); leave it unchanged.
                continue;
            }
            let Some(uri) = &buffer.uri else { continue };
            let path = self.base_dir.join(uri);
            tracing::debug!("Reading buffer bytes from {:?}", path);
            buffer.data = Some(fs::read(&path)?);
        }

        let buffers = &self.buffers;
        for view in &mut self.buffer_views {
            let buffer = buffers.get(view.buffer).ok_or(Error::DanglingReference {
                entity: "buffer",
                index: view.buffer,
                len: buffers.len(),
            })?;
            let bytes = buffer.data.as_deref().ok_or(Error::DataNotLoaded {
                entity: "buffer",
                index: view.buffer,
            })?;
            view.data = Some(slice_range(
                bytes,
                view.byte_offset,
                view.byte_length,
                "bufferView",
            )?);
        }

        let views = &self.buffer_views;
        for accessor in &mut self.accessors {
            let view = views.get(accessor.buffer_view).ok_or(Error::DanglingReference {
                entity: "bufferView",
                index: accessor.buffer_view,
                len: views.len(),
            })?;
            let bytes = view.data.as_deref().ok_or(Error::DataNotLoaded {
                entity: "bufferView",
                index: accessor.buffer_view,
            })?;
            let span = accessor.count * accessor.layout()?.element_size();
            accessor.data = Some(slice_range(bytes, accessor.byte_offset, span, "accessor")?);
        }
        Ok(())
    }

    fn repack(&mut self) -> Result<()> {
        // Level one: accessors back into their views. Stable sort on the old
        // (view, offset) key, so accessors appended by splitting (which
        // inherit their source's key) pack in append order.
        let mut order: Vec<usize> = (0..self.accessors.len()).collect();
        order.sort_by_key(|&i| (self.accessors[i].buffer_view, self.accessors[i].byte_offset));

        let mut view_bytes: Vec<Vec<u8>> = vec![Vec::new(); self.buffer_views.len()];
        for index in order {
            let accessor = &mut self.accessors[index];
            let destination =
                view_bytes
                    .get_mut(accessor.buffer_view)
                    .ok_or(Error::DanglingReference {
                        entity: "bufferView",
                        index: accessor.buffer_view,
                        len: self.buffer_views.len(),
                    })?;
            let data = accessor.data.take().ok_or(Error::DataNotLoaded {
                entity: "accessor",
                index,
            })?;
            pad_to_alignment(destination);
            accessor.byte_offset = destination.len();
            destination.extend_from_slice(&data);
        }
        for (view, bytes) in self.buffer_views.iter_mut().zip(view_bytes) {
            view.byte_length = bytes.len();
            view.data = Some(bytes);
        }

        // Level two: views back into their buffers, same align-and-append.
        let mut order: Vec<usize> = (0..self.buffer_views.len()).collect();
        order.sort_by_key(|&i| (self.buffer_views[i].buffer, self.buffer_views[i].byte_offset));

        let mut buffer_bytes: Vec<Vec<u8>> = vec![Vec::new(); self.buffers.len()];
        for index in order {
            let view = &mut self.buffer_views[index];
            let destination = buffer_bytes.get_mut(view.buffer).ok_or(Error::DanglingReference {
                entity: "buffer",
                index: view.buffer,
                len: self.buffers.len(),
            })?;
            let data = view.data.take().ok_or(Error::DataNotLoaded {
                entity: "bufferView",
                index,
            })?;
            pad_to_alignment(destination);
            view.byte_offset = destination.len();
            destination.extend_from_slice(&data);
        }
        for (buffer, bytes) in self.buffers.iter_mut().zip(buffer_bytes) {
            buffer.byte_length = bytes.len();
            buffer.data = Some(bytes);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// 3 float positions (36 bytes) followed by 4 u16 indices (8 bytes),
    /// deliberately laid out with the index range first in the buffer.
    fn sample_document() -> Document {
        let mut positions = Vec::new();
        for value in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            positions.extend_from_slice(&value.to_le_bytes());
        }
        let mut indices = Vec::new();
        for value in [0u16, 1, 2, 0] {
            indices.extend_from_slice(&value.to_le_bytes());
        }
        let mut bytes = indices;
        bytes.extend_from_slice(&positions);

        let mut document = Document::from_json(json!({
            "asset": {"version": "2.0"},
            "buffers": [{"byteLength": 44}],
            "bufferViews": [
                {"buffer": 0, "byteOffset": 8, "byteLength": 36},
                {"buffer": 0, "byteOffset": 0, "byteLength": 8}
            ],
            "accessors": [
                {"bufferView": 0, "byteOffset": 0, "count": 3, "componentType": 5126, "type": "VEC3"},
                {"bufferView": 1, "byteOffset": 0, "count": 4, "componentType": 5123, "type": "SCALAR"}
            ]
        }))
        .unwrap();
        document.buffers[0].data = Some(bytes);
        document
    }

    #[test]
    fn test_materialize_slices_accessor_ranges() {
        let mut document = sample_document();
        document.set_accessor_data(true).unwrap();

        let positions = document.accessors[0].data.as_ref().unwrap();
        assert_eq!(positions.len(), 36);
        assert_eq!(&positions[0..4], &0.0f32.to_le_bytes());

        let indices = document.accessors[1].data.as_ref().unwrap();
        assert_eq!(indices, &[0u8, 0, 1, 0, 2, 0, 0, 0]);
    }

    #[test]
    fn test_repack_preserves_payload_and_aligns() {
        let mut document = sample_document();
        document.set_accessor_data(true).unwrap();
        let payloads: Vec<Vec<u8>> = document
            .accessors
            .iter()
            .map(|accessor| accessor.data.clone().unwrap())
            .collect();

        document.set_accessor_data(false).unwrap();
        for view in &document.buffer_views {
            assert_eq!(view.byte_offset % 4, 0);
            assert!(view.data.is_none());
        }
        for accessor in &document.accessors {
            assert_eq!(accessor.byte_offset % 4, 0);
            assert!(accessor.data.is_none());
        }
        assert_eq!(
            document.buffers[0].byte_length,
            document.buffers[0].data.as_ref().unwrap().len()
        );

        // The 8-byte index view packs first in the buffer now; payloads are
        // byte-identical after re-materializing.
        document.set_accessor_data(true).unwrap();
        for (accessor, payload) in document.accessors.iter().zip(&payloads) {
            assert_eq!(accessor.data.as_ref().unwrap(), payload);
        }
    }

    #[test]
    fn test_repack_pads_odd_spans() {
        // A 6-byte accessor followed by another in the same view forces
        // 2 bytes of padding before the second offset.
        let mut document = Document::from_json(json!({
            "buffers": [{"byteLength": 12}],
            "bufferViews": [{"buffer": 0, "byteOffset": 0, "byteLength": 12}],
            "accessors": [
                {"bufferView": 0, "byteOffset": 0, "count": 3, "componentType": 5123, "type": "SCALAR"},
                {"bufferView": 0, "byteOffset": 6, "count": 3, "componentType": 5123, "type": "SCALAR"}
            ]
        }))
        .unwrap();
        document.buffers[0].data = Some((0u8..12).collect());
        document.set_accessor_data(true).unwrap();
        document.set_accessor_data(false).unwrap();

        assert_eq!(document.accessors[0].byte_offset, 0);
        assert_eq!(document.accessors[1].byte_offset, 8);
        assert_eq!(document.buffer_views[0].byte_length, 14);
        let bytes = document.buffers[0].data.as_ref().unwrap();
        assert_eq!(&bytes[0..6], &[0, 1, 2, 3, 4, 5]);
        assert_eq!(&bytes[6..8], &[0, 0]);
        assert_eq!(&bytes[8..14], &[6, 7, 8, 9, 10, 11]);
    }

    #[test]
    fn test_materialize_rejects_out_of_range_accessor() {
        let mut document = Document::from_json(json!({
            "buffers": [{"byteLength": 8}],
            "bufferViews": [{"buffer": 0, "byteOffset": 0, "byteLength": 8}],
            "accessors": [
                {"bufferView": 0, "byteOffset": 4, "count": 4, "componentType": 5123, "type": "SCALAR"}
            ]
        }))
        .unwrap();
        document.buffers[0].data = Some(vec![0; 8]);
        let error = document.set_accessor_data(true).unwrap_err();
        assert!(matches!(
            error,
            Error::ByteRangeOutOfBounds { entity: "accessor", offset: 4, len: 8, available: 8 }
        ));
    }

    #[test]
    fn test_materialize_rejects_dangling_buffer_index() {
        let mut document = Document::from_json(json!({
            "buffers": [{"byteLength": 4}],
            "bufferViews": [{"buffer": 3, "byteOffset": 0, "byteLength": 4}]
        }))
        .unwrap();
        document.buffers[0].data = Some(vec![0; 4]);
        assert!(matches!(
            document.set_accessor_data(true).unwrap_err(),
            Error::DanglingReference { entity: "buffer", index: 3, len: 1 }
        ));
    }
}
