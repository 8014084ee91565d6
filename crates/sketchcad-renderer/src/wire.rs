//! 几何缓冲区二进制帧
//!
//! 后台构建把结果编码为原始二进制帧，位置与索引按小端字节写入，不经过 JSON：
//!
//! ```text
//! 帧头:  magic "SCGB" | version u32 | mesh_count u32
//! 每个网格: id_len u32 | id (UTF-8)
//!          topology u8 (0=lines, 1=triangles) | index_width u8 (16/32)
//!          position_count u32 | f32 * position_count
//!          index_count u32    | u16/u32 * index_count
//! ```

use crate::buffers::{GeometryBuffers, IndexBuffer, MeshBuffers};
use crate::error::WireError;
use sketchcad_core::id::AssetId;
use sketchcad_core::scene::Topology;
use std::collections::BTreeMap;

/// 帧魔数 "SCGB"
const MAGIC: &[u8; 4] = b"SCGB";

/// 当前帧格式版本
const FORMAT_VERSION: u32 = 1;

/// 帧头（12 字节）
#[derive(Debug)]
struct FrameHeader {
    magic: [u8; 4],
    version: u32,
    mesh_count: u32,
}

impl FrameHeader {
    fn new(mesh_count: u32) -> Self {
        Self {
            magic: *MAGIC,
            version: FORMAT_VERSION,
            mesh_count,
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.magic);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.mesh_count.to_le_bytes());
    }

    fn read(reader: &mut Reader<'_>) -> Result<Self, WireError> {
        let magic: [u8; 4] = reader.array()?;
        if &magic != MAGIC {
            return Err(WireError::InvalidMagic);
        }

        let version = reader.u32()?;
        if version != FORMAT_VERSION {
            return Err(WireError::UnsupportedVersion(version));
        }

        let mesh_count = reader.u32()?;
        Ok(Self {
            magic,
            version,
            mesh_count,
        })
    }
}

fn topology_tag(topology: Topology) -> u8 {
    match topology {
        Topology::Lines => 0,
        Topology::Triangles => 1,
    }
}

fn topology_from_tag(tag: u8) -> Result<Topology, WireError> {
    match tag {
        0 => Ok(Topology::Lines),
        1 => Ok(Topology::Triangles),
        other => Err(WireError::UnknownTopology(other)),
    }
}

fn len_u32(len: usize) -> Result<u32, WireError> {
    u32::try_from(len).map_err(|_| WireError::TooLarge(len))
}

/// 编码为二进制帧
pub fn encode(buffers: &GeometryBuffers) -> Result<Vec<u8>, WireError> {
    let mut out = Vec::new();
    FrameHeader::new(len_u32(buffers.meshes.len())?).write(&mut out);

    for (id, mesh) in &buffers.meshes {
        let id = id.as_str().as_bytes();
        out.extend_from_slice(&len_u32(id.len())?.to_le_bytes());
        out.extend_from_slice(id);

        out.push(topology_tag(mesh.topology));
        out.push(mesh.indices.format().bits());

        out.extend_from_slice(&len_u32(mesh.positions.len())?.to_le_bytes());
        for value in &mesh.positions {
            out.extend_from_slice(&value.to_le_bytes());
        }

        out.extend_from_slice(&len_u32(mesh.indices.len())?.to_le_bytes());
        match &mesh.indices {
            IndexBuffer::U16(values) => {
                for value in values {
                    out.extend_from_slice(&value.to_le_bytes());
                }
            }
            IndexBuffer::U32(values) => {
                for value in values {
                    out.extend_from_slice(&value.to_le_bytes());
                }
            }
        }
    }

    Ok(out)
}

/// 解码二进制帧
pub fn decode(bytes: &[u8]) -> Result<GeometryBuffers, WireError> {
    let mut reader = Reader { bytes, pos: 0 };
    let header = FrameHeader::read(&mut reader)?;

    let mut meshes = BTreeMap::new();
    for _ in 0..header.mesh_count {
        let id_len = reader.u32()? as usize;
        let id = std::str::from_utf8(reader.take(id_len)?).map_err(|_| WireError::InvalidMeshId)?;
        let id = AssetId::new(id);

        let topology = topology_from_tag(reader.u8()?)?;
        let width = reader.u8()?;

        let position_count = reader.u32()? as usize;
        let positions = reader
            .take(position_count.saturating_mul(4))?
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        let index_count = reader.u32()? as usize;
        let indices = match width {
            16 => IndexBuffer::U16(
                reader
                    .take(index_count.saturating_mul(2))?
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect(),
            ),
            32 => IndexBuffer::U32(
                reader
                    .take(index_count.saturating_mul(4))?
                    .chunks_exact(4)
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            other => return Err(WireError::UnknownIndexWidth(other)),
        };

        meshes.insert(
            id,
            MeshBuffers {
                positions,
                indices,
                topology,
            },
        );
    }

    let remaining = reader.remaining();
    if remaining != 0 {
        return Err(WireError::TrailingBytes(remaining));
    }

    Ok(GeometryBuffers { meshes })
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], WireError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(WireError::Truncated(self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.array::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32, WireError> {
        self.array().map(u32::from_le_bytes)
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GeometryBuffers {
        let mut meshes = BTreeMap::new();
        meshes.insert(
            AssetId::new("doc-asset-1"),
            MeshBuffers {
                positions: vec![0.0, 0.0, 0.0, 2.0, 0.5, -1.0],
                indices: IndexBuffer::U16(vec![0, 1]),
                topology: Topology::Lines,
            },
        );
        meshes.insert(
            AssetId::new("doc-asset-2"),
            MeshBuffers {
                positions: vec![0.0; 9],
                indices: IndexBuffer::U32(vec![0, 1, 2]),
                topology: Topology::Triangles,
            },
        );
        GeometryBuffers { meshes }
    }

    #[test]
    fn test_frame_layout() {
        let bytes = encode(&sample()).unwrap();
        assert_eq!(&bytes[..4], b"SCGB");
        assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 1);
        assert_eq!(u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]), 2);
        // 第一个网格的 id 长度
        assert_eq!(u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]), 11);
    }

    #[test]
    fn test_index_width_survives_decoding() {
        let decoded = decode(&encode(&sample()).unwrap()).unwrap();
        assert_eq!(decoded, sample());
        let second = decoded.get(&AssetId::new("doc-asset-2")).unwrap();
        assert!(matches!(second.indices, IndexBuffer::U32(_)));
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = encode(&sample()).unwrap();
        bytes[0] = b'X';
        assert_eq!(decode(&bytes).unwrap_err(), WireError::InvalidMagic);
    }

    #[test]
    fn test_rejects_truncated_frame() {
        let bytes = encode(&sample()).unwrap();
        let err = decode(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, WireError::Truncated(_)));
    }

    #[test]
    fn test_rejects_unknown_index_width() {
        let mut bytes = encode(&sample()).unwrap();
        // 魔数(4) + 版本(4) + 数量(4) + id长度(4) + id(11) + 拓扑(1)
        bytes[28] = 8;
        assert_eq!(decode(&bytes).unwrap_err(), WireError::UnknownIndexWidth(8));
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let mut bytes = encode(&sample()).unwrap();
        bytes.push(0);
        assert_eq!(decode(&bytes).unwrap_err(), WireError::TrailingBytes(1));
    }

    #[test]
    fn test_empty_frame() {
        let bytes = encode(&GeometryBuffers::default()).unwrap();
        assert_eq!(bytes.len(), 12);
        assert!(decode(&bytes).unwrap().is_empty());
    }
}
