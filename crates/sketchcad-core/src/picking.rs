//! 颜色拾取
//!
//! 每个实体分配一个从 1 开始的整数 ID，编码为 24 位 RGB 颜色（红色为低字节）。
//! 0 保留给背景。

use crate::id::EntityId;
use crate::scene::EntityRecord;
use std::collections::HashMap;

/// 可编码的最大 ID
pub const MAX_PICKING_ID: u32 = 0xFF_FFFF;

/// 把 ID 编码为 RGB，超出 24 位的值饱和到 0xFFFFFF
pub fn encode_id_to_color(id: u32) -> [u8; 3] {
    let id = id.min(MAX_PICKING_ID);
    [
        (id & 0xFF) as u8,
        ((id >> 8) & 0xFF) as u8,
        ((id >> 16) & 0xFF) as u8,
    ]
}

pub fn decode_color_to_id(color: [u8; 3]) -> u32 {
    u32::from(color[0]) | (u32::from(color[1]) << 8) | (u32::from(color[2]) << 16)
}

/// 拾取映射表
#[derive(Debug, Clone, Default)]
pub struct PickingMap {
    pub id_to_entity: HashMap<u32, EntityId>,
    pub entity_to_color: HashMap<EntityId, [u8; 3]>,
}

impl PickingMap {
    /// 按实体顺序分配 ID
    pub fn new<'a>(entities: impl IntoIterator<Item = &'a EntityRecord>) -> Self {
        let mut map = Self::default();
        for (index, entity) in entities.into_iter().enumerate() {
            let id = u32::try_from(index + 1).unwrap_or(MAX_PICKING_ID);
            map.id_to_entity.insert(id, entity.id.clone());
            map.entity_to_color
                .insert(entity.id.clone(), encode_id_to_color(id));
        }
        map
    }

    pub fn len(&self) -> usize {
        self.id_to_entity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_entity.is_empty()
    }

    pub fn color_of(&self, entity: &EntityId) -> Option<[u8; 3]> {
        self.entity_to_color.get(entity).copied()
    }

    /// 由读回的像素颜色找到实体，背景和未知 ID 返回 `None`
    pub fn resolve(&self, color: [u8; 3]) -> Option<&EntityId> {
        match decode_color_to_id(color) {
            0 => None,
            id => self.id_to_entity.get(&id),
        }
    }
}
