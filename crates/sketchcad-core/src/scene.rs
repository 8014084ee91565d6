//! 场景图数据模型
//!
//! 采用 Entity-Component-Asset 结构：
//! - `EntityRecord`: 实体，最多引用每种组件各一个
//! - `ComponentTable`: 五张按组件ID索引的组件表
//! - `AssetRegistry`: 独立于实体的网格/材质/纹理资源
//!
//! 场景图快照交给调用方后不再被修改，所有变更都通过命令执行器产生新的快照。

use crate::id::{AssetId, ComponentId, EntityId};
use crate::math::{compose_transform, Aabb, Vec3};
use crate::primitive::Primitive;
use chrono::{DateTime, Utc};
use nalgebra::Matrix4;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// 场景图格式版本标签
pub const SCHEMA_VERSION: &str = "sketchcad.scene/1";

/// 程序化网格的 URI 前缀
pub const PRIMITIVE_URI_PREFIX: &str = "primitive:";

/// 长度单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Mm,
    Cm,
    M,
}

/// 坐标轴
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
    #[default]
    Z,
}

impl Axis {
    pub fn index(&self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn unit_vector(&self) -> Vec3 {
        let mut v = Vec3::zeros();
        v[self.index()] = 1.0;
        v
    }
}

/// 场景元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneMetadata {
    pub name: String,
    pub unit: Unit,
    pub up_axis: Axis,
    pub created_at: DateTime<Utc>,
    /// 每次成功的 apply/undo/redo 都会刷新
    pub updated_at: DateTime<Utc>,
}

/// 变换组件
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformComponent {
    pub position: Vec3,
    /// 欧拉角（弧度）
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl TransformComponent {
    pub fn identity() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Vec3::zeros(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }

    /// 合成的 4x4 矩阵
    pub fn matrix(&self) -> Matrix4<f64> {
        compose_transform(&self.position, &self.rotation, &self.scale)
    }
}

impl Default for TransformComponent {
    fn default() -> Self {
        Self::identity()
    }
}

/// 拓扑类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    Lines,
    Triangles,
}

/// 几何组件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryComponent {
    pub mesh: AssetId,
    pub topology: Topology,
    /// 覆盖网格资源中的包围盒
    pub local_bounds: Option<Aabb>,
}

/// 材质组件
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialComponent {
    /// RGBA，0-1
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub opacity: f32,
}

impl Default for MaterialComponent {
    fn default() -> Self {
        Self {
            base_color: [0.8, 0.8, 0.8, 1.0],
            metallic: 0.0,
            roughness: 0.5,
            opacity: 1.0,
        }
    }
}

/// 图层组件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerComponent {
    pub name: String,
    pub visible: bool,
    pub locked: bool,
}

impl Default for LayerComponent {
    fn default() -> Self {
        Self {
            name: "0".to_string(),
            visible: true,
            locked: false,
        }
    }
}

/// 属性值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Number(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl PropertyValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// 元数据组件
///
/// `primitive` 是图元参数的权威来源；`properties` 为开放的附加属性。
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetadataComponent {
    pub tags: BTreeSet<String>,
    pub properties: BTreeMap<String, PropertyValue>,
    pub primitive: Option<Primitive>,
}

impl MetadataComponent {
    pub fn for_primitive(primitive: Primitive) -> Self {
        let mut tags = BTreeSet::new();
        tags.insert(primitive.name().to_string());
        Self {
            tags,
            properties: BTreeMap::new(),
            primitive: Some(primitive),
        }
    }

    /// 按扁平键名读取属性，图元参数优先
    pub fn property(&self, key: &str) -> Option<PropertyValue> {
        self.primitive
            .as_ref()
            .and_then(|p| p.flatten().into_iter().find(|(k, _)| k == key).map(|(_, v)| v))
            .or_else(|| self.properties.get(key).cloned())
    }
}

/// 组件引用
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentRefs {
    pub transform: Option<ComponentId>,
    pub geometry: Option<ComponentId>,
    pub material: Option<ComponentId>,
    pub layer: Option<ComponentId>,
    pub metadata: Option<ComponentId>,
}

impl ComponentRefs {
    /// 所有已设置的组件ID
    pub fn ids(&self) -> impl Iterator<Item = &ComponentId> {
        [
            &self.transform,
            &self.geometry,
            &self.material,
            &self.layer,
            &self.metadata,
        ]
        .into_iter()
        .flatten()
    }
}

/// 实体记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: EntityId,
    pub name: Option<String>,
    pub components: ComponentRefs,
}

/// 组件表
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentTable {
    pub transforms: BTreeMap<ComponentId, TransformComponent>,
    pub geometries: BTreeMap<ComponentId, GeometryComponent>,
    pub materials: BTreeMap<ComponentId, MaterialComponent>,
    pub layers: BTreeMap<ComponentId, LayerComponent>,
    pub metadata: BTreeMap<ComponentId, MetadataComponent>,
}

/// 索引宽度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

impl IndexFormat {
    /// 能容纳指定顶点数的最窄索引宽度
    pub fn for_vertex_count(count: u32) -> Self {
        if count <= u16::MAX as u32 + 1 {
            IndexFormat::Uint16
        } else {
            IndexFormat::Uint32
        }
    }

    pub fn bits(&self) -> u8 {
        match self {
            IndexFormat::Uint16 => 16,
            IndexFormat::Uint32 => 32,
        }
    }
}

/// 顶点属性
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexAttribute {
    pub name: String,
    pub offset: u32,
    pub components: u32,
}

/// 顶点缓冲布局
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// 仅包含位置（3 x f32）
    pub fn positions_only() -> Self {
        Self {
            stride: 12,
            attributes: vec![VertexAttribute {
                name: "position".to_string(),
                offset: 0,
                components: 3,
            }],
        }
    }
}

/// 程序化网格生成器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshSource {
    Line,
    Rect,
    Circle,
    Extrude,
    Cube,
}

impl MeshSource {
    pub fn uri(&self) -> &'static str {
        match self {
            MeshSource::Line => "primitive:line",
            MeshSource::Rect => "primitive:rect",
            MeshSource::Circle => "primitive:circle",
            MeshSource::Extrude => "primitive:extrude",
            MeshSource::Cube => "primitive:cube",
        }
    }

    /// 按前缀识别生成器，未知 URI 返回 `None`
    pub fn from_uri(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix(PRIMITIVE_URI_PREFIX)?;
        let kind = rest.split(|c: char| !c.is_ascii_alphanumeric()).next()?;
        match kind {
            "line" => Some(MeshSource::Line),
            "rect" => Some(MeshSource::Rect),
            "circle" => Some(MeshSource::Circle),
            "extrude" => Some(MeshSource::Extrude),
            "cube" => Some(MeshSource::Cube),
            _ => None,
        }
    }
}

/// 网格资源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshAsset {
    pub id: AssetId,
    pub name: Option<String>,
    pub vertex_count: u32,
    pub index_count: u32,
    pub index_format: IndexFormat,
    pub topology: Topology,
    pub layout: VertexLayout,
    pub source_uri: Option<String>,
    pub bounds: Option<Aabb>,
}

impl MeshAsset {
    pub fn source(&self) -> Option<MeshSource> {
        self.source_uri.as_deref().and_then(MeshSource::from_uri)
    }
}

/// 材质资源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialAsset {
    pub id: AssetId,
    pub base_color: [f32; 4],
}

/// 纹理资源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureAsset {
    pub id: AssetId,
    pub uri: String,
}

/// 资源注册表
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssetRegistry {
    pub meshes: BTreeMap<AssetId, MeshAsset>,
    pub materials: BTreeMap<AssetId, MaterialAsset>,
    pub textures: BTreeMap<AssetId, TextureAsset>,
}

/// 场景图（一个文档的一个不可变版本）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneGraph {
    pub schema_version: String,
    pub metadata: SceneMetadata,
    /// 插入顺序
    pub entities: Vec<EntityRecord>,
    pub components: ComponentTable,
    pub assets: AssetRegistry,
}

impl SceneGraph {
    /// 创建空场景
    pub fn new(name: impl Into<String>, unit: Unit, up_axis: Axis, now: DateTime<Utc>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            metadata: SceneMetadata {
                name: name.into(),
                unit,
                up_axis,
                created_at: now,
                updated_at: now,
            },
            entities: Vec::new(),
            components: ComponentTable::default(),
            assets: AssetRegistry::default(),
        }
    }

    /// 使用默认单位与向上轴的空场景
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self::new("Untitled", Unit::default(), Axis::default(), now)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entity(&self, id: &EntityId) -> Option<&EntityRecord> {
        self.entities.iter().find(|e| &e.id == id)
    }

    pub fn entity_index(&self, id: &EntityId) -> Option<usize> {
        self.entities.iter().position(|e| &e.id == id)
    }

    pub fn transform_of(&self, entity: &EntityRecord) -> Option<&TransformComponent> {
        entity
            .components
            .transform
            .as_ref()
            .and_then(|id| self.components.transforms.get(id))
    }

    pub fn geometry_of(&self, entity: &EntityRecord) -> Option<&GeometryComponent> {
        entity
            .components
            .geometry
            .as_ref()
            .and_then(|id| self.components.geometries.get(id))
    }

    pub fn material_of(&self, entity: &EntityRecord) -> Option<&MaterialComponent> {
        entity
            .components
            .material
            .as_ref()
            .and_then(|id| self.components.materials.get(id))
    }

    pub fn layer_of(&self, entity: &EntityRecord) -> Option<&LayerComponent> {
        entity
            .components
            .layer
            .as_ref()
            .and_then(|id| self.components.layers.get(id))
    }

    pub fn metadata_of(&self, entity: &EntityRecord) -> Option<&MetadataComponent> {
        entity
            .components
            .metadata
            .as_ref()
            .and_then(|id| self.components.metadata.get(id))
    }

    pub fn mesh_of(&self, entity: &EntityRecord) -> Option<&MeshAsset> {
        self.geometry_of(entity)
            .and_then(|g| self.assets.meshes.get(&g.mesh))
    }

    /// 实体的图元参数
    pub fn primitive_of(&self, entity: &EntityRecord) -> Option<&Primitive> {
        self.metadata_of(entity).and_then(|m| m.primitive.as_ref())
    }

    /// 实体是否可见（没有图层的实体视为可见）
    pub fn is_visible(&self, entity: &EntityRecord) -> bool {
        self.layer_of(entity).map_or(true, |layer| layer.visible)
    }

    /// 实体的世界矩阵（无变换组件时为单位矩阵）
    pub fn world_matrix(&self, entity: &EntityRecord) -> Matrix4<f64> {
        self.transform_of(entity)
            .map(TransformComponent::matrix)
            .unwrap_or_else(Matrix4::identity)
    }

    /// 实体的世界包围盒
    ///
    /// 优先使用几何组件上的局部包围盒，其次是网格资源的包围盒；
    /// 没有几何或无法解析包围盒时返回 `None`。
    pub fn world_bounds(&self, entity: &EntityRecord) -> Option<Aabb> {
        let geometry = self.geometry_of(entity)?;
        let local = geometry.local_bounds.or_else(|| {
            self.assets
                .meshes
                .get(&geometry.mesh)
                .and_then(|mesh| mesh.bounds)
        })?;
        Some(local.transformed(&self.world_matrix(entity)))
    }

    /// 网格资源是否仍被任何几何组件引用
    pub fn mesh_is_referenced(&self, mesh: &AssetId) -> bool {
        self.components.geometries.values().any(|g| &g.mesh == mesh)
    }

    /// 组件ID是否仍被任何实体引用
    pub fn component_is_referenced(&self, component: &ComponentId) -> bool {
        self.entities
            .iter()
            .any(|e| e.components.ids().any(|id| id == component))
    }

    /// 内容相等（忽略 `updated_at`）
    pub fn same_content(&self, other: &SceneGraph) -> bool {
        self.schema_version == other.schema_version
            && self.metadata.name == other.metadata.name
            && self.metadata.unit == other.metadata.unit
            && self.metadata.up_axis == other.metadata.up_axis
            && self.metadata.created_at == other.metadata.created_at
            && self.entities == other.entities
            && self.components == other.components
            && self.assets == other.assets
    }

    /// 检查引用完整性：没有悬空组件引用，没有悬空网格引用，没有无人引用的网格
    pub fn check_references(&self) -> Result<(), String> {
        for entity in &self.entities {
            let refs = &entity.components;
            let table = &self.components;
            let dangling = [
                ("transform", refs.transform.as_ref().filter(|id| !table.transforms.contains_key(*id))),
                ("geometry", refs.geometry.as_ref().filter(|id| !table.geometries.contains_key(*id))),
                ("material", refs.material.as_ref().filter(|id| !table.materials.contains_key(*id))),
                ("layer", refs.layer.as_ref().filter(|id| !table.layers.contains_key(*id))),
                ("metadata", refs.metadata.as_ref().filter(|id| !table.metadata.contains_key(*id))),
            ];
            if let Some((kind, Some(id))) = dangling.iter().find(|(_, id)| id.is_some()) {
                return Err(format!("entity {} has dangling {kind} reference {id}", entity.id));
            }
        }

        for (id, geometry) in &self.components.geometries {
            if !self.assets.meshes.contains_key(&geometry.mesh) {
                return Err(format!("geometry {id} references missing mesh {}", geometry.mesh));
            }
        }

        for id in self.assets.meshes.keys() {
            if !self.mesh_is_referenced(id) {
                return Err(format!("mesh {id} is not referenced by any geometry"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_scene_defaults() {
        let now = Utc::now();
        let scene = SceneGraph::empty(now);
        assert_eq!(scene.schema_version, SCHEMA_VERSION);
        assert_eq!(scene.metadata.up_axis, Axis::Z);
        assert_eq!(scene.metadata.unit, Unit::Mm);
        assert_eq!(scene.entity_count(), 0);
        assert!(scene.check_references().is_ok());
    }

    #[test]
    fn test_mesh_source_from_uri() {
        assert_eq!(MeshSource::from_uri("primitive:line"), Some(MeshSource::Line));
        assert_eq!(MeshSource::from_uri("primitive:extrude#v2"), Some(MeshSource::Extrude));
        assert_eq!(MeshSource::from_uri("primitive:torus"), None);
        assert_eq!(MeshSource::from_uri("file:///a.stl"), None);
    }

    #[test]
    fn test_index_format_for_vertex_count() {
        assert_eq!(IndexFormat::for_vertex_count(4), IndexFormat::Uint16);
        assert_eq!(IndexFormat::for_vertex_count(65_536), IndexFormat::Uint16);
        assert_eq!(IndexFormat::for_vertex_count(65_537), IndexFormat::Uint32);
    }

    #[test]
    fn test_identity_transform() {
        let t = TransformComponent::default();
        assert_eq!(t.position, Vec3::zeros());
        assert_eq!(t.scale, Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(t.matrix(), Matrix4::identity());
    }

    #[test]
    fn test_scene_serializes_camel_case() {
        let scene = SceneGraph::empty(Utc::now());
        let json = serde_json::to_value(&scene).unwrap();
        assert!(json.get("schemaVersion").is_some());
        assert_eq!(json["metadata"]["upAxis"], "z");
    }
}
