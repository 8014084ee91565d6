//! 命令执行器
//!
//! `apply(scene, command, ctx)` 生成新的场景快照和撤销描述，
//! `undo(scene, descriptor, ctx)` 应用撤销描述恢复之前的快照。
//!
//! 执行是原子的：校验失败时返回错误，输入快照保持不变，也不会消耗标识符。
//! 对不存在实体的变换/删除不是错误，逐个跳过；若整体没有产生任何变化，
//! 返回原快照（同一个 `Arc`）和空的撤销描述，调用方不应记录这条历史。

use crate::clock::Clock;
use crate::command::{Command, CommandError, MATRIX_LEN};
use crate::id::{AssetId, ComponentId, EntityId, IdFactory};
use crate::math::{is_finite_vec, Vec3};
use crate::primitive::{Primitive, MIN_CIRCLE_SEGMENTS};
use crate::scene::{
    ComponentRefs, ComponentTable, EntityRecord, GeometryComponent, IndexFormat, MaterialComponent,
    MeshAsset, MetadataComponent, SceneGraph, TransformComponent, VertexLayout,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// 命令执行上下文
pub struct CommandContext<'a> {
    pub ids: &'a mut IdFactory,
    pub clock: &'a dyn Clock,
}

impl<'a> CommandContext<'a> {
    pub fn new(ids: &'a mut IdFactory, clock: &'a dyn Clock) -> Self {
        Self { ids, clock }
    }
}

/// 由创建类命令（绘制、拉伸）产生的记录
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedRecord {
    pub entity: EntityId,
    pub components: ComponentRefs,
    pub mesh: AssetId,
}

/// 变换前的值
#[derive(Debug, Clone, PartialEq)]
pub struct TransformRestore {
    pub entity: EntityId,
    pub component: ComponentId,
    pub previous: TransformComponent,
}

/// 删除时捕获的内容
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedRecord {
    /// (原始下标, 实体)，按下标升序
    pub entities: Vec<(usize, EntityRecord)>,
    /// 实际被移除的组件
    pub components: ComponentTable,
    /// 实际被移除的网格资源
    pub meshes: Vec<MeshAsset>,
}

/// 撤销描述
#[derive(Debug, Clone, PartialEq)]
pub enum UndoDescriptor {
    /// 移除创建的实体、组件和网格
    RemoveCreated(CreatedRecord),
    /// 恢复变换组件
    RestoreTransforms(Vec<TransformRestore>),
    /// 恢复被删除的实体、组件和网格
    RestoreDeleted(DeletedRecord),
}

/// apply 的结果
#[derive(Debug, Clone)]
pub struct Applied {
    pub scene: Arc<SceneGraph>,
    /// `None` 表示命令没有产生任何变化
    pub undo: Option<UndoDescriptor>,
}

impl Applied {
    fn noop(scene: &Arc<SceneGraph>) -> Self {
        Self {
            scene: Arc::clone(scene),
            undo: None,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.undo.is_none()
    }
}

/// 执行命令
pub fn apply(
    scene: &Arc<SceneGraph>,
    command: &Command,
    ctx: &mut CommandContext<'_>,
) -> Result<Applied, CommandError> {
    let applied = match command {
        Command::DrawLine { start, end } => {
            require_finite("start", start)?;
            require_finite("end", end)?;
            create(
                scene,
                Primitive::Line {
                    start: *start,
                    end: *end,
                },
                TransformComponent::identity(),
                ctx,
            )?
        }
        Command::DrawRect {
            center,
            width,
            height,
        } => {
            require_finite("center", center)?;
            require_positive("width", *width)?;
            require_positive("height", *height)?;
            create(
                scene,
                Primitive::Rect {
                    center: *center,
                    width: *width,
                    height: *height,
                },
                TransformComponent::identity(),
                ctx,
            )?
        }
        Command::DrawCircle {
            center,
            radius,
            segments,
        } => {
            require_finite("center", center)?;
            require_positive("radius", *radius)?;
            if *segments < MIN_CIRCLE_SEGMENTS {
                return Err(CommandError::TooFewSegments {
                    segments: *segments,
                    min: MIN_CIRCLE_SEGMENTS,
                });
            }
            create(
                scene,
                Primitive::Circle {
                    center: *center,
                    radius: *radius,
                    segments: *segments,
                },
                TransformComponent::identity(),
                ctx,
            )?
        }
        Command::Extrude {
            profile_entity_id,
            height,
        } => extrude(scene, profile_entity_id, *height, ctx)?,
        Command::Transform { entity_ids, matrix } => transform(scene, entity_ids, matrix, ctx)?,
        Command::Delete { entity_ids } => delete(scene, entity_ids, ctx),
    };

    if applied.is_noop() {
        debug!("{} had no effect", command.name());
    } else {
        debug!(
            "Applied {} ({} entities, {} meshes)",
            command.name(),
            applied.scene.entity_count(),
            applied.scene.assets.meshes.len()
        );
    }

    Ok(applied)
}

/// 应用撤销描述
pub fn undo(
    scene: &Arc<SceneGraph>,
    descriptor: &UndoDescriptor,
    ctx: &CommandContext<'_>,
) -> Arc<SceneGraph> {
    let mut next = (**scene).clone();

    match descriptor {
        UndoDescriptor::RemoveCreated(record) => {
            next.entities.retain(|e| e.id != record.entity);
            let refs = &record.components;
            let table = &mut next.components;
            if let Some(id) = &refs.transform {
                table.transforms.remove(id);
            }
            if let Some(id) = &refs.geometry {
                table.geometries.remove(id);
            }
            if let Some(id) = &refs.material {
                table.materials.remove(id);
            }
            if let Some(id) = &refs.layer {
                table.layers.remove(id);
            }
            if let Some(id) = &refs.metadata {
                table.metadata.remove(id);
            }
            if !next.mesh_is_referenced(&record.mesh) {
                next.assets.meshes.remove(&record.mesh);
            }
        }
        UndoDescriptor::RestoreTransforms(restores) => {
            for restore in restores {
                if let Some(t) = next.components.transforms.get_mut(&restore.component) {
                    *t = restore.previous;
                }
            }
        }
        UndoDescriptor::RestoreDeleted(record) => {
            let saved = &record.components;
            let table = &mut next.components;
            table
                .transforms
                .extend(saved.transforms.iter().map(|(k, v)| (k.clone(), *v)));
            table
                .geometries
                .extend(saved.geometries.iter().map(|(k, v)| (k.clone(), v.clone())));
            table
                .materials
                .extend(saved.materials.iter().map(|(k, v)| (k.clone(), *v)));
            table
                .layers
                .extend(saved.layers.iter().map(|(k, v)| (k.clone(), v.clone())));
            table
                .metadata
                .extend(saved.metadata.iter().map(|(k, v)| (k.clone(), v.clone())));

            for mesh in &record.meshes {
                next.assets.meshes.insert(mesh.id.clone(), mesh.clone());
            }

            // 按原始下标升序插回，恢复原来的顺序
            for (index, entity) in &record.entities {
                let at = (*index).min(next.entities.len());
                next.entities.insert(at, entity.clone());
            }
        }
    }

    next.metadata.updated_at = ctx.clock.now();
    Arc::new(next)
}

fn require_finite(field: &'static str, v: &Vec3) -> Result<(), CommandError> {
    if is_finite_vec(v) {
        Ok(())
    } else {
        Err(CommandError::InvalidVector { field })
    }
}

fn require_positive(field: &'static str, value: f64) -> Result<(), CommandError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CommandError::NonPositiveDimension { field, value })
    }
}

/// 创建带变换、几何、材质、元数据四个组件和一个网格资源的实体
///
/// 网格计数在消耗任何标识符之前校验。
fn create(
    scene: &SceneGraph,
    primitive: Primitive,
    transform: TransformComponent,
    ctx: &mut CommandContext<'_>,
) -> Result<Applied, CommandError> {
    let (Some(vertex_count), Some(index_count)) = (primitive.vertex_count(), primitive.index_count()) else {
        return Err(CommandError::TooManySegments {
            segments: primitive.segments().unwrap_or_default(),
        });
    };

    let entity_id = ctx.ids.next_entity();
    let transform_id = ctx.ids.next_component();
    let geometry_id = ctx.ids.next_component();
    let material_id = ctx.ids.next_component();
    let metadata_id = ctx.ids.next_component();
    let mesh_id = ctx.ids.next_asset();

    let topology = primitive.topology();
    let mesh = MeshAsset {
        id: mesh_id.clone(),
        name: Some(format!("{} mesh", primitive.name())),
        vertex_count,
        index_count,
        index_format: IndexFormat::for_vertex_count(vertex_count),
        topology,
        layout: VertexLayout::positions_only(),
        source_uri: Some(primitive.mesh_source().uri().to_string()),
        bounds: Some(primitive.local_bounds()),
    };

    let refs = ComponentRefs {
        transform: Some(transform_id.clone()),
        geometry: Some(geometry_id.clone()),
        material: Some(material_id.clone()),
        layer: None,
        metadata: Some(metadata_id.clone()),
    };

    let mut next = scene.clone();
    next.components.transforms.insert(transform_id, transform);
    next.components.geometries.insert(
        geometry_id,
        GeometryComponent {
            mesh: mesh_id.clone(),
            topology,
            local_bounds: None,
        },
    );
    next.components
        .materials
        .insert(material_id, MaterialComponent::default());
    next.entities.push(EntityRecord {
        id: entity_id.clone(),
        name: Some(primitive.name().to_string()),
        components: refs.clone(),
    });
    next.components
        .metadata
        .insert(metadata_id, MetadataComponent::for_primitive(primitive));
    next.assets.meshes.insert(mesh_id.clone(), mesh);
    next.metadata.updated_at = ctx.clock.now();

    Ok(Applied {
        scene: Arc::new(next),
        undo: Some(UndoDescriptor::RemoveCreated(CreatedRecord {
            entity: entity_id,
            components: refs,
            mesh: mesh_id,
        })),
    })
}

fn extrude(
    scene: &Arc<SceneGraph>,
    profile_entity_id: &EntityId,
    height: f64,
    ctx: &mut CommandContext<'_>,
) -> Result<Applied, CommandError> {
    if !(height.is_finite() && height > 0.0) {
        return Err(CommandError::InvalidHeight(height));
    }

    let profile_entity = scene
        .entity(profile_entity_id)
        .ok_or_else(|| CommandError::ProfileNotFound(profile_entity_id.clone()))?;
    let primitive = scene
        .primitive_of(profile_entity)
        .ok_or_else(|| CommandError::UnsupportedProfile("none".to_string()))?;
    let profile = primitive
        .as_profile()
        .ok_or_else(|| CommandError::UnsupportedProfile(primitive.name().to_string()))?;

    // 拉伸体沿用轮廓的变换，保证轮廓移动后仍然对齐
    let transform = scene
        .transform_of(profile_entity)
        .copied()
        .unwrap_or_default();

    create(
        scene,
        Primitive::Extrude {
            profile,
            profile_entity: profile_entity_id.clone(),
            height,
        },
        transform,
        ctx,
    )
}

fn transform(
    scene: &Arc<SceneGraph>,
    entity_ids: &[EntityId],
    matrix: &[f64],
    ctx: &mut CommandContext<'_>,
) -> Result<Applied, CommandError> {
    if matrix.len() < MATRIX_LEN {
        return Err(CommandError::InvalidMatrix { len: matrix.len() });
    }
    let translation = Vec3::new(matrix[12], matrix[13], matrix[14]);
    if !is_finite_vec(&translation) {
        return Err(CommandError::InvalidMatrix { len: matrix.len() });
    }

    let mut seen = HashSet::new();
    let mut restores = Vec::new();
    for id in entity_ids {
        let Some(entity) = scene.entity(id) else {
            continue;
        };
        let Some(component) = entity.components.transform.as_ref() else {
            continue;
        };
        let Some(current) = scene.components.transforms.get(component) else {
            continue;
        };
        if current.position == translation || !seen.insert(component.clone()) {
            continue;
        }
        restores.push(TransformRestore {
            entity: id.clone(),
            component: component.clone(),
            previous: *current,
        });
    }

    if restores.is_empty() {
        return Ok(Applied::noop(scene));
    }

    let mut next = (**scene).clone();
    for restore in &restores {
        if let Some(t) = next.components.transforms.get_mut(&restore.component) {
            t.position = translation;
        }
    }
    next.metadata.updated_at = ctx.clock.now();

    Ok(Applied {
        scene: Arc::new(next),
        undo: Some(UndoDescriptor::RestoreTransforms(restores)),
    })
}

fn delete(scene: &Arc<SceneGraph>, entity_ids: &[EntityId], ctx: &mut CommandContext<'_>) -> Applied {
    let targets: HashSet<&EntityId> = entity_ids.iter().collect();
    let removed: Vec<(usize, EntityRecord)> = scene
        .entities
        .iter()
        .enumerate()
        .filter(|(_, e)| targets.contains(&e.id))
        .map(|(i, e)| (i, e.clone()))
        .collect();

    if removed.is_empty() {
        return Applied::noop(scene);
    }

    let mut next = (**scene).clone();
    next.entities.retain(|e| !targets.contains(&e.id));

    // 只移除不再被任何存活实体引用的组件
    let surviving: HashSet<ComponentId> = next
        .entities
        .iter()
        .flat_map(|e| e.components.ids().cloned())
        .collect();

    let mut captured = ComponentTable::default();
    for (_, record) in &removed {
        let refs = &record.components;
        let table = &mut next.components;
        take(&refs.transform, &surviving, &mut table.transforms, &mut captured.transforms);
        take(&refs.geometry, &surviving, &mut table.geometries, &mut captured.geometries);
        take(&refs.material, &surviving, &mut table.materials, &mut captured.materials);
        take(&refs.layer, &surviving, &mut table.layers, &mut captured.layers);
        take(&refs.metadata, &surviving, &mut table.metadata, &mut captured.metadata);
    }

    // 网格资源的回收需要扫描剩余的所有几何组件，共享网格不能被删除
    let mut meshes: Vec<MeshAsset> = Vec::new();
    for geometry in captured.geometries.values() {
        if meshes.iter().any(|m| m.id == geometry.mesh) || next.mesh_is_referenced(&geometry.mesh) {
            continue;
        }
        if let Some(mesh) = next.assets.meshes.remove(&geometry.mesh) {
            meshes.push(mesh);
        }
    }

    next.metadata.updated_at = ctx.clock.now();

    debug!(
        "Deleted {} entities, reclaimed {} meshes",
        removed.len(),
        meshes.len()
    );

    Applied {
        scene: Arc::new(next),
        undo: Some(UndoDescriptor::RestoreDeleted(DeletedRecord {
            entities: removed,
            components: captured,
            meshes,
        })),
    }
}

fn take<T>(
    id: &Option<ComponentId>,
    surviving: &HashSet<ComponentId>,
    from: &mut BTreeMap<ComponentId, T>,
    into: &mut BTreeMap<ComponentId, T>,
) {
    let Some(id) = id else {
        return;
    };
    if surviving.contains(id) {
        return;
    }
    if let Some(value) = from.remove(id) {
        into.insert(id.clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::id::IdKind;
    use crate::primitive::Profile;
    use crate::scene::Topology;
    use chrono::{Duration, Utc};

    struct Fixture {
        ids: IdFactory,
        clock: FixedClock,
        scene: Arc<SceneGraph>,
    }

    impl Fixture {
        fn new() -> Self {
            let clock = FixedClock::epoch();
            Self {
                ids: IdFactory::new("t"),
                clock,
                scene: Arc::new(SceneGraph::empty(clock.0)),
            }
        }

        fn apply(&mut self, command: Command) -> Result<Applied, CommandError> {
            let mut ctx = CommandContext::new(&mut self.ids, &self.clock);
            apply(&self.scene, &command, &mut ctx)
        }

        fn commit(&mut self, command: Command) -> UndoDescriptor {
            let applied = self.apply(command).unwrap();
            self.scene = applied.scene;
            applied.undo.unwrap()
        }

        fn undo(&mut self, descriptor: &UndoDescriptor) {
            let ctx = CommandContext::new(&mut self.ids, &self.clock);
            self.scene = undo(&self.scene, descriptor, &ctx);
        }
    }

    fn line(x: f64) -> Command {
        Command::DrawLine {
            start: Vec3::new(x, 0.0, 0.0),
            end: Vec3::new(x + 2.0, 0.0, 0.0),
        }
    }

    fn rect() -> Command {
        Command::DrawRect {
            center: Vec3::zeros(),
            width: 2.0,
            height: 1.0,
        }
    }

    #[test]
    fn test_draw_line_creates_entity_components_and_mesh() {
        let mut fx = Fixture::new();
        fx.commit(line(0.0));

        let scene = &fx.scene;
        assert_eq!(scene.entity_count(), 1);
        let entity = &scene.entities[0];
        assert_eq!(scene.transform_of(entity), Some(&TransformComponent::identity()));
        let mesh = scene.mesh_of(entity).unwrap();
        assert_eq!(mesh.topology, Topology::Lines);
        assert_eq!((mesh.vertex_count, mesh.index_count), (2, 2));
        assert_eq!(mesh.source_uri.as_deref(), Some("primitive:line"));
        let metadata = scene.metadata_of(entity).unwrap();
        assert_eq!(metadata.property("line.end.x").and_then(|v| v.as_f64()), Some(2.0));
        assert!(scene.check_references().is_ok());
    }

    #[test]
    fn test_every_command_round_trips_through_undo() {
        let mut fx = Fixture::new();
        fx.commit(rect());
        fx.commit(Command::DrawCircle {
            center: Vec3::new(5.0, 5.0, 0.0),
            radius: 1.0,
            segments: 16,
        });
        let rect_id = fx.scene.entities[0].id.clone();
        let circle_id = fx.scene.entities[1].id.clone();

        let commands = vec![
            line(3.0),
            rect(),
            Command::DrawCircle {
                center: Vec3::zeros(),
                radius: 2.0,
                segments: 8,
            },
            Command::Extrude {
                profile_entity_id: rect_id.clone(),
                height: 3.0,
            },
            Command::move_to(vec![circle_id.clone()], Vec3::new(5.0, 6.0, 7.0)),
            Command::Delete {
                entity_ids: vec![rect_id, circle_id],
            },
        ];

        for command in commands {
            let before = Arc::clone(&fx.scene);
            let descriptor = fx.commit(command.clone());
            fx.undo(&descriptor);
            assert!(
                fx.scene.same_content(&before),
                "{} did not round-trip",
                command.name()
            );
            assert!(fx.scene.check_references().is_ok());
        }
    }

    #[test]
    fn test_noop_commands_return_same_snapshot() {
        let mut fx = Fixture::new();
        fx.commit(line(0.0));

        let applied = fx
            .apply(Command::move_to(vec![], Vec3::new(1.0, 0.0, 0.0)))
            .unwrap();
        assert!(applied.is_noop());
        assert!(Arc::ptr_eq(&applied.scene, &fx.scene));

        let applied = fx
            .apply(Command::Delete {
                entity_ids: vec![EntityId::new("nonexistent")],
            })
            .unwrap();
        assert!(applied.is_noop());
        assert!(Arc::ptr_eq(&applied.scene, &fx.scene));
    }

    #[test]
    fn test_transform_to_same_position_is_noop() {
        let mut fx = Fixture::new();
        fx.commit(line(0.0));
        let id = fx.scene.entities[0].id.clone();
        let applied = fx.apply(Command::move_to(vec![id], Vec3::zeros())).unwrap();
        assert!(applied.is_noop());
    }

    #[test]
    fn test_transform_then_undo() {
        let mut fx = Fixture::new();
        fx.commit(line(0.0));
        let id = fx.scene.entities[0].id.clone();

        let descriptor = fx.commit(Command::move_to(
            vec![id.clone(), EntityId::new("missing")],
            Vec3::new(5.0, 6.0, 7.0),
        ));
        let entity = fx.scene.entity(&id).unwrap();
        assert_eq!(fx.scene.transform_of(entity).unwrap().position, Vec3::new(5.0, 6.0, 7.0));

        fx.undo(&descriptor);
        let entity = fx.scene.entity(&id).unwrap();
        assert_eq!(fx.scene.transform_of(entity).unwrap().position, Vec3::zeros());
    }

    #[test]
    fn test_validation_failures_leave_scene_and_ids_untouched() {
        let mut fx = Fixture::new();
        fx.commit(line(0.0));
        let before = Arc::clone(&fx.scene);
        let issued = fx.ids.issued(IdKind::Entity);

        let failures = vec![
            (
                Command::DrawLine {
                    start: Vec3::new(f64::NAN, 0.0, 0.0),
                    end: Vec3::zeros(),
                },
                CommandError::InvalidVector { field: "start" },
            ),
            (
                Command::DrawRect {
                    center: Vec3::zeros(),
                    width: 0.0,
                    height: 1.0,
                },
                CommandError::NonPositiveDimension {
                    field: "width",
                    value: 0.0,
                },
            ),
            (
                Command::DrawCircle {
                    center: Vec3::zeros(),
                    radius: 1.0,
                    segments: 2,
                },
                CommandError::TooFewSegments { segments: 2, min: 3 },
            ),
            (
                Command::DrawCircle {
                    center: Vec3::zeros(),
                    radius: 1.0,
                    segments: 3_000_000_000,
                },
                CommandError::TooManySegments {
                    segments: 3_000_000_000,
                },
            ),
            (
                Command::Transform {
                    entity_ids: vec![],
                    matrix: vec![1.0; 15],
                },
                CommandError::InvalidMatrix { len: 15 },
            ),
        ];

        for (command, expected) in failures {
            assert_eq!(fx.apply(command).unwrap_err(), expected);
        }
        assert!(Arc::ptr_eq(&before, &fx.scene));
        assert_eq!(fx.ids.issued(IdKind::Entity), issued);
    }

    #[test]
    fn test_extrude_of_huge_circle_is_rejected_before_ids() {
        let mut fx = Fixture::new();
        fx.commit(Command::DrawCircle {
            center: Vec3::zeros(),
            radius: 1.0,
            segments: 400_000_000,
        });
        let profile_id = fx.scene.entities[0].id.clone();
        let before = Arc::clone(&fx.scene);
        let components = fx.ids.issued(IdKind::Component);

        let err = fx
            .apply(Command::Extrude {
                profile_entity_id: profile_id,
                height: 1.0,
            })
            .unwrap_err();
        assert_eq!(
            err,
            CommandError::TooManySegments {
                segments: 400_000_000
            }
        );
        assert!(Arc::ptr_eq(&before, &fx.scene));
        assert_eq!(fx.ids.issued(IdKind::Entity), 1);
        assert_eq!(fx.ids.issued(IdKind::Component), components);
        assert_eq!(fx.ids.issued(IdKind::Asset), 1);
    }

    #[test]
    fn test_extrude_rejects_line_profile() {
        let mut fx = Fixture::new();
        fx.commit(line(0.0));
        let id = fx.scene.entities[0].id.clone();
        let err = fx
            .apply(Command::Extrude {
                profile_entity_id: id,
                height: 1.0,
            })
            .unwrap_err();
        assert_eq!(err, CommandError::UnsupportedProfile("line".to_string()));

        let err = fx
            .apply(Command::Extrude {
                profile_entity_id: EntityId::new("ghost"),
                height: 1.0,
            })
            .unwrap_err();
        assert!(matches!(err, CommandError::ProfileNotFound(_)));
    }

    #[test]
    fn test_extrude_records_profile_and_keeps_profile_entity() {
        let mut fx = Fixture::new();
        fx.commit(rect());
        let profile_id = fx.scene.entities[0].id.clone();
        fx.commit(Command::move_to(vec![profile_id.clone()], Vec3::new(1.0, 1.0, 0.0)));
        let descriptor = fx.commit(Command::Extrude {
            profile_entity_id: profile_id.clone(),
            height: 3.0,
        });

        assert_eq!(fx.scene.entity_count(), 2);
        let extruded = &fx.scene.entities[1];
        let mesh = fx.scene.mesh_of(extruded).unwrap();
        assert_eq!(mesh.topology, Topology::Triangles);
        assert_eq!(mesh.vertex_count, 8);
        assert_eq!(mesh.bounds.unwrap().max.z, 3.0);
        assert_eq!(
            fx.scene.transform_of(extruded).unwrap().position,
            Vec3::new(1.0, 1.0, 0.0)
        );
        match fx.scene.primitive_of(extruded) {
            Some(Primitive::Extrude { profile, .. }) => {
                assert!(matches!(profile, Profile::Rect { .. }))
            }
            other => panic!("Expected extrude primitive, got {other:?}"),
        }

        fx.undo(&descriptor);
        assert_eq!(fx.scene.entity_count(), 1);
        assert!(fx.scene.entity(&profile_id).is_some());
    }

    #[test]
    fn test_delete_keeps_shared_mesh_until_last_reference() {
        let mut fx = Fixture::new();
        fx.commit(line(0.0));
        fx.commit(line(5.0));

        // 手工让第二个实体共享第一个实体的网格
        let mut shared = (*fx.scene).clone();
        let first_mesh = shared.geometry_of(&shared.entities[0]).unwrap().mesh.clone();
        let second_geometry = shared.entities[1].components.geometry.clone().unwrap();
        let orphan = shared.components.geometries[&second_geometry].mesh.clone();
        shared.components.geometries.get_mut(&second_geometry).unwrap().mesh = first_mesh.clone();
        shared.assets.meshes.remove(&orphan);
        fx.scene = Arc::new(shared);

        let first = fx.scene.entities[0].id.clone();
        let second = fx.scene.entities[1].id.clone();

        let descriptor = fx.commit(Command::Delete {
            entity_ids: vec![first],
        });
        assert!(fx.scene.assets.meshes.contains_key(&first_mesh));
        match &descriptor {
            UndoDescriptor::RestoreDeleted(record) => assert!(record.meshes.is_empty()),
            other => panic!("Expected RestoreDeleted, got {other:?}"),
        }

        fx.commit(Command::Delete {
            entity_ids: vec![second],
        });
        assert!(fx.scene.assets.meshes.is_empty());
        assert!(fx.scene.check_references().is_ok());
    }

    #[test]
    fn test_delete_undo_restores_original_order() {
        let mut fx = Fixture::new();
        for x in [0.0, 10.0, 20.0, 30.0] {
            fx.commit(line(x));
        }
        let order: Vec<EntityId> = fx.scene.entities.iter().map(|e| e.id.clone()).collect();

        let descriptor = fx.commit(Command::Delete {
            entity_ids: vec![order[3].clone(), order[1].clone()],
        });
        assert_eq!(fx.scene.entity_count(), 2);

        fx.undo(&descriptor);
        let restored: Vec<EntityId> = fx.scene.entities.iter().map(|e| e.id.clone()).collect();
        assert_eq!(restored, order);
    }

    #[test]
    fn test_updated_at_refreshes_on_apply_and_undo() {
        let mut fx = Fixture::new();
        let created = fx.scene.metadata.created_at;
        fx.clock = FixedClock(created + Duration::seconds(10));
        let descriptor = fx.commit(line(0.0));
        assert_eq!(fx.scene.metadata.updated_at, created + Duration::seconds(10));

        fx.clock = FixedClock(Utc::now());
        fx.undo(&descriptor);
        assert_eq!(fx.scene.metadata.updated_at, fx.clock.0);
        assert_eq!(fx.scene.metadata.created_at, created);
    }
}
