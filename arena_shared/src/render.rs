//! Rendering abstraction.
//!
//! This crate intentionally does not depend on a graphics backend.
//! The client hands each frame's predicted entities to a [`RenderBackend`];
//! sprites, labels and health bars live on the other side of this trait.

use crate::{
    entity::{EntityId, EntityState},
    math::Vec2,
};

/// Per-frame view of one entity, after prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEntity {
    pub id: EntityId,
    pub name: String,
    pub color: u32,
    pub position: Vec2,
    /// Sprite faces left.
    pub flip_x: bool,
    pub state: EntityState,
    pub hp: i32,
    pub max_hp: i32,
    /// Draw order; lower y is further back.
    pub depth: f32,
    pub is_local: bool,
}

/// A minimal rendering API.
pub trait RenderBackend: Send {
    fn begin_frame(&mut self);
    fn draw_entity(&mut self, entity: &RenderedEntity);
    fn end_frame(&mut self);
}

/// A no-op renderer useful for headless runs and tests.
#[derive(Default)]
pub struct NullRenderer;

impl RenderBackend for NullRenderer {
    fn begin_frame(&mut self) {}
    fn draw_entity(&mut self, _entity: &RenderedEntity) {}
    fn end_frame(&mut self) {}
}
