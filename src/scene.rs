//! The presentation scene: a hecs world holding the sprite that shows the
//! shader output.
//!
//! # Example
//!
//! ```ignore
//! let mut scene = Scene::new();
//! let sprite = scene.spawn_sprite(
//!     "Sprite_01",
//!     RectTransform::cover(800, 600),
//!     Sprite::new(compositor.output().clone()),
//! );
//! scene.computations(dt);
//! ```

use std::rc::Rc;

use glam::Vec2;
use hecs::{Entity, World};

use crate::render_graph::Attachment;

/// An RGBA color with components in `0.0..=1.0`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);

    /// Viewer background.
    pub const BACKGROUND: Color = Color::rgb(0.3, 0.3, 0.3);

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn to_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: self.r as f64,
            g: self.g as f64,
            b: self.b as f64,
            a: self.a as f64,
        }
    }
}

/// Debug name of an entity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Name(pub String);

/// Axis-aligned rectangle in world units. `translation` is the bottom-left
/// corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RectTransform {
    pub translation: Vec2,
    pub dimensions: Vec2,
}

impl RectTransform {
    pub fn new(translation: Vec2, dimensions: Vec2) -> Self {
        Self {
            translation,
            dimensions,
        }
    }

    /// A `width`×`height` rectangle centered on the origin.
    pub fn cover(width: u32, height: u32) -> Self {
        let dimensions = Vec2::new(width as f32, height as f32);
        Self::new(-dimensions * 0.5, dimensions)
    }

    pub fn min(&self) -> Vec2 {
        self.translation
    }

    pub fn max(&self) -> Vec2 {
        self.translation + self.dimensions
    }
}

/// A textured quad.
#[derive(Clone, Debug)]
pub struct Sprite {
    /// Sampled texture; `None` draws nothing.
    pub texture: Option<Rc<Attachment>>,
    pub tint: Color,
}

impl Sprite {
    pub fn new(texture: Rc<Attachment>) -> Self {
        Self {
            texture: Some(texture),
            tint: Color::WHITE,
        }
    }
}

/// Vertex for sprite rendering.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex2d {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

/// Two triangles covering `rect`.
///
/// Texture row 0 is mapped to the top edge, so an image rendered with a
/// bottom-left pixel origin appears upright.
pub fn sprite_vertices(rect: &RectTransform, tint: Color) -> [Vertex2d; 6] {
    let (min, max) = (rect.min(), rect.max());
    let color = tint.to_array();
    let v = |x: f32, y: f32, u: f32, v: f32| Vertex2d {
        position: [x, y],
        uv: [u, v],
        color,
    };
    [
        v(min.x, min.y, 0.0, 1.0),
        v(max.x, min.y, 1.0, 1.0),
        v(min.x, max.y, 0.0, 0.0),
        v(max.x, min.y, 1.0, 1.0),
        v(max.x, max.y, 1.0, 0.0),
        v(min.x, max.y, 0.0, 0.0),
    ]
}

/// A sprite ready to draw.
pub struct SpriteQuad {
    pub texture: Rc<Attachment>,
    pub vertices: [Vertex2d; 6],
}

/// The scene world plus its clock.
pub struct Scene {
    world: World,
    time: f32,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            world: World::new(),
            time: 0.0,
        }
    }

    pub fn spawn_sprite(&mut self, name: &str, rect: RectTransform, sprite: Sprite) -> Entity {
        self.world.spawn((Name(name.to_string()), rect, sprite))
    }

    /// Advance the scene by `dt` seconds.
    pub fn computations(&mut self, dt: f32) {
        self.time += dt;
    }

    /// Seconds of scene time elapsed.
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Overwrite the rect of `entity`. Returns `false` if it has none.
    pub fn set_rect(&mut self, entity: Entity, rect: RectTransform) -> bool {
        match self.world.get::<&mut RectTransform>(entity) {
            Ok(mut current) => {
                *current = rect;
                true
            }
            Err(_) => false,
        }
    }

    /// Point the sprite of `entity` at a new texture. Returns `false` if it
    /// has no sprite.
    pub fn set_texture(&mut self, entity: Entity, texture: Rc<Attachment>) -> bool {
        match self.world.get::<&mut Sprite>(entity) {
            Ok(mut sprite) => {
                sprite.texture = Some(texture);
                true
            }
            Err(_) => false,
        }
    }

    /// Every textured sprite, ready to draw.
    pub fn quads(&self) -> Vec<SpriteQuad> {
        let mut query = self.world.query::<(&RectTransform, &Sprite)>();
        query
            .iter()
            .filter_map(|(_, (rect, sprite))| {
                sprite.texture.as_ref().map(|texture| SpriteQuad {
                    texture: texture.clone(),
                    vertices: sprite_vertices(rect, sprite.tint),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cover_centers_rect_on_origin() {
        let rect = RectTransform::cover(800, 600);
        assert_eq!(rect.translation, Vec2::new(-400.0, -300.0));
        assert_eq!(rect.dimensions, Vec2::new(800.0, 600.0));
        assert_eq!(rect.min(), Vec2::new(-400.0, -300.0));
        assert_eq!(rect.max(), Vec2::new(400.0, 300.0));
    }

    #[test]
    fn sprite_vertices_span_rect() {
        let rect = RectTransform::cover(2, 4);
        let vertices = sprite_vertices(&rect, Color::WHITE);
        for vertex in &vertices {
            assert!(vertex.position[0] == -1.0 || vertex.position[0] == 1.0);
            assert!(vertex.position[1] == -2.0 || vertex.position[1] == 2.0);
            assert_eq!(vertex.color, [1.0; 4]);
        }
        // bottom-left samples the last texture row
        assert_eq!(vertices[0].position, [-1.0, -2.0]);
        assert_eq!(vertices[0].uv, [0.0, 1.0]);
        assert_eq!(vertices[4].position, [1.0, 2.0]);
        assert_eq!(vertices[4].uv, [1.0, 0.0]);
    }

    #[test]
    fn computations_advance_time() {
        let mut scene = Scene::new();
        scene.computations(0.25);
        scene.computations(0.5);
        assert_eq!(scene.time(), 0.75);
    }

    fn rect_of(scene: &Scene, entity: Entity) -> Option<RectTransform> {
        scene
            .world
            .get::<&RectTransform>(entity)
            .ok()
            .map(|rect| *rect)
    }

    #[test]
    fn set_rect_updates_component() {
        let mut scene = Scene::new();
        let entity = scene.world.spawn((Name("quad".into()), RectTransform::cover(1, 1)));

        assert!(scene.set_rect(entity, RectTransform::cover(10, 20)));
        assert_eq!(rect_of(&scene, entity), Some(RectTransform::cover(10, 20)));
    }

    #[test]
    fn entities_without_sprites_are_not_drawn() {
        let mut scene = Scene::new();
        let entity = scene.world.spawn((RectTransform::cover(4, 4),));
        assert!(scene.quads().is_empty());

        let name = scene.world.spawn((Name("label".into()),));
        assert!(!scene.set_rect(name, RectTransform::cover(1, 1)));
        assert_eq!(rect_of(&scene, entity), Some(RectTransform::cover(4, 4)));
    }
}
