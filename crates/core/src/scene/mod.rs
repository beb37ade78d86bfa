//! Boundary with the scene graph and renderer.
//!
//! The engine never rasterizes anything itself. It talks to the outside
//! world through [`SceneGraph`] (attach/detach notifications) and
//! [`Renderer`] (one draw per pass), and mutates handles through
//! [`SceneNode`]. [`MeshNode`] is a renderer-agnostic handle type and the
//! [`headless`] module provides in-memory collaborators.

pub mod headless;
mod node;
mod resources;

use serde::{Deserialize, Serialize};

pub use node::{Light, LightKind, MeshNode, NodeKind};
pub use resources::{
    Color, Geometry, GpuResource, Material, MaterialKind, MaterialSlot, ShaderMaterial, Shape,
};

use crate::props::{ObjectId, PropertyBag, Vec3};
use crate::registry::Registry;
use crate::Result;

/// Capability of releasing GPU-side buffers owned by a handle.
pub trait Disposable {
    fn dispose(&mut self);
    fn is_disposed(&self) -> bool;
}

/// Live scene-graph object backing a declared visual object.
pub trait SceneNode {
    fn set_position(&mut self, position: Vec3);
    fn set_rotation(&mut self, rotation: Vec3);
    fn set_scale(&mut self, scale: Vec3);
    fn set_visible(&mut self, visible: bool);
    fn is_visible(&self) -> bool;

    /// Applies the optional `opacity` field. Nodes without materials ignore it.
    fn set_opacity(&mut self, _opacity: f32) {}

    /// Handles that own disposable resources expose them here; removal and
    /// rebuilds dispose through this capability.
    fn as_disposable(&mut self) -> Option<&mut dyn Disposable> {
        None
    }
}

/// Handle types that can be assembled from a geometry and a material,
/// enabling the geometry + material creation strategy.
pub trait FromMesh: Sized {
    fn from_mesh(geometry: Geometry, material: MaterialSlot) -> Self;
}

/// Scene graph collaborator. The registry owns every handle; the scene only
/// learns which ids are attached so it can keep its own draw bookkeeping.
pub trait SceneGraph<N> {
    fn add_node(&mut self, id: &ObjectId, node: &N);
    fn remove_node(&mut self, id: &ObjectId, node: &N);
}

/// Renderer collaborator, invoked once per executed pass.
pub trait Renderer<N> {
    fn draw(&mut self, camera: &Camera, scene: &SceneView<'_, N>) -> Result<()>;

    fn resize(&mut self, _width: u32, _height: u32) {}

    fn set_clear_color(&mut self, _color: Color) {}
}

/// Read-only view over the live handles of a registry, in registration
/// order.
pub struct SceneView<'a, N> {
    registry: &'a Registry<N>,
}

impl<N> Clone for SceneView<'_, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<N> Copy for SceneView<'_, N> {}

impl<'a, N: SceneNode + 'static> SceneView<'a, N> {
    pub fn new(registry: &'a Registry<N>) -> Self {
        Self { registry }
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&'a ObjectId, &'a N)> + 'a {
        self.registry.handles()
    }

    /// Live handle for `id`, if it has one and is part of this view.
    pub fn get(&self, id: &ObjectId) -> Option<&'a N> {
        self.registry.handle(id)
    }

    pub fn props(&self, id: &ObjectId) -> Option<&'a PropertyBag> {
        self.registry.props(id)
    }

    pub fn visible_nodes(&self) -> impl Iterator<Item = (&'a ObjectId, &'a N)> + 'a {
        self.registry.handles().filter(|(_, node)| node.is_visible())
    }

    pub fn len(&self) -> usize {
        self.nodes().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Perspective camera settings as accepted from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraOptions {
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for CameraOptions {
    fn default() -> Self {
        Self {
            fov: 75.0,
            near: 0.1,
            far: 1000.0,
            x: 0.0,
            y: 0.0,
            z: 5.0,
        }
    }
}

/// Perspective camera handed to callbacks and the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub aspect: f32,
    pub position: Vec3,
}

impl Camera {
    pub fn new(options: &CameraOptions, width: u32, height: u32) -> Self {
        let mut camera = Self {
            fov: options.fov,
            near: options.near,
            far: options.far,
            aspect: 1.0,
            position: Vec3::ZERO,
        };
        camera.apply_options(options);
        camera.resize(width, height);
        camera
    }

    pub fn apply_options(&mut self, options: &CameraOptions) {
        self.fov = options.fov;
        self.near = options.near;
        self.far = options.far;
        self.position = Vec3::new(options.x, options.y, options.z);
    }

    /// Updates the aspect ratio. Zero-sized surfaces keep the previous one.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(&CameraOptions::default(), 1, 1)
    }
}

/// Writes the nine transform fields and the optional opacity onto `node`.
pub(crate) fn apply_transform<N: SceneNode>(node: &mut N, props: &PropertyBag) {
    let transform = props.transform();
    node.set_position(transform.position);
    node.set_scale(transform.scale);
    node.set_rotation(transform.rotation);
    if let Some(opacity) = props.number(crate::props::fields::OPACITY) {
        node.set_opacity(opacity as f32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_tracks_options_and_aspect() {
        let mut camera = Camera::new(&CameraOptions::default(), 1920, 1080);
        assert!((camera.aspect - 16.0 / 9.0).abs() < 1e-6);
        assert_eq!(camera.position, Vec3::new(0.0, 0.0, 5.0));

        camera.resize(0, 100);
        assert!((camera.aspect - 16.0 / 9.0).abs() < 1e-6);

        camera.apply_options(&CameraOptions {
            fov: 50.0,
            z: 10.0,
            ..CameraOptions::default()
        });
        assert_eq!(camera.fov, 50.0);
        assert_eq!(camera.position.z, 10.0);
    }
}
