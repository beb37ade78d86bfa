use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::assets::PooledMaterial;
use crate::scene::Disposable;
use crate::{Result, VisualiserError};

/// Dispose flag for a GPU-side buffer. Clones observe the same flag, so a
/// clone taken before handing the resource to a node sees it disposed.
#[derive(Debug, Clone, Default)]
pub struct GpuResource {
    disposed: Rc<Cell<bool>>,
}

impl GpuResource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispose(&self) {
        self.disposed.set(true);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

/// RGB colour with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Parses `#rrggbb`/`#rgb`, falling back to `fallback` for anything else.
    pub fn parse_or(value: &str, fallback: Color) -> Color {
        value.parse().unwrap_or(fallback)
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl FromStr for Color {
    type Err = VisualiserError;

    fn from_str(value: &str) -> Result<Self> {
        let hex = value.trim().trim_start_matches('#');
        let invalid = || VisualiserError::configuration(format!("invalid colour `{value}`"));
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return Err(invalid()),
        };
        let channel = |range: std::ops::Range<usize>| {
            expanded
                .get(range)
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .map(|byte| f32::from(byte) / 255.0)
                .ok_or_else(invalid)
        };
        Ok(Color::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        write!(f, "#{:02x}{:02x}{:02x}", byte(self.r), byte(self.g), byte(self.b))
    }
}

/// Primitive shapes a geometry can describe.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Box { width: f32, height: f32, depth: f32 },
    Sphere { radius: f32, width_segments: u32, height_segments: u32 },
    Plane { width: f32, height: f32, segments: u32 },
    Cylinder { radius_top: f32, radius_bottom: f32, height: f32, segments: u32 },
    /// Arbitrary vertex data uploaded by the caller.
    Custom { positions: Vec<[f32; 3]> },
}

/// Vertex buffer description owned by a mesh.
#[derive(Debug, Clone)]
pub struct Geometry {
    shape: Shape,
    resource: GpuResource,
}

impl Geometry {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            resource: GpuResource::new(),
        }
    }

    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        Self::new(Shape::Box { width, height, depth })
    }

    pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> Self {
        Self::new(Shape::Sphere {
            radius,
            width_segments,
            height_segments,
        })
    }

    pub fn plane(width: f32, height: f32, segments: u32) -> Self {
        Self::new(Shape::Plane {
            width,
            height,
            segments,
        })
    }

    pub fn cylinder(radius_top: f32, radius_bottom: f32, height: f32, segments: u32) -> Self {
        Self::new(Shape::Cylinder {
            radius_top,
            radius_bottom,
            height,
            segments,
        })
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn shape_mut(&mut self) -> &mut Shape {
        &mut self.shape
    }

    /// Clone of the dispose flag, for observing disposal after hand-off.
    pub fn resource(&self) -> GpuResource {
        self.resource.clone()
    }
}

impl Disposable for Geometry {
    fn dispose(&mut self) {
        self.resource.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.resource.is_disposed()
    }
}

/// Custom shader program and its scalar uniforms.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShaderMaterial {
    pub vertex: String,
    pub fragment: String,
    pub uniforms: BTreeMap<String, f32>,
}

impl ShaderMaterial {
    pub const OPACITY_UNIFORM: &'static str = "u_opacity";

    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
            uniforms: BTreeMap::new(),
        }
    }

    pub fn with_uniform(mut self, name: impl Into<String>, value: f32) -> Self {
        self.uniforms.insert(name.into(), value);
        self
    }

    pub fn uniform(&self, name: &str) -> Option<f32> {
        self.uniforms.get(name).copied()
    }

    pub fn set_uniform(&mut self, name: &str, value: f32) {
        self.uniforms.insert(name.to_string(), value);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MaterialKind {
    /// Lit material.
    Standard { color: Color },
    /// Unlit flat colour.
    Basic { color: Color },
    Shader(ShaderMaterial),
}

/// Surface description owned by a mesh.
#[derive(Debug, Clone)]
pub struct Material {
    kind: MaterialKind,
    opacity: f32,
    transparent: bool,
    resource: GpuResource,
}

impl Material {
    pub fn new(kind: MaterialKind) -> Self {
        Self {
            kind,
            opacity: 1.0,
            transparent: false,
            resource: GpuResource::new(),
        }
    }

    pub fn standard(color: Color) -> Self {
        Self::new(MaterialKind::Standard { color })
    }

    pub fn basic(color: Color) -> Self {
        Self::new(MaterialKind::Basic { color })
    }

    /// Shader materials get an opacity uniform so the transform step can
    /// fade them like any other material.
    pub fn shader(shader: ShaderMaterial) -> Self {
        let mut material = Self::new(MaterialKind::Shader(shader));
        material.set_opacity(1.0);
        material
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.set_opacity(opacity);
        self
    }

    pub fn kind(&self) -> &MaterialKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut MaterialKind {
        &mut self.kind
    }

    pub fn shader_mut(&mut self) -> Option<&mut ShaderMaterial> {
        match &mut self.kind {
            MaterialKind::Shader(shader) => Some(shader),
            _ => None,
        }
    }

    pub fn color(&self) -> Option<Color> {
        match self.kind {
            MaterialKind::Standard { color } | MaterialKind::Basic { color } => Some(color),
            MaterialKind::Shader(_) => None,
        }
    }

    pub fn set_color(&mut self, new_color: Color) {
        if let MaterialKind::Standard { color } | MaterialKind::Basic { color } = &mut self.kind {
            *color = new_color;
        }
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity;
        match &mut self.kind {
            MaterialKind::Shader(shader) => {
                shader.set_uniform(ShaderMaterial::OPACITY_UNIFORM, opacity);
                self.transparent = true;
            }
            _ => self.transparent = opacity < 1.0,
        }
    }

    pub fn resource(&self) -> GpuResource {
        self.resource.clone()
    }
}

impl Disposable for Material {
    fn dispose(&mut self) {
        self.resource.dispose();
    }

    fn is_disposed(&self) -> bool {
        self.resource.is_disposed()
    }
}

/// A mesh either owns its material or holds a share of a pooled one.
#[derive(Debug)]
pub enum MaterialSlot {
    Owned(Material),
    Pooled(PooledMaterial),
}

impl MaterialSlot {
    /// Runs `f` against the material, whichever way it is held.
    pub fn with<T>(&self, f: impl FnOnce(&Material) -> T) -> T {
        match self {
            MaterialSlot::Owned(material) => f(material),
            MaterialSlot::Pooled(pooled) => pooled.with(f),
        }
    }

    pub fn with_mut<T>(&mut self, f: impl FnOnce(&mut Material) -> T) -> T {
        match self {
            MaterialSlot::Owned(material) => f(material),
            MaterialSlot::Pooled(pooled) => pooled.with_mut(f),
        }
    }
}

impl From<Material> for MaterialSlot {
    fn from(material: Material) -> Self {
        MaterialSlot::Owned(material)
    }
}

impl From<PooledMaterial> for MaterialSlot {
    fn from(material: PooledMaterial) -> Self {
        MaterialSlot::Pooled(material)
    }
}

impl Disposable for MaterialSlot {
    /// Owned materials are disposed outright; pooled ones only release this
    /// share.
    fn dispose(&mut self) {
        match self {
            MaterialSlot::Owned(material) => material.dispose(),
            MaterialSlot::Pooled(pooled) => pooled.release(),
        }
    }

    fn is_disposed(&self) -> bool {
        match self {
            MaterialSlot::Owned(material) => material.is_disposed(),
            MaterialSlot::Pooled(pooled) => pooled.is_released(),
        }
    }
}
