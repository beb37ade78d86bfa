use crate::props::{Transform, Vec3};
use crate::scene::{Color, Disposable, FromMesh, Geometry, MaterialSlot, SceneNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Point,
    Directional,
    Ambient,
    Spot,
    Hemisphere,
}

impl LightKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "point" => Some(LightKind::Point),
            "directional" => Some(LightKind::Directional),
            "ambient" => Some(LightKind::Ambient),
            "spot" => Some(LightKind::Spot),
            "hemisphere" => Some(LightKind::Hemisphere),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Color,
    pub intensity: f32,
}

#[derive(Debug)]
pub enum NodeKind {
    Mesh { geometry: Geometry, material: MaterialSlot },
    Light(Light),
    /// Pure container; only its children draw.
    Group,
}

/// Renderer-agnostic scene node: a mesh, a light or a group, with children.
#[derive(Debug)]
pub struct MeshNode {
    kind: NodeKind,
    transform: Transform,
    visible: bool,
    opacity: f32,
    children: Vec<MeshNode>,
    disposed: bool,
}

impl MeshNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            transform: Transform::default(),
            visible: true,
            opacity: 1.0,
            children: Vec::new(),
            disposed: false,
        }
    }

    pub fn mesh(geometry: Geometry, material: impl Into<MaterialSlot>) -> Self {
        Self::new(NodeKind::Mesh {
            geometry,
            material: material.into(),
        })
    }

    pub fn light(light: Light) -> Self {
        Self::new(NodeKind::Light(light))
    }

    pub fn group(children: Vec<MeshNode>) -> Self {
        let mut node = Self::new(NodeKind::Group);
        node.children = children;
        node
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut NodeKind {
        &mut self.kind
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn children(&self) -> &[MeshNode] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<MeshNode> {
        &mut self.children
    }

    pub fn add_child(&mut self, child: MeshNode) {
        self.children.push(child);
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        match &self.kind {
            NodeKind::Mesh { geometry, .. } => Some(geometry),
            _ => None,
        }
    }

    pub fn geometry_mut(&mut self) -> Option<&mut Geometry> {
        match &mut self.kind {
            NodeKind::Mesh { geometry, .. } => Some(geometry),
            _ => None,
        }
    }

    pub fn material(&self) -> Option<&MaterialSlot> {
        match &self.kind {
            NodeKind::Mesh { material, .. } => Some(material),
            _ => None,
        }
    }

    pub fn material_mut(&mut self) -> Option<&mut MaterialSlot> {
        match &mut self.kind {
            NodeKind::Mesh { material, .. } => Some(material),
            _ => None,
        }
    }

    pub fn light_mut(&mut self) -> Option<&mut Light> {
        match &mut self.kind {
            NodeKind::Light(light) => Some(light),
            _ => None,
        }
    }

    /// Replaces the geometry, disposing the previous buffers.
    pub fn replace_geometry(&mut self, replacement: Geometry) {
        if let NodeKind::Mesh { geometry, .. } = &mut self.kind {
            let mut previous = std::mem::replace(geometry, replacement);
            previous.dispose();
        }
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(MeshNode::subtree_len).sum::<usize>()
    }
}

impl SceneNode for MeshNode {
    fn set_position(&mut self, position: Vec3) {
        self.transform.position = position;
    }

    fn set_rotation(&mut self, rotation: Vec3) {
        self.transform.rotation = rotation;
    }

    fn set_scale(&mut self, scale: Vec3) {
        self.transform.scale = scale;
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity;
        if let Some(material) = self.material_mut() {
            material.with_mut(|material| material.set_opacity(opacity));
        }
        for child in &mut self.children {
            child.set_opacity(opacity);
        }
    }

    fn as_disposable(&mut self) -> Option<&mut dyn Disposable> {
        Some(self)
    }
}

impl Disposable for MeshNode {
    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        if let NodeKind::Mesh { geometry, material } = &mut self.kind {
            geometry.dispose();
            material.dispose();
        }
        for child in &mut self.children {
            child.dispose();
        }
        self.disposed = true;
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl FromMesh for MeshNode {
    fn from_mesh(geometry: Geometry, material: MaterialSlot) -> Self {
        MeshNode::mesh(geometry, material)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Material, ShaderMaterial};

    #[test]
    fn dispose_releases_whole_subtree_once() {
        let geometry = Geometry::sphere(1.0, 8, 8);
        let material = Material::standard(Color::WHITE);
        let (geometry_buffers, material_buffers) = (geometry.resource(), material.resource());
        let child = MeshNode::mesh(geometry, material);
        let child_buffers = child.geometry().map(Geometry::resource);

        let mut group = MeshNode::group(vec![child]);
        assert_eq!(group.subtree_len(), 2);

        group.dispose();
        assert!(group.is_disposed());
        assert!(geometry_buffers.is_disposed());
        assert!(material_buffers.is_disposed());
        assert!(child_buffers.map(|buffers| buffers.is_disposed()).unwrap_or(false));
    }

    #[test]
    fn opacity_reaches_nested_shader_materials() {
        let shader = Material::shader(ShaderMaterial::new("v", "f"));
        let child = MeshNode::mesh(Geometry::plane(1.0, 1.0, 1), shader);
        let mut group = MeshNode::group(vec![child]);

        group.set_opacity(0.4);

        let uniform = group.children()[0]
            .material()
            .and_then(|slot| {
                slot.with(|material| match material.kind() {
                    crate::scene::MaterialKind::Shader(shader) => {
                        shader.uniform(ShaderMaterial::OPACITY_UNIFORM)
                    }
                    _ => None,
                })
            });
        assert_eq!(uniform, Some(0.4));
    }

    #[test]
    fn replacing_geometry_disposes_old_buffers() {
        let old = Geometry::cuboid(1.0, 1.0, 1.0);
        let buffers = old.resource();
        let mut node = MeshNode::mesh(old, Material::basic(Color::BLACK));

        node.replace_geometry(Geometry::cuboid(2.0, 2.0, 2.0));

        assert!(buffers.is_disposed());
        assert!(!node.geometry().map(Disposable::is_disposed).unwrap_or(true));
    }
}
