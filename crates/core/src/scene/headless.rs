//! In-memory scene and renderer. Used by the offline pipeline, the app's
//! dry runs and the test-suite.

use crate::props::ObjectId;
use crate::scene::{Camera, Color, Renderer, SceneGraph, SceneNode, SceneView};
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneEvent {
    Added(ObjectId),
    Removed(ObjectId),
}

/// Scene graph that records attached ids and every attach/detach.
#[derive(Debug, Default)]
pub struct HeadlessScene {
    attached: Vec<ObjectId>,
    events: Vec<SceneEvent>,
}

impl HeadlessScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attached(&self) -> &[ObjectId] {
        &self.attached
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.attached.contains(id)
    }

    /// How many times `id` is currently attached. Anything above one means a
    /// duplicate handle.
    pub fn attached_count(&self, id: &ObjectId) -> usize {
        self.attached.iter().filter(|attached| *attached == id).count()
    }

    pub fn events(&self) -> &[SceneEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }
}

impl<N> SceneGraph<N> for HeadlessScene {
    fn add_node(&mut self, id: &ObjectId, _node: &N) {
        self.attached.push(id.clone());
        self.events.push(SceneEvent::Added(id.clone()));
    }

    fn remove_node(&mut self, id: &ObjectId, _node: &N) {
        if let Some(position) = self.attached.iter().position(|attached| attached == id) {
            self.attached.remove(position);
        }
        self.events.push(SceneEvent::Removed(id.clone()));
    }
}

/// Renderer that counts frames and remembers what the last one drew.
#[derive(Debug, Clone)]
pub struct HeadlessRenderer {
    frames: u64,
    last_drawn: Vec<ObjectId>,
    last_camera: Option<Camera>,
    clear_color: Color,
    size: (u32, u32),
}

impl HeadlessRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            frames: 0,
            last_drawn: Vec::new(),
            last_camera: None,
            clear_color: Color::BLACK,
            size: (width, height),
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Visible ids of the most recent frame, in draw order.
    pub fn last_drawn(&self) -> &[ObjectId] {
        &self.last_drawn
    }

    pub fn last_camera(&self) -> Option<&Camera> {
        self.last_camera.as_ref()
    }

    pub fn clear_color(&self) -> Color {
        self.clear_color
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

impl<N: SceneNode + 'static> Renderer<N> for HeadlessRenderer {
    fn draw(&mut self, camera: &Camera, scene: &SceneView<'_, N>) -> Result<()> {
        self.frames += 1;
        self.last_drawn = scene.visible_nodes().map(|(id, _)| id.clone()).collect();
        self.last_camera = Some(*camera);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::MeshNode;

    #[test]
    fn records_attach_and_detach_order() {
        let mut scene = HeadlessScene::new();
        let node = MeshNode::group(Vec::new());
        let id = ObjectId::from("a");

        SceneGraph::<MeshNode>::add_node(&mut scene, &id, &node);
        assert_eq!(scene.attached_count(&id), 1);
        SceneGraph::<MeshNode>::remove_node(&mut scene, &id, &node);

        assert!(!scene.contains(&id));
        assert_eq!(
            scene.events(),
            &[SceneEvent::Added(id.clone()), SceneEvent::Removed(id)]
        );
    }
}
