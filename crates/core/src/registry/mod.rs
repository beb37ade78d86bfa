//! Table of declared objects, owned by the scheduler.
//!
//! The registry is the only owner of live handles. The scene graph is told
//! about attach and detach. The renderer and descriptor callbacks borrow
//! handles through a [`SceneView`], but none of them keeps one.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use crate::context::{FrameInputs, Teardown};
use crate::descriptor::{Creation, ObjectDescriptor, VisualObject};
use crate::props::{ObjectId, PropValue, PropertyBag};
use crate::reconcile::{reconcile_entry, Reconciled};
use crate::scene::{SceneGraph, SceneNode, SceneView};
use crate::timeline::KeyframeTrack;
use crate::Result;

/// One-shot hook run when an entry is removed or replaced.
pub type RemovalHook = Box<dyn FnOnce()>;

/// State of an entry's handle.
pub(crate) enum HandleSlot<N> {
    Absent,
    /// Creation started and has not resolved yet. Holding the future here is
    /// what keeps a second pass from starting another creation.
    Creating(Creation<N>),
    Live(N),
}

impl<N> HandleSlot<N> {
    pub(crate) fn live(&self) -> Option<&N> {
        match self {
            HandleSlot::Live(node) => Some(node),
            _ => None,
        }
    }

    pub(crate) fn live_mut(&mut self) -> Option<&mut N> {
        match self {
            HandleSlot::Live(node) => Some(node),
            _ => None,
        }
    }
}

impl<N: fmt::Debug> fmt::Debug for HandleSlot<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleSlot::Absent => f.write_str("Absent"),
            HandleSlot::Creating(_) => f.write_str("Creating"),
            HandleSlot::Live(node) => f.debug_tuple("Live").field(node).finish(),
        }
    }
}

pub(crate) struct RegistryEntry<N> {
    pub(crate) descriptor: Rc<ObjectDescriptor<N>>,
    pub(crate) props: PropertyBag,
    pub(crate) slot: HandleSlot<N>,
    /// Property values as of the last successful reconciliation.
    pub(crate) snapshot: PropertyBag,
    pub(crate) on_remove: Option<RemovalHook>,
    pub(crate) animations: BTreeMap<String, KeyframeTrack>,
}

impl<N> RegistryEntry<N> {
    fn new(object: &VisualObject<N>, props: PropertyBag, on_remove: Option<RemovalHook>) -> Self {
        Self {
            descriptor: Rc::clone(object.descriptor()),
            props,
            slot: HandleSlot::Absent,
            snapshot: PropertyBag::new(),
            on_remove,
            animations: BTreeMap::new(),
        }
    }
}

/// Registration-ordered map from [`ObjectId`] to its entry.
pub struct Registry<N> {
    order: Vec<ObjectId>,
    entries: HashMap<ObjectId, RegistryEntry<N>>,
}

impl<N> Default for Registry<N> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            entries: HashMap::new(),
        }
    }
}

impl<N: SceneNode + 'static> Registry<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry for `id`. `overrides` are merged over the
    /// object's defaults.
    ///
    /// Re-registering with the same descriptor is a property update and keeps
    /// the live handle. A different descriptor tears the old handle down
    /// first; the entry keeps its place in the draw order.
    pub fn register<S>(
        &mut self,
        id: impl Into<ObjectId>,
        object: &VisualObject<N>,
        overrides: &PropertyBag,
        scene: &mut S,
    ) where
        S: SceneGraph<N> + ?Sized,
    {
        self.insert(id.into(), object, overrides, None, scene);
    }

    /// [`register`](Self::register) plus a hook run once when the entry is
    /// removed or replaced by another descriptor.
    pub fn register_with_cleanup<S, F>(
        &mut self,
        id: impl Into<ObjectId>,
        object: &VisualObject<N>,
        overrides: &PropertyBag,
        on_remove: F,
        scene: &mut S,
    ) where
        S: SceneGraph<N> + ?Sized,
        F: FnOnce() + 'static,
    {
        self.insert(id.into(), object, overrides, Some(Box::new(on_remove)), scene);
    }

    fn insert<S>(
        &mut self,
        id: ObjectId,
        object: &VisualObject<N>,
        overrides: &PropertyBag,
        on_remove: Option<RemovalHook>,
        scene: &mut S,
    ) where
        S: SceneGraph<N> + ?Sized,
    {
        let props = object.props(overrides);
        let same_descriptor = self
            .entries
            .get(&id)
            .map(|entry| Rc::ptr_eq(&entry.descriptor, object.descriptor()));

        match same_descriptor {
            Some(true) => {
                if let Some(entry) = self.entries.get_mut(&id) {
                    entry.props = props;
                    if on_remove.is_some() {
                        entry.on_remove = on_remove;
                    }
                }
            }
            Some(false) => {
                if let Some(previous) = self.entries.remove(&id) {
                    tracing::debug!(%id, "descriptor replaced, tearing down previous handle");
                    teardown(&id, previous, scene);
                }
                self.entries
                    .insert(id, RegistryEntry::new(object, props, on_remove));
            }
            None => {
                self.order.push(id.clone());
                self.entries
                    .insert(id, RegistryEntry::new(object, props, on_remove));
            }
        }
    }

    /// Merges `patch` into the current properties of `id`.
    pub fn set_props(&mut self, id: &ObjectId, patch: &PropertyBag) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.props.merge(patch);
                true
            }
            None => false,
        }
    }

    pub fn set_prop(&mut self, id: &ObjectId, key: &str, value: impl Into<PropValue>) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.props.insert(key, value);
                true
            }
            None => false,
        }
    }

    /// Runs the cleanup hooks, disposes and detaches the handle, and forgets
    /// `id`. Unknown ids are ignored.
    pub fn remove<S>(&mut self, id: &ObjectId, scene: &mut S) -> bool
    where
        S: SceneGraph<N> + ?Sized,
    {
        let Some(entry) = self.entries.remove(id) else {
            return false;
        };
        self.order.retain(|existing| existing != id);
        teardown(id, entry, scene);
        true
    }

    /// Removes every entry in registration order.
    pub fn clear<S>(&mut self, scene: &mut S)
    where
        S: SceneGraph<N> + ?Sized,
    {
        for id in std::mem::take(&mut self.order) {
            if let Some(entry) = self.entries.remove(&id) {
                teardown(&id, entry, scene);
            }
        }
    }

    /// Animates `field` of `id` along `track`. The sampled value overwrites
    /// the property before each pass.
    pub fn animate(&mut self, id: &ObjectId, field: impl Into<String>, track: KeyframeTrack) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.animations.insert(field.into(), track);
                true
            }
            None => false,
        }
    }

    pub(crate) fn apply_animations(&mut self, id: &ObjectId, time: f64) {
        let Some(entry) = self.entries.get_mut(id) else {
            return;
        };
        for (field, track) in &entry.animations {
            if let Some(value) = track.sample(time) {
                entry.props.insert(field.as_str(), value);
            }
        }
    }

    /// Reconciles one entry. Unknown ids report [`Reconciled::Missing`].
    pub fn reconcile<S>(
        &mut self,
        id: &ObjectId,
        scene: &mut S,
        inputs: &FrameInputs<'_>,
    ) -> Result<Reconciled>
    where
        S: SceneGraph<N> + ?Sized,
    {
        // Lifted out for the call so callbacks can read every other entry.
        let Some(mut entry) = self.entries.remove(id) else {
            return Ok(Reconciled::Missing);
        };
        let outcome = reconcile_entry(id, &mut entry, SceneView::new(self), scene, inputs);
        self.entries.insert(id.clone(), entry);
        outcome
    }

    /// Sets the visibility of a live handle. Returns false when there is none.
    pub fn set_visible(&mut self, id: &ObjectId, visible: bool) -> bool {
        match self.handle_mut(id) {
            Some(node) => {
                node.set_visible(visible);
                true
            }
            None => false,
        }
    }

    /// Live handles in registration order.
    pub fn handles(&self) -> impl Iterator<Item = (&ObjectId, &N)> + '_ {
        self.order.iter().filter_map(move |id| {
            self.entries
                .get(id)
                .and_then(|entry| entry.slot.live())
                .map(|node| (id, node))
        })
    }

    pub fn handle(&self, id: &ObjectId) -> Option<&N> {
        self.entries.get(id).and_then(|entry| entry.slot.live())
    }

    pub fn handle_mut(&mut self, id: &ObjectId) -> Option<&mut N> {
        self.entries
            .get_mut(id)
            .and_then(|entry| entry.slot.live_mut())
    }

    /// True while a creation for `id` is in flight.
    pub fn is_creating(&self, id: &ObjectId) -> bool {
        self.entries
            .get(id)
            .map(|entry| matches!(entry.slot, HandleSlot::Creating(_)))
            .unwrap_or(false)
    }

    pub fn props(&self, id: &ObjectId) -> Option<&PropertyBag> {
        self.entries.get(id).map(|entry| &entry.props)
    }

    /// Values the last reconciliation of `id` saw.
    pub fn snapshot(&self, id: &ObjectId) -> Option<&PropertyBag> {
        self.entries.get(id).map(|entry| &entry.snapshot)
    }

    pub fn descriptor(&self, id: &ObjectId) -> Option<&Rc<ObjectDescriptor<N>>> {
        self.entries.get(id).map(|entry| &entry.descriptor)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ObjectId> + '_ {
        self.order.iter()
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl<N> fmt::Debug for Registry<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("order", &self.order)
            .finish()
    }
}

/// Disposes whatever `node` owns and detaches it from the scene.
pub(crate) fn release_handle<N, S>(id: &ObjectId, node: &mut N, scene: &mut S)
where
    N: SceneNode,
    S: SceneGraph<N> + ?Sized,
{
    if let Some(disposable) = node.as_disposable() {
        disposable.dispose();
    }
    scene.remove_node(id, node);
    tracing::debug!(%id, "handle disposed");
}

fn teardown<N, S>(id: &ObjectId, entry: RegistryEntry<N>, scene: &mut S)
where
    N: SceneNode,
    S: SceneGraph<N> + ?Sized,
{
    let RegistryEntry {
        descriptor,
        props,
        slot,
        on_remove,
        ..
    } = entry;

    let mut live = match slot {
        HandleSlot::Live(node) => Some(node),
        HandleSlot::Creating(_) => {
            tracing::debug!(%id, "dropping in-flight creation");
            None
        }
        HandleSlot::Absent => None,
    };

    if let Some(node) = live.as_mut() {
        descriptor.run_cleanup(&Teardown { id, props: &props }, node);
    }
    if let Some(hook) = on_remove {
        hook();
    }
    if let Some(node) = live.as_mut() {
        release_handle(id, node, scene);
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;
    use crate::descriptor::ObjectBuilder;
    use crate::scene::headless::{HeadlessScene, SceneEvent};
    use crate::scene::{Camera, Color, Disposable, Geometry, Material, MeshNode};
    use crate::timeline::{Easing, Keyframe};
    use crate::{props, Reconciled};

    fn orb(cleanups: Rc<Cell<u32>>) -> VisualObject<MeshNode> {
        ObjectBuilder::new()
            .defaults(|| props! { "radius" => 1.0 })
            .geometry(|_| Geometry::sphere(1.0, 8, 8))
            .material(|_| Material::standard(Color::WHITE).into())
            .cleanup(move |_, _| cleanups.set(cleanups.get() + 1))
            .build()
            .unwrap()
    }

    fn reconcile_all(registry: &mut Registry<MeshNode>, scene: &mut HeadlessScene) {
        let camera = Camera::default();
        let inputs = FrameInputs::new(&[], &camera);
        let ids: Vec<_> = registry.ids().cloned().collect();
        for id in ids {
            registry.reconcile(&id, scene, &inputs).unwrap();
        }
    }

    #[test]
    fn registration_merges_defaults_and_keeps_order() {
        let mut registry = Registry::new();
        let mut scene = HeadlessScene::new();
        let object = orb(Rc::new(Cell::new(0)));

        registry.register("b", &object, &props! { "x" => 2.0 }, &mut scene);
        registry.register(1, &object, &PropertyBag::new(), &mut scene);

        let ids: Vec<_> = registry.ids().cloned().collect();
        assert_eq!(ids, vec![ObjectId::from("b"), ObjectId::from(1)]);
        let props = registry.props(&ObjectId::from("b")).unwrap();
        assert_eq!(props.number("x"), Some(2.0));
        assert_eq!(props.number("radius"), Some(1.0));
        assert_eq!(props.number("scale_z"), Some(1.0));
    }

    #[test]
    fn same_descriptor_reregistration_keeps_the_handle() {
        let mut registry = Registry::new();
        let mut scene = HeadlessScene::new();
        let object = orb(Rc::new(Cell::new(0)));
        let id = ObjectId::from("a");

        registry.register("a", &object, &PropertyBag::new(), &mut scene);
        reconcile_all(&mut registry, &mut scene);
        registry.register("a", &object, &props! { "x" => 3.0 }, &mut scene);

        assert!(registry.handle(&id).is_some());
        assert_eq!(registry.props(&id).and_then(|p| p.number("x")), Some(3.0));
        assert_eq!(scene.attached_count(&id), 1);
    }

    #[test]
    fn new_descriptor_tears_down_previous_handle() {
        let cleanups = Rc::new(Cell::new(0));
        let mut registry = Registry::new();
        let mut scene = HeadlessScene::new();
        let id = ObjectId::from("a");

        registry.register("a", &orb(Rc::clone(&cleanups)), &PropertyBag::new(), &mut scene);
        reconcile_all(&mut registry, &mut scene);
        let buffers = registry
            .handle(&id)
            .and_then(MeshNode::geometry)
            .map(Geometry::resource)
            .unwrap();

        registry.register("a", &orb(Rc::clone(&cleanups)), &PropertyBag::new(), &mut scene);

        assert_eq!(cleanups.get(), 1);
        assert!(buffers.is_disposed());
        assert!(registry.handle(&id).is_none());
        assert!(!scene.contains(&id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn removal_runs_hooks_once_then_disposes_and_detaches() {
        let cleanups = Rc::new(Cell::new(0));
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = Registry::new();
        let mut scene = HeadlessScene::new();
        let id = ObjectId::from("a");

        let hook_log = Rc::clone(&log);
        registry.register_with_cleanup(
            "a",
            &orb(Rc::clone(&cleanups)),
            &PropertyBag::new(),
            move || hook_log.borrow_mut().push("on_remove"),
            &mut scene,
        );
        reconcile_all(&mut registry, &mut scene);
        let node_disposed = registry
            .handle(&id)
            .and_then(MeshNode::geometry)
            .map(Geometry::resource)
            .unwrap();

        assert!(registry.remove(&id, &mut scene));
        assert!(!registry.remove(&id, &mut scene));

        assert_eq!(cleanups.get(), 1);
        assert_eq!(*log.borrow(), vec!["on_remove"]);
        assert!(node_disposed.is_disposed());
        assert_eq!(scene.events().last(), Some(&SceneEvent::Removed(id.clone())));

        let camera = Camera::default();
        let inputs = FrameInputs::new(&[], &camera);
        let outcome = registry.reconcile(&id, &mut scene, &inputs).unwrap();
        assert_eq!(outcome, Reconciled::Missing);
    }

    #[test]
    fn removing_unreconciled_entry_skips_descriptor_cleanup() {
        let cleanups = Rc::new(Cell::new(0));
        let mut registry = Registry::new();
        let mut scene = HeadlessScene::new();

        registry.register("a", &orb(Rc::clone(&cleanups)), &PropertyBag::new(), &mut scene);
        registry.remove(&ObjectId::from("a"), &mut scene);

        assert_eq!(cleanups.get(), 0);
        assert!(scene.events().is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn clear_removes_everything() {
        let cleanups = Rc::new(Cell::new(0));
        let mut registry = Registry::new();
        let mut scene = HeadlessScene::new();
        let object = orb(Rc::clone(&cleanups));

        registry.register("a", &object, &PropertyBag::new(), &mut scene);
        registry.register("b", &object, &PropertyBag::new(), &mut scene);
        reconcile_all(&mut registry, &mut scene);
        registry.clear(&mut scene);

        assert_eq!(cleanups.get(), 2);
        assert!(scene.attached().is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn animations_overwrite_props_at_playback_time() {
        let mut registry = Registry::new();
        let mut scene = HeadlessScene::new();
        let id = ObjectId::from("a");
        registry.register("a", &orb(Rc::new(Cell::new(0))), &PropertyBag::new(), &mut scene);

        let track = KeyframeTrack::new(vec![
            Keyframe::new(0.0, 0.0),
            Keyframe::new(2.0, 10.0).with_easing(Easing::Linear),
        ]);
        assert!(registry.animate(&id, "x", track));

        registry.apply_animations(&id, 1.0);
        assert_eq!(registry.props(&id).and_then(|p| p.number("x")), Some(5.0));
        registry.apply_animations(&id, 9.0);
        assert_eq!(registry.props(&id).and_then(|p| p.number("x")), Some(10.0));
    }

    #[test]
    fn patches_merge_into_current_props() {
        let mut registry = Registry::new();
        let mut scene = HeadlessScene::new();
        let id = ObjectId::from("a");
        registry.register("a", &orb(Rc::new(Cell::new(0))), &props! { "x" => 1.0 }, &mut scene);

        assert!(registry.set_props(&id, &props! { "y" => 2.0 }));
        assert!(registry.set_prop(&id, "hidden", true));
        assert!(!registry.set_prop(&ObjectId::from("nope"), "x", 1.0));

        let props = registry.props(&id).unwrap();
        assert_eq!(props.number("x"), Some(1.0));
        assert_eq!(props.number("y"), Some(2.0));
        assert!(props.flag("hidden"));
    }
}
