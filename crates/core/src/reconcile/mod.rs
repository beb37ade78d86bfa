//! Per-object, per-pass reconciliation.
//!
//! Each call brings one registry entry in line with its properties:
//!
//! 1. create the handle if there is none (attach, snapshot, init, bootstrap
//!    every rule),
//! 2. walk the reactive rules in declaration order, patching or rebuilding
//!    for each changed tracked field,
//! 3. write the transform fields onto the handle,
//! 4. run the render hook.
//!
//! Creation futures are polled, never awaited in place. While one is
//! pending it sits in the entry's slot, so a later pass resumes that same
//! future instead of starting another.

use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

use crate::context::{FrameContext, FrameInputs, Teardown};
use crate::descriptor::{Creation, HookFn, ObjectDescriptor, ReactiveRule, Tracked};
use crate::error::HookStage;
use crate::props::{ObjectId, PropValue, PropertyBag};
use crate::registry::{release_handle, HandleSlot, RegistryEntry};
use crate::scene::{apply_transform, SceneGraph, SceneNode, SceneView};
use crate::{Result, VisualiserError};

/// What a reconciliation call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// The id is not registered (or was removed).
    Missing,
    /// The handle's creation has not resolved yet; nothing else ran.
    CreationPending,
    Applied(ReconcileStats),
}

impl Reconciled {
    pub fn stats(&self) -> Option<ReconcileStats> {
        match self {
            Reconciled::Applied(stats) => Some(*stats),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// A new handle was attached during this call.
    pub created: bool,
    pub rebuilds: u32,
    /// Init, rule and render callbacks that ran.
    pub callbacks: u32,
}

enum Progress {
    Ready,
    Pending,
}

/// Borrowed pieces of one entry, split so the props can be read while the
/// slot and snapshot change.
struct Parts<'e, N> {
    id: &'e ObjectId,
    others: SceneView<'e, N>,
    descriptor: &'e ObjectDescriptor<N>,
    props: &'e PropertyBag,
    slot: &'e mut HandleSlot<N>,
    snapshot: &'e mut PropertyBag,
}

pub(crate) fn reconcile_entry<N, S>(
    id: &ObjectId,
    entry: &mut RegistryEntry<N>,
    others: SceneView<'_, N>,
    scene: &mut S,
    inputs: &FrameInputs<'_>,
) -> Result<Reconciled>
where
    N: SceneNode + 'static,
    S: SceneGraph<N> + ?Sized,
{
    let RegistryEntry {
        descriptor,
        props,
        slot,
        snapshot,
        ..
    } = entry;
    let mut parts = Parts {
        id,
        others,
        descriptor: &**descriptor,
        props: &*props,
        slot,
        snapshot,
    };
    let mut stats = ReconcileStats::default();

    if parts.slot.live().is_none() {
        if let Progress::Pending = drive_creation(&mut parts, scene, inputs, &mut stats)? {
            return Ok(Reconciled::CreationPending);
        }
    }

    let ctx = inputs.for_object(parts.id, parts.props, parts.others);
    let descriptor = parts.descriptor;
    // Every rule diffs against the values the handle held before this walk,
    // so rules sharing a field all see the change.
    let mut stale = parts.snapshot.clone();
    for rule in &descriptor.rules {
        let progress = apply_rule(rule, &mut parts, &mut stale, &ctx, scene, inputs, &mut stats)?;
        if let Progress::Pending = progress {
            return Ok(Reconciled::CreationPending);
        }
    }

    let node = live_node(parts.id, parts.slot)?;
    apply_transform(node, parts.props);

    if let Some(render) = &descriptor.render {
        run_hook(parts.id, HookStage::Render, render, &ctx, node, &mut stats)?;
    }

    Ok(Reconciled::Applied(stats))
}

fn apply_rule<N, S>(
    rule: &ReactiveRule<N>,
    parts: &mut Parts<'_, N>,
    stale: &mut PropertyBag,
    ctx: &FrameContext<'_, N>,
    scene: &mut S,
    inputs: &FrameInputs<'_>,
    stats: &mut ReconcileStats,
) -> Result<Progress>
where
    N: SceneNode + 'static,
    S: SceneGraph<N> + ?Sized,
{
    let fields = match &rule.tracked {
        Tracked::All => {
            if let Some(on_change) = &rule.on_change {
                let node = live_node(parts.id, parts.slot)?;
                run_hook(parts.id, HookStage::Update, on_change, ctx, node, stats)?;
            }
            return Ok(Progress::Ready);
        }
        Tracked::Fields(fields) => fields,
    };

    for field in fields {
        let current = parts.props.get(field);
        if !changed(stale.get(field), current) {
            continue;
        }

        if rule.rebuild {
            // The fresh handle was bootstrapped against the current props,
            // so the rest of the walk diffs clean.
            let progress = rebuild(parts, scene, inputs, stats)?;
            *stale = parts.snapshot.clone();
            return Ok(progress);
        }

        if let Some(on_change) = &rule.on_change {
            let node = live_node(parts.id, parts.slot)?;
            run_hook(parts.id, HookStage::Update, on_change, ctx, node, stats)?;
        }
        match current {
            Some(value) => parts.snapshot.insert(field.as_str(), value.clone()),
            None => parts.snapshot.remove(field),
        };
    }

    Ok(Progress::Ready)
}

/// Disposes the live handle and restarts creation within the same call.
fn rebuild<N, S>(
    parts: &mut Parts<'_, N>,
    scene: &mut S,
    inputs: &FrameInputs<'_>,
    stats: &mut ReconcileStats,
) -> Result<Progress>
where
    N: SceneNode + 'static,
    S: SceneGraph<N> + ?Sized,
{
    if let HandleSlot::Live(mut node) = std::mem::replace(parts.slot, HandleSlot::Absent) {
        tracing::debug!(id = %parts.id, "rebuilding handle");
        let teardown = Teardown {
            id: parts.id,
            props: parts.props,
        };
        parts.descriptor.run_cleanup(&teardown, &mut node);
        release_handle(parts.id, &mut node, scene);
    }
    stats.rebuilds += 1;
    drive_creation(parts, scene, inputs, stats)
}

/// Starts or resumes creation. On resolution the handle is attached,
/// snapshotted and bootstrapped before it is stored as live.
fn drive_creation<N, S>(
    parts: &mut Parts<'_, N>,
    scene: &mut S,
    inputs: &FrameInputs<'_>,
    stats: &mut ReconcileStats,
) -> Result<Progress>
where
    N: SceneNode + 'static,
    S: SceneGraph<N> + ?Sized,
{
    let id = parts.id;
    let ctx = inputs.for_object(id, parts.props, parts.others);

    let mut creation = match std::mem::replace(parts.slot, HandleSlot::Absent) {
        HandleSlot::Creating(creation) => creation,
        HandleSlot::Absent => {
            tracing::debug!(%id, "creating handle");
            parts.descriptor.creation.create(&ctx)
        }
        live @ HandleSlot::Live(_) => {
            *parts.slot = live;
            return Ok(Progress::Ready);
        }
    };

    let outcome = if inputs.block_on_creation {
        pollster::block_on(creation)
    } else {
        match poll_once(&mut creation) {
            Poll::Ready(outcome) => outcome,
            Poll::Pending => {
                *parts.slot = HandleSlot::Creating(creation);
                return Ok(Progress::Pending);
            }
        }
    };

    let mut node = match outcome {
        Ok(Some(node)) => node,
        Ok(None) => return Err(VisualiserError::creation(id, "factory resolved to nothing")),
        Err(err) => return Err(VisualiserError::creation(id, err.to_string())),
    };

    scene.add_node(id, &node);
    *parts.snapshot = parts.props.clone();
    stats.created = true;
    tracing::debug!(%id, "handle attached");

    let booted = bootstrap(id, parts.descriptor, &ctx, &mut node, stats);
    *parts.slot = HandleSlot::Live(node);
    booted.map(|()| Progress::Ready)
}

/// Runs init and then every rule once against a fresh handle.
fn bootstrap<N>(
    id: &ObjectId,
    descriptor: &ObjectDescriptor<N>,
    ctx: &FrameContext<'_, N>,
    node: &mut N,
    stats: &mut ReconcileStats,
) -> Result<()> {
    if let Some(init) = &descriptor.init {
        run_hook(id, HookStage::Init, init, ctx, node, stats)?;
    }
    for rule in &descriptor.rules {
        if let Some(on_change) = &rule.on_change {
            run_hook(id, HookStage::Update, on_change, ctx, node, stats)?;
        }
    }
    Ok(())
}

fn run_hook<N>(
    id: &ObjectId,
    stage: HookStage,
    hook: &HookFn<N>,
    ctx: &FrameContext<'_, N>,
    node: &mut N,
    stats: &mut ReconcileStats,
) -> Result<()> {
    stats.callbacks += 1;
    hook(ctx, node).map_err(|err| VisualiserError::hook(id, stage, err))
}

fn live_node<'s, N>(id: &ObjectId, slot: &'s mut HandleSlot<N>) -> Result<&'s mut N> {
    slot.live_mut()
        .ok_or_else(|| VisualiserError::creation(id, "handle missing after creation"))
}

/// Missing fields and explicit nulls are the same thing.
fn changed(previous: Option<&PropValue>, current: Option<&PropValue>) -> bool {
    match (previous, current) {
        (Some(previous), Some(current)) => !previous.same_as(current),
        (Some(value), None) | (None, Some(value)) => !value.is_null(),
        (None, None) => false,
    }
}

struct CreationWaker;

impl Wake for CreationWaker {
    // Creations are re-polled on the next pass, so wake-ups carry no
    // information.
    fn wake(self: Arc<Self>) {}
}

fn poll_once<N>(creation: &mut Creation<N>) -> Poll<Result<Option<N>>> {
    let waker = Waker::from(Arc::new(CreationWaker));
    let mut cx = Context::from_waker(&waker);
    creation.as_mut().poll(&mut cx)
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::pin::Pin;
    use std::rc::Rc;

    use super::*;
    use crate::descriptor::{ObjectBuilder, VisualObject};
    use crate::props;
    use crate::registry::Registry;
    use crate::scene::headless::{HeadlessScene, SceneEvent};
    use crate::scene::{Camera, Color, Disposable, Geometry, Material, MeshNode};

    /// Future that stays pending until the shared flag is set.
    struct Gate {
        open: Rc<Cell<bool>>,
    }

    impl Future for Gate {
        type Output = ();

        fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
            if self.open.get() {
                Poll::Ready(())
            } else {
                Poll::Pending
            }
        }
    }

    impl Gate {
        fn new(open: &Rc<Cell<bool>>) -> Self {
            Self {
                open: Rc::clone(open),
            }
        }
    }

    async fn gated_mesh(gate: Gate) -> Result<Option<MeshNode>> {
        gate.await;
        Ok(Some(mesh()))
    }

    struct Harness {
        registry: Registry<MeshNode>,
        scene: HeadlessScene,
        camera: Camera,
    }

    impl Harness {
        fn new(object: &VisualObject<MeshNode>, props: PropertyBag) -> Self {
            let mut harness = Self {
                registry: Registry::new(),
                scene: HeadlessScene::new(),
                camera: Camera::default(),
            };
            harness
                .registry
                .register("a", object, &props, &mut harness.scene);
            harness
        }

        fn pass(&mut self) -> Result<Reconciled> {
            let inputs = FrameInputs::new(&[], &self.camera);
            self.registry
                .reconcile(&ObjectId::from("a"), &mut self.scene, &inputs)
        }

        fn set(&mut self, key: &str, value: f64) {
            self.registry.set_prop(&ObjectId::from("a"), key, value);
        }

        fn node(&self) -> &MeshNode {
            self.registry.handle(&ObjectId::from("a")).unwrap()
        }
    }

    fn counter() -> Rc<Cell<u32>> {
        Rc::new(Cell::new(0))
    }

    fn bump(counter: &Rc<Cell<u32>>) {
        counter.set(counter.get() + 1);
    }

    fn mesh() -> MeshNode {
        MeshNode::mesh(Geometry::cuboid(1.0, 1.0, 1.0), Material::basic(Color::WHITE))
    }

    #[test]
    fn pending_creation_is_started_once() {
        let open = Rc::new(Cell::new(false));
        let creates = counter();
        let (gate, count) = (Rc::clone(&open), Rc::clone(&creates));
        let object = ObjectBuilder::new()
            .object_async(move |_| {
                bump(&count);
                gated_mesh(Gate::new(&gate))
            })
            .build()
            .unwrap();
        let mut harness = Harness::new(&object, PropertyBag::new());

        for _ in 0..5 {
            assert_eq!(harness.pass().unwrap(), Reconciled::CreationPending);
        }
        assert!(harness.registry.is_creating(&ObjectId::from("a")));
        assert_eq!(creates.get(), 1);

        open.set(true);
        let stats = harness.pass().unwrap().stats().unwrap();
        assert!(stats.created);
        assert_eq!(creates.get(), 1);
        assert_eq!(harness.scene.attached_count(&ObjectId::from("a")), 1);
    }

    #[test]
    fn callbacks_never_run_before_the_handle_exists() {
        let open = Rc::new(Cell::new(false));
        let calls = counter();
        let gate = Rc::clone(&open);
        let (on_change, on_render) = (Rc::clone(&calls), Rc::clone(&calls));
        let object = ObjectBuilder::new()
            .object_async(move |_| {
                gated_mesh(Gate::new(&gate))
            })
            .every_frame(move |_, _| {
                bump(&on_change);
                Ok(())
            })
            .render(move |_, _| {
                bump(&on_render);
                Ok(())
            })
            .unwrap();
        let mut harness = Harness::new(&object, PropertyBag::new());

        harness.pass().unwrap();
        harness.pass().unwrap();
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn unchanged_props_fire_nothing_but_transform_still_applies() {
        let changes = counter();
        let seen = Rc::clone(&changes);
        let object = ObjectBuilder::new()
            .object(|_| Some(mesh()))
            .update(["color"], move |_, _| {
                bump(&seen);
                Ok(())
            })
            .build()
            .unwrap();
        let mut harness = Harness::new(&object, props! { "color" => "#fff" });

        harness.pass().unwrap();
        assert_eq!(changes.get(), 1);

        harness.set("x", 7.0);
        let stats = harness.pass().unwrap().stats().unwrap();
        assert_eq!(stats.callbacks, 0);
        assert_eq!(changes.get(), 1);
        assert_eq!(harness.node().transform().position.x, 7.0);
    }

    #[test]
    fn fires_once_per_changed_tracked_field() {
        let changes = counter();
        let seen = Rc::clone(&changes);
        let object = ObjectBuilder::new()
            .object(|_| Some(mesh()))
            .update(["x", "y", "z"], move |_, _| {
                bump(&seen);
                Ok(())
            })
            .build()
            .unwrap();
        let mut harness = Harness::new(&object, PropertyBag::new());
        harness.pass().unwrap();
        changes.set(0);

        harness.set("x", 1.0);
        harness.set("y", 1.0);
        harness.pass().unwrap();
        assert_eq!(changes.get(), 2);

        harness.pass().unwrap();
        assert_eq!(changes.get(), 2);
        let snapshot = harness.registry.snapshot(&ObjectId::from("a")).unwrap();
        assert_eq!(snapshot.number("x"), Some(1.0));
    }

    #[test]
    fn rules_sharing_a_field_all_see_the_change() {
        let (first, second) = (counter(), counter());
        let (a, b) = (Rc::clone(&first), Rc::clone(&second));
        let object = ObjectBuilder::new()
            .object(|_| Some(mesh()))
            .update(["color"], move |_, _| {
                bump(&a);
                Ok(())
            })
            .update(["color"], move |_, _| {
                bump(&b);
                Ok(())
            })
            .build()
            .unwrap();
        let mut harness = Harness::new(&object, props! { "color" => "red" });
        harness.pass().unwrap();
        assert_eq!((first.get(), second.get()), (1, 1));

        harness
            .registry
            .set_prop(&ObjectId::from("a"), "color", "blue");
        harness.pass().unwrap();
        assert_eq!((first.get(), second.get()), (2, 2));

        harness.pass().unwrap();
        assert_eq!((first.get(), second.get()), (2, 2));
    }

    #[test]
    fn rules_after_a_rebuild_are_not_fired_twice() {
        let updates = counter();
        let seen = Rc::clone(&updates);
        let object = ObjectBuilder::<MeshNode>::new()
            .defaults(|| props! { "radius" => 1.0 })
            .geometry(|ctx| Geometry::sphere(ctx.props.f32_or("radius", 1.0), 8, 8))
            .material(|_| Material::standard(Color::WHITE).into())
            .rebuild_on(["radius"])
            .update(["radius"], move |_, _| {
                bump(&seen);
                Ok(())
            })
            .build()
            .unwrap();
        let mut harness = Harness::new(&object, PropertyBag::new());
        harness.pass().unwrap();
        assert_eq!(updates.get(), 1);

        harness.set("radius", 3.0);
        let stats = harness.pass().unwrap().stats().unwrap();
        assert_eq!(stats.rebuilds, 1);
        assert_eq!(updates.get(), 2);

        harness.pass().unwrap();
        assert_eq!(updates.get(), 2);
    }

    #[test]
    fn callbacks_see_every_other_live_handle() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let follower = ObjectBuilder::new()
            .object(|_| Some(mesh()))
            .every_frame(move |ctx, _| {
                let leader_x = ctx
                    .others
                    .get(&ObjectId::from("leader"))
                    .map(|node| node.transform().position.x);
                let ids: Vec<String> = ctx.others.nodes().map(|(id, _)| id.to_string()).collect();
                log.borrow_mut().push((leader_x, ids));
                Ok(())
            })
            .build()
            .unwrap();
        let leader = ObjectBuilder::new()
            .object(|_| Some(mesh()))
            .build()
            .unwrap();

        let mut registry = Registry::new();
        let mut scene = HeadlessScene::new();
        let camera = Camera::default();
        let inputs = FrameInputs::new(&[], &camera);
        registry.register("leader", &leader, &props! { "x" => 3.0 }, &mut scene);
        registry.register("follower", &follower, &PropertyBag::new(), &mut scene);

        registry
            .reconcile(&ObjectId::from("leader"), &mut scene, &inputs)
            .unwrap();
        registry
            .reconcile(&ObjectId::from("follower"), &mut scene, &inputs)
            .unwrap();

        let seen = seen.borrow();
        assert_eq!(seen.last(), Some(&(Some(3.0), vec!["leader".to_string()])));
        assert!(registry.handle(&ObjectId::from("follower")).is_some());
        assert_eq!(registry.handles().count(), 2);
    }

    #[test]
    fn every_frame_rules_fire_each_pass() {
        let frames = counter();
        let seen = Rc::clone(&frames);
        let object = ObjectBuilder::new()
            .object(|_| Some(mesh()))
            .every_frame(move |ctx, _| {
                assert_eq!(ctx.id, &ObjectId::from("a"));
                bump(&seen);
                Ok(())
            })
            .build()
            .unwrap();
        let mut harness = Harness::new(&object, PropertyBag::new());

        // Creation pass: bootstrap plus the regular walk.
        harness.pass().unwrap();
        assert_eq!(frames.get(), 2);
        harness.pass().unwrap();
        assert_eq!(frames.get(), 3);
    }

    #[test]
    fn rebuild_detaches_old_handle_before_attaching_new_one() {
        let cleanups = counter();
        let count = Rc::clone(&cleanups);
        let object = ObjectBuilder::<MeshNode>::new()
            .defaults(|| props! { "radius" => 1.0 })
            .geometry(|ctx| Geometry::sphere(ctx.props.f32_or("radius", 1.0), 8, 8))
            .material(|_| Material::standard(Color::WHITE).into())
            .rebuild_on(["radius"])
            .cleanup(move |_, _| bump(&count))
            .build()
            .unwrap();
        let mut harness = Harness::new(&object, PropertyBag::new());
        let id = ObjectId::from("a");

        harness.pass().unwrap();
        let old = harness.node().geometry().map(Geometry::resource).unwrap();
        harness.scene.clear_events();

        harness.set("radius", 2.0);
        let stats = harness.pass().unwrap().stats().unwrap();

        assert_eq!(stats.rebuilds, 1);
        assert!(stats.created);
        assert!(old.is_disposed());
        assert_eq!(cleanups.get(), 1);
        assert_eq!(
            harness.scene.events(),
            &[SceneEvent::Removed(id.clone()), SceneEvent::Added(id.clone())]
        );
        assert_eq!(harness.scene.attached_count(&id), 1);
        let shape = harness.node().geometry().map(|g| g.shape().clone());
        assert!(matches!(
            shape,
            Some(crate::scene::Shape::Sphere { radius, .. }) if radius == 2.0
        ));

        harness.pass().unwrap();
        assert_eq!(cleanups.get(), 1);
    }

    #[test]
    fn rebuild_with_pending_creation_resumes_next_pass() {
        let open = Rc::new(Cell::new(true));
        let gate = Rc::clone(&open);
        let object = ObjectBuilder::new()
            .object_async(move |_| {
                gated_mesh(Gate::new(&gate))
            })
            .rebuild_on("detail")
            .build()
            .unwrap();
        let mut harness = Harness::new(&object, props! { "detail" => 1 });
        let id = ObjectId::from("a");
        harness.pass().unwrap();

        open.set(false);
        harness.set("detail", 2.0);
        assert_eq!(harness.pass().unwrap(), Reconciled::CreationPending);
        assert!(!harness.scene.contains(&id));

        open.set(true);
        assert!(harness.pass().unwrap().stats().unwrap().created);
        assert_eq!(harness.scene.attached_count(&id), 1);
    }

    #[test]
    fn factory_returning_nothing_is_a_creation_error_and_retries() {
        let attempts = counter();
        let seen = Rc::clone(&attempts);
        let object = ObjectBuilder::<MeshNode>::new()
            .object(move |_| {
                bump(&seen);
                None
            })
            .build()
            .unwrap();
        let mut harness = Harness::new(&object, PropertyBag::new());

        let err = harness.pass().unwrap_err();
        assert!(matches!(err, VisualiserError::Creation { .. }));
        harness.pass().unwrap_err();
        assert_eq!(attempts.get(), 2);
        assert!(harness.scene.attached().is_empty());
    }

    #[test]
    fn hook_errors_name_the_stage_and_keep_the_handle() {
        let object = ObjectBuilder::new()
            .object(|_| Some(mesh()))
            .render(|_, _| Err("render exploded".into()))
            .unwrap();
        let mut harness = Harness::new(&object, PropertyBag::new());

        let err = harness.pass().unwrap_err();
        assert!(matches!(
            err,
            VisualiserError::Hook {
                stage: HookStage::Render,
                ..
            }
        ));
        assert!(harness.registry.handle(&ObjectId::from("a")).is_some());
    }

    #[test]
    fn init_runs_once_before_bootstrap() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let (init_log, update_log) = (Rc::clone(&log), Rc::clone(&log));
        let object = ObjectBuilder::new()
            .object(|_| Some(mesh()))
            .start(move |_, _| {
                init_log.borrow_mut().push("init");
                Ok(())
            })
            .update(["x"], move |_, _| {
                update_log.borrow_mut().push("update");
                Ok(())
            })
            .build()
            .unwrap();
        let mut harness = Harness::new(&object, PropertyBag::new());

        harness.pass().unwrap();
        harness.pass().unwrap();
        assert_eq!(*log.borrow(), vec!["init", "update"]);
    }

    #[test]
    fn opacity_field_reaches_materials() {
        let object = ObjectBuilder::new()
            .object(|_| Some(mesh()))
            .build()
            .unwrap();
        let mut harness = Harness::new(&object, props! { "opacity" => 0.5 });

        harness.pass().unwrap();
        let opacity = harness
            .node()
            .material()
            .map(|slot| slot.with(|material| material.opacity()));
        assert_eq!(opacity, Some(0.5));
    }

    /// Flags that it was polled, then resolves.
    async fn opening_mesh(polled: Rc<Cell<bool>>) -> Result<Option<MeshNode>> {
        polled.set(true);
        Ok(Some(mesh()))
    }

    #[test]
    fn blocking_inputs_resolve_creation_in_one_pass() {
        let open = Rc::new(Cell::new(false));
        let gate = Rc::clone(&open);
        let object = ObjectBuilder::new()
            .object_async(move |_| {
                opening_mesh(Rc::clone(&gate))
            })
            .build()
            .unwrap();
        let mut registry = Registry::new();
        let mut scene = HeadlessScene::new();
        let camera = Camera::default();
        registry.register("a", &object, &PropertyBag::new(), &mut scene);

        let inputs = FrameInputs::new(&[], &camera).blocking();
        let outcome = registry
            .reconcile(&ObjectId::from("a"), &mut scene, &inputs)
            .unwrap();

        assert!(open.get());
        assert!(outcome.stats().unwrap().created);
    }

    #[test]
    fn end_to_end_single_tracked_field() {
        let changes = counter();
        let seen = Rc::clone(&changes);
        let object = ObjectBuilder::new()
            .defaults(|| {
                props! { "x" => 0.0, "hidden" => false, "start_time" => 0.0, "end_time" => PropValue::Null }
            })
            .object(|_| Some(mesh()))
            .update(["x"], move |_, _| {
                bump(&seen);
                Ok(())
            })
            .build()
            .unwrap();
        let mut harness = Harness::new(&object, PropertyBag::new());

        assert!(harness.pass().unwrap().stats().unwrap().created);
        assert_eq!(changes.get(), 1);

        harness.pass().unwrap();
        assert_eq!(changes.get(), 1);

        harness.set("x", 5.0);
        harness.pass().unwrap();
        assert_eq!(changes.get(), 2);
        assert_eq!(harness.node().transform().position.x, 5.0);
        assert!(!harness.node().is_disposed());
    }

    #[test]
    fn nulls_and_missing_fields_compare_equal() {
        assert!(!changed(None, Some(&PropValue::Null)));
        assert!(!changed(Some(&PropValue::Null), None));
        assert!(changed(None, Some(&PropValue::Number(0.0))));
        assert!(!changed(
            Some(&PropValue::Number(f64::NAN)),
            Some(&PropValue::Number(f64::NAN))
        ));
    }
}
