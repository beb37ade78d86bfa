//! Entry point for code that declares objects before a scheduler exists.

use std::fmt;

use crate::descriptor::VisualObject;
use crate::props::{ObjectId, PropertyBag};
use crate::registry::RemovalHook;
use crate::scene::{Renderer, SceneGraph, SceneNode};
use crate::scheduler::Scheduler;

enum PendingOp<N> {
    Register {
        id: ObjectId,
        object: VisualObject<N>,
        props: PropertyBag,
        on_remove: Option<RemovalHook>,
    },
    Remove(ObjectId),
}

/// Forwards registrations to an attached [`Scheduler`], or queues them until
/// one is attached.
pub struct Visualiser<N, S, R> {
    scheduler: Option<Scheduler<N, S, R>>,
    pending: Vec<PendingOp<N>>,
}

impl<N, S, R> Default for Visualiser<N, S, R> {
    fn default() -> Self {
        Self {
            scheduler: None,
            pending: Vec::new(),
        }
    }
}

impl<N, S, R> Visualiser<N, S, R>
where
    N: SceneNode + 'static,
    S: SceneGraph<N>,
    R: Renderer<N>,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<ObjectId>, object: &VisualObject<N>, props: &PropertyBag) {
        self.push(PendingOp::Register {
            id: id.into(),
            object: object.clone(),
            props: props.clone(),
            on_remove: None,
        });
    }

    pub fn register_with_cleanup<F>(
        &mut self,
        id: impl Into<ObjectId>,
        object: &VisualObject<N>,
        props: &PropertyBag,
        on_remove: F,
    ) where
        F: FnOnce() + 'static,
    {
        self.push(PendingOp::Register {
            id: id.into(),
            object: object.clone(),
            props: props.clone(),
            on_remove: Some(Box::new(on_remove)),
        });
    }

    pub fn remove(&mut self, id: impl Into<ObjectId>) {
        self.push(PendingOp::Remove(id.into()));
    }

    /// Takes ownership of `scheduler` and replays every queued operation on
    /// it in the order it was issued.
    pub fn attach(&mut self, mut scheduler: Scheduler<N, S, R>) {
        let pending = std::mem::take(&mut self.pending);
        if !pending.is_empty() {
            tracing::debug!(operations = pending.len(), "flushing queued registrations");
        }
        for op in pending {
            apply(&mut scheduler, op);
        }
        self.scheduler = Some(scheduler);
    }

    /// Hands the scheduler back. Later calls queue again.
    pub fn detach(&mut self) -> Option<Scheduler<N, S, R>> {
        self.scheduler.take()
    }

    pub fn is_attached(&self) -> bool {
        self.scheduler.is_some()
    }

    /// Operations waiting for a scheduler.
    pub fn queued(&self) -> usize {
        self.pending.len()
    }

    pub fn scheduler(&self) -> Option<&Scheduler<N, S, R>> {
        self.scheduler.as_ref()
    }

    pub fn scheduler_mut(&mut self) -> Option<&mut Scheduler<N, S, R>> {
        self.scheduler.as_mut()
    }

    fn push(&mut self, op: PendingOp<N>) {
        match self.scheduler.as_mut() {
            Some(scheduler) => apply(scheduler, op),
            None => self.pending.push(op),
        }
    }
}

fn apply<N, S, R>(scheduler: &mut Scheduler<N, S, R>, op: PendingOp<N>)
where
    N: SceneNode + 'static,
    S: SceneGraph<N>,
    R: Renderer<N>,
{
    match op {
        PendingOp::Register {
            id,
            object,
            props,
            on_remove: Some(on_remove),
        } => scheduler.register_with_cleanup(id, &object, &props, on_remove),
        PendingOp::Register {
            id, object, props, ..
        } => scheduler.register(id, &object, &props),
        PendingOp::Remove(id) => {
            scheduler.remove(&id);
        }
    }
}

impl<N, S, R> fmt::Debug for Visualiser<N, S, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Visualiser")
            .field("attached", &self.scheduler.is_some())
            .field("queued", &self.pending.len())
            .finish()
    }
}
