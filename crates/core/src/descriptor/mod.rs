//! Immutable object descriptors and the callbacks they carry.
//!
//! A descriptor is assembled once with [`ObjectBuilder`] and shared (via
//! `Rc`) by every registry entry that declares an object of that kind.

mod builder;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

pub use builder::ObjectBuilder;

use crate::context::{FrameContext, Teardown};
use crate::props::PropertyBag;
use crate::scene::{Geometry, MaterialSlot};
use crate::Result;

/// Pending creation of a handle. Resolving to `Ok(None)` is a creation
/// failure.
pub type Creation<N> = Pin<Box<dyn Future<Output = Result<Option<N>>>>>;

/// Callback run against a live handle: init, reactive rules and render.
pub type HookFn<N> = Box<dyn Fn(&FrameContext<'_, N>, &mut N) -> Result<()>>;
pub type FactoryFn<N> = Box<dyn Fn(&FrameContext<'_, N>) -> Creation<N>>;
pub type CleanupFn<N> = Box<dyn Fn(&Teardown<'_>, &mut N)>;
pub type DefaultsFn = Box<dyn Fn() -> PropertyBag>;
pub type GeometryFn<N> = Box<dyn Fn(&FrameContext<'_, N>) -> Geometry>;
pub type MaterialFn<N> = Box<dyn Fn(&FrameContext<'_, N>) -> MaterialSlot>;

/// Fields a reactive rule watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tracked {
    /// Fire on every reconciliation.
    All,
    /// Fire once per listed field whose value changed.
    Fields(Vec<String>),
}

impl Tracked {
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Tracked::Fields(fields.into_iter().map(Into::into).collect())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Tracked::All)
    }

    /// Listed field names; empty for [`Tracked::All`].
    pub fn names(&self) -> &[String] {
        match self {
            Tracked::All => &[],
            Tracked::Fields(fields) => fields,
        }
    }
}

impl<const K: usize> From<[&str; K]> for Tracked {
    fn from(fields: [&str; K]) -> Self {
        Tracked::fields(fields)
    }
}

impl From<&[&str]> for Tracked {
    fn from(fields: &[&str]) -> Self {
        Tracked::fields(fields.iter().copied())
    }
}

impl From<Vec<&str>> for Tracked {
    fn from(fields: Vec<&str>) -> Self {
        Tracked::fields(fields)
    }
}

impl From<Vec<String>> for Tracked {
    fn from(fields: Vec<String>) -> Self {
        Tracked::Fields(fields)
    }
}

impl From<&str> for Tracked {
    fn from(field: &str) -> Self {
        Tracked::fields([field])
    }
}

/// One reactive update rule.
pub struct ReactiveRule<N> {
    pub(crate) tracked: Tracked,
    pub(crate) rebuild: bool,
    pub(crate) on_change: Option<HookFn<N>>,
}

impl<N> ReactiveRule<N> {
    pub fn tracked(&self) -> &Tracked {
        &self.tracked
    }

    pub fn rebuilds(&self) -> bool {
        self.rebuild
    }
}

impl<N> fmt::Debug for ReactiveRule<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveRule")
            .field("tracked", &self.tracked)
            .field("rebuild", &self.rebuild)
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}

/// How a descriptor produces its handle. Resolved once when the builder is
/// finalized.
pub enum CreationStrategy<N> {
    /// Build a geometry and a material, then join them into a handle.
    GeometryMaterial {
        geometry: GeometryFn<N>,
        material: MaterialFn<N>,
        assemble: fn(Geometry, MaterialSlot) -> N,
    },
    /// Arbitrary, possibly asynchronous, factory.
    Factory(FactoryFn<N>),
}

impl<N: 'static> CreationStrategy<N> {
    pub(crate) fn create(&self, ctx: &FrameContext<'_, N>) -> Creation<N> {
        match self {
            CreationStrategy::GeometryMaterial {
                geometry,
                material,
                assemble,
            } => {
                let node = assemble(geometry(ctx), material(ctx));
                Box::pin(std::future::ready(Ok(Some(node))))
            }
            CreationStrategy::Factory(factory) => factory(ctx),
        }
    }
}

impl<N> fmt::Debug for CreationStrategy<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreationStrategy::GeometryMaterial { .. } => f.write_str("GeometryMaterial"),
            CreationStrategy::Factory(_) => f.write_str("Factory"),
        }
    }
}

/// Finalized, immutable description of one kind of visual object.
pub struct ObjectDescriptor<N> {
    pub(crate) defaults: Option<DefaultsFn>,
    pub(crate) creation: CreationStrategy<N>,
    pub(crate) init: Option<HookFn<N>>,
    pub(crate) rules: Vec<ReactiveRule<N>>,
    pub(crate) render: Option<HookFn<N>>,
    pub(crate) cleanup: Option<CleanupFn<N>>,
}

impl<N> ObjectDescriptor<N> {
    /// Base defaults with the descriptor's own defaults laid on top.
    pub fn defaults(&self) -> PropertyBag {
        let base = crate::props::base_defaults();
        match &self.defaults {
            Some(defaults) => base.merged_with(&defaults()),
            None => base,
        }
    }

    pub fn creation(&self) -> &CreationStrategy<N> {
        &self.creation
    }

    pub fn rules(&self) -> &[ReactiveRule<N>] {
        &self.rules
    }

    pub fn has_init(&self) -> bool {
        self.init.is_some()
    }

    pub fn has_render(&self) -> bool {
        self.render.is_some()
    }

    pub fn has_cleanup(&self) -> bool {
        self.cleanup.is_some()
    }

    /// Runs the cleanup hook, if any, against `node`.
    pub(crate) fn run_cleanup(&self, teardown: &Teardown<'_>, node: &mut N) {
        if let Some(cleanup) = &self.cleanup {
            cleanup(teardown, node);
        }
    }
}

impl<N> fmt::Debug for ObjectDescriptor<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectDescriptor")
            .field("creation", &self.creation)
            .field("rules", &self.rules)
            .field("init", &self.init.is_some())
            .field("render", &self.render.is_some())
            .field("cleanup", &self.cleanup.is_some())
            .finish()
    }
}

/// The product of [`ObjectBuilder::render`]: a shared descriptor plus its
/// computed default properties.
pub struct VisualObject<N> {
    descriptor: Rc<ObjectDescriptor<N>>,
    defaults: PropertyBag,
}

impl<N> VisualObject<N> {
    pub(crate) fn new(descriptor: ObjectDescriptor<N>) -> Self {
        let defaults = descriptor.defaults();
        Self {
            descriptor: Rc::new(descriptor),
            defaults,
        }
    }

    pub fn descriptor(&self) -> &Rc<ObjectDescriptor<N>> {
        &self.descriptor
    }

    pub fn defaults(&self) -> &PropertyBag {
        &self.defaults
    }

    /// Defaults with `overrides` applied; the caller's fields win.
    pub fn props(&self, overrides: &PropertyBag) -> PropertyBag {
        self.defaults.merged_with(overrides)
    }

    pub fn is_same(&self, other: &VisualObject<N>) -> bool {
        Rc::ptr_eq(&self.descriptor, &other.descriptor)
    }
}

impl<N> Clone for VisualObject<N> {
    fn clone(&self) -> Self {
        Self {
            descriptor: Rc::clone(&self.descriptor),
            defaults: self.defaults.clone(),
        }
    }
}

impl<N> fmt::Debug for VisualObject<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisualObject")
            .field("descriptor", &self.descriptor)
            .field("defaults", &self.defaults)
            .finish()
    }
}
