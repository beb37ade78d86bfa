use std::future::Future;

use crate::context::{FrameContext, Teardown};
use crate::descriptor::{
    CleanupFn, Creation, CreationStrategy, DefaultsFn, FactoryFn, GeometryFn, HookFn, MaterialFn,
    ObjectDescriptor, ReactiveRule, Tracked, VisualObject,
};
use crate::props::PropertyBag;
use crate::scene::{FromMesh, Geometry, MaterialSlot};
use crate::{Result, VisualiserError};

/// Fluent assembly of an [`ObjectDescriptor`].
///
/// Every call consumes the builder and hands it back, and [`render`] /
/// [`build`] consume it for good, so a descriptor can only be finalized
/// once. Nothing runs until an object built from it is reconciled.
///
/// ```
/// use reactive_visualiser_core::descriptor::ObjectBuilder;
/// use reactive_visualiser_core::scene::{Color, Geometry, Material, MeshNode};
/// use reactive_visualiser_core::props;
///
/// let orb = ObjectBuilder::<MeshNode>::new()
///     .defaults(|| props! { "radius" => 1.0 })
///     .geometry(|ctx| Geometry::sphere(ctx.props.f32_or("radius", 1.0), 32, 16))
///     .material(|_| Material::standard(Color::WHITE).into())
///     .rebuild_on(["radius"])
///     .render(|_, _| Ok(()))
///     .unwrap();
/// assert_eq!(orb.defaults().number("radius"), Some(1.0));
/// ```
///
/// [`render`]: ObjectBuilder::render
/// [`build`]: ObjectBuilder::build
pub struct ObjectBuilder<N> {
    defaults: Option<DefaultsFn>,
    factory: Option<FactoryFn<N>>,
    geometry: Option<GeometryFn<N>>,
    material: Option<MaterialFn<N>>,
    assemble: Option<fn(Geometry, MaterialSlot) -> N>,
    init: Option<HookFn<N>>,
    rules: Vec<ReactiveRule<N>>,
    cleanup: Option<CleanupFn<N>>,
}

impl<N: 'static> Default for ObjectBuilder<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: 'static> ObjectBuilder<N> {
    pub fn new() -> Self {
        Self {
            defaults: None,
            factory: None,
            geometry: None,
            material: None,
            assemble: None,
            init: None,
            rules: Vec::new(),
            cleanup: None,
        }
    }

    /// Object-specific defaults. They are merged over the base defaults, so
    /// fields returned here win.
    pub fn defaults<F>(mut self, defaults: F) -> Self
    where
        F: Fn() -> PropertyBag + 'static,
    {
        self.defaults = Some(Box::new(defaults));
        self
    }

    /// Synchronous factory. Returning `None` fails creation for that pass.
    pub fn object<F>(self, factory: F) -> Self
    where
        F: Fn(&FrameContext<'_, N>) -> Option<N> + 'static,
    {
        let factory: FactoryFn<N> = Box::new(move |ctx: &FrameContext<'_, N>| -> Creation<N> {
            let node = factory(ctx);
            Box::pin(std::future::ready(Ok(node)))
        });
        self.with_factory(factory)
    }

    /// Asynchronous factory. The returned future must own whatever it needs
    /// from the context; it is polled once per pass until it resolves.
    pub fn object_async<F, Fut>(self, factory: F) -> Self
    where
        F: Fn(&FrameContext<'_, N>) -> Fut + 'static,
        Fut: Future<Output = Result<Option<N>>> + 'static,
    {
        let factory: FactoryFn<N> =
            Box::new(move |ctx: &FrameContext<'_, N>| -> Creation<N> { Box::pin(factory(ctx)) });
        self.with_factory(factory)
    }

    fn with_factory(mut self, factory: FactoryFn<N>) -> Self {
        self.factory = Some(factory);
        self.geometry = None;
        self.material = None;
        self.assemble = None;
        self
    }

    /// Appends a rule that runs `on_change` once for every tracked field
    /// whose value changed since the last pass.
    pub fn update<T, F>(mut self, tracked: T, on_change: F) -> Self
    where
        T: Into<Tracked>,
        F: Fn(&FrameContext<'_, N>, &mut N) -> Result<()> + 'static,
    {
        let tracked = normalize(tracked.into());
        self.rules.push(ReactiveRule {
            tracked,
            rebuild: false,
            on_change: Some(Box::new(on_change)),
        });
        self
    }

    /// Appends a rule that runs on every pass.
    pub fn every_frame<F>(self, on_change: F) -> Self
    where
        F: Fn(&FrameContext<'_, N>, &mut N) -> Result<()> + 'static,
    {
        self.update(Tracked::All, on_change)
    }

    /// Appends a rule that disposes and recreates the handle when any of
    /// `tracked` changes.
    pub fn rebuild_on<T: Into<Tracked>>(mut self, tracked: T) -> Self {
        self.rules.push(ReactiveRule {
            tracked: tracked.into(),
            rebuild: true,
            on_change: None,
        });
        self
    }

    /// Like [`rebuild_on`](Self::rebuild_on); `on_create` runs against every
    /// fresh handle during the creation pass.
    pub fn rebuild_with<T, F>(mut self, tracked: T, on_create: F) -> Self
    where
        T: Into<Tracked>,
        F: Fn(&FrameContext<'_, N>, &mut N) -> Result<()> + 'static,
    {
        self.rules.push(ReactiveRule {
            tracked: tracked.into(),
            rebuild: true,
            on_change: Some(Box::new(on_create)),
        });
        self
    }

    /// One-time hook run right after the handle is created.
    pub fn start<F>(mut self, init: F) -> Self
    where
        F: Fn(&FrameContext<'_, N>, &mut N) -> Result<()> + 'static,
    {
        self.init = Some(Box::new(init));
        self
    }

    /// Hook run before the handle is disposed, on removal and on rebuild.
    pub fn cleanup<F>(mut self, cleanup: F) -> Self
    where
        F: Fn(&Teardown<'_>, &mut N) + 'static,
    {
        self.cleanup = Some(Box::new(cleanup));
        self
    }

    /// Sets the per-frame render hook and finalizes the descriptor.
    pub fn render<F>(self, render: F) -> Result<VisualObject<N>>
    where
        F: Fn(&FrameContext<'_, N>, &mut N) -> Result<()> + 'static,
    {
        self.finish(Some(Box::new(render)))
    }

    /// Finalizes the descriptor without a render hook.
    pub fn build(self) -> Result<VisualObject<N>> {
        self.finish(None)
    }

    fn finish(self, render: Option<HookFn<N>>) -> Result<VisualObject<N>> {
        if let Some(index) = self
            .rules
            .iter()
            .position(|rule| rule.rebuild && rule.tracked.names().is_empty())
        {
            return Err(VisualiserError::configuration(format!(
                "rebuild rule #{index} must track at least one field"
            )));
        }

        let creation = match (self.factory, self.geometry, self.material, self.assemble) {
            (Some(factory), _, _, _) => CreationStrategy::Factory(factory),
            (None, Some(geometry), Some(material), Some(assemble)) => {
                CreationStrategy::GeometryMaterial {
                    geometry,
                    material,
                    assemble,
                }
            }
            (None, Some(_), None, _) => {
                return Err(VisualiserError::configuration(
                    "material() must be called alongside geometry()",
                ))
            }
            (None, None, Some(_), _) => {
                return Err(VisualiserError::configuration(
                    "geometry() must be called alongside material()",
                ))
            }
            _ => {
                return Err(VisualiserError::configuration(
                    "geometry() or object() must be called before render()",
                ))
            }
        };

        Ok(VisualObject::new(ObjectDescriptor {
            defaults: self.defaults,
            creation,
            init: self.init,
            rules: self.rules,
            render,
            cleanup: self.cleanup,
        }))
    }
}

impl<N: FromMesh + 'static> ObjectBuilder<N> {
    /// Geometry half of the geometry + material creation strategy.
    pub fn geometry<F>(mut self, geometry: F) -> Self
    where
        F: Fn(&FrameContext<'_, N>) -> Geometry + 'static,
    {
        self.factory = None;
        self.geometry = Some(Box::new(geometry));
        self.assemble = Some(N::from_mesh);
        self
    }

    /// Material half of the geometry + material creation strategy.
    pub fn material<F>(mut self, material: F) -> Self
    where
        F: Fn(&FrameContext<'_, N>) -> MaterialSlot + 'static,
    {
        self.factory = None;
        self.material = Some(Box::new(material));
        self.assemble = Some(N::from_mesh);
        self
    }
}

fn normalize(tracked: Tracked) -> Tracked {
    match tracked {
        Tracked::Fields(fields) if fields.is_empty() => {
            tracing::warn!("update rule registered without tracked fields, running it every frame");
            Tracked::All
        }
        other => other,
    }
}
