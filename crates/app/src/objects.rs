//! Demo visual objects wired through the builder.

use std::cell::RefCell;

use reactive_visualiser_core::analysis::{features, SmoothedValue};
use reactive_visualiser_core::assets::MaterialPool;
use reactive_visualiser_core::props::Vec3;
use reactive_visualiser_core::scene::{
    Color, Geometry, Light, LightKind, Material, MeshNode, ShaderMaterial,
};
use reactive_visualiser_core::{props, ObjectBuilder, PropertyBag, Result, SceneNode, VisualObject};
use serde::{Deserialize, Serialize};

/// Kinds of object a preset can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    Sphere,
    Box,
    Light,
    WavePlane,
    SpectrumBars,
}

/// One descriptor per [`ObjectKind`], sharing a material pool.
pub struct Catalog {
    pool: MaterialPool,
    sphere: VisualObject<MeshNode>,
    cuboid: VisualObject<MeshNode>,
    light: VisualObject<MeshNode>,
    wave_plane: VisualObject<MeshNode>,
    spectrum_bars: VisualObject<MeshNode>,
}

impl Catalog {
    pub fn new() -> Result<Self> {
        let pool = MaterialPool::new();
        Ok(Self {
            sphere: sphere()?,
            cuboid: cuboid(&pool)?,
            light: light()?,
            wave_plane: wave_plane()?,
            spectrum_bars: spectrum_bars()?,
            pool,
        })
    }

    pub fn get(&self, kind: ObjectKind) -> &VisualObject<MeshNode> {
        match kind {
            ObjectKind::Sphere => &self.sphere,
            ObjectKind::Box => &self.cuboid,
            ObjectKind::Light => &self.light,
            ObjectKind::WavePlane => &self.wave_plane,
            ObjectKind::SpectrumBars => &self.spectrum_bars,
        }
    }

    pub fn pool(&self) -> &MaterialPool {
        &self.pool
    }
}

fn color(props: &PropertyBag) -> Color {
    Color::parse_or(props.text("color").unwrap_or_default(), Color::WHITE)
}

/// Sphere whose radius pulses with the average level.
fn sphere() -> Result<VisualObject<MeshNode>> {
    ObjectBuilder::new()
        .defaults(|| {
            props! {
                "radius" => 1.0,
                "radius_amplitude" => 0.0,
                "color" => "#ffffff",
                "opacity" => 1.0,
            }
        })
        .geometry(|ctx| Geometry::sphere(ctx.props.f32_or("radius", 1.0), 32, 32))
        .material(|ctx| {
            Material::standard(color(ctx.props))
                .with_opacity(ctx.props.f32_or("opacity", 1.0))
                .into()
        })
        .rebuild_on(["radius"])
        .update(["color"], |ctx, node: &mut MeshNode| {
            let color = color(ctx.props);
            if let Some(material) = node.material_mut() {
                material.with_mut(|material| material.set_color(color));
            }
            Ok(())
        })
        .render(|ctx, node| {
            let amplitude = ctx.props.f32_or("radius_amplitude", 0.0);
            let pulse = 1.0 + amplitude * features::average(ctx.audio);
            let scale = ctx.props.transform().scale;
            node.set_scale(Vec3::new(scale.x * pulse, scale.y * pulse, scale.z * pulse));
            Ok(())
        })
}

/// Box whose material is shared with every other box of the same colour.
fn cuboid(pool: &MaterialPool) -> Result<VisualObject<MeshNode>> {
    let pool = pool.clone();
    ObjectBuilder::new()
        .defaults(|| {
            props! {
                "width" => 1.0,
                "height" => 1.0,
                "depth" => 1.0,
                "color" => "#ffffff",
            }
        })
        .geometry(|ctx| {
            Geometry::cuboid(
                ctx.props.f32_or("width", 1.0),
                ctx.props.f32_or("height", 1.0),
                ctx.props.f32_or("depth", 1.0),
            )
        })
        .material(move |ctx| {
            let color = color(ctx.props);
            pool.acquire(&format!("box:{color}"), || Material::standard(color))
                .into()
        })
        .rebuild_on(["width", "height", "depth", "color"])
        .build()
}

fn light() -> Result<VisualObject<MeshNode>> {
    ObjectBuilder::new()
        .defaults(|| {
            props! {
                "intensity" => 1.0,
                "type" => "point",
                "color" => "#ffffff",
                "z" => 5.0,
            }
        })
        .object(|ctx| {
            let kind = LightKind::parse(ctx.props.text("type").unwrap_or("point"))?;
            Some(MeshNode::light(Light {
                kind,
                color: color(ctx.props),
                intensity: ctx.props.f32_or("intensity", 1.0),
            }))
        })
        .rebuild_on(["type"])
        .update(["color", "intensity"], |ctx, node| {
            if let Some(light) = node.light_mut() {
                light.color = color(ctx.props);
                light.intensity = ctx.props.f32_or("intensity", 1.0);
            }
            Ok(())
        })
        .build()
}

const WAVE_VERTEX: &str = "
uniform float u_time;
uniform float u_audio;
varying vec2 v_uv;

void main() {
    v_uv = uv;
    vec3 pos = position;
    pos.z += sin((pos.x + u_time * 2.0) * 10.0) * 0.2 * u_audio;
    gl_Position = projectionMatrix * modelViewMatrix * vec4(pos, 1.0);
}
";

const WAVE_FRAGMENT: &str = "
uniform float u_time;
uniform float u_audio;
uniform float u_opacity;
varying vec2 v_uv;

void main() {
    float pulse = sin(u_time * 2.0) * 0.5 + 0.5;
    gl_FragColor = vec4(v_uv.x + u_audio, v_uv.y * pulse, 1.0 - u_audio, u_opacity);
}
";

/// Shader plane rippling with the smoothed average level.
fn wave_plane() -> Result<VisualObject<MeshNode>> {
    let smoothed = RefCell::new(SmoothedValue::new(0.6));
    ObjectBuilder::new()
        .defaults(|| props! { "size" => 5.0, "segments" => 5.0 })
        .geometry(|ctx| {
            let size = ctx.props.f32_or("size", 5.0);
            Geometry::plane(size, size, ctx.props.f32_or("segments", 5.0) as u32)
        })
        .material(|ctx| {
            Material::shader(
                ShaderMaterial::new(WAVE_VERTEX, WAVE_FRAGMENT)
                    .with_uniform("u_time", 0.0)
                    .with_uniform("u_audio", features::average(ctx.audio)),
            )
            .into()
        })
        .rebuild_on(["size", "segments"])
        .render(move |ctx, node: &mut MeshNode| {
            let level = smoothed.borrow_mut().update(features::average(ctx.audio));
            if let Some(material) = node.material_mut() {
                material.with_mut(|material| {
                    if let Some(shader) = material.shader_mut() {
                        shader.set_uniform("u_audio", level);
                        shader.set_uniform("u_time", ctx.time as f32);
                    }
                });
            }
            Ok(())
        })
}

/// Row of bars, one per frequency band.
fn spectrum_bars() -> Result<VisualObject<MeshNode>> {
    ObjectBuilder::new()
        .defaults(|| {
            props! {
                "count" => 16.0,
                "spacing" => 0.3,
                "amplitude" => 4.0,
                "color" => "#33ccff",
            }
        })
        .object(|ctx| {
            let count = ctx.props.number_or("count", 16.0).max(1.0) as usize;
            let color = color(ctx.props);
            let bars = (0..count)
                .map(|_| MeshNode::mesh(Geometry::cuboid(0.2, 1.0, 0.2), Material::basic(color)))
                .collect();
            Some(MeshNode::group(bars))
        })
        .rebuild_on(["count"])
        .update(["color"], |ctx, node| {
            let color = color(ctx.props);
            for bar in node.children_mut() {
                if let Some(material) = bar.material_mut() {
                    material.with_mut(|material| material.set_color(color));
                }
            }
            Ok(())
        })
        .render(|ctx, node| {
            let spacing = ctx.props.f32_or("spacing", 0.3);
            let amplitude = ctx.props.f32_or("amplitude", 4.0);
            let bars = node.children_mut();
            let count = bars.len();
            let offset = (count as f32 - 1.0) * spacing / 2.0;
            let band = (ctx.audio.len() / count).max(1);
            for (index, bar) in bars.iter_mut().enumerate() {
                let start = index * band;
                let energy = features::band_energy(ctx.audio, start, start + band);
                let height = 0.05 + amplitude * energy;
                bar.set_position(Vec3::new(index as f32 * spacing - offset, height / 2.0, 0.0));
                bar.set_scale(Vec3::new(1.0, height, 1.0));
            }
            Ok(())
        })
}
