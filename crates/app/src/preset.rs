use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use reactive_visualiser_core::scene::{MeshNode, Renderer, SceneGraph};
use reactive_visualiser_core::{
    props, Keyframe, KeyframeTrack, ObjectId, PropertyBag, Result, Scheduler, Visualiser,
    VisualiserError,
};
use serde::{Deserialize, Serialize};

use crate::objects::{Catalog, ObjectKind};

/// A named set of objects to show, loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub background_color: Option<String>,
    pub objects: Vec<PresetObject>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    #[serde(default)]
    pub props: PropertyBag,
    /// Field name to keyframes driving it from playback time.
    #[serde(default)]
    pub keyframes: BTreeMap<String, KeyframeTrack>,
}

impl Preset {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let preset: Preset = serde_json::from_str(text)?;
        preset.validate()?;
        Ok(preset)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for object in &self.objects {
            if !seen.insert(&object.id) {
                return Err(VisualiserError::configuration(format!(
                    "object id `{}` is declared twice",
                    object.id
                )));
            }
        }
        Ok(())
    }

    /// Scene used when no preset file is given.
    pub fn demo() -> Self {
        let object = |id: &str, kind: ObjectKind, props: PropertyBag| PresetObject {
            id: ObjectId::from(id),
            kind,
            props,
            keyframes: BTreeMap::new(),
        };

        let mut orbiting = object(
            "box",
            ObjectKind::Box,
            props! { "x" => -2.5, "color" => "#ff8800" },
        );
        orbiting.keyframes.insert(
            "rotation_y".to_string(),
            KeyframeTrack::new(vec![
                Keyframe::new(0.0, 0.0),
                Keyframe::new(10.0, std::f64::consts::TAU),
            ]),
        );

        Self {
            name: Some("demo".to_string()),
            background_color: None,
            objects: vec![
                object("key-light", ObjectKind::Light, props! { "y" => 3.0 }),
                object(
                    "ambient",
                    ObjectKind::Light,
                    props! { "type" => "ambient", "intensity" => 0.3 },
                ),
                object(
                    "orb",
                    ObjectKind::Sphere,
                    props! { "radius_amplitude" => 0.5, "color" => "#66aaff" },
                ),
                orbiting,
                object(
                    "bars",
                    ObjectKind::SpectrumBars,
                    props! { "y" => -2.0, "domain" => "frequency" },
                ),
                object(
                    "wave",
                    ObjectKind::WavePlane,
                    props! { "z" => -3.0, "domain" => "time", "start_time" => 2.0 },
                ),
            ],
        }
    }

    /// Queues every object on `visualiser`.
    pub fn register<S, R>(&self, visualiser: &mut Visualiser<MeshNode, S, R>, catalog: &Catalog)
    where
        S: SceneGraph<MeshNode>,
        R: Renderer<MeshNode>,
    {
        for object in &self.objects {
            visualiser.register(object.id.clone(), catalog.get(object.kind), &object.props);
        }
    }

    /// Attaches keyframe tracks. Objects must already be registered.
    pub fn animate<S, R>(&self, scheduler: &mut Scheduler<MeshNode, S, R>)
    where
        S: SceneGraph<MeshNode>,
        R: Renderer<MeshNode>,
    {
        for object in &self.objects {
            for (field, track) in &object.keyframes {
                if !scheduler.animate(&object.id, field.as_str(), track.clone()) {
                    tracing::warn!(id = %object.id, field, "keyframes for unknown object");
                }
            }
        }
    }
}
