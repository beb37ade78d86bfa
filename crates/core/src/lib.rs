//! Core library for the reactive visualiser.
//!
//! Visual objects are declared once with an [`ObjectBuilder`] and registered
//! under an [`ObjectId`] with a [`PropertyBag`]. On every pass the
//! [`Scheduler`] reconciles each registered object against its properties:
//! the scene-graph handle is created on first use, patched in place when a
//! tracked field changes, or rebuilt when a rebuild rule fires. Rendering,
//! audio capture and the scene graph itself live behind the traits in
//! [`scene`] and [`audio`].

pub mod analysis;
pub mod assets;
pub mod audio;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod props;
pub mod reconcile;
pub mod registry;
pub mod scene;
pub mod scheduler;
pub mod timeline;
pub mod visualiser;

pub use analysis::{SmoothedValue, SpectrumAnalyser};
pub use assets::{MaterialPool, PooledMaterial};
pub use audio::{AudioEngine, AudioFeed, AudioMode, AudioSource};
pub use config::{AppConfig, AudioConfig, SchedulerConfig};
pub use context::{FrameContext, FrameInputs, Teardown};
pub use descriptor::{CreationStrategy, ObjectBuilder, ObjectDescriptor, Tracked, VisualObject};
pub use error::{HookStage, Result, VisualiserError};
pub use props::{base_defaults, Domain, ObjectId, PropValue, PropertyBag};
pub use reconcile::{ReconcileStats, Reconciled};
pub use registry::Registry;
pub use scene::{Camera, CameraOptions, Renderer, SceneGraph, SceneNode, SceneView};
pub use scheduler::{PassReport, Scheduler, SchedulerState, TickOutcome};
pub use timeline::{Easing, FramePacer, Keyframe, KeyframeTrack, PlaybackClock};
pub use visualiser::Visualiser;
