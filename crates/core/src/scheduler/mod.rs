//! Cooperative frame loop.
//!
//! The host calls [`Scheduler::tick`] on every display refresh. The pacer
//! decides whether a logic pass is due; if so every registered object is
//! reconciled in registration order and the renderer draws once.

use std::time::Duration;

use crate::audio::AudioSource;
use crate::config::AppConfig;
use crate::context::FrameInputs;
use crate::descriptor::VisualObject;
use crate::props::{Domain, ObjectId, PropertyBag};
use crate::reconcile::Reconciled;
use crate::registry::Registry;
use crate::scene::{Camera, CameraOptions, Color, Renderer, SceneGraph, SceneNode, SceneView};
use crate::timeline::{frame_step, FramePacer, KeyframeTrack};
use crate::{Result, VisualiserError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// Result of one display tick.
#[derive(Debug)]
pub enum TickOutcome {
    /// The scheduler is stopped; nothing ran.
    Stopped,
    /// Not enough time has passed since the last pass.
    Throttled,
    /// No audio could be read, so no object was touched this pass.
    AudioUnavailable,
    Ran(PassReport),
}

impl TickOutcome {
    pub fn report(&self) -> Option<&PassReport> {
        match self {
            TickOutcome::Ran(report) => Some(report),
            _ => None,
        }
    }
}

/// What one logic pass did, per object.
#[derive(Debug, Default)]
pub struct PassReport {
    pub frame: u64,
    /// Playback time the pass ran at, in seconds.
    pub time: f64,
    pub delta: Duration,
    pub reconciled: Vec<ObjectId>,
    /// Objects outside their time window.
    pub skipped: Vec<ObjectId>,
    /// Objects whose creation has not resolved yet.
    pub pending: Vec<ObjectId>,
    pub failed: Vec<(ObjectId, VisualiserError)>,
    pub drawn: bool,
}

impl PassReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.drawn
    }
}

/// Owns the registry and drives it against a scene, a renderer and an audio
/// source.
pub struct Scheduler<N, S, R> {
    registry: Registry<N>,
    scene: S,
    renderer: R,
    camera: Camera,
    audio: Option<Box<dyn AudioSource>>,
    state: SchedulerState,
    pacer: FramePacer,
    frame: u64,
    frequency: Vec<u8>,
    time_domain: Vec<u8>,
}

impl<N, S, R> Scheduler<N, S, R>
where
    N: SceneNode + 'static,
    S: SceneGraph<N>,
    R: Renderer<N>,
{
    pub fn new(config: &AppConfig, scene: S, mut renderer: R) -> Result<Self> {
        config.validate()?;
        renderer.set_clear_color(config.background());
        Ok(Self {
            registry: Registry::new(),
            scene,
            renderer,
            camera: Camera::new(&config.camera, 1, 1),
            audio: None,
            state: SchedulerState::Stopped,
            pacer: FramePacer::new(config.scheduler.fps)?,
            frame: 0,
            frequency: Vec::new(),
            time_domain: Vec::new(),
        })
    }

    /// Starts the loop. The first tick afterwards runs a pass immediately.
    pub fn start(&mut self) {
        if self.state == SchedulerState::Running {
            return;
        }
        self.state = SchedulerState::Running;
        self.pacer.reset();
        tracing::info!(fps = self.pacer.fps(), objects = self.registry.len(), "scheduler started");
    }

    /// Stops the loop. Pending creations stay parked and resume once the
    /// scheduler is started again.
    pub fn stop(&mut self) {
        if self.state == SchedulerState::Stopped {
            return;
        }
        self.state = SchedulerState::Stopped;
        tracing::info!(frames = self.frame, "scheduler stopped");
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Running
    }

    pub fn fps(&self) -> f64 {
        self.pacer.fps()
    }

    /// Changes the target pass rate. Rates that cannot be scheduled are
    /// ignored.
    pub fn set_fps(&mut self, fps: f64) {
        if let Err(err) = self.pacer.set_fps(fps) {
            tracing::warn!(fps, %err, "ignoring frame rate");
        }
    }

    /// Handles one display tick at host time `now`.
    pub fn tick(&mut self, now: Duration) -> TickOutcome {
        if self.state == SchedulerState::Stopped {
            return TickOutcome::Stopped;
        }
        let Some(elapsed) = self.pacer.due(now) else {
            return TickOutcome::Throttled;
        };
        self.pacer.record(now);

        let time = match self.read_audio() {
            Ok(time) => time,
            Err(err) => {
                tracing::warn!(error = %err, "skipping pass");
                return TickOutcome::AudioUnavailable;
            }
        };
        TickOutcome::Ran(self.run_pass(elapsed, time, false))
    }

    /// Runs one pass right away, ignoring the pacer and the running state.
    pub fn render_once(&mut self) -> Result<PassReport> {
        let time = self.read_audio()?;
        Ok(self.run_pass(Duration::ZERO, time, false))
    }

    /// Renders the whole attached track at a fixed step of `1 / fps`
    /// seconds. Every creation is awaited, so each frame is complete.
    /// `on_frame` sees the renderer after each draw. Returns the number of
    /// frames rendered.
    pub fn render_offline<F>(&mut self, fps: f64, mut on_frame: F) -> Result<u64>
    where
        F: FnMut(&PassReport, &R) -> Result<()>,
    {
        let step = frame_step(fps)?;
        let duration = self
            .audio
            .as_ref()
            .ok_or_else(|| VisualiserError::AudioUnavailable("no audio source attached".into()))?
            .duration()
            .ok_or_else(|| {
                VisualiserError::AudioUnavailable("audio source has no known duration".into())
            })?;

        let frames = (duration * fps).ceil() as u64;
        tracing::info!(frames, fps, duration, "rendering offline");

        for index in 0..frames {
            let time = index as f64 / fps;
            if let Some(audio) = self.audio.as_mut() {
                audio.seek(time)?;
            }
            let time = self.read_audio()?;
            let report = self.run_pass(step, time, true);
            on_frame(&report, &self.renderer)?;
        }
        Ok(frames)
    }

    fn read_audio(&mut self) -> Result<f64> {
        let Some(audio) = self.audio.as_mut() else {
            return Err(VisualiserError::AudioUnavailable(
                "no audio source attached".into(),
            ));
        };

        let (mut frequency, mut time) = (false, false);
        for id in self.registry.ids() {
            match self.registry.props(id).map(PropertyBag::domain) {
                Some(Domain::Frequency) => frequency = true,
                Some(Domain::Time) => time = true,
                None => {}
            }
        }
        if frequency {
            audio.read(Domain::Frequency, &mut self.frequency)?;
        }
        if time {
            audio.read(Domain::Time, &mut self.time_domain)?;
        }
        Ok(audio.current_time())
    }

    fn run_pass(&mut self, delta: Duration, time: f64, blocking: bool) -> PassReport {
        self.frame += 1;
        let mut report = PassReport {
            frame: self.frame,
            time,
            delta,
            ..PassReport::default()
        };

        let ids: Vec<ObjectId> = self.registry.ids().cloned().collect();
        for id in ids {
            self.registry.apply_animations(&id, time);
            let Some((window, domain)) = self
                .registry
                .props(&id)
                .map(|props| (props.window(), props.domain()))
            else {
                continue;
            };

            if window.is_out_of_window(time) {
                self.registry.set_visible(&id, false);
                report.skipped.push(id);
                continue;
            }
            self.registry.set_visible(&id, !window.hidden);

            let audio = match domain {
                Domain::Frequency => self.frequency.as_slice(),
                Domain::Time => self.time_domain.as_slice(),
            };
            let mut inputs = FrameInputs::new(audio, &self.camera)
                .with_time(time)
                .with_delta(delta)
                .with_frame(self.frame);
            if blocking {
                inputs = inputs.blocking();
            }

            match self.registry.reconcile(&id, &mut self.scene, &inputs) {
                Ok(Reconciled::Applied(stats)) => {
                    if stats.created || stats.rebuilds > 0 {
                        self.registry.set_visible(&id, !window.hidden);
                    }
                    report.reconciled.push(id);
                }
                Ok(Reconciled::CreationPending) => report.pending.push(id),
                Ok(Reconciled::Missing) => {}
                Err(err) => {
                    tracing::warn!(%id, error = %err, "reconciliation failed");
                    report.failed.push((id, err));
                }
            }
        }

        match self
            .renderer
            .draw(&self.camera, &SceneView::new(&self.registry))
        {
            Ok(()) => report.drawn = true,
            Err(err) => tracing::warn!(frame = self.frame, error = %err, "draw failed"),
        }
        report
    }

    pub fn attach_audio(&mut self, source: impl AudioSource + 'static) {
        self.audio = Some(Box::new(source));
    }

    pub fn detach_audio(&mut self) -> Option<Box<dyn AudioSource>> {
        self.audio.take()
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    pub fn register(
        &mut self,
        id: impl Into<ObjectId>,
        object: &VisualObject<N>,
        overrides: &PropertyBag,
    ) {
        self.registry
            .register(id, object, overrides, &mut self.scene);
    }

    pub fn register_with_cleanup<F>(
        &mut self,
        id: impl Into<ObjectId>,
        object: &VisualObject<N>,
        overrides: &PropertyBag,
        on_remove: F,
    ) where
        F: FnOnce() + 'static,
    {
        self.registry
            .register_with_cleanup(id, object, overrides, on_remove, &mut self.scene);
    }

    pub fn remove(&mut self, id: &ObjectId) -> bool {
        self.registry.remove(id, &mut self.scene)
    }

    pub fn clear(&mut self) {
        self.registry.clear(&mut self.scene);
    }

    pub fn set_props(&mut self, id: &ObjectId, patch: &PropertyBag) -> bool {
        self.registry.set_props(id, patch)
    }

    pub fn animate(&mut self, id: &ObjectId, field: impl Into<String>, track: KeyframeTrack) -> bool {
        self.registry.animate(id, field, track)
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn set_camera_options(&mut self, options: &CameraOptions) {
        self.camera.apply_options(options);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.resize(width, height);
        self.renderer.resize(width, height);
    }

    pub fn set_background_color(&mut self, color: &str) -> Result<()> {
        let color: Color = color.parse()?;
        self.renderer.set_clear_color(color);
        Ok(())
    }

    pub fn registry(&self) -> &Registry<N> {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry<N> {
        &mut self.registry
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn frames(&self) -> u64 {
        self.frame
    }
}

impl<N, S, R> std::fmt::Debug for Scheduler<N, S, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("state", &self.state)
            .field("pacer", &self.pacer)
            .field("frame", &self.frame)
            .field("objects", &self.registry)
            .field("audio", &self.audio.is_some())
            .finish()
    }
}
