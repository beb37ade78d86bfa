use std::fmt;
use std::time::Duration;

use crate::props::{ObjectId, PropertyBag};
use crate::scene::{Camera, SceneView};

/// Everything a descriptor callback sees for one object on one pass.
pub struct FrameContext<'a, N> {
    pub id: &'a ObjectId,
    pub props: &'a PropertyBag,
    /// Live handles of every other registered object, in registration
    /// order. The object being reconciled is not part of it.
    pub others: SceneView<'a, N>,
    /// Frequency or time-domain bytes for the object's domain.
    pub audio: &'a [u8],
    /// Wall-clock time since the previous executed pass.
    pub delta: Duration,
    /// Current playback time of the audio source, in seconds.
    pub time: f64,
    pub camera: &'a Camera,
    pub frame: u64,
}

impl<N> FrameContext<'_, N> {
    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }
}

impl<N> Clone for FrameContext<'_, N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<N> Copy for FrameContext<'_, N> {}

impl<N> fmt::Debug for FrameContext<'_, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameContext")
            .field("id", self.id)
            .field("props", self.props)
            .field("audio", &self.audio.len())
            .field("delta", &self.delta)
            .field("time", &self.time)
            .field("frame", &self.frame)
            .finish()
    }
}

/// Arguments handed to cleanup hooks.
#[derive(Debug, Clone, Copy)]
pub struct Teardown<'a> {
    pub id: &'a ObjectId,
    pub props: &'a PropertyBag,
}

/// Per-pass inputs shared by every object the scheduler reconciles.
#[derive(Debug, Clone, Copy)]
pub struct FrameInputs<'a> {
    pub audio: &'a [u8],
    pub delta: Duration,
    pub time: f64,
    pub camera: &'a Camera,
    pub frame: u64,
    /// Block on creation futures instead of polling them once. Used by
    /// offline rendering where every frame must be complete.
    pub block_on_creation: bool,
}

impl<'a> FrameInputs<'a> {
    pub fn new(audio: &'a [u8], camera: &'a Camera) -> Self {
        Self {
            audio,
            delta: Duration::ZERO,
            time: 0.0,
            camera,
            frame: 0,
            block_on_creation: false,
        }
    }

    pub fn with_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    pub fn with_delta(mut self, delta: Duration) -> Self {
        self.delta = delta;
        self
    }

    pub fn with_frame(mut self, frame: u64) -> Self {
        self.frame = frame;
        self
    }

    pub fn blocking(mut self) -> Self {
        self.block_on_creation = true;
        self
    }

    pub(crate) fn for_object<'b, N>(
        &self,
        id: &'b ObjectId,
        props: &'b PropertyBag,
        others: SceneView<'b, N>,
    ) -> FrameContext<'b, N>
    where
        'a: 'b,
    {
        FrameContext {
            id,
            props,
            others,
            audio: self.audio,
            delta: self.delta,
            time: self.time,
            camera: self.camera,
            frame: self.frame,
        }
    }
}
