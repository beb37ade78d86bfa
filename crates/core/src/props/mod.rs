//! Property model shared by every declared visual object.
//!
//! Properties are an open, ordered map of field name to [`PropValue`]. The
//! engine only interprets the base fields listed in [`fields`]; every other
//! field is opaque unless a reactive rule names it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Result, VisualiserError};

/// Names of the base fields every property bag carries.
pub mod fields {
    pub const DOMAIN: &str = "domain";
    pub const X: &str = "x";
    pub const Y: &str = "y";
    pub const Z: &str = "z";
    pub const ROTATION_X: &str = "rotation_x";
    pub const ROTATION_Y: &str = "rotation_y";
    pub const ROTATION_Z: &str = "rotation_z";
    pub const SCALE_X: &str = "scale_x";
    pub const SCALE_Y: &str = "scale_y";
    pub const SCALE_Z: &str = "scale_z";
    pub const START_TIME: &str = "start_time";
    pub const END_TIME: &str = "end_time";
    pub const HIDDEN: &str = "hidden";
    /// Optional; applied recursively to materials when present.
    pub const OPACITY: &str = "opacity";

    /// The nine transform fields in position, rotation, scale order.
    pub const TRANSFORM: [&str; 9] = [
        X, Y, Z, ROTATION_X, ROTATION_Y, ROTATION_Z, SCALE_X, SCALE_Y, SCALE_Z,
    ];
}

/// Caller-chosen identifier of a declared object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObjectId {
    Index(i64),
    Name(String),
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectId::Index(index) => write!(f, "{index}"),
            ObjectId::Name(name) => f.write_str(name),
        }
    }
}

impl From<i64> for ObjectId {
    fn from(value: i64) -> Self {
        Self::Index(value)
    }
}

impl From<i32> for ObjectId {
    fn from(value: i32) -> Self {
        Self::Index(i64::from(value))
    }
}

impl From<u32> for ObjectId {
    fn from(value: u32) -> Self {
        Self::Index(i64::from(value))
    }
}

impl From<&str> for ObjectId {
    fn from(value: &str) -> Self {
        Self::Name(value.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(value: String) -> Self {
        Self::Name(value)
    }
}

impl From<&ObjectId> for ObjectId {
    fn from(value: &ObjectId) -> Self {
        value.clone()
    }
}

/// Which audio representation an object is fed each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    #[default]
    Frequency,
    Time,
}

impl Domain {
    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Frequency => "frequency",
            Domain::Time => "time",
        }
    }
}

impl FromStr for Domain {
    type Err = VisualiserError;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "frequency" => Ok(Domain::Frequency),
            "time" => Ok(Domain::Time),
            other => Err(VisualiserError::configuration(format!(
                "unknown audio domain `{other}`"
            ))),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum PropValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<PropValue>),
}

impl PropValue {
    /// Equality used for change detection. Unlike `==`, a NaN number is the
    /// same as another NaN so it does not re-trigger every frame.
    pub fn same_as(&self, other: &PropValue) -> bool {
        match (self, other) {
            (PropValue::Number(a), PropValue::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (PropValue::List(a), PropValue::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_as(y))
            }
            _ => self == other,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, PropValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropValue::Number(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PropValue]> {
        match self {
            PropValue::List(values) => Some(values),
            _ => None,
        }
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<f32> for PropValue {
    fn from(value: f32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for PropValue {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Domain> for PropValue {
    fn from(value: Domain) -> Self {
        Self::Text(value.as_str().to_string())
    }
}

impl<T: Into<PropValue>> From<Option<T>> for PropValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(PropValue::Null)
    }
}

impl<T: Into<PropValue>> From<Vec<T>> for PropValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// 3D vector used for node transforms.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::splat(0.0);
    pub const ONE: Vec3 = Vec3::splat(1.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub const fn splat(v: f32) -> Self {
        Self { x: v, y: v, z: v }
    }
}

/// Position, Euler rotation (radians) and scale of a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

/// The `[start_time, end_time)` range in which an object is updated and
/// shown, plus the manual `hidden` override.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityWindow {
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub hidden: bool,
}

impl Default for VisibilityWindow {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            end_time: None,
            hidden: false,
        }
    }
}

impl VisibilityWindow {
    /// True when `time` is before the start or past the end of the window.
    pub fn is_out_of_window(&self, time: f64) -> bool {
        let ended = self.end_time.map(|end| end <= time).unwrap_or(false);
        ended || self.start_time > time
    }

    /// Visibility the node should have at `time`.
    pub fn is_visible_at(&self, time: f64) -> bool {
        !self.hidden && !self.is_out_of_window(time)
    }
}

/// Typed view over the base fields of a [`PropertyBag`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualiserObject {
    pub domain: Domain,
    pub transform: Transform,
    pub window: VisibilityWindow,
}

/// Mapping from field name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyBag {
    fields: BTreeMap<String, PropValue>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.fields.get(key)
    }

    /// Sets `key`, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Option<PropValue> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<PropValue> {
        self.fields.remove(key)
    }

    /// Chaining variant of [`PropertyBag::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Copies every field of `overrides` into `self`; fields of `overrides`
    /// win.
    pub fn merge(&mut self, overrides: &PropertyBag) {
        for (key, value) in &overrides.fields {
            self.fields.insert(key.clone(), value.clone());
        }
    }

    /// Returns `self` with `overrides` laid on top.
    pub fn merged_with(&self, overrides: &PropertyBag) -> PropertyBag {
        let mut merged = self.clone();
        merged.merge(overrides);
        merged
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(PropValue::as_f64)
    }

    pub fn number_or(&self, key: &str, default: f64) -> f64 {
        self.number(key).unwrap_or(default)
    }

    /// Convenience for the `f32`-based scene types.
    pub fn f32_or(&self, key: &str, default: f32) -> f32 {
        self.number(key).map(|value| value as f32).unwrap_or(default)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.get(key).and_then(PropValue::as_bool).unwrap_or(false)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(PropValue::as_str)
    }

    /// Audio domain of the object. Missing or unknown values fall back to
    /// the frequency domain.
    pub fn domain(&self) -> Domain {
        self.text(fields::DOMAIN)
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    pub fn transform(&self) -> Transform {
        Transform {
            position: Vec3::new(
                self.f32_or(fields::X, 0.0),
                self.f32_or(fields::Y, 0.0),
                self.f32_or(fields::Z, 0.0),
            ),
            rotation: Vec3::new(
                self.f32_or(fields::ROTATION_X, 0.0),
                self.f32_or(fields::ROTATION_Y, 0.0),
                self.f32_or(fields::ROTATION_Z, 0.0),
            ),
            scale: Vec3::new(
                self.f32_or(fields::SCALE_X, 1.0),
                self.f32_or(fields::SCALE_Y, 1.0),
                self.f32_or(fields::SCALE_Z, 1.0),
            ),
        }
    }

    pub fn window(&self) -> VisibilityWindow {
        VisibilityWindow {
            start_time: self.number_or(fields::START_TIME, 0.0),
            end_time: self.number(fields::END_TIME),
            hidden: self.flag(fields::HIDDEN),
        }
    }

    pub fn object(&self) -> VisualiserObject {
        VisualiserObject {
            domain: self.domain(),
            transform: self.transform(),
            window: self.window(),
        }
    }
}

impl<K, V> FromIterator<(K, V)> for PropertyBag
where
    K: Into<String>,
    V: Into<PropValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bag = PropertyBag::new();
        for (key, value) in iter {
            bag.insert(key, value);
        }
        bag
    }
}

/// Builds a [`PropertyBag`] from `key => value` pairs.
///
/// ```
/// use reactive_visualiser_core::props;
///
/// let bag = props! { "radius" => 1.5, "color" => "#ff0000", "hidden" => false };
/// assert_eq!(bag.number("radius"), Some(1.5));
/// ```
#[macro_export]
macro_rules! props {
    () => { $crate::PropertyBag::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut bag = $crate::PropertyBag::new();
        $( bag.insert($key, $value); )+
        bag
    }};
}

/// Defaults every object starts from: identity transform, frequency domain
/// and an open-ended window starting at zero.
pub fn base_defaults() -> PropertyBag {
    let mut bag = PropertyBag::new();
    for key in [fields::X, fields::Y, fields::Z] {
        bag.insert(key, 0.0);
    }
    for key in [fields::ROTATION_X, fields::ROTATION_Y, fields::ROTATION_Z] {
        bag.insert(key, 0.0);
    }
    for key in [fields::SCALE_X, fields::SCALE_Y, fields::SCALE_Z] {
        bag.insert(key, 1.0);
    }
    bag.insert(fields::DOMAIN, Domain::Frequency);
    bag.insert(fields::START_TIME, 0.0);
    bag.insert(fields::END_TIME, PropValue::Null);
    bag.insert(fields::HIDDEN, false);
    bag
}
