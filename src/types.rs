//! Domain payloads carried between the shipped processes.
//!
//! Images are 8-bit grayscale buffers from the `image` crate. Everything else
//! is plain data with serde support so results can be dumped as JSON.

use crate::pipeline::TypeTag;
use image::GrayImage;
use serde::{Deserialize, Serialize};

/// One video frame.
pub type ImageFrame = GrayImage;

/// Port type tags used by the shipped processes.
pub mod tags {
    use crate::pipeline::TypeTag;

    pub const IMAGE: TypeTag = TypeTag::from_static("image");
    pub const TIMESTAMP: TypeTag = TypeTag::from_static("timestamp");
    pub const DETECTED_OBJECT_SET: TypeTag = TypeTag::from_static("detected_object_set");
    pub const TRACK_DESCRIPTOR_SET: TypeTag = TypeTag::from_static("track_descriptor_set");
    pub const DESCRIPTOR_SET: TypeTag = TypeTag::from_static("descriptor_set");
    pub const STRING_VECTOR: TypeTag = TypeTag::from_static("string_vector");
}

/// Resolve a tag name from a description to one of the known tags, or an
/// owned tag for anything else.
pub fn tag_from_name(name: &str) -> TypeTag {
    match name {
        "image" => tags::IMAGE,
        "timestamp" => tags::TIMESTAMP,
        "detected_object_set" => tags::DETECTED_OBJECT_SET,
        "track_descriptor_set" => tags::TRACK_DESCRIPTOR_SET,
        "descriptor_set" => tags::DESCRIPTOR_SET,
        "string_vector" => tags::STRING_VECTOR,
        other => TypeTag::new(other),
    }
}

/// Frame number of the image it travels with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub frame: u64,
}

impl Timestamp {
    pub fn new(frame: u64) -> Self {
        Self { frame }
    }
}

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The whole of a `width` x `height` image.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Intersect with a `width` x `height` image. `None` if nothing is left.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Self> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        (w > 0 && h > 0).then(|| Self::new(self.x, self.y, w, h))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f64,
    /// Filled in when descriptors are injected back into detections.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<Vec<f64>>,
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f64) -> Self {
        Self {
            bbox,
            confidence,
            descriptor: None,
        }
    }
}

pub type DetectionSet = Vec<Detection>;

/// Feature vector computed for one target on one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub track_id: u64,
    pub frame: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    pub features: Vec<f64>,
}

impl TrackDescriptor {
    pub fn new(track_id: u64, frame: u64, features: Vec<f64>) -> Self {
        Self {
            track_id,
            frame,
            uid: None,
            features,
        }
    }
}

pub type TrackDescriptorSet = Vec<TrackDescriptor>;

/// Raw feature vectors, without track association.
pub type DescriptorSet = Vec<Vec<f64>>;

/// Descriptor identifiers, parallel to a `TrackDescriptorSet`.
pub type StringVector = Vec<String>;
