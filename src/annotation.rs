// -- external imports
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString, VariantNames};

// -- raw model output

/// One predicted instance as returned by the model backend.
///
/// Box coordinates are absolute XYXY pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
    pub score: f32,
    pub class_id: usize,
}

// -- standardized annotations

/// Top-left + dimensions box, truncated to integer pixels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BBox {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub class_name: String,
    pub score: f32,

    #[serde(rename = "box")]
    pub bbox: BBox,
}

// -- instance policy

/// How many predicted instances per image to keep.
///
/// The reference pipeline kept only the top instance per image. That is
/// preserved as the default; `AllInstances` keeps every prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, Deserialize, VariantNames)]
#[serde(untagged)]
pub enum InstancePolicy {
    #[strum(serialize = "top-instance")]
    TopInstance,

    #[strum(serialize = "all-instances")]
    AllInstances,
}

impl Default for InstancePolicy {
    fn default() -> Self {
        InstancePolicy::TopInstance
    }
}

/// Custom deserializer with helpful error message
pub fn deserialize_instance_policy<'de, D>(deserializer: D) -> Result<InstancePolicy, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    InstancePolicy::from_str(&value).map_err(|_| {
        let variants = InstancePolicy::VARIANTS;
        serde::de::Error::invalid_value(
            serde::de::Unexpected::Str(&value),
            &format!("one of {}", variants.join(", ")).as_str(),
        )
    })
}

// -- conversion

/// Resolve a class index to its name, clamping over-range indices to the
/// last valid class instead of failing.
pub fn resolve_class_name(class_names: &[String], class_id: usize) -> String {
    let idx = class_id.min(class_names.len().saturating_sub(1));
    class_names.get(idx).cloned().unwrap_or_default()
}

impl Detection {
    /// Convert to the standardized annotation: XYXY to XYWH with integer
    /// truncation, class index resolved via clamped lookup.
    pub fn to_annotation(&self, class_names: &[String]) -> Annotation {
        Annotation {
            class_name: resolve_class_name(class_names, self.class_id),
            score: self.score,
            bbox: BBox {
                x: self.xmin as i32,
                y: self.ymin as i32,
                w: (self.xmax - self.xmin) as i32,
                h: (self.ymax - self.ymin) as i32,
            },
        }
    }
}

/// Convert raw detections for one image into annotations under the given
/// instance policy. Zero detections yield an empty list.
pub fn convert_detections(
    detections: &[Detection],
    class_names: &[String],
    policy: InstancePolicy,
) -> Vec<Annotation> {
    let keep = match policy {
        InstancePolicy::TopInstance => detections.len().min(1),
        InstancePolicy::AllInstances => detections.len(),
    };
    detections
        .iter()
        .take(keep)
        .map(|det| det.to_annotation(class_names))
        .collect()
}

// -- tests
