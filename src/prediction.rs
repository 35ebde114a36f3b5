use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One detected object or plate, in source-image pixel coordinates.
///
/// Missing and `null` fields take their defaults. Fields this type does not
/// know about are kept in `extra` and published back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(default, deserialize_with = "null_as_default")]
    pub x_min: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub y_min: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub x_max: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub y_max: f64,
    #[serde(default = "default_label", deserialize_with = "label_or_default")]
    pub label: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plate: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_label() -> String {
    "unknown".to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn label_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_label))
}

impl Prediction {
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64, label: &str, confidence: f64) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
            label: label.to_string(),
            confidence,
            plate: None,
            extra: Map::new(),
        }
    }

    pub fn with_plate(mut self, plate: &str) -> Self {
        self.plate = Some(plate.to_string());
        self
    }

    /// Text drawn above the box, e.g. `car (0.87)`.
    pub fn caption(&self) -> String {
        format!("{} ({:.2})", self.label, self.confidence)
    }
}
