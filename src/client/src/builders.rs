//! Request body builders
//!
//! Scoring endpoints take the `{"input_data": {"columns": [...], "data": [[...]]}}`
//! shape. These helpers produce it from a template, an image, or a list of
//! typed form fields, and provide the Vision feature and aspect-ratio presets.

use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use ml_tester_shared::vision::{encode_data_url, encode_data_url_with_mime};
use ml_tester_shared::FeatureName;

use crate::error::{OrchestratorError, Result};

/// Two ratios closer than this are the same preset
pub const RATIO_TOLERANCE: f64 = 0.01;

// ============================================================================
// SCORING BODIES
// ============================================================================

fn input_data(columns: Vec<String>, row: Vec<Value>) -> Value {
    json!({
        "input_data": {
            "columns": columns,
            "data": [row],
        }
    })
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Starting body for a tabular scoring endpoint
pub fn default_request_template() -> String {
    pretty(&input_data(
        vec!["feature1".into(), "feature2".into(), "feature3".into()],
        vec![json!(1.0), json!(2.0), json!(3.0)],
    ))
}

/// Single-column body carrying an encoded image
pub fn image_request_template(base64_image: &str) -> String {
    pretty(&input_data(vec!["image".into()], vec![json!(base64_image)]))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Boolean,
    Image,
    File,
}

impl FieldKind {
    /// Whether the field's data comes from a file on disk
    pub fn is_upload(&self) -> bool {
        matches!(self, FieldKind::Image | FieldKind::File)
    }
}

impl FromStr for FieldKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "string" => Ok(FieldKind::Text),
            "number" => Ok(FieldKind::Number),
            "boolean" | "bool" => Ok(FieldKind::Boolean),
            "image" => Ok(FieldKind::Image),
            "file" => Ok(FieldKind::File),
            _ => Err(format!("Invalid field kind: {}", s)),
        }
    }
}

/// One column of a form-built request
#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: String,
    pub kind: FieldKind,
    pub value: String,
    /// Encoded file contents for image and file fields
    pub base64_data: Option<String>,
}

impl FormField {
    pub fn new(name: impl Into<String>, kind: FieldKind, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            value: value.into(),
            base64_data: None,
        }
    }

    /// Parse `name:kind=value`; `name=value` is a text field
    pub fn parse(argument: &str) -> Result<Self> {
        let (head, value) = argument.split_once('=').ok_or_else(|| {
            OrchestratorError::validation("field", format!("Expected name:kind=value, got {}", argument))
        })?;

        let (name, kind) = match head.split_once(':') {
            Some((name, kind)) => (
                name,
                kind.parse::<FieldKind>()
                    .map_err(|e| OrchestratorError::validation("field", e))?,
            ),
            None => (head, FieldKind::Text),
        };

        if name.trim().is_empty() {
            return Err(OrchestratorError::validation("field", "Field name cannot be empty"));
        }

        Ok(Self::new(name.trim(), kind, value))
    }

    fn to_json(&self) -> Value {
        match self.kind {
            FieldKind::Image | FieldKind::File => {
                json!(self.base64_data.clone().unwrap_or_default())
            }
            FieldKind::Number => parse_number(&self.value),
            FieldKind::Boolean => json!(self.value == "true"),
            FieldKind::Text => json!(self.value),
        }
    }
}

/// Unparseable and non-finite input becomes 0
fn parse_number(raw: &str) -> Value {
    let raw = raw.trim();
    if let Ok(integer) = raw.parse::<i64>() {
        return json!(integer);
    }
    match raw.parse::<f64>() {
        Ok(number) if number.is_finite() => json!(number),
        _ => json!(0),
    }
}

/// Request body with one column per field, in field order
pub fn build_form_body(fields: &[FormField]) -> String {
    let columns = fields.iter().map(|field| field.name.clone()).collect();
    let row = fields.iter().map(FormField::to_json).collect();
    pretty(&input_data(columns, row))
}

// ============================================================================
// FILE LOADING
// ============================================================================

fn image_subtype(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    let subtype = match extension.as_str() {
        "png" => "png",
        "jpg" | "jpeg" => "jpeg",
        "gif" => "gif",
        "webp" => "webp",
        "bmp" => "bmp",
        "tif" | "tiff" => "tiff",
        "ico" => "x-icon",
        _ => return None,
    };
    Some(subtype)
}

/// Read an image file into a `data:image/<subtype>;base64,` URL
pub async fn load_image_data_url(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let subtype = image_subtype(path)
        .ok_or_else(|| OrchestratorError::validation("image", "Please upload an image file"))?;

    let bytes = tokio::fs::read(path).await?;
    Ok(encode_data_url(subtype, &bytes))
}

/// Read any file into a data URL; images keep their image type
pub async fn load_file_data_url(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    if image_subtype(path).is_some() {
        return load_image_data_url(path).await;
    }

    let bytes = tokio::fs::read(path).await?;
    Ok(encode_data_url_with_mime("application/octet-stream", &bytes))
}

/// Fill `base64_data` for upload fields whose value is a file path
pub async fn load_field_uploads(fields: &mut [FormField]) -> Result<()> {
    for field in fields.iter_mut().filter(|field| field.kind.is_upload()) {
        if field.value.is_empty() {
            continue;
        }
        let data = match field.kind {
            FieldKind::Image => load_image_data_url(&field.value).await?,
            _ => load_file_data_url(&field.value).await?,
        };
        field.base64_data = Some(data);
    }
    Ok(())
}

// ============================================================================
// VISION PRESETS
// ============================================================================

/// Named feature selections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisionTemplate {
    Quick,
    Objects,
    Ocr,
    Full,
    Recommended,
}

impl VisionTemplate {
    pub const ALL: [VisionTemplate; 5] = [
        VisionTemplate::Quick,
        VisionTemplate::Objects,
        VisionTemplate::Ocr,
        VisionTemplate::Full,
        VisionTemplate::Recommended,
    ];

    pub fn features(&self) -> BTreeSet<FeatureName> {
        use FeatureName::*;
        let list: &[FeatureName] = match self {
            VisionTemplate::Quick => &[Caption, Tags],
            VisionTemplate::Objects => &[Caption, Tags, Objects],
            VisionTemplate::Ocr => &[Read],
            VisionTemplate::Full => &[Caption, Tags, Objects, Read, DenseCaptions, People],
            VisionTemplate::Recommended => &[Caption, Tags, Objects, Read],
        };
        list.iter().copied().collect()
    }

    pub fn description(&self) -> &'static str {
        match self {
            VisionTemplate::Quick => "Caption + Tags",
            VisionTemplate::Objects => "Find & locate objects",
            VisionTemplate::Ocr => "OCR for documents",
            VisionTemplate::Full => "All features except smart crops",
            VisionTemplate::Recommended => "Caption, tags, objects and text",
        }
    }
}

impl fmt::Display for VisionTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VisionTemplate::Quick => "quick",
            VisionTemplate::Objects => "objects",
            VisionTemplate::Ocr => "ocr",
            VisionTemplate::Full => "full",
            VisionTemplate::Recommended => "recommended",
        };
        f.write_str(name)
    }
}

impl FromStr for VisionTemplate {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        VisionTemplate::ALL
            .iter()
            .copied()
            .find(|template| template.to_string().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Invalid vision template: {}", s))
    }
}

/// Named smart-crop aspect ratio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectRatioPreset {
    pub id: &'static str,
    pub ratio: f64,
    pub description: &'static str,
}

pub const ASPECT_RATIO_PRESETS: [AspectRatioPreset; 5] = [
    AspectRatioPreset { id: "square", ratio: 1.0, description: "1:1" },
    AspectRatioPreset { id: "landscape", ratio: 1.5, description: "3:2" },
    AspectRatioPreset { id: "portrait", ratio: 0.67, description: "2:3" },
    AspectRatioPreset { id: "widescreen", ratio: 1.78, description: "16:9" },
    AspectRatioPreset { id: "vertical", ratio: 0.56, description: "9:16" },
];

pub fn aspect_ratio_preset(id: &str) -> Option<AspectRatioPreset> {
    ASPECT_RATIO_PRESETS
        .iter()
        .copied()
        .find(|preset| preset.id.eq_ignore_ascii_case(id.trim()))
}

pub fn is_ratio_selected(ratios: &[f64], ratio: f64) -> bool {
    ratios.iter().any(|r| (r - ratio).abs() < RATIO_TOLERANCE)
}

/// Add `ratio` if absent, remove it if present; the last ratio is never
/// removed
pub fn toggle_ratio(ratios: &mut Vec<f64>, ratio: f64) {
    match ratios.iter().position(|r| (r - ratio).abs() < RATIO_TOLERANCE) {
        Some(index) if ratios.len() > 1 => {
            ratios.remove(index);
        }
        Some(_) => {}
        None => ratios.push(ratio),
    }
}
