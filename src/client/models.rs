//! Wire types exchanged with the background removal service

use crate::error::{Result, StudioError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Segmentation model requested for a removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RemovalModel {
    /// Let the service pick based on its own image analysis
    #[default]
    #[serde(rename = "auto")]
    Auto,
    /// General purpose
    #[serde(rename = "u2net")]
    U2Net,
    /// Tuned for people and portraits
    #[serde(rename = "u2net_human_seg")]
    U2NetHumanSeg,
    /// Complex shapes
    #[serde(rename = "silueta")]
    Silueta,
    /// Latest general model
    #[serde(rename = "isnet-general-use")]
    IsNetGeneralUse,
}

impl RemovalModel {
    pub const ALL: [RemovalModel; 5] = [
        RemovalModel::Auto,
        RemovalModel::U2Net,
        RemovalModel::U2NetHumanSeg,
        RemovalModel::Silueta,
        RemovalModel::IsNetGeneralUse,
    ];

    /// Identifier sent in the `model` form field
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::U2Net => "u2net",
            Self::U2NetHumanSeg => "u2net_human_seg",
            Self::Silueta => "silueta",
            Self::IsNetGeneralUse => "isnet-general-use",
        }
    }
}

impl std::fmt::Display for RemovalModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RemovalModel {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| {
                StudioError::invalid_config(format!(
                    "Unknown model '{}'. Available: {}",
                    s,
                    Self::ALL.map(|m| m.as_str()).join(", ")
                ))
            })
    }
}

/// Output encoding the service applies before returning the cut-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ServerOutputFormat {
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "PNG")]
    Png,
    #[serde(rename = "JPEG")]
    Jpeg,
    #[serde(rename = "WEBP")]
    WebP,
}

impl ServerOutputFormat {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::WebP => "WEBP",
        }
    }
}

/// Compression effort the service applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    #[default]
    High,
    Medium,
    Low,
}

impl QualityLevel {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Role of a stored image in its lineage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    /// Image as uploaded by the user
    Original,
    /// Cut-out returned by the removal service
    Processed,
    /// Result of local editing
    Edited,
}

impl ImageKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Processed => "processed",
            Self::Edited => "edited",
        }
    }
}

impl std::fmt::Display for ImageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ImageKind {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "original" => Ok(Self::Original),
            "processed" => Ok(Self::Processed),
            "edited" => Ok(Self::Edited),
            other => Err(StudioError::invalid_config(format!(
                "Unknown image kind '{}'. Expected original, processed or edited",
                other
            ))),
        }
    }
}

/// Entry of `GET /models`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub recommended: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelList {
    pub models: Vec<ModelInfo>,
}

/// Server-side record of a stored image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub id: String,
    pub filename: String,
    #[serde(rename = "type")]
    pub kind: ImageKind,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub file_size: u64,
    /// Timestamps are naive ISO-8601 on the server, so they are kept as text
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImageList {
    pub images: Vec<ImageMetadata>,
}

/// Result of `GET /storage/stats`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageStats {
    pub total_images: usize,
    pub total_size_bytes: u64,
    #[serde(default)]
    pub total_size_mb: f64,
    #[serde(default)]
    pub type_counts: HashMap<String, usize>,
    #[serde(default)]
    pub storage_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StorageStatsResponse {
    pub stats: StorageStats,
}

/// Result of `POST /analyze-image`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub recommended_model: String,
    pub image_type: String,
    pub confidence: f64,
    /// Raw classifier output
    #[serde(default)]
    pub analysis: serde_json::Value,
}

impl ImageAnalysis {
    /// Recommended model, if the service named one this client knows
    #[must_use]
    pub fn model(&self) -> Option<RemovalModel> {
        self.recommended_model.parse().ok()
    }
}

/// Cut-out returned by `POST /remove-background`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    /// Encoded image bytes as returned
    pub bytes: Vec<u8>,
    /// `Content-Type` of the response
    pub content_type: String,
    /// Gallery id of the stored original (`X-Original-ID`)
    pub original_id: Option<String>,
    /// Gallery id of the stored cut-out (`X-Processed-ID`)
    pub processed_id: Option<String>,
    /// When the response completed
    pub received_at: DateTime<Utc>,
}
