//! Configuration types for certificate generation.

use crate::error::{CertificateError, Result};
use crate::model::PageSize;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest chunk the batch-size heuristic will ever recommend.
pub const MAX_BATCH_SIZE: usize = 25;

/// Text-fitting parameters for the name box.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Smallest font size (points) the fitter may choose.
    /// Default: 8.
    pub min_font_size: f32,

    /// Largest font size (points) the fitter may choose.
    /// Default: 72.
    pub max_font_size: f32,

    /// Granularity of the size search in points.
    /// Default: 0.5.
    pub size_step: f32,

    /// Inner padding on every side of the name box, in millimetres.
    /// Default: 2.
    pub padding_mm: f32,

    /// Line height as a multiple of the font size.
    /// Default: 1.2.
    pub line_height_factor: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            min_font_size: 8.0,
            max_font_size: 72.0,
            size_step: 0.5,
            padding_mm: 2.0,
            line_height_factor: 1.2,
        }
    }
}

impl LayoutConfig {
    /// Set the font size range.
    pub fn font_range(mut self, min: f32, max: f32) -> Self {
        self.min_font_size = min;
        self.max_font_size = max;
        self
    }

    /// Set the box padding.
    pub fn padding_mm(mut self, padding: f32) -> Self {
        self.padding_mm = padding;
        self
    }

    /// Set the line height factor.
    pub fn line_height_factor(mut self, factor: f32) -> Self {
        self.line_height_factor = factor;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_font_size > 0.0) || !self.min_font_size.is_finite() {
            return Err(CertificateError::InvalidConfig(
                "min_font_size must be greater than 0".to_string(),
            ));
        }
        if !(self.max_font_size >= self.min_font_size) || !self.max_font_size.is_finite() {
            return Err(CertificateError::InvalidConfig(
                "max_font_size must be at least min_font_size".to_string(),
            ));
        }
        if !(self.size_step > 0.0) {
            return Err(CertificateError::InvalidConfig(
                "size_step must be greater than 0".to_string(),
            ));
        }
        if !(self.padding_mm >= 0.0) {
            return Err(CertificateError::InvalidConfig(
                "padding_mm must not be negative".to_string(),
            ));
        }
        if !(self.line_height_factor > 0.0) {
            return Err(CertificateError::InvalidConfig(
                "line_height_factor must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Placement of the fixed text around the name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateLayout {
    /// Heading printed near the top of the page.
    pub title: String,
    /// Baseline of the heading, from the top edge (mm).
    pub title_baseline_mm: f32,
    pub title_font_size: f32,
    /// Distance between the bottom of the name box and the event summary (mm).
    pub event_offset_mm: f32,
    pub event_title_font_size: f32,
    pub event_detail_font_size: f32,
    /// Baseline of the footer band, measured up from the bottom edge (mm).
    pub footer_baseline_mm: f32,
    pub footer_font_size: f32,
    /// Horizontal margin of the footer items (mm).
    pub footer_margin_mm: f32,
    /// Distance of the border from the page edges (mm).
    pub border_inset_mm: f32,
    /// Border stroke width (points).
    pub border_width_pt: f32,
}

impl Default for CertificateLayout {
    fn default() -> Self {
        Self {
            title: "CERTIFICATE OF PARTICIPATION".to_string(),
            title_baseline_mm: 30.0,
            title_font_size: 26.0,
            event_offset_mm: 12.0,
            event_title_font_size: 16.0,
            event_detail_font_size: 12.0,
            footer_baseline_mm: 18.0,
            footer_font_size: 9.0,
            footer_margin_mm: 20.0,
            border_inset_mm: 8.0,
            border_width_pt: 1.0,
        }
    }
}

impl CertificateLayout {
    /// Set the heading text.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            self.title_font_size,
            self.event_title_font_size,
            self.event_detail_font_size,
            self.footer_font_size,
        ];
        if sizes.iter().any(|s| !(*s > 0.0)) {
            return Err(CertificateError::InvalidConfig(
                "font sizes must be greater than 0".to_string(),
            ));
        }
        if !(self.border_inset_mm >= 0.0) || !(self.border_width_pt >= 0.0) {
            return Err(CertificateError::InvalidConfig(
                "border inset and width must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Batch scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Fixed chunk size. When None, [`recommended_batch_size`] decides.
    pub batch_size: Option<usize>,

    /// Pause after every chunk, on top of a task yield.
    /// Default: 25 ms.
    pub inter_chunk_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: None,
            inter_chunk_delay: Duration::from_millis(25),
        }
    }
}

impl BatchConfig {
    /// Use a fixed chunk size.
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size: Some(batch_size),
            ..Default::default()
        }
    }

    /// Set the pause between chunks.
    pub fn inter_chunk_delay(mut self, delay: Duration) -> Self {
        self.inter_chunk_delay = delay;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == Some(0) {
            return Err(CertificateError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Archive packaging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Deflate level (0-9).
    /// Default: 6.
    pub compression_level: u8,

    /// Maximum length of a sanitized name component.
    /// Default: 50.
    pub max_name_length: usize,

    /// Extension of successful entries.
    /// Default: "pdf".
    pub document_extension: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            compression_level: 6,
            max_name_length: 50,
            document_extension: "pdf".to_string(),
        }
    }
}

impl ArchiveConfig {
    /// Set the deflate level.
    pub fn compression_level(mut self, level: u8) -> Self {
        self.compression_level = level.min(9);
        self
    }

    /// Set the maximum sanitized name length.
    pub fn max_name_length(mut self, len: usize) -> Self {
        self.max_name_length = len;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.compression_level > 9 {
            return Err(CertificateError::InvalidConfig(
                "compression_level must be between 0 and 9".to_string(),
            ));
        }
        if self.max_name_length == 0 {
            return Err(CertificateError::InvalidConfig(
                "max_name_length must be at least 1".to_string(),
            ));
        }
        if self.document_extension.is_empty()
            || !self
                .document_extension
                .chars()
                .all(|c| c.is_ascii_alphanumeric())
        {
            return Err(CertificateError::InvalidConfig(
                "document_extension must be a non-empty alphanumeric string".to_string(),
            ));
        }
        Ok(())
    }
}

/// Combined configuration for the generator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Physical page size of every certificate.
    pub page: PageSize,

    /// Name fitting.
    pub layout: LayoutConfig,

    /// Fixed text placement.
    pub certificate: CertificateLayout,

    /// Chunking.
    pub batch: BatchConfig,

    /// Packaging.
    pub archive: ArchiveConfig,
}

impl GeneratorConfig {
    /// Create a config with a fixed chunk size.
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch: BatchConfig::with_batch_size(batch_size),
            ..Default::default()
        }
    }

    /// Parse a (possibly partial) JSON config; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: GeneratorConfig = serde_json::from_str(json)
            .map_err(|e| CertificateError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration.
    pub fn validate(&self) -> Result<()> {
        if !(self.page.width_mm > 0.0) || !(self.page.height_mm > 0.0) {
            return Err(CertificateError::InvalidConfig(
                "page dimensions must be greater than 0".to_string(),
            ));
        }
        self.layout.validate()?;
        self.certificate.validate()?;
        self.batch.validate()?;
        self.archive.validate()?;
        Ok(())
    }
}

/// Chunk size heuristic for `total` participants.
///
/// Small runs get small chunks so progress moves visibly; large runs are
/// clamped to [`MAX_BATCH_SIZE`] to bound the number of documents held in
/// memory at once.
pub fn recommended_batch_size(total: usize) -> usize {
    let size = match total {
        0..=10 => total.min(5),
        11..=50 => total.min(10),
        51..=200 => total.min(20),
        _ => MAX_BATCH_SIZE,
    };
    size.max(1)
}

/// Progress of a batch run, emitted after every finished certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Certificates finished so far (successful or failed).
    pub completed: usize,

    /// Total certificates in the run.
    pub total: usize,

    /// `completed / total` as a percentage, 0-100.
    pub percentage: f32,

    /// Display name of the participant that just finished.
    pub current_participant: Option<String>,
}

impl Progress {
    pub fn new(completed: usize, total: usize, current_participant: Option<String>) -> Self {
        let percentage = if total == 0 {
            100.0
        } else {
            (completed as f32 / total as f32) * 100.0
        };
        Self {
            completed,
            total,
            percentage,
            current_participant,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }
}

/// Lifecycle of a batch orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchState {
    /// No run has started yet.
    Idle,
    /// A run is in progress.
    Running,
    /// The last run produced an archive.
    Completed,
    /// The last run was stopped by the caller.
    Cancelled,
    /// The last run could not be packaged.
    Failed,
}

/// A participant whose certificate could not be composed.
#[derive(Debug, Clone)]
pub struct FailedItem {
    pub participant_id: String,
    pub participant_name: String,
    pub error: String,
}

/// A packaged archive.
#[derive(Debug, Clone)]
pub struct Archive {
    /// Suggested download file name.
    pub file_name: String,

    /// ZIP bytes.
    pub bytes: Vec<u8>,

    /// Number of entries written.
    pub entry_count: usize,
}

/// Result of a completed batch run.
#[derive(Debug, Clone)]
pub struct BatchOutput {
    /// The packaged certificates and error records.
    pub archive: Archive,

    /// Number of certificates composed successfully.
    pub succeeded: usize,

    /// Participants whose certificate failed.
    pub failed: Vec<FailedItem>,

    /// Total processing time.
    pub total_duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    // LayoutConfig tests
    #[test]
    fn test_layout_config_defaults() {
        let config = LayoutConfig::default();
        assert_eq!(config.min_font_size, 8.0);
        assert_eq!(config.max_font_size, 72.0);
        assert_eq!(config.size_step, 0.5);
        assert_eq!(config.padding_mm, 2.0);
        assert_eq!(config.line_height_factor, 1.2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_layout_config_builder_pattern() {
        let config = LayoutConfig::default()
            .font_range(10.0, 48.0)
            .padding_mm(4.0)
            .line_height_factor(1.5);
        assert_eq!(config.min_font_size, 10.0);
        assert_eq!(config.max_font_size, 48.0);
        assert_eq!(config.padding_mm, 4.0);
        assert_eq!(config.line_height_factor, 1.5);
    }

    #[test]
    fn test_layout_config_validation_inverted_range() {
        let config = LayoutConfig::default().font_range(40.0, 20.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_layout_config_validation_zero_min() {
        let config = LayoutConfig::default().font_range(0.0, 20.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_layout_config_validation_nan_padding() {
        let config = LayoutConfig::default().padding_mm(f32::NAN);
        assert!(config.validate().is_err());
    }

    // BatchConfig tests
    #[test]
    fn test_batch_config_defaults() {
        let config = BatchConfig::default();
        assert!(config.batch_size.is_none());
        assert_eq!(config.inter_chunk_delay, Duration::from_millis(25));
    }

    #[test]
    fn test_batch_config_validation_zero_size() {
        assert!(BatchConfig::with_batch_size(0).validate().is_err());
        assert!(BatchConfig::with_batch_size(1).validate().is_ok());
    }

    // ArchiveConfig tests
    #[test]
    fn test_archive_config_defaults() {
        let config = ArchiveConfig::default();
        assert_eq!(config.compression_level, 6);
        assert_eq!(config.max_name_length, 50);
        assert_eq!(config.document_extension, "pdf");
    }

    #[test]
    fn test_archive_config_compression_clamped() {
        let config = ArchiveConfig::default().compression_level(15);
        assert_eq!(config.compression_level, 9);
    }

    #[test]
    fn test_archive_config_validation_bad_extension() {
        let mut config = ArchiveConfig::default();
        config.document_extension = "p/df".to_string();
        assert!(config.validate().is_err());
    }

    // GeneratorConfig tests
    #[test]
    fn test_generator_config_validate_propagates() {
        let mut config = GeneratorConfig::default();
        config.layout.min_font_size = -1.0;
        assert!(config.validate().is_err());

        let mut config2 = GeneratorConfig::default();
        config2.page.width_mm = 0.0;
        assert!(config2.validate().is_err());

        let mut config3 = GeneratorConfig::default();
        config3.archive.max_name_length = 0;
        assert!(config3.validate().is_err());
    }

    #[test]
    fn test_generator_config_from_partial_json() {
        let config =
            GeneratorConfig::from_json(r#"{"layout": {"max_font_size": 48.0}, "batch": {"batch_size": 7}}"#)
                .unwrap();
        assert_eq!(config.layout.max_font_size, 48.0);
        assert_eq!(config.layout.min_font_size, 8.0);
        assert_eq!(config.batch.batch_size, Some(7));
        assert_eq!(config.page, PageSize::A4_LANDSCAPE);
    }

    #[test]
    fn test_generator_config_from_json_rejects_invalid() {
        let result = GeneratorConfig::from_json(r#"{"batch": {"batch_size": 0}}"#);
        assert!(matches!(result, Err(CertificateError::InvalidConfig(_))));

        let result = GeneratorConfig::from_json("not json");
        assert!(matches!(result, Err(CertificateError::InvalidConfig(_))));
    }

    // Heuristic tests
    #[test]
    fn test_recommended_batch_size_tiers() {
        assert_eq!(recommended_batch_size(1), 1);
        assert_eq!(recommended_batch_size(3), 3);
        assert_eq!(recommended_batch_size(10), 5);
        assert_eq!(recommended_batch_size(11), 10);
        assert_eq!(recommended_batch_size(50), 10);
        assert_eq!(recommended_batch_size(51), 20);
        assert_eq!(recommended_batch_size(200), 20);
        assert_eq!(recommended_batch_size(201), MAX_BATCH_SIZE);
        assert_eq!(recommended_batch_size(10_000), MAX_BATCH_SIZE);
    }

    #[test]
    fn test_recommended_batch_size_never_zero() {
        assert_eq!(recommended_batch_size(0), 1);
    }

    // Progress tests
    #[test]
    fn test_progress_percentage() {
        let progress = Progress::new(1, 4, Some("Ana".to_string()));
        assert_eq!(progress.percentage, 25.0);
        assert!(!progress.is_complete());

        let done = Progress::new(4, 4, None);
        assert_eq!(done.percentage, 100.0);
        assert!(done.is_complete());
    }

    #[test]
    fn test_progress_serializes() {
        let progress = Progress::new(2, 8, Some("John Doe".to_string()));
        let json = serde_json::to_string(&progress).unwrap();
        assert!(json.contains("\"completed\":2"));
        assert!(json.contains("John Doe"));
    }

    #[test]
    fn test_batch_state_variants() {
        assert_ne!(BatchState::Idle, BatchState::Running);
        assert_eq!(BatchState::Cancelled, BatchState::Cancelled);
    }
}
