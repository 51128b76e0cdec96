//! # certgen-core
//!
//! Bulk certificate generation: place a participant's name on a backdrop,
//! render one PDF per participant, and package the batch as a ZIP archive.
//!
//! The pipeline:
//!
//! - **geometry** maps the name box drawn on a preview canvas to millimetres
//! - **text_fit** picks the largest font size at which the name fits its box
//! - **composer** draws backdrop, name and fixed text onto a PDF page
//! - **batch** composes certificates in chunks, with progress and cancellation
//! - **archive** packages the documents (and error notes) into one ZIP
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use certgen_core::{
//!     BatchOptions, BatchOrchestrator, CanvasSize, EventInfo, GeneratorConfig, OrgInfo,
//!     Participant, PxBox, TemplateSpec,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let orchestrator = BatchOrchestrator::new(GeneratorConfig::default())?;
//!
//!     let template = TemplateSpec::new(
//!         PxBox::new(200.0, 320.0, 720.0, 110.0),
//!         CanvasSize::new(1122.0, 794.0),
//!     )
//!     .with_backdrop(std::fs::read("backdrop.png")?);
//!
//!     let event = EventInfo {
//!         id: "rustconf".into(),
//!         title: "RustConf Workshop".into(),
//!         date: "2025-09-10".into(),
//!         location: "Seattle".into(),
//!         description: None,
//!     };
//!     let org = OrgInfo { name: "Ferris Academy".into(), logo_url: None };
//!     let participants = vec![
//!         Participant::new("u1", "John Doe"),
//!         Participant::new("u2", "Ana Lima"),
//!     ];
//!
//!     let output = orchestrator
//!         .run(&participants, &event, &org, &template, BatchOptions::default(), |progress| {
//!             println!("{}/{} ({:.0}%)", progress.completed, progress.total, progress.percentage);
//!         })
//!         .await?;
//!
//!     std::fs::write(&output.archive.file_name, &output.archive.bytes)?;
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod batch;
pub mod canvas;
pub mod color;
pub mod composer;
pub mod config;
pub mod error;
pub mod fonts;
pub mod geometry;
pub mod model;
pub mod roster;
pub mod text_fit;
pub mod validation;

// Re-export main types for convenience
pub use archive::{decode_id, encode_id, sanitize_component, ArchiveBuilder, ArchivePackager};
pub use batch::{BatchOptions, BatchOrchestrator, BatchOrchestratorBuilder, CancellationToken};
pub use composer::{compose, compose_prepared, format_event_date, PreparedTemplate};
pub use config::{
    recommended_batch_size, Archive, ArchiveConfig, BatchConfig, BatchOutput, BatchState,
    CertificateLayout, FailedItem, GeneratorConfig, LayoutConfig, Progress, MAX_BATCH_SIZE,
};
pub use error::{CertificateError, Result, ValidationIssue};
pub use fonts::{BuiltinFont, ResolvedFont, TextMeasure};
pub use geometry::{to_physical, to_pixels};
pub use model::{
    CanvasSize, EventInfo, FontSource, GenerationResult, MmBox, OrgInfo, PageSize, Participant,
    PxBox, TemplateSpec, TextAlign,
};
pub use roster::{parse_roster, RosterParse};
pub use text_fit::{fit_text, FittedLine, FittedText};
pub use validation::validate_participants;

/// Backdrop image extensions the decoder understands.
pub const SUPPORTED_BACKDROP_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

/// Check if a backdrop file extension is supported.
pub fn is_supported_backdrop(ext: &str) -> bool {
    SUPPORTED_BACKDROP_EXTENSIONS
        .iter()
        .any(|&e| e.eq_ignore_ascii_case(ext))
}

/// Initialize the library's logging.
/// Call this once at application startup if you want to see logs.
pub fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();
}
