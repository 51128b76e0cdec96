//! Job files: the event, organisation and template design for one run.
//!
//! Paths inside a job file are resolved relative to the job file itself.
//!
//! ```json
//! {
//!   "event": { "id": "rc25", "title": "RustConf", "date": "2025-09-10", "location": "Seattle" },
//!   "org": { "name": "Ferris Academy" },
//!   "template": {
//!     "backdrop": "backdrop.png",
//!     "font": { "builtin": "Helvetica" },
//!     "canvas": { "width_px": 1122, "height_px": 794 },
//!     "name_box": { "x": 200, "y": 320, "width": 720, "height": 110 },
//!     "text_color": "#1a2b3c",
//!     "text_align": "center"
//!   }
//! }
//! ```

use anyhow::{Context, Result};
use certgen_core::{
    is_supported_backdrop, CanvasSize, EventInfo, FontSource, OrgInfo, PxBox, TemplateSpec,
    TextAlign,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
pub struct Job {
    pub event: EventInfo,
    pub org: OrgInfo,
    pub template: JobTemplate,
}

#[derive(Debug, Deserialize)]
pub struct JobTemplate {
    #[serde(default)]
    pub backdrop: Option<PathBuf>,
    #[serde(default)]
    pub font: Option<JobFont>,
    #[serde(default)]
    pub canvas: CanvasSize,
    pub name_box: PxBox,
    #[serde(default)]
    pub font_size: Option<f32>,
    #[serde(default)]
    pub text_color: Option<String>,
    #[serde(default)]
    pub text_align: TextAlign,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobFont {
    /// A built-in family name such as `Helvetica` or `Courier`.
    Builtin(String),
    /// A TrueType/OpenType file to embed.
    File {
        path: PathBuf,
        #[serde(default)]
        family: Option<String>,
    },
}

impl Job {
    /// Read and parse a job file.
    pub fn load(path: &Path) -> Result<(Self, PathBuf)> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading job file {}", path.display()))?;
        let job: Job = serde_json::from_str(&text)
            .with_context(|| format!("parsing job file {}", path.display()))?;
        let base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok((job, base))
    }
}

impl JobTemplate {
    /// Load referenced files and build the template.
    pub fn into_template(self, base: &Path) -> Result<TemplateSpec> {
        let mut template = TemplateSpec::new(self.name_box, self.canvas)
            .with_text_align(self.text_align);

        if let Some(backdrop) = self.backdrop {
            let path = base.join(backdrop);
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            if !is_supported_backdrop(ext) {
                warn!(
                    "Backdrop {} has an unrecognised extension; decoding will be attempted anyway",
                    path.display()
                );
            }
            let bytes = std::fs::read(&path)
                .with_context(|| format!("reading backdrop {}", path.display()))?;
            debug!("Loaded backdrop {} ({} bytes)", path.display(), bytes.len());
            template = template.with_backdrop(bytes);
        }

        match self.font {
            Some(JobFont::Builtin(name)) => {
                template = template.with_font(FontSource::Builtin(name));
            }
            Some(JobFont::File { path, family }) => {
                let path = base.join(path);
                let data = std::fs::read(&path)
                    .with_context(|| format!("reading font {}", path.display()))?;
                let name = family.unwrap_or_else(|| {
                    path.file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "Embedded".to_string())
                });
                template = template.with_font(FontSource::Embedded { name, data });
            }
            None => {}
        }

        if let Some(size) = self.font_size {
            template = template.with_font_size(size);
        }
        if let Some(color) = self.text_color {
            template = template.with_text_color(color);
        }
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"{
        "event": { "id": "e1", "title": "Workshop", "date": "2025-01-02", "location": "Online" },
        "org": { "name": "Guild" },
        "template": { "name_box": { "x": 10, "y": 20, "width": 300, "height": 60 } }
    }"#;

    #[test]
    fn test_minimal_job_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("job.json");
        std::fs::write(&path, MINIMAL).unwrap();

        let (job, base) = Job::load(&path).unwrap();
        assert_eq!(base, dir.path());
        assert_eq!(job.event.title, "Workshop");

        let template = job.template.into_template(&base).unwrap();
        assert!(template.backdrop.is_empty());
        assert_eq!(template.canvas_size, CanvasSize::default());
        assert_eq!(template.name_box_px, PxBox::new(10.0, 20.0, 300.0, 60.0));
        assert_eq!(template.font, FontSource::default());
        assert_eq!(template.text_align, TextAlign::Center);
    }

    #[test]
    fn test_paths_resolve_relative_to_job_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("back.png"), b"not really a png").unwrap();
        std::fs::write(dir.path().join("Script.ttf"), b"font bytes").unwrap();
        let path = dir.path().join("job.json");
        std::fs::write(
            &path,
            r##"{
                "event": { "id": "e1", "title": "T", "date": "", "location": "" },
                "org": { "name": "O" },
                "template": {
                    "backdrop": "back.png",
                    "font": { "file": { "path": "Script.ttf" } },
                    "canvas": { "width_px": 800, "height_px": 600 },
                    "name_box": { "x": 0, "y": 0, "width": 800, "height": 100 },
                    "font_size": 40,
                    "text_color": "#ff0000",
                    "text_align": "left"
                }
            }"##,
        )
        .unwrap();

        let (job, base) = Job::load(&path).unwrap();
        let template = job.template.into_template(&base).unwrap();
        assert_eq!(template.backdrop, b"not really a png".to_vec());
        match &template.font {
            FontSource::Embedded { name, data } => {
                assert_eq!(name, "Script");
                assert_eq!(data, &b"font bytes".to_vec());
            }
            other => panic!("Expected Embedded, got {:?}", other),
        }
        assert_eq!(template.font_size, Some(40.0));
        assert_eq!(template.text_color.as_deref(), Some("#ff0000"));
        assert_eq!(template.text_align, TextAlign::Left);
    }

    #[test]
    fn test_builtin_font_selection() {
        let job: Job = serde_json::from_str(
            &MINIMAL.replace(r#""template": {"#, r#""template": { "font": { "builtin": "Courier" },"#),
        )
        .unwrap();
        let template = job.template.into_template(Path::new(".")).unwrap();
        assert_eq!(template.font, FontSource::Builtin("Courier".to_string()));
    }

    #[test]
    fn test_missing_backdrop_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let job: Job = serde_json::from_str(
            &MINIMAL.replace(r#""template": {"#, r#""template": { "backdrop": "gone.png","#),
        )
        .unwrap();
        let err = job.template.into_template(dir.path()).unwrap_err();
        assert!(err.to_string().contains("gone.png"));
    }

    #[test]
    fn test_missing_name_box_rejected() {
        let text = r#"{
            "event": { "id": "e1", "title": "T", "date": "", "location": "" },
            "org": { "name": "O" },
            "template": {}
        }"#;
        assert!(serde_json::from_str::<Job>(text).is_err());
    }
}
