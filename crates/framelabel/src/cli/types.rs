//! CLI enum types shared by several commands.

use clap::ValueEnum;
use framelabel_core::{BackendKind, ExportFormat};

/// Vision-language backend.
#[derive(Clone, Copy, Debug, ValueEnum, Default)]
pub enum Backend {
    /// OpenAI chat completions (default)
    #[default]
    Gpt,
    /// Google Gemini generateContent
    Gemini,
}

impl From<Backend> for BackendKind {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Gpt => BackendKind::Gpt,
            Backend::Gemini => BackendKind::Gemini,
        }
    }
}

/// Supported output formats.
#[derive(Clone, Copy, Debug, ValueEnum, Default)]
pub enum OutputFormat {
    /// Pretty JSON array of results
    #[default]
    Json,
    /// Flattened CSV, columns chosen by --api-type
    Csv,
}

impl From<OutputFormat> for ExportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => ExportFormat::Json,
            OutputFormat::Csv => ExportFormat::Csv,
        }
    }
}
