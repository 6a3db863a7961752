//! Report files on the local filesystem

use async_trait::async_trait;
use scalewatch_config::{OutputConfig, ReportFormat};
use scalewatch_core::{ReportSink, SinkError, TestCaseRecord};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::errors::DeliveryError;
use crate::format::{render, ReportDocument};
use crate::template::TemplateEngine;

/// Configuration for the filesystem sink
#[derive(Debug, Clone)]
pub struct FilesystemConfig {
    pub directory: PathBuf,
    pub formats: Vec<ReportFormat>,
    /// Handlebars template of the file name. Sees `suite`, `timestamp`,
    /// `format` and `ext`.
    pub path_template: String,
    pub overwrite: bool,
    pub create_dirs: bool,
}

impl From<&OutputConfig> for FilesystemConfig {
    fn from(config: &OutputConfig) -> Self {
        Self {
            directory: config.directory.clone(),
            formats: config.formats.clone(),
            path_template: config.path_template.clone(),
            overwrite: config.overwrite,
            create_dirs: true,
        }
    }
}

/// Writes one file per configured format for every published suite
#[derive(Debug)]
pub struct FilesystemSink {
    config: FilesystemConfig,
    template_engine: TemplateEngine,
}

impl FilesystemSink {
    pub fn new(config: FilesystemConfig, template_engine: TemplateEngine) -> Self {
        Self {
            config,
            template_engine,
        }
    }

    pub fn validate_config(&self) -> Result<(), DeliveryError> {
        if self.config.path_template.trim().is_empty() {
            return Err(DeliveryError::TemplateRender {
                template: String::new(),
                error: "path template is empty".to_string(),
            });
        }
        self.template_engine.validate(&self.config.path_template)
    }

    fn validate_path(path: &str) -> Result<(), DeliveryError> {
        if path.contains('\0') {
            return Err(DeliveryError::Filesystem {
                path: path.to_string(),
                operation: "validate".to_string(),
                error: "Path contains null bytes".to_string(),
            });
        }
        Ok(())
    }

    fn report_path(
        &self,
        suite: &str,
        timestamp: &str,
        format: ReportFormat,
    ) -> Result<PathBuf, DeliveryError> {
        let mut variables = HashMap::new();
        variables.insert("suite".to_string(), suite.to_string());
        variables.insert("timestamp".to_string(), timestamp.to_string());
        variables.insert("format".to_string(), format.as_str().to_string());
        variables.insert("ext".to_string(), format.extension().to_string());

        let rendered = self
            .template_engine
            .render(&self.config.path_template, &variables)?;
        Self::validate_path(&rendered)?;
        Ok(self.config.directory.join(rendered))
    }

    async fn write_file(&self, path: &Path, contents: &[u8]) -> Result<(), DeliveryError> {
        let display = path.to_string_lossy().to_string();

        if !self.config.overwrite && fs::try_exists(path).await.unwrap_or(false) {
            return Err(DeliveryError::FileExists { path: display });
        }

        if self.config.create_dirs {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| DeliveryError::Filesystem {
                        path: parent.to_string_lossy().to_string(),
                        operation: "create_dirs".to_string(),
                        error: e.to_string(),
                    })?;
            }
        }

        fs::write(path, contents)
            .await
            .map_err(|e| DeliveryError::Filesystem {
                path: display,
                operation: "write".to_string(),
                error: e.to_string(),
            })
    }

    /// Write the reports of a suite; returns the files written
    pub async fn write_reports(
        &self,
        suite: &str,
        records: &[TestCaseRecord],
    ) -> Result<Vec<PathBuf>, DeliveryError> {
        let document = ReportDocument::new(suite, records);
        let timestamp = document.generated_at.format("%Y%m%d_%H%M%S").to_string();

        let mut written = Vec::with_capacity(self.config.formats.len());
        for format in &self.config.formats {
            let path = self.report_path(suite, &timestamp, *format)?;
            let contents = render(*format, &document)?;
            self.write_file(&path, &contents).await?;
            debug!(
                "Wrote {} report ({} bytes) to {}",
                format,
                contents.len(),
                path.display()
            );
            written.push(path);
        }
        Ok(written)
    }
}

#[async_trait]
impl ReportSink for FilesystemSink {
    async fn publish(&self, suite: &str, records: &[TestCaseRecord]) -> Result<(), SinkError> {
        let written = self.write_reports(suite, records).await?;
        info!(
            "Wrote {} report file(s) for suite {} to {}",
            written.len(),
            suite,
            self.config.directory.display()
        );
        Ok(())
    }
}
