//! Report output configuration

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Report output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory that receives report files
    pub directory: PathBuf,

    /// Formats written for every suite run
    pub formats: Vec<ReportFormat>,

    /// File name template. Supports `{{suite}}`, `{{timestamp}}` and `{{ext}}`.
    pub path_template: String,

    /// Print a summary table on stdout as well
    #[serde(default = "crate::domains::utils::default_true")]
    pub stdout: bool,

    /// Whether existing report files may be replaced
    #[serde(default = "crate::domains::utils::default_true")]
    pub overwrite: bool,
}

/// Supported report file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    /// testgrid compatible JUnit XML
    Junit,
    Json,
    JsonCompact,
    Yaml,
    Csv,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Junit => "junit",
            ReportFormat::Json => "json",
            ReportFormat::JsonCompact => "json_compact",
            ReportFormat::Yaml => "yaml",
            ReportFormat::Csv => "csv",
        }
    }

    /// File extension for the format
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Junit => "xml",
            ReportFormat::Json | ReportFormat::JsonCompact => "json",
            ReportFormat::Yaml => "yaml",
            ReportFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "junit" | "xml" => Ok(ReportFormat::Junit),
            "json" => Ok(ReportFormat::Json),
            "json_compact" => Ok(ReportFormat::JsonCompact),
            "yaml" | "yml" => Ok(ReportFormat::Yaml),
            "csv" => Ok(ReportFormat::Csv),
            _ => Err(format!("Invalid report format: {}", s)),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("artifacts"),
            formats: vec![ReportFormat::Junit, ReportFormat::Json],
            path_template: "{{suite}}.{{ext}}".to_string(),
            stdout: true,
            overwrite: true,
        }
    }
}

impl Validatable for OutputConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.path_template, "path_template", self.domain_name())?;

        if self.directory.as_os_str().is_empty() {
            return Err(self.validation_error("directory cannot be empty"));
        }

        // one file per format; two formats sharing a name would clobber each other
        if self.formats.len() > 1 && !self.path_template.contains("{{ext}}") {
            return Err(self.validation_error(
                "path_template must contain {{ext}} when more than one format is configured",
            ));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "output"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_defaults() {
        let config = OutputConfig::default();
        assert_eq!(config.directory, PathBuf::from("artifacts"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!(ReportFormat::from_str("XML").unwrap(), ReportFormat::Junit);
        assert_eq!(
            ReportFormat::from_str("json-compact").unwrap(),
            ReportFormat::JsonCompact
        );
        assert_eq!(ReportFormat::Junit.extension(), "xml");
        assert!(ReportFormat::from_str("html").is_err());
    }

    #[test]
    fn test_template_needs_extension_for_multiple_formats() {
        let config = OutputConfig {
            path_template: "{{suite}}-report".to_string(),
            ..OutputConfig::default()
        };
        assert!(config.validate().is_err());

        let single = OutputConfig {
            formats: vec![ReportFormat::Csv],
            path_template: "{{suite}}-report.csv".to_string(),
            ..OutputConfig::default()
        };
        assert!(single.validate().is_ok());
    }
}
