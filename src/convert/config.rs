use std::fs;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, ConvertResult};
use crate::inference::InferenceOptions;
use crate::policy::WriteMode;
use crate::schema::{SchemaOptions, DEFAULT_ID_PATTERN};
use crate::source::SourceOptions;

use super::observability::ConversionSeverity;

/// Default number of rows per insert batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

const TEMPLATE_PLACEHOLDERS: [&str; 3] = ["{source}", "{label}", "{index}"];

/// Options controlling one conversion run.
///
/// Use [`Default`] for common cases. Every field may be omitted when deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// What to do with tables that already exist.
    pub mode: WriteMode,
    /// Stop type inference after this many rows. `None` scans every row.
    pub max_sample_rows: Option<usize>,
    /// Column names matching this regex become the primary key candidate. `None` disables keys.
    pub id_pattern: Option<String>,
    /// Table name template using `{source}`, `{label}` and `{index}`.
    pub table_name_template: Option<String>,
    /// Rows per insert batch; abort requests are honoured between batches.
    pub batch_size: usize,
    /// In `create` mode, pick a fresh suffixed name instead of skipping an existing table.
    pub rename_existing: bool,
    /// Return the first error instead of recording it and continuing.
    pub fail_fast: bool,
    /// Record every converted table in the `_source_info_` table.
    pub record_source_info: bool,
    /// Reader options.
    pub source: SourceOptions,
    /// Severity threshold at which observers get `on_alert`.
    pub alert_at_or_above: ConversionSeverity,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            mode: WriteMode::Create,
            max_sample_rows: None,
            id_pattern: Some(DEFAULT_ID_PATTERN.to_string()),
            table_name_template: None,
            batch_size: DEFAULT_BATCH_SIZE,
            rename_existing: true,
            fail_fast: false,
            record_source_info: true,
            source: SourceOptions::default(),
            alert_at_or_above: ConversionSeverity::Critical,
        }
    }
}

impl ConvertOptions {
    /// Load options from a JSON file and validate them.
    pub fn from_json_file(path: impl AsRef<Path>) -> ConvertResult<Self> {
        let text = fs::read_to_string(path)?;
        let options: Self = serde_json::from_str(&text)?;
        options.validate()?;
        Ok(options)
    }

    /// Reject option combinations the run cannot honour.
    pub fn validate(&self) -> ConvertResult<()> {
        if self.batch_size == 0 {
            return Err(invalid("batch_size must be at least 1"));
        }
        if self.max_sample_rows == Some(0) {
            return Err(invalid("max_sample_rows must be at least 1 (omit it to scan every row)"));
        }
        if self.source.max_buffer_rows == Some(0) {
            return Err(invalid("source.max_buffer_rows must be at least 1 (null buffers every row)"));
        }
        if let Some(pattern) = &self.id_pattern {
            Regex::new(pattern).map_err(|e| invalid(format!("id_pattern: {e}")))?;
        }
        if let Some(template) = &self.table_name_template {
            if !TEMPLATE_PLACEHOLDERS.iter().any(|p| template.contains(p)) {
                return Err(invalid(format!(
                    "table_name_template '{template}' must contain one of {}",
                    TEMPLATE_PLACEHOLDERS.join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Inference settings derived from these options.
    pub fn inference_options(&self) -> InferenceOptions {
        InferenceOptions {
            max_sample_rows: self.max_sample_rows,
        }
    }

    /// Schema settings derived from these options.
    pub fn schema_options(&self) -> ConvertResult<SchemaOptions> {
        SchemaOptions::with_id_pattern(self.id_pattern.as_deref())
    }

    /// Whether the name resolver may hand out names of existing tables.
    pub(crate) fn reuses_existing_names(&self) -> bool {
        self.mode.reuses_existing() || !self.rename_existing
    }
}

fn invalid(message: impl Into<String>) -> ConvertError {
    ConvertError::InvalidConfig {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::ConvertOptions;
    use crate::policy::WriteMode;
    use crate::source::SourceOptions;
    use crate::ConvertError;

    #[test]
    fn defaults_validate() {
        let o = ConvertOptions::default();
        assert!(o.validate().is_ok());
        assert_eq!(o.batch_size, 1000);
        assert!(o.record_source_info);
        assert_eq!(o.source.max_buffer_rows, Some(crate::source::DEFAULT_MAX_BUFFER_ROWS));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let o: ConvertOptions = serde_json::from_str(r#"{"mode":"append","max_sample_rows":50}"#).unwrap();
        assert_eq!(o.mode, WriteMode::Append);
        assert_eq!(o.max_sample_rows, Some(50));
        assert_eq!(o.id_pattern, ConvertOptions::default().id_pattern);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let cases = [
            ConvertOptions {
                batch_size: 0,
                ..Default::default()
            },
            ConvertOptions {
                max_sample_rows: Some(0),
                ..Default::default()
            },
            ConvertOptions {
                source: SourceOptions {
                    max_buffer_rows: Some(0),
                    ..Default::default()
                },
                ..Default::default()
            },
            ConvertOptions {
                id_pattern: Some("(".to_string()),
                ..Default::default()
            },
            ConvertOptions {
                table_name_template: Some("fixed".to_string()),
                ..Default::default()
            },
        ];
        for o in cases {
            assert!(matches!(o.validate(), Err(ConvertError::InvalidConfig { .. })), "{o:?}");
        }
    }
}
