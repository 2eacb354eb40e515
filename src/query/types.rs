use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Validated lookup request. Built once per inbound call and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameters {
    pub search_name: String,
    pub search_phone: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub from_date: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub to_date: DateTime<Utc>,
    pub page_size: u32,
    pub current_page: u32,
}

/// One matched form instance after batch fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FormInstanceRecord {
    pub form_instance_id: String,
    pub create_time_utc: Option<String>,
    /// Raw attachment descriptors from the attachment field.
    pub attachments: Vec<Value>,
}

/// Attachment metadata before a temporary URL has been requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentShell {
    pub form_instance_id: String,
    pub file_name: String,
    pub file_size_bytes: Option<u64>,
    /// Absolute source URL, empty when the descriptor carried none.
    pub original_url: String,
    pub create_time_raw: Option<String>,
    pub create_time_formatted: String,
}

impl AttachmentShell {
    pub fn resolved(self, download_url: String) -> AttachmentReport {
        AttachmentReport::from_shell(self, Some(download_url), None)
    }

    pub fn failed(self, error: String) -> AttachmentReport {
        AttachmentReport::from_shell(self, None, Some(error))
    }
}

/// Unit returned to the caller. Exactly one of `download_url` and `error`
/// is set; the only constructors are [`AttachmentShell::resolved`] and
/// [`AttachmentShell::failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentReport {
    form_instance_id: String,
    file_name: String,
    file_size_bytes: Option<u64>,
    original_url: String,
    download_url: Option<String>,
    create_time_formatted: String,
    create_time_raw: Option<String>,
    error: Option<String>,
}

impl AttachmentReport {
    fn from_shell(
        shell: AttachmentShell,
        download_url: Option<String>,
        error: Option<String>,
    ) -> Self {
        Self {
            form_instance_id: shell.form_instance_id,
            file_name: shell.file_name,
            file_size_bytes: shell.file_size_bytes,
            original_url: shell.original_url,
            download_url,
            create_time_formatted: shell.create_time_formatted,
            create_time_raw: shell.create_time_raw,
            error,
        }
    }

    pub fn form_instance_id(&self) -> &str {
        &self.form_instance_id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn file_size_bytes(&self) -> Option<u64> {
        self.file_size_bytes
    }

    pub fn download_url(&self) -> Option<&str> {
        self.download_url.as_deref()
    }

    pub fn create_time_formatted(&self) -> &str {
        &self.create_time_formatted
    }

    pub fn create_time_raw(&self) -> Option<&str> {
        self.create_time_raw.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_downloadable(&self) -> bool {
        self.download_url.is_some()
    }
}

/// Result of [`QueryOrchestrator::query_report_data`](super::QueryOrchestrator::query_report_data).
///
/// Failures are reported in-band: callers check `success`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub success: bool,
    pub data: Vec<AttachmentReport>,
    pub total_count: u64,
    pub current_page: u32,
    pub page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResult {
    pub fn empty(params: &QueryParameters) -> Self {
        Self {
            success: true,
            data: Vec::new(),
            total_count: 0,
            current_page: params.current_page,
            page_size: params.page_size,
            error: None,
        }
    }

    pub fn failure(params: &QueryParameters, error: String) -> Self {
        Self {
            success: false,
            data: Vec::new(),
            total_count: 0,
            current_page: params.current_page,
            page_size: params.page_size,
            error: Some(error),
        }
    }

    pub fn downloadable_count(&self) -> usize {
        self.data.iter().filter(|r| r.is_downloadable()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.data.len() - self.downloadable_count()
    }
}
