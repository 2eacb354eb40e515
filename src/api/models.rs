//! Request and response bodies of the public HTTP API.
//!
//! `POST /api/query-reports` accepts:
//!
//! ```json
//! {
//!   "name": "张三",
//!   "phone": "13800138000",
//!   "fromDate": 1714521600000,
//!   "toDate": 1717113600000,
//!   "pageSize": 20,
//!   "currentPage": 1
//! }
//! ```
//!
//! Only `name` and `phone` are required; dates are epoch milliseconds.

use serde::{Deserialize, Serialize};

use crate::observability::MetricsSnapshot;
use crate::query::AttachmentReport;

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct QueryReportsRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub from_date: Option<i64>,
    #[serde(default)]
    pub to_date: Option<i64>,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub current_page: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReportItem {
    pub form_instance_id: String,
    pub file_name: String,
    pub file_size: Option<u64>,
    pub create_time: String,
    pub download_url: Option<String>,
    pub error: Option<String>,
}

impl From<&AttachmentReport> for ReportItem {
    fn from(report: &AttachmentReport) -> Self {
        let create_time = if report.create_time_formatted().is_empty() {
            report.create_time_raw().unwrap_or_default().to_string()
        } else {
            report.create_time_formatted().to_string()
        };

        Self {
            form_instance_id: report.form_instance_id().to_string(),
            file_name: report.file_name().to_string(),
            file_size: report.file_size_bytes(),
            create_time,
            download_url: report.download_url().map(str::to_string),
            error: report.error().map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(current_page: u32, page_size: u32, total_count: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total_count.div_ceil(u64::from(page_size))
        };

        Self {
            current_page,
            page_size,
            total_count,
            total_pages,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Summary {
    pub total: usize,
    pub valid: usize,
    pub errors: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct QueryReportsResponse {
    pub success: bool,
    pub data: Vec<ReportItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub version: &'static str,
    pub metrics: MetricsSnapshot,
}
