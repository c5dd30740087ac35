//! Common API utilities and shared types

use axum::extract::Multipart;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::api::middleware::ApiError;
use crate::models::ListParams;

pub fn default_page() -> u32 {
    1
}

pub fn default_per_page() -> u32 {
    20
}

/// Pagination query parameters
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl Default for PaginationQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PaginationQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }
}

/// `?from=YYYY-MM-DD&to=YYYY-MM-DD`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateRangeQuery {
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

/// A file part read from a multipart body
#[derive(Debug)]
pub struct FilePart {
    pub file_name: Option<String>,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Read every part of a multipart body: text fields by name, plus the
/// first part named `file_field`
pub async fn read_multipart(
    multipart: &mut Multipart,
    file_field: &str,
) -> Result<(Vec<(String, String)>, Option<FilePart>), ApiError> {
    let mut fields = Vec::new();
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name == file_field && file.is_none() {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field
                .content_type()
                .map(str::to_string)
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;
            file = Some(FilePart {
                file_name,
                content_type,
                data: data.to_vec(),
            });
        } else if !name.is_empty() {
            let value = field
                .text()
                .await
                .map_err(|e| ApiError::validation_error(format!("Failed to read field '{}': {}", name, e)))?;
            fields.push((name, value));
        }
    }

    Ok((fields, file))
}

/// Value of a text field, `None` when absent or blank
pub fn field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_is_clamped() {
        let query = PaginationQuery { page: 0, per_page: 500 };
        let params = query.params();
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, 100);
    }

    #[test]
    fn test_field_lookup() {
        let fields = vec![
            ("first_name".to_string(), " Ada ".to_string()),
            ("phone".to_string(), "  ".to_string()),
        ];
        assert_eq!(field(&fields, "first_name"), Some("Ada"));
        assert_eq!(field(&fields, "phone"), None);
        assert_eq!(field(&fields, "email"), None);
    }
}
