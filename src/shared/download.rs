use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::core::error::AppError;

/// `attachment` disposition with an ASCII fallback name and the exact name
/// as RFC 5987 `filename*`
pub fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() || c == ' ') && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(file_name)
    )
}

/// Build a file download response
pub fn file_response(data: Vec<u8>, content_type: &str, file_name: &str) -> Result<Response, AppError> {
    let content_type = HeaderValue::from_str(content_type)
        .map_err(|e| AppError::Internal(format!("Invalid content type: {}", e)))?;
    let disposition = HeaderValue::from_str(&content_disposition(file_name))
        .map_err(|e| AppError::Internal(format!("Invalid file name: {}", e)))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(data.len())),
        ],
        Body::from(data),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_name() {
        assert_eq!(
            content_disposition("report 1.pdf"),
            "attachment; filename=\"report 1.pdf\"; filename*=UTF-8''report%201.pdf"
        );
    }

    #[test]
    fn test_non_ascii_and_quotes_are_replaced_in_fallback() {
        let value = content_disposition("r\u{e9}sum\u{e9} \"final\".txt");
        assert!(value.starts_with("attachment; filename=\"r_sum_ _final_.txt\""));
        assert!(value.contains("filename*=UTF-8''r%C3%A9sum%C3%A9%20%22final%22.txt"));
    }

    #[test]
    fn test_file_response_headers() {
        let response = file_response(b"hello".to_vec(), "text/plain", "a.txt").unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
        assert_eq!(headers[header::CONTENT_LENGTH], "5");
        assert!(headers[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("attachment;"));
    }
}
