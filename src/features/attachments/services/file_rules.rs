use sha2::{Digest, Sha256};

use crate::core::error::{AppError, Result};
use crate::shared::constants::ALLOWED_ATTACHMENT_TYPES;

/// Accepted upload: normalized extension and the MIME type stored for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileKind {
    pub extension: &'static str,
    pub content_type: &'static str,
}

/// Check name and size of an upload. The stored content type comes from the
/// extension, not from what the client claims.
pub fn validate_upload(file_name: &str, size: usize, max_size: usize) -> Result<FileKind> {
    if size == 0 {
        return Err(AppError::BadRequest("File is empty".to_string()));
    }
    if size > max_size {
        return Err(AppError::PayloadTooLarge(format!(
            "File too large. Maximum size is {} bytes ({} MB)",
            max_size,
            max_size / 1024 / 1024
        )));
    }

    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    ALLOWED_ATTACHMENT_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|&(extension, content_type)| FileKind {
            extension,
            content_type,
        })
        .ok_or_else(|| {
            let allowed: Vec<&str> = ALLOWED_ATTACHMENT_TYPES.iter().map(|(e, _)| *e).collect();
            AppError::BadRequest(format!(
                "File type '{}' is not allowed. Allowed types: {}",
                extension,
                allowed.join(", ")
            ))
        })
}

/// Strip any client supplied directory part and cap the length
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();
    let base = if base.is_empty() { "unnamed" } else { base };
    base.chars().take(255).collect()
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::storage::{BlobStore, MemoryStore};
    use crate::shared::constants::MAX_ATTACHMENT_SIZE;

    #[test]
    fn test_allowed_extension_maps_content_type() {
        let kind = validate_upload("Invoice.PDF", 10, MAX_ATTACHMENT_SIZE).unwrap();
        assert_eq!(kind.extension, "pdf");
        assert_eq!(kind.content_type, "application/pdf");

        let kind = validate_upload("photo.jpeg", 10, MAX_ATTACHMENT_SIZE).unwrap();
        assert_eq!(kind.content_type, "image/jpeg");
    }

    #[test]
    fn test_rejected_extensions() {
        for name in ["script.exe", "archive.tar.gz", "noextension", "trailing."] {
            let result = validate_upload(name, 10, MAX_ATTACHMENT_SIZE);
            assert!(matches!(result, Err(AppError::BadRequest(_))), "{name}");
        }
    }

    #[test]
    fn test_size_limits() {
        assert!(matches!(
            validate_upload("a.txt", 0, MAX_ATTACHMENT_SIZE),
            Err(AppError::BadRequest(_))
        ));
        assert!(validate_upload("a.txt", MAX_ATTACHMENT_SIZE, MAX_ATTACHMENT_SIZE).is_ok());
        assert!(matches!(
            validate_upload("a.txt", MAX_ATTACHMENT_SIZE + 1, MAX_ATTACHMENT_SIZE),
            Err(AppError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../../etc/passwd.txt"), "passwd.txt");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\notes.txt"), "notes.txt");
        assert_eq!(sanitize_file_name("  "), "unnamed");
    }

    #[test]
    fn test_sha256_known_value() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_rehashing_stored_bytes_matches_checksum() {
        let store = MemoryStore::new();
        let data = b"%PDF-1.4 quarterly numbers".to_vec();
        let checksum = sha256_hex(&data);

        store
            .put("attachments/x.pdf", data, "application/pdf")
            .await
            .unwrap();
        let stored = store.get("attachments/x.pdf").await.unwrap();
        assert_eq!(sha256_hex(&stored), checksum);
    }
}
