//! Object storage port for device images

use anyhow::Result;
use async_trait::async_trait;

/// Blob store serving device images by public URL
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `name` and return its public URL
    async fn put(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;

    async fn delete(&self, name: &str) -> Result<()>;
}

/// Object name for a device image, keeping a sanitized extension
pub fn image_object_name(device_id: i32, filename: &str) -> String {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()));

    let stem = uuid::Uuid::new_v4().simple().to_string();
    match extension {
        Some(ext) => format!("device-{}/{}.{}", device_id, stem, ext),
        None => format!("device-{}/{}", device_id, stem),
    }
}

/// Content type guessed from the object name
pub fn content_type_for(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_name_keeps_extension() {
        let name = image_object_name(5, "Photo.PNG");
        assert!(name.starts_with("device-5/"));
        assert!(name.ends_with(".png"));
        assert_eq!(content_type_for(&name), "image/png");
    }

    #[test]
    fn test_object_name_drops_suspicious_extension() {
        let name = image_object_name(5, "../../etc/passwd");
        assert!(name.starts_with("device-5/"));
        assert!(!name.contains(".."));
        assert_eq!(content_type_for(&name), "application/octet-stream");
    }
}
