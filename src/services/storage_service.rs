use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs;
use uuid::Uuid;

use crate::error::{Error, Result};

pub const MAX_THUMBNAIL_BYTES: usize = 5 * 1024 * 1024;

const THUMBNAIL_BUCKET: &str = "thumbnails";

/// Image kinds accepted for thumbnails, checked by extension and magic bytes.
pub fn image_extension(filename: &str, data: &[u8]) -> Result<&'static str> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let (canonical, valid) = match ext.as_str() {
        "jpg" | "jpeg" => ("jpg", data.starts_with(&[0xFF, 0xD8, 0xFF])),
        "png" => ("png", data.starts_with(&[0x89, 0x50, 0x4E, 0x47])),
        "webp" => (
            "webp",
            data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP",
        ),
        "" => return Err(Error::BadRequest("Ficheiro sem extensão.".into())),
        other => {
            return Err(Error::BadRequest(format!(
                "Tipo de ficheiro .{} não permitido. Use jpg, png ou webp.",
                other
            )))
        }
    };
    if !valid {
        return Err(Error::BadRequest(
            "O conteúdo do ficheiro não corresponde a uma imagem válida.".into(),
        ));
    }
    Ok(canonical)
}

/// Local bucket under `UPLOADS_DIR`, served at `/uploads`.
#[derive(Clone)]
pub struct StorageService {
    root: PathBuf,
    public_base_url: String,
}

impl StorageService {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn public_url(&self, bucket: &str, object: &str) -> String {
        format!("{}/uploads/{}/{}", self.public_base_url, bucket, object)
    }

    /// Stores a thumbnail under a generated name and returns its public URL.
    pub async fn save_thumbnail(&self, filename: &str, data: &Bytes) -> Result<String> {
        if data.is_empty() {
            return Err(Error::BadRequest("Ficheiro vazio.".into()));
        }
        if data.len() > MAX_THUMBNAIL_BYTES {
            return Err(Error::BadRequest("A imagem excede o limite de 5 MB.".into()));
        }
        let ext = image_extension(filename, data)?;

        let dir = self.root.join(THUMBNAIL_BUCKET);
        fs::create_dir_all(&dir).await?;
        let object = format!("{}.{}", Uuid::new_v4(), ext);
        fs::write(dir.join(&object), data).await.map_err(|e| {
            tracing::error!(error = ?e, "Failed to write thumbnail");
            Error::Io(e)
        })?;

        Ok(self.public_url(THUMBNAIL_BUCKET, &object))
    }

    /// Keeps the object at `url` only when the step that references it succeeded.
    pub async fn keep_or_remove<T, E>(
        &self,
        url: &str,
        linked: std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        if linked.is_err() {
            self.remove_by_url(url).await;
        }
        linked
    }

    /// Removes an object this bucket previously handed out; foreign URLs are ignored.
    pub async fn remove_by_url(&self, url: &str) {
        let prefix = format!("{}/uploads/", self.public_base_url);
        let Some(relative) = url.strip_prefix(&prefix) else {
            return;
        };
        if relative.split('/').any(|part| part == ".." || part.is_empty()) {
            return;
        }
        if let Err(e) = fs::remove_file(self.root.join(relative)).await {
            tracing::warn!(error = ?e, url, "Failed to remove stored object");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn checks_magic_bytes_against_extension() {
        assert_eq!(image_extension("capa.PNG", PNG).unwrap(), "png");
        assert_eq!(image_extension("foto.jpeg", &[0xFF, 0xD8, 0xFF, 0xE0]).unwrap(), "jpg");
        assert!(image_extension("capa.jpg", PNG).is_err());
        assert!(image_extension("script.svg", b"<svg").is_err());
        assert!(image_extension("semextensao", PNG).is_err());
    }

    #[tokio::test]
    async fn saved_thumbnails_get_public_urls() {
        let root = std::env::temp_dir().join(format!("wellness-storage-{}", Uuid::new_v4()));
        let storage = StorageService::new(&root, "https://app.exemplo.pt/");
        let url = tokio_test::assert_ok!(
            storage
                .save_thumbnail("capa.png", &Bytes::from_static(PNG))
                .await
        );
        assert!(url.starts_with("https://app.exemplo.pt/uploads/thumbnails/"));
        assert!(url.ends_with(".png"));

        let object = url.rsplit('/').next().unwrap();
        assert!(root.join("thumbnails").join(object).exists());

        storage.remove_by_url(&url).await;
        assert!(!root.join("thumbnails").join(object).exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn unreferenced_upload_is_removed() {
        let root = std::env::temp_dir().join(format!("wellness-storage-{}", Uuid::new_v4()));
        let storage = StorageService::new(&root, "https://app.exemplo.pt");
        let data = Bytes::from_static(PNG);

        let kept = storage.save_thumbnail("a.png", &data).await.unwrap();
        let linked: std::result::Result<(), Error> = Ok(());
        tokio_test::assert_ok!(storage.keep_or_remove(&kept, linked).await);
        let kept_object = kept.rsplit('/').next().unwrap();
        assert!(root.join("thumbnails").join(kept_object).exists());

        let orphan = storage.save_thumbnail("b.png", &data).await.unwrap();
        let failed: std::result::Result<(), Error> = Err(Error::Internal("update failed".into()));
        tokio_test::assert_err!(storage.keep_or_remove(&orphan, failed).await);
        let orphan_object = orphan.rsplit('/').next().unwrap();
        assert!(!root.join("thumbnails").join(orphan_object).exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn foreign_urls_are_not_removed() {
        let storage = StorageService::new("/nonexistent", "https://app.exemplo.pt");
        storage.remove_by_url("https://outro.pt/uploads/x.png").await;
        storage
            .remove_by_url("https://app.exemplo.pt/uploads/../etc/passwd")
            .await;
    }
}
