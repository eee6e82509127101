//! Photo upload normalization.
//!
//! Uploaded images are checked against the configured limits, decoded,
//! shrunk to fit the configured box and re-encoded as `WebP` before they are
//! written through the storage backend.

use std::{io::Cursor, sync::Arc};

use chrono::Utc;
use image::{DynamicImage, GenericImageView, codecs::webp::WebPEncoder, imageops::FilterType};
use samvad_common::{AppError, AppResult, IdGenerator, StorageBackend, config::UploadConfig};
use samvad_db::entities::report::PhotoDescriptor;

/// Content types accepted for report photos.
pub const ACCEPTED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/gif"];

const STORED_CONTENT_TYPE: &str = "image/webp";

/// A photo as received from the client.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub original_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Photo service.
#[derive(Clone)]
pub struct PhotoService {
    storage: Arc<dyn StorageBackend>,
    limits: UploadConfig,
    id_gen: IdGenerator,
}

impl PhotoService {
    /// Create a new photo service.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, limits: UploadConfig) -> Self {
        Self {
            storage,
            limits,
            id_gen: IdGenerator::new(),
        }
    }

    /// Check count, size and type of a batch before any work is done.
    pub fn check_batch(&self, uploads: &[PhotoUpload]) -> AppResult<()> {
        if uploads.len() > self.limits.max_files {
            return Err(AppError::Validation(format!(
                "Too many files. Maximum is {} photos",
                self.limits.max_files
            )));
        }
        for upload in uploads {
            if !ACCEPTED_CONTENT_TYPES.contains(&upload.content_type.to_ascii_lowercase().as_str())
            {
                return Err(AppError::Validation(
                    "Only image files (JPEG, JPG, PNG, GIF) are allowed".to_string(),
                ));
            }
            if upload.data.len() > self.limits.max_file_size {
                return Err(AppError::Validation(format!(
                    "File too large. Maximum size is {} MB",
                    self.limits.max_file_size / (1024 * 1024)
                )));
            }
        }
        Ok(())
    }

    /// Normalize and store a batch, all or nothing.
    ///
    /// If any photo fails, files already written for the batch are deleted.
    pub async fn store_all(&self, uploads: Vec<PhotoUpload>) -> AppResult<Vec<PhotoDescriptor>> {
        self.check_batch(&uploads)?;

        let mut stored = Vec::with_capacity(uploads.len());
        for upload in uploads {
            match self.store_one(upload).await {
                Ok(descriptor) => stored.push(descriptor),
                Err(e) => {
                    self.release(&stored).await;
                    return Err(match e {
                        AppError::Validation(_) => e,
                        other => AppError::Validation(format!("Image processing failed: {other}")),
                    });
                }
            }
        }
        Ok(stored)
    }

    async fn store_one(&self, upload: PhotoUpload) -> AppResult<PhotoDescriptor> {
        let (max_width, max_height) = (self.limits.max_width, self.limits.max_height);
        let data = upload.data;
        let encoded = tokio::task::spawn_blocking(move || normalize(&data, max_width, max_height))
            .await
            .map_err(|e| AppError::Internal(format!("Image task failed: {e}")))?
            .map_err(|e| AppError::Validation(format!("Image processing failed: {e}")))?;

        let filename = self.id_gen.generate_file_name("webp");
        let file = self
            .storage
            .put(&filename, &encoded, STORED_CONTENT_TYPE)
            .await?;

        Ok(PhotoDescriptor {
            filename: file.key,
            original_name: upload.original_name,
            mimetype: file.content_type,
            size: file.size as i64,
            url: file.url,
            uploaded_at: Utc::now().fixed_offset(),
        })
    }

    /// Delete stored photos, best effort.
    pub async fn release(&self, photos: &[PhotoDescriptor]) {
        for photo in photos {
            if let Err(e) = self.storage.delete(&photo.filename).await {
                tracing::warn!(file = %photo.filename, error = %e, "Failed to delete photo");
            }
        }
    }
}

/// Decode, shrink to fit inside `max_width` x `max_height`, encode as `WebP`.
///
/// Images already inside the box keep their size.
pub fn normalize(data: &[u8], max_width: u32, max_height: u32) -> Result<Vec<u8>, image::ImageError> {
    let img = image::load_from_memory(data)?;
    let img = fit_inside(img, max_width, max_height);

    let rgba = DynamicImage::ImageRgba8(img.to_rgba8());
    let mut out = Cursor::new(Vec::new());
    rgba.write_with_encoder(WebPEncoder::new_lossless(&mut out))?;
    Ok(out.into_inner())
}

fn fit_inside(img: DynamicImage, max_width: u32, max_height: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width <= max_width && height <= max_height {
        return img;
    }
    img.resize(max_width, max_height, FilterType::Lanczos3)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::{ImageFormat, RgbImage};
    use samvad_common::LocalStorage;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, image::Rgb([200, 10, 10])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn service() -> (PhotoService, Arc<LocalStorage>) {
        let dir = std::env::temp_dir().join(format!("samvad-photos-{}", uuid::Uuid::new_v4()));
        let storage = Arc::new(LocalStorage::new(dir, "/api/uploads".to_string()));
        let limits = UploadConfig {
            max_file_size: 1024 * 1024,
            max_files: 2,
            max_width: 120,
            max_height: 90,
        };
        (PhotoService::new(storage.clone(), limits), storage)
    }

    fn upload(data: Vec<u8>) -> PhotoUpload {
        PhotoUpload {
            original_name: "pothole.png".to_string(),
            content_type: "image/png".to_string(),
            data,
        }
    }

    #[test]
    fn test_large_image_shrinks_to_fit() {
        let webp = normalize(&png(400, 150), 120, 90).unwrap();
        let decoded = image::load_from_memory_with_format(&webp, ImageFormat::WebP).unwrap();
        assert_eq!(decoded.dimensions(), (120, 45));
    }

    #[test]
    fn test_small_image_is_not_enlarged() {
        let webp = normalize(&png(40, 30), 120, 90).unwrap();
        let decoded = image::load_from_memory(&webp).unwrap();
        assert_eq!(decoded.dimensions(), (40, 30));
    }

    #[test]
    fn test_rejects_disallowed_type() {
        let (service, _) = service();
        let mut bad = upload(png(10, 10));
        bad.content_type = "application/pdf".to_string();
        assert!(matches!(
            service.check_batch(&[bad]),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_too_many_files() {
        let (service, _) = service();
        let batch = vec![upload(png(1, 1)), upload(png(1, 1)), upload(png(1, 1))];
        assert!(service.check_batch(&batch).is_err());
    }

    #[tokio::test]
    async fn test_store_all_writes_webp_files() {
        let (service, storage) = service();
        let photos = service.store_all(vec![upload(png(300, 300))]).await.unwrap();

        assert_eq!(photos.len(), 1);
        assert!(photos[0].filename.ends_with(".webp"));
        assert_eq!(photos[0].mimetype, "image/webp");
        assert_eq!(photos[0].original_name, "pothole.png");
        assert_eq!(photos[0].url, format!("/api/uploads/{}", photos[0].filename));
        assert!(storage.root().join(&photos[0].filename).exists());

        service.release(&photos).await;
        assert!(!storage.root().join(&photos[0].filename).exists());
    }

    #[tokio::test]
    async fn test_failed_batch_leaves_no_files() {
        let (service, storage) = service();
        let good = upload(png(10, 10));
        let corrupt = upload(b"not an image at all".to_vec());

        let err = service.store_all(vec![good, corrupt]).await.unwrap_err();
        match err {
            AppError::Validation(message) => {
                assert!(message.starts_with("Image processing failed"), "{message}");
            }
            other => panic!("unexpected: {other:?}"),
        }

        let leftovers = std::fs::read_dir(storage.root())
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftovers, 0);
    }
}
