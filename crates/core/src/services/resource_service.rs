use uuid::Uuid;

use crate::backend::query::Query;
use crate::backend::traits::Backend;
use crate::backend::{decode_one, decode_rows, to_payload};
use crate::errors::CoreError;
use crate::models::resource::{Resource, ResourceInput, ResourceRow, UploadFile, UploadedFile};

pub const RESOURCES: &str = "resources";

/// Downloadable resources and file uploads to object storage.
pub struct ResourceService {
    bucket: String,
}

impl ResourceService {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Resources newest first, optionally restricted to one category.
    pub async fn list_resources(
        &self,
        backend: &dyn Backend,
        category: Option<&str>,
    ) -> Result<Vec<Resource>, CoreError> {
        let mut query = Query::new().order("created_at", false);
        if let Some(category) = category {
            query = query.eq("category", category);
        }
        let rows: Vec<ResourceRow> =
            decode_rows(RESOURCES, backend.select(RESOURCES, &query).await?)?;
        Ok(rows.into_iter().map(Resource::from).collect())
    }

    /// Create a resource. An uploaded `file_path` without a `url` gets the
    /// file's public URL.
    pub async fn create_resource(
        &self,
        backend: &dyn Backend,
        input: &ResourceInput,
    ) -> Result<Resource, CoreError> {
        if input.title.as_deref().map_or(true, |t| t.trim().is_empty()) {
            return Err(CoreError::ValidationError("title is required".into()));
        }
        if input.url.is_none() && input.file_path.is_none() {
            return Err(CoreError::ValidationError(
                "a resource needs a url or an uploaded file".into(),
            ));
        }

        let mut input = input.clone();
        if input.url.is_none() {
            if let Some(path) = &input.file_path {
                input.url = Some(backend.public_url(&self.bucket, path));
            }
        }

        let rows = backend.insert(RESOURCES, to_payload(&input)?).await?;
        let row: ResourceRow = decode_one(RESOURCES, rows)?;
        Ok(row.into())
    }

    /// Delete a resource and, when it was an upload, its stored file.
    pub async fn delete_resource(&self, backend: &dyn Backend, id: Uuid) -> Result<(), CoreError> {
        let query = Query::new().eq("id", id.to_string());
        let rows: Vec<ResourceRow> = decode_rows(RESOURCES, backend.select(RESOURCES, &query).await?)?;
        let resource: Resource = rows
            .into_iter()
            .next()
            .map(Resource::from)
            .ok_or_else(|| CoreError::NotFound(format!("resource {id}")))?;

        backend.delete(RESOURCES, &query).await?;

        if let Some(path) = resource.file_path {
            if let Err(e) = backend.remove_objects(&self.bucket, &[path.clone()]).await {
                // Row is gone already; an orphaned object is harmless.
                log::warn!("Failed to remove stored file {path}: {e}");
            }
        }
        Ok(())
    }

    /// Upload files one by one. A file that fails is logged and left out of
    /// the result; the remaining files are still uploaded.
    pub async fn upload_files(
        &self,
        backend: &dyn Backend,
        files: Vec<UploadFile>,
    ) -> Vec<UploadedFile> {
        let mut uploaded = Vec::with_capacity(files.len());
        let now = chrono::Utc::now().timestamp_millis();

        for file in files {
            if file.bytes.is_empty() {
                log::warn!("Skipping empty file {}", file.file_name);
                continue;
            }
            let path = object_name(now, &file);
            match backend
                .upload(&self.bucket, &path, file.bytes, &file.content_type)
                .await
            {
                Ok(stored) => uploaded.push(UploadedFile {
                    public_url: backend.public_url(&self.bucket, &stored),
                    original_name: file.file_name,
                    path: stored,
                }),
                Err(e) => log::warn!("Upload of {} failed: {e}", file.file_name),
            }
        }

        uploaded
    }
}

/// `{millis}-{8 hex chars}.{ext}`; the original name is not reused.
fn object_name(now_ms: i64, file: &UploadFile) -> String {
    let id = Uuid::new_v4().simple().to_string();
    let short = &id[..8];
    match file.extension() {
        Some(ext) => format!("{now_ms}-{short}.{ext}"),
        None => format!("{now_ms}-{short}"),
    }
}
