//! Dataset extension: upload and download on top of the generic resource routes

use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{web, HttpResponse, Scope};
use bytes::BytesMut;
use futures::{StreamExt, TryStreamExt};
use log::{debug, error, info, warn};
use std::sync::Arc;

use crate::app_state::AppState;
use crate::entity::dataset::{Dataset, DatasetCreate, FileType};
use crate::entity::{Entity, EntityId, Record};
use crate::error::ApiError;
use crate::repository::Repository;
use crate::service::user_context::UserContext;
use crate::service::{log_context, resource_scope, ResourceHandler};

pub const UNSUPPORTED_FILE_TYPE: &str = "Unsupported file type. Only CSV and Excel files are allowed.";

/// Detect the dataset type from the extension after the last `.`, ignoring case.
/// A filename without a `.` has no extension and is not recognised.
pub fn detect_file_type(filename: &str) -> Option<FileType> {
    let (_, extension) = filename.rsplit_once('.')?;
    match extension.to_lowercase().as_str() {
        "csv" => Some(FileType::Csv),
        "xls" | "xlsx" => Some(FileType::Excel),
        _ => None,
    }
}

/// Filename with its final extension removed
pub fn name_from_filename(filename: &str) -> &str {
    filename.rsplit_once('.').map_or(filename, |(stem, _)| stem)
}

/// Raw content of a dataset with the filename to offer it under
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetDownload {
    pub filename: String,
    pub content: Vec<u8>,
}

pub struct DatasetService {
    repository: Arc<dyn Repository<Dataset>>,
    max_upload_size: usize,
}

impl DatasetService {
    pub fn new(repository: Arc<dyn Repository<Dataset>>, max_upload_size: usize) -> Self {
        Self { repository, max_upload_size }
    }

    /// Store an uploaded file. An explicit non-blank `name` wins over the one
    /// derived from the filename.
    pub fn upload(
        &self,
        caller: &UserContext,
        filename: &str,
        content: Vec<u8>,
        name: Option<String>,
    ) -> Result<Record<Dataset>, ApiError> {
        let file_type = detect_file_type(filename).ok_or_else(|| {
            warn!("Rejected upload of {}: unsupported extension", filename);
            ApiError::Validation(UNSUPPORTED_FILE_TYPE.to_string())
        })?;

        let name = name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| name_from_filename(filename).to_string());
        let data = DatasetCreate {
            name,
            file_content: content,
            file_type,
        };
        Dataset::validate_create(&data).map_err(ApiError::Validation)?;

        let size = data.file_content.len();
        let record = self.repository.create(data).map_err(|e| {
            error!("Failed to store upload {}: {}", filename, e);
            ApiError::Upload(e.to_string())
        })?;
        info!(
            "User {} uploaded {} as {} {} ({} bytes)",
            caller.user_id, filename, Dataset::NAME, record.id, size
        );
        Ok(record)
    }

    pub fn download(&self, caller: &UserContext, id: EntityId) -> Result<DatasetDownload, ApiError> {
        let record = self
            .repository
            .get_by_id(id)
            .map_err(ApiError::storage("read", Dataset::NAME))?
            .ok_or_else(|| {
                warn!("Dataset {} not found for download", id);
                ApiError::NotFound("Dataset not found")
            })?;

        debug!("User {} downloading {}", caller.user_id, record.fields);
        let filename = format!("{}{}", record.fields.name, record.fields.file_type.download_extension());
        Ok(DatasetDownload {
            filename,
            content: record.fields.file_content,
        })
    }

    pub fn max_upload_size(&self) -> usize {
        self.max_upload_size
    }
}

#[derive(Debug, Default)]
struct UploadForm {
    file: Option<(String, Vec<u8>)>,
    name: Option<String>,
}

/// Collect the `file` and optional `name` fields of a multipart upload
async fn read_upload_form(mut payload: Multipart, max_size: usize) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ApiError::Validation(format!("Invalid multipart payload: {}", e)))?
    {
        let (field_name, filename) = match field.content_disposition() {
            Some(disposition) => (
                disposition.get_name().unwrap_or_default().to_string(),
                disposition.get_filename().map(str::to_string),
            ),
            None => (String::new(), None),
        };

        let mut bytes = BytesMut::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| ApiError::Upload(e.to_string()))?;
            if bytes.len() + chunk.len() > max_size {
                return Err(ApiError::Validation(format!(
                    "File exceeds maximum upload size of {} bytes",
                    max_size
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        match field_name.as_str() {
            "file" => {
                let filename = filename
                    .ok_or_else(|| ApiError::Validation("Uploaded file has no filename".to_string()))?;
                debug!("Received file {} ({} bytes)", filename, bytes.len());
                form.file = Some((filename, bytes.to_vec()));
            }
            "name" => {
                let name = String::from_utf8(bytes.to_vec())
                    .map_err(|_| ApiError::Validation("Dataset name must be valid UTF-8".to_string()))?;
                form.name = Some(name);
            }
            other => debug!("Ignoring multipart field '{}'", other),
        }
    }

    Ok(form)
}

pub async fn upload_dataset(
    service: web::Data<DatasetService>,
    caller: UserContext,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let form = read_upload_form(payload, service.max_upload_size()).await?;
    let _log = log_context::<Dataset>(&caller);
    let (filename, content) = form
        .file
        .ok_or_else(|| ApiError::Validation("No file provided".to_string()))?;

    let record = service.upload(&caller, &filename, content, form.name)?;
    Ok(HttpResponse::Ok().json(Dataset::read(&record)))
}

pub async fn download_dataset(
    service: web::Data<DatasetService>,
    caller: UserContext,
    id: web::Path<EntityId>,
) -> Result<HttpResponse, ApiError> {
    let _log = log_context::<Dataset>(&caller);
    let download = service.download(&caller, id.into_inner())?;

    Ok(HttpResponse::Ok()
        .content_type("application/octet-stream")
        .insert_header((
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", download.filename),
        ))
        .body(download.content))
}

/// `/datasets`: generic list/get/update/delete plus upload and download
pub fn dataset_scope(app_state: &AppState) -> Scope {
    let repository = app_state.datasets.clone();
    let handler = web::Data::new(ResourceHandler::<Dataset>::new(repository.clone()));
    let service = web::Data::new(DatasetService::new(repository, app_state.config.server.max_payload_size));

    resource_scope::<Dataset>("/datasets", handler)
        .app_data(service)
        .route("", web::post().to(upload_dataset))
        .route("/", web::post().to(upload_dataset))
        .route("/{id}/download", web::get().to(download_dataset))
}
