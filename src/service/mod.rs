//! Generic Resource Handler
//!
//! Binds a [`Repository`] to HTTP-shaped operations for one entity type and
//! maps repository outcomes to responses. Payloads are validated before any
//! storage access and soft-deleted records are never exposed.

pub mod dataset_service;
pub mod user_context;

use actix_web::{web, HttpResponse, Scope};
use log::{debug, info, warn};
use serde_json::json;
use std::sync::Arc;

use crate::app_state::AppState;
use crate::entity::{Entity, EntityId, Record};
use crate::error::ApiError;
use crate::repository::{Page, Repository};
use crate::service::user_context::UserContext;

/// CRUD operations for a single resource type
pub struct ResourceHandler<E: Entity> {
    repository: Arc<dyn Repository<E>>,
}

impl<E: Entity> ResourceHandler<E> {
    pub fn new(repository: Arc<dyn Repository<E>>) -> Self {
        Self { repository }
    }

    pub fn create(&self, caller: &UserContext, data: E::Create) -> Result<Record<E>, ApiError> {
        E::validate_create(&data).map_err(ApiError::Validation)?;

        let record = self.repository.create(data).map_err(ApiError::storage("create", E::NAME))?;
        info!("User {} created {} {}", caller.user_id, E::NAME, record.id);
        Ok(record)
    }

    pub fn list(&self, caller: &UserContext, page: Page) -> Result<Vec<Record<E>>, ApiError> {
        debug!("User {} listing {} (skip={}, limit={})", caller.user_id, E::TABLE, page.skip, page.limit);
        self.repository.get_all(page).map_err(ApiError::storage("list", E::NAME))
    }

    pub fn get(&self, caller: &UserContext, id: EntityId) -> Result<Record<E>, ApiError> {
        debug!("User {} reading {} {}", caller.user_id, E::NAME, id);
        self.repository
            .get_by_id(id)
            .map_err(ApiError::storage("read", E::NAME))?
            .ok_or_else(|| {
                warn!("{} {} not found", E::NAME, id);
                ApiError::item_not_found()
            })
    }

    pub fn update(&self, caller: &UserContext, id: EntityId, changes: E::Update) -> Result<Record<E>, ApiError> {
        E::validate_update(&changes).map_err(ApiError::Validation)?;

        let record = self
            .repository
            .update(id, changes)
            .map_err(ApiError::storage("update", E::NAME))?
            .ok_or_else(|| {
                warn!("{} {} not found for update", E::NAME, id);
                ApiError::item_not_found()
            })?;
        info!("User {} updated {} {}", caller.user_id, E::NAME, id);
        Ok(record)
    }

    pub fn delete(&self, caller: &UserContext, id: EntityId) -> Result<(), ApiError> {
        let deleted = self.repository.delete(id).map_err(ApiError::storage("delete", E::NAME))?;
        if !deleted {
            warn!("{} {} not found for delete", E::NAME, id);
            return Err(ApiError::item_not_found());
        }
        info!("User {} deleted {} {}", caller.user_id, E::NAME, id);
        Ok(())
    }
}

/// Tag log lines with the caller and resource until the guard drops. The MDC
/// is thread-local, so the guard must not be held across an `.await`.
pub(crate) fn log_context<E: Entity>(caller: &UserContext) -> log_mdc::ExtendGuard {
    log_mdc::extend_scoped([
        ("caller", caller.user_id.to_string()),
        ("resource", E::TABLE.to_string()),
    ])
}

pub async fn create_item<E: Entity>(
    handler: web::Data<ResourceHandler<E>>,
    caller: UserContext,
    item: web::Json<E::Create>,
) -> Result<HttpResponse, ApiError> {
    let _log = log_context::<E>(&caller);
    let record = handler.create(&caller, item.into_inner())?;
    Ok(HttpResponse::Ok().json(E::read(&record)))
}

pub async fn list_items<E: Entity>(
    handler: web::Data<ResourceHandler<E>>,
    caller: UserContext,
    page: web::Query<Page>,
) -> Result<HttpResponse, ApiError> {
    let _log = log_context::<E>(&caller);
    let records = handler.list(&caller, page.into_inner())?;
    let items: Vec<E::Read> = records.iter().map(E::read).collect();
    Ok(HttpResponse::Ok().json(items))
}

pub async fn get_item<E: Entity>(
    handler: web::Data<ResourceHandler<E>>,
    caller: UserContext,
    id: web::Path<EntityId>,
) -> Result<HttpResponse, ApiError> {
    let _log = log_context::<E>(&caller);
    let record = handler.get(&caller, id.into_inner())?;
    Ok(HttpResponse::Ok().json(E::read(&record)))
}

pub async fn update_item<E: Entity>(
    handler: web::Data<ResourceHandler<E>>,
    caller: UserContext,
    id: web::Path<EntityId>,
    changes: web::Json<E::Update>,
) -> Result<HttpResponse, ApiError> {
    let _log = log_context::<E>(&caller);
    let record = handler.update(&caller, id.into_inner(), changes.into_inner())?;
    Ok(HttpResponse::Ok().json(E::read(&record)))
}

pub async fn delete_item<E: Entity>(
    handler: web::Data<ResourceHandler<E>>,
    caller: UserContext,
    id: web::Path<EntityId>,
) -> Result<HttpResponse, ApiError> {
    let _log = log_context::<E>(&caller);
    handler.delete(&caller, id.into_inner())?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Item deleted successfully" })))
}

/// Mount list/get/update/delete for `E` under `path`. Creation is left to the
/// caller, since resources differ in how new items arrive.
pub fn resource_scope<E: Entity>(path: &str, handler: web::Data<ResourceHandler<E>>) -> Scope {
    web::scope(path)
        .app_data(handler)
        .route("", web::get().to(list_items::<E>))
        .route("/", web::get().to(list_items::<E>))
        .route("/{id}", web::get().to(get_item::<E>))
        .route("/{id}", web::put().to(update_item::<E>))
        .route("/{id}", web::delete().to(delete_item::<E>))
}

/// Extractor configs turning malformed JSON, query strings and path segments
/// into validation errors with the usual JSON body.
fn extractor_configs(scope: Scope) -> Scope {
    scope
        .app_data(web::JsonConfig::default().error_handler(|err, _req| {
            ApiError::Validation(err.to_string()).into()
        }))
        .app_data(web::QueryConfig::default().error_handler(|err, _req| {
            ApiError::Validation(err.to_string()).into()
        }))
        .app_data(web::PathConfig::default().error_handler(|err, _req| {
            ApiError::Validation(err.to_string()).into()
        }))
}

/// Versioned API with every resource mounted
pub fn api_scope(app_state: &AppState) -> Scope {
    extractor_configs(web::scope("/api/v1")).service(dataset_service::dataset_scope(app_state))
}
