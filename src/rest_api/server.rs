//! # REST API HTTP Server
//!
//! Maps every registered resource onto its routes:
//!
//! | Verb   | Path          | Operation    |
//! |--------|---------------|--------------|
//! | GET    | `/<name>/`    | list         |
//! | POST   | `/<name>/`    | create       |
//! | PUT    | `/<name>/`    | bulk update  |
//! | GET    | `/<name>/:id` | fetch        |
//! | PATCH  | `/<name>/:id` | patch        |
//! | DELETE | `/<name>/:id` | delete       |
//!
//! Association resources expose a single `PATCH /<name>/`. Both the
//! trailing-slash and bare collection paths are served.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use serde_json::Value;
use tracing::debug;

use crate::auth::{AuthError, JwtManager, Principal};
use crate::store::Database;

use super::association::AssociationResource;
use super::definition::AuthRequirement;
use super::errors::{RestError, RestResult};
use super::parser::QueryParams;
use super::resource::ModelResource;
use super::response::{BatchResponse, CreatedResponse, ListResponse, MessageResponse};

type Pairs = Vec<(String, String)>;

/// Shared by every route
struct ApiContext {
    db: Arc<Database>,
    jwt: JwtManager,
}

impl ApiContext {
    /// Resolve the caller from the bearer token, then apply role gating
    fn authenticate(&self, headers: &HeaderMap, requirement: &AuthRequirement) -> RestResult<Principal> {
        let principal = match headers.get(AUTHORIZATION) {
            None => Principal::anonymous(),
            Some(value) => {
                let value = value.to_str().map_err(|_| AuthError::MalformedHeader)?;
                let token = value
                    .strip_prefix("Bearer ")
                    .ok_or(AuthError::MalformedHeader)?;
                self.jwt.validate(token.trim())?
            }
        };
        requirement.check(&principal)?;
        Ok(principal)
    }
}

#[derive(Clone)]
struct ResourceState {
    ctx: Arc<ApiContext>,
    resource: Arc<ModelResource>,
}

#[derive(Clone)]
struct AssociationState {
    ctx: Arc<ApiContext>,
    resource: Arc<AssociationResource>,
}

/// Registry of resources served by one router
pub struct ApiRegistry {
    ctx: Arc<ApiContext>,
    names: BTreeSet<String>,
    resources: Vec<Arc<ModelResource>>,
    associations: Vec<Arc<AssociationResource>>,
}

impl ApiRegistry {
    pub fn new(db: Arc<Database>, jwt: JwtManager) -> Self {
        Self {
            ctx: Arc::new(ApiContext { db, jwt }),
            names: BTreeSet::new(),
            resources: Vec::new(),
            associations: Vec::new(),
        }
    }

    fn claim(&mut self, name: &str) -> RestResult<()> {
        if !self.names.insert(name.to_string()) {
            return Err(RestError::Config(format!("resource '{}' registered twice", name)));
        }
        Ok(())
    }

    pub fn register(&mut self, resource: ModelResource) -> RestResult<()> {
        self.claim(resource.name())?;
        self.resources.push(Arc::new(resource));
        Ok(())
    }

    pub fn register_association(&mut self, resource: AssociationResource) -> RestResult<()> {
        self.claim(resource.name())?;
        self.associations.push(Arc::new(resource));
        Ok(())
    }

    /// Registered resource names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Build the Axum router
    pub fn router(self) -> Router {
        let mut router = Router::new();

        for resource in self.resources {
            let name = resource.name().to_string();
            let state = ResourceState {
                ctx: Arc::clone(&self.ctx),
                resource,
            };
            let collection = get(list_handler).post(create_handler).put(bulk_update_handler);
            let sub = Router::new()
                .route(&format!("/{}", name), collection.clone())
                .route(&format!("/{}/", name), collection)
                .route(
                    &format!("/{}/:id", name),
                    get(fetch_handler).patch(patch_handler).delete(delete_handler),
                )
                .with_state(state);
            router = router.merge(sub);
        }

        for resource in self.associations {
            let name = resource.name().to_string();
            let state = AssociationState {
                ctx: Arc::clone(&self.ctx),
                resource,
            };
            let sub = Router::new()
                .route(&format!("/{}", name), patch(association_handler))
                .route(&format!("/{}/", name), patch(association_handler))
                .with_state(state);
            router = router.merge(sub);
        }

        router
    }
}

/// Run storage work off the async executor
async fn blocking<T, F>(work: F) -> RestResult<T>
where
    F: FnOnce() -> RestResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| RestError::Internal(format!("worker task failed: {}", e)))?
}

/// Query strings axum cannot decode get the same envelope as other bad requests
fn query_pairs<T>(query: Result<Query<T>, QueryRejection>) -> RestResult<T> {
    query
        .map(|Query(value)| value)
        .map_err(|rejection| RestError::InvalidQueryParam(rejection.body_text()))
}

fn parse_body(body: &Bytes) -> RestResult<Value> {
    serde_json::from_slice(body).map_err(|e| RestError::InvalidBody(e.to_string()))
}

/// List records handler
async fn list_handler(
    State(state): State<ResourceState>,
    headers: HeaderMap,
    query: Result<Query<Pairs>, QueryRejection>,
) -> RestResult<Json<ListResponse<Value>>> {
    let principal = state
        .ctx
        .authenticate(&headers, state.resource.config().auth_requirement())?;
    let pairs = query_pairs(query)?;
    let params = QueryParams::parse(&pairs, state.resource.config())?;

    let page = blocking(move || state.resource.list(&state.ctx.db, &principal, &params)).await?;
    Ok(Json(ListResponse::new(page.items, page.total)))
}

/// Get single record handler
async fn fetch_handler(
    State(state): State<ResourceState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    query: Result<Query<Pairs>, QueryRejection>,
) -> RestResult<Json<Value>> {
    let principal = state
        .ctx
        .authenticate(&headers, state.resource.config().auth_requirement())?;
    let pairs = query_pairs(query)?;
    let projection = QueryParams::parse(&pairs, state.resource.config())?.projection;

    let item = blocking(move || {
        state
            .resource
            .fetch(&state.ctx.db, &principal, &id, &projection)
    })
    .await?;
    Ok(Json(item))
}

/// Create records handler; accepts one object or an array
async fn create_handler(
    State(state): State<ResourceState>,
    headers: HeaderMap,
    body: Bytes,
) -> RestResult<(StatusCode, Json<CreatedResponse<Value>>)> {
    let principal = state
        .ctx
        .authenticate(&headers, state.resource.config().auth_requirement())?;
    let payload = parse_body(&body)?;

    let created = blocking(move || state.resource.create(&state.ctx.db, &principal, payload)).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse::new(created))))
}

/// Bulk update handler
async fn bulk_update_handler(
    State(state): State<ResourceState>,
    headers: HeaderMap,
    body: Bytes,
) -> RestResult<(StatusCode, Json<MessageResponse>)> {
    let principal = state
        .ctx
        .authenticate(&headers, state.resource.config().auth_requirement())?;
    let payload = parse_body(&body)?;

    blocking(move || state.resource.bulk_update(&state.ctx.db, &principal, payload)).await?;
    Ok((StatusCode::CREATED, Json(MessageResponse::bulk_updated())))
}

/// Patch single record handler
async fn patch_handler(
    State(state): State<ResourceState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> RestResult<Json<MessageResponse>> {
    let principal = state
        .ctx
        .authenticate(&headers, state.resource.config().auth_requirement())?;
    let payload = parse_body(&body)?;

    blocking(move || state.resource.patch(&state.ctx.db, &principal, &id, payload)).await?;
    Ok(Json(MessageResponse::patched()))
}

/// Delete record handler
async fn delete_handler(
    State(state): State<ResourceState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> RestResult<StatusCode> {
    let principal = state
        .ctx
        .authenticate(&headers, state.resource.config().auth_requirement())?;

    blocking(move || state.resource.delete(&state.ctx.db, &principal, &id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Association batch handler
async fn association_handler(
    State(state): State<AssociationState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let principal = match state
        .ctx
        .authenticate(&headers, state.resource.config().auth_requirement())
    {
        Ok(principal) => principal,
        Err(error) => return error.into_response(),
    };
    let payload = match parse_body(&body) {
        Ok(payload) => payload,
        Err(error) => return error.into_response(),
    };

    let name = state.resource.name().to_string();
    let result = tokio::task::spawn_blocking(move || {
        state.resource.apply(&state.ctx.db, &principal, payload)
    })
    .await;

    match result {
        Ok(Ok(outcomes)) => {
            debug!(resource = %name, items = outcomes.len(), "association batch done");
            Json(BatchResponse::new(outcomes)).into_response()
        }
        Ok(Err(failure)) => failure.into_response(),
        Err(e) => RestError::Internal(format!("worker task failed: {}", e)).into_response(),
    }
}
