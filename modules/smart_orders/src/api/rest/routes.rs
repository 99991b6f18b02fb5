//! Route registration and OpenAPI components

use super::{dto::*, error::Problem, handlers};
use crate::domain::Service;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Extension, Json, Router,
};
use std::sync::Arc;
use utoipa::OpenApi;

/// Largest accepted device image
const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// OpenAPI components of the REST API
#[derive(OpenApi)]
#[openapi(
    info(title = "Smart Orders API", description = "Smart device catalog, carts and orders"),
    components(schemas(
        DeviceDto,
        DeviceRequest,
        AddItemRequest,
        UpdateItemRequest,
        CartItemDto,
        CartSummaryDto,
        OrderDto,
        OrderLineDto,
        OrderDetailsDto,
        OrderListResponse,
        UpdateOrderRequest,
        TrafficResultRequest,
        CredentialsRequest,
        AccountDto,
        LoginResponse,
        PrincipalDto,
        ProfileUpdateRequest,
        Problem,
    ))
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Register all REST routes
pub fn register_routes(router: Router, service: Arc<Service>) -> anyhow::Result<Router> {
    let router = router
        // Cart
        .route("/api/order-items", post(handlers::add_item))
        .route(
            "/api/order-items/{device_id}",
            put(handlers::update_item).delete(handlers::remove_item),
        )
        .route("/api/orders/cart", get(handlers::cart_summary))
        // Orders
        .route("/api/orders", get(handlers::list_orders))
        .route(
            "/api/orders/{id}",
            get(handlers::get_order)
                .put(handlers::update_order)
                .delete(handlers::delete_order),
        )
        .route("/api/orders/{id}/form", put(handlers::form_order))
        .route("/api/orders/{id}/complete", put(handlers::complete_order))
        .route("/api/orders/{id}/reject", put(handlers::reject_order))
        .route("/api/traffic_result", put(handlers::traffic_result))
        // Catalog
        .route(
            "/api/devices",
            get(handlers::list_devices).post(handlers::create_device),
        )
        .route(
            "/api/devices/{id}",
            get(handlers::get_device)
                .put(handlers::update_device)
                .delete(handlers::delete_device),
        )
        .route(
            "/api/devices/{id}/image",
            put(handlers::upload_device_image)
                .delete(handlers::delete_device_image)
                .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
        // Accounts
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/auth/me", get(handlers::me))
        .route("/api/auth/profile", put(handlers::update_profile))
        .route("/api/openapi.json", get(openapi_json))
        .layer(Extension(service));

    Ok(router)
}
