//! HTTP request handlers - thin layer that delegates to domain service

use super::auth::{CurrentUser, SessionToken, SESSION_COOKIE};
use super::{
    dto::*,
    error::{map_domain_error, Problem},
};
use crate::contract::{DeviceInput, OrderFilter, OrderStatus};
use crate::domain::Service;
use axum::{
    body::Bytes,
    extract::{Path, Query},
    http::StatusCode,
    Extension, Json,
};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar, WithRejection,
};
use std::sync::Arc;

type JsonBody<T> = WithRejection<Json<T>, Problem>;
type PathParam<T> = WithRejection<Path<T>, Problem>;
type QueryParams<T> = WithRejection<Query<T>, Problem>;

// ===== Catalog Handlers =====

/// List active devices
pub async fn list_devices(
    Extension(service): Extension<Arc<Service>>,
    WithRejection(Query(query), _): QueryParams<DeviceListQuery>,
) -> Result<Json<Vec<DeviceDto>>, Problem> {
    let devices = service
        .list_devices(&query.into())
        .await
        .map_err(map_domain_error)?;

    Ok(Json(devices.into_iter().map(Into::into).collect()))
}

/// Get an active device
pub async fn get_device(
    Extension(service): Extension<Arc<Service>>,
    WithRejection(Path(device_id), _): PathParam<i32>,
) -> Result<Json<DeviceDto>, Problem> {
    let device = service
        .get_device(device_id)
        .await
        .map_err(map_domain_error)?;

    Ok(Json(device.into()))
}

/// Add a device to the catalog
pub async fn create_device(
    Extension(service): Extension<Arc<Service>>,
    CurrentUser(principal): CurrentUser,
    WithRejection(Json(req), _): JsonBody<DeviceRequest>,
) -> Result<(StatusCode, Json<DeviceDto>), Problem> {
    let input = DeviceInput::try_from(req).map_err(map_domain_error)?;
    let device = service
        .create_device(&principal, input)
        .await
        .map_err(map_domain_error)?;

    Ok((StatusCode::CREATED, Json(device.into())))
}

/// Replace a device's fields
pub async fn update_device(
    Extension(service): Extension<Arc<Service>>,
    CurrentUser(principal): CurrentUser,
    WithRejection(Path(device_id), _): PathParam<i32>,
    WithRejection(Json(req), _): JsonBody<DeviceRequest>,
) -> Result<Json<DeviceDto>, Problem> {
    let input = DeviceInput::try_from(req).map_err(map_domain_error)?;
    let device = service
        .update_device(&principal, device_id, input)
        .await
        .map_err(map_domain_error)?;

    Ok(Json(device.into()))
}

/// Soft delete a device
pub async fn delete_device(
    Extension(service): Extension<Arc<Service>>,
    CurrentUser(principal): CurrentUser,
    WithRejection(Path(device_id), _): PathParam<i32>,
) -> Result<StatusCode, Problem> {
    service
        .delete_device(&principal, device_id)
        .await
        .map_err(map_domain_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Upload a device image; the raw request body is the image
pub async fn upload_device_image(
    Extension(service): Extension<Arc<Service>>,
    CurrentUser(principal): CurrentUser,
    WithRejection(Path(device_id), _): PathParam<i32>,
    WithRejection(Query(query), _): QueryParams<ImageUploadQuery>,
    body: Bytes,
) -> Result<Json<DeviceDto>, Problem> {
    let filename = query.filename.unwrap_or_default();
    let device = service
        .upload_device_image(&principal, device_id, &filename, body.to_vec())
        .await
        .map_err(map_domain_error)?;

    Ok(Json(device.into()))
}

/// Remove a device image
pub async fn delete_device_image(
    Extension(service): Extension<Arc<Service>>,
    CurrentUser(principal): CurrentUser,
    WithRejection(Path(device_id), _): PathParam<i32>,
) -> Result<Json<DeviceDto>, Problem> {
    let device = service
        .delete_device_image(&principal, device_id)
        .await
        .map_err(map_domain_error)?;

    Ok(Json(device.into()))
}

// ===== Cart Handlers =====

/// Add a device to the caller's cart
pub async fn add_item(
    Extension(service): Extension<Arc<Service>>,
    CurrentUser(principal): CurrentUser,
    WithRejection(Json(req), _): JsonBody<AddItemRequest>,
) -> Result<(StatusCode, Json<CartItemDto>), Problem> {
    let change = service
        .add_item(&principal, req.device_id, req.quantity)
        .await
        .map_err(map_domain_error)?;

    let status = if change.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(change.into())))
}

/// Set the quantity of a cart line
pub async fn update_item(
    Extension(service): Extension<Arc<Service>>,
    CurrentUser(principal): CurrentUser,
    WithRejection(Path(device_id), _): PathParam<i32>,
    WithRejection(Json(req), _): JsonBody<UpdateItemRequest>,
) -> Result<Json<CartItemDto>, Problem> {
    let change = service
        .update_item(&principal, device_id, req.quantity)
        .await
        .map_err(map_domain_error)?;

    Ok(Json(change.into()))
}

/// Remove a cart line
pub async fn remove_item(
    Extension(service): Extension<Arc<Service>>,
    CurrentUser(principal): CurrentUser,
    WithRejection(Path(device_id), _): PathParam<i32>,
) -> Result<StatusCode, Problem> {
    service
        .remove_item(&principal, device_id)
        .await
        .map_err(map_domain_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Draft id and item count
pub async fn cart_summary(
    Extension(service): Extension<Arc<Service>>,
    CurrentUser(principal): CurrentUser,
) -> Result<Json<CartSummaryDto>, Problem> {
    let summary = service
        .cart_summary(&principal)
        .await
        .map_err(map_domain_error)?;

    Ok(Json(summary.into()))
}

// ===== Order Handlers =====

/// List orders visible to the caller
pub async fn list_orders(
    Extension(service): Extension<Arc<Service>>,
    CurrentUser(principal): CurrentUser,
    WithRejection(Query(query), _): QueryParams<OrderListQuery>,
) -> Result<Json<OrderListResponse>, Problem> {
    let filter = OrderFilter::try_from(query).map_err(map_domain_error)?;
    let orders = service
        .list_orders(&principal, &filter)
        .await
        .map_err(map_domain_error)?;

    let items: Vec<OrderDto> = orders.into_iter().map(Into::into).collect();
    let total = items.len();

    Ok(Json(OrderListResponse { items, total }))
}

/// Get an order with its lines
pub async fn get_order(
    Extension(service): Extension<Arc<Service>>,
    CurrentUser(principal): CurrentUser,
    WithRejection(Path(order_id), _): PathParam<i32>,
) -> Result<Json<OrderDetailsDto>, Problem> {
    let details = service
        .get_order(&principal, order_id)
        .await
        .map_err(map_domain_error)?;

    Ok(Json(details.into()))
}

/// Update the address of a draft or formed order
pub async fn update_order(
    Extension(service): Extension<Arc<Service>>,
    CurrentUser(principal): CurrentUser,
    WithRejection(Path(order_id), _): PathParam<i32>,
    WithRejection(Json(req), _): JsonBody<UpdateOrderRequest>,
) -> Result<Json<OrderDto>, Problem> {
    let order = service
        .update_order(&principal, order_id, req.into())
        .await
        .map_err(map_domain_error)?;

    Ok(Json(order.into()))
}

pub async fn form_order(
    Extension(service): Extension<Arc<Service>>,
    CurrentUser(principal): CurrentUser,
    WithRejection(Path(order_id), _): PathParam<i32>,
) -> Result<Json<OrderDto>, Problem> {
    let order = service
        .form_order(&principal, order_id)
        .await
        .map_err(map_domain_error)?;

    Ok(Json(order.into()))
}

/// Complete an order; 202 while the async calculation is pending
pub async fn complete_order(
    Extension(service): Extension<Arc<Service>>,
    CurrentUser(principal): CurrentUser,
    WithRejection(Path(order_id), _): PathParam<i32>,
) -> Result<(StatusCode, Json<OrderDto>), Problem> {
    let order = service
        .complete_order(&principal, order_id)
        .await
        .map_err(map_domain_error)?;

    let status = if order.status == OrderStatus::PendingCompletion {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(order.into())))
}

pub async fn reject_order(
    Extension(service): Extension<Arc<Service>>,
    CurrentUser(principal): CurrentUser,
    WithRejection(Path(order_id), _): PathParam<i32>,
) -> Result<Json<OrderDto>, Problem> {
    let order = service
        .reject_order(&principal, order_id)
        .await
        .map_err(map_domain_error)?;

    Ok(Json(order.into()))
}

/// Soft delete an order
pub async fn delete_order(
    Extension(service): Extension<Arc<Service>>,
    CurrentUser(principal): CurrentUser,
    WithRejection(Path(order_id), _): PathParam<i32>,
) -> Result<StatusCode, Problem> {
    service
        .delete_order(&principal, order_id)
        .await
        .map_err(map_domain_error)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Callback of the external traffic calculator
pub async fn traffic_result(
    Extension(service): Extension<Arc<Service>>,
    WithRejection(Json(req), _): JsonBody<TrafficResultRequest>,
) -> Result<Json<OrderDto>, Problem> {
    let order = service
        .apply_traffic_result(req.into())
        .await
        .map_err(map_domain_error)?;

    Ok(Json(order.into()))
}

// ===== Account Handlers =====

pub async fn register(
    Extension(service): Extension<Arc<Service>>,
    WithRejection(Json(req), _): JsonBody<CredentialsRequest>,
) -> Result<(StatusCode, Json<AccountDto>), Problem> {
    let account = service
        .register(&req.username, &req.password)
        .await
        .map_err(map_domain_error)?;

    Ok((StatusCode::CREATED, Json(account.into())))
}

/// Open a session and set the session cookie
pub async fn login(
    Extension(service): Extension<Arc<Service>>,
    jar: CookieJar,
    WithRejection(Json(req), _): JsonBody<CredentialsRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), Problem> {
    let (token, account) = service
        .login(&req.username, &req.password)
        .await
        .map_err(map_domain_error)?;

    let cookie = Cookie::build((SESSION_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            token,
            account: account.into(),
        }),
    ))
}

/// Close the session; succeeds without one
pub async fn logout(
    Extension(service): Extension<Arc<Service>>,
    SessionToken(token): SessionToken,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), Problem> {
    if let Some(token) = token {
        service.logout(&token).await.map_err(map_domain_error)?;
    }

    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/"));
    Ok((jar, StatusCode::NO_CONTENT))
}

pub async fn me(CurrentUser(principal): CurrentUser) -> Json<PrincipalDto> {
    Json(principal.into())
}

/// Update the caller's username and/or password
pub async fn update_profile(
    Extension(service): Extension<Arc<Service>>,
    CurrentUser(principal): CurrentUser,
    WithRejection(Json(req), _): JsonBody<ProfileUpdateRequest>,
) -> Result<Json<AccountDto>, Problem> {
    let account = service
        .update_profile(&principal, principal.account_id, req.into())
        .await
        .map_err(map_domain_error)?;

    Ok(Json(account.into()))
}
