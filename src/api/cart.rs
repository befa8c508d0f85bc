//! Cart endpoints. Each handler gates on its [`CartAction`] before doing
//! anything else, so anonymous callers get 401 regardless of the body.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use super::{valid_body, valid_path, AppState};
use crate::auth::{Caller, CartAction};
use crate::domain::aggregates::{CartLineView, CartSummary, Decremented};
use crate::Result;

#[derive(Debug, Deserialize, Validate)]
pub struct AddLineRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 1000, message = "amount must be between 1 and 1000"))]
    pub amount: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetAmountRequest {
    #[validate(range(min = 1, max = 1000, message = "amount must be between 1 and 1000"))]
    pub amount: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReduceRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount: i32,
}

pub async fn list_lines(State(s): State<AppState>, Caller(caller): Caller) -> Result<Json<Vec<CartLineView>>> {
    let who = CartAction::List.admit(caller)?;
    Ok(Json(s.cart.list_lines(who).await?))
}

pub async fn create_line(
    State(s): State<AppState>,
    Caller(caller): Caller,
    body: std::result::Result<Json<AddLineRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CartLineView>)> {
    let who = CartAction::Create.admit(caller)?;
    let req = valid_body(body)?;
    let line = s.cart.add_or_increment(who, req.product_id, req.amount).await?;
    Ok((StatusCode::CREATED, Json(line)))
}

pub async fn update_line(
    State(s): State<AppState>,
    Caller(caller): Caller,
    id: std::result::Result<Path<Uuid>, PathRejection>,
    body: std::result::Result<Json<SetAmountRequest>, JsonRejection>,
) -> Result<Json<CartLineView>> {
    let who = CartAction::Update.admit(caller)?;
    let id = valid_path(id)?;
    let req = valid_body(body)?;
    Ok(Json(s.cart.set_amount(who, id, req.amount).await?))
}

pub async fn delete_line(
    State(s): State<AppState>,
    Caller(caller): Caller,
    id: std::result::Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>> {
    let who = CartAction::Delete.admit(caller)?;
    let id = valid_path(id)?;
    let id = s.cart.remove(who, id).await?;
    Ok(Json(json!({ "id": id })))
}

pub async fn summary(State(s): State<AppState>, Caller(caller): Caller) -> Result<Json<CartSummary>> {
    let who = CartAction::Summary.admit(caller)?;
    Ok(Json(s.cart.summarize(who).await?))
}

pub async fn reduce(
    State(s): State<AppState>,
    Caller(caller): Caller,
    body: std::result::Result<Json<ReduceRequest>, JsonRejection>,
) -> Result<Json<Decremented>> {
    let who = CartAction::Reduce.admit(caller)?;
    let req = valid_body(body)?;
    Ok(Json(s.cart.decrement(who, req.product_id, req.amount).await?))
}

pub async fn clear(State(s): State<AppState>, Caller(caller): Caller) -> Result<Json<Value>> {
    let who = CartAction::Clear.admit(caller)?;
    let removed = s.cart.clear(who).await?;
    Ok(Json(json!({ "removed": removed })))
}
