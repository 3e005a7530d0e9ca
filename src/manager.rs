// src/manager.rs

use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::info;
use mongodb::bson::doc;
use serde::Deserialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::{email_is_valid, hash_password, Principal};
use crate::error::ApiError;
use crate::models::Manager;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateManagerRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub department_id: Option<String>,
}

/// POST /addManager
pub async fn add_manager(
    data: web::Data<AppState>,
    payload: web::Json<CreateManagerRequest>,
) -> Result<HttpResponse, ApiError> {
    let name = required(&payload.name, "name")?;
    let email = required(&payload.email, "email")?;
    let password = required(&payload.password, "password")?;
    let department_id = required(&payload.department_id, "departmentId")?;

    if !email_is_valid(&email) {
        return Err(ApiError::validation("email is not a valid address"));
    }

    let department = data
        .mongodb
        .departments()
        .find_one(doc! { "departmentId": &department_id })
        .await?
        .ok_or_else(|| ApiError::not_found("department not found"))?;

    let new_manager = Manager {
        manager_id: Uuid::new_v4().to_string(),
        name,
        email,
        password: hash_password(&password)?,
        department_id,
        created_at: Utc::now(),
    };
    data.mongodb.managers().insert_one(&new_manager).await?;
    info!("manager created: {}", new_manager.email);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "manager": Principal {
            id: new_manager.manager_id,
            name: Some(new_manager.name),
            email: new_manager.email,
            role: "manager".to_string(),
            department: Some(department.name),
        }
    })))
}

fn required(value: &Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::validation(format!("{} is required", field)))
}
