// src/auth.rs

use actix_web::{web, HttpResponse};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::info;
use mongodb::bson::doc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::Admin;

/// Session token payload: principal id, email, role tag, 1-hour expiry.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: String,
    pub exp: usize,
}

pub fn create_jwt(id: &str, email: &str, role: &str, secret: &str) -> Result<String, ApiError> {
    let expiration = Utc::now() + Duration::hours(1);
    let claims = Claims {
        sub: id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        exp: expiration.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(ApiError::internal)
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

pub fn hash_password(raw: &str) -> Result<String, ApiError> {
    hash(raw, DEFAULT_COST).map_err(ApiError::internal)
}

/// bcrypt verify; comparison time does not depend on the stored hash
/// matching. Every login path goes through here, there is no plaintext
/// comparison anywhere.
pub fn verify_password(raw: &str, hashed: &str) -> bool {
    verify(raw, hashed).unwrap_or(false)
}

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

pub fn email_is_valid(email: &str) -> bool {
    let re = EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid")
    });
    re.is_match(email)
}

// ─── REQUEST / RESPONSE SHAPES ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAdminRequest {
    pub name: Option<String>,
    pub email: String,
    pub password: String,
}

/// Public-safe projection of a principal: no password hash ever leaves the
/// server.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

// ─── LOGIN ENDPOINTS ──────────────────────────────────────────────────────────

/// POST /admin-login
pub async fn admin_login(
    data: web::Data<AppState>,
    login: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let admin = data
        .mongodb
        .admins()
        .find_one(doc! { "email": &login.email })
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !verify_password(&login.password, &admin.password) {
        return Err(ApiError::InvalidCredentials);
    }

    let token = create_jwt(&admin.admin_id, &admin.email, "admin", &data.config.jwt_secret)?;
    info!("admin {} logged in", admin.email);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "token": token,
        "admin": Principal {
            id: admin.admin_id,
            name: admin.name,
            email: admin.email,
            role: "admin".to_string(),
            department: None,
        }
    })))
}

/// POST /manager-login
pub async fn manager_login(
    data: web::Data<AppState>,
    login: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let manager = data
        .mongodb
        .managers()
        .find_one(doc! { "email": &login.email })
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !verify_password(&login.password, &manager.password) {
        return Err(ApiError::InvalidCredentials);
    }

    let department = data
        .mongodb
        .departments()
        .find_one(doc! { "departmentId": &manager.department_id })
        .await?
        .map(|d| d.name);

    let token = create_jwt(
        &manager.manager_id,
        &manager.email,
        "manager",
        &data.config.jwt_secret,
    )?;
    info!("manager {} logged in", manager.email);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "token": token,
        "manager": Principal {
            id: manager.manager_id,
            name: Some(manager.name),
            email: manager.email,
            role: "manager".to_string(),
            department,
        }
    })))
}

/// POST /employee-login
pub async fn employee_login(
    data: web::Data<AppState>,
    login: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let employee = data
        .mongodb
        .employees()
        .find_one(doc! { "email": &login.email })
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    if !verify_password(&login.password, &employee.password) {
        return Err(ApiError::InvalidCredentials);
    }

    let department = data
        .mongodb
        .departments()
        .find_one(doc! { "departmentId": &employee.department_id })
        .await?
        .map(|d| d.name);

    let token = create_jwt(
        &employee.employee_id,
        &employee.email,
        "employee",
        &data.config.jwt_secret,
    )?;
    info!("employee {} logged in", employee.email);
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "token": token,
        "employee": Principal {
            id: employee.employee_id,
            name: Some(employee.name),
            email: employee.email,
            role: employee.role,
            department,
        }
    })))
}

/// POST /create-admin
pub async fn create_admin(
    data: web::Data<AppState>,
    payload: web::Json<CreateAdminRequest>,
) -> Result<HttpResponse, ApiError> {
    if payload.email.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(ApiError::validation("email and password are required"));
    }
    if !email_is_valid(&payload.email) {
        return Err(ApiError::validation("email is not a valid address"));
    }

    let admins = data.mongodb.admins();
    if admins
        .find_one(doc! { "email": &payload.email })
        .await?
        .is_some()
    {
        return Err(ApiError::validation("an admin with this email already exists"));
    }

    let new_admin = Admin {
        admin_id: Uuid::new_v4().to_string(),
        name: payload.name.clone(),
        email: payload.email.clone(),
        password: hash_password(&payload.password)?,
        created_at: Utc::now(),
    };
    admins.insert_one(&new_admin).await?;
    info!("admin created: {}", new_admin.email);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "admin": Principal {
            id: new_admin.admin_id,
            name: new_admin.name,
            email: new_admin.email,
            role: "admin".to_string(),
            department: None,
        }
    })))
}
