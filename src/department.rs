// src/department.rs

use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures_util::StreamExt;
use log::info;
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::Department;

#[derive(Debug, Deserialize)]
pub struct CreateDepartmentRequest {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDepartmentRequest {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteDepartmentRequest {
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DepartmentView {
    pub id: String,
    pub name: String,
}

impl From<Department> for DepartmentView {
    fn from(d: Department) -> Self {
        DepartmentView {
            id: d.department_id,
            name: d.name,
        }
    }
}

/// GET /department — plain list, no aggregation.
pub async fn list_departments(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let mut cursor = data.mongodb.departments().find(doc! {}).await?;

    let mut departments: Vec<DepartmentView> = Vec::new();
    while let Some(dept) = cursor.next().await {
        departments.push(dept?.into());
    }
    Ok(HttpResponse::Ok().json(departments))
}

/// POST /department
pub async fn create_department(
    data: web::Data<AppState>,
    payload: web::Json<CreateDepartmentRequest>,
) -> Result<HttpResponse, ApiError> {
    let name = match payload.name.as_deref().map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => return Err(ApiError::validation("name is required")),
    };

    let departments = data.mongodb.departments();
    if departments.find_one(doc! { "name": &name }).await?.is_some() {
        return Err(ApiError::DuplicateName(format!(
            "department \"{}\" already exists",
            name
        )));
    }

    let new_department = Department {
        department_id: Uuid::new_v4().to_string(),
        name,
        created_at: Utc::now(),
    };
    departments.insert_one(&new_department).await?;
    info!("department created: {}", new_department.name);

    Ok(HttpResponse::Ok().json(DepartmentView::from(new_department)))
}

/// PUT /department — rename, id comes in the body.
pub async fn update_department(
    data: web::Data<AppState>,
    payload: web::Json<UpdateDepartmentRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = match payload.id.as_deref().map(str::trim) {
        Some(i) if !i.is_empty() => i.to_string(),
        _ => return Err(ApiError::validation("id is required")),
    };
    let name = match payload.name.as_deref().map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => return Err(ApiError::validation("name is required")),
    };

    let departments = data.mongodb.departments();
    if departments
        .find_one(doc! { "departmentId": &id })
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("department not found"));
    }

    // Name collision against any other department.
    if departments
        .find_one(doc! { "name": &name, "departmentId": { "$ne": &id } })
        .await?
        .is_some()
    {
        return Err(ApiError::DuplicateName(format!(
            "department \"{}\" already exists",
            name
        )));
    }

    departments
        .update_one(
            doc! { "departmentId": &id },
            doc! { "$set": { "name": &name } },
        )
        .await?;
    info!("department {} renamed to {}", id, name);

    Ok(HttpResponse::Ok().json(DepartmentView { id, name }))
}

/// Delete policy: a department can only go away once nothing references it.
/// Cascading here would silently destroy credentialed principals and their
/// leads, so deletion is refused while any employee remains.
pub fn ensure_department_deletable(employee_count: u64) -> Result<(), ApiError> {
    if employee_count > 0 {
        return Err(ApiError::validation(
            "department still has employees; reassign or delete them first",
        ));
    }
    Ok(())
}

/// DELETE /department — refused while employees still reference it.
pub async fn delete_department(
    data: web::Data<AppState>,
    payload: web::Json<DeleteDepartmentRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = match payload.id.as_deref().map(str::trim) {
        Some(i) if !i.is_empty() => i.to_string(),
        _ => return Err(ApiError::validation("id is required")),
    };

    let departments = data.mongodb.departments();
    if departments
        .find_one(doc! { "departmentId": &id })
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("department not found"));
    }

    let employee_count = data
        .mongodb
        .employees()
        .count_documents(doc! { "departmentId": &id })
        .await?;
    ensure_department_deletable(employee_count)?;

    departments.delete_one(doc! { "departmentId": &id }).await?;
    info!("department deleted: {}", id);

    Ok(HttpResponse::Ok().json(serde_json::json!({ "ok": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_department_may_be_deleted() {
        assert!(ensure_department_deletable(0).is_ok());
    }

    #[test]
    fn referenced_department_is_refused() {
        let err = ensure_department_deletable(1).unwrap_err();
        assert_eq!(err.kind(), "validation_error");
        let err = ensure_department_deletable(42).unwrap_err();
        assert!(err.to_string().contains("still has employees"));
    }
}
