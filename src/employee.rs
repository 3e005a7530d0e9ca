// src/employee.rs

use actix_web::{web, HttpResponse};
use chrono::Utc;
use futures_util::StreamExt;
use log::{error, info};
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::{email_is_valid, hash_password};
use crate::error::ApiError;
use crate::models::{Employee, Lead};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmployeeRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub department_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEmployeeRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub department_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteEmployeeQuery {
    pub id: Option<String>,
}

/// Employee as returned to clients: no password hash.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub department_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leads: Option<Vec<Lead>>,
}

impl EmployeeView {
    fn from_employee(e: Employee) -> Self {
        EmployeeView {
            id: e.employee_id,
            name: e.name,
            email: e.email,
            role: e.role,
            department_id: e.department_id,
            department: None,
            leads: None,
        }
    }
}

/// Validates the updatable plain fields and builds the `$set` document.
/// Password and department existence are handled by the caller; only fields
/// present in the request end up in the document.
pub fn employee_update_doc(payload: &UpdateEmployeeRequest) -> Result<Document, ApiError> {
    let mut update = doc! {};

    if let Some(name) = payload.name.as_deref().map(str::trim) {
        if name.is_empty() {
            return Err(ApiError::validation("name must not be empty"));
        }
        update.insert("name", name);
    }
    if let Some(email) = payload.email.as_deref().map(str::trim) {
        if !email_is_valid(email) {
            return Err(ApiError::validation("email is not a valid address"));
        }
        update.insert("email", email);
    }
    if let Some(role) = payload.role.as_deref().map(str::trim) {
        if role.is_empty() {
            return Err(ApiError::validation("role must not be empty"));
        }
        update.insert("role", role);
    }
    if let Some(department_id) = payload.department_id.as_deref().map(str::trim) {
        if department_id.is_empty() {
            return Err(ApiError::validation("departmentId must not be empty"));
        }
        update.insert("departmentId", department_id);
    }

    Ok(update)
}

/// POST /addEmployee
pub async fn add_employee(
    data: web::Data<AppState>,
    payload: web::Json<CreateEmployeeRequest>,
) -> Result<HttpResponse, ApiError> {
    let name = required_field(&payload.name, "name")?;
    let email = required_field(&payload.email, "email")?;
    let password = required_field(&payload.password, "password")?;
    let role = required_field(&payload.role, "role")?;
    let department_id = required_field(&payload.department_id, "departmentId")?;

    if !email_is_valid(&email) {
        return Err(ApiError::validation("email is not a valid address"));
    }

    if data
        .mongodb
        .departments()
        .find_one(doc! { "departmentId": &department_id })
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("department not found"));
    }

    let new_employee = Employee {
        employee_id: Uuid::new_v4().to_string(),
        name,
        email,
        password: hash_password(&password)?,
        role,
        department_id,
        created_at: Utc::now(),
    };
    data.mongodb.employees().insert_one(&new_employee).await?;
    info!("employee created: {}", new_employee.email);

    Ok(HttpResponse::Ok().json(EmployeeView::from_employee(new_employee)))
}

/// GET /employee/{id} — projection with department name and owned leads.
pub async fn get_employee(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let employee = data
        .mongodb
        .employees()
        .find_one(doc! { "employeeId": &id })
        .await?
        .ok_or_else(|| ApiError::not_found("employee not found"))?;

    let department = data
        .mongodb
        .departments()
        .find_one(doc! { "departmentId": &employee.department_id })
        .await?
        .map(|d| d.name);

    let mut cursor = data
        .mongodb
        .leads()
        .find(doc! { "employeeId": &id })
        .await?;
    let mut leads: Vec<Lead> = Vec::new();
    while let Some(lead) = cursor.next().await {
        leads.push(lead?);
    }

    let mut view = EmployeeView::from_employee(employee);
    view.department = department;
    view.leads = Some(leads);
    Ok(HttpResponse::Ok().json(view))
}

/// PUT /updateEmployee/{id} — partial update; password is re-hashed only
/// when a new one is supplied.
pub async fn update_employee(
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateEmployeeRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();

    let mut update = employee_update_doc(&payload)?;
    if let Some(password) = payload.password.as_deref().map(str::trim) {
        if password.is_empty() {
            return Err(ApiError::validation("password must not be empty"));
        }
        update.insert("password", hash_password(password)?);
    }
    if update.is_empty() {
        return Err(ApiError::validation("no fields to update"));
    }

    if let Ok(department_id) = update.get_str("departmentId") {
        if data
            .mongodb
            .departments()
            .find_one(doc! { "departmentId": department_id })
            .await?
            .is_none()
        {
            return Err(ApiError::not_found("department not found"));
        }
    }

    let employees = data.mongodb.employees();
    let result = employees
        .update_one(doc! { "employeeId": &id }, doc! { "$set": update })
        .await?;
    if result.matched_count == 0 {
        return Err(ApiError::not_found("employee not found"));
    }

    let updated = employees
        .find_one(doc! { "employeeId": &id })
        .await?
        .ok_or_else(|| ApiError::not_found("employee not found"))?;
    info!("employee updated: {}", id);

    Ok(HttpResponse::Ok().json(EmployeeView::from_employee(updated)))
}

/// Two-step employee cascade: the leads go first, then the employee record.
/// The ordering is the invariant — a failure between the steps can only
/// leave a lead-less employee behind, never leads pointing at a deleted
/// owner. Returns how many leads were removed.
pub async fn cascade_delete<LF, L, EF, E>(
    delete_leads: LF,
    delete_employee: EF,
) -> Result<u64, ApiError>
where
    LF: FnOnce() -> L,
    L: std::future::Future<Output = Result<u64, ApiError>>,
    EF: FnOnce() -> E,
    E: std::future::Future<Output = Result<(), ApiError>>,
{
    let removed = delete_leads().await?;
    delete_employee().await?;
    Ok(removed)
}

/// DELETE /delete_employee?id=
///
/// Deletes the employee's leads first, then the employee record, so no lead
/// is ever left pointing at a deleted employee. If the second step fails the
/// employee survives lead-less, which is the accepted degraded state.
pub async fn delete_employee(
    data: web::Data<AppState>,
    query: web::Query<DeleteEmployeeQuery>,
) -> Result<HttpResponse, ApiError> {
    let id = query
        .id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::validation("id query parameter is required"))?
        .to_string();

    let employees = data.mongodb.employees();
    if employees
        .find_one(doc! { "employeeId": &id })
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("employee not found"));
    }

    let leads = data.mongodb.leads();
    let removed_leads = cascade_delete(
        || async {
            Ok(leads
                .delete_many(doc! { "employeeId": &id })
                .await?
                .deleted_count)
        },
        || async {
            employees
                .delete_one(doc! { "employeeId": &id })
                .await
                .map(|_| ())
                .map_err(|e| {
                    error!(
                        "leads for employee {} removed but the employee record remains: {}",
                        id, e
                    );
                    ApiError::Internal
                })
        },
    )
    .await?;
    info!("employee {} deleted along with {} leads", id, removed_leads);

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "deletedLeads": removed_leads,
    })))
}

fn required_field(value: &Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::validation(format!("{} is required", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::cell::{Cell, RefCell};

    fn empty_update() -> UpdateEmployeeRequest {
        UpdateEmployeeRequest {
            name: None,
            email: None,
            password: None,
            role: None,
            department_id: None,
        }
    }

    #[test]
    fn update_doc_only_contains_supplied_fields() {
        let mut payload = empty_update();
        payload.name = Some("Grace".to_string());
        payload.role = Some("closer".to_string());
        let update = employee_update_doc(&payload).unwrap();
        assert_eq!(update.get_str("name").unwrap(), "Grace");
        assert_eq!(update.get_str("role").unwrap(), "closer");
        assert!(update.get("email").is_none());
        assert!(update.get("departmentId").is_none());
    }

    #[test]
    fn update_doc_rejects_empty_name_and_role() {
        let mut payload = empty_update();
        payload.name = Some("   ".to_string());
        assert!(employee_update_doc(&payload).is_err());

        let mut payload = empty_update();
        payload.role = Some(String::new());
        assert!(employee_update_doc(&payload).is_err());
    }

    #[test]
    fn update_doc_rejects_malformed_email() {
        let mut payload = empty_update();
        payload.email = Some("not-an-email".to_string());
        let err = employee_update_doc(&payload).unwrap_err();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn update_doc_is_empty_when_nothing_supplied() {
        let update = employee_update_doc(&empty_update()).unwrap();
        assert!(update.is_empty());
    }

    #[test]
    fn cascade_removes_leads_before_the_employee() {
        let order = RefCell::new(Vec::new());
        let removed = block_on(cascade_delete(
            || async {
                order.borrow_mut().push("leads");
                Ok(3)
            },
            || async {
                order.borrow_mut().push("employee");
                Ok(())
            },
        ))
        .unwrap();
        assert_eq!(removed, 3);
        assert_eq!(*order.borrow(), vec!["leads", "employee"]);
    }

    #[test]
    fn failed_lead_removal_leaves_the_employee_untouched() {
        let employee_deleted = Cell::new(false);
        let res = block_on(cascade_delete(
            || async { Err(ApiError::Internal) },
            || async {
                employee_deleted.set(true);
                Ok(())
            },
        ));
        assert!(res.is_err());
        assert!(!employee_deleted.get());
    }

    #[test]
    fn failed_employee_removal_surfaces_after_leads_are_gone() {
        // The accepted degraded state: a lead-less employee, never leads
        // owned by a vanished employee.
        let leads_deleted = Cell::new(false);
        let res = block_on(cascade_delete(
            || async {
                leads_deleted.set(true);
                Ok(2)
            },
            || async { Err(ApiError::Internal) },
        ));
        assert!(res.is_err());
        assert!(leads_deleted.get());
    }

    #[test]
    fn required_field_trims_and_rejects_blank() {
        assert_eq!(
            required_field(&Some("  ada  ".to_string()), "name").unwrap(),
            "ada"
        );
        assert!(required_field(&Some("  ".to_string()), "name").is_err());
        assert!(required_field(&None, "name").is_err());
    }
}
