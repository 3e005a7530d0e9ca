// src/lead.rs

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use futures_util::StreamExt;
use log::{error, info};
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::{Lead, LeadStatus};

// ─── REQUEST PAYLOADS ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub message: Option<String>,
    pub designation: Option<String>,
    pub status: Option<String>,
    /// Arrives as a number or a numeric string from older form clients.
    pub sold_amount: Option<Value>,
    pub call_back_time: Option<String>,
    pub employee_id: Option<String>,
}

/// Partial-update fields shared by PUT /editlead and PUT /lead/{id}.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeadFields {
    pub name: Option<String>,
    pub email: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub message: Option<String>,
    pub designation: Option<String>,
    pub status: Option<String>,
    pub sold_amount: Option<Value>,
    pub call_back_time: Option<String>,
    pub employee_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EditLeadRequest {
    pub id: Option<String>,
    #[serde(flatten)]
    pub fields: UpdateLeadFields,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeIdQuery {
    pub employee_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentIdQuery {
    pub department_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackLead {
    #[serde(flatten)]
    pub lead: Lead,
    /// Reminder moment for the client: callBackTime minus 30 minutes.
    pub notification_time: Option<DateTime<Utc>>,
}

// ─── FIELD NORMALIZATION ──────────────────────────────────────────────────────

/// Lenient numeric parse: accepts a JSON number or a numeric string, anything
/// else becomes 0 rather than an error.
fn parse_sold_amount(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// soldAmount is only meaningful for SOLD leads; every other status forces it
/// to 0 even when the client supplied a value.
pub fn normalize_sold_amount(status: LeadStatus, supplied: Option<&Value>) -> f64 {
    if status == LeadStatus::Sold {
        parse_sold_amount(supplied)
    } else {
        0.0
    }
}

/// Strict status for create/update paths: missing defaults to COLD, an
/// unrecognized value is rejected.
pub fn parse_status_strict(raw: Option<&str>) -> Result<LeadStatus, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(LeadStatus::Cold),
        Some(s) => LeadStatus::parse_strict(s)
            .ok_or_else(|| ApiError::validation(format!("unknown status \"{}\"", s))),
    }
}

/// Import status handling: the match is case-sensitive and anything that
/// does not hit the closed set falls back to COLD instead of failing the
/// batch. A lowercase "sold" therefore imports as COLD.
pub fn import_status(raw: Option<&str>) -> LeadStatus {
    raw.and_then(LeadStatus::parse_strict)
        .unwrap_or(LeadStatus::Cold)
}

/// Accepts RFC 3339 as well as the naive forms HTML datetime inputs produce;
/// naive values are taken as UTC.
pub fn parse_callback_time(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc());
        }
    }
    Err(ApiError::validation(format!(
        "callBackTime \"{}\" is not a valid timestamp",
        raw
    )))
}

/// Builds the `$set` document for a partial lead update. Only fields present
/// in the request appear; status, soldAmount and callBackTime are validated,
/// everything else is set as-is.
pub fn lead_update_doc(fields: &UpdateLeadFields) -> Result<Document, ApiError> {
    let mut update = doc! {};

    if let Some(name) = fields.name.as_deref().map(str::trim) {
        if name.is_empty() {
            return Err(ApiError::validation("name must not be empty"));
        }
        update.insert("name", name);
    }
    if let Some(email) = &fields.email {
        update.insert("email", email.trim());
    }
    if let Some(company) = &fields.company {
        update.insert("company", company.trim());
    }
    if let Some(phone) = &fields.phone {
        update.insert("phone", phone.trim());
    }
    if let Some(city) = &fields.city {
        update.insert("city", city.trim());
    }
    if let Some(message) = &fields.message {
        update.insert("message", message.as_str());
    }
    if let Some(designation) = &fields.designation {
        update.insert("designation", designation.trim());
    }

    if let Some(raw) = fields.status.as_deref() {
        let status = LeadStatus::parse_strict(raw.trim())
            .ok_or_else(|| ApiError::validation(format!("unknown status \"{}\"", raw.trim())))?;
        update.insert("status", status.as_str());
    }

    if let Some(value) = &fields.sold_amount {
        let amount = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .ok_or_else(|| ApiError::validation("soldAmount must be a number"))?;
        if !amount.is_finite() || amount < 0.0 {
            return Err(ApiError::validation("soldAmount must be a non-negative number"));
        }
        update.insert("soldAmount", amount);
    }

    if let Some(raw) = &fields.call_back_time {
        let when = parse_callback_time(raw)?;
        update.insert("callBackTime", mongodb::bson::to_bson(&when)?);
    }

    if let Some(employee_id) = fields.employee_id.as_deref().map(str::trim) {
        if employee_id.is_empty() {
            return Err(ApiError::validation("employeeId must not be empty"));
        }
        update.insert("employeeId", employee_id);
    }

    Ok(update)
}

fn build_lead(payload: &CreateLeadRequest, status: LeadStatus) -> Result<Lead, ApiError> {
    let name = payload
        .name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::validation("name is required"))?;
    let employee_id = payload
        .employee_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::validation("employeeId is required"))?;

    let call_back_time = match payload.call_back_time.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(parse_callback_time(raw)?),
        _ => None,
    };

    Ok(Lead {
        lead_id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        email: payload.email.clone().filter(|s| !s.trim().is_empty()),
        company: payload.company.clone().filter(|s| !s.trim().is_empty()),
        phone: payload.phone.clone().filter(|s| !s.trim().is_empty()),
        city: payload.city.clone().filter(|s| !s.trim().is_empty()),
        message: payload.message.clone().filter(|s| !s.trim().is_empty()),
        designation: payload.designation.clone().filter(|s| !s.trim().is_empty()),
        status,
        sold_amount: normalize_sold_amount(status, payload.sold_amount.as_ref()),
        call_back_time,
        employee_id: employee_id.to_string(),
        created_at: Utc::now(),
    })
}

// ─── ENDPOINTS ────────────────────────────────────────────────────────────────

/// POST /addLead
pub async fn add_lead(
    data: web::Data<AppState>,
    payload: web::Json<CreateLeadRequest>,
) -> Result<HttpResponse, ApiError> {
    let status = parse_status_strict(payload.status.as_deref())?;
    let new_lead = build_lead(&payload, status)?;

    if data
        .mongodb
        .employees()
        .find_one(doc! { "employeeId": &new_lead.employee_id })
        .await?
        .is_none()
    {
        return Err(ApiError::not_found("employee not found"));
    }

    data.mongodb.leads().insert_one(&new_lead).await?;
    info!("lead created: {} for employee {}", new_lead.lead_id, new_lead.employee_id);
    Ok(HttpResponse::Ok().json(new_lead))
}

/// POST /leads/import
///
/// All-or-nothing: the whole batch is inserted inside one transaction, so a
/// failure partway through leaves nothing committed. Every payload must name
/// its owning employee; ownerless imports are rejected up front.
pub async fn import_leads(
    data: web::Data<AppState>,
    payload: web::Json<Vec<CreateLeadRequest>>,
) -> Result<HttpResponse, ApiError> {
    let items = payload.into_inner();
    if items.is_empty() {
        return Err(ApiError::validation("import payload must be a non-empty array"));
    }

    let mut leads: Vec<Lead> = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let status = import_status(item.status.as_deref());
        let lead = build_lead(item, status)
            .map_err(|e| ApiError::validation(format!("row {}: {}", idx + 1, e)))?;
        leads.push(lead);
    }

    // Every referenced employee must exist before anything is written.
    let employee_ids: HashSet<&str> = leads.iter().map(|l| l.employee_id.as_str()).collect();
    for employee_id in &employee_ids {
        if data
            .mongodb
            .employees()
            .find_one(doc! { "employeeId": *employee_id })
            .await?
            .is_none()
        {
            return Err(ApiError::not_found(format!(
                "employee {} not found",
                employee_id
            )));
        }
    }

    let mut session = data.mongodb.client.start_session().await?;
    session.start_transaction().await?;
    match data
        .mongodb
        .leads()
        .insert_many(&leads)
        .session(&mut session)
        .await
    {
        Ok(_) => {
            session.commit_transaction().await?;
        }
        Err(e) => {
            error!("lead import aborted: {}", e);
            let _ = session.abort_transaction().await;
            return Err(ApiError::internal(e));
        }
    }

    info!("imported {} leads", leads.len());
    Ok(HttpResponse::Ok().json(serde_json::json!({ "count": leads.len() })))
}

/// PUT /editlead — partial update, lead id in the body.
pub async fn edit_lead(
    data: web::Data<AppState>,
    payload: web::Json<EditLeadRequest>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    let id = payload
        .id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::validation("id is required"))?
        .to_string();

    apply_lead_update(&data, &id, &payload.fields).await
}

/// PUT /lead/{id} — same semantics, lead id in the path.
pub async fn update_lead(
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<UpdateLeadFields>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    if id.trim().is_empty() {
        return Err(ApiError::validation("id is required"));
    }
    apply_lead_update(&data, &id, &payload).await
}

async fn apply_lead_update(
    data: &web::Data<AppState>,
    id: &str,
    fields: &UpdateLeadFields,
) -> Result<HttpResponse, ApiError> {
    let update = lead_update_doc(fields)?;
    if update.is_empty() {
        return Err(ApiError::validation("no fields to update"));
    }

    if let Ok(employee_id) = update.get_str("employeeId") {
        if data
            .mongodb
            .employees()
            .find_one(doc! { "employeeId": employee_id })
            .await?
            .is_none()
        {
            return Err(ApiError::not_found("employee not found"));
        }
    }

    let leads = data.mongodb.leads();
    let result = leads
        .update_one(doc! { "leadId": id }, doc! { "$set": update })
        .await?;
    if result.matched_count == 0 {
        return Err(ApiError::not_found("lead not found"));
    }

    let updated = leads
        .find_one(doc! { "leadId": id })
        .await?
        .ok_or_else(|| ApiError::not_found("lead not found"))?;
    info!("lead updated: {}", id);
    Ok(HttpResponse::Ok().json(updated))
}

/// GET /leads/count-by-employee?employeeId=
pub async fn count_by_employee(
    data: web::Data<AppState>,
    query: web::Query<EmployeeIdQuery>,
) -> Result<HttpResponse, ApiError> {
    let employee_id = required_query(&query.employee_id, "employeeId")?;
    let count = data
        .mongodb
        .leads()
        .count_documents(doc! { "employeeId": &employee_id })
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "count": count })))
}

/// GET /leads/count-by-department?departmentId=
pub async fn count_by_department(
    data: web::Data<AppState>,
    query: web::Query<DepartmentIdQuery>,
) -> Result<HttpResponse, ApiError> {
    let department_id = required_query(&query.department_id, "departmentId")?;

    let mut cursor = data
        .mongodb
        .employees()
        .find(doc! { "departmentId": &department_id })
        .await?;
    let mut employee_ids: Vec<String> = Vec::new();
    while let Some(employee) = cursor.next().await {
        employee_ids.push(employee?.employee_id);
    }

    let count = if employee_ids.is_empty() {
        0
    } else {
        data.mongodb
            .leads()
            .count_documents(doc! { "employeeId": { "$in": employee_ids } })
            .await?
    };
    Ok(HttpResponse::Ok().json(serde_json::json!({ "count": count })))
}

/// GET /leads/callback-count?employeeId=
pub async fn callback_count(
    data: web::Data<AppState>,
    query: web::Query<EmployeeIdQuery>,
) -> Result<HttpResponse, ApiError> {
    let employee_id = required_query(&query.employee_id, "employeeId")?;
    let leads = data.mongodb.leads();

    let callback_count = leads
        .count_documents(doc! {
            "employeeId": &employee_id,
            "status": LeadStatus::CallBack.as_str(),
        })
        .await?;
    let max_leads = leads
        .count_documents(doc! { "employeeId": &employee_id })
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "callbackLeadsCount": callback_count,
        "maxLeads": max_leads,
    })))
}

/// GET /leads/callback-details?employeeId=
pub async fn callback_details(
    data: web::Data<AppState>,
    query: web::Query<EmployeeIdQuery>,
) -> Result<HttpResponse, ApiError> {
    let employee_id = required_query(&query.employee_id, "employeeId")?;

    let mut cursor = data
        .mongodb
        .leads()
        .find(doc! {
            "employeeId": &employee_id,
            "status": LeadStatus::CallBack.as_str(),
        })
        .await?;

    let mut callbacks: Vec<CallbackLead> = Vec::new();
    while let Some(lead) = cursor.next().await {
        let lead = lead?;
        let notification_time = lead.call_back_time.map(|t| t - Duration::minutes(30));
        callbacks.push(CallbackLead {
            lead,
            notification_time,
        });
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({ "leads": callbacks })))
}

fn required_query(value: &Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::validation(format!("{} query parameter is required", field)))
}
