// src/reports.rs
//
// Read-time aggregation over departments, employees, targets and leads.
// Nothing here is cached or maintained incrementally; every request
// recomputes from the raw records.

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use mongodb::bson::{doc, Document};
use serde::Serialize;
use std::collections::HashMap;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::models::LeadStatus;

// ─── RESPONSE SHAPES ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentSummary {
    pub id: String,
    pub name: String,
    pub target: Option<f64>,
    pub total_leads: i64,
    pub sold_leads: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeProgress {
    pub id: String,
    pub name: String,
    pub total_leads: i64,
    pub sold_leads: i64,
    pub hot_leads: i64,
    pub callback_leads: i64,
    pub sold_leads_percentage: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentProgress {
    pub id: String,
    pub name: String,
    pub target: Option<f64>,
    pub total_leads: i64,
    pub sold_leads: i64,
    pub sold_leads_percentage: i64,
    pub remaining: Option<f64>,
    pub employees: Vec<EmployeeProgress>,
}

/// Minimal lead projection for counting. Status stays a raw string here so
/// legacy mixed-case records still count.
#[derive(Debug, Clone)]
pub struct LeadRef {
    pub employee_id: String,
    pub status: String,
}

// ─── ARITHMETIC ───────────────────────────────────────────────────────────────

/// Progress percentage, rounded, clamped to [0, 100]. A missing or zero
/// target always yields 0.
pub fn percentage(achieved: f64, target: f64) -> i64 {
    if !target.is_finite() || target <= 0.0 {
        return 0;
    }
    let pct = (achieved / target * 100.0).round() as i64;
    pct.clamp(0, 100)
}

/// Leads still needed to hit the target; never negative.
pub fn remaining(target: f64, sold: f64) -> f64 {
    (target - sold).max(0.0)
}

fn count_status(leads: &[&LeadRef], status: LeadStatus) -> i64 {
    leads.iter().filter(|l| status.matches(&l.status)).count() as i64
}

#[derive(Debug, PartialEq)]
pub struct EmployeeCounts {
    pub total: i64,
    pub sold: i64,
    pub hot: i64,
    pub callback: i64,
}

pub fn employee_counts(employee_id: &str, leads: &[LeadRef]) -> EmployeeCounts {
    let owned: Vec<&LeadRef> = leads
        .iter()
        .filter(|l| l.employee_id == employee_id)
        .collect();
    EmployeeCounts {
        total: owned.len() as i64,
        sold: count_status(&owned, LeadStatus::Sold),
        hot: count_status(&owned, LeadStatus::Hot),
        callback: count_status(&owned, LeadStatus::CallBack),
    }
}

/// Per-department totals: the sums of the per-employee counts.
pub fn department_totals(employee_ids: &[&str], leads: &[LeadRef]) -> (i64, i64) {
    let owned: Vec<&LeadRef> = leads
        .iter()
        .filter(|l| employee_ids.contains(&l.employee_id.as_str()))
        .collect();
    let sold = count_status(&owned, LeadStatus::Sold);
    (owned.len() as i64, sold)
}

/// When a department has accumulated several targets over time, the most
/// recently created one wins.
pub fn latest_target_amounts(
    targets: &[(String, f64, DateTime<Utc>)],
) -> HashMap<String, f64> {
    let mut latest: HashMap<String, (DateTime<Utc>, f64)> = HashMap::new();
    for (department_id, amount, created_at) in targets {
        match latest.get(department_id) {
            Some((seen, _)) if seen >= created_at => {}
            _ => {
                latest.insert(department_id.clone(), (*created_at, *amount));
            }
        }
    }
    latest
        .into_iter()
        .map(|(dept, (_, amount))| (dept, amount))
        .collect()
}

// ─── DATA LOADING ─────────────────────────────────────────────────────────────

async fn load_lead_refs(data: &web::Data<AppState>) -> Result<Vec<LeadRef>, ApiError> {
    // Raw documents instead of the typed model: old records can carry
    // mixed-case status strings that would fail enum deserialization.
    let mut cursor = data
        .mongodb
        .db
        .collection::<Document>("leads")
        .find(doc! {})
        .await?;

    let mut leads: Vec<LeadRef> = Vec::new();
    while let Some(lead) = cursor.next().await {
        let lead = lead?;
        leads.push(LeadRef {
            employee_id: lead.get_str("employeeId").unwrap_or("").to_string(),
            status: lead.get_str("status").unwrap_or("").to_string(),
        });
    }
    Ok(leads)
}

async fn load_target_amounts(
    data: &web::Data<AppState>,
) -> Result<HashMap<String, f64>, ApiError> {
    let mut cursor = data.mongodb.targets().find(doc! {}).await?;
    let mut targets: Vec<(String, f64, DateTime<Utc>)> = Vec::new();
    while let Some(target) = cursor.next().await {
        let target = target?;
        targets.push((target.department_id, target.amount, target.created_at));
    }
    Ok(latest_target_amounts(&targets))
}

// ─── ENDPOINTS ────────────────────────────────────────────────────────────────

/// GET /departments — every department with its target and lead totals.
pub async fn list_departments_with_totals(
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let mut dept_cursor = data.mongodb.departments().find(doc! {}).await?;
    let mut departments = Vec::new();
    while let Some(dept) = dept_cursor.next().await {
        departments.push(dept?);
    }

    let mut employees_by_dept: HashMap<String, Vec<String>> = HashMap::new();
    let mut emp_cursor = data.mongodb.employees().find(doc! {}).await?;
    while let Some(employee) = emp_cursor.next().await {
        let employee = employee?;
        employees_by_dept
            .entry(employee.department_id)
            .or_default()
            .push(employee.employee_id);
    }

    let leads = load_lead_refs(&data).await?;
    let targets = load_target_amounts(&data).await?;

    let summaries: Vec<DepartmentSummary> = departments
        .into_iter()
        .map(|dept| {
            let employee_ids: Vec<&str> = employees_by_dept
                .get(&dept.department_id)
                .map(|ids| ids.iter().map(String::as_str).collect())
                .unwrap_or_default();
            let (total_leads, sold_leads) = department_totals(&employee_ids, &leads);
            DepartmentSummary {
                target: targets.get(&dept.department_id).copied(),
                id: dept.department_id,
                name: dept.name,
                total_leads,
                sold_leads,
            }
        })
        .collect();

    Ok(HttpResponse::Ok().json(summaries))
}

/// GET /departments/{id} — expanded view with per-employee counts and
/// progress against the department target.
pub async fn department_progress(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let department = data
        .mongodb
        .departments()
        .find_one(doc! { "departmentId": &id })
        .await?
        .ok_or_else(|| ApiError::not_found("department not found"))?;

    let mut emp_cursor = data
        .mongodb
        .employees()
        .find(doc! { "departmentId": &id })
        .await?;
    let mut employees = Vec::new();
    while let Some(employee) = emp_cursor.next().await {
        employees.push(employee?);
    }

    let leads = load_lead_refs(&data).await?;
    let targets = load_target_amounts(&data).await?;
    let target = targets.get(&id).copied();

    let employee_ids: Vec<&str> = employees.iter().map(|e| e.employee_id.as_str()).collect();
    let (total_leads, sold_leads) = department_totals(&employee_ids, &leads);

    let employee_progress: Vec<EmployeeProgress> = employees
        .iter()
        .map(|e| {
            let counts = employee_counts(&e.employee_id, &leads);
            EmployeeProgress {
                id: e.employee_id.clone(),
                name: e.name.clone(),
                total_leads: counts.total,
                sold_leads: counts.sold,
                hot_leads: counts.hot,
                callback_leads: counts.callback,
                sold_leads_percentage: percentage(
                    counts.sold as f64,
                    target.unwrap_or(0.0),
                ),
            }
        })
        .collect();

    let progress = DepartmentProgress {
        id: department.department_id,
        name: department.name,
        target,
        total_leads,
        sold_leads,
        sold_leads_percentage: percentage(sold_leads as f64, target.unwrap_or(0.0)),
        remaining: target.map(|t| remaining(t, sold_leads as f64)),
        employees: employee_progress,
    };

    Ok(HttpResponse::Ok().json(progress))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn lead(employee_id: &str, status: &str) -> LeadRef {
        LeadRef {
            employee_id: employee_id.to_string(),
            status: status.to_string(),
        }
    }

    #[test]
    fn percentage_rounds_and_clamps() {
        assert_eq!(percentage(1.0, 1000.0), 0);
        assert_eq!(percentage(5.0, 1000.0), 1); // 0.5% rounds up
        assert_eq!(percentage(135.0, 1000.0), 14); // 13.5% rounds up
        assert_eq!(percentage(134.0, 1000.0), 13);
        assert_eq!(percentage(50.0, 100.0), 50);
        assert_eq!(percentage(250.0, 100.0), 100); // clamped
    }

    #[test]
    fn percentage_of_zero_or_missing_target_is_zero() {
        assert_eq!(percentage(42.0, 0.0), 0);
        assert_eq!(percentage(0.0, 0.0), 0);
        assert_eq!(percentage(42.0, -5.0), 0);
        assert_eq!(percentage(42.0, f64::NAN), 0);
    }

    #[test]
    fn remaining_never_goes_negative() {
        assert_eq!(remaining(1000.0, 1.0), 999.0);
        assert_eq!(remaining(10.0, 25.0), 0.0);
        assert_eq!(remaining(0.0, 0.0), 0.0);
    }

    #[test]
    fn department_totals_sum_over_its_employees_only() {
        let leads = vec![
            lead("e1", "HOT"),
            lead("e1", "SOLD"),
            lead("e2", "SOLD"),
            lead("e3", "SOLD"), // different department
        ];
        let (total, sold) = department_totals(&["e1", "e2"], &leads);
        assert_eq!(total, 3);
        assert_eq!(sold, 2);
    }

    #[test]
    fn empty_department_counts_zero() {
        let (total, sold) = department_totals(&[], &[lead("e1", "SOLD")]);
        assert_eq!(total, 0);
        assert_eq!(sold, 0);
    }

    #[test]
    fn employee_counts_filter_by_status() {
        let leads = vec![
            lead("e1", "HOT"),
            lead("e1", "HOT"),
            lead("e1", "SOLD"),
            lead("e1", "CALL_BACK"),
            lead("e1", "COLD"),
            lead("e2", "HOT"),
        ];
        let counts = employee_counts("e1", &leads);
        assert_eq!(
            counts,
            EmployeeCounts {
                total: 5,
                sold: 1,
                hot: 2,
                callback: 1,
            }
        );
    }

    #[test]
    fn status_counting_is_case_insensitive() {
        // Legacy records sometimes carry mixed-case statuses.
        let leads = vec![
            lead("e1", "sold"),
            lead("e1", "Sold"),
            lead("e1", "SOLD"),
            lead("e1", "hot"),
        ];
        let counts = employee_counts("e1", &leads);
        assert_eq!(counts.sold, 3);
        assert_eq!(counts.hot, 1);
    }

    #[test]
    fn most_recent_target_wins() {
        let jan = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let jun = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let targets = vec![
            ("d1".to_string(), 1000.0, jan),
            ("d1".to_string(), 2500.0, jun),
            ("d2".to_string(), 400.0, jan),
        ];
        let amounts = latest_target_amounts(&targets);
        assert_eq!(amounts.get("d1"), Some(&2500.0));
        assert_eq!(amounts.get("d2"), Some(&400.0));
        assert_eq!(amounts.get("d3"), None);
    }

    #[test]
    fn funnel_scenario_matches_expected_progress() {
        // Department "Sales" with one employee, one lead moved to SOLD,
        // target of 1000 leads.
        let leads = vec![lead("e1", "SOLD")];
        let (total, sold) = department_totals(&["e1"], &leads);
        assert_eq!(total, 1);
        assert_eq!(sold, 1);
        // Percentage uses the lead count, not the sold amount.
        assert_eq!(percentage(sold as f64, 1000.0), 0);
        assert_eq!(remaining(1000.0, sold as f64), 999.0);
    }
}
