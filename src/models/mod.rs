use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Funnel stage of a lead. The set is closed: anything outside these five
/// values is rejected at the boundary. Stored as the uppercase wire form;
/// deserialization tolerates the mixed-case values older records carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LeadStatus {
    #[serde(rename = "HOT")]
    Hot,
    #[serde(rename = "COLD")]
    Cold,
    #[serde(rename = "WARM")]
    Warm,
    #[serde(rename = "SOLD")]
    Sold,
    #[serde(rename = "CALL_BACK")]
    CallBack,
}

impl LeadStatus {
    /// Exact-match parse against the wire form. Case-sensitive: "sold" is
    /// not a valid status, only "SOLD" is.
    pub fn parse_strict(raw: &str) -> Option<Self> {
        match raw {
            "HOT" => Some(LeadStatus::Hot),
            "COLD" => Some(LeadStatus::Cold),
            "WARM" => Some(LeadStatus::Warm),
            "SOLD" => Some(LeadStatus::Sold),
            "CALL_BACK" => Some(LeadStatus::CallBack),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::Hot => "HOT",
            LeadStatus::Cold => "COLD",
            LeadStatus::Warm => "WARM",
            LeadStatus::Sold => "SOLD",
            LeadStatus::CallBack => "CALL_BACK",
        }
    }

    /// Case-insensitive parse for stored records. Older documents carry
    /// mixed-case statuses; writes only ever store the uppercase form.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        Self::parse_strict(raw.trim().to_ascii_uppercase().as_str())
    }

    /// Case-insensitive comparison against a stored status string. Older
    /// records may carry mixed-case values, so aggregation matches loosely
    /// even though writes only ever store the uppercase form.
    pub fn matches(&self, raw: &str) -> bool {
        raw.trim().eq_ignore_ascii_case(self.as_str())
    }
}

// Reads go through the lenient parse so a legacy mixed-case record does not
// fail the whole typed query it appears in. Client-facing boundaries never
// deserialize this type directly; they validate raw strings strictly.
impl<'de> Deserialize<'de> for LeadStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        LeadStatus::parse_lenient(&raw).ok_or_else(|| {
            serde::de::Error::invalid_value(
                serde::de::Unexpected::Str(&raw),
                &"one of HOT, COLD, WARM, SOLD, CALL_BACK",
            )
        })
    }
}

/// An organizational unit owning employees and, transitively, leads.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub department_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A time-bounded numeric sales goal for a department. Immutable once
/// created; when a department accumulates several, the most recently
/// created one wins.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub target_id: String,
    pub department_id: String,
    pub amount: f64,
    pub start_date: String,
    pub end_date: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub employee_id: String,
    pub name: String,
    pub email: String,
    /// bcrypt hash, never the raw password.
    pub password: String,
    /// Free-text role label, validated non-empty.
    pub role: String,
    pub department_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Manager {
    pub manager_id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub department_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub admin_id: String,
    pub name: Option<String>,
    pub email: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
}

/// A prospective customer record tracked through the sales funnel.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub lead_id: String,
    pub name: String,
    pub email: Option<String>,
    pub company: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub message: Option<String>,
    pub designation: Option<String>,
    pub status: LeadStatus,
    /// Only meaningful when status is SOLD; forced to 0 otherwise.
    pub sold_amount: f64,
    pub call_back_time: Option<DateTime<Utc>>,
    pub employee_id: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_strict_accepts_the_closed_set() {
        assert_eq!(LeadStatus::parse_strict("HOT"), Some(LeadStatus::Hot));
        assert_eq!(LeadStatus::parse_strict("COLD"), Some(LeadStatus::Cold));
        assert_eq!(LeadStatus::parse_strict("WARM"), Some(LeadStatus::Warm));
        assert_eq!(LeadStatus::parse_strict("SOLD"), Some(LeadStatus::Sold));
        assert_eq!(
            LeadStatus::parse_strict("CALL_BACK"),
            Some(LeadStatus::CallBack)
        );
    }

    #[test]
    fn parse_strict_is_case_sensitive() {
        assert_eq!(LeadStatus::parse_strict("sold"), None);
        assert_eq!(LeadStatus::parse_strict("Hot"), None);
        assert_eq!(LeadStatus::parse_strict("call_back"), None);
        assert_eq!(LeadStatus::parse_strict("LUKEWARM"), None);
        assert_eq!(LeadStatus::parse_strict(""), None);
    }

    #[test]
    fn matches_tolerates_legacy_casing() {
        assert!(LeadStatus::Sold.matches("sold"));
        assert!(LeadStatus::Sold.matches("Sold"));
        assert!(LeadStatus::CallBack.matches("call_back"));
        assert!(LeadStatus::Hot.matches(" HOT "));
        assert!(!LeadStatus::Sold.matches("HOT"));
    }

    #[test]
    fn status_serializes_to_wire_form() {
        let json = serde_json::to_string(&LeadStatus::CallBack).unwrap();
        assert_eq!(json, "\"CALL_BACK\"");
        let back: LeadStatus = serde_json::from_str("\"SOLD\"").unwrap();
        assert_eq!(back, LeadStatus::Sold);
    }

    #[test]
    fn unknown_status_fails_deserialization() {
        let res: Result<LeadStatus, _> = serde_json::from_str("\"TEPID\"");
        assert!(res.is_err());
    }

    #[test]
    fn deserialization_tolerates_legacy_casing() {
        let sold: LeadStatus = serde_json::from_str("\"sold\"").unwrap();
        assert_eq!(sold, LeadStatus::Sold);
        let cb: LeadStatus = serde_json::from_str("\"Call_Back\"").unwrap();
        assert_eq!(cb, LeadStatus::CallBack);
    }

    #[test]
    fn parse_lenient_accepts_any_case_but_not_unknowns() {
        assert_eq!(LeadStatus::parse_lenient("warm"), Some(LeadStatus::Warm));
        assert_eq!(LeadStatus::parse_lenient(" Hot "), Some(LeadStatus::Hot));
        assert_eq!(LeadStatus::parse_lenient("TEPID"), None);
    }
}
