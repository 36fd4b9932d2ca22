use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Progress of a student's application through a company's hiring process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Applied,
    Shortlisted,
    Interviewed,
    Placed,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 5] = [
        ApplicationStatus::Applied,
        ApplicationStatus::Shortlisted,
        ApplicationStatus::Interviewed,
        ApplicationStatus::Placed,
        ApplicationStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "Applied",
            ApplicationStatus::Shortlisted => "Shortlisted",
            ApplicationStatus::Interviewed => "Interviewed",
            ApplicationStatus::Placed => "Placed",
            ApplicationStatus::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApplicationStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown application status '{s}'"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StudentProfileRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub branch: String,
    pub cgpa: f64,
    pub backlogs: i32,
    pub resume_key: Option<String>,
    pub phone: Option<String>,
    pub skills: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompanyProfileRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub company_name: String,
    pub website: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobPostingRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub title: String,
    pub description: String,
    /// Comma-separated branch names; empty means every branch.
    pub eligible_branches: String,
    pub min_cgpa: f64,
    pub max_backlogs: i32,
    pub deadline: NaiveDate,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApplicationRow {
    pub id: Uuid,
    pub student_id: Uuid,
    pub job_id: Uuid,
    pub status: String,
    pub applied_on: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InterviewRow {
    pub id: Uuid,
    pub application_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLogRow {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}
