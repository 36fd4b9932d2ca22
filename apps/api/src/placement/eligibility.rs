//! Student-versus-posting eligibility rules.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::placement::{JobPostingRow, StudentProfileRow};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Eligibility {
    pub eligible: bool,
    pub reasons: Vec<String>,
}

/// Parses the comma-separated branch list of a posting.
/// An empty list (or the words `all` / `any`) admits every branch.
pub fn parse_branches(eligible_branches: &str) -> Vec<String> {
    let branches: Vec<String> = eligible_branches
        .split(',')
        .map(|b| b.trim().to_lowercase())
        .filter(|b| !b.is_empty())
        .collect();
    if branches.iter().any(|b| b == "all" || b == "any") {
        return Vec::new();
    }
    branches
}

pub fn check_eligibility(
    student: &StudentProfileRow,
    job: &JobPostingRow,
    today: NaiveDate,
) -> Eligibility {
    let mut reasons = Vec::new();

    let branches = parse_branches(&job.eligible_branches);
    let student_branch = student.branch.trim().to_lowercase();
    if !branches.is_empty() && !branches.contains(&student_branch) {
        reasons.push(format!(
            "Branch '{}' is not eligible (open to: {})",
            student.branch.trim(),
            job.eligible_branches.trim()
        ));
    }

    if student.cgpa < job.min_cgpa {
        reasons.push(format!(
            "CGPA {:.2} is below the minimum of {:.2}",
            student.cgpa, job.min_cgpa
        ));
    }

    if student.backlogs > job.max_backlogs {
        reasons.push(format!(
            "{} backlog(s) exceed the allowed {}",
            student.backlogs, job.max_backlogs
        ));
    }

    if today > job.deadline {
        reasons.push(format!("Applications closed on {}", job.deadline));
    }

    Eligibility {
        eligible: reasons.is_empty(),
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn student(branch: &str, cgpa: f64, backlogs: i32) -> StudentProfileRow {
        StudentProfileRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            full_name: "Kiran Rao".to_string(),
            branch: branch.to_string(),
            cgpa,
            backlogs,
            resume_key: None,
            phone: None,
            skills: None,
        }
    }

    fn job(branches: &str, min_cgpa: f64, max_backlogs: i32, deadline: NaiveDate) -> JobPostingRow {
        JobPostingRow {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            title: "Graduate Engineer Trainee".to_string(),
            description: "Rotational programme".to_string(),
            eligible_branches: branches.to_string(),
            min_cgpa,
            max_backlogs,
            deadline,
            created_at: Utc::now(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_branches_trims_and_lowercases() {
        assert_eq!(
            parse_branches(" Computer , IT,,Mechanical "),
            vec!["computer", "it", "mechanical"]
        );
    }

    #[test]
    fn test_all_keyword_opens_every_branch() {
        assert!(parse_branches("All").is_empty());
        assert!(parse_branches("").is_empty());
    }

    #[test]
    fn test_eligible_student_passes() {
        let result = check_eligibility(
            &student("IT", 8.1, 0),
            &job("Computer, IT", 7.0, 1, date(2026, 12, 1)),
            date(2026, 11, 30),
        );
        assert!(result.eligible);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn test_deadline_day_is_still_open() {
        let result = check_eligibility(
            &student("IT", 8.1, 0),
            &job("", 7.0, 1, date(2026, 12, 1)),
            date(2026, 12, 1),
        );
        assert!(result.eligible);
    }

    #[test]
    fn test_every_failed_rule_reported() {
        let result = check_eligibility(
            &student("Civil", 6.0, 3),
            &job("Computer", 7.0, 1, date(2026, 1, 1)),
            date(2026, 2, 1),
        );
        assert!(!result.eligible);
        assert_eq!(result.reasons.len(), 4, "reasons: {:?}", result.reasons);
    }

    #[test]
    fn test_branch_match_is_case_insensitive() {
        let result = check_eligibility(
            &student("computer", 9.0, 0),
            &job("COMPUTER", 7.0, 0, date(2030, 1, 1)),
            date(2026, 1, 1),
        );
        assert!(result.eligible);
    }

    #[test]
    fn test_cgpa_equal_to_minimum_is_enough() {
        let result = check_eligibility(
            &student("IT", 7.0, 0),
            &job("", 7.0, 0, date(2030, 1, 1)),
            date(2026, 1, 1),
        );
        assert!(result.eligible);
    }
}
