// Placement portal: student and company profiles, job postings, applications,
// interview scheduling and the audit trail.

pub mod admin;
pub mod audit;
pub mod companies;
pub mod eligibility;
pub mod students;
