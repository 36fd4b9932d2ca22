//! Paper blueprint: what the examiner asks for, and the checks applied to it
//! before any question is drawn from the bank.

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Main questions (Q1..Q5) a paper may carry.
pub const MAX_SECTIONS: usize = 5;
/// Sub-question slots per main question.
pub const MAX_SLOTS_PER_SECTION: usize = 10;

/// One requested sub-question: draw a question of `marks` from `unit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSpec {
    pub marks: i32,
    pub unit: i32,
}

/// One main question of the paper.
///
/// `questions_to_attempt × marks_each` is the section's contribution to the
/// paper's maximum marks; `slots` are the sub-questions to print. Totals are
/// computed in `i64` so no `i32` request values can overflow them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSpec {
    pub questions_to_attempt: i32,
    pub marks_each: i32,
    #[serde(default)]
    pub slots: Vec<SlotSpec>,
}

impl SectionSpec {
    pub fn total(&self) -> i64 {
        i64::from(self.questions_to_attempt) * i64::from(self.marks_each)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperRequest {
    /// Year of study the questions are drawn for.
    pub year: i32,
    pub subject: String,
    #[serde(default)]
    pub subject_code: String,
    #[serde(default)]
    pub academic_year: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub test_name: String,
    #[serde(default)]
    pub term: String,
    #[serde(default)]
    pub division: String,
    #[serde(default)]
    pub hours: u32,
    #[serde(default)]
    pub minutes: u32,
    pub max_marks: i32,
    pub sections: Vec<SectionSpec>,
}

/// Printed front matter of a paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperHeader {
    pub department: String,
    pub test_name: String,
    pub exam_label: String,
    pub subject: String,
    pub subject_code: String,
    pub academic_year: String,
    pub term: String,
    pub division: String,
    /// `dd/mm/yyyy`.
    pub date: String,
    pub duration: String,
    pub max_marks: i32,
}

impl PaperRequest {
    pub fn header(&self, date: chrono::NaiveDate) -> PaperHeader {
        PaperHeader {
            department: self.department.trim().to_string(),
            test_name: self.test_name.trim().to_string(),
            exam_label: exam_label(self.year).to_string(),
            subject: self.subject.trim().to_string(),
            subject_code: self.subject_code.trim().to_string(),
            academic_year: self.academic_year.trim().to_string(),
            term: self.term.trim().to_string(),
            division: self.division.trim().to_string(),
            date: date.format("%d/%m/%Y").to_string(),
            duration: format_duration(self.hours, self.minutes),
            max_marks: self.max_marks,
        }
    }
}

/// Rejects requests the selector cannot honour.
pub fn validate_shape(request: &PaperRequest) -> Result<(), AppError> {
    if request.subject.trim().is_empty() {
        return Err(AppError::Validation("subject is required".to_string()));
    }
    if request.sections.is_empty() {
        return Err(AppError::Validation(
            "at least one section is required".to_string(),
        ));
    }
    if request.sections.len() > MAX_SECTIONS {
        return Err(AppError::Validation(format!(
            "a paper has at most {MAX_SECTIONS} sections, got {}",
            request.sections.len()
        )));
    }
    if request.max_marks < 0 {
        return Err(AppError::Validation("max_marks cannot be negative".to_string()));
    }
    for (i, section) in request.sections.iter().enumerate() {
        let n = i + 1;
        if section.slots.len() > MAX_SLOTS_PER_SECTION {
            return Err(AppError::Validation(format!(
                "section {n} has {} questions, at most {MAX_SLOTS_PER_SECTION} allowed",
                section.slots.len()
            )));
        }
        if section.questions_to_attempt < 0 || section.marks_each < 0 {
            return Err(AppError::Validation(format!(
                "section {n}: question count and marks cannot be negative"
            )));
        }
        if section.slots.iter().any(|s| s.marks <= 0 || s.unit <= 0) {
            return Err(AppError::Validation(format!(
                "section {n}: every question needs positive marks and unit"
            )));
        }
    }
    Ok(())
}

/// Sum of per-section totals must equal the declared maximum, otherwise the
/// whole generation is rejected. Returns the total on success.
pub fn validate_marks_total(sections: &[SectionSpec], max_marks: i32) -> Result<i64, AppError> {
    let total: i64 = sections.iter().map(SectionSpec::total).sum();
    if total != i64::from(max_marks) {
        return Err(AppError::Validation(format!(
            "Total marks of all sections ({total}) do not match maximum marks ({max_marks})."
        )));
    }
    Ok(total)
}

pub fn format_duration(hours: u32, minutes: u32) -> String {
    match (hours, minutes) {
        (0, 0) => String::new(),
        (0, m) => format!("{m} minutes"),
        (h, 0) => format!("{h} hours"),
        (h, m) => format!("{h} hours {m} minutes"),
    }
}

pub fn exam_label(year: i32) -> &'static str {
    match year {
        1 => "First Exam",
        2 => "Second Exam",
        3 => "Third Exam",
        _ => "BE",
    }
}

/// Sub-question label for the `index`-th question of a section:
/// `a)`, `b)`, … `z)`, `aa)`, `ab)`, …
pub fn question_label(index: usize) -> String {
    let mut n = index;
    let mut letters = Vec::new();
    loop {
        letters.push((b'a' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    letters.iter().rev().collect::<String>() + ")"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(nq: i32, marks: i32, slots: &[(i32, i32)]) -> SectionSpec {
        SectionSpec {
            questions_to_attempt: nq,
            marks_each: marks,
            slots: slots
                .iter()
                .map(|&(marks, unit)| SlotSpec { marks, unit })
                .collect(),
        }
    }

    fn request(sections: Vec<SectionSpec>, max_marks: i32) -> PaperRequest {
        PaperRequest {
            year: 2,
            subject: "Data Structures".to_string(),
            subject_code: "CS201".to_string(),
            academic_year: "2026-27".to_string(),
            department: "Computer Engineering".to_string(),
            test_name: "Unit Test".to_string(),
            term: "I".to_string(),
            division: "A".to_string(),
            hours: 1,
            minutes: 30,
            max_marks,
            sections,
        }
    }

    #[test]
    fn test_marks_total_must_match_maximum() {
        let sections = vec![section(2, 5, &[]), section(1, 10, &[])];
        assert_eq!(validate_marks_total(&sections, 20).unwrap(), 20);
    }

    #[test]
    fn test_marks_total_mismatch_rejected_both_ways() {
        let sections = vec![section(2, 5, &[]), section(1, 10, &[])];
        for max in [15, 25] {
            match validate_marks_total(&sections, max) {
                Err(AppError::Validation(msg)) => {
                    assert!(msg.contains("(20)"), "got {msg}");
                    assert!(msg.contains(&format!("({max})")), "got {msg}");
                }
                other => panic!("expected rejection, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_huge_section_values_rejected_without_overflow() {
        let sections = vec![section(100_000, 100_000, &[(5, 1)])];
        let req = request(sections.clone(), 100);
        assert!(validate_shape(&req).is_ok());
        match validate_marks_total(&sections, 100) {
            Err(AppError::Validation(msg)) => assert!(msg.contains("(10000000000)"), "got {msg}"),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_totals_that_would_wrap_i32_do_not_match() {
        // 2 × 2^31 wraps to 0 in i32 arithmetic.
        let sections = vec![
            section(65_536, 32_768, &[]),
            section(65_536, 32_768, &[]),
        ];
        assert!(validate_marks_total(&sections, 0).is_err());
    }

    #[test]
    fn test_shape_accepts_typical_paper() {
        let req = request(
            vec![section(2, 5, &[(5, 1), (5, 2), (5, 3)]), section(1, 10, &[(10, 4), (10, 5)])],
            20,
        );
        assert!(validate_shape(&req).is_ok());
    }

    #[test]
    fn test_shape_limits_sections_and_slots() {
        let too_many_sections = request((0..6).map(|_| section(1, 1, &[])).collect(), 6);
        assert!(validate_shape(&too_many_sections).is_err());

        let slots: Vec<(i32, i32)> = (0..11).map(|_| (2, 1)).collect();
        let too_many_slots = request(vec![section(1, 2, &slots)], 2);
        assert!(validate_shape(&too_many_slots).is_err());
    }

    #[test]
    fn test_shape_rejects_nonpositive_slot_values() {
        let req = request(vec![section(1, 5, &[(0, 1)])], 5);
        assert!(validate_shape(&req).is_err());
        let req = request(vec![section(1, 5, &[(5, -1)])], 5);
        assert!(validate_shape(&req).is_err());
    }

    #[test]
    fn test_shape_requires_subject() {
        let mut req = request(vec![section(1, 5, &[(5, 1)])], 5);
        req.subject = "  ".to_string();
        assert!(validate_shape(&req).is_err());
    }

    #[test]
    fn test_format_duration_variants() {
        assert_eq!(format_duration(0, 0), "");
        assert_eq!(format_duration(0, 45), "45 minutes");
        assert_eq!(format_duration(3, 0), "3 hours");
        assert_eq!(format_duration(2, 30), "2 hours 30 minutes");
    }

    #[test]
    fn test_exam_label_falls_back_to_be() {
        assert_eq!(exam_label(1), "First Exam");
        assert_eq!(exam_label(2), "Second Exam");
        assert_eq!(exam_label(3), "Third Exam");
        assert_eq!(exam_label(4), "BE");
        assert_eq!(exam_label(0), "BE");
    }

    #[test]
    fn test_header_formats_date_and_duration() {
        let req = request(vec![section(1, 5, &[(5, 1)])], 5);
        let date = chrono::NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        let header = req.header(date);
        assert_eq!(header.date, "07/03/2026");
        assert_eq!(header.duration, "1 hours 30 minutes");
        assert_eq!(header.exam_label, "Second Exam");
        assert_eq!(header.max_marks, 5);
    }

    #[test]
    fn test_question_labels_continue_past_j() {
        assert_eq!(question_label(0), "a)");
        assert_eq!(question_label(9), "j)");
        assert_eq!(question_label(12), "m)");
        assert_eq!(question_label(25), "z)");
        assert_eq!(question_label(26), "aa)");
        assert_eq!(question_label(27), "ab)");
    }
}
