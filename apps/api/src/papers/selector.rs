//! Question selection: draws a paper's questions from the bank.
//!
//! Pure and synchronous: the handler loads the candidate pool for the paper's
//! year and subject once, then this module samples from it in memory. No
//! question is ever placed twice in one paper.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::models::question::QuestionRow;
use crate::papers::blueprint::{question_label, SectionSpec};

/// Optional questions appended to each section after the requested ones.
pub const EXTRAS_PER_SECTION: usize = 3;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedQuestion {
    pub id: Uuid,
    pub label: String,
    pub question: String,
    pub marks: i32,
    pub unit: i32,
    /// True for the optional fill questions appended after the requested slots.
    pub extra: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledSection {
    /// 1-based main question number.
    pub number: usize,
    pub questions_to_attempt: i32,
    pub marks_each: i32,
    pub total: i64,
    pub questions: Vec<SelectedQuestion>,
}

/// A requested slot the bank could not satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnfilledSlot {
    pub section: usize,
    pub slot: usize,
    pub marks: i32,
    pub unit: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledPaper {
    pub sections: Vec<AssembledSection>,
    /// Marks of the requested (non-extra) questions actually placed.
    pub selected_marks: i64,
    pub unfilled: Vec<UnfilledSlot>,
}

// ────────────────────────────────────────────────────────────────────────────
// Selection algorithm
// ────────────────────────────────────────────────────────────────────────────

/// Assembles a paper from `pool`, which must already be narrowed to the
/// paper's year and subject.
///
/// 1. Every slot, section by section, gets one question chosen uniformly at
///    random among pool questions with the slot's unit and marks that are not
///    yet anywhere in the paper. A slot with no such candidate stays unfilled.
/// 2. Each section then receives up to `EXTRAS_PER_SECTION` extras: for each of
///    its requested questions in order, unused pool questions with the same
///    unit and marks are appended in pool order.
pub fn assemble_paper<R: Rng + ?Sized>(
    pool: &[QuestionRow],
    sections: &[SectionSpec],
    rng: &mut R,
) -> AssembledPaper {
    let mut used: HashSet<Uuid> = HashSet::new();
    let mut selected_marks: i64 = 0;
    let mut unfilled = Vec::new();

    let mut assembled: Vec<AssembledSection> = sections
        .iter()
        .enumerate()
        .map(|(i, spec)| AssembledSection {
            number: i + 1,
            questions_to_attempt: spec.questions_to_attempt,
            marks_each: spec.marks_each,
            total: spec.total(),
            questions: Vec::new(),
        })
        .collect();

    for (spec, section) in sections.iter().zip(assembled.iter_mut()) {
        for (slot_idx, slot) in spec.slots.iter().enumerate() {
            let candidates: Vec<&QuestionRow> = pool
                .iter()
                .filter(|q| q.unit == slot.unit && q.marks == slot.marks && !used.contains(&q.id))
                .collect();

            let Some(chosen) = candidates.choose(rng) else {
                warn!(
                    "No unused question for section {} slot {} (unit {}, {} marks)",
                    section.number,
                    slot_idx + 1,
                    slot.unit,
                    slot.marks
                );
                unfilled.push(UnfilledSlot {
                    section: section.number,
                    slot: slot_idx + 1,
                    marks: slot.marks,
                    unit: slot.unit,
                });
                continue;
            };

            used.insert(chosen.id);
            selected_marks += i64::from(chosen.marks);
            let label = question_label(section.questions.len());
            section.questions.push(to_selected(chosen, label, false));
        }
    }

    for section in assembled.iter_mut() {
        append_extras(pool, section, &mut used);
    }

    AssembledPaper {
        sections: assembled,
        selected_marks,
        unfilled,
    }
}

fn append_extras(pool: &[QuestionRow], section: &mut AssembledSection, used: &mut HashSet<Uuid>) {
    let requested: Vec<(i32, i32)> = section
        .questions
        .iter()
        .map(|q| (q.unit, q.marks))
        .collect();
    let mut added = 0;

    for (unit, marks) in requested {
        if added >= EXTRAS_PER_SECTION {
            break;
        }
        for candidate in pool {
            if added >= EXTRAS_PER_SECTION {
                break;
            }
            if candidate.unit != unit || candidate.marks != marks || used.contains(&candidate.id) {
                continue;
            }
            used.insert(candidate.id);
            let label = question_label(section.questions.len());
            section.questions.push(to_selected(candidate, label, true));
            added += 1;
        }
    }
}

fn to_selected(row: &QuestionRow, label: String, extra: bool) -> SelectedQuestion {
    SelectedQuestion {
        id: row.id,
        label,
        question: row.question.clone(),
        marks: row.marks,
        unit: row.unit,
        extra,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
