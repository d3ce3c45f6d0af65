//! Attendance form schema and validation.
//!
//! A form is an ordered list of typed questions attached to a mission. It
//! describes what a submission may capture beyond its status; it never gates
//! marking. Conditional rules are stored for the submission consumer and are
//! not evaluated here.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const MAX_FORM_TITLE_LENGTH: usize = 200;
pub const MAX_FORM_DESCRIPTION_LENGTH: usize = 2_000;
pub const MAX_QUESTIONS_PER_FORM: usize = 100;
pub const MAX_QUESTION_KEY_LENGTH: usize = 64;
pub const MAX_QUESTION_LABEL_LENGTH: usize = 500;

// ---------------------------------------------------------------------------
// Question schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Text,
    Textarea,
    Number,
    Select,
    MultiSelect,
    Radio,
    Checkbox,
    Date,
    Rating,
}

impl QuestionType {
    /// Choice questions must declare their options.
    pub fn requires_options(&self) -> bool {
        matches!(self, Self::Select | Self::MultiSelect | Self::Radio)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
}

/// Show a question only when another question's answer satisfies a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionCondition {
    pub depends_on: String,
    pub condition: ConditionOperator,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionValidation {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub min_length: Option<u32>,
    pub max_length: Option<u32>,
    pub pattern: Option<String>,
}

/// A question as supplied by a caller; `order` may be omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormQuestionInput {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[serde(default)]
    pub required: bool,
    pub options: Option<Vec<String>>,
    pub validation: Option<QuestionValidation>,
    pub conditional: Option<QuestionCondition>,
    pub order: Option<i32>,
}

/// A stored question with a resolved position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormQuestion {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub required: bool,
    pub options: Option<Vec<String>>,
    pub validation: Option<QuestionValidation>,
    pub conditional: Option<QuestionCondition>,
    pub order: i32,
}

// ---------------------------------------------------------------------------
// Form records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceForm {
    pub id: DbId,
    pub mission_id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub active: bool,
    pub questions: Vec<FormQuestion>,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A validated form ready to be persisted. New forms start inactive.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendanceForm {
    pub mission_id: DbId,
    pub title: String,
    pub description: Option<String>,
    pub questions: Vec<FormQuestion>,
    pub created_by: Option<DbId>,
}

/// A validated partial update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttendanceFormChanges {
    pub title: Option<String>,
    /// `Some("")` clears the stored description.
    pub description: Option<String>,
    pub questions: Option<Vec<FormQuestion>>,
}

// ---------------------------------------------------------------------------
// Validation functions
// ---------------------------------------------------------------------------

pub fn validate_form_title(title: &str) -> Result<String, String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err("Form title cannot be empty".to_string());
    }
    if trimmed.chars().count() > MAX_FORM_TITLE_LENGTH {
        return Err(format!(
            "Form title exceeds maximum length of {MAX_FORM_TITLE_LENGTH} characters"
        ));
    }
    Ok(trimmed.to_string())
}

pub fn validate_form_description(description: &str) -> Result<(), String> {
    if description.chars().count() > MAX_FORM_DESCRIPTION_LENGTH {
        return Err(format!(
            "Form description exceeds maximum length of {MAX_FORM_DESCRIPTION_LENGTH} characters"
        ));
    }
    Ok(())
}

/// Keys are identifiers: ASCII letters, digits, `_` and `-`.
pub fn validate_question_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("Question key cannot be empty".to_string());
    }
    if key.len() > MAX_QUESTION_KEY_LENGTH {
        return Err(format!(
            "Question key '{key}' exceeds maximum length of {MAX_QUESTION_KEY_LENGTH}"
        ));
    }
    if !key
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(format!(
            "Question key '{key}' may only contain letters, digits, '_' and '-'"
        ));
    }
    Ok(())
}

fn validate_rules(key: &str, rules: &QuestionValidation) -> Result<(), String> {
    if let (Some(min), Some(max)) = (rules.min, rules.max) {
        if min > max {
            return Err(format!("Question '{key}': min ({min}) is greater than max ({max})"));
        }
    }
    if let (Some(min), Some(max)) = (rules.min_length, rules.max_length) {
        if min > max {
            return Err(format!(
                "Question '{key}': min_length ({min}) is greater than max_length ({max})"
            ));
        }
    }
    if let Some(pattern) = &rules.pattern {
        regex::Regex::new(pattern)
            .map_err(|e| format!("Question '{key}': invalid pattern: {e}"))?;
    }
    Ok(())
}

fn validate_options(q: &FormQuestionInput) -> Result<(), String> {
    match &q.options {
        Some(options) if options.iter().any(|o| o.trim().is_empty()) => Err(format!(
            "Question '{}': options cannot be blank",
            q.key
        )),
        Some(options) if options.is_empty() && q.question_type.requires_options() => Err(format!(
            "Question '{}' requires at least one option",
            q.key
        )),
        None if q.question_type.requires_options() => Err(format!(
            "Question '{}' requires at least one option",
            q.key
        )),
        _ => Ok(()),
    }
}

/// Validate a question set and resolve its ordering.
///
/// Questions without an explicit `order` take their position in the input.
/// The result is sorted by `order`; ties keep input order.
pub fn normalize_questions(inputs: &[FormQuestionInput]) -> Result<Vec<FormQuestion>, String> {
    if inputs.len() > MAX_QUESTIONS_PER_FORM {
        return Err(format!(
            "Form exceeds maximum of {MAX_QUESTIONS_PER_FORM} questions"
        ));
    }

    let mut seen = HashSet::new();
    for q in inputs {
        validate_question_key(&q.key)?;
        if !seen.insert(q.key.as_str()) {
            return Err(format!("Duplicate question key '{}'", q.key));
        }
    }

    let mut questions = Vec::with_capacity(inputs.len());
    for (position, q) in inputs.iter().enumerate() {
        let label = q.label.trim();
        if label.is_empty() {
            return Err(format!("Question '{}': label cannot be empty", q.key));
        }
        if label.chars().count() > MAX_QUESTION_LABEL_LENGTH {
            return Err(format!(
                "Question '{}': label exceeds maximum length of {MAX_QUESTION_LABEL_LENGTH}",
                q.key
            ));
        }
        validate_options(q)?;
        if let Some(rules) = &q.validation {
            validate_rules(&q.key, rules)?;
        }
        if let Some(cond) = &q.conditional {
            if cond.depends_on == q.key {
                return Err(format!("Question '{}' cannot depend on itself", q.key));
            }
            if !seen.contains(cond.depends_on.as_str()) {
                return Err(format!(
                    "Question '{}' depends on unknown question '{}'",
                    q.key, cond.depends_on
                ));
            }
        }

        questions.push(FormQuestion {
            key: q.key.clone(),
            label: label.to_string(),
            question_type: q.question_type,
            required: q.required,
            options: q.options.clone(),
            validation: q.validation.clone(),
            conditional: q.conditional.clone(),
            order: q.order.unwrap_or(position as i32),
        });
    }

    questions.sort_by_key(|q| q.order);
    Ok(questions)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn question(key: &str, question_type: QuestionType) -> FormQuestionInput {
        FormQuestionInput {
            key: key.to_string(),
            label: format!("Label for {key}"),
            question_type,
            required: false,
            options: None,
            validation: None,
            conditional: None,
            order: None,
        }
    }

    #[test]
    fn assigns_positional_order_when_missing() {
        let qs = normalize_questions(&[
            question("mood", QuestionType::Text),
            question("hours", QuestionType::Number),
        ])
        .unwrap();
        assert_eq!(qs[0].key, "mood");
        assert_eq!(qs[0].order, 0);
        assert_eq!(qs[1].order, 1);
    }

    #[test]
    fn preserves_caller_order() {
        let mut first = question("first", QuestionType::Text);
        first.order = Some(5);
        let mut second = question("second", QuestionType::Text);
        second.order = Some(1);
        let qs = normalize_questions(&[first, second]).unwrap();
        assert_eq!(qs[0].key, "second");
        assert_eq!(qs[0].order, 1);
        assert_eq!(qs[1].key, "first");
        assert_eq!(qs[1].order, 5);
    }

    #[test]
    fn rejects_duplicate_keys() {
        let err = normalize_questions(&[
            question("mood", QuestionType::Text),
            question("mood", QuestionType::Textarea),
        ])
        .unwrap_err();
        assert!(err.contains("Duplicate question key 'mood'"));
    }

    #[test]
    fn rejects_bad_keys() {
        assert!(validate_question_key("").is_err());
        assert!(validate_question_key("has space").is_err());
        assert!(validate_question_key(&"k".repeat(MAX_QUESTION_KEY_LENGTH + 1)).is_err());
        assert!(validate_question_key("work_hours-1").is_ok());
    }

    #[test]
    fn choice_questions_need_options() {
        let err = normalize_questions(&[question("pick", QuestionType::Select)]).unwrap_err();
        assert!(err.contains("requires at least one option"));

        let mut with_options = question("pick", QuestionType::Radio);
        with_options.options = Some(vec!["yes".into(), "no".into()]);
        assert!(normalize_questions(&[with_options]).is_ok());
    }

    #[test]
    fn blank_option_rejected() {
        let mut q = question("pick", QuestionType::MultiSelect);
        q.options = Some(vec!["a".into(), " ".into()]);
        assert!(normalize_questions(&[q]).is_err());
    }

    #[test]
    fn inverted_ranges_rejected() {
        let mut q = question("hours", QuestionType::Number);
        q.validation = Some(QuestionValidation {
            min: Some(10.0),
            max: Some(1.0),
            ..Default::default()
        });
        assert!(normalize_questions(&[q]).is_err());

        let mut q = question("summary", QuestionType::Textarea);
        q.validation = Some(QuestionValidation {
            min_length: Some(50),
            max_length: Some(10),
            ..Default::default()
        });
        assert!(normalize_questions(&[q]).is_err());
    }

    #[test]
    fn invalid_pattern_rejected() {
        let mut q = question("code", QuestionType::Text);
        q.validation = Some(QuestionValidation {
            pattern: Some("([a-z".into()),
            ..Default::default()
        });
        let err = normalize_questions(&[q]).unwrap_err();
        assert!(err.contains("invalid pattern"));
    }

    #[test]
    fn conditional_must_reference_sibling() {
        let mut follow_up = question("why", QuestionType::Text);
        follow_up.conditional = Some(QuestionCondition {
            depends_on: "blocked".into(),
            condition: ConditionOperator::Equals,
            value: serde_json::json!(true),
        });
        assert!(normalize_questions(&[follow_up.clone()]).is_err());

        let qs = normalize_questions(&[question("blocked", QuestionType::Checkbox), follow_up])
            .unwrap();
        assert_eq!(qs.len(), 2);
    }

    #[test]
    fn conditional_cannot_reference_itself() {
        let mut q = question("loop", QuestionType::Text);
        q.conditional = Some(QuestionCondition {
            depends_on: "loop".into(),
            condition: ConditionOperator::NotEquals,
            value: serde_json::json!(""),
        });
        assert!(normalize_questions(&[q]).is_err());
    }

    #[test]
    fn title_trimmed_and_bounded() {
        assert_eq!(validate_form_title("  Daily check-in ").unwrap(), "Daily check-in");
        assert!(validate_form_title("   ").is_err());
        assert!(validate_form_title(&"t".repeat(MAX_FORM_TITLE_LENGTH + 1)).is_err());
    }

    #[test]
    fn question_type_deserializes_from_type_field() {
        let q: FormQuestionInput = serde_json::from_value(serde_json::json!({
            "key": "topics",
            "label": "Topics covered",
            "type": "multi_select",
            "options": ["rust", "sql"],
        }))
        .unwrap();
        assert_eq!(q.question_type, QuestionType::MultiSelect);
        assert!(!q.required);
        assert_eq!(q.order, None);
    }
}
