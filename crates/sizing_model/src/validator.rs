//! Breakdown validation utilities.

use std::collections::HashMap;

use crate::models::{Breakdown, WorkItem};

/// Validation result with details.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn merge(&mut self, other: ValidationResult) {
        if !other.valid {
            self.valid = false;
        }
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

/// Validator for epic/story breakdowns.
pub struct BreakdownValidator;

impl BreakdownValidator {
    /// Validate a whole breakdown.
    pub fn validate(breakdown: &Breakdown) -> ValidationResult {
        let mut result = ValidationResult::new();

        for epic in breakdown.epics() {
            result.merge(Self::validate_epic(epic));
        }
        for story in breakdown.stories() {
            result.merge(Self::validate_story(story));
        }

        result.merge(Self::validate_links(breakdown));
        result
    }

    /// Validate a single epic.
    pub fn validate_epic(epic: &WorkItem) -> ValidationResult {
        let mut result = ValidationResult::new();

        if !epic.is_epic() {
            result.add_error(format!("'{}' is listed as an epic but is a story", epic.title));
        }

        if epic.title.trim().is_empty() {
            result.add_error("Epic title cannot be empty");
        }

        if epic.acceptance_criteria.is_empty() {
            result.add_warning(format!("Epic '{}' has no acceptance criteria", epic.title));
        }

        result
    }

    /// Validate a single story.
    pub fn validate_story(story: &WorkItem) -> ValidationResult {
        let mut result = ValidationResult::new();

        if !story.is_story() {
            result.add_error(format!("'{}' is listed as a story but is an epic", story.title));
            return result;
        }

        if story.title.trim().is_empty() {
            result.add_error("Story title cannot be empty");
        }

        if story.story_points() == Some(0) {
            result.add_error(format!("Story '{}' has zero story points", story.title));
        }

        if story.parent_epic().is_none() {
            result.add_warning(format!("Story '{}' has no parent epic", story.title));
        }

        if story.acceptance_criteria.is_empty() {
            result.add_warning(format!("Story '{}' has no acceptance criteria", story.title));
        }

        result
    }

    /// Check that every parent reference names exactly one epic.
    pub fn validate_links(breakdown: &Breakdown) -> ValidationResult {
        let mut result = ValidationResult::new();

        let mut titles: HashMap<&str, usize> = HashMap::new();
        for epic in breakdown.epics() {
            *titles.entry(epic.title.as_str()).or_insert(0) += 1;
        }

        for (title, count) in &titles {
            if *count > 1 {
                result.add_error(format!("Duplicate epic title: '{}'", title));
            }
        }

        for story in breakdown.stories() {
            if let Some(parent) = story.parent_epic() {
                match titles.get(parent) {
                    Some(1) => {}
                    Some(_) => result.add_error(format!(
                        "Story '{}' references ambiguous epic '{}'",
                        story.title, parent
                    )),
                    None => result.add_error(format!(
                        "Story '{}' references unknown epic '{}'",
                        story.title, parent
                    )),
                }
            }
        }

        for epic in breakdown.epics() {
            if breakdown.stories_for(&epic.title).next().is_none() {
                result.add_warning(format!("Epic '{}' has no stories", epic.title));
            }
        }

        result
    }
}
