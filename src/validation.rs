use crate::models::{ClassUpdate, NewClass, NewFeedback};
use crate::repository::RepositoryError;

fn required(value: &str, field: &str) -> Result<(), RepositoryError> {
    if value.trim().is_empty() {
        Err(RepositoryError::InvalidArgument(format!("{field} is required")))
    } else {
        Ok(())
    }
}

/// Emails are compared as given, minus surrounding whitespace.
pub fn validate_email(email: &str) -> Result<&str, RepositoryError> {
    required(email, "email")?;
    Ok(email.trim())
}

pub fn validate_rating(value: u8) -> Result<u8, RepositoryError> {
    if (1..=5).contains(&value) {
        Ok(value)
    } else {
        Err(RepositoryError::InvalidArgument(
            "rating must be between 1 and 5".into(),
        ))
    }
}

pub fn validate_new_class(new: &NewClass) -> Result<(), RepositoryError> {
    required(&new.name, "name")?;
    required(&new.teacher_name, "teacher name")?;
    required(&new.schedule, "schedule")
}

/// Every field of an edit is mandatory. Weekday entries are trimmed and
/// blanks dropped.
pub fn validate_class_update(mut update: ClassUpdate) -> Result<ClassUpdate, RepositoryError> {
    update.weekdays = update
        .weekdays
        .iter()
        .map(|day| day.trim().to_string())
        .filter(|day| !day.is_empty())
        .collect();

    required(&update.name, "name")?;
    required(&update.teacher_name, "teacher name")?;
    required(&update.schedule, "schedule")?;
    required(&update.description, "description")?;
    if update.weekdays.is_empty() {
        return Err(RepositoryError::InvalidArgument(
            "at least one weekday is required".into(),
        ));
    }
    Ok(update)
}

pub fn validate_feedback(feedback: &NewFeedback) -> Result<(), RepositoryError> {
    validate_email(&feedback.user_email)?;
    required(&feedback.text, "feedback text")?;
    validate_rating(feedback.rating)?;
    Ok(())
}
