use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

pub const DEFAULT_LEVEL: &str = "all levels";
pub const DEFAULT_REMAINING_SLOTS: u32 = 10;
pub const DEFAULT_TEACHER_NAME: &str = "Teacher";
pub const DEFAULT_SCHEDULE: &str = "08:00 - 09:00";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Yoga,
    Crossfit,
    Pilates,
    Hiit,
    Strength,
    Other(String),
}

impl Category {
    pub fn as_str(&self) -> &str {
        match self {
            Category::Yoga => "yoga",
            Category::Crossfit => "crossfit",
            Category::Pilates => "pilates",
            Category::Hiit => "hiit",
            Category::Strength => "strength",
            Category::Other(raw) => raw,
        }
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        match value.to_lowercase().as_str() {
            "yoga" => Category::Yoga,
            "crossfit" => Category::Crossfit,
            "pilates" => Category::Pilates,
            "hiit" => Category::Hiit,
            "strength" => Category::Strength,
            _ => Category::Other(value),
        }
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive keyword match on the class name; first rule wins.
pub fn infer_category(name: &str) -> Category {
    let name = name.to_lowercase();
    let rules: [(&[&str], Category); 5] = [
        (&["yoga"], Category::Yoga),
        (&["pilates"], Category::Pilates),
        (&["hiit"], Category::Hiit),
        (&["cross"], Category::Crossfit),
        (&["strength", "muscul", "weight"], Category::Strength),
    ];

    rules
        .into_iter()
        .find(|(keywords, _)| keywords.iter().any(|k| name.contains(k)))
        .map(|(_, category)| category)
        .unwrap_or(Category::Strength)
}

/// Random base36 identifier for records created on this device.
pub fn generate_id() -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..10)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", try_from = "StoredClass")]
pub struct ClassRecord {
    pub id: String,
    pub name: String,
    pub teacher_name: String,
    #[schema(example = "08:00 - 09:00")]
    pub schedule: String,
    pub weekdays: Vec<String>,
    pub description: String,
    #[schema(value_type = String, example = "yoga")]
    pub category: Category,
    pub level: String,
    pub remaining_slots: u32,
    #[schema(value_type = Vec<String>)]
    pub enrolled_emails: BTreeSet<String>,
}

impl ClassRecord {
    /// Local shape for a remote record. The remote does not track weekdays,
    /// capacity or membership, so those take defaults.
    pub fn from_remote(remote: RemoteClass) -> Self {
        Self {
            id: remote.id.to_string(),
            category: infer_category(&remote.name),
            name: remote.name,
            teacher_name: remote
                .teacher_name
                .unwrap_or_else(|| DEFAULT_TEACHER_NAME.to_string()),
            schedule: remote
                .start_time
                .unwrap_or_else(|| DEFAULT_SCHEDULE.to_string()),
            weekdays: Vec::new(),
            description: remote.description.unwrap_or_default(),
            level: DEFAULT_LEVEL.to_string(),
            remaining_slots: DEFAULT_REMAINING_SLOTS,
            enrolled_emails: BTreeSet::new(),
        }
    }

    /// Local shape for a class the remote just created. Fields the remote
    /// echoes back win; the rest come from the submitted payload.
    pub fn from_created(created: RemoteClass, new: NewClass) -> Self {
        let category_given = new.category.as_deref().is_some_and(|c| !c.is_empty());
        let mut record = Self::from_new(created.id.to_string(), new);
        record.name = created.name;
        if !category_given {
            record.category = infer_category(&record.name);
        }
        if let Some(teacher_name) = created.teacher_name.filter(|t| !t.is_empty()) {
            record.teacher_name = teacher_name;
        }
        if let Some(description) = created.description.filter(|d| !d.is_empty()) {
            record.description = description;
        }
        record
    }

    /// Record built on this device when the remote cannot take it.
    pub fn from_new(id: String, new: NewClass) -> Self {
        Self {
            id,
            category: new
                .category
                .filter(|c| !c.is_empty())
                .map(Category::from)
                .unwrap_or_else(|| infer_category(&new.name)),
            name: new.name,
            teacher_name: new.teacher_name,
            schedule: new.schedule,
            weekdays: new.weekdays,
            description: new.description,
            level: new
                .level
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| DEFAULT_LEVEL.to_string()),
            remaining_slots: new.remaining_slots.unwrap_or(DEFAULT_REMAINING_SLOTS),
            enrolled_emails: BTreeSet::new(),
        }
    }
}

/// Persisted records may predate newer optional fields or carry malformed
/// values; every read goes through these defaults. Only a record without a
/// usable id is rejected.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredClass {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    teacher_name: Option<Value>,
    #[serde(default)]
    schedule: Option<Value>,
    #[serde(default)]
    weekdays: Option<Value>,
    #[serde(default)]
    description: Option<Value>,
    #[serde(default)]
    category: Option<Value>,
    #[serde(default)]
    level: Option<Value>,
    #[serde(default)]
    remaining_slots: Option<Value>,
    #[serde(default)]
    enrolled_emails: Option<Value>,
}

fn text(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s,
        _ => String::new(),
    }
}

fn non_empty_strings<C: FromIterator<String>>(value: Option<Value>) -> C {
    let items = match value {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        })
        .collect()
}

impl TryFrom<StoredClass> for ClassRecord {
    type Error = String;

    fn try_from(stored: StoredClass) -> Result<Self, Self::Error> {
        let id = match stored.id {
            Some(Value::String(id)) if !id.is_empty() => id,
            Some(Value::Number(n)) if n.is_i64() || n.is_u64() => n.to_string(),
            other => return Err(format!("class record has no usable id: {other:?}")),
        };
        let name = text(stored.name);
        let category = Some(text(stored.category))
            .filter(|c| !c.is_empty())
            .map(Category::from)
            .unwrap_or_else(|| infer_category(&name));
        let level = Some(text(stored.level))
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_LEVEL.to_string());
        let remaining_slots = stored
            .remaining_slots
            .as_ref()
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(DEFAULT_REMAINING_SLOTS);

        Ok(Self {
            id,
            name,
            teacher_name: text(stored.teacher_name),
            schedule: text(stored.schedule),
            weekdays: non_empty_strings(stored.weekdays),
            description: text(stored.description),
            category,
            level,
            remaining_slots,
            enrolled_emails: non_empty_strings(stored.enrolled_emails),
        })
    }
}

/// Class shape served by the remote backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteClass {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "teacherName", skip_serializing_if = "Option::is_none")]
    pub teacher_name: Option<String>,
    #[serde(default, alias = "startTime", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
}

/// Body sent to the remote when creating a class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteClassDraft {
    pub name: String,
    pub description: String,
    pub teacher_name: String,
    pub start_time: String,
}

impl From<&NewClass> for RemoteClassDraft {
    fn from(new: &NewClass) -> Self {
        let start_time = new
            .schedule
            .split(" - ")
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        Self {
            name: new.name.clone(),
            description: new.description.clone(),
            teacher_name: new.teacher_name.clone(),
            start_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewClass {
    pub name: String,
    pub teacher_name: String,
    #[schema(example = "18:00 - 19:00")]
    pub schedule: String,
    #[serde(default)]
    pub weekdays: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub remaining_slots: Option<u32>,
}

/// Full replacement of a class's descriptive fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassUpdate {
    pub name: String,
    pub teacher_name: String,
    pub schedule: String,
    pub weekdays: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEntry {
    pub id: String,
    pub user_email: String,
    pub text: String,
    #[schema(minimum = 1, maximum = 5)]
    pub rating: u8,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    #[schema(value_type = i64, example = 1735689600000_i64)]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewFeedback {
    pub user_email: String,
    pub text: String,
    pub rating: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    #[serde(alias = "customer")]
    Member,
    Teacher,
    Admin,
}

impl Role {
    pub fn can_manage_classes(self) -> bool {
        matches!(self, Role::Teacher | Role::Admin)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SignUp {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SignIn {
    pub email: String,
    pub password: String,
}
