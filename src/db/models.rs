//! Domain models for the todos database.
//!
//! These models are storage-agnostic. Validation runs at the write
//! boundary (repository `create`/`update`), never when a row is mapped
//! back from storage.

use std::fmt;

use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::db::utils::today;
use crate::db::{DbError, DbResult};

/// Row id assigned by SQLite.
pub type Id = i64;

/// Maximum length of a todo title, in characters.
pub const MAX_TITLE_LEN: usize = 255;

/// Maximum length of a todo description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 1000;

/// Occurrence limit used when a recurring todo has no explicit maximum.
pub const UNBOUNDED_OCCURRENCES: u32 = i32::MAX as u32;

// =============================================================================
// Enumerations
// =============================================================================

/// Priority of a todo. Stored as `LOW`, `MEDIUM`, `HIGH`, `URGENT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Urgent => "URGENT",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
            Priority::Urgent => "Urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Priority::Low),
            "MEDIUM" => Ok(Priority::Medium),
            "HIGH" => Ok(Priority::High),
            "URGENT" => Ok(Priority::Urgent),
            _ => Err(format!("Invalid Priority: {}", s)),
        }
    }
}

/// Lifecycle status of a todo. Stored as `TODO`, `IN_PROGRESS`,
/// `COMPLETED`, `CANCELLED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TodoStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
    Cancelled,
}

impl TodoStatus {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TodoStatus::Todo => "TODO",
            TodoStatus::InProgress => "IN_PROGRESS",
            TodoStatus::Completed => "COMPLETED",
            TodoStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TodoStatus::Todo => "To Do",
            TodoStatus::InProgress => "In Progress",
            TodoStatus::Completed => "Completed",
            TodoStatus::Cancelled => "Cancelled",
        }
    }

    /// Completed or cancelled.
    pub fn is_finished(&self) -> bool {
        matches!(self, TodoStatus::Completed | TodoStatus::Cancelled)
    }

    /// Todo or in progress.
    pub fn is_modifiable(&self) -> bool {
        matches!(self, TodoStatus::Todo | TodoStatus::InProgress)
    }
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TodoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TODO" => Ok(TodoStatus::Todo),
            "IN_PROGRESS" => Ok(TodoStatus::InProgress),
            "COMPLETED" => Ok(TodoStatus::Completed),
            "CANCELLED" => Ok(TodoStatus::Cancelled),
            _ => Err(format!("Invalid TodoStatus: {}", s)),
        }
    }
}

// =============================================================================
// Users
// =============================================================================

/// A registered account.
///
/// `password_hash` holds the encoded salt and digest produced by
/// [`CredentialHasher`](crate::auth::CredentialHasher). It is never
/// serialized and the `Debug` output redacts it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub last_login_at: Option<NaiveDateTime>,
}

impl User {
    /// "First Last" when both names are known, otherwise the username.
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.username.clone(),
        }
    }

    pub fn validate(&self) -> DbResult<()> {
        validate_user_fields(&self.username, &self.email)
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("active", &self.active)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .field("last_login_at", &self.last_login_at)
            .finish()
    }
}

/// Input for creating a user.
#[derive(Clone, PartialEq, Eq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl NewUser {
    /// Trims the username and normalizes the email to lowercase.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into().trim().to_string(),
            email: email.into().trim().to_lowercase(),
            password_hash: password_hash.into(),
            first_name: None,
            last_name: None,
        }
    }

    pub fn with_names(mut self, first_name: Option<String>, last_name: Option<String>) -> Self {
        self.first_name = first_name.map(|s| s.trim().to_string());
        self.last_name = last_name.map(|s| s.trim().to_string());
        self
    }

    pub fn validate(&self) -> DbResult<()> {
        validate_user_fields(&self.username, &self.email)?;
        if self.password_hash.is_empty() {
            return Err(validation("password hash cannot be empty"));
        }
        Ok(())
    }
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish()
    }
}

fn validate_user_fields(username: &str, email: &str) -> DbResult<()> {
    if username.trim().is_empty() {
        return Err(validation("username cannot be empty"));
    }
    let email = email.trim();
    if email.is_empty() {
        return Err(validation("email cannot be empty"));
    }
    match email.find('@') {
        Some(at) if at > 0 && at < email.len() - 1 => Ok(()),
        _ => Err(validation(format!("invalid email format: {}", email))),
    }
}

// =============================================================================
// Projects
// =============================================================================

/// A named container of todos, owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub user_id: Id,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Project {
    pub fn validate(&self) -> DbResult<()> {
        validate_project_fields(&self.name, self.start_date, self.end_date)
    }
}

/// Input for creating a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub user_id: Id,
}

impl NewProject {
    pub fn new(name: impl Into<String>, user_id: Id) -> Self {
        Self {
            name: name.into(),
            description: None,
            start_date: None,
            end_date: None,
            user_id,
        }
    }

    pub fn validate(&self) -> DbResult<()> {
        validate_project_fields(&self.name, self.start_date, self.end_date)
    }
}

fn validate_project_fields(
    name: &str,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> DbResult<()> {
    if name.trim().is_empty() {
        return Err(validation("project name cannot be empty"));
    }
    if let (Some(start), Some(end)) = (start_date, end_date)
        && start > end
    {
        return Err(validation(format!(
            "project start date {} is after end date {}",
            start, end
        )));
    }
    Ok(())
}

// =============================================================================
// Todos
// =============================================================================

/// Recurrence state of a recurring todo.
///
/// Built through [`Recurrence::new`] on the write path, or through
/// [`Recurrence::from_storage`] when rebuilding persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    interval_days: u32,
    max_occurrences: u32,
    current_occurrence: u32,
}

impl Recurrence {
    /// First occurrence of an unbounded recurrence. Zero intervals are rejected.
    pub fn new(interval_days: u32) -> DbResult<Self> {
        if interval_days == 0 {
            return Err(validation("recurring interval cannot be zero"));
        }
        Ok(Self {
            interval_days,
            max_occurrences: UNBOUNDED_OCCURRENCES,
            current_occurrence: 1,
        })
    }

    /// Cap the number of occurrences.
    pub fn with_max_occurrences(mut self, max_occurrences: u32) -> DbResult<Self> {
        if max_occurrences < 1 {
            return Err(validation("max occurrences must be at least 1"));
        }
        if max_occurrences < self.current_occurrence {
            return Err(validation(format!(
                "max occurrences {} is below current occurrence {}",
                max_occurrences, self.current_occurrence
            )));
        }
        self.max_occurrences = max_occurrences;
        Ok(self)
    }

    /// Rebuild already-persisted state without re-running validation.
    pub fn from_storage(interval_days: u32, max_occurrences: u32, current_occurrence: u32) -> Self {
        Self {
            interval_days,
            max_occurrences,
            current_occurrence,
        }
    }

    pub fn interval_days(&self) -> u32 {
        self.interval_days
    }

    pub fn interval(&self) -> Days {
        Days::new(u64::from(self.interval_days))
    }

    pub fn max_occurrences(&self) -> u32 {
        self.max_occurrences
    }

    pub fn current_occurrence(&self) -> u32 {
        self.current_occurrence
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_occurrences == UNBOUNDED_OCCURRENCES
    }

    pub fn has_more_occurrences(&self) -> bool {
        self.current_occurrence < self.max_occurrences
    }

    /// Occurrences left after the current one; `None` when unbounded.
    pub fn remaining_occurrences(&self) -> Option<u32> {
        if self.is_unbounded() {
            None
        } else {
            Some(self.max_occurrences.saturating_sub(self.current_occurrence))
        }
    }

    pub fn is_final_occurrence(&self) -> bool {
        self.current_occurrence >= self.max_occurrences
    }

    /// Due date of the occurrence following one due on `due_date`.
    pub fn next_due_after(&self, due_date: NaiveDate) -> Option<NaiveDate> {
        due_date.checked_add_days(self.interval())
    }

    pub fn validate(&self) -> DbResult<()> {
        if self.interval_days == 0 {
            return Err(validation("recurring interval cannot be zero"));
        }
        if self.current_occurrence < 1 {
            return Err(validation("current occurrence must be at least 1"));
        }
        if self.current_occurrence > self.max_occurrences {
            return Err(validation(format!(
                "current occurrence {} exceeds max occurrences {}",
                self.current_occurrence, self.max_occurrences
            )));
        }
        Ok(())
    }
}

/// Simple or recurring.
///
/// Storage has no type column: a todo is recurring exactly when it has a
/// row in `recurring_todos`. Only the row mapper derives this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TodoKind {
    #[default]
    Simple,
    Recurring(Recurrence),
}

impl TodoKind {
    pub fn recurrence(&self) -> Option<&Recurrence> {
        match self {
            TodoKind::Simple => None,
            TodoKind::Recurring(recurrence) => Some(recurrence),
        }
    }
}

/// A unit of work owned by a user, optionally filed under a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: Id,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
    pub status: TodoStatus,
    pub project_id: Option<Id>,
    pub user_id: Id,
    pub kind: TodoKind,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Todo {
    pub fn is_recurring(&self) -> bool {
        matches!(self.kind, TodoKind::Recurring(_))
    }

    pub fn recurrence(&self) -> Option<&Recurrence> {
        self.kind.recurrence()
    }

    /// Due date plus the recurrence interval. `None` for simple todos or
    /// when no due date is set.
    pub fn next_due_date(&self) -> Option<NaiveDate> {
        let recurrence = self.recurrence()?;
        recurrence.next_due_after(self.due_date?)
    }

    /// Complete the current occurrence.
    ///
    /// A recurring todo with occurrences left (and a due date to move)
    /// advances instead: due date += interval, occurrence += 1, status
    /// back to `Todo`. Returns `true` when it advanced.
    pub fn mark_completed(&mut self) -> bool {
        if let TodoKind::Recurring(recurrence) = &mut self.kind
            && recurrence.has_more_occurrences()
            && let Some(next_due) = self
                .due_date
                .and_then(|due| recurrence.next_due_after(due))
        {
            self.due_date = Some(next_due);
            recurrence.current_occurrence += 1;
            self.status = TodoStatus::Todo;
            return true;
        }

        self.status = TodoStatus::Completed;
        false
    }

    /// Due strictly before `date` and not finished.
    pub fn is_overdue_on(&self, date: NaiveDate) -> bool {
        self.due_date.is_some_and(|due| due < date) && !self.status.is_finished()
    }

    /// [`is_overdue_on`](Self::is_overdue_on) against [`today`], the clock
    /// the overdue query uses.
    pub fn is_overdue(&self) -> bool {
        self.is_overdue_on(today())
    }

    pub fn validate(&self) -> DbResult<()> {
        validate_todo_fields(&self.title, self.description.as_deref(), &self.kind)
    }
}

/// Input for creating a todo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTodo {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
    pub status: TodoStatus,
    pub project_id: Option<Id>,
    pub user_id: Id,
    pub kind: TodoKind,
}

impl NewTodo {
    /// Simple todo with medium priority and status `Todo`.
    pub fn new(title: impl Into<String>, user_id: Id) -> Self {
        Self {
            title: title.into(),
            description: None,
            due_date: None,
            priority: Priority::default(),
            status: TodoStatus::default(),
            project_id: None,
            user_id,
            kind: TodoKind::Simple,
        }
    }

    pub fn recurring(mut self, recurrence: Recurrence) -> Self {
        self.kind = TodoKind::Recurring(recurrence);
        self
    }

    pub fn validate(&self) -> DbResult<()> {
        validate_todo_fields(&self.title, self.description.as_deref(), &self.kind)
    }
}

fn validate_todo_fields(title: &str, description: Option<&str>, kind: &TodoKind) -> DbResult<()> {
    if title.trim().is_empty() {
        return Err(validation("todo title cannot be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(validation(format!(
            "todo title cannot exceed {} characters",
            MAX_TITLE_LEN
        )));
    }
    if description.is_some_and(|d| d.chars().count() > MAX_DESCRIPTION_LEN) {
        return Err(validation(format!(
            "todo description cannot exceed {} characters",
            MAX_DESCRIPTION_LEN
        )));
    }
    if let TodoKind::Recurring(recurrence) = kind {
        recurrence.validate()?;
    }
    Ok(())
}

fn validation(message: impl Into<String>) -> DbError {
    DbError::Validation {
        message: message.into(),
    }
}
