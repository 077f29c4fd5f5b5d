//! Repository traits for data access abstraction.
//!
//! These traits define the contract for data access, allowing different
//! storage backends to be swapped without changing business logic.
//!
//! Every write stamps `updated_at`; `created_at` is assigned once on insert.

use std::future::Future;

use chrono::NaiveDate;

use crate::db::{
    DbResult, Id,
    models::{NewProject, NewTodo, NewUser, Priority, Project, Todo, TodoStatus, User},
};

/// Repository for User operations.
pub trait UserRepository {
    /// Create a new user and return it with its assigned id.
    fn create(&self, user: &NewUser) -> impl Future<Output = DbResult<User>> + Send;

    fn find_by_id(&self, id: Id) -> impl Future<Output = DbResult<Option<User>>> + Send;

    fn find_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = DbResult<Option<User>>> + Send;

    fn find_by_email(&self, email: &str) -> impl Future<Output = DbResult<Option<User>>> + Send;

    /// All users ordered by username.
    fn find_all(&self) -> impl Future<Output = DbResult<Vec<User>>> + Send;

    /// Active users ordered by username.
    fn find_all_active(&self) -> impl Future<Output = DbResult<Vec<User>>> + Send;

    /// Update an existing user. Fails with `UserNotFound` if absent.
    fn update(&self, user: &User) -> impl Future<Output = DbResult<User>> + Send;

    /// Record a successful login.
    fn update_last_login(&self, id: Id) -> impl Future<Output = DbResult<()>> + Send;

    /// Delete a user together with their projects and todos.
    fn delete(&self, id: Id) -> impl Future<Output = DbResult<bool>> + Send;

    fn deactivate(&self, id: Id) -> impl Future<Output = DbResult<bool>> + Send;

    fn reactivate(&self, id: Id) -> impl Future<Output = DbResult<bool>> + Send;

    fn exists(&self, id: Id) -> impl Future<Output = DbResult<bool>> + Send;

    fn username_exists(&self, username: &str) -> impl Future<Output = DbResult<bool>> + Send;

    fn email_exists(&self, email: &str) -> impl Future<Output = DbResult<bool>> + Send;

    fn count(&self) -> impl Future<Output = DbResult<u64>> + Send;

    fn count_active(&self) -> impl Future<Output = DbResult<u64>> + Send;
}

/// Repository for Project operations.
pub trait ProjectRepository {
    /// Create a new project and return it with its assigned id.
    fn create(&self, project: &NewProject) -> impl Future<Output = DbResult<Project>> + Send;

    fn find_by_id(&self, id: Id) -> impl Future<Output = DbResult<Option<Project>>> + Send;

    /// All projects, newest first.
    fn find_all(&self) -> impl Future<Output = DbResult<Vec<Project>>> + Send;

    /// Projects owned by a user, newest first.
    fn find_by_user(&self, user_id: Id) -> impl Future<Output = DbResult<Vec<Project>>> + Send;

    /// Case-insensitive substring match on the name, ordered by name.
    fn find_by_name(&self, name: &str) -> impl Future<Output = DbResult<Vec<Project>>> + Send;

    /// Projects with at least one unfinished todo.
    fn find_active(&self) -> impl Future<Output = DbResult<Vec<Project>>> + Send;

    /// Projects that have todos, all of them finished.
    fn find_completed(&self) -> impl Future<Output = DbResult<Vec<Project>>> + Send;

    /// Update an existing project. Fails with `ProjectNotFound` if absent.
    fn update(&self, project: &Project) -> impl Future<Output = DbResult<Project>> + Send;

    /// Delete a project and all of its todos atomically.
    fn delete(&self, id: Id) -> impl Future<Output = DbResult<bool>> + Send;

    fn count(&self) -> impl Future<Output = DbResult<u64>> + Send;

    fn exists(&self, id: Id) -> impl Future<Output = DbResult<bool>> + Send;
}

/// Repository for Todo operations. Recurring todos are read and written
/// through the same calls.
pub trait TodoRepository {
    /// Create a new todo and return it with its assigned id.
    fn create(&self, todo: &NewTodo) -> impl Future<Output = DbResult<Todo>> + Send;

    fn find_by_id(&self, id: Id) -> impl Future<Output = DbResult<Option<Todo>>> + Send;

    /// All todos, newest first.
    fn find_all(&self) -> impl Future<Output = DbResult<Vec<Todo>>> + Send;

    fn find_by_project(&self, project_id: Id)
    -> impl Future<Output = DbResult<Vec<Todo>>> + Send;

    fn find_by_user(&self, user_id: Id) -> impl Future<Output = DbResult<Vec<Todo>>> + Send;

    fn find_by_status(
        &self,
        status: TodoStatus,
    ) -> impl Future<Output = DbResult<Vec<Todo>>> + Send;

    fn find_by_priority(
        &self,
        priority: Priority,
    ) -> impl Future<Output = DbResult<Vec<Todo>>> + Send;

    /// Todos due on or before `date`, earliest first.
    fn find_due_before(&self, date: NaiveDate)
    -> impl Future<Output = DbResult<Vec<Todo>>> + Send;

    /// Unfinished todos due before today, earliest first.
    fn find_overdue(&self) -> impl Future<Output = DbResult<Vec<Todo>>> + Send;

    /// Update an existing todo. Fails with `TodoNotFound` if absent.
    fn update(&self, todo: &Todo) -> impl Future<Output = DbResult<Todo>> + Send;

    /// Mark a todo completed and persist the result. Recurring todos with
    /// occurrences left advance to their next occurrence instead.
    fn complete(&self, id: Id) -> impl Future<Output = DbResult<Todo>> + Send;

    fn delete(&self, id: Id) -> impl Future<Output = DbResult<bool>> + Send;

    fn count(&self) -> impl Future<Output = DbResult<u64>> + Send;

    fn count_by_status(&self, status: TodoStatus)
    -> impl Future<Output = DbResult<u64>> + Send;
}

/// Combined database interface.
pub trait Database: Send + Sync {
    type Users<'a>: UserRepository + Send + Sync
    where
        Self: 'a;
    type Projects<'a>: ProjectRepository + Send + Sync
    where
        Self: 'a;
    type Todos<'a>: TodoRepository + Send + Sync
    where
        Self: 'a;

    /// Create or migrate the schema. Idempotent.
    fn ensure_schema(&self) -> impl Future<Output = DbResult<()>> + Send;

    /// Whether a connection can be opened and queried.
    fn is_healthy(&self) -> impl Future<Output = bool> + Send;

    fn users(&self) -> Self::Users<'_>;

    fn projects(&self) -> Self::Projects<'_>;

    fn todos(&self) -> Self::Todos<'_>;
}
