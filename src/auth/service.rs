//! Account registration, login and credential changes.

use miette::Diagnostic;
use thiserror::Error;
use tracing::{info, instrument, warn};

use super::hasher::{CredentialError, CredentialHasher};
use crate::db::{Database, DbError, Id, NewUser, User, UserRepository};

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Error, Diagnostic, Debug)]
pub enum AuthError {
    #[error("Invalid username or password")]
    #[diagnostic(code(todos::auth::invalid_credentials))]
    InvalidCredentials,

    #[error("Account {username} is deactivated")]
    #[diagnostic(
        code(todos::auth::deactivated),
        help("Ask an administrator to reactivate the account")
    )]
    AccountDeactivated { username: String },

    #[error("Username already exists: {username}")]
    #[diagnostic(code(todos::auth::username_taken))]
    UsernameTaken { username: String },

    #[error("Email already exists: {email}")]
    #[diagnostic(code(todos::auth::email_taken))]
    EmailTaken { email: String },

    #[error("Password must be at least {min} characters long")]
    #[diagnostic(code(todos::auth::weak_password))]
    WeakPassword { min: usize },

    #[error("New password must be different from the current password")]
    #[diagnostic(code(todos::auth::password_unchanged))]
    PasswordUnchanged,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Database(#[from] DbError),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Input for [`AuthService::register`].
#[derive(Clone)]
pub struct NewRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl NewRegistration {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            first_name: None,
            last_name: None,
        }
    }
}

impl std::fmt::Debug for NewRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewRegistration")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish()
    }
}

/// Stateless authentication over any [`Database`].
///
/// Session tracking belongs to the caller; every method takes the user
/// it acts on explicitly.
pub struct AuthService<'a, D: Database> {
    db: &'a D,
    hasher: CredentialHasher,
}

impl<'a, D: Database> AuthService<'a, D> {
    pub fn new(db: &'a D) -> Self {
        Self {
            db,
            hasher: CredentialHasher::new(),
        }
    }

    /// Create an account after checking password strength and uniqueness.
    #[instrument(skip_all, fields(username = %registration.username))]
    pub async fn register(&self, registration: NewRegistration) -> AuthResult<User> {
        check_strength(&registration.password)?;

        let new_user = NewUser::new(
            registration.username,
            registration.email,
            self.hasher.hash(&registration.password)?,
        )
        .with_names(registration.first_name, registration.last_name);
        new_user.validate()?;

        let users = self.db.users();
        if users.username_exists(&new_user.username).await? {
            return Err(AuthError::UsernameTaken {
                username: new_user.username,
            });
        }
        if users.email_exists(&new_user.email).await? {
            return Err(AuthError::EmailTaken {
                email: new_user.email,
            });
        }

        let user = users.create(&new_user).await?;
        info!(user_id = user.id, "User registered");
        Ok(user)
    }

    /// Verify a username and password and record the login.
    ///
    /// Unknown users and wrong passwords fail the same way.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, username: &str, password: &str) -> AuthResult<User> {
        let users = self.db.users();

        let Some(user) = users.find_by_username(username).await? else {
            warn!("Login failed: unknown user");
            return Err(AuthError::InvalidCredentials);
        };

        if !user.active {
            warn!(user_id = user.id, "Login refused: account deactivated");
            return Err(AuthError::AccountDeactivated {
                username: user.username,
            });
        }

        if !self.hasher.verify(password, &user.password_hash) {
            warn!(user_id = user.id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        users.update_last_login(user.id).await?;
        info!(user_id = user.id, "User logged in");

        users
            .find_by_id(user.id)
            .await?
            .ok_or(AuthError::Database(DbError::UserNotFound { id: user.id }))
    }

    /// Replace a user's password after checking the current one.
    #[instrument(skip(self, current_password, new_password))]
    pub async fn change_password(
        &self,
        user_id: Id,
        current_password: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        check_strength(new_password)?;
        if current_password == new_password {
            return Err(AuthError::PasswordUnchanged);
        }

        let users = self.db.users();
        let mut user = users
            .find_by_id(user_id)
            .await?
            .ok_or(DbError::UserNotFound { id: user_id })?;

        if !self.hasher.verify(current_password, &user.password_hash) {
            warn!("Password change refused: current password incorrect");
            return Err(AuthError::InvalidCredentials);
        }

        user.password_hash = self.hasher.hash(new_password)?;
        users.update(&user).await?;
        info!("Password changed");
        Ok(())
    }

    /// Change names and email, keeping the email unique across accounts.
    #[instrument(skip(self, first_name, last_name, email))]
    pub async fn update_profile(
        &self,
        user_id: Id,
        first_name: Option<String>,
        last_name: Option<String>,
        email: &str,
    ) -> AuthResult<User> {
        let users = self.db.users();
        let mut user = users
            .find_by_id(user_id)
            .await?
            .ok_or(DbError::UserNotFound { id: user_id })?;

        let email = email.trim().to_lowercase();
        if email != user.email && users.email_exists(&email).await? {
            return Err(AuthError::EmailTaken { email });
        }

        user.first_name = first_name;
        user.last_name = last_name;
        user.email = email;
        Ok(users.update(&user).await?)
    }
}

fn check_strength(password: &str) -> AuthResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword {
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}
