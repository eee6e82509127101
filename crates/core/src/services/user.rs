//! User service.

use std::sync::LazyLock;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use regex::Regex;
use samvad_common::{AppError, AppResult, IdGenerator};
use samvad_db::{
    entities::user::{self, Department, UserRole},
    repositories::UserRepository,
};
use sea_orm::Set;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::services::access::{self, Actor};

#[allow(clippy::expect_used)]
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9]\d{0,15}$").expect("valid regex"));

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if PHONE_RE.is_match(phone) {
        Ok(())
    } else {
        Err(ValidationError::new("phone").with_message("Please enter a valid phone number".into()))
    }
}

/// Input for registering a citizen account.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,

    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,

    #[validate(length(min = 6, max = 128, message = "Password must be at least 6 characters"))]
    pub password: String,

    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
}

/// Input for logging in.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginInput {
    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Input for updating one's own profile.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileInput {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: Option<String>,

    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
}

/// Input for changing one's own password.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordInput {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,

    #[validate(length(min = 6, max = 128, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

/// Input for creating a staff account.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateStaffInput {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,

    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,

    #[validate(length(min = 6, max = 128, message = "Password must be at least 6 characters"))]
    pub password: String,

    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,

    pub department: Department,
}

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self {
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a citizen. The returned user carries a fresh token.
    pub async fn register(&self, input: RegisterInput) -> AppResult<user::Model> {
        input.validate()?;
        self.create_account(
            input.name,
            input.email,
            &input.password,
            input.phone,
            UserRole::Citizen,
            None,
        )
        .await
    }

    /// Create a staff account. Admin only.
    pub async fn create_staff(&self, actor: &Actor, input: CreateStaffInput) -> AppResult<user::Model> {
        access::require_admin(actor)?;
        input.validate()?;

        let staff = self
            .create_account(
                input.name,
                input.email,
                &input.password,
                input.phone,
                UserRole::Staff,
                Some(input.department),
            )
            .await?;

        tracing::info!(user_id = %staff.id, staff_id = ?staff.staff_id, admin_id = %actor.id, "Staff account created");
        Ok(staff)
    }

    async fn create_account(
        &self,
        name: String,
        email: String,
        password: &str,
        phone: Option<String>,
        role: UserRole,
        department: Option<Department>,
    ) -> AppResult<user::Model> {
        let email = email.trim().to_lowercase();
        if self.user_repo.find_by_email(&email).await?.is_some() {
            return Err(AppError::BadRequest(
                "User already exists with this email".to_string(),
            ));
        }

        let password_hash = hash_password(password)?;
        let now = Utc::now().fixed_offset();
        let staff_id = (role == UserRole::Staff).then(|| self.id_gen.generate_staff_id());

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            name: Set(name.trim().to_string()),
            email: Set(email),
            password_hash: Set(password_hash),
            role: Set(role),
            phone: Set(phone),
            department: Set(department),
            staff_id: Set(staff_id),
            token: Set(Some(self.id_gen.generate_token())),
            is_active: Set(true),
            last_login_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        self.user_repo.create(model).await
    }

    /// Authenticate a user by token. Deactivated accounts are rejected.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_token(token)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AppError::Unauthorized)
    }

    /// Authenticate by email and password, refreshing `last_login_at`.
    pub async fn login(&self, input: LoginInput) -> AppResult<user::Model> {
        input.validate()?;

        let user = self
            .user_repo
            .find_by_email(&input.email)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(&input.password, &user.password_hash)? || !user.is_active {
            return Err(AppError::Unauthorized);
        }

        let now = Utc::now().fixed_offset();
        let token = user.token.clone().unwrap_or_else(|| self.id_gen.generate_token());
        let mut active: user::ActiveModel = user.into();
        active.token = Set(Some(token));
        active.last_login_at = Set(Some(now));
        active.updated_at = Set(now);

        self.user_repo.update(active).await
    }

    /// Update one's own profile.
    pub async fn update_profile(&self, id: &str, input: UpdateProfileInput) -> AppResult<user::Model> {
        input.validate()?;

        let user = self.user_repo.get_by_id(id).await?;
        let mut active: user::ActiveModel = user.into();

        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        if let Some(phone) = input.phone {
            active.phone = Set(Some(phone));
        }
        active.updated_at = Set(Utc::now().fixed_offset());

        self.user_repo.update(active).await
    }

    /// Change one's own password. Issues a new token, invalidating the old one.
    pub async fn change_password(&self, id: &str, input: ChangePasswordInput) -> AppResult<user::Model> {
        input.validate()?;

        let user = self.user_repo.get_by_id(id).await?;
        if !verify_password(&input.current_password, &user.password_hash)? {
            return Err(AppError::BadRequest(
                "Current password is incorrect".to_string(),
            ));
        }

        let mut active: user::ActiveModel = user.into();
        active.password_hash = Set(hash_password(&input.new_password)?);
        active.token = Set(Some(self.id_gen.generate_token()));
        active.updated_at = Set(Utc::now().fixed_offset());

        self.user_repo.update(active).await
    }

    /// Activate or deactivate an account. Admin only, never oneself.
    pub async fn set_active(&self, actor: &Actor, user_id: &str, is_active: bool) -> AppResult<user::Model> {
        access::require_admin(actor)?;
        if actor.id == user_id {
            return Err(AppError::BadRequest(
                "You cannot change the status of your own account".to_string(),
            ));
        }

        let user = self.user_repo.get_by_id(user_id).await?;
        let mut active: user::ActiveModel = user.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(Utc::now().fixed_offset());

        let updated = self.user_repo.update(active).await?;
        tracing::info!(user_id = %updated.id, is_active, admin_id = %actor.id, "Account status changed");
        Ok(updated)
    }
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn create_test_user(id: &str, password: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            name: "Test User".to_string(),
            email: "test@example.com".to_string(),
            password_hash: hash_password(password).unwrap(),
            role: UserRole::Citizen,
            phone: None,
            department: None,
            staff_id: None,
            token: Some("token1".to_string()),
            is_active: true,
            last_login_at: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn service(db: MockDatabase) -> UserService {
        UserService::new(UserRepository::new(Arc::new(db.into_connection())))
    }

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("secret1").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("secret1", &hash).unwrap());
        assert!(!verify_password("secret2", &hash).unwrap());
        assert!(verify_password("secret1", "not-a-hash").is_err());
    }

    #[test]
    fn test_phone_format() {
        assert!(validate_phone("+919876543210").is_ok());
        assert!(validate_phone("9876543210").is_ok());
        assert!(validate_phone("0123").is_err());
        assert!(validate_phone("12-34").is_err());
    }

    #[test]
    fn test_register_input_validation() {
        let input = RegisterInput {
            name: String::new(),
            email: "not-an-email".to_string(),
            password: "123".to_string(),
            phone: Some("abc".to_string()),
        };
        match AppError::from(input.validate().unwrap_err()) {
            AppError::ValidationFailed(errors) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, ["email", "name", "password", "phone"]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_register_rejects_taken_email() {
        let existing = create_test_user("u1", "secret1");
        let svc = service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[existing]]));

        let result = svc
            .register(RegisterInput {
                name: "Asha".to_string(),
                email: "Test@Example.com".to_string(),
                password: "secret1".to_string(),
                phone: None,
            })
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_authenticate_by_token_rejects_inactive() {
        let mut user = create_test_user("u1", "secret1");
        user.is_active = false;
        let svc = service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[user]]));

        assert!(matches!(
            svc.authenticate_by_token("token1").await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let user = create_test_user("u1", "secret1");
        let svc = service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[user]]));

        let result = svc
            .login(LoginInput {
                email: "test@example.com".to_string(),
                password: "wrong".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_login_refreshes_last_login() {
        let user = create_test_user("u1", "secret1");
        let mut updated = user.clone();
        updated.last_login_at = Some(Utc::now().into());
        let svc = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user]])
                .append_query_results([[updated]]),
        );

        let logged_in = svc
            .login(LoginInput {
                email: "test@example.com".to_string(),
                password: "secret1".to_string(),
            })
            .await
            .unwrap();
        assert!(logged_in.last_login_at.is_some());
        assert_eq!(logged_in.token.as_deref(), Some("token1"));
    }

    #[tokio::test]
    async fn test_only_admin_creates_staff() {
        let svc = service(MockDatabase::new(DatabaseBackend::Postgres));
        let result = svc
            .create_staff(
                &Actor::new("s1", UserRole::Staff),
                CreateStaffInput {
                    name: "Ravi".to_string(),
                    email: "ravi@city.gov".to_string(),
                    password: "secret1".to_string(),
                    phone: None,
                    department: Department::Water,
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_admin_cannot_deactivate_self() {
        let svc = service(MockDatabase::new(DatabaseBackend::Postgres));
        let result = svc
            .set_active(&Actor::new("a1", UserRole::Admin), "a1", false)
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
