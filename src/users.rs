use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::models::{SignIn, SignUp, User, generate_id};
use crate::repository::RepositoryError;
use crate::store::{KeyValueStore, USERS_KEY, load_json, save_json};
use crate::validation::validate_email;

/// Accounts known to this device. Passwords are accepted but not kept.
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn KeyValueStore>,
    write_lock: Arc<Mutex<()>>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn sign_up(&self, request: SignUp) -> Result<User, RepositoryError> {
        let email = validate_email(&request.email)?;
        if request.password.is_empty() {
            return Err(RepositoryError::InvalidArgument("password is required".into()));
        }

        let _guard = self.write_lock.lock().await;
        let mut users = self.read_users().await?;
        if users.iter().any(|u| u.email == email) {
            return Err(RepositoryError::Conflict(
                "Email is already registered".into(),
            ));
        }

        let user = User {
            id: generate_id(),
            email: email.to_string(),
            role: request.role.unwrap_or_default(),
        };
        users.push(user.clone());
        save_json(&self.store, USERS_KEY, &users).await?;

        info!(id = %user.id, role = ?user.role, "user registered");
        Ok(user)
    }

    pub async fn sign_in(&self, request: SignIn) -> Result<User, RepositoryError> {
        let email = validate_email(&request.email)?;
        if request.password.is_empty() {
            return Err(RepositoryError::InvalidArgument("password is required".into()));
        }

        self.read_users()
            .await?
            .into_iter()
            .find(|u| u.email == email)
            .ok_or_else(|| RepositoryError::NotFound(format!("user {email}")))
    }

    async fn read_users(&self) -> Result<Vec<User>, RepositoryError> {
        Ok(load_json(&self.store, USERS_KEY).await?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::store::MemoryStore;

    fn sign_up(email: &str, role: Option<Role>) -> SignUp {
        SignUp {
            email: email.to_string(),
            password: "secret".to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn test_sign_up_then_sign_in() {
        let directory = UserDirectory::new(Arc::new(MemoryStore::new()));

        let user = directory
            .sign_up(sign_up("coach@x.com", Some(Role::Teacher)))
            .await
            .unwrap();
        let found = directory
            .sign_in(SignIn {
                email: "coach@x.com".to_string(),
                password: "anything".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(found, user);
        assert_eq!(found.role, Role::Teacher);
    }

    #[tokio::test]
    async fn test_sign_up_defaults_to_member() {
        let directory = UserDirectory::new(Arc::new(MemoryStore::new()));
        let user = directory.sign_up(sign_up("a@x.com", None)).await.unwrap();
        assert_eq!(user.role, Role::Member);
    }

    #[tokio::test]
    async fn test_duplicate_sign_up_conflicts() {
        let directory = UserDirectory::new(Arc::new(MemoryStore::new()));
        directory.sign_up(sign_up("a@x.com", None)).await.unwrap();

        let err = directory.sign_up(sign_up("a@x.com", None)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_sign_in_unknown_user() {
        let directory = UserDirectory::new(Arc::new(MemoryStore::new()));
        let err = directory
            .sign_in(SignIn {
                email: "ghost@x.com".to_string(),
                password: "x".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }
}
