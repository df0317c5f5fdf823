use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crosstalk_core::UserId;

use crate::error::AccountError;

/// A stored account. The password hash never leaves this crate; hand
/// callers [`UserRecord::public`] instead.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

/// Shape safe to return over HTTP.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: UserId,
    pub username: String,
    pub email: Option<String>,
    pub role: String,
}

impl UserRecord {
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
        }
    }
}

/// JSON-file-backed account store; the file holds a plain JSON array of
/// records. Reads are served from memory; every mutation rewrites the
/// whole file through a temp-file rename. Usernames are unique
/// case-insensitively.
#[derive(Debug)]
pub struct AccountStore {
    path: PathBuf,
    users: Mutex<Vec<UserRecord>>,
    bcrypt_cost: u32,
}

impl AccountStore {
    /// Open the store, creating an empty file (and parent directories)
    /// when missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AccountError> {
        Self::open_with_cost(path, bcrypt::DEFAULT_COST)
    }

    /// Open with an explicit bcrypt cost. Lower costs are for tests and
    /// tooling; servers should stay on [`AccountStore::open`].
    pub fn open_with_cost(
        path: impl Into<PathBuf>,
        bcrypt_cost: u32,
    ) -> Result<Self, AccountError> {
        let path = path.into();
        let users = match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => Vec::new(),
            Ok(raw) => serde_json::from_str::<Vec<UserRecord>>(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent)?;
                    }
                }
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };
        info!(path = %path.display(), users = users.len(), "account store opened");

        let store = Self {
            path,
            users: Mutex::new(users),
            bcrypt_cost,
        };
        store.persist(&store.users.lock())?;
        Ok(store)
    }

    /// Register a new account. The username keeps its submitted casing;
    /// uniqueness ignores case.
    #[instrument(skip(self, password, email))]
    pub fn create(
        &self,
        username: &str,
        password: &str,
        email: Option<String>,
    ) -> Result<UserRecord, AccountError> {
        let needle = username.to_lowercase();
        let mut users = self.users.lock();
        if users.iter().any(|u| u.username.to_lowercase() == needle) {
            return Err(AccountError::DuplicateUsername(username.to_string()));
        }

        let record = UserRecord {
            id: UserId::new(),
            username: username.to_string(),
            email,
            password_hash: bcrypt::hash(password, self.bcrypt_cost)?,
            role: "user".to_string(),
            created_at: Utc::now(),
        };
        users.push(record.clone());
        self.persist(&users)?;
        info!(username = %record.username, id = %record.id, "account created");
        Ok(record)
    }

    /// Look up an account, ignoring username case.
    pub fn find_by_name(&self, username: &str) -> Option<UserRecord> {
        let needle = username.to_lowercase();
        self.users
            .lock()
            .iter()
            .find(|u| u.username.to_lowercase() == needle)
            .cloned()
    }

    /// Check a username/password pair. Unknown user and wrong password
    /// return the same error so callers cannot probe for accounts.
    #[instrument(skip(self, password))]
    pub fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<UserRecord, AccountError> {
        let user = self
            .find_by_name(username)
            .ok_or(AccountError::InvalidCredentials)?;
        if bcrypt::verify(password, &user.password_hash).unwrap_or(false) {
            Ok(user)
        } else {
            Err(AccountError::InvalidCredentials)
        }
    }

    pub fn len(&self) -> usize {
        self.users.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.lock().is_empty()
    }

    fn persist(&self, users: &[UserRecord]) -> Result<(), AccountError> {
        let json = serde_json::to_string_pretty(users)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Cost 4 is the bcrypt minimum; keeps hashing fast in tests.
    const TEST_COST: u32 = 4;

    fn temp_users_file() -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("crosstalk-test-accounts-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join("users.json")
    }

    fn open_store(path: &PathBuf) -> AccountStore {
        AccountStore::open_with_cost(path, TEST_COST).unwrap()
    }

    #[test]
    fn create_and_find_ignores_case() {
        let path = temp_users_file();
        let store = open_store(&path);

        let created = store.create("Alice", "secret99", None).unwrap();
        assert!(created.id.as_str().starts_with("user_"));
        assert_eq!(created.role, "user");

        assert_eq!(store.find_by_name("alice").unwrap().username, "Alice");
        assert_eq!(store.find_by_name("ALICE").unwrap().username, "Alice");
        assert!(store.find_by_name("bob").is_none());
    }

    #[test]
    fn duplicate_username_rejected_case_insensitively() {
        let path = temp_users_file();
        let store = open_store(&path);
        store.create("Alice", "secret99", None).unwrap();

        let err = store.create("ALICE", "other-pass", None).unwrap_err();
        assert!(matches!(err, AccountError::DuplicateUsername(_)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn verify_credentials_accepts_only_the_right_password() {
        let path = temp_users_file();
        let store = open_store(&path);
        store.create("carol", "hunter22", None).unwrap();

        assert_eq!(
            store.verify_credentials("carol", "hunter22").unwrap().username,
            "carol"
        );
        // Wrong password and unknown user are indistinguishable.
        assert!(matches!(
            store.verify_credentials("carol", "wrong").unwrap_err(),
            AccountError::InvalidCredentials
        ));
        assert!(matches!(
            store.verify_credentials("nobody", "hunter22").unwrap_err(),
            AccountError::InvalidCredentials
        ));
    }

    #[test]
    fn accounts_survive_reopen() {
        let path = temp_users_file();
        {
            let store = open_store(&path);
            store
                .create("dave", "pw-dave-1", Some("dave@example.com".into()))
                .unwrap();
        }

        let reopened = open_store(&path);
        assert_eq!(reopened.len(), 1);
        let user = reopened.find_by_name("dave").unwrap();
        assert_eq!(user.email.as_deref(), Some("dave@example.com"));
        assert!(reopened.verify_credentials("dave", "pw-dave-1").is_ok());
    }

    #[test]
    fn file_on_disk_is_a_plain_json_array() {
        let path = temp_users_file();
        let store = open_store(&path);
        store.create("frank", "pw-frank", None).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let users = parsed.as_array().expect("users file is a JSON array");
        assert_eq!(users.len(), 1);
        assert_eq!(users[0]["username"], "frank");
    }

    #[test]
    fn open_creates_missing_file_and_parents() {
        let path = std::env::temp_dir()
            .join(format!("crosstalk-test-accounts-{}", uuid::Uuid::now_v7()))
            .join("nested")
            .join("users.json");
        let store = AccountStore::open_with_cost(&path, TEST_COST).unwrap();
        assert!(store.is_empty());
        assert!(path.exists());
    }

    #[test]
    fn corrupt_file_is_a_serialization_error() {
        let path = temp_users_file();
        std::fs::write(&path, "{not json").unwrap();

        let err = AccountStore::open_with_cost(&path, TEST_COST).unwrap_err();
        assert!(matches!(err, AccountError::Serialization(_)));
    }

    #[test]
    fn public_shape_has_no_hash() {
        let path = temp_users_file();
        let store = open_store(&path);
        let user = store.create("erin", "topsecret", None).unwrap();

        let json = serde_json::to_value(user.public()).unwrap();
        assert_eq!(json["username"], "erin");
        assert!(json.get("password_hash").is_none());
    }
}
