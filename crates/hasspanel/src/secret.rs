//! Access to the bearer token kept in the OS secret store.
//!
//! On Linux the token is a Secret Service item found by its attributes, the
//! way libsecret files it: `xdg:schema` names the schema and a single
//! `token_string = user_token` attribute identifies the item. Lookups match on
//! the identifying attribute only, so tokens saved by tools that do not set
//! `xdg:schema` (such as `secret-tool store`) are found as well.

use std::collections::HashMap;

use serde::Deserialize;

/// Default Secret Service schema name the token is filed under.
pub const DEFAULT_SCHEMA: &str = "org.gnome.hass-data.Password";

/// Default name of the attribute identifying the token item.
pub const DEFAULT_ATTRIBUTE: &str = "token_string";

/// Default value of the identifying attribute.
pub const DEFAULT_VALUE: &str = "user_token";

/// Attribute libsecret uses to record the schema of an item.
pub const SCHEMA_ATTRIBUTE: &str = "xdg:schema";

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_attribute() -> String {
    DEFAULT_ATTRIBUTE.to_string()
}

fn default_value() -> String {
    DEFAULT_VALUE.to_string()
}

/// Where the token lives in the secret store.
///
/// Built once from configuration and handed to the token store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SecretSchema {
    #[serde(default = "default_schema")]
    pub name: String,

    #[serde(default = "default_attribute")]
    pub attribute: String,

    #[serde(default = "default_value")]
    pub value: String,
}

impl Default for SecretSchema {
    fn default() -> Self {
        Self {
            name: default_schema(),
            attribute: default_attribute(),
            value: default_value(),
        }
    }
}

impl SecretSchema {
    /// Attributes a saved token is searched by.
    pub fn lookup_attributes(&self) -> HashMap<&str, &str> {
        HashMap::from([(self.attribute.as_str(), self.value.as_str())])
    }

    /// Attributes a newly saved token is filed with.
    pub fn store_attributes(&self) -> HashMap<&str, &str> {
        let mut attributes = self.lookup_attributes();
        attributes.insert(SCHEMA_ATTRIBUTE, self.name.as_str());
        attributes
    }

    /// Human-readable label shown by keyring managers.
    pub fn label(&self) -> String {
        format!("Home Assistant token ({})", self.name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[cfg(target_os = "linux")]
    #[error("Secret Service error: {0}")]
    Service(#[from] secret_service::Error),

    #[cfg(not(target_os = "linux"))]
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Saved token is not valid UTF-8")]
    Encoding,

    #[error("Refusing to store an empty token")]
    EmptyToken,

    #[error("Secret store unavailable: {0}")]
    Unavailable(String),
}

/// Trait for token storage operations
///
/// This trait allows for mocking the secret store for testing purposes
pub trait TokenStore: Send + Sync {
    /// Look up the saved token. Returns `Ok(None)` when nothing usable is saved.
    fn lookup(&self) -> Result<Option<String>, SecretError>;

    /// Save a new token, replacing any existing one
    fn store(&self, token: &str) -> Result<(), SecretError>;

    /// Remove the saved token. Removing a missing token succeeds.
    fn clear(&self) -> Result<(), SecretError>;
}

/// Token store backed by the platform secret store
///
/// Every call is blocking; async callers run it on a blocking thread.
#[derive(Debug, Clone)]
pub struct SystemTokenStore {
    schema: SecretSchema,
}

impl SystemTokenStore {
    pub fn new(schema: SecretSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &SecretSchema {
        &self.schema
    }
}

fn usable(token: String) -> Option<String> {
    if token.trim().is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(target_os = "linux")]
impl TokenStore for SystemTokenStore {
    fn lookup(&self) -> Result<Option<String>, SecretError> {
        use secret_service::blocking::SecretService;
        use secret_service::EncryptionType;

        let service = SecretService::connect(EncryptionType::Dh)?;
        let found = service.search_items(self.schema.lookup_attributes())?;
        let Some(item) = found
            .unlocked
            .into_iter()
            .next()
            .or_else(|| found.locked.into_iter().next())
        else {
            tracing::debug!(
                "No secret found for {}={}",
                self.schema.attribute,
                self.schema.value
            );
            return Ok(None);
        };

        if item.is_locked()? {
            item.unlock()?;
        }
        let secret = item.get_secret()?;
        let token = String::from_utf8(secret).map_err(|_| SecretError::Encoding)?;
        Ok(usable(token))
    }

    fn store(&self, token: &str) -> Result<(), SecretError> {
        use secret_service::blocking::SecretService;
        use secret_service::EncryptionType;

        let token = token.trim();
        if token.is_empty() {
            return Err(SecretError::EmptyToken);
        }

        let service = SecretService::connect(EncryptionType::Dh)?;
        let collection = service.get_default_collection()?;
        if collection.is_locked()? {
            collection.unlock()?;
        }
        collection.create_item(
            &self.schema.label(),
            self.schema.store_attributes(),
            token.as_bytes(),
            true,
            "text/plain",
        )?;
        tracing::info!(
            "Saved token to secret store ({}={})",
            self.schema.attribute,
            self.schema.value
        );
        Ok(())
    }

    fn clear(&self) -> Result<(), SecretError> {
        use secret_service::blocking::SecretService;
        use secret_service::EncryptionType;

        let service = SecretService::connect(EncryptionType::Dh)?;
        let found = service.search_items(self.schema.lookup_attributes())?;
        for item in found.unlocked.iter().chain(found.locked.iter()) {
            item.delete()?;
        }
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
impl SystemTokenStore {
    fn entry(&self) -> Result<keyring::Entry, SecretError> {
        Ok(keyring::Entry::new(&self.schema.name, &self.schema.value)?)
    }
}

#[cfg(not(target_os = "linux"))]
impl TokenStore for SystemTokenStore {
    fn lookup(&self) -> Result<Option<String>, SecretError> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(usable(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, token: &str) -> Result<(), SecretError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(SecretError::EmptyToken);
        }
        self.entry()?.set_password(token)?;
        tracing::info!("Saved token to keyring ({})", self.schema.name);
        Ok(())
    }

    fn clear(&self) -> Result<(), SecretError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Mock token store for testing
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockTokenStore {
    pub token: std::sync::Mutex<Option<String>>,
    pub fail: bool,
}

#[cfg(test)]
impl MockTokenStore {
    /// Create a mock store holding `token`
    pub fn with_token(token: &str) -> Self {
        Self {
            token: std::sync::Mutex::new(Some(token.to_string())),
            fail: false,
        }
    }

    /// Create a mock store whose every operation fails
    pub fn failing() -> Self {
        Self {
            token: std::sync::Mutex::new(None),
            fail: true,
        }
    }

    fn check(&self) -> Result<(), SecretError> {
        if self.fail {
            return Err(SecretError::Unavailable("mock failure".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
impl TokenStore for MockTokenStore {
    fn lookup(&self) -> Result<Option<String>, SecretError> {
        self.check()?;
        Ok(self.token.lock().unwrap().clone().and_then(usable))
    }

    fn store(&self, token: &str) -> Result<(), SecretError> {
        self.check()?;
        if token.trim().is_empty() {
            return Err(SecretError::EmptyToken);
        }
        *self.token.lock().unwrap() = Some(token.trim().to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), SecretError> {
        self.check()?;
        *self.token.lock().unwrap() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema() {
        let schema = SecretSchema::default();
        assert_eq!(schema.name, "org.gnome.hass-data.Password");
        assert_eq!(schema.attribute, "token_string");
        assert_eq!(schema.value, "user_token");
    }

    #[test]
    fn test_lookup_attributes() {
        let schema = SecretSchema::default();
        assert_eq!(
            schema.lookup_attributes(),
            HashMap::from([("token_string", "user_token")])
        );
    }

    #[test]
    fn test_store_attributes_carry_schema_name() {
        let schema = SecretSchema::default();
        assert_eq!(
            schema.store_attributes(),
            HashMap::from([
                ("token_string", "user_token"),
                ("xdg:schema", "org.gnome.hass-data.Password"),
            ])
        );
    }

    #[test]
    fn test_lookup_never_matches_on_keyring_defaults() {
        let schema = SecretSchema::default();
        let attributes = schema.lookup_attributes();
        for key in ["service", "username", "target", "application"] {
            assert!(!attributes.contains_key(key), "unexpected key {}", key);
        }
    }

    #[test]
    fn test_schema_partial_toml() {
        let schema: SecretSchema = toml::from_str(r#"value = "other""#).unwrap();
        assert_eq!(schema.name, DEFAULT_SCHEMA);
        assert_eq!(schema.attribute, DEFAULT_ATTRIBUTE);
        assert_eq!(
            schema.lookup_attributes(),
            HashMap::from([("token_string", "other")])
        );
    }

    #[test]
    fn test_mock_store_roundtrip() {
        let store = MockTokenStore::default();
        assert_eq!(store.lookup().unwrap(), None);

        store.store("  abc  ").unwrap();
        assert_eq!(store.lookup().unwrap().as_deref(), Some("abc"));

        assert!(matches!(store.store(" "), Err(SecretError::EmptyToken)));

        store.clear().unwrap();
        assert_eq!(store.lookup().unwrap(), None);
    }

    #[test]
    fn test_blank_saved_token_is_absent() {
        let store = MockTokenStore::with_token("   ");
        assert_eq!(store.lookup().unwrap(), None);
    }

    #[test]
    fn test_mock_store_failure() {
        let store = MockTokenStore::failing();
        assert!(matches!(store.lookup(), Err(SecretError::Unavailable(_))));
    }
}
