//! Session credentials for the directory service.

use std::fmt;

/// Username/password pair used for session login.
///
/// The password is never exposed through `Debug`; it only leaves this type
/// via [`Credentials::password`], which the login call consumes.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create a new credential pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The login username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The login password.
    #[must_use]
    pub(crate) fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}
