//! HTTP client for the remote directory service.
//!
//! Wraps `reqwest::Client` with the directory's session handling and
//! principal operations.  Authentication is cookie-based: a successful
//! login stores the session cookie in the client's cookie jar, and every
//! exposed operation calls [`DirectoryClient::ensure_authenticated`] before
//! touching its endpoint.  A 401 from any endpoint invalidates the session
//! flag so the next operation logs in again.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{multipart, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use ugsync_core::UsersAndGroups;

use crate::auth::Credentials;
use crate::error::{SyncClientError, SyncClientResult};

const LOGIN_PATH: &str = "/api/v1/session/login";
const PRINCIPALS_PATH: &str = "/api/v1/principals";
const SYNC_PATH: &str = "/api/v1/principals/sync";
const USER_HEADERS_PATH: &str = "/api/v1/metadata/users";
const GROUP_HEADERS_PATH: &str = "/api/v1/metadata/groups";
const DELETE_USERS_PATH: &str = "/api/v1/users/delete";
const DELETE_GROUPS_PATH: &str = "/api/v1/groups/delete";
const UPDATE_PASSWORD_PATH: &str = "/api/v1/users/password";
const ADD_PRIVILEGE_PATH: &str = "/api/v1/groups/addprivilege";
const REMOVE_PRIVILEGE_PATH: &str = "/api/v1/groups/removeprivilege";
const TRANSFER_OWNERSHIP_PATH: &str = "/api/v1/users/transfer/ownership";

/// Name/id pair returned by the metadata listing endpoints.
#[derive(Debug, Clone, Deserialize)]
struct PrincipalHeader {
    name: String,
    id: String,
}

/// Authenticated client for one directory service instance.
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    base_url: String,
    credentials: Credentials,
    http: Client,
    /// True once a login has succeeded and no 401 has been seen since.
    authenticated: Arc<RwLock<bool>>,
}

impl DirectoryClient {
    /// Create a new client.
    ///
    /// `tls_verify = false` disables certificate validation for targets with
    /// self-signed certificates.
    pub fn new(
        base_url: String,
        credentials: Credentials,
        timeout: Duration,
        tls_verify: bool,
    ) -> SyncClientResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .danger_accept_invalid_certs(!tls_verify)
            .user_agent("ugsync/0.3")
            .build()
            .map_err(|e| {
                SyncClientError::Configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            http,
            authenticated: Arc::new(RwLock::new(false)),
        })
    }

    /// The base URL this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ── Session ───────────────────────────────────────────────────────

    /// Log in and establish a session cookie.
    pub async fn login(&self) -> SyncClientResult<()> {
        let url = format!("{}{}", self.base_url, LOGIN_PATH);
        debug!(username = %self.credentials.username(), "POST {url}");
        let response = self
            .http
            .post(&url)
            .form(&[
                ("username", self.credentials.username()),
                ("password", self.credentials.password()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            *self.authenticated.write().await = true;
            info!(username = %self.credentials.username(), "Logged in to directory service");
            Ok(())
        } else {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            Err(SyncClientError::Auth(format!(
                "login rejected (HTTP {status}): {body}"
            )))
        }
    }

    /// Log in if no valid session is known to exist.
    pub async fn ensure_authenticated(&self) -> SyncClientResult<()> {
        if *self.authenticated.read().await {
            return Ok(());
        }
        self.login().await
    }

    // ── Principal operations ─────────────────────────────────────────

    /// Fetch the service's complete current state.
    ///
    /// When `with_privileges` is set, each group is enriched with its
    /// privilege tokens via a per-group detail lookup.
    pub async fn fetch_all(&self, with_privileges: bool) -> SyncClientResult<UsersAndGroups> {
        self.ensure_authenticated().await?;
        let principals: Vec<serde_json::Value> = self.get_json(PRINCIPALS_PATH).await?;
        let mut dataset = UsersAndGroups::from_principals(&principals)?;
        info!(
            users = dataset.number_users(),
            groups = dataset.number_groups(),
            "Fetched current directory state"
        );

        if with_privileges {
            let names: Vec<String> = dataset.groups().iter().map(|g| g.name.clone()).collect();
            for name in names {
                let privileges = self.fetch_group_privileges(&name).await?;
                if let Some(group) = dataset.group_mut(&name) {
                    group.privileges = privileges;
                }
            }
        }
        Ok(dataset)
    }

    /// Fetch the privilege tokens of one group.
    pub async fn fetch_group_privileges(&self, name: &str) -> SyncClientResult<Vec<String>> {
        self.ensure_authenticated().await?;
        let headers: Vec<PrincipalHeader> = self.get_json(GROUP_HEADERS_PATH).await?;
        let id = headers
            .iter()
            .find(|h| h.name == name)
            .map(|h| h.id.clone())
            .ok_or_else(|| {
                SyncClientError::Precondition(format!(
                    "group '{name}' is not known to the directory service"
                ))
            })?;

        let detail: serde_json::Value = self.get_json(&format!("/api/v1/groups/{id}")).await?;
        let privileges = detail
            .get("privileges")
            .and_then(serde_json::Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(serde_json::Value::as_str)
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(privileges)
    }

    /// Grant a privilege to the named groups.
    pub async fn add_privilege(
        &self,
        groups: &[String],
        privilege: &str,
    ) -> SyncClientResult<()> {
        self.privilege_call(ADD_PRIVILEGE_PATH, groups, privilege)
            .await
    }

    /// Revoke a privilege from the named groups.
    pub async fn remove_privilege(
        &self,
        groups: &[String],
        privilege: &str,
    ) -> SyncClientResult<()> {
        self.privilege_call(REMOVE_PRIVILEGE_PATH, groups, privilege)
            .await
    }

    async fn privilege_call(
        &self,
        path: &str,
        groups: &[String],
        privilege: &str,
    ) -> SyncClientResult<()> {
        self.ensure_authenticated().await?;
        self.post_json_no_content(
            path,
            &serde_json::json!({
                "privilege": privilege,
                "groupNames": groups,
            }),
        )
        .await
    }

    /// Delete users by name.
    ///
    /// Names are resolved to remote ids via the metadata listing; unknown
    /// names are warned and skipped, and an empty resolved set is a no-op.
    pub async fn delete_users(&self, names: &[String]) -> SyncClientResult<()> {
        self.ensure_authenticated().await?;
        let headers: Vec<PrincipalHeader> = self.get_json(USER_HEADERS_PATH).await?;
        let ids = resolve_ids("user", &headers, names);
        if ids.is_empty() {
            warn!("No users matched the requested names, nothing to delete");
            return Ok(());
        }
        info!(count = ids.len(), "Deleting users");
        self.post_json_no_content(DELETE_USERS_PATH, &serde_json::json!({ "ids": ids }))
            .await
    }

    /// Delete groups by name, with the same resolution policy as
    /// [`DirectoryClient::delete_users`].
    pub async fn delete_groups(&self, names: &[String]) -> SyncClientResult<()> {
        self.ensure_authenticated().await?;
        let headers: Vec<PrincipalHeader> = self.get_json(GROUP_HEADERS_PATH).await?;
        let ids = resolve_ids("group", &headers, names);
        if ids.is_empty() {
            warn!("No groups matched the requested names, nothing to delete");
            return Ok(());
        }
        info!(count = ids.len(), "Deleting groups");
        self.post_json_no_content(DELETE_GROUPS_PATH, &serde_json::json!({ "ids": ids }))
            .await
    }

    /// Change a user's password.
    pub async fn update_password(
        &self,
        name: &str,
        current_password: &str,
        new_password: &str,
    ) -> SyncClientResult<()> {
        self.ensure_authenticated().await?;
        let url = format!("{}{}", self.base_url, UPDATE_PASSWORD_PATH);
        debug!(user = %name, "POST {url}");
        let response = self
            .http
            .post(&url)
            .form(&[
                ("name", name),
                ("currentpassword", current_password),
                ("password", new_password),
            ])
            .send()
            .await?;
        self.expect_no_content(response).await
    }

    /// Transfer all objects owned by one user to another.
    pub async fn transfer_ownership(&self, from: &str, to: &str) -> SyncClientResult<()> {
        self.ensure_authenticated().await?;
        let url = format!("{}{}", self.base_url, TRANSFER_OWNERSHIP_PATH);
        info!(from = %from, to = %to, "Transferring object ownership");
        let response = self
            .http
            .post(&url)
            .query(&[("fromUserName", from), ("toUserName", to)])
            .send()
            .await?;
        self.expect_no_content(response).await
    }

    /// Submit a principals snapshot for reconciliation.
    ///
    /// Multipart POST: the `principals` JSON document as a file part, the
    /// `applyChanges`/`removeDeleted` flags, and an optional shared
    /// provisioning password.  Returns the raw 200 response body; any other
    /// status is a rejection.
    pub async fn sync(
        &self,
        principals_json: &str,
        apply_changes: bool,
        remove_deleted: bool,
        password: Option<&str>,
    ) -> SyncClientResult<String> {
        self.ensure_authenticated().await?;
        let url = format!("{}{}", self.base_url, SYNC_PATH);
        debug!(
            apply_changes,
            remove_deleted,
            bytes = principals_json.len(),
            "POST {url}"
        );

        let part = multipart::Part::text(principals_json.to_string())
            .file_name("principals.json")
            .mime_str("application/json")?;
        let mut form = multipart::Form::new()
            .part("principals", part)
            .text("applyChanges", apply_changes.to_string())
            .text("removeDeleted", remove_deleted.to_string());
        if let Some(password) = password {
            form = form.text("password", password.to_string());
        }

        let response = self.http.post(&url).multipart(form).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(response.text().await?)
        } else {
            Err(self.error_for(response).await)
        }
    }

    // ── Internal HTTP helpers ─────────────────────────────────────────

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> SyncClientResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {url}");
        let response = self.http.get(&url).send().await?;
        if response.status().is_success() {
            let body = response.text().await?;
            serde_json::from_str(&body).map_err(|e| SyncClientError::Parse(format!("{path}: {e}")))
        } else {
            Err(self.error_for(response).await)
        }
    }

    async fn post_json_no_content(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> SyncClientResult<()> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {url}");
        let response = self.http.post(&url).json(body).send().await?;
        self.expect_no_content(response).await
    }

    async fn expect_no_content(&self, response: reqwest::Response) -> SyncClientResult<()> {
        let status = response.status();
        if status == StatusCode::NO_CONTENT || status.is_success() {
            Ok(())
        } else {
            Err(self.error_for(response).await)
        }
    }

    /// Convert a non-success response into the matching error.  A 401
    /// invalidates the session flag so the next call re-logs-in.
    async fn error_for(&self, response: reqwest::Response) -> SyncClientError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());
        if status == StatusCode::UNAUTHORIZED {
            *self.authenticated.write().await = false;
            SyncClientError::Auth(format!("session rejected (401): {body}"))
        } else {
            SyncClientError::RemoteRejected {
                status: status.as_u16(),
                body,
            }
        }
    }
}

/// Resolve names to remote ids against a metadata listing, warning about and
/// skipping names the service does not know.
fn resolve_ids(kind: &str, headers: &[PrincipalHeader], names: &[String]) -> Vec<String> {
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        match headers.iter().find(|h| &h.name == name) {
            Some(header) => ids.push(header.id.clone()),
            None => warn!(%kind, %name, "Name not found on the directory service, skipping"),
        }
    }
    ids
}
