//! Bug triage account flows
//!
//! Login produces a [`Session`]; the client does not attach it on its own.
//! Hand it to [`set_session`](TriageClient::set_session) (and optionally
//! [`Session::save`] it).
//!
//! # Account methods
//!
//! - [login](TriageClient::login) - exchange username and password for a session
//! - [register](TriageClient::register) - create a user and its company
//! - [reset_password](TriageClient::reset_password) - set a new password
//! - [delete_account](TriageClient::delete_account) - remove a user
//! - [logout](TriageClient::logout) - discard the in-memory session
//!

use reqwest::Method;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use tracing::{debug, info};

use crate::{
    Result,
    config::{LOGIN_PATH, RESET_PASSWORD_PATH, USERS_PATH},
    prelude::*,
};

#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct NewUser<'a> {
    username: &'a str,
    password: &'a str,
    role: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    req: NewUser<'a>,
    company_name: &'a str,
}

/// Response from [`register`](TriageClient::register)
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Registration {
    #[serde(default)]
    pub message: String,
    /// Company created for the new user
    pub company_id: Option<i64>,
}

#[derive(Deserialize)]
struct MessageResponse {
    #[serde(default)]
    #[allow(dead_code)]
    message: String,
}

fn check_credentials(username: &str, password: &str) -> Result<()> {
    ensure!(
        !username.trim().is_empty(),
        ValidationSnafu {
            message: "username is required"
        }
    );
    ensure!(
        !password.is_empty(),
        ValidationSnafu {
            message: "password is required"
        }
    );
    Ok(())
}

impl TriageClient {
    /// Logs in and returns the session for the user.
    ///
    /// Rejected credentials are reported as [`TriageError::Auth`].
    ///
    /// # Example
    /// ```rust,no_run
    /// use bugtriage::prelude::*;
    /// # async fn example(client: &TriageClient) -> Result<(), TriageError> {
    /// let session = client.login("alice", "secret").await?;
    /// client.set_session(session);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        check_credentials(username, password)?;
        debug!(user = username, "login");
        let session: Session = self
            .client
            .post_unauthenticated(
                Method::POST,
                LOGIN_PATH,
                &Credentials { username, password },
            )
            .await?;
        info!(user=%session.username, company_id=session.company_id, "logged in");
        Ok(session)
    }

    /// Creates an admin user together with a new company.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        company_name: &str,
    ) -> Result<Registration> {
        check_credentials(username, password)?;
        ensure!(
            !company_name.trim().is_empty(),
            ValidationSnafu {
                message: "company name is required"
            }
        );
        let request = RegisterRequest {
            req: NewUser {
                username,
                password,
                role: "admin",
            },
            company_name,
        };
        self.client
            .post_unauthenticated(Method::POST, USERS_PATH, &request)
            .await
    }

    /// Sets a new password for the user.
    pub async fn reset_password(&self, username: &str, new_password: &str) -> Result<()> {
        check_credentials(username, new_password)?;
        let _: MessageResponse = self
            .client
            .post_unauthenticated(
                Method::POST,
                RESET_PASSWORD_PATH,
                &Credentials {
                    username,
                    password: new_password,
                },
            )
            .await?;
        Ok(())
    }

    /// Deletes the user account. If the deleted user is the current session user,
    /// the session is cleared.
    pub async fn delete_account(&self, username: &str, password: &str) -> Result<()> {
        check_credentials(username, password)?;
        let _: MessageResponse = self
            .client
            .post_unauthenticated(
                Method::DELETE,
                USERS_PATH,
                &Credentials { username, password },
            )
            .await?;
        if self
            .session()
            .is_some_and(|session| session.username == username)
        {
            self.clear_session();
        }
        info!(user = username, "account deleted");
        Ok(())
    }

    /// Discards the in-memory session. Saved session files are the caller's concern.
    pub fn logout(&self) {
        self.clear_session();
    }
}
