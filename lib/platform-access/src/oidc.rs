//! Google sign-in configuration.
//!
//! Google is the only identity provider. The server uses this to run the
//! OpenID Connect authorization-code flow and hands the resulting identity
//! to the account linker.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Configuration for Google OpenID Connect.
///
/// Fields with defaults can be omitted when loading from environment variables.
#[derive(Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    /// The OAuth2 client ID from the Google Cloud console.
    client_id: String,
    /// The OAuth2 client secret.
    client_secret: String,
    /// The redirect URI for the callback (e.g., "https://lms.example.sch.id/auth/callback").
    redirect_uri: String,
    /// Issuer URL used for discovery.
    /// Default: "https://accounts.google.com"
    #[serde(default = "default_issuer_url")]
    issuer_url: String,
    /// OAuth2 scopes to request as a comma-separated string.
    /// Default: "openid,email,profile"
    #[serde(default = "default_scopes")]
    scopes: String,
    /// Value of Google's `access_type` authorization parameter.
    /// Default: "offline"
    #[serde(default = "default_access_type")]
    access_type: String,
    /// Value of the `prompt` authorization parameter.
    /// Default: "consent"
    #[serde(default = "default_prompt")]
    prompt: String,
    /// Attach a Google account to an existing user with the same email.
    /// Default: true
    #[serde(default = "default_allow_email_account_linking")]
    allow_email_account_linking: bool,
}

fn default_issuer_url() -> String {
    "https://accounts.google.com".to_string()
}

fn default_scopes() -> String {
    "openid,email,profile".to_string()
}

fn default_access_type() -> String {
    "offline".to_string()
}

fn default_prompt() -> String {
    "consent".to_string()
}

fn default_allow_email_account_linking() -> bool {
    true
}

impl GoogleConfig {
    /// Creates a configuration with defaults for optional fields.
    #[must_use]
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        GoogleConfigBuilder::new(client_id, client_secret, redirect_uri).build()
    }

    /// Creates a configuration builder for more customization.
    #[must_use]
    pub fn builder(
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> GoogleConfigBuilder {
        GoogleConfigBuilder::new(client_id, client_secret, redirect_uri)
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    #[must_use]
    pub fn issuer_url(&self) -> &str {
        &self.issuer_url
    }

    /// Returns the scopes to request, parsed from the comma-separated string.
    #[must_use]
    pub fn scopes(&self) -> Vec<&str> {
        self.scopes
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Extra authorization request parameters.
    #[must_use]
    pub fn auth_params(&self) -> [(&str, &str); 2] {
        [
            ("access_type", self.access_type.as_str()),
            ("prompt", self.prompt.as_str()),
        ]
    }

    #[must_use]
    pub fn allow_email_account_linking(&self) -> bool {
        self.allow_email_account_linking
    }
}

impl fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("issuer_url", &self.issuer_url)
            .field("scopes", &self.scopes)
            .field("access_type", &self.access_type)
            .field("prompt", &self.prompt)
            .field(
                "allow_email_account_linking",
                &self.allow_email_account_linking,
            )
            .finish_non_exhaustive()
    }
}

/// Builder for `GoogleConfig`.
#[derive(Debug)]
pub struct GoogleConfigBuilder {
    config: GoogleConfig,
    scopes: Vec<String>,
}

impl GoogleConfigBuilder {
    /// Creates a new builder with required fields.
    #[must_use]
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            config: GoogleConfig {
                client_id,
                client_secret,
                redirect_uri,
                issuer_url: default_issuer_url(),
                scopes: String::new(),
                access_type: default_access_type(),
                prompt: default_prompt(),
                allow_email_account_linking: default_allow_email_account_linking(),
            },
            scopes: default_scopes().split(',').map(str::to_string).collect(),
        }
    }

    /// Points discovery at another issuer, e.g. a local test provider.
    #[must_use]
    pub fn issuer_url(mut self, issuer_url: String) -> Self {
        self.config.issuer_url = issuer_url;
        self
    }

    /// Adds a scope to request.
    #[must_use]
    pub fn add_scope(mut self, scope: String) -> Self {
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
        self
    }

    #[must_use]
    pub fn prompt(mut self, prompt: String) -> Self {
        self.config.prompt = prompt;
        self
    }

    #[must_use]
    pub fn allow_email_account_linking(mut self, allow: bool) -> Self {
        self.config.allow_email_account_linking = allow;
        self
    }

    #[must_use]
    pub fn build(mut self) -> GoogleConfig {
        self.config.scopes = self.scopes.join(",");
        self.config
    }
}
