//! Google sign-in via the openidconnect crate.

use async_trait::async_trait;
use openidconnect::core::{CoreAuthenticationFlow, CoreClient, CoreProviderMetadata};
use openidconnect::{
    AuthorizationCode, ClientId, ClientSecret, CsrfToken, IssuerUrl, Nonce, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, Scope, TokenResponse,
};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use tkj_learning_platform_access::{GOOGLE_PROVIDER, GoogleConfig, VerifiedIdentity};

use crate::error::OidcError;

/// Data needed to complete the callback, kept in the auth-state cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthState {
    pub csrf_token: String,
    pub pkce_verifier: String,
    pub nonce: String,
}

/// The external identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider name stored with linked accounts.
    fn provider(&self) -> &str;

    /// Generates the authorization URL for redirecting the user.
    fn authorization_url(&self) -> (String, AuthState);

    /// Exchanges the authorization code for a verified identity.
    async fn exchange_code(
        &self,
        code: &str,
        state: &AuthState,
    ) -> Result<VerifiedIdentity, Report<OidcError>>;
}

/// OIDC client for Google accounts.
pub struct GoogleClient {
    provider_metadata: CoreProviderMetadata,
    client_id: ClientId,
    client_secret: ClientSecret,
    redirect_url: RedirectUrl,
    http_client: reqwest::Client,
    config: GoogleConfig,
}

impl GoogleClient {
    /// Creates a client by discovering the provider metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured URLs are invalid or discovery fails.
    pub async fn discover(config: GoogleConfig) -> Result<Self, Report<OidcError>> {
        let issuer_url = IssuerUrl::new(config.issuer_url().to_string())
            .map_err(|e| OidcError::Configuration(format!("invalid issuer URL: {e}")))?;

        let http_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| OidcError::Configuration(format!("failed to create HTTP client: {e}")))?;

        let provider_metadata = CoreProviderMetadata::discover_async(issuer_url, &http_client)
            .await
            .map_err(|e| OidcError::Discovery(format!("failed to discover provider: {e}")))?;

        let redirect_url = RedirectUrl::new(config.redirect_uri().to_string())
            .map_err(|e| OidcError::Configuration(format!("invalid redirect URI: {e}")))?;

        Ok(Self {
            provider_metadata,
            client_id: ClientId::new(config.client_id().to_string()),
            client_secret: ClientSecret::new(config.client_secret().to_string()),
            redirect_url,
            http_client,
            config,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &GoogleConfig {
        &self.config
    }
}

#[async_trait]
impl IdentityProvider for GoogleClient {
    fn provider(&self) -> &str {
        GOOGLE_PROVIDER
    }

    fn authorization_url(&self) -> (String, AuthState) {
        let client = CoreClient::from_provider_metadata(
            self.provider_metadata.clone(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
        .set_redirect_uri(self.redirect_url.clone());

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut auth_request = client
            .authorize_url(
                CoreAuthenticationFlow::AuthorizationCode,
                CsrfToken::new_random,
                Nonce::new_random,
            )
            .set_pkce_challenge(pkce_challenge);

        for scope in self.config.scopes() {
            auth_request = auth_request.add_scope(Scope::new(scope.to_string()));
        }
        for (name, value) in self.config.auth_params() {
            auth_request = auth_request.add_extra_param(name, value);
        }

        let (auth_url, csrf_token, nonce) = auth_request.url();

        let state = AuthState {
            csrf_token: csrf_token.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
            nonce: nonce.secret().clone(),
        };

        (auth_url.to_string(), state)
    }

    async fn exchange_code(
        &self,
        code: &str,
        state: &AuthState,
    ) -> Result<VerifiedIdentity, Report<OidcError>> {
        let client = CoreClient::from_provider_metadata(
            self.provider_metadata.clone(),
            self.client_id.clone(),
            Some(self.client_secret.clone()),
        )
        .set_redirect_uri(self.redirect_url.clone());

        let token_request = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .map_err(|e| OidcError::TokenExchange(format!("token endpoint error: {e}")))?;

        let token_response = token_request
            .set_pkce_verifier(PkceCodeVerifier::new(state.pkce_verifier.clone()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| OidcError::TokenExchange(format!("token exchange failed: {e}")))?;

        let id_token = token_response
            .id_token()
            .ok_or_else(|| OidcError::TokenExchange("no ID token in response".to_string()))?;

        let nonce = Nonce::new(state.nonce.clone());
        let claims = id_token
            .claims(&client.id_token_verifier(), &nonce)
            .map_err(|e| OidcError::TokenValidation(format!("ID token validation failed: {e}")))?;

        let email = claims.email().map(|e| e.as_str().to_string());
        let name = claims
            .name()
            .and_then(|n| n.get(None))
            .map(|n| n.as_str().to_string());
        let picture = claims
            .picture()
            .and_then(|p| p.get(None))
            .map(|p| p.as_str().to_string());

        Ok(
            VerifiedIdentity::new(GOOGLE_PROVIDER, claims.subject().as_str())
                .with_email(email, claims.email_verified().unwrap_or(false))
                .with_name(name)
                .with_image(picture),
        )
    }
}
