//! Token: node identity carried by the orchestrator-issued JWT.
//!
//! Only the claims are read here; the orchestrator checks the signature
//! on every call.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token is not a JWT (expected three dot-separated segments)")]
    Malformed,
    #[error("Token claims are not valid base64url: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("Token claims are not valid JSON: {0}")]
    Claims(#[from] serde_json::Error),
    #[error("Token claim '{0}' is missing or empty")]
    MissingClaim(&'static str),
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeClaims {
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub iss: String,
    #[serde(default)]
    pub host: Option<String>,
}

/// Where and as whom the agent connects. Fixed for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub node_id: String,
    pub address: String,
    pub token: String,
}

pub fn decode_claims(token: &str) -> Result<NodeClaims, TokenError> {
    let mut segments = token.trim().split('.');
    let claims = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(claims), Some(_), None) => claims,
        _ => return Err(TokenError::Malformed),
    };

    let json = URL_SAFE_NO_PAD.decode(claims.trim_end_matches('='))?;
    Ok(serde_json::from_slice(&json)?)
}

impl ConnectionParams {
    /// `host` overrides the issuer as the dial target when present.
    pub fn from_token(token: &str) -> Result<Self, TokenError> {
        let claims = decode_claims(token)?;
        if claims.sub.is_empty() {
            return Err(TokenError::MissingClaim("sub"));
        }

        let address = match claims.host {
            Some(host) if !host.is_empty() => host,
            _ => claims.iss,
        };
        if address.is_empty() {
            return Err(TokenError::MissingClaim("iss"));
        }

        Ok(Self {
            node_id: claims.sub,
            address,
            token: token.trim().to_string(),
        })
    }
}
