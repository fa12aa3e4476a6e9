//! Signed, expiring bearer tokens.
//!
//! Tokens are compact HS256 JWS values carrying a single `key` claim:
//!
//! ```text
//! base64url({"alg":"HS256","typ":"JWT"}) . base64url({"key":..,"iat":..,"exp":..}) . base64url(sig)
//! signature = HMAC-SHA256(secret, "{header}.{claims}")
//! ```
//!
//! # Security Properties
//!
//! - **Fixed lifetime**: every token expires exactly [`TOKEN_TTL`] after issuance
//! - **Typed claims**: the payload must deserialize into [`Claims`]; missing or
//!   mistyped fields are rejected
//! - **Constant-time comparison**: signatures are compared with `subtle`
//!
//! # Example
//!
//! ```rust
//! use image_filter_server::signer::Signer;
//!
//! let signer = Signer::new("my-secret-key");
//! let token = signer.issue("abc").unwrap();
//!
//! let context = signer.verify(token.as_str()).unwrap();
//! assert_eq!(context.key, "abc");
//! ```

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::server::auth::AuthError;

/// HMAC-SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

/// Lifetime of an issued token (24 hours).
pub const TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

const ALGORITHM: &str = "HS256";

// =============================================================================
// Types
// =============================================================================

/// Claims embedded in a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Caller-supplied key
    pub key: String,

    /// Issued-at, Unix epoch seconds
    pub iat: u64,

    /// Expiry, Unix epoch seconds
    pub exp: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default)]
    typ: Option<String>,
}

/// A signed token as handed to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for an `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity extracted from a verified token. Lives for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub key: String,
}

/// Why a token was rejected. Only used for logging; clients see
/// [`AuthError::TokenInvalidOrExpired`] for all of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRejection {
    /// Wrong number of segments, bad base64, bad JSON or missing claims
    Malformed,

    /// Header names an algorithm other than HS256
    UnsupportedAlgorithm(String),

    /// Signature does not match
    InvalidSignature,

    /// Token is past its expiry
    Expired {
        /// When the token expired
        expired_at: u64,
        /// Current time
        current_time: u64,
    },
}

impl fmt::Display for TokenRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenRejection::Malformed => write!(f, "malformed token"),
            TokenRejection::UnsupportedAlgorithm(alg) => {
                write!(f, "unsupported algorithm {}", alg)
            }
            TokenRejection::InvalidSignature => write!(f, "invalid signature"),
            TokenRejection::Expired {
                expired_at,
                current_time,
            } => write!(
                f,
                "token expired at {} (current time: {})",
                expired_at, current_time
            ),
        }
    }
}

// =============================================================================
// Signer
// =============================================================================

/// Issues and verifies tokens with a process-wide secret.
#[derive(Clone)]
pub struct Signer {
    secret_key: Vec<u8>,
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl Signer {
    /// Create a signer with the given secret.
    pub fn new(secret_key: impl AsRef<[u8]>) -> Self {
        Self {
            secret_key: secret_key.as_ref().to_vec(),
        }
    }

    /// Issue a token for `key`, valid for [`TOKEN_TTL`] from now.
    pub fn issue(&self, key: &str) -> Result<Token, AuthError> {
        self.issue_at(key, unix_now())
    }

    /// Issue a token as if the current time were `now` (Unix seconds).
    pub fn issue_at(&self, key: &str, now: u64) -> Result<Token, AuthError> {
        if key.is_empty() {
            return Err(AuthError::MissingCredential);
        }

        let claims = Claims {
            key: key.to_string(),
            iat: now,
            exp: now.saturating_add(TOKEN_TTL.as_secs()),
        };

        Ok(self.sign_claims(&claims))
    }

    /// Verify a token against the current time.
    pub fn verify(&self, token: &str) -> Result<AuthContext, AuthError> {
        self.verify_at(token, unix_now())
    }

    /// Verify a token as if the current time were `now` (Unix seconds).
    pub fn verify_at(&self, token: &str, now: u64) -> Result<AuthContext, AuthError> {
        let claims = self
            .decode(token, now)
            .map_err(AuthError::TokenInvalidOrExpired)?;
        Ok(AuthContext { key: claims.key })
    }

    fn decode(&self, token: &str, now: u64) -> Result<Claims, TokenRejection> {
        let mut segments = token.split('.');
        let (header_b64, claims_b64, sig_b64) =
            match (segments.next(), segments.next(), segments.next(), segments.next()) {
                (Some(h), Some(c), Some(s), None) => (h, c, s),
                _ => return Err(TokenRejection::Malformed),
            };

        let header: Header = decode_json(header_b64)?;
        if header.alg != ALGORITHM {
            return Err(TokenRejection::UnsupportedAlgorithm(header.alg));
        }

        let provided_sig = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| TokenRejection::Malformed)?;
        let expected_sig = self.compute_signature(header_b64, claims_b64);

        if !bool::from(provided_sig.ct_eq(&expected_sig)) {
            return Err(TokenRejection::InvalidSignature);
        }

        // Only look at the payload once the signature is known to be ours
        let claims: Claims = decode_json(claims_b64)?;
        if claims.key.is_empty() {
            return Err(TokenRejection::Malformed);
        }

        if now >= claims.exp {
            return Err(TokenRejection::Expired {
                expired_at: claims.exp,
                current_time: now,
            });
        }

        Ok(claims)
    }

    fn sign_claims(&self, claims: &Claims) -> Token {
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: Some("JWT".to_string()),
        };
        let header_b64 = encode_json(&header);
        let claims_b64 = encode_json(claims);
        let signature = self.compute_signature(&header_b64, &claims_b64);

        Token(format!(
            "{}.{}.{}",
            header_b64,
            claims_b64,
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    fn compute_signature(&self, header_b64: &str, claims_b64: &str) -> Vec<u8> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret_key).expect("HMAC can take key of any size");
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(claims_b64.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

fn encode_json<T: Serialize>(value: &T) -> String {
    // Serializing these plain structs cannot fail
    let json = serde_json::to_vec(value).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

fn decode_json<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, TokenRejection> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenRejection::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenRejection::Malformed)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

// =============================================================================
// Tests
// =============================================================================
