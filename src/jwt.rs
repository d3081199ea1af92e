/// Re-export the key pair types from `jwt_simple` to ease loading
pub use jwt_simple::algorithms::{ES256KeyPair, RS256KeyPair};
use jwt_simple::prelude::*;

use crate::errors::{SnowflakeError, SnowflakeResult};

/// Key-pair JWTs are valid for at most an hour
const TOKEN_LIFETIME_MINUTES: u64 = 60;

/// A parsed private key.
///
/// EC keys are accepted when loading configuration, but Snowflake's key-pair
/// authentication only signs with RSA, so they fail once a token is requested.
#[derive(Debug)]
pub enum PrivateKey {
    Rsa(RS256KeyPair),
    Ec(ES256KeyPair),
}

impl PrivateKey {
    /// Parse a PEM encoded RSA (PKCS#1 or PKCS#8) or EC (P-256) private key
    pub fn from_pem(pem: &str) -> SnowflakeResult<PrivateKey> {
        let pem = pem.trim();
        match RS256KeyPair::from_pem(pem) {
            Ok(key_pair) => Ok(PrivateKey::Rsa(key_pair)),
            Err(rsa_error) => match ES256KeyPair::from_pem(pem) {
                Ok(key_pair) => Ok(PrivateKey::Ec(key_pair)),
                Err(_) => Err(SnowflakeError::InvalidKey(rsa_error.to_string())),
            },
        }
    }

    /// Standard base64 SHA-256 digest of the DER public key, as Snowflake shows it
    fn fingerprint(&self) -> Option<String> {
        match self {
            PrivateKey::Rsa(key_pair) => {
                Some(standard_base64(key_pair.public_key().sha256_thumbprint()))
            }
            PrivateKey::Ec(_) => None,
        }
    }
}

impl From<RS256KeyPair> for PrivateKey {
    fn from(key_pair: RS256KeyPair) -> Self {
        PrivateKey::Rsa(key_pair)
    }
}

/// Everything needed to sign a key-pair token.
///
/// The fingerprint is computed once here and the credential is never mutated afterwards.
#[derive(Debug)]
pub struct Credential {
    account: String,
    user: String,
    key: PrivateKey,
    fingerprint: Option<String>,
}

impl Credential {
    pub fn new(
        account_identifier: &str,
        user: &str,
        key: PrivateKey,
        fingerprint: Option<&str>,
    ) -> Credential {
        // If there is an account region included, remove it:
        // AAA00000.us-east-1 should become AAA00000
        let account = account_identifier
            .split('.')
            .next()
            .unwrap_or(account_identifier)
            .to_ascii_uppercase();
        let fingerprint = match fingerprint.map(str::trim).filter(|f| !f.is_empty()) {
            Some(supplied) => Some(supplied.trim_start_matches("SHA256:").to_owned()),
            None => key.fingerprint(),
        };
        Credential {
            account,
            user: user.to_ascii_uppercase(),
            key,
            fingerprint,
        }
    }

    /// `ACCOUNT.USER`
    pub fn subject(&self) -> String {
        format!("{}.{}", self.account, self.user)
    }

    /// `ACCOUNT.USER.SHA256:<fingerprint>`
    pub fn issuer(&self) -> String {
        format!(
            "{}.SHA256:{}",
            self.subject(),
            self.fingerprint.as_deref().unwrap_or_default()
        )
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    /// Sign a fresh token valid for an hour from now
    pub fn issue_token(&self) -> SnowflakeResult<String> {
        let key_pair = match &self.key {
            PrivateKey::Rsa(key_pair) => key_pair,
            PrivateKey::Ec(_) => return Err(SnowflakeError::UnsupportedKeyAlgorithm("EC")),
        };
        log::debug!("Public key fingerprint: {:?}", self.fingerprint);
        let claims = Claims::create(Duration::from_mins(TOKEN_LIFETIME_MINUTES))
            .with_issuer(self.issuer())
            .with_subject(self.subject());
        log::debug!("Claims: {:?}", claims);
        Ok(key_pair.sign(claims)?)
    }
}

/// Undo the URL-safe, unpadded base64 encoding used for JWK thumbprints
fn standard_base64(url_safe: String) -> String {
    let mut encoded = url_safe.replace('-', "+").replace('_', "/");
    while encoded.len() % 4 != 0 {
        encoded.push('=');
    }
    encoded
}
