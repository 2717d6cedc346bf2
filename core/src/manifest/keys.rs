use crate::config::Config;
use crate::error::ConfigError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ring::signature::ED25519_PUBLIC_KEY_LEN;

/// Registry signing keys shipped with the client, newest first.
const BUILTIN_KEYS: &[(&str, &str)] = &[
    ("skillget-2025", "OtoxRNDer/V6VpUGpzuRCIugWjQoWU+DJqKZhGAOeR4="),
    ("skillget-2024", "a3G+7jhougZJT6FENwr3EaoP93k3AFHTys380IwDjfs="),
];

/// An Ed25519 public key. A key without an id verifies manifests signed
/// under any key id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedKey {
    pub key_id: Option<String>,
    pub public_key: Vec<u8>,
}

impl TrustedKey {
    pub fn new(key_id: impl Into<String>, public_key: impl Into<Vec<u8>>) -> Self {
        Self {
            key_id: Some(key_id.into()),
            public_key: public_key.into(),
        }
    }

    /// Parses `<key-id>:<base64>` or a bare `<base64>` key.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        let (key_id, encoded) = match raw.split_once(':') {
            Some((id, key)) => {
                let id = id.trim();
                if id.is_empty() {
                    return Err(ConfigError::InvalidTrustedKey("empty key id".to_string()));
                }
                (Some(id.to_string()), key.trim())
            }
            None => (None, raw),
        };

        let public_key = decode_public_key(encoded)?;
        Ok(Self { key_id, public_key })
    }

    fn matches(&self, key_id: &str) -> bool {
        self.key_id.as_deref().is_none_or(|id| id == key_id)
    }
}

fn decode_public_key(encoded: &str) -> Result<Vec<u8>, ConfigError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| ConfigError::InvalidTrustedKey(format!("bad base64: {e}")))?;
    if bytes.len() != ED25519_PUBLIC_KEY_LEN {
        return Err(ConfigError::InvalidTrustedKey(format!(
            "expected {} byte Ed25519 key, got {}",
            ED25519_PUBLIC_KEY_LEN,
            bytes.len()
        )));
    }
    Ok(bytes)
}

#[derive(Debug, Clone)]
pub struct TrustedKeys {
    keys: Vec<TrustedKey>,
}

impl TrustedKeys {
    pub fn new(keys: Vec<TrustedKey>) -> Self {
        Self { keys }
    }

    pub fn builtin() -> Self {
        let keys = BUILTIN_KEYS
            .iter()
            .filter_map(|(id, encoded)| match decode_public_key(encoded) {
                Ok(key) => Some(TrustedKey::new(*id, key)),
                Err(e) => {
                    tracing::error!(key_id = id, "Skipping built-in key: {}", e);
                    None
                }
            })
            .collect();
        Self { keys }
    }

    /// The operator key replaces the built-in table entirely.
    pub fn from_config(config: &Config) -> Self {
        match &config.trusted_key {
            Some(key) => Self::new(vec![key.clone()]),
            None => Self::builtin(),
        }
    }

    pub fn find(&self, key_id: &str) -> Option<&TrustedKey> {
        self.keys.iter().find(|k| k.matches(key_id))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
