use anyhow::Context;

/// Where we store secrets in the OS keyring.
///
/// Constant so upgrades don't orphan secrets.
const SERVICE: &str = "voiceledger";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKey {
    NluApiKey,
    ElevenLabsApiKey,
}

impl SecretKey {
    fn user(self) -> &'static str {
        match self {
            SecretKey::NluApiKey => "nlu_api_key",
            SecretKey::ElevenLabsApiKey => "elevenlabs_api_key",
        }
    }

    /// Environment variable that overrides the keyring entry.
    pub fn env_var(self) -> &'static str {
        match self {
            SecretKey::NluApiKey => "VOICELEDGER_NLU_API_KEY",
            SecretKey::ElevenLabsApiKey => "VOICELEDGER_ELEVENLABS_API_KEY",
        }
    }
}

pub fn set_secret(key: SecretKey, value: &str) -> anyhow::Result<()> {
    let entry = keyring::Entry::new(SERVICE, key.user()).context("create keyring entry")?;
    entry.set_password(value).context("set secret")
}

pub fn get_secret(key: SecretKey) -> anyhow::Result<Option<String>> {
    let entry = keyring::Entry::new(SERVICE, key.user()).context("create keyring entry")?;

    match entry.get_password() {
        Ok(v) => Ok(Some(v)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(anyhow::Error::new(e)).context("get secret"),
    }
}

pub fn delete_secret(key: SecretKey) -> anyhow::Result<()> {
    let entry = keyring::Entry::new(SERVICE, key.user()).context("create keyring entry")?;
    match entry.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(anyhow::Error::new(e)).context("delete secret"),
    }
}

/// Environment first, then the keyring. A keyring that cannot be reached counts as empty.
pub fn lookup_secret(key: SecretKey) -> Option<String> {
    let from_env = std::env::var(key.env_var())
        .ok()
        .filter(|v| !v.trim().is_empty());
    if from_env.is_some() {
        return from_env;
    }

    match get_secret(key) {
        Ok(v) => v.filter(|v| !v.trim().is_empty()),
        Err(e) => {
            log::warn!("keyring lookup for {} failed: {e:#}", key.user());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_have_distinct_names() {
        // Don't touch the developer's real keyring in tests.
        assert_eq!(SecretKey::ElevenLabsApiKey.user(), "elevenlabs_api_key");
        assert_ne!(SecretKey::NluApiKey.user(), SecretKey::ElevenLabsApiKey.user());
        assert_ne!(
            SecretKey::NluApiKey.env_var(),
            SecretKey::ElevenLabsApiKey.env_var()
        );
    }
}
