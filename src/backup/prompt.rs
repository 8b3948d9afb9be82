use crate::backup::redacted::RedactedString;
use crate::backup::result_error::result::Result;
use dialoguer::Password;
use std::collections::HashMap;

/// Where passphrases for encrypted targets come from.
pub trait PassphraseSource {
    /// `None` when no passphrase is available for the target.
    fn passphrase_for(&self, target_name: &str) -> Result<Option<RedactedString>>;
}

/// Asks on the terminal without echo, twice, until both entries match.
#[derive(Clone, Copy, Debug, Default)]
pub struct InteractivePrompt;

impl PassphraseSource for InteractivePrompt {
    fn passphrase_for(&self, target_name: &str) -> Result<Option<RedactedString>> {
        let passphrase = Password::new()
            .with_prompt(format!("Passphrase for target {target_name:?}"))
            .with_confirmation(
                format!("Confirm passphrase for target {target_name:?}"),
                "Passphrases don't match",
            )
            .allow_empty_password(true)
            .interact()?;
        Ok(Some(RedactedString::from(passphrase)))
    }
}

/// Fixed passphrases by target name, for non-interactive callers.
#[derive(Clone, Debug, Default)]
pub struct StaticPassphrases {
    passphrases: HashMap<String, RedactedString>,
}

impl<K: Into<String>, V: Into<RedactedString>> FromIterator<(K, V)> for StaticPassphrases {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            passphrases: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl PassphraseSource for StaticPassphrases {
    fn passphrase_for(&self, target_name: &str) -> Result<Option<RedactedString>> {
        Ok(self.passphrases.get(target_name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_passphrases() {
        let source: StaticPassphrases = [("home", "pw1")].into_iter().collect();
        let home = source.passphrase_for("home").unwrap().unwrap();
        assert_eq!(home.inner(), "pw1");
        assert!(source.passphrase_for("other").unwrap().is_none());
    }
}
