//! Game accounts and account-file loading

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;
use crate::region::AccountFamily;

/// Account that authenticates with a numeric user id and a credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectAccount {
    pub user_id: i64,
    pub credential: String,
    #[serde(default)]
    pub device_id: Option<String>,
}

/// Account that authenticates with an access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAccount {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    /// Zero until the first login resolves it
    #[serde(rename = "userID", default)]
    pub user_id: i64,
    #[serde(rename = "deviceId", default)]
    pub device_id: Option<String>,
}

/// One game account. Serializes to the exact login payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Account {
    Direct(DirectAccount),
    Token(TokenAccount),
}

impl Account {
    /// Parse one account object of the given family
    pub fn from_value(value: Value, family: AccountFamily) -> Result<Self> {
        Ok(match family {
            AccountFamily::Direct => Self::Direct(serde_json::from_value(value)?),
            AccountFamily::Token => Self::Token(serde_json::from_value(value)?),
        })
    }

    pub const fn family(&self) -> AccountFamily {
        match self {
            Self::Direct(_) => AccountFamily::Direct,
            Self::Token(_) => AccountFamily::Token,
        }
    }

    /// Known numeric user id, if any
    pub const fn user_id(&self) -> Option<i64> {
        match self {
            Self::Direct(a) => Some(a.user_id),
            Self::Token(a) if a.user_id != 0 => Some(a.user_id),
            Self::Token(_) => None,
        }
    }
}

/// Load every account under `dir`.
///
/// The directory is walked recursively for `*.json` files; each holds one
/// account object or an array of them. Unreadable or malformed files are
/// logged and skipped.
pub async fn load_accounts(dir: &Path, family: AccountFamily) -> Result<Vec<Account>> {
    let mut accounts = Vec::new();
    let mut pending: Vec<PathBuf> = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
                continue;
            }
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }

            match read_account_file(&path, family).await {
                Ok(mut found) => {
                    debug!("Loaded {} account(s) from {}", found.len(), path.display());
                    accounts.append(&mut found);
                }
                Err(e) => warn!("Skipping account file {}: {}", path.display(), e),
            }
        }
    }

    Ok(accounts)
}

async fn read_account_file(path: &Path, family: AccountFamily) -> Result<Vec<Account>> {
    let raw = tokio::fs::read(path).await?;
    match serde_json::from_slice::<Value>(&raw)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| Account::from_value(item, family))
            .collect(),
        value @ Value::Object(_) => Ok(vec![Account::from_value(value, family)?]),
        other => Err(<serde_json::Error as serde::de::Error>::custom(format!(
            "expected an account object or array, found {other}"
        ))
        .into()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_direct_payload_shape() {
        let account = Account::Direct(DirectAccount {
            user_id: 42,
            credential: "cred".to_string(),
            device_id: None,
        });
        assert_eq!(
            serde_json::to_value(&account).unwrap(),
            json!({"userId": 42, "credential": "cred", "deviceId": null})
        );
        assert_eq!(account.user_id(), Some(42));
    }

    #[test]
    fn test_token_payload_shape() {
        let account =
            Account::from_value(json!({"accessToken": "tok"}), AccountFamily::Token).unwrap();
        assert_eq!(
            serde_json::to_value(&account).unwrap(),
            json!({"accessToken": "tok", "userID": 0, "deviceId": null})
        );
        assert_eq!(account.user_id(), None);
        assert_eq!(account.family(), AccountFamily::Token);
    }

    #[test]
    fn test_family_mismatch_is_error() {
        assert!(Account::from_value(json!({"accessToken": "tok"}), AccountFamily::Direct).is_err());
    }

    #[tokio::test]
    async fn test_load_accounts_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();

        std::fs::write(
            dir.path().join("one.json"),
            r#"{"userId": 1, "credential": "a"}"#,
        )
        .unwrap();
        std::fs::write(
            nested.join("many.json"),
            r#"[{"userId": 2, "credential": "b"}, {"userId": 3, "credential": "c", "deviceId": "d"}]"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut ids: Vec<i64> = load_accounts(dir.path(), AccountFamily::Direct)
            .await
            .unwrap()
            .iter()
            .filter_map(Account::user_id)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_load_accounts_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(
            load_accounts(&dir.path().join("absent"), AccountFamily::Token)
                .await
                .is_err()
        );
    }
}
