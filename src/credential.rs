//! Bearer credential persisted between runs.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Serialize};

/// A bearer token and its validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token sent with API requests.
    pub token: String,
    /// When the token was issued.
    pub issued_at: DateTime<Utc>,
    /// When the token stops being accepted.
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Default location: `~/.hiveforge/credential.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".hiveforge").join("credential.json"))
    }

    /// True once more than two-thirds of the validity window has passed.
    pub fn refresh_due(&self, now: DateTime<Utc>) -> bool {
        let lifetime = self.expires_at - self.issued_at;
        let elapsed = now - self.issued_at;
        elapsed * 3 > lifetime * 2
    }

    /// Check if the token is no longer valid.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Read a credential file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read credential {}", path.display()))?;
        serde_json::from_str(&data)
            .wrap_err_with(|| format!("Failed to parse credential {}", path.display()))
    }

    /// Write the credential, creating the parent directory if needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)
            .wrap_err_with(|| format!("Failed to write credential {}", path.display()))
    }
}
