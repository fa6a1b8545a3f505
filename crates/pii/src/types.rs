use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiCategory {
    Email,
    Phone,
    Ip,
    UserId,
    /// Coarse bucket for fixed-format national identifiers.
    Other,
}

impl PiiCategory {
    pub const ALL: [PiiCategory; 5] = [
        PiiCategory::Email,
        PiiCategory::Phone,
        PiiCategory::Ip,
        PiiCategory::UserId,
        PiiCategory::Other,
    ];

    /// Label used inside tokens, e.g. `EMAIL` in `[EMAIL_…]`.
    pub fn label(&self) -> &'static str {
        match self {
            PiiCategory::Email => "EMAIL",
            PiiCategory::Phone => "PHONE",
            PiiCategory::Ip => "IP",
            PiiCategory::UserId => "USER_ID",
            PiiCategory::Other => "OTHER",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

impl fmt::Display for PiiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizedEntry {
    pub original: String,
    pub token: String,
    pub category: PiiCategory,
}
