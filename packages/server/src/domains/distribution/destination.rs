use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A channel or platform jobs are published to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Telegram,
    WhatsApp,
    Facebook,
}

impl Destination {
    pub const ALL: [Destination; 3] = [
        Destination::Telegram,
        Destination::WhatsApp,
        Destination::Facebook,
    ];

    /// Value stored in `job_deliveries.destination`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Telegram => "telegram",
            Destination::WhatsApp => "whatsapp",
            Destination::Facebook => "facebook",
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Destination {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "telegram" => Ok(Destination::Telegram),
            "whatsapp" => Ok(Destination::WhatsApp),
            "facebook" => Ok(Destination::Facebook),
            _ => Err(anyhow::anyhow!("Invalid destination: {}", s)),
        }
    }
}
