//! Response bodies returned by the vote server.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reply to `/submit`. Only decoded to confirm the body is JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub message: Option<String>,
}

/// Reply to `/requeststop`. Only decoded to confirm the body is JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopRequestResponse {
    #[serde(default)]
    pub stoprequests: Option<Vec<VoterId>>,
}

/// Identifier of a player that has voted to skip.
///
/// The server records session player ids (integers), but names are accepted too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VoterId {
    Id(i64),
    Name(String),
}

/// Per-card refresh flags.
///
/// The server sends an array indexed by card number; an object keyed by the
/// decimal card number is accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RefreshFlags {
    Slots(Vec<bool>),
    ByCard(BTreeMap<String, bool>),
}

impl Default for RefreshFlags {
    fn default() -> Self {
        RefreshFlags::Slots(Vec::new())
    }
}

impl RefreshFlags {
    /// Whether the flag for `card` is set. Unknown cards read as unset.
    pub fn is_set(&self, card: u32) -> bool {
        match self {
            RefreshFlags::Slots(slots) => slots.get(card as usize).copied().unwrap_or(false),
            RefreshFlags::ByCard(cards) => cards.get(&card.to_string()).copied().unwrap_or(false),
        }
    }
}

/// Vote threshold as the server echoes it.
///
/// The operator console forwards its argument verbatim, so the threshold
/// arrives as a number or as a numeric string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Threshold {
    Count(u32),
    Text(String),
}

impl Threshold {
    /// Unparseable text reads as 0.
    pub fn count(&self) -> u32 {
        match self {
            Threshold::Count(n) => *n,
            Threshold::Text(text) => text.trim().parse().unwrap_or(0),
        }
    }
}

/// Reply to `/stopdata`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopStateResponse {
    /// Null until the game operator configures a threshold
    #[serde(default)]
    pub votes_required: Option<Threshold>,
    #[serde(default)]
    pub stoprequests: Vec<VoterId>,
    #[serde(default)]
    pub refresh_screen: RefreshFlags,
}

impl StopStateResponse {
    /// Threshold of stop votes; 0 means skipping is disabled.
    pub fn votes_required(&self) -> u32 {
        self.votes_required.as_ref().map_or(0, Threshold::count)
    }

    pub fn votes_received(&self) -> usize {
        self.stoprequests.len()
    }
}
