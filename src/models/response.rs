use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A rider's reaction to a surfaced ride request. `Declined` and
/// `Timeout` are terminal for the (request, rider) pair: the request is
/// never offered to that rider again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OfferReply {
    Shown,
    Accepted,
    Declined,
    Timeout,
}

impl OfferReply {
    /// The pair is closed; the request must not resurface for this rider.
    pub fn suppresses(&self) -> bool {
        matches!(self, OfferReply::Declined | OfferReply::Timeout)
    }
}

/// One row per (request, rider), created the first time the request
/// appears in that rider's poll result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferRecord {
    pub request_id: Uuid,
    pub rider_id: Uuid,
    pub reply: OfferReply,
    pub shown_at: DateTime<Utc>,
    pub replied_at: Option<DateTime<Utc>>,
}

impl OfferRecord {
    pub fn shown(request_id: Uuid, rider_id: Uuid) -> Self {
        Self {
            request_id,
            rider_id,
            reply: OfferReply::Shown,
            shown_at: Utc::now(),
            replied_at: None,
        }
    }
}
