use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A donation-intent request to be forwarded to the payment gateway.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub amount: f64,
    pub campaign_id: Id,
}

/// The query parameters the gateway echoes back on its redirect callbacks.
#[derive(Debug, FromForm)]
pub struct PaymentCallback {
    #[field(name = "campaignId")]
    pub campaign_id: Option<Id>,
    pub amount: Option<f64>,
}
