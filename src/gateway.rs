use chrono::Utc;
use data_encoding::BASE64;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use rocket::serde::json::{serde_json, Value};

use crate::{
    config::PaymentConfig,
    error::{Error, Result},
    model::mongodb::Id,
    Config,
};

/// Client for the PayMaya pay-by-wallet API. Donation intents are forwarded
/// with Basic auth built from the two configured keys; gateway failures are
/// passed back to the caller verbatim.
pub struct PaymentClient {
    http: reqwest::Client,
    payment_url: String,
    public_key: Option<String>,
    secret_key: Option<String>,
    sub_merchant_id: Option<String>,
}

impl PaymentClient {
    pub fn new(config: PaymentConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            payment_url: config.payment_url,
            public_key: config.paymaya_public_key,
            secret_key: config.paymaya_secret_key,
            sub_merchant_id: config.paymaya_smi,
        }
    }

    /// The Basic-auth credential: base64 of `public:secret`.
    fn credentials(&self) -> Result<String> {
        match (&self.public_key, &self.secret_key) {
            (Some(public_key), Some(secret_key)) => {
                Ok(BASE64.encode(format!("{public_key}:{secret_key}").as_bytes()))
            }
            _ => Err(Error::Configuration(
                "Payment gateway credentials are not set".to_string(),
            )),
        }
    }

    /// Create a payment for the given donation amount and campaign, returning
    /// the gateway's response (which carries the checkout redirect URL).
    ///
    /// The amount is converted to centavos; non-positive or non-finite values
    /// fall back to the gateway's one-peso minimum.
    pub async fn create_payment(
        &self,
        amount: f64,
        campaign_id: Id,
        config: &Config,
    ) -> Result<Value> {
        let auth = self.credentials()?;
        let minor_units = if amount.is_finite() && amount > 0.0 {
            (amount * 100.0).round()
        } else {
            100.0
        };

        let base_url = config.base_url();
        let mut metadata = serde_json::json!({
            "campaignId": campaign_id.to_string(),
            "donationAmount": amount,
            "source": "DonationPlatform",
        });
        if let Some(smi) = &self.sub_merchant_id {
            metadata["pf"] = serde_json::json!({ "smi": smi });
        }

        let body = serde_json::json!({
            "totalAmount": {
                "currency": "PHP",
                "value": minor_units,
            },
            "redirectUrl": {
                "success": format!(
                    "{base_url}/paymaya/payment-success?campaignId={campaign_id}&amount={amount}"
                ),
                "failure": format!("{base_url}/paymaya/payment-failure?campaignId={campaign_id}"),
                "cancel": format!("{base_url}/paymaya/payment-cancel?campaignId={campaign_id}"),
            },
            "requestReferenceNumber": Utc::now().timestamp_millis().to_string(),
            "metadata": metadata,
        });

        let response = self
            .http
            .post(&self.payment_url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, format!("Basic {auth}"))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(Error::Upstream {
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(serde_json::from_str(&text).unwrap_or_else(|_| serde_json::json!({ "raw": text })))
    }
}
