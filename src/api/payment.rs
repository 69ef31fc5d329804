use mongodb::bson::doc;
use rocket::{
    response::Redirect,
    serde::json::{Json, Value},
    Route, State,
};

use crate::{
    error::{Error, Result},
    gateway::PaymentClient,
    model::{
        api::payment::{PaymentCallback, PaymentRequest},
        db::campaign::Campaign,
        mongodb::Coll,
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![create_payment, payment_success, payment_failure, payment_cancel]
}

/// Forward a donation intent to the gateway and hand its response (carrying
/// the checkout redirect URL) straight back to the SPA.
#[post("/paymaya/create-payment", data = "<request>", format = "json")]
async fn create_payment(
    request: Json<PaymentRequest>,
    campaigns: Coll<Campaign>,
    client: &State<PaymentClient>,
    config: &State<Config>,
) -> Result<Json<Value>> {
    let request = request.into_inner();
    let campaign = campaigns
        .find_one(request.campaign_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Campaign {}", request.campaign_id)))?;

    let response = client.create_payment(request.amount, campaign.id, config).await?;
    Ok(Json(response))
}

/// Gateway redirect after a completed payment. The campaign update is
/// best-effort; the donor always lands back on the frontend.
#[get("/paymaya/payment-success?<callback..>")]
async fn payment_success(
    callback: PaymentCallback,
    campaigns: Coll<Campaign>,
    config: &State<Config>,
) -> Redirect {
    if let Some(campaign_id) = callback.campaign_id {
        let amount = callback.amount.filter(|amount| amount.is_finite()).unwrap_or(0.0);
        let update = doc! {
            "$inc": { "collected_amount": amount },
            "$set": { "last_payment_status": "success" },
        };
        if let Err(err) = campaigns.update_one(campaign_id.as_doc(), update, None).await {
            warn!("Failed to record successful payment for campaign {campaign_id}: {err}");
        }
    }
    Redirect::to(format!("{}/payment-success", config.frontend_url()))
}

#[get("/paymaya/payment-failure?<callback..>")]
async fn payment_failure(
    callback: PaymentCallback,
    campaigns: Coll<Campaign>,
    config: &State<Config>,
) -> Redirect {
    stamp_status(callback, &campaigns, "failure").await;
    Redirect::to(format!("{}/payment-failure", config.frontend_url()))
}

#[get("/paymaya/payment-cancel?<callback..>")]
async fn payment_cancel(
    callback: PaymentCallback,
    campaigns: Coll<Campaign>,
    config: &State<Config>,
) -> Redirect {
    stamp_status(callback, &campaigns, "cancelled").await;
    Redirect::to(format!("{}/payment-cancel", config.frontend_url()))
}

/// Stamp the last-payment-status field, swallowing failures: the callbacks
/// redirect unconditionally.
async fn stamp_status(callback: PaymentCallback, campaigns: &Coll<Campaign>, status: &str) {
    if let Some(campaign_id) = callback.campaign_id {
        let update = doc! { "$set": { "last_payment_status": status } };
        if let Err(err) = campaigns.update_one(campaign_id.as_doc(), update, None).await {
            warn!("Failed to record {status} payment for campaign {campaign_id}: {err}");
        }
    }
}
