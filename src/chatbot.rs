//! Fulfillment for the conversational assistant. The NLU front end posts the
//! matched intent and its parameters; replies are plain text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::db::{
    self,
    models::{Donation, DonationItem, DonationStatus, DonorType, Role},
    DbPool,
};

pub const UNKNOWN_INTENT_REPLY: &str = "I'm not sure how to help with that yet.";
pub const FAILURE_REPLY: &str = "Something went wrong while processing your request.";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRequest {
    #[serde(default)]
    pub query_result: QueryResult,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub action: Option<String>,
    pub intent: Option<IntentRef>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentRef {
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub fulfillment_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    GetDonationStatus,
    ListAvailableFood,
    CreateDonation,
    RequestFood,
    ClaimFood,
    CancelDonation,
}

impl FromStr for Intent {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "get_donation_status" | "GetDonationStatus" => Intent::GetDonationStatus,
            "list_available_food" | "ListAvailableFood" => Intent::ListAvailableFood,
            "create_donation" | "CreateDonation" => Intent::CreateDonation,
            "request_food" | "RequestFood" => Intent::RequestFood,
            "claim_food" | "ClaimFood" => Intent::ClaimFood,
            "cancel_donation" | "CancelDonation" => Intent::CancelDonation,
            _ => return Err(()),
        })
    }
}

impl QueryResult {
    /// The action wins over the intent display name when both are sent.
    pub fn intent(&self) -> Option<Intent> {
        self.action
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .or_else(|| self.intent.as_ref().and_then(|i| i.display_name.as_deref()))
            .and_then(|name| name.parse().ok())
    }

    fn text_param(&self, key: &str) -> Option<String> {
        match self.parameters.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("invalid item entry {0:?}, expected name:quantity")]
    BadItem(String),
    #[error("missing parameter {0}")]
    MissingParam(&'static str),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Parses `"Rice:10"` style entries. An entry without a quantity counts as one.
pub fn parse_items(entries: &[Value]) -> Result<Vec<DonationItem>, ChatError> {
    entries
        .iter()
        .map(|entry| {
            let raw = entry.as_str().ok_or_else(|| ChatError::BadItem(entry.to_string()))?;
            let (name, quantity) = match raw.split_once(':') {
                Some((name, qty)) => (
                    name.trim(),
                    qty.trim().parse::<i64>().map_err(|_| ChatError::BadItem(raw.to_string()))?,
                ),
                None => (raw.trim(), 1),
            };
            if name.is_empty() || quantity <= 0 {
                return Err(ChatError::BadItem(raw.to_string()));
            }
            Ok(DonationItem {
                name: name.to_string(),
                quantity,
                ..Default::default()
            })
        })
        .collect()
}

fn describe(d: &Donation) -> String {
    let names: Vec<&str> = d.items.iter().map(|i| i.name.as_str()).collect();
    if names.is_empty() {
        "Food".to_string()
    } else {
        names.join(", ")
    }
}

fn weight_of(d: &Donation) -> String {
    d.items
        .iter()
        .find_map(|i| i.weight.clone())
        .unwrap_or_else(|| format!("{} items", d.items.iter().map(|i| i.quantity).sum::<i64>()))
}

async fn top_pending(pool: &DbPool) -> anyhow::Result<Vec<Donation>> {
    let mut pending = db::list_donations_by_status(pool, DonationStatus::Pending).await?;
    pending.truncate(3);
    Ok(pending)
}

async fn fulfill(
    pool: &DbPool,
    query: &QueryResult,
    intent: Intent,
    caller: Option<&AuthenticatedUser>,
    now: DateTime<Utc>,
) -> Result<String, ChatError> {
    match intent {
        Intent::GetDonationStatus => {
            let id = query.text_param("donation_id").ok_or(ChatError::MissingParam("donation_id"))?;
            Ok(match db::get_donation(pool, &id).await? {
                Some(d) => format!("The current status of donation {} is: {}.", id, d.status),
                None => format!("I couldn't find a donation with ID {}.", id),
            })
        }
        Intent::ListAvailableFood => {
            let pending = top_pending(pool).await?;
            if pending.is_empty() {
                return Ok("No food items are currently available for donation.".to_string());
            }
            let lines: Vec<String> = pending
                .iter()
                .map(|d| {
                    let expiry = d
                        .items
                        .iter()
                        .find_map(|i| i.expiry_date.clone())
                        .unwrap_or_else(|| "not specified".to_string());
                    format!("- {} (expires: {})", describe(d), expiry)
                })
                .collect();
            Ok(format!("Here are some available food items:\n{}", lines.join("\n")))
        }
        Intent::CreateDonation => {
            let Some(caller) = caller else {
                return Ok("Please sign in before creating a donation.".to_string());
            };
            let items = match query.parameters.get("items") {
                Some(Value::Array(entries)) => parse_items(entries)?,
                Some(Value::String(single)) => parse_items(&[Value::String(single.clone())])?,
                _ => Vec::new(),
            };
            if items.is_empty() {
                return Err(ChatError::MissingParam("items"));
            }
            let value = query.parameters.get("value").and_then(Value::as_f64).unwrap_or(0.0);
            let donation = Donation {
                id: format!("don_{}", Uuid::new_v4().simple()),
                donor_id: caller.id.clone(),
                donor_name: caller.name.clone(),
                donor_type: match caller.role {
                    Role::Business => DonorType::Business,
                    Role::Distributor => DonorType::Organization,
                    _ => DonorType::Individual,
                },
                items,
                status: DonationStatus::Pending,
                created_at: now,
                scheduled_pickup: None,
                completed_at: None,
                value,
                notes: query.text_param("foodDescription"),
                flag_reason: None,
                predicted_category: query.text_param("predictedCategory"),
            };
            db::add_donation(pool, &donation).await?;
            tracing::info!("Chatbot created donation {} for {}", donation.id, caller.id);
            Ok(format!(
                "Your donation has been created successfully! Donation ID: {}.",
                donation.id
            ))
        }
        Intent::RequestFood => {
            let pending = top_pending(pool).await?;
            if pending.is_empty() {
                return Ok("There are no pending donations available to request.".to_string());
            }
            let lines: Vec<String> = pending
                .iter()
                .map(|d| format!("- {} ({}) from {}", describe(d), weight_of(d), d.donor_name))
                .collect();
            Ok(format!(
                "Here are some donations you can request:\n{}\n\nSend the donation ID you want to request.",
                lines.join("\n")
            ))
        }
        Intent::ClaimFood => {
            let pending = top_pending(pool).await?;
            if pending.is_empty() {
                return Ok("No donations are available to claim at the moment.".to_string());
            }
            let lines: Vec<String> = pending
                .iter()
                .map(|d| format!("- {}: {} ({})", d.id, describe(d), weight_of(d)))
                .collect();
            Ok(format!(
                "Here are available donations you can claim:\n{}\n\nSend the donation ID to claim.",
                lines.join("\n")
            ))
        }
        Intent::CancelDonation => {
            let id = query.text_param("donation_id").ok_or(ChatError::MissingParam("donation_id"))?;
            let Some(mut donation) = db::get_donation(pool, &id).await? else {
                return Ok(format!("I couldn't find a donation with ID {}.", id));
            };
            if donation.status.is_finished() || donation.status == DonationStatus::Cancelled {
                return Ok(format!("Donation {} is already {} and cannot be cancelled.", id, donation.status));
            }
            donation.transition(DonationStatus::Cancelled, Some("Cancelled via assistant"), now);
            db::save_donation_status(pool, &donation).await?;
            tracing::info!("Chatbot cancelled donation {}", id);
            Ok(format!("Donation {} has been cancelled successfully.", id))
        }
    }
}

/// Resolves the request to a reply. Never fails: unknown intents and errors
/// produce fixed fallback texts.
pub async fn respond(
    pool: &DbPool,
    request: &WebhookRequest,
    caller: Option<&AuthenticatedUser>,
    now: DateTime<Utc>,
) -> WebhookResponse {
    let text = match request.query_result.intent() {
        None => UNKNOWN_INTENT_REPLY.to_string(),
        Some(intent) => match fulfill(pool, &request.query_result, intent, caller, now).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("Webhook {:?} failed: {}", intent, e);
                FAILURE_REPLY.to_string()
            }
        },
    };
    WebhookResponse { fulfillment_text: text }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(body: Value) -> WebhookRequest {
        serde_json::from_value(body).unwrap()
    }

    async fn seeded() -> DbPool {
        let pool = db::init_pool(db::MEMORY_URL).await.unwrap();
        db::fixtures::seed(&pool).await.unwrap();
        pool
    }

    fn now() -> DateTime<Utc> {
        "2025-04-19T20:00:00Z".parse().unwrap()
    }

    #[test]
    fn intent_accepts_both_spellings_and_display_name() {
        let r = request(json!({ "queryResult": { "action": "ClaimFood" } }));
        assert_eq!(r.query_result.intent(), Some(Intent::ClaimFood));
        let r = request(json!({ "queryResult": { "intent": { "displayName": "cancel_donation" } } }));
        assert_eq!(r.query_result.intent(), Some(Intent::CancelDonation));
        let r = request(json!({ "queryResult": { "action": "", "intent": { "displayName": "RequestFood" } } }));
        assert_eq!(r.query_result.intent(), Some(Intent::RequestFood));
        let r = request(json!({}));
        assert_eq!(r.query_result.intent(), None);
    }

    #[test]
    fn items_parse_name_and_quantity() {
        let items = parse_items(&[json!("Rice: 10"), json!("Bread")]).unwrap();
        assert_eq!(items[0].name, "Rice");
        assert_eq!(items[0].quantity, 10);
        assert_eq!(items[1].quantity, 1);
        assert!(parse_items(&[json!("Milk:lots")]).is_err());
        assert!(parse_items(&[json!(":3")]).is_err());
    }

    #[tokio::test]
    async fn unknown_intent_gets_fallback() {
        let pool = seeded().await;
        let r = request(json!({ "queryResult": { "action": "order_pizza" } }));
        assert_eq!(respond(&pool, &r, None, now()).await.fulfillment_text, UNKNOWN_INTENT_REPLY);
    }

    #[tokio::test]
    async fn status_and_cancel_use_the_store() {
        let pool = seeded().await;
        let r = request(json!({ "queryResult": {
            "action": "get_donation_status", "parameters": { "donation_id": "don_5004" } } }));
        assert_eq!(
            respond(&pool, &r, None, now()).await.fulfillment_text,
            "The current status of donation don_5004 is: in_transit."
        );

        let r = request(json!({ "queryResult": {
            "action": "CancelDonation", "parameters": { "donation_id": "don_5002" } } }));
        assert_eq!(
            respond(&pool, &r, None, now()).await.fulfillment_text,
            "Donation don_5002 has been cancelled successfully."
        );
        let stored = db::get_donation(&pool, "don_5002").await.unwrap().unwrap();
        assert_eq!(stored.status, DonationStatus::Cancelled);

        // nothing pending is left after the cancellation
        let r = request(json!({ "queryResult": { "action": "list_available_food" } }));
        assert_eq!(
            respond(&pool, &r, None, now()).await.fulfillment_text,
            "No food items are currently available for donation."
        );
    }

    #[tokio::test]
    async fn claim_lists_pending_ids() {
        let pool = seeded().await;
        let r = request(json!({ "queryResult": { "action": "claim_food" } }));
        let text = respond(&pool, &r, None, now()).await.fulfillment_text;
        assert!(text.contains("- don_5002: Fresh Produce, Bread, Milk (75kg)"), "{}", text);
    }

    #[tokio::test]
    async fn create_requires_caller_and_valid_items() {
        let pool = seeded().await;
        let caller = AuthenticatedUser {
            id: "usr_1001".into(),
            email: "sarah.j@example.com".into(),
            name: "Sarah Johnson".into(),
            role: Role::Donor,
        };
        let r = request(json!({ "queryResult": {
            "action": "create_donation", "parameters": { "items": ["Rice:5", "Lentils:2"], "value": 30 } } }));
        let text = respond(&pool, &r, Some(&caller), now()).await.fulfillment_text;
        assert!(text.starts_with("Your donation has been created successfully! Donation ID: don_"));

        let bad = request(json!({ "queryResult": {
            "action": "create_donation", "parameters": { "items": ["Rice:many"] } } }));
        assert_eq!(respond(&pool, &bad, Some(&caller), now()).await.fulfillment_text, FAILURE_REPLY);
    }
}
