use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::config::FlowSettings;
use crate::error::AppError;
use crate::models::payment::{ItemType, Payment};
use crate::models::rating::{Rating, RatingDraft};
use crate::observability::metrics::Metrics;
use crate::store::RecordStore;

pub const DEFAULT_RATING: u8 = 5;
pub const DEFAULT_HIRE_AMOUNT: f64 = 15.0;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FlowKey {
    item_type: ItemType,
    item_id: String,
}

impl FlowKey {
    fn new(item_type: ItemType, item_id: &str) -> Self {
        Self {
            item_type,
            item_id: item_id.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum FlowPhase {
    Idle,
    Processing { started_at: DateTime<Utc> },
    AwaitingRating { default_rating: u8 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingPrompt {
    pub item_type: ItemType,
    pub item_id: String,
    pub item_name: String,
    pub default_rating: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    pub item_type: ItemType,
    pub item_id: String,
    #[serde(default)]
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Settled {
        payment: Payment,
        prompt: RatingPrompt,
    },
    AlreadyPaid { prompt: RatingPrompt },
}

impl PaymentOutcome {
    pub fn prompt(&self) -> &RatingPrompt {
        match self {
            PaymentOutcome::Settled { prompt, .. } => prompt,
            PaymentOutcome::AlreadyPaid { prompt } => prompt,
        }
    }
}

pub struct FlowController {
    settings: FlowSettings,
    phases: Arc<DashMap<FlowKey, FlowPhase>>,
    metrics: Metrics,
}

impl FlowController {
    pub fn new(settings: FlowSettings, metrics: Metrics) -> Self {
        Self {
            settings,
            phases: Arc::new(DashMap::new()),
            metrics,
        }
    }

    pub fn phase(&self, item_type: ItemType, item_id: &str) -> FlowPhase {
        self.phases
            .get(&FlowKey::new(item_type, item_id))
            .map(|entry| entry.value().clone())
            .unwrap_or(FlowPhase::Idle)
    }

    fn delay_for(&self, item_type: ItemType) -> Duration {
        match item_type {
            ItemType::Gig => self.settings.gig_payment_delay,
            ItemType::Shop => self.settings.shop_payment_delay,
        }
    }

    /// Settlement runs on its own task: dropping the returned future does
    /// not cancel a payment that is already processing.
    pub async fn pay(
        &self,
        store: &Arc<RecordStore>,
        request: PaymentRequest,
    ) -> Result<PaymentOutcome, AppError> {
        let key = FlowKey::new(request.item_type, &request.item_id);

        let (amount, item_name) = match request.item_type {
            ItemType::Gig => {
                let gig = store.gig(&request.item_id)?;
                if gig.paid {
                    self.metrics
                        .payments_total
                        .with_label_values(&["gig", "already_paid"])
                        .inc();
                    info!(gig_id = %gig.id, "gig already paid; routing to rating");
                    let prompt = open_prompt(&self.phases, key, gig.title);
                    return Ok(PaymentOutcome::AlreadyPaid { prompt });
                }

                if let Some(amount) = request.amount {
                    if (amount - gig.price).abs() > f64::EPSILON {
                        return Err(AppError::BadRequest(format!(
                            "amount {amount} does not match gig price {}",
                            gig.price
                        )));
                    }
                }

                (gig.price, gig.title)
            }
            ItemType::Shop => {
                let shop = store.shop(&request.item_id)?;
                let amount = request.amount.unwrap_or(DEFAULT_HIRE_AMOUNT);
                if !amount.is_finite() || amount <= 0.0 {
                    return Err(AppError::BadRequest("hire amount must be positive".to_string()));
                }

                (amount, shop.name)
            }
        };

        self.begin(&key)?;
        info!(
            item_type = %key.item_type,
            item_id = %key.item_id,
            amount,
            "processing mock payment"
        );

        let settlement = Settlement {
            store: Arc::clone(store),
            phases: Arc::clone(&self.phases),
            metrics: self.metrics.clone(),
            delay: self.delay_for(key.item_type),
            key: key.clone(),
            amount,
            item_name,
        };

        match tokio::spawn(settlement.run()).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.phases.remove(&key);
                error!(item_id = %key.item_id, error = %err, "payment task aborted");
                Err(AppError::Internal(format!("payment task failed: {err}")))
            }
        }
    }

    fn begin(&self, key: &FlowKey) -> Result<(), AppError> {
        let processing = FlowPhase::Processing {
            started_at: Utc::now(),
        };

        match self.phases.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                if matches!(entry.get(), FlowPhase::Processing { .. }) {
                    return Err(AppError::Conflict(format!(
                        "payment for {} {} is already processing",
                        key.item_type, key.item_id
                    )));
                }
                entry.insert(processing);
            }
            Entry::Vacant(entry) => {
                entry.insert(processing);
            }
        }

        Ok(())
    }

    pub fn submit_rating(&self, store: &RecordStore, draft: RatingDraft) -> Result<Rating, AppError> {
        let key = FlowKey::new(draft.item_type, &draft.item_id);
        let rating = store.add_rating(draft)?;

        self.phases
            .remove_if(&key, |_, phase| matches!(phase, FlowPhase::AwaitingRating { .. }));
        Ok(rating)
    }

    pub fn dismiss(&self, item_type: ItemType, item_id: &str) -> FlowPhase {
        let key = FlowKey::new(item_type, item_id);
        self.phases
            .remove_if(&key, |_, phase| matches!(phase, FlowPhase::AwaitingRating { .. }));
        self.phase(item_type, item_id)
    }
}

struct Settlement {
    store: Arc<RecordStore>,
    phases: Arc<DashMap<FlowKey, FlowPhase>>,
    metrics: Metrics,
    delay: Duration,
    key: FlowKey,
    amount: f64,
    item_name: String,
}

impl Settlement {
    async fn run(self) -> Result<PaymentOutcome, AppError> {
        let started = Instant::now();
        sleep(self.delay).await;

        let now = Utc::now();
        let settled = match self.key.item_type {
            ItemType::Gig => self.store.settle_gig(&self.key.item_id, self.amount, now),
            ItemType::Shop => self.store.settle_shop_hire(&self.key.item_id, self.amount, now),
        };

        let kind = self.key.item_type.as_str();
        match settled {
            Ok(payment) => {
                self.metrics
                    .payment_latency_seconds
                    .with_label_values(&[kind])
                    .observe(started.elapsed().as_secs_f64());
                self.metrics
                    .payments_total
                    .with_label_values(&[kind, "settled"])
                    .inc();
                info!(payment_id = %payment.id, item_id = %payment.item_id, "mock payment settled");

                let prompt = open_prompt(&self.phases, self.key, self.item_name);
                Ok(PaymentOutcome::Settled { payment, prompt })
            }
            Err(err) => {
                self.phases.remove(&self.key);
                self.metrics
                    .payments_total
                    .with_label_values(&[kind, "error"])
                    .inc();
                warn!(item_id = %self.key.item_id, error = %err, "mock payment failed");
                Err(err)
            }
        }
    }
}

fn open_prompt(phases: &DashMap<FlowKey, FlowPhase>, key: FlowKey, item_name: String) -> RatingPrompt {
    let prompt = RatingPrompt {
        item_type: key.item_type,
        item_id: key.item_id.clone(),
        item_name,
        default_rating: DEFAULT_RATING,
    };

    phases.insert(
        key,
        FlowPhase::AwaitingRating {
            default_rating: DEFAULT_RATING,
        },
    );
    prompt
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::time::Duration;

    use super::{FlowController, FlowPhase, PaymentOutcome, PaymentRequest, DEFAULT_RATING};
    use crate::config::FlowSettings;
    use crate::error::AppError;
    use crate::models::gig::GigDraft;
    use crate::models::payment::ItemType;
    use crate::models::rating::RatingDraft;
    use crate::models::shop::{ShopCategory, ShopDraft};
    use crate::observability::metrics::Metrics;
    use crate::search::SearchQuery;
    use crate::storage::{FlakyStorage, MemoryStorage};
    use crate::store::RecordStore;

    fn setup(delay: Duration) -> (Arc<RecordStore>, Arc<FlowController>) {
        let metrics = Metrics::new();
        let store = RecordStore::open(Arc::new(MemoryStorage::new()), metrics.clone(), 16);
        let flows = FlowController::new(
            FlowSettings {
                gig_payment_delay: delay,
                shop_payment_delay: delay,
            },
            metrics,
        );
        (Arc::new(store), Arc::new(flows))
    }

    fn groceries(store: &RecordStore) -> String {
        store
            .create_gig(GigDraft {
                title: "Deliver groceries".to_string(),
                price: Some(5.0),
                location: "City Center".to_string(),
                ..GigDraft::default()
            })
            .unwrap()
            .id
    }

    fn pay_gig(id: &str) -> PaymentRequest {
        PaymentRequest {
            item_type: ItemType::Gig,
            item_id: id.to_string(),
            amount: None,
        }
    }

    #[tokio::test]
    async fn paying_a_gig_settles_and_opens_a_five_star_prompt() {
        let (store, flows) = setup(Duration::from_millis(20));
        let id = groceries(&store);
        assert!(!store.gig(&id).unwrap().paid);

        let outcome = flows.pay(&store, pay_gig(&id)).await.unwrap();

        match &outcome {
            PaymentOutcome::Settled { payment, prompt } => {
                assert_eq!(payment.amount, 5.0);
                assert_eq!(prompt.default_rating, 5);
                assert_eq!(prompt.item_name, "Deliver groceries");
            }
            other => panic!("expected settlement, got {other:?}"),
        }
        assert!(store.gig(&id).unwrap().paid);
        assert_eq!(
            flows.phase(ItemType::Gig, &id),
            FlowPhase::AwaitingRating {
                default_rating: DEFAULT_RATING
            }
        );
    }

    #[tokio::test]
    async fn second_payment_goes_to_rating_without_charging() {
        let (store, flows) = setup(Duration::ZERO);
        let id = groceries(&store);

        flows.pay(&store, pay_gig(&id)).await.unwrap();
        let second = flows.pay(&store, pay_gig(&id)).await.unwrap();

        assert!(matches!(second, PaymentOutcome::AlreadyPaid { .. }));
        assert_eq!(second.prompt().default_rating, 5);
        assert_eq!(store.payments().unwrap().len(), 1);
        assert_eq!(store.gigs(&SearchQuery::default()).unwrap().len(), 1);
        assert_eq!(store.gig(&id).unwrap().price, 5.0);
    }

    #[tokio::test]
    async fn concurrent_payment_for_the_same_gig_is_rejected() {
        let (store, flows) = setup(Duration::from_millis(300));
        let id = groceries(&store);

        let first = {
            let store = store.clone();
            let flows = flows.clone();
            let id = id.clone();
            tokio::spawn(async move { flows.pay(&store, pay_gig(&id)).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(matches!(
            flows.phase(ItemType::Gig, &id),
            FlowPhase::Processing { .. }
        ));
        assert!(!store.gig(&id).unwrap().paid);

        let second = flows.pay(&store, pay_gig(&id)).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        let settled = first.await.unwrap().unwrap();
        assert!(matches!(settled, PaymentOutcome::Settled { .. }));
        assert_eq!(store.payments().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn dropped_caller_does_not_cancel_settlement() {
        let (store, flows) = setup(Duration::from_millis(200));
        let id = groceries(&store);

        let abandoned = tokio::time::timeout(Duration::from_millis(20), flows.pay(&store, pay_gig(&id))).await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(store.gig(&id).unwrap().paid);
        assert_eq!(store.payments().unwrap().len(), 1);
        assert_eq!(
            flows.phase(ItemType::Gig, &id),
            FlowPhase::AwaitingRating {
                default_rating: DEFAULT_RATING
            }
        );

        let retry = flows.pay(&store, pay_gig(&id)).await.unwrap();
        assert!(matches!(retry, PaymentOutcome::AlreadyPaid { .. }));
    }

    #[tokio::test]
    async fn failed_ledger_write_leaves_gig_payable() {
        let storage = Arc::new(FlakyStorage::default());
        let metrics = Metrics::new();
        let store = Arc::new(RecordStore::open(storage.clone(), metrics.clone(), 16));
        let flows = FlowController::new(FlowSettings::instant(), metrics);
        let id = groceries(&store);

        storage.break_key("payments");
        let failed = flows.pay(&store, pay_gig(&id)).await;

        assert!(matches!(failed, Err(AppError::Storage(_))));
        assert!(!store.gig(&id).unwrap().paid);
        assert_eq!(flows.phase(ItemType::Gig, &id), FlowPhase::Idle);

        storage.repair();
        let outcome = flows.pay(&store, pay_gig(&id)).await.unwrap();
        assert!(matches!(outcome, PaymentOutcome::Settled { .. }));
        assert_eq!(store.payments().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn mismatched_gig_amount_is_rejected() {
        let (store, flows) = setup(Duration::ZERO);
        let id = groceries(&store);

        let mut request = pay_gig(&id);
        request.amount = Some(50.0);

        assert!(matches!(
            flows.pay(&store, request).await,
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(flows.phase(ItemType::Gig, &id), FlowPhase::Idle);
    }

    #[tokio::test]
    async fn hiring_a_shop_records_the_amount() {
        let (store, flows) = setup(Duration::ZERO);
        let shop = store
            .create_shop(ShopDraft {
                name: "Bob Auto".to_string(),
                category: ShopCategory::Auto,
                services: "Repair".to_string(),
                description: String::new(),
                location: String::new(),
                coords: None,
            })
            .unwrap();

        let outcome = flows
            .pay(
                &store,
                PaymentRequest {
                    item_type: ItemType::Shop,
                    item_id: shop.id.clone(),
                    amount: None,
                },
            )
            .await
            .unwrap();

        assert!(matches!(outcome, PaymentOutcome::Settled { .. }));
        assert_eq!(store.shop(&shop.id).unwrap().last_hire_amount, Some(15.0));

        let refused = flows
            .pay(
                &store,
                PaymentRequest {
                    item_type: ItemType::Shop,
                    item_id: shop.id.clone(),
                    amount: Some(-3.0),
                },
            )
            .await;
        assert!(matches!(refused, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn paying_a_missing_target_is_not_found() {
        let (store, flows) = setup(Duration::ZERO);
        assert!(matches!(
            flows.pay(&store, pay_gig("g-nope")).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn rating_returns_the_flow_to_idle() {
        let (store, flows) = setup(Duration::ZERO);
        let id = groceries(&store);
        flows.pay(&store, pay_gig(&id)).await.unwrap();

        let rating = flows
            .submit_rating(
                &store,
                RatingDraft {
                    item_type: ItemType::Gig,
                    item_id: id.clone(),
                    rating: 4,
                    comment: Some("quick and friendly".to_string()),
                },
            )
            .unwrap();

        assert_eq!(rating.comment, "quick and friendly");
        assert_eq!(store.gig(&id).unwrap().rating, Some(4));
        assert_eq!(flows.phase(ItemType::Gig, &id), FlowPhase::Idle);
    }

    #[tokio::test]
    async fn dismissing_a_prompt_returns_to_idle() {
        let (store, flows) = setup(Duration::ZERO);
        let id = groceries(&store);
        flows.pay(&store, pay_gig(&id)).await.unwrap();

        assert_eq!(flows.dismiss(ItemType::Gig, &id), FlowPhase::Idle);
        assert_eq!(store.gig(&id).unwrap().rating, None);
    }
}
