pub mod ids;


use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::error::AppError;
use crate::geo;
use crate::models::delivery::{DeliveryBlock, DeliveryDraft, DeliveryStatus};
use crate::models::gig::{Gig, GigDraft};
use crate::models::payment::{ItemType, Payment, PaymentStatus};
use crate::models::rating::{Rating, RatingDraft};
use crate::models::shop::{Shop, ShopCategory, ShopDraft};
use crate::observability::metrics::Metrics;
use crate::search::{self, SearchQuery};
use crate::storage::{self, Storage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Gig,
    Shop,
    Delivery,
    Payment,
    Rating,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Gig => "gig",
            RecordKind::Shop => "shop",
            RecordKind::Delivery => "delivery",
            RecordKind::Payment => "payment",
            RecordKind::Rating => "rating",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Change {
    Created,
    Updated,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreEvent {
    pub kind: RecordKind,
    pub id: String,
    pub change: Change,
}

impl StoreEvent {
    fn new(kind: RecordKind, id: &str, change: Change) -> Self {
        Self {
            kind,
            id: id.to_string(),
            change,
        }
    }
}

pub trait Record: Clone + Serialize + DeserializeOwned + Send {
    const KEY: &'static str;
    const KIND: RecordKind;

    fn id(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
}

macro_rules! impl_record {
    ($ty:ty, $key:literal, $kind:expr) => {
        impl Record for $ty {
            const KEY: &'static str = $key;
            const KIND: RecordKind = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }
        }
    };
}

impl_record!(Gig, "gigs", RecordKind::Gig);
impl_record!(Shop, "shops", RecordKind::Shop);
impl_record!(DeliveryBlock, "deliveries", RecordKind::Delivery);
impl_record!(Payment, "payments", RecordKind::Payment);
impl_record!(Rating, "ratings", RecordKind::Rating);

#[derive(Debug, Clone, PartialEq)]
pub enum PaidOutcome {
    Settled(Gig),
    AlreadyPaid(Gig),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub gigs: usize,
    pub shops: usize,
    pub deliveries: usize,
    pub payments: usize,
    pub ratings: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DemoSummary {
    pub gigs_added: usize,
    pub shops_added: usize,
}

struct Mutation<R> {
    value: R,
    events: Vec<StoreEvent>,
}

impl<R> Mutation<R> {
    fn changed(value: R, event: StoreEvent) -> Self {
        Self {
            value,
            events: vec![event],
        }
    }

    fn and(mut self, event: StoreEvent) -> Self {
        self.events.push(event);
        self
    }

    fn unchanged(value: R) -> Self {
        Self {
            value,
            events: Vec::new(),
        }
    }
}

pub struct RecordStore {
    storage: Arc<dyn Storage>,
    metrics: Metrics,
    gigs: Mutex<Vec<Gig>>,
    shops: Mutex<Vec<Shop>>,
    deliveries: Mutex<Vec<DeliveryBlock>>,
    payments: Mutex<Vec<Payment>>,
    ratings: Mutex<Vec<Rating>>,
    events_tx: broadcast::Sender<StoreEvent>,
}

impl RecordStore {
    pub fn open(storage: Arc<dyn Storage>, metrics: Metrics, event_buffer_size: usize) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size.max(1));

        let gigs: Vec<Gig> = load_sorted(storage.as_ref());
        let shops: Vec<Shop> = load_sorted(storage.as_ref());
        let deliveries: Vec<DeliveryBlock> = load_sorted(storage.as_ref());
        let payments: Vec<Payment> = load_sorted(storage.as_ref());
        let ratings: Vec<Rating> = load_sorted(storage.as_ref());

        info!(
            gigs = gigs.len(),
            shops = shops.len(),
            deliveries = deliveries.len(),
            "record store loaded"
        );

        metrics.active_delivery_blocks.set(count_active(&deliveries));

        Self {
            storage,
            metrics,
            gigs: Mutex::new(gigs),
            shops: Mutex::new(shops),
            deliveries: Mutex::new(deliveries),
            payments: Mutex::new(payments),
            ratings: Mutex::new(ratings),
            events_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events_tx.subscribe()
    }

    fn commit<T, R, F>(&self, slot: &Mutex<Vec<T>>, apply: F) -> Result<R, AppError>
    where
        T: Record,
        F: FnOnce(&mut Vec<T>) -> Result<Mutation<R>, AppError>,
    {
        let mut guard = lock(slot)?;
        let mut draft = guard.clone();
        let Mutation { value, events } = apply(&mut draft)?;

        if events.is_empty() {
            return Ok(value);
        }

        self.persist(&draft)?;

        *guard = draft;
        drop(guard);

        self.publish(events);
        Ok(value)
    }

    /// Ledger then target, both or neither. Lock order is always ledger
    /// (payments, ratings) before target (gigs, shops).
    fn commit_pair<L, T, R, F>(
        &self,
        ledger: &Mutex<Vec<L>>,
        target: &Mutex<Vec<T>>,
        apply: F,
    ) -> Result<R, AppError>
    where
        L: Record,
        T: Record,
        F: FnOnce(&mut Vec<L>, &mut Vec<T>) -> Result<Mutation<R>, AppError>,
    {
        let mut ledger_guard = lock(ledger)?;
        let mut target_guard = lock(target)?;
        let mut ledger_draft = ledger_guard.clone();
        let mut target_draft = target_guard.clone();
        let Mutation { value, events } = apply(&mut ledger_draft, &mut target_draft)?;

        if events.is_empty() {
            return Ok(value);
        }

        self.persist(&ledger_draft)?;
        if let Err(err) = self.persist(&target_draft) {
            if let Err(restore) = storage::save(self.storage.as_ref(), L::KEY, ledger_guard.as_slice()) {
                error!(key = L::KEY, error = %restore, "failed to restore collection after partial write");
            }
            return Err(err);
        }

        *ledger_guard = ledger_draft;
        *target_guard = target_draft;
        drop(target_guard);
        drop(ledger_guard);

        self.publish(events);
        Ok(value)
    }

    fn persist<T: Record>(&self, records: &[T]) -> Result<(), AppError> {
        storage::save(self.storage.as_ref(), T::KEY, records).map_err(|err| {
            self.metrics
                .storage_write_failures_total
                .with_label_values(&[T::KEY])
                .inc();
            error!(key = T::KEY, error = %err, "failed to persist collection; change discarded");
            AppError::from(err)
        })
    }

    fn publish(&self, events: Vec<StoreEvent>) {
        for event in events {
            let _ = self.events_tx.send(event);
        }
    }

    pub fn create_gig(&self, draft: GigDraft) -> Result<Gig, AppError> {
        let title = draft.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::BadRequest("title cannot be empty".to_string()));
        }

        let price = draft.price.unwrap_or(0.0);
        if !price.is_finite() || price < 0.0 {
            return Err(AppError::BadRequest(
                "price must be a non-negative number".to_string(),
            ));
        }

        geo::validate_optional(draft.coords.as_ref())?;

        let now = Utc::now();
        let gig = self.commit(&self.gigs, |gigs| {
            let id = ids::generate("g", now, |candidate| gigs.iter().any(|g| g.id == candidate));
            let gig = Gig {
                id,
                title,
                description: draft.description.trim().to_string(),
                price,
                location: draft.location.trim().to_string(),
                coords: draft.coords,
                created_at: now,
                paid: false,
                paid_at: None,
                rating: None,
            };

            gigs.insert(0, gig.clone());
            let event = StoreEvent::new(RecordKind::Gig, &gig.id, Change::Created);
            Ok(Mutation::changed(gig, event))
        })?;

        self.metrics
            .records_created_total
            .with_label_values(&[RecordKind::Gig.as_str()])
            .inc();
        info!(gig_id = %gig.id, price = gig.price, "gig posted");

        Ok(gig)
    }

    pub fn create_shop(&self, draft: ShopDraft) -> Result<Shop, AppError> {
        let name = draft.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("name cannot be empty".to_string()));
        }

        geo::validate_optional(draft.coords.as_ref())?;

        let now = Utc::now();
        let shop = self.commit(&self.shops, |shops| {
            let id = ids::generate("s", now, |candidate| shops.iter().any(|s| s.id == candidate));
            let shop = Shop {
                id,
                name,
                category: draft.category,
                services: draft.services.trim().to_string(),
                description: draft.description.trim().to_string(),
                location: draft.location.trim().to_string(),
                coords: draft.coords,
                created_at: now,
                last_hired_at: None,
                last_hire_amount: None,
                rating: None,
                total_ratings: 0,
            };

            shops.insert(0, shop.clone());
            let event = StoreEvent::new(RecordKind::Shop, &shop.id, Change::Created);
            Ok(Mutation::changed(shop, event))
        })?;

        self.metrics
            .records_created_total
            .with_label_values(&[RecordKind::Shop.as_str()])
            .inc();
        info!(shop_id = %shop.id, category = %shop.category, "shop registered");

        Ok(shop)
    }

    pub fn start_delivery(&self, draft: DeliveryDraft) -> Result<DeliveryBlock, AppError> {
        let now = Utc::now();
        let start_time = draft.start_time.unwrap_or(now);

        let block = self.commit(&self.deliveries, |blocks| {
            let id = ids::generate("d", now, |candidate| blocks.iter().any(|b| b.id == candidate));
            let block = DeliveryBlock {
                id,
                duration: draft.duration,
                price: draft.duration.price(),
                start_time,
                end_time: draft.duration.end_time(start_time),
                status: DeliveryStatus::Active,
                created_at: now,
            };

            blocks.insert(0, block.clone());
            let event = StoreEvent::new(RecordKind::Delivery, &block.id, Change::Created);
            Ok(Mutation::changed(block, event))
        })?;

        self.metrics
            .records_created_total
            .with_label_values(&[RecordKind::Delivery.as_str()])
            .inc();
        self.refresh_active_deliveries()?;
        info!(
            delivery_id = %block.id,
            duration = block.duration.label(),
            price = block.price,
            "delivery block started"
        );

        Ok(block)
    }

    pub fn cancel_delivery(&self, id: &str) -> Result<DeliveryBlock, AppError> {
        let block = self.commit(&self.deliveries, |blocks| {
            let index = blocks
                .iter()
                .position(|b| b.id == id)
                .ok_or_else(|| AppError::NotFound(format!("delivery block {id} not found")))?;

            let mut block = blocks.remove(index);
            block.status = DeliveryStatus::Cancelled;
            let event = StoreEvent::new(RecordKind::Delivery, id, Change::Removed);
            Ok(Mutation::changed(block, event))
        })?;

        self.refresh_active_deliveries()?;
        info!(delivery_id = %id, "delivery block cancelled");

        Ok(block)
    }

    pub fn complete_expired_deliveries(&self, now: DateTime<Utc>) -> Result<Vec<String>, AppError> {
        let completed = self.commit(&self.deliveries, |blocks| {
            let mut completed = Vec::new();
            let mut events = Vec::new();

            for block in blocks.iter_mut() {
                if block.status == DeliveryStatus::Active && block.end_time <= now {
                    block.status = DeliveryStatus::Completed;
                    events.push(StoreEvent::new(RecordKind::Delivery, &block.id, Change::Updated));
                    completed.push(block.id.clone());
                }
            }

            Ok(Mutation {
                value: completed,
                events,
            })
        })?;

        if !completed.is_empty() {
            self.refresh_active_deliveries()?;
            info!(count = completed.len(), "delivery blocks completed");
        }

        Ok(completed)
    }

    pub fn mark_gig_paid(&self, id: &str, at: DateTime<Utc>) -> Result<PaidOutcome, AppError> {
        self.commit(&self.gigs, |gigs| {
            let gig = find_gig(gigs, id)?;
            if gig.paid {
                return Ok(Mutation::unchanged(PaidOutcome::AlreadyPaid(gig.clone())));
            }

            gig.paid = true;
            gig.paid_at = Some(at);
            let event = StoreEvent::new(RecordKind::Gig, id, Change::Updated);
            Ok(Mutation::changed(PaidOutcome::Settled(gig.clone()), event))
        })
    }

    pub fn record_shop_hire(&self, id: &str, amount: f64, at: DateTime<Utc>) -> Result<Shop, AppError> {
        check_hire_amount(amount)?;

        self.commit(&self.shops, |shops| {
            let shop = find_shop(shops, id)?;
            shop.last_hired_at = Some(at);
            shop.last_hire_amount = Some(amount);
            let event = StoreEvent::new(RecordKind::Shop, id, Change::Updated);
            Ok(Mutation::changed(shop.clone(), event))
        })
    }

    pub fn record_payment(
        &self,
        item_type: ItemType,
        item_id: &str,
        amount: f64,
        at: DateTime<Utc>,
    ) -> Result<Payment, AppError> {
        self.commit(&self.payments, |payments| {
            let payment = push_payment(payments, item_type, item_id, amount, at);
            let event = StoreEvent::new(RecordKind::Payment, &payment.id, Change::Created);
            Ok(Mutation::changed(payment, event))
        })
    }

    /// Marks the gig paid and records the charge as one change. Conflict if
    /// the gig is already paid; nothing is charged then.
    pub fn settle_gig(&self, id: &str, amount: f64, at: DateTime<Utc>) -> Result<Payment, AppError> {
        self.commit_pair(&self.payments, &self.gigs, |payments, gigs| {
            let gig = find_gig(gigs, id)?;
            if gig.paid {
                return Err(AppError::Conflict(format!("gig {id} is already paid")));
            }

            gig.paid = true;
            gig.paid_at = Some(at);
            let payment = push_payment(payments, ItemType::Gig, id, amount, at);
            let created = StoreEvent::new(RecordKind::Payment, &payment.id, Change::Created);
            Ok(Mutation::changed(payment, created)
                .and(StoreEvent::new(RecordKind::Gig, id, Change::Updated)))
        })
    }

    pub fn settle_shop_hire(&self, id: &str, amount: f64, at: DateTime<Utc>) -> Result<Payment, AppError> {
        check_hire_amount(amount)?;

        self.commit_pair(&self.payments, &self.shops, |payments, shops| {
            let shop = find_shop(shops, id)?;
            shop.last_hired_at = Some(at);
            shop.last_hire_amount = Some(amount);
            let payment = push_payment(payments, ItemType::Shop, id, amount, at);
            let created = StoreEvent::new(RecordKind::Payment, &payment.id, Change::Created);
            Ok(Mutation::changed(payment, created)
                .and(StoreEvent::new(RecordKind::Shop, id, Change::Updated)))
        })
    }

    pub fn add_rating(&self, draft: RatingDraft) -> Result<Rating, AppError> {
        let stars = u8::try_from(draft.rating)
            .ok()
            .filter(|stars| (1..=5).contains(stars))
            .ok_or_else(|| {
                AppError::BadRequest("rating must be an integer from 1 to 5".to_string())
            })?;

        let now = Utc::now();
        let item_type = draft.item_type;
        let rating = Rating {
            id: String::new(),
            item_type: draft.item_type,
            item_id: draft.item_id,
            rating: stars,
            comment: draft.comment.unwrap_or_default().trim().to_string(),
            created_at: now,
        };

        let rating = match item_type {
            ItemType::Gig => self.commit_pair(&self.ratings, &self.gigs, |ratings, gigs| {
                let gig = find_gig(gigs, &rating.item_id)?;
                gig.rating = Some(stars);
                let rating = push_rating(ratings, rating);
                let created = StoreEvent::new(RecordKind::Rating, &rating.id, Change::Created);
                let updated = StoreEvent::new(RecordKind::Gig, &rating.item_id, Change::Updated);
                Ok(Mutation::changed(rating, created).and(updated))
            })?,
            ItemType::Shop => self.commit_pair(&self.ratings, &self.shops, |ratings, shops| {
                let shop = find_shop(shops, &rating.item_id)?;
                let rating = push_rating(ratings, rating);

                let (total, sum) = ratings
                    .iter()
                    .filter(|r| r.item_type == ItemType::Shop && r.item_id == rating.item_id)
                    .fold((0u32, 0u32), |(total, sum), r| (total + 1, sum + u32::from(r.rating)));
                shop.rating = Some((f64::from(sum) / f64::from(total) * 10.0).round() / 10.0);
                shop.total_ratings = total;

                let created = StoreEvent::new(RecordKind::Rating, &rating.id, Change::Created);
                let updated = StoreEvent::new(RecordKind::Shop, &rating.item_id, Change::Updated);
                Ok(Mutation::changed(rating, created).and(updated))
            })?,
        };

        self.metrics
            .ratings_total
            .with_label_values(&[rating.item_type.as_str()])
            .inc();
        info!(
            item_type = %rating.item_type,
            item_id = %rating.item_id,
            rating = stars,
            "rating submitted"
        );

        Ok(rating)
    }

    pub fn load_demo_data(&self) -> Result<DemoSummary, AppError> {
        let now = Utc::now();
        let sample_gigs = [
            ("Deliver groceries", 5.0, "City Center"),
            ("Pick up laundry", 3.0, "North Market"),
            ("Assemble furniture", 15.0, "West Ave"),
        ];
        let sample_shops = [
            ("Bob Auto", ShopCategory::Auto, "Repair, Oil change", "Main Road"),
            ("Fresh Mart", ShopCategory::Supermarket, "Grocery, Vegs", "Corner Street"),
        ];

        let gigs_added = self.commit(&self.gigs, |gigs| {
            let mut events = Vec::new();
            for (title, price, location) in sample_gigs.iter().rev() {
                let id = ids::generate("g", now, |candidate| gigs.iter().any(|g| g.id == candidate));
                events.push(StoreEvent::new(RecordKind::Gig, &id, Change::Created));
                gigs.insert(
                    0,
                    Gig {
                        id,
                        title: title.to_string(),
                        description: String::new(),
                        price: *price,
                        location: location.to_string(),
                        coords: None,
                        created_at: now,
                        paid: false,
                        paid_at: None,
                        rating: None,
                    },
                );
            }
            Ok(Mutation {
                value: events.len(),
                events,
            })
        })?;

        let shops_added = self.commit(&self.shops, |shops| {
            let mut events = Vec::new();
            for (name, category, services, location) in sample_shops.iter().rev() {
                let id = ids::generate("s", now, |candidate| shops.iter().any(|s| s.id == candidate));
                events.push(StoreEvent::new(RecordKind::Shop, &id, Change::Created));
                shops.insert(
                    0,
                    Shop {
                        id,
                        name: name.to_string(),
                        category: *category,
                        services: services.to_string(),
                        description: String::new(),
                        location: location.to_string(),
                        coords: None,
                        created_at: now,
                        last_hired_at: None,
                        last_hire_amount: None,
                        rating: None,
                        total_ratings: 0,
                    },
                );
            }
            Ok(Mutation {
                value: events.len(),
                events,
            })
        })?;

        info!(gigs_added, shops_added, "demo data loaded");
        Ok(DemoSummary {
            gigs_added,
            shops_added,
        })
    }

    pub fn gigs(&self, query: &SearchQuery) -> Result<Vec<Gig>, AppError> {
        let gigs = lock(&self.gigs)?;
        Ok(search::filter_gigs(&gigs, query).into_iter().cloned().collect())
    }

    pub fn shops(&self, query: &SearchQuery) -> Result<Vec<Shop>, AppError> {
        let shops = lock(&self.shops)?;
        Ok(search::filter_shops(&shops, query).into_iter().cloned().collect())
    }

    pub fn deliveries(&self) -> Result<Vec<DeliveryBlock>, AppError> {
        Ok(lock(&self.deliveries)?.clone())
    }

    pub fn payments(&self) -> Result<Vec<Payment>, AppError> {
        Ok(lock(&self.payments)?.clone())
    }

    pub fn gig(&self, id: &str) -> Result<Gig, AppError> {
        lock(&self.gigs)?
            .iter()
            .find(|g| g.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("gig {id} not found")))
    }

    pub fn shop(&self, id: &str) -> Result<Shop, AppError> {
        lock(&self.shops)?
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("shop {id} not found")))
    }

    pub fn ratings_for(&self, item_type: ItemType, item_id: &str) -> Result<Vec<Rating>, AppError> {
        Ok(lock(&self.ratings)?
            .iter()
            .filter(|r| r.item_type == item_type && r.item_id == item_id)
            .cloned()
            .collect())
    }

    pub fn counts(&self) -> Result<StoreCounts, AppError> {
        let gigs = lock(&self.gigs)?.len();
        let shops = lock(&self.shops)?.len();
        let deliveries = lock(&self.deliveries)?.len();
        let payments = lock(&self.payments)?.len();
        let ratings = lock(&self.ratings)?.len();

        Ok(StoreCounts {
            gigs,
            shops,
            deliveries,
            payments,
            ratings,
        })
    }

    fn refresh_active_deliveries(&self) -> Result<(), AppError> {
        let active = count_active(&lock(&self.deliveries)?);
        self.metrics.active_delivery_blocks.set(active);
        Ok(())
    }
}

fn lock<T>(slot: &Mutex<T>) -> Result<MutexGuard<'_, T>, AppError> {
    slot.lock()
        .map_err(|_| AppError::Internal("record store lock poisoned".to_string()))
}

fn find_gig<'a>(gigs: &'a mut [Gig], id: &str) -> Result<&'a mut Gig, AppError> {
    gigs.iter_mut()
        .find(|g| g.id == id)
        .ok_or_else(|| AppError::NotFound(format!("gig {id} not found")))
}

fn find_shop<'a>(shops: &'a mut [Shop], id: &str) -> Result<&'a mut Shop, AppError> {
    shops
        .iter_mut()
        .find(|s| s.id == id)
        .ok_or_else(|| AppError::NotFound(format!("shop {id} not found")))
}

fn check_hire_amount(amount: f64) -> Result<(), AppError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AppError::BadRequest("hire amount must be positive".to_string()));
    }
    Ok(())
}

fn push_payment(
    payments: &mut Vec<Payment>,
    item_type: ItemType,
    item_id: &str,
    amount: f64,
    at: DateTime<Utc>,
) -> Payment {
    let id = ids::generate("p", at, |candidate| payments.iter().any(|p| p.id == candidate));
    let payment = Payment {
        id,
        item_type,
        item_id: item_id.to_string(),
        amount,
        status: PaymentStatus::Completed,
        created_at: at,
    };

    payments.insert(0, payment.clone());
    payment
}

fn push_rating(ratings: &mut Vec<Rating>, mut rating: Rating) -> Rating {
    rating.id = ids::generate("r", rating.created_at, |candidate| {
        ratings.iter().any(|r| r.id == candidate)
    });
    ratings.insert(0, rating.clone());
    rating
}

fn load_sorted<T: Record>(storage: &dyn Storage) -> Vec<T> {
    let mut records: Vec<T> = storage::load(storage, T::KEY);
    records.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
    records
}

fn count_active(blocks: &[DeliveryBlock]) -> i64 {
    blocks
        .iter()
        .filter(|b| b.status == DeliveryStatus::Active)
        .count() as i64
}
