use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::state::AppState;

const MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub completed_deliveries: Vec<String>,
    pub expired_picks: usize,
}

pub async fn run_sweeper(state: Arc<AppState>, every: Duration) {
    let every = every.max(MIN_INTERVAL);
    info!(interval_secs = every.as_secs(), "sweeper started");

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let report = sweep_once(&state, Utc::now());
        if !report.completed_deliveries.is_empty() || report.expired_picks > 0 {
            debug!(
                completed = report.completed_deliveries.len(),
                expired_picks = report.expired_picks,
                "sweep finished"
            );
        }
    }
}

pub fn sweep_once(state: &AppState, now: DateTime<Utc>) -> SweepReport {
    let completed_deliveries = match state.store.complete_expired_deliveries(now) {
        Ok(ids) => ids,
        Err(err) => {
            error!(error = %err, "failed to complete expired delivery blocks");
            Vec::new()
        }
    };

    SweepReport {
        completed_deliveries,
        expired_picks: state.picker.sweep_expired(now),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::sweep_once;
    use crate::config::FlowSettings;
    use crate::map::picker::PickForm;
    use crate::models::delivery::{BlockDuration, DeliveryDraft, DeliveryStatus};
    use crate::state::AppState;

    #[test]
    fn sweep_completes_blocks_and_drops_picks() {
        let state = AppState::in_memory(FlowSettings::instant());
        let now = Utc::now();

        let block = state
            .store
            .start_delivery(DeliveryDraft {
                duration: BlockDuration::ThreeHours,
                start_time: Some(now - Duration::hours(4)),
            })
            .unwrap();
        state.picker.arm(PickForm::Gig, now - Duration::hours(1));

        let report = sweep_once(&state, now);

        assert_eq!(report.completed_deliveries, vec![block.id.clone()]);
        assert_eq!(report.expired_picks, 1);
        assert_eq!(
            state.store.deliveries().unwrap()[0].status,
            DeliveryStatus::Completed
        );
    }

    #[test]
    fn sweep_leaves_running_blocks_alone() {
        let state = AppState::in_memory(FlowSettings::instant());
        state
            .store
            .start_delivery(DeliveryDraft {
                duration: BlockDuration::SixHours,
                start_time: None,
            })
            .unwrap();

        let report = sweep_once(&state, Utc::now());
        assert!(report.completed_deliveries.is_empty());
    }
}
