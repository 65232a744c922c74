use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockDuration {
    #[serde(rename = "3h")]
    ThreeHours,
    #[serde(rename = "6h")]
    SixHours,
}

impl BlockDuration {
    pub fn hours(&self) -> i64 {
        match self {
            BlockDuration::ThreeHours => 3,
            BlockDuration::SixHours => 6,
        }
    }

    pub fn price(&self) -> f64 {
        match self {
            BlockDuration::ThreeHours => 10.0,
            BlockDuration::SixHours => 20.0,
        }
    }

    pub fn end_time(&self, start: DateTime<Utc>) -> DateTime<Utc> {
        start + Duration::hours(self.hours())
    }

    pub fn label(&self) -> &'static str {
        match self {
            BlockDuration::ThreeHours => "3h",
            BlockDuration::SixHours => "6h",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryBlock {
    pub id: String,
    pub duration: BlockDuration,
    pub price: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryDraft {
    pub duration: BlockDuration,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::BlockDuration;

    #[test]
    fn three_hour_block_costs_ten_and_ends_three_hours_later() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap();
        let block = BlockDuration::ThreeHours;

        assert_eq!(block.price(), 10.0);
        assert_eq!(
            block.end_time(start),
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap()
        );
    }

    #[test]
    fn six_hour_block_costs_twenty_and_can_cross_midnight() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 21, 0, 0).unwrap();
        let block = BlockDuration::SixHours;

        assert_eq!(block.price(), 20.0);
        assert_eq!(
            block.end_time(start),
            Utc.with_ymd_and_hms(2025, 3, 2, 3, 0, 0).unwrap()
        );
    }

    #[test]
    fn durations_use_short_wire_names() {
        assert_eq!(
            serde_json::to_string(&BlockDuration::ThreeHours).unwrap(),
            "\"3h\""
        );
        let parsed: BlockDuration = serde_json::from_str("\"6h\"").unwrap();
        assert_eq!(parsed, BlockDuration::SixHours);
    }
}
