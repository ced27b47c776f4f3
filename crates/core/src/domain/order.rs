// Order Domain Model

use serde::{Deserialize, Serialize};

/// Nominal rate used when the order source has no cadence for an article (units/hour)
pub const DEFAULT_NOMINAL_RATE: u32 = 6000;

/// Placeholder for article/description/label fields before an order is configured
pub const UNSET_FIELD: &str = "NA";

/// Production order as returned by the order source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: i64,
    pub article: String,
    pub description: String,
    pub nominal_rate: u32,
}

/// Everything `configure` needs to set up a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSetup {
    pub order_id: i64,
    pub order_label: String,
    pub article: String,
    pub description: String,
    pub nominal_rate: u32,
    pub target_count: u64,
}

impl OrderSetup {
    /// Combine a looked-up order with the operator's label and target
    pub fn from_record(record: OrderRecord, order_label: impl Into<String>, target_count: u64) -> Self {
        Self {
            order_id: record.id,
            order_label: order_label.into(),
            article: record.article,
            description: record.description,
            nominal_rate: record.nominal_rate,
            target_count,
        }
    }

    pub fn validate(&self) -> super::error::Result<()> {
        if self.order_label.trim().is_empty() {
            return Err(super::DomainError::ValidationError(
                "order label cannot be empty".to_string(),
            ));
        }
        if self.nominal_rate == 0 {
            return Err(super::DomainError::ValidationError(
                "nominal rate must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Order identity group of the production state (written by commands only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderInfo {
    pub article: String,
    pub description: String,
    pub nominal_rate: u32,
    pub order_id: i64,
    pub order_label: String,
    pub configured: bool,
}

impl Default for OrderInfo {
    fn default() -> Self {
        Self {
            article: UNSET_FIELD.to_string(),
            description: UNSET_FIELD.to_string(),
            nominal_rate: DEFAULT_NOMINAL_RATE,
            order_id: 0,
            order_label: UNSET_FIELD.to_string(),
            configured: false,
        }
    }
}

impl OrderInfo {
    pub fn apply(&mut self, setup: &OrderSetup) {
        self.article = setup.article.clone();
        self.description = setup.description.clone();
        self.nominal_rate = setup.nominal_rate;
        self.order_id = setup.order_id;
        self.order_label = setup.order_label.clone();
        self.configured = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> OrderSetup {
        OrderSetup::from_record(
            OrderRecord {
                id: 42,
                article: "ART-1".to_string(),
                description: "Bottle 75cl".to_string(),
                nominal_rate: 4800,
            },
            "OP-2024-001",
            1200,
        )
    }

    #[test]
    fn test_default_order_info_matches_unconfigured_line() {
        let info = OrderInfo::default();
        assert_eq!(info.article, "NA");
        assert_eq!(info.order_label, "NA");
        assert_eq!(info.nominal_rate, 6000);
        assert!(!info.configured);
    }

    #[test]
    fn test_apply_sets_identity_and_configured() {
        let mut info = OrderInfo::default();
        info.apply(&setup());
        assert_eq!(info.order_id, 42);
        assert_eq!(info.order_label, "OP-2024-001");
        assert_eq!(info.nominal_rate, 4800);
        assert!(info.configured);
    }

    #[test]
    fn test_validate_rejects_blank_label() {
        let mut s = setup();
        s.order_label = "   ".to_string();
        let err = s.validate().unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_validate_rejects_zero_rate() {
        let mut s = setup();
        s.nominal_rate = 0;
        assert!(s.validate().is_err());
    }
}
