use crate::advisors::AdvisorType;
use crate::error::{Result, SalesCountError};
use chrono::NaiveDate;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One exported accounting document line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawLineRecord {
    #[serde(default)]
    #[schemars(
        description = "Customer identifier. Rows without one are grouped under the UNKNOWN customer bucket."
    )]
    pub customer_id: Option<String>,

    #[serde(default)]
    #[schemars(
        description = "Document date as text: DD/MM/YYYY, DD-MM-YYYY, YYYY-MM-DD or YYYY/MM/DD. Two-digit years are read as 20YY. Rows whose date cannot be parsed are excluded."
    )]
    pub date: Option<String>,

    #[serde(default)]
    #[schemars(description = "Raw sale classification, e.g. cash, credit, installment, partner.")]
    pub sale_type: Option<String>,

    #[serde(default)]
    #[schemars(description = "Raw payment-method label.")]
    pub payment_method: Option<String>,

    #[serde(default)]
    #[schemars(
        description = "Accounting document class. The sale and credit document markers may pair with each other; every other class only groups with the exact same class."
    )]
    pub document_class: Option<String>,

    #[schemars(description = "Monetary amount of the line. Negative for returns and adjustments.")]
    pub value: f64,

    #[serde(default)]
    #[schemars(description = "Code of the advisor the line is attributed to.")]
    pub advisor_code: Option<String>,
}

impl RawLineRecord {
    pub fn new(
        customer_id: Option<&str>,
        date: Option<&str>,
        document_class: Option<&str>,
        value: f64,
    ) -> Self {
        Self {
            customer_id: customer_id.map(str::to_string),
            date: date.map(str::to_string),
            document_class: document_class.map(str::to_string),
            value,
            ..Self::default()
        }
    }

    pub fn with_sale_type(mut self, sale_type: &str) -> Self {
        self.sale_type = Some(sale_type.to_string());
        self
    }

    pub fn with_payment_method(mut self, payment_method: &str) -> Self {
        self.payment_method = Some(payment_method.to_string());
        self
    }

    pub fn with_advisor(mut self, advisor_code: &str) -> Self {
        self.advisor_code = Some(advisor_code.to_string());
        self
    }
}

/// How a document class participates in cross-class merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Sale,
    Credit,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCustomerPolicy {
    /// Rows without a customer id share one bucket and can merge with each other.
    #[default]
    #[schemars(
        description = "All rows without a customer id share one UNKNOWN bucket and may be merged with each other."
    )]
    SharedBucket,

    /// Every row without a customer id forms its own group.
    #[schemars(description = "Every row without a customer id is its own group and never merges.")]
    Singleton,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AdvisorConfig {
    #[schemars(
        description = "Normalized advisor codes (5 digits) of house and management accounts. These are always classified INTERNAL."
    )]
    pub reserved_codes: Vec<String>,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            reserved_codes: vec!["00000".to_string(), "99999".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct GroupingConfig {
    #[schemars(
        description = "Maximum distance in days between a group's anchor line and a candidate line. Inclusive."
    )]
    pub window_days: i64,

    #[schemars(description = "Document class marking a sale document (invoice).")]
    pub sale_document_marker: String,

    #[schemars(description = "Document class marking a credit document (credit note / financing).")]
    pub credit_document_marker: String,

    #[schemars(description = "How rows without a customer id are grouped.")]
    pub unknown_customer_policy: UnknownCustomerPolicy,

    pub advisors: AdvisorConfig,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            window_days: 7,
            sale_document_marker: "INVOICE".to_string(),
            credit_document_marker: "CREDIT_NOTE".to_string(),
            unknown_customer_policy: UnknownCustomerPolicy::SharedBucket,
            advisors: AdvisorConfig::default(),
        }
    }
}

impl GroupingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0..=366).contains(&self.window_days) {
            return Err(SalesCountError::InvalidWindow(self.window_days));
        }

        let sale = self.sale_document_marker.trim();
        let credit = self.credit_document_marker.trim();
        if sale.is_empty() || credit.is_empty() {
            return Err(SalesCountError::InvalidDocumentMarker(
                "Sale and credit document markers must not be empty".to_string(),
            ));
        }
        if sale == credit {
            return Err(SalesCountError::InvalidDocumentMarker(format!(
                "Sale and credit document markers must differ (both are '{}')",
                sale
            )));
        }

        if self
            .advisors
            .reserved_codes
            .iter()
            .any(|code| code.trim().is_empty())
        {
            return Err(SalesCountError::InvalidAdvisorConfig(
                "Reserved advisor codes must not be blank".to_string(),
            ));
        }

        Ok(())
    }

    /// Classifies a record's document class against the configured markers.
    pub fn document_kind(&self, document_class: Option<&str>) -> DocumentKind {
        match document_class.map(str::trim) {
            Some(class) if class == self.sale_document_marker.trim() => DocumentKind::Sale,
            Some(class) if class == self.credit_document_marker.trim() => DocumentKind::Credit,
            _ => DocumentKind::Other,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading grouping configuration from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(GroupingConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

/// A net-positive group of lines promoted to one commercial sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueSale {
    pub customer_id: String,
    /// Document class of the group's anchor line.
    pub document_class: Option<String>,
    pub sale_type: String,
    pub payment_method: String,
    /// Raw advisor code, picked the same way as the sale type.
    pub advisor_code: Option<String>,
    /// Always strictly positive.
    pub total_value: f64,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub line_count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesBucket {
    pub count: usize,
    pub value: f64,
}

impl SalesBucket {
    pub fn add(&mut self, value: f64) {
        self.count += 1;
        self.value += value;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub total_sales_count: usize,
    pub total_sales_value: f64,
    pub by_type: BTreeMap<String, SalesBucket>,
    pub by_payment_method: BTreeMap<String, SalesBucket>,
}

impl AggregateResult {
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdvisorSummary {
    pub total_count: usize,
    pub total_value: f64,
    pub by_type: BTreeMap<String, SalesBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorAggregateResult {
    #[serde(flatten)]
    pub summary: AggregateResult,
    /// Keyed by normalized advisor code.
    pub by_advisor: BTreeMap<String, AdvisorSummary>,
    /// Always holds all three advisor types.
    pub by_advisor_type: BTreeMap<AdvisorType, SalesBucket>,
}

impl Default for AdvisorAggregateResult {
    fn default() -> Self {
        Self {
            summary: AggregateResult::default(),
            by_advisor: BTreeMap::new(),
            by_advisor_type: AdvisorType::ALL
                .iter()
                .map(|t| (*t, SalesBucket::default()))
                .collect(),
        }
    }
}

impl AdvisorAggregateResult {
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GroupingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window_days, 7);
        assert_eq!(
            config.unknown_customer_policy,
            UnknownCustomerPolicy::SharedBucket
        );
    }

    #[test]
    fn test_validate_rejects_bad_config() {
        let config = GroupingConfig {
            window_days: -1,
            ..GroupingConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SalesCountError::InvalidWindow(-1))
        ));

        let config = GroupingConfig {
            credit_document_marker: "INVOICE".to_string(),
            ..GroupingConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SalesCountError::InvalidDocumentMarker(_))
        ));

        let config = GroupingConfig {
            sale_document_marker: "  ".to_string(),
            ..GroupingConfig::default()
        };
        assert!(config.validate().is_err());

        let config = GroupingConfig {
            advisors: AdvisorConfig {
                reserved_codes: vec!["".to_string()],
            },
            ..GroupingConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SalesCountError::InvalidAdvisorConfig(_))
        ));
    }

    #[test]
    fn test_document_kind() {
        let config = GroupingConfig::default();
        assert_eq!(config.document_kind(Some("INVOICE")), DocumentKind::Sale);
        assert_eq!(config.document_kind(Some(" INVOICE ")), DocumentKind::Sale);
        assert_eq!(
            config.document_kind(Some("CREDIT_NOTE")),
            DocumentKind::Credit
        );
        assert_eq!(config.document_kind(Some("invoice")), DocumentKind::Other);
        assert_eq!(config.document_kind(Some("RECEIPT")), DocumentKind::Other);
        assert_eq!(config.document_kind(None), DocumentKind::Other);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config = GroupingConfig::from_json_str(
            r#"{"window_days": 10, "unknown_customer_policy": "singleton"}"#,
        )
        .unwrap();
        assert_eq!(config.window_days, 10);
        assert_eq!(config.unknown_customer_policy, UnknownCustomerPolicy::Singleton);
        assert_eq!(config.sale_document_marker, "INVOICE");
        assert_eq!(config.advisors, AdvisorConfig::default());
    }

    #[test]
    fn test_config_from_json_validates() {
        let result = GroupingConfig::from_json_str(r#"{"window_days": 1000}"#);
        assert!(matches!(result, Err(SalesCountError::InvalidWindow(1000))));

        let result = GroupingConfig::from_json_str("not json");
        assert!(matches!(
            result,
            Err(SalesCountError::SerializationError(_))
        ));
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = GroupingConfig::schema_as_json().unwrap();
        assert!(schema_json.contains("window_days"));
        assert!(schema_json.contains("unknown_customer_policy"));
        assert!(schema_json.contains("reserved_codes"));

        let record_schema =
            serde_json::to_string_pretty(&schemars::schema_for!(RawLineRecord)).unwrap();
        assert!(record_schema.contains("document_class"));
        assert!(record_schema.contains("advisor_code"));
    }

    #[test]
    fn test_record_deserializes_with_missing_fields() {
        let record: RawLineRecord =
            serde_json::from_str(r#"{"customer_id": "A", "value": -250.5}"#).unwrap();
        assert_eq!(record.customer_id.as_deref(), Some("A"));
        assert_eq!(record.date, None);
        assert_eq!(record.value, -250.5);
    }

    #[test]
    fn test_advisor_result_default_has_all_buckets() {
        let result = AdvisorAggregateResult::default();
        assert_eq!(result.by_advisor_type.len(), 3);
        let json = result.to_json().unwrap();
        assert!(json.contains("INTERNAL"));
        assert!(json.contains("BROKERED"));
        assert!(json.contains("total_sales_count"));
    }
}
