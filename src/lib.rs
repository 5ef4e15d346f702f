//! # Sales Dedup
//!
//! A library for turning raw accounting export lines into a count of unique
//! commercial sales, classified by sale type, payment method and advisor.
//!
//! ## Core Concepts
//!
//! - **Raw lines**: One row per document line. A single sale can span several rows
//!   (e.g. an invoice plus the credit document that finances it, or a later return)
//! - **Sale groups**: Per customer, lines are walked in date order and merged into the
//!   group of an earlier anchor line when they fall inside the grouping window and their
//!   document classes match (or pair a sale document with a credit document)
//! - **Unique sales**: Groups whose lines net to a positive value. Returns that cancel
//!   their sale, and unmatched returns, are never counted
//! - **Aggregates**: Counts and values by sale type, payment method, advisor and advisor type
//!
//! ## Example
//!
//! ```rust
//! use sales_dedup::*;
//!
//! let records = vec![
//!     RawLineRecord::new(Some("A"), Some("2024-03-01"), Some("INVOICE"), 100_000.0)
//!         .with_sale_type("credit"),
//!     RawLineRecord::new(Some("A"), Some("2024-03-03"), Some("CREDIT_NOTE"), -30_000.0),
//! ];
//!
//! let result = group_and_count_sales(&records);
//! assert_eq!(result.total_sales_count, 1);
//! assert_eq!(result.by_type["CREDIT"].value, 70_000.0);
//! ```

pub mod advisors;
pub mod aggregate;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod schema;
pub mod utils;

pub use advisors::{AdvisorDirectory, AdvisorType};
pub use aggregate::{
    aggregate_sales, aggregate_sales_by_advisor, verify_advisor_summary, verify_summary,
};
pub use engine::{group_sales, SaleGroup, SaleGrouper};
pub use error::{Result, SalesCountError};
pub use ingestion::*;
pub use schema::*;
pub use utils::*;

use log::{debug, info};
use std::collections::HashMap;

/// Runs grouping and aggregation with a fixed configuration.
///
/// Holds no state between calls; callers own any caching of results.
pub struct SalesCounter {
    config: GroupingConfig,
}

impl SalesCounter {
    /// Takes the config as is, without validation. A negative `window_days`
    /// makes every line its own group; use [`SalesCounter::try_new`] for
    /// configs that come from outside the program.
    pub fn new(config: GroupingConfig) -> Self {
        Self { config }
    }

    /// Validates the config first.
    pub fn try_new(config: GroupingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &GroupingConfig {
        &self.config
    }

    pub fn unique_sales(&self, records: &[RawLineRecord]) -> Vec<UniqueSale> {
        debug!(
            "Grouping {} lines (window {} days, unknown customers: {:?})",
            records.len(),
            self.config.window_days,
            self.config.unknown_customer_policy
        );

        let sales = group_sales(records, &self.config);

        info!(
            "Collapsed {} lines into {} unique sales",
            records.len(),
            sales.len()
        );
        sales
    }

    pub fn count(&self, records: &[RawLineRecord]) -> AggregateResult {
        aggregate_sales(&self.unique_sales(records))
    }

    pub fn count_by_advisor(
        &self,
        records: &[RawLineRecord],
        directory: &AdvisorDirectory,
    ) -> AdvisorAggregateResult {
        aggregate_sales_by_advisor(&self.unique_sales(records), directory)
    }

    /// Builds the advisor directory from a caller mapping of advisor code to
    /// advisor-type label, using this counter's reserved codes.
    pub fn advisor_directory(&self, advisor_types: &HashMap<String, String>) -> AdvisorDirectory {
        AdvisorDirectory::new(advisor_types, &self.config.advisors)
    }
}

impl Default for SalesCounter {
    fn default() -> Self {
        Self::new(GroupingConfig::default())
    }
}

pub fn group_and_count_sales(records: &[RawLineRecord]) -> AggregateResult {
    SalesCounter::default().count(records)
}

pub fn group_and_count_sales_by_advisor(
    records: &[RawLineRecord],
    advisor_types: &HashMap<String, String>,
) -> AdvisorAggregateResult {
    let counter = SalesCounter::default();
    let directory = counter.advisor_directory(advisor_types);
    counter.count_by_advisor(records, &directory)
}
