use crate::schema::{DocumentKind, GroupingConfig, RawLineRecord, UniqueSale, UnknownCustomerPolicy};
use crate::utils::{days_between, non_blank, normalize_label, parse_record_date, UNKNOWN_LABEL};
use chrono::NaiveDate;
use log::debug;
use std::collections::BTreeMap;

/// Lines believed to belong to one commercial transaction of one customer.
#[derive(Debug, Clone)]
pub struct SaleGroup<'a> {
    pub customer_id: String,
    /// Document class of the anchor line.
    pub document_class: Option<String>,
    /// Anchor first, then merged lines in date order.
    pub members: Vec<&'a RawLineRecord>,
    pub min_date: NaiveDate,
    pub max_date: NaiveDate,
    classification_index: usize,
}

impl<'a> SaleGroup<'a> {
    pub fn net_value(&self) -> f64 {
        self.members.iter().map(|r| r.value).sum()
    }

    /// The first sale-document member, or the anchor when there is none.
    pub fn classification_record(&self) -> &'a RawLineRecord {
        self.members[self.classification_index]
    }

    /// Turns the group into a [`UniqueSale`] if it nets to a positive value.
    pub fn promote(&self) -> Option<UniqueSale> {
        let total_value = self.net_value();
        // NaN nets (a NaN member) are never promoted.
        if total_value.is_nan() || total_value <= 0.0 {
            return None;
        }

        let source = self.classification_record();
        Some(UniqueSale {
            customer_id: self.customer_id.clone(),
            document_class: self.document_class.clone(),
            sale_type: normalize_label(source.sale_type.as_deref()),
            payment_method: normalize_label(source.payment_method.as_deref()),
            advisor_code: non_blank(source.advisor_code.as_deref()).map(str::to_string),
            total_value,
            first_date: self.min_date,
            last_date: self.max_date,
            line_count: self.members.len(),
        })
    }
}

// A record whose date parsed, with its document kind resolved once.
struct DatedRecord<'a> {
    date: NaiveDate,
    kind: DocumentKind,
    record: &'a RawLineRecord,
}

pub struct SaleGrouper<'c> {
    config: &'c GroupingConfig,
}

impl<'c> SaleGrouper<'c> {
    pub fn new(config: &'c GroupingConfig) -> Self {
        Self { config }
    }

    /// Groups the records and keeps only the net-positive groups.
    pub fn group(&self, records: &[RawLineRecord]) -> Vec<UniqueSale> {
        let groups = self.build_groups(records);
        let group_count = groups.len();

        let sales: Vec<UniqueSale> = groups.iter().filter_map(SaleGroup::promote).collect();

        if sales.len() < group_count {
            debug!(
                "Discarded {} of {} groups with zero or negative net value",
                group_count - sales.len(),
                group_count
            );
        }

        sales
    }

    /// Builds every group, including the ones that will not be promoted.
    pub fn build_groups<'a>(&self, records: &'a [RawLineRecord]) -> Vec<SaleGroup<'a>> {
        let mut buckets: BTreeMap<String, Vec<&'a RawLineRecord>> = BTreeMap::new();
        let mut singletons: Vec<&'a RawLineRecord> = Vec::new();

        for record in records {
            match non_blank(record.customer_id.as_deref()) {
                Some(customer_id) => buckets
                    .entry(customer_id.to_string())
                    .or_default()
                    .push(record),
                None => match self.config.unknown_customer_policy {
                    UnknownCustomerPolicy::SharedBucket => buckets
                        .entry(UNKNOWN_LABEL.to_string())
                        .or_default()
                        .push(record),
                    UnknownCustomerPolicy::Singleton => singletons.push(record),
                },
            }
        }

        let mut groups = Vec::new();
        for (customer_id, rows) in &buckets {
            groups.extend(self.group_customer(customer_id, rows));
        }
        for record in singletons {
            groups.extend(self.group_customer(UNKNOWN_LABEL, &[record]));
        }

        groups
    }

    fn group_customer<'a>(
        &self,
        customer_id: &str,
        rows: &[&'a RawLineRecord],
    ) -> Vec<SaleGroup<'a>> {
        let mut dated: Vec<DatedRecord<'a>> = rows
            .iter()
            .filter_map(|&record| self.date_record(customer_id, record))
            .collect();

        // Stable, so lines on the same day keep their input order.
        dated.sort_by_key(|d| d.date);

        let mut consumed = vec![false; dated.len()];
        let mut groups = Vec::new();

        for i in 0..dated.len() {
            if consumed[i] {
                continue;
            }
            consumed[i] = true;

            let anchor = &dated[i];
            let mut members = vec![anchor];

            for j in (i + 1)..dated.len() {
                if consumed[j] {
                    continue;
                }
                let candidate = &dated[j];

                // Sorted by date: every later line is at least this far away.
                if days_between(anchor.date, candidate.date) > self.config.window_days {
                    break;
                }

                if self.can_merge(anchor, candidate) {
                    consumed[j] = true;
                    members.push(candidate);
                }
            }

            groups.push(self.close_group(customer_id, &members));
        }

        groups
    }

    fn date_record<'a>(
        &self,
        customer_id: &str,
        record: &'a RawLineRecord,
    ) -> Option<DatedRecord<'a>> {
        let raw_date = match non_blank(record.date.as_deref()) {
            Some(raw) => raw,
            None => {
                debug!("Dropping line for customer {}: missing date", customer_id);
                return None;
            }
        };

        match parse_record_date(raw_date) {
            Ok(date) => Some(DatedRecord {
                date,
                kind: self.config.document_kind(record.document_class.as_deref()),
                record,
            }),
            Err(e) => {
                debug!("Dropping line for customer {}: {}", customer_id, e);
                None
            }
        }
    }

    fn can_merge(&self, anchor: &DatedRecord<'_>, candidate: &DatedRecord<'_>) -> bool {
        match (anchor.kind, candidate.kind) {
            (DocumentKind::Credit, DocumentKind::Sale) | (DocumentKind::Sale, DocumentKind::Credit) => {
                true
            }
            _ => {
                anchor.record.document_class.as_deref().map(str::trim)
                    == candidate.record.document_class.as_deref().map(str::trim)
            }
        }
    }

    fn close_group<'a>(&self, customer_id: &str, members: &[&DatedRecord<'a>]) -> SaleGroup<'a> {
        let anchor = members[0];
        let classification_index = members
            .iter()
            .position(|m| m.kind == DocumentKind::Sale)
            .unwrap_or(0);

        let min_date = members.iter().map(|m| m.date).min().unwrap_or(anchor.date);
        let max_date = members.iter().map(|m| m.date).max().unwrap_or(anchor.date);

        SaleGroup {
            customer_id: customer_id.to_string(),
            document_class: anchor.record.document_class.clone(),
            members: members.iter().map(|m| m.record).collect(),
            min_date,
            max_date,
            classification_index,
        }
    }
}

pub fn group_sales(records: &[RawLineRecord], config: &GroupingConfig) -> Vec<UniqueSale> {
    SaleGrouper::new(config).group(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(customer: &str, date: &str, class: &str, value: f64) -> RawLineRecord {
        RawLineRecord::new(Some(customer), Some(date), Some(class), value)
    }

    #[test]
    fn test_sale_and_credit_net_to_one_sale() {
        let records = vec![
            line("A", "2024-03-01", "INVOICE", 100_000.0).with_sale_type("credit"),
            line("A", "2024-03-03", "CREDIT_NOTE", -30_000.0),
        ];

        let sales = group_sales(&records, &GroupingConfig::default());
        assert_eq!(sales.len(), 1);
        assert!((sales[0].total_value - 70_000.0).abs() < 0.01);
        assert_eq!(sales[0].sale_type, "CREDIT");
        assert_eq!(sales[0].line_count, 2);
        assert_eq!(
            sales[0].last_date,
            NaiveDate::from_ymd_opt(2024, 3, 3).unwrap()
        );
    }

    #[test]
    fn test_credit_anchor_pulls_in_later_sale() {
        let records = vec![
            line("A", "05/03/2024", "INVOICE", 50_000.0)
                .with_sale_type("cash")
                .with_payment_method("card"),
            line("A", "2024-03-02", "CREDIT_NOTE", 10_000.0)
                .with_sale_type("financed")
                .with_payment_method("loan"),
        ];

        let config = GroupingConfig::default();
        let groups = SaleGrouper::new(&config).build_groups(&records);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].document_class.as_deref(), Some("CREDIT_NOTE"));

        let sale = groups[0].promote().unwrap();
        assert_eq!(sale.sale_type, "CASH");
        assert_eq!(sale.payment_method, "CARD");
        assert!((sale.total_value - 60_000.0).abs() < 0.01);
    }

    #[test]
    fn test_window_is_inclusive() {
        let config = GroupingConfig::default();

        let seven_apart = vec![
            line("A", "2024-03-01", "RECEIPT", 10.0),
            line("A", "2024-03-08", "RECEIPT", 10.0),
        ];
        assert_eq!(SaleGrouper::new(&config).build_groups(&seven_apart).len(), 1);

        let eight_apart = vec![
            line("A", "2024-03-01", "RECEIPT", 10.0),
            line("A", "2024-03-09", "RECEIPT", 10.0),
        ];
        assert_eq!(SaleGrouper::new(&config).build_groups(&eight_apart).len(), 2);
    }

    #[test]
    fn test_window_measured_from_anchor() {
        // Day 0, 5 and 10: the third line is 5 days from the second but 10 from the anchor.
        let records = vec![
            line("A", "2024-03-01", "RECEIPT", 10.0),
            line("A", "2024-03-06", "RECEIPT", 10.0),
            line("A", "2024-03-11", "RECEIPT", 10.0),
        ];
        let config = GroupingConfig::default();
        let groups = SaleGrouper::new(&config).build_groups(&records);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members.len(), 2);
        assert_eq!(groups[1].members.len(), 1);
    }

    #[test]
    fn test_skipped_candidate_stays_available() {
        // The ORDER line is not eligible for the RECEIPT group but anchors its own.
        let records = vec![
            line("A", "2024-03-01", "RECEIPT", 10.0),
            line("A", "2024-03-02", "ORDER", 20.0),
            line("A", "2024-03-03", "RECEIPT", 30.0),
            line("A", "2024-03-04", "ORDER", 40.0),
        ];
        let config = GroupingConfig::default();
        let groups = SaleGrouper::new(&config).build_groups(&records);
        assert_eq!(groups.len(), 2);
        assert!((groups[0].net_value() - 40.0).abs() < 0.01);
        assert!((groups[1].net_value() - 60.0).abs() < 0.01);
    }

    #[test]
    fn test_different_classes_do_not_merge() {
        let records = vec![
            line("A", "2024-03-01", "RECEIPT", 10.0),
            line("A", "2024-03-01", "ORDER", 10.0),
            line("A", "2024-03-01", "INVOICE", 10.0),
        ];
        let sales = group_sales(&records, &GroupingConfig::default());
        assert_eq!(sales.len(), 3);
    }

    #[test]
    fn test_customers_never_merge() {
        let records = vec![
            line("A", "2024-03-01", "INVOICE", 10.0),
            line("B", "2024-03-01", "INVOICE", 10.0),
        ];
        let sales = group_sales(&records, &GroupingConfig::default());
        assert_eq!(sales.len(), 2);
    }

    #[test]
    fn test_unparseable_dates_are_dropped() {
        let records = vec![
            line("A", "not a date", "INVOICE", 500.0),
            RawLineRecord::new(Some("A"), None, Some("INVOICE"), 500.0),
            line("A", "2024-03-01", "INVOICE", 100.0),
        ];
        let sales = group_sales(&records, &GroupingConfig::default());
        assert_eq!(sales.len(), 1);
        assert!((sales[0].total_value - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_classification_falls_back_to_anchor() {
        let records = vec![
            line("A", "2024-03-01", "RECEIPT", 10.0).with_sale_type("partner"),
            line("A", "2024-03-02", "RECEIPT", 10.0).with_sale_type("cash"),
        ];
        let sales = group_sales(&records, &GroupingConfig::default());
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].sale_type, "PARTNER");
        assert_eq!(sales[0].payment_method, UNKNOWN_LABEL);
        assert_eq!(sales[0].advisor_code, None);
    }

    #[test]
    fn test_unknown_customer_policies() {
        let records = vec![
            RawLineRecord::new(None, Some("2024-03-01"), Some("INVOICE"), 10.0),
            RawLineRecord::new(Some("  "), Some("2024-03-02"), Some("INVOICE"), 10.0),
        ];

        let shared = group_sales(&records, &GroupingConfig::default());
        assert_eq!(shared.len(), 1);
        assert_eq!(shared[0].customer_id, UNKNOWN_LABEL);

        let config = GroupingConfig {
            unknown_customer_policy: UnknownCustomerPolicy::Singleton,
            ..GroupingConfig::default()
        };
        let singleton = group_sales(&records, &config);
        assert_eq!(singleton.len(), 2);
        assert!(singleton.iter().all(|s| s.customer_id == UNKNOWN_LABEL));
    }

    #[test]
    fn test_nan_group_is_not_promoted() {
        let records = vec![
            line("A", "2024-03-01", "INVOICE", f64::NAN),
            line("A", "2024-03-02", "CREDIT_NOTE", 50.0),
            line("B", "2024-03-01", "INVOICE", 100.0),
        ];

        let sales = group_sales(&records, &GroupingConfig::default());
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].customer_id, "B");
        assert!((sales[0].total_value - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_input_is_not_reordered() {
        let records = vec![
            line("A", "2024-03-05", "INVOICE", 10.0),
            line("A", "2024-03-01", "INVOICE", 10.0),
        ];
        let before = records.clone();
        let _ = group_sales(&records, &GroupingConfig::default());
        assert_eq!(records, before);
    }
}
