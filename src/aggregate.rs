use crate::advisors::AdvisorDirectory;
use crate::error::{Result, SalesCountError};
use crate::schema::{AdvisorAggregateResult, AggregateResult, SalesBucket, UniqueSale};
use crate::utils::{normalize_advisor_code, UNKNOWN_LABEL};
use log::debug;
use std::collections::BTreeMap;

pub fn aggregate_sales(sales: &[UniqueSale]) -> AggregateResult {
    sales
        .iter()
        .fold(AggregateResult::default(), |mut result, sale| {
            result.total_sales_count += 1;
            result.total_sales_value += sale.total_value;
            result
                .by_type
                .entry(sale.sale_type.clone())
                .or_default()
                .add(sale.total_value);
            result
                .by_payment_method
                .entry(sale.payment_method.clone())
                .or_default()
                .add(sale.total_value);
            result
        })
}

/// Aggregates like [`aggregate_sales`] and adds per-advisor and per-advisor-type breakdowns.
///
/// Sales whose advisor maps to a label that is not an advisor type still count
/// in every breakdown except `by_advisor_type`.
pub fn aggregate_sales_by_advisor(
    sales: &[UniqueSale],
    directory: &AdvisorDirectory,
) -> AdvisorAggregateResult {
    let mut result = AdvisorAggregateResult {
        summary: aggregate_sales(sales),
        ..AdvisorAggregateResult::default()
    };

    for sale in sales {
        let advisor_key = sale
            .advisor_code
            .as_deref()
            .and_then(normalize_advisor_code)
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string());

        let advisor = result.by_advisor.entry(advisor_key).or_default();
        advisor.total_count += 1;
        advisor.total_value += sale.total_value;
        advisor
            .by_type
            .entry(sale.sale_type.clone())
            .or_default()
            .add(sale.total_value);

        match directory.classify(sale.advisor_code.as_deref()) {
            Some(advisor_type) => result
                .by_advisor_type
                .entry(advisor_type)
                .or_default()
                .add(sale.total_value),
            None => debug!(
                "Sale of customer {} worth {} (advisor {:?}) is in no advisor-type bucket",
                sale.customer_id, sale.total_value, sale.advisor_code
            ),
        }
    }

    result
}

/// Checks that the type and payment-method breakdowns add up to the totals.
pub fn verify_summary(summary: &AggregateResult, tolerance: f64) -> Result<()> {
    check_breakdown(
        "by_type",
        summary,
        bucket_totals(summary.by_type.values()),
        tolerance,
    )?;
    check_breakdown(
        "by_payment_method",
        summary,
        bucket_totals(summary.by_payment_method.values()),
        tolerance,
    )
}

/// Like [`verify_summary`], plus the advisor breakdowns. The advisor-type buckets
/// are only expected to add up when every advisor resolved to a type.
pub fn verify_advisor_summary(result: &AdvisorAggregateResult, tolerance: f64) -> Result<()> {
    verify_summary(&result.summary, tolerance)?;

    let by_advisor = result
        .by_advisor
        .values()
        .fold((0, 0.0), |(count, value), advisor| {
            (count + advisor.total_count, value + advisor.total_value)
        });
    check_breakdown("by_advisor", &result.summary, by_advisor, tolerance)?;

    for (code, advisor) in &result.by_advisor {
        let (count, value) = bucket_totals(advisor.by_type.values());
        if count != advisor.total_count || (value - advisor.total_value).abs() > tolerance {
            return Err(SalesCountError::BreakdownMismatch {
                breakdown: format!("by_advisor[{}].by_type", code),
                expected_count: advisor.total_count,
                expected_value: advisor.total_value,
                actual_count: count,
                actual_value: value,
            });
        }
    }

    check_breakdown(
        "by_advisor_type",
        &result.summary,
        bucket_totals(result.by_advisor_type.values()),
        tolerance,
    )
}

fn bucket_totals<'a>(buckets: impl Iterator<Item = &'a SalesBucket>) -> (usize, f64) {
    buckets.fold((0, 0.0), |(count, value), bucket| {
        (count + bucket.count, value + bucket.value)
    })
}

fn check_breakdown(
    breakdown: &str,
    summary: &AggregateResult,
    (actual_count, actual_value): (usize, f64),
    tolerance: f64,
) -> Result<()> {
    if actual_count != summary.total_sales_count
        || (actual_value - summary.total_sales_value).abs() > tolerance
    {
        return Err(SalesCountError::BreakdownMismatch {
            breakdown: breakdown.to_string(),
            expected_count: summary.total_sales_count,
            expected_value: summary.total_sales_value,
            actual_count,
            actual_value,
        });
    }
    Ok(())
}
