// 📊 Aggregation Engine - calendar buckets, gap filling, category shares
//
// Rollup is a single forward pass: each record is compared only with the
// last bucket built so far, so input must be sorted ascending by date.

use crate::errors::LedgerError;
use crate::record::{Record, TimeUnit};
use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// ROLLUP
// ============================================================================

/// Merge consecutive records of the same period into one bucket.
///
/// Week buckets are anchored on the Monday of their ISO week, month buckets
/// on the first of the month. Amounts are summed; merchant and category are
/// taken from the first record of the bucket. `Day` returns the input as is.
///
/// Unsorted input is rejected with `LedgerError::UnsortedRecords`.
pub fn merge_by_period(records: &[Record], unit: TimeUnit) -> Result<Vec<Record>> {
    if let Some(index) = first_unsorted(records) {
        return Err(LedgerError::UnsortedRecords { index }.into());
    }

    if unit == TimeUnit::Day {
        return Ok(records.to_vec());
    }

    let mut merged: Vec<Record> = Vec::new();
    for record in records {
        match merged.last_mut() {
            Some(bucket) if unit.same_period(bucket.date, record.date) => {
                bucket.amount += record.amount;
            }
            _ => {
                let mut bucket = record.clone();
                bucket.date = unit.align(record.date);
                merged.push(bucket);
            }
        }
    }

    Ok(merged)
}

fn first_unsorted(records: &[Record]) -> Option<usize> {
    records
        .windows(2)
        .position(|pair| pair[1].date < pair[0].date)
        .map(|i| i + 1)
}

// ============================================================================
// GAP FILL
// ============================================================================

/// One bucket per period from `align(start)` through the period holding `end`.
///
/// A record whose date equals an anchor fills that bucket (several such
/// records are summed); every other anchor gets a zero-amount record for
/// `category`. Records that sit on no anchor in range are dropped.
pub fn gap_fill(
    category: &str,
    records: &[Record],
    unit: TimeUnit,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<Record> {
    let mut by_anchor: BTreeMap<NaiveDate, Record> = BTreeMap::new();
    for record in records {
        by_anchor
            .entry(record.date)
            .and_modify(|bucket| bucket.amount += record.amount)
            .or_insert_with(|| record.clone());
    }

    let mut filled = Vec::new();
    let last = unit.align(end);
    let mut anchor = unit.align(start);

    while anchor <= last {
        let bucket = by_anchor
            .remove(&anchor)
            .unwrap_or_else(|| Record::empty_bucket(anchor, category));
        filled.push(bucket);

        match unit.step(anchor) {
            Some(next) => anchor = next,
            None => break,
        }
    }

    filled
}

// ============================================================================
// CATEGORY SHARES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: String,
    pub amount: f64,
    /// 100 * amount / grand total
    pub percentage: f64,
}

/// Total per category and its share of the grand total, largest first
/// (ties ordered by category name)
pub fn percentage_by_category(records: &[Record]) -> Vec<CategoryShare> {
    let mut totals: HashMap<&str, f64> = HashMap::new();
    for record in records {
        *totals.entry(record.category.as_str()).or_insert(0.0) += record.amount;
    }

    let grand_total: f64 = totals.values().sum();

    let mut shares: Vec<CategoryShare> = totals
        .into_iter()
        .map(|(category, amount)| CategoryShare {
            category: category.to_string(),
            amount,
            percentage: if grand_total == 0.0 {
                0.0
            } else {
                100.0 * amount / grand_total
            },
        })
        .collect();

    shares.sort_by(|a, b| {
        b.amount
            .total_cmp(&a.amount)
            .then_with(|| a.category.cmp(&b.category))
    });

    shares
}

/// Split records into one series per category, keeping their order
pub fn group_by_category(records: &[Record]) -> BTreeMap<String, Vec<Record>> {
    let mut groups: BTreeMap<String, Vec<Record>> = BTreeMap::new();
    for record in records {
        groups
            .entry(record.category.clone())
            .or_default()
            .push(record.clone());
    }
    groups
}

// ============================================================================
// TESTS
// ============================================================================
