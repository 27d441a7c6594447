//! Lay-buy (installment plan) models

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// State of an order's lay-buy plan
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LaybuyStatus {
    #[default]
    None,
    Active,
    Overdue,
    Completed,
}

impl LaybuyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LaybuyStatus::None => "none",
            LaybuyStatus::Active => "active",
            LaybuyStatus::Overdue => "overdue",
            LaybuyStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "none" => Some(LaybuyStatus::None),
            "active" => Some(LaybuyStatus::Active),
            "overdue" => Some(LaybuyStatus::Overdue),
            "completed" => Some(LaybuyStatus::Completed),
            _ => None,
        }
    }

    /// Plans that still accept installments
    pub fn is_open(&self) -> bool {
        matches!(self, LaybuyStatus::Active | LaybuyStatus::Overdue)
    }
}

/// Lay-buy term options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LaybuyTerms {
    #[serde(rename = "30_days")]
    Days30,
    #[serde(rename = "60_days")]
    Days60,
    #[serde(rename = "90_days")]
    Days90,
    #[serde(rename = "custom")]
    Custom,
}

impl LaybuyTerms {
    pub fn as_str(&self) -> &'static str {
        match self {
            LaybuyTerms::Days30 => "30_days",
            LaybuyTerms::Days60 => "60_days",
            LaybuyTerms::Days90 => "90_days",
            LaybuyTerms::Custom => "custom",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "30_days" => Some(LaybuyTerms::Days30),
            "60_days" => Some(LaybuyTerms::Days60),
            "90_days" => Some(LaybuyTerms::Days90),
            "custom" => Some(LaybuyTerms::Custom),
            _ => None,
        }
    }

    /// Length of the term in days; custom terms carry an explicit date instead
    pub fn term_days(&self) -> Option<u64> {
        match self {
            LaybuyTerms::Days30 => Some(30),
            LaybuyTerms::Days60 => Some(60),
            LaybuyTerms::Days90 => Some(90),
            LaybuyTerms::Custom => None,
        }
    }
}

impl std::fmt::Display for LaybuyTerms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaybuyTerms::Days30 => write!(f, "30 Days"),
            LaybuyTerms::Days60 => write!(f, "60 Days"),
            LaybuyTerms::Days90 => write!(f, "90 Days"),
            LaybuyTerms::Custom => write!(f, "Custom"),
        }
    }
}

/// Compute the lay-buy due date.
///
/// Fixed terms count from `today`; `Custom` requires `custom_date`, which must
/// lie after `today`. Returns `None` when no valid date can be produced.
pub fn compute_due_date(
    terms: LaybuyTerms,
    today: NaiveDate,
    custom_date: Option<NaiveDate>,
) -> Option<NaiveDate> {
    match terms.term_days() {
        Some(days) => today.checked_add_days(Days::new(days)),
        None => custom_date.filter(|date| *date > today),
    }
}

/// A plan is overdue when its due date has passed with money still owing
pub fn is_overdue(due_date: Option<NaiveDate>, today: NaiveDate, balance: Decimal) -> bool {
    match due_date {
        Some(due) => due < today && balance > Decimal::ZERO,
        None => false,
    }
}

/// Lay-buy status as it should read on `today`, without persisting anything
pub fn effective_status(
    status: LaybuyStatus,
    due_date: Option<NaiveDate>,
    today: NaiveDate,
    balance: Decimal,
) -> LaybuyStatus {
    match status {
        LaybuyStatus::Active | LaybuyStatus::Overdue => {
            if is_overdue(due_date, today, balance) {
                LaybuyStatus::Overdue
            } else {
                LaybuyStatus::Active
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_fixed_term_due_dates() {
        let today = date(2026, 1, 1);
        assert_eq!(compute_due_date(LaybuyTerms::Days30, today, None), Some(date(2026, 1, 31)));
        assert_eq!(compute_due_date(LaybuyTerms::Days60, today, None), Some(date(2026, 3, 2)));
        assert_eq!(compute_due_date(LaybuyTerms::Days90, today, None), Some(date(2026, 4, 1)));
    }

    #[test]
    fn test_fixed_term_ignores_custom_date() {
        let today = date(2026, 1, 1);
        let due = compute_due_date(LaybuyTerms::Days30, today, Some(date(2027, 1, 1)));
        assert_eq!(due, Some(date(2026, 1, 31)));
    }

    #[test]
    fn test_custom_term_requires_future_date() {
        let today = date(2026, 5, 10);
        assert_eq!(compute_due_date(LaybuyTerms::Custom, today, None), None);
        assert_eq!(compute_due_date(LaybuyTerms::Custom, today, Some(today)), None);
        assert_eq!(
            compute_due_date(LaybuyTerms::Custom, today, Some(date(2026, 6, 1))),
            Some(date(2026, 6, 1))
        );
    }

    #[test]
    fn test_overdue_detection() {
        let today = date(2026, 5, 10);
        assert!(is_overdue(Some(date(2026, 5, 9)), today, Decimal::from(150)));
        assert!(!is_overdue(Some(date(2026, 5, 10)), today, Decimal::from(150)));
        assert!(!is_overdue(Some(date(2026, 5, 9)), today, Decimal::ZERO));
        assert!(!is_overdue(None, today, Decimal::from(150)));
    }

    #[test]
    fn test_effective_status_leaves_closed_plans_alone() {
        let today = date(2026, 5, 10);
        let past = Some(date(2026, 1, 1));
        assert_eq!(
            effective_status(LaybuyStatus::Completed, past, today, Decimal::from(10)),
            LaybuyStatus::Completed
        );
        assert_eq!(
            effective_status(LaybuyStatus::Active, past, today, Decimal::from(10)),
            LaybuyStatus::Overdue
        );
        assert_eq!(
            effective_status(LaybuyStatus::Overdue, past, today, Decimal::ZERO),
            LaybuyStatus::Active
        );
    }

    #[test]
    fn test_terms_serde_names() {
        let json = serde_json::to_string(&LaybuyTerms::Days60).unwrap();
        assert_eq!(json, "\"60_days\"");
        let parsed: LaybuyTerms = serde_json::from_str("\"custom\"").unwrap();
        assert_eq!(parsed, LaybuyTerms::Custom);
    }
}
