//! Expense split computation and validation.
//!
//! Remainder rule: whenever a total does not divide evenly, participants are
//! ordered by user id ascending, everyone receives the floor of their ideal
//! share in minor units, and the leftover minor units go one each to the
//! first participants in that order. 100.00 across `a`, `b`, `c` therefore
//! yields 33.34, 33.33, 33.33.

use crate::core::errors::SplitRejection;
use crate::core::models::expense::{
    EqualLine, ExactLine, ExpenseSplit, PercentageLine, ShareLine, SplitInput,
};
use crate::core::money::Money;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::BTreeSet;

/// Largest deviation a caller-supplied share may have from its ideal value.
const LINE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Stateless split service.
pub struct SplitCalculator;

impl SplitCalculator {
    /// Validates `input` against `active_members` and returns one split per
    /// participant, sorted by user id. The amounts always sum to `total`.
    pub fn compute_or_validate(
        &self,
        total: Money,
        input: &SplitInput,
        active_members: &[String],
    ) -> Result<Vec<ExpenseSplit>, SplitRejection> {
        if !total.is_positive() {
            return Err(SplitRejection::NonPositiveTotal);
        }

        let splits = match input {
            SplitInput::Equal { splits: None }
            | SplitInput::Percentage { splits: None }
            | SplitInput::Exact { splits: None } => Self::split_across_members(total, active_members, None)?,
            SplitInput::Shares { splits: None } => Self::split_across_members(total, active_members, Some(1))?,
            SplitInput::Equal { splits: Some(lines) } => Self::equal(total, lines, active_members)?,
            SplitInput::Percentage { splits: Some(lines) } => Self::percentage(total, lines, active_members)?,
            SplitInput::Shares { splits: Some(lines) } => Self::shares(total, lines, active_members)?,
            SplitInput::Exact { splits: Some(lines) } => Self::exact(lines, active_members)?,
        };

        let found: Money = splits.iter().map(|s| s.amount).sum();
        if found != total {
            return Err(SplitRejection::SumMismatch {
                strategy: input.strategy(),
                expected: total,
                found,
            });
        }
        Ok(splits)
    }

    /// Equal allocation of `total` over `ids`, which must already be sorted.
    pub fn equal_allocation(total: Money, ids: &[String]) -> Vec<Money> {
        if ids.is_empty() {
            return Vec::new();
        }
        let n = ids.len() as i64;
        let base = total.minor_units().div_euclid(n);
        let leftover = total.minor_units().rem_euclid(n);
        (0..n)
            .map(|i| Money::from_minor(if i < leftover { base + 1 } else { base }))
            .collect()
    }

    /// Allocation of `total` proportional to `weights` (sorted by id, all
    /// positive) under the remainder rule.
    pub fn weighted_allocation(total: Money, weights: &[Decimal]) -> Vec<Money> {
        let weight_sum: Decimal = weights.iter().copied().sum();
        if weights.is_empty() || weight_sum <= Decimal::ZERO {
            return vec![Money::ZERO; weights.len()];
        }
        let units = Decimal::from(total.minor_units());
        let mut floors: Vec<i64> = weights
            .iter()
            .map(|w| (units * *w / weight_sum).floor().to_i64().unwrap_or(0))
            .collect();
        let mut leftover = total.minor_units() - floors.iter().sum::<i64>();
        for floor in floors.iter_mut() {
            if leftover <= 0 {
                break;
            }
            *floor += 1;
            leftover -= 1;
        }
        floors.into_iter().map(Money::from_minor).collect()
    }

    fn split_across_members(
        total: Money,
        active_members: &[String],
        shares: Option<u32>,
    ) -> Result<Vec<ExpenseSplit>, SplitRejection> {
        let ids: Vec<String> = active_members
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if ids.is_empty() {
            return Err(SplitRejection::NoParticipants);
        }
        let amounts = Self::equal_allocation(total, &ids);
        Ok(ids
            .into_iter()
            .zip(amounts)
            .map(|(user_id, amount)| ExpenseSplit {
                user_id,
                amount,
                percentage: None,
                shares,
            })
            .collect())
    }

    fn equal(total: Money, lines: &[EqualLine], active_members: &[String]) -> Result<Vec<ExpenseSplit>, SplitRejection> {
        let lines = sorted_lines(lines, |l| &l.user_id);
        check_participants(lines.iter().map(|l| l.user_id.as_str()), active_members)?;

        let ids: Vec<String> = lines.iter().map(|l| l.user_id.clone()).collect();
        let allocation = Self::equal_allocation(total, &ids);
        let ideal = total.to_decimal() / Decimal::from(lines.len() as u64);

        lines
            .iter()
            .zip(allocation)
            .map(|(line, allocated)| {
                let amount = match line.amount {
                    Some(given) => {
                        check_non_negative(&line.user_id, given)?;
                        if !within_tolerance(given, ideal) {
                            return Err(SplitRejection::EqualMismatch {
                                user_id: line.user_id.clone(),
                                expected: ideal.round_dp(2),
                                found: given,
                            });
                        }
                        given
                    }
                    None => allocated,
                };
                Ok(ExpenseSplit {
                    user_id: line.user_id.clone(),
                    amount,
                    percentage: None,
                    shares: None,
                })
            })
            .collect()
    }

    fn percentage(
        total: Money,
        lines: &[PercentageLine],
        active_members: &[String],
    ) -> Result<Vec<ExpenseSplit>, SplitRejection> {
        let lines = sorted_lines(lines, |l| &l.user_id);
        check_participants(lines.iter().map(|l| l.user_id.as_str()), active_members)?;

        for line in &lines {
            if line.percentage <= Decimal::ZERO || line.percentage > Decimal::ONE_HUNDRED {
                return Err(SplitRejection::PercentageOutOfRange {
                    user_id: line.user_id.clone(),
                    percentage: line.percentage,
                });
            }
        }
        let percentage_sum: Decimal = lines.iter().map(|l| l.percentage).sum();
        if (percentage_sum - Decimal::ONE_HUNDRED).abs() > LINE_TOLERANCE {
            return Err(SplitRejection::PercentageSumInvalid { total: percentage_sum });
        }

        let weights: Vec<Decimal> = lines.iter().map(|l| l.percentage).collect();
        let allocation = Self::weighted_allocation(total, &weights);

        lines
            .iter()
            .zip(allocation)
            .map(|(line, allocated)| {
                let expected = line.percentage / Decimal::ONE_HUNDRED * total.to_decimal();
                let amount = match line.amount {
                    Some(given) => {
                        check_non_negative(&line.user_id, given)?;
                        if !within_tolerance(given, expected) {
                            return Err(SplitRejection::PercentageAmountMismatch {
                                user_id: line.user_id.clone(),
                                expected: expected.round_dp(2),
                                found: given,
                            });
                        }
                        given
                    }
                    None => allocated,
                };
                Ok(ExpenseSplit {
                    user_id: line.user_id.clone(),
                    amount,
                    percentage: Some(line.percentage),
                    shares: None,
                })
            })
            .collect()
    }

    fn shares(total: Money, lines: &[ShareLine], active_members: &[String]) -> Result<Vec<ExpenseSplit>, SplitRejection> {
        let lines = sorted_lines(lines, |l| &l.user_id);
        check_participants(lines.iter().map(|l| l.user_id.as_str()), active_members)?;

        if let Some(line) = lines.iter().find(|l| l.shares == 0) {
            return Err(SplitRejection::SharesInvalid {
                user_id: line.user_id.clone(),
            });
        }
        let weights: Vec<Decimal> = lines.iter().map(|l| Decimal::from(l.shares)).collect();
        let share_total: Decimal = weights.iter().copied().sum();
        let allocation = Self::weighted_allocation(total, &weights);

        lines
            .iter()
            .zip(weights.iter().zip(allocation))
            .map(|(line, (weight, allocated))| {
                let expected = total.to_decimal() * *weight / share_total;
                let amount = match line.amount {
                    Some(given) => {
                        check_non_negative(&line.user_id, given)?;
                        if !within_tolerance(given, expected) {
                            return Err(SplitRejection::SharesAmountMismatch {
                                user_id: line.user_id.clone(),
                                expected: expected.round_dp(2),
                                found: given,
                            });
                        }
                        given
                    }
                    None => allocated,
                };
                Ok(ExpenseSplit {
                    user_id: line.user_id.clone(),
                    amount,
                    percentage: None,
                    shares: Some(line.shares),
                })
            })
            .collect()
    }

    fn exact(lines: &[ExactLine], active_members: &[String]) -> Result<Vec<ExpenseSplit>, SplitRejection> {
        let lines = sorted_lines(lines, |l| &l.user_id);
        check_participants(lines.iter().map(|l| l.user_id.as_str()), active_members)?;

        lines
            .iter()
            .map(|line| {
                check_non_negative(&line.user_id, line.amount)?;
                Ok(ExpenseSplit {
                    user_id: line.user_id.clone(),
                    amount: line.amount,
                    percentage: None,
                    shares: None,
                })
            })
            .collect()
    }
}

fn sorted_lines<T: Clone>(lines: &[T], key: impl Fn(&T) -> &String) -> Vec<T> {
    let mut sorted = lines.to_vec();
    sorted.sort_by(|a, b| key(a).cmp(key(b)));
    sorted
}

fn check_participants<'a>(
    ids: impl Iterator<Item = &'a str>,
    active_members: &[String],
) -> Result<(), SplitRejection> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if !active_members.iter().any(|m| m == id) {
            return Err(SplitRejection::NonMemberParticipant { user_id: id.to_string() });
        }
        if !seen.insert(id) {
            return Err(SplitRejection::DuplicateParticipant { user_id: id.to_string() });
        }
    }
    if seen.is_empty() {
        return Err(SplitRejection::NoParticipants);
    }
    Ok(())
}

fn check_non_negative(user_id: &str, amount: Money) -> Result<(), SplitRejection> {
    if amount.is_negative() {
        return Err(SplitRejection::NegativeShare {
            user_id: user_id.to_string(),
        });
    }
    Ok(())
}

fn within_tolerance(given: Money, ideal: Decimal) -> bool {
    (given.to_decimal() - ideal).abs() <= LINE_TOLERANCE
}
