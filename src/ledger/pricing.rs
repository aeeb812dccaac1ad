use serde::{Deserialize, Serialize};

use crate::model::{Money, Pricing};

use super::LedgerError;

/// Derived financial fields of a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub total_cost: Money,
    pub profit: Money,
}

/// `total_cost = distance * price_per_km + driver_cost + max(days - 1, 0) * extra_day_cost`
/// and `profit = total_cost - distance * mileage - driver_cost`.
///
/// Pure: identical inputs always produce identical output.
pub fn quote(pricing: &Pricing, distance_km: u32, total_days: u32) -> Result<Quote, LedgerError> {
    let overflow = || LedgerError::Validation("trip cost out of range".into());
    let distance = i64::from(distance_km);
    let extra_days = i64::from(total_days.saturating_sub(1));

    let total_cost = pricing
        .price_per_km
        .checked_mul(distance)
        .and_then(|km| km.checked_add(pricing.driver_cost))
        .and_then(|c| {
            pricing
                .extra_day_cost
                .checked_mul(extra_days)
                .and_then(|extra| c.checked_add(extra))
        })
        .ok_or_else(overflow)?;

    let profit = pricing
        .mileage
        .checked_mul(distance)
        .and_then(|running| total_cost.checked_sub(running))
        .and_then(|p| p.checked_sub(pricing.driver_cost))
        .ok_or_else(overflow)?;

    Ok(Quote { total_cost, profit })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pricing() -> Pricing {
        Pricing {
            price_per_km: Money(10),
            driver_cost: Money(50),
            extra_day_cost: Money(20),
            mileage: Money(5),
        }
    }

    #[test]
    fn worked_example() {
        let q = quote(&pricing(), 100, 3).unwrap();
        assert_eq!(q.total_cost, Money(1090));
        assert_eq!(q.profit, Money(540));
    }

    #[test]
    fn single_day_has_no_extra_day_cost() {
        let q = quote(&pricing(), 100, 1).unwrap();
        assert_eq!(q.total_cost, Money(1050));
        assert_eq!(q.profit, Money(500));
    }

    #[test]
    fn zero_days_clamps_to_no_extra() {
        assert_eq!(quote(&pricing(), 10, 0).unwrap(), quote(&pricing(), 10, 1).unwrap());
    }

    #[test]
    fn deterministic() {
        let a = quote(&pricing(), 321, 7).unwrap();
        let b = quote(&pricing(), 321, 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn profit_can_be_negative() {
        let p = Pricing {
            price_per_km: Money(4),
            driver_cost: Money(0),
            extra_day_cost: Money(0),
            mileage: Money(6),
        };
        let q = quote(&p, 100, 1).unwrap();
        assert_eq!(q.total_cost, Money(400));
        assert_eq!(q.profit, Money(-200));
    }

    #[test]
    fn overflow_is_validation_error() {
        let p = Pricing {
            price_per_km: Money(i64::MAX),
            ..pricing()
        };
        assert!(matches!(quote(&p, 2, 1), Err(LedgerError::Validation(_))));
    }
}
