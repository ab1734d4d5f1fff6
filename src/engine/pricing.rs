use rust_decimal::prelude::*;

use crate::error::AppError;
use crate::models::zone::ServiceZone;

/// Fees keep four fractional digits, rounded half-up.
pub const FEE_DECIMAL_PLACES: u32 = 4;

/// Upper bound, in whole currency units, for a zone's base and per-km fee.
pub const MAX_FEE_UNITS: i64 = 1_000_000_000;

/// `base_fee + fee_per_km * distance_km` for a single pickup-to-dropoff leg.
pub fn delivery_fee(zone: &ServiceZone, distance_km: f64) -> Result<Decimal, AppError> {
    let distance = Decimal::from_f64(distance_km.max(0.0)).ok_or_else(|| {
        AppError::Validation(format!("distance {distance_km} km cannot be priced"))
    })?;

    zone.fee_per_km
        .checked_mul(distance)
        .and_then(|variable| zone.base_fee.checked_add(variable))
        .map(|fee| {
            fee.round_dp_with_strategy(FEE_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        })
        .ok_or_else(|| {
            AppError::Validation(format!(
                "fee overflow: zone {} cannot price a {distance_km:.2} km leg",
                zone.name
            ))
        })
}

/// Prices the leg, rejecting it when the zone caps delivery distance.
pub fn price_leg(zone: &ServiceZone, distance_km: f64) -> Result<Decimal, AppError> {
    if let Some(max_km) = zone.max_distance_km {
        if distance_km > max_km {
            return Err(AppError::Validation(format!(
                "too far: delivery distance {distance_km:.2} km exceeds zone maximum of {max_km} km"
            )));
        }
    }

    delivery_fee(zone, distance_km)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::{delivery_fee, price_leg};
    use crate::error::AppError;
    use crate::geo::GeoPoint;
    use crate::models::zone::ServiceZone;

    fn zone(base: i64, per_km: i64, max_distance_km: Option<f64>) -> ServiceZone {
        ServiceZone {
            id: Uuid::new_v4(),
            name: "Yaba".to_string(),
            center: GeoPoint::new(6.5, 3.3),
            radius_km: 5.0,
            active: true,
            base_fee: Decimal::new(base, 0),
            fee_per_km: Decimal::new(per_km, 0),
            max_distance_km,
            min_order_amount: None,
            surge: false,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn zero_distance_costs_base_fee() {
        assert_eq!(
            delivery_fee(&zone(500, 50, None), 0.0).unwrap(),
            Decimal::new(500, 0)
        );
    }

    #[test]
    fn three_km_leg_costs_650() {
        assert_eq!(
            delivery_fee(&zone(500, 50, None), 3.0).unwrap(),
            Decimal::new(650, 0)
        );
    }

    #[test]
    fn fee_is_non_decreasing_in_distance() {
        let z = zone(500, 50, None);
        let mut previous = delivery_fee(&z, 0.0).unwrap();
        for step in 1..=200 {
            let fee = delivery_fee(&z, step as f64 * 0.137).unwrap();
            assert!(fee >= previous, "fee dropped at step {step}");
            previous = fee;
        }
    }

    #[test]
    fn rounds_half_up_to_four_places() {
        let z = ServiceZone {
            base_fee: Decimal::ZERO,
            fee_per_km: Decimal::new(1, 4),
            ..zone(0, 0, None)
        };
        // 0.00005 sits exactly on the midpoint; half-even would give zero.
        assert_eq!(delivery_fee(&z, 0.5).unwrap(), Decimal::new(1, 4));
        assert_eq!(delivery_fee(&z, 0.25).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn beyond_max_distance_is_too_far() {
        let z = zone(500, 50, Some(4.0));
        assert!(price_leg(&z, 3.99).is_ok());

        let err = price_leg(&z, 4.5).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.to_string().contains("too far"));
    }

    #[test]
    fn overflowing_fee_schedule_is_rejected_not_panicking() {
        let z = ServiceZone {
            fee_per_km: Decimal::MAX,
            ..zone(500, 0, None)
        };
        let err = delivery_fee(&z, 3.0).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.to_string().contains("fee overflow"));

        let z = ServiceZone {
            base_fee: Decimal::MAX,
            fee_per_km: Decimal::ONE,
            ..zone(0, 0, None)
        };
        assert!(price_leg(&z, 1.0).is_err());
    }

    #[test]
    fn largest_allowed_schedule_prices_an_earth_sized_leg() {
        let z = zone(super::MAX_FEE_UNITS, super::MAX_FEE_UNITS, None);
        assert!(delivery_fee(&z, 20_037.5).is_ok());
    }
}
