use crate::entities::product;
use crate::errors::ServiceError;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use uuid::Uuid;

/// One priced line, using the catalog offer price at pricing time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl PricedLine {
    pub fn from_product(product: &product::Model, quantity: u32) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            unit_price: product.offer_price,
            quantity,
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPricing {
    pub lines: Vec<PricedLine>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Tax is floored to a whole amount before it is added.
pub fn compute_tax(subtotal: Decimal, rate: Decimal) -> Decimal {
    (subtotal * rate).floor()
}

pub fn price_lines(lines: Vec<PricedLine>, tax_rate: Decimal) -> OrderPricing {
    let subtotal: Decimal = lines.iter().map(PricedLine::line_total).sum();
    let tax = compute_tax(subtotal, tax_rate);
    OrderPricing {
        lines,
        subtotal,
        tax,
        total: subtotal + tax,
    }
}

/// Converts a major-unit amount to gateway minor units, flooring fractions of a cent.
pub fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    (amount * Decimal::ONE_HUNDRED)
        .floor()
        .to_i64()
        .ok_or_else(|| ServiceError::ValidationError(format!("Amount {} is out of range", amount)))
}

/// Label of the synthetic tax line shown on the hosted checkout, e.g. "Tax (2%)"
pub fn tax_label(rate: Decimal) -> String {
    format!("Tax ({}%)", (rate * Decimal::ONE_HUNDRED).normalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn line(unit_price: Decimal, quantity: u32) -> PricedLine {
        PricedLine {
            product_id: Uuid::new_v4(),
            name: "Apple".into(),
            unit_price,
            quantity,
        }
    }

    #[test]
    fn two_units_at_one_hundred_total_204() {
        let pricing = price_lines(vec![line(dec!(100), 2)], dec!(0.02));
        assert_eq!(pricing.subtotal, dec!(200));
        assert_eq!(pricing.tax, dec!(4));
        assert_eq!(pricing.total, dec!(204));
    }

    #[test]
    fn tax_is_floored() {
        // 3 * 12.50 = 37.50, 2% = 0.75, floored to 0
        let pricing = price_lines(vec![line(dec!(12.50), 3)], dec!(0.02));
        assert_eq!(pricing.tax, dec!(0));
        assert_eq!(pricing.total, dec!(37.50));

        assert_eq!(compute_tax(dec!(149.99), dec!(0.02)), dec!(2));
    }

    #[test]
    fn minor_units_floor_fractions_of_a_cent() {
        assert_eq!(to_minor_units(dec!(19.99)).unwrap(), 1999);
        assert_eq!(to_minor_units(dec!(0.019)).unwrap(), 1);
        assert_eq!(to_minor_units(dec!(4)).unwrap(), 400);
    }

    #[test]
    fn tax_label_uses_percentage() {
        assert_eq!(tax_label(dec!(0.02)), "Tax (2%)");
        assert_eq!(tax_label(dec!(0.075)), "Tax (7.5%)");
    }

    proptest! {
        #[test]
        fn total_is_subtotal_plus_floored_tax(
            items in prop::collection::vec((0u32..1_000_000u32, 1u32..50u32), 1..8)
        ) {
            let lines: Vec<PricedLine> = items
                .iter()
                .map(|(cents, qty)| line(Decimal::new(i64::from(*cents), 2), *qty))
                .collect();
            let expected_subtotal: Decimal = lines
                .iter()
                .map(|l| l.unit_price * Decimal::from(l.quantity))
                .sum();

            let pricing = price_lines(lines, dec!(0.02));

            prop_assert_eq!(pricing.subtotal, expected_subtotal);
            prop_assert_eq!(pricing.tax, (expected_subtotal * dec!(0.02)).floor());
            prop_assert_eq!(pricing.total, pricing.subtotal + pricing.tax);
            prop_assert!(pricing.tax <= pricing.subtotal * dec!(0.02));
            prop_assert!(pricing.tax >= Decimal::ZERO);
        }
    }
}
