//! Position sizing: lot-aligned buy quantities under a capital cap, and
//! sell-quantity clamping.

use super::TradeError;
use crate::domain::Decimal;

/// Size a buy: cap the budget at `position_limit_pct` of starting capital
/// and whatever cash is available, then floor to whole board lots.
///
/// Returns 0 when the budget cannot cover a single lot; the orchestrator
/// treats a zero quantity as Hold.
///
/// # Errors
/// `InvalidPrice` when price is not strictly positive.
pub fn size_buy(
    price: Decimal,
    cash_available: Decimal,
    starting_capital: Decimal,
    position_limit_pct: Decimal,
    lot_size: i64,
) -> Result<i64, TradeError> {
    if !price.is_positive() {
        return Err(TradeError::InvalidPrice(price.to_canonical_string()));
    }

    let cap = starting_capital * position_limit_pct;
    let budget = if cash_available < cap { cash_available } else { cap };
    if !budget.is_positive() {
        return Ok(0);
    }

    let lot = Decimal::from_i64(lot_size);
    let lots = (budget / price / lot).floor();
    let quantity = (lots * lot)
        .to_i64()
        .ok_or_else(|| TradeError::InvalidPrice(price.to_canonical_string()))?;

    if quantity < lot_size {
        return Ok(0);
    }
    Ok(quantity)
}

/// Size a sell: clamp the requested quantity to the held quantity. A
/// remainder below one lot is retained as-is; only an explicit request for
/// the full holding liquidates it.
///
/// # Errors
/// `InvalidQuantity` when the request is zero or negative, `NoPosition`
/// semantics are handled by the caller (held quantity must be positive
/// before calling).
pub fn size_sell(requested: i64, held: i64) -> Result<i64, TradeError> {
    if requested <= 0 {
        return Err(TradeError::InvalidQuantity(requested));
    }
    Ok(requested.min(held))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_size_buy_worked_example() {
        // 100000 capital, 30% cap, price 16.80: budget 30000,
        // 30000/16.80/100 = 17.857 -> 17 lots -> 1700 shares.
        let qty = size_buy(d("16.80"), d("100000"), d("100000"), d("0.30"), 100).unwrap();
        assert_eq!(qty, 1700);
    }

    #[test]
    fn test_size_buy_lot_too_expensive_for_budget() {
        // One lot at 1680 costs 168000, far above the 30000 budget.
        let qty = size_buy(d("1680"), d("100000"), d("100000"), d("0.30"), 100).unwrap();
        assert_eq!(qty, 0);
    }

    #[test]
    fn test_size_buy_always_lot_multiple() {
        for (price, cash) in [("13.37", "100000"), ("999.5", "45000"), ("3.21", "700")] {
            let qty = size_buy(d(price), d(cash), d("100000"), d("0.30"), 100).unwrap();
            assert_eq!(qty % 100, 0, "qty {} for price {}", qty, price);
            assert!(qty >= 0);
        }
    }

    #[test]
    fn test_size_buy_caps_at_available_cash() {
        // Cap is 30000 but only 10000 cash remains.
        let qty = size_buy(d("50"), d("10000"), d("100000"), d("0.30"), 100).unwrap();
        assert_eq!(qty, 200);
    }

    #[test]
    fn test_size_buy_below_one_lot_is_zero() {
        let qty = size_buy(d("1680"), d("100000"), d("100000"), d("0.001"), 100).unwrap();
        assert_eq!(qty, 0);
    }

    #[test]
    fn test_size_buy_zero_cash_is_zero() {
        let qty = size_buy(d("10"), Decimal::zero(), d("100000"), d("0.30"), 100).unwrap();
        assert_eq!(qty, 0);
    }

    #[test]
    fn test_size_buy_rejects_non_positive_price() {
        assert!(matches!(
            size_buy(Decimal::zero(), d("1000"), d("1000"), d("0.30"), 100),
            Err(TradeError::InvalidPrice(_))
        ));
        assert!(matches!(
            size_buy(d("-5"), d("1000"), d("1000"), d("0.30"), 100),
            Err(TradeError::InvalidPrice(_))
        ));
    }

    #[test]
    fn test_size_sell_clamps_to_held() {
        assert_eq!(size_sell(500, 300).unwrap(), 300);
        assert_eq!(size_sell(200, 300).unwrap(), 200);
        assert_eq!(size_sell(300, 300).unwrap(), 300);
    }

    #[test]
    fn test_size_sell_keeps_sub_lot_remainder() {
        // Selling 100 out of 150 leaves 50 held; the remainder is legal.
        let sold = size_sell(100, 150).unwrap();
        assert_eq!(150 - sold, 50);
    }

    #[test]
    fn test_size_sell_rejects_non_positive_request() {
        assert!(matches!(size_sell(0, 100), Err(TradeError::InvalidQuantity(0))));
        assert!(matches!(size_sell(-10, 100), Err(TradeError::InvalidQuantity(-10))));
    }
}
