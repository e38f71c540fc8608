use rust_decimal::Decimal;

/// Split `total` in proportion to `weights`, rounding every share but the
/// last to `dp` places. The last share takes the remainder, so the shares
/// always sum to `total`. All-zero weights split evenly.
pub fn allocate(total: Decimal, weights: &[Decimal], dp: u32) -> Vec<Decimal> {
    let Some(last) = weights.len().checked_sub(1) else {
        return Vec::new();
    };
    let sum: Decimal = weights.iter().sum();
    let even = Decimal::ONE;
    let (weights, sum): (Vec<Decimal>, Decimal) = if sum.is_zero() {
        (vec![even; weights.len()], Decimal::from(weights.len()))
    } else {
        (weights.to_vec(), sum)
    };

    let mut shares = Vec::with_capacity(weights.len());
    let mut assigned = Decimal::ZERO;
    for weight in &weights[..last] {
        let share = (total * weight / sum).round_dp(dp);
        assigned += share;
        shares.push(share);
    }
    shares.push(total - assigned);
    shares
}
