//! Coin amounts. Users type decimal coins; everything else is satoshis.

/// Satoshis per coin.
pub const COIN: u64 = 100_000_000;

/// Maximum number of fractional digits accepted in a coin amount.
pub const MAX_DECIMALS: usize = 8;

/// Smallest amount that can be delegated (0.00001 coin).
pub const MIN_AMOUNT: u64 = 1_000;

/// Parse a decimal coin string to satoshis.
///
/// Accepts `12`, `12.5`, `.5` and `12.`; rejects signs, exponents, more than
/// eight fractional digits and values that overflow `u64`.
pub fn parse_coins(s: &str) -> Option<u64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (int, frac) = match s.split_once('.') {
        Some((int, frac)) => (int, frac),
        None => (s, ""),
    };

    if int.is_empty() && frac.is_empty() {
        return None;
    }
    if frac.len() > MAX_DECIMALS
        || !int.chars().all(|c| c.is_ascii_digit())
        || !frac.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let whole: u64 = if int.is_empty() { 0 } else { int.parse().ok()? };
    let frac_padded = format!("{:0<8}", frac);
    let frac: u64 = frac_padded.parse().ok()?;

    whole.checked_mul(COIN)?.checked_add(frac)
}

/// Format satoshis as a plain coin string with trailing zeros removed,
/// suitable for request bodies and for refilling an input field.
pub fn format_coins(satoshis: u64) -> String {
    let whole = satoshis / COIN;
    let frac = satoshis % COIN;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:08}", frac);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Format satoshis with all eight decimals and a unit, for display.
pub fn display_coins(satoshis: u64, unit: &str) -> String {
    format!("{}.{:08} {}", satoshis / COIN, satoshis % COIN, unit)
}
