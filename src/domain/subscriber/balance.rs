//! Balance encoding
//!
//! Balances arrive as currency-formatted text (`"$1,234.56"`) and are written
//! back as plain numbers (`"1234.56"`).

/// Parses a currency-formatted balance. Unparseable input yields `0.0`.
pub fn parse_balance(raw: &str) -> f64 {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ','))
        .collect();

    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

/// Formats a balance as a plain numeric string without currency symbol
pub fn format_balance(value: f64) -> String {
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_currency_formatted() {
        assert_eq!(parse_balance("$1,234.56"), 1234.56);
        assert_eq!(parse_balance("$3,946.45"), 3946.45);
        assert_eq!(parse_balance(" $12.00 "), 12.0);
        assert_eq!(parse_balance("-$5.25"), -5.25);
    }

    #[test]
    fn test_parse_plain_number() {
        assert_eq!(parse_balance("1234.5"), 1234.5);
        assert_eq!(parse_balance("0"), 0.0);
    }

    #[test]
    fn test_parse_garbage_defaults_to_zero() {
        assert_eq!(parse_balance("abc"), 0.0);
        assert_eq!(parse_balance(""), 0.0);
        assert_eq!(parse_balance("$"), 0.0);
        assert_eq!(parse_balance("NaN"), 0.0);
        assert_eq!(parse_balance("inf"), 0.0);
    }

    #[test]
    fn test_format_has_no_currency_symbol() {
        assert_eq!(format_balance(1234.5), "1234.5");
        assert_eq!(format_balance(1234.56), "1234.56");
        assert_eq!(format_balance(100.0), "100");
    }

    #[test]
    fn test_format_then_parse_preserves_value() {
        let value = 3946.45;
        assert_eq!(parse_balance(&format_balance(value)), value);
    }
}
