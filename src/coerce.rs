//! Lenient cell coercion. A bad cell degrades to zero instead of failing the row.

pub fn parse_int(value: &str) -> i64 {
    let cleaned: String = value
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    if let Ok(parsed) = cleaned.parse::<i64>() {
        return parsed;
    }
    match cleaned.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => parsed.trunc() as i64,
        _ => 0,
    }
}

pub fn parse_percent(value: &str) -> f64 {
    let trimmed = value.trim();
    let number = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();

    match number.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => parsed,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_drop_separators_and_spaces() {
        assert_eq!(parse_int("1,250"), 1250);
        assert_eq!(parse_int(" 60 "), 60);
        assert_eq!(parse_int("1 000"), 1000);
        assert_eq!(parse_int("-3"), -3);
        assert_eq!(parse_int("60.0"), 60);
    }

    #[test]
    fn malformed_integers_become_zero() {
        assert_eq!(parse_int(""), 0);
        assert_eq!(parse_int("n/a"), 0);
        assert_eq!(parse_int("12abc"), 0);
        assert_eq!(parse_int("NaN"), 0);
    }

    #[test]
    fn percents_accept_trailing_sign() {
        assert_eq!(parse_percent("10.00"), 10.0);
        assert_eq!(parse_percent("12.5%"), 12.5);
        assert_eq!(parse_percent(" 7 % "), 7.0);
    }

    #[test]
    fn malformed_percents_become_zero() {
        assert_eq!(parse_percent(""), 0.0);
        assert_eq!(parse_percent("%"), 0.0);
        assert_eq!(parse_percent("high"), 0.0);
        assert_eq!(parse_percent("NaN"), 0.0);
        assert_eq!(parse_percent("inf"), 0.0);
    }
}
