/// Format a Philippine phone number for display.
/// Mobile numbers become `0917 123 4567`; `+63` prefixes are folded to `0`.
pub fn format_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    let local = match digits.strip_prefix("63") {
        Some(rest) if rest.len() == 10 => format!("0{}", rest),
        _ => digits.clone(),
    };

    match local.len() {
        11 if local.starts_with("09") => {
            format!("{} {} {}", &local[0..4], &local[4..7], &local[7..11])
        }
        // Short hotlines (911, 117) and landlines are shown as given
        _ => phone.to_string(),
    }
}

/// Format an amount in pesos with thousands separators: `₱1,250.00`.
pub fn format_peso(amount: f64) -> String {
    if amount == 0.0 {
        return "Free".to_string();
    }
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{}₱{}.{:02}", sign, grouped, cents % 100)
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format a date string to a more readable format
pub fn format_date(date: &str) -> String {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(date) {
        dt.format("%b %d, %Y").to_string()
    } else if let Ok(d) = chrono::NaiveDate::parse_from_str(date.get(..10).unwrap_or(date), "%Y-%m-%d") {
        d.format("%b %d, %Y").to_string()
    } else {
        date.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_phone() {
        assert_eq!(format_phone("09171234567"), "0917 123 4567");
        assert_eq!(format_phone("+63 917 123 4567"), "0917 123 4567");
        assert_eq!(format_phone("0917-123-4567"), "0917 123 4567");
        assert_eq!(format_phone("911"), "911");
    }

    #[test]
    fn test_format_peso() {
        assert_eq!(format_peso(0.0), "Free");
        assert_eq!(format_peso(150.0), "₱150.00");
        assert_eq!(format_peso(1250.5), "₱1,250.50");
        assert_eq!(format_peso(2_500_000.0), "₱2,500,000.00");
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2025-03-01T08:30:00Z"), "Mar 01, 2025");
        assert_eq!(format_date("2025-03-01"), "Mar 01, 2025");
        assert_eq!(format_date("soon"), "soon");
    }
}
