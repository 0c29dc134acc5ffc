const MAX_DISPLAY_CHARS: usize = 9;

/// Renders a computed value as display text. Negative zero reads as "0".
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        return "0".into();
    }
    format!("{value}")
}

/// View-only formatting: anything longer than nine characters is shown in
/// exponential notation with three fraction digits, e.g. `1.235e+9`.
pub fn format_display(text: &str) -> String {
    let Ok(value) = text.parse::<f64>() else {
        return text.to_string();
    };

    if text.chars().count() <= MAX_DISPLAY_CHARS {
        return text.to_string();
    }

    let formatted = format!("{value:.3e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{mantissa}e+{exponent}")
        }
        _ => formatted,
    }
}

/// `MM:SS` rendering of an elapsed counter.
pub fn format_elapsed(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_values_render_verbatim() {
        assert_eq!(format_display("0"), "0");
        assert_eq!(format_display("123456789"), "123456789");
        assert_eq!(format_display("0."), "0.");
    }

    #[test]
    fn long_values_render_exponentially() {
        assert_eq!(format_display("1234567890"), "1.235e+9");
        assert_eq!(format_display("0.00000012"), "1.200e-7");
    }

    #[test]
    fn negative_zero_is_plain_zero() {
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(-2.5), "-2.5");
    }

    #[test]
    fn elapsed_is_minutes_and_seconds() {
        assert_eq!(format_elapsed(0), "00:00");
        assert_eq!(format_elapsed(90), "01:30");
        assert_eq!(format_elapsed(3725), "62:05");
    }
}
