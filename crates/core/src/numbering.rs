//! Human-readable document numbers.

/// Builds `prefix + yy + zero padding + serial`, truncated to `width` chars.
///
/// The padding fills the gap between the prefix/year and the serial so the
/// number is exactly `width` long; when the serial is too long for the
/// remaining room the result is cut at `width`.
///
/// ```
/// use stockwise_core::display_number;
/// assert_eq!(display_number("SO-#", 2025, 42, 16), "SO-#250000000042");
/// ```
pub fn display_number(prefix: &str, year: i32, serial: u64, width: usize) -> String {
    let yy = format!("{:02}", year.rem_euclid(100));
    let serial = serial.to_string();
    let used = prefix.chars().count() + yy.len() + serial.len();
    let zeros = "0".repeat(width.saturating_sub(used));

    format!("{prefix}{yy}{zeros}{serial}")
        .chars()
        .take(width)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_width() {
        assert_eq!(display_number("PO-#", 2024, 7, 16), "PO-#240000000007");
        assert_eq!(display_number("TED-", 2025, 123, 14), "TED-2500000123");
        assert_eq!(display_number("#", 2025, 1, 14), "#2500000000001");
    }

    #[test]
    fn truncates_overlong_serials() {
        let n = display_number("SO-#", 2025, 123_456_789_012_345, 16);
        assert_eq!(n.len(), 16);
        assert!(n.starts_with("SO-#25123456789"));
    }

    #[test]
    fn two_digit_year() {
        assert_eq!(display_number("#", 2100, 5, 6), "#00005");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn always_exactly_width(serial in 0u64..u64::MAX, year in 1900i32..2200, width in 6usize..24) {
                let n = display_number("PO-#", year, serial, width);
                prop_assert_eq!(n.chars().count(), width);
                prop_assert!(n.starts_with("PO-#"));
            }
        }
    }
}
