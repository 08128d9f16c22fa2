use std::ops::RangeInclusive;

/// Linearly maps `value` from the closed interval `from` onto `to`,
/// rounding half away from zero.
///
/// Either interval may be descending. Values outside `from` are clamped to it
/// first. Returns `None` when `from` has zero length.
pub fn map_range(value: i32, from: RangeInclusive<i32>, to: RangeInclusive<i32>) -> Option<i32> {
    let (in_start, in_end) = (i64::from(*from.start()), i64::from(*from.end()));
    let (out_start, out_end) = (i64::from(*to.start()), i64::from(*to.end()));

    if in_start == in_end {
        return None;
    }

    let value = i64::from(value).clamp(in_start.min(in_end), in_start.max(in_end));
    let offset = div_round((value - in_start) * (out_end - out_start), in_end - in_start);

    i32::try_from(out_start + offset).ok()
}

fn div_round(numerator: i64, denominator: i64) -> i64 {
    let (numerator, denominator) = if denominator < 0 {
        (-numerator, -denominator)
    } else {
        (numerator, denominator)
    };

    if numerator >= 0 {
        (numerator + denominator / 2) / denominator
    } else {
        (numerator - denominator / 2) / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_to_level_rounds_to_nearest() {
        let cases = [
            (0, 0),
            (500, 13),    // 12.75
            (5000, 128),  // 127.5
            (9500, 242),  // 242.25
            (10000, 255),
        ];

        for (position, expected) in cases {
            assert_eq!(
                map_range(position, 0..=10000, 0..=255),
                Some(expected),
                "position {position}"
            );
        }
    }

    #[test]
    fn test_descending_target_range() {
        assert_eq!(map_range(0, 0..=10000, 100..=0), Some(100));
        assert_eq!(map_range(2500, 0..=10000, 100..=0), Some(75));
        assert_eq!(map_range(10000, 0..=10000, 100..=0), Some(0));
    }

    #[test]
    fn test_descending_source_range() {
        assert_eq!(map_range(90, 90..=0, 0..=10000), Some(0));
        assert_eq!(map_range(45, 90..=0, 0..=10000), Some(5000));
    }

    #[test]
    fn test_out_of_range_value_is_clamped() {
        assert_eq!(map_range(-50, 0..=10000, 0..=255), Some(0));
        assert_eq!(map_range(12000, 0..=10000, 0..=255), Some(255));
    }

    #[test]
    fn test_degenerate_source_range() {
        assert_eq!(map_range(10, 5..=5, 0..=255), None);
    }
}
