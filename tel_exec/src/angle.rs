//! # Angle Codec
//!
//! Angles are carried through the crate as `f64`s in a single unit named by the suffix of the
//! variable holding them (`_as` arcseconds, `_s` seconds of time, `_deg`, `_h`, `_rad`). This
//! module converts between those values and the strings typed by operators or shown to them.
//!
//! ## Accepted input
//!
//! An optional sign followed by one of:
//! - `dd[.d]` - degrees (or hours)
//! - `mm[.m]'` - minutes
//! - `ss[.s]''` - seconds
//! - `dd:mm[.m]` or `dd:mm:ss[.s]` - any of `:`, space, `,` or `;` may delimit the groups. Every
//!   group but the last must be an integer.
//!
//! Parsing stops after the angle and hands back the rest of the string, so two angles can be read
//! from a single argument.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::f64::consts::PI;
use thiserror::Error;
use util::maths::wrap_period;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Arcseconds in one degree, also seconds of time in one hour
pub const AS_PER_DEG: f64 = 3600.0;

/// Arcseconds in a full circle
pub const AS_PER_CIRCLE: f64 = 1_296_000.0;

/// Seconds of time in a day
pub const S_PER_DAY: f64 = 86_400.0;

/// Arcseconds to radians
pub const AS2R: f64 = PI / 648_000.0;

/// Seconds of time to radians
pub const S2R: f64 = PI / 43_200.0;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("No angle found in \"{0}\"")]
    Empty(String),

    #[error("Bad angle format: \"{0}\"")]
    Malformed(String),

    #[error("Unexpected \"{token}\" in \"{text}\"")]
    UnexpectedToken {
        text: String,
        token: String,
    },

    #[error("Integer out of range in \"{0}\"")]
    Overflow(String),
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// One numeric group of an angle.
struct Group {
    value: f64,
    decimal: bool,
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Parse an angle from the start of `text`.
///
/// The value is returned in the unit of the leading group (degrees, or hours for a time angle)
/// together with the unparsed remainder. Leading whitespace and delimiters are skipped.
pub fn parse_angle(text: &str) -> Result<(f64, &str), ParseError> {
    let s = text.trim_start_matches(is_delimiter);
    if s.is_empty() {
        return Err(ParseError::Empty(text.into()));
    }

    let (sign, s) = match s.as_bytes()[0] {
        b'+' => (1.0, &s[1..]),
        b'-' => (-1.0, &s[1..]),
        _ => (1.0, s),
    };

    let (first, mut rest) = parse_group(text, s)?;

    let mut deg = 0.0;
    let mut min = 0.0;
    let mut sec = 0.0;

    if let Some(r) = rest.strip_prefix("''") {
        sec = first.value;
        rest = r;
    }
    else if let Some(r) = rest.strip_prefix('\'') {
        min = first.value;
        rest = r;
    }
    else {
        deg = first.value;

        if !first.decimal {
            expect_boundary(text, rest)?;

            if let Some(after) = next_group(rest) {
                let (group, r) = parse_group(text, after)?;
                min = group.value;
                rest = r;

                if !group.decimal {
                    expect_boundary(text, rest)?;

                    if let Some(after) = next_group(rest) {
                        let (group, r) = parse_group(text, after)?;
                        sec = group.value;
                        rest = r;
                    }
                }
            }
        }
    }

    expect_boundary(text, rest)?;

    Ok((sign * (deg + min / 60.0 + sec / 3600.0), rest))
}

/// True if `c` may separate angle groups or angles.
pub fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, ':' | ',' | ';')
}

/// Format an angle as `[sign]DD:MM:SS.s` with `decimals` digits on the seconds.
///
/// Seconds are clamped just below the rollover of the chosen precision so `60` is never shown.
/// Unsigned angles are wrapped into `[0, 360)` before formatting.
pub fn format_angle(value_as: f64, signed: bool, decimals: usize) -> String {
    let (sign, magn_as) = match signed {
        true if value_as < 0.0 => ("-", -value_as),
        true => ("+", value_as),
        false => ("", wrap_period(value_as, AS_PER_CIRCLE)),
    };

    let (deg, min, sec) = split_sexagesimal(magn_as);

    let max_sec = match decimals {
        0 => 59.0,
        n => 60.0 - 10f64.powi(-(n as i32)),
    };
    let width = match decimals {
        0 => 2,
        n => n + 3,
    };

    format!(
        "{}{:02}:{:02}:{:0width$.prec$}",
        sign,
        deg % 360,
        min,
        sec.min(max_sec),
        width = width,
        prec = decimals
    )
}

/// Format a signed angle with one decimal on the seconds, `+DD:MM:SS.s`.
pub fn format_angle_short(value_as: f64) -> String {
    format_angle(value_as, true, 1)
}

/// Format a time as `HH:MM:SS.ss`, hours taken modulo 24.
pub fn format_time(value_s: f64) -> String {
    let (h, min, sec) = split_sexagesimal(wrap_period(value_s, S_PER_DAY));

    format!("{:02}:{:02}:{:05.2}", h % 24, min, sec.min(59.99))
}

/// Convert an arcsecond count into degrees in `[0, 360)`.
pub fn wrap_degrees(value_as: f64) -> f64 {
    wrap_period(value_as / AS_PER_DEG, 360.0)
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Split a positive value in seconds into whole units, whole minutes and the remaining seconds.
fn split_sexagesimal(value: f64) -> (u64, u64, f64) {
    let units = (value / 3600.0).trunc();
    let min = ((value - units * 3600.0) / 60.0).trunc();
    let sec = value - units * 3600.0 - min * 60.0;

    (units as u64, min as u64, sec.max(0.0))
}

/// Parse a single unsigned group, integer or decimal, from the start of `s`.
fn parse_group<'a>(text: &str, s: &'a str) -> Result<(Group, &'a str), ParseError> {
    let int_len = s.bytes().take_while(u8::is_ascii_digit).count();
    let mut end = int_len;
    let mut decimal = false;

    if s[end..].starts_with('.') {
        let frac_len = s[end + 1..].bytes().take_while(u8::is_ascii_digit).count();
        if int_len + frac_len > 0 {
            decimal = true;
            end += 1 + frac_len;
        }
    }

    if end == 0 {
        return Err(ParseError::Malformed(text.into()));
    }

    let num = &s[..end];
    let value = match decimal {
        true => num.parse::<f64>()
            .map_err(|_| ParseError::Malformed(text.into()))?,
        false => num.parse::<i32>()
            .map_err(|_| ParseError::Overflow(text.into()))? as f64,
    };

    Ok((Group { value, decimal }, &s[end..]))
}

/// If `rest` continues the current angle with another group, return the start of that group.
///
/// A group must be separated by delimiters and start with a digit, a sign starts a new angle.
fn next_group(rest: &str) -> Option<&str> {
    if !rest.starts_with(is_delimiter) {
        return None;
    }

    let after = rest.trim_start_matches(is_delimiter);
    match after.as_bytes().first() {
        Some(c) if c.is_ascii_digit() => Some(after),
        _ => None,
    }
}

/// Anything directly attached to a value must be a delimiter.
fn expect_boundary(text: &str, rest: &str) -> Result<(), ParseError> {
    match rest.chars().next() {
        None => Ok(()),
        Some(c) if is_delimiter(c) => Ok(()),
        Some(_) => Err(ParseError::UnexpectedToken {
            text: text.into(),
            token: rest.split(is_delimiter).next().unwrap_or(rest).into(),
        }),
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn parse(text: &str) -> f64 {
        parse_angle(text).unwrap().0
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-12, "{} != {}", a, b);
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(parse("45"), 45.0);
        assert_eq!(parse("-12.5"), -12.5);
        assert_eq!(parse("+.5"), 0.5);
        assert_eq!(parse("30'"), 0.5);
        assert_close(parse("36''"), 0.01);
        assert_eq!(parse("10:30"), 10.5);
        assert_close(parse("10:30.6"), 10.51);
        assert_close(parse("-10:30:36"), -10.51);
        assert_close(parse("10 30 36.0"), 10.51);
        assert_close(parse("10,30;36"), 10.51);
        assert_eq!(parse("  ,10:30"), 10.5);
    }

    #[test]
    fn test_parse_remainder() {
        let (ra, rest) = parse_angle("10:00:00 +45:00:00").unwrap();
        assert_eq!(ra, 10.0);
        assert_eq!(rest, " +45:00:00");

        let (dec, rest) = parse_angle(rest).unwrap();
        assert_eq!(dec, 45.0);
        assert_eq!(rest, "");

        // A sign ends the current angle even after a single group
        let (a, rest) = parse_angle("10 -20").unwrap();
        assert_eq!(a, 10.0);
        assert_eq!(parse(rest), -20.0);

        // A decimal group ends the angle
        let (a, rest) = parse_angle("12.5 30").unwrap();
        assert_eq!(a, 12.5);
        assert_eq!(parse(rest), 30.0);

        let (_, rest) = parse_angle("1:2:3 4").unwrap();
        assert_eq!(rest, " 4");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_angle(""), Err(ParseError::Empty("".into())));
        assert_eq!(parse_angle(" :, "), Err(ParseError::Empty(" :, ".into())));
        assert!(matches!(parse_angle("abc"), Err(ParseError::Malformed(_))));
        assert!(matches!(parse_angle("-"), Err(ParseError::Malformed(_))));
        assert!(matches!(parse_angle("+ 5"), Err(ParseError::Malformed(_))));
        assert!(matches!(parse_angle("30rel"), Err(ParseError::UnexpectedToken { .. })));
        assert!(matches!(parse_angle("12.5deg"), Err(ParseError::UnexpectedToken { .. })));
        assert!(matches!(parse_angle("10:30x"), Err(ParseError::UnexpectedToken { .. })));
        assert!(matches!(parse_angle("30'''"), Err(ParseError::UnexpectedToken { .. })));
        assert!(matches!(parse_angle("99999999999"), Err(ParseError::Overflow(_))));

        match parse_angle("15h") {
            Err(ParseError::UnexpectedToken { token, .. }) => assert_eq!(token, "h"),
            r => panic!("Unexpected result {:?}", r),
        }
    }

    #[test]
    fn test_format() {
        assert_eq!(format_angle(37_815.5, true, 1), "+10:30:15.5");
        assert_eq!(format_angle(-37_815.5, true, 1), "-10:30:15.5");
        assert_eq!(format_angle(-3600.0, false, 1), "359:00:00.0");
        assert_eq!(format_angle(359.999, true, 2), "+00:05:59.99");
        assert_eq!(format_angle(59.9999, true, 0), "+00:00:59");
        assert_eq!(format_angle_short(59.97), "+00:00:59.9");

        assert_eq!(format_time(36_000.0), "10:00:00.00");
        assert_eq!(format_time(86_400.0 + 61.5), "00:01:01.50");
        assert_eq!(format_time(-60.0), "23:59:00.00");
        assert_eq!(format_time(59.999), "00:00:59.99");
    }

    #[test]
    fn test_format_parse_round_trip() {
        for &value_as in &[0.0, 1.0, 59.94, 3599.95, 37_815.53, -162_000.0, 1_295_999.9] {
            let formatted = format_angle(value_as, true, 1);
            let (value_deg, rest) = parse_angle(&formatted).unwrap();

            assert!(rest.is_empty());
            assert!(
                (value_deg * AS_PER_DEG - value_as).abs() <= 0.05 + 1e-9,
                "{} -> {} -> {}", value_as, formatted, value_deg
            );
        }

        for &value_s in &[0.0, 3600.0, 45_296.789, 86_399.98] {
            let formatted = format_time(value_s);
            let (value_h, _) = parse_angle(&formatted).unwrap();
            assert!((value_h * AS_PER_DEG - value_s).abs() <= 0.005 + 1e-9);
        }
    }

    #[test]
    fn test_wrap_degrees() {
        assert_eq!(wrap_degrees(0.0), 0.0);
        assert_eq!(wrap_degrees(-3600.0), 359.0);
        assert_eq!(wrap_degrees(AS_PER_CIRCLE), 0.0);
        assert_eq!(wrap_degrees(-1e-12), 0.0);

        for k in &[-1e6, -3.0, 1.0, 7.0, 1e6, 1e9] {
            for &offset in &[0.0, 0.5, 1000.0, -1000.0] {
                let value = wrap_degrees(k * AS_PER_CIRCLE + offset);
                assert!(value >= 0.0 && value < 360.0, "{} gave {}", k, value);
            }
        }
    }
}
