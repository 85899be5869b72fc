//! Built-in simple types and facet checks.
//!
//! Lexical spaces are checked with anchored ASCII-digit regexes plus
//! `chrono` for calendar validity. Range facets compare decimals and
//! integers exactly by their digits, `float` and `double` as `f64`, and the
//! date and time family as instants normalised to UTC. A value without a
//! timezone is taken to be in UTC.

use super::model::{Facets, Schema, TypeRef, Variety};
use crate::utils::{collapse_whitespace, replace_whitespace};
use chrono::{Datelike, NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;

/// Deepest chain of simple type derivations followed before giving up.
const MAX_DERIVATION_DEPTH: usize = 64;

/// The XSD `whiteSpace` facet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhiteSpace {
    Preserve,
    Replace,
    Collapse,
}

impl WhiteSpace {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "preserve" => Some(WhiteSpace::Preserve),
            "replace" => Some(WhiteSpace::Replace),
            "collapse" => Some(WhiteSpace::Collapse),
            _ => None,
        }
    }

    /// Apply this rule to a raw value.
    pub fn normalize(self, raw: &str) -> String {
        match self {
            WhiteSpace::Preserve => raw.to_string(),
            WhiteSpace::Replace => replace_whitespace(raw),
            WhiteSpace::Collapse => collapse_whitespace(raw),
        }
    }
}

/// Built-in simple types of XML Schema 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    AnySimpleType,
    String,
    NormalizedString,
    Token,
    Language,
    Name,
    NCName,
    Id,
    IdRef,
    IdRefs,
    NmToken,
    NmTokens,
    Entity,
    Entities,
    QName,
    AnyUri,
    Boolean,
    Decimal,
    Integer,
    Long,
    Int,
    Short,
    Byte,
    NonNegativeInteger,
    PositiveInteger,
    NonPositiveInteger,
    NegativeInteger,
    UnsignedLong,
    UnsignedInt,
    UnsignedShort,
    UnsignedByte,
    Float,
    Double,
    Date,
    DateTime,
    Time,
    GYear,
    GYearMonth,
    GMonth,
    GMonthDay,
    GDay,
    Duration,
    Base64Binary,
    HexBinary,
}

impl Builtin {
    /// Look up a built-in by its local name in the XSD namespace.
    pub fn from_name(name: &str) -> Option<Self> {
        use Builtin::*;
        let builtin = match name {
            "anySimpleType" => AnySimpleType,
            "string" => String,
            "normalizedString" => NormalizedString,
            "token" => Token,
            "language" => Language,
            "Name" => Name,
            "NCName" => NCName,
            "ID" => Id,
            "IDREF" => IdRef,
            "IDREFS" => IdRefs,
            "NMTOKEN" => NmToken,
            "NMTOKENS" => NmTokens,
            "ENTITY" => Entity,
            "ENTITIES" => Entities,
            "QName" => QName,
            "anyURI" => AnyUri,
            "boolean" => Boolean,
            "decimal" => Decimal,
            "integer" => Integer,
            "long" => Long,
            "int" => Int,
            "short" => Short,
            "byte" => Byte,
            "nonNegativeInteger" => NonNegativeInteger,
            "positiveInteger" => PositiveInteger,
            "nonPositiveInteger" => NonPositiveInteger,
            "negativeInteger" => NegativeInteger,
            "unsignedLong" => UnsignedLong,
            "unsignedInt" => UnsignedInt,
            "unsignedShort" => UnsignedShort,
            "unsignedByte" => UnsignedByte,
            "float" => Float,
            "double" => Double,
            "date" => Date,
            "dateTime" => DateTime,
            "time" => Time,
            "gYear" => GYear,
            "gYearMonth" => GYearMonth,
            "gMonth" => GMonth,
            "gMonthDay" => GMonthDay,
            "gDay" => GDay,
            "duration" => Duration,
            "base64Binary" => Base64Binary,
            "hexBinary" => HexBinary,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn white_space(self) -> WhiteSpace {
        match self {
            Builtin::AnySimpleType | Builtin::String => WhiteSpace::Preserve,
            Builtin::NormalizedString => WhiteSpace::Replace,
            _ => WhiteSpace::Collapse,
        }
    }

    pub fn is_numeric(self) -> bool {
        self.is_integer() || matches!(self, Builtin::Decimal | Builtin::Float | Builtin::Double)
    }

    fn is_integer(self) -> bool {
        self.integer_range().is_some() || self == Builtin::Integer
    }

    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            Builtin::Date
                | Builtin::DateTime
                | Builtin::Time
                | Builtin::GYear
                | Builtin::GYearMonth
                | Builtin::GMonth
                | Builtin::GMonthDay
                | Builtin::GDay
        )
    }

    /// Built-in list types, whose length facets count items.
    pub fn is_list(self) -> bool {
        matches!(self, Builtin::IdRefs | Builtin::NmTokens | Builtin::Entities)
    }

    /// Inclusive bounds of the bounded integer types.
    fn integer_range(self) -> Option<(i128, i128)> {
        let range = match self {
            Builtin::Long => (i64::MIN as i128, i64::MAX as i128),
            Builtin::Int => (i32::MIN as i128, i32::MAX as i128),
            Builtin::Short => (i16::MIN as i128, i16::MAX as i128),
            Builtin::Byte => (i8::MIN as i128, i8::MAX as i128),
            Builtin::NonNegativeInteger => (0, i128::MAX),
            Builtin::PositiveInteger => (1, i128::MAX),
            Builtin::NonPositiveInteger => (i128::MIN, 0),
            Builtin::NegativeInteger => (i128::MIN, -1),
            Builtin::UnsignedLong => (0, u64::MAX as i128),
            Builtin::UnsignedInt => (0, u32::MAX as i128),
            Builtin::UnsignedShort => (0, u16::MAX as i128),
            Builtin::UnsignedByte => (0, u8::MAX as i128),
            _ => return None,
        };
        Some(range)
    }

    /// Check a whitespace-normalized value against this type's lexical space.
    pub fn check(self, value: &str) -> Result<(), String> {
        let ok = match self {
            Builtin::AnySimpleType
            | Builtin::String
            | Builtin::NormalizedString
            | Builtin::Token
            | Builtin::AnyUri => true,
            Builtin::Language => lexical_match(&LANGUAGE, value),
            Builtin::Name => lexical_match(&NAME, value),
            Builtin::NCName | Builtin::Id | Builtin::IdRef | Builtin::Entity => {
                lexical_match(&NCNAME, value)
            }
            Builtin::NmToken => lexical_match(&NMTOKEN, value),
            Builtin::IdRefs | Builtin::Entities => {
                !value.is_empty() && value.split(' ').all(|t| lexical_match(&NCNAME, t))
            }
            Builtin::NmTokens => !value.is_empty() && value.split(' ').all(|t| lexical_match(&NMTOKEN, t)),
            Builtin::QName => lexical_match(&QNAME, value),
            Builtin::Boolean => matches!(value, "true" | "false" | "1" | "0"),
            Builtin::Decimal => lexical_match(&DECIMAL, value),
            Builtin::Integer => lexical_match(&INTEGER, value),
            Builtin::Float | Builtin::Double => {
                matches!(value, "INF" | "-INF" | "NaN") || lexical_match(&FLOAT, value)
            }
            Builtin::Date => check_date(value),
            Builtin::DateTime => check_date_time(value),
            Builtin::Time => check_time(value),
            Builtin::GYear => lexical_match(&GYEAR, value),
            Builtin::GYearMonth => captures_month(&GYEAR_MONTH, value),
            Builtin::GMonth => captures_month(&GMONTH, value),
            Builtin::GMonthDay => check_month_day(value),
            Builtin::GDay => GDAY
                .as_ref()
                .and_then(|re| re.captures(value))
                .and_then(|c| c[1].parse::<u32>().ok())
                .is_some_and(|d| (1..=31).contains(&d)),
            Builtin::Duration => check_duration(value),
            Builtin::Base64Binary => check_base64(value),
            Builtin::HexBinary => lexical_match(&HEX_BINARY, value),
            Builtin::Long
            | Builtin::Int
            | Builtin::Short
            | Builtin::Byte
            | Builtin::NonNegativeInteger
            | Builtin::PositiveInteger
            | Builtin::NonPositiveInteger
            | Builtin::NegativeInteger
            | Builtin::UnsignedLong
            | Builtin::UnsignedInt
            | Builtin::UnsignedShort
            | Builtin::UnsignedByte => return self.check_integer_range(value),
        };
        if ok {
            Ok(())
        } else {
            Err(format!("{value:?} is not a valid {}", self.name()))
        }
    }

    fn check_integer_range(self, value: &str) -> Result<(), String> {
        if !lexical_match(&INTEGER, value) {
            return Err(format!("{value:?} is not a valid {}", self.name()));
        }
        let Some((min, max)) = self.integer_range() else {
            return Ok(());
        };
        // Digits beyond i128 are out of range for every bounded type.
        let in_range = value
            .trim_start_matches('+')
            .parse::<i128>()
            .is_ok_and(|n| n >= min && n <= max);
        if in_range {
            Ok(())
        } else {
            Err(format!("{value} is out of range for {}", self.name()))
        }
    }

    /// Name as written in schemas.
    pub fn name(self) -> &'static str {
        use Builtin::*;
        match self {
            AnySimpleType => "anySimpleType",
            String => "string",
            NormalizedString => "normalizedString",
            Token => "token",
            Language => "language",
            Name => "Name",
            NCName => "NCName",
            Id => "ID",
            IdRef => "IDREF",
            IdRefs => "IDREFS",
            NmToken => "NMTOKEN",
            NmTokens => "NMTOKENS",
            Entity => "ENTITY",
            Entities => "ENTITIES",
            QName => "QName",
            AnyUri => "anyURI",
            Boolean => "boolean",
            Decimal => "decimal",
            Integer => "integer",
            Long => "long",
            Int => "int",
            Short => "short",
            Byte => "byte",
            NonNegativeInteger => "nonNegativeInteger",
            PositiveInteger => "positiveInteger",
            NonPositiveInteger => "nonPositiveInteger",
            NegativeInteger => "negativeInteger",
            UnsignedLong => "unsignedLong",
            UnsignedInt => "unsignedInt",
            UnsignedShort => "unsignedShort",
            UnsignedByte => "unsignedByte",
            Float => "float",
            Double => "double",
            Date => "date",
            DateTime => "dateTime",
            Time => "time",
            GYear => "gYear",
            GYearMonth => "gYearMonth",
            GMonth => "gMonth",
            GMonthDay => "gMonthDay",
            GDay => "gDay",
            Duration => "duration",
            Base64Binary => "base64Binary",
            HexBinary => "hexBinary",
        }
    }
}

const TZ: &str = r"(?:Z|[+-](?:(?:0[0-9]|1[0-3]):[0-5][0-9]|14:00))?";

static LANGUAGE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[a-zA-Z]{1,8}(?:-[a-zA-Z0-9]{1,8})*$").ok());
static NAME: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[\p{L}_:][\p{L}\p{N}\p{M}._:\-\u{B7}]*$").ok());
static NCNAME: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[\p{L}_][\p{L}\p{N}\p{M}._\-\u{B7}]*$").ok());
static NMTOKEN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[\p{L}\p{N}\p{M}._:\-\u{B7}]+$").ok());
static QNAME: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^(?:[\p{L}_][\p{L}\p{N}\p{M}._\-\u{B7}]*:)?[\p{L}_][\p{L}\p{N}\p{M}._\-\u{B7}]*$").ok()
});
static DECIMAL: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)$").ok());
static INTEGER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[+-]?[0-9]+$").ok());
static FLOAT: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:[eE][+-]?[0-9]+)?$").ok());
static DATE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(&format!(r"^(-?[0-9]{{4,}})-([0-9]{{2}})-([0-9]{{2}}){TZ}$")).ok());
static DATE_TIME: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(-?[0-9]{{4,}})-([0-9]{{2}})-([0-9]{{2}})T([0-9]{{2}}):([0-9]{{2}}):([0-9]{{2}})(?:\.[0-9]+)?{TZ}$"
    ))
    .ok()
});
static TIME: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(&format!(r"^([0-9]{{2}}):([0-9]{{2}}):([0-9]{{2}})(?:\.[0-9]+)?{TZ}$")).ok());
static GYEAR: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(&format!(r"^-?[0-9]{{4,}}{TZ}$")).ok());
static GYEAR_MONTH: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(&format!(r"^-?[0-9]{{4,}}-([0-9]{{2}}){TZ}$")).ok());
static GMONTH: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(&format!(r"^--([0-9]{{2}}){TZ}$")).ok());
static GMONTH_DAY: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(&format!(r"^--([0-9]{{2}})-([0-9]{{2}}){TZ}$")).ok());
static GDAY: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(&format!(r"^---([0-9]{{2}}){TZ}$")).ok());
static DURATION: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^-?P(?:[0-9]+Y)?(?:[0-9]+M)?(?:[0-9]+D)?(T(?:[0-9]+H)?(?:[0-9]+M)?(?:[0-9]+(?:\.[0-9]+)?S)?)?$").ok()
});
static BASE64: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9+/]*={0,2}$").ok());
static HEX_BINARY: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^(?:[0-9a-fA-F]{2})*$").ok());

fn lexical_match(re: &Lazy<Option<Regex>>, value: &str) -> bool {
    re.as_ref().is_some_and(|re| re.is_match(value))
}

fn captures_month(re: &Lazy<Option<Regex>>, value: &str) -> bool {
    re.as_ref()
        .and_then(|re| re.captures(value))
        .and_then(|c| c[1].parse::<u32>().ok())
        .is_some_and(|m| (1..=12).contains(&m))
}

fn valid_date(year: &str, month: &str, day: &str) -> bool {
    let (Ok(month), Ok(day)) = (month.parse::<u32>(), day.parse::<u32>()) else {
        return false;
    };
    match year.parse::<i32>() {
        Ok(year) => NaiveDate::from_ymd_opt(year, month, day).is_some(),
        // Years beyond chrono's range: check month and day shape only.
        Err(_) => (1..=12).contains(&month) && (1..=31).contains(&day),
    }
}

fn valid_time(hour: &str, minute: &str, second: &str, whole: &str) -> bool {
    let (Ok(h), Ok(m), Ok(s)) = (hour.parse::<u32>(), minute.parse::<u32>(), second.parse::<u32>())
    else {
        return false;
    };
    if h == 24 {
        // 24:00:00 is an allowed spelling of midnight, without a fraction.
        return m == 0 && s == 0 && !whole.contains("24:00:00.");
    }
    NaiveTime::from_hms_opt(h, m, s).is_some()
}

fn check_date(value: &str) -> bool {
    DATE.as_ref()
        .and_then(|re| re.captures(value))
        .is_some_and(|c| valid_date(&c[1], &c[2], &c[3]))
}

fn check_date_time(value: &str) -> bool {
    DATE_TIME
        .as_ref()
        .and_then(|re| re.captures(value))
        .is_some_and(|c| valid_date(&c[1], &c[2], &c[3]) && valid_time(&c[4], &c[5], &c[6], value))
}

fn check_time(value: &str) -> bool {
    TIME.as_ref()
        .and_then(|re| re.captures(value))
        .is_some_and(|c| valid_time(&c[1], &c[2], &c[3], value))
}

fn check_month_day(value: &str) -> bool {
    GMONTH_DAY
        .as_ref()
        .and_then(|re| re.captures(value))
        .is_some_and(|c| valid_date("2000", &c[1], &c[2]))
}

fn check_duration(value: &str) -> bool {
    let Some(caps) = DURATION.as_ref().and_then(|re| re.captures(value)) else {
        return false;
    };
    let designators = value.trim_start_matches('-').len() > 1;
    let time_ok = caps.get(1).is_none_or(|t| t.as_str().len() > 1);
    designators && time_ok
}

fn check_base64(value: &str) -> bool {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() % 4 == 0 && lexical_match(&BASE64, &compact)
}

fn base64_octets(value: &str) -> usize {
    let compact: Vec<char> = value.chars().filter(|c| !c.is_whitespace()).collect();
    let padding = compact.iter().rev().take_while(|c| **c == '=').count();
    (compact.len() / 4 * 3).saturating_sub(padding)
}

/// Digits before and after the decimal point, ignoring insignificant zeros.
fn digit_counts(value: &str) -> (usize, usize) {
    let unsigned = value.trim_start_matches(['+', '-']);
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let int_digits = int_part.trim_start_matches('0').len();
    let frac_digits = frac_part.trim_end_matches('0').len();
    (int_digits, frac_digits)
}

/// A decimal value ordered exactly, without going through floating point.
///
/// The integer part carries no leading zeros and the fraction no trailing
/// zeros, so equal values have equal digits.
#[derive(Debug, PartialEq, Eq)]
struct ExactDecimal {
    negative: bool,
    integer: String,
    fraction: String,
}

impl ExactDecimal {
    fn parse(value: &str) -> Option<Self> {
        if !lexical_match(&DECIMAL, value) {
            return None;
        }
        let (negative, unsigned) = match value.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, value.trim_start_matches('+')),
        };
        let (integer, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        let integer = integer.trim_start_matches('0').to_string();
        let fraction = fraction.trim_end_matches('0').to_string();
        // -0 and 0 are the same value
        let negative = negative && !(integer.is_empty() && fraction.is_empty());
        Some(Self {
            negative,
            integer,
            fraction,
        })
    }

    fn cmp_magnitude(&self, other: &Self) -> Ordering {
        self.integer
            .len()
            .cmp(&other.integer.len())
            .then_with(|| self.integer.cmp(&other.integer))
            .then_with(|| self.fraction.cmp(&other.fraction))
    }
}

impl Ord for ExactDecimal {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => self.cmp_magnitude(other),
            (true, true) => other.cmp_magnitude(self),
        }
    }
}

impl PartialOrd for ExactDecimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Whole UTC seconds on the proleptic Gregorian timeline, then fraction digits.
type Moment = (i64, String);

const SECONDS_PER_DAY: i64 = 86_400;

/// Place a date or time value on the UTC timeline.
///
/// Types without a year, month, or day are anchored at 1972-12-31 the way
/// XML Schema orders them, and a missing timezone is read as UTC.
fn temporal_instant(builtin: Builtin, value: &str) -> Option<Moment> {
    let (body, offset) = split_timezone(value)?;
    let (date, time) = match builtin {
        Builtin::DateTime => {
            let (date, time) = body.split_once('T')?;
            (parse_year_month_day(date)?, Some(time))
        }
        Builtin::Date => (parse_year_month_day(body)?, None),
        Builtin::Time => ((1972, 12, 31), Some(body)),
        Builtin::GYear => ((parse_year(body)?, 1, 1), None),
        Builtin::GYearMonth => {
            let (year, month) = body.rsplit_once('-')?;
            ((parse_year(year)?, month.parse().ok()?, 1), None)
        }
        Builtin::GMonth => ((1972, body.strip_prefix("--")?.parse().ok()?, 1), None),
        Builtin::GMonthDay => {
            let (month, day) = body.strip_prefix("--")?.split_once('-')?;
            ((1972, month.parse().ok()?, day.parse().ok()?), None)
        }
        Builtin::GDay => ((1972, 12, body.strip_prefix("---")?.parse().ok()?), None),
        _ => return None,
    };

    let (year, month, day) = date;
    let days = i64::from(NaiveDate::from_ymd_opt(year, month, day)?.num_days_from_ce());
    let (seconds, fraction) = match time {
        Some(time) => parse_time_of_day(time)?,
        None => (0, String::new()),
    };
    Some((days * SECONDS_PER_DAY + seconds - offset, fraction))
}

/// Split a trailing `Z` or `±hh:mm` off a value, returning the offset in seconds.
fn split_timezone(value: &str) -> Option<(&str, i64)> {
    if let Some(body) = value.strip_suffix('Z') {
        return Some((body, 0));
    }
    let bytes = value.as_bytes();
    let n = bytes.len();
    if n > 6 && bytes[n - 3] == b':' && matches!(bytes[n - 6], b'+' | b'-') {
        let (body, zone) = value.split_at(n - 6);
        let hours: i64 = zone.get(1..3)?.parse().ok()?;
        let minutes: i64 = zone.get(4..6)?.parse().ok()?;
        let sign = if zone.starts_with('-') { -1 } else { 1 };
        return Some((body, sign * (hours * 3_600 + minutes * 60)));
    }
    Some((value, 0))
}

fn parse_year(year: &str) -> Option<i32> {
    year.parse().ok()
}

fn parse_year_month_day(date: &str) -> Option<(i32, u32, u32)> {
    let (negative, unsigned) = match date.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, date),
    };
    let mut parts = unsigned.splitn(3, '-');
    let year: i32 = parts.next()?.parse().ok()?;
    let month = parts.next()?.parse().ok()?;
    let day = parts.next()?.parse().ok()?;
    Some((if negative { -year } else { year }, month, day))
}

/// `hh:mm:ss[.fff]` as whole seconds plus significant fraction digits.
fn parse_time_of_day(time: &str) -> Option<(i64, String)> {
    let mut parts = time.splitn(3, ':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let second = parts.next()?;
    let (seconds, fraction) = second.split_once('.').unwrap_or((second, ""));
    let seconds: i64 = seconds.parse().ok()?;
    Some((
        hours * 3_600 + minutes * 60 + seconds,
        fraction.trim_end_matches('0').to_string(),
    ))
}

/// Translate an XSD regular expression into `regex` syntax, anchored.
///
/// XSD patterns always match the whole value and treat `^` and `$` as
/// ordinary characters outside classes. Class subtraction `[a-z-[aeiou]]`
/// becomes the `--` difference operator, and the `\i` and `\c`
/// name-character escapes are expanded to Unicode class approximations.
pub fn translate_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut depth = 0usize;
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        let in_class = depth > 0;
        match c {
            '\\' => match chars.next() {
                Some('i') => out.push_str(if in_class { r"\p{L}_:" } else { r"[\p{L}_:]" }),
                Some('I') => out.push_str(r"[^\p{L}_:]"),
                Some('c') => out.push_str(if in_class {
                    r"\p{L}\p{N}._:\-"
                } else {
                    r"[\p{L}\p{N}._:\-]"
                }),
                Some('C') => out.push_str(r"[^\p{L}\p{N}._:\-]"),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push_str(r"\\"),
            },
            '[' if !in_class => {
                depth = 1;
                out.push('[');
                if chars.peek() == Some(&'^') {
                    out.push('^');
                    chars.next();
                }
            }
            '-' if in_class && chars.peek() == Some(&'[') => {
                chars.next();
                depth += 1;
                out.push_str("--[");
                if chars.peek() == Some(&'^') {
                    out.push('^');
                    chars.next();
                }
            }
            ']' if in_class => {
                depth -= 1;
                out.push(']');
            }
            '[' | '&' | '~' if in_class => {
                out.push('\\');
                out.push(c);
            }
            '^' | '$' if !in_class => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    format!("^(?:{out})$")
}

impl Schema {
    /// Check a raw lexical value against a simple type.
    pub(crate) fn check_simple(&self, ty: TypeRef, raw: &str) -> Result<(), String> {
        self.check_simple_at(ty, raw, 0)
    }

    fn check_simple_at(&self, ty: TypeRef, raw: &str, depth: usize) -> Result<(), String> {
        if depth > MAX_DERIVATION_DEPTH {
            return Err("simple type derivation is too deep".to_string());
        }
        match ty {
            TypeRef::AnyType => Ok(()),
            TypeRef::Complex(_) => Err("a complex type cannot describe a text value".to_string()),
            TypeRef::Builtin(builtin) => builtin.check(&builtin.white_space().normalize(raw)),
            TypeRef::Simple(id) => {
                let simple = &self.simple_types[id];
                match &simple.variety {
                    Variety::Atomic(base) => {
                        self.check_simple_at(*base, raw, depth + 1)?;
                        let value = self.white_space(ty).normalize(raw);
                        self.check_facets(ty, &simple.facets, &value)
                    }
                    Variety::List(item) => {
                        let value = collapse_whitespace(raw);
                        for token in value.split(' ').filter(|t| !t.is_empty()) {
                            self.check_simple_at(*item, token, depth + 1)
                                .map_err(|e| format!("list item {token:?}: {e}"))?;
                        }
                        self.check_facets(ty, &simple.facets, &value)
                    }
                    Variety::Union(members) => {
                        let matched = members
                            .iter()
                            .any(|m| self.check_simple_at(*m, raw, depth + 1).is_ok());
                        if !matched {
                            return Err(format!("{raw:?} matches no member of the union"));
                        }
                        self.check_facets(ty, &simple.facets, &collapse_whitespace(raw))
                    }
                }
            }
        }
    }

    fn white_space(&self, ty: TypeRef) -> WhiteSpace {
        match ty {
            TypeRef::Builtin(builtin) => builtin.white_space(),
            TypeRef::Simple(id) => {
                let simple = &self.simple_types[id];
                match (&simple.facets.white_space, &simple.variety) {
                    (Some(ws), _) => *ws,
                    (None, Variety::Atomic(base)) => self.white_space(*base),
                    (None, _) => WhiteSpace::Collapse,
                }
            }
            TypeRef::AnyType | TypeRef::Complex(_) => WhiteSpace::Preserve,
        }
    }

    /// The built-in a simple type is ultimately restricted from.
    fn primitive(&self, ty: TypeRef) -> Option<Builtin> {
        match ty {
            TypeRef::Builtin(builtin) => Some(builtin),
            TypeRef::Simple(id) => match &self.simple_types[id].variety {
                Variety::Atomic(base) => self.primitive(*base),
                _ => None,
            },
            _ => None,
        }
    }

    fn is_list(&self, ty: TypeRef) -> bool {
        match ty {
            TypeRef::Builtin(builtin) => builtin.is_list(),
            TypeRef::Simple(id) => match &self.simple_types[id].variety {
                Variety::Atomic(base) => self.is_list(*base),
                Variety::List(_) => true,
                Variety::Union(_) => false,
            },
            _ => false,
        }
    }

    fn value_length(&self, ty: TypeRef, value: &str) -> usize {
        if self.is_list(ty) {
            return value.split(' ').filter(|t| !t.is_empty()).count();
        }
        match self.primitive(ty) {
            Some(Builtin::HexBinary) => value.len() / 2,
            Some(Builtin::Base64Binary) => base64_octets(value),
            _ => value.chars().count(),
        }
    }

    fn compare(&self, ty: TypeRef, value: &str, bound: &str) -> Result<Option<Ordering>, String> {
        match self.primitive(ty) {
            Some(Builtin::Float | Builtin::Double) => {
                let parse = |s: &str| {
                    s.trim()
                        .parse::<f64>()
                        .map_err(|_| format!("{s:?} is not comparable as a number"))
                };
                Ok(parse(value)?.partial_cmp(&parse(bound)?))
            }
            Some(p) if p.is_numeric() => {
                let parse = |s: &str| {
                    ExactDecimal::parse(s.trim())
                        .ok_or_else(|| format!("{s:?} is not comparable as a decimal"))
                };
                Ok(Some(parse(value)?.cmp(&parse(bound)?)))
            }
            Some(p) if p.is_temporal() => {
                let instant = |s: &str| {
                    temporal_instant(p, s.trim())
                        .ok_or_else(|| format!("{s:?} is not comparable as a {}", p.name()))
                };
                Ok(Some(instant(value)?.cmp(&instant(bound)?)))
            }
            _ => Ok(None),
        }
    }

    fn check_facets(&self, ty: TypeRef, facets: &Facets, value: &str) -> Result<(), String> {
        if !facets.enumeration.is_empty() {
            let numeric = self.primitive(ty).is_some_and(Builtin::is_numeric);
            let found = facets.enumeration.iter().any(|allowed| {
                if numeric {
                    matches!(self.compare(ty, value, allowed), Ok(Some(Ordering::Equal)))
                } else {
                    self.white_space(ty).normalize(allowed) == value
                }
            });
            if !found {
                return Err(format!(
                    "{value:?} is not one of [{}]",
                    facets.enumeration.join(", ")
                ));
            }
        }

        if let Some((source, re)) = &facets.pattern {
            if !re.is_match(value) {
                return Err(format!("{value:?} does not match pattern {source:?}"));
            }
        }

        let length = self.value_length(ty, value);
        if let Some(expected) = facets.length {
            if length != expected {
                return Err(format!("length {length} of {value:?} is not {expected}"));
            }
        }
        if let Some(min) = facets.min_length {
            if length < min {
                return Err(format!("length {length} of {value:?} is below minLength {min}"));
            }
        }
        if let Some(max) = facets.max_length {
            if length > max {
                return Err(format!("length {length} of {value:?} exceeds maxLength {max}"));
            }
        }

        let bounds = [
            (&facets.min_inclusive, "minInclusive", [Ordering::Equal, Ordering::Greater]),
            (&facets.max_inclusive, "maxInclusive", [Ordering::Equal, Ordering::Less]),
            (&facets.min_exclusive, "minExclusive", [Ordering::Greater, Ordering::Greater]),
            (&facets.max_exclusive, "maxExclusive", [Ordering::Less, Ordering::Less]),
        ];
        for (bound, facet, accepted) in bounds {
            let Some(bound) = bound else { continue };
            match self.compare(ty, value, bound)? {
                Some(order) if accepted.contains(&order) => {}
                Some(_) => return Err(format!("{value} violates {facet} {bound}")),
                // NaN, or a type without an order
                None => {}
            }
        }

        if facets.total_digits.is_some() || facets.fraction_digits.is_some() {
            let (int_digits, frac_digits) = digit_counts(value);
            if let Some(total) = facets.total_digits {
                if int_digits + frac_digits > total {
                    return Err(format!("{value} has more than {total} total digits"));
                }
            }
            if let Some(fraction) = facets.fraction_digits {
                if frac_digits > fraction {
                    return Err(format!("{value} has more than {fraction} fraction digits"));
                }
            }
        }

        Ok(())
    }
}
