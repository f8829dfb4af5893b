//! Time-partitioned key prefixes.
//!
//! A prefix may embed date placeholders in angle brackets, for example
//! `client=1000/<yyyy-MM-dd>/hour=<HH>`. Rendering the pattern for an
//! instant yields the concrete key prefix of that partition, and a
//! [`PartitionPlan`] lists the partitions covering a time range.
//!
//! Placeholder tokens:
//!
//! | Token  | Output                               |
//! |--------|--------------------------------------|
//! | `yyyy` | four-digit year                      |
//! | `yyy`  | `0` followed by the two-digit year   |
//! | `yy`   | two-digit year                       |
//! | `MM`/`M` | month, padded / unpadded           |
//! | `dd`/`d` | day of month, padded / unpadded    |
//! | `HH`/`H` | hour of day (0-23), padded         |
//! | `hh`/`h` | hour (1-12), padded / unpadded     |
//! | `mm`/`m` | minute, padded / unpadded          |
//!
//! Any other character inside a placeholder is copied as-is.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use jiff::Span;
use jiff::civil::{Date, DateTime};
use serde::Serialize;
use strum::{AsRefStr, Display, IntoStaticStr};

use crate::{Error, Result, TRACING_TARGET_QUERY};

/// Upper bound on the number of partitions in one plan.
pub const MAX_PARTITIONS: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Year4,
    Year3,
    Year2,
    Month2,
    Month,
    Day2,
    Day,
    Hour24,
    Hour12Padded,
    Hour12,
    Minute2,
    Minute,
}

/// Longest token first for every letter.
const TOKENS: &[(&str, Token)] = &[
    ("yyyy", Token::Year4),
    ("yyy", Token::Year3),
    ("yy", Token::Year2),
    ("MM", Token::Month2),
    ("M", Token::Month),
    ("dd", Token::Day2),
    ("d", Token::Day),
    ("HH", Token::Hour24),
    ("H", Token::Hour24),
    ("hh", Token::Hour12Padded),
    ("h", Token::Hour12),
    ("mm", Token::Minute2),
    ("m", Token::Minute),
];

impl Token {
    fn render(self, at: &DateTime, out: &mut String) {
        let year = i32::from(at.year());
        let hour12 = match at.hour() % 12 {
            0 => 12,
            hour => hour,
        };

        let rendered = match self {
            Self::Year4 => format!("{year:04}"),
            Self::Year3 => format!("0{:02}", year.rem_euclid(100)),
            Self::Year2 => format!("{:02}", year.rem_euclid(100)),
            Self::Month2 => format!("{:02}", at.month()),
            Self::Month => at.month().to_string(),
            Self::Day2 => format!("{:02}", at.day()),
            Self::Day => at.day().to_string(),
            Self::Hour24 => format!("{:02}", at.hour()),
            Self::Hour12Padded => format!("{hour12:02}"),
            Self::Hour12 => hour12.to_string(),
            Self::Minute2 => format!("{:02}", at.minute()),
            Self::Minute => at.minute().to_string(),
        };
        out.push_str(&rendered);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    Token(Token),
    Literal(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Format { source: String, items: Vec<Item> },
}

fn tokenize(format: &str) -> Vec<Item> {
    let mut items = Vec::new();
    let mut rest = format;

    while let Some(ch) = rest.chars().next() {
        let token = TOKENS
            .iter()
            .find(|(text, _)| rest.starts_with(text))
            .copied();

        match token {
            Some((text, token)) => {
                items.push(Item::Token(token));
                rest = &rest[text.len()..];
            }
            None => {
                match items.last_mut() {
                    Some(Item::Literal(literal)) => literal.push(ch),
                    _ => items.push(Item::Literal(ch.to_string())),
                }
                rest = &rest[ch.len_utf8()..];
            }
        }
    }

    items
}

/// How far apart consecutive partitions are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[derive(Serialize, AsRefStr, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Granularity {
    /// One partition per minute.
    Minute,
    /// One partition per hour.
    Hour,
    /// One partition per day.
    Day,
}

impl Granularity {
    /// Returns the step in minutes.
    pub const fn minutes(self) -> i64 {
        match self {
            Self::Minute => 1,
            Self::Hour => 60,
            Self::Day => 60 * 24,
        }
    }

    /// Returns the step as a span.
    pub fn span(self) -> Span {
        Span::new().minutes(self.minutes())
    }
}

/// A key prefix with optional date placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixPattern {
    source: String,
    segments: Vec<Segment>,
}

impl PrefixPattern {
    /// Parses a prefix pattern.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::InvalidPattern`](crate::ErrorKind) for empty,
    /// nested or unbalanced placeholders.
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = source;

        while !rest.is_empty() {
            match rest.find(['<', '>']) {
                Some(open) if rest[open..].starts_with('<') => {
                    if open > 0 {
                        segments.push(Segment::Literal(rest[..open].to_owned()));
                    }
                    let after = &rest[open + 1..];
                    let close = after.find(['<', '>']).filter(|&i| after[i..].starts_with('>'));
                    let Some(close) = close else {
                        return Err(Error::invalid_pattern(format!(
                            "unclosed placeholder in '{source}'"
                        )));
                    };
                    let format = &after[..close];
                    if format.is_empty() {
                        return Err(Error::invalid_pattern(format!(
                            "empty placeholder in '{source}'"
                        )));
                    }
                    segments.push(Segment::Format {
                        source: format.to_owned(),
                        items: tokenize(format),
                    });
                    rest = &after[close + 1..];
                }
                Some(_) => {
                    return Err(Error::invalid_pattern(format!(
                        "unmatched '>' in '{source}'"
                    )));
                }
                None => {
                    segments.push(Segment::Literal(rest.to_owned()));
                    rest = "";
                }
            }
        }

        Ok(Self {
            source: source.to_owned(),
            segments,
        })
    }

    /// Returns the pattern text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns `true` if the pattern has at least one placeholder.
    pub fn has_placeholders(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| matches!(segment, Segment::Format { .. }))
    }

    /// Returns the literal and placeholder pieces in order.
    pub fn pieces(&self) -> Vec<&str> {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(literal) => literal.as_str(),
                Segment::Format { source, .. } => source.as_str(),
            })
            .collect()
    }

    /// Returns the partition step implied by the placeholders.
    ///
    /// `mm` selects minutes, any hour letter selects hours, and everything
    /// else (including patterns without placeholders) selects days.
    pub fn granularity(&self) -> Granularity {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Format { source, .. } if source.contains("mm") => {
                    Some(Granularity::Minute)
                }
                Segment::Format { source, .. } if source.contains(['h', 'H']) => {
                    Some(Granularity::Hour)
                }
                _ => None,
            })
            .min()
            .unwrap_or(Granularity::Day)
    }

    /// Renders the concrete prefix for one instant.
    pub fn render(&self, at: DateTime) -> String {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => out.push_str(literal),
                Segment::Format { items, .. } => {
                    for item in items {
                        match item {
                            Item::Token(token) => token.render(&at, &mut out),
                            Item::Literal(literal) => out.push_str(literal),
                        }
                    }
                }
            }
        }
        out
    }
}

impl FromStr for PrefixPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for PrefixPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// One partition of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionSlot {
    /// Start of the partition.
    pub at: DateTime,
    /// Rendered key prefix.
    pub prefix: String,
}

/// The partitions covering a half-open time range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionPlan {
    granularity: Granularity,
    slots: Vec<PartitionSlot>,
}

impl PartitionPlan {
    /// Lists the partitions from `from` (inclusive) to `to` (exclusive),
    /// stepping by the pattern's granularity.
    ///
    /// An empty or inverted range yields an empty plan.
    ///
    /// # Errors
    ///
    /// Fails when the range would need more than [`MAX_PARTITIONS`]
    /// partitions or steps past the supported datetime range.
    pub fn new(pattern: &PrefixPattern, from: DateTime, to: DateTime) -> Result<Self> {
        let granularity = pattern.granularity();
        let step = granularity.span();

        let mut slots = Vec::new();
        let mut current = from;
        while current < to {
            if slots.len() == MAX_PARTITIONS {
                return Err(Error::invalid_pattern(format!(
                    "range {from} to {to} needs more than {MAX_PARTITIONS} {granularity} partitions"
                )));
            }
            slots.push(PartitionSlot {
                at: current,
                prefix: pattern.render(current),
            });
            current = current.checked_add(step).map_err(|err| {
                Error::invalid_pattern("time range leaves the supported calendar").with_source(err)
            })?;
        }

        tracing::debug!(
            target: TRACING_TARGET_QUERY,
            pattern = %pattern,
            granularity = %granularity,
            partitions = slots.len(),
            "planned partitions"
        );

        Ok(Self { granularity, slots })
    }

    /// Returns the partition step.
    #[inline]
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Returns the partitions in time order.
    #[inline]
    pub fn slots(&self) -> &[PartitionSlot] {
        &self.slots
    }

    /// Returns `true` if the range covers no partition.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Groups the partitions by calendar day, the unit results are
    /// aggregated by.
    pub fn by_day(&self) -> BTreeMap<Date, Vec<&PartitionSlot>> {
        let mut days: BTreeMap<Date, Vec<&PartitionSlot>> = BTreeMap::new();
        for slot in &self.slots {
            days.entry(slot.at.date()).or_default().push(slot);
        }
        days
    }
}

#[cfg(test)]
mod tests {
    use jiff::civil::{date, datetime};

    use super::*;
    use crate::ErrorKind;

    fn render(format: &str, at: DateTime) -> String {
        PrefixPattern::parse(&format!("<{format}>")).unwrap().render(at)
    }

    #[test]
    fn test_render_tokens() {
        let at = date(2021, 2, 19).at(1, 10, 0, 0);
        let cases = [
            ("yyyy-MM-dd", "2021-02-19"),
            ("yyy-MM-dd", "021-02-19"),
            ("yy-MM-dd", "21-02-19"),
            ("yy-M-dd", "21-2-19"),
            ("yy-MM-d", "21-02-19"),
            ("yy-M-d", "21-2-19"),
            ("yy-MM-dd/hh:mm", "21-02-19/01:10"),
            ("yy-MM-dd/hh:m", "21-02-19/01:10"),
            ("yy-MM-dd/h:m", "21-02-19/1:10"),
            ("yy-MM-dd/h:mm", "21-02-19/1:10"),
        ];
        for (format, expected) in cases {
            assert_eq!(render(format, at), expected, "format {format}");
        }

        assert_eq!(render("yy-M-d", date(2021, 2, 5).at(1, 10, 0, 0)), "21-2-5");
        assert_eq!(render("yy-MM-dd/h:m", date(2021, 2, 19).at(1, 8, 0, 0)), "21-02-19/1:8");
    }

    #[test]
    fn test_render_twelve_hour_clock() {
        assert_eq!(render("hh", date(2021, 1, 1).at(0, 0, 0, 0)), "12");
        assert_eq!(render("h", date(2021, 1, 1).at(12, 0, 0, 0)), "12");
        assert_eq!(render("HH", date(2021, 1, 1).at(0, 0, 0, 0)), "00");
    }

    #[test]
    fn test_parse_pieces() {
        let cases: [(&str, &[&str]); 3] = [
            ("client=1000/<yyyy-MM-dd>", &["client=1000/", "yyyy-MM-dd"]),
            (
                "client=1000/<yyyy-MM-dd>/hour=<hh>",
                &["client=1000/", "yyyy-MM-dd", "/hour=", "hh"],
            ),
            (
                "<yyyy-MM-dd>/client=1000/hour=<hh-mm>",
                &["yyyy-MM-dd", "/client=1000/hour=", "hh-mm"],
            ),
        ];
        for (source, expected) in cases {
            let pattern = PrefixPattern::parse(source).unwrap();
            assert_eq!(pattern.pieces(), expected);
            assert!(pattern.has_placeholders());
            assert_eq!(pattern.to_string(), source);
        }
    }

    #[test]
    fn test_parse_rejects_malformed_placeholders() {
        for source in ["a/<yyyy", "a/yyyy>", "a/<>", "<yy<MM>>"] {
            let err = PrefixPattern::parse(source).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidPattern, "source {source}");
        }
    }

    #[test]
    fn test_granularity() {
        let cases = [
            ("client=1000/<yyyy-MM-dd>", Granularity::Day),
            ("client=1000/<yyyy-MM-dd>/hour=<hh>", Granularity::Hour),
            ("client=1000/<yyyy-MM-dd>/hour=<HH>", Granularity::Hour),
            ("<yyyy-MM-dd>/client=1000/hour=<hh-mm>", Granularity::Minute),
            ("<yyyy-MM-dd>/client=1000/hour=<HH-mm>", Granularity::Minute),
            ("logs/2024/", Granularity::Day),
        ];
        for (source, expected) in cases {
            let pattern = PrefixPattern::parse(source).unwrap();
            assert_eq!(pattern.granularity(), expected, "source {source}");
        }
        assert_eq!(Granularity::Day.minutes(), 1440);
    }

    #[test]
    fn test_render_prefix() {
        let at = datetime(2021, 10, 30, 17, 40, 0, 0);
        let cases = [
            ("client=1000/<yyyy-MM-dd>", "client=1000/2021-10-30"),
            ("client=1000/<yyyy-MM-dd>/hour=<HH>", "client=1000/2021-10-30/hour=17"),
            ("client=1000/<yyyy-MM-dd>/hour=<hh>", "client=1000/2021-10-30/hour=05"),
            ("<yyyy-MM-dd>/client=1000/hour=<HH:mm>", "2021-10-30/client=1000/hour=17:40"),
            ("<yyyy-MM-dd>/client=1000/hour=<H:mm>", "2021-10-30/client=1000/hour=17:40"),
            ("<yyyy-MM-dd>/client=1000/hour=<hh:mm>", "2021-10-30/client=1000/hour=05:40"),
            ("plain/prefix/", "plain/prefix/"),
        ];
        for (source, expected) in cases {
            let pattern: PrefixPattern = source.parse().unwrap();
            assert_eq!(pattern.render(at), expected, "source {source}");
        }
    }

    #[test]
    fn test_plan_steps_by_granularity() {
        let pattern = PrefixPattern::parse("logs/<yyyy-MM-dd>/<HH>").unwrap();
        let from = datetime(2021, 10, 30, 22, 0, 0, 0);
        let to = datetime(2021, 10, 31, 1, 30, 0, 0);
        let plan = PartitionPlan::new(&pattern, from, to).unwrap();

        let prefixes: Vec<_> = plan.slots().iter().map(|s| s.prefix.as_str()).collect();
        assert_eq!(
            prefixes,
            vec![
                "logs/2021-10-30/22",
                "logs/2021-10-30/23",
                "logs/2021-10-31/00",
                "logs/2021-10-31/01",
            ]
        );
        assert_eq!(plan.granularity(), Granularity::Hour);

        let days = plan.by_day();
        assert_eq!(days.len(), 2);
        assert_eq!(days[&date(2021, 10, 30)].len(), 2);
    }

    #[test]
    fn test_plan_empty_and_oversized_ranges() {
        let pattern = PrefixPattern::parse("<yyyy-MM-dd>/<HH:mm>").unwrap();
        let at = datetime(2021, 10, 30, 0, 0, 0, 0);
        assert!(PartitionPlan::new(&pattern, at, at).unwrap().is_empty());
        assert!(
            PartitionPlan::new(&pattern, at, date(2021, 10, 29).at(0, 0, 0, 0))
                .unwrap()
                .is_empty()
        );

        let err = PartitionPlan::new(&pattern, at, date(2022, 10, 30).at(0, 0, 0, 0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPattern);
    }
}
