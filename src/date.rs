//! The date-formatting capability: the [`FormatDate`] trait and
//! [`DateFormat`], which understands dayjs-style patterns such as
//! `YYYY-MM-DD` or `MMMM D, YYYY`.

use chrono::NaiveDate;

/// Formats post dates for display.
pub trait FormatDate {
    fn format_date(&self, date: NaiveDate) -> String;
}

/// A display format compiled from a dayjs-style pattern into a
/// [`chrono::format::strftime`] string.
///
/// Supported tokens: `YYYY`, `YY`, `MMMM`, `MMM`, `MM`, `M`, `DD`, `D`,
/// `dddd`, `ddd`. Text inside square brackets is copied literally; any other
/// character is copied as-is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DateFormat {
    pattern: String,
    strftime: String,
}

impl DateFormat {
    pub fn new(pattern: &str) -> DateFormat {
        DateFormat {
            pattern: pattern.to_owned(),
            strftime: to_strftime(pattern),
        }
    }

    /// The pattern this format was compiled from.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl Default for DateFormat {
    fn default() -> Self {
        DateFormat::new("YYYY-MM-DD")
    }
}

impl FormatDate for DateFormat {
    fn format_date(&self, date: NaiveDate) -> String {
        date.format(&self.strftime).to_string()
    }
}

/// Tokens ordered so longer ones match before their prefixes.
const TOKENS: &[(&str, &str)] = &[
    ("YYYY", "%Y"),
    ("YY", "%y"),
    ("MMMM", "%B"),
    ("MMM", "%b"),
    ("MM", "%m"),
    ("M", "%-m"),
    ("DD", "%d"),
    ("D", "%-d"),
    ("dddd", "%A"),
    ("ddd", "%a"),
];

fn to_strftime(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut rest = pattern;
    'outer: while let Some(c) = rest.chars().next() {
        if c == '[' {
            if let Some(end) = rest.find(']') {
                push_literal(&mut out, &rest[1..end]);
                rest = &rest[end + 1..];
                continue;
            }
        }
        for (token, spec) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(spec);
                rest = tail;
                continue 'outer;
            }
        }
        push_literal(&mut out, &rest[..c.len_utf8()]);
        rest = &rest[c.len_utf8()..];
    }
    out
}

fn push_literal(out: &mut String, literal: &str) {
    out.push_str(&literal.replace('%', "%%"));
}
