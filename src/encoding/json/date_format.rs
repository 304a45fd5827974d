// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Date and date-time text formats.
//!
//! Without annotations dates are written as `YYYY-MM-DD` and date-times as
//! RFC 3339. `jsonDateFormat` and `jsonDateTimeFormat` annotations switch a
//! field to a `chrono` strftime pattern. Compiled patterns are cached
//! process-wide and never evicted.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::{Arc, OnceLock, RwLock};

use chrono::format::{parse, Item, Parsed, StrftimeItems};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, SecondsFormat, TimeZone};

use crate::core::Value;
use crate::schema::builtin_types::{self, date_time_format};
use crate::schema::Field;

const DEFAULT_DATE: &str = "%Y-%m-%d";

/// A compiled strftime pattern.
#[derive(Debug)]
pub struct DatePattern {
    pattern: String,
    items: Vec<Item<'static>>,
}

static PATTERNS: OnceLock<RwLock<HashMap<String, Arc<DatePattern>>>> = OnceLock::new();

/// Get the compiled form of `pattern`, compiling it on first use.
pub fn compile(pattern: &str) -> Result<Arc<DatePattern>, String> {
    let cache = PATTERNS.get_or_init(Default::default);
    if let Ok(map) = cache.read() {
        if let Some(found) = map.get(pattern) {
            return Ok(Arc::clone(found));
        }
    }

    let items = StrftimeItems::new(pattern)
        .parse_to_owned()
        .map_err(|_| format!("invalid date pattern '{pattern}'"))?;
    let compiled = Arc::new(DatePattern {
        pattern: pattern.to_string(),
        items,
    });

    match cache.write() {
        Ok(mut map) => Ok(Arc::clone(
            map.entry(pattern.to_string()).or_insert(compiled),
        )),
        Err(_) => Ok(compiled),
    }
}

impl DatePattern {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn format_date(&self, date: &NaiveDate) -> Result<String, String> {
        let mut out = String::new();
        write!(out, "{}", date.format_with_items(self.items.iter()))
            .map_err(|_| format!("pattern '{}' cannot format a date", self.pattern))?;
        Ok(out)
    }

    pub fn parse_date(&self, text: &str) -> Result<NaiveDate, String> {
        let mut parsed = Parsed::new();
        parse(&mut parsed, text, self.items.iter())
            .and_then(|_| parsed.to_naive_date())
            .map_err(|e| format!("'{text}' does not match '{}': {e}", self.pattern))
    }

    pub fn format_date_time(
        &self,
        value: &DateTime<FixedOffset>,
        as_local: bool,
    ) -> Result<String, String> {
        let mut out = String::new();
        let written = if as_local {
            write!(
                out,
                "{}",
                value.with_timezone(&Local).format_with_items(self.items.iter())
            )
        } else {
            write!(out, "{}", value.format_with_items(self.items.iter()))
        };
        written.map_err(|_| format!("pattern '{}' cannot format a date-time", self.pattern))?;
        Ok(out)
    }

    pub fn parse_date_time(
        &self,
        text: &str,
        as_local: bool,
    ) -> Result<DateTime<FixedOffset>, String> {
        let mut parsed = Parsed::new();
        let mismatch = |e: chrono::ParseError| format!("'{text}' does not match '{}': {e}", self.pattern);
        parse(&mut parsed, text, self.items.iter()).map_err(mismatch)?;
        if as_local {
            let naive = parsed.to_naive_datetime_with_offset(0).map_err(mismatch)?;
            to_local(naive, text)
        } else {
            parsed.to_datetime().map_err(mismatch)
        }
    }
}

fn to_local(naive: chrono::NaiveDateTime, text: &str) -> Result<DateTime<FixedOffset>, String> {
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| format!("'{text}' does not exist in the local time zone"))?;
    let offset = *local.offset();
    Ok(local.with_timezone(&offset))
}

// =============================================================================
// Field-level helpers
// =============================================================================

/// Date-time settings carried by a field's annotations.
#[derive(Debug, Default)]
pub(crate) struct DateTimeSettings<'a> {
    pub pattern: Option<&'a str>,
    pub as_local: bool,
    pub null_value: Option<&'a str>,
}

impl<'a> DateTimeSettings<'a> {
    pub fn of(field: &'a Field) -> Self {
        match field.annotation(builtin_types::DATE_TIME_FORMAT) {
            Some(a) => Self {
                pattern: a.get(date_time_format::FORMAT).and_then(Value::as_str),
                as_local: a
                    .get(date_time_format::AS_LOCAL)
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                null_value: a.get(date_time_format::NULL_VALUE).and_then(Value::as_str),
            },
            None => Self::default(),
        }
    }

    /// Whether `text` stands for an absent value.
    pub fn is_null(&self, text: &str) -> bool {
        text.is_empty() || self.null_value == Some(text)
    }
}

fn date_pattern(field: &Field) -> Option<&str> {
    field
        .annotation(builtin_types::DATE_FORMAT)
        .and_then(|a| a.get(0))
        .and_then(Value::as_str)
}

pub(crate) fn format_date(field: &Field, date: &NaiveDate) -> Result<String, String> {
    match date_pattern(field) {
        Some(pattern) => compile(pattern)?.format_date(date),
        None => Ok(date.format(DEFAULT_DATE).to_string()),
    }
}

pub(crate) fn parse_date(field: &Field, text: &str) -> Result<NaiveDate, String> {
    match date_pattern(field) {
        Some(pattern) => compile(pattern)?.parse_date(text),
        None => NaiveDate::parse_from_str(text, DEFAULT_DATE)
            .map_err(|e| format!("'{text}' is not an ISO date: {e}")),
    }
}

pub(crate) fn format_date_time(
    field: &Field,
    value: &DateTime<FixedOffset>,
) -> Result<String, String> {
    let settings = DateTimeSettings::of(field);
    match settings.pattern {
        Some(pattern) => compile(pattern)?.format_date_time(value, settings.as_local),
        None if settings.as_local => Ok(value
            .with_timezone(&Local)
            .to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        None => Ok(value.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
    }
}

/// Parse a date-time; `None` when the text is a null sentinel.
pub(crate) fn parse_date_time(
    field: &Field,
    text: &str,
) -> Result<Option<DateTime<FixedOffset>>, String> {
    let settings = DateTimeSettings::of(field);
    if settings.is_null(text) {
        return Ok(None);
    }
    match settings.pattern {
        Some(pattern) => compile(pattern)?
            .parse_date_time(text, settings.as_local)
            .map(Some),
        None => DateTime::parse_from_rfc3339(text)
            .map(Some)
            .map_err(|e| format!("'{text}' is not an RFC 3339 date-time: {e}")),
    }
}
