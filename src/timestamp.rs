//! Timestamp parsing and normalization.
//!
//! Outing rows have been written in several shapes over time: naive text
//! (`2024-01-01 10:00:00`, optionally with fractional seconds), the SQLite
//! driver's aware encoding, and RFC 3339. Every value is run through one
//! ordered list of accepted formats and ends up as an aware timestamp in the
//! configured zone. Naive values are read as wall-clock time in that zone.

use chrono::{
    DateTime, Duration, FixedOffset, LocalResult, NaiveDateTime, Offset, SecondsFormat, TimeZone, Utc,
};
use chrono_tz::Tz;

use crate::error::AppError;

pub type Timestamp = DateTime<FixedOffset>;

/// Offset-carrying formats, tried after RFC 3339.
const AWARE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Offset-less formats, in the order they are tried.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Parses any accepted timestamp representation into the zone `tz`.
///
/// Fails with [`AppError::Validation`] when no format matches; the caller
/// never gets a substitute value.
pub fn parse_timestamp(text: &str, tz: Tz) -> Result<Timestamp, AppError> {
    let text = text.trim();

    if let Ok(aware) = DateTime::parse_from_rfc3339(text) {
        return Ok(in_zone(aware, tz));
    }
    for format in AWARE_FORMATS {
        if let Ok(aware) = DateTime::parse_from_str(text, format) {
            return Ok(in_zone(aware, tz));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(localize(naive, tz));
        }
    }

    Err(AppError::validation(format!("unrecognized timestamp {text:?}")))
}

/// Parses a client-supplied ISO-8601 timestamp.
pub fn parse_client_time(text: &str, tz: Tz) -> Result<Timestamp, AppError> {
    if text.trim().is_empty() {
        return Err(AppError::validation("client timestamp is empty"));
    }
    parse_timestamp(text, tz)
        .map_err(|_| AppError::validation(format!("invalid client timestamp {:?}", text.trim())))
}

/// Attaches `tz` to a wall-clock reading without shifting it.
///
/// Readings repeated by a DST fold resolve to standard time, the later of the
/// two instants. Readings skipped by a DST gap take the offset in force the
/// day before.
pub fn localize(naive: NaiveDateTime, tz: Tz) -> Timestamp {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(local) => fixed(local),
        LocalResult::Ambiguous(earliest, latest) => {
            let (earliest, latest) = (fixed(earliest), fixed(latest));
            if earliest.offset().local_minus_utc() < latest.offset().local_minus_utc() {
                earliest
            } else {
                latest
            }
        }
        LocalResult::None => {
            let offset = tz
                .offset_from_utc_datetime(&(naive - Duration::days(1)))
                .fix();
            DateTime::from_naive_utc_and_offset(naive - offset, offset)
        }
    }
}

pub fn in_zone<O: TimeZone>(value: DateTime<O>, tz: Tz) -> Timestamp {
    fixed(value.with_timezone(&tz))
}

pub fn now_in(now: DateTime<Utc>, tz: Tz) -> Timestamp {
    in_zone(now, tz)
}

/// Storage encoding for newly written timestamps.
pub fn to_storage(value: &Timestamp) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

fn fixed<O: TimeZone>(value: DateTime<O>) -> Timestamp {
    let offset = value.offset().fix();
    value.with_timezone(&offset)
}
