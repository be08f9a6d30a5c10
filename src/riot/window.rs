//! Calendar-year windows in the reference timezone.

use chrono::TimeZone;
use chrono_tz::Tz;

use super::RiotError;

/// `[start, end)` epoch seconds covering local `year` in `tz`.
pub fn year_window(year: i32, tz: Tz) -> Result<(i64, i64), RiotError> {
    let start = local_new_year(year, tz)?;
    let end = local_new_year(year + 1, tz)?;
    Ok((start, end))
}

fn local_new_year(year: i32, tz: Tz) -> Result<i64, RiotError> {
    tz.with_ymd_and_hms(year, 1, 1, 0, 0, 0)
        .earliest()
        .map(|instant| instant.timestamp())
        .ok_or(RiotError::InvalidWindow { year })
}
