use chrono::{DateTime, Days, NaiveTime, TimeZone};

use common::{Error, Result};

/// Parse "HH:MM" entries from the strategy file.
pub fn parse_times(raw: &[String]) -> Result<Vec<NaiveTime>> {
    let mut times = raw
        .iter()
        .map(|s| {
            NaiveTime::parse_from_str(s.trim(), "%H:%M")
                .map_err(|e| Error::Config(format!("invalid schedule time '{s}': {e}")))
        })
        .collect::<Result<Vec<_>>>()?;
    times.sort();
    times.dedup();
    Ok(times)
}

/// First scheduled instant strictly after `now`, in `now`'s time zone.
///
/// Local times skipped by a DST jump are ignored; repeated ones fire once, at
/// the earlier instant.
pub fn next_after<Tz: TimeZone>(now: &DateTime<Tz>, times: &[NaiveTime]) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let today = now.date_naive();

    for offset in 0..=2 {
        let date = today.checked_add_days(Days::new(offset))?;
        let next = times
            .iter()
            .filter_map(|t| tz.from_local_datetime(&date.and_time(*t)).earliest())
            .filter(|candidate| candidate > now)
            .min();
        if next.is_some() {
            return next;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn times(raw: &[&str]) -> Vec<NaiveTime> {
        parse_times(&raw.iter().map(|s| s.to_string()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn picks_next_slot_today() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap();
        let next = next_after(&now, &times(&["09:00", "15:00", "21:00"])).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap());
    }

    #[test]
    fn rolls_over_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 21, 0, 0).unwrap();
        let next = next_after(&now, &times(&["09:00", "15:00", "21:00"])).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap());
    }

    #[test]
    fn exact_slot_is_not_repeated() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 15, 0, 0).unwrap();
        let next = next_after(&now, &times(&["15:00"])).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 2, 15, 0, 0).unwrap());
    }

    #[test]
    fn empty_schedule_never_fires() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        assert!(next_after(&now, &[]).is_none());
    }

    #[test]
    fn rejects_malformed_times() {
        assert!(parse_times(&["9am".to_string()]).is_err());
        assert!(parse_times(&["25:00".to_string()]).is_err());
    }

    #[test]
    fn sorts_and_dedups() {
        assert_eq!(
            times(&["21:00", "09:00", "21:00"]),
            vec![
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(21, 0, 0).unwrap()
            ]
        );
    }
}
