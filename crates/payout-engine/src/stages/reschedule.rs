use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use super::PayoutContext;
use crate::{
    constants::{
        DEFAULT_HOUR, DEFAULT_MAX_PARTICIPANTS, DEFAULT_MINUTE, DEFAULT_PAYOUT_AMOUNT,
        DEFAULT_TIMEZONE, DEFAULT_WEEKDAY, TOKEN_DECIMALS,
    },
    errors::Result,
    events::{Stage, WindowScheduled},
    state::{DefaultPayoutConfig, NewPayoutConditions, PayoutConditions, PayoutWindow},
    utils::parse_units,
};

/// Weekly trigger point in a local timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub weekday: Weekday,
    pub time: NaiveTime,
    pub timezone: Tz,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            weekday: weekday_from_sunday(DEFAULT_WEEKDAY as i32).unwrap_or(Weekday::Sun),
            time: NaiveTime::from_hms_opt(DEFAULT_HOUR, DEFAULT_MINUTE, 0).unwrap_or(NaiveTime::MIN),
            timezone: DEFAULT_TIMEZONE.parse().unwrap_or(Tz::UTC),
        }
    }
}

/// 0 = Sunday ... 6 = Saturday
fn weekday_from_sunday(day: i32) -> Option<Weekday> {
    match day {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

/// Validate each schedule field, falling back to the hard default per field
pub fn resolve_schedule(weekday: Option<i32>, time: Option<&str>, timezone: Option<&str>) -> Schedule {
    let fallback = Schedule::default();

    let weekday = match weekday {
        Some(day) => weekday_from_sunday(day).unwrap_or_else(|| {
            log::warn!("Invalid payout weekday {}, using {}", day, fallback.weekday);
            fallback.weekday
        }),
        None => fallback.weekday,
    };

    let time = match time {
        Some(raw) => parse_time(raw).unwrap_or_else(|| {
            log::warn!("Invalid payout time {:?}, using {}", raw, fallback.time);
            fallback.time
        }),
        None => fallback.time,
    };

    let timezone = match timezone {
        Some(raw) => raw.trim().parse::<Tz>().unwrap_or_else(|_| {
            log::warn!("Unknown payout timezone {:?}, using {}", raw, fallback.timezone.name());
            fallback.timezone
        }),
        None => fallback.timezone,
    };

    Schedule {
        weekday,
        time,
        timezone,
    }
}

/// Next occurrence of `schedule` strictly after `now`
///
/// Today counts if the target time is still ahead; otherwise the next
/// matching weekday, a full week out when today is the target day.
pub fn next_trigger_time(now: DateTime<Utc>, schedule: &Schedule) -> DateTime<Utc> {
    let local_now = now.with_timezone(&schedule.timezone);
    let today = local_now.weekday().num_days_from_sunday();
    let target = schedule.weekday.num_days_from_sunday();
    let days_ahead = (target + 7 - today) % 7;

    let mut date = local_now.date_naive() + Duration::days(i64::from(days_ahead));
    let mut candidate = localize(schedule.timezone, date, schedule.time);
    while candidate <= now {
        date += Duration::days(7);
        candidate = localize(schedule.timezone, date, schedule.time);
    }
    candidate
}

/// Resolve a wall-clock time to an instant
///
/// Ambiguous times take the earlier instant; times inside a DST gap move to
/// the first valid minute after the gap.
fn localize(tz: Tz, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let local = NaiveDateTime::new(date, time);
    for offset in 0..=24 * 60 {
        let candidate = local + Duration::minutes(offset);
        if let Some(instant) = tz.from_local_datetime(&candidate).earliest() {
            return instant.with_timezone(&Utc);
        }
    }
    // No zone has a day-long gap; treat the wall time as UTC if one ever shows up
    Utc.from_utc_datetime(&local)
}

fn resolve_amount(configured: Option<String>, completed: &PayoutConditions) -> String {
    let valid = |amount: &str| parse_units(amount, TOKEN_DECIMALS).is_ok();
    if let Some(amount) = configured {
        if valid(&amount) {
            return amount;
        }
        log::warn!("Invalid default payout amount {:?}, keeping previous amount", amount);
    }
    if valid(&completed.total_amount) {
        return completed.total_amount.clone();
    }
    DEFAULT_PAYOUT_AMOUNT.to_string()
}

/// Creates the next Pending window after a completed payout
///
/// Field precedence: stored default config, then the configured defaults,
/// then the completed window's conditions, then the hard defaults.
pub async fn handler(
    ctx: &PayoutContext,
    completed: &PayoutConditions,
    now: DateTime<Utc>,
) -> Result<(PayoutWindow, PayoutConditions)> {
    let stored = match ctx.store.default_config().await {
        Ok(stored) => stored.unwrap_or_default(),
        Err(err) => {
            log::warn!("Could not read default payout config, using fallbacks: {}", err);
            DefaultPayoutConfig::default()
        }
    };
    let defaults = stored.or(ctx.config.defaults.clone());

    let schedule = resolve_schedule(
        defaults.weekday,
        defaults.time.as_deref(),
        defaults.timezone.as_deref(),
    );
    let scheduled_at = next_trigger_time(now, &schedule);

    let max_participants = defaults
        .max_participants
        .filter(|n| *n > 0)
        .or(Some(completed.max_participants).filter(|n| *n > 0))
        .unwrap_or(DEFAULT_MAX_PARTICIPANTS);

    let next = NewPayoutConditions {
        total_amount: resolve_amount(defaults.amount, completed),
        scheduled_at,
        network: defaults.network.unwrap_or(completed.network),
        max_participants,
        execute_immediately: false,
    };

    let (window, conditions) = ctx.store.create_window(next).await?;

    ctx.audit
        .emit(
            Stage::Rescheduling,
            Some(window.id),
            &WindowScheduled {
                window_id: window.id,
                previous_window_id: completed.window_id,
                scheduled_at: conditions.scheduled_at,
                total_amount: conditions.total_amount.clone(),
                network: conditions.network,
                max_participants: conditions.max_participants,
                timestamp: now,
            },
        )
        .await;

    Ok((window, conditions))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn schedule(weekday: i32, time: &str, timezone: &str) -> Schedule {
        resolve_schedule(Some(weekday), Some(time), Some(timezone))
    }

    #[test]
    fn defaults_are_sunday_evening_utc() {
        let schedule = resolve_schedule(None, None, None);
        assert_eq!(schedule.weekday, Weekday::Sun);
        assert_eq!(schedule.time, NaiveTime::from_hms_opt(18, 0, 0).unwrap());
        assert_eq!(schedule.timezone, Tz::UTC);
    }

    #[test]
    fn invalid_fields_fall_back_individually() {
        let schedule = resolve_schedule(Some(9), Some("09:30"), Some("Mars/Olympus"));
        assert_eq!(schedule.weekday, Weekday::Sun);
        assert_eq!(schedule.time, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(schedule.timezone, Tz::UTC);

        let schedule = resolve_schedule(Some(3), Some("25:99"), Some("Europe/Berlin"));
        assert_eq!(schedule.weekday, Weekday::Wed);
        assert_eq!(schedule.time, NaiveTime::from_hms_opt(18, 0, 0).unwrap());
        assert_eq!(schedule.timezone, chrono_tz::Europe::Berlin);
    }

    #[test]
    fn accepts_seconds_in_time() {
        let schedule = resolve_schedule(None, Some("07:15:30"), None);
        assert_eq!(schedule.time, NaiveTime::from_hms_opt(7, 15, 30).unwrap());
    }

    #[test]
    fn later_same_day() {
        // 2024-06-02 is a Sunday
        let now = utc(2024, 6, 2, 12, 0);
        let next = next_trigger_time(now, &schedule(0, "18:00", "UTC"));
        assert_eq!(next, utc(2024, 6, 2, 18, 0));
    }

    #[test]
    fn exact_target_rolls_a_full_week() {
        let now = utc(2024, 6, 2, 18, 0);
        let next = next_trigger_time(now, &schedule(0, "18:00", "UTC"));
        assert_eq!(next, utc(2024, 6, 9, 18, 0));
    }

    #[test]
    fn mid_week_goes_to_upcoming_target_day() {
        // Wednesday
        let now = utc(2024, 6, 5, 9, 0);
        let next = next_trigger_time(now, &schedule(0, "18:00", "UTC"));
        assert_eq!(next, utc(2024, 6, 9, 18, 0));

        let next = next_trigger_time(now, &schedule(5, "08:00", "UTC"));
        assert_eq!(next, utc(2024, 6, 7, 8, 0));
    }

    #[test]
    fn local_timezone_is_respected() {
        // Berlin is UTC+2 in June: Sunday 18:00 local is 16:00 UTC
        let now = utc(2024, 6, 2, 17, 0);
        let next = next_trigger_time(now, &schedule(0, "18:00", "Europe/Berlin"));
        assert_eq!(next, utc(2024, 6, 9, 16, 0));

        let now = utc(2024, 6, 2, 15, 0);
        let next = next_trigger_time(now, &schedule(0, "18:00", "Europe/Berlin"));
        assert_eq!(next, utc(2024, 6, 2, 16, 0));
    }

    #[test]
    fn local_weekday_differs_from_utc_weekday() {
        // Saturday 23:00 UTC is already Sunday 08:00 in Tokyo
        let now = utc(2024, 6, 1, 23, 0);
        let next = next_trigger_time(now, &schedule(0, "09:00", "Asia/Tokyo"));
        assert_eq!(next, utc(2024, 6, 2, 0, 0));
    }

    #[test]
    fn dst_gap_moves_to_first_valid_instant() {
        // 02:30 does not exist in New York on 2024-03-10; clocks jump to 03:00 EDT
        let now = utc(2024, 3, 9, 12, 0);
        let next = next_trigger_time(now, &schedule(0, "02:30", "America/New_York"));
        assert_eq!(next, utc(2024, 3, 10, 7, 0));
    }

    #[test]
    fn ambiguous_time_takes_earlier_instant() {
        // 01:30 happens twice in New York on 2024-11-03; the EDT one is 05:30 UTC
        let now = utc(2024, 11, 2, 12, 0);
        let next = next_trigger_time(now, &schedule(0, "01:30", "America/New_York"));
        assert_eq!(next, utc(2024, 11, 3, 5, 30));
    }

    #[test]
    fn always_strictly_after_now() {
        let start = utc(2024, 1, 1, 0, 0);
        let zones = ["UTC", "Europe/Berlin", "America/New_York", "Asia/Kolkata"];
        for step in 0..(24 * 14) {
            let now = start + Duration::minutes(step * 47);
            for (i, zone) in zones.iter().enumerate() {
                let schedule = schedule((step as i32 + i as i32) % 7, "18:00", zone);
                let next = next_trigger_time(now, &schedule);
                assert!(next > now, "now={now} zone={zone}");
                assert!(next - now <= Duration::days(7) + Duration::hours(1), "now={now} zone={zone}");
                assert_eq!(
                    next.with_timezone(&schedule.timezone).weekday(),
                    schedule.weekday
                );
            }
        }
    }
}
