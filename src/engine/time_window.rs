use chrono::{Duration, NaiveDate};

use crate::models::optimization::{Tolerances, Violation};
use crate::models::stop::OptimizedStop;

/// Flags stops that arrive later than `window.end + tolerance`.
///
/// Windows are times of day on `service_date`. Arriving before the window
/// opens is never a violation.
pub fn check_violations(
    ordered_stops: &[OptimizedStop],
    tolerances: &Tolerances,
    service_date: NaiveDate,
) -> Vec<Violation> {
    ordered_stops
        .iter()
        .filter_map(|planned| {
            let window = planned.stop.time_window?;
            let window_end = service_date.and_time(window.end).and_utc();
            let tolerance = tolerances.for_priority(planned.stop.priority);

            // a deadline past chrono's range can never be missed
            let deadline = Duration::try_minutes(tolerance)
                .and_then(|grace| window_end.checked_add_signed(grace))?;
            if planned.estimated_arrival <= deadline {
                return None;
            }

            let delay_minutes = (planned.estimated_arrival - window_end).num_minutes();
            Some(Violation {
                stop_id: planned.stop.id,
                message: format!(
                    "arrives {delay_minutes} min after window end {} ({:?} tolerance is {tolerance} min)",
                    window.end.format("%H:%M"),
                    planned.stop.priority
                ),
                delay_minutes,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
    use uuid::Uuid;

    use super::check_violations;
    use crate::models::optimization::Tolerances;
    use crate::models::stop::{Coordinate, OptimizedStop, Priority, ProofRequirements, Stop, TimeWindow};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
    }

    fn planned(priority: Priority, window: Option<(u32, u32)>, arrival: DateTime<Utc>) -> OptimizedStop {
        OptimizedStop {
            stop: Stop {
                id: Uuid::new_v4(),
                coordinate: Coordinate::new(41.0, 29.0),
                priority,
                service_time_minutes: 5,
                time_window: window.map(|(start, end)| TimeWindow {
                    start: NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
                    end: NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
                }),
                customer_ref: "customer".to_string(),
                proof_requirements: ProofRequirements::default(),
            },
            sequence_index: 0,
            estimated_arrival: arrival,
            estimated_departure: arrival + Duration::minutes(5),
        }
    }

    #[test]
    fn lateness_within_tolerance_is_accepted() {
        let stops = vec![planned(Priority::High, Some((9, 10)), at(10, 25))];
        assert!(check_violations(&stops, &Tolerances::default(), date()).is_empty());
    }

    #[test]
    fn lateness_beyond_tolerance_reports_delay_from_window_end() {
        let stops = vec![planned(Priority::High, Some((9, 10)), at(10, 45))];

        let violations = check_violations(&stops, &Tolerances::default(), date());

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].delay_minutes, 45);
        assert_eq!(violations[0].stop_id, stops[0].stop.id);
    }

    #[test]
    fn early_arrival_is_never_penalized() {
        let stops = vec![planned(Priority::Low, Some((14, 15)), at(8, 0))];
        assert!(check_violations(&stops, &Tolerances::default(), date()).is_empty());
    }

    #[test]
    fn tolerance_depends_on_priority() {
        let arrival = at(11, 30);
        let stops = vec![
            planned(Priority::High, Some((9, 10)), arrival),
            planned(Priority::Normal, Some((9, 10)), arrival),
            planned(Priority::Low, Some((9, 10)), arrival),
        ];

        let violations = check_violations(&stops, &Tolerances::default(), date());

        // 90 minutes late: beyond High (30) and Normal (60), within Low (120)
        assert_eq!(violations.len(), 2);
    }

    #[test]
    fn stops_without_window_are_skipped() {
        let stops = vec![planned(Priority::High, None, at(23, 0))];
        assert!(check_violations(&stops, &Tolerances::default(), date()).is_empty());
    }

    #[test]
    fn unbounded_tolerance_does_not_overflow() {
        let stops = vec![planned(Priority::High, Some((9, 10)), at(23, 0))];
        let tolerances = Tolerances {
            high: i64::MAX,
            ..Tolerances::default()
        };

        assert!(check_violations(&stops, &tolerances, date()).is_empty());
    }
}
