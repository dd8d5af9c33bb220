use super::*;

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

fn monday_3am() -> ImportSchedule {
    ImportSchedule::weekly(Weekday::Monday, NaiveTime::from_hms_opt(3, 0, 0).unwrap())
}

#[test]
fn test_weekday_round_trip() {
    use chrono::Weekday as ChronoWd;

    let days = vec![
        ChronoWd::Mon,
        ChronoWd::Tue,
        ChronoWd::Wed,
        ChronoWd::Thu,
        ChronoWd::Fri,
        ChronoWd::Sat,
        ChronoWd::Sun,
    ];

    for day in days {
        let our_day = Weekday::from_chrono(day);
        assert_eq!(day, our_day.to_chrono());
    }
}

#[test]
fn test_default_schedule_is_monday_3am() {
    assert_eq!(ImportSchedule::default(), monday_3am());
}

#[test]
fn test_next_run_later_same_week() {
    // 2024-03-06 is a Wednesday
    let next = monday_3am().next_run_after(at(2024, 3, 6, 10, 0));
    assert_eq!(next, at(2024, 3, 11, 3, 0));
}

#[test]
fn test_next_run_same_day_before_time() {
    // 2024-03-11 is a Monday
    let next = monday_3am().next_run_after(at(2024, 3, 11, 1, 30));
    assert_eq!(next, at(2024, 3, 11, 3, 0));
}

#[test]
fn test_next_run_same_day_after_time_rolls_a_week() {
    let next = monday_3am().next_run_after(at(2024, 3, 11, 3, 1));
    assert_eq!(next, at(2024, 3, 18, 3, 0));
}

#[test]
fn test_next_run_exactly_at_trigger_rolls_a_week() {
    let next = monday_3am().next_run_after(at(2024, 3, 11, 3, 0));
    assert_eq!(next, at(2024, 3, 18, 3, 0));
}

#[test]
fn test_next_run_crosses_month_boundary() {
    let schedule =
        ImportSchedule::weekly(Weekday::Friday, NaiveTime::from_hms_opt(22, 15, 0).unwrap());
    // 2024-01-29 is a Monday
    let next = schedule.next_run_after(at(2024, 1, 29, 0, 0));
    assert_eq!(next, at(2024, 2, 2, 22, 15));
}

#[test]
fn test_schedule_serialization() {
    let json = serde_json::to_value(monday_3am()).unwrap();
    assert_eq!(json["day"], "Monday");
    assert_eq!(json["time"], "03:00:00");

    let back: ImportSchedule = serde_json::from_value(json).unwrap();
    assert_eq!(back, monday_3am());
}

#[test]
fn test_schedule_rejects_bad_time() {
    let result: Result<ImportSchedule, _> =
        serde_json::from_str(r#"{"day":"Monday","time":"3am"}"#);
    assert!(result.is_err());
}
