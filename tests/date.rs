use std::time::{Duration, SystemTime};

use flue::date::HttpDate;

#[test]
fn formats_as_imf_fixdate() {
    let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000_000);
    let date = HttpDate::from_system_time(t);
    assert_eq!(date.to_string(), "Sun, 09 Sep 2001 01:46:40 GMT");
}

#[test]
fn parses_its_own_output() {
    let date = HttpDate::now();
    let parsed = HttpDate::parse(&date.to_string()).unwrap();
    assert_eq!(date, parsed);
}

#[test]
fn accepts_all_three_rfc_9110_date_grammars_for_the_same_instant() {
    let imf = HttpDate::parse("Sun, 06 Nov 1994 08:49:37 GMT").unwrap();
    let rfc850 = HttpDate::parse("Sunday, 06-Nov-94 08:49:37 GMT").unwrap();
    let asctime = HttpDate::parse("Sun Nov  6 08:49:37 1994").unwrap();
    assert_eq!(imf, rfc850);
    assert_eq!(imf, asctime);
}

#[test]
fn rejects_garbage() {
    assert!(HttpDate::parse("not a date").is_err());
    assert!(HttpDate::parse("").is_err());
}

#[test]
fn ordering_ignores_sub_second_precision() {
    let a = HttpDate::from_system_time(SystemTime::UNIX_EPOCH + Duration::from_millis(5_001));
    let b = HttpDate::from_system_time(SystemTime::UNIX_EPOCH + Duration::from_millis(5_999));
    assert_eq!(a, b);
    let c = HttpDate::from_system_time(SystemTime::UNIX_EPOCH + Duration::from_secs(6));
    assert!(c > a);
}
