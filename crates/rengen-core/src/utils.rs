//! 通用工具函数

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// 后端未填写时使用的每日最大UP
pub const DEFAULT_MAX_UP_PER_DAY: i32 = 120;

/// 解析日期，接受 `YYYY-MM-DD` 或完整时间戳（取 `T` 之前的部分）
pub fn parse_work_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.trim().split('T').next()?;
    let date_part = date_part.split(' ').next()?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// 解析班次时间，接受 `HH:MM` 与 `HH:MM:SS`
pub fn parse_shift_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

/// 解析后端时间戳
///
/// 支持 RFC 3339、`2025-10-17 19:48:41.000 +0300` 以及不带时区的格式（按UTC处理）。
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f %z") {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// 查询参数使用的日期格式
pub fn format_query_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// 班次时间的展示格式，缺失时显示破折号
pub fn format_shift_time(time: Option<NaiveTime>) -> String {
    time.map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| "—".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_work_date() {
        let expected = NaiveDate::from_ymd_opt(2025, 10, 13);
        assert_eq!(parse_work_date("2025-10-13"), expected);
        assert_eq!(parse_work_date("2025-10-13T00:00:00Z"), expected);
        assert_eq!(parse_work_date("2025-10-13 00:00:00"), expected);
        assert_eq!(parse_work_date("13.10.2025"), None);
    }

    #[test]
    fn test_parse_shift_time() {
        assert_eq!(parse_shift_time("09:00:00").map(|t| t.hour()), Some(9));
        assert_eq!(parse_shift_time("14:30").map(|t| t.minute()), Some(30));
        assert!(parse_shift_time("later").is_none());
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let rfc = parse_timestamp("2025-10-17T19:48:41+03:00").unwrap();
        assert_eq!(rfc.hour(), 16);

        let legacy = parse_timestamp("2025-10-17 19:48:41.000 +0300").unwrap();
        assert_eq!(legacy, rfc);

        let naive = parse_timestamp("2025-10-17T19:48:41").unwrap();
        assert_eq!(naive.day(), 17);
        assert_eq!(naive.hour(), 19);
    }

    #[test]
    fn test_format_shift_time() {
        assert_eq!(format_shift_time(parse_shift_time("08:05:00")), "08:05");
        assert_eq!(format_shift_time(None), "—");
    }
}
