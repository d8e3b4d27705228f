// File: src/stdlib/time.rs
//
// Grounded on `stdlib/time.go`: format layout constants, duration/month
// constants, and a subset of the `time.*` functions built on `Value::Time`.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};

use crate::errors::GsError;
use crate::value::Value;

use super::{as_i64, as_str, host_fn, module_of, str_val, want};

fn as_time(v: &Value) -> Result<DateTime<Utc>, GsError> {
    match v {
        Value::Time(t) => Ok(*t),
        other => Err(GsError::invalid_argument_type("argument", "time", other.type_name())),
    }
}

pub fn module() -> Value {
    module_of(vec![
        ("format_rfc3339", str_val("%Y-%m-%dT%H:%M:%S%:z")),
        ("format_rfc3339_nano", str_val("%Y-%m-%dT%H:%M:%S%.f%:z")),
        ("format_kitchen", str_val("%I:%M%p")),
        ("format_ansic", str_val("%a %b %e %H:%M:%S %Y")),
        ("format_unix_date", str_val("%a %b %e %H:%M:%S %Z %Y")),
        ("nanosecond", Value::Int(1)),
        ("microsecond", Value::Int(1_000)),
        ("millisecond", Value::Int(1_000_000)),
        ("second", Value::Int(1_000_000_000)),
        ("minute", Value::Int(60 * 1_000_000_000)),
        ("hour", Value::Int(3600 * 1_000_000_000)),
        ("january", Value::Int(1)),
        ("february", Value::Int(2)),
        ("march", Value::Int(3)),
        ("april", Value::Int(4)),
        ("may", Value::Int(5)),
        ("june", Value::Int(6)),
        ("july", Value::Int(7)),
        ("august", Value::Int(8)),
        ("september", Value::Int(9)),
        ("october", Value::Int(10)),
        ("november", Value::Int(11)),
        ("december", Value::Int(12)),
        ("now", host_fn("now", |a| {
            want(0, a)?;
            Ok(Value::Time(Utc::now()))
        })),
        ("unix", host_fn("unix", |a| {
            want(2, a)?;
            let sec = as_i64(&a[0])?;
            let nsec = as_i64(&a[1])?;
            Ok(Value::Time(Utc.timestamp_opt(sec, nsec as u32).single().unwrap_or_default()))
        })),
        ("date", host_fn("date", |a| {
            want(7, a)?;
            let (y, mo, d, h, mi, s, ns) = (
                as_i64(&a[0])?, as_i64(&a[1])?, as_i64(&a[2])?,
                as_i64(&a[3])?, as_i64(&a[4])?, as_i64(&a[5])?, as_i64(&a[6])?,
            );
            let t = Utc
                .with_ymd_and_hms(y as i32, mo as u32, d as u32, h as u32, mi as u32, s as u32)
                .single()
                .ok_or_else(|| GsError::invalid_argument_type("date", "valid calendar date", "out of range"))?
                + Duration::nanoseconds(ns);
            Ok(Value::Time(t))
        })),
        ("parse", host_fn("parse", |a| {
            want(2, a)?;
            let (layout, s) = (as_str(&a[0])?, as_str(&a[1])?);
            DateTime::parse_from_str(&s, &layout)
                .map(|t| Value::Time(t.with_timezone(&Utc)))
                .map_err(|e| GsError::invalid_argument_type("str", "time matching layout", &e.to_string()))
        })),
        ("add", host_fn("add", |a| {
            want(2, a)?;
            let t = as_time(&a[0])?;
            let nanos = as_i64(&a[1])?;
            Ok(Value::Time(t + Duration::nanoseconds(nanos)))
        })),
        ("add_date", host_fn("add_date", |a| {
            want(4, a)?;
            let t = as_time(&a[0])?;
            let (years, months, days) = (as_i64(&a[1])?, as_i64(&a[2])?, as_i64(&a[3])?);
            let new_year = t.year() + years as i32;
            let total_months = t.month0() as i64 + months;
            let new_month = total_months.rem_euclid(12) as u32 + 1;
            let year_carry = total_months.div_euclid(12) as i32;
            let shifted = Utc
                .with_ymd_and_hms(new_year + year_carry, new_month, t.day(), t.hour(), t.minute(), t.second())
                .single()
                .unwrap_or(t);
            Ok(Value::Time(shifted + Duration::days(days)))
        })),
        ("sub", host_fn("sub", |a| {
            want(2, a)?;
            let (t, u) = (as_time(&a[0])?, as_time(&a[1])?);
            Ok(Value::Int((t - u).num_nanoseconds().unwrap_or(i64::MAX)))
        })),
        ("after", host_fn("after", |a| {
            want(2, a)?;
            Ok(Value::Bool(as_time(&a[0])? > as_time(&a[1])?))
        })),
        ("before", host_fn("before", |a| {
            want(2, a)?;
            Ok(Value::Bool(as_time(&a[0])? < as_time(&a[1])?))
        })),
        ("since", host_fn("since", |a| {
            want(1, a)?;
            Ok(Value::Int((Utc::now() - as_time(&a[0])?).num_nanoseconds().unwrap_or(0)))
        })),
        ("until", host_fn("until", |a| {
            want(1, a)?;
            Ok(Value::Int((as_time(&a[0])? - Utc::now()).num_nanoseconds().unwrap_or(0)))
        })),
        ("time_year", host_fn("time_year", |a| {
            want(1, a)?;
            Ok(Value::Int(as_time(&a[0])?.year() as i64))
        })),
        ("time_month", host_fn("time_month", |a| {
            want(1, a)?;
            Ok(Value::Int(as_time(&a[0])?.month() as i64))
        })),
        ("time_day", host_fn("time_day", |a| {
            want(1, a)?;
            Ok(Value::Int(as_time(&a[0])?.day() as i64))
        })),
        ("time_hour", host_fn("time_hour", |a| {
            want(1, a)?;
            Ok(Value::Int(as_time(&a[0])?.hour() as i64))
        })),
        ("time_minute", host_fn("time_minute", |a| {
            want(1, a)?;
            Ok(Value::Int(as_time(&a[0])?.minute() as i64))
        })),
        ("time_second", host_fn("time_second", |a| {
            want(1, a)?;
            Ok(Value::Int(as_time(&a[0])?.second() as i64))
        })),
        ("time_unix", host_fn("time_unix", |a| {
            want(1, a)?;
            Ok(Value::Int(as_time(&a[0])?.timestamp()))
        })),
        ("duration_hours", host_fn("duration_hours", |a| {
            want(1, a)?;
            Ok(Value::Float(as_i64(&a[0])? as f64 / 3_600_000_000_000.0))
        })),
        ("duration_minutes", host_fn("duration_minutes", |a| {
            want(1, a)?;
            Ok(Value::Float(as_i64(&a[0])? as f64 / 60_000_000_000.0))
        })),
        ("duration_seconds", host_fn("duration_seconds", |a| {
            want(1, a)?;
            Ok(Value::Float(as_i64(&a[0])? as f64 / 1_000_000_000.0))
        })),
        ("duration_nanoseconds", host_fn("duration_nanoseconds", |a| {
            want(1, a)?;
            Ok(Value::Int(as_i64(&a[0])?))
        })),
        ("month_string", host_fn("month_string", |a| {
            want(1, a)?;
            let m = as_i64(&a[0])?;
            const NAMES: [&str; 12] = [
                "January", "February", "March", "April", "May", "June",
                "July", "August", "September", "October", "November", "December",
            ];
            Ok(str_val(NAMES.get((m - 1) as usize).copied().unwrap_or("Unknown")))
        })),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_date_shifts_forward() {
        let Value::Map(m) = module() else { panic!() };
        let Value::HostFunction(date) = m.borrow().get("date").cloned().unwrap() else { panic!() };
        let Value::HostFunction(add_date) = m.borrow().get("add_date").cloned().unwrap() else { panic!() };
        let t = (date.func)(&[
            Value::Int(2020), Value::Int(1), Value::Int(1),
            Value::Int(0), Value::Int(0), Value::Int(0), Value::Int(0),
        ])
        .unwrap();
        let shifted = (add_date.func)(&[t, Value::Int(1), Value::Int(2), Value::Int(3)]).unwrap();
        let Value::Time(t) = shifted else { panic!() };
        assert_eq!(t.year(), 2021);
        assert_eq!(t.month(), 3);
        assert_eq!(t.day(), 4);
    }

    #[test]
    fn sub_matches_difference() {
        let Value::Map(m) = module() else { panic!() };
        let Value::HostFunction(unix) = m.borrow().get("unix").cloned().unwrap() else { panic!() };
        let Value::HostFunction(sub) = m.borrow().get("sub").cloned().unwrap() else { panic!() };
        let t1 = (unix.func)(&[Value::Int(100), Value::Int(0)]).unwrap();
        let t2 = (unix.func)(&[Value::Int(40), Value::Int(0)]).unwrap();
        let diff = (sub.func)(&[t1, t2]).unwrap();
        assert!(matches!(diff, Value::Int(n) if n == 60_000_000_000));
    }
}
