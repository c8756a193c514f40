use super::Raw;
use chrono::prelude::*;
use serde::ser::{self, Serialize};

/// Serializes a date as a PDF date string, e.g. `(D:20150219223326+01'00')`.
pub fn serialize<S, Tz>(date: &DateTime<Tz>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: ser::Serializer,
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let s = date.format("%Y%m%d%H%M%S").to_string();
    let mut tz = date.format("%z").to_string();
    let min = tz.split_off(3);
    let date = format!("(D:{}{}'{}')", s, tz, min);
    Raw(date.as_bytes()).serialize(serializer)
}

#[test]
fn datetime_serialization() {
    use chrono::FixedOffset;

    #[derive(Serialize)]
    struct Test {
        #[serde(with = "crate::datetime")]
        datetime: DateTime<FixedOffset>,
    }

    let test = Test {
        datetime: FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2015, 2, 19, 22, 33, 26)
            .unwrap(),
    };

    assert_eq!(
        crate::ser::to_string(&test).unwrap(),
        "<< /Type /Test /datetime (D:20150219223326+01'00') >>"
    );
}

#[test]
fn utc_dates_have_zero_offset() {
    #[derive(Serialize)]
    #[serde(rename = "")]
    struct Info {
        #[serde(with = "crate::datetime")]
        created: DateTime<Utc>,
    }

    let info = Info {
        created: Utc.with_ymd_and_hms(2019, 6, 2, 14, 28, 0).unwrap(),
    };
    assert_eq!(
        crate::ser::to_string(&info).unwrap(),
        "<< /created (D:20190602142800+00'00') >>"
    );
}
