use chrono::{Datelike, NaiveDateTime};

use super::{project_monotone, TransformFunction};
use crate::expr::PredicateOperator;
use crate::types::PrimitiveValue;
use crate::{Error, ErrorKind, Result};

const MICROS_PER_HOUR: i64 = 3_600_000_000;

fn as_datetime(input: &PrimitiveValue, transform: &str) -> Result<NaiveDateTime> {
    match input {
        PrimitiveValue::Date(v) => Ok(v.and_time(chrono::NaiveTime::MIN)),
        PrimitiveValue::Timestamp(v) => Ok(*v),
        PrimitiveValue::Timestampz(v) => Ok(v.naive_utc()),
        v => Err(Error::new(
            ErrorKind::DataInvalid,
            format!("{transform} transform can't be applied on {v}"),
        )),
    }
}

pub struct Year;

impl TransformFunction for Year {
    fn transform(&self, input: &PrimitiveValue) -> Result<Option<PrimitiveValue>> {
        let ts = as_datetime(input, "year")?;
        Ok(Some(PrimitiveValue::Int(ts.year() - 1970)))
    }

    fn project(
        &self,
        op: PredicateOperator,
        literals: &[PrimitiveValue],
    ) -> Result<Option<(PredicateOperator, Vec<PrimitiveValue>)>> {
        project_monotone(self, op, literals)
    }
}

pub struct Month;

impl TransformFunction for Month {
    fn transform(&self, input: &PrimitiveValue) -> Result<Option<PrimitiveValue>> {
        let ts = as_datetime(input, "month")?;
        Ok(Some(PrimitiveValue::Int(
            (ts.year() - 1970) * 12 + ts.month0() as i32,
        )))
    }

    fn project(
        &self,
        op: PredicateOperator,
        literals: &[PrimitiveValue],
    ) -> Result<Option<(PredicateOperator, Vec<PrimitiveValue>)>> {
        project_monotone(self, op, literals)
    }
}

pub struct Day;

impl TransformFunction for Day {
    fn transform(&self, input: &PrimitiveValue) -> Result<Option<PrimitiveValue>> {
        let ts = as_datetime(input, "day")?;
        Ok(Some(PrimitiveValue::Int(
            PrimitiveValue::days_from_epoch(&ts.date()) as i32,
        )))
    }

    fn project(
        &self,
        op: PredicateOperator,
        literals: &[PrimitiveValue],
    ) -> Result<Option<(PredicateOperator, Vec<PrimitiveValue>)>> {
        project_monotone(self, op, literals)
    }
}

pub struct Hour;

impl TransformFunction for Hour {
    fn transform(&self, input: &PrimitiveValue) -> Result<Option<PrimitiveValue>> {
        if matches!(input, PrimitiveValue::Date(_)) {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                "hour transform can't be applied on date",
            ));
        }
        let ts = as_datetime(input, "hour")?;
        let micros = PrimitiveValue::micros_from_epoch(&ts);
        Ok(Some(PrimitiveValue::Int(
            micros.div_euclid(MICROS_PER_HOUR) as i32,
        )))
    }

    fn project(
        &self,
        op: PredicateOperator,
        literals: &[PrimitiveValue],
    ) -> Result<Option<(PredicateOperator, Vec<PrimitiveValue>)>> {
        project_monotone(self, op, literals)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn test_temporal_transforms() {
        let date = PrimitiveValue::Date(NaiveDate::from_ymd_opt(2017, 11, 16).unwrap());
        assert_eq!(
            Year.transform(&date).unwrap(),
            Some(PrimitiveValue::Int(47))
        );
        assert_eq!(
            Month.transform(&date).unwrap(),
            Some(PrimitiveValue::Int(47 * 12 + 10))
        );
        assert_eq!(
            Day.transform(&date).unwrap(),
            Some(PrimitiveValue::Int(17486))
        );

        let ts = PrimitiveValue::Timestamp(
            NaiveDate::from_ymd_opt(1970, 1, 2)
                .unwrap()
                .and_hms_opt(3, 30, 0)
                .unwrap(),
        );
        assert_eq!(Hour.transform(&ts).unwrap(), Some(PrimitiveValue::Int(27)));
        assert!(Hour.transform(&date).is_err());
    }
}
