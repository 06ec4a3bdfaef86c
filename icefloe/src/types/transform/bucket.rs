use std::io::Cursor;

use super::TransformFunction;
use crate::expr::PredicateOperator;
use crate::types::PrimitiveValue;
use crate::{Error, ErrorKind, Result};

pub struct Bucket {
    num_buckets: i32,
}

impl Bucket {
    pub fn new(num_buckets: i32) -> Self {
        Self { num_buckets }
    }

    fn hash_bytes(bytes: &[u8]) -> Result<i32> {
        murmur3::murmur3_32(&mut Cursor::new(bytes), 0)
            .map(|v| v as i32)
            .map_err(|e| Error::new(ErrorKind::Unexpected, "murmur3 hash failed").set_source(e))
    }

    fn hash_long(v: i64) -> Result<i32> {
        Self::hash_bytes(&v.to_le_bytes())
    }

    /// Minimal big-endian two's complement bytes of an unscaled decimal.
    fn decimal_bytes(v: i128) -> Vec<u8> {
        let bytes = v.to_be_bytes();
        let mut start = 0;
        while start < bytes.len() - 1 {
            let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
                || (bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0);
            if !redundant {
                break;
            }
            start += 1;
        }
        bytes[start..].to_vec()
    }

    pub(crate) fn hash(input: &PrimitiveValue) -> Result<i32> {
        match input {
            PrimitiveValue::Int(v) => Self::hash_long(*v as i64),
            PrimitiveValue::Long(v) => Self::hash_long(*v),
            PrimitiveValue::Decimal(v) => Self::hash_bytes(&Self::decimal_bytes(*v)),
            PrimitiveValue::Date(v) => Self::hash_long(PrimitiveValue::days_from_epoch(v)),
            PrimitiveValue::Time(v) => Self::hash_long(PrimitiveValue::micros_from_midnight(v)),
            PrimitiveValue::Timestamp(v) => Self::hash_long(PrimitiveValue::micros_from_epoch(v)),
            PrimitiveValue::Timestampz(v) => {
                Self::hash_long(PrimitiveValue::micros_from_epoch(&v.naive_utc()))
            }
            PrimitiveValue::String(v) => Self::hash_bytes(v.as_bytes()),
            PrimitiveValue::Uuid(v) => Self::hash_bytes(v.as_bytes()),
            PrimitiveValue::Fixed(v) | PrimitiveValue::Binary(v) => Self::hash_bytes(v),
            v => Err(Error::new(
                ErrorKind::DataInvalid,
                format!("bucket transform can't be applied on {v}"),
            )),
        }
    }
}

impl TransformFunction for Bucket {
    fn transform(&self, input: &PrimitiveValue) -> Result<Option<PrimitiveValue>> {
        if self.num_buckets <= 0 {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!("bucket[{}] has no bucket to hash into", self.num_buckets),
            ));
        }
        let hash = Self::hash(input)?;
        Ok(Some(PrimitiveValue::Int(
            (hash & i32::MAX) % self.num_buckets,
        )))
    }

    fn project(
        &self,
        op: PredicateOperator,
        literals: &[PrimitiveValue],
    ) -> Result<Option<(PredicateOperator, Vec<PrimitiveValue>)>> {
        match op {
            PredicateOperator::IsNull | PredicateOperator::NotNull => Ok(Some((op, vec![]))),
            PredicateOperator::Eq | PredicateOperator::In => {
                let mut buckets = Vec::with_capacity(literals.len());
                for literal in literals {
                    if let Some(bucket) = self.transform(literal)? {
                        if !buckets.contains(&bucket) {
                            buckets.push(bucket);
                        }
                    }
                }
                Ok(Some((op, buckets)))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_matches_reference_values() {
        assert_eq!(Bucket::hash(&PrimitiveValue::Int(34)).unwrap(), 2017239379);
        assert_eq!(Bucket::hash(&PrimitiveValue::Long(34)).unwrap(), 2017239379);
        assert_eq!(
            Bucket::hash(&PrimitiveValue::from("iceberg")).unwrap(),
            1210000089
        );
    }

    #[test]
    fn test_decimal_bytes() {
        assert_eq!(Bucket::decimal_bytes(1420), vec![0x05, 0x8c]);
        assert_eq!(Bucket::decimal_bytes(-1), vec![0xff]);
        assert_eq!(Bucket::decimal_bytes(0), vec![0x00]);
    }

    #[test]
    fn test_project_eq_only() {
        let bucket = Bucket::new(16);
        let (op, lits) = bucket
            .project(PredicateOperator::Eq, &[PrimitiveValue::Int(34)])
            .unwrap()
            .unwrap();
        assert_eq!(op, PredicateOperator::Eq);
        assert_eq!(lits, vec![PrimitiveValue::Int(2017239379 % 16)]);
        assert!(bucket
            .project(PredicateOperator::LessThan, &[PrimitiveValue::Int(34)])
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_zero_buckets_is_rejected() {
        let err = Bucket::new(0)
            .project(PredicateOperator::Eq, &[PrimitiveValue::Int(1)])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataInvalid);
    }
}
