use super::{project_monotone, TransformFunction};
use crate::expr::PredicateOperator;
use crate::types::PrimitiveValue;
use crate::{Error, ErrorKind, Result};

pub struct Truncate {
    width: i32,
}

impl Truncate {
    pub fn new(width: i32) -> Self {
        Self { width }
    }
}

impl TransformFunction for Truncate {
    fn transform(&self, input: &PrimitiveValue) -> Result<Option<PrimitiveValue>> {
        if self.width <= 0 {
            return Err(Error::new(
                ErrorKind::DataInvalid,
                format!("truncate[{}] has a non-positive width", self.width),
            ));
        }
        // Rounds towards negative infinity.
        let v = match input {
            PrimitiveValue::Int(v) => PrimitiveValue::Int(v.wrapping_sub(v.rem_euclid(self.width))),
            PrimitiveValue::Long(v) => {
                PrimitiveValue::Long(v.wrapping_sub(v.rem_euclid(self.width as i64)))
            }
            PrimitiveValue::Decimal(v) => {
                PrimitiveValue::Decimal(v.wrapping_sub(v.rem_euclid(self.width as i128)))
            }
            PrimitiveValue::String(v) => {
                PrimitiveValue::String(v.chars().take(self.width as usize).collect())
            }
            PrimitiveValue::Binary(v) => {
                PrimitiveValue::Binary(v.iter().take(self.width as usize).copied().collect())
            }
            v => {
                return Err(Error::new(
                    ErrorKind::DataInvalid,
                    format!("truncate transform can't be applied on {v}"),
                ))
            }
        };
        Ok(Some(v))
    }

    fn project(
        &self,
        op: PredicateOperator,
        literals: &[PrimitiveValue],
    ) -> Result<Option<(PredicateOperator, Vec<PrimitiveValue>)>> {
        if op == PredicateOperator::StartsWith {
            let Some(PrimitiveValue::String(prefix)) = literals.first() else {
                return Ok(None);
            };
            return if prefix.chars().count() >= self.width as usize {
                let truncated = self.transform(&PrimitiveValue::String(prefix.clone()))?;
                Ok(truncated.map(|v| (PredicateOperator::Eq, vec![v])))
            } else {
                Ok(Some((op, literals.to_vec())))
            };
        }
        project_monotone(self, op, literals)
    }
}
