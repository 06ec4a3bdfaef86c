use super::TransformFunction;
use crate::expr::PredicateOperator;
use crate::types::PrimitiveValue;
use crate::Result;

pub struct Void {}

impl TransformFunction for Void {
    fn transform(&self, _input: &PrimitiveValue) -> Result<Option<PrimitiveValue>> {
        Ok(None)
    }

    fn project(
        &self,
        _op: PredicateOperator,
        _literals: &[PrimitiveValue],
    ) -> Result<Option<(PredicateOperator, Vec<PrimitiveValue>)>> {
        Ok(None)
    }
}
