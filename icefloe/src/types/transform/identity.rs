use super::TransformFunction;
use crate::expr::PredicateOperator;
use crate::types::PrimitiveValue;
use crate::Result;

pub struct Identity {}

impl TransformFunction for Identity {
    fn transform(&self, input: &PrimitiveValue) -> Result<Option<PrimitiveValue>> {
        Ok(Some(input.clone()))
    }

    fn project(
        &self,
        op: PredicateOperator,
        literals: &[PrimitiveValue],
    ) -> Result<Option<(PredicateOperator, Vec<PrimitiveValue>)>> {
        Ok(Some((op, literals.to_vec())))
    }
}
