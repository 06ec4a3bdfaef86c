//! Partition transforms applied on single values, plus the projection of
//! column predicates to partition predicates.

use super::{PrimitiveValue, Transform};
use crate::expr::PredicateOperator;
use crate::Result;

mod bucket;
mod identity;
mod temporal;
mod truncate;
mod void;

/// TransformFunction is a trait that defines the interface of a transform function.
pub trait TransformFunction: Send + Sync {
    /// Transform a non-null source value into a partition value.
    ///
    /// `None` means the transform always produces null.
    fn transform(&self, input: &PrimitiveValue) -> Result<Option<PrimitiveValue>>;

    /// Project `source op literals` onto the partition value so that every
    /// row matching the source predicate also matches the projection.
    ///
    /// `None` means the predicate can't be projected and the partition
    /// value can't be used to prune.
    fn project(
        &self,
        op: PredicateOperator,
        literals: &[PrimitiveValue],
    ) -> Result<Option<(PredicateOperator, Vec<PrimitiveValue>)>>;
}

/// BoxedTransformFunction is a boxed trait object of TransformFunction.
pub type BoxedTransformFunction = Box<dyn TransformFunction>;

/// Create a transform function from a Transform.
pub fn create_transform_function(transform: Transform) -> BoxedTransformFunction {
    match transform {
        Transform::Identity => Box::new(identity::Identity {}),
        Transform::Void => Box::new(void::Void {}),
        Transform::Bucket(n) => Box::new(bucket::Bucket::new(n)),
        Transform::Truncate(w) => Box::new(truncate::Truncate::new(w)),
        Transform::Year => Box::new(temporal::Year {}),
        Transform::Month => Box::new(temporal::Month {}),
        Transform::Day => Box::new(temporal::Day {}),
        Transform::Hour => Box::new(temporal::Hour {}),
    }
}

impl Transform {
    /// Apply this transform on an optional source value.
    pub fn apply(&self, input: Option<&PrimitiveValue>) -> Result<Option<PrimitiveValue>> {
        match input {
            None => Ok(None),
            Some(v) => create_transform_function(*self).transform(v),
        }
    }
}

/// Projection shared by transforms that preserve order: `a <= b` implies
/// `t(a) <= t(b)`.
pub(crate) fn project_monotone(
    f: &dyn TransformFunction,
    op: PredicateOperator,
    literals: &[PrimitiveValue],
) -> Result<Option<(PredicateOperator, Vec<PrimitiveValue>)>> {
    use PredicateOperator::*;

    let projected_op = match op {
        IsNull | NotNull => return Ok(Some((op, vec![]))),
        LessThan | LessThanOrEq => LessThanOrEq,
        GreaterThan | GreaterThanOrEq => GreaterThanOrEq,
        Eq => Eq,
        In => In,
        _ => return Ok(None),
    };

    let mut projected = Vec::with_capacity(literals.len());
    for literal in literals {
        match f.transform(literal)? {
            Some(v) if !projected.contains(&v) => projected.push(v),
            Some(_) => {}
            None => return Ok(None),
        }
    }
    Ok(Some((projected_op, projected)))
}
