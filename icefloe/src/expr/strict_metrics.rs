use std::cmp::Ordering;

use super::{BoundPredicate, PredicateOperator};
use crate::types::{DataFile, PrimitiveValue};

/// Decides from column statistics whether every row of a file matches a
/// predicate.
///
/// Used by the scan planner to drop the residual filter of a task.
pub struct StrictMetricsEvaluator {
    filter: BoundPredicate,
}

impl StrictMetricsEvaluator {
    /// `filter` must be bound to the table schema.
    pub fn new(filter: BoundPredicate) -> Self {
        Self {
            filter: filter.rewrite_not(),
        }
    }

    /// Returns true only when all rows of `file` must match.
    pub fn eval(&self, file: &DataFile) -> bool {
        if file.record_count <= 0 {
            return true;
        }
        visit(&self.filter, file)
    }
}

fn visit(predicate: &BoundPredicate, file: &DataFile) -> bool {
    match predicate {
        BoundPredicate::AlwaysTrue => true,
        BoundPredicate::AlwaysFalse => false,
        BoundPredicate::And(l, r) => visit(l, file) && visit(r, file),
        BoundPredicate::Or(l, r) => visit(l, file) || visit(r, file),
        BoundPredicate::Not(_) => false,
        BoundPredicate::Unary { op, term } => unary(*op, term.field_id, file),
        BoundPredicate::Binary { op, term, literal } => binary(*op, term.field_id, literal, file),
        BoundPredicate::Set { op, term, literals } => set(*op, term.field_id, literals, file),
    }
}

fn contains_nulls_only(id: i32, file: &DataFile) -> bool {
    matches!((file.value_count(id), file.null_count(id)), (Some(values), Some(nulls)) if values == nulls)
}

fn contains_nans_only(id: i32, file: &DataFile) -> bool {
    matches!((file.value_count(id), file.nan_count(id)), (Some(values), Some(nans)) if values == nans)
}

fn may_contain_nulls_or_nans(id: i32, file: &DataFile) -> bool {
    file.null_count(id) != Some(0) || file.nan_count(id).map_or(false, |nans| nans > 0)
}

fn unary(op: PredicateOperator, id: i32, file: &DataFile) -> bool {
    match op {
        PredicateOperator::IsNull => contains_nulls_only(id, file),
        PredicateOperator::NotNull => file.null_count(id) == Some(0),
        PredicateOperator::IsNan => contains_nans_only(id, file),
        PredicateOperator::NotNan => {
            file.nan_count(id) == Some(0) || contains_nulls_only(id, file)
        }
        _ => false,
    }
}

fn binary(op: PredicateOperator, id: i32, literal: &PrimitiveValue, file: &DataFile) -> bool {
    let lower = file.lower_bound(id).filter(|v| !v.is_nan());
    let upper = file.upper_bound(id).filter(|v| !v.is_nan());
    let lower_cmp = lower.and_then(|v| v.compare(literal));
    let upper_cmp = upper.and_then(|v| v.compare(literal));

    if op == PredicateOperator::NotEq {
        if contains_nulls_only(id, file) || contains_nans_only(id, file) {
            return true;
        }
        return lower_cmp == Some(Ordering::Greater) || upper_cmp == Some(Ordering::Less);
    }

    if may_contain_nulls_or_nans(id, file) {
        return false;
    }

    match op {
        PredicateOperator::LessThan => upper_cmp == Some(Ordering::Less),
        PredicateOperator::LessThanOrEq => {
            matches!(upper_cmp, Some(Ordering::Less | Ordering::Equal))
        }
        PredicateOperator::GreaterThan => lower_cmp == Some(Ordering::Greater),
        PredicateOperator::GreaterThanOrEq => {
            matches!(lower_cmp, Some(Ordering::Greater | Ordering::Equal))
        }
        PredicateOperator::Eq => {
            lower_cmp == Some(Ordering::Equal) && upper_cmp == Some(Ordering::Equal)
        }
        _ => false,
    }
}

fn set(op: PredicateOperator, id: i32, literals: &[PrimitiveValue], file: &DataFile) -> bool {
    let lower = file.lower_bound(id).filter(|v| !v.is_nan());
    let upper = file.upper_bound(id).filter(|v| !v.is_nan());

    match op {
        PredicateOperator::In => {
            if may_contain_nulls_or_nans(id, file) {
                return false;
            }
            match (lower, upper) {
                (Some(lower), Some(upper)) if lower == upper => literals.contains(lower),
                _ => false,
            }
        }
        PredicateOperator::NotIn => {
            if contains_nulls_only(id, file) || contains_nans_only(id, file) {
                return true;
            }
            let (Some(lower), Some(upper)) = (lower, upper) else {
                return false;
            };
            literals.iter().all(|lit| {
                lower.compare(lit) == Some(Ordering::Greater)
                    || upper.compare(lit) == Some(Ordering::Less)
            })
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::expr::bound::tests::test_struct;
    use crate::expr::{Predicate, Reference};

    fn file(data_nulls: i64) -> DataFile {
        DataFile::builder()
            .with_file_path("s3://bucket/data/a.parquet")
            .with_record_count(10)
            .with_file_size_in_bytes(100)
            .with_value_counts(HashMap::from([(2, 10), (1, 10)]))
            .with_null_value_counts(HashMap::from([(2, data_nulls), (1, 10)]))
            .with_lower_bounds(HashMap::from([(2, "d".into())]))
            .with_upper_bounds(HashMap::from([(2, "f".into())]))
            .build()
            .unwrap()
    }

    fn eval(predicate: Predicate, file: &DataFile) -> bool {
        StrictMetricsEvaluator::new(predicate.bind(&test_struct(), true).unwrap()).eval(file)
    }

    #[test]
    fn test_bounds_within_filter() {
        let f = file(0);
        assert!(eval(Reference::new("data").greater_than_or_equal_to("d"), &f));
        assert!(!eval(Reference::new("data").greater_than("d"), &f));
        assert!(eval(Reference::new("data").less_than("g"), &f));
        assert!(!eval(Reference::new("data").equal_to("d"), &f));
        assert!(eval(Reference::new("data").not_equal_to("a"), &f));
        assert!(eval(Reference::new("data").is_not_in(["a", "b"]), &f));
        assert!(!eval(Reference::new("data").is_not_in(["a", "e"]), &f));
        assert!(eval(Reference::new("data").is_not_null(), &f));
    }

    #[test]
    fn test_nulls_break_strictness() {
        let f = file(1);
        assert!(!eval(Reference::new("data").greater_than_or_equal_to("d"), &f));
        assert!(!eval(Reference::new("data").is_not_null(), &f));
        assert!(eval(Reference::new("id").is_null(), &f));
        assert!(eval(Reference::new("id").not_equal_to(3), &f));
    }
}
