use std::cmp::Ordering;

use super::manifest_evaluator::starts_with_might_match;
use super::{BoundPredicate, PredicateOperator};
use crate::types::{DataFile, PrimitiveValue};

/// Decides from column statistics whether a file may contain rows matching
/// a predicate.
///
/// Missing statistics never prune anything.
pub struct InclusiveMetricsEvaluator {
    filter: BoundPredicate,
}

impl InclusiveMetricsEvaluator {
    /// `filter` must be bound to the table schema.
    pub fn new(filter: BoundPredicate) -> Self {
        Self {
            filter: filter.rewrite_not(),
        }
    }

    /// Returns false only when no row of `file` can match.
    pub fn eval(&self, file: &DataFile) -> bool {
        if file.record_count == 0 {
            return false;
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
        BoundPredicate::Not(_) => true,
        BoundPredicate::Unary { op, term } => unary(*op, term.field_id, file),
        BoundPredicate::Binary { op, term, literal } => binary(*op, term.field_id, literal, file),
        BoundPredicate::Set { op, term, literals } => match op {
            PredicateOperator::In => is_in(term.field_id, literals, file),
            _ => true,
        },
    }
}

fn contains_nulls_only(id: i32, file: &DataFile) -> bool {
    matches!((file.value_count(id), file.null_count(id)), (Some(values), Some(nulls)) if values == nulls)
}

fn contains_nans_only(id: i32, file: &DataFile) -> bool {
    matches!((file.value_count(id), file.nan_count(id)), (Some(values), Some(nans)) if values == nans)
}

fn unary(op: PredicateOperator, id: i32, file: &DataFile) -> bool {
    match op {
        PredicateOperator::IsNull => file.null_count(id) != Some(0),
        PredicateOperator::NotNull => !contains_nulls_only(id, file),
        PredicateOperator::IsNan => {
            file.nan_count(id) != Some(0) && !contains_nulls_only(id, file)
        }
        PredicateOperator::NotNan => !contains_nans_only(id, file),
        _ => true,
    }
}

fn binary(op: PredicateOperator, id: i32, literal: &PrimitiveValue, file: &DataFile) -> bool {
    match op {
        PredicateOperator::NotEq => return true,
        PredicateOperator::NotStartsWith => return not_starts_with(id, literal, file),
        _ => {}
    }

    if contains_nulls_only(id, file) || contains_nans_only(id, file) {
        return false;
    }

    let lower = file.lower_bound(id).filter(|v| !v.is_nan());
    let upper = file.upper_bound(id).filter(|v| !v.is_nan());
    let lower_cmp = lower.and_then(|v| v.compare(literal));
    let upper_cmp = upper.and_then(|v| v.compare(literal));

    match op {
        PredicateOperator::LessThan => lower_cmp.map_or(true, |o| o == Ordering::Less),
        PredicateOperator::LessThanOrEq => lower_cmp.map_or(true, |o| o != Ordering::Greater),
        PredicateOperator::GreaterThan => upper_cmp.map_or(true, |o| o == Ordering::Greater),
        PredicateOperator::GreaterThanOrEq => upper_cmp.map_or(true, |o| o != Ordering::Less),
        PredicateOperator::Eq => {
            lower_cmp.map_or(true, |o| o != Ordering::Greater)
                && upper_cmp.map_or(true, |o| o != Ordering::Less)
        }
        PredicateOperator::StartsWith => match (lower, upper) {
            (Some(lower), Some(upper)) => starts_with_might_match(lower, upper, literal),
            (Some(lower), None) => starts_with_might_match(lower, &max_string(literal), literal),
            (None, Some(upper)) => {
                starts_with_might_match(&PrimitiveValue::from(""), upper, literal)
            }
            (None, None) => true,
        },
        _ => true,
    }
}

/// A string sorting after every string starting with `prefix`.
fn max_string(prefix: &PrimitiveValue) -> PrimitiveValue {
    match prefix {
        PrimitiveValue::String(p) => PrimitiveValue::String(format!("{p}{}", char::MAX)),
        v => v.clone(),
    }
}

fn not_starts_with(id: i32, prefix: &PrimitiveValue, file: &DataFile) -> bool {
    if file.null_count(id) != Some(0) {
        return true;
    }
    let PrimitiveValue::String(prefix) = prefix else {
        return true;
    };
    match (file.lower_bound(id), file.upper_bound(id)) {
        (Some(PrimitiveValue::String(lower)), Some(PrimitiveValue::String(upper))) => {
            !(lower.starts_with(prefix.as_str()) && upper.starts_with(prefix.as_str()))
        }
        _ => true,
    }
}

fn is_in(id: i32, literals: &[PrimitiveValue], file: &DataFile) -> bool {
    if contains_nulls_only(id, file) || contains_nans_only(id, file) {
        return false;
    }

    let lower = file.lower_bound(id).filter(|v| !v.is_nan());
    let upper = file.upper_bound(id).filter(|v| !v.is_nan());
    literals.iter().any(|lit| {
        lower.map_or(true, |l| l.compare(lit) != Some(Ordering::Greater))
            && upper.map_or(true, |u| u.compare(lit) != Some(Ordering::Less))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::expr::bound::tests::test_struct;
    use crate::expr::{Predicate, Reference};
    use crate::types::DataFile;

    fn file_with_data_bounds(lower: &str, upper: &str) -> DataFile {
        DataFile::builder()
            .with_file_path("s3://bucket/data/a.parquet")
            .with_record_count(10)
            .with_file_size_in_bytes(100)
            .with_value_counts(HashMap::from([(2, 10), (1, 10)]))
            .with_null_value_counts(HashMap::from([(2, 0), (1, 10)]))
            .with_lower_bounds(HashMap::from([(2, lower.into())]))
            .with_upper_bounds(HashMap::from([(2, upper.into())]))
            .build()
            .unwrap()
    }

    fn eval(predicate: Predicate, file: &DataFile) -> bool {
        InclusiveMetricsEvaluator::new(predicate.bind(&test_struct(), true).unwrap()).eval(file)
    }

    #[test]
    fn test_string_bounds() {
        let file = file_with_data_bounds("a", "c");
        assert!(!eval(Reference::new("data").greater_than_or_equal_to("d"), &file));
        assert!(eval(Reference::new("data").greater_than_or_equal_to("c"), &file));
        assert!(!eval(Reference::new("data").greater_than("c"), &file));
        assert!(eval(Reference::new("data").less_than("b"), &file));
        assert!(!eval(Reference::new("data").less_than("a"), &file));
        assert!(eval(Reference::new("data").equal_to("b"), &file));
        assert!(!eval(Reference::new("data").equal_to("d"), &file));
        assert!(eval(Reference::new("data").not_equal_to("b"), &file));
        assert!(!eval(Reference::new("data").is_in(["x", "y", "z"]), &file));
        assert!(eval(Reference::new("data").is_in(["x", "b"]), &file));
        assert!(!eval(Reference::new("data").starts_with("d"), &file));
        assert!(eval(Reference::new("data").starts_with("b"), &file));
    }

    #[test]
    fn test_null_counts() {
        let file = file_with_data_bounds("a", "c");
        assert!(!eval(Reference::new("data").is_null(), &file));
        assert!(eval(Reference::new("data").is_not_null(), &file));
        // Column `id` is all nulls.
        assert!(eval(Reference::new("id").is_null(), &file));
        assert!(!eval(Reference::new("id").is_not_null(), &file));
        assert!(!eval(Reference::new("id").equal_to(1), &file));
    }

    #[test]
    fn test_missing_stats_and_empty_files() {
        let file = DataFile::builder()
            .with_file_path("s3://bucket/data/a.parquet")
            .with_record_count(10)
            .with_file_size_in_bytes(100)
            .build()
            .unwrap();
        assert!(eval(Reference::new("data").equal_to("x"), &file));
        assert!(eval(Reference::new("id").is_null(), &file));

        let mut empty = file;
        empty.record_count = 0;
        assert!(!eval(Predicate::AlwaysTrue, &empty));
    }

    #[test]
    fn test_negated_filter() {
        let file = file_with_data_bounds("a", "c");
        assert!(!eval(
            Reference::new("data").less_than("d").negate(),
            &file
        ));
    }
}
