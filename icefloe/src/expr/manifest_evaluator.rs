use std::cmp::Ordering;
use std::collections::HashMap;

use super::{BoundPredicate, PredicateOperator};
use crate::types::{FieldSummary, ManifestListEntry, PrimitiveValue, Struct};

/// Decides from the partition field summaries of a manifest whether it may
/// contain files matching a partition predicate.
pub struct ManifestEvaluator {
    partition_filter: BoundPredicate,
    positions: HashMap<i32, usize>,
}

impl ManifestEvaluator {
    /// `partition_filter` must be bound to `partition_type`, see
    /// [`super::inclusive_projection`].
    pub fn new(partition_filter: BoundPredicate, partition_type: &Struct) -> Self {
        let positions = partition_type
            .fields()
            .iter()
            .enumerate()
            .map(|(pos, f)| (f.id, pos))
            .collect();
        Self {
            partition_filter: partition_filter.rewrite_not(),
            positions,
        }
    }

    /// Returns false only when no partition of the manifest can match.
    pub fn eval(&self, manifest: &ManifestListEntry) -> bool {
        self.visit(&self.partition_filter, &manifest.partitions)
    }

    fn visit(&self, predicate: &BoundPredicate, summaries: &[FieldSummary]) -> bool {
        match predicate {
            BoundPredicate::AlwaysTrue => true,
            BoundPredicate::AlwaysFalse => false,
            BoundPredicate::And(l, r) => self.visit(l, summaries) && self.visit(r, summaries),
            BoundPredicate::Or(l, r) => self.visit(l, summaries) || self.visit(r, summaries),
            BoundPredicate::Not(_) => true,
            BoundPredicate::Unary { op, term } => match self.summary(term.field_id, summaries) {
                Some(summary) => unary_might_match(*op, summary),
                None => true,
            },
            BoundPredicate::Binary { op, term, literal } => {
                match self.summary(term.field_id, summaries) {
                    Some(summary) => binary_might_match(*op, summary, literal),
                    None => true,
                }
            }
            BoundPredicate::Set { op, term, literals } => {
                match (op, self.summary(term.field_id, summaries)) {
                    (PredicateOperator::In, Some(summary)) => {
                        let (Some(lower), Some(upper)) = (&summary.lower_bound, &summary.upper_bound)
                        else {
                            // Only nulls or NaNs.
                            return false;
                        };
                        literals.iter().any(|lit| {
                            lower.compare(lit) != Some(Ordering::Greater)
                                && upper.compare(lit) != Some(Ordering::Less)
                        })
                    }
                    _ => true,
                }
            }
        }
    }

    fn summary<'a>(&self, field_id: i32, summaries: &'a [FieldSummary]) -> Option<&'a FieldSummary> {
        self.positions
            .get(&field_id)
            .and_then(|pos| summaries.get(*pos))
    }
}

fn all_values_are_null(summary: &FieldSummary) -> bool {
    summary.contains_null && summary.lower_bound.is_none() && summary.contains_nan != Some(true)
}

fn unary_might_match(op: PredicateOperator, summary: &FieldSummary) -> bool {
    match op {
        PredicateOperator::IsNull => summary.contains_null,
        PredicateOperator::NotNull => !all_values_are_null(summary),
        PredicateOperator::IsNan => summary.contains_nan != Some(false),
        PredicateOperator::NotNan => {
            !(summary.contains_nan == Some(true)
                && !summary.contains_null
                && summary.lower_bound.is_none())
        }
        _ => true,
    }
}

fn binary_might_match(op: PredicateOperator, summary: &FieldSummary, literal: &PrimitiveValue) -> bool {
    let (lower, upper) = match (&summary.lower_bound, &summary.upper_bound) {
        (Some(lower), Some(upper)) => (lower, upper),
        // Only nulls or NaNs in this manifest, no comparison can succeed.
        _ => {
            return matches!(
                op,
                PredicateOperator::NotEq | PredicateOperator::NotStartsWith
            )
        }
    };

    match op {
        PredicateOperator::LessThan => lower.compare(literal) != Some(Ordering::Greater)
            && lower.compare(literal) != Some(Ordering::Equal),
        PredicateOperator::LessThanOrEq => lower.compare(literal) != Some(Ordering::Greater),
        PredicateOperator::GreaterThan => upper.compare(literal) != Some(Ordering::Less)
            && upper.compare(literal) != Some(Ordering::Equal),
        PredicateOperator::GreaterThanOrEq => upper.compare(literal) != Some(Ordering::Less),
        PredicateOperator::Eq => {
            lower.compare(literal) != Some(Ordering::Greater)
                && upper.compare(literal) != Some(Ordering::Less)
        }
        PredicateOperator::StartsWith => starts_with_might_match(lower, upper, literal),
        _ => true,
    }
}

/// Whether strings within `[lower, upper]` may start with `prefix`.
pub(crate) fn starts_with_might_match(
    lower: &PrimitiveValue,
    upper: &PrimitiveValue,
    prefix: &PrimitiveValue,
) -> bool {
    let (PrimitiveValue::String(lower), PrimitiveValue::String(upper), PrimitiveValue::String(prefix)) =
        (lower, upper, prefix)
    else {
        return true;
    };
    let truncated_lower: String = lower.chars().take(prefix.chars().count()).collect();
    let truncated_upper: String = upper.chars().take(prefix.chars().count()).collect();
    truncated_lower.as_str() <= prefix.as_str() && truncated_upper.as_str() >= prefix.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::BoundReference;
    use crate::types::{Field, ManifestContentType, Primitive};

    fn partition_type() -> Struct {
        Struct::new(vec![Field::optional(1000, "category", Primitive::String).into()])
    }

    fn manifest(summary: FieldSummary) -> ManifestListEntry {
        ManifestListEntry {
            manifest_path: "m.json".to_string(),
            manifest_length: 10,
            partition_spec_id: 1,
            content: ManifestContentType::Deletes,
            sequence_number: 1,
            min_sequence_number: 1,
            added_snapshot_id: 1,
            added_data_files_count: 1,
            existing_data_files_count: 0,
            deleted_data_files_count: 0,
            added_rows_count: 1,
            existing_rows_count: 0,
            deleted_rows_count: 0,
            partitions: vec![summary],
        }
    }

    fn category_eq(v: &str) -> BoundPredicate {
        BoundPredicate::Binary {
            op: PredicateOperator::Eq,
            term: BoundReference {
                field_id: 1000,
                name: "category".to_string(),
                ty: Primitive::String,
                required: false,
            },
            literal: v.into(),
        }
    }

    #[test]
    fn test_prune_by_partition_range() {
        let odd_only = manifest(FieldSummary {
            contains_null: false,
            contains_nan: None,
            lower_bound: Some("odd".into()),
            upper_bound: Some("odd".into()),
        });
        let both = manifest(FieldSummary {
            contains_null: false,
            contains_nan: None,
            lower_bound: Some("even".into()),
            upper_bound: Some("odd".into()),
        });

        let evaluator = ManifestEvaluator::new(category_eq("even"), &partition_type());
        assert!(!evaluator.eval(&odd_only));
        assert!(evaluator.eval(&both));
    }

    #[test]
    fn test_all_null_partitions() {
        let nulls = manifest(FieldSummary {
            contains_null: true,
            contains_nan: None,
            lower_bound: None,
            upper_bound: None,
        });
        assert!(!ManifestEvaluator::new(category_eq("even"), &partition_type()).eval(&nulls));
        let is_null = BoundPredicate::Unary {
            op: PredicateOperator::IsNull,
            term: BoundReference {
                field_id: 1000,
                name: "category".to_string(),
                ty: Primitive::String,
                required: false,
            },
        };
        assert!(ManifestEvaluator::new(is_null, &partition_type()).eval(&nulls));
    }

    #[test]
    fn test_starts_with_range() {
        assert!(starts_with_might_match(&"abc".into(), &"abz".into(), &"ab".into()));
        assert!(!starts_with_might_match(&"b".into(), &"c".into(), &"ab".into()));
    }
}
