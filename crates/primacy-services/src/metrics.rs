//! Metric datums: construction, argument validation, and batching.
//!
//! Callers pass metric names, dimensions, and values as parallel lists.
//! Every shape check runs here, before a client is looked up, so a
//! malformed call never reaches the network.

use std::fmt;

use crate::error::{ServiceError, ServiceResult};

/// Most datums a metric client accepts in one request.
pub const MAX_DATUM_BATCH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricUnit {
    Count,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricDatum {
    pub name: String,
    pub dimensions: Vec<Dimension>,
    pub value: f64,
    pub unit: MetricUnit,
}

impl MetricDatum {
    pub fn count(name: impl Into<String>, dimensions: Vec<Dimension>, value: f64) -> Self {
        Self {
            name: name.into(),
            dimensions,
            value,
            unit: MetricUnit::Count,
        }
    }
}

impl fmt::Display for MetricDatum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (", self.name)?;
        for (i, d) in self.dimensions.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", d.name, d.value)?;
        }
        write!(f, ") {}", self.value)
    }
}

/// A datum with at most one dimension.
pub fn single_datum(metric_name: &str, dimension: Option<(&str, &str)>, value: f64) -> MetricDatum {
    let dimensions = dimension
        .map(|(name, value)| vec![Dimension::new(name, value)])
        .unwrap_or_default();
    MetricDatum::count(metric_name, dimensions, value)
}

/// A datum with several dimensions given as parallel lists.
///
/// Both lists must be present with equal lengths, or both absent.
/// Positions where either side is `None` are skipped.
pub fn multi_dimensional_datum(
    metric_name: &str,
    dimension_names: Option<&[Option<String>]>,
    dimension_values: Option<&[Option<String>]>,
    value: f64,
) -> ServiceResult<MetricDatum> {
    let dimensions = match (dimension_names, dimension_values) {
        (Some(names), Some(values)) => {
            if names.len() != values.len() {
                return Err(ServiceError::Validation(format!(
                    "input array lengths must match: {} dimension names vs {} dimension values",
                    names.len(),
                    values.len()
                )));
            }
            names
                .iter()
                .zip(values)
                .filter_map(|(name, value)| match (name, value) {
                    (Some(name), Some(value)) => Some(Dimension::new(name, value)),
                    _ => None,
                })
                .collect()
        }
        (None, None) => Vec::new(),
        (names, _) => {
            return Err(ServiceError::Validation(format!(
                "dimension mismatch: names {} but values {}",
                if names.is_some() { "given" } else { "missing" },
                if names.is_some() { "missing" } else { "given" },
            )));
        }
    };
    Ok(MetricDatum::count(metric_name, dimensions, value))
}

/// One single-dimension datum per metric name, from parallel lists.
///
/// `metric_names` and `values` must have equal lengths. Dimensions are
/// optional, but when given both lists must match `metric_names` in length.
pub fn batch_datums(
    metric_names: &[String],
    dimension_names: Option<&[String]>,
    dimension_values: Option<&[String]>,
    values: &[f64],
) -> ServiceResult<Vec<MetricDatum>> {
    if metric_names.len() != values.len() {
        return Err(ServiceError::Validation(format!(
            "input array lengths must match: {} metric names vs {} values",
            metric_names.len(),
            values.len()
        )));
    }

    let dimensions = match (dimension_names, dimension_values) {
        (Some(names), Some(dim_values)) => {
            if names.len() != metric_names.len() || dim_values.len() != metric_names.len() {
                return Err(ServiceError::Validation(format!(
                    "input array lengths must match: {} metric names vs {} dimension names \
                     vs {} dimension values",
                    metric_names.len(),
                    names.len(),
                    dim_values.len()
                )));
            }
            Some((names, dim_values))
        }
        (None, None) => None,
        _ => {
            return Err(ServiceError::Validation(
                "dimension names and values must be given together".to_string(),
            ));
        }
    };

    Ok(metric_names
        .iter()
        .zip(values)
        .enumerate()
        .map(|(i, (name, value))| {
            let dims = dimensions
                .map(|(names, dim_values)| vec![Dimension::new(&names[i], &dim_values[i])])
                .unwrap_or_default();
            MetricDatum::count(name, dims, *value)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("metric-{i}")).collect()
    }

    #[test]
    fn single_datum_with_and_without_dimension() {
        let d = single_datum("requests", Some(("route", "/api")), 3.0);
        assert_eq!(d.dimensions, vec![Dimension::new("route", "/api")]);
        assert_eq!(d.unit, MetricUnit::Count);

        assert!(single_datum("requests", None, 1.0).dimensions.is_empty());
    }

    #[test]
    fn multi_dimensional_skips_partial_pairs() {
        let names = vec![Some("agency".to_string()), Some("route".to_string()), None];
        let values = vec![Some("1".to_string()), None, Some("x".to_string())];
        let d = multi_dimensional_datum("lag", Some(names.as_slice()), Some(values.as_slice()), 2.5)
            .unwrap();
        assert_eq!(d.dimensions, vec![Dimension::new("agency", "1")]);
        assert_eq!(d.to_string(), "lag (agency=1) 2.5");
    }

    #[test]
    fn multi_dimensional_rejects_mismatched_lengths() {
        let names = vec![Some("a".to_string()), Some("b".to_string())];
        let values = vec![Some("1".to_string())];
        let err =
            multi_dimensional_datum("lag", Some(names.as_slice()), Some(values.as_slice()), 1.0)
                .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn multi_dimensional_rejects_one_sided_dimensions() {
        let names = vec![Some("a".to_string())];
        let err = multi_dimensional_datum("lag", Some(names.as_slice()), None, 1.0).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(multi_dimensional_datum("lag", None, None, 1.0).is_ok());
    }

    #[test]
    fn batch_rejects_value_count_mismatch() {
        let err = batch_datums(&names(3), None, None, &[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn batch_rejects_dimension_count_mismatch() {
        let dim_names = vec!["agency".to_string(); 3];
        let dim_values = vec!["1".to_string(); 2];
        let err = batch_datums(
            &names(3),
            Some(dim_names.as_slice()),
            Some(dim_values.as_slice()),
            &[1.0; 3],
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn batch_pairs_dimensions_by_position() {
        let dim_names = vec!["agency".to_string(), "agency".to_string()];
        let dim_values = vec!["1".to_string(), "40".to_string()];
        let datums = batch_datums(
            &names(2),
            Some(dim_names.as_slice()),
            Some(dim_values.as_slice()),
            &[5.0, 6.0],
        )
        .unwrap();
        assert_eq!(datums[1].name, "metric-1");
        assert_eq!(datums[1].dimensions, vec![Dimension::new("agency", "40")]);
        assert_eq!(datums[1].value, 6.0);
    }

    #[test]
    fn batch_without_dimensions() {
        let datums = batch_datums(&names(2), None, None, &[1.0, 2.0]).unwrap();
        assert!(datums.iter().all(|d| d.dimensions.is_empty()));
    }
}
