//! Stationarity Transformer
//!
//! Two operating modes, selected by a method string:
//! - `auto<d>`: try log, sqrt, cube root and no transform, each followed by
//!   differencing at order `d`, and keep the first candidate the tester accepts
//! - explicit, e.g. `ls2` or `rn1`: apply the listed steps left to right
//!
//! Step codes: `n` identity, `l` natural log, `s` square root, `c` cube root,
//! `r` rolling mean. In the legacy string form an `n` step also switches on the
//! final differencing; `TransformPlan` carries that as an explicit flag.

use std::fmt;
use std::str::FromStr;

use statrs::statistics::Statistics;

use super::hypothesis::{AdfKpssTest, StationarityTest};
use super::TransformError;

/// Default rolling mean window
pub const DEFAULT_ROLLING_WINDOW: usize = 20;

/// A single element-wise or smoothing transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformStep {
    Identity,
    Log,
    Sqrt,
    CubeRoot,
    RollingMean,
}

impl TransformStep {
    /// Candidates tried by automatic mode, in priority order
    pub const AUTO_CANDIDATES: [TransformStep; 4] =
        [Self::Log, Self::Sqrt, Self::CubeRoot, Self::Identity];

    pub fn code(self) -> char {
        match self {
            Self::Identity => 'n',
            Self::Log => 'l',
            Self::Sqrt => 's',
            Self::CubeRoot => 'c',
            Self::RollingMean => 'r',
        }
    }

    pub fn from_code(code: char) -> Result<Self, TransformError> {
        match code {
            'n' => Ok(Self::Identity),
            'l' => Ok(Self::Log),
            's' => Ok(Self::Sqrt),
            'c' => Ok(Self::CubeRoot),
            'r' => Ok(Self::RollingMean),
            other => Err(TransformError::InvalidStep(other)),
        }
    }

    /// Apply this step. Log needs strictly positive input and sqrt needs
    /// non-negative input.
    pub fn apply(self, series: &[f64], window: usize) -> Result<Vec<f64>, TransformError> {
        match self {
            Self::Identity => Ok(series.to_vec()),
            Self::Log => {
                check_domain(series, self, |v| v > 0.0)?;
                Ok(series.iter().map(|v| v.ln()).collect())
            }
            Self::Sqrt => {
                check_domain(series, self, |v| v >= 0.0)?;
                Ok(series.iter().map(|v| v.sqrt()).collect())
            }
            Self::CubeRoot => Ok(series.iter().map(|v| v.cbrt()).collect()),
            Self::RollingMean => rolling_mean(series, window),
        }
    }
}

fn check_domain(
    series: &[f64],
    step: TransformStep,
    valid: impl Fn(f64) -> bool,
) -> Result<(), TransformError> {
    match series.iter().find(|v| !valid(**v)) {
        Some(&value) => Err(TransformError::Domain {
            step: step.code(),
            value,
        }),
        None => Ok(()),
    }
}

/// Explicit transform sequence with decoupled differencing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformPlan {
    pub steps: Vec<TransformStep>,
    pub apply_differencing: bool,
    pub differencing_order: i32,
}

impl TransformPlan {
    pub fn new(steps: Vec<TransformStep>) -> Self {
        Self {
            steps,
            apply_differencing: false,
            differencing_order: 1,
        }
    }

    pub fn with_differencing(mut self, order: i32) -> Self {
        self.apply_differencing = true;
        self.differencing_order = order;
        self
    }

    /// Legacy string form: step codes followed by an optional signed order.
    /// A present `n` step enables the final differencing.
    fn parse_legacy(method: &str) -> Result<Self, TransformError> {
        let (codes, order) = split_trailing_order(method)?;
        if codes.is_empty() {
            return Err(TransformError::InvalidMethod(method.to_string()));
        }

        let steps = codes
            .chars()
            .map(TransformStep::from_code)
            .collect::<Result<Vec<_>, _>>()?;
        let apply_differencing = steps.contains(&TransformStep::Identity);
        let differencing_order = order.unwrap_or(1);

        if apply_differencing && differencing_order == 0 {
            return Err(TransformError::ZeroOffset);
        }

        Ok(Self {
            steps,
            apply_differencing,
            differencing_order,
        })
    }
}

impl fmt::Display for TransformPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            write!(f, "{}", step.code())?;
        }
        if self.apply_differencing {
            write!(f, "{}", self.differencing_order)?;
        }
        Ok(())
    }
}

/// Parsed method selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformMethod {
    Auto { order: i32 },
    Explicit(TransformPlan),
}

impl FromStr for TransformMethod {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = s.trim().to_lowercase();

        if let Some(rest) = method.strip_prefix("auto") {
            let order = if rest.is_empty() {
                1
            } else {
                rest.parse::<i32>()
                    .map_err(|_| TransformError::InvalidMethod(s.to_string()))?
            };
            if order == 0 {
                return Err(TransformError::ZeroOffset);
            }
            return Ok(Self::Auto { order });
        }

        TransformPlan::parse_legacy(&method).map(Self::Explicit)
    }
}

fn split_trailing_order(method: &str) -> Result<(&str, Option<i32>), TransformError> {
    let digits_start = method
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i);

    let Some(mut start) = digits_start else {
        return Ok((method, None));
    };

    if let Some(sign) = method[..start].chars().last() {
        if sign == '-' || sign == '+' {
            start -= 1;
        }
    }

    let order = method[start..]
        .parse::<i32>()
        .map_err(|_| TransformError::InvalidMethod(method.to_string()))?;
    Ok((&method[..start], Some(order)))
}

/// Which transform produced a result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformTag {
    /// Input was already stationary
    Unchanged,
    /// Method label, e.g. `2l` in auto mode or the plan in explicit mode
    Applied(String),
    /// Auto mode found no passing candidate
    NotFound,
}

impl TransformTag {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Unchanged => "none",
            Self::Applied(label) => label,
            Self::NotFound => "error",
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl fmt::Display for TransformTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transformed series plus the method that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Stationarized {
    pub series: Vec<f64>,
    pub tag: TransformTag,
}

/// Searches or applies transforms until a series is stationary
#[derive(Debug, Clone)]
pub struct StationarityTransformer<T = AdfKpssTest> {
    tester: T,
    window: usize,
}

impl Default for StationarityTransformer<AdfKpssTest> {
    fn default() -> Self {
        Self::new(AdfKpssTest)
    }
}

impl<T: StationarityTest> StationarityTransformer<T> {
    pub fn new(tester: T) -> Self {
        Self {
            tester,
            window: DEFAULT_ROLLING_WINDOW,
        }
    }

    /// Set the rolling mean window used by `r` steps
    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Parse a method string and run it
    pub fn transform_str(&self, series: &[f64], method: &str) -> Result<Stationarized, TransformError> {
        let method: TransformMethod = method.parse()?;
        self.transform(series, &method)
    }

    pub fn transform(
        &self,
        series: &[f64],
        method: &TransformMethod,
    ) -> Result<Stationarized, TransformError> {
        match method {
            TransformMethod::Auto { order } => self.auto(series, *order),
            TransformMethod::Explicit(plan) => self.explicit(series, plan),
        }
    }

    /// Automatic search. Test failures propagate; a search that finds nothing
    /// returns the input tagged `NotFound`.
    pub fn auto(&self, series: &[f64], order: i32) -> Result<Stationarized, TransformError> {
        if order == 0 {
            return Err(TransformError::ZeroOffset);
        }

        if self.tester.is_stationary(series)? {
            return Ok(Stationarized {
                series: series.to_vec(),
                tag: TransformTag::Unchanged,
            });
        }

        for step in TransformStep::AUTO_CANDIDATES {
            let transformed = match step.apply(series, self.window) {
                Ok(t) => t,
                Err(e @ TransformError::Domain { .. }) => {
                    tracing::debug!("Skipping auto candidate '{}': {}", step.code(), e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let differenced = difference(&transformed, order)?;
            if self.tester.is_stationary(&differenced)? {
                return Ok(Stationarized {
                    series: differenced,
                    tag: TransformTag::Applied(format!("{}{}", order, step.code())),
                });
            }
        }

        tracing::warn!("No stationary transform found (order {})", order);
        Ok(Stationarized {
            series: series.to_vec(),
            tag: TransformTag::NotFound,
        })
    }

    /// Apply an explicit plan without testing the result
    pub fn explicit(&self, series: &[f64], plan: &TransformPlan) -> Result<Stationarized, TransformError> {
        let mut current = series.to_vec();
        for step in &plan.steps {
            current = step.apply(&current, self.window)?;
        }

        if plan.apply_differencing {
            current = difference(&current, plan.differencing_order)?;
        }

        Ok(Stationarized {
            series: current,
            tag: TransformTag::Applied(plan.to_string()),
        })
    }
}

/// Lag difference of a series.
///
/// For offset `t > 0` the result is `s[i+t] - s[i]` with the first `t`
/// positions trimmed; a negative offset rolls the other way and trims the
/// rear, which yields the same values. Zero is rejected.
pub fn difference(series: &[f64], offset: i32) -> Result<Vec<f64>, TransformError> {
    if offset == 0 {
        return Err(TransformError::ZeroOffset);
    }

    let t = offset.unsigned_abs() as usize;
    let n = series.len();
    if t >= n {
        return Err(TransformError::InsufficientData {
            required: t + 1,
            actual: n,
        });
    }

    let out = if offset > 0 {
        (t..n).map(|i| series[i] - series[i - t]).collect()
    } else {
        (0..n - t).map(|i| series[i + t] - series[i]).collect()
    };
    Ok(out)
}

/// Moving average over `window` points; output shrinks by `window - 1`
pub fn rolling_mean(series: &[f64], window: usize) -> Result<Vec<f64>, TransformError> {
    if window == 0 {
        return Err(TransformError::ZeroWindow);
    }
    if window > series.len() {
        return Err(TransformError::InsufficientData {
            required: window,
            actual: series.len(),
        });
    }
    Ok(series.windows(window).map(|w| w.iter().mean()).collect())
}

/// Transform a series and lift it to strictly positive values by adding
/// `|min| + mean(input)`, so ratio-based consumers can use it directly.
pub fn make_stationary<T: StationarityTest>(
    transformer: &StationarityTransformer<T>,
    series: &[f64],
    method: &TransformMethod,
) -> Result<Stationarized, TransformError> {
    let result = transformer.transform(series, method)?;
    if result.series.is_empty() || series.is_empty() {
        return Ok(result);
    }

    let min = result.series.iter().copied().fold(f64::INFINITY, f64::min);
    let offset = min.abs() + series.iter().mean();

    Ok(Stationarized {
        series: result.series.iter().map(|v| v + offset).collect(),
        tag: result.tag,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::stationarity::StationarityError;
    use approx::assert_relative_eq;

    fn never(_: &[f64]) -> Result<bool, StationarityError> {
        Ok(false)
    }

    fn always(_: &[f64]) -> Result<bool, StationarityError> {
        Ok(true)
    }

    #[test]
    fn test_difference_positive_offset() {
        let s = [1.0, 4.0, 9.0, 16.0, 25.0];
        let d = difference(&s, 2).unwrap();
        assert_eq!(d, vec![8.0, 12.0, 16.0]);
        assert_eq!(d.len(), s.len() - 2);
        for (i, v) in d.iter().enumerate() {
            assert_eq!(*v, s[i + 2] - s[i]);
        }
    }

    #[test]
    fn test_difference_negative_offset_rear_trims() {
        let s = [1.0, 4.0, 9.0, 16.0, 25.0];
        let d = difference(&s, -1).unwrap();
        assert_eq!(d, vec![3.0, 5.0, 7.0, 9.0]);
    }

    #[test]
    fn test_difference_zero_offset_rejected() {
        assert_eq!(difference(&[1.0, 2.0, 3.0], 0), Err(TransformError::ZeroOffset));
        assert_eq!(difference(&[], 0), Err(TransformError::ZeroOffset));
    }

    #[test]
    fn test_difference_offset_too_large() {
        assert!(matches!(
            difference(&[1.0, 2.0], 2),
            Err(TransformError::InsufficientData { required: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_rolling_mean_shrinks() {
        let s = [1.0, 2.0, 3.0, 4.0, 5.0];
        let r = rolling_mean(&s, 3).unwrap();
        assert_eq!(r.len(), 3);
        assert_relative_eq!(r[0], 2.0);
        assert_relative_eq!(r[2], 4.0);
        assert_eq!(rolling_mean(&s, 0), Err(TransformError::ZeroWindow));
    }

    #[test]
    fn test_parse_auto() {
        assert_eq!("auto2".parse::<TransformMethod>().unwrap(), TransformMethod::Auto { order: 2 });
        assert_eq!("AUTO".parse::<TransformMethod>().unwrap(), TransformMethod::Auto { order: 1 });
        assert_eq!("auto0".parse::<TransformMethod>(), Err(TransformError::ZeroOffset));
        assert!("autox".parse::<TransformMethod>().is_err());
    }

    #[test]
    fn test_parse_explicit_plan() {
        let method = "ls2".parse::<TransformMethod>().unwrap();
        let TransformMethod::Explicit(plan) = method else {
            panic!("expected explicit plan");
        };
        assert_eq!(plan.steps, vec![TransformStep::Log, TransformStep::Sqrt]);
        assert!(!plan.apply_differencing);

        let TransformMethod::Explicit(plan) = "ln-3".parse::<TransformMethod>().unwrap() else {
            panic!("expected explicit plan");
        };
        assert!(plan.apply_differencing);
        assert_eq!(plan.differencing_order, -3);

        let TransformMethod::Explicit(plan) = "rn".parse::<TransformMethod>().unwrap() else {
            panic!("expected explicit plan");
        };
        assert_eq!(plan.differencing_order, 1);
    }

    #[test]
    fn test_parse_invalid_step() {
        assert_eq!("lx1".parse::<TransformMethod>(), Err(TransformError::InvalidStep('x')));
        assert!("".parse::<TransformMethod>().is_err());
        assert_eq!("n0".parse::<TransformMethod>(), Err(TransformError::ZeroOffset));
    }

    #[test]
    fn test_auto_passthrough_when_already_stationary() {
        let transformer = StationarityTransformer::new(always);
        let series = vec![1.0, 2.0, 1.5, 2.5];
        let result = transformer.auto(&series, 1).unwrap();
        assert_eq!(result.series, series);
        assert_eq!(result.tag, TransformTag::Unchanged);
        assert_eq!(result.tag.as_str(), "none");
    }

    #[test]
    fn test_auto_picks_log_difference() {
        let series: Vec<f64> = (1..=12).map(|i| 100.0 * 1.1f64.powi(i)).collect();
        let target = difference(
            &series.iter().map(|v| v.ln()).collect::<Vec<_>>(),
            2,
        )
        .unwrap();

        let expected = target.clone();
        let tester = move |s: &[f64]| -> Result<bool, StationarityError> {
            Ok(s.len() == expected.len()
                && s.iter().zip(&expected).all(|(a, b)| (a - b).abs() < 1e-12))
        };

        let result = StationarityTransformer::new(tester).auto(&series, 2).unwrap();
        assert_eq!(result.tag, TransformTag::Applied("2l".to_string()));
        assert_eq!(result.series, target);
    }

    #[test]
    fn test_auto_cube_root_candidate_differences_transformed_series() {
        let series: Vec<f64> = (1..=10).map(|i| (i * i * i) as f64).collect();
        let tester = |s: &[f64]| -> Result<bool, StationarityError> {
            // cube roots of i^3 differenced by 1 are all 1.0
            Ok(s.iter().all(|v| (v - 1.0).abs() < 1e-9))
        };
        let result = StationarityTransformer::new(tester).auto(&series, 1).unwrap();
        assert_eq!(result.tag.as_str(), "1c");
    }

    #[test]
    fn test_auto_not_found_is_degraded() {
        let series = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = StationarityTransformer::new(never).auto(&series, 1).unwrap();
        assert_eq!(result.tag, TransformTag::NotFound);
        assert_eq!(result.tag.as_str(), "error");
        assert!(result.tag.is_degraded());
        assert_eq!(result.series, series);
    }

    #[test]
    fn test_auto_skips_log_for_non_positive_input() {
        let series = vec![-1.0, 0.0, 1.0, 2.0, 3.0];
        let calls = std::cell::Cell::new(0);
        let tester = |_: &[f64]| -> Result<bool, StationarityError> {
            calls.set(calls.get() + 1);
            Ok(calls.get() == 2)
        };
        let result = StationarityTransformer::new(tester).auto(&series, 1).unwrap();
        // log and sqrt are skipped, cube root is the first tested candidate
        assert_eq!(result.tag.as_str(), "1c");
    }

    #[test]
    fn test_auto_propagates_test_failure() {
        let failing = |_: &[f64]| -> Result<bool, StationarityError> {
            Err(StationarityError::SingularRegression)
        };
        let result = StationarityTransformer::new(failing).auto(&[1.0, 2.0, 3.0], 1);
        assert_eq!(
            result,
            Err(TransformError::Stationarity(StationarityError::SingularRegression))
        );
    }

    #[test]
    fn test_explicit_log_then_difference() {
        let transformer = StationarityTransformer::new(never);
        let series = vec![1.0, std::f64::consts::E, std::f64::consts::E.powi(2)];
        let result = transformer.transform_str(&series, "ln1").unwrap();
        assert_eq!(result.series.len(), 2);
        assert_relative_eq!(result.series[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(result.series[1], 1.0, epsilon = 1e-12);
        assert_eq!(result.tag.as_str(), "ln1");
    }

    #[test]
    fn test_explicit_without_identity_skips_differencing() {
        let transformer = StationarityTransformer::new(never);
        let series = vec![4.0, 9.0, 16.0];
        let result = transformer.transform_str(&series, "s2").unwrap();
        assert_eq!(result.series, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_explicit_rolling_window() {
        let transformer = StationarityTransformer::new(never).with_window(2);
        let series = vec![1.0, 3.0, 5.0, 7.0];
        let result = transformer.transform_str(&series, "r").unwrap();
        assert_eq!(result.series, vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_plan_builder_differencing() {
        let plan = TransformPlan::new(vec![TransformStep::Log]).with_differencing(1);
        let transformer = StationarityTransformer::new(never);
        let result = transformer.explicit(&[1.0, 1.0, 1.0], &plan).unwrap();
        assert_eq!(result.series, vec![0.0, 0.0]);
        assert_eq!(plan.to_string(), "l1");
    }

    #[test]
    fn test_make_stationary_shifts_positive() {
        let transformer = StationarityTransformer::new(never);
        let series = vec![10.0, 8.0, 12.0, 9.0];
        let method: TransformMethod = "n1".parse().unwrap();
        let result = make_stationary(&transformer, &series, &method).unwrap();
        assert!(result.series.iter().all(|v| *v > 0.0));
        // diffs are [-2, 4, -3]; shift = 3 + 9.75
        assert_relative_eq!(result.series[0], 10.75, epsilon = 1e-12);
    }

    #[test]
    fn test_auto_leaves_iid_noise_unchanged() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(7);
        let series: Vec<f64> = (0..300).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let result = StationarityTransformer::default()
            .transform_str(&series, "auto1")
            .unwrap();
        assert_eq!(result.tag, TransformTag::Unchanged);
        assert_eq!(result.series, series);
    }
}
