//! Step vocabulary and decoding of raw step descriptors.
//!
//! The step list arrives as `{name, inputs}` pairs with positional numeric
//! parameters. [`decode_steps`] validates each pair against its parameter
//! contract once, before any table is touched, and yields typed [`Step`]s.

use crate::config::UnknownStepPolicy;
use crate::error::{PrepError, Result};
use crate::types::StepDescriptor;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// The fixed step vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    Standardize,
    Normalize,
    MovingAverage,
    Difference,
    BoxCox,
    YeoJohnson,
}

impl StepKind {
    pub const ALL: [StepKind; 6] = [
        StepKind::Standardize,
        StepKind::Normalize,
        StepKind::MovingAverage,
        StepKind::Difference,
        StepKind::BoxCox,
        StepKind::YeoJohnson,
    ];

    /// Name of the step in external step lists.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standardize => "stand",
            Self::Normalize => "norm",
            Self::MovingAverage => "moving_avg_filter",
            Self::Difference => "dif_trans",
            Self::BoxCox => "box-cox",
            Self::YeoJohnson => "y-j",
        }
    }

    /// Number of positional parameters the step consumes.
    pub fn arity(&self) -> usize {
        match self {
            Self::Normalize => 2,
            Self::MovingAverage => 1,
            Self::Standardize | Self::Difference | Self::BoxCox | Self::YeoJohnson => 0,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepKind {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        StepKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| PrepError::UnknownStep(s.to_string()))
    }
}

/// A decoded step with its parameters bound.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Standardize,
    Normalize { min: f64, max: f64 },
    MovingAverage { window: usize },
    Difference,
    BoxCox,
    YeoJohnson,
    /// Unrecognized step kept as a no-op under [`UnknownStepPolicy::PassThrough`].
    PassThrough { name: String },
}

impl Step {
    /// Name of the step as it appeared in the step list.
    pub fn name(&self) -> &str {
        match self {
            Self::Standardize => StepKind::Standardize.as_str(),
            Self::Normalize { .. } => StepKind::Normalize.as_str(),
            Self::MovingAverage { .. } => StepKind::MovingAverage.as_str(),
            Self::Difference => StepKind::Difference.as_str(),
            Self::BoxCox => StepKind::BoxCox.as_str(),
            Self::YeoJohnson => StepKind::YeoJohnson.as_str(),
            Self::PassThrough { name } => name,
        }
    }

    /// Decode one descriptor against its step's parameter contract.
    pub fn decode(descriptor: &StepDescriptor, policy: UnknownStepPolicy) -> Result<Self> {
        let name = descriptor.name.as_str();
        let kind = match (name.parse::<StepKind>(), policy) {
            (Ok(kind), _) => kind,
            (Err(_), UnknownStepPolicy::PassThrough) => {
                warn!("Unknown step '{}' will pass tables through unchanged", name);
                return Ok(Step::PassThrough {
                    name: name.to_string(),
                });
            }
            (Err(e), UnknownStepPolicy::Fail) => return Err(e),
        };

        let inputs = &descriptor.inputs;
        if inputs.len() < kind.arity() {
            return Err(PrepError::transform(
                kind.as_str(),
                format!(
                    "expected {} parameter(s), got {}",
                    kind.arity(),
                    inputs.len()
                ),
            ));
        }
        if inputs.len() > kind.arity() {
            warn!(
                "Step '{}' takes {} parameter(s); ignoring {} extra",
                kind,
                kind.arity(),
                inputs.len() - kind.arity()
            );
        }

        let step = match kind {
            StepKind::Standardize => Step::Standardize,
            StepKind::Normalize => {
                let (min, max) = (inputs[0], inputs[1]);
                if !min.is_finite() || !max.is_finite() || min >= max {
                    return Err(PrepError::transform(
                        kind.as_str(),
                        format!("min must be less than max (got min={}, max={})", min, max),
                    ));
                }
                Step::Normalize { min, max }
            }
            StepKind::MovingAverage => Step::MovingAverage {
                window: window_size(inputs[0])?,
            },
            StepKind::Difference => Step::Difference,
            StepKind::BoxCox => Step::BoxCox,
            StepKind::YeoJohnson => Step::YeoJohnson,
        };
        Ok(step)
    }
}

fn window_size(raw: f64) -> Result<usize> {
    let step = StepKind::MovingAverage.as_str();
    if !raw.is_finite() || raw.fract() != 0.0 || raw < 1.0 {
        return Err(PrepError::transform(
            step,
            format!("window size must be a positive integer (got {})", raw),
        ));
    }
    if raw > usize::MAX as f64 {
        return Err(PrepError::transform(step, format!("window size {} is too large", raw)));
    }
    Ok(raw as usize)
}

/// Decode a whole step list, preserving order.
///
/// Errors carry the step's position in the list as context.
pub fn decode_steps(descriptors: &[StepDescriptor], policy: UnknownStepPolicy) -> Result<Vec<Step>> {
    descriptors
        .iter()
        .enumerate()
        .map(|(i, d)| {
            Step::decode(d, policy).map_err(|e| e.with_context(format!("step {} ('{}')", i + 1, d.name)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_vocabulary_round_trips_through_from_str() {
        for kind in StepKind::ALL {
            assert_eq!(kind.as_str().parse::<StepKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_step_names_match_exactly() {
        for name in [" stand", "stand ", "Stand", "box_cox", "yeo-johnson"] {
            let err = Step::decode(&StepDescriptor::bare(name), UnknownStepPolicy::Fail).unwrap_err();
            assert_eq!(err.error_code(), "UNKNOWN_STEP", "{:?}", name);
        }

        let step = Step::decode(&StepDescriptor::bare(" stand "), UnknownStepPolicy::PassThrough).unwrap();
        assert_eq!(step.name(), " stand ");
    }

    #[test]
    fn test_decode_steps_preserves_order_and_parameters() {
        let descriptors = vec![
            StepDescriptor::new("norm", vec![0.0, 5.0]),
            StepDescriptor::new("moving_avg_filter", vec![3.0]),
            StepDescriptor::bare("dif_trans"),
            StepDescriptor::bare("stand"),
            StepDescriptor::bare("box-cox"),
            StepDescriptor::bare("y-j"),
        ];
        let steps = decode_steps(&descriptors, UnknownStepPolicy::Fail).unwrap();
        assert_eq!(
            steps,
            vec![
                Step::Normalize { min: 0.0, max: 5.0 },
                Step::MovingAverage { window: 3 },
                Step::Difference,
                Step::Standardize,
                Step::BoxCox,
                Step::YeoJohnson,
            ]
        );
    }

    #[test]
    fn test_unknown_step_fails_by_default() {
        let descriptors = vec![StepDescriptor::bare("stand"), StepDescriptor::bare("smooth")];
        let err = decode_steps(&descriptors, UnknownStepPolicy::Fail).unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_STEP");
        assert!(err.to_string().contains("step 2"));
    }

    #[test]
    fn test_unknown_step_pass_through() {
        let step = Step::decode(&StepDescriptor::bare("smooth"), UnknownStepPolicy::PassThrough).unwrap();
        assert_eq!(step, Step::PassThrough { name: "smooth".to_string() });
        assert_eq!(step.name(), "smooth");
    }

    #[test]
    fn test_norm_requires_two_ordered_parameters() {
        let missing = Step::decode(&StepDescriptor::new("norm", vec![1.0]), UnknownStepPolicy::Fail);
        assert!(missing.unwrap_err().to_string().contains("expected 2 parameter(s)"));

        let inverted = Step::decode(&StepDescriptor::new("norm", vec![1.0, 0.0]), UnknownStepPolicy::Fail);
        assert_eq!(inverted.unwrap_err().error_code(), "TRANSFORM_ERROR");
    }

    #[test]
    fn test_window_size_must_be_positive_integer() {
        for bad in [0.0, -2.0, 2.5, f64::NAN] {
            let result = Step::decode(
                &StepDescriptor::new("moving_avg_filter", vec![bad]),
                UnknownStepPolicy::Fail,
            );
            assert!(result.is_err(), "window {} should be rejected", bad);
        }
    }

    #[test]
    fn test_extra_parameters_are_ignored() {
        let step = Step::decode(&StepDescriptor::new("stand", vec![1.0]), UnknownStepPolicy::Fail).unwrap();
        assert_eq!(step, Step::Standardize);
    }
}
