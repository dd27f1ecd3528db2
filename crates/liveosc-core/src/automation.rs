//! Automation curve sampling.
//!
//! A curve is sampled into `resolution` evenly spaced points between a start
//! and end value. Each point carries the time of the step and the step
//! length so it can be written as a held envelope step.

use std::f64::consts::PI;

/// Curve shape between the endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveShape {
    Linear,
    /// Cubic ease-in
    Exponential,
    /// Smoothstep ease-in/ease-out
    SCurve,
    /// One full sine cycle around the midpoint; does not land on the end value
    Sine,
    /// Quantized into at least four levels
    Step,
}

impl CurveShape {
    /// Unknown names pick `Linear`.
    pub fn from_name(name: &str) -> CurveShape {
        match name.trim().to_lowercase().replace('-', "_").as_str() {
            "exponential" | "exp" => CurveShape::Exponential,
            "s_curve" | "scurve" | "smooth" => CurveShape::SCurve,
            "sine" | "sin" => CurveShape::Sine,
            "step" | "steps" => CurveShape::Step,
            _ => CurveShape::Linear,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutomationPoint {
    /// Position in beats
    pub time: f64,
    /// Clamped to 0.0..=1.0
    pub value: f64,
    /// Length of this step in beats
    pub step_duration: f64,
}

/// Sample `shape` from `start_val` to `end_val` over `duration_beats`.
/// Resolution below 2 is raised to 2.
pub fn generate_points(
    shape: CurveShape,
    start_val: f64,
    end_val: f64,
    start_time: f64,
    duration_beats: f64,
    resolution: usize,
) -> Vec<AutomationPoint> {
    let resolution = resolution.max(2);
    let step_duration = duration_beats / resolution as f64;

    (0..resolution)
        .map(|i| {
            let t = i as f64 / (resolution - 1) as f64;
            let value = match shape {
                CurveShape::Linear => lerp(start_val, end_val, t),
                CurveShape::Exponential => lerp(start_val, end_val, t.powi(3)),
                CurveShape::SCurve => lerp(start_val, end_val, 3.0 * t * t - 2.0 * t * t * t),
                CurveShape::Sine => {
                    let mid = (start_val + end_val) / 2.0;
                    let amplitude = (end_val - start_val).abs() / 2.0;
                    mid + amplitude * (2.0 * PI * t).sin()
                }
                CurveShape::Step => {
                    let steps = (resolution / 4).max(4);
                    let index = ((t * steps as f64) as usize).min(steps - 1);
                    lerp(start_val, end_val, index as f64 / (steps - 1) as f64)
                }
            };
            AutomationPoint {
                time: start_time + i as f64 * step_duration,
                value: value.clamp(0.0, 1.0),
                step_duration,
            }
        })
        .collect()
}

fn lerp(start: f64, end: f64, t: f64) -> f64 {
    start + (end - start) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHAPES: [CurveShape; 5] = [
        CurveShape::Linear,
        CurveShape::Exponential,
        CurveShape::SCurve,
        CurveShape::Sine,
        CurveShape::Step,
    ];

    #[test]
    fn test_linear_and_s_curve_hit_endpoints() {
        for shape in [CurveShape::Linear, CurveShape::SCurve] {
            let points = generate_points(shape, 0.2, 0.9, 0.0, 16.0, 32);
            assert!((points[0].value - 0.2).abs() < 1e-9);
            assert!((points[31].value - 0.9).abs() < 1e-9);
        }
    }

    #[test]
    fn test_timing() {
        let points = generate_points(CurveShape::Linear, 0.0, 1.0, 8.0, 4.0, 8);
        assert_eq!(points.len(), 8);
        assert_eq!(points[0].time, 8.0);
        assert_eq!(points[1].time, 8.5);
        assert!(points.iter().all(|p| p.step_duration == 0.5));
    }

    #[test]
    fn test_minimum_resolution() {
        let points = generate_points(CurveShape::Linear, 0.0, 1.0, 0.0, 4.0, 0);
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].value, 1.0);
        assert_eq!(points[0].step_duration, 2.0);
    }

    #[test]
    fn test_sine_oscillates() {
        let points = generate_points(CurveShape::Sine, 0.2, 0.8, 0.0, 4.0, 33);
        let max = points.iter().map(|p| p.value).fold(f64::MIN, f64::max);
        let min = points.iter().map(|p| p.value).fold(f64::MAX, f64::min);
        // rises above the midpoint, then dips below it
        assert!(max > 0.75);
        assert!(min < 0.25);
        assert!((points[0].value - 0.5).abs() < 1e-9);
        assert!((points[32].value - 0.5).abs() < 1e-9);
        let peak = points.iter().position(|p| p.value == max).unwrap();
        let trough = points.iter().position(|p| p.value == min).unwrap();
        assert!(peak < trough);
    }

    #[test]
    fn test_exponential_is_eased_in() {
        let points = generate_points(CurveShape::Exponential, 0.0, 1.0, 0.0, 4.0, 11);
        assert!((points[5].value - 0.125).abs() < 1e-9);
        assert_eq!(points[10].value, 1.0);
    }

    #[test]
    fn test_step_levels() {
        let points = generate_points(CurveShape::Step, 0.0, 1.0, 0.0, 4.0, 16);
        let mut levels: Vec<f64> = points.iter().map(|p| p.value).collect();
        levels.dedup();
        assert_eq!(levels.len(), 4);
        assert_eq!(levels[0], 0.0);
        assert_eq!(*levels.last().unwrap(), 1.0);
    }

    #[test]
    fn test_all_values_clamped() {
        let extremes = [(0.0, 1.0), (1.0, 0.0), (0.0, 0.0), (1.0, 1.0), (-0.5, 1.5), (1.2, -0.3)];
        for shape in SHAPES {
            for (start, end) in extremes {
                for resolution in [2, 3, 17, 64] {
                    for p in generate_points(shape, start, end, 0.0, 8.0, resolution) {
                        assert!((0.0..=1.0).contains(&p.value), "{:?} {} {} -> {}", shape, start, end, p.value);
                    }
                }
            }
        }
    }

    #[test]
    fn test_unknown_shape_is_linear() {
        assert_eq!(CurveShape::from_name("wobble"), CurveShape::Linear);
        assert_eq!(CurveShape::from_name("s-curve"), CurveShape::SCurve);
    }
}
