use std::f64::consts::PI;

const MAX_ABS_LAT: f64 = 89.5;
const NEWTON_ITERATIONS: u32 = 10;
const CONVERGENCE_EPSILON: f64 = 1e-7;

/// Equal-area pseudocylindrical projection used to place a (lat, lng) pulse on
/// a W×H canvas. Pure function: same input always yields the same output.
///
/// `scale` is the projection radius `r`; callers derive it from the target
/// canvas dimensions.
pub fn project(lat: f64, lng: f64, width: f64, height: f64, scale: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_ABS_LAT, MAX_ABS_LAT);
    let lat_rad = lat.to_radians();
    let lng_rad = lng.to_radians();

    let mut theta = lat_rad;
    for _ in 0..NEWTON_ITERATIONS {
        let delta = (2.0 * theta + (2.0 * theta).sin() - PI * lat_rad.sin())
            / (2.0 + 2.0 * (2.0 * theta).cos());
        theta -= delta;
        if delta.abs() < CONVERGENCE_EPSILON {
            break;
        }
    }

    let x = width / 2.0 + scale * (2.0 * 2.0_f64.sqrt() / PI) * lng_rad * theta.cos();
    let y = height / 2.0 - scale * 2.0_f64.sqrt() * theta.sin();
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_projects_to_canvas_center() {
        let (x, y) = project(0.0, 0.0, 1000.0, 500.0, 200.0);
        assert!((x - 500.0).abs() < 1.0, "x = {}", x);
        assert!((y - 250.0).abs() < 1.0, "y = {}", y);
    }

    #[test]
    fn test_projection_is_pure() {
        let a = project(37.7, -122.4, 1000.0, 500.0, 200.0);
        let b = project(37.7, -122.4, 1000.0, 500.0, 200.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_extreme_latitude_does_not_panic() {
        let (_, y) = project(89.9, 0.0, 1000.0, 500.0, 200.0);
        assert!(y.is_finite());
    }
}
