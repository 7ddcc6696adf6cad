use crate::coordinate::Coordinate;

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine great-circle distance between two coordinates, in meters.
pub fn haversine_distance(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();

    let h = f64::sin(d_lat / 2.).powi(2)
        + f64::cos(lat1) * f64::cos(lat2) * f64::sin(d_lon / 2.).powi(2);
    // Rounding can push h a hair above 1 for antipodal points.
    let h = h.min(1.);

    2. * EARTH_RADIUS_METERS * f64::atan2(h.sqrt(), (1. - h).sqrt())
}

/// Running total of the distance walked along a path, fed one sample at a time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistanceAccumulator {
    previous: Option<Coordinate>,
    total_meters: f64,
}

impl DistanceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the leg from the previous sample (if any) and returns its length.
    pub fn update(&mut self, sample: Coordinate) -> f64 {
        let leg = self
            .previous
            .map(|previous| haversine_distance(previous, sample))
            .unwrap_or(0.);

        self.total_meters += leg;
        self.previous = Some(sample);
        leg
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.total_meters = 0.;
    }

    pub fn total_meters(&self) -> f64 {
        self.total_meters
    }

    pub fn previous(&self) -> Option<Coordinate> {
        self.previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELHI: Coordinate = Coordinate::new(28.6139, 77.2090);
    const AARHUS: Coordinate = Coordinate::new(56.158405, 10.206034);

    #[test]
    fn distance_to_self_is_zero() {
        for c in [DELHI, AARHUS, Coordinate::new(0., 0.), Coordinate::new(-89.9, 179.9)] {
            assert_eq!(haversine_distance(c, c), 0.);
        }
    }

    #[test]
    fn distance_is_symmetric() {
        let there = haversine_distance(DELHI, AARHUS);
        let back = haversine_distance(AARHUS, DELHI);
        assert!((there - back).abs() < 1e-6);
    }

    #[test]
    fn one_degree_of_longitude_on_equator() {
        let dist = haversine_distance(Coordinate::new(0., 0.), Coordinate::new(0., 1.));
        assert!((dist - 111_195.0).abs() < 1.0, "got {dist}");
    }

    #[test]
    fn distance_grows_with_separation() {
        let origin = Coordinate::new(10., 10.);
        let mut last = 0.;
        for step in 1..20 {
            let dist = haversine_distance(origin, Coordinate::new(10., 10. + step as f64 * 0.01));
            assert!(dist > last);
            last = dist;
        }
    }

    #[test]
    fn antipodal_points_are_half_the_circumference() {
        let dist = haversine_distance(Coordinate::new(0., 0.), Coordinate::new(0., 180.));
        assert!((dist - std::f64::consts::PI * EARTH_RADIUS_METERS).abs() < 1e-3);
    }

    #[test]
    fn accumulator_sums_consecutive_legs() {
        let path = [
            DELHI,
            Coordinate::new(28.6200, 77.2200),
            Coordinate::new(28.6300, 77.2300),
            Coordinate::new(28.6150, 77.2100),
        ];

        let mut accumulator = DistanceAccumulator::new();
        for c in path {
            accumulator.update(c);
        }

        let expected: f64 = path.windows(2).map(|w| haversine_distance(w[0], w[1])).sum();
        assert!((accumulator.total_meters() - expected).abs() < 1e-6);
        assert_eq!(accumulator.previous(), Some(path[3]));
    }

    #[test]
    fn first_sample_adds_nothing() {
        let mut accumulator = DistanceAccumulator::new();
        assert_eq!(accumulator.update(DELHI), 0.);
        assert_eq!(accumulator.total_meters(), 0.);
        assert_eq!(accumulator.previous(), Some(DELHI));
    }

    #[test]
    fn reset_forgets_previous_sample() {
        let mut accumulator = DistanceAccumulator::new();
        accumulator.update(DELHI);
        accumulator.update(AARHUS);
        accumulator.reset();

        assert_eq!(accumulator, DistanceAccumulator::default());
        assert_eq!(accumulator.update(AARHUS), 0.);
    }
}
