use once_cell::sync::Lazy;
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::Rng;

/// A representative internet hub within a country, with a rough relative
/// weight (population/connectivity proxy) used when we only know the country
/// and have to pick *somewhere* in it to draw a pulse.
#[derive(Debug, Clone, Copy)]
pub struct CountryHub {
    pub city: &'static str,
    pub lat: f64,
    pub lng: f64,
    pub weight: u32,
}

/// One or more candidate hubs per ISO-3166 country code. Countries absent
/// here have no fallback and resolution for them ends in `None`.
static HUBS: Lazy<Vec<(&'static str, Vec<CountryHub>)>> = Lazy::new(|| {
    vec![
        (
            "US",
            vec![
                CountryHub { city: "New York", lat: 40.7128, lng: -74.0060, weight: 20 },
                CountryHub { city: "Ashburn", lat: 39.0438, lng: -77.4874, weight: 15 },
                CountryHub { city: "Los Angeles", lat: 34.0522, lng: -118.2437, weight: 10 },
                CountryHub { city: "Chicago", lat: 41.8781, lng: -87.6298, weight: 8 },
            ],
        ),
        (
            "GB",
            vec![CountryHub { city: "London", lat: 51.5074, lng: -0.1278, weight: 20 }],
        ),
        (
            "DE",
            vec![
                CountryHub { city: "Frankfurt", lat: 50.1109, lng: 8.6821, weight: 15 },
                CountryHub { city: "Berlin", lat: 52.5200, lng: 13.4050, weight: 10 },
            ],
        ),
        (
            "FR",
            vec![CountryHub { city: "Paris", lat: 48.8566, lng: 2.3522, weight: 15 }],
        ),
        (
            "NL",
            vec![CountryHub { city: "Amsterdam", lat: 52.3676, lng: 4.9041, weight: 15 }],
        ),
        (
            "JP",
            vec![CountryHub { city: "Tokyo", lat: 35.6762, lng: 139.6503, weight: 15 }],
        ),
        (
            "SG",
            vec![CountryHub { city: "Singapore", lat: 1.3521, lng: 103.8198, weight: 12 }],
        ),
        (
            "AU",
            vec![CountryHub { city: "Sydney", lat: -33.8688, lng: 151.2093, weight: 12 }],
        ),
        (
            "BR",
            vec![CountryHub { city: "Sao Paulo", lat: -23.5505, lng: -46.6333, weight: 12 }],
        ),
        (
            "IN",
            vec![
                CountryHub { city: "Mumbai", lat: 19.0760, lng: 72.8777, weight: 12 },
                CountryHub { city: "Delhi", lat: 28.7041, lng: 77.1025, weight: 10 },
            ],
        ),
        (
            "RU",
            vec![CountryHub { city: "Moscow", lat: 55.7558, lng: 37.6173, weight: 15 }],
        ),
        (
            "CN",
            vec![
                CountryHub { city: "Beijing", lat: 39.9042, lng: 116.4074, weight: 15 },
                CountryHub { city: "Shanghai", lat: 31.2304, lng: 121.4737, weight: 12 },
            ],
        ),
        (
            "CA",
            vec![CountryHub { city: "Toronto", lat: 43.6532, lng: -79.3832, weight: 12 }],
        ),
        (
            "ZA",
            vec![CountryHub { city: "Johannesburg", lat: -26.2041, lng: 28.0473, weight: 10 }],
        ),
    ]
});

/// Look up known coordinates for a `(country_code, city)` pair, independent
/// of the weighted sampling in `sample`. Used when an upstream layer (cloud
/// region table, offline GeoIP) already names a city and just needs its
/// coordinates. Case-insensitive on city name.
pub fn coords_for(country_code: &str, city: &str) -> Option<(f64, f64)> {
    let (_, hubs) = HUBS.iter().find(|(cc, _)| *cc == country_code)?;
    hubs.iter()
        .find(|hub| hub.city.eq_ignore_ascii_case(city))
        .map(|hub| (hub.lat, hub.lng))
}

/// Draw a weighted-random hub for `country_code`. Returns `None` if the
/// country has no known hubs, which leaves the prefix ungeolocated rather
/// than guessing.
pub fn sample<R: Rng + ?Sized>(country_code: &str, rng: &mut R) -> Option<(&'static str, f64, f64)> {
    let (_, hubs) = HUBS.iter().find(|(cc, _)| *cc == country_code)?;
    let weights: Vec<u32> = hubs.iter().map(|h| h.weight).collect();
    let dist = WeightedIndex::new(&weights).ok()?;
    let hub = &hubs[dist.sample(rng)];
    Some((hub.city, hub.lat, hub.lng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    #[test]
    fn test_known_country_samples_a_hub() {
        let mut rng = StepRng::new(0, 1);
        let hub = sample("US", &mut rng);
        assert!(hub.is_some());
    }

    #[test]
    fn test_unknown_country_returns_none() {
        let mut rng = StepRng::new(0, 1);
        assert_eq!(sample("ZZ", &mut rng), None);
    }

    #[test]
    fn test_single_hub_country_always_picks_it() {
        let mut rng = StepRng::new(u64::MAX / 2, 1);
        let (city, _, _) = sample("GB", &mut rng).unwrap();
        assert_eq!(city, "London");
    }

    #[test]
    fn test_coords_for_is_case_insensitive() {
        assert_eq!(coords_for("GB", "london"), Some((51.5074, -0.1278)));
        assert_eq!(coords_for("GB", "Birmingham"), None);
        assert_eq!(coords_for("ZZ", "London"), None);
    }
}
