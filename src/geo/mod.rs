use crate::models::courier::{Courier, GeoPoint};

const EARTH_RADIUS_KM: f64 = 6_371.0;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Couriers within `radius_km` of `center` (boundary inclusive), nearest first.
///
/// The sort is stable, so couriers at equal distance keep their input order.
pub fn filter_by_radius<'a>(
    couriers: &'a [Courier],
    center: &GeoPoint,
    radius_km: f64,
) -> Vec<&'a Courier> {
    let mut nearby: Vec<(&Courier, f64)> = couriers
        .iter()
        .map(|courier| (courier, haversine_km(center, &courier.location)))
        .filter(|(_, distance)| *distance <= radius_km)
        .collect();

    nearby.sort_by(|a, b| a.1.total_cmp(&b.1));
    nearby.into_iter().map(|(courier, _)| courier).collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{filter_by_radius, haversine_km};
    use crate::models::courier::{Courier, GeoPoint};

    fn courier(id_seed: u128, lat: f64, lng: f64) -> Courier {
        Courier {
            id: Uuid::from_u128(id_seed),
            name: "test-courier".to_string(),
            location: GeoPoint { lat, lng },
            available: true,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn courier_at_the_restaurant_is_zero_km_away() {
        let restaurant = GeoPoint {
            lat: -23.5614,
            lng: -46.6559,
        };
        assert_eq!(haversine_km(&restaurant, &restaurant), 0.0);
    }

    #[test]
    fn one_hundredth_degree_of_longitude_at_equator_is_about_1_1_km() {
        let restaurant = GeoPoint { lat: 0.0, lng: 0.0 };
        let courier = GeoPoint { lat: 0.0, lng: 0.01 };

        let out = haversine_km(&restaurant, &courier);
        let back = haversine_km(&courier, &restaurant);

        assert!((out - 1.112).abs() < 0.001, "got {out}");
        assert!((out - back).abs() < 1e-12);
    }

    #[test]
    fn city_blocks_stay_inside_the_first_radius_tier() {
        // Two points roughly 1.5 km apart along a meridian.
        let restaurant = GeoPoint {
            lat: -23.5505,
            lng: -46.6333,
        };
        let courier = GeoPoint {
            lat: -23.5640,
            lng: -46.6333,
        };

        let distance = haversine_km(&restaurant, &courier);
        assert!(distance > 1.0 && distance < 2.0, "got {distance}");
    }

    #[test]
    fn orders_nearest_first_and_drops_far_couriers() {
        let center = GeoPoint { lat: 0.0, lng: 0.0 };
        let couriers = vec![
            courier(1, 0.0, 0.02),
            courier(2, 0.0, 0.005),
            courier(3, 0.0, 1.0),
            courier(4, 0.0, 0.01),
        ];

        let ids: Vec<u128> = filter_by_radius(&couriers, &center, 5.0)
            .iter()
            .map(|c| c.id.as_u128())
            .collect();

        assert_eq!(ids, vec![2, 4, 1]);
    }

    #[test]
    fn boundary_is_inclusive() {
        let center = GeoPoint { lat: 0.0, lng: 0.0 };
        let edge = courier(1, 0.0, 0.05);
        let exact = haversine_km(&center, &edge.location);
        let couriers = vec![edge];

        assert_eq!(filter_by_radius(&couriers, &center, exact).len(), 1);
        assert!(filter_by_radius(&couriers, &center, exact - 1e-9).is_empty());
    }

    #[test]
    fn equal_distances_keep_input_order() {
        let center = GeoPoint { lat: 0.0, lng: 0.0 };
        let couriers = vec![
            courier(7, 0.0, 0.01),
            courier(3, 0.0, -0.01),
            courier(5, 0.01, 0.0),
        ];

        let ids: Vec<u128> = filter_by_radius(&couriers, &center, 10.0)
            .iter()
            .map(|c| c.id.as_u128())
            .collect();

        assert_eq!(&ids[..2], &[7, 3]);
        assert!(filter_by_radius(&[], &center, 10.0).is_empty());
    }
}
