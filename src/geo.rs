use crate::db::models::{Role, User};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Radius around a new relief camp whose users get notified.
pub const NOTIFY_RADIUS_KM: f64 = 10.0;

/// Great-circle distance in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}

/// Donors, volunteers and distributors with known coordinates within
/// `radius_km` of the point.
pub fn nearby_responders(users: &[User], latitude: f64, longitude: f64, radius_km: f64) -> Vec<&User> {
    users
        .iter()
        .filter(|u| matches!(u.role, Role::Donor | Role::Volunteer | Role::Distributor))
        .filter(|u| match (u.latitude, u.longitude) {
            (Some(lat), Some(lon)) => haversine_km(latitude, longitude, lat, lon) <= radius_km,
            _ => false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;

    #[test]
    fn known_distance() {
        // Chicago to Boston is roughly 1,365 km
        let d = haversine_km(41.8781, -87.6298, 42.3601, -71.0589);
        assert!((d - 1365.0).abs() < 15.0, "{}", d);
        assert_eq!(haversine_km(10.0, 10.0, 10.0, 10.0), 0.0);
    }

    #[test]
    fn only_responder_roles_within_radius() {
        let users = fixtures::users();
        // a few blocks from downtown Austin: the distributor and the admin are there
        let near = nearby_responders(&users, 30.27, -97.74, NOTIFY_RADIUS_KM);
        let ids: Vec<&str> = near.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["usr_1004"]);
    }
}
