use serde::{Deserialize, Serialize};

use crate::geo::{distance_km, format_distance_km, Coordinate};
use crate::request::{Priority, RequestStatus, RescueRequest};
use crate::store::RescueStore;

/// Requests currently claimed by a rescuer, in store order. Recomputed from
/// scratch on every call.
#[must_use]
pub fn project(store: &RescueStore) -> Vec<&RescueRequest> {
    store
        .iter()
        .filter(|r| r.status == RequestStatus::Accepted)
        .collect()
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AcceptedRescueItem {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub address: Option<String>,
    pub message: Option<String>,
    pub image: Option<String>,
    pub priority: Priority,
    pub lat: f64,
    pub lon: f64,
    pub distance_km: f64,
    pub distance_text: String,
}

impl AcceptedRescueItem {
    fn build(request: &RescueRequest, origin: Coordinate) -> Self {
        let distance = distance_km(origin, request.location);
        Self {
            id: request.id.to_string(),
            name: request.name.clone(),
            phone: request.phone.clone(),
            address: request.address.clone(),
            message: request.message.clone(),
            image: request.image.clone(),
            priority: request.priority,
            lat: request.location.lat(),
            lon: request.location.lon(),
            distance_km: distance,
            distance_text: format_distance_km(distance),
        }
    }
}

/// Side-list rows with distances measured from `origin`.
#[must_use]
pub fn accepted_items(store: &RescueStore, origin: Coordinate) -> Vec<AcceptedRescueItem> {
    project(store)
        .into_iter()
        .map(|r| AcceptedRescueItem::build(r, origin))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestId;

    fn seeded() -> RescueStore {
        let at = |lat, lon| Coordinate::new(lat, lon).unwrap();
        let mut store = RescueStore::new();
        store.replace_all(vec![
            RescueRequest::new("1", "Nguyen Van A", "0901234567", at(10.7769, 106.7009), Priority::High),
            RescueRequest::new("2", "Tran Thi B", "0901234568", at(10.7859, 106.6960), Priority::High),
            RescueRequest::new("3", "Le Van C", "0901234569", at(10.7740, 106.7050), Priority::Low),
            RescueRequest::new("4", "Pham Thi D", "0901234570", at(10.7800, 106.6950), Priority::Low)
                .with_status(RequestStatus::InProgress),
            RescueRequest::new("5", "Hoang Van E", "0901234571", at(10.7730, 106.7100), Priority::High),
        ]);
        store
    }

    #[test]
    fn empty_until_something_is_accepted() {
        let store = seeded();
        assert!(project(&store).is_empty());
    }

    #[test]
    fn accept_then_complete_tracks_projection() {
        let mut store = seeded();
        let id = RequestId::new("5");

        store.accept(&id).unwrap();
        let projected: Vec<_> = project(&store).iter().map(|r| r.id.clone()).collect();
        assert_eq!(projected, vec![id.clone()]);

        store.complete(&id);
        assert!(project(&store).is_empty());
        assert!(!store.contains(&id));
    }

    #[test]
    fn items_follow_store_order_with_distances() {
        let mut store = seeded();
        store.accept(&RequestId::new("3")).unwrap();
        store.accept(&RequestId::new("1")).unwrap();

        let origin = Coordinate::new(10.7769, 106.7009).unwrap();
        let items = accepted_items(&store, origin);
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(items[0].distance_km, 0.0);
        assert_eq!(items[0].distance_text, "0.00 km");
    }
}
