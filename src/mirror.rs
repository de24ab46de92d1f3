use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::entities::{JoinRequest, Ride};
use crate::error::Error;

// remote document layout: rides/{ride_id} holds the ride, with each join
// request under rides/{ride_id}/join_requests/{requester_id}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JoinDocument {
    pub name: String,
    pub joined_at: DateTime<Utc>,
}

// durable mirror of the store's state; invoked by the surrounding layer
// after a successful command, never by the store itself. A mirror failure
// must not roll back the in-memory mutation it trails.
#[async_trait]
pub trait RideMirror {
    async fn mirror_ride(&self, ride: &Ride) -> Result<(), Error>;

    async fn mirror_join_request(&self, ride_id: Uuid, request: &JoinRequest)
        -> Result<(), Error>;
}

pub struct InMemoryMirror {
    documents: Mutex<HashMap<String, serde_json::Value>>,
}

impl InMemoryMirror {
    pub fn new() -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
        }
    }

    pub async fn document(&self, path: &str) -> Option<serde_json::Value> {
        self.documents.lock().await.get(path).cloned()
    }
}

#[async_trait]
impl RideMirror for InMemoryMirror {
    #[tracing::instrument(skip(self, ride))]
    async fn mirror_ride(&self, ride: &Ride) -> Result<(), Error> {
        let mut documents = self.documents.lock().await;
        documents.insert(format!("rides/{}", ride.id), serde_json::to_value(ride)?);

        Ok(())
    }

    #[tracing::instrument(skip(self, request))]
    async fn mirror_join_request(
        &self,
        ride_id: Uuid,
        request: &JoinRequest,
    ) -> Result<(), Error> {
        let document = JoinDocument {
            name: request.requester.name.clone(),
            joined_at: Utc::now(),
        };

        let mut documents = self.documents.lock().await;
        documents.insert(
            format!("rides/{}/join_requests/{}", ride_id, request.requester.id),
            serde_json::to_value(&document)?,
        );

        Ok(())
    }
}

#[test]
fn mirror_ride_writes_a_document_keyed_by_id() {
    use crate::entities::RideDraft;
    use tokio_test::block_on;

    let mirror = InMemoryMirror::new();
    let ride = Ride::new(RideDraft::new(
        "San Francisco".into(),
        "Oakland".into(),
        "June 23, 10:00 AM".into(),
        3,
        30.0,
    ));

    block_on(mirror.mirror_ride(&ride)).unwrap();

    let document = block_on(mirror.document(&format!("rides/{}", ride.id))).unwrap();
    assert_eq!(document["origin"], "San Francisco");
    assert_eq!(document["seats_available"], 3);
}

#[test]
fn mirror_join_request_writes_under_the_ride() {
    use crate::entities::{RideDraft, User};
    use tokio_test::block_on;

    let mirror = InMemoryMirror::new();
    let ride = Ride::new(RideDraft::new(
        "San Francisco".into(),
        "Oakland".into(),
        "June 23, 10:00 AM".into(),
        3,
        30.0,
    ));

    let requester = User::new("Biswaraj");
    let request = JoinRequest::new(requester.clone(), "".into(), "".into());

    block_on(mirror.mirror_join_request(ride.id, &request)).unwrap();

    let path = format!("rides/{}/join_requests/{}", ride.id, requester.id);
    let document = block_on(mirror.document(&path)).unwrap();
    assert_eq!(document["name"], "Biswaraj");
    assert!(document.get("joined_at").is_some());
}

#[test]
fn mirror_failure_leaves_the_store_untouched() {
    use crate::api::RideAPI;
    use crate::entities::RideDraft;
    use crate::error::upstream_error;
    use crate::store::RideStore;
    use tokio_test::block_on;

    struct UnreachableMirror;

    #[async_trait]
    impl RideMirror for UnreachableMirror {
        async fn mirror_ride(&self, _: &Ride) -> Result<(), Error> {
            Err(upstream_error())
        }

        async fn mirror_join_request(&self, _: Uuid, _: &JoinRequest) -> Result<(), Error> {
            Err(upstream_error())
        }
    }

    let store = RideStore::new();
    let posted = block_on(store.post_ride(RideDraft::new(
        "San Francisco".into(),
        "Oakland".into(),
        "June 23, 10:00 AM".into(),
        3,
        30.0,
    )))
    .unwrap();

    // the surrounding layer mirrors after the command; its failure trails
    // an already-published mutation
    let mirror = UnreachableMirror;
    block_on(mirror.mirror_ride(&posted)).unwrap_err();

    let ride = block_on(store.find_ride(posted.id)).unwrap();
    assert_eq!(ride.id, posted.id);
    assert_eq!(ride.seats_available, 3);
}
