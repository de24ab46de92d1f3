use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use crate::{
    api::{JoinRequestAPI, RideAPI, API},
    entities::{Decision, JoinRequest, Ride, RideDraft, User},
    error::{invalid_input_error, invalid_transition_error, not_found_error, Error},
};

// full, immutable copy of the ride collection; handed out on every publish
// and never mutated afterwards
pub type Snapshot = Arc<Vec<Ride>>;

pub type Observer = Box<dyn Fn(Snapshot) + Send + Sync>;

type Registry = std::sync::Mutex<HashMap<u64, Observer>>;

pub struct RideStore {
    rides: Mutex<Vec<Ride>>,
    observers: Arc<Registry>,
    observer_seq: AtomicU64,
    snapshot_tx: watch::Sender<Snapshot>,
}

pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().unwrap().remove(&self.id);
        }
    }
}

impl RideStore {
    pub fn new() -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            rides: Mutex::new(Vec::new()),
            observers: Arc::new(std::sync::Mutex::new(HashMap::new())),
            observer_seq: AtomicU64::new(0),
            snapshot_tx,
        }
    }

    // latest-value channel carrying the current snapshot
    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_tx.subscribe()
    }

    #[tracing::instrument(skip(self, observer))]
    pub async fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(Snapshot) + Send + Sync + 'static,
    {
        let rides = self.rides.lock().await;

        let id = self.observer_seq.fetch_add(1, Ordering::Relaxed);
        observer(Arc::new(rides.clone()));
        self.observers
            .lock()
            .unwrap()
            .insert(id, Box::new(observer));

        Subscription {
            id,
            registry: Arc::downgrade(&self.observers),
        }
    }

    // runs with the rides lock held so subscribers observe commands in
    // application order; observers must not issue store commands
    fn publish(&self, rides: &[Ride]) {
        let snapshot: Snapshot = Arc::new(rides.to_vec());

        self.snapshot_tx.send_replace(Arc::clone(&snapshot));

        for observer in self.observers.lock().unwrap().values() {
            observer(Arc::clone(&snapshot));
        }
    }
}

#[async_trait]
impl RideAPI for RideStore {
    #[tracing::instrument(skip(self))]
    async fn post_ride(&self, draft: RideDraft) -> Result<Ride, Error> {
        if draft.seats_available < 0 || draft.cost_per_rider < 0.0 {
            return Err(invalid_input_error());
        }

        let mut rides = self.rides.lock().await;

        let ride = Ride::new(draft);
        rides.push(ride.clone());

        self.publish(&rides);

        Ok(ride)
    }

    #[tracing::instrument(skip(self))]
    async fn find_ride(&self, id: Uuid) -> Option<Ride> {
        let rides = self.rides.lock().await;

        rides.iter().find(|ride| ride.id == id).cloned()
    }

    #[tracing::instrument(skip(self))]
    async fn last_ride(&self) -> Option<Ride> {
        let rides = self.rides.lock().await;

        rides.last().cloned()
    }
}

#[async_trait]
impl JoinRequestAPI for RideStore {
    #[tracing::instrument(skip(self))]
    async fn submit_join_request(
        &self,
        ride_id: Uuid,
        requester: User,
        requested_start: String,
        requested_end: String,
    ) -> Result<JoinRequest, Error> {
        let mut rides = self.rides.lock().await;

        let ride = rides
            .iter_mut()
            .find(|ride| ride.id == ride_id)
            .ok_or_else(not_found_error)?;

        let request = JoinRequest::new(requester, requested_start, requested_end);
        ride.join_requests.push(request.clone());

        self.publish(&rides);

        Ok(request)
    }

    #[tracing::instrument(skip(self))]
    async fn decide_join_request(
        &self,
        ride_id: Uuid,
        request_index: usize,
        decision: Decision,
    ) -> Result<(), Error> {
        let mut rides = self.rides.lock().await;

        let ride = rides
            .iter_mut()
            .find(|ride| ride.id == ride_id)
            .ok_or_else(not_found_error)?;

        let request = ride
            .join_requests
            .get_mut(request_index)
            .ok_or_else(not_found_error)?;

        if !request.is_pending() {
            tracing::info!("join request is already decided, returning early...");
            return Err(invalid_transition_error());
        }

        match decision {
            Decision::Accepted => {
                request.accept()?;
                ride.take_seat();
            }
            Decision::Rejected => request.reject()?,
        }

        self.publish(&rides);

        Ok(())
    }
}

impl API for RideStore {}

#[cfg(test)]
fn sample_draft() -> RideDraft {
    RideDraft::new(
        "San Francisco".into(),
        "Oakland".into(),
        "June 23, 10:00 AM".into(),
        3,
        30.0,
    )
}

#[test]
fn post_ride_appends_in_post_order() {
    use tokio_test::block_on;

    let store = RideStore::new();

    let first = block_on(store.post_ride(sample_draft())).unwrap();
    let second = block_on(store.post_ride(sample_draft())).unwrap();
    let third = block_on(store.post_ride(sample_draft())).unwrap();

    assert_ne!(first.id, second.id);
    assert_ne!(second.id, third.id);
    assert_ne!(first.id, third.id);

    let snapshot = store.watch().borrow().clone();
    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot[0].id, first.id);
    assert_eq!(snapshot[1].id, second.id);
    assert_eq!(snapshot[2].id, third.id);

    assert_eq!(block_on(store.last_ride()).unwrap().id, third.id);
}

#[test]
fn post_ride_rejects_negative_seats() {
    use tokio_test::block_on;

    let store = RideStore::new();
    let posted = block_on(store.post_ride(sample_draft())).unwrap();

    let mut draft = sample_draft();
    draft.seats_available = -1;

    let err = block_on(store.post_ride(draft)).unwrap_err();
    assert_eq!(err.code, invalid_input_error().code);

    let snapshot = store.watch().borrow().clone();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, posted.id);
    assert_eq!(snapshot[0].seats_available, 3);
}

#[test]
fn post_ride_rejects_negative_cost() {
    use tokio_test::block_on;

    let store = RideStore::new();

    let mut draft = sample_draft();
    draft.cost_per_rider = -0.5;

    let err = block_on(store.post_ride(draft)).unwrap_err();
    assert_eq!(err.code, invalid_input_error().code);
    assert!(store.watch().borrow().is_empty());
}

#[test]
fn submit_join_request_unknown_ride() {
    use tokio_test::block_on;

    let store = RideStore::new();
    let posted = block_on(store.post_ride(sample_draft())).unwrap();

    let err = block_on(store.submit_join_request(
        Uuid::new_v4(),
        User::new("Alex"),
        "5th & Mission".into(),
        "12th St".into(),
    ))
    .unwrap_err();

    assert_eq!(err.code, not_found_error().code);

    let ride = block_on(store.find_ride(posted.id)).unwrap();
    assert!(ride.join_requests.is_empty());
}

#[test]
fn submit_join_request_appends_pending() {
    use tokio_test::block_on;

    let store = RideStore::new();
    let posted = block_on(store.post_ride(sample_draft())).unwrap();

    let requester = User::new("Alex");
    let request = block_on(store.submit_join_request(
        posted.id,
        requester.clone(),
        "5th & Mission".into(),
        "12th St".into(),
    ))
    .unwrap();

    assert!(request.is_pending());

    let ride = block_on(store.find_ride(posted.id)).unwrap();
    assert_eq!(ride.join_requests.len(), 1);
    assert_eq!(ride.join_requests[0].requester.id, requester.id);
    assert_eq!(ride.join_requests[0].status.name(), "pending");
    assert_eq!(ride.seats_available, posted.seats_available);

    let second = User::new("Sam");
    block_on(store.submit_join_request(posted.id, second.clone(), "".into(), "".into())).unwrap();

    let ride = block_on(store.find_ride(posted.id)).unwrap();
    assert_eq!(ride.join_requests.len(), 2);
    assert_eq!(ride.join_requests[1].requester.id, second.id);
}

#[test]
fn accepting_a_request_takes_a_seat() {
    use tokio_test::block_on;

    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let store = RideStore::new();

    let mut draft = sample_draft();
    draft.seats_available = 2;
    draft.cost_per_rider = 10.0;

    let posted = block_on(store.post_ride(draft)).unwrap();

    block_on(store.submit_join_request(
        posted.id,
        User::new("Alex"),
        "5th & Mission".into(),
        "12th St".into(),
    ))
    .unwrap();

    block_on(store.decide_join_request(posted.id, 0, Decision::Accepted)).unwrap();

    let ride = block_on(store.find_ride(posted.id)).unwrap();
    assert_eq!(ride.seats_available, 1);
    assert_eq!(ride.join_requests[0].status.name(), "accepted");
}

#[test]
fn decisions_are_one_way() {
    use tokio_test::block_on;

    let store = RideStore::new();
    let posted = block_on(store.post_ride(sample_draft())).unwrap();

    block_on(store.submit_join_request(posted.id, User::new("Alex"), "".into(), "".into()))
        .unwrap();

    block_on(store.decide_join_request(posted.id, 0, Decision::Rejected)).unwrap();

    let err =
        block_on(store.decide_join_request(posted.id, 0, Decision::Accepted)).unwrap_err();
    assert_eq!(err.code, invalid_transition_error().code);

    let err =
        block_on(store.decide_join_request(posted.id, 0, Decision::Rejected)).unwrap_err();
    assert_eq!(err.code, invalid_transition_error().code);

    let ride = block_on(store.find_ride(posted.id)).unwrap();
    assert_eq!(ride.join_requests[0].status.name(), "rejected");
    assert_eq!(ride.seats_available, posted.seats_available);
}

#[test]
fn decide_join_request_unknown_targets() {
    use tokio_test::block_on;

    let store = RideStore::new();
    let posted = block_on(store.post_ride(sample_draft())).unwrap();

    let err = block_on(store.decide_join_request(Uuid::new_v4(), 0, Decision::Accepted))
        .unwrap_err();
    assert_eq!(err.code, not_found_error().code);

    let err =
        block_on(store.decide_join_request(posted.id, 0, Decision::Accepted)).unwrap_err();
    assert_eq!(err.code, not_found_error().code);

    let ride = block_on(store.find_ride(posted.id)).unwrap();
    assert_eq!(ride.seats_available, posted.seats_available);
}

#[test]
fn accepting_with_no_seats_left_still_succeeds() {
    use tokio_test::block_on;

    let store = RideStore::new();

    let mut draft = sample_draft();
    draft.seats_available = 0;

    let posted = block_on(store.post_ride(draft)).unwrap();

    block_on(store.submit_join_request(posted.id, User::new("Alex"), "".into(), "".into()))
        .unwrap();
    block_on(store.decide_join_request(posted.id, 0, Decision::Accepted)).unwrap();

    let ride = block_on(store.find_ride(posted.id)).unwrap();
    assert_eq!(ride.seats_available, 0);
    assert_eq!(ride.join_requests[0].status.name(), "accepted");
}

#[test]
fn reads_are_idempotent() {
    use tokio_test::block_on;

    let store = RideStore::new();
    let posted = block_on(store.post_ride(sample_draft())).unwrap();

    block_on(store.submit_join_request(posted.id, User::new("Alex"), "".into(), "".into()))
        .unwrap();

    let first = block_on(store.find_ride(posted.id)).unwrap();
    let second = block_on(store.find_ride(posted.id)).unwrap();

    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );

    let first = block_on(store.last_ride()).unwrap();
    let second = block_on(store.last_ride()).unwrap();

    assert_eq!(
        serde_json::to_value(&first).unwrap(),
        serde_json::to_value(&second).unwrap()
    );
}

#[test]
fn subscribers_get_the_current_snapshot_then_every_change() {
    use std::sync::Mutex as StdMutex;
    use tokio_test::block_on;

    let store = RideStore::new();
    let received: Arc<StdMutex<Vec<Snapshot>>> = Arc::new(StdMutex::new(Vec::new()));

    let sink = Arc::clone(&received);
    let _subscription = block_on(store.subscribe(move |snapshot| {
        sink.lock().unwrap().push(snapshot);
    }));

    block_on(store.post_ride(sample_draft())).unwrap();

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 2);
    assert!(received[0].is_empty());
    assert_eq!(received[1].len(), 1);

    let ride = &received[1][0];
    assert_eq!(ride.origin, "San Francisco");
    assert_eq!(ride.destination, "Oakland");
    assert_eq!(ride.departure_label, "June 23, 10:00 AM");
    assert_eq!(ride.seats_available, 3);
    assert_eq!(ride.cost_per_rider, 30.0);
    assert_eq!(ride.driver_name, "You");
}

#[test]
fn failed_commands_do_not_notify() {
    use std::sync::Mutex as StdMutex;
    use tokio_test::block_on;

    let store = RideStore::new();
    let received: Arc<StdMutex<Vec<Snapshot>>> = Arc::new(StdMutex::new(Vec::new()));

    let sink = Arc::clone(&received);
    let _subscription = block_on(store.subscribe(move |snapshot| {
        sink.lock().unwrap().push(snapshot);
    }));

    let mut draft = sample_draft();
    draft.seats_available = -1;
    block_on(store.post_ride(draft)).unwrap_err();

    block_on(store.submit_join_request(Uuid::new_v4(), User::new("Alex"), "".into(), "".into()))
        .unwrap_err();

    assert_eq!(received.lock().unwrap().len(), 1);
}

#[test]
fn unsubscribe_is_permanent_and_idempotent() {
    use std::sync::Mutex as StdMutex;
    use tokio_test::block_on;

    let store = RideStore::new();
    let received: Arc<StdMutex<Vec<Snapshot>>> = Arc::new(StdMutex::new(Vec::new()));

    let sink = Arc::clone(&received);
    let subscription = block_on(store.subscribe(move |snapshot| {
        sink.lock().unwrap().push(snapshot);
    }));

    subscription.unsubscribe();
    subscription.unsubscribe();

    block_on(store.post_ride(sample_draft())).unwrap();

    assert_eq!(received.lock().unwrap().len(), 1);
}

#[test]
fn watch_holds_the_latest_snapshot() {
    use tokio_test::block_on;

    let store = RideStore::new();
    let receiver = store.watch();

    assert!(receiver.borrow().is_empty());

    let posted = block_on(store.post_ride(sample_draft())).unwrap();

    let snapshot = receiver.borrow().clone();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, posted.id);
}

#[test]
fn store_is_usable_as_a_trait_object() {
    use crate::api::DynAPI;
    use tokio_test::block_on;

    let api: DynAPI = Arc::new(RideStore::new());

    let posted = block_on(api.post_ride(sample_draft())).unwrap();
    assert_eq!(block_on(api.last_ride()).unwrap().id, posted.id);
    assert!(block_on(api.find_ride(Uuid::new_v4())).is_none());
}
