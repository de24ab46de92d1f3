use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{Decision, JoinRequest, Ride, RideDraft, User};
use crate::error::Error;

#[async_trait]
pub trait RideAPI {
    async fn post_ride(&self, draft: RideDraft) -> Result<Ride, Error>;

    async fn find_ride(&self, id: Uuid) -> Option<Ride>;

    async fn last_ride(&self) -> Option<Ride>;
}

#[async_trait]
pub trait JoinRequestAPI {
    async fn submit_join_request(
        &self,
        ride_id: Uuid,
        requester: User,
        requested_start: String,
        requested_end: String,
    ) -> Result<JoinRequest, Error>;

    async fn decide_join_request(
        &self,
        ride_id: Uuid,
        request_index: usize,
        decision: Decision,
    ) -> Result<(), Error>;
}

pub trait API: RideAPI + JoinRequestAPI {}

pub type DynAPI = Arc<dyn API + Send + Sync>;
