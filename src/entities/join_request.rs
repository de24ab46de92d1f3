use serde::{Deserialize, Serialize};

use crate::entities::User;
use crate::error::{invalid_transition_error, Error};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JoinRequest {
    pub requester: User,
    pub requested_start: String,
    pub requested_end: String,
    pub status: Status,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Status {
    Pending,
    Accepted,
    Rejected,
}

impl Status {
    pub fn name(&self) -> String {
        match self {
            Self::Pending => "pending".into(),
            Self::Accepted => "accepted".into(),
            Self::Rejected => "rejected".into(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum Decision {
    Accepted,
    Rejected,
}

impl JoinRequest {
    pub fn new(requester: User, requested_start: String, requested_end: String) -> Self {
        Self {
            requester,
            requested_start,
            requested_end,
            status: Status::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        match self.status {
            Status::Pending => true,
            _ => false,
        }
    }

    #[tracing::instrument]
    pub fn accept(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Pending => {
                self.status = Status::Accepted;
                Ok(())
            }
            _ => Err(invalid_transition_error()),
        }
    }

    #[tracing::instrument]
    pub fn reject(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Pending => {
                self.status = Status::Rejected;
                Ok(())
            }
            _ => Err(invalid_transition_error()),
        }
    }
}

#[test]
fn accept_from_pending() {
    let mut request = JoinRequest::new(User::new("Alex"), "5th & Mission".into(), "12th St".into());
    assert!(request.is_pending());

    request.accept().unwrap();
    assert_eq!(request.status.name(), "accepted");
}

#[test]
fn reject_from_pending() {
    let mut request = JoinRequest::new(User::new("Alex"), "5th & Mission".into(), "12th St".into());

    request.reject().unwrap();
    assert_eq!(request.status.name(), "rejected");
}

#[test]
fn decided_requests_are_terminal() {
    let mut request = JoinRequest::new(User::new("Alex"), "5th & Mission".into(), "12th St".into());

    request.accept().unwrap();

    let err = request.accept().unwrap_err();
    assert_eq!(err.code, invalid_transition_error().code);

    let err = request.reject().unwrap_err();
    assert_eq!(err.code, invalid_transition_error().code);

    assert_eq!(request.status.name(), "accepted");

    let mut request = JoinRequest::new(User::new("Sam"), "".into(), "".into());
    request.reject().unwrap();

    let err = request.accept().unwrap_err();
    assert_eq!(err.code, invalid_transition_error().code);
    assert_eq!(request.status.name(), "rejected");
}
