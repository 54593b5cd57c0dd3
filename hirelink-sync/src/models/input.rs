//! Outgoing request DTOs with garde validation.
//!
//! Payloads are validated before they reach the transport, and the relay
//! validates them again on arrival.

use garde::Validate;
use serde::{Deserialize, Serialize};

use super::{MessagePayload, UserId};
use crate::error::SyncError;

const MAX_USER_ID_LENGTH: usize = 128;

fn valid_user_id(value: &UserId, _ctx: &()) -> garde::Result {
    let id = value.as_str();
    if id.trim().is_empty() {
        return Err(garde::Error::new("recipient id must not be empty"));
    }
    if id.len() > MAX_USER_ID_LENGTH {
        return Err(garde::Error::new("recipient id too long"));
    }
    Ok(())
}

/// Message-creation request carried by the `send_message` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[garde(context(()))]
pub struct SendMessageRequest {
    #[garde(custom(valid_user_id))]
    pub recipient_id: UserId,
    #[serde(flatten)]
    #[garde(dive)]
    pub payload: MessagePayload,
}

/// Helper trait to convert garde validation errors into [`SyncError`]
pub trait ValidateExt {
    fn validate_input(&self) -> Result<(), SyncError>;
}

impl<T: Validate<Context = ()>> ValidateExt for T {
    fn validate_input(&self) -> Result<(), SyncError> {
        self.validate()
            .map_err(|e| SyncError::InvalidPayload(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Enquiry;

    #[test]
    fn test_request_wire_shape() {
        let request = SendMessageRequest {
            recipient_id: UserId::from("emp-1"),
            payload: MessagePayload::Enquiry {
                enquiry: Enquiry {
                    title: "Start date".to_string(),
                    description: "Can I start in May?".to_string(),
                    attachments: vec![],
                    job_id: Some("job-3".to_string()),
                },
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["recipientId"], "emp-1");
        assert_eq!(json["type"], "enquiry");
        assert_eq!(json["enquiry"]["jobId"], "job-3");
        assert!(json.get("content").is_none());
    }

    #[test]
    fn test_validate_input_reports_payload_errors() {
        let request = SendMessageRequest {
            recipient_id: UserId::from("emp-1"),
            payload: MessagePayload::text(""),
        };
        let err = request.validate_input().unwrap_err();
        assert!(matches!(err, SyncError::InvalidPayload(_)));

        let request = SendMessageRequest {
            recipient_id: UserId::from(" "),
            payload: MessagePayload::text("hello"),
        };
        assert!(request.validate_input().is_err());
    }
}
