//! The `{status, result}` / `{status, code, mesg}` response wrapper.
//!
//! Every non-streaming endpoint answers with one of two shapes:
//!
//! ```json
//! {"status": "ok", "result": <endpoint-specific>}
//! {"status": "err", "code": "AuthDeny", "mesg": "bad creds"}
//! ```
//!
//! Success or failure is decided by the `status` field alone. HTTP status
//! codes are never inspected here; the service answers HTTP 200 for
//! application-level errors.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decoder::{decode_payload, PayloadMode};
use crate::errors::{EnvelopeError, MalformedResponse, ServiceError};

/// The literal `status` value that marks a successful envelope.
pub const STATUS_OK: &str = "ok";

/// A decoded response envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T> {
    /// `status == "ok"`; carries the decoded `result`.
    Ok(T),
    /// `status != "ok"`; carries the service's `code` and `mesg`.
    Err(ServiceError),
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Decodes `bytes` into an [`Envelope`].
    ///
    /// # Errors
    ///
    /// Returns [`MalformedResponse`] if the body is not JSON, has no string
    /// `status`, is not an object, or is a success envelope whose `result` does not decode as `T`.
    pub fn decode(bytes: &[u8]) -> Result<Self, MalformedResponse> {
        let body: Value = serde_json::from_slice(bytes).map_err(MalformedResponse::envelope)?;
        if !body.is_object() {
            return Err(MalformedResponse::envelope(serde_json::Error::custom(
                "envelope is not a JSON object",
            )));
        }
        let probe = StatusProbe::deserialize(&body).map_err(MalformedResponse::envelope)?;

        if probe.status == STATUS_OK {
            let result = T::deserialize(probe.result.unwrap_or(Value::Null))
                .map_err(MalformedResponse::envelope)?;
            return Ok(Self::Ok(result));
        }

        // A null or mistyped `code`/`mesg` reads as empty.
        let failure: ErrorBody = decode_payload(body, PayloadMode::Lenient)
            .map_err(MalformedResponse::envelope)?;
        Ok(Self::Err(ServiceError::new(failure.code, failure.mesg)))
    }
}

impl<T> Envelope<T> {
    /// Converts the envelope into a `Result`.
    pub fn into_result(self) -> Result<T, ServiceError> {
        match self {
            Self::Ok(result) => Ok(result),
            Self::Err(err) => Err(err),
        }
    }

    /// Returns `true` for a success envelope.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }
}

impl<T: Serialize> Envelope<T> {
    /// Encodes the envelope in its wire shape.
    ///
    /// # Errors
    ///
    /// Returns an error if `T` fails to serialize.
    pub fn to_wire(&self) -> Result<Value, serde_json::Error> {
        let value = match self {
            Self::Ok(result) => serde_json::json!({
                "status": STATUS_OK,
                "result": serde_json::to_value(result)?,
            }),
            Self::Err(err) => serde_json::json!({
                "status": "err",
                "code": err.code,
                "mesg": err.message,
            }),
        };
        Ok(value)
    }
}

/// Decodes a non-streaming response body, returning the `result` on success.
///
/// # Errors
///
/// - [`EnvelopeError::Service`] when the envelope reports `status != "ok"`.
/// - [`EnvelopeError::Malformed`] when the body matches neither shape.
pub fn decode_envelope<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, EnvelopeError> {
    Ok(Envelope::<T>::decode(bytes)?.into_result()?)
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct StatusProbe {
    status: String,
    #[serde(default)]
    result: Option<Value>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct ErrorBody {
    code: String,
    mesg: String,
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
