//! Transport seam
//!
//! The [`Transport`] trait is the only place requests leave the process.
//! [`StubTransport`] keeps documents in memory for tests and demos.

use crate::error_set::ErrorSet;
use crate::types::{EntityKind, Operation, Payload};
use crate::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outbound call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Record type the request is about
    pub kind: EntityKind,
    /// What to do
    pub operation: Operation,
    /// Target record, for operations on an existing record
    pub id: Option<String>,
    /// Request body
    pub payload: Payload,
}

impl Request {
    /// Request without an id or body
    pub fn new(kind: EntityKind, operation: Operation) -> Self {
        Self {
            kind,
            operation,
            id: None,
            payload: Payload::new(),
        }
    }

    /// Target an existing record
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach a body
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }
}

/// Field error reported by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Attribute name, or `base`
    pub attribute: String,
    /// Gateway error code
    pub code: Option<String>,
    /// Human-readable message
    pub message: String,
}

impl RemoteError {
    /// Error on an attribute, `base` for the whole record
    pub fn new(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            code: None,
            message: message.into(),
        }
    }

    /// Attach a gateway error code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Collect gateway errors into an error set
pub fn remote_error_set(errors: &[RemoteError]) -> ErrorSet {
    errors
        .iter()
        .map(|error| (error.attribute.clone(), error.message.clone()))
        .collect()
}

/// Gateway answer
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Accepted; carries the resulting document
    Success(Payload),
    /// Rejected with field errors
    Invalid(Vec<RemoteError>),
}

/// Performs gateway calls
pub trait Transport {
    /// Send one request
    fn execute(&mut self, request: Request) -> Result<Response>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn execute(&mut self, request: Request) -> Result<Response> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&mut self, request: Request) -> Result<Response> {
        (**self).execute(request)
    }
}

/// In-memory gateway
///
/// Scripted results queued with [`push_response`](Self::push_response) or
/// [`push_failure`](Self::push_failure) are replayed first, one per call.
/// Without a script the stub acts as a small document store:
///
/// - create assigns a `STUB-` identifier and timestamps
/// - find, all, update and delete work against stored documents
/// - transaction state operations move the stored status
#[derive(Debug, Default)]
pub struct StubTransport {
    requests: Vec<Request>,
    scripted: VecDeque<Result<Response>>,
    documents: BTreeMap<(EntityKind, String), Payload>,
}

impl StubTransport {
    /// Empty stub with no script
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next call
    pub fn push_response(&mut self, response: Response) {
        self.scripted.push_back(Ok(response));
    }

    /// Queue a transport failure for the next call
    pub fn push_failure(&mut self, message: impl Into<String>) {
        self.scripted.push_back(Err(Error::Transport(message.into())));
    }

    /// Store a document as if the gateway already had it
    pub fn seed(&mut self, kind: EntityKind, document: Payload) -> Result<()> {
        let id = document
            .get(kind.id_field())
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Other(format!("Seeded {} has no {}", kind, kind.id_field())))?
            .to_string();
        self.documents.insert((kind, id), document);
        Ok(())
    }

    /// Every request seen so far
    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    /// Most recent request
    pub fn last_request(&self) -> Option<&Request> {
        self.requests.last()
    }

    /// Stored document, if any
    pub fn document(&self, kind: EntityKind, id: &str) -> Option<&Payload> {
        self.documents.get(&(kind, id.to_string()))
    }

    /// Short enough to pass the customer id length rule
    fn generate_id() -> String {
        let uuid = Uuid::new_v4().simple().to_string();
        format!("STUB-{}", &uuid[..16])
    }

    fn target_id(request: &Request) -> Result<String> {
        request.id.clone().ok_or_else(|| {
            Error::Transport(format!(
                "{} on {} requires an identifier",
                request.operation, request.kind
            ))
        })
    }

    fn stored_mut(&mut self, kind: EntityKind, id: &str) -> Result<&mut Payload> {
        self.documents
            .get_mut(&(kind, id.to_string()))
            .ok_or_else(|| Error::Transport(format!("{} {} not found", kind, id)))
    }

    fn status_error(document: &Payload, operation: Operation) -> Response {
        let status = document.get("status").and_then(Value::as_str).unwrap_or("unknown");
        Response::Invalid(vec![RemoteError::new(
            "base",
            format!("Cannot {} transaction in status {}", operation, status),
        )
        .with_code("91506")])
    }

    fn simulate(&mut self, request: &Request) -> Result<Response> {
        let kind = request.kind;
        let now = Utc::now().to_rfc3339();

        match request.operation {
            Operation::Create => {
                let id = Self::generate_id();
                let mut document = request.payload.clone();
                document.insert(kind.id_field().to_string(), Value::String(id.clone()));
                document.insert("created_at".into(), Value::String(now.clone()));
                document.insert("updated_at".into(), Value::String(now));
                if kind == EntityKind::Transaction {
                    document
                        .entry("status")
                        .or_insert_with(|| Value::String("authorized".into()));
                }
                self.documents.insert((kind, id), document.clone());
                Ok(Response::Success(document))
            }
            Operation::Find => {
                let id = Self::target_id(request)?;
                Ok(Response::Success(self.stored_mut(kind, &id)?.clone()))
            }
            Operation::All => {
                let items = self
                    .documents
                    .iter()
                    .filter(|((stored_kind, _), _)| *stored_kind == kind)
                    .map(|(_, document)| Value::Object(document.clone()))
                    .collect();
                let mut document = Payload::new();
                document.insert("items".into(), Value::Array(items));
                Ok(Response::Success(document))
            }
            Operation::Update => {
                let id = Self::target_id(request)?;
                let document = self.stored_mut(kind, &id)?;
                for (name, value) in &request.payload {
                    document.insert(name.clone(), value.clone());
                }
                document.insert("updated_at".into(), Value::String(now));
                Ok(Response::Success(document.clone()))
            }
            Operation::Delete => {
                let id = Self::target_id(request)?;
                self.documents
                    .remove(&(kind, id.clone()))
                    .ok_or_else(|| Error::Transport(format!("{} {} not found", kind, id)))?;
                Ok(Response::Success(Payload::new()))
            }
            Operation::SubmitForSettlement => {
                let id = Self::target_id(request)?;
                let document = self.stored_mut(kind, &id)?;
                if document.get("status").and_then(Value::as_str) != Some("authorized") {
                    return Ok(Self::status_error(document, request.operation));
                }
                if let Some(amount) = request.payload.get("amount") {
                    document.insert("amount".into(), amount.clone());
                }
                document.insert("status".into(), Value::String("submitted_for_settlement".into()));
                document.insert("updated_at".into(), Value::String(now));
                Ok(Response::Success(document.clone()))
            }
            Operation::Void => {
                let id = Self::target_id(request)?;
                let document = self.stored_mut(kind, &id)?;
                let status = document.get("status").and_then(Value::as_str);
                if !matches!(status, Some("authorized") | Some("submitted_for_settlement")) {
                    return Ok(Self::status_error(document, request.operation));
                }
                document.insert("status".into(), Value::String("voided".into()));
                document.insert("updated_at".into(), Value::String(now));
                Ok(Response::Success(document.clone()))
            }
            Operation::Refund => {
                let id = Self::target_id(request)?;
                let refund_id = Self::generate_id();
                let original = self.stored_mut(kind, &id)?;
                let status = original.get("status").and_then(Value::as_str);
                if !matches!(status, Some("settling") | Some("settled")) {
                    return Ok(Self::status_error(original, request.operation));
                }

                let amount = request
                    .payload
                    .get("amount")
                    .or_else(|| original.get("amount"))
                    .cloned()
                    .unwrap_or(Value::Null);
                match original.get_mut("refund_ids").and_then(Value::as_array_mut) {
                    Some(ids) => ids.push(Value::String(refund_id.clone())),
                    None => {
                        original.insert(
                            "refund_ids".into(),
                            Value::Array(vec![Value::String(refund_id.clone())]),
                        );
                    }
                }

                let mut refund = Payload::new();
                refund.insert("id".into(), Value::String(refund_id.clone()));
                refund.insert("type".into(), Value::String("credit".into()));
                refund.insert("amount".into(), amount);
                refund.insert("status".into(), Value::String("submitted_for_settlement".into()));
                refund.insert("refunded_transaction_id".into(), Value::String(id));
                refund.insert("created_at".into(), Value::String(now.clone()));
                refund.insert("updated_at".into(), Value::String(now));
                self.documents.insert((kind, refund_id), refund.clone());
                Ok(Response::Success(refund))
            }
        }
    }
}

impl Transport for StubTransport {
    fn execute(&mut self, request: Request) -> Result<Response> {
        debug!(
            "Stub gateway: {} {} {:?}",
            request.operation, request.kind, request.id
        );
        self.requests.push(request.clone());

        if let Some(scripted) = self.scripted.pop_front() {
            return scripted;
        }

        let response = self.simulate(&request)?;
        match &response {
            Response::Success(_) => info!("Stub gateway: {} {} succeeded", request.operation, request.kind),
            Response::Invalid(errors) => warn!(
                "Stub gateway: {} {} rejected with {} errors",
                request.operation,
                request.kind,
                errors.len()
            ),
        }
        Ok(response)
    }
}
