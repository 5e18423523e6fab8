//! Gateway façade
//!
//! Orders every call the same way: supported-operation check, lifecycle
//! check, local validation, request building, transport, then either
//! loading the returned document or propagating the returned errors.

use crate::model::Model;
use crate::plan::Plan;
use crate::rules;
use crate::transaction::Transaction;
use record_core::{
    remote_error_set, Action, Config, Entity, Error, Operation, Payload, Persist, Request,
    Response, Result, Schema, Transport,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Turn validation failures into `false`, keeping every other error
fn soften(result: Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_validation() => Ok(false),
        Err(e) => Err(e),
    }
}

fn amount_payload(amount: Option<Decimal>) -> Payload {
    let mut payload = Payload::new();
    if let Some(amount) = amount {
        payload.insert("amount".into(), Value::String(amount.to_string()));
    }
    payload
}

/// Entry point for loading and persisting gateway records
#[derive(Debug)]
pub struct Gateway<T> {
    config: Config,
    schema: Schema,
    transport: T,
}

impl<T: Transport> Gateway<T> {
    /// Create a gateway, building the rule tables from configuration
    pub fn new(config: Config, transport: T) -> Result<Self> {
        config.validate()?;
        let schema = rules::schema(&config.validation)?;

        info!(
            "Gateway ready: environment {} merchant {}",
            config.gateway.environment, config.gateway.merchant_id
        );

        Ok(Self {
            config,
            schema,
            transport,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Rule set built from the validation config
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the gateway, returning its transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Run the rule set for a model without persisting it
    pub fn validate<M: Model>(&self, model: &mut M) -> bool {
        model.is_valid(&self.schema)
    }

    /// Send one request on behalf of a model
    ///
    /// Remote field errors are merged into the model before being returned.
    fn dispatch<M: Model>(transport: &mut T, model: &mut M, request: Request) -> Result<Payload> {
        let operation = request.operation;
        match transport.execute(request)? {
            Response::Success(document) => Ok(document),
            Response::Invalid(errors) => {
                let errors = remote_error_set(&errors);
                warn!("{} {} rejected: {}", operation, M::kind(), errors);
                model.add_errors(&errors);
                Err(Error::RemoteValidationFailed(errors))
            }
        }
    }

    fn fetch(&mut self, request: Request) -> Result<Payload> {
        match self.transport.execute(request)? {
            Response::Success(document) => Ok(document),
            Response::Invalid(errors) => Err(Error::RemoteValidationFailed(remote_error_set(&errors))),
        }
    }

    fn ensure_valid<M: Model>(&self, model: &mut M) -> Result<()> {
        if model.is_valid(&self.schema) {
            Ok(())
        } else {
            debug!("{} failed validation: {}", M::kind(), model.errors());
            Err(Error::ValidationFailed(model.errors().clone()))
        }
    }

    /// Load one record by identifier
    pub fn find<M: Model>(&mut self, id: &str) -> Result<M> {
        M::registry().ensure_supported(Operation::Find)?;
        debug!("Finding {} {}", M::kind(), id);

        let request = Request::new(M::kind(), Operation::Find).with_id(id);
        Ok(M::from_document(self.fetch(request)?))
    }

    /// Load every record of a type
    pub fn all<M: Model>(&mut self) -> Result<Vec<M>> {
        M::registry().ensure_supported(Operation::All)?;

        let request = Request::new(M::kind(), Operation::All);
        let document = self.fetch(request)?;
        let items = document
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Transport(format!("Malformed {} listing", M::kind())))?;

        let records: Vec<M> = items
            .iter()
            .filter_map(Value::as_object)
            .map(|item| M::from_document(item.clone()))
            .collect();
        debug!("Loaded {} {} records", records.len(), M::kind());
        Ok(records)
    }

    /// Persist a new record
    pub fn create<M: Model>(&mut self, model: &mut M) -> Result<()> {
        M::registry().ensure_supported(Operation::Create)?;
        if model.is_persisted() {
            return Err(Error::AlreadyPersisted(M::kind()));
        }
        self.ensure_valid(model)?;

        let config = &self.config.gateway;
        let transport = &mut self.transport;
        model.around_persist(|model| {
            let body = model.request_body(Action::Create, config);
            let request = Request::new(M::kind(), Operation::Create).with_payload(body);
            let document = Self::dispatch(transport, model, request)?;
            model.load(document);
            Ok(())
        })?;

        info!("Created {} {}", M::kind(), model.id().unwrap_or("-"));
        Ok(())
    }

    /// [`create`](Self::create), reporting validation failures as `false`
    pub fn attempt_create<M: Model>(&mut self, model: &mut M) -> Result<bool> {
        soften(self.create(model))
    }

    /// Persist changes to an existing record
    pub fn update<M: Model>(&mut self, model: &mut M) -> Result<()> {
        M::registry().ensure_supported(Operation::Update)?;
        let id = model
            .id()
            .filter(|_| model.is_persisted())
            .map(str::to_string)
            .ok_or(Error::NotPersisted(M::kind()))?;
        self.ensure_valid(model)?;

        let config = &self.config.gateway;
        let transport = &mut self.transport;
        model.around_persist(|model| {
            let body = model.request_body(Action::Update, config);
            let request = Request::new(M::kind(), Operation::Update)
                .with_id(id.as_str())
                .with_payload(body);
            let document = Self::dispatch(transport, model, request)?;
            model.load(document);
            Ok(())
        })?;

        info!("Updated {} {}", M::kind(), id);
        Ok(())
    }

    /// [`update`](Self::update), reporting validation failures as `false`
    pub fn attempt_update<M: Model>(&mut self, model: &mut M) -> Result<bool> {
        soften(self.update(model))
    }

    /// Create when new, update when persisted
    pub fn save<M: Model>(&mut self, model: &mut M) -> Result<()> {
        if model.is_persisted() {
            self.update(model)
        } else {
            self.create(model)
        }
    }

    /// [`save`](Self::save), reporting validation failures as `false`
    pub fn attempt_save<M: Model>(&mut self, model: &mut M) -> Result<bool> {
        soften(self.save(model))
    }

    /// Remove a record; it is new again afterwards
    pub fn destroy<M: Model>(&mut self, model: &mut M) -> Result<()> {
        M::registry().ensure_supported(Operation::Delete)?;
        let id = model
            .id()
            .filter(|_| model.is_persisted())
            .map(str::to_string)
            .ok_or(Error::NotPersisted(M::kind()))?;

        let request = Request::new(M::kind(), Operation::Delete).with_id(id.as_str());
        Self::dispatch(&mut self.transport, model, request)?;
        model.record_mut().set_persisted(false);

        info!("Deleted {} {}", M::kind(), id);
        Ok(())
    }

    /// [`destroy`](Self::destroy), reporting validation failures as `false`
    pub fn attempt_destroy<M: Model>(&mut self, model: &mut M) -> Result<bool> {
        soften(self.destroy(model))
    }

    /// Shared path of the settlement operations
    fn transition(
        &mut self,
        transaction: &mut Transaction,
        operation: Operation,
        amount: Option<Decimal>,
    ) -> Result<Payload> {
        Transaction::registry().ensure_supported(operation)?;
        let id = transaction
            .id()
            .filter(|_| transaction.is_persisted())
            .map(str::to_string)
            .ok_or(Error::NotPersisted(Transaction::kind()))?;
        transaction.check_transition(operation, amount)?;

        let request = Request::new(Transaction::kind(), operation)
            .with_id(id.as_str())
            .with_payload(amount_payload(amount));
        let document = Self::dispatch(&mut self.transport, transaction, request)?;

        info!("{} on transaction {} succeeded", operation, id);
        Ok(document)
    }

    /// Capture an authorized transaction, optionally for less than authorized
    pub fn submit_for_settlement(
        &mut self,
        transaction: &mut Transaction,
        amount: Option<Decimal>,
    ) -> Result<()> {
        let document = self.transition(transaction, Operation::SubmitForSettlement, amount)?;
        transaction.load(document);
        Ok(())
    }

    /// [`submit_for_settlement`](Self::submit_for_settlement), reporting validation failures as `false`
    pub fn attempt_submit_for_settlement(
        &mut self,
        transaction: &mut Transaction,
        amount: Option<Decimal>,
    ) -> Result<bool> {
        soften(self.submit_for_settlement(transaction, amount))
    }

    /// Cancel a transaction that has not settled
    pub fn void(&mut self, transaction: &mut Transaction) -> Result<()> {
        let document = self.transition(transaction, Operation::Void, None)?;
        transaction.load(document);
        Ok(())
    }

    /// [`void`](Self::void), reporting validation failures as `false`
    pub fn attempt_void(&mut self, transaction: &mut Transaction) -> Result<bool> {
        soften(self.void(transaction))
    }

    /// Return funds of a settled transaction
    ///
    /// Returns the refund transaction and records its id on the original.
    pub fn refund(
        &mut self,
        transaction: &mut Transaction,
        amount: Option<Decimal>,
    ) -> Result<Transaction> {
        let document = self.transition(transaction, Operation::Refund, amount)?;
        let refund = Transaction::from_document(document);
        if let Some(refund_id) = refund.id() {
            transaction.record_refund(refund_id);
        }
        Ok(refund)
    }

    /// [`refund`](Self::refund); `None` when the refund was rejected
    pub fn attempt_refund(
        &mut self,
        transaction: &mut Transaction,
        amount: Option<Decimal>,
    ) -> Result<Option<Transaction>> {
        match self.refund(transaction, amount) {
            Ok(refund) => Ok(Some(refund)),
            Err(e) if e.is_validation() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Plan a transaction was billed under, loaded once through `find`
    pub fn plan<'a>(&mut self, transaction: &'a mut Transaction) -> Result<Option<&'a Plan>> {
        let plan = transaction.resolve_plan(|id| self.find::<Plan>(id))?;
        Ok(plan.map(|plan| &*plan))
    }
}

impl<T: Transport, M: Model> Persist<M> for Gateway<T> {
    fn save(&mut self, model: &mut M) -> Result<bool> {
        self.attempt_save(model)
    }
}
