// Gateway Console - walks vault and sale records through the stub gateway
// Shows validation, nesting vs references, settlement and refunds end to end

use anyhow::{Context, Result};
use colored::Colorize;
use gateway_records::{CreditCard, Customer, Gateway, Transaction};
use record_core::{Config, Entity, RemoteError, Response, StubTransport};
use rust_decimal_macros::dec;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn step(title: &str) {
    println!("\n{} {}", "▶".cyan(), title.bold());
}

fn ok(message: impl AsRef<str>) {
    println!("  {} {}", "✓".green(), message.as_ref());
}

fn rejected(message: impl AsRef<str>) {
    println!("  {} {}", "✗".red(), message.as_ref());
}

fn last_body(gateway: &Gateway<StubTransport>) -> String {
    gateway
        .transport()
        .last_request()
        .map(|request| serde_json::Value::Object(request.payload.clone()).to_string())
        .unwrap_or_default()
}

fn card_details() -> serde_json::Value {
    json!({
        "number": "4111111111111111",
        "cvv": "123",
        "cardholder_name": "Brain Tree",
        "expiration_date": "05/2037",
        "billing_address": {
            "street_address": "1 E Main St",
            "locality": "Chicago",
            "region": "Illinois",
            "postal_code": "60622"
        }
    })
}

fn run(gateway: &mut Gateway<StubTransport>) -> Result<()> {
    step("Local validation stops bad input before the gateway");
    let mut invalid = CreditCard::from_source(&json!({"number": "4111", "cvv": "1"}));
    if !gateway.attempt_create(&mut invalid)? {
        for message in invalid.errors().full_messages() {
            rejected(message);
        }
    }
    ok(format!("requests sent: {}", gateway.transport().requests().len()));

    step("Customer created together with a card");
    let mut customer = Customer::from_source(&json!({
        "first_name": "Brain",
        "last_name": "Tree",
        "email": "brain@example.com",
        "credit_card": card_details()
    }));
    gateway.create(&mut customer)?;
    let customer_id = customer.id().context("customer has no id")?.to_string();
    ok(format!("customer {} ({})", customer_id, customer.full_name()));
    ok(format!("body: {}", last_body(gateway)));

    step("Second card built through the customer's collection");
    let card = customer
        .credit_cards()
        .create(gateway, &card_details())?;
    ok(format!(
        "card {} for customer {}",
        card.token().unwrap_or("-"),
        card.customer_id().unwrap_or("-")
    ));
    ok(format!("collection size: {}", customer.credit_cards().len()));

    step("Gateway-side rejection is merged into the model");
    gateway.transport_mut().push_response(Response::Invalid(vec![RemoteError::new(
        "number",
        "Credit card number is not an accepted test number.",
    )
    .with_code("81717")]));
    let failed = customer.credit_cards().create(gateway, &card_details())?;
    for message in failed.errors().full_messages() {
        rejected(message);
    }
    ok(format!("collection size: {}", customer.credit_cards().len()));

    step("Sale referencing the vaulted card");
    let mut sale = Transaction::from_source(&json!({"amount": "25.00"}));
    sale.set_customer(Some(customer.clone()));
    sale.set_credit_card(Some(card));
    gateway.create(&mut sale)?;
    ok(format!("sale {} is {}", sale.id().unwrap_or("-"), sale.status()));
    ok(format!("body: {}", last_body(gateway)));

    step("Settlement for less than authorized, then refund");
    gateway.submit_for_settlement(&mut sale, Some(dec!(20.00)))?;
    ok(format!("sale is {} for {}", sale.status(), sale.amount().unwrap_or_default()));

    // the stub has no batch run, so settle it by reloading a settled copy
    let id = sale.id().context("sale has no id")?.to_string();
    let mut settled = sale.attributes();
    settled.insert("status".into(), json!("settled"));
    gateway
        .transport_mut()
        .seed(record_core::EntityKind::Transaction, settled)?;
    let mut sale: Transaction = gateway.find(&id)?;

    match gateway.attempt_refund(&mut sale, Some(dec!(5.00)))? {
        Some(refund) => ok(format!(
            "refund {} of {} against {}",
            refund.id().unwrap_or("-"),
            refund.amount().unwrap_or_default(),
            refund.refunded_transaction_id().unwrap_or("-")
        )),
        None => rejected(sale.errors().to_string()),
    }

    step("Void is refused once settled");
    if !gateway.attempt_void(&mut sale)? {
        for message in sale.errors().full_messages() {
            rejected(message);
        }
    }

    step("Sale with new instruments nested inline");
    let mut walk_in = Transaction::from_source(&json!({
        "amount": "9.99",
        "customer": {"first_name": "Walk", "last_name": "In"},
        "credit_card": card_details()
    }));
    gateway.create(&mut walk_in)?;
    ok(format!("body: {}", last_body(gateway)));
    let card_number_kept = walk_in
        .credit_card()
        .is_some_and(|card| card.get("number").is_some());
    ok(format!("card number kept after persist: {}", card_number_kept));

    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config = Config::from_env().context("loading configuration from environment")?;
    info!(
        "Starting {} v{} against {}",
        config.service_name, config.service_version, config.gateway.environment
    );

    println!("{}", "Gateway Records console".bold().underline());
    println!("environment: {}", config.gateway.environment);

    let mut gateway = Gateway::new(config, StubTransport::new())?;
    run(&mut gateway)?;

    println!(
        "\n{} {} requests sent",
        "done:".green().bold(),
        gateway.transport().requests().len()
    );
    Ok(())
}
