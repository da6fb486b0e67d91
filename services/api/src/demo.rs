use crate::infra::build_engine;
use chrono::{Duration, Utc};
use clap::Args;
use fiscal_host::contributions::guest::DEFAULT_LOCATION_THRESHOLD;
use fiscal_host::contributions::{EmailAddress, GuestInfoInput, LocationInput};
use fiscal_host::domain::{
    Collective, CollectiveId, CollectiveKind, Expense, ExpenseId, ExpenseStatus, PayoutMethod,
    PayoutMethodId, PayoutMethodType, User, UserId,
};
use fiscal_host::error::AppError;
use fiscal_host::fixtures;
use fiscal_host::loader::LoaderOptions;
use fiscal_host::loaders::PayoutMethodLoaders;
use fiscal_host::security::{highest_level, SecurityCheck};
use fiscal_host::storage::InMemoryStore;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct CheckArgs {
    /// Expense history CSV to evaluate against
    #[arg(long)]
    pub(crate) fixtures: PathBuf,
    /// Identifier of the expense to check
    #[arg(long)]
    pub(crate) expense_id: i64,
    /// Print the report as JSON instead of a table
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Split loader fetches into batches of at most this many collectives
    #[arg(long)]
    pub(crate) max_batch_size: Option<usize>,
}

const DEMO_HOST: CollectiveId = CollectiveId(5);
const DEMO_COLLECTIVE: CollectiveId = CollectiveId(10);
const DEMO_PROFILE: CollectiveId = CollectiveId(100);
const DEMO_ORGANIZATION: CollectiveId = CollectiveId(300);
pub(crate) const DEMO_EXPENSE: ExpenseId = ExpenseId(100);

/// A user with four paid expenses, two spam submissions and a new, larger claim.
pub(crate) fn seed_demo_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    let collective = |id: CollectiveId,
                      kind: CollectiveKind,
                      slug: &str,
                      host: Option<CollectiveId>| Collective {
        id,
        slug: slug.to_string(),
        name: slug.replace('-', " "),
        kind,
        parent_collective_id: None,
        host_collective_id: host,
    };
    store.insert_collective(collective(
        DEMO_HOST,
        CollectiveKind::Organization,
        "open-source-host",
        None,
    ));
    store.insert_collective(collective(
        DEMO_COLLECTIVE,
        CollectiveKind::Collective,
        "webpack",
        Some(DEMO_HOST),
    ));
    store.insert_collective(collective(DEMO_PROFILE, CollectiveKind::User, "sam", None));
    store.insert_collective(collective(
        DEMO_ORGANIZATION,
        CollectiveKind::Organization,
        "design-studio",
        None,
    ));
    store.insert_user(User {
        id: UserId(1),
        collective_id: DEMO_PROFILE,
        two_factor_enabled: false,
    });

    let start = Utc::now() - Duration::weeks(12);
    let history = [
        (1, ExpenseStatus::Paid, 1000_00),
        (2, ExpenseStatus::Paid, 1000_00),
        (3, ExpenseStatus::Paid, 1000_00),
        (4, ExpenseStatus::Paid, 1000_00),
        (5, ExpenseStatus::Spam, 45_00),
        (6, ExpenseStatus::Spam, 72_00),
        (DEMO_EXPENSE.0, ExpenseStatus::Pending, 2000_00),
    ];
    for (offset, (id, status, amount)) in history.into_iter().enumerate() {
        let created_at = start + Duration::weeks(offset as i64);
        store.insert_expense(Expense {
            id: ExpenseId(id),
            user_id: UserId(1),
            from_collective_id: DEMO_PROFILE,
            collective_id: DEMO_COLLECTIVE,
            host_collective_id: Some(DEMO_HOST),
            payout_method_id: None,
            amount,
            currency: "USD".to_string(),
            status,
            description: format!("Conference travel #{id}"),
            created_at,
            updated_at: created_at,
        });
    }

    let methods = [
        (1, DEMO_PROFILE, PayoutMethodType::Paypal, true),
        (2, DEMO_PROFILE, PayoutMethodType::BankAccount, true),
        (3, DEMO_ORGANIZATION, PayoutMethodType::Paypal, true),
        (4, DEMO_ORGANIZATION, PayoutMethodType::Paypal, false),
        (5, DEMO_ORGANIZATION, PayoutMethodType::Other, true),
    ];
    for (id, collective_id, kind, is_saved) in methods {
        store.insert_payout_method(PayoutMethod {
            id: PayoutMethodId(id),
            collective_id,
            kind,
            name: Some(format!("{} #{id}", kind.label().to_ascii_lowercase())),
            data: json!({ "currency": "USD" }),
            is_saved,
            created_at: start,
        });
    }

    store
}

pub(crate) async fn run_check(args: CheckArgs) -> Result<(), AppError> {
    let store = InMemoryStore::new();
    fixtures::import_file(&args.fixtures, &store)?;
    let engine = build_engine(Arc::new(store));

    let expense_id = ExpenseId(args.expense_id);
    let checks = engine.evaluate_by_id(expense_id).await?;

    if args.json {
        let report = json!({
            "expense_id": expense_id,
            "highest_level": highest_level(&checks),
            "checks": checks,
        });
        match serde_json::to_string_pretty(&report) {
            Ok(rendered) => println!("{rendered}"),
            Err(err) => println!("Report unavailable: {err}"),
        }
    } else {
        println!("Security checks for expense #{expense_id}");
        render_checks(&checks);
    }
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = Arc::new(seed_demo_store());
    let engine = build_engine(store.clone());

    println!("Fiscal host demo");
    println!("Expense #{DEMO_EXPENSE}: $2,000.00 submitted to webpack by a user with 4 paid and 2 spam expenses");
    let checks = engine.evaluate_by_id(DEMO_EXPENSE).await?;
    render_checks(&checks);

    let options = LoaderOptions {
        max_batch_size: args.max_batch_size,
        ..LoaderOptions::default()
    };
    let loaders = PayoutMethodLoaders::new(store, options);
    let collectives = [DEMO_PROFILE, DEMO_ORGANIZATION, DEMO_COLLECTIVE];
    let (paypal, all) = tokio::join!(
        loaders.paypal_by_collective.load_many(&collectives),
        loaders.by_collective.load_many(&collectives),
    );
    let (paypal, all) = (paypal?, all?);

    println!("\nSaved payout methods (one batched query per loader)");
    for ((collective_id, paypal), all) in collectives.iter().zip(&paypal).zip(&all) {
        let kinds: Vec<&str> = all.iter().map(|method| method.kind.label()).collect();
        println!(
            "  collective {:<4} paypal: {}  all: [{}]",
            collective_id,
            paypal.len(),
            kinds.join(", ")
        );
    }

    println!("\nGuest contribution of $6,000.00");
    let paris = LocationInput {
        address: Some("12 Rue de la Paix, Paris".to_string()),
        country: Some("FR".to_string()),
        ..LocationInput::default()
    };
    for (label, location) in [("without address", None), ("with address", Some(paris))] {
        let outcome = EmailAddress::parse("alex@example.org").and_then(|email| {
            GuestInfoInput {
                email,
                name: Some("Alex Guest".to_string()),
                token: None,
                location,
            }
            .validate_for_amount(6_000_00, DEFAULT_LOCATION_THRESHOLD)
        });
        match outcome {
            Ok(()) => println!("  {label}: accepted"),
            Err(err) => println!("  {label}: rejected ({err})"),
        }
    }

    Ok(())
}

fn render_checks(checks: &[SecurityCheck]) {
    if checks.is_empty() {
        println!("  No findings");
        return;
    }
    for check in checks {
        println!(
            "  [{:<6}] {:<13} {}",
            check.level.label(),
            check.scope.label(),
            check.message
        );
    }
    if let Some(level) = highest_level(checks) {
        println!("  Highest level: {}", level.label());
    }
}
