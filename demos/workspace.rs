//! A short tour of the store: login, upload, chat, expenses, and a restart
//! that rehydrates the persisted slices.
//!
//! Run with: `RUST_LOG=statefold=debug cargo run --example workspace`

use rust_decimal::Decimal;
use statefold::slices::auth::Login;
use statefold::slices::chat;
use statefold::slices::documents::{DocumentsAction, FileUpload, UploadDocument};
use statefold::slices::expenses::{ExpenseAction, ExpenseDraft};
use statefold::slices::ui::{Theme, UiAction};
use statefold::{Action, FileStorage, Latency, Selectors, StateTree, Store, UpstreamConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let dir = tempfile::tempdir()?;
    let config = UpstreamConfig {
        latency: Latency::uniform(200),
        simulate_failure: false,
    };

    let store = Store::builder()
        .storage(FileStorage::new(dir.path()))
        .persist_defaults()
        .upstream(config)
        .open()?;

    let sub = store.subscribe(|action: &Action, _: &std::sync::Arc<StateTree>| {
        println!("  -> {}", action.name());
    });

    // --- Auth ---
    println!("Logging in...");
    let session = store
        .run(Login::new("user@example.com", "password"))
        .await?
        .join()
        .await??;
    println!("Signed in as {} {}", session.user.name, session.user.avatar);

    // --- Documents ---
    println!("\nUploading a document...");
    let document = store
        .run(UploadDocument::new(FileUpload::new(
            "budget-2024.xlsx",
            48_213,
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        )))
        .await?
        .join()
        .await??;
    store
        .dispatch(DocumentsAction::Select(Some(document.id.clone())))
        .await?;

    // --- Chat ---
    println!("\nAsking the assistant...");
    if let Some(handle) = chat::submit(&store, "What does this spreadsheet cover?").await? {
        let reply = handle.join().await??;
        println!("Assistant: {}", reply.content);
    }

    // --- Expenses ---
    println!("\nTracking expenses...");
    for (description, amount, category) in [
        ("Groceries at Shoprite", 45_000, "Food & Dining"),
        ("Danfo fare", 3_500, "Transportation"),
        ("NEPA bill", 18_000, "Utilities"),
    ] {
        store
            .dispatch(ExpenseAction::add(ExpenseDraft::new(
                description,
                Decimal::from(amount),
                category,
            ))?)
            .await?;
    }
    store.dispatch(UiAction::SetTheme(Theme::Dark)).await?;

    let selectors = Selectors::new();
    let state = store.state();
    println!("Spent:     {}", selectors.total_spent.select(&state));
    println!("Remaining: {}", selectors.remaining_budget.select(&state));
    for (category, amount) in selectors.expenses_by_category.select(&state).iter() {
        println!("  {category:<16} {amount}");
    }

    // --- Restart ---
    drop(sub);
    drop(store);
    println!("\nReopening from {}...", dir.path().display());
    let store = Store::builder()
        .storage(FileStorage::new(dir.path()))
        .persist_defaults()
        .upstream(config)
        .open()?;
    let state = store.state();
    println!(
        "token={:?} theme={:?} expenses={} documents={}",
        state.auth.token,
        state.ui.theme,
        state.expenses.expenses.len(),
        state.documents.documents.len(),
    );

    Ok(())
}
