//! Screening example
//!
//! Loads the fixture watchlists, screens a handful of subjects, walks one
//! match through review and checks a company against a registry.

use aml_screening_engine::telemetry;
use aml_screening_engine::verification::{CompanyStatus, InMemoryCompanyRegistry};
use aml_screening_engine::{
    CompanyProfile, CompanyVerifier, EngineConfig, InMemoryScreeningRepository, ListKind, ListStore,
    MockListProvider, ReviewStatus, ReviewWorkflow, ScreeningEngine, ScreeningRequest, ScreeningResult,
};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;

fn print_result(result: &ScreeningResult) {
    println!("   Risk: {} ({}/100)", result.risk_level, result.risk_score);
    println!(
        "   Sanctions: {}  PEP: {}  Adverse media: {}",
        result.sanctions_match, result.pep_match, result.adverse_media
    );
    println!("   Status: {:?}", result.status);
    for m in &result.matches {
        println!(
            "   - [{}] {} ({}) score {} (name {}), source {}",
            m.match_type, m.matched_name, m.entity_id, m.match_score, m.name_score, m.source_list
        );
    }
    if !result.metadata.lists_unavailable.is_empty() {
        println!("   Unavailable lists: {:?}", result.metadata.lists_unavailable);
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = EngineConfig::from_env()?;
    telemetry::init(&config.telemetry)?;
    config.vendor_latency_ms = 250;

    println!("=== AML Screening Engine ===\n");

    // 1. Load watchlists
    println!("1. Loading Watchlists");
    let store = Arc::new(ListStore::new(config.list_staleness()));
    let report = store.init(&MockListProvider::new()).await;
    println!("   Loaded: {:?}", report.loaded);
    println!("   Needs refresh: {}", store.needs_refresh());
    println!();

    let engine = ScreeningEngine::new(store.clone(), config.clone());

    // 2. Sanctioned individual
    println!("2. Screening Sanctioned Individual");
    let putin = ScreeningRequest::individual("Vladimir Putin")
        .with_date_of_birth(NaiveDate::from_ymd_opt(1952, 10, 7).ok_or("invalid date")?);
    print_result(&engine.screen(&putin).await?);

    // 3. Partial overlap with a PEP
    println!("3. Screening Near-Miss Against PEP List");
    print_result(&engine.screen(&ScreeningRequest::individual("John Smith")).await?);

    // 4. Clean company
    println!("4. Screening Company");
    let company = ScreeningRequest::company("Harbour View Lettings Ltd", "09876543").with_registration_country("GB");
    print_result(&engine.screen(&company).await?);

    // 5. Batch
    println!("5. Batch Screening");
    let batch = vec![
        ScreeningRequest::individual("Maria Gonzalez Ferreira"),
        ScreeningRequest::company("Northbridge Property Holdings", "11223344"),
        ScreeningRequest::individual("   "),
    ];
    for (request, outcome) in batch.iter().zip(engine.screen_batch(&batch).await) {
        match outcome {
            Ok(result) => println!("   {:?}: {} ({})", request.subject_name, result.risk_level, result.risk_score),
            Err(e) => println!("   {:?}: error: {}", request.subject_name, e),
        }
    }
    println!();

    // 6. Review and monitoring
    println!("6. Reviewing Matches");
    let workflow = ReviewWorkflow::new(InMemoryScreeningRepository::new());
    let (screening_id, result) = workflow
        .screen_and_record(&engine, &ScreeningRequest::individual("Derek Hallworth"))
        .await?;
    if let Some(hit) = result.highest_match() {
        let reviewed = workflow.set_review_status(hit.id, ReviewStatus::FalsePositive)?;
        println!("   {} marked {}", reviewed.matched_name, reviewed.review_status);
    }
    workflow.enable_monitoring(screening_id)?;
    println!("   Cleared: {}", workflow.is_cleared(screening_id)?);

    store.replace_corpus(ListKind::AdverseMedia, Vec::new(), "manual").await;
    for outcome in workflow.rescreen_monitored(&engine).await? {
        println!("   Rescreen {}: {:?}", outcome.screening_id(), outcome);
    }
    println!();

    // 7. Degraded screening
    println!("7. Screening With A Missing List");
    let degraded_store = Arc::new(ListStore::new(config.list_staleness()));
    let refresh = degraded_store
        .refresh(&MockListProvider::new().with_failure(ListKind::Pep))
        .await;
    println!("   Failed lists: {:?}", refresh.failed);
    let degraded = ScreeningEngine::new(degraded_store, config.clone());
    let result = degraded.screen(&ScreeningRequest::individual("Jane Doe")).await?;
    println!("   Verdict: {:?}", result.verdict());
    println!();

    // 8. Company verification
    println!("8. Company Registry Verification");
    let registry = InMemoryCompanyRegistry::new().with_company(CompanyProfile {
        company_number: "11223344".to_string(),
        name: "Northbridge Property Holdings".to_string(),
        status: CompanyStatus::Liquidation,
        incorporated_on: NaiveDate::from_ymd_opt(2019, 1, 15).ok_or("invalid date")?,
        insolvency_history: true,
        registration_country: "GB".to_string(),
    });
    let verifier = CompanyVerifier::new(registry);
    let report = verifier
        .verify(&ScreeningRequest::company("Northbridge Property Holdings", "11223344"))
        .await?;
    for flag in &report.red_flags {
        println!("   [{:?}] {}", flag.severity, flag.description);
    }
    println!();

    // 9. Deadline
    println!("9. Screening With A Short Deadline");
    match engine.screen_with_timeout(&putin, Duration::from_millis(50)).await {
        Ok(result) => println!("   Completed: {}", result.risk_level),
        Err(e) => println!("   Error: {} (retryable: {})", e, e.is_retryable()),
    }

    Ok(())
}
