use anyhow::Context;
use cashflow_consumer::config::AppConfig;
use cashflow_consumer::enrich::{Enricher, PassThrough, ReferenceData, ReferenceDataEnricher};
use cashflow_consumer::logging::init_logging;
use cashflow_consumer::{CashflowService, InboundEvent, ProcessOutcome, SledCashflowStore};
use std::io::BufRead;
use tracing::{error, info, warn};

fn main() -> anyhow::Result<()> {
    let config_dir = std::env::var("CFC_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    let config = AppConfig::load_from(&config_dir)
        .with_context(|| format!("Failed to load config from {config_dir}"))?;
    init_logging(&config.logging)?;

    let store = SledCashflowStore::open(&config.store.path)
        .with_context(|| format!("Failed to open store at {}", config.store.path.display()))?;

    let enricher: Box<dyn Enricher> = match &config.enrichment.reference_data {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read reference data {}", path.display()))?;
            Box::new(ReferenceDataEnricher::new(
                ReferenceData::from_json(&json)?,
                config.suppression.clone(),
            ))
        }
        None => {
            warn!("No reference data configured, cashflows will not be enriched");
            Box::new(PassThrough)
        }
    };

    let service = CashflowService::new(
        store.clone(),
        enricher,
        config.versioning.max_conflict_retries,
    );
    info!("Reading cashflow events from stdin");

    for (line_no, line) in std::io::stdin().lock().lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: InboundEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                error!("Line {}: undecodable event: {}", line_no + 1, e);
                continue;
            }
        };

        match service.process(&event)? {
            ProcessOutcome::Processed { outcome, records } => {
                for cf in &records {
                    info!(
                        "Stored Cashflow[{}-{}] {:?} amount {} {}",
                        cf.cashflow_id, cf.cashflow_version, cf.revision_type, cf.amount.0, cf.curr_code
                    );
                }
                info!("foCfID: {} processed as {}", event.fo_cashflow_id, outcome_name(&outcome));
            }
            ProcessOutcome::Duplicate => info!(
                "foCfID: {}, foCfVer: {} already processed",
                event.fo_cashflow_id, event.fo_cashflow_version
            ),
            ProcessOutcome::Rejected(rejection) => warn!(
                "foCfID: {} rejected as {} ({})",
                event.fo_cashflow_id,
                rejection.sub_category.code(),
                rejection.rejection_id
            ),
        }
    }

    store.flush()?;
    Ok(())
}

fn outcome_name(outcome: &cashflow_consumer::CfProcessedCheckOutcome) -> &'static str {
    use cashflow_consumer::CfProcessedCheckOutcome::*;
    match outcome {
        FirstVersion => "first version",
        NonFirstVersion { .. } => "non-first version",
        AlreadyProcessed => "already processed",
        LastCashflowIsCancelled { .. } => "cancelled",
    }
}
