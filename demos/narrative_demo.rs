//! Compute a short narrative series and print the batch response

use std::collections::BTreeMap;

use narrative_flux::{
    aggregates_to_batch, AuxiliaryIndicators, DailyAggregate, NarrativeConfig, SeriesKey,
};
use narrative_flux::encoder::ResponseEncoder;

fn day(date: &str, positive: u64, negative: u64, neutral: u64, market: u64) -> DailyAggregate {
    DailyAggregate {
        entity_id: "cand-a".to_string(),
        locale: "mx-cdmx".to_string(),
        date: date.parse().unwrap_or_default(),
        positive_count: positive,
        negative_count: negative,
        neutral_count: neutral,
        entity_volume: positive + negative + neutral,
        market_volume: market,
    }
}

fn main() {
    let aggregates = vec![
        day("2024-03-01", 60, 20, 20, 200),
        day("2024-03-02", 70, 20, 10, 200),
        day("2024-03-03", 65, 25, 30, 220),
        day("2024-03-05", 80, 15, 25, 210),
        day("2024-03-06", 90, 10, 20, 240),
    ];

    let mut indicators = BTreeMap::new();
    indicators.insert(
        SeriesKey::new("cand-a", "mx-cdmx"),
        AuxiliaryIndicators {
            sve: Some(0.55),
            sna: Some(0.4),
            cp: Some(0.6),
            nmi: Some(0.2),
        },
    );

    let config = NarrativeConfig::default();
    let report = match aggregates_to_batch(aggregates, &indicators, &config) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {e}");
            return;
        }
    };

    let response = report.to_response(&ResponseEncoder::new(), &config);
    match serde_json::to_string_pretty(&response) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
