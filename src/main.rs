// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use std::env;

use prompt_sentinel::{AnalysisEngine, AnalyzeRequest, Settings, SimilarityMetric};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let mut args = env::args().skip(1);
    let (user_id, prompt1, prompt2) = match (args.next(), args.next(), args.next()) {
        (Some(user_id), Some(prompt1), Some(prompt2)) => (user_id, prompt1, prompt2),
        _ => {
            eprintln!("usage: prompt-sentinel <user_id> <prompt1> <prompt2> [metric] [threshold]");
            std::process::exit(2);
        }
    };
    let metric = args
        .next()
        .map(|raw| raw.parse::<SimilarityMetric>())
        .transpose()
        .context("invalid metric")?;
    let threshold = args
        .next()
        .map(|raw| raw.parse::<f64>())
        .transpose()
        .context("invalid threshold")?;

    let settings = Settings::from_env();
    let engine = AnalysisEngine::from_settings(settings)?;

    let result = engine
        .analyze(AnalyzeRequest {
            user_id,
            prompt1,
            prompt2,
            metric,
            threshold,
        })
        .await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
