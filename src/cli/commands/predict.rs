use clap::Args;
use std::path::PathBuf;

use crate::cli::utils::output_record;
use crate::cli::OutputFormat;
use crate::config;
use crate::navigation::{NavigationEdge, NavigationLog};
use crate::prediction::PredictionEngine;

#[derive(Args)]
pub struct PredictArgs {
    #[arg(help = "Path the user is currently on, e.g. /admin/sales/")]
    pub current: String,

    #[arg(long, help = "JSON file holding an array of {from, to} edges")]
    pub log: PathBuf,

    #[arg(long, help = "Override the minimum number of samples")]
    pub min_samples: Option<usize>,

    #[arg(long, help = "Override the confidence threshold (0.0 - 1.0)")]
    pub threshold: Option<f64>,
}

pub async fn handle(args: PredictArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(&args.log).await?;
    let edges: Vec<NavigationEdge> = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("Invalid navigation log {}: {}", args.log.display(), e))?;
    let log: NavigationLog = edges.into_iter().collect();

    let mut settings = config::config().prediction.clone();
    if let Some(min_samples) = args.min_samples {
        settings.min_samples = min_samples;
    }
    if let Some(threshold) = args.threshold {
        settings.threshold = threshold;
    }
    let engine = PredictionEngine::from_config(&settings);
    let result = engine.predict(&log, &args.current);
    let samples = log.outgoing(&args.current).count();

    output_record(
        &output_format,
        &serde_json::json!({
            "current": args.current,
            "samples": samples,
            "target": result.target,
            "confidence": result.confidence,
        }),
    )
}
