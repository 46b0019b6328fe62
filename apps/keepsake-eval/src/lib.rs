use std::{
	collections::{BTreeSet, HashMap},
	fs,
	path::{Path, PathBuf},
	time::Instant,
};

use clap::Parser;
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use keepsake_config::{Config, Identity};
use keepsake_domain::query;

const EMBED_BATCH_SIZE: usize = 64;

#[derive(Debug, Parser)]
#[command(
	version = keepsake_cli::VERSION,
	rename_all = "kebab",
	styles = keepsake_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[arg(long, short = 'd', value_name = "FILE")]
	pub dataset: PathBuf,
	/// Overrides `memory.dup_distance_threshold` for the headline numbers.
	#[arg(long, value_name = "DISTANCE")]
	pub threshold: Option<f32>,
	#[arg(long, value_name = "DISTANCE", default_value_t = 0.05)]
	pub sweep_step: f32,
	#[arg(long, value_name = "DISTANCE", default_value_t = 0.6)]
	pub sweep_max: f32,
}

#[derive(Debug, Deserialize)]
struct EvalDataset {
	name: Option<String>,
	#[serde(default)]
	duplicate_pairs: Vec<DuplicatePair>,
	#[serde(default)]
	identity_queries: Vec<IdentityCase>,
}

/// Two summaries labeled by whether the second should be rejected as a restatement of the first.
#[derive(Debug, Deserialize)]
struct DuplicatePair {
	id: Option<String>,
	a: String,
	b: String,
	duplicate: bool,
}

#[derive(Debug, Deserialize)]
struct IdentityCase {
	query: String,
	identity: bool,
	#[serde(default)]
	asks_name: bool,
}

#[derive(Debug, Serialize)]
struct EvalOutput {
	dataset: DatasetInfo,
	duplicates: Option<DuplicateReport>,
	identity: Option<IdentityReport>,
}

#[derive(Debug, Serialize)]
struct DatasetInfo {
	name: Option<String>,
	duplicate_pairs: usize,
	identity_queries: usize,
}

#[derive(Debug, Serialize)]
struct DuplicateReport {
	embedding_model: String,
	embedding_latency_ms: f64,
	at_threshold: ThresholdScore,
	best: ThresholdScore,
	sweep: Vec<ThresholdScore>,
	pairs: Vec<PairReport>,
}

#[derive(Debug, Serialize)]
struct PairReport {
	id: String,
	duplicate: bool,
	distance: f64,
	predicted_duplicate: bool,
}

#[derive(Clone, Debug, Serialize)]
struct ThresholdScore {
	threshold: f64,
	true_positives: usize,
	false_positives: usize,
	true_negatives: usize,
	false_negatives: usize,
	precision: f64,
	recall: f64,
	f1: f64,
}

#[derive(Debug, Serialize)]
struct IdentityReport {
	identity_accuracy: f64,
	name_accuracy: f64,
	misses: Vec<IdentityMiss>,
}

#[derive(Debug, Serialize)]
struct IdentityMiss {
	query: String,
	expected_identity: bool,
	predicted_identity: bool,
	expected_asks_name: bool,
	predicted_asks_name: bool,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = keepsake_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).init();

	if args.sweep_step <= 0.0 || args.sweep_max <= 0.0 {
		return Err(eyre::eyre!("--sweep-step and --sweep-max must be greater than zero."));
	}

	let dataset = load_dataset(args.dataset.as_path())?;
	let threshold = f64::from(args.threshold.unwrap_or(config.memory.dup_distance_threshold));
	let duplicates = if dataset.duplicate_pairs.is_empty() {
		None
	} else {
		Some(eval_duplicates(&config, &dataset.duplicate_pairs, threshold, &args).await?)
	};
	let identity = if dataset.identity_queries.is_empty() {
		None
	} else {
		Some(eval_identity(&config.memory.identity, &dataset.identity_queries))
	};
	let output = EvalOutput {
		dataset: DatasetInfo {
			name: dataset.name,
			duplicate_pairs: dataset.duplicate_pairs.len(),
			identity_queries: dataset.identity_queries.len(),
		},
		duplicates,
		identity,
	};
	let json = serde_json::to_string_pretty(&output)?;

	println!("{json}");

	Ok(())
}

fn load_dataset(path: &Path) -> color_eyre::Result<EvalDataset> {
	let raw = fs::read_to_string(path)?;
	let dataset: EvalDataset = serde_json::from_str(&raw)?;

	if dataset.duplicate_pairs.is_empty() && dataset.identity_queries.is_empty() {
		return Err(eyre::eyre!(
			"Dataset must include at least one duplicate pair or identity query."
		));
	}

	Ok(dataset)
}

async fn eval_duplicates(
	config: &Config,
	pairs: &[DuplicatePair],
	threshold: f64,
	args: &Args,
) -> color_eyre::Result<DuplicateReport> {
	let texts: Vec<String> = pairs
		.iter()
		.flat_map(|pair| [pair.a.trim().to_string(), pair.b.trim().to_string()])
		.collect::<BTreeSet<_>>()
		.into_iter()
		.collect();
	let started = Instant::now();
	let vectors = embed_all(config, &texts).await?;
	let embedding_latency_ms = started.elapsed().as_secs_f64() * 1_000.0;
	let by_text: HashMap<&str, &[f32]> =
		texts.iter().map(String::as_str).zip(vectors.iter().map(Vec::as_slice)).collect();
	let mut scored = Vec::with_capacity(pairs.len());

	for (idx, pair) in pairs.iter().enumerate() {
		let (Some(a), Some(b)) = (by_text.get(pair.a.trim()), by_text.get(pair.b.trim())) else {
			return Err(eyre::eyre!("Missing embedding for pair {idx}."));
		};

		scored.push((pair, l2_distance(a, b)));
	}

	let labeled: Vec<(bool, f64)> =
		scored.iter().map(|(pair, distance)| (pair.duplicate, *distance)).collect();
	let at_threshold = score_at(&labeled, threshold);
	let sweep: Vec<ThresholdScore> = sweep_thresholds(args.sweep_step, args.sweep_max)
		.into_iter()
		.map(|candidate| score_at(&labeled, candidate))
		.collect();
	let best = best_by_f1(&sweep).unwrap_or_else(|| at_threshold.clone());
	let pairs = scored
		.into_iter()
		.enumerate()
		.map(|(idx, (pair, distance))| PairReport {
			id: pair.id.clone().unwrap_or_else(|| format!("pair-{idx}")),
			duplicate: pair.duplicate,
			distance,
			predicted_duplicate: distance < threshold,
		})
		.collect();

	Ok(DuplicateReport {
		embedding_model: config.providers.embedding.model.clone(),
		embedding_latency_ms,
		at_threshold,
		best,
		sweep,
		pairs,
	})
}

async fn embed_all(config: &Config, texts: &[String]) -> color_eyre::Result<Vec<Vec<f32>>> {
	let cfg = &config.providers.embedding;
	let mut vectors = Vec::with_capacity(texts.len());

	for batch in texts.chunks(EMBED_BATCH_SIZE) {
		vectors.extend(keepsake_providers::embedding::embed(cfg, batch).await?);
	}

	tracing::info!(count = vectors.len(), "Embedded evaluation texts.");

	Ok(vectors)
}

fn eval_identity(identity: &Identity, cases: &[IdentityCase]) -> IdentityReport {
	let mut identity_hits = 0;
	let mut name_hits = 0;
	let mut misses = Vec::new();

	for case in cases {
		let predicted_identity = query::is_identity_query(&case.query, identity);
		let predicted_asks_name = query::asks_for_name(&case.query, identity);

		if predicted_identity == case.identity {
			identity_hits += 1;
		}
		if predicted_asks_name == case.asks_name {
			name_hits += 1;
		}
		if predicted_identity != case.identity || predicted_asks_name != case.asks_name {
			misses.push(IdentityMiss {
				query: case.query.clone(),
				expected_identity: case.identity,
				predicted_identity,
				expected_asks_name: case.asks_name,
				predicted_asks_name,
			});
		}
	}

	IdentityReport {
		identity_accuracy: ratio(identity_hits, cases.len()),
		name_accuracy: ratio(name_hits, cases.len()),
		misses,
	}
}

fn l2_distance(a: &[f32], b: &[f32]) -> f64 {
	a.iter()
		.zip(b)
		.map(|(x, y)| {
			let diff = f64::from(*x) - f64::from(*y);

			diff * diff
		})
		.sum::<f64>()
		.sqrt()
}

/// A pair is predicted duplicate when its distance is strictly below `threshold`.
fn score_at(labeled: &[(bool, f64)], threshold: f64) -> ThresholdScore {
	let mut tp = 0;
	let mut fp = 0;
	let mut tn = 0;
	let mut fn_ = 0;

	for (duplicate, distance) in labeled {
		match (*duplicate, *distance < threshold) {
			(true, true) => tp += 1,
			(false, true) => fp += 1,
			(false, false) => tn += 1,
			(true, false) => fn_ += 1,
		}
	}

	let precision = ratio(tp, tp + fp);
	let recall = ratio(tp, tp + fn_);
	let f1 = if precision + recall > 0.0 {
		2.0 * precision * recall / (precision + recall)
	} else {
		0.0
	};

	ThresholdScore {
		threshold,
		true_positives: tp,
		false_positives: fp,
		true_negatives: tn,
		false_negatives: fn_,
		precision,
		recall,
		f1,
	}
}

fn sweep_thresholds(step: f32, max: f32) -> Vec<f64> {
	let step = f64::from(step);
	let max = f64::from(max);
	let steps = (max / step + 1e-6).floor() as usize;

	(1..=steps).map(|idx| round_to(step * idx as f64, 4)).collect()
}

/// Highest F1 wins. Ties keep the lower threshold.
fn best_by_f1(scores: &[ThresholdScore]) -> Option<ThresholdScore> {
	scores
		.iter()
		.fold(None::<&ThresholdScore>, |best, score| match best {
			Some(current) if current.f1 >= score.f1 => Some(current),
			_ => Some(score),
		})
		.cloned()
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
	if denominator == 0 { 0.0 } else { numerator as f64 / denominator as f64 }
}

fn round_to(value: f64, places: i32) -> f64 {
	let factor = 10_f64.powi(places);

	(value * factor).round() / factor
}
