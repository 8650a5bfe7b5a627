use std::path::PathBuf;

use anyhow::{Context, Result};
use candle_core::Device;
use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kv_cache_bench::{
    download_model, load_config, load_safetensors, load_tokenizer, BenchConfig, CausalLmInterface,
    GenerationEngine, GenerationResult, Qwen3ForCausalLM, Strategy, TelemetryComparison,
    TracingObserver,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum StrategyArg {
    Both,
    Stateless,
    Cached,
}

impl StrategyArg {
    fn strategies(self) -> &'static [Strategy] {
        match self {
            StrategyArg::Both => &Strategy::ALL,
            StrategyArg::Stateless => &[Strategy::Stateless],
            StrategyArg::Cached => &[Strategy::Cached],
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "kv-cache-bench")]
#[command(about = "Compare full-recompute and KV-cached greedy decoding")]
struct Args {
    /// JSON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HuggingFace model ID
    #[arg(short, long)]
    model: Option<String>,

    /// Model revision
    #[arg(long)]
    revision: Option<String>,

    /// Input prompt
    #[arg(short, long)]
    prompt: Option<String>,

    /// Tokens to generate per strategy
    #[arg(long)]
    max_new_tokens: Option<usize>,

    /// Which strategies to run
    #[arg(long, value_enum, default_value_t = StrategyArg::Both)]
    strategy: StrategyArg,

    /// Run on CPU even if CUDA is available
    #[arg(long)]
    cpu: bool,

    /// Write both traces as JSON to this path
    #[arg(long)]
    report_json: Option<PathBuf>,
}

impl Args {
    fn resolve_config(&self) -> Result<BenchConfig> {
        let mut config = match &self.config {
            Some(path) => BenchConfig::from_file(path)?,
            None => BenchConfig::default(),
        };
        if let Some(model) = &self.model {
            config.model.model_id = model.clone();
        }
        if let Some(revision) = &self.revision {
            config.model.revision = revision.clone();
        }
        if let Some(prompt) = &self.prompt {
            config.prompt = prompt.clone();
        }
        if let Some(n) = self.max_new_tokens {
            config.max_new_tokens = n;
        }
        config.force_cpu |= self.cpu;
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = args.resolve_config()?;

    let device = if config.force_cpu {
        Device::Cpu
    } else {
        Device::cuda_if_available(0)?
    };
    info!(
        model = %config.model.model_id,
        device = ?device,
        max_new_tokens = config.max_new_tokens,
        "kv-cache-bench v{}",
        env!("CARGO_PKG_VERSION")
    );

    let files = download_model(&config.model)?;
    let model_config = load_config(&files.config)?;
    let vb = load_safetensors(&files.weights, config.precision.dtype(), &device)?;
    let model = Qwen3ForCausalLM::new(&model_config, vb).context("failed to build model")?;
    let tokenizer = load_tokenizer(&files.tokenizer)?;

    let mut engine = GenerationEngine::new(CausalLmInterface::new(model, tokenizer));

    let mut stateless: Option<GenerationResult> = None;
    let mut cached: Option<GenerationResult> = None;
    for &strategy in args.strategy.strategies() {
        let result = engine
            .generate_with_observer(
                &config.prompt,
                config.max_new_tokens,
                strategy,
                &mut TracingObserver,
            )
            .with_context(|| format!("{strategy} generation failed"))?;
        println!("[{strategy}] {}", result.text);
        match strategy {
            Strategy::Stateless => stateless = Some(result),
            Strategy::Cached => cached = Some(result),
        }
    }

    if let (Some(stateless), Some(cached)) = (stateless, cached) {
        if stateless.text != cached.text {
            warn!("strategies produced different text");
        }
        let comparison = TelemetryComparison::new(cached.trace, stateless.trace)?;
        println!("\n{}", comparison.render());

        if let Some(path) = &args.report_json {
            comparison.write_json(path)?;
            info!(path = %path.display(), "wrote report");
        }
    } else if args.report_json.is_some() {
        warn!("--report-json needs both strategies; skipping");
    }

    Ok(())
}
