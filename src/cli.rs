//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::csv_adapter::{read_bars, CsvAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::static_range_adapter::StaticRangeAdapter;
use crate::domain::backtest::{BacktestOrchestrator, BacktestRequest, SimulationResult};
use crate::domain::compatibility::CompatibilityClassifier;
use crate::domain::condition::Condition;
use crate::domain::condition_parser::{parse_condition_list, parse_variable};
use crate::domain::detector::TriggerPointDetector;
use crate::domain::error::EngineError;
use crate::domain::indicator::IndicatorEngine;
use crate::domain::normalization::NormalizationService;
use crate::domain::ohlcv::PriceSeries;
use crate::domain::settings::{
    load_analysis, load_catalog, load_classifier, load_normalization_method,
    load_reference_stats, load_strategy,
};
use crate::domain::strategy::Strategy;
use crate::domain::trigger::TriggerType;
use crate::domain::variable::{format_params, Parameters, TradingVariable, VariableCatalog};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PriceDataPort;

#[derive(Parser, Debug)]
#[command(name = "triggerlab", about = "Strategy compatibility checks and trigger evaluation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a strategy over price data
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// A CSV file, or a directory of `<SYMBOL>.csv` files
        #[arg(short, long)]
        prices: PathBuf,
        /// Strategy file; defaults to the triggers in --config
        #[arg(short, long)]
        strategy: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Print the bars where all conditions hold
    Detect {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        prices: PathBuf,
        /// `;`-separated conditions, e.g. "rsi < 30; close > sma(period=50)"
        #[arg(long)]
        conditions: String,
    },
    /// Classify variables against each other in order
    Check {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(required = true)]
        variables: Vec<String>,
    },
    /// Build a strategy and report accepted triggers and warnings
    Validate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: Option<PathBuf>,
    },
    /// List the variable catalog
    Variables {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            prices,
            strategy,
            json,
        } => run_backtest(&config, &prices, strategy.as_deref(), json),
        Command::Detect {
            config,
            prices,
            conditions,
        } => run_detect(&config, &prices, &conditions),
        Command::Check { config, variables } => run_check(&config, &variables),
        Command::Validate { config, strategy } => run_validate(&config, strategy.as_deref()),
        Command::Variables { config } => run_variables(&config),
    }
}

fn report(err: &EngineError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

/// Services built from one engine configuration file.
pub struct EngineContext {
    pub catalog: VariableCatalog,
    pub classifier: Arc<CompatibilityClassifier>,
    pub engine: Arc<IndicatorEngine>,
    pub normalizer: Arc<NormalizationService>,
}

impl EngineContext {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, EngineError> {
        let ranges = StaticRangeAdapter::new(load_reference_stats(config)?);
        let method = load_normalization_method(config)?;
        Ok(Self {
            catalog: load_catalog(config)?,
            classifier: Arc::new(load_classifier(config)?),
            engine: Arc::new(IndicatorEngine::with_defaults()),
            normalizer: Arc::new(NormalizationService::new(Arc::new(ranges), method)),
        })
    }

    pub fn load(path: &Path) -> Result<(FileConfigAdapter, Self), EngineError> {
        let config = FileConfigAdapter::from_file(path)?;
        let context = Self::from_config(&config)?;
        Ok((config, context))
    }

    pub fn detector(&self) -> TriggerPointDetector {
        TriggerPointDetector::new(
            self.engine.clone(),
            self.classifier.clone(),
            self.normalizer.clone(),
        )
    }

    pub fn orchestrator(&self) -> BacktestOrchestrator {
        BacktestOrchestrator::new(
            self.engine.clone(),
            self.classifier.clone(),
            self.normalizer.clone(),
        )
    }

    /// The strategy in `strategy_path`, or the one described by `config`.
    pub fn strategy(
        &self,
        config: &dyn ConfigPort,
        strategy_path: Option<&Path>,
    ) -> Result<Strategy, EngineError> {
        match strategy_path {
            Some(path) => {
                let file = FileConfigAdapter::from_file(path)?;
                load_strategy(&file, &self.catalog, &self.classifier)
            }
            None => load_strategy(config, &self.catalog, &self.classifier),
        }
    }
}

/// Price series per symbol. A directory yields one series per CSV file; a
/// single file is named after its stem.
pub fn load_prices(path: &Path) -> Result<Vec<(String, PriceSeries)>, EngineError> {
    if path.is_dir() {
        let adapter = CsvAdapter::new(path.to_path_buf());
        return adapter
            .list_symbols()?
            .into_iter()
            .map(|symbol| -> Result<(String, PriceSeries), EngineError> {
                let bars = adapter.fetch_bars(&symbol)?;
                Ok((symbol, PriceSeries::from_bars(&bars)))
            })
            .collect();
    }
    let symbol = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("prices")
        .to_string();
    let bars = read_bars(path)?;
    Ok(vec![(symbol, PriceSeries::from_bars(&bars))])
}

#[derive(Serialize)]
struct SymbolReport<'a> {
    symbol: &'a str,
    #[serde(flatten)]
    result: &'a SimulationResult,
}

fn run_backtest(
    config_path: &Path,
    prices_path: &Path,
    strategy_path: Option<&Path>,
    json: bool,
) -> ExitCode {
    match backtest(config_path, prices_path, strategy_path, json) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            eprintln!("error: one or more runs failed");
            ExitCode::from(5)
        }
        Err(e) => report(&e),
    }
}

fn backtest(
    config_path: &Path,
    prices_path: &Path,
    strategy_path: Option<&Path>,
    json: bool,
) -> Result<bool, EngineError> {
    let (config, context) = EngineContext::load(config_path)?;
    let strategy = context.strategy(&config, strategy_path)?;
    let (indicators, options) = load_analysis(&config, &context.catalog)?;

    let mut request = BacktestRequest::for_strategy(&strategy, options);
    request.indicators = indicators;

    let series = load_prices(prices_path)?;
    let jobs: Vec<(&PriceSeries, &BacktestRequest)> =
        series.iter().map(|(_, prices)| (prices, &request)).collect();
    let results = context.orchestrator().run_many(&jobs);

    if json {
        let reports: Vec<SymbolReport> = series
            .iter()
            .zip(&results)
            .map(|((symbol, _), result)| SymbolReport { symbol, result })
            .collect();
        let text = serde_json::to_string_pretty(&reports).map_err(std::io::Error::from)?;
        println!("{text}");
    } else {
        println!("Strategy: {} ({})", strategy.name(), strategy.strategy_id());
        for warning in strategy.warnings() {
            println!("  warning: {warning}");
        }
        for ((symbol, prices), result) in series.iter().zip(&results) {
            print_result(symbol, prices, result);
        }
    }
    Ok(results.iter().all(|r| r.success))
}

fn print_result(symbol: &str, prices: &PriceSeries, result: &SimulationResult) {
    let status = if result.success { "ok" } else { "failed" };
    println!("\n{symbol} [{status}]: {}", result.message);
    let print_points = |label: &str, points: &[usize]| {
        for &i in points {
            if let Some(bar) = prices.bar(i) {
                println!("  {label:<5} {i:>6}  {}  close={:.4}", bar.timestamp, bar.close);
            }
        }
    };
    print_points("entry", &result.entry_points);
    print_points("exit", &result.exit_points);
    for event in &result.cross_signals {
        println!(
            "  cross {:>6}  {} {} {} ({:?})",
            event.index, event.left, event.signal_type, event.right, event.direction
        );
    }
    println!(
        "  {} bar(s) in {:.2} ms",
        result.metadata.input_len, result.metadata.elapsed_ms
    );
}

fn run_detect(config_path: &Path, prices_path: &Path, conditions: &str) -> ExitCode {
    let exprs = match parse_condition_list(conditions) {
        Ok(exprs) => exprs,
        Err(e) => {
            eprintln!("error: {}", e.display_with_context(conditions));
            return (&EngineError::from(e)).into();
        }
    };
    match detect(config_path, prices_path, |catalog| {
        exprs.iter().map(|expr| expr.resolve(catalog)).collect()
    }) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

fn detect<F>(config_path: &Path, prices_path: &Path, conditions: F) -> Result<(), EngineError>
where
    F: FnOnce(&VariableCatalog) -> Result<Vec<Condition>, EngineError>,
{
    let (_config, context) = EngineContext::load(config_path)?;
    let conditions = conditions(&context.catalog)?;
    let detector = context.detector();

    for condition in &conditions {
        println!("condition: {condition}");
    }
    for (symbol, prices) in load_prices(prices_path)? {
        let points = detector.detect(&prices, &conditions)?;
        println!("{symbol}: {} point(s)", points.len());
        for i in points {
            if let Some(ts) = prices.timestamps.get(i) {
                println!("  {i:>6}  {ts}");
            }
        }
    }
    Ok(())
}

fn run_check(config_path: &Path, variables: &[String]) -> ExitCode {
    let mut refs = Vec::with_capacity(variables.len());
    for text in variables {
        match parse_variable(text) {
            Ok(parsed) => refs.push(parsed),
            Err(e) => {
                eprintln!("error: {}", e.display_with_context(text));
                return (&EngineError::from(e)).into();
            }
        }
    }
    match check(config_path, &refs) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(7),
        Err(e) => report(&e),
    }
}

fn check(
    config_path: &Path,
    refs: &[(String, Parameters)],
) -> Result<bool, EngineError> {
    let (_config, context) = EngineContext::load(config_path)?;
    let resolved = refs
        .iter()
        .map(|(id, params)| context.catalog.resolve(id, params))
        .collect::<Result<Vec<TradingVariable>, EngineError>>()?;

    let mut accepted: Vec<TradingVariable> = Vec::new();
    let mut all_compatible = true;
    for variable in resolved {
        let result = context.classifier.check(&accepted, &variable);
        println!("{variable}: {} - {}", result.level, result.message);
        for warning in &result.warnings {
            println!("  warning: {warning}");
        }
        if result.is_compatible() {
            accepted.push(variable);
        } else {
            all_compatible = false;
        }
    }
    Ok(all_compatible)
}

fn run_validate(config_path: &Path, strategy_path: Option<&Path>) -> ExitCode {
    match validate(config_path, strategy_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

fn validate(config_path: &Path, strategy_path: Option<&Path>) -> Result<(), EngineError> {
    let (config, context) = EngineContext::load(config_path)?;
    let strategy = context.strategy(&config, strategy_path)?;

    println!("Strategy: {} ({})", strategy.name(), strategy.strategy_id());
    for kind in TriggerType::ALL {
        let triggers = strategy.triggers(kind);
        if triggers.is_empty() {
            continue;
        }
        println!("\n{} triggers:", kind);
        for trigger in triggers {
            let state = if trigger.is_active() { "" } else { " (inactive)" };
            println!(
                "  {}: {} weight={}{}",
                trigger.trigger_id(), trigger.condition(), trigger.weight(), state
            );
        }
    }
    if !strategy.warnings().is_empty() {
        println!("\nWarnings:");
        for warning in strategy.warnings() {
            println!("  {warning}");
        }
    }
    if !strategy.validate(&context.classifier) {
        return Err(EngineError::IncompatibleTrigger {
            trigger_id: strategy.strategy_id().to_string(),
            reason: "strategy contains incompatible variables".to_string(),
        });
    }
    println!("\nStrategy is valid: {} trigger(s).", strategy.len());
    Ok(())
}

fn run_variables(config_path: &Path) -> ExitCode {
    let context = match EngineContext::load(config_path) {
        Ok((_, context)) => context,
        Err(e) => return report(&e),
    };
    println!(
        "{:<16} {:<28} {:<14} {:<10} {}",
        "ID", "NAME", "PURPOSE", "CHART", "GROUP"
    );
    for variable in context.catalog.iter() {
        println!(
            "{:<16} {:<28} {:<14} {:<10} {}  {}",
            variable.variable_id(),
            variable.display_name(),
            variable.purpose_category().as_str(),
            variable.chart_category().as_str(),
            variable.comparison_group().as_str(),
            format_params(variable.parameters())
        );
    }
    ExitCode::SUCCESS
}
