use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vmicore_diagnostics::DiagnosticEngine;
use vmicore_map::{BuilderConfig, MapBuilder};
use vmicore_mem::{LinearOffsetTranslator, MappedDumpDevice};
use vmicore_rules::{NoOpScriptHost, RuleEngine};
use vmicore_symbols::{JsonFileSymbolSource, SymbolSource};
use vmicore_types::Catalog;

#[derive(Parser)]
#[command(name = "vmicore")]
#[command(version = "0.1.0")]
#[command(about = "Kernel introspection: symbol loading, rule validation, and memory map building")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a symbol stream into a catalog and report statistics
    LoadSymbols {
        /// JSON file of symbol records
        #[arg(value_name = "SYMBOLS")]
        symbols: PathBuf,
    },

    /// Validate a rule file without running it
    CheckRules {
        /// XML rule file
        #[arg(value_name = "RULES")]
        rules: PathBuf,
    },

    /// Run the memory map builder end to end
    BuildMap {
        /// JSON file of symbol records
        #[arg(long, value_name = "SYMBOLS")]
        symbols: PathBuf,

        /// XML rule file
        #[arg(long, value_name = "RULES")]
        rules: Option<PathBuf>,

        /// Raw kernel memory dump
        #[arg(long, value_name = "DUMP")]
        dump: PathBuf,

        /// Directly-mapped virtual base address (identity-mapped region)
        #[arg(long, default_value_t = 0xffff_8000_0000_0000)]
        virt_base: u64,

        /// Physical base address corresponding to `virt_base`
        #[arg(long, default_value_t = 0)]
        phys_base: u64,

        /// TOML file of `BuilderConfig` overrides
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,

        /// Run the post-build verifier pass and print its report
        #[arg(long)]
        verify: bool,

        /// Write the persisted-map line format here
        #[arg(long, value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Compare two memory dumps byte-wise and report differing runs
    DiffMaps {
        #[arg(value_name = "DUMP_A")]
        dump_a: PathBuf,
        #[arg(value_name = "DUMP_B")]
        dump_b: PathBuf,

        #[arg(long, default_value_t = vmicore_map::diff::DEFAULT_GRANULARITY)]
        granularity: u64,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::LoadSymbols { symbols } => load_symbols(&symbols),
        Commands::CheckRules { rules } => check_rules(&rules),
        Commands::BuildMap { symbols, rules, dump, virt_base, phys_base, config, verify, output } => {
            build_map(&symbols, rules.as_deref(), &dump, virt_base, phys_base, config.as_deref(), verify, output.as_deref())
        }
        Commands::DiffMaps { dump_a, dump_b, granularity } => diff_maps(&dump_a, &dump_b, granularity),
    }
}

fn load_symbols(symbols_path: &std::path::Path) -> Result<()> {
    let catalog = Catalog::new();
    let mut source = JsonFileSymbolSource::new(symbols_path);
    let records = source.read_records().context("reading symbol records")?;
    vmicore_symbols::populate_catalog(&records, &catalog, 0)?;

    println!("loaded {} type(s), {} variable(s)", catalog.all_types().len(), catalog.vars().len());
    Ok(())
}

fn check_rules(rules_path: &std::path::Path) -> Result<()> {
    let xml = std::fs::read_to_string(rules_path).context("reading rule file")?;
    RuleEngine::load(&xml, |_| None)?;
    println!("rule file OK: {}", rules_path.display());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn build_map(
    symbols_path: &std::path::Path,
    rules_path: Option<&std::path::Path>,
    dump_path: &std::path::Path,
    virt_base: u64,
    phys_base: u64,
    config_path: Option<&std::path::Path>,
    verify: bool,
    output_path: Option<&std::path::Path>,
) -> Result<()> {
    let catalog = Catalog::new();
    let mut source = JsonFileSymbolSource::new(symbols_path);
    let records = source.read_records().context("reading symbol records")?;
    vmicore_symbols::populate_catalog(&records, &catalog, 0)?;
    log::info!("catalog loaded: {} type(s), {} variable(s)", catalog.all_types().len(), catalog.vars().len());

    let device = MappedDumpDevice::open(dump_path).context("opening memory dump")?;
    let v2p = LinearOffsetTranslator { virt_base, phys_base, len: device.size() };

    let rules_xml = match rules_path {
        Some(path) => std::fs::read_to_string(path).context("reading rule file")?,
        None => "<rules></rules>".to_string(),
    };
    let resolve_type = |name: &str| catalog.by_name(name).first().copied();
    let rules = RuleEngine::load(&rules_xml, resolve_type)?;

    let config = match config_path {
        Some(path) => {
            let text = std::fs::read_to_string(path).context("reading builder config")?;
            toml::from_str(&text).context("parsing builder config")?
        }
        None => BuilderConfig::default(),
    };

    let host = NoOpScriptHost;
    let builder = MapBuilder::new(&catalog, &device, &v2p, &rules, &host, config);
    let interrupted = std::sync::atomic::AtomicBool::new(false);
    let result = builder.build(&interrupted);

    println!("built {} node(s), {} conflict(s)", result.nodes.len(), result.conflicts.len());
    print_diagnostics(&result.diagnostics);

    if verify {
        let report = vmicore_map::verifier::verify(&result.nodes, |_| None);
        println!("verification: {} node(s) bucketed", report.total_nodes);
        for bucket in &report.histogram {
            println!("  [{:.1}, {:.1}): {}", bucket.lo, bucket.hi, bucket.count);
        }
    }

    if let Some(output_path) = output_path {
        let text = vmicore_map::persist::write_map(&result.nodes);
        std::fs::write(output_path, text).context("writing persisted map")?;
        println!("wrote map to {}", output_path.display());
    }

    Ok(())
}

fn diff_maps(dump_a: &std::path::Path, dump_b: &std::path::Path, granularity: u64) -> Result<()> {
    let a = MappedDumpDevice::open(dump_a).context("opening first dump")?;
    let b = MappedDumpDevice::open(dump_b).context("opening second dump")?;
    let len = a.size().min(b.size());
    let runs = vmicore_map::diff::diff_devices(&a, &b, len, granularity);

    println!("{} differing run(s):", runs.len());
    for run in &runs {
        println!("  {:#x} + {} bytes", run.start, run.length);
    }
    Ok(())
}

fn print_diagnostics(diagnostics: &DiagnosticEngine) {
    diagnostics.print_all();
    diagnostics.print_summary();
}
