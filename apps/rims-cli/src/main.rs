use clap::{Parser, Subcommand, ValueEnum};
use rims_core::celsius_to_fahrenheit;
use rims_io::{linearize, raw_for_celsius};
use rims_regulator::{
    CsvTelemetry, JsonLinesTelemetry, RegulatorConfig, TelemetryRecord, TelemetrySink,
};
use rims_sim::{Scenario, SimError, SimProgress, SimResult, load_scenario};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "rims")]
#[command(about = "RIMS mash regulator - simulation and configuration tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a regulation session
    Run {
        /// Regulator configuration (defaults when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Scenario file (defaults when omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,
        /// Override the scenario's set point (°C)
        #[arg(long)]
        set_point: Option<f64>,
        /// Override the scenario's duration (s)
        #[arg(long)]
        duration: Option<u32>,
        /// Telemetry output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = TelemetryFormat::Csv)]
        format: TelemetryFormat,
    },
    /// Simulate an open-loop identification run
    Ident {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        scenario: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = TelemetryFormat::Csv)]
        format: TelemetryFormat,
    },
    /// Print the thermistor calibration table
    Linearize {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Convert a single raw ADC sample instead of printing the table
        #[arg(long)]
        raw: Option<u16>,
        /// Table step (°C)
        #[arg(long, default_value_t = 5.0)]
        step: f64,
    },
    /// Validate a configuration file
    CheckConfig {
        /// Path to the configuration YAML file
        config_path: PathBuf,
    },
    /// Write the default configuration
    WriteConfig {
        /// Destination YAML file
        config_path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TelemetryFormat {
    Csv,
    Json,
}

fn main() -> SimResult<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            scenario,
            set_point,
            duration,
            output,
            format,
        } => {
            let mut scenario = scenario_or_default(scenario.as_deref())?;
            if let Some(set_point) = set_point {
                scenario.set_point_c = set_point;
            }
            if let Some(duration) = duration {
                scenario.duration_s = duration;
            }
            cmd_run(
                config_or_default(config.as_deref())?,
                &scenario,
                output.as_deref(),
                format,
            )
        }
        Commands::Ident {
            config,
            scenario,
            output,
            format,
        } => cmd_ident(
            config_or_default(config.as_deref())?,
            &scenario_or_default(scenario.as_deref())?,
            output.as_deref(),
            format,
        ),
        Commands::Linearize { config, raw, step } => {
            cmd_linearize(&config_or_default(config.as_deref())?, raw, step)
        }
        Commands::CheckConfig { config_path } => cmd_check_config(&config_path),
        Commands::WriteConfig { config_path } => cmd_write_config(&config_path),
    }
}

fn config_or_default(path: Option<&Path>) -> SimResult<RegulatorConfig> {
    match path {
        Some(path) => Ok(rims_regulator::load_yaml(path)?),
        None => Ok(RegulatorConfig::default()),
    }
}

fn scenario_or_default(path: Option<&Path>) -> SimResult<Scenario> {
    match path {
        Some(path) => load_scenario(path),
        None => Ok(Scenario::default()),
    }
}

fn cmd_run(
    config: RegulatorConfig,
    scenario: &Scenario,
    output: Option<&Path>,
    format: TelemetryFormat,
) -> SimResult<()> {
    eprintln!(
        "Simulating session: {:.1} °C for {} s ({} L)",
        scenario.set_point_c, scenario.duration_s, scenario.plant.volume_l
    );
    if let Some(ceiling) = scenario.plant.steady_state_c(1.0) {
        if ceiling < scenario.set_point_c {
            warn!(
                ceiling_c = ceiling,
                set_point_c = scenario.set_point_c,
                "set point is above what the heater can hold"
            );
        }
    }
    let mut on_progress = |p: SimProgress| render_progress(&p);
    let report = rims_sim::run_session(config, scenario, Some(&mut on_progress))?;
    clear_progress_line();

    write_telemetry(&report.records, output, format)?;

    if report.elapsed {
        eprintln!("✓ Session elapsed after {:.0} s", report.simulated_s);
    } else {
        eprintln!(
            "✗ Session did not elapse within {} s ({} s counted)",
            scenario.max_s, report.running_s
        );
    }
    eprintln!("  Samples:          {}", report.records.len());
    eprintln!("  Max temperature:  {:.2} °C", report.max_temperature_c);
    eprintln!("  Final temperature: {:.2} °C", report.final_temperature_c);
    eprintln!("  Heater on:        {:.0} s", report.heater_on_s);
    print_faults(&report.faults_seen);
    Ok(())
}

fn cmd_ident(
    config: RegulatorConfig,
    scenario: &Scenario,
    output: Option<&Path>,
    format: TelemetryFormat,
) -> SimResult<()> {
    eprintln!(
        "Simulating identification: {} steps over {} s",
        config.ident.steps.len(),
        config.ident.duration_s
    );
    let mut on_progress = |p: SimProgress| render_progress(&p);
    let report = rims_sim::run_identification(config, scenario, Some(&mut on_progress))?;
    clear_progress_line();

    write_telemetry(&report.records, output, format)?;

    if report.finished {
        eprintln!("✓ Identification finished");
    } else {
        eprintln!("✗ Identification did not finish within {} s", scenario.max_s);
    }
    eprintln!("  Samples:          {}", report.records.len());
    eprintln!("  Max temperature:  {:.2} °C", report.max_temperature_c);
    eprintln!("  Heater on:        {:.0} s", report.heater_on_s);
    print_faults(&report.faults_seen);
    Ok(())
}

fn cmd_linearize(config: &RegulatorConfig, raw: Option<u16>, step: f64) -> SimResult<()> {
    let cal = &config.thermistor;
    if let Some(raw) = raw {
        match linearize(raw, cal).celsius() {
            Some(celsius) => println!(
                "{raw} -> {celsius:.2} °C ({:.1} °F)",
                celsius_to_fahrenheit(celsius)
            ),
            None => println!("{raw} -> {:?}", linearize(raw, cal)),
        }
        return Ok(());
    }
    if !(step.is_finite() && step > 0.0) {
        return Err(SimError::InvalidArg {
            what: "step must be positive",
        });
    }

    println!("{:>8} {:>8} {:>6} {:>9}", "°C", "°F", "raw", "reads");
    let mut celsius = config.min_set_point_c;
    while celsius <= config.max_set_point_c + 1e-9 {
        let raw = raw_for_celsius(celsius, cal);
        let reads = linearize(raw, cal)
            .celsius()
            .map_or_else(|| "fault".to_string(), |t| format!("{t:.2}"));
        println!(
            "{celsius:>8.1} {:>8.1} {raw:>6} {reads:>9}",
            celsius_to_fahrenheit(celsius)
        );
        celsius += step;
    }
    Ok(())
}

fn cmd_check_config(config_path: &Path) -> SimResult<()> {
    println!("Checking configuration: {}", config_path.display());
    let config = rims_regulator::load_yaml(config_path)?;
    println!("✓ Configuration is valid");
    println!("  Window:        {} ms", config.window_ms);
    println!("  Sample period: {} ms", config.sample_period_ms);
    println!("  Tolerance:     {:.2} °C", config.tolerance_c);
    println!("  Profiles:");
    for (i, profile) in config.profiles.iter().enumerate() {
        println!(
            "    {}: {} (kp={}, ki={}, kd={}, tau_d={} s, tau_sp={} s)",
            i, profile.name, profile.kp, profile.ki, profile.kd, profile.tau_d_s, profile.tau_sp_s
        );
        if let Some(tau_sp) = profile.overshoot_cancelling_tau_sp() {
            if (tau_sp - profile.tau_sp_s).abs() > 1.0 {
                println!("       tau_sp of {tau_sp:.0} s would cancel step overshoot");
            }
        }
    }
    Ok(())
}

fn cmd_write_config(config_path: &Path) -> SimResult<()> {
    rims_regulator::save_yaml(config_path, &RegulatorConfig::default())?;
    info!(path = %config_path.display(), "default configuration written");
    println!("✓ Default configuration written to {}", config_path.display());
    Ok(())
}

fn write_telemetry(
    records: &[TelemetryRecord],
    output: Option<&Path>,
    format: TelemetryFormat,
) -> SimResult<()> {
    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    let mut sink: Box<dyn TelemetrySink> = match format {
        TelemetryFormat::Csv => Box::new(CsvTelemetry::new(writer)),
        TelemetryFormat::Json => Box::new(JsonLinesTelemetry::new(writer)),
    };
    for record in records {
        sink.record(record);
    }
    Ok(())
}

fn print_faults(faults: &[rims_regulator::Fault]) {
    if faults.is_empty() {
        return;
    }
    eprintln!("  Faults:");
    for fault in faults {
        eprintln!("    {fault}");
    }
}

fn clear_progress_line() {
    eprint!("\r{}\r", " ".repeat(100));
    let _ = io::stderr().flush();
}

fn render_progress(p: &SimProgress) {
    let width = 28usize;
    let filled = ((p.fraction_complete * width as f64).round() as usize).min(width);
    let bar = format!(
        "{}{}",
        "#".repeat(filled),
        "-".repeat(width.saturating_sub(filled))
    );
    eprint!(
        "\r[{}] t={:.0}/{:.0}s  pv={:.2} °C  heater={}  remaining={}s",
        bar,
        p.sim_time_s,
        p.max_s,
        p.process_value_c,
        if p.heater_on { "on " } else { "off" },
        p.remaining_s
    );
    let _ = io::stderr().flush();
}
