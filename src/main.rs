//! # Email Sieve CLI
//!
//! Command-line interface for the Email Sieve library (`email_sieve_core`).
//! This binary parses arguments, sets up configuration, initializes the sieve,
//! validates either a single address or a JSON file of contact records, and writes
//! the accepted and rejected sets.

use email_sieve_core::{
    check_smtp_connectivity, initialize_sieve, process_records, records_from_json,
    validate_single_email, Config, ConfigBuilder, ContactRecord, EmailSieve, RunStatistics,
    VerificationVerdict,
};

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Validates contact email addresses and separates deliverable from rejected records.",
    long_about = "Email Sieve checks each address for syntax, disposable domains and MX records, then asks the domain's mail exchange whether it accepts the recipient (SMTP RCPT TO, no mail sent). Trusted providers skip the SMTP probe."
)]
struct AppArgs {
    /// Path to the input JSON file (an array of contact objects).
    #[arg(short, long, default_value = "contacts.json", env = "EMAIL_SIEVE_INPUT")]
    input: String,

    /// Path of the JSON file receiving the accepted records.
    #[arg(short, long, default_value = "accepted.json", env = "EMAIL_SIEVE_OUTPUT")]
    output: String,

    /// Path of the JSON file receiving the rejected records (written only if any).
    #[arg(short, long, default_value = "rejected.json", env = "EMAIL_SIEVE_REJECTED")]
    rejected: String,

    /// Validate a single address and print the verdict instead of processing a file.
    #[arg(long, env = "EMAIL_SIEVE_EMAIL")]
    email: Option<String>,

    /// Path to a configuration file (TOML format) to load settings from. CLI args override file settings.
    #[arg(long, env = "EMAIL_SIEVE_CONFIG")]
    config_file: Option<String>,

    /// DNS resolution timeout in seconds.
    #[arg(long, env = "EMAIL_SIEVE_DNS_TIMEOUT")]
    dns_timeout: Option<u64>,

    /// Comma-separated list of DNS servers to use for lookups.
    #[arg(long, value_delimiter = ',', env = "EMAIL_SIEVE_DNS_SERVERS")]
    dns_servers: Option<Vec<String>>,

    /// SMTP connection/command timeout in seconds.
    #[arg(long, env = "EMAIL_SIEVE_SMTP_TIMEOUT")]
    smtp_timeout: Option<u64>,

    /// Port the mail exchanges are probed on.
    #[arg(long, env = "EMAIL_SIEVE_SMTP_PORT")]
    smtp_port: Option<u16>,

    /// Sender address announced in MAIL FROM.
    #[arg(long, env = "EMAIL_SIEVE_SMTP_SENDER")]
    smtp_sender: Option<String>,

    /// Name announced in the SMTP greeting.
    #[arg(long, env = "EMAIL_SIEVE_HELO_NAME")]
    helo_name: Option<String>,

    /// Name of the record field holding the address.
    #[arg(long, env = "EMAIL_SIEVE_EMAIL_FIELD")]
    email_field: Option<String>,

    /// Name of the field appended to rejected records.
    #[arg(long, env = "EMAIL_SIEVE_REASON_FIELD")]
    reason_field: Option<String>,

    /// Test outbound SMTP connectivity before processing.
    #[arg(long, action = clap::ArgAction::SetTrue, env = "EMAIL_SIEVE_CHECK_CONNECTIVITY")]
    check_connectivity: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_thread_names(true)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Setting up tracing subscriber failed")?;

    tracing::info!("Email Sieve CLI v{} starting...", env!("CARGO_PKG_VERSION"));

    let args = AppArgs::parse();
    tracing::debug!("Parsed CLI arguments: {:?}", args);

    let config = Arc::new(build_config(&args)?);
    tracing::debug!("Effective configuration loaded: {:?}", *config);

    if args.check_connectivity {
        match check_smtp_connectivity(&config).await {
            Ok(_) => tracing::info!(
                "SMTP connectivity test passed (outbound port {} likely open).",
                config.smtp_port
            ),
            Err(e) => {
                tracing::error!("SMTP connectivity test failed: {}", e);
                tracing::warn!("Mailbox probes will likely end in connect_error or timeout.");
                tracing::warn!("Check firewall rules or ISP restrictions before trusting the rejected set.");
            }
        }
    }

    let sieve = match initialize_sieve(Arc::clone(&config)).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Initialization error: {}", e);
            return Err(anyhow::anyhow!("Failed to initialize EmailSieve: {}", e));
        }
    };

    let start_time = Instant::now();
    let execution_result = match args.email.as_deref() {
        Some(email) => process_cli_mode(&sieve, email).await,
        None => process_file_mode(&config, &sieve, &args, start_time).await,
    };

    if let Err(e) = execution_result {
        tracing::error!("Execution failed: {}", e);
        return Err(e);
    }

    if args.email.is_none() {
        tracing::info!(
            "Processing finished successfully. Total duration: {:.2?}",
            start_time.elapsed()
        );
    }

    Ok(())
}

fn build_config(args: &AppArgs) -> Result<Config> {
    let mut config_builder = ConfigBuilder::new();

    if let Some(ref path) = args.config_file {
        config_builder = config_builder.config_file(path);
    }
    if let Some(t) = args.dns_timeout {
        config_builder = config_builder.dns_timeout(Duration::from_secs(t));
    }
    if let Some(ref servers) = args.dns_servers {
        if !servers.is_empty() {
            config_builder = config_builder.dns_servers(servers.clone());
        }
    }
    if let Some(t) = args.smtp_timeout {
        config_builder = config_builder.smtp_timeout(Duration::from_secs(t));
    }
    if let Some(port) = args.smtp_port {
        config_builder = config_builder.smtp_port(port);
    }
    if let Some(ref s) = args.smtp_sender {
        config_builder = config_builder.smtp_sender_email(s);
    }
    if let Some(ref name) = args.helo_name {
        config_builder = config_builder.helo_name(name);
    }
    if let Some(ref field) = args.email_field {
        config_builder = config_builder.email_field(field);
    }
    if let Some(ref field) = args.reason_field {
        config_builder = config_builder.reason_field(field);
    }

    config_builder.build().map_err(|e| {
        tracing::error!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to build configuration: {}", e)
    })
}

async fn process_cli_mode(sieve: &EmailSieve, email: &str) -> Result<()> {
    tracing::info!("Running in single address mode.");
    let start_time = Instant::now();

    let verdict = validate_single_email(sieve, email).await;
    print_cli_results(email, &verdict);

    tracing::info!("Single address mode finished. Duration: {:.2?}", start_time.elapsed());
    Ok(())
}

async fn process_file_mode(
    config: &Config,
    sieve: &EmailSieve,
    args: &AppArgs,
    start_time: Instant,
) -> Result<()> {
    tracing::info!(
        "Running in file mode. Input: '{}', Accepted: '{}', Rejected: '{}'",
        args.input,
        args.output,
        args.rejected
    );
    let input_path = Path::new(&args.input);
    if !input_path.is_file() {
        return Err(anyhow::anyhow!(
            "Input file not found or is not a file: {}",
            args.input
        ));
    }
    for path in [&args.output, &args.rejected] {
        ensure_parent_dir(Path::new(path))?;
    }

    tracing::info!("Loading records from '{}'...", args.input);
    let records = load_records(&args.input, &config.email_field)?;
    let total_records = records.len();
    if total_records == 0 {
        tracing::warn!(
            "Input file '{}' contains no records. Saving empty accepted file.",
            args.input
        );
        save_records(&[], &args.output)?;
        return Ok(());
    }
    tracing::info!("Loaded {} records from input file.", total_records);

    let pb = ProgressBar::new(total_records as u64);
    pb.set_style(ProgressStyle::default_bar()
         .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) | ETA: {eta} | {msg}")
         .context("Failed to set progress bar template")?
         .progress_chars("=> "));
    pb.set_message("Validating addresses...");

    let (partition, stats) = process_records(sieve, records, |_, verdict| {
        pb.set_message(verdict.reason().to_string());
        pb.inc(1);
    })
    .await;

    pb.finish_with_message(format!("Validated {} records", partition.len()));

    tracing::info!("Saving {} accepted records to '{}'...", partition.accepted.len(), args.output);
    save_records(&partition.accepted, &args.output)?;
    if partition.rejected.is_empty() {
        tracing::info!("No rejected records; '{}' not written.", args.rejected);
    } else {
        tracing::info!(
            "Saving {} rejected records to '{}'...",
            partition.rejected.len(),
            args.rejected
        );
        save_records(&partition.rejected, &args.rejected)?;
    }
    tracing::info!("Results saved successfully.");

    log_summary(&stats, total_records, start_time.elapsed());
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            tracing::debug!("Creating output directory: {}", parent_dir.display());
            std::fs::create_dir_all(parent_dir).with_context(|| {
                format!(
                    "Failed to create output directory '{}'",
                    parent_dir.display()
                )
            })?;
        }
    }
    Ok(())
}

fn load_records(file_path: &str, email_field: &str) -> Result<Vec<ContactRecord>> {
    tracing::debug!("Opening input file: {}", file_path);
    let file = File::open(file_path)
        .with_context(|| format!("Failed to open input file '{}'", file_path))?;
    let reader = BufReader::new(file);

    tracing::debug!("Parsing JSON from file: {}", file_path);
    let document: serde_json::Value = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to parse JSON from '{}'", file_path))?;

    records_from_json(document, email_field).with_context(|| {
        format!(
            "Invalid records in '{}'. Ensure it's an array of objects with a '{}' field.",
            file_path, email_field
        )
    })
}

/// Saves records to the specified JSON file, pretty printed.
fn save_records(records: &[ContactRecord], file_path: &str) -> Result<()> {
    tracing::debug!("Creating output file: {}", file_path);
    let file = File::create(file_path)
        .with_context(|| format!("Failed to create/truncate output file '{}'", file_path))?;
    let writer = BufWriter::new(file);

    tracing::debug!("Writing {} records as JSON to file: {}", records.len(), file_path);
    serde_json::to_writer_pretty(writer, records)
        .with_context(|| format!("Failed to serialize records to JSON for '{}'", file_path))?;

    Ok(())
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

/// Logs a summary of the run to the console using `tracing::info`.
fn log_summary(stats: &RunStatistics, original_total: usize, duration: Duration) {
    let processed = stats.total();
    let accepted = stats.accepted();
    let rejected = stats.rejected();

    tracing::info!("-------------------- Validation Summary --------------------");
    tracing::info!("Total Records in Input File : {}", original_total);
    tracing::info!("Records Validated           : {}", processed);
    tracing::info!(
        "  - Accepted               : {} ({:.1}%)",
        accepted,
        percent(accepted, processed)
    );
    tracing::info!(
        "  - Rejected               : {} ({:.1}%)",
        rejected,
        percent(rejected, processed)
    );
    for (reason, count) in stats.rejection_breakdown() {
        tracing::info!("      {:<20}: {}", reason.to_string(), count);
    }
    tracing::info!("Total Time Taken            : {:.2?}", duration);
    if duration.as_secs_f64() > 0.01 && processed > 0 {
        let rate = (processed as f64) / duration.as_secs_f64();
        tracing::info!("Processing Rate             : {:.2} records/sec", rate);
    }
    tracing::info!("----------------------------------------------------------");
}

/// Prints the verdict for a single address to standard output.
fn print_cli_results(email: &str, verdict: &VerificationVerdict) {
    const BLUE: &str = "\x1b[34m";
    const GREEN: &str = "\x1b[32m";
    const RED: &str = "\x1b[31m";
    const RESET: &str = "\x1b[0m";

    println!("\n{BLUE}===== Email Sieve Result ====={RESET}");
    println!("Address: {}", email.trim());
    if verdict.is_accepted() {
        println!("\n{GREEN}Status: ACCEPTED{RESET}");
    } else {
        println!("\n{RED}Status: REJECTED{RESET}");
    }
    println!("Reason: {}", verdict.reason());
    println!("{BLUE}=============================={RESET}\n");
}
