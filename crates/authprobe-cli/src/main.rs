//! authprobe - authentication-flow diagnostic probe CLI
//!
//! Drives signup → OTP → login → profile against one or more deployments and
//! reports exactly where the pipeline breaks.
//!
//! ## Commands
//!
//! - `run`: probe one credential record against a list of base URLs
//! - `batch`: probe several independent jobs from a JSON plan concurrently
//! - `variants`: print the variation plan for a password without probing

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::{info, warn, Level};

use authprobe_core::metrics::METRICS;
use authprobe_core::{
    password_variants, render_report_md, run_probe, run_probes, write_report_json,
    write_report_md, AuthPaths, CancelFlag, Credentials, DiagnosticReport, HttpTransport,
    OtpMode, ProbeJob, ProbeOptions, TargetConfig, Transport, VariationProber,
};

#[derive(Parser)]
#[command(name = "authprobe")]
#[command(author = "Stevedores Org")]
#[command(version = authprobe_core::VERSION)]
#[command(about = "Authentication-flow diagnostic probe", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Markdown,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe one account against candidate base URLs
    Run {
        /// Candidate base URL; repeat or comma-separate, tried in order
        #[arg(long = "base-url", value_delimiter = ',')]
        base_urls: Vec<String>,

        /// Display name sent at signup
        #[arg(long, env = "AUTHPROBE_NAME", default_value = "Auth Probe")]
        name: String,

        /// Account email
        #[arg(long, env = "AUTHPROBE_EMAIL")]
        email: String,

        /// Account password
        #[arg(long, env = "AUTHPROBE_PASSWORD", hide_env_values = true)]
        password: String,

        #[command(flatten)]
        flow: FlowArgs,

        #[command(flatten)]
        out: OutputArgs,
    },

    /// Run several independent probes from a JSON plan, concurrently
    Batch {
        /// Plan file: {"jobs": [{"label", "credentials", "base_urls", ...}]}
        #[arg(long)]
        plan: PathBuf,

        /// Per-run wall-clock budget in seconds
        #[arg(long)]
        run_timeout: Option<u64>,

        #[command(flatten)]
        out: OutputArgs,
    },

    /// Print the ordered variation plan for a password (no network)
    Variants {
        #[arg(long, env = "AUTHPROBE_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
struct FlowArgs {
    /// OTP to submit when signup reports one was sent
    #[arg(long, env = "AUTHPROBE_OTP", conflicts_with = "halt_on_otp")]
    otp: Option<String>,

    /// Stop at OTP verification instead of assuming out-of-band verification
    #[arg(long)]
    halt_on_otp: bool,

    /// Start at login; the account already exists
    #[arg(long)]
    skip_signup: bool,

    /// Report the first failure without trying variations
    #[arg(long)]
    no_variations: bool,

    /// Whole-run wall-clock budget in seconds
    #[arg(long)]
    run_timeout: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long)]
    request_timeout: Option<u64>,
}

#[derive(clap::Args, Debug, Clone)]
struct OutputArgs {
    /// Report format
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Exit non-zero when a probe does not validate the profile
    #[arg(long)]
    strict: bool,
}

/// One job of a batch plan file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PlanJob {
    label: String,
    credentials: Credentials,
    base_urls: Vec<String>,
    #[serde(default)]
    skip_signup: bool,
    #[serde(default)]
    otp: Option<String>,
    #[serde(default = "default_true")]
    probe_variations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Plan {
    jobs: Vec<PlanJob>,
}

fn default_true() -> bool {
    true
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    authprobe_core::telemetry::init_tracing(cli.json, level);

    let result = match cli.command {
        Commands::Run {
            base_urls,
            name,
            email,
            password,
            flow,
            out,
        } => {
            let credentials = Credentials::new(name, email, password);
            cmd_run(&base_urls, credentials, &flow, &out).await
        }
        Commands::Batch {
            plan,
            run_timeout,
            out,
        } => cmd_batch(&plan, run_timeout, &out).await,
        Commands::Variants { password } => {
            print!("{}", render_variants(&password, &AuthPaths::default()));
            Ok(())
        }
    };

    METRICS.flush();
    result
}

/// Cancel `flag` on Ctrl-C. The run stops before its next call.
fn cancel_on_ctrl_c(flag: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling probe");
            flag.cancel();
        }
    });
}

fn http_transport(options: &ProbeOptions) -> Result<HttpTransport> {
    HttpTransport::new(options.request_timeout).context("Failed to build HTTP client")
}

fn build_options(flow: &FlowArgs) -> ProbeOptions {
    let mut options = ProbeOptions::from_env();
    options.otp = match (&flow.otp, flow.halt_on_otp) {
        (Some(code), _) => OtpMode::Supplied(code.clone()),
        (None, true) => OtpMode::Halt,
        (None, false) => OtpMode::AssumeVerified,
    };
    options.skip_signup = flow.skip_signup;
    options.probe_variations = !flow.no_variations;
    if let Some(secs) = flow.run_timeout {
        options.run_timeout = Some(Duration::from_secs(secs));
    }
    if let Some(secs) = flow.request_timeout {
        options.request_timeout = Duration::from_secs(secs);
    }
    options
}

fn build_target(base_urls: &[String]) -> Result<TargetConfig> {
    if base_urls.is_empty() {
        return TargetConfig::from_env()
            .context("No --base-url given and AUTHPROBE_BASE_URLS is not usable");
    }
    TargetConfig::new(base_urls.iter().cloned()).context("Invalid --base-url")
}

async fn cmd_run(
    base_urls: &[String],
    credentials: Credentials,
    flow: &FlowArgs,
    out: &OutputArgs,
) -> Result<()> {
    let target = build_target(base_urls)?;
    let options = build_options(flow);
    cancel_on_ctrl_c(options.cancel.clone());

    let transport = http_transport(&options)?;
    let report = run_probe(&transport, &credentials, &target, &options)
        .await
        .context("Probe could not run")?;

    emit_report(&report, out)?;
    if out.strict && !report.succeeded {
        bail!(
            "probe failed at {}",
            report
                .failure_point
                .map(|s| s.name())
                .unwrap_or("unknown stage")
        );
    }
    Ok(())
}

fn load_plan(path: &Path) -> Result<Plan> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read plan {}", path.display()))?;
    let plan: Plan = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse plan {}", path.display()))?;
    if plan.jobs.is_empty() {
        bail!("plan {} has no jobs", path.display());
    }
    Ok(plan)
}

fn plan_jobs(plan: Plan, run_timeout: Option<u64>, cancel: &CancelFlag) -> Result<Vec<ProbeJob>> {
    plan.jobs
        .into_iter()
        .map(|job| {
            let target = TargetConfig::new(job.base_urls)
                .with_context(|| format!("Invalid base URLs for job '{}'", job.label))?;
            let mut options = ProbeOptions::from_env().with_cancel(cancel.clone());
            options.skip_signup = job.skip_signup;
            options.probe_variations = job.probe_variations;
            if let Some(code) = job.otp {
                options.otp = OtpMode::Supplied(code);
            }
            if let Some(secs) = run_timeout {
                options.run_timeout = Some(Duration::from_secs(secs));
            }
            Ok(ProbeJob {
                label: job.label,
                credentials: job.credentials,
                target,
                options,
            })
        })
        .collect()
}

async fn cmd_batch(plan_path: &Path, run_timeout: Option<u64>, out: &OutputArgs) -> Result<()> {
    let plan = load_plan(plan_path)?;
    let cancel = CancelFlag::new();
    cancel_on_ctrl_c(cancel.clone());
    let jobs = plan_jobs(plan, run_timeout, &cancel)?;
    info!(jobs = jobs.len(), "starting batch");

    let transport: Arc<dyn Transport> = Arc::new(http_transport(&ProbeOptions::from_env())?);
    let results = run_probes(transport, jobs).await;
    for (label, result) in &results {
        if let Err(e) = result {
            warn!(job = %label, error = %e, "probe did not run");
        }
    }

    let rendered = match out.format {
        OutputFormat::Json => {
            let entries: Vec<serde_json::Value> = results
                .iter()
                .map(|(label, result)| match result {
                    Ok(report) => serde_json::json!({ "label": label, "report": report }),
                    Err(e) => serde_json::json!({ "label": label, "error": e.to_string() }),
                })
                .collect();
            serde_json::to_string_pretty(&entries)?
        }
        OutputFormat::Markdown => results
            .iter()
            .map(|(label, result)| match result {
                Ok(report) => format!("<!-- {} -->\n{}", label, render_report_md(report)),
                Err(e) => format!("<!-- {} -->\n# Probe Report\n\n- error: {}\n", label, e),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Text => results
            .iter()
            .map(|(label, result)| match result {
                Ok(report) => format!("== {} ==\n{}", label, render_text(report)),
                Err(e) => format!("== {} ==\nERROR {}\n", label, e),
            })
            .collect::<Vec<_>>()
            .join("\n"),
    };
    write_or_print(&rendered, out.output.as_deref())?;

    let failed: Vec<&str> = results
        .iter()
        .filter(|(_, r)| !r.as_ref().is_ok_and(|report| report.succeeded))
        .map(|(label, _)| label.as_str())
        .collect();
    if out.strict && !failed.is_empty() {
        bail!("{} probe(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}

fn emit_report(report: &DiagnosticReport, out: &OutputArgs) -> Result<()> {
    match (&out.output, out.format) {
        (Some(path), OutputFormat::Json) => write_report_json(path, report)
            .with_context(|| format!("Failed to write {}", path.display())),
        (Some(path), OutputFormat::Markdown) => write_report_md(path, report)
            .with_context(|| format!("Failed to write {}", path.display())),
        (path, OutputFormat::Text) => write_or_print(&render_text(report), path.as_deref()),
        (None, OutputFormat::Json) => {
            println!("{}", serde_json::to_string_pretty(report)?);
            Ok(())
        }
        (None, OutputFormat::Markdown) => {
            print!("{}", render_report_md(report));
            Ok(())
        }
    }
}

fn write_or_print(content: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "report written");
        }
        None => print!("{}", content),
    }
    Ok(())
}

/// Terminal summary: verdict line, then one line per attempt.
fn render_text(report: &DiagnosticReport) -> String {
    let mut out = String::new();
    if report.succeeded {
        out.push_str(&format!(
            "PASS  {}  via {}\n",
            report.final_state,
            report.base_url.as_deref().unwrap_or("-")
        ));
    } else {
        out.push_str(&format!(
            "FAIL  at {} ({})  final state {}\n",
            report
                .failure_point
                .map(|s| s.name())
                .unwrap_or("unknown"),
            report.failure_kind.map(|k| k.name()).unwrap_or("unknown"),
            report.final_state
        ));
    }

    for a in &report.attempts {
        out.push_str(&format!(
            "  #{:<3} {:<14} {} {}  [{}]  {}  {}\n",
            a.seq,
            a.stage.name(),
            a.method,
            a.endpoint,
            a.input_variant,
            a.http_status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "---".to_string()),
            a.message.as_deref().unwrap_or(match a.failure_kind {
                Some(kind) => kind.name(),
                None => "ok",
            }),
        ));
    }
    for s in &report.skipped {
        out.push_str(&format!("  skipped {} {} (404)\n", s.method, s.endpoint));
    }
    if let Some(token) = &report.token {
        out.push_str(&format!("  token {}\n", token.redacted()));
    }
    out
}

fn render_variants(password: &str, paths: &AuthPaths) -> String {
    let mut out = String::from("password variants:\n");
    for (variant, value) in password_variants(password) {
        out.push_str(&format!("  {:<20} {}\n", variant.label(), value));
    }
    out.push_str("login probe order after a nominal failure:\n");
    for (i, variant) in VariationProber::new(true)
        .plan(password, paths)
        .iter()
        .enumerate()
    {
        out.push_str(&format!("  {}. {}\n", i + 1, variant));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use authprobe_core::fakes::MockAuthService;
    use authprobe_core::Stage;

    /// Signup succeeds; login is rejected and variations are off.
    async fn failed_report() -> DiagnosticReport {
        let transport = MockAuthService::new("a@x.com", "other").into_transport();
        let target = TargetConfig::new(["http://svc"]).unwrap();
        let options = ProbeOptions::default().without_variations();
        run_probe(
            &transport,
            &Credentials::new("A", "a@x.com", "pw"),
            &target,
            &options,
        )
        .await
        .unwrap()
    }

    #[test]
    fn test_run_parses_repeated_and_delimited_urls() {
        let cli = Cli::try_parse_from([
            "authprobe",
            "run",
            "--base-url",
            "http://a,http://b",
            "--base-url",
            "http://c",
            "--email",
            "a@x.com",
            "--password",
            "pw",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                base_urls, flow, out, ..
            } => {
                assert_eq!(base_urls, vec!["http://a", "http://b", "http://c"]);
                assert!(!flow.skip_signup);
                assert_eq!(out.format, OutputFormat::Text);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_otp_conflicts_with_halt() {
        let parsed = Cli::try_parse_from([
            "authprobe",
            "run",
            "--email",
            "a@x.com",
            "--password",
            "pw",
            "--otp",
            "123456",
            "--halt-on-otp",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_build_options_maps_flags() {
        let flow = FlowArgs {
            halt_on_otp: true,
            skip_signup: true,
            no_variations: true,
            run_timeout: Some(30),
            request_timeout: Some(5),
            ..FlowArgs::default()
        };
        let options = build_options(&flow);
        assert_eq!(options.otp, OtpMode::Halt);
        assert!(options.skip_signup);
        assert!(!options.probe_variations);
        assert_eq!(options.run_timeout, Some(Duration::from_secs(30)));
        assert_eq!(options.request_timeout, Duration::from_secs(5));

        let flow = FlowArgs {
            otp: Some("123456".to_string()),
            ..FlowArgs::default()
        };
        assert_eq!(
            build_options(&flow).otp,
            OtpMode::Supplied("123456".to_string())
        );
    }

    #[test]
    fn test_load_plan_and_build_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(
            &path,
            r#"{"jobs": [
                {"label": "staging",
                 "credentials": {"name": "A", "email": "a@x.com", "password": "pw"},
                 "base_urls": ["http://staging/"],
                 "skip_signup": true},
                {"label": "prod",
                 "credentials": {"name": "B", "email": "b@x.com", "password": "pw"},
                 "base_urls": ["http://prod"],
                 "otp": "999999",
                 "probe_variations": false}
            ]}"#,
        )
        .unwrap();

        let plan = load_plan(&path).unwrap();
        let cancel = CancelFlag::new();
        let jobs = plan_jobs(plan, Some(10), &cancel).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].label, "staging");
        assert_eq!(jobs[0].target.get(0), Some("http://staging"));
        assert!(jobs[0].options.skip_signup);
        assert!(jobs[0].options.probe_variations);
        assert_eq!(jobs[1].options.otp, OtpMode::Supplied("999999".to_string()));
        assert!(!jobs[1].options.probe_variations);
        assert_eq!(jobs[1].options.run_timeout, Some(Duration::from_secs(10)));

        cancel.cancel();
        assert!(jobs[1].options.cancel.is_cancelled());
    }

    #[test]
    fn test_empty_plan_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        std::fs::write(&path, r#"{"jobs": []}"#).unwrap();
        assert!(load_plan(&path).is_err());
    }

    #[tokio::test]
    async fn test_render_text_failure() {
        let text = render_text(&failed_report().await);
        assert!(text.starts_with("FAIL  at logging_in (http_failure)"));
        assert!(text.contains("POST http://svc/api/auth/login"));
        assert!(text.contains("Invalid credentials"));
    }

    #[tokio::test]
    async fn test_emit_report_writes_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let out = OutputArgs {
            format: OutputFormat::Json,
            output: Some(path.clone()),
            strict: false,
        };
        emit_report(&failed_report().await, &out).unwrap();
        let back: DiagnosticReport =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back.failure_point, Some(Stage::LoggingIn));
    }

    #[test]
    fn test_render_variants_lists_plan() {
        let text = render_variants("Secret1!", &AuthPaths::default());
        assert!(text.contains("password:lowercase"));
        assert!(text.contains("secret1!"));
        assert!(text.contains("6. path:/auth/login"));
    }
}
