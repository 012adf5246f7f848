//! Concurrent generation against the configured backend.

use futures::future::join_all;
use scrivener::{
    CallGate, GatedGenerator, GenerateRequest, PassThrough, RateLimitManager, ScrivenerConfig,
    ScrivenerResult, TextGenerator, UsageSnapshot, build_generator,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

/// What to simulate.
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    /// Number of generations
    pub calls: usize,
    /// Prompt for every call
    pub prompt: String,
    /// Completion budget override
    pub max_tokens: Option<u32>,
    /// Bypass the rate limiter
    pub no_rate_limit: bool,
}

/// Outcome of a simulation run.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Backend that served the calls
    pub provider: &'static str,
    /// Model that served the calls
    pub model: String,
    /// Whether calls went through the rate limiter
    pub rate_limited: bool,
    /// Calls attempted
    pub calls: usize,
    /// Calls that returned text
    pub succeeded: usize,
    /// Calls that failed
    pub failed: usize,
    /// Wall time for the whole batch
    pub elapsed_secs: f64,
    /// Completion tokens reported by the backend
    pub completion_tokens: usize,
    /// Distinct error messages, at most five
    pub errors: Vec<String>,
    /// Limiter state after the batch, when rate limited
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageSnapshot>,
}

/// Run `options.calls` generations concurrently and report the outcome.
///
/// # Errors
///
/// Returns an error if the backend or the rate limit manager cannot be built.
#[instrument(skip(config), fields(calls = options.calls, no_rate_limit = options.no_rate_limit))]
pub async fn run_simulation(
    config: &ScrivenerConfig,
    options: SimulateOptions,
) -> ScrivenerResult<SimulationReport> {
    let generator = build_generator(config.llm())?;
    let max_tokens = options.max_tokens.unwrap_or(*config.llm().max_tokens());

    if options.no_rate_limit || !*config.rate_limit().enabled() {
        if !options.no_rate_limit {
            warn!("Rate limiting disabled in configuration");
        }
        let gated = GatedGenerator::new(generator, PassThrough, max_tokens);
        Ok(fire(&gated, &options, max_tokens, false).await)
    } else {
        let manager = Arc::new(RateLimitManager::new(config.rate_limit().clone())?);
        let gated = GatedGenerator::new(generator, manager, max_tokens);
        Ok(fire(&gated, &options, max_tokens, true).await)
    }
}

async fn fire<L: CallGate>(
    generator: &GatedGenerator<Box<dyn TextGenerator>, L>,
    options: &SimulateOptions,
    max_tokens: u32,
    rate_limited: bool,
) -> SimulationReport {
    let request = GenerateRequest {
        max_tokens: Some(max_tokens),
        ..GenerateRequest::new(options.prompt.clone())
    };

    info!(
        provider = generator.provider_name(),
        model = generator.model_name(),
        "Starting simulation"
    );

    let start = Instant::now();
    let results = join_all((0..options.calls).map(|_| generator.generate(&request))).await;
    let elapsed = start.elapsed();

    let mut report = SimulationReport {
        provider: generator.provider_name(),
        model: generator.model_name().to_string(),
        rate_limited,
        calls: options.calls,
        succeeded: 0,
        failed: 0,
        elapsed_secs: elapsed.as_secs_f64(),
        completion_tokens: 0,
        errors: Vec::new(),
        usage: generator.usage(),
    };

    for result in results {
        match result {
            Ok(response) => {
                report.succeeded += 1;
                report.completion_tokens += response
                    .usage
                    .map(|u| *u.completion_tokens())
                    .unwrap_or(0);
            }
            Err(e) => {
                report.failed += 1;
                let message = e.to_string();
                if report.errors.len() < 5 && !report.errors.contains(&message) {
                    report.errors.push(message);
                }
            }
        }
    }

    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        elapsed_ms = elapsed.as_millis() as u64,
        "Simulation complete"
    );

    report
}

/// Render a report for humans.
pub fn render_human(report: &SimulationReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Backend:            {} ({})\n",
        report.provider, report.model
    ));
    out.push_str(&format!(
        "Rate limiting:      {}\n",
        if report.rate_limited { "on" } else { "off" }
    ));
    out.push_str(&format!(
        "Calls:              {} ok / {} failed of {}\n",
        report.succeeded, report.failed, report.calls
    ));
    out.push_str(&format!("Elapsed:            {:.2}s\n", report.elapsed_secs));
    out.push_str(&format!(
        "Completion tokens:  {}\n",
        report.completion_tokens
    ));

    if let Some(usage) = &report.usage {
        out.push_str(&format!(
            "Requests (1 min):   {} / {} ({:.1}%)\n",
            usage.requests_last_minute,
            usage.requests_per_minute_limit,
            usage.request_usage_percentage
        ));
        out.push_str(&format!(
            "Tokens (1 min):     {} / {} ({:.1}%)\n",
            usage.tokens_last_minute, usage.tokens_per_minute_limit, usage.token_usage_percentage
        ));
        out.push_str(&format!(
            "Concurrency:        {} in flight, {} of {} permits free\n",
            usage.concurrent_requests, usage.available_permits, usage.max_concurrent_requests
        ));
        out.push_str(&format!(
            "Attempts:           {} total, {} throttled, {} retried\n",
            usage.metrics.total_requests(),
            usage.metrics.rate_limited_requests(),
            usage.metrics.retried_requests()
        ));
        out.push_str(&format!(
            "Success rate:       {:.1}%\n",
            usage.success_rate
        ));
        out.push_str(&format!(
            "Avg response time:  {:.3}s\n",
            usage.metrics.average_response_time_secs()
        ));
        for (kind, info) in &usage.remote_limits {
            out.push_str(&format!(
                "Remote {:<12} {} / {} left, resets in {:.1}s\n",
                format!("{}:", kind),
                info.remaining(),
                info.limit(),
                info.reset_duration_secs()
            ));
        }
    }

    for error in &report.errors {
        out.push_str(&format!("Error: {}\n", error));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrivener::{LlmConfig, RateLimitConfig};

    fn config() -> ScrivenerConfig {
        ScrivenerConfig::new(
            RateLimitConfig::default(),
            LlmConfig::default().with_mock_delay_ms(10),
        )
    }

    fn options(calls: usize, no_rate_limit: bool) -> SimulateOptions {
        SimulateOptions {
            calls,
            prompt: "Write a complaint about a blender.".to_string(),
            max_tokens: Some(50),
            no_rate_limit,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulation_through_manager() {
        let report = run_simulation(&config(), options(5, false)).await.unwrap();
        assert_eq!(report.provider, "mock");
        assert!(report.rate_limited);
        assert_eq!(report.succeeded, 5);
        assert_eq!(report.failed, 0);

        let usage = report.usage.as_ref().unwrap();
        assert_eq!(usage.requests_last_minute, 5);
        assert_eq!(*usage.metrics.successful_requests(), 5);

        let rendered = render_human(&report);
        assert!(rendered.contains("5 ok / 0 failed of 5"));
        assert!(rendered.contains("Requests (1 min):   5 / 60"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulation_without_rate_limit() {
        let report = run_simulation(&config(), options(3, true)).await.unwrap();
        assert!(!report.rate_limited);
        assert_eq!(report.succeeded, 3);
        assert!(report.usage.is_none());

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("usage").is_none());
        assert_eq!(json["calls"], 3);
    }
}
