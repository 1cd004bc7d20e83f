//! Run driver: threads segments through prompt → oracle → merge in order
//! and owns the rewritten-so-far accumulation.
//!
//! Each function segment progresses scanned → prompted → completed →
//! merged → spliced; preamble and trailer segments are spliced verbatim
//! without an oracle call. Growing-context mode is strictly sequential
//! because segment *n*'s prompt depends on segment *n-1*'s accepted
//! text. Fixed-example mode may dispatch segments to the oracle
//! concurrently, but splicing always happens in original order.
//!
//! Retry policy lives here, not in the oracle client: rate-limit and
//! transport failures re-prompt the same segment after exponential
//! backoff up to a configured budget; exhaustion demotes the segment to
//! an unannotated pass-through. Auth failures abort the whole run.
//! A cooperative cancellation flag is checked between segments; on
//! cancellation the remaining segments are spliced verbatim so the
//! output is still a complete file.

use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use crate::boundary::{create_profile, find_boundaries};
use crate::config::Config;
use crate::merge::{merge, AnnotationStyle, MergePolicy};
use crate::models::{AnnotatedSegment, Segment, SegmentKind};
use crate::oracle::{CompletionParams, Oracle, OracleError};
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::prompt::{ContextMode, PromptBuilder};
use crate::segment::split;

/// One segment skipped during a run, with the reason it passed through
/// unannotated.
#[derive(Debug, Clone)]
pub struct Skip {
    pub identifier: String,
    pub reason: String,
}

/// Summary of what happened to each segment in a run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub segments: usize,
    pub functions: usize,
    pub annotated: usize,
    pub skipped: Vec<Skip>,
    /// Run was cancelled cooperatively; remaining segments were spliced
    /// verbatim.
    pub cancelled: bool,
    /// Credential was rejected mid-run and partial output was kept
    /// (config `keep_partial_on_auth_error`). Holds the failure detail.
    pub auth_aborted: Option<String>,
}

/// The annotated source plus the per-segment report.
#[derive(Debug)]
pub struct RunOutcome {
    pub output: String,
    pub report: RunReport,
}

#[derive(Debug, Clone)]
struct RetryPolicy {
    max_retries: u32,
    backoff_ms: u64,
}

impl RetryPolicy {
    /// Exponential backoff: base, 2×base, 4×base, … capped at 32×base.
    fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms << (attempt - 1).min(5))
    }
}

/// Annotate `source` end to end and return the rewritten text.
///
/// The oracle is injected so the pipeline runs against a stub in tests;
/// `cancel` is checked between segments, never mid-call.
pub async fn run(
    config: &Config,
    oracle: Arc<dyn Oracle>,
    source: &str,
    cancel: Arc<AtomicBool>,
    progress: &dyn ProgressReporter,
) -> Result<RunOutcome> {
    let style = config.annotate.annotation_style();
    let profile = create_profile(&config.annotate.language)?;
    let builder = Arc::new(PromptBuilder::new(&config.prompt, &config.oracle, style)?);
    let policy = MergePolicy::new(style, profile.as_ref());

    let boundaries = find_boundaries(source, profile.as_ref(), config.annotate.top_level_only);
    let segments = split(source, &boundaries);

    let functions = segments
        .iter()
        .filter(|s| s.kind == SegmentKind::FunctionBody)
        .count();
    progress.report(ProgressEvent::Scanned { functions });

    let params = CompletionParams {
        max_tokens: config.oracle.max_tokens,
        temperature: config.oracle.temperature,
        stop: builder.stop_sequence().to_string(),
    };
    let retry = RetryPolicy {
        max_retries: config.oracle.max_retries,
        backoff_ms: config.oracle.backoff_ms,
    };

    if builder.mode() == ContextMode::FixedExample && config.annotate.concurrency > 1 {
        run_concurrent(
            config, oracle, builder, policy, params, retry, segments, functions, cancel, progress,
        )
        .await
    } else {
        run_sequential(
            config, oracle, builder, policy, params, retry, segments, functions, cancel, progress,
        )
        .await
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_sequential(
    config: &Config,
    oracle: Arc<dyn Oracle>,
    builder: Arc<PromptBuilder>,
    policy: MergePolicy,
    params: CompletionParams,
    retry: RetryPolicy,
    segments: Vec<Segment>,
    functions: usize,
    cancel: Arc<AtomicBool>,
    progress: &dyn ProgressReporter,
) -> Result<RunOutcome> {
    let mut report = RunReport {
        segments: segments.len(),
        functions,
        ..Default::default()
    };
    let mut output = String::with_capacity(segments.iter().map(|s| s.raw_text.len()).sum());
    let mut n = 0usize;

    for (idx, segment) in segments.iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            report.cancelled = true;
            for rest in &segments[idx..] {
                output.push_str(&rest.raw_text);
            }
            break;
        }

        match segment.kind {
            SegmentKind::Preamble | SegmentKind::Trailer => output.push_str(&segment.raw_text),
            SegmentKind::FunctionBody => {
                n += 1;
                let identifier = segment.display_name().to_string();
                progress.report(ProgressEvent::Annotating {
                    n,
                    total: functions,
                    identifier: identifier.clone(),
                });

                match annotate_segment(
                    oracle.as_ref(),
                    &builder,
                    &policy,
                    &params,
                    &retry,
                    segment,
                    &output,
                )
                .await
                {
                    Ok(annotated) => {
                        record(&mut report, &identifier, &annotated);
                        output.push_str(&annotated.annotated_text);
                    }
                    Err(OracleError::Auth(detail)) => {
                        if config.annotate.keep_partial_on_auth_error {
                            report.auth_aborted = Some(detail);
                            break;
                        }
                        return Err(anyhow!("oracle authentication failed: {}", detail));
                    }
                    Err(e) => {
                        report.skipped.push(Skip {
                            identifier,
                            reason: e.to_string(),
                        });
                        output.push_str(&segment.raw_text);
                    }
                }
            }
        }
    }

    Ok(RunOutcome { output, report })
}

/// Fixed-example mode: segments are independent, so dispatch them in
/// bounded waves and splice results back in original order.
#[allow(clippy::too_many_arguments)]
async fn run_concurrent(
    config: &Config,
    oracle: Arc<dyn Oracle>,
    builder: Arc<PromptBuilder>,
    policy: MergePolicy,
    params: CompletionParams,
    retry: RetryPolicy,
    segments: Vec<Segment>,
    functions: usize,
    cancel: Arc<AtomicBool>,
    progress: &dyn ProgressReporter,
) -> Result<RunOutcome> {
    let fn_indices: Vec<usize> = segments
        .iter()
        .enumerate()
        .filter(|(_, s)| s.kind == SegmentKind::FunctionBody)
        .map(|(i, _)| i)
        .collect();

    let mut results: Vec<Option<Result<AnnotatedSegment, OracleError>>> =
        segments.iter().map(|_| None).collect();
    let mut report = RunReport {
        segments: segments.len(),
        functions,
        ..Default::default()
    };
    let mut dispatched = 0usize;

    for wave in fn_indices.chunks(config.annotate.concurrency) {
        if cancel.load(Ordering::Relaxed) {
            report.cancelled = true;
            break;
        }

        let mut set = JoinSet::new();
        for &idx in wave {
            dispatched += 1;
            let segment = segments[idx].clone();
            progress.report(ProgressEvent::Annotating {
                n: dispatched,
                total: functions,
                identifier: segment.display_name().to_string(),
            });

            let oracle = oracle.clone();
            let builder = builder.clone();
            let policy = policy.clone();
            let params = params.clone();
            let retry = retry.clone();
            set.spawn(async move {
                let result = annotate_segment(
                    oracle.as_ref(),
                    &builder,
                    &policy,
                    &params,
                    &retry,
                    &segment,
                    "",
                )
                .await;
                (idx, result)
            });
        }

        while let Some(joined) = set.join_next().await {
            let (idx, result) = joined.map_err(|e| anyhow!("annotation task failed: {}", e))?;
            results[idx] = Some(result);
        }

        // A rejected credential fails every later call the same way; stop
        // dispatching instead of hammering the endpoint with it.
        let auth_failed = wave
            .iter()
            .any(|&idx| matches!(results[idx], Some(Err(OracleError::Auth(_)))));
        if auth_failed {
            break;
        }
    }

    // Splice strictly in original segment order.
    let mut output = String::with_capacity(segments.iter().map(|s| s.raw_text.len()).sum());
    for (idx, segment) in segments.iter().enumerate() {
        match segment.kind {
            SegmentKind::Preamble | SegmentKind::Trailer => output.push_str(&segment.raw_text),
            SegmentKind::FunctionBody => {
                let identifier = segment.display_name().to_string();
                match results[idx].take() {
                    // Never dispatched (cancelled mid-run): verbatim.
                    None => output.push_str(&segment.raw_text),
                    Some(Ok(annotated)) => {
                        record(&mut report, &identifier, &annotated);
                        output.push_str(&annotated.annotated_text);
                    }
                    Some(Err(OracleError::Auth(detail))) => {
                        if config.annotate.keep_partial_on_auth_error {
                            report.auth_aborted = Some(detail);
                            break;
                        }
                        return Err(anyhow!("oracle authentication failed: {}", detail));
                    }
                    Some(Err(e)) => {
                        report.skipped.push(Skip {
                            identifier,
                            reason: e.to_string(),
                        });
                        output.push_str(&segment.raw_text);
                    }
                }
            }
        }
    }

    Ok(RunOutcome { output, report })
}

fn record(report: &mut RunReport, identifier: &str, annotated: &AnnotatedSegment) {
    if annotated.accepted {
        report.annotated += 1;
    } else {
        report.skipped.push(Skip {
            identifier: identifier.to_string(),
            reason: "unsafe edit rejected".to_string(),
        });
    }
}

/// Prompt, complete, and merge one function segment, retrying retryable
/// oracle failures with exponential backoff.
///
/// Returns `Err` only when the oracle failed terminally for this segment
/// (auth, malformed response, or retry budget exhausted); the caller
/// decides whether that is run-fatal. A merge rejection is a successful
/// return with `accepted = false` — the segment passes through once and
/// is never re-prompted.
async fn annotate_segment(
    oracle: &dyn Oracle,
    builder: &PromptBuilder,
    policy: &MergePolicy,
    params: &CompletionParams,
    retry: &RetryPolicy,
    segment: &Segment,
    accumulated: &str,
) -> Result<AnnotatedSegment, OracleError> {
    let prompt = builder.build(segment, accumulated);
    let payload = prompt.payload();
    let mut last_err = None;

    for attempt in 0..=retry.max_retries {
        if attempt > 0 {
            tokio::time::sleep(retry.delay(attempt)).await;
        }

        match oracle.complete(&payload, params).await {
            Ok(completion) => {
                let completion = builder.strip_sentinel_echo(&completion);
                let candidate = match policy.style {
                    AnnotationStyle::Comments => format!(
                        "{}\n{}",
                        prompt.primer,
                        completion.trim_start_matches('\n')
                    ),
                    AnnotationStyle::Docstring => completion,
                };
                return Ok(merge(segment, &candidate, policy));
            }
            Err(e) if e.is_retryable() => {
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| OracleError::Transport("retry budget exhausted".to_string())))
}
