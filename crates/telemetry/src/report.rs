use serde::Serialize;
use std::collections::HashMap;
use toolgate_interfaces::TelemetryRecord;

/// Rank-based percentile: `sorted[floor(n * q)]`, clamped to the last
/// element. Returns 0 for an empty slice.
pub fn percentile(sorted: &[u64], q: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let index = (sorted.len() as f64 * q).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolUsage {
    pub tool_name: String,
    pub calls: usize,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenSavingsReport {
    pub total_calls: usize,
    pub failed_calls: usize,
    pub total_tokens: u64,
    pub average_tokens_per_call: f64,
    /// Tokens the same calls would have cost with every schema loaded upfront.
    pub naive_tokens: u64,
    pub estimated_savings: u64,
    pub savings_percent: f64,
    pub top_tools: Vec<ToolUsage>,
}

impl TokenSavingsReport {
    pub fn from_records(records: &[TelemetryRecord], naive_tokens_per_call: u64, top_n: usize) -> Self {
        let total_calls = records.len();
        let failed_calls = records.iter().filter(|r| !r.success).count();
        let total_tokens: u64 = records.iter().map(|r| r.tokens_used).sum();
        let average_tokens_per_call = if total_calls == 0 {
            0.0
        } else {
            total_tokens as f64 / total_calls as f64
        };
        let naive_tokens = naive_tokens_per_call.saturating_mul(total_calls as u64);
        let estimated_savings = naive_tokens.saturating_sub(total_tokens);
        let savings_percent = if naive_tokens == 0 {
            0.0
        } else {
            estimated_savings as f64 / naive_tokens as f64 * 100.0
        };

        let mut per_tool: HashMap<&str, ToolUsage> = HashMap::new();
        for record in records {
            let usage = per_tool.entry(&record.tool_name).or_insert_with(|| ToolUsage {
                tool_name: record.tool_name.clone(),
                calls: 0,
                total_tokens: 0,
            });
            usage.calls += 1;
            usage.total_tokens += record.tokens_used;
        }
        let mut top_tools: Vec<ToolUsage> = per_tool.into_values().collect();
        top_tools.sort_by(|a, b| {
            b.total_tokens
                .cmp(&a.total_tokens)
                .then_with(|| a.tool_name.cmp(&b.tool_name))
        });
        top_tools.truncate(top_n);

        Self {
            total_calls,
            failed_calls,
            total_tokens,
            average_tokens_per_call,
            naive_tokens,
            estimated_savings,
            savings_percent,
            top_tools,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolLatency {
    pub tool_name: String,
    pub calls: usize,
    pub average_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyReport {
    pub samples: usize,
    pub average_ms: f64,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
    /// Every tool, slowest mean latency first.
    pub slowest_tools: Vec<ToolLatency>,
}

impl LatencyReport {
    pub fn from_records(records: &[TelemetryRecord]) -> Self {
        let mut sorted: Vec<u64> = records.iter().map(|r| r.latency_ms).collect();
        sorted.sort_unstable();

        let samples = sorted.len();
        let average_ms = if samples == 0 {
            0.0
        } else {
            sorted.iter().sum::<u64>() as f64 / samples as f64
        };

        let mut per_tool: HashMap<&str, (usize, u64)> = HashMap::new();
        for record in records {
            let entry = per_tool.entry(&record.tool_name).or_insert((0, 0));
            entry.0 += 1;
            entry.1 += record.latency_ms;
        }
        let mut slowest_tools: Vec<ToolLatency> = per_tool
            .into_iter()
            .map(|(name, (calls, total))| ToolLatency {
                tool_name: name.to_string(),
                calls,
                average_ms: total as f64 / calls as f64,
            })
            .collect();
        slowest_tools.sort_by(|a, b| {
            b.average_ms
                .total_cmp(&a.average_ms)
                .then_with(|| a.tool_name.cmp(&b.tool_name))
        });

        Self {
            samples,
            average_ms,
            p50_ms: percentile(&sorted, 0.50),
            p95_ms: percentile(&sorted, 0.95),
            p99_ms: percentile(&sorted, 0.99),
            slowest_tools,
        }
    }
}

/// Plain-text rendering of both reports.
pub fn format_optimization_report(tokens: &TokenSavingsReport, latency: &LatencyReport) -> String {
    let mut lines = vec![
        "Tool Usage Optimization Report".to_string(),
        "==============================".to_string(),
        String::new(),
        "Token usage".to_string(),
        format!("  Calls:              {} ({} failed)", tokens.total_calls, tokens.failed_calls),
        format!("  Total tokens:       {}", tokens.total_tokens),
        format!("  Average per call:   {:.1}", tokens.average_tokens_per_call),
        format!("  Naive baseline:     {}", tokens.naive_tokens),
        format!(
            "  Estimated savings:  {} ({:.1}%)",
            tokens.estimated_savings, tokens.savings_percent
        ),
    ];

    if !tokens.top_tools.is_empty() {
        lines.push(String::new());
        lines.push("Top tools by tokens".to_string());
        for (i, usage) in tokens.top_tools.iter().enumerate() {
            lines.push(format!(
                "  {}. {}: {} tokens over {} calls",
                i + 1,
                usage.tool_name,
                usage.total_tokens,
                usage.calls
            ));
        }
    }

    lines.push(String::new());
    lines.push("Latency".to_string());
    lines.push(format!("  Samples:            {}", latency.samples));
    lines.push(format!("  Average:            {:.1} ms", latency.average_ms));
    lines.push(format!(
        "  p50 / p95 / p99:    {} / {} / {} ms",
        latency.p50_ms, latency.p95_ms, latency.p99_ms
    ));

    if !latency.slowest_tools.is_empty() {
        lines.push(String::new());
        lines.push("Slowest tools".to_string());
        for (i, tool) in latency.slowest_tools.iter().enumerate() {
            lines.push(format!(
                "  {}. {}: {:.1} ms average over {} calls",
                i + 1,
                tool.tool_name,
                tool.average_ms,
                tool.calls
            ));
        }
    }

    lines.join("\n")
}
