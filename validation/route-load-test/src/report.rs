//! Results reporting and formatting.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::Context;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use serde_json::json;
use tracing::info;

use crate::config::RunConfig;
use crate::metrics::Statistics;

/// Formats test results for output.
pub struct ResultsReport;

impl ResultsReport {
    /// Format results as a console table.
    pub fn format_table(stats: &Statistics, config: &RunConfig) -> String {
        let title = config.name().unwrap_or("Route Load Test");

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![format!("Load Test Results: {}", title)]);

        table.add_row(vec![
            "Duration:",
            &format!("{:.1}s", stats.elapsed().num_milliseconds() as f64 / 1000.0),
        ]);
        table.add_row(vec!["Workers:", &format!("{}", stats.workers.len())]);
        table.add_row(vec!["Total Requests:", &format!("{}", stats.total_requests)]);
        table.add_row(vec![
            "Successful / Failed:",
            &format!("{} / {}", stats.successful_requests, stats.failed_requests),
        ]);
        table.add_row(vec!["Success Rate:", &format!("{:.1}%", stats.success_rate)]);

        table.add_row(vec!["", ""]);
        table.add_row(vec!["Latency (ms)", "mean / min / max / stddev"]);
        table.add_row(vec![
            "",
            &format!(
                "{:.1} / {:.1} / {:.1} / {:.1}",
                stats.mean_latency_ms, stats.min_latency_ms, stats.max_latency_ms, stats.std_dev_ms
            ),
        ]);
        table.add_row(vec!["", "p50 / p90 / p95 / p99"]);
        table.add_row(vec![
            "",
            &format!(
                "{:.1} / {:.1} / {:.1} / {:.1}",
                stats.latency_p50_ms, stats.latency_p90_ms, stats.latency_p95_ms, stats.latency_p99_ms
            ),
        ]);

        table.to_string()
    }

    /// Format results as JSON.
    pub fn format_json(stats: &Statistics) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(stats)?)
    }

    /// Write the HTML report to the configured output path.
    pub fn write_html(stats: &Statistics, config: &RunConfig) -> anyhow::Result<()> {
        let path = config.output_path();
        info!(path = %path.display(), "Generating HTML report");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, Self::render_html(stats, config)?)
            .with_context(|| format!("failed to write report to {}", path.display()))?;

        info!("HTML report generated successfully");
        Ok(())
    }

    /// Render a self-contained HTML report.
    pub fn render_html(stats: &Statistics, config: &RunConfig) -> anyhow::Result<String> {
        let mut html = String::with_capacity(16 * 1024 + stats.outcomes.len() * 256);
        Self::write_document(&mut html, stats, config).context("failed to render HTML report")?;
        Ok(html)
    }

    fn write_document(out: &mut String, stats: &Statistics, config: &RunConfig) -> std::fmt::Result {
        writeln!(out, "<!DOCTYPE html>")?;
        writeln!(out, "<html lang=\"en\">")?;
        writeln!(out, "<head>")?;
        writeln!(out, "    <meta charset=\"UTF-8\">")?;
        writeln!(out, "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">")?;
        writeln!(out, "    <title>Routing Load Test Results</title>")?;
        writeln!(out, "    <script src=\"https://cdn.jsdelivr.net/npm/chart.js\"></script>")?;
        writeln!(out, "    <style>{}</style>", STYLE)?;
        writeln!(out, "</head>")?;
        writeln!(out, "<body>")?;
        writeln!(out, "<div class=\"container\">")?;

        // Header
        writeln!(out, "<div class=\"header\">")?;
        writeln!(out, "    <h1>Routing Load Test Results</h1>")?;
        if let Some(name) = config.name() {
            writeln!(out, "    <div class=\"test-name\">{}</div>", escape(name))?;
        }
        writeln!(
            out,
            "    <div class=\"test-info\">Test Duration: {} - {} UTC<br>Total Test Time: {:.2} minutes<br>Server: {} &middot; Center: {}</div>",
            stats.started_at.format("%Y-%m-%d %H:%M:%S"),
            stats.finished_at.format("%Y-%m-%d %H:%M:%S"),
            stats.elapsed().num_milliseconds() as f64 / 60_000.0,
            escape(config.base_url()),
            config.center(),
        )?;
        writeln!(out, "</div>")?;

        // Summary cards
        writeln!(out, "<div class=\"summary\">")?;
        stat_card(out, &stats.total_requests.to_string(), "Total Requests")?;
        stat_card(out, &stats.successful_requests.to_string(), "Successful Requests")?;
        stat_card(out, &format!("{:.1}%", stats.success_rate), "Success Rate")?;
        stat_card(out, &format!("{:.0}ms", stats.mean_latency_ms), "Avg Response Time")?;
        writeln!(out, "</div>")?;

        // Charts
        writeln!(out, "<div class=\"charts-container\">")?;
        chart_section(out, "Requests Over Time", "requestsOverTimeChart")?;
        chart_section(out, "Response Time Over Time", "responseTimeChart")?;
        writeln!(out, "</div>")?;

        // Detailed statistics
        writeln!(out, "<div class=\"details-section\">")?;
        writeln!(out, "    <h2>Detailed Statistics</h2>")?;
        writeln!(out, "    <table>")?;
        writeln!(out, "        <tr><th>Metric</th><th>Value</th></tr>")?;
        let rows = [
            ("Workers Started", stats.workers.len().to_string(), ""),
            ("Total Requests", stats.total_requests.to_string(), ""),
            ("Successful Requests", stats.successful_requests.to_string(), "success"),
            ("Failed Requests", stats.failed_requests.to_string(), "error"),
            ("Success Rate", format!("{:.2}%", stats.success_rate), ""),
            ("Average Response Time", format!("{:.2} ms", stats.mean_latency_ms), ""),
            ("Min Response Time", format!("{:.2} ms", stats.min_latency_ms), ""),
            ("Max Response Time", format!("{:.2} ms", stats.max_latency_ms), ""),
            ("Standard Deviation", format!("{:.2} ms", stats.std_dev_ms), ""),
            ("p50 / p95 / p99", format!(
                "{:.2} / {:.2} / {:.2} ms",
                stats.latency_p50_ms, stats.latency_p95_ms, stats.latency_p99_ms
            ), ""),
        ];
        for (label, value, class) in rows {
            writeln!(out, "        <tr><td>{}</td><td class=\"{}\">{}</td></tr>", label, class, value)?;
        }
        writeln!(out, "    </table>")?;
        writeln!(out, "</div>")?;

        // All requests, oldest first
        writeln!(out, "<div class=\"details-section\">")?;
        writeln!(out, "    <h2>All Requests</h2>")?;
        writeln!(out, "    <div class=\"details\">")?;
        writeln!(out, "    <table>")?;
        writeln!(
            out,
            "        <tr><th>Worker</th><th>Request Time</th><th>Response Time (ms)</th><th>Status</th><th>Error</th></tr>"
        )?;
        for outcome in &stats.outcomes {
            let (class, status) = if outcome.success {
                ("success", "Success")
            } else {
                ("error", "Failed")
            };
            writeln!(
                out,
                "        <tr><td>{}</td><td>{}</td><td>{:.0}</td><td class=\"{}\">{}</td><td>{}</td></tr>",
                outcome.request.worker_id,
                outcome.request.issued_at.format("%H:%M:%S%.3f"),
                outcome.latency_ms(),
                class,
                status,
                escape(outcome.error_detail.as_deref().unwrap_or("")),
            )?;
        }
        writeln!(out, "    </table>")?;
        writeln!(out, "    </div>")?;
        writeln!(out, "</div>")?;

        // Chart data
        let labels: Vec<String> = stats
            .outcomes
            .iter()
            .map(|o| o.request.issued_at.format("%H:%M:%S").to_string())
            .collect();
        let numbers: Vec<usize> = (1..=stats.outcomes.len()).collect();
        let (ok_labels, ok_latencies): (Vec<String>, Vec<f64>) = stats
            .outcomes
            .iter()
            .filter(|o| o.success)
            .map(|o| (o.request.issued_at.format("%H:%M:%S").to_string(), o.latency_ms().round()))
            .unzip();

        writeln!(out, "<script>")?;
        writeln!(out, "Chart.defaults.color = '#b0b0b0';")?;
        writeln!(out, "Chart.defaults.borderColor = '#555555';")?;
        writeln!(out, "{}", CHART_HELPER)?;
        writeln!(
            out,
            "lineChart('requestsOverTimeChart', {}, {}, 'Request Number', '#4a9eff', 'rgba(74, 158, 255, 0.1)', true);",
            json!(labels),
            json!(numbers)
        )?;
        writeln!(
            out,
            "lineChart('responseTimeChart', {}, {}, 'Response Time (ms)', '#28a745', 'rgba(40, 167, 69, 0.1)', false);",
            json!(ok_labels),
            json!(ok_latencies)
        )?;
        writeln!(out, "</script>")?;

        writeln!(out, "</div>")?;
        writeln!(out, "</body>")?;
        writeln!(out, "</html>")?;
        Ok(())
    }
}

fn stat_card(out: &mut String, value: &str, label: &str) -> std::fmt::Result {
    writeln!(
        out,
        "    <div class=\"stat-card\"><div class=\"stat-value\">{}</div><div class=\"stat-label\">{}</div></div>",
        value, label
    )
}

fn chart_section(out: &mut String, title: &str, canvas_id: &str) -> std::fmt::Result {
    writeln!(
        out,
        "    <div class=\"chart-section\"><h2>{}</h2><div class=\"chart-container\"><canvas id=\"{}\"></canvas></div></div>",
        title, canvas_id
    )
}

/// Minimal HTML escaping for text nodes and attribute values.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Open a report in the platform's default viewer.
pub fn open_in_browser(path: &Path) -> anyhow::Result<()> {
    use std::process::Command;

    let status = if cfg!(target_os = "windows") {
        Command::new("cmd").args(["/C", "start", ""]).arg(path).status()
    } else if cfg!(target_os = "macos") {
        Command::new("open").arg(path).status()
    } else {
        Command::new("xdg-open").arg(path).status()
    }
    .context("failed to launch browser")?;

    if !status.success() {
        anyhow::bail!("browser launcher exited with {}", status);
    }
    Ok(())
}

const STYLE: &str = r#"
:root { --bg-primary: #1a1a1a; --bg-secondary: #2d2d2d; --bg-card: #3a3a3a; --text-primary: #ffffff;
        --text-secondary: #b0b0b0; --accent-primary: #4a9eff; --accent-success: #28a745;
        --accent-error: #dc3545; --border-color: #555555; }
body { font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; margin: 0; padding: 20px;
       background-color: var(--bg-primary); color: var(--text-primary); line-height: 1.6; }
.container { max-width: 1400px; margin: 0 auto; }
.header { text-align: center; margin-bottom: 40px; }
.header h1 { color: var(--accent-primary); margin-bottom: 10px; font-size: 2.5em; }
.header .test-name { color: var(--accent-primary); font-size: 1.4em; margin-bottom: 15px; font-weight: 600; }
.header .test-info { color: var(--text-secondary); font-size: 1.1em; }
.summary { display: grid; grid-template-columns: repeat(auto-fit, minmax(280px, 1fr)); gap: 20px; margin-bottom: 40px; }
.stat-card { background: var(--bg-card); padding: 25px; border-radius: 12px; text-align: center;
             border: 1px solid var(--border-color); box-shadow: 0 4px 6px rgba(0, 0, 0, 0.3); }
.stat-value { font-size: 2.2em; font-weight: bold; color: var(--accent-primary); margin-bottom: 8px; }
.stat-label { color: var(--text-secondary); font-size: 1.1em; }
.charts-container { display: grid; grid-template-columns: 1fr 1fr; gap: 30px; margin-bottom: 40px; }
.chart-section, .details-section { background: var(--bg-card); padding: 25px; border-radius: 12px;
                                   border: 1px solid var(--border-color); margin-bottom: 30px; }
.chart-section h2, .details-section h2 { color: var(--accent-primary); margin-top: 0; margin-bottom: 20px; font-size: 1.4em; }
.chart-container { width: 100%; height: 400px; }
@media (max-width: 1024px) { .charts-container { grid-template-columns: 1fr; } }
table { width: 100%; border-collapse: collapse; }
th, td { border: 1px solid var(--border-color); padding: 12px; text-align: left; }
th { background-color: var(--bg-secondary); font-weight: 600; }
td { background-color: var(--bg-card); }
.success { color: var(--accent-success); font-weight: 600; }
.error { color: var(--accent-error); font-weight: 600; }
.details { max-height: 500px; overflow-y: auto; }
"#;

const CHART_HELPER: &str = r#"
function lineChart(id, labels, data, label, color, fillColor, fill) {
    new Chart(document.getElementById(id).getContext('2d'), {
        type: 'line',
        data: { labels: labels, datasets: [{ label: label, data: data, borderColor: color,
                backgroundColor: fillColor, tension: 0.1, fill: fill }] },
        options: {
            responsive: true, maintainAspectRatio: false,
            plugins: { legend: { labels: { color: '#b0b0b0' } } },
            scales: {
                y: { beginAtZero: true, title: { display: true, text: label, color: '#b0b0b0' },
                     ticks: { color: '#b0b0b0' }, grid: { color: '#555555' } },
                x: { title: { display: true, text: 'Time', color: '#b0b0b0' },
                     ticks: { color: '#b0b0b0' }, grid: { color: '#555555' } }
            }
        }
    });
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{RouteOutcome, RouteRequest};
    use crate::config::RunSettings;
    use crate::coordinate::Coordinate;
    use chrono::Utc;
    use std::time::Duration;

    fn sample() -> (Statistics, RunConfig) {
        let target = Coordinate::new(51.5074, -0.1278);
        let ok = RouteOutcome::success(
            RouteRequest::new(1, Coordinate::new(51.9, -0.4), target),
            Duration::from_millis(120),
            None,
        );
        let failed = RouteOutcome::failure(
            RouteRequest::new(2, Coordinate::new(51.1, 0.2), target),
            Duration::from_millis(30),
            "HTTP 400: <no route> & \"bad\"",
        );
        let now = Utc::now();
        let stats = Statistics::from_outcomes(vec![ok, failed], now, now, Vec::new());

        let settings = RunSettings {
            name: Some("Nightly <London>".to_string()),
            ..Default::default()
        };
        (stats, settings.validate().unwrap())
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("<a href='x'>&\"</a>"), "&lt;a href=&#39;x&#39;&gt;&amp;&quot;&lt;/a&gt;");
        assert_eq!(escape("plain"), "plain");
    }

    #[test]
    fn test_html_contains_summary_and_escaped_errors() {
        let (stats, config) = sample();
        let html = ResultsReport::render_html(&stats, &config).unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Nightly &lt;London&gt;"));
        assert!(html.contains("<div class=\"stat-value\">2</div>"));
        assert!(html.contains("50.0%"));
        assert!(html.contains("HTTP 400: &lt;no route&gt; &amp; &quot;bad&quot;"));
        assert!(!html.contains("<no route>"));
        assert!(html.contains("requestsOverTimeChart"));
        assert!(html.contains("responseTimeChart"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn test_write_html_to_nested_path() {
        let (stats, _) = sample();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("run.html");
        let settings = RunSettings {
            output: path.clone(),
            ..Default::default()
        };
        let config = settings.validate().unwrap();

        ResultsReport::write_html(&stats, &config).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("All Requests"));
    }

    #[test]
    fn test_table_and_json() {
        let (stats, config) = sample();
        let table = ResultsReport::format_table(&stats, &config);
        assert!(table.contains("Load Test Results: Nightly <London>"));
        assert!(table.contains("50.0%"));

        let json: serde_json::Value =
            serde_json::from_str(&ResultsReport::format_json(&stats).unwrap()).unwrap();
        assert_eq!(json["total_requests"], 2);
        assert_eq!(json["successful_requests"], 1);
        assert!(json["outcomes"][0]["request"]["worker_id"].as_u64().is_some());
    }
}
