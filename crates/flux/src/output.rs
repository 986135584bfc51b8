use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use flux_effect::{Channel, ChannelRecord, EffectDescriptor, Lifecycle};
use flux_session::{ExitReason, SessionStats};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct EffectOutput<'a> {
    verb: &'a str,
    kind: Lifecycle,
    required_headers: &'a [String],
    optional_headers: &'a [String],
    summary: &'a str,
}

pub fn print_effects(descriptors: &[&EffectDescriptor], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<EffectOutput<'_>> = descriptors
                .iter()
                .map(|d| EffectOutput {
                    verb: d.verb(),
                    kind: d.kind(),
                    required_headers: d.required_headers(),
                    optional_headers: d.optional_headers(),
                    summary: d.summary_text(),
                })
                .collect();
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["VERB", "KIND", "REQUIRED", "OPTIONAL", "SUMMARY"]);
            for d in descriptors {
                table.add_row(vec![
                    d.verb().to_string(),
                    d.kind().to_string(),
                    header_list(d.required_headers()),
                    header_list(d.optional_headers()),
                    d.summary_text().to_string(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for d in descriptors {
                println!(
                    "{} ({}) requires=[{}] accepts=[{}] {}",
                    d.verb(),
                    d.kind(),
                    d.required_headers().join(","),
                    d.optional_headers().join(","),
                    d.summary_text()
                );
            }
        }
    }
}

/// Result of replaying a captured stream.
#[derive(Debug, Serialize)]
pub struct ReplaySummary {
    pub source: String,
    pub exit: ExitReason,
    #[serde(flatten)]
    pub stats: SessionStats,
    pub channels: Vec<ChannelSummary>,
}

#[derive(Debug, Serialize)]
pub struct ChannelSummary {
    pub channel: Channel,
    /// Output left on the channel after teardown.
    pub output: String,
    /// Last output before the channel went dark.
    pub last_lit: Option<String>,
    pub writes: u64,
    pub changes: usize,
}

impl ChannelSummary {
    pub fn new(channel: Channel, record: &ChannelRecord) -> Self {
        Self {
            channel,
            output: record.current.to_string(),
            last_lit: record
                .history
                .iter()
                .rev()
                .find(|output| !output.is_off())
                .map(ToString::to_string),
            writes: record.writes,
            changes: record.history.len(),
        }
    }
}

pub fn print_replay(summary: &ReplaySummary, format: OutputFormat) {
    let stats = &summary.stats;
    match format {
        OutputFormat::Json => print_json(summary),
        OutputFormat::Table => {
            let mut totals = Table::new();
            totals
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "FRAMES", "DISPATCHED", "REJECTED", "OVERSIZED", "ACKS", "TICKS",
                ])
                .add_row(vec![
                    stats.frames.to_string(),
                    stats.dispatched.to_string(),
                    stats.rejected.to_string(),
                    stats.framing_errors.to_string(),
                    stats.acks.to_string(),
                    stats.ticks.to_string(),
                ]);
            println!("{totals}");

            let mut channels = Table::new();
            channels
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "OUTPUT", "LAST LIT", "WRITES", "CHANGES"]);
            for channel in &summary.channels {
                channels.add_row(vec![
                    channel.channel.to_string(),
                    channel.output.clone(),
                    channel.last_lit.clone().unwrap_or_else(|| "-".to_string()),
                    channel.writes.to_string(),
                    channel.changes.to_string(),
                ]);
            }
            println!("{channels}");
        }
        OutputFormat::Pretty => {
            println!(
                "source={} frames={} dispatched={} rejected={} oversized={} acks={} ticks={}",
                summary.source,
                stats.frames,
                stats.dispatched,
                stats.rejected,
                stats.framing_errors,
                stats.acks,
                stats.ticks
            );
            for channel in &summary.channels {
                println!(
                    "channel={} output={} last_lit={} writes={}",
                    channel.channel,
                    channel.output,
                    channel.last_lit.as_deref().unwrap_or("-"),
                    channel.writes
                );
            }
        }
    }
}

fn header_list(headers: &[String]) -> String {
    if headers.is_empty() {
        "-".to_string()
    } else {
        headers.join(", ")
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}
