//! Flow output formatting
//!
//! Renders decoded NetFlow v5 records as text lines or JSON and writes them
//! to stdout, one datagram per write so concurrent workers never interleave.

use std::io::Write;
use std::net::Ipv4Addr;

use chrono::{DateTime, SecondsFormat, Utc};
use clap::ValueEnum;
use flowd_protocol::{FlowRecord, Header};
use flowd_sources::FlowsHandler;
use owo_colors::{OwoColorize, Style};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Human-readable text (default)
    #[default]
    Text,
    /// One JSON object per flow
    Json,
    /// No per-flow output; rely on the metrics reporter
    Quiet,
}

/// Color styles for terminal output
struct ColorStyles {
    timestamp: Style,
    label: Style,
    protocol: Style,
    counters: Style,
}

impl ColorStyles {
    fn new(enabled: bool) -> Self {
        if enabled {
            Self {
                timestamp: Style::new().dimmed(),
                label: Style::new().dimmed(),
                protocol: Style::new().cyan(),
                counters: Style::new().dimmed(),
            }
        } else {
            Self {
                timestamp: Style::new(),
                label: Style::new(),
                protocol: Style::new(),
                counters: Style::new(),
            }
        }
    }
}

/// Flow formatter
pub struct Formatter {
    format: Format,
    styles: ColorStyles,
}

impl Formatter {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            styles: ColorStyles::new(false),
        }
    }

    /// Enable or disable color output
    pub fn with_color(mut self, use_color: bool) -> Self {
        self.styles = ColorStyles::new(use_color && self.format == Format::Text);
        self
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Render every flow of one datagram, one line per flow
    pub fn format_datagram(&self, header: &Header, flows: &[FlowRecord]) -> String {
        let mut out = String::new();
        for (index, flow) in flows.iter().enumerate() {
            let line = match self.format {
                Format::Text => self.format_text(header, flow),
                Format::Json => format_json(header, index, flow),
                Format::Quiet => continue,
            };
            out.push_str(&line);
            out.push('\n');
        }
        out
    }

    fn format_text(&self, header: &Header, flow: &FlowRecord) -> String {
        let s = &self.styles;
        let ts = format_timestamp(header);
        let engine = format!("engine:{}/{}", header.engine_type, header.engine_id);
        let seq = format!("seq:{}", header.flow_sequence);
        let counters = format!(
            "pkts={} bytes={} dur={}ms",
            flow.packets,
            flow.octets,
            flow.duration_ms()
        );

        let mut line = format!(
            "{} {} {} {} {} -> {} {}",
            ts.style(s.timestamp),
            engine.style(s.label),
            seq.style(s.label),
            protocol_name(flow.protocol).style(s.protocol),
            endpoint(flow.src_ip(), flow.src_port),
            endpoint(flow.dst_ip(), flow.dst_port),
            counters.style(s.counters),
        );

        if flow.protocol == 6 {
            line.push_str(&format!(" flags={}", tcp_flags(flow.tcp_flags)));
        }
        if header.is_sampled() {
            line.push_str(&format!(" sampled=1/{}", header.sampling_rate()));
        }
        line
    }
}

/// One flow as emitted in JSON output
#[derive(Debug, Serialize)]
struct FlowOutput {
    timestamp: String,
    engine_type: u8,
    engine_id: u8,
    flow_sequence: u32,
    index: usize,
    src_addr: Ipv4Addr,
    src_port: u16,
    dst_addr: Ipv4Addr,
    dst_port: u16,
    next_hop: Ipv4Addr,
    protocol: u8,
    tcp_flags: u8,
    tos: u8,
    packets: u32,
    octets: u32,
    duration_ms: u32,
    input_iface: u16,
    output_iface: u16,
    src_as: u16,
    dst_as: u16,
    src_mask: u8,
    dst_mask: u8,
    sampling_rate: u32,
}

fn format_json(header: &Header, index: usize, flow: &FlowRecord) -> String {
    let output = FlowOutput {
        timestamp: format_timestamp(header),
        engine_type: header.engine_type,
        engine_id: header.engine_id,
        flow_sequence: header.flow_sequence,
        index,
        src_addr: flow.src_ip(),
        src_port: flow.src_port,
        dst_addr: flow.dst_ip(),
        dst_port: flow.dst_port,
        next_hop: flow.next_hop_ip(),
        protocol: flow.protocol,
        tcp_flags: flow.tcp_flags,
        tos: flow.tos,
        packets: flow.packets,
        octets: flow.octets,
        duration_ms: flow.duration_ms(),
        input_iface: flow.input_iface,
        output_iface: flow.output_iface,
        src_as: flow.src_as,
        dst_as: flow.dst_as,
        src_mask: flow.src_mask,
        dst_mask: flow.dst_mask,
        sampling_rate: header.sampling_rate(),
    };

    match serde_json::to_string(&output) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize flow");
            String::new()
        }
    }
}

/// Export time of the datagram in RFC 3339 with milliseconds
fn format_timestamp(header: &Header) -> String {
    DateTime::<Utc>::from_timestamp(i64::from(header.unix_secs), header.unix_nsecs)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| header.unix_secs.to_string())
}

fn protocol_name(protocol: u8) -> String {
    match protocol {
        1 => "ICMP".into(),
        6 => "TCP".into(),
        17 => "UDP".into(),
        47 => "GRE".into(),
        50 => "ESP".into(),
        58 => "ICMPv6".into(),
        other => format!("proto:{other}"),
    }
}

fn endpoint(addr: Ipv4Addr, port: u16) -> String {
    format!("{addr}:{port}")
}

/// TCP flags in tcpdump order, `.` for each flag not set
fn tcp_flags(flags: u8) -> String {
    const NAMES: [(u8, char); 6] = [
        (0x20, 'U'),
        (0x10, 'A'),
        (0x08, 'P'),
        (0x04, 'R'),
        (0x02, 'S'),
        (0x01, 'F'),
    ];

    NAMES
        .iter()
        .map(|&(bit, c)| if flags & bit != 0 { c } else { '.' })
        .collect()
}

/// [`FlowsHandler`] that prints every decoded flow to stdout
pub struct FlowWriter {
    formatter: Formatter,
}

impl FlowWriter {
    pub fn new(formatter: Formatter) -> Self {
        Self { formatter }
    }
}

impl FlowsHandler for FlowWriter {
    fn handle_flows(&self, header: &Header, flows: &[FlowRecord]) {
        if self.formatter.format() == Format::Quiet || flows.is_empty() {
            return;
        }

        let out = self.formatter.format_datagram(header, flows);
        if let Err(e) = std::io::stdout().lock().write_all(out.as_bytes()) {
            tracing::debug!(error = %e, "failed to write flows to stdout");
        }
    }
}

#[cfg(test)]
#[path = "output_test.rs"]
mod output_test;
