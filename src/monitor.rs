//! Raw traffic monitor and port listing for debugging and development.

use anyhow::{Context, Result};
use colored::*;
use std::time::Instant;

use crate::midi::{self, format_hex, MidiConnection};
use crate::protocol::{
    FAMILY_MEMORY, FAMILY_SETTINGS, IDENTITY_REPLY_PREFIX, SYSEX_START, SYSEX_STOP,
    VERSION_ANSWER_PREFIX, YAMAHA_ID,
};

fn looks_like_thr(name: &str) -> bool {
    name.to_lowercase().contains("thr")
}

/// List all ports in a formatted way
pub fn list_ports() -> Result<()> {
    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());

    let inputs = midi::list_input_ports().context("Failed to scan input ports")?;
    println!("\n{}", "Input Ports:".bold());
    if inputs.is_empty() {
        println!("  {}", "No input ports found".dimmed());
    }
    for (i, name) in inputs.iter().enumerate() {
        if looks_like_thr(name) {
            println!("  {}: {} {}", i, name, "[THR]".green());
        } else {
            println!("  {}: {}", i, name);
        }
    }

    let outputs = midi::list_output_ports().context("Failed to scan output ports")?;
    println!("\n{}", "Output Ports:".bold());
    if outputs.is_empty() {
        println!("  {}", "No output ports found".dimmed());
    }
    for (i, name) in outputs.iter().enumerate() {
        if looks_like_thr(name) {
            println!("  {}: {} {}", i, name, "[THR]".green());
        } else {
            println!("  {}: {}", i, name);
        }
    }

    println!();
    Ok(())
}

/// What a complete message is, judged by its prefix alone.
fn describe(msg: &[u8]) -> ColoredString {
    if msg.starts_with(&IDENTITY_REPLY_PREFIX) {
        return "identity reply".bright_green();
    }
    if msg.starts_with(&VERSION_ANSWER_PREFIX) {
        return "version answer".bright_cyan();
    }
    if msg.len() > 7 && msg[0] == SYSEX_START && msg[1..4] == YAMAHA_ID {
        if msg[4..7] == FAMILY_SETTINGS {
            return "settings frame".bright_yellow();
        }
        if msg[4..7] == FAMILY_MEMORY {
            return "memory frame".bright_magenta();
        }
    }
    if msg.first() == Some(&SYSEX_START) {
        return "foreign sysex".bright_black();
    }
    "realtime/other".bright_black()
}

fn print_message(timestamp_ms: u64, msg: &[u8]) {
    println!(
        "[{}ms] {:4}B | {} => {}",
        format!("{:08}", timestamp_ms).dimmed(),
        msg.len(),
        format_hex(msg),
        describe(msg)
    );
}

/// Monitor the amplifier's port and print every message as it arrives.
/// Runs until Ctrl+C.
pub async fn run_monitor(port_match: &str) -> Result<()> {
    println!("{}", "=== THR30II Traffic Monitor ===".bold().cyan());
    println!("Press Ctrl+C to exit\n");

    let mut conn = MidiConnection::new(port_match);
    conn.connect()?;
    let mut chunk_rx = conn
        .take_chunk_receiver()
        .context("Chunk receiver already taken")?;

    println!("{}", "Format: [timestamp] LEN | HEX => KIND".dimmed());
    println!("{}\n", "─".repeat(80).dimmed());

    let start = Instant::now();
    let mut pending: Vec<u8> = Vec::new();

    loop {
        tokio::select! {
            maybe_chunk = chunk_rx.recv() => {
                let Some(chunk) = maybe_chunk else { break };
                let timestamp_ms = start.elapsed().as_millis() as u64;
                if pending.is_empty() && chunk.first() != Some(&SYSEX_START) {
                    print_message(timestamp_ms, &chunk);
                    continue;
                }
                // join split SysEx so dump slices print whole
                pending.extend_from_slice(&chunk);
                if chunk.last() == Some(&SYSEX_STOP) {
                    let msg = std::mem::take(&mut pending);
                    print_message(timestamp_ms, &msg);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    println!("\n{}", "Monitor stopped".yellow());
    Ok(())
}
