// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `read`: Read one address of a device
//! - `write`: Write one address of a device
//! - `poll`: Read a variable map repeatedly and print JSON lines
//! - `validate`: Validate the device file
//! - `version`: Show version information

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

// =============================================================================
// Main CLI Structure
// =============================================================================

/// fieldlink - read and write industrial field devices
///
/// Talks Modbus/TCP, Siemens S7 and OPC-UA to the devices listed in a
/// YAML device file.
#[derive(Parser, Debug)]
#[command(
    name = "fieldlink",
    author = "Sylvex <contact@sylvex.io>",
    version = fieldlink_core::VERSION,
    about = "Read and write industrial field devices (Modbus/TCP, Siemens S7, OPC-UA)",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Device file path
    #[arg(
        short,
        long,
        default_value = "fieldlink.yaml",
        env = "FIELDLINK_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        short,
        long,
        default_value = "info",
        env = "FIELDLINK_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json, compact)
    #[arg(long, default_value = "text", env = "FIELDLINK_LOG_FORMAT", global = true)]
    pub log_format: LogFormat,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands for the fieldlink CLI.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Read one address of a device
    ///
    /// Modbus and Siemens addresses use the symbolic grammar (`hr.w2`,
    /// `db1.r4`, `mk8.3`); OPC-UA nodes are `<namespace>;<identifier>`.
    Read(ReadArgs),

    /// Write one value to an address of a device
    ///
    /// The value text is parsed as the data type of the address.
    Write(WriteArgs),

    /// Poll a variable map and print one JSON line per cycle
    Poll(PollArgs),

    /// Validate the device file
    ///
    /// Parses the file and checks every device and variable address
    /// without connecting to anything.
    Validate(ValidateArgs),

    /// Show version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `read` command.
#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// Device id from the device file
    pub device: String,

    /// Address to read
    pub address: String,
}

/// Arguments for the `write` command.
#[derive(Args, Debug, Clone)]
pub struct WriteArgs {
    /// Device id from the device file
    pub device: String,

    /// Address to write
    pub address: String,

    /// Value to write
    #[arg(allow_hyphen_values = true)]
    pub value: String,
}

/// Arguments for the `poll` command.
#[derive(Args, Debug, Clone)]
pub struct PollArgs {
    /// Device id from the device file
    pub device: String,

    /// Variable map to read (the default map when omitted)
    #[arg(short, long)]
    pub map: Option<String>,

    /// Time between two reads
    #[arg(short, long, default_value = "1s", value_parser = humantime::parse_duration)]
    pub interval: Duration,

    /// Stop after this many cycles (runs until Ctrl-C when omitted)
    #[arg(short = 'n', long)]
    pub count: Option<u64>,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Print the parsed device file after validation
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Strict mode: treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective log level based on flags.
    pub fn effective_log_level(&self) -> &str {
        if self.quiet {
            "warn"
        } else if self.verbose {
            "debug"
        } else {
            &self.log_level
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
