// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! fieldlink command-line entry point.

use fieldlink_bin::cli::Cli;
use fieldlink_bin::commands;
use fieldlink_bin::error::report_error_and_exit;
use fieldlink_bin::logging::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    init_logging(cli.effective_log_level(), cli.log_format);

    if let Err(e) = commands::execute(cli).await {
        report_error_and_exit(e);
    }
}
