//! Swagger from comments - Command-line tool for generating Swagger 1.2 documents.
//!
//! Scans Go (or Rust) packages for annotated functions such as
//!
//! ```text
//! // @Title getOrder
//! // @Param id path int true "Order id"
//! // @Success 200 {object} models.Order
//! // @Router /orders/{id} [get]
//! ```
//!
//! and writes the resource listing and the per-resource API declarations as one document.
//!
//! # Usage
//!
//! ```bash
//! swagger-from-comments --api-package github.com/acme/shop/api [OPTIONS]
//! ```
//!
//! # Examples
//!
//! Generate JSON documentation using `GOPATH` from the environment:
//! ```bash
//! swagger-from-comments --api-package github.com/acme/shop/api -o swagger.json
//! ```
//!
//! Only parse controller methods and fail on any unresolvable type:
//! ```bash
//! swagger-from-comments --api-package github.com/acme/shop/api \
//!     --controller-class 'Controller$' --strict -f yaml
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use swagger_from_comments::cli;

fn main() -> Result<()> {
    // We need to parse args twice: once to get verbose flag, then again after logger init
    let args_for_verbose = cli::CliArgs::parse();

    let log_level = if args_for_verbose.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("Swagger from comments starting...");

    let args = cli::parse_args_from_parsed(args_for_verbose)?;

    cli::run(args)?;

    info!("Swagger document generation completed successfully");

    Ok(())
}
