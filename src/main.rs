#![doc = include_str!("../README.md")]
use log::LevelFilter;
use std::process::ExitCode;
use structopt::StructOpt;

use docudactyl::config::Config;
use docudactyl::orchestrator;

#[macro_use]
extern crate log;

fn main() -> ExitCode {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Info);
    builder.parse_env("RUST_LOG");
    builder.init();

    let cfg = Config::from_args();
    debug!("cli args\n{:#?}", cfg);

    match orchestrator::run(&cfg) {
        Ok(report) => {
            println!("{}", report.summary_line());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("run failed before completion: {e}");
            ExitCode::FAILURE
        }
    }
}
