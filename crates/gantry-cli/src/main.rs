mod commands;
mod flows;
mod render;

#[cfg(test)]
mod tests;

use std::process::ExitCode;

use clap::Parser;

use crate::flows::{run_cli, Cli};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("GANTRY_LOG", "warn"))
        .init();

    let cli = Cli::parse();
    match run_cli(cli) {
        Ok(code) => code,
        Err(err) => {
            render::print_error(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}
