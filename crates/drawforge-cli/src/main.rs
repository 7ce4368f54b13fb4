mod command;
mod config;
mod dataset;
mod logging;
mod util;

fn main() -> anyhow::Result<()> {
    command::run()
}
