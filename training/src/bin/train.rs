use clap::Parser;
use training::{run_train, TrainArgs};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();
    let args = TrainArgs::parse();
    run_train(args)
}
