use clap::Parser;
use training::ingest::{run_ingest, IngestConfig};

#[derive(Parser, Debug)]
#[command(name = "ingest", about = "Download and extract the train/test archives over SFTP")]
struct Args {
    /// SFTP host (port 22 unless given as host:port).
    #[arg(long, default_value = "L3i-Share.univ-lr.fr")]
    host: String,
    /// SFTP username.
    #[arg(long, default_value = "findit-participant")]
    user: String,
    /// SFTP password.
    #[arg(long)]
    password: String,
    /// Remote path of the training archive.
    #[arg(long, default_value = "findit/FindIt-Dataset-Train.zip")]
    train_remote: String,
    /// Remote path of the test archive.
    #[arg(long, default_value = "findit/FindIt-Dataset-Test.zip")]
    test_remote: String,
    /// Local directory for training data.
    #[arg(long, default_value = "artifacts/train_data")]
    train_local_dir: String,
    /// Local directory for test data.
    #[arg(long, default_value = "artifacts/test_data")]
    test_local_dir: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();
    let config = IngestConfig {
        hostname: args.host,
        username: args.user,
        password: args.password,
        train_remote: args.train_remote,
        test_remote: args.test_remote,
        train_local_dir: args.train_local_dir.into(),
        test_local_dir: args.test_local_dir.into(),
    };
    run_ingest(&config)?;
    Ok(())
}
