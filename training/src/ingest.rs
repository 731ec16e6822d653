use std::fs;
use std::io;
use std::net::TcpStream;
use std::path::{Path, PathBuf};

use ssh2::Session;
use zip::ZipArchive;

use crate::loader::PipelineError;

/// Remote archives and local destinations for the train/test splits.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub hostname: String,
    pub username: String,
    pub password: String,
    pub train_remote: String,
    pub test_remote: String,
    pub train_local_dir: PathBuf,
    pub test_local_dir: PathBuf,
}

/// Download both archives over SFTP and extract them in place.
pub fn run_ingest(config: &IngestConfig) -> Result<(), PipelineError> {
    tracing::info!("initiating data ingestion");
    fs::create_dir_all(&config.train_local_dir).map_err(PipelineError::wrap)?;
    fs::create_dir_all(&config.test_local_dir).map_err(PipelineError::wrap)?;

    let train_zip = config.train_local_dir.join(archive_name(&config.train_remote));
    let test_zip = config.test_local_dir.join(archive_name(&config.test_remote));

    tracing::info!("downloading train data");
    download_file_sftp(
        &config.hostname,
        &config.username,
        &config.password,
        &config.train_remote,
        &train_zip,
    )?;
    tracing::info!("downloading test data");
    download_file_sftp(
        &config.hostname,
        &config.username,
        &config.password,
        &config.test_remote,
        &test_zip,
    )?;

    tracing::info!("unzipping train data");
    unzip_file(&train_zip, &config.train_local_dir)?;
    tracing::info!("unzipping test data");
    unzip_file(&test_zip, &config.test_local_dir)?;

    tracing::info!("data ingestion completed");
    Ok(())
}

fn archive_name(remote: &str) -> String {
    remote
        .rsplit('/')
        .next()
        .unwrap_or(remote)
        .to_string()
}

/// Fetch one file over SFTP.
pub fn download_file_sftp(
    hostname: &str,
    username: &str,
    password: &str,
    remote_path: &str,
    local_path: &Path,
) -> Result<(), PipelineError> {
    let addr = if hostname.contains(':') {
        hostname.to_string()
    } else {
        format!("{hostname}:22")
    };
    let tcp = TcpStream::connect(&addr).map_err(PipelineError::wrap)?;
    let mut session = Session::new().map_err(PipelineError::wrap)?;
    session.set_tcp_stream(tcp);
    session.handshake().map_err(PipelineError::wrap)?;
    session
        .userauth_password(username, password)
        .map_err(PipelineError::wrap)?;

    let sftp = session.sftp().map_err(PipelineError::wrap)?;
    let mut remote_file = sftp.open(Path::new(remote_path)).map_err(PipelineError::wrap)?;
    let mut local_file = fs::File::create(local_path).map_err(PipelineError::wrap)?;
    io::copy(&mut remote_file, &mut local_file).map_err(PipelineError::wrap)?;

    tracing::info!(remote = remote_path, local = %local_path.display(), "downloaded");
    Ok(())
}

/// Extract a zip archive into `destination` and remove the archive.
pub fn unzip_file(archive_path: &Path, destination: &Path) -> Result<(), PipelineError> {
    let file = fs::File::open(archive_path).map_err(PipelineError::wrap)?;
    let mut archive = ZipArchive::new(file).map_err(PipelineError::wrap)?;
    archive.extract(destination).map_err(PipelineError::wrap)?;
    fs::remove_file(archive_path).map_err(PipelineError::wrap)?;
    tracing::info!(archive = %archive_path.display(), "unzipped");
    Ok(())
}
