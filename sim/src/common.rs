//! Common utility functions for the simulation CLI.
//!
//! This module contains shared utilities:
//! - Logger initialization
//! - Path validation and CSV file discovery

use anyhow::{Result, bail};
use std::path::{Path, PathBuf};

/// Initialize the logger with the specified configuration.
///
/// # Arguments
/// * `log_level` - Log level string (off, error, warn, info, debug, trace)
/// * `log_file` - Optional path to log file (logs to stderr if None)
///
/// # Errors
/// Returns an error if the log file cannot be opened or logger initialization fails.
pub fn init_logger(log_level: &str, log_file: Option<&PathBuf>) -> Result<()> {
    use std::io::Write;

    let level = log_level.parse::<log::LevelFilter>().unwrap_or_else(|_| {
        eprintln!("Invalid log level '{}', defaulting to 'info'", log_level);
        log::LevelFilter::Info
    });

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.args()
        )
    });

    if let Some(log_path) = log_file {
        ensure_parent_dir(log_path)?;
        let target = Box::new(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)?,
        );
        builder.target(env_logger::Target::Pipe(target));
    }

    builder.try_init()?;
    Ok(())
}

/// Create the parent directory of `path` if it has one and it does not exist yet.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Validate input path exists and is either a file or directory.
///
/// # Errors
/// Returns an error if the path does not exist or is neither a file nor directory.
pub fn validate_input_path(input: &Path) -> Result<()> {
    if !input.exists() {
        bail!("Input path '{}' does not exist.", input.display());
    }
    if !input.is_file() && !input.is_dir() {
        bail!(
            "Input path '{}' is neither a file nor a directory.",
            input.display()
        );
    }
    Ok(())
}

/// Get all CSV files from a path (either single file or all CSVs in directory).
///
/// # Returns
/// A sorted vector of PathBuf for each CSV file found.
///
/// # Errors
/// Returns an error if:
/// - The input file is not a CSV
/// - No CSV files are found in the directory
/// - The path is neither a file nor directory
pub fn get_csv_files(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        if input.extension().and_then(|s| s.to_str()) != Some("csv") {
            bail!("Input file '{}' is not a CSV file.", input.display());
        }
        Ok(vec![input.to_path_buf()])
    } else if input.is_dir() {
        let mut csv_files: Vec<PathBuf> = std::fs::read_dir(input)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("csv")
            })
            .collect();

        if csv_files.is_empty() {
            bail!("No CSV files found in directory '{}'.", input.display());
        }

        // Sort for consistent ordering
        csv_files.sort();
        Ok(csv_files)
    } else {
        bail!(
            "Input path '{}' is neither a file nor a directory.",
            input.display()
        )
    }
}

/// Validate output path, creating it as a directory if it does not exist.
///
/// # Errors
/// Returns an error if directory creation fails or the path exists but is not a directory.
pub fn validate_output_path(output: &Path) -> Result<()> {
    if !output.exists() {
        std::fs::create_dir_all(output)?;
    } else if !output.is_dir() {
        bail!("Output path '{}' is not a directory.", output.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("potsim_{}_{}", std::process::id(), name));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_validate_input_path_missing() {
        assert!(validate_input_path(Path::new("definitely/not/here.csv")).is_err());
    }

    #[test]
    fn test_ensure_parent_dir_creates_missing_parent() {
        let dir = temp_dir("parent");
        let file = dir.join("nested").join("bids.csv");
        ensure_parent_dir(&file).unwrap();
        assert!(file.parent().unwrap().is_dir());
        assert!(!file.exists());
        // A bare file name has an empty parent and needs nothing created
        ensure_parent_dir(Path::new("bids.csv")).unwrap();
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_validate_output_path_creates_directory() {
        let dir = temp_dir("output").join("nested");
        validate_output_path(&dir).unwrap();
        assert!(dir.is_dir());
        let _ = std::fs::remove_dir_all(dir.parent().unwrap());
    }

    #[test]
    fn test_get_csv_files_sorted_and_filtered() {
        let dir = temp_dir("csv_files");
        std::fs::create_dir_all(&dir).unwrap();
        for name in ["b.csv", "a.csv", "notes.txt"] {
            std::fs::write(dir.join(name), "bid\n1.0\n").unwrap();
        }
        let files = get_csv_files(&dir).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
        assert!(get_csv_files(&dir.join("notes.txt")).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
