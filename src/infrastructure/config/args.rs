use super::app_config::LogLevel;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "imagepress",
    version,
    about = "Cached, retrying batch image compression",
    long_about = None
)]
pub struct CliArgs {
    /// Configuration file path.
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Log file path.
    #[arg(long, value_name = "PATH", global = true)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum, global = true)]
    pub log_level: Option<LogLevel>,

    /// Directory holding cached results.
    #[arg(long, value_name = "PATH", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Directory holding analytics and other records.
    #[arg(long, value_name = "PATH", global = true)]
    pub data_dir: Option<PathBuf>,

    /// API key for the upload endpoint.
    #[arg(long, env = "IMAGEPRESS_UPLOAD_API_KEY", hide_env_values = true, global = true)]
    pub upload_api_key: Option<String>,

    /// Upload endpoint URL.
    #[arg(long, env = "IMAGEPRESS_UPLOAD_URL", global = true)]
    pub upload_url: Option<String>,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
#[allow(missing_docs)]
pub enum Command {
    /// Compress images and write the results to the output directory.
    Process {
        /// Input image files.
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,

        #[command(flatten)]
        overrides: ParameterOverrides,

        /// Output directory.
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Compress images and upload them.
    Upload {
        /// Input image files.
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,

        #[command(flatten)]
        overrides: ParameterOverrides,

        /// Title attached to every upload.
        #[arg(long)]
        title: Option<String>,

        /// Category, repeatable.
        #[arg(long = "category", value_name = "NAME")]
        categories: Vec<String>,

        /// Tag, repeatable.
        #[arg(long = "tag", value_name = "NAME")]
        tags: Vec<String>,

        /// Product the images belong to.
        #[arg(long)]
        product_id: Option<String>,
    },

    /// Show usage statistics and cache occupancy.
    Stats,

    /// Remove every cached result.
    ClearCache,

    /// Reset usage statistics.
    ClearAnalytics,
}

/// Per-run overrides of the configured processing defaults.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct ParameterOverrides {
    /// JPEG quality, 1 to 100.
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub quality: Option<u32>,

    /// Maximum output width, 0 for unbounded.
    #[arg(long)]
    pub max_width: Option<u32>,

    /// Maximum output height, 0 for unbounded.
    #[arg(long)]
    pub max_height: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_process() {
        let args = CliArgs::parse_from([
            "imagepress",
            "process",
            "a.png",
            "b.jpg",
            "--quality",
            "70",
            "--max-width",
            "800",
            "-o",
            "out",
        ]);

        let Command::Process {
            files,
            overrides,
            output,
        } = args.command
        else {
            panic!("expected process command");
        };
        assert_eq!(files, vec![PathBuf::from("a.png"), PathBuf::from("b.jpg")]);
        assert_eq!(overrides.quality, Some(70));
        assert_eq!(overrides.max_width, Some(800));
        assert_eq!(overrides.max_height, None);
        assert_eq!(output, Some(PathBuf::from("out")));
    }

    #[test]
    fn test_parse_upload_repeated_flags() {
        let args = CliArgs::parse_from([
            "imagepress",
            "upload",
            "a.png",
            "--title",
            "Shoes",
            "--category",
            "men",
            "--category",
            "sale",
            "--tag",
            "red",
        ]);

        let Command::Upload {
            title,
            categories,
            tags,
            ..
        } = args.command
        else {
            panic!("expected upload command");
        };
        assert_eq!(title.as_deref(), Some("Shoes"));
        assert_eq!(categories, vec!["men".to_string(), "sale".to_string()]);
        assert_eq!(tags, vec!["red".to_string()]);
    }

    #[test]
    fn test_rejects_out_of_range_quality() {
        assert!(CliArgs::try_parse_from(["imagepress", "process", "a.png", "-q", "0"]).is_err());
        assert!(CliArgs::try_parse_from(["imagepress", "process"]).is_err());
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let args = CliArgs::parse_from(["imagepress", "stats", "--data-dir", "/tmp/data"]);
        assert!(matches!(args.command, Command::Stats));
        assert_eq!(args.data_dir, Some(PathBuf::from("/tmp/data")));
    }
}
