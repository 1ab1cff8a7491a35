//! CLI argument parsing for salvage

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "salvage")]
#[command(about = "Inventory, mount, format and diagnose block devices")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (TOML). Defaults to ~/.config/salvage/config.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Write logs to a timestamped file in this directory instead of stderr
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List disks and partitions
    List {
        /// Only mounted devices (system mounts hidden unless disabled in config)
        #[arg(long, conflicts_with = "unmounted")]
        mounted: bool,

        /// Only devices without a mount point
        #[arg(long)]
        unmounted: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Mount a device (mount point defaults to <mount_root>/<name>)
    Mount {
        device: String,

        #[arg(long)]
        mount_point: Option<String>,
    },

    /// Create a new filesystem on a device. DESTROYS ALL DATA on it.
    Format {
        device: String,

        /// ntfs, exfat, ext4, ext3, ext2, fat32, vfat or refs (default from config)
        #[arg(long = "fs")]
        fstype: Option<String>,

        /// Confirm that the device contents may be destroyed
        #[arg(long)]
        yes_i_know: bool,
    },

    /// Recursively grant everyone read/write access (chmod -R 777)
    Chmod { path: String },

    /// Open a directory in the first available file manager
    Open { path: String },

    /// SMART and filesystem diagnostics for a disk or partition
    Analyze {
        device: String,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,

        /// Also save the JSON report into this directory
        #[arg(long)]
        save_dir: Option<PathBuf>,
    },
}
