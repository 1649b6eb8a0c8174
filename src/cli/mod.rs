//! Command-line interface definitions, parsed with clap.

use clap::{Parser, Subcommand};

/// Filmarr - movie metadata pipeline
/// Scrapes IMDB title data, normalizes it into flat tables, and serves
/// content-based recommendations.
#[derive(Parser)]
#[command(name = "filmarr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Collect raw data from IMDB
    Collect {
        #[command(subcommand)]
        command: CollectCommands,
    },

    /// Normalize collected raw data into flat CSV tables
    Etl {
        #[command(subcommand)]
        command: EtlCommands,
    },

    /// Recommend titles similar to the given ones
    #[command(alias = "rec")]
    Recommend {
        /// Liked title ids, e.g. tt0468569
        #[arg(required = true)]
        titles: Vec<String>,

        /// Number of recommendations to print
        #[arg(long)]
        top_n: Option<usize>,
    },

    /// Create default config file
    #[command(alias = "--init")]
    Init,
}

#[derive(Subcommand)]
pub enum CollectCommands {
    /// Collect title identifiers from genre listings
    Ids,

    /// Collect metadata for every known title; resumes where it left off
    #[command(alias = "meta")]
    Metadata,

    /// Collect user reviews for every known title; resumes where it left off
    Reviews,
}

#[derive(Subcommand)]
pub enum EtlCommands {
    /// Normalize the raw metadata index into the main and child tables
    #[command(alias = "meta")]
    Metadata,

    /// Clean and concatenate the per-title review files
    Reviews,
}
