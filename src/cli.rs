//! Command-line interface for cxxi.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use cxxi::LanguageVariant;
use target_lexicon::Triple;

#[derive(Parser)]
#[command(name = "cxxi")]
#[command(about = "Inspect native headers: lookup, layout and template instantiation", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every command that reads a header.
#[derive(Args)]
pub struct HeaderArgs {
    /// Header file to read
    pub header: PathBuf,

    /// Language of the header (`c` or `c++`)
    #[arg(long, short, default_value = "c++")]
    pub language: LanguageVariant,

    /// Target triple to lay out for (defaults to the host)
    #[arg(long)]
    pub target: Option<Triple>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the declarations of the header
    Dump {
        #[command(flatten)]
        header: HeaderArgs,
    },
    /// Print size and alignment of named types
    Layout {
        #[command(flatten)]
        header: HeaderArgs,
        /// Qualified type names (`ns::Point`)
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Instantiate a class template and print its layout
    Instantiate {
        #[command(flatten)]
        header: HeaderArgs,
        /// Qualified template name
        template: String,
        /// Arguments: builtin type names, class names or integers
        args: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_and_language_flags() {
        let cli = Cli::try_parse_from([
            "cxxi",
            "layout",
            "--target",
            "aarch64-unknown-linux-gnu",
            "-l",
            "c",
            "shapes.h",
            "Point",
        ])
        .unwrap();
        let Command::Layout { header, names } = cli.command else {
            panic!("expected the layout command");
        };
        assert_eq!(header.target.unwrap().to_string(), "aarch64-unknown-linux-gnu");
        assert_eq!(header.language, LanguageVariant::C);
        assert_eq!(names, ["Point"]);
    }

    #[test]
    fn test_unknown_target_is_rejected() {
        let result = Cli::try_parse_from(["cxxi", "dump", "--target", "not-a-triple-at-all", "a.h"]);
        assert!(result.is_err());
    }
}
