use std::io::{self, Write};
use std::path::PathBuf;

use sitegram_crawler::RankedResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Format {
    /// One `<ngram> - <count>` line per entry
    #[default]
    Text,
    /// `ngram,count` records with a header
    Csv,
}

#[derive(Debug, clap::Args)]
pub struct OutputArgs {
    /// Output format of the ranking
    #[arg(value_enum, long, default_value = "text")]
    pub format: Format,
    /// Write the ranking to this file instead of stdout
    #[arg(long)]
    pub output_file: Option<PathBuf>,
}

pub enum Output {
    File(fs_err::File),
    Stdout(io::Stdout),
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::File(f) => f.write(buf),
            Self::Stdout(out) => out.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::File(f) => f.flush(),
            Self::Stdout(out) => out.flush(),
        }
    }
}

impl OutputArgs {
    pub fn open(&self) -> io::Result<Output> {
        match &self.output_file {
            Some(path) => Ok(Output::File(fs_err::File::create(path)?)),
            None => Ok(Output::Stdout(io::stdout())),
        }
    }
}

pub fn write_ranking<W: Write>(
    mut out: W,
    format: Format,
    ranked: &RankedResult,
) -> anyhow::Result<()> {
    match format {
        Format::Text => {
            for entry in ranked {
                writeln!(out, "{} - {}", entry.ngram, entry.count)?;
            }
            out.flush()?;
        }
        Format::Csv => {
            let mut wtr = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(out);
            wtr.write_record(["ngram", "count"])?;
            for entry in ranked {
                wtr.serialize(entry)?;
            }
            wtr.flush()?;
        }
    }
    Ok(())
}
