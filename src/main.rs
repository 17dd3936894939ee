use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use sheet_summary::ColumnSelection;
use sheet_summary::Config;
use sheet_summary::Session;
use sheet_summary::Source;
use sheet_summary::SummarySpec;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// File extensions read as spreadsheets rather than delimited text.
const SPREADSHEET_EXTENSIONS: [&str; 4] = ["xls", "xlsx", "xlsm", "ods"];

#[derive(Parser, Debug)]
#[command(name = "sheet-summary")]
#[command(about = "Clean a spreadsheet or pasted table and summarize it")]
#[command(version)]
struct Cli {
    /// Spreadsheet (.xls, .xlsx, .xlsm, .ods) or delimited text file; `-` or omitted reads stdin
    file: Option<PathBuf>,

    /// Read the input as delimited text whatever its extension
    #[arg(long)]
    text: bool,

    /// Column to group by (repeatable)
    #[arg(short, long = "group", value_name = "ID")]
    group: Vec<String>,

    /// Numeric column to sum per group (repeatable)
    #[arg(short, long = "sum", value_name = "ID")]
    sum: Vec<String>,

    /// Add a column dividing one summed column by another
    #[arg(long, num_args = 2, value_names = ["NUM", "DEN"])]
    ratio: Option<Vec<String>>,

    /// Print the total of one numeric column
    #[arg(long, value_name = "ID")]
    total: Option<String>,

    /// Drop rows whose fraction of empty cells reaches this value
    #[arg(long)]
    row_null_threshold: Option<f64>,

    /// Minimum non-empty cells of the rows bounding the data block
    #[arg(long)]
    min_anchor_values: Option<usize>,

    /// Fraction of values that must be numbers to convert a text column
    #[arg(long)]
    numeric_ratio: Option<f64>,
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::default();
        if let Some(threshold) = self.row_null_threshold {
            config.row_null_threshold = threshold;
        }
        if let Some(minimum) = self.min_anchor_values {
            config.min_anchor_values = minimum;
        }
        if let Some(ratio) = self.numeric_ratio {
            config.numeric_ratio = ratio;
        }
        config
    }

    fn input_path(&self) -> Option<&Path> {
        self.file.as_deref().filter(|path| *path != Path::new("-"))
    }

    fn is_spreadsheet(&self) -> bool {
        !self.text
            && self
                .input_path()
                .and_then(|path| path.extension())
                .and_then(|extension| extension.to_str())
                .is_some_and(|extension| {
                    SPREADSHEET_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(extension))
                })
    }

    fn summary_spec(&self) -> Option<SummarySpec> {
        if self.group.is_empty() && self.sum.is_empty() {
            return None;
        }
        let spec = SummarySpec::new(
            ColumnSelection::new(self.group.iter().cloned()),
            ColumnSelection::new(self.sum.iter().cloned()),
        );
        Some(match self.ratio.as_deref() {
            Some([numerator, denominator]) => spec.with_ratio(numerator.as_str(), denominator.as_str()),
            _ => spec,
        })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let bytes = read_input(cli.input_path())?;
    let source = if cli.is_spreadsheet() {
        Source::Spreadsheet(&bytes)
    } else {
        Source::TextBytes(&bytes)
    };

    let mut session = Session::new(cli.config());
    let Some(table) = session.ingest(source).context("Failed to process input")? else {
        println!("No data to process");
        return Ok(());
    };
    println!("{} rows • {} columns", table.row_count(), table.column_count());
    println!("{table}");
    let numeric = table.numeric_columns().join(", ");
    println!("Numeric columns: {}", if numeric.is_empty() { "none" } else { numeric.as_str() });

    if let Some(spec) = cli.summary_spec() {
        let summary = session.summarize(&spec).context("Failed to build summary")?;
        println!();
        println!("{}", summary.table());
        for (id, total) in summary.totals() {
            println!("Total {id}: {}", format_amount(*total));
        }
    }

    if let Some(id) = &cli.total {
        let total = session
            .column_total(id)
            .with_context(|| format!("Failed to total column '{id}'"))?;
        println!();
        println!("{id} total: {}", format_amount(total));
    }
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => std::fs::read(path).with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut bytes = Vec::new();
            std::io::stdin()
                .read_to_end(&mut bytes)
                .context("Failed to read standard input")?;
            Ok(bytes)
        }
    }
}

/// Formats `value` with two decimals and comma-grouped thousands.
fn format_amount(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let text = format!("{:.2}", value.abs());
    let (whole, fraction) = text.split_once('.').unwrap_or((text.as_str(), "00"));
    let mut grouped = String::new();
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{fraction}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_are_grouped() {
        assert_eq!(format_amount(0.0), "0.00");
        assert_eq!(format_amount(1234567.891), "1,234,567.89");
        assert_eq!(format_amount(-1000.5), "-1,000.50");
        assert_eq!(format_amount(f64::NAN), "NaN");
    }

    #[test]
    fn parses_arguments() {
        let cli = Cli::parse_from([
            "sheet-summary",
            "report.XLSX",
            "--group",
            "Col_0",
            "--sum",
            "Col_1",
            "--sum",
            "Col_2",
            "--ratio",
            "Col_1",
            "Col_2",
            "--numeric-ratio",
            "0.75",
        ]);
        assert!(cli.is_spreadsheet());
        assert_eq!(cli.config().numeric_ratio, 0.75);
        let spec = cli.summary_spec().unwrap();
        assert_eq!(spec.sum.ids(), ["Col_1", "Col_2"]);
        assert_eq!(spec.ratio, Some(("Col_1".to_owned(), "Col_2".to_owned())));

        let cli = Cli::parse_from(["sheet-summary", "-", "--text"]);
        assert!(cli.input_path().is_none());
        assert!(!cli.is_spreadsheet());
        assert!(cli.summary_spec().is_none());
    }

    #[test]
    fn spreadsheet_extensions() {
        for file in ["legacy.xls", "book.xlsx", "macros.XLSM", "calc.ods"] {
            assert!(Cli::parse_from(["sheet-summary", file]).is_spreadsheet(), "{file}");
        }
        for file in ["data.csv", "notes.txt", "noextension"] {
            assert!(!Cli::parse_from(["sheet-summary", file]).is_spreadsheet(), "{file}");
        }
        assert!(!Cli::parse_from(["sheet-summary", "legacy.xls", "--text"]).is_spreadsheet());
    }
}
