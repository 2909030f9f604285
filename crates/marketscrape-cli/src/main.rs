use std::io;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use marketscrape::census::{CensusClient, CensusQuery, DemographicTable};
use marketscrape::crawler::{CrawlConfig, Crawler};
use marketscrape::fetcher::HttpFetcher;
use marketscrape::merge::join;
use marketscrape::output::{write_csv, write_csv_file, write_json_file};
use marketscrape::types::MarketRecord;
use marketscrape::utils::MergeStats;
use marketscrape::zipcode::assign_zipcodes;

#[derive(Parser)]
#[command(name = "marketscrape")]
#[command(about = "A farmers' market directory scraper with census demographics", long_about = None)]
struct Cli {
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        default_value = "info",
        global = true,
        help = "Set the logging level"
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Csv,
}

#[derive(Debug, Clone, ValueEnum)]
enum FileFormat {
    Csv,
    Json,
}

#[derive(Args)]
struct CrawlArgs {
    #[arg(
        long,
        default_value = marketscrape::DIRECTORY_URL,
        help = "Directory search URL, without the page parameter"
    )]
    url: String,

    #[arg(
        long,
        help = "Stop after this many pages",
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    max_pages: Option<u32>,

    #[arg(
        long,
        default_value_t = 2000,
        help = "Minimum pause between page requests, in milliseconds"
    )]
    min_delay_ms: u64,

    #[arg(
        long,
        default_value_t = 4000,
        help = "Maximum pause between page requests, in milliseconds"
    )]
    max_delay_ms: u64,

    #[arg(long, help = "Keep following next links that were already seen")]
    allow_repeated_links: bool,

    #[arg(long, help = "Drop table cells where no market field was found")]
    skip_empty: bool,
}

impl CrawlArgs {
    fn config(&self) -> CrawlConfig {
        CrawlConfig {
            min_delay: Duration::from_millis(self.min_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_pages: self.max_pages,
            stop_on_repeated_link: !self.allow_repeated_links,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl every directory page and print the extracted markets
    Crawl {
        #[command(flatten)]
        crawl: CrawlArgs,

        #[arg(
            short = 'o',
            long = "output",
            value_enum,
            default_value = "text",
            help = "Output format"
        )]
        format: OutputFormat,
    },
    /// Crawl the directory, join census demographics by ZIP code and write the table
    Collect {
        #[command(flatten)]
        crawl: CrawlArgs,

        #[arg(
            long,
            value_name = "PATH",
            help = "Read demographics from a CSV file instead of the Census API"
        )]
        census_csv: Option<PathBuf>,

        #[arg(long, env = "CENSUS_API_KEY", help = "Census API key")]
        census_key: Option<String>,

        #[arg(long, default_value_t = 2019, help = "ACS 5-year estimates vintage")]
        year: u16,

        #[arg(long, default_value = "37", help = "State FIPS code")]
        state: String,

        #[arg(
            long,
            value_name = "PATH",
            help = "Also save the demographics table as CSV"
        )]
        save_census: Option<PathBuf>,

        #[arg(
            short = 'o',
            long = "output",
            default_value = "market_data.csv",
            help = "Path of the merged table"
        )]
        output: PathBuf,

        #[arg(long, value_enum, default_value = "csv", help = "Format of the merged table")]
        format: FileFormat,

        #[arg(long, help = "Print summary statistics of the merged table")]
        summary: bool,
    },
}

fn serialize_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            log::error!("Error serializing to JSON: {}", e);
            process::exit(1);
        }
    }
}

async fn crawl_markets(args: &CrawlArgs) -> Vec<MarketRecord> {
    let fetcher = HttpFetcher::new().unwrap_or_else(|e| {
        log::error!("Error creating HTTP client: {}", e);
        process::exit(1);
    });

    let crawler = Crawler::new(fetcher, args.config()).unwrap_or_else(|e| {
        log::error!("Invalid args: {e}");
        process::exit(1);
    });

    log::info!("Fetching farmers' market data from {}...", args.url);
    let mut markets = crawler.crawl(&args.url).await;

    if args.skip_empty {
        let before = markets.len();
        markets.retain(|m| !m.is_empty());
        log::info!("Dropped {} empty cell(s)", before - markets.len());
    }

    assign_zipcodes(&mut markets);
    markets
}

async fn load_demographics(
    census_csv: Option<PathBuf>,
    census_key: Option<String>,
    query: CensusQuery,
) -> DemographicTable {
    let table = match census_csv {
        Some(path) => {
            log::info!("Reading census data from {}...", path.display());
            DemographicTable::from_csv_path(&path)
        }
        None => {
            let client = CensusClient::new(census_key).unwrap_or_else(|e| {
                log::error!("Error creating census client: {}", e);
                process::exit(1);
            });
            client.fetch_demographics(&query).await
        }
    };

    table.unwrap_or_else(|e| {
        log::error!("Error loading census data: {}", e);
        process::exit(1);
    })
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level.clone().into())
        .init();

    match cli.command {
        Commands::Crawl { crawl, format } => {
            let markets = crawl_markets(&crawl).await;

            match format {
                OutputFormat::Json => serialize_json(&markets),
                OutputFormat::Csv => {
                    if let Err(e) = write_csv(&markets, io::stdout().lock()) {
                        log::error!("Error writing CSV: {}", e);
                        process::exit(1);
                    }
                }
                OutputFormat::Text => {
                    if markets.is_empty() {
                        println!("No markets found.");
                    } else {
                        for (i, market) in markets.iter().enumerate() {
                            println!("{:>3}. {}", i + 1, market);
                        }
                        println!("\nTotal: {} market(s)", markets.len());
                    }
                }
            }
        }

        Commands::Collect {
            crawl,
            census_csv,
            census_key,
            year,
            state,
            save_census,
            output,
            format,
            summary,
        } => {
            let demographics =
                load_demographics(census_csv, census_key, CensusQuery { year, state }).await;

            if let Some(path) = save_census
                && let Err(e) = write_csv_file(demographics.records(), &path)
            {
                log::error!("Error saving census data to {}: {}", path.display(), e);
                process::exit(1);
            }

            let markets = crawl_markets(&crawl).await;

            log::info!("Merging datasets...");
            let merged = join(markets, &demographics);

            let written = match format {
                FileFormat::Csv => write_csv_file(&merged, &output),
                FileFormat::Json => write_json_file(&merged, &output),
            };
            if let Err(e) = written {
                log::error!("Error writing {}: {}", output.display(), e);
                process::exit(1);
            }
            println!("Merged data saved to '{}'", output.display());

            if summary {
                print!("{}", MergeStats::from_merged(&merged));
            }
        }
    }
}
