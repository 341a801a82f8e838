use std::error::Error;
use std::fs;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::exit;
use std::time;

use clap::Parser;

use mzbank::io::{MassBankHttpClient, SpectrumSearchClient, DEFAULT_ENDPOINT};
use mzbank::search::{MassBankBatchSearch, MassBankSearch, SearchParameters};
use mzbank::FeatureSetContainer;

/// Annotate a feature container with compound identities from MassBank
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The JSON feature container to annotate
    #[arg(short, long, required_unless_present = "list_instruments")]
    input: Option<PathBuf>,

    /// The JSON search parameters
    #[arg(short, long, required_unless_present = "list_instruments")]
    params: Option<PathBuf>,

    /// Where to write the annotated container, standard output if omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// The MassBank service endpoint
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Search each spectrum with its own request instead of one batch job
    #[arg(short, long)]
    single: bool,

    /// List the instrument types the service accepts and exit
    #[arg(long)]
    list_instruments: bool,
}

fn write_container(container: &FeatureSetContainer, output: Option<&PathBuf>) -> Result<(), Box<dyn Error>> {
    match output {
        Some(path) => {
            let mut handle = BufWriter::new(fs::File::create(path)?);
            container.to_writer(&mut handle)?;
            handle.flush()?;
        }
        None => {
            let mut handle = io::stdout().lock();
            container.to_writer(&mut handle)?;
            writeln!(handle)?;
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let client = MassBankHttpClient::new(args.endpoint.as_str())?;

    if args.list_instruments {
        for instrument in client.instrument_types()? {
            println!("{instrument}");
        }
        return Ok(());
    }

    let (Some(input_path), Some(params_path)) = (args.input.as_ref(), args.params.as_ref()) else {
        eprintln!("Please provide both an input container and search parameters");
        exit(1)
    };
    let params = SearchParameters::from_path(params_path)?;
    let input = FeatureSetContainer::from_reader(BufReader::new(fs::File::open(input_path)?))?;
    log::info!(
        "Loaded {} with {} feature sets from {}",
        input.id,
        input.len(),
        input_path.display()
    );

    let start = time::Instant::now();
    let container = if args.single {
        let outcome = MassBankSearch::new(params, client)?.run(&input);
        for (index, err) in outcome.failures.iter() {
            log::warn!("Feature set {index} was dropped: {err}");
        }
        outcome.container
    } else {
        let outcome = MassBankBatchSearch::new(params, client)?.run(&input);
        if let Some(err) = outcome.report.error.as_ref() {
            log::warn!("The batch search did not complete: {err}");
        }
        outcome.container
    };
    let elapsed = time::Instant::now() - start;
    eprintln!("Search finished: {:0.2} seconds", elapsed.as_secs_f64());

    write_container(&container, args.output.as_ref())
}
