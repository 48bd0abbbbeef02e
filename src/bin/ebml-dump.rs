use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::PathBuf;

use clap::Parser;
use ebml_stream::error::ReaderError;
use ebml_stream::EbmlReader;

#[derive(Parser, Debug)]
#[command(author, version, about = "Print the element tree of an EBML file")]
struct Args {
    /// File to read
    path: PathBuf,

    /// Id of an element to descend into, in hex with its marker bit (e.g. 18538067). Can be repeated
    #[arg(short, long = "master", value_parser = parse_hex_id)]
    masters: Vec<u64>,

    /// Stop descending below this depth
    #[arg(long)]
    max_depth: Option<usize>,

    /// Only read this many bytes from the start of the file
    #[arg(long)]
    size: Option<u64>,
}

fn parse_hex_id(value: &str) -> Result<u64, String> {
    let digits = value.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(digits, 16).map_err(|e| format!("'{}' is not a hex element id: {}", value, e))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let file = BufReader::new(File::open(&args.path)?);
    let mut reader = match args.size {
        Some(size) => EbmlReader::with_size(file, size)?,
        None => EbmlReader::new(file)?,
    };

    if let Err(e) = dump(&mut reader, &args) {
        eprintln!("{}: {}", args.path.display(), e);
        std::process::exit(1);
    }
    Ok(())
}

fn dump<R: Read + Seek>(reader: &mut EbmlReader<R>, args: &Args) -> Result<(), ReaderError> {
    while reader.read_next()? {
        let id = reader.element_id()?.encoded_value();
        let depth = reader.depth();
        let size = if reader.declared_size()?.is_unknown() {
            format!("unknown ({})", reader.element_size()?)
        } else {
            reader.element_size()?.to_string()
        };
        println!("{:indent$}{:X} @ {} size {}", "", id, reader.element_position()?, size, indent = depth * 2);

        let may_descend = args.max_depth.map_or(true, |max| depth < max);
        if may_descend && args.masters.contains(&id) {
            reader.enter_container()?;
            dump(reader, args)?;
            reader.leave_container()?;
        }
    }
    Ok(())
}
