use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process;

mod entry;
mod error;
mod extract;
mod opf;
mod output;

use entry::Metadata;
use extract::{ExtractStats, Options};

#[derive(Parser)]
#[command(name = "mobi2dict")]
#[command(about = "\
Convert unpacked Kindle MOBI dictionary files (book.html or part00000.html)
to Babylon Glossary source (.gls), StarDict Textual Dictionary Format, or
JSON lines. Unpack MOBI files first with KindleUnpack or libmobi's mobitool.")]
struct Args {
    /// Path of the unpacked HTML file
    #[arg(long, default_value = "part00000.html")]
    html_file: PathBuf,

    /// Rewrite in-dictionary references to bword:// glossary links
    #[arg(long)]
    fix_links: bool,

    /// Name of the dictionary, used when the OPF supplies no title
    #[arg(long, default_value = "part00000")]
    dict_name: String,

    /// Name of the author or publisher
    #[arg(long, default_value = "author")]
    author: String,

    /// OPF package file written by the unpacker, read for
    /// title/author/date/language metadata
    #[arg(long)]
    opf: Option<PathBuf>,

    /// Write Babylon glossary source (book.gls)
    #[arg(long)]
    gls: bool,

    /// Write StarDict Textual Dictionary xml (book_stardict_textual.xml)
    #[arg(long)]
    textual: bool,

    /// Write entries as JSON lines (book.jsonl)
    #[arg(long)]
    jsonl: bool,

    /// Parse the html in chunks to reduce memory usage
    #[arg(long)]
    chunked: bool,

    /// Quiet mode - minimal output
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let args = Args::parse();

    if !(args.gls || args.textual || args.jsonl) {
        eprintln!("You need to specify at least 1 output format: --gls, --textual or --jsonl.");
        process::exit(1);
    }

    if let Err(e) = run(args) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let book = extract::load_document(&args.html_file)?;

    let discovered = match &args.opf {
        Some(path) => opf::parse_opf(&extract::load_document(path)?),
        None => Metadata::default(),
    };

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner} {msg}")
                .unwrap(),
        );
        pb
    };

    let opts = Options {
        fix_links: args.fix_links,
        chunked: args.chunked,
    };
    let (entries, stats) = extract::extract_entries(&book, opts, |count| {
        if count % 1000 == 0 {
            pb.set_message(format!("Entries extracted: {}", count));
        }
    })?;
    pb.finish_and_clear();

    // Defaults fill the gaps the manifest left; the extraction core never
    // touches metadata.
    let meta = discovered.or(Metadata {
        title: Some(args.dict_name.clone()),
        creator: Some(args.author.clone()),
        date: Some(chrono::Local::now().format("%d/%m/%Y").to_string()),
        ..Default::default()
    });

    if args.gls {
        let file = File::create("book.gls").context("could not create book.gls")?;
        let mut writer = BufWriter::with_capacity(256 * 1024, file);
        output::write_gls(&mut writer, &entries, &meta).context("could not write book.gls")?;
    }
    if args.textual {
        let file = File::create("book_stardict_textual.xml")
            .context("could not create book_stardict_textual.xml")?;
        let mut writer = BufWriter::with_capacity(256 * 1024, file);
        output::write_textual(&mut writer, &entries, &meta)
            .context("could not write book_stardict_textual.xml")?;
    }
    if args.jsonl {
        let file = File::create("book.jsonl").context("could not create book.jsonl")?;
        let mut writer = BufWriter::with_capacity(256 * 1024, file);
        output::write_jsonl(&mut writer, &entries).context("could not write book.jsonl")?;
    }

    if !args.quiet {
        print_stats(&stats);
    }

    Ok(())
}

fn print_stats(stats: &ExtractStats) {
    println!();
    println!("============================================================");
    println!("Entries extracted: {}", stats.entries);
    println!("Fragments seen: {}", stats.fragments);
    println!("Skipped (no headword): {}", stats.missing_headword);
    println!("Skipped (empty body): {}", stats.empty_body);
    println!("Chunks parsed: {}", stats.chunks);
    println!(
        "Time: {}m {}s",
        stats.elapsed.as_secs() / 60,
        stats.elapsed.as_secs() % 60
    );
    println!(
        "Rate: {:.0} entries/sec",
        stats.entries as f64 / stats.elapsed.as_secs_f64().max(f64::EPSILON)
    );
    println!("============================================================");
}
