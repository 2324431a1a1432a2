//! fretwise CLI - chord suggestions, analysis, voicings and MIDI export

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use fretwise::midi::{export_midi, MidiOptions};
use fretwise::{
    analyze, realize_str, transpose, validate_catalogue, Catalogue, EngineConfig, FretwiseError, Instrument, Key,
    PatternLibrary, PatternRef, PlaybackItem, SuccessorEngine,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "fretwise")]
#[command(about = "Chord-progression explorer for guitar and ukulele", long_about = None)]
struct Cli {
    /// Engine configuration (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// guitar or ukulele (overrides the config)
    #[arg(short, long, global = true)]
    instrument: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank next chords after CHORD
    Suggest {
        chord: String,
        #[arg(short, long, default_value = "C")]
        key: String,
        /// Include chords borrowed from the parallel minor
        #[arg(short, long)]
        borrowed: bool,
    },

    /// Show the Roman-numeral function of each chord
    Analyze {
        #[arg(required = true)]
        chords: Vec<String>,
        #[arg(short, long, default_value = "C")]
        key: String,
    },

    /// Realise Roman numerals as chords
    Realize {
        #[arg(required = true)]
        numerals: Vec<String>,
        #[arg(short, long, default_value = "C")]
        key: String,
    },

    /// Transpose a progression between keys
    Transpose {
        #[arg(required = true)]
        chords: Vec<String>,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },

    /// Print a chord's voicing and the notes it sounds
    Voicing {
        chord: String,
        #[arg(long, default_value = "0")]
        index: usize,
    },

    /// Check a voicing catalogue for wrong or missing notes
    Validate {
        /// A catalogue YAML file; the built-in catalogue if omitted
        catalogue: Option<PathBuf>,
    },

    /// Write a progression as a MIDI file
    ExportMidi {
        #[arg(required = true)]
        chords: Vec<String>,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        bpm: Option<u16>,
        /// Strum pattern id for every chord
        #[arg(long, conflicts_with = "arpeggio")]
        strum: Option<String>,
        /// Arpeggio pattern id for every chord
        #[arg(long)]
        arpeggio: Option<String>,
    },
}

fn run(cli: Cli) -> Result<(), FretwiseError> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(name) = &cli.instrument {
        config.instrument = Instrument::parse(name)?;
    }

    match cli.command {
        Commands::Suggest { chord, key, borrowed } => {
            let key = Key::parse(&key)?;
            let ranked = SuccessorEngine::new().ranked(&chord, &key, borrowed || config.allow_borrowed);
            if ranked.is_empty() {
                eprintln!("'{}' has no function in {}", chord, key);
            }
            for s in ranked {
                let tag = if s.is_borrowed { " (borrowed)" } else { "" };
                println!("{:<8} {:<8} {}{}", s.chord, s.roman.to_string(), s.weight, tag);
            }
        }
        Commands::Analyze { chords, key } => {
            let key = Key::parse(&key)?;
            for chord in chords {
                match analyze(&chord, &key) {
                    Some(roman) => println!("{:<8} {}", chord, roman),
                    None => println!("{:<8} -", chord),
                }
            }
        }
        Commands::Realize { numerals, key } => {
            let key = Key::parse(&key)?;
            for numeral in numerals {
                match realize_str(&numeral, &key) {
                    Some(chord) => println!("{:<8} {}", numeral, chord),
                    None => println!("{:<8} -", numeral),
                }
            }
        }
        Commands::Transpose { chords, from, to } => {
            let out = transpose(&chords, &Key::parse(&from)?, &Key::parse(&to)?);
            println!("{}", out.join(" "));
        }
        Commands::Voicing { chord, index } => {
            let catalogue = Catalogue::builtin(config.instrument)?;
            match catalogue.voicing(&chord, index) {
                Some(voicing) => {
                    let notes: Vec<String> = catalogue
                        .voicing_for(&chord, index)
                        .iter()
                        .map(|n| format!("{}:{}", n.string_index, n.note))
                        .collect();
                    println!("{}  {}", voicing, notes.join(" "));
                }
                None => {
                    eprintln!("No {} voicing {} for '{}'", config.instrument, index, chord);
                    process::exit(1);
                }
            }
        }
        Commands::Validate { catalogue } => {
            let catalogue = match catalogue {
                Some(path) => {
                    let text = fs::read_to_string(&path)
                        .map_err(|e| FretwiseError::Catalogue(format!("{}: {}", path.display(), e)))?;
                    Catalogue::from_yaml(&text)?
                }
                None => Catalogue::builtin(config.instrument)?,
            };
            let issues = validate_catalogue(&catalogue);
            for issue in &issues {
                println!("{}", issue);
            }
            eprintln!("{} issue(s)", issues.len());
            if !issues.is_empty() {
                process::exit(2);
            }
        }
        Commands::ExportMidi {
            chords,
            output,
            bpm,
            strum,
            arpeggio,
        } => {
            let catalogue = Catalogue::builtin(config.instrument)?;
            let library = PatternLibrary::presets(config.instrument);
            let pattern = match (strum, arpeggio) {
                (Some(id), _) => PatternRef::Strum(id),
                (None, Some(id)) => PatternRef::Arpeggio(id),
                (None, None) => PatternRef::Block,
            };
            let items: Vec<PlaybackItem> = chords
                .iter()
                .map(|c| PlaybackItem::new(c, pattern.clone()))
                .collect();
            let mut options = MidiOptions::from_config(&config);
            if let Some(bpm) = bpm {
                options = options.with_bpm(bpm)?;
            }
            let bytes = export_midi(&items, &catalogue, &library, &options);
            if let Err(e) = fs::write(&output, &bytes) {
                eprintln!("Error writing to '{}': {}", output.display(), e);
                process::exit(1);
            }
            eprintln!("Wrote {} bytes of MIDI to {}", bytes.len(), output.display());
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
