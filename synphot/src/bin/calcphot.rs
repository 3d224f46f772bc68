//! Synthetic photometry calculator
//!
//! Evaluates a source expression, optionally observes it through a bandpass
//! expression, and prints the effective wavelength and count rate:
//!
//! ```text
//! calcphot 'rn(bb(5000),box(5500,900),10,abmag)' --band 'box(5500,900)'
//! calcphot --showref --waveset 1000,11000,5000,linear
//! ```

use std::path::PathBuf;

use clap::Parser;
use synphot::eval::{Evaluator, SpectrumLike};
use synphot::photometry::Observation;
use synphot::refs::{RefOverrides, ReferenceManager, WavesetItem};

#[derive(Parser, Debug)]
#[command(
    name = "calcphot",
    about = "Evaluates synthetic photometry expressions",
    long_about = None
)]
struct Args {
    /// Source or bandpass expression, e.g. "rn(unit(1,flam),band(johnson,v),10,abmag)"
    expression: Option<String>,

    /// Bandpass expression to observe the source through
    #[arg(long)]
    band: Option<String>,

    /// Default waveset as min,max,num[,log|linear]
    #[arg(long, value_delimiter = ',')]
    waveset: Option<Vec<String>>,

    /// Collecting area in cm²
    #[arg(long)]
    area: Option<f64>,

    /// Graph table path, legacy notation allowed
    #[arg(long)]
    graphtable: Option<String>,

    /// Component table path, legacy notation allowed
    #[arg(long)]
    comptable: Option<String>,

    /// Thermal table path, legacy notation allowed
    #[arg(long)]
    thermtable: Option<String>,

    /// JSON file of reference overrides, applied before the flags above
    #[arg(long)]
    refs: Option<PathBuf>,

    /// Print the reference data in effect
    #[arg(long)]
    showref: bool,
}

fn waveset_items(values: &[String]) -> Vec<WavesetItem> {
    values
        .iter()
        .map(|v| match v.trim().parse::<f64>() {
            Ok(number) => WavesetItem::Number(number),
            Err(_) => WavesetItem::Text(v.trim().to_string()),
        })
        .collect()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let refs = ReferenceManager::from_env();
    if let Some(path) = &args.refs {
        refs.configure_from_file(path)?;
    }

    let overrides = RefOverrides {
        graphtable: args.graphtable.clone(),
        comptable: args.comptable.clone(),
        thermtable: args.thermtable.clone(),
        area: args.area,
        waveset: args.waveset.as_deref().map(waveset_items),
    };
    if !overrides.is_empty() {
        refs.configure(&overrides)?;
    }

    if args.showref {
        println!("{}", refs.query());
    }

    let Some(expression) = &args.expression else {
        if args.showref {
            return Ok(());
        }
        return Err("no expression given; see --help".into());
    };

    let evaluator = Evaluator::new(&refs);
    let result = evaluator.evaluate_str(expression)?;

    let bandpass = match &args.band {
        Some(text) => match evaluator.evaluate_str(text)? {
            SpectrumLike::Bandpass(bp) => Some(bp),
            SpectrumLike::Spectrum(sp) => {
                return Err(format!("--band must be a bandpass, got spectrum {}", sp.name()).into())
            }
        },
        None => None,
    };

    match (result, bandpass) {
        (SpectrumLike::Spectrum(sp), Some(bp)) => {
            let obs = Observation::new(&sp, &bp);
            println!("Spectrum:   {}", sp.name());
            println!("Bandpass:   {}", bp.name());
            println!("efflam:     {:.4} Å", obs.effective_wavelength()?);
            println!("countrate:  {:.6e} counts/s", obs.count_rate(refs.area())?);
        }
        (SpectrumLike::Spectrum(sp), None) => {
            let wave = sp.wave();
            println!("Spectrum:   {}", sp.name());
            println!(
                "Range:      {:.2} - {:.2} Å ({} samples)",
                wave[0],
                wave[wave.len() - 1],
                wave.len()
            );
            println!("Flux:       {:.6e} photons/s/cm²", sp.integrate()?);
        }
        (SpectrumLike::Bandpass(bp), _) => {
            println!("Bandpass:   {}", bp.name());
            println!("pivot:      {:.4} Å", bp.pivot_wavelength());
            println!("equivwidth: {:.4} Å", bp.equivalent_width());
        }
    }

    Ok(())
}
