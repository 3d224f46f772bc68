//! Evaluation of expression trees into spectra and bandpasses
//!
//! The evaluator walks the tree depth first, evaluating arguments left to
//! right before applying the enclosing call. Bare words are interpreted by
//! the position they appear in: a number where a number is expected, a flux
//! unit or extinction law where one is expected, and otherwise a catalog
//! spectrum or a file.

mod functions;

pub use functions::{Arity, Function};

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::io::LoadError;
use crate::obsmode::{bandpass_from_components, ObsmodeError};
use crate::parser::{parse_str, BinaryOp, Expr, SyntaxError};
use crate::photometry::{
    renormalize, sources, Bandpass, ExtinctionLaw, FluxUnit, SourceSpectrum,
};
use crate::refs::{RefContext, RefError, ReferenceManager};

/// Extinction law used by `ebmv`
const MILKY_WAY_AVERAGE: ExtinctionLaw = ExtinctionLaw::Cardelli { rv: 3.1 };

#[derive(Debug, Error)]
pub enum EvalError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error("Unknown {kind} '{name}' in {expr}")]
    Name {
        kind: &'static str,
        name: String,
        expr: String,
    },

    #[error("{message} in {expr}")]
    Value { message: String, expr: String },

    #[error(transparent)]
    Reference(#[from] RefError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

fn value_error(message: impl Into<String>, expr: &Expr) -> EvalError {
    EvalError::Value {
        message: message.into(),
        expr: expr.to_string(),
    }
}

fn name_error(kind: &'static str, name: impl Into<String>, expr: &Expr) -> EvalError {
    EvalError::Name {
        kind,
        name: name.into(),
        expr: expr.to_string(),
    }
}

/// Result of evaluating an expression
#[derive(Debug, Clone, PartialEq)]
pub enum SpectrumLike {
    Spectrum(SourceSpectrum),
    Bandpass(Bandpass),
}

impl SpectrumLike {
    pub fn name(&self) -> &str {
        match self {
            SpectrumLike::Spectrum(sp) => sp.name(),
            SpectrumLike::Bandpass(bp) => bp.name(),
        }
    }

    pub fn as_spectrum(&self) -> Option<&SourceSpectrum> {
        match self {
            SpectrumLike::Spectrum(sp) => Some(sp),
            SpectrumLike::Bandpass(_) => None,
        }
    }

    pub fn as_bandpass(&self) -> Option<&Bandpass> {
        match self {
            SpectrumLike::Spectrum(_) => None,
            SpectrumLike::Bandpass(bp) => Some(bp),
        }
    }
}

/// Intermediate value of a sub-expression
#[derive(Debug, Clone)]
enum Value {
    Number(f64),
    /// A bare word whose meaning depends on where it is used
    Word(String),
    Spectrum(SourceSpectrum),
    Bandpass(Bandpass),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Word(_) => "word",
            Value::Spectrum(_) => "spectrum",
            Value::Bandpass(_) => "bandpass",
        }
    }
}

/// Evaluates expressions against a reference configuration
pub struct Evaluator<'r> {
    refs: &'r ReferenceManager,
    functions: HashMap<&'static str, (Function, Arity)>,
    catalog: HashMap<String, SourceSpectrum>,
}

impl<'r> Evaluator<'r> {
    pub fn new(refs: &'r ReferenceManager) -> Self {
        Self {
            refs,
            functions: functions::registry(),
            catalog: HashMap::new(),
        }
    }

    /// Make `spectrum` available as a bare name, matched case-insensitively
    pub fn register_spectrum(&mut self, name: &str, spectrum: SourceSpectrum) {
        self.catalog.insert(name.to_lowercase(), spectrum);
    }

    /// Tokenize, parse and evaluate `text`
    pub fn evaluate_str(&self, text: &str) -> Result<SpectrumLike, EvalError> {
        let expr = parse_str(text)?;
        self.evaluate(&expr)
    }

    /// Evaluate a parsed expression
    ///
    /// A bare number evaluates to a spectrum constant in photlam; a bare
    /// word to a catalog or file spectrum. File lists are rejected, see
    /// [`Evaluator::evaluate_file_list`]. Area, waveset and tables all come
    /// from the configuration in effect when evaluation starts.
    pub fn evaluate(&self, expr: &Expr) -> Result<SpectrumLike, EvalError> {
        if let Expr::FileList(path, _) = expr {
            return Err(value_error(
                format!("File list @{path} must be evaluated line by line"),
                expr,
            ));
        }

        let ctx = self.refs.context();
        match self.eval_value(&ctx, expr)? {
            Value::Spectrum(sp) => Ok(SpectrumLike::Spectrum(sp)),
            Value::Bandpass(bp) => Ok(SpectrumLike::Bandpass(bp)),
            Value::Number(value) => Ok(SpectrumLike::Spectrum(self.constant(&ctx, value, expr)?)),
            Value::Word(word) => Ok(SpectrumLike::Spectrum(self.resolve_spectrum(&word, expr)?)),
        }
    }

    /// Evaluate every expression listed in a file, one per line
    ///
    /// Blank lines and lines starting with `#` are skipped. The path may use
    /// legacy `$VAR` or `prefix$` notation.
    pub fn evaluate_file_list(&self, path: &str) -> Result<Vec<SpectrumLike>, EvalError> {
        let path = self.refs.root().convert_legacy_path(path);
        let text = fs::read_to_string(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;

        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| self.evaluate_str(line))
            .collect()
    }

    fn eval_value(&self, ctx: &RefContext, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Number(text, _) => text
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|_| value_error(format!("Invalid number '{text}'"), expr)),
            Expr::Ident(word, _) => Ok(Value::Word(word.clone())),
            Expr::FileList(path, _) => Err(value_error(
                format!("File list @{path} cannot be used inside an expression"),
                expr,
            )),
            Expr::Call(name, args, _) => self.eval_call(ctx, name, args, expr),
            Expr::Binary(op, lhs, rhs, _) => {
                let lhs = self.operand(self.eval_value(ctx, lhs)?, lhs)?;
                let rhs = self.operand(self.eval_value(ctx, rhs)?, rhs)?;
                self.combine(*op, lhs, rhs, expr)
            }
        }
    }

    fn eval_call(
        &self,
        ctx: &RefContext,
        name: &str,
        args: &[Expr],
        expr: &Expr,
    ) -> Result<Value, EvalError> {
        let &(function, arity) = self
            .functions
            .get(name)
            .ok_or_else(|| name_error("function", name, expr))?;

        if !arity.accepts(args.len()) {
            return Err(value_error(
                format!("{name} takes {arity}, got {}", args.len()),
                expr,
            ));
        }

        log::debug!("Evaluating {expr}");

        // band arguments are obsmode keywords, not sub-expressions
        let values = if function == Function::Band {
            Vec::new()
        } else {
            args.iter()
                .map(|arg| self.eval_value(ctx, arg))
                .collect::<Result<Vec<_>, _>>()?
        };
        let arg = |i: usize| (values[i].clone(), &args[i]);

        let label = expr.to_string();
        let value = match function {
            Function::Spec => {
                let (v, e) = arg(0);
                Value::Spectrum(self.spectrum(v, e)?)
            }
            Function::Unit => {
                let value = self.number(arg(0))?;
                let unit = self.flux_unit(arg(1))?;
                let sp = SourceSpectrum::flat(value, unit, ctx.waveset().samples(), ctx.area())
                    .map_err(|e| value_error(e.to_string(), expr))?;
                Value::Spectrum(sp)
            }
            Function::Band => Value::Bandpass(self.band(ctx, args, expr)?),
            Function::Renorm => {
                let (v, e) = arg(0);
                let sp = self.spectrum(v, e)?;
                let (v, e) = arg(1);
                let bp = self.bandpass(v, e)?;
                let value = self.number(arg(2))?;
                let unit = self.flux_unit(arg(3))?;
                let sp = renormalize(&sp, &bp, value, unit, ctx.waveset().samples(), ctx.area())
                    .map_err(|e| value_error(e.to_string(), expr))?;
                Value::Spectrum(sp)
            }
            Function::Redshift => {
                let (v, e) = arg(0);
                let sp = self.spectrum(v, e)?;
                let z = self.number(arg(1))?;
                Value::Spectrum(sp.redshifted(z).map_err(|e| value_error(e.to_string(), expr))?)
            }
            Function::Ebmv => {
                let ebmv = self.number(arg(0))?;
                Value::Bandpass(MILKY_WAY_AVERAGE.curve(ebmv, ctx.waveset().samples()))
            }
            Function::Ebmvx => {
                let ebmv = self.number(arg(0))?;
                let (v, e) = arg(1);
                let word = self.word(v, e)?;
                let law = word
                    .parse::<ExtinctionLaw>()
                    .map_err(|_| name_error("extinction law", word.as_str(), e))?;
                Value::Bandpass(law.curve(ebmv, ctx.waveset().samples()))
            }
            Function::ExposureTime => {
                let (v, e) = arg(0);
                let sp = self.spectrum(v, e)?;
                let seconds = self.number(arg(1))?;
                if !(seconds >= 0.0) {
                    return Err(value_error(
                        format!("Exposure time must not be negative, got {seconds}"),
                        expr,
                    ));
                }
                Value::Spectrum(sp.scaled(seconds))
            }
            Function::Blackbody => {
                let temperature = self.number(arg(0))?;
                let sp = sources::blackbody(temperature, ctx.waveset().samples())
                    .map_err(|e| value_error(e.to_string(), expr))?;
                Value::Spectrum(sp)
            }
            Function::PowerLaw => {
                let refwave = self.number(arg(0))?;
                let index = self.number(arg(1))?;
                let unit = self.flux_unit(arg(2))?;
                let waveset = ctx.waveset().samples();
                let sp = sources::power_law(refwave, index, unit, waveset, ctx.area())
                    .map_err(|e| value_error(e.to_string(), expr))?;
                Value::Spectrum(sp)
            }
            Function::Box => {
                let center = self.number(arg(0))?;
                let width = self.number(arg(1))?;
                let bp = Bandpass::from_box(center, width)
                    .map_err(|e| value_error(e.to_string(), expr))?;
                Value::Bandpass(bp)
            }
            Function::Emission => {
                let center = self.number(arg(0))?;
                let fwhm = self.number(arg(1))?;
                let flux = self.number(arg(2))?;
                let unit = self.flux_unit(arg(3))?;
                let sp = sources::emission_line(center, fwhm, flux, unit)
                    .map_err(|e| value_error(e.to_string(), expr))?;
                Value::Spectrum(sp)
            }
        };

        Ok(match value {
            Value::Spectrum(sp) => Value::Spectrum(sp.with_name(label)),
            Value::Bandpass(bp) => Value::Bandpass(bp.with_name(label)),
            other => other,
        })
    }

    /// Bandpass of the obsmode named by the literal arguments of `band(...)`
    fn band(&self, ctx: &RefContext, args: &[Expr], expr: &Expr) -> Result<Bandpass, EvalError> {
        let mut obsmode = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Expr::Ident(text, _) | Expr::Number(text, _) => obsmode.push(text.clone()),
                other => {
                    return Err(value_error(
                        format!("band keywords must be plain words, got {other}"),
                        expr,
                    ))
                }
            }
        }

        let graph = ctx.graph_table()?;
        let components = ctx.component_table()?;

        bandpass_from_components(
            &obsmode,
            &graph,
            &components,
            self.refs.root(),
            self.refs.loader(),
        )
        .map_err(|e| match e {
            ObsmodeError::UnusedKeywords(keywords) => {
                name_error("obsmode keyword", keywords.join(","), expr)
            }
            ObsmodeError::UnknownComponent(component) => {
                name_error("throughput component", component, expr)
            }
            ObsmodeError::Load(e) => EvalError::Load(e),
            other => value_error(other.to_string(), expr),
        })
    }

    /// Combine two operands of a binary operator
    fn combine(
        &self,
        op: BinaryOp,
        lhs: Value,
        rhs: Value,
        expr: &Expr,
    ) -> Result<Value, EvalError> {
        use BinaryOp::*;

        let value = match (op, lhs, rhs) {
            (Div, _, Value::Number(d)) if d == 0.0 => {
                return Err(value_error("Division by zero", expr));
            }
            (Add, Value::Number(a), Value::Number(b)) => Value::Number(a + b),
            (Sub, Value::Number(a), Value::Number(b)) => Value::Number(a - b),
            (Mul, Value::Number(a), Value::Number(b)) => Value::Number(a * b),
            (Div, Value::Number(a), Value::Number(b)) => Value::Number(a / b),

            (Mul, Value::Spectrum(sp), Value::Bandpass(bp))
            | (Mul, Value::Bandpass(bp), Value::Spectrum(sp)) => Value::Spectrum(sp.through(&bp)),
            (Mul, Value::Bandpass(a), Value::Bandpass(b)) => Value::Bandpass(a.times(&b)),

            (Mul, Value::Number(k), Value::Spectrum(sp))
            | (Mul, Value::Spectrum(sp), Value::Number(k)) => Value::Spectrum(sp.scaled(k)),
            (Mul, Value::Number(k), Value::Bandpass(bp))
            | (Mul, Value::Bandpass(bp), Value::Number(k)) => Value::Bandpass(bp.scaled(k)),
            (Div, Value::Spectrum(sp), Value::Number(d)) => Value::Spectrum(sp.scaled(1.0 / d)),
            (Div, Value::Bandpass(bp), Value::Number(d)) => Value::Bandpass(bp.scaled(1.0 / d)),

            (Add, Value::Spectrum(a), Value::Spectrum(b)) => Value::Spectrum(a.plus(&b)),
            (Sub, Value::Spectrum(a), Value::Spectrum(b)) => Value::Spectrum(a.minus(&b)),

            (op, lhs, rhs) => {
                return Err(value_error(
                    format!("Cannot apply '{op}' to a {} and a {}", lhs.kind(), rhs.kind()),
                    expr,
                ));
            }
        };

        Ok(match value {
            Value::Spectrum(sp) => Value::Spectrum(sp.with_name(expr.to_string())),
            Value::Bandpass(bp) => Value::Bandpass(bp.with_name(expr.to_string())),
            other => other,
        })
    }

    /// Give a bare word its operand meaning: a number if it reads as one,
    /// otherwise a spectrum
    fn operand(&self, value: Value, expr: &Expr) -> Result<Value, EvalError> {
        match value {
            Value::Word(word) => match word.parse::<f64>() {
                Ok(number) => Ok(Value::Number(number)),
                Err(_) => Ok(Value::Spectrum(self.resolve_spectrum(&word, expr)?)),
            },
            other => Ok(other),
        }
    }

    fn number(&self, (value, expr): (Value, &Expr)) -> Result<f64, EvalError> {
        match value {
            Value::Number(number) => Ok(number),
            Value::Word(word) => word
                .parse::<f64>()
                .map_err(|_| value_error(format!("Expected a number, got '{word}'"), expr)),
            other => Err(value_error(
                format!("Expected a number, got a {}", other.kind()),
                expr,
            )),
        }
    }

    fn word(&self, value: Value, expr: &Expr) -> Result<String, EvalError> {
        match value {
            Value::Word(word) => Ok(word),
            other => Err(value_error(
                format!("Expected a keyword, got a {}", other.kind()),
                expr,
            )),
        }
    }

    fn flux_unit(&self, (value, expr): (Value, &Expr)) -> Result<FluxUnit, EvalError> {
        let word = self.word(value, expr)?;
        word.parse::<FluxUnit>()
            .map_err(|_| name_error("flux unit", word.as_str(), expr))
    }

    fn spectrum(&self, value: Value, expr: &Expr) -> Result<SourceSpectrum, EvalError> {
        match value {
            Value::Spectrum(sp) => Ok(sp),
            Value::Word(word) => self.resolve_spectrum(&word, expr),
            other => Err(value_error(
                format!("Expected a spectrum, got a {}", other.kind()),
                expr,
            )),
        }
    }

    /// A bandpass value, or a throughput file named by a bare word
    fn bandpass(&self, value: Value, expr: &Expr) -> Result<Bandpass, EvalError> {
        match value {
            Value::Bandpass(bp) => Ok(bp),
            Value::Word(word) => {
                let path = self.refs.root().convert_legacy_path(&word);
                if !path.is_file() {
                    return Err(name_error("bandpass", word, expr));
                }
                Ok(self.refs.loader().read_throughput(&path)?)
            }
            other => Err(value_error(
                format!("Expected a bandpass, got a {}", other.kind()),
                expr,
            )),
        }
    }

    /// Catalog spectrum, else a spectrum file after legacy path expansion
    fn resolve_spectrum(&self, word: &str, expr: &Expr) -> Result<SourceSpectrum, EvalError> {
        if let Some(sp) = self.catalog.get(&word.to_lowercase()) {
            return Ok(sp.clone());
        }

        let path = self.refs.root().convert_legacy_path(word);
        if !Path::new(&path).is_file() {
            return Err(name_error("spectrum", word, expr));
        }
        log::debug!("Reading spectrum {word} from {}", path.display());
        Ok(self.refs.loader().read_spectrum(&path)?)
    }

    /// Spectrum constant at `value` photlam over the default waveset
    fn constant(
        &self,
        ctx: &RefContext,
        value: f64,
        expr: &Expr,
    ) -> Result<SourceSpectrum, EvalError> {
        SourceSpectrum::flat(value, FluxUnit::Photlam, ctx.waveset().samples(), ctx.area())
            .map(|sp| sp.with_name(expr.to_string()))
            .map_err(|e| value_error(e.to_string(), expr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{CalibrationRoot, TextLoader};
    use crate::photometry::Observation;
    use crate::refs::{RefOverrides, WavesetItem};
    use approx::assert_relative_eq;
    use std::sync::Arc;

    /// Reference data with no tables and a small linear waveset
    fn refs() -> ReferenceManager {
        let _ = env_logger::builder().is_test(true).try_init();
        let refs = ReferenceManager::new(CalibrationRoot::unset(), Arc::new(TextLoader));
        refs.configure(&RefOverrides {
            waveset: Some(vec![
                WavesetItem::from(1000.0),
                WavesetItem::from(11000.0),
                WavesetItem::from(10001.0),
                WavesetItem::from("linear"),
            ]),
            ..Default::default()
        })
        .unwrap();
        refs
    }

    fn spectrum(result: SpectrumLike) -> SourceSpectrum {
        match result {
            SpectrumLike::Spectrum(sp) => sp,
            other => panic!("expected a spectrum, got {}", other.name()),
        }
    }

    fn bandpass(result: SpectrumLike) -> Bandpass {
        match result {
            SpectrumLike::Bandpass(bp) => bp,
            other => panic!("expected a bandpass, got {}", other.name()),
        }
    }

    #[test]
    fn test_unit_uses_default_waveset() {
        let refs = refs();
        let sp = spectrum(Evaluator::new(&refs).evaluate_str("unit(2,photlam)").unwrap());
        assert_eq!(sp.wave().len(), 10001);
        assert_eq!(sp.wave()[0], 1000.0);
        assert_relative_eq!(sp.flux()[500], 2.0);
        assert_eq!(sp.name(), "unit(2,photlam)");
    }

    #[test]
    fn test_renormalize_to_abmag() {
        let refs = refs();
        let eval = Evaluator::new(&refs);
        let rn = spectrum(
            eval.evaluate_str("rn(unit(1.,flam),box(5500,200),10.0,abmag)")
                .unwrap(),
        );
        let reference = spectrum(eval.evaluate_str("unit(10,abmag)").unwrap());
        let bp = bandpass(eval.evaluate_str("box(5500,200)").unwrap());

        let got = Observation::new(&rn, &bp).integrated_photlam().unwrap();
        let want = Observation::new(&reference, &bp).integrated_photlam().unwrap();
        assert_relative_eq!(got, want, max_relative = 1e-6);
    }

    #[test]
    fn test_unknown_names() {
        let refs = refs();
        let eval = Evaluator::new(&refs);

        let err = eval.evaluate_str("xyzzy(1)").unwrap_err();
        assert!(matches!(
            err,
            EvalError::Name { kind: "function", ref name, .. } if name == "xyzzy"
        ));

        // registry lookups are case-sensitive
        assert!(matches!(
            eval.evaluate_str("UNIT(1,flam)"),
            Err(EvalError::Name { .. })
        ));

        let err = eval.evaluate_str("unit(1,furlongs)").unwrap_err();
        assert!(matches!(err, EvalError::Name { kind: "flux unit", .. }));

        let err = eval.evaluate_str("ebmvx(0.1,lmc30dor)").unwrap_err();
        assert!(matches!(err, EvalError::Name { kind: "extinction law", .. }));

        let err = eval.evaluate_str("z(nosuchstar_xyzzy,0.1)").unwrap_err();
        assert!(matches!(err, EvalError::Name { kind: "spectrum", .. }));
    }

    #[test]
    fn test_arity_and_type_errors_quote_the_call() {
        let refs = refs();
        let eval = Evaluator::new(&refs);

        match eval.evaluate_str("rn(unit(1),box(5000,10),1,abmag)") {
            Err(EvalError::Value { expr, .. }) => assert_eq!(expr, "unit(1)"),
            other => panic!("expected a value error, got {other:?}"),
        }

        match eval.evaluate_str("unit(flam,1)") {
            Err(EvalError::Value { expr, message }) => {
                assert_eq!(expr, "flam");
                assert!(message.contains("number"), "{message}");
            }
            other => panic!("expected a value error, got {other:?}"),
        }

        assert!(matches!(
            eval.evaluate_str("rn(box(5000,10),box(5000,10),1,abmag)"),
            Err(EvalError::Value { .. })
        ));
    }

    #[test]
    fn test_syntax_errors_propagate() {
        let refs = refs();
        let err = Evaluator::new(&refs).evaluate_str("unit(1,flam").unwrap_err();
        assert!(matches!(err, EvalError::Syntax(_)));
    }

    #[test]
    fn test_band_without_tables() {
        let refs = refs();
        let err = Evaluator::new(&refs)
            .evaluate_str("band(acs,wfc1,f555w)")
            .unwrap_err();
        assert!(matches!(err, EvalError::Reference(RefError::Unavailable(_))));
    }

    #[test]
    fn test_operators() {
        let refs = refs();
        let eval = Evaluator::new(&refs);

        let sum = spectrum(eval.evaluate_str("unit(1,photlam) + unit(2,photlam)").unwrap());
        assert_relative_eq!(sum.sample(5000.0), 3.0);

        let diff = spectrum(eval.evaluate_str("unit(3,photlam) - unit(2,photlam)").unwrap());
        assert_relative_eq!(diff.sample(5000.0), 1.0);

        let scaled = spectrum(eval.evaluate_str("-0.5 * unit(4,photlam)").unwrap());
        assert_relative_eq!(scaled.sample(5000.0), -2.0);

        let halved = bandpass(eval.evaluate_str("box(5000,100) / 2").unwrap());
        assert_relative_eq!(halved.at(5000.0), 0.5);

        let through = spectrum(eval.evaluate_str("unit(1,photlam) * box(5000,100)").unwrap());
        assert_relative_eq!(through.integrate().unwrap(), 100.0, max_relative = 1e-4);

        let product = bandpass(eval.evaluate_str("box(5000,100) * (2 * box(5000,50))").unwrap());
        assert_relative_eq!(product.at(5000.0), 2.0);
        assert_eq!(product.at(5040.0), 0.0);

        let constant = spectrum(eval.evaluate_str("(1 + 2) * 2").unwrap());
        assert_relative_eq!(constant.sample(5000.0), 6.0);

        assert!(matches!(
            eval.evaluate_str("box(5000,10) + box(6000,10)"),
            Err(EvalError::Value { .. })
        ));
        assert!(matches!(
            eval.evaluate_str("unit(1,flam) / 0"),
            Err(EvalError::Value { .. })
        ));
    }

    #[test]
    fn test_redshift_and_exposure_time() {
        let refs = refs();
        let eval = Evaluator::new(&refs);

        let z = spectrum(eval.evaluate_str("z(em(5000,10,1,photlam),1)").unwrap());
        let peak = z
            .wave()
            .iter()
            .zip(z.flux().iter())
            .fold((0.0, f64::MIN), |acc, (&w, &f)| if f > acc.1 { (w, f) } else { acc });
        assert_relative_eq!(peak.0, 10000.0, max_relative = 1e-3);

        let et = spectrum(eval.evaluate_str("et(unit(1,photlam),100)").unwrap());
        assert_relative_eq!(et.sample(2000.0), 100.0);
        assert!(eval.evaluate_str("et(unit(1,photlam),-1)").is_err());
    }

    #[test]
    fn test_extinction() {
        let refs = refs();
        let eval = Evaluator::new(&refs);

        let mw = bandpass(eval.evaluate_str("ebmv(0.1)").unwrap());
        let gal1 = bandpass(eval.evaluate_str("ebmvx(0.1,gal1)").unwrap());
        assert_eq!(mw.throughput(), gal1.throughput());
        assert!(mw.at(2000.0) < mw.at(9000.0));

        let reddened = spectrum(eval.evaluate_str("bb(10000)*ebmvx(0.2,xgal)").unwrap());
        let plain = spectrum(eval.evaluate_str("bb(10000)").unwrap());
        assert!(reddened.sample(3000.0) < plain.sample(3000.0));
    }

    #[test]
    fn test_catalog_and_files() {
        let refs = refs();
        let mut eval = Evaluator::new(&refs);
        let flat = SourceSpectrum::from_table(
            "flat",
            vec![1000.0, 20000.0],
            vec![1.0, 1.0],
            FluxUnit::Photlam,
        )
        .unwrap();
        eval.register_spectrum("Flat", flat);

        let sp = spectrum(eval.evaluate_str("FLAT").unwrap());
        assert_relative_eq!(sp.sample(5000.0), 1.0);

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("ramp.dat");
        fs::write(&file, "# fluxunit: photlam\n1000 0\n3000 2\n").unwrap();
        let expr = format!("spec({})", file.display());
        let sp = spectrum(eval.evaluate_str(&expr).unwrap());
        assert_relative_eq!(sp.sample(2000.0), 1.0);
        assert_eq!(sp.name(), expr);
    }

    #[test]
    fn test_file_lists() {
        let refs = refs();
        let eval = Evaluator::new(&refs);

        assert!(matches!(
            eval.evaluate_str("@list"),
            Err(EvalError::Value { .. })
        ));

        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("list");
        fs::write(&list, "# two sources\nbb(5000)\n\nunit(1,flam)\n").unwrap();
        let results = eval
            .evaluate_file_list(&list.display().to_string())
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name(), "bb(5000)");

        assert!(matches!(
            eval.evaluate_file_list("/nonexistent/list"),
            Err(EvalError::Load(LoadError::Io { .. }))
        ));
    }
}
