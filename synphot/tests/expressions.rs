//! End-to-end evaluation against a small calibration tree on disk

use std::fs;
use std::path::Path;
use std::sync::Arc;

use approx::assert_relative_eq;
use synphot::eval::{EvalError, Evaluator, SpectrumLike};
use synphot::io::{CalibrationRoot, TextLoader};
use synphot::photometry::{Bandpass, Observation, SourceSpectrum};
use synphot::refs::{
    RefError, RefMode, RefOverrides, ReferenceManager, TablePath, WavesetItem, WavesetSpec,
    DEFAULT_AREA,
};

const GRAPH: &str = "\
# compname  keyword  innode  outnode  thcompname
hst_ota     default  1  2  hst_ota_th
clear       stis     2  3
stis_ccd    ccd      3  4
stis_fuv    fuvmama  3  4
stis_g430m  g430m    4  5
clear       default  4  5
stis_c4451  c4451    5  6
clear       default  5  6
stis_52x02  52x0.2   6  7
clear       default  6  7
";

const COMPONENTS: &str = "\
hst_ota     crotacomp$hst_ota.dat
stis_ccd    crstiscomp$stis_ccd.dat
stis_fuv    crstiscomp$stis_fuv.dat
stis_g430m  crstiscomp$stis_g430m.dat
stis_c4451  crstiscomp$stis_c4451.dat
stis_52x02  $PYSYN_CDBS/comp/stis/stis_52x02.dat
";

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn calibration_tree() -> tempfile::TempDir {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "mtab/t1_tmg.fits", GRAPH);
    write(root, "mtab/t1_tmc.fits", COMPONENTS);
    write(root, "mtab/t1_tmt.fits", "");
    write(root, "comp/ota/hst_ota.dat", "1000 0.8\n11000 0.8\n");
    write(root, "comp/stis/stis_ccd.dat", "2000 0.5\n10000 0.5\n");
    write(root, "comp/stis/stis_fuv.dat", "1150 0.1\n1700 0.1\n");
    write(
        root,
        "comp/stis/stis_g430m.dat",
        "3900 0\n4000 1\n5500 1\n5600 0\n",
    );
    write(
        root,
        "comp/stis/stis_c4451.dat",
        "4390 0\n4400 1\n4500 1\n4510 0\n",
    );
    write(root, "comp/stis/stis_52x02.dat", "1000 0.9\n11000 0.9\n");
    write(
        root,
        "calspec/gd71.dat",
        "# fluxunit: flam\n1000 1e-13\n5000 1e-14\n11000 1e-15\n",
    );
    dir
}

fn manager(dir: &tempfile::TempDir) -> ReferenceManager {
    ReferenceManager::new(CalibrationRoot::with_path(dir.path()), Arc::new(TextLoader))
}

fn spectrum(result: SpectrumLike) -> SourceSpectrum {
    match result {
        SpectrumLike::Spectrum(sp) => sp,
        SpectrumLike::Bandpass(bp) => panic!("expected a spectrum, got {}", bp.name()),
    }
}

fn bandpass(result: SpectrumLike) -> Bandpass {
    match result {
        SpectrumLike::Bandpass(bp) => bp,
        SpectrumLike::Spectrum(sp) => panic!("expected a bandpass, got {}", sp.name()),
    }
}

#[test]
fn obsmode_bandpass_multiplies_components() {
    let dir = calibration_tree();
    let refs = manager(&dir);
    let eval = Evaluator::new(&refs);

    let bp = bandpass(eval.evaluate_str("band(stis,ccd,g430m,c4451,52X0.2)").unwrap());
    assert_eq!(bp.name(), "band(stis,ccd,g430m,c4451,52X0.2)");
    assert_relative_eq!(bp.at(4450.0), 0.8 * 0.5 * 0.9, max_relative = 1e-12);
    assert_eq!(bp.at(4600.0), 0.0);

    // Without the filter keywords the default clear rows are taken
    let wide = bandpass(eval.evaluate_str("band(stis,ccd)").unwrap());
    assert_relative_eq!(wide.at(7000.0), 0.8 * 0.5, max_relative = 1e-12);
}

#[test]
fn renormalized_source_through_obsmode() {
    let dir = calibration_tree();
    let refs = manager(&dir);
    let eval = Evaluator::new(&refs);

    let source = spectrum(
        eval.evaluate_str("rn(unit(1.,flam),band(stis,ccd,g430m,c4451,52X0.2),10.000000,abmag)")
            .unwrap(),
    );
    let bp = bandpass(eval.evaluate_str("band(stis,ccd,g430m,c4451,52X0.2)").unwrap());
    let reference = spectrum(eval.evaluate_str("unit(10,abmag)").unwrap());

    let got = Observation::new(&source, &bp).count_rate(refs.area()).unwrap();
    let want = Observation::new(&reference, &bp)
        .count_rate(refs.area())
        .unwrap();
    assert_relative_eq!(got, want, max_relative = 1e-6);

    let efflam = Observation::new(&source, &bp).effective_wavelength().unwrap();
    assert!(efflam > 4400.0 && efflam < 4510.0, "efflam {efflam}");
}

#[test]
fn obsmode_errors() {
    let dir = calibration_tree();
    let refs = manager(&dir);
    let eval = Evaluator::new(&refs);

    match eval.evaluate_str("band(stis,ccd,bogus)") {
        Err(EvalError::Name { name, .. }) => assert_eq!(name, "bogus"),
        other => panic!("expected a name error, got {other:?}"),
    }

    // node 2 has no default row
    assert!(matches!(
        eval.evaluate_str("band(ccd)"),
        Err(EvalError::Value { .. })
    ));

    assert!(matches!(
        eval.evaluate_str("band(stis,ccd,g430m(1))"),
        Err(EvalError::Value { .. })
    ));
}

#[test]
fn spectra_from_legacy_paths() {
    let dir = calibration_tree();
    let refs = manager(&dir);
    let eval = Evaluator::new(&refs);

    let a = spectrum(
        eval.evaluate_str("spec($PYSYN_CDBS//calspec/gd71.dat)")
            .unwrap(),
    );
    let b = spectrum(eval.evaluate_str("spec(crcalspec$gd71.dat)").unwrap());
    assert_eq!(a.flux(), b.flux());
    assert_eq!(a.wave().len(), 3);

    let shifted = spectrum(eval.evaluate_str("z(spec(crcalspec$gd71.dat),0.5)").unwrap());
    assert_relative_eq!(shifted.wave()[0], 1500.0);
    let reddened = spectrum(
        eval.evaluate_str("z(spec(crcalspec$gd71.dat),0.5)*ebmvx(0.1,mwavg)")
            .unwrap(),
    );
    assert!(reddened.sample(3000.0) < shifted.sample(3000.0));
}

#[test]
fn missing_component_table_fails_lazily() {
    let dir = calibration_tree();
    let refs = manager(&dir);
    let eval = Evaluator::new(&refs);

    refs.configure(&RefOverrides {
        comptable: Some("mtab$missing_tmc.fits".to_string()),
        ..Default::default()
    })
    .unwrap();

    // expressions without band() still work
    assert!(eval.evaluate_str("bb(6000)").is_ok());
    assert!(matches!(
        eval.evaluate_str("band(stis,ccd)"),
        Err(EvalError::Reference(RefError::Table(_)))
    ));

    refs.configure(&RefOverrides::default()).unwrap();
    assert!(eval.evaluate_str("band(stis,ccd)").is_ok());
}

#[test]
fn reconfiguration_drops_cached_tables() {
    let dir = calibration_tree();
    let refs = manager(&dir);
    let eval = Evaluator::new(&refs);

    eval.evaluate_str("band(stis,ccd)").unwrap();
    assert_eq!(refs.cached_tables(), 2);

    // Point the graph table at a copy where node 3 only has a clear row
    write(
        dir.path(),
        "alt/graph.dat",
        &GRAPH.replace("stis_ccd    ccd      3  4\n", "clear       default  3  4\n"),
    );
    refs.configure(&RefOverrides {
        graphtable: Some(format!("{}/alt/graph.dat", dir.path().display())),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(refs.cached_tables(), 0);

    assert!(matches!(
        eval.evaluate_str("band(stis,ccd)"),
        Err(EvalError::Name { .. })
    ));
}

#[test]
fn waveset_parameters() {
    let refs = ReferenceManager::new(CalibrationRoot::unset(), Arc::new(TextLoader));

    let default = refs.waveset();
    assert_eq!(default.len(), 10000);
    assert!(default.samples().windows(2).into_iter().all(|w| w[1] > w[0]));

    refs.set_default_waveset(WavesetSpec {
        minwave: 500.0,
        maxwave: 26000.0,
        num: 10000,
        delta: Some(0.5),
        log: false,
    })
    .unwrap();
    let ws = refs.waveset();
    assert_eq!(ws.len(), ((26000.0f64 - 500.0) / 0.5).round() as usize + 1);
    assert_eq!(ws.samples()[0], 500.0);
    assert_eq!(ws.samples()[ws.len() - 1], 26000.0);

    let log3 = RefOverrides {
        waveset: Some(vec![500.0.into(), 26000.0.into(), 10000.0.into()]),
        ..Default::default()
    };
    let log4 = RefOverrides {
        waveset: Some(vec![
            500.0.into(),
            26000.0.into(),
            10000.0.into(),
            "log".into(),
        ]),
        ..Default::default()
    };
    refs.configure(&log3).unwrap();
    let three = refs.waveset();
    refs.configure(&log4).unwrap();
    assert_eq!(*three, *refs.waveset());

    let bogus = RefOverrides {
        waveset: Some(vec![
            500.0.into(),
            26000.0.into(),
            10000.0.into(),
            WavesetItem::from("bogus"),
        ]),
        ..Default::default()
    };
    assert!(matches!(refs.configure(&bogus), Err(RefError::Value(_))));
}

#[test]
fn readers_see_whole_configurations() {
    let dir = calibration_tree();
    let refs = manager(&dir);

    let overridden = RefOverrides {
        area: Some(1.0),
        waveset: Some(vec![1000.0.into(), 2000.0.into(), 11.0.into(), "linear".into()]),
        ..Default::default()
    };

    std::thread::scope(|s| {
        s.spawn(|| {
            for i in 0..200 {
                if i % 2 == 0 {
                    refs.configure(&overridden).unwrap();
                } else {
                    refs.initialize();
                }
            }
        });

        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..500 {
                    let snap = refs.query();
                    let is_default = snap.area == DEFAULT_AREA;
                    assert_eq!(is_default, snap.waveset.starts_with("Min: 500,"));
                    assert_eq!(is_default, snap.mode == RefMode::Default);
                    assert!(matches!(snap.graphtable, TablePath::Resolved(_)));
                }
            });
        }
    });
}

#[test]
fn evaluations_never_mix_table_configurations() {
    let dir = calibration_tree();
    let refs = manager(&dir);

    // Second pair renames the ccd component, so a graph from one pair cannot
    // resolve against the other pair's component table
    write(dir.path(), "alt/graph.dat", &GRAPH.replace("stis_ccd ", "stis_ccd_b"));
    write(
        dir.path(),
        "alt/comp.dat",
        &COMPONENTS.replace("stis_ccd    crstiscomp", "stis_ccd_b  crstiscomp"),
    );
    let root = dir.path().display();
    let first = RefOverrides {
        graphtable: Some(format!("{root}/mtab/t1_tmg.fits")),
        comptable: Some(format!("{root}/mtab/t1_tmc.fits")),
        area: Some(DEFAULT_AREA),
        ..Default::default()
    };
    let second = RefOverrides {
        graphtable: Some(format!("{root}/alt/graph.dat")),
        comptable: Some(format!("{root}/alt/comp.dat")),
        area: Some(1.0),
        ..Default::default()
    };

    std::thread::scope(|s| {
        s.spawn(|| {
            for i in 0..200 {
                let overrides = if i % 2 == 0 { &second } else { &first };
                refs.configure(overrides).unwrap();
            }
        });

        for _ in 0..4 {
            s.spawn(|| {
                let eval = Evaluator::new(&refs);
                for _ in 0..50 {
                    let bp = bandpass(eval.evaluate_str("band(stis,ccd)").unwrap());
                    assert_relative_eq!(bp.at(7000.0), 0.8 * 0.5, max_relative = 1e-12);

                    let ctx = refs.context();
                    let graph = ctx.graph_table().unwrap();
                    let components = ctx.component_table().unwrap();
                    for row in graph.rows().iter().filter(|r| r.compname != "clear") {
                        assert!(components.file_for(&row.compname).is_some());
                    }
                    let alternate = graph.rows().iter().any(|r| r.compname == "stis_ccd_b");
                    assert_eq!(alternate, ctx.area() == 1.0);
                }
            });
        }
    });
}

#[test]
fn file_list_of_expressions() {
    let dir = calibration_tree();
    let refs = manager(&dir);
    let eval = Evaluator::new(&refs);

    write(
        dir.path(),
        "lists/sources",
        "bb(5000)\nspec(crcalspec$gd71.dat)\nband(stis,ccd)\n",
    );
    let results = eval
        .evaluate_file_list("crrefer$lists/sources")
        .unwrap();
    assert_eq!(results.len(), 3);
    assert!(results[2].as_bandpass().is_some());
}

#[test]
fn process_wide_references() {
    synphot::configure_references(&RefOverrides {
        area: Some(12.5),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(synphot::query_references().area, 12.5);
    assert_eq!(synphot::query_references(), synphot::query_references());

    let sp = spectrum(synphot::evaluate_expression("unit(1,photlam)").unwrap());
    assert_relative_eq!(sp.sample(5000.0), 1.0);

    synphot::configure_references(&RefOverrides::default()).unwrap();
    assert_eq!(synphot::query_references().area, DEFAULT_AREA);
}
