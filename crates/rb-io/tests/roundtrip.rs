use std::path::PathBuf;
use std::thread;

use nalgebra::{DMatrix, DVector};
use rb_affine::{AffineExpansion, AffineOperatorStore, TermOrder, ThetaContext};
use rb_core::{RbResult, Real};
use rb_io::{IoError, LocalGroup, NpyArray, NumpyIo, OfflineStorage, ProcessGroup, SingleProcess};
use rb_problems::{Engine, EngineConfig, ProblemBuilder};

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(name);
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

#[test]
fn save_then_load_single_process() {
    let dir = temp_dir("rb_io_test_single");
    let io = NumpyIo::new(&SingleProcess);
    let m = DMatrix::from_row_slice(2, 3, &[1.0, -2.0, 3.5, 0.1, 1e-300, Real::MAX]);

    assert!(!io.exists(&dir, "m").unwrap());
    io.save(&NpyArray::from(&m), &dir, "m").unwrap();
    assert!(io.exists(&dir, "m").unwrap());
    assert!(dir.join("m.npy").is_file());

    let loaded = io.load(&dir, "m").unwrap().into_matrix().unwrap();
    assert_eq!(loaded, m);
}

#[test]
fn every_rank_loads_the_same_content() {
    let dir = temp_dir("rb_io_test_group");
    let content = DVector::from_vec(vec![0.5, 1.0 / 3.0, -7.25, 2.0f64.sqrt()]);

    let handles: Vec<_> = LocalGroup::new(3)
        .into_iter()
        .map(|group| {
            let dir = dir.clone();
            let content = content.clone();
            thread::spawn(move || {
                let io = NumpyIo::new(&group);
                let before = io.exists(&dir, "u").unwrap();
                io.save(&NpyArray::from(&content), &dir, "u").unwrap();
                let after = io.exists(&dir, "u").unwrap();
                let loaded = io.load(&dir, "u").unwrap().into_vector().unwrap();
                (group.rank(), before, after, loaded)
            })
        })
        .collect();

    for handle in handles {
        let (rank, before, after, loaded) = handle.join().unwrap();
        assert!(!before, "rank {rank}");
        assert!(after, "rank {rank}");
        assert_eq!(loaded, content, "rank {rank}");
    }
}

#[test]
fn missing_file_is_not_found_on_every_rank() {
    let dir = temp_dir("rb_io_test_missing");
    let handles: Vec<_> = LocalGroup::new(2)
        .into_iter()
        .map(|group| {
            let dir = dir.clone();
            thread::spawn(move || NumpyIo::new(&group).load(&dir, "absent"))
        })
        .collect();
    for handle in handles {
        assert!(matches!(
            handle.join().unwrap(),
            Err(IoError::NotFound { .. })
        ));
    }
}

fn sample_store() -> AffineOperatorStore {
    AffineOperatorStore::new()
        .with(
            AffineExpansion::new(
                "a",
                vec![
                    DMatrix::from_row_slice(2, 2, &[2.0, -1.0, -1.0, 2.0]).into(),
                    DMatrix::<f64>::identity(2, 2).into(),
                ],
            )
            .unwrap(),
        )
        .with(AffineExpansion::new("f", vec![DVector::from_vec(vec![1.0, 0.5]).into()]).unwrap())
        .with(AffineExpansion::new("s", vec![3.0f64.into()]).unwrap())
}

#[test]
fn offline_store_round_trip() {
    let dir = temp_dir("rb_io_test_offline");
    let storage = OfflineStorage::new(&dir, &SingleProcess);
    let store = sample_store();
    let basis = DMatrix::from_row_slice(2, 1, &[0.6, 0.8]);

    assert!(!storage.exists("p_reduced").unwrap());
    let manifest = storage.save("p_reduced", &store, Some(&basis)).unwrap();
    assert!(storage.exists("p_reduced").unwrap());
    assert_eq!(manifest.basis_size, Some(1));
    assert_eq!(manifest.checksums.len(), 5);
    assert!(chrono::DateTime::parse_from_rfc3339(&manifest.created_at).is_ok());

    let (loaded, loaded_basis) = storage.load("p_reduced").unwrap();
    assert_eq!(loaded, store);
    assert_eq!(loaded_basis, Some(basis));
    assert_eq!(storage.load_manifest("p_reduced").unwrap(), manifest);
}

#[test]
fn storage_follows_configured_directory() {
    let dir = temp_dir("rb_io_test_configured");
    assert!(OfflineStorage::from_config(&EngineConfig::default(), &SingleProcess).is_none());

    let yaml = format!("storage_dir: '{}'\n", dir.display());
    let config = EngineConfig::from_yaml_str(&yaml).unwrap();
    let storage = OfflineStorage::from_config(&config, &SingleProcess).unwrap();
    assert_eq!(storage.root(), dir.as_path());

    storage.save("configured", &sample_store(), None).unwrap();
    assert!(dir.join("configured").join("manifest.json").is_file());
    let (loaded, basis) = storage.load("configured").unwrap();
    assert_eq!(loaded, sample_store());
    assert_eq!(basis, None);
}

#[test]
fn corrupted_file_fails_checksum() {
    let dir = temp_dir("rb_io_test_corrupt");
    let storage = OfflineStorage::new(&dir, &SingleProcess);
    storage.save("p", &sample_store(), None).unwrap();

    let other = NpyArray::from(&DVector::from_vec(vec![9.0, 9.0]));
    NumpyIo::new(&SingleProcess)
        .save(&other, &storage.problem_dir("p"), "f_0")
        .unwrap();

    assert!(matches!(
        storage.load("p"),
        Err(IoError::Checksum { file, .. }) if file == "f_0"
    ));
}

fn heat_problem(engine: &Engine) -> rb_core::ProblemId {
    let definition = ProblemBuilder::new("heat")
        .term("a", TermOrder::Matrix)
        .term("f", TermOrder::Vector)
        .dimension(3)
        .theta(|term: &str, ctx: &dyn ThetaContext| -> RbResult<Vec<Real>> {
            Ok(match term {
                "a" => vec![1.0, ctx.mu()[0]],
                _ => vec![1.0],
            })
        })
        .build()
        .unwrap();
    let laplacian = DMatrix::from_row_slice(3, 3, &[2.0, -1.0, 0.0, -1.0, 2.0, -1.0, 0.0, -1.0, 2.0]);
    let operators = AffineOperatorStore::new()
        .with(
            AffineExpansion::new(
                "a",
                vec![laplacian.into(), DMatrix::<f64>::identity(3, 3).into()],
            )
            .unwrap(),
        )
        .with(AffineExpansion::new("f", vec![DVector::from_element(3, 1.0).into()]).unwrap());
    engine.add_problem(definition, operators).unwrap()
}

#[test]
fn trained_operators_survive_storage() {
    let dir = temp_dir("rb_io_test_trained");
    let storage = OfflineStorage::new(&dir, &SingleProcess);
    let basis = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 1.0, 1.0, 0.0]);

    let offline = Engine::new();
    let truth = heat_problem(&offline);
    let reduced = offline.train(truth, basis.clone()).unwrap();
    storage
        .save(
            &offline.name(reduced).unwrap(),
            &offline.operators(reduced).unwrap(),
            offline.basis(reduced).unwrap().as_ref(),
        )
        .unwrap();
    offline.set_mu(reduced, [0.5]).unwrap();
    let expected = offline.solve(reduced).unwrap();

    let online = Engine::new();
    let truth = heat_problem(&online);
    let (operators, stored_basis) = storage.load("heat_reduced").unwrap();
    let reduced = online
        .attach_reduced(truth, operators, stored_basis.unwrap())
        .unwrap();
    online.set_mu(reduced, [0.5]).unwrap();
    let coefficients = online.solve(reduced).unwrap();

    assert_eq!(coefficients, expected);
    assert!(online.training_finished(truth).unwrap());
}
