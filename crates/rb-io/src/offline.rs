//! Offline data of a reduced problem on disk.
//!
//! Layout under `<root>/<problem>/`:
//! - `<term>_<k>.npy` for the k-th operator of each affine expansion
//! - `basis.npy` when a basis is stored
//! - `manifest.json` listing the files and their SHA-256 checksums

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use nalgebra::DMatrix;
use rb_affine::{AffineExpansion, AffineOperatorStore, AlgebraicOperator, TermOrder};
use rb_core::Real;
use rb_problems::EngineConfig;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::group::ProcessGroup;
use crate::npy::{self, NpyArray};
use crate::numpy_io::NumpyIo;
use crate::{IoError, IoResult};

const MANIFEST: &str = "manifest.json";
const BASIS: &str = "basis";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OfflineManifest {
    pub problem: String,
    /// RFC 3339
    pub created_at: String,
    pub basis_size: Option<usize>,
    pub terms: Vec<TermFiles>,
    /// File stem -> hex digest of the `.npy` bytes.
    pub checksums: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TermFiles {
    pub term: String,
    pub arity: usize,
    pub files: Vec<String>,
}

/// Hex SHA-256 of `bytes`.
pub fn checksum(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub struct OfflineStorage<'g> {
    root: PathBuf,
    io: NumpyIo<'g>,
}

impl<'g> OfflineStorage<'g> {
    pub fn new(root: impl Into<PathBuf>, group: &'g dyn ProcessGroup) -> Self {
        Self {
            root: root.into(),
            io: NumpyIo::new(group),
        }
    }

    /// Storage rooted at the configured `storage_dir`, if one is set.
    pub fn from_config(config: &EngineConfig, group: &'g dyn ProcessGroup) -> Option<Self> {
        config
            .storage_dir
            .as_ref()
            .map(|root| Self::new(root.clone(), group))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn problem_dir(&self, problem: &str) -> PathBuf {
        self.root.join(problem)
    }

    pub fn exists(&self, problem: &str) -> IoResult<bool> {
        let path = self.problem_dir(problem).join(MANIFEST);
        match self.io.read_raw(&path) {
            Ok(_) => Ok(true),
            Err(IoError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub fn save(
        &self,
        problem: &str,
        operators: &AffineOperatorStore,
        basis: Option<&DMatrix<Real>>,
    ) -> IoResult<OfflineManifest> {
        let dir = self.problem_dir(problem);
        let mut checksums = BTreeMap::new();
        let mut terms = Vec::new();

        for expansion in operators.iter() {
            let mut files = Vec::with_capacity(expansion.len());
            for (k, operator) in expansion.iter().enumerate() {
                let stem = format!("{}_{}", expansion.term(), k);
                let digest = self.write_array(&dir, &stem, &operator_array(operator))?;
                checksums.insert(stem.clone(), digest);
                files.push(stem);
            }
            terms.push(TermFiles {
                term: expansion.term().to_string(),
                arity: expansion.order().arity(),
                files,
            });
        }

        if let Some(basis) = basis {
            let digest = self.write_array(&dir, BASIS, &NpyArray::from(basis))?;
            checksums.insert(BASIS.to_string(), digest);
        }

        let manifest = OfflineManifest {
            problem: problem.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            basis_size: basis.map(DMatrix::ncols),
            terms,
            checksums,
        };
        let json = serde_json::to_vec_pretty(&manifest)?;
        self.io.write_raw(&dir.join(MANIFEST), Some(json))?;

        info!(
            problem,
            terms = manifest.terms.len(),
            basis_size = ?manifest.basis_size,
            "offline data saved"
        );
        Ok(manifest)
    }

    pub fn load_manifest(&self, problem: &str) -> IoResult<OfflineManifest> {
        let bytes = self.io.read_raw(&self.problem_dir(problem).join(MANIFEST))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn load(
        &self,
        problem: &str,
    ) -> IoResult<(AffineOperatorStore, Option<DMatrix<Real>>)> {
        let dir = self.problem_dir(problem);
        let manifest = self.load_manifest(problem)?;

        let mut store = AffineOperatorStore::new();
        for entry in &manifest.terms {
            let order = TermOrder::from_arity(entry.arity)?;
            let operators = entry
                .files
                .iter()
                .map(|stem| {
                    let array = self.read_array(&dir, stem, &manifest)?;
                    array_operator(array, order)
                })
                .collect::<IoResult<Vec<_>>>()?;
            store.insert(AffineExpansion::with_order(&entry.term, order, operators)?);
        }

        let basis = match manifest.basis_size {
            Some(size) => {
                let basis = self.read_array(&dir, BASIS, &manifest)?.into_matrix()?;
                if basis.ncols() != size {
                    return Err(IoError::format(format!(
                        "basis has {} columns, manifest says {}",
                        basis.ncols(),
                        size
                    )));
                }
                Some(basis)
            }
            None => None,
        };

        info!(problem, terms = manifest.terms.len(), "offline data loaded");
        Ok((store, basis))
    }

    fn write_array(&self, dir: &Path, stem: &str, array: &NpyArray) -> IoResult<String> {
        let bytes = npy::encode(array);
        let digest = checksum(&bytes);
        debug!(file = stem, checksum = %digest, "saving array");
        self.io.write_raw(&NumpyIo::path(dir, stem), Some(bytes))?;
        Ok(digest)
    }

    fn read_array(&self, dir: &Path, stem: &str, manifest: &OfflineManifest) -> IoResult<NpyArray> {
        let bytes = self.io.read_raw(&NumpyIo::path(dir, stem))?;
        let actual = checksum(&bytes);
        match manifest.checksums.get(stem) {
            Some(expected) if *expected == actual => npy::decode(&bytes),
            Some(expected) => Err(IoError::Checksum {
                file: stem.to_string(),
                expected: expected.clone(),
                actual,
            }),
            None => Err(IoError::format(format!("{stem} is not listed in the manifest"))),
        }
    }
}

fn operator_array(operator: &AlgebraicOperator) -> NpyArray {
    match operator {
        AlgebraicOperator::Scalar(value) => NpyArray::scalar(*value),
        AlgebraicOperator::Vector(v) => NpyArray::from(v),
        AlgebraicOperator::Matrix(m) => NpyArray::from(m),
    }
}

fn array_operator(array: NpyArray, order: TermOrder) -> IoResult<AlgebraicOperator> {
    Ok(match order {
        TermOrder::Scalar => AlgebraicOperator::Scalar(array.into_scalar()?),
        TermOrder::Vector => AlgebraicOperator::Vector(array.into_vector()?),
        TermOrder::Matrix => AlgebraicOperator::Matrix(array.into_matrix()?),
    })
}
