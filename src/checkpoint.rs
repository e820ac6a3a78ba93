//! Parameter checkpoints as JSON.
//!
//! A checkpoint is the serialized [`Params`] mapping: names in forward
//! order, each with its shape and `f64` values. serde_json writes floats in
//! shortest round-trip form, so loading a checkpoint restores every weight
//! bit for bit. JSON has no encoding for NaN or infinities, so mappings
//! holding them are refused before anything is written.

use crate::error::{NetError, Result};
use crate::model::LeNet5;
use crate::params::Params;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// Write `params` to `path`, creating parent directories as needed.
///
/// Returns [`NetError::NonFinite`] naming the first tensor with a NaN or
/// infinite value; no file is created in that case.
pub fn save_params(path: impl AsRef<Path>, params: &Params) -> Result<()> {
    if let Some((name, _)) = params
        .iter()
        .find(|(_, value)| value.iter().any(|x| !x.is_finite()))
    {
        return Err(NetError::NonFinite(name.to_string()));
    }

    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(fs::File::create(path)?);
    serde_json::to_writer(&mut writer, params)?;
    writer.flush()?;

    debug!(
        path = %path.display(),
        tensors = params.len(),
        values = params.parameter_count(),
        "checkpoint written"
    );
    Ok(())
}

/// Read a parameter mapping previously written by [`save_params`].
pub fn load_params(path: impl AsRef<Path>) -> Result<Params> {
    let reader = BufReader::new(fs::File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Save the model's current parameters.
pub fn save_model(path: impl AsRef<Path>, model: &LeNet5) -> Result<()> {
    save_params(path, &model.get_params())
}

/// Load parameters from `path` into `model`.
///
/// Fails without touching the model if the checkpoint does not match its
/// architecture. Returns the loaded mapping so an optimizer can be resynced.
pub fn load_model_into(path: impl AsRef<Path>, model: &mut LeNet5) -> Result<Params> {
    let params = load_params(path)?;
    model.set_params(&params)?;
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_params_round_trip_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/ckpt.json");

        let mut params = Params::new();
        params.insert("fc.weight", array![[0.1, 1.0 / 3.0], [-2.5e-300, 7.0]].into_dyn());
        params.insert("fc.bias", array![f64::MIN_POSITIVE, -0.0].into_dyn());

        save_params(&path, &params).unwrap();
        let loaded = load_params(&path).unwrap();

        assert_eq!(loaded, params);
        let names: Vec<&str> = loaded.names().collect();
        assert_eq!(names, vec!["fc.weight", "fc.bias"]);
    }

    #[test]
    fn test_non_finite_values_are_refused() {
        let dir = tempfile::tempdir().unwrap();

        for bad in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let path = dir.path().join("diverged.json");
            let mut params = Params::new();
            params.insert("fc.weight", array![[0.5, 1.0]].into_dyn());
            params.insert("fc.bias", array![0.0, bad].into_dyn());

            let err = save_params(&path, &params).unwrap_err();
            assert!(matches!(&err, NetError::NonFinite(name) if name == "fc.bias"));
            assert!(!path.exists());
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_params(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, NetError::Io(_)));
    }
}
