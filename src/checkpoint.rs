use crate::error::{Error, Result};
use crate::params::{Layer, Parameters};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use ndarray::Array2;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

// "DGWT" followed by the format revision.
const MAGIC: u32 = 0x4447_5754;
const VERSION: u16 = 1;

/// Checkpoint file for a given epoch: `<dir>/weights_<epoch>.bin`.
pub fn checkpoint_path(dir: &Path, epoch: usize) -> PathBuf {
    dir.join(format!("weights_{epoch}.bin"))
}

/// Serialize the full parameter store for one epoch.
///
/// The layout is big-endian throughout: magic, version, layer count, then per
/// layer the weight matrix and bias column, each as a `rows, cols` header
/// followed by the raw f64 entries in row-major order. Writing the exact bit
/// pattern of every float makes the round trip bitwise lossless.
pub fn save(params: &Parameters, dir: &Path, epoch: usize) -> Result<()> {
    fs::create_dir_all(dir)?;
    let path = checkpoint_path(dir, epoch);
    let mut writer = BufWriter::new(File::create(&path)?);

    writer.write_u32::<BigEndian>(MAGIC)?;
    writer.write_u16::<BigEndian>(VERSION)?;
    writer.write_u32::<BigEndian>(params.layers.len() as u32)?;
    for layer in &params.layers {
        write_matrix(&mut writer, &layer.weights)?;
        write_matrix(&mut writer, &layer.bias)?;
    }
    writer.flush()?;
    log::debug!("saved checkpoint {}", path.display());
    Ok(())
}

/// Load the parameter store saved for `epoch`, or `CheckpointNotFound` if no
/// file exists for that epoch.
pub fn load(dir: &Path, epoch: usize) -> Result<Parameters> {
    let path = checkpoint_path(dir, epoch);
    let file = match File::open(&path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(Error::CheckpointNotFound(path));
        }
        Err(err) => return Err(err.into()),
    };
    let mut reader = BufReader::new(file);

    if reader.read_u32::<BigEndian>()? != MAGIC {
        return Err(Error::InvalidData(format!(
            "{} is not a weights checkpoint",
            path.display()
        )));
    }
    let version = reader.read_u16::<BigEndian>()?;
    if version != VERSION {
        return Err(Error::InvalidData(format!(
            "unsupported checkpoint version {version} in {}",
            path.display()
        )));
    }

    let layer_count = reader.read_u32::<BigEndian>()? as usize;
    let mut layers = Vec::with_capacity(layer_count);
    for _ in 0..layer_count {
        layers.push(Layer {
            weights: read_matrix(&mut reader)?,
            bias: read_matrix(&mut reader)?,
        });
    }

    let params = Parameters { layers };
    validate_chain(&params)?;
    log::debug!("loaded checkpoint {}", path.display());
    Ok(params)
}

fn write_matrix<W: Write>(writer: &mut W, matrix: &Array2<f64>) -> Result<()> {
    writer.write_u32::<BigEndian>(matrix.nrows() as u32)?;
    writer.write_u32::<BigEndian>(matrix.ncols() as u32)?;
    for &value in matrix.iter() {
        writer.write_f64::<BigEndian>(value)?;
    }
    Ok(())
}

fn read_matrix<R: Read>(reader: &mut R) -> Result<Array2<f64>> {
    let rows = reader.read_u32::<BigEndian>()? as usize;
    let cols = reader.read_u32::<BigEndian>()? as usize;
    let mut data = vec![0.0; rows * cols];
    for value in &mut data {
        *value = reader.read_f64::<BigEndian>()?;
    }
    Array2::from_shape_vec((rows, cols), data)
        .map_err(|err| Error::InvalidData(format!("bad matrix shape in checkpoint: {err}")))
}

/// A loaded store must still satisfy the adjacency invariant: each layer's
/// fan-in equals the previous layer's fan-out, and biases are columns.
fn validate_chain(params: &Parameters) -> Result<()> {
    if params.layers.is_empty() {
        return Err(Error::InvalidData("checkpoint holds no layers".to_owned()));
    }
    for (i, layer) in params.layers.iter().enumerate() {
        if layer.bias.dim() != (layer.weights.nrows(), 1) {
            return Err(Error::InvalidData(format!(
                "layer {} bias shape {:?} does not match its weight rows",
                i + 1,
                layer.bias.dim()
            )));
        }
    }
    for (i, pair) in params.layers.windows(2).enumerate() {
        if pair[1].weights.ncols() != pair[0].weights.nrows() {
            return Err(Error::InvalidData(format!(
                "layer {} fan-in {} does not match layer {} fan-out {}",
                i + 2,
                pair[1].weights.ncols(),
                i + 1,
                pair[0].weights.nrows()
            )));
        }
    }
    Ok(())
}
