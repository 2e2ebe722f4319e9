use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use ndarray::Array2;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// A labeled CSV split: one row per example, identifier first, raw pixel
/// intensities in the middle, the integer class label last. `inputs` is laid
/// out features x examples so that each column is one example.
#[derive(Debug, Clone)]
pub struct LabeledSet {
    pub ids: Vec<String>,
    pub inputs: Array2<f64>,
    pub labels: Vec<usize>,
}

/// An unlabeled split (test data): identifier first, pixels after.
#[derive(Debug, Clone)]
pub struct UnlabeledSet {
    pub ids: Vec<String>,
    pub inputs: Array2<f64>,
}

/// Open a CSV file, transparently decompressing a `.gz` suffix.
fn open_reader(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Read a labeled split. The first line is a header and is skipped.
pub fn read_labeled(path: &Path) -> Result<LabeledSet> {
    let mut ids = Vec::new();
    let mut labels = Vec::new();
    let mut values = Vec::new();
    let mut feature_count = None;

    for (line_no, line) in open_reader(path)?.lines().enumerate().skip(1) {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split(',');
        let id = fields
            .next()
            .ok_or_else(|| bad_row(path, line_no, "missing identifier"))?;
        let rest: Vec<&str> = fields.collect();
        let (label, pixels) = rest
            .split_last()
            .ok_or_else(|| bad_row(path, line_no, "missing label"))?;

        check_width(path, line_no, &mut feature_count, pixels.len())?;
        ids.push(id.to_owned());
        labels.push(
            label
                .trim()
                .parse::<usize>()
                .map_err(|err| bad_row(path, line_no, &format!("bad label {label:?}: {err}")))?,
        );
        for &pixel in pixels {
            values.push(parse_pixel(path, line_no, pixel)?);
        }
    }

    let inputs = to_columns(path, values, feature_count.unwrap_or(0), ids.len())?;
    log::info!(
        "read {} examples with {} features from {}",
        ids.len(),
        inputs.nrows(),
        path.display()
    );
    Ok(LabeledSet { ids, inputs, labels })
}

/// Read an unlabeled split. The first line is a header and is skipped.
pub fn read_unlabeled(path: &Path) -> Result<UnlabeledSet> {
    let mut ids = Vec::new();
    let mut values = Vec::new();
    let mut feature_count = None;

    for (line_no, line) in open_reader(path)?.lines().enumerate().skip(1) {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split(',');
        let id = fields
            .next()
            .ok_or_else(|| bad_row(path, line_no, "missing identifier"))?;
        let pixels: Vec<&str> = fields.collect();

        check_width(path, line_no, &mut feature_count, pixels.len())?;
        ids.push(id.to_owned());
        for &pixel in &pixels {
            values.push(parse_pixel(path, line_no, pixel)?);
        }
    }

    let inputs = to_columns(path, values, feature_count.unwrap_or(0), ids.len())?;
    log::info!(
        "read {} examples with {} features from {}",
        ids.len(),
        inputs.nrows(),
        path.display()
    );
    Ok(UnlabeledSet { ids, inputs })
}

fn bad_row(path: &Path, line_no: usize, what: &str) -> Error {
    Error::InvalidData(format!("{} line {}: {what}", path.display(), line_no + 1))
}

fn check_width(
    path: &Path,
    line_no: usize,
    feature_count: &mut Option<usize>,
    width: usize,
) -> Result<()> {
    match *feature_count {
        None => {
            if width == 0 {
                return Err(bad_row(path, line_no, "row has no pixel columns"));
            }
            *feature_count = Some(width);
        }
        Some(expected) if expected != width => {
            return Err(bad_row(
                path,
                line_no,
                &format!("expected {expected} pixel columns, found {width}"),
            ));
        }
        Some(_) => {}
    }
    Ok(())
}

fn parse_pixel(path: &Path, line_no: usize, field: &str) -> Result<f64> {
    field
        .trim()
        .parse::<f64>()
        .map_err(|err| bad_row(path, line_no, &format!("bad pixel {field:?}: {err}")))
}

/// Rows were collected example-major; transpose into features x examples.
fn to_columns(
    path: &Path,
    values: Vec<f64>,
    features: usize,
    examples: usize,
) -> Result<Array2<f64>> {
    Array2::from_shape_vec((examples, features), values)
        .map(|rows| rows.reversed_axes())
        .map_err(|err| Error::InvalidData(format!("{}: {err}", path.display())))
}

/// Scale raw intensities into [0, 1].
pub fn normalize(inputs: &Array2<f64>) -> Array2<f64> {
    inputs / 255.0
}

/// Map raw intensities to 0/1 at a threshold; the RBM consumes binary
/// visible vectors.
pub fn binarize(inputs: &Array2<f64>, threshold: f64) -> Array2<f64> {
    inputs.mapv(|v| if v >= threshold { 1.0 } else { 0.0 })
}

/// One-hot encode labels into a classes x examples matrix.
pub fn one_hot(labels: &[usize], num_classes: usize) -> Result<Array2<f64>> {
    let mut encoded = Array2::zeros((num_classes, labels.len()));
    for (j, &label) in labels.iter().enumerate() {
        if label >= num_classes {
            return Err(Error::InvalidData(format!(
                "label {label} is outside the {num_classes} known classes"
            )));
        }
        encoded[[label, j]] = 1.0;
    }
    Ok(encoded)
}

/// Write the two-column submission table mapping identifiers to predicted
/// class indices.
pub fn write_submission(path: &Path, ids: &[String], classes: &[usize]) -> Result<()> {
    assert_eq!(
        ids.len(),
        classes.len(),
        "every identifier needs a predicted class"
    );
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(File::create(path)?);
    writeln!(writer, "id,label")?;
    for (id, class) in ids.iter().zip(classes) {
        writeln!(writer, "{id},{class}")?;
    }
    writer.flush()?;
    log::info!("created submission at {}", path.display());
    Ok(())
}

/// Export a features x examples matrix as CSV, one example per row. Used to
/// hand RBM hidden representations to external embedding tools.
pub fn write_features(path: &Path, features: &Array2<f64>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let mut writer = BufWriter::new(File::create(path)?);
    for column in features.columns() {
        let row = column.iter().map(f64::to_string).collect::<Vec<_>>();
        writeln!(writer, "{}", row.join(","))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::path::PathBuf;

    fn scratch_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("digit-descent-data-{name}-{}", std::process::id()))
    }

    #[test]
    fn labeled_rows_become_columns() {
        let path = scratch_file("labeled.csv");
        fs::write(&path, "id,p0,p1,p2,label\n7,0,128,255,3\n8,10,20,30,1\n").unwrap();

        let set = read_labeled(&path).unwrap();
        assert_eq!(set.ids, vec!["7", "8"]);
        assert_eq!(set.labels, vec![3, 1]);
        assert_eq!(set.inputs.dim(), (3, 2));
        assert_eq!(set.inputs.column(0).to_vec(), vec![0.0, 128.0, 255.0]);
        assert_eq!(set.inputs.column(1).to_vec(), vec![10.0, 20.0, 30.0]);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn ragged_rows_are_invalid_data() {
        let path = scratch_file("ragged.csv");
        fs::write(&path, "id,p0,p1,label\n1,5,6,0\n2,5,0\n").unwrap();
        assert!(matches!(read_labeled(&path), Err(Error::InvalidData(_))));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn normalize_and_binarize_cover_the_pixel_range() {
        let raw = array![[0.0, 127.0], [128.0, 255.0]];
        let scaled = normalize(&raw);
        assert!((scaled[[1, 1]] - 1.0).abs() < 1e-12);

        let binary = binarize(&raw, 127.0);
        assert_eq!(binary, array![[0.0, 1.0], [1.0, 1.0]]);
    }

    #[test]
    fn one_hot_puts_a_single_one_per_column() {
        let encoded = one_hot(&[2, 0], 4).unwrap();
        assert_eq!(encoded.dim(), (4, 2));
        assert_eq!(encoded.column(0).to_vec(), vec![0.0, 0.0, 1.0, 0.0]);
        assert_eq!(encoded.column(1).to_vec(), vec![1.0, 0.0, 0.0, 0.0]);
        assert!(one_hot(&[4], 4).is_err());
    }

    #[test]
    fn submission_lists_id_label_pairs() {
        let path = scratch_file("submission.csv");
        write_submission(
            &path,
            &["10".to_owned(), "11".to_owned()],
            &[3, 7],
        )
        .unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(written, "id,label\n10,3\n11,7\n");
        fs::remove_file(&path).ok();
    }
}
