// ============================================================
// Layer 4 — Point Cloud Loader
// ============================================================
// Reads one `.npy` file holding an [N, 3] array of xyz
// coordinates. Arrays stored as float64 are narrowed to f32.
// The first `num_points` rows are kept; a file with fewer
// points is an error.

use std::path::Path;

use anyhow::{ensure, Context, Result};
use ndarray::{s, Array2};
use ndarray_npy::read_npy;

use crate::domain::point_cloud::{LabeledFile, PointCloud};

/// Parse one labelled file into a point cloud of exactly `num_points` points.
pub fn load_point_cloud(file: &LabeledFile, num_points: usize) -> Result<PointCloud> {
    let points = read_xyz(&file.path, num_points)?;
    Ok(PointCloud::new(points, file.label))
}

fn read_xyz(path: &Path, num_points: usize) -> Result<Vec<f32>> {
    let array: Array2<f32> = match read_npy::<_, Array2<f32>>(path) {
        Ok(array) => array,
        Err(_) => read_npy::<_, Array2<f64>>(path)
            .with_context(|| format!("Cannot read point cloud '{}'", path.display()))?
            .mapv(|v| v as f32),
    };

    let (rows, cols) = array.dim();
    ensure!(
        cols == 3,
        "point cloud '{}' has {cols} columns, expected 3",
        path.display()
    );
    ensure!(
        rows >= num_points,
        "point cloud '{}' has {rows} points, expected at least {num_points}",
        path.display()
    );

    Ok(array.slice(s![..num_points, ..]).iter().copied().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_npy::write_npy;

    #[test]
    fn test_reads_and_truncates() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cloud.npy");
        let data: Array2<f32> = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        write_npy(&path, &data).unwrap();

        let cloud = load_point_cloud(&LabeledFile::new(&path, 7), 2).unwrap();
        assert_eq!(cloud.label, 7);
        assert_eq!(cloud.num_points(), 2);
        assert_eq!(cloud.points, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_reads_float64_arrays() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cloud64.npy");
        let data: Array2<f64> = array![[0.5, -0.5, 1.0]];
        write_npy(&path, &data).unwrap();

        let cloud = load_point_cloud(&LabeledFile::new(&path, 0), 1).unwrap();
        assert_eq!(cloud.points, vec![0.5, -0.5, 1.0]);
    }

    #[test]
    fn test_too_few_points_is_an_error() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("small.npy");
        let data: Array2<f32> = array![[1.0, 2.0, 3.0]];
        write_npy(&path, &data).unwrap();

        assert!(load_point_cloud(&LabeledFile::new(&path, 0), 2).is_err());
    }

    #[test]
    fn test_wrong_column_count_is_an_error() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("flat.npy");
        let data: Array2<f32> = array![[1.0, 2.0], [3.0, 4.0]];
        write_npy(&path, &data).unwrap();

        assert!(load_point_cloud(&LabeledFile::new(&path, 0), 1).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let file = LabeledFile::new("/nonexistent/cloud.npy", 0);
        assert!(load_point_cloud(&file, 1).is_err());
    }
}
