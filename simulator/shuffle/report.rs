//! Plain-text graph reports, one line appended per sample

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use shuffle_rust::OverlayGraph;

use super::stats::RoundMetrics;

const IN_DEGREE_FILE: &str = "inDegreeData.txt";
const CLUSTERING_FILE: &str = "clusteringCoefficientData.txt";
const SHORTEST_PATH_FILE: &str = "shortestPathData.txt";

/// Appends in-degree histograms, clustering coefficients and average path
/// lengths to three files under one directory.
pub struct ReportWriter {
    in_degree: BufWriter<File>,
    clustering: BufWriter<File>,
    shortest_path: BufWriter<File>,
    samples: usize,
}

fn append(dir: &Path, name: &str) -> std::io::Result<BufWriter<File>> {
    let path: PathBuf = dir.join(name);
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

impl ReportWriter {
    pub fn new<P: AsRef<Path>>(dir: P) -> std::io::Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        Ok(Self {
            in_degree: append(dir, IN_DEGREE_FILE)?,
            clustering: append(dir, CLUSTERING_FILE)?,
            shortest_path: append(dir, SHORTEST_PATH_FILE)?,
            samples: 0,
        })
    }

    pub fn write_sample(
        &mut self,
        graph: &OverlayGraph,
        metrics: &RoundMetrics,
    ) -> std::io::Result<()> {
        self.samples += 1;

        // "<round> <in_degree>:<nodes> ..."
        write!(self.in_degree, "{}", metrics.round)?;
        for (degree, nodes) in graph.in_degree_histogram() {
            write!(self.in_degree, " {}:{}", degree, nodes)?;
        }
        writeln!(self.in_degree)?;

        writeln!(self.clustering, "{} {}", self.samples, metrics.clustering)?;

        if let Some(length) = metrics.avg_path_length {
            writeln!(self.shortest_path, "{} {}", self.samples, length)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.in_degree.flush()?;
        self.clustering.flush()?;
        self.shortest_path.flush()
    }
}

impl Drop for ReportWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
